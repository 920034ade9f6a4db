//! Activities exchanged between participants, and their wire codec.
//!
//! Every message in a session is one [`Activity`]. The enum is closed:
//! routing code matches on it exhaustively instead of dispatching through
//! visitors. On the wire an activity is a JSON object tagged by `activity`.

use crate::error::ActivityError;
use crate::stop::StopActivity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tandem_jupiter::JupiterActivity;
use tandem_ot::{DocumentPath, Operation, ParticipantId, Timestamp};

/// A message between participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "activity", rename_all = "camelCase")]
pub enum Activity {
    /// A raw text edit, before any transformation.
    TextEdit(TextEditActivity),
    /// A stamped operation on a Jupiter channel.
    Jupiter(JupiterActivity),
    Checksum(ChecksumActivity),
    Stop(StopActivity),
    File(FileActivity),
}

impl Activity {
    pub fn source(&self) -> &ParticipantId {
        match self {
            Activity::TextEdit(a) => &a.source,
            Activity::Jupiter(a) => &a.source,
            Activity::Checksum(a) => &a.source,
            Activity::Stop(a) => &a.source,
            Activity::File(a) => &a.source,
        }
    }

    /// The document this activity concerns, if any.
    pub fn document_path(&self) -> Option<&DocumentPath> {
        match self {
            Activity::TextEdit(a) => Some(&a.document_path),
            Activity::Jupiter(a) => Some(&a.document_path),
            Activity::Checksum(a) => Some(&a.document_path),
            Activity::File(a) => Some(&a.document_path),
            Activity::Stop(_) => None,
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::TextEdit(a) => write!(f, "{}", a),
            Activity::Jupiter(a) => write!(f, "{}", a),
            Activity::Checksum(a) => write!(f, "{}", a),
            Activity::Stop(a) => write!(f, "{}", a),
            Activity::File(a) => write!(f, "{}", a),
        }
    }
}

/// Replace `replaced_text` at `offset` by `text`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEditActivity {
    pub source: ParticipantId,
    pub document_path: DocumentPath,
    pub offset: usize,
    pub text: String,
    pub replaced_text: String,
}

impl TextEditActivity {
    pub fn new(
        source: ParticipantId,
        document_path: DocumentPath,
        offset: usize,
        text: impl Into<String>,
        replaced_text: impl Into<String>,
    ) -> Self {
        Self {
            source,
            document_path,
            offset,
            text: text.into(),
            replaced_text: replaced_text.into(),
        }
    }

    /// The operation this edit performs. A replacement deletes first.
    pub fn to_operation(&self) -> Operation {
        let delete = Operation::delete(self.offset, self.replaced_text.clone());
        let insert = Operation::insert(self.offset, self.text.clone());
        match (self.replaced_text.is_empty(), self.text.is_empty()) {
            (true, true) => Operation::NoOperation,
            (true, false) => insert,
            (false, true) => delete,
            (false, false) => Operation::Split {
                ops: vec![delete, insert],
            },
        }
    }

    /// Split an operation back into text edits.
    ///
    /// A delete directly followed by an insert at the same offset becomes
    /// one replacement. No-ops produce no edits.
    pub fn from_operation(
        op: &Operation,
        document_path: &DocumentPath,
        source: &ParticipantId,
    ) -> Vec<TextEditActivity> {
        let parts = match Operation::compose([op.clone()]) {
            Operation::Split { ops } => ops,
            Operation::NoOperation => Vec::new(),
            single => vec![single],
        };
        let parts = parts.into_iter().filter(|part| !part.is_noop());

        let mut edits: Vec<TextEditActivity> = Vec::new();
        for part in parts {
            match part {
                Operation::Insert { position, text } => {
                    if let Some(last) = edits.last_mut() {
                        if last.offset == position && last.text.is_empty() && !last.replaced_text.is_empty() {
                            last.text = text;
                            continue;
                        }
                    }
                    edits.push(TextEditActivity::new(
                        source.clone(),
                        document_path.clone(),
                        position,
                        text,
                        "",
                    ));
                }
                Operation::Delete { position, text } => edits.push(TextEditActivity::new(
                    source.clone(),
                    document_path.clone(),
                    position,
                    "",
                    text,
                )),
                // compose flattens splits and drops no-ops
                Operation::Split { .. } | Operation::NoOperation => {}
            }
        }
        edits
    }
}

impl fmt::Display for TextEditActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TextEditActivity({}, {}, offset: {}, new: {:?}, old: {:?})",
            self.source, self.document_path, self.offset, self.text, self.replaced_text
        )
    }
}

/// Hash and length of a document as seen by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumActivity {
    pub source: ParticipantId,
    pub document_path: DocumentPath,
    /// Length in characters.
    pub content_length: usize,
    /// SHA-256 of the UTF-8 content.
    pub content_hash: Vec<u8>,
    /// Channel timestamp, present only on copies routed through the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl ChecksumActivity {
    pub fn of(source: ParticipantId, document_path: DocumentPath, content: &str) -> Self {
        Self {
            source,
            document_path,
            content_length: content.chars().count(),
            content_hash: content_hash(content),
            timestamp: None,
        }
    }

    pub fn with_timestamp(self, timestamp: Timestamp) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    pub fn without_timestamp(self) -> Self {
        Self {
            timestamp: None,
            ..self
        }
    }

    /// True if `content` has the checksummed length and hash.
    pub fn matches(&self, content: &str) -> bool {
        self.content_length == content.chars().count() && self.content_hash == content_hash(content)
    }
}

impl fmt::Display for ChecksumActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChecksumActivity({}, {}, length: {}",
            self.source, self.document_path, self.content_length
        )?;
        if let Some(ts) = self.timestamp {
            write!(f, ", timestamp: {}", ts)?;
        }
        write!(f, ")")
    }
}

fn content_hash(content: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileChange {
    Created,
    Removed,
}

/// A document was created or removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileActivity {
    pub source: ParticipantId,
    pub document_path: DocumentPath,
    pub change: FileChange,
}

impl FileActivity {
    pub fn created(source: ParticipantId, document_path: DocumentPath) -> Self {
        Self {
            source,
            document_path,
            change: FileChange::Created,
        }
    }

    pub fn removed(source: ParticipantId, document_path: DocumentPath) -> Self {
        Self {
            source,
            document_path,
            change: FileChange::Removed,
        }
    }
}

impl fmt::Display for FileActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileActivity({}, {}, {:?})",
            self.source, self.document_path, self.change
        )
    }
}

/// An activity and the participants it must be delivered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueItem {
    pub recipients: Vec<ParticipantId>,
    pub activity: Activity,
}

impl QueueItem {
    pub fn new(recipients: Vec<ParticipantId>, activity: Activity) -> Self {
        Self {
            recipients,
            activity,
        }
    }

    pub fn to(recipient: ParticipantId, activity: Activity) -> Self {
        Self::new(vec![recipient], activity)
    }
}

/// Encode an activity for the wire.
pub fn encode(activity: &Activity) -> Result<Vec<u8>, ActivityError> {
    Ok(serde_json::to_vec(activity)?)
}

/// Decode an activity received from the wire.
pub fn decode(bytes: &[u8]) -> Result<Activity, ActivityError> {
    Ok(serde_json::from_slice(bytes)?)
}
