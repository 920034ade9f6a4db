//! Detection of documents that drifted from the host's copy.
//!
//! Inconsistencies are only recorded here. Fetching the host's content to
//! repair a document is left to whoever reads [`ConsistencyWatchdog::inconsistent_paths`].

use crate::activity::ChecksumActivity;
use crate::error::ConsistencyError;
use std::collections::BTreeSet;
use tandem_ot::DocumentPath;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct ConsistencyWatchdog {
    inconsistent: BTreeSet<DocumentPath>,
}

impl ConsistencyWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a current checksum with the local content.
    ///
    /// A match clears any earlier flag on the document.
    pub fn check(
        &mut self,
        checksum: &ChecksumActivity,
        content: Option<&str>,
    ) -> Result<(), ConsistencyError> {
        let path = &checksum.document_path;
        let Some(content) = content else {
            self.flag(path.clone());
            return Err(ConsistencyError::MissingDocument(path.clone()));
        };

        if checksum.matches(content) {
            if self.inconsistent.remove(path) {
                debug!(path = %path, "document consistent again");
            }
            return Ok(());
        }

        let err = ConsistencyError::ChecksumMismatch {
            path: path.clone(),
            expected_length: checksum.content_length,
            actual_length: content.chars().count(),
        };
        warn!(error = %err, "inconsistency detected");
        self.flag(path.clone());
        Err(err)
    }

    /// Mark a document as needing a resync.
    pub fn flag(&mut self, path: DocumentPath) {
        self.inconsistent.insert(path);
    }

    /// Forget a document's flag, e.g. after it was resynchronized.
    pub fn clear(&mut self, path: &DocumentPath) -> bool {
        self.inconsistent.remove(path)
    }

    pub fn is_consistent(&self, path: &DocumentPath) -> bool {
        !self.inconsistent.contains(path)
    }

    pub fn inconsistent_paths(&self) -> Vec<DocumentPath> {
        self.inconsistent.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_ot::ParticipantId;

    fn checksum(content: &str) -> ChecksumActivity {
        ChecksumActivity::of(ParticipantId::new("host"), DocumentPath::new("a.txt"), content)
    }

    #[test]
    fn test_mismatch_flags_and_match_clears() {
        let mut watchdog = ConsistencyWatchdog::new();
        let path = DocumentPath::new("a.txt");

        let err = watchdog.check(&checksum("abc"), Some("abd")).unwrap_err();
        assert_eq!(
            err,
            ConsistencyError::ChecksumMismatch {
                path: path.clone(),
                expected_length: 3,
                actual_length: 3,
            }
        );
        assert!(!watchdog.is_consistent(&path));

        watchdog.check(&checksum("abc"), Some("abc")).unwrap();
        assert!(watchdog.is_consistent(&path));
    }

    #[test]
    fn test_missing_document_is_inconsistent() {
        let mut watchdog = ConsistencyWatchdog::new();
        assert!(matches!(
            watchdog.check(&checksum(""), None),
            Err(ConsistencyError::MissingDocument(_))
        ));
        assert_eq!(watchdog.inconsistent_paths(), vec![DocumentPath::new("a.txt")]);

        assert!(watchdog.clear(&DocumentPath::new("a.txt")));
        assert!(watchdog.inconsistent_paths().is_empty());
    }
}
