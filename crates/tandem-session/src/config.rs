//! Session configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a session actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of the command channel between handles and the actor.
    pub command_capacity: usize,
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
    /// How often the host broadcasts checksums (in milliseconds).
    pub checksum_interval_ms: u64,
    /// Broadcast checksums periodically on the host.
    pub auto_checksum: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            event_capacity: 256,
            checksum_interval_ms: 2000,
            auto_checksum: false,
        }
    }
}

impl SessionConfig {
    /// The same configuration with every capacity and interval at least 1.
    ///
    /// Zero-sized channels and zero-length intervals cannot be created, and a
    /// deserialized config never went through the builder.
    pub fn sanitized(self) -> Self {
        Self {
            command_capacity: self.command_capacity.max(1),
            event_capacity: self.event_capacity.max(1),
            checksum_interval_ms: self.checksum_interval_ms.max(1),
            ..self
        }
    }
}

/// Builder for session configuration.
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.command_capacity = capacity.max(1);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    pub fn checksum_interval(mut self, ms: u64) -> Self {
        self.config.checksum_interval_ms = ms.max(1);
        self
    }

    pub fn auto_checksum(mut self, enabled: bool) -> Self {
        self.config.auto_checksum = enabled;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = SessionConfigBuilder::new()
            .checksum_interval(250)
            .auto_checksum(true)
            .command_capacity(0)
            .build();

        assert_eq!(config.checksum_interval_ms, 250);
        assert!(config.auto_checksum);
        // channels need room for at least one message
        assert_eq!(config.command_capacity, 1);
        assert_eq!(config.event_capacity, SessionConfig::default().event_capacity);
    }

    #[test]
    fn test_sanitized_deserialized_config() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"command_capacity": 0, "event_capacity": 0, "checksum_interval_ms": 0, "auto_checksum": true}"#,
        )
        .unwrap();

        let config = config.sanitized();
        assert_eq!(config.command_capacity, 1);
        assert_eq!(config.event_capacity, 1);
        assert_eq!(config.checksum_interval_ms, 1);
        assert!(config.auto_checksum);
    }
}
