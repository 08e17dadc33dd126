//! Configuration for the stream ledger

use crate::store::DEFAULT_STREAM_ID_BASE;
use crate::types::StreamId;
use serde::{Deserialize, Serialize};

/// Stream ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Ledger rules
    pub ledger: LedgerConfig,

    /// Command queue configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "stream-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger: LedgerConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Who may cancel a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Only the payer
    SenderOnly,
    /// Payer or payee
    SenderOrReceiver,
}

impl CancelPolicy {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sender_only" => Some(CancelPolicy::SenderOnly),
            "sender_or_receiver" => Some(CancelPolicy::SenderOrReceiver),
            _ => None,
        }
    }
}

/// Ledger rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// First stream id handed out
    pub stream_id_base: StreamId,

    /// Cancellation rights
    pub cancel_policy: CancelPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            stream_id_base: DEFAULT_STREAM_ID_BASE,
            cancel_policy: CancelPolicy::SenderOnly,
        }
    }
}

/// Command queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(base) = std::env::var("STREAM_LEDGER_ID_BASE") {
            config.ledger.stream_id_base = base.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid STREAM_LEDGER_ID_BASE {:?}: {}", base, e))
            })?;
        }

        if let Ok(policy) = std::env::var("STREAM_LEDGER_CANCEL_POLICY") {
            config.ledger.cancel_policy = CancelPolicy::parse(&policy).ok_or_else(|| {
                crate::Error::Config(format!("Invalid STREAM_LEDGER_CANCEL_POLICY {:?}", policy))
            })?;
        }

        if let Ok(capacity) = std::env::var("STREAM_LEDGER_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!(
                    "Invalid STREAM_LEDGER_MAILBOX_CAPACITY {:?}: {}",
                    capacity, e
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject unusable settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "stream-ledger");
        assert_eq!(config.ledger.stream_id_base, 100_000);
        assert_eq!(config.ledger.cancel_policy, CancelPolicy::SenderOnly);
        assert_eq!(config.actor.mailbox_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cancel_policy_parse() {
        assert_eq!(CancelPolicy::parse("sender_only"), Some(CancelPolicy::SenderOnly));
        assert_eq!(
            CancelPolicy::parse("sender_or_receiver"),
            Some(CancelPolicy::SenderOrReceiver)
        );
        assert_eq!(CancelPolicy::parse("anyone"), None);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
service_name = "streams"
service_version = "9.9.9"

[ledger]
stream_id_base = 1
cancel_policy = "sender_or_receiver"

[actor]
mailbox_capacity = 16
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.service_name, "streams");
        assert_eq!(config.ledger.stream_id_base, 1);
        assert_eq!(config.ledger.cancel_policy, CancelPolicy::SenderOrReceiver);
        assert_eq!(config.actor.mailbox_capacity, 16);
    }

    #[test]
    fn test_from_file_rejects_zero_mailbox() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
service_name = "streams"
service_version = "0.1.0"

[ledger]
stream_id_base = 100000
cancel_policy = "sender_only"

[actor]
mailbox_capacity = 0
"#
        )
        .unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_from_env() {
        // Only test touching these variables; run checks sequentially
        const VARS: [&str; 3] = [
            "STREAM_LEDGER_ID_BASE",
            "STREAM_LEDGER_CANCEL_POLICY",
            "STREAM_LEDGER_MAILBOX_CAPACITY",
        ];
        let clear = || VARS.iter().for_each(|var| std::env::remove_var(var));
        clear();

        let config = Config::from_env().unwrap();
        assert_eq!(config.ledger.stream_id_base, 100_000);
        assert_eq!(config.actor.mailbox_capacity, 1000);

        std::env::set_var("STREAM_LEDGER_ID_BASE", "500");
        std::env::set_var("STREAM_LEDGER_CANCEL_POLICY", "sender_or_receiver");
        std::env::set_var("STREAM_LEDGER_MAILBOX_CAPACITY", "8");
        let config = Config::from_env().unwrap();
        assert_eq!(config.ledger.stream_id_base, 500);
        assert_eq!(config.ledger.cancel_policy, CancelPolicy::SenderOrReceiver);
        assert_eq!(config.actor.mailbox_capacity, 8);

        std::env::set_var("STREAM_LEDGER_CANCEL_POLICY", "anyone");
        assert!(matches!(Config::from_env(), Err(crate::Error::Config(_))));
        std::env::set_var("STREAM_LEDGER_CANCEL_POLICY", "sender_only");

        std::env::set_var("STREAM_LEDGER_ID_BASE", "-1");
        assert!(matches!(Config::from_env(), Err(crate::Error::Config(_))));
        std::env::set_var("STREAM_LEDGER_ID_BASE", "500");

        std::env::set_var("STREAM_LEDGER_MAILBOX_CAPACITY", "0");
        assert!(matches!(Config::from_env(), Err(crate::Error::Config(_))));

        clear();
    }
}
