//! Bridge configuration

use crate::{types::PlayerHandle, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Name of the method channel the host talks to
    pub channel_name: String,
    /// Per-player event channels are named `{prefix}{handle}`
    pub event_channel_prefix: String,
    /// Send data source setup failures on the player's event stream.
    /// When disabled they are only logged.
    pub report_setup_errors: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: "kino.video/player".to_string(),
            event_channel_prefix: "kino.video/player/events/".to_string(),
            report_setup_errors: true,
        }
    }
}

impl BridgeConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_name.trim().is_empty() {
            return Err(Error::InvalidConfig("channelName must not be empty".to_string()));
        }
        if self.event_channel_prefix.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "eventChannelPrefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Event channel name for one player
    pub fn event_channel_name(&self, handle: PlayerHandle) -> String {
        format!("{}{}", self.event_channel_prefix, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.channel_name, "kino.video/player");
        assert!(config.report_setup_errors);
        assert_eq!(
            config.event_channel_name(PlayerHandle(3)),
            "kino.video/player/events/3"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "reportSetupErrors": false }}"#).unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert!(!config.report_setup_errors);
        assert_eq!(config.channel_name, "kino.video/player");
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "eventChannelPrefix": "" }}"#).unwrap();

        let err = BridgeConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
