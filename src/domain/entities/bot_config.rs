use serde::{Deserialize, Serialize};

use super::UserId;
use crate::application::errors::ConfigError;

/// Prefix used when none is configured
pub const DEFAULT_PREFIX: &str = "!";

/// Longest prefix the control panel accepts
const MAX_PREFIX_CHARS: usize = 3;

/// Process-wide bot settings, replaced wholesale on reconfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub admin_id: UserId,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl BotConfig {
    /// Build a config, trimming the prefix and falling back to the default when blank
    pub fn new(admin_id: impl Into<UserId>, prefix: Option<&str>) -> Result<Self, ConfigError> {
        let admin_id = admin_id.into();
        if admin_id.as_str().trim().is_empty() {
            return Err(ConfigError::MissingField("admin-id".to_string()));
        }

        let prefix = match prefix.map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => default_prefix(),
        };
        if prefix.chars().count() > MAX_PREFIX_CHARS {
            return Err(ConfigError::InvalidValue(format!(
                "prefix '{}' is longer than {} characters",
                prefix, MAX_PREFIX_CHARS
            )));
        }

        Ok(Self { admin_id, prefix })
    }

    /// Re-apply the constructor's rules to a config read back from disk
    pub fn normalized(self) -> Result<Self, ConfigError> {
        Self::new(self.admin_id, Some(&self.prefix))
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        &self.admin_id == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_prefix_defaults() {
        let config = BotConfig::new("100", Some("   ")).unwrap();
        assert_eq!(config.prefix, "!");

        let config = BotConfig::new("100", None).unwrap();
        assert_eq!(config.prefix, DEFAULT_PREFIX);
    }

    #[test]
    fn test_prefix_is_trimmed_and_bounded() {
        assert_eq!(BotConfig::new("100", Some(" / ")).unwrap().prefix, "/");
        assert!(matches!(
            BotConfig::new("100", Some("!!!!")),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_admin_required() {
        assert!(matches!(BotConfig::new("", Some("!")), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_missing_prefix_in_json_defaults() {
        let config: BotConfig = serde_json::from_str(r#"{"admin-id":"42"}"#).unwrap();
        assert_eq!(config.prefix, "!");
        assert!(config.is_admin(&UserId::from("42")));
    }
}
