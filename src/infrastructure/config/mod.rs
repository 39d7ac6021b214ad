//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::errors::ConfigError;
use crate::domain::entities::BotConfig;

/// Agent configuration file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotSection,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub enforcement: EnforcementConfig,
}

/// Admin and prefix supplied from outside the persisted state. Either one
/// present counts as a reconfiguration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotSection {
    pub admin_id: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    /// Platform session credential, a JSON array of cookies
    pub credential_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EnforcementConfig {
    /// Re-apply stored locks once the session is up
    pub reassert_on_start: bool,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            reassert_on_start: true,
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn load_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Let environment variables take precedence over file values
    pub fn apply_env(&mut self) {
        if let Some(admin) = env_var("BOT_ADMIN_ID") {
            self.bot.admin_id = Some(admin);
        }
        if let Some(prefix) = env_var("BOT_PREFIX") {
            self.bot.prefix = Some(prefix);
        }
        if let Some(dir) = env_var("BOT_DATA_DIR") {
            self.storage.directory = PathBuf::from(dir);
        }
        if let Some(file) = env_var("BOT_CREDENTIAL_FILE") {
            self.session.credential_file = Some(PathBuf::from(file));
        }
    }

    /// True when an admin or prefix was supplied from outside the store
    pub fn is_reconfiguration(&self) -> bool {
        self.bot.admin_id.is_some() || self.bot.prefix.is_some()
    }

    /// Work out the effective bot config.
    ///
    /// Returns the config plus whether it differs from what was persisted
    /// and so has to be written back.
    pub fn resolve_bot_config(
        &self,
        persisted: Option<BotConfig>,
    ) -> Result<(BotConfig, bool), ConfigError> {
        let persisted = persisted.map(BotConfig::normalized).transpose()?;

        if !self.is_reconfiguration() {
            return persisted
                .map(|config| (config, false))
                .ok_or_else(|| ConfigError::MissingField("bot.admin-id".to_string()));
        }

        // A partial override keeps the other half of the persisted config
        let admin = match (&self.bot.admin_id, &persisted) {
            (Some(admin), _) => admin.clone(),
            (None, Some(config)) => config.admin_id.to_string(),
            (None, None) => return Err(ConfigError::MissingField("bot.admin-id".to_string())),
        };
        let prefix = self
            .bot
            .prefix
            .clone()
            .or_else(|| persisted.as_ref().map(|c| c.prefix.clone()));

        let config = BotConfig::new(admin, prefix.as_deref())?;
        let changed = persisted.as_ref() != Some(&config);
        Ok((config, changed))
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Check that the session credential is a JSON array
pub fn validate_credential(path: &Path) -> Result<usize, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::InvalidValue(format!("Failed to read credential {}: {}", path.display(), e))
    })?;

    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(serde_json::Value::Array(entries)) => Ok(entries.len()),
        Ok(_) => Err(ConfigError::InvalidValue(
            "Credential must be a JSON array".to_string(),
        )),
        Err(e) => Err(ConfigError::Parse(format!("Credential is not valid JSON: {}", e))),
    }
}
