//! Application configuration.
//!
//! Read from a TOML file, then overridden by `FLASHCARDS_API_URL` and
//! `FLASHCARDS_API_TOKEN`, then by command line flags.

use crate::backend::api::DEFAULT_TIMEOUT;
use crate::database::db::DEFAULT_DATABASE_PATH;
use crate::models::SessionSettings;
use crate::models::learning_session::{DEFAULT_CARDS_PER_SESSION, DEFAULT_SCORE_RANGE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "flashcards.toml";
pub const API_URL_ENV: &str = "FLASHCARDS_API_URL";
pub const API_TOKEN_ENV: &str = "FLASHCARDS_API_TOKEN";
/// One score button is drawn per value in `-range..=range`.
pub const MAX_SCORE_RANGE: i32 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cards_per_session: usize,
    pub score_range: i32,
    /// Input lock after each score while the next card comes in. 0 disables it.
    pub transition_cooldown_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cards_per_session: DEFAULT_CARDS_PER_SESSION,
            score_range: DEFAULT_SCORE_RANGE,
            transition_cooldown_ms: 350,
        }
    }
}

impl SessionConfig {
    pub fn to_settings(&self) -> SessionSettings {
        SessionSettings {
            cards_per_session: self.cards_per_session,
            score_range: self.score_range,
            transition_cooldown: (self.transition_cooldown_ms > 0)
                .then(|| Duration::from_millis(self.transition_cooldown_ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Local {
        #[serde(default = "default_database_path")]
        database_path: PathBuf,
    },
    Remote {
        api_url: String,
        #[serde(default)]
        api_token: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Local {
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    /// Loads config from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at '{}', using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        let url = std::env::var(API_URL_ENV).ok();
        let token = std::env::var(API_TOKEN_ENV).ok();
        self.apply_overrides(url, token);
    }

    /// An API url switches to the remote backend; a token only applies to a remote backend.
    pub fn apply_overrides(&mut self, api_url: Option<String>, api_token: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.backend = match std::mem::take(&mut self.backend) {
                BackendConfig::Remote {
                    api_token,
                    timeout_secs,
                    ..
                } => BackendConfig::Remote {
                    api_url: url,
                    api_token,
                    timeout_secs,
                },
                BackendConfig::Local { .. } => BackendConfig::Remote {
                    api_url: url,
                    api_token: None,
                    timeout_secs: default_timeout_secs(),
                },
            };
        }

        if let (Some(token), BackendConfig::Remote { api_token, .. }) = (api_token, &mut self.backend) {
            *api_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.cards_per_session == 0 {
            return Err(ConfigError::Invalid(
                "session.cards_per_session must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_SCORE_RANGE).contains(&self.session.score_range) {
            return Err(ConfigError::Invalid(format!(
                "session.score_range must be between 1 and {}",
                MAX_SCORE_RANGE
            )));
        }
        if let BackendConfig::Remote { api_url, .. } = &self.backend {
            if api_url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "backend.api_url must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
