//! Process configuration read from the environment.

use crate::persistence::Database;
use crate::store::UserId;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_USER: &str = "STUDYTIMER_USER";
pub const ENV_DB: &str = "STUDYTIMER_DB";
pub const ENV_SOUND: &str = "STUDYTIMER_SOUND";
pub const ENV_NOTIFY: &str = "STUDYTIMER_NOTIFY";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be one of 1/0, true/false, on/off; got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Signed-in user; `None` runs in local-only mode.
    pub user: Option<UserId>,
    pub db_path: PathBuf,
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let user = vars.get(ENV_USER).and_then(|id| UserId::new(id.as_str()));
        let db_path = vars
            .get(ENV_DB)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Database::default_path);

        Ok(Self {
            user,
            db_path,
            sound_enabled: flag(&vars, ENV_SOUND)?,
            notifications_enabled: flag(&vars, ENV_NOTIFY)?,
        })
    }
}

/// Flags default to enabled when unset.
fn flag(vars: &HashMap<String, String>, name: &'static str) -> Result<bool, ConfigError> {
    let Some(value) = vars.get(name) else {
        return Ok(true);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.clone(),
        }),
    }
}
