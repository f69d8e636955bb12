use directories::BaseDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_USERNAME: &str = "ChatUser";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no config directory available")]
    NoConfigDir,
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("forwarding number must look like +1234567890, got {0:?}")]
    InvalidForwardingNumber(String),
    #[error("the assistant needs an api key before it can be enabled")]
    MissingApiKey,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub username: String,
    /// `[assistant]` table; absent until the user configures it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant: Option<AssistantSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            assistant: None,
        }
    }
}

/// Stored configuration for the reply assistant. Nothing in the client acts on
/// it yet; it is kept so the settings file round-trips.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssistantSettings {
    pub enabled: bool,
    pub api_key: String,
    /// Where notices get forwarded, in `+<digits>` form. Empty means nowhere.
    pub forwarding_number: String,
    pub notice_template: String,
}

impl AssistantSettings {
    pub fn from_input(
        enabled: bool,
        api_key: &str,
        forwarding_number: &str,
        notice_template: &str,
    ) -> Result<Self, SettingsError> {
        let api_key = api_key.trim();
        if enabled && api_key.is_empty() {
            return Err(SettingsError::MissingApiKey);
        }
        let forwarding_number: String = forwarding_number
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if !forwarding_number.is_empty() && !crate::utils::is_phone_number(&forwarding_number) {
            return Err(SettingsError::InvalidForwardingNumber(forwarding_number));
        }
        Ok(Self {
            enabled,
            api_key: api_key.to_string(),
            forwarding_number,
            notice_template: notice_template.trim().to_string(),
        })
    }
}

impl Settings {
    /// Build settings from what the user typed; the url gets a scheme when it has none.
    pub fn from_input(base_url: &str, username: &str) -> Result<Self, SettingsError> {
        let base_url = crate::utils::normalize_url(base_url);
        url::Url::parse(&base_url)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(SettingsError::EmptyUsername);
        }
        Ok(Self {
            base_url,
            username: username.to_string(),
            assistant: None,
        })
    }

    pub fn path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("wadash.toml"))
    }

    /// True once a settings file has been written.
    pub fn exists() -> bool {
        Self::path().is_some_and(|p| p.exists())
    }

    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(text) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str::<Settings>(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring unreadable settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
