//! Configuration for the bill tracker service.
//!
//! Loaded from TOML, with a small set of environment overrides kept for
//! container deployments (`PORT`, `DB_PATH`, `BILLARR_PASSWORD`,
//! `GOOGLE_CREDENTIALS_PATH`, `GOOGLE_TOKEN_PATH`, `GOOGLE_CALENDAR_ID`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BillarrError, Result};

/// Longest accepted poll interval. Notification windows are two hours wide,
/// so anything above an hour can miss a window entirely.
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillarrConfig {
    /// HTTP listener and auth gate.
    pub server: ServerConfig,
    /// SQLite database location.
    pub database: DatabaseConfig,
    /// Notification dispatcher timer.
    pub scheduler: SchedulerConfig,
    /// Telegram Bot API endpoint.
    pub telegram: TelegramConfig,
    /// WhatsApp Business Cloud API credentials.
    pub whatsapp: WhatsAppConfig,
    /// Google Calendar sync.
    pub calendar: CalendarConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// When set, `/api/*` requires HTTP Basic auth with this password.
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3001,
            password: None,
        }
    }
}

impl ServerConfig {
    /// The configured password, treating blank values as unset.
    pub fn effective_password(&self) -> Option<&str> {
        self.password
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: crate::paths::database_file(),
        }
    }
}

/// Notification dispatcher timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the dispatcher on a timer. The manual trigger works either way.
    pub enabled: bool,
    /// Minutes between dispatcher runs (1–60).
    pub interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API base URL.
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_owned(),
        }
    }
}

/// WhatsApp Business Cloud API configuration.
///
/// The recipient number lives in the settings row; the sender credentials
/// live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub access_token: String,
    pub phone_number_id: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com/v18.0".to_owned(),
            access_token: String::new(),
            phone_number_id: String::new(),
        }
    }
}

/// Google Calendar configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Service-account key or OAuth client JSON.
    pub credentials_path: PathBuf,
    /// OAuth token JSON (needed for OAuth client credentials only).
    pub token_path: PathBuf,
    /// Target calendar.
    pub calendar_id: String,
    /// Calendar API base URL.
    pub api_base: String,
    /// Token endpoint override. Defaults to the one in the credentials file.
    pub token_uri: Option<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        let data = crate::paths::data_dir();
        Self {
            credentials_path: data.join("google-credentials.json"),
            token_path: data.join("google-token.json"),
            calendar_id: "primary".to_owned(),
            api_base: "https://www.googleapis.com/calendar/v3".to_owned(),
            token_uri: None,
        }
    }
}

impl BillarrConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BillarrError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, otherwise use defaults; then apply
    /// process environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::info!("no config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply deployment environment overrides via `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(e) => tracing::warn!("ignoring PORT={port}: {e}"),
            }
        }
        if let Some(path) = get("DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(password) = get("BILLARR_PASSWORD") {
            self.server.password = Some(password);
        }
        if let Some(path) = get("GOOGLE_CREDENTIALS_PATH") {
            self.calendar.credentials_path = PathBuf::from(path);
        }
        if let Some(path) = get("GOOGLE_TOKEN_PATH") {
            self.calendar.token_path = PathBuf::from(path);
        }
        if let Some(id) = get("GOOGLE_CALENDAR_ID") {
            self.calendar.calendar_id = id;
        }
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let interval = self.scheduler.interval_minutes;
        if interval == 0 || interval > MAX_POLL_INTERVAL_MINUTES {
            return Err(BillarrError::Config(format!(
                "scheduler.interval_minutes must be between 1 and {MAX_POLL_INTERVAL_MINUTES}, got {interval}"
            )));
        }
        if self.server.host.trim().is_empty() {
            return Err(BillarrError::Config("server.host must not be empty".to_owned()));
        }
        if self.calendar.calendar_id.trim().is_empty() {
            return Err(BillarrError::Config(
                "calendar.calendar_id must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path, honoring `BILLARR_CONFIG`.
    pub fn default_config_path() -> PathBuf {
        std::env::var_os("BILLARR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(crate::paths::config_file)
    }
}
