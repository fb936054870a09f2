//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate locations.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Data (database, Google credentials) | `~/.local/share/billarr/` | `~/Library/Application Support/billarr/` |
//! | Config (`config.toml`) | `~/.config/billarr/` | `~/Library/Application Support/billarr/` |
//!
//! Overrides: `BILLARR_DATA_DIR`, `BILLARR_CONFIG_DIR`.

use std::path::PathBuf;

/// Application data root directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("BILLARR_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("billarr"))
        .unwrap_or_else(|| PathBuf::from("/tmp/billarr-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("BILLARR_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("billarr"))
        .unwrap_or_else(|| PathBuf::from("/tmp/billarr-config"))
}

/// Default SQLite database file (`data_dir()/bills.db`).
#[must_use]
pub fn database_file() -> PathBuf {
    data_dir().join("bills.db")
}

/// Default config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
