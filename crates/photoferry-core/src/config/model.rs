//! Run configuration model.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Complete configuration for a pipeline run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Mailbox connection and sender settings.
    pub mailbox: MailboxConfig,
    /// Message filter settings.
    pub filter: FilterConfig,
    /// Attachment and upload settings.
    pub uploads: UploadConfig,
    /// Dedup ledger settings.
    pub ledger: LedgerConfig,
    /// Photo library credentials.
    pub photos: PhotosConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }
}

/// IMAP mailbox settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port.
    #[serde(default = "default_imap_port")]
    pub port: u16,
    /// Login username.
    pub username: String,
    /// Login password (app password for Gmail).
    pub password: String,
    /// Address the watched messages come from.
    pub sender_email: String,
}

/// Message filter settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Subject line candidates must equal, character for character.
    pub subject_pattern: String,
    /// How many days back to search.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// How many matching messages a normal week produces. Advisory only;
    /// deviations are logged, never fatal.
    #[serde(default = "default_expected_weekly_messages")]
    pub expected_weekly_messages: u32,
}

/// Attachment validation and upload settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Album that receives uploaded photos.
    pub album_name: String,
    /// Accepted filename extensions, with leading dot.
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,
    /// Largest accepted attachment, in megabytes.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Upload attempts per item before giving up on transient failures.
    #[serde(default = "default_max_upload_attempts")]
    pub max_upload_attempts: u32,
}

impl UploadConfig {
    /// Maximum accepted attachment size in bytes.
    #[must_use]
    pub const fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Dedup ledger settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Path of the sqlite ledger file.
    pub path: String,
}

/// Photo library API credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotosConfig {
    /// `OAuth2` client ID.
    pub client_id: String,
    /// `OAuth2` client secret.
    pub client_secret: String,
    /// Long-lived refresh token obtained out of band.
    pub refresh_token: String,
    /// Token endpoint override; defaults to Google's.
    #[serde(default)]
    pub token_url: Option<String>,
    /// API base override (testing, proxies).
    #[serde(default)]
    pub api_base: Option<String>,
}

fn default_imap_port() -> u16 {
    993
}

fn default_lookback_days() -> u32 {
    7
}

fn default_expected_weekly_messages() -> u32 {
    2
}

fn default_supported_formats() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff"]
        .into_iter()
        .map(ToString::to_string)
        .collect()
}

fn default_max_file_size_mb() -> u64 {
    50
}

fn default_max_upload_attempts() -> u32 {
    4
}
