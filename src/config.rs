//! Bot configuration loaded from the process environment

use crate::error::{Error, Result};
use crate::pdf::WatermarkOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the Bot API token
pub const TOKEN_VAR: &str = "BOT_TOKEN";

/// Default upload limit: 30 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 30 * 1024 * 1024;

/// Default time a file waits for its page number: 15 minutes
pub const DEFAULT_HELD_FILE_TTL: Duration = Duration::from_secs(15 * 60);

/// Runtime configuration for the bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot API authentication token
    pub token: String,
    /// Base URL of the Telegram Bot API (default: https://api.telegram.org)
    pub api_url: String,
    /// Long-poll timeout for getUpdates in seconds (default: 30)
    pub poll_timeout_secs: u64,
    /// Maximum accepted upload size in bytes (default: 30 MiB)
    pub max_upload_bytes: u64,
    /// Watermark text and link target
    pub watermark: WatermarkOptions,
    /// File name for returned documents; the upload's name is used when unset
    pub output_file_name: Option<String>,
    /// Parent directory for per-request workspaces (default: system temp dir)
    pub temp_root: PathBuf,
    /// Maximum number of concurrently tracked conversations (default: 10_000)
    pub max_sessions: usize,
    /// How long an upload waits for its page number before it is released (default: 15 min)
    pub held_file_ttl: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            watermark: WatermarkOptions::default(),
            output_file_name: None,
            temp_root: std::env::temp_dir(),
            max_sessions: 10_000,
            held_file_ttl: DEFAULT_HELD_FILE_TTL,
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables.
    ///
    /// Fails with [`Error::MissingConfig`] when `BOT_TOKEN` is absent or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MissingConfig {
                name: TOKEN_VAR.to_string(),
            })?;

        let mut config = BotConfig {
            token,
            ..BotConfig::default()
        };

        if let Some(url) = lookup("TELEGRAM_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("PDF_BOT_POLL_TIMEOUT_SECS") {
            config.poll_timeout_secs = parse_var("PDF_BOT_POLL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("PDF_BOT_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_var("PDF_BOT_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = lookup("PDF_BOT_MAX_SESSIONS") {
            config.max_sessions = parse_var("PDF_BOT_MAX_SESSIONS", &v)?;
        }
        if let Some(v) = lookup("PDF_BOT_HELD_FILE_TTL_SECS") {
            let secs: u64 = parse_var("PDF_BOT_HELD_FILE_TTL_SECS", &v)?;
            config.held_file_ttl = Duration::from_secs(secs);
        }
        if let Some(text) = lookup("PDF_BOT_WATERMARK_TEXT").filter(|t| !t.is_empty()) {
            config.watermark.text = text;
        }
        if let Some(link) = lookup("PDF_BOT_WATERMARK_LINK").filter(|l| !l.is_empty()) {
            config.watermark.link = link;
        }
        if let Some(name) = lookup("PDF_BOT_OUTPUT_NAME").filter(|n| !n.is_empty()) {
            config.output_file_name = Some(name);
        }
        if let Some(dir) = lookup("PDF_BOT_TEMP_DIR").filter(|d| !d.is_empty()) {
            config.temp_root = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::InvalidConfig {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
