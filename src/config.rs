//! Environment-driven configuration.
//!
//! All settings come from environment variables (a `.env` file is honored
//! via `dotenvy`). Only the database URL and the bot handle are required;
//! everything else has a sensible default.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default bounded timeout for raw file downloads.
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;
/// Default idle threshold before a session (and its staged files) is swept.
const DEFAULT_SESSION_MAX_IDLE_SECS: u64 = 6 * 60 * 60;
/// Default interval between sweep passes.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
/// Default transparent strip height for the Sticker profile.
const DEFAULT_STICKER_PADDING_PX: u32 = 50;

/// Runtime configuration for the sticker-bot core.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Connection pool size.
    pub database_pool_size: usize,
    /// Bot handle appended to generated pack slugs.
    pub bot_handle: String,
    /// Root directory for staged assets.
    pub temp_dir: PathBuf,
    /// Bounded timeout for raw file downloads.
    pub download_timeout: Duration,
    /// Idle threshold before a session is swept.
    pub session_max_idle: Duration,
    /// Interval between sweep passes.
    pub sweep_interval: Duration,
    /// Transparent strip height appended by the Sticker profile.
    pub sticker_padding_px: u32,
    /// Path to the ffprobe binary.
    pub ffprobe_path: String,
    /// Path to the ffmpeg binary.
    pub ffmpeg_path: String,
    /// Emoji tag used when an item arrives without one.
    pub default_emoji: String,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            database_pool_size: parse_or("DATABASE_POOL_SIZE", 8)?,
            bot_handle: require("BOT_HANDLE")?,
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("packsmith")),
            download_timeout: Duration::from_secs(parse_or(
                "DOWNLOAD_TIMEOUT_SECS",
                DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            )?),
            session_max_idle: Duration::from_secs(parse_or(
                "SESSION_MAX_IDLE_SECS",
                DEFAULT_SESSION_MAX_IDLE_SECS,
            )?),
            sweep_interval: Duration::from_secs(parse_or(
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?),
            sticker_padding_px: parse_or("STICKER_PADDING_PX", DEFAULT_STICKER_PADDING_PX)?,
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            default_emoji: std::env::var("DEFAULT_EMOJI").unwrap_or_else(|_| "\u{1F600}".to_string()),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        let value: u64 = parse_or("PACKSMITH_TEST_UNSET_VAR", 17).unwrap();
        assert_eq!(value, 17);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        // SAFETY: test-only env mutation, key is unique to this test.
        unsafe { std::env::set_var("PACKSMITH_TEST_GARBAGE_VAR", "not-a-number") };
        let result: Result<u64, _> = parse_or("PACKSMITH_TEST_GARBAGE_VAR", 1);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { .. })
        ));
        unsafe { std::env::remove_var("PACKSMITH_TEST_GARBAGE_VAR") };
    }

    #[test]
    fn test_require_reports_missing_key() {
        let err = require("PACKSMITH_TEST_MISSING_VAR").unwrap_err();
        assert!(err.to_string().contains("PACKSMITH_TEST_MISSING_VAR"));
    }
}
