//! Error types for packsmith.
//!
//! Errors are grouped by domain so callers can branch on kind instead of
//! matching message substrings. Platform error codes are preserved as a
//! diagnostic payload on [`PlatformError::Api`].

use crate::platform::PlatformErrorKind;

/// Top-level error type for the sticker-bot core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
///
/// Transactional compound operations roll back fully before surfacing one of
/// these; the caller must not assume partial state was committed.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Pool build error: {0}")]
    PoolBuild(#[from] deadpool_postgres::BuildError),

    #[error("Pool runtime error: {0}")]
    PoolRuntime(#[from] deadpool_postgres::PoolError),
}

/// Media conversion and validation errors.
///
/// These are terminal per item: a failing attachment is reported and the
/// rest of the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Media file too large: {size} bytes exceeds {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Unrecognized media format: {detail}")]
    UnsupportedKind { detail: String },

    #[error("Image decode failed: {reason}")]
    DecodeFailed { reason: String },

    #[error("Image encode failed: {reason}")]
    EncodeFailed { reason: String },

    #[error("Invalid animated sticker: {reason}")]
    InvalidAnimated { reason: String },

    #[error("Invalid video sticker: {reason}")]
    InvalidVideo { reason: String },

    #[error("Probe failed: {reason}")]
    ProbeFailed { reason: String },

    #[error("Transcode failed: {reason}")]
    TranscodeFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Conversation/session errors.
///
/// Input-validation failures surfaced to the user as a retryable prompt.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Pack title too short: need at least {min} characters")]
    TitleTooShort { min: usize },

    #[error("Not a valid pack reference: {input}")]
    InvalidPackRef { input: String },

    #[error("No media attached")]
    NoMedia,

    #[error("Unexpected event in state {state}: {detail}")]
    UnexpectedEvent { state: String, detail: String },
}

/// Errors from the external messaging/pack platform boundary.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("File too large: {size} bytes exceeds {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported content kind: {detail}")]
    WrongKind { detail: String },

    #[error("Download failed: {reason}")]
    DownloadFailed { reason: String },

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    /// Pack-management API rejection. `code` carries the raw platform error
    /// code for logging; `kind` is the classified cause callers branch on.
    #[error("Platform API error ({kind}): {message}")]
    Api {
        kind: PlatformErrorKind,
        code: Option<String>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PlatformError {
    /// Whether this is the platform's "slug already taken" rejection.
    pub fn is_name_occupied(&self) -> bool {
        matches!(
            self,
            Self::Api {
                kind: PlatformErrorKind::NameOccupied,
                ..
            }
        )
    }
}

/// Pack publishing errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Pack not found: {name}")]
    PackNotFound { name: String },

    #[error("User {user_id} may not edit pack {name}")]
    NotPermitted { user_id: i64, name: String },

    #[error("Platform returned no file id for pack {name} at position {position}")]
    MissingFileId { name: String, position: i32 },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
