//! Error types for Castlane

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CastlaneError>;

#[derive(Error, Debug)]
pub enum CastlaneError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CastlaneError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CastlaneError::InvalidInput(_) | CastlaneError::NotFound(_) => 3,
            CastlaneError::Config(_) | CastlaneError::Database(_) => 2,
            CastlaneError::Platform(PlatformError::Configuration(_)) => 2,
            CastlaneError::Platform(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

/// Failures raised while dispatching content to a platform.
///
/// None of these are retried automatically. A failed dispatch has to be
/// re-triggered by a fresh schedule or an explicit "post now".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Missing credential or identifier, detected before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Content lacks something the platform requires (e.g. media for Instagram).
    #[error("Content validation failed: {0}")]
    Validation(String),

    /// The platform answered with a non-success HTTP status.
    #[error("Remote API error ({status}): {message}")]
    RemoteApi { status: u16, message: String },

    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A multi-post submission failed after some posts were already live.
    #[error("{cause} (already published: {ids})", ids = .posted.join(", "))]
    PartialThread {
        posted: Vec<String>,
        cause: Box<PlatformError>,
    },
}

impl PlatformError {
    /// Remote HTTP status, when the platform answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PlatformError::RemoteApi { status, .. } => Some(*status),
            PlatformError::PartialThread { cause, .. } => cause.status_code(),
            _ => None,
        }
    }

    /// Ids of posts that went live before the failure
    pub fn posted_ids(&self) -> &[String] {
        match self {
            PlatformError::PartialThread { posted, .. } => posted,
            _ => &[],
        }
    }
}
