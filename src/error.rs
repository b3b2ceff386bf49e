use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while locating credentials, fetching project data,
/// or emitting a download
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Authentication token not found. Make sure you are logged in and reload the page")]
    NoToken,

    #[error("Project ID not found")]
    NoProjectId,

    #[error("Authentication failed ({status}). Try refreshing or logging in again")]
    AuthFailed { status: u16 },

    #[error("API error: {status}. Please retry shortly")]
    Api { status: u16 },

    #[error("Network error: {0}. Please retry")]
    Transport(#[from] reqwest::Error),

    #[error("No usable project data: {message}")]
    EmptyOrMalformedData { message: String },

    #[error("Archive codec not available. Provision it and retry")]
    CodecUnavailable,

    #[error("Archive creation error: {message}")]
    Codec { message: String },

    #[error("Item not downloadable: {path}")]
    NotDownloadable { path: String },

    #[error("Project data is still loading. Retry in a moment")]
    Busy,

    #[error("Download error: {message}")]
    EmissionFailed { message: String },

    #[error("Failed to communicate with the page: {message}")]
    Bridge { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification carried in structured results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NoToken,
    NoProjectId,
    AuthFailed,
    ApiError,
    TransportError,
    EmptyOrMalformedData,
    CodecUnavailable,
    NotDownloadable,
    Busy,
    EmissionFailed,
    InvalidConfig,
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::NoToken => ErrorKind::NoToken,
            DownloadError::NoProjectId => ErrorKind::NoProjectId,
            DownloadError::AuthFailed { .. } => ErrorKind::AuthFailed,
            DownloadError::Api { .. } => ErrorKind::ApiError,
            DownloadError::Transport(_) => ErrorKind::TransportError,
            DownloadError::EmptyOrMalformedData { .. } => ErrorKind::EmptyOrMalformedData,
            DownloadError::CodecUnavailable => ErrorKind::CodecUnavailable,
            // codec failures surface as a failed save
            DownloadError::Codec { .. } => ErrorKind::EmissionFailed,
            DownloadError::NotDownloadable { .. } => ErrorKind::NotDownloadable,
            DownloadError::Busy => ErrorKind::Busy,
            DownloadError::EmissionFailed { .. } => ErrorKind::EmissionFailed,
            DownloadError::Bridge { .. } => ErrorKind::TransportError,
            DownloadError::Io(_) => ErrorKind::EmissionFailed,
            DownloadError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            DownloadError::Serialization(_) => ErrorKind::EmptyOrMalformedData,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        DownloadError::EmptyOrMalformedData {
            message: message.into(),
        }
    }
}

/// Result type alias for download operations
pub type Result<T> = std::result::Result<T, DownloadError>;
