//! Error types for Multiview Core

use thiserror::Error;

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Dashboard error types
#[derive(Error, Debug)]
pub enum Error {
    // Catalog errors
    #[error("Failed to fetch stream catalog: {0}")]
    CatalogFetch(String),

    #[error("Failed to decode stream catalog: {0}")]
    CatalogDecode(String),

    #[error("Invalid stream locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    // Engine errors
    #[error("Source not playable by {engine}: {url}")]
    UnsupportedSource { engine: String, url: String },

    #[error("Playback command '{command}' rejected: {reason}")]
    PlaybackCommand { command: &'static str, reason: String },

    // Session errors
    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a rejected playback command error
    pub fn command(command: &'static str, reason: impl Into<String>) -> Self {
        Error::PlaybackCommand {
            command,
            reason: reason.into(),
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::PlaybackCommand { .. } | Error::CatalogFetch(_) => true,
            #[cfg(feature = "http")]
            Error::Network(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error only concerns a single tile of the grid
    pub fn is_session_local(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedSource { .. }
                | Error::PlaybackCommand { .. }
                | Error::InvalidStateTransition { .. }
                | Error::InvalidLocator { .. }
        )
    }

    /// Returns the error code surfaced to the presentation shell
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::CatalogFetch(_) => "CATALOG_FETCH",
            Error::CatalogDecode(_) => "CATALOG_DECODE",
            Error::InvalidLocator { .. } => "INVALID_LOCATOR",
            Error::UnsupportedSource { .. } => "UNSUPPORTED_SOURCE",
            Error::PlaybackCommand { .. } => "PLAYBACK_COMMAND",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::UnknownSession(_) => "UNKNOWN_SESSION",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            #[cfg(feature = "http")]
            Error::Network(_) => "NETWORK",
            Error::Io(_) => "IO",
            Error::Json(_) => "JSON",
        }
    }
}
