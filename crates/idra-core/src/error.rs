//! Error types for idra.

use thiserror::Error;

/// Result type alias using idra's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for idra operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A credential mint/refresh attempt failed. Transient: the previous
    /// credential keeps being served until the next scheduled refresh.
    #[error("Credential mint failed: {0}")]
    CredentialMint(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An image payload could not be fetched or read during upload
    #[error("Image fetch failed: {0}")]
    ImageFetch(String),

    /// The image id is unknown or its record has expired. The two causes
    /// are indistinguishable to callers by design.
    #[error("Image not found or expired: {0}")]
    ImageNotFoundOrExpired(String),

    /// The vector store rejected or failed a query
    #[error("Search backend error: {0}")]
    SearchBackend(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind string, surfaced alongside the message
    /// so callers can distinguish error classes without string matching.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration",
            Error::CredentialMint(_) => "credential_mint",
            Error::Embedding(_) => "embedding",
            Error::ImageFetch(_) => "image_fetch",
            Error::ImageNotFoundOrExpired(_) => "image_not_found_or_expired",
            Error::SearchBackend(_) => "search_backend",
            Error::InvalidInput(_) => "invalid_input",
            Error::Request(_) => "request",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
