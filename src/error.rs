//! Error types for the meme client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading templates or rendering memes
#[derive(Error, Debug)]
pub enum Error {
    /// The remote call failed (connection, status code, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// The catalog payload could not be decoded
    #[error("Failed to parse catalog: {0}")]
    Parse(String),

    /// The render endpoint did not produce a decodable image
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Invalid configuration (bad endpoint URL etc.)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No template with the given id in the loaded catalog
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// The selected template has no field with this key
    #[error("Unknown form field: {0}")]
    UnknownField(String),

    /// An operation needing a selected template ran without one
    #[error("No template selected")]
    NoTemplateSelected,

    /// Download was requested before any image was shown
    #[error("Nothing to download, generate a meme first")]
    NothingToDownload,

    /// Filesystem error while saving an image
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures of the catalog load (network or decoding).
    pub fn is_catalog_load(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Parse(_))
    }

    /// True when a render attempt failed to produce an image.
    pub fn is_render(&self) -> bool {
        matches!(self, Error::Render(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("bad endpoint URL: {}", err))
    }
}
