//! Publishing errors

use std::path::PathBuf;

/// Failure reported by a wiki client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WikiError {
    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for WikiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors while publishing a document
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Image or extra file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Attachment upload failed
    #[error("uploading attachment '{name}': {source}")]
    Upload {
        /// Attachment name
        name: String,
        /// Underlying error
        #[source]
        source: WikiError,
    },

    /// Page read or update failed
    #[error("updating page {page_id}: {source}")]
    Page {
        /// Page id
        page_id: String,
        /// Underlying error
        #[source]
        source: WikiError,
    },
}
