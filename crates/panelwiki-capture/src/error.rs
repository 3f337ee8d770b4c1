//! Capture errors
//!
//! [`ClientError`] is what the boundary traits report; strategies turn it
//! into an [`AcquisitionError`] that the pipeline records per artifact key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure reported by a monitoring or browser client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Request exceeded its time budget
    #[error("timed out: {0}")]
    Timeout(String),

    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors while resolving a dashboard and its panels
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnumerationError {
    /// No dashboard with the exact title (in the folder, if set)
    #[error("dashboard '{title}' not found on {host}")]
    DashboardNotFound {
        /// Requested title
        title: String,
        /// Server
        host: String,
    },

    /// Several dashboards share the title and no folder disambiguates
    #[error("dashboard '{title}' is ambiguous: found in folders {folders:?}; set 'folder'")]
    AmbiguousDashboard {
        /// Requested title
        title: String,
        /// Folder titles of the matches
        folders: Vec<String>,
    },

    /// Dashboard model lacks required structure
    #[error("dashboard '{title}' has a malformed model: {message}")]
    MalformedModel {
        /// Requested title
        title: String,
        /// What was wrong
        message: String,
    },

    /// Client failure while searching or fetching
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Why a capture produced no image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionReason {
    /// Time budget exceeded
    Timeout,
    /// Credentials rejected or login not completed
    Auth,
    /// Non-success status or non-image body
    HttpStatus,
    /// Browser automation failure
    Driver,
}

impl AcquisitionReason {
    /// Stable lowercase name recorded in manifests and run records
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::HttpStatus => "http_status",
            Self::Driver => "driver",
        }
    }
}

impl fmt::Display for AcquisitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed capture
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct AcquisitionError {
    /// Failure class
    pub reason: AcquisitionReason,
    /// HTTP status when one was received
    pub status: Option<u16>,
    /// Detail
    pub message: String,
}

impl AcquisitionError {
    /// Create an error without status
    #[must_use]
    pub fn new(reason: AcquisitionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            status: None,
            message: message.into(),
        }
    }

    /// Timeout error
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(AcquisitionReason::Timeout, message)
    }

    /// Auth error
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(AcquisitionReason::Auth, message)
    }

    /// Driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(AcquisitionReason::Driver, message)
    }

    /// Status error
    #[must_use]
    pub fn http_status(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            reason: AcquisitionReason::HttpStatus,
            status,
            message: message.into(),
        }
    }
}

impl From<ClientError> for AcquisitionError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status, message } if status == 401 || status == 403 => Self {
                reason: AcquisitionReason::Auth,
                status: Some(status),
                message,
            },
            ClientError::Status { status, message } => Self::http_status(Some(status), message),
            ClientError::Timeout(message) => Self::timeout(message),
            ClientError::Transport(message) | ClientError::Decode(message) => {
                Self::http_status(None, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let auth: AcquisitionError = ClientError::Status {
            status: 401,
            message: "Unauthorized".into(),
        }
        .into();
        assert_eq!(auth.reason, AcquisitionReason::Auth);
        assert_eq!(auth.status, Some(401));

        let forbidden: AcquisitionError = ClientError::Status {
            status: 403,
            message: String::new(),
        }
        .into();
        assert_eq!(forbidden.reason, AcquisitionReason::Auth);

        let server: AcquisitionError = ClientError::Status {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert_eq!(server.reason, AcquisitionReason::HttpStatus);
        assert_eq!(server.status, Some(502));
        assert_eq!(server.to_string(), "http_status (HTTP 502): bad gateway");

        let slow: AcquisitionError = ClientError::Timeout("30s".into()).into();
        assert_eq!(slow.reason, AcquisitionReason::Timeout);
        assert_eq!(slow.to_string(), "timeout: 30s");
    }
}
