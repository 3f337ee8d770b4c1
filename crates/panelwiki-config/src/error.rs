//! Configuration errors
//!
//! Every variant is fatal and raised before any network activity.

use std::path::PathBuf;

/// Errors while resolving source configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document is not a YAML mapping of source names to fields
    #[error("invalid configuration document: {0}")]
    Syntax(String),

    /// Required field absent or empty
    #[error("source '{source_name}': missing required field '{field}'")]
    MissingField {
        /// Source name
        source_name: String,
        /// Field name
        field: &'static str,
    },

    /// Field present with the wrong type (e.g. non-numeric width)
    #[error("source '{source_name}': {message}")]
    InvalidField {
        /// Source name
        source_name: String,
        /// Deserializer message
        message: String,
    },

    /// Token configured together with login/password
    #[error("source '{0}': token cannot be combined with login/password")]
    ConflictingAuth(String),

    /// Only one of login/password configured
    #[error("source '{0}': login and password must be given together")]
    IncompleteBasicAuth(String),

    /// Auth enabled but no method configured
    #[error("source '{0}': auth is enabled but no login/password, token or domain is set")]
    NoAuthMethod(String),

    /// Domain auth requested without wiki credentials to pass through
    #[error("source '{0}': domain auth requires wiki credentials")]
    MissingDomainCredentials(String),

    /// Source name contains the attachment name separator `__`
    #[error("source '{0}': name must not contain '__'")]
    ReservedSeparator(String),

    /// Two source names map to the same directory
    #[error("sources '{first}' and '{second}' collide after sanitisation")]
    DuplicateSource {
        /// Earlier source
        first: String,
        /// Later source
        second: String,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(source_name: &str, message: impl ToString) -> Self {
        Self::InvalidField {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Errors while parsing a `--timestamps` value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    /// `&from=` or `&to=` missing
    #[error("window '{raw}': missing '&{bound}=<epoch>'")]
    MissingBound {
        /// Raw CLI value
        raw: String,
        /// `from` or `to`
        bound: &'static str,
    },

    /// Epoch value does not fit or is not representable as a date
    #[error("window '{raw}': epoch value {value} out of range")]
    OutOfRange {
        /// Raw CLI value
        raw: String,
        /// Offending digits
        value: String,
    },

    /// start >= end
    #[error("window '{raw}': start {start_ms} is not before end {end_ms}")]
    EmptyRange {
        /// Raw CLI value
        raw: String,
        /// Start (ms)
        start_ms: i64,
        /// End (ms)
        end_ms: i64,
    },

    /// Unknown IANA timezone
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// Tag contains the attachment name separator `__` after sanitisation
    #[error("window tag '{0}' must not contain '__'")]
    ReservedSeparator(String),

    /// Two different tags map to the same directory
    #[error("window tags '{first}' and '{second}' collide after sanitisation")]
    TagCollision {
        /// Earlier tag
        first: String,
        /// Later tag
        second: String,
    },
}

/// Errors while validating run parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    /// Required parameter absent or empty
    #[error("parameter '{0}' is required")]
    Missing(&'static str),

    /// Neither timestamps nor upload folders given
    #[error("at least one timestamp or upload folder must be provided")]
    NothingToDo,

    /// Config file absent in capture mode
    #[error("configuration file {0} not found")]
    ConfigNotFound(PathBuf),

    /// Malformed window
    #[error(transparent)]
    Window(#[from] WindowError),
}
