//! Source configuration resolver
//!
//! Turns the YAML mapping `name → fields` into typed, defaulted
//! [`SourceSpec`] records in declaration order.

use crate::error::ConfigError;
use indexmap::IndexMap;
use panelwiki_artifact::{sanitize_component, KEY_SEPARATOR};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default panel width in pixels
pub const DEFAULT_WIDTH: u32 = 1920;
/// Default panel height in pixels
pub const DEFAULT_HEIGHT: u32 = 1080;
/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default snapshot creation timeout in seconds
pub const DEFAULT_SNAPSHOT_TIMEOUT_SECS: u64 = 30;
/// Default browser preload delay in seconds
pub const DEFAULT_DRIVER_PRELOAD_SECS: f64 = 2.5;
/// Default (unused) worker count
pub const DEFAULT_THREADS: usize = 4;
/// Default organisation id
pub const DEFAULT_ORG_ID: u64 = 1;

/// A secret string whose `Debug` output is redacted
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Login/password pair used for the wiki and for domain pass-through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login (may be an e-mail address)
    pub login: String,
    /// Password
    pub password: Secret,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: Secret::new(password),
        }
    }
}

/// How panel images are acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionMode {
    /// Server-side render endpoint
    Render,
    /// Headless browser element screenshot
    Screenshot,
}

/// Effective authentication for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// No credentials sent
    None,
    /// Login and password from the source config
    Basic {
        /// Login
        login: String,
        /// Password
        password: Secret,
    },
    /// API token sent as a bearer header
    Token(Secret),
    /// Wiki credentials passed through (login truncated at `@`)
    Domain {
        /// Login
        login: String,
        /// Password
        password: Secret,
    },
}

impl AuthMode {
    /// Short label for logs and session keys
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic { .. } => "basic",
            Self::Token(_) => "token",
            Self::Domain { .. } => "domain",
        }
    }

    /// Login the mode authenticates as, if any
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        match self {
            Self::Basic { login, .. } | Self::Domain { login, .. } => Some(login),
            Self::None | Self::Token(_) => None,
        }
    }
}

/// One monitoring-dashboard source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    /// Unique name; display label and directory name
    pub name: String,
    /// Dashboard title to search for
    pub dash_title: String,
    /// Base URL without trailing slash
    pub host: String,
    /// Panel width in pixels
    pub width: u32,
    /// Panel height in pixels
    pub height: u32,
    /// Acquisition mode (`render: false` selects screenshots)
    pub mode: AcquisitionMode,
    /// Effective authentication
    pub auth: AuthMode,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// Dashboard template variables, in declaration order
    pub vars: IndexMap<String, String>,
    /// Organisation id
    pub org_id: u64,
    /// Folder title used to disambiguate dashboards
    pub folder: Option<String>,
    /// Timezone passed to the server
    pub tz: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Delay after page load before polling for the panel
    pub driver_preload: Duration,
    /// Parsed for compatibility; acquisition is sequential
    pub threads: usize,
    /// Light theme instead of dark
    pub white_theme: bool,
    /// Create dashboard snapshots per window
    pub snapshot: bool,
    /// Snapshot creation timeout
    pub snapshot_timeout: Duration,
}

impl SourceSpec {
    /// Create a source with every optional field at its default
    #[must_use]
    pub fn new(name: impl Into<String>, dash_title: impl Into<String>, host: &str) -> Self {
        Self {
            name: name.into(),
            dash_title: dash_title.into(),
            host: host.trim_end_matches('/').to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            mode: AcquisitionMode::Render,
            auth: AuthMode::None,
            verify_ssl: true,
            vars: IndexMap::new(),
            org_id: DEFAULT_ORG_ID,
            folder: None,
            tz: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            driver_preload: Duration::from_secs_f64(DEFAULT_DRIVER_PRELOAD_SECS),
            threads: DEFAULT_THREADS,
            white_theme: false,
            snapshot: false,
            snapshot_timeout: Duration::from_secs(DEFAULT_SNAPSHOT_TIMEOUT_SECS),
        }
    }

    /// Theme parameter value
    #[inline]
    #[must_use]
    pub fn theme(&self) -> &'static str {
        if self.white_theme {
            "light"
        } else {
            "dark"
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSource {
    dash_title: Option<String>,
    host: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    render: Option<bool>,
    timeout: Option<u64>,
    threads: Option<usize>,
    vars: Option<IndexMap<String, serde_yaml::Value>>,
    white_theme: Option<bool>,
    #[serde(rename = "orgId")]
    org_id: Option<u64>,
    login: Option<String>,
    password: Option<String>,
    token: Option<String>,
    auth: Option<bool>,
    domain: Option<bool>,
    verify_ssl: Option<bool>,
    folder: Option<String>,
    tz: Option<String>,
    #[serde(alias = "chrome_driver_preload_time")]
    firefox_driver_preload_time: Option<f64>,
    snapshot: Option<bool>,
    snapshot_timeout: Option<u64>,
}

/// Read and resolve a configuration file
///
/// # Errors
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
/// errors of [`resolve`].
pub fn load(
    path: &Path,
    domain_credentials: Option<&Credentials>,
) -> Result<IndexMap<String, SourceSpec>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
    tracing::info!("Loading source configuration from {}", path.display());
    resolve(&raw, domain_credentials)
}

/// Resolve a YAML document into sources, in declaration order
///
/// `domain_credentials` are the wiki credentials used by sources with
/// `domain: true`.
///
/// # Errors
/// Returns [`ConfigError`] on missing required fields, wrongly typed fields,
/// inconsistent auth settings or colliding source names.
pub fn resolve(
    raw_yaml: &str,
    domain_credentials: Option<&Credentials>,
) -> Result<IndexMap<String, SourceSpec>, ConfigError> {
    if raw_yaml.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    let document: IndexMap<String, serde_yaml::Value> =
        serde_yaml::from_str(raw_yaml).map_err(|e| ConfigError::Syntax(e.to_string()))?;

    let mut sources = IndexMap::with_capacity(document.len());
    let mut dir_names: HashMap<String, String> = HashMap::new();

    for (name, value) in document {
        let dir = sanitize_component(&name).to_lowercase();
        if dir.contains(KEY_SEPARATOR) {
            return Err(ConfigError::ReservedSeparator(name));
        }
        if let Some(first) = dir_names.get(&dir) {
            return Err(ConfigError::DuplicateSource {
                first: first.clone(),
                second: name,
            });
        }
        dir_names.insert(dir, name.clone());

        let raw: RawSource = if value.is_null() {
            RawSource::default()
        } else {
            serde_yaml::from_value(value).map_err(|e| ConfigError::invalid(&name, e))?
        };
        let spec = resolve_source(&name, raw, domain_credentials)?;
        tracing::debug!(
            "Resolved source '{}' ({:?}, auth {})",
            spec.name,
            spec.mode,
            spec.auth.label()
        );
        sources.insert(name, spec);
    }

    Ok(sources)
}

fn resolve_source(
    name: &str,
    raw: RawSource,
    domain_credentials: Option<&Credentials>,
) -> Result<SourceSpec, ConfigError> {
    let dash_title = required(name, "dash_title", raw.dash_title)?;
    let host = required(name, "host", raw.host)?;
    let mut spec = SourceSpec::new(name, dash_title, &host);
    if spec.host.is_empty() {
        return Err(ConfigError::MissingField {
            source_name: name.to_string(),
            field: "host",
        });
    }

    if let Some(width) = raw.width {
        spec.width = positive(name, "width", width)?;
    }
    if let Some(height) = raw.height {
        spec.height = positive(name, "height", height)?;
    }
    if raw.render == Some(false) {
        spec.mode = AcquisitionMode::Screenshot;
    }
    if let Some(timeout) = raw.timeout {
        spec.timeout = positive_secs(name, "timeout", timeout)?;
    }
    if let Some(preload) = raw.firefox_driver_preload_time {
        if !preload.is_finite() || preload < 0.0 {
            return Err(ConfigError::invalid(
                name,
                format!("firefox_driver_preload_time must be a non-negative number, got {preload}"),
            ));
        }
        spec.driver_preload = Duration::from_secs_f64(preload);
    }
    if let Some(snapshot_timeout) = raw.snapshot_timeout {
        spec.snapshot_timeout = positive_secs(name, "snapshot_timeout", snapshot_timeout)?;
    }
    spec.threads = raw.threads.unwrap_or(DEFAULT_THREADS);
    spec.white_theme = raw.white_theme.unwrap_or(false);
    spec.org_id = raw.org_id.unwrap_or(DEFAULT_ORG_ID);
    spec.verify_ssl = raw.verify_ssl.unwrap_or(true);
    spec.snapshot = raw.snapshot.unwrap_or(false);
    spec.folder = non_empty(raw.folder);
    spec.tz = non_empty(raw.tz);

    if let Some(vars) = raw.vars {
        for (key, value) in vars {
            let value = scalar_to_string(&value).ok_or_else(|| {
                ConfigError::invalid(name, format!("vars.{key} must be a scalar value"))
            })?;
            spec.vars.insert(key, value);
        }
    }

    spec.auth = resolve_auth(
        name,
        raw.auth.unwrap_or(true),
        raw.domain.unwrap_or(false),
        non_empty(raw.login),
        non_empty(raw.password),
        non_empty(raw.token),
        domain_credentials,
    )?;

    Ok(spec)
}

fn resolve_auth(
    name: &str,
    enabled: bool,
    domain: bool,
    login: Option<String>,
    password: Option<String>,
    token: Option<String>,
    domain_credentials: Option<&Credentials>,
) -> Result<AuthMode, ConfigError> {
    if !enabled {
        return Ok(AuthMode::None);
    }
    if domain {
        let creds =
            domain_credentials.ok_or_else(|| ConfigError::MissingDomainCredentials(name.into()))?;
        let login = creds.login.split('@').next().unwrap_or_default();
        if login.is_empty() || creds.password.expose().is_empty() {
            return Err(ConfigError::MissingDomainCredentials(name.into()));
        }
        return Ok(AuthMode::Domain {
            login: login.to_string(),
            password: creds.password.clone(),
        });
    }
    if token.is_some() && (login.is_some() || password.is_some()) {
        return Err(ConfigError::ConflictingAuth(name.into()));
    }
    match (login, password, token) {
        (Some(login), Some(password), None) => Ok(AuthMode::Basic {
            login,
            password: Secret::new(password),
        }),
        (None, None, Some(token)) => Ok(AuthMode::Token(Secret::new(token))),
        (None, None, None) => Err(ConfigError::NoAuthMethod(name.into())),
        _ => Err(ConfigError::IncompleteBasicAuth(name.into())),
    }
}

fn required(name: &str, field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    non_empty(value).ok_or_else(|| ConfigError::MissingField {
        source_name: name.to_string(),
        field,
    })
}

fn positive(name: &str, field: &str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        Err(ConfigError::invalid(name, format!("{field} must be positive")))
    } else {
        Ok(value)
    }
}

fn positive_secs(name: &str, field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        Err(ConfigError::invalid(name, format!("{field} must be at least one second")))
    } else {
        Ok(Duration::from_secs(secs))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
