//! Run parameters
//!
//! The validated form of the command line. Two modes exist: capture (new
//! windows from `timestamps`) and republish (`upload_folders` from earlier
//! runs). Upload folders win when both are given.

use crate::error::ParameterError;
use crate::source::Credentials;
use crate::window::{parse_timezone, parse_windows, TimeWindow};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Default configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default root folder for runs
pub const DEFAULT_ROOT_FOLDER: &str = "graphs";
/// Default image width on the wiki page
pub const DEFAULT_GRAPH_WIDTH: u32 = 1500;
/// Default run identifier
pub const DEFAULT_TEST_ID: &str = "-1";
/// Default WebDriver endpoint
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
/// Timestamp format of run folder names
pub const RUN_FOLDER_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Raw, unvalidated command-line values
#[derive(Debug, Clone, Default)]
pub struct RawRunArgs {
    /// Wiki base URL
    pub wiki_url: Option<String>,
    /// Source configuration file
    pub config: Option<PathBuf>,
    /// Skip TLS verification towards the wiki
    pub wiki_ignore_verify_ssl: bool,
    /// Wiki login
    pub wiki_login: Option<String>,
    /// Wiki password
    pub wiki_password: Option<String>,
    /// Target page id
    pub page_id: Option<String>,
    /// Root folder for run folders
    pub root_folder: Option<PathBuf>,
    /// Earlier run folders to republish
    pub upload_folders: Vec<PathBuf>,
    /// Image width on the wiki page
    pub graph_width: Option<u32>,
    /// Run identifier
    pub test_id: Option<String>,
    /// Requested worker count
    pub threads: Option<usize>,
    /// Timezone for human-readable window bounds
    pub tz: Option<String>,
    /// `<tag>__&from=..&to=..` values
    pub timestamps: Vec<String>,
    /// Capture only; skip composing and publishing
    pub only_graphs: bool,
    /// WebDriver endpoint for screenshot sources
    pub webdriver_url: Option<String>,
}

/// Where the run gets its images from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Capture new windows
    Capture {
        /// Source configuration file
        config: PathBuf,
        /// Parsed windows in CLI order
        windows: Vec<TimeWindow>,
    },
    /// Republish earlier run folders
    Republish {
        /// Folders in CLI order
        folders: Vec<PathBuf>,
    },
}

/// Wiki connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiTarget {
    /// Base URL without trailing slash
    pub url: String,
    /// Credentials
    pub credentials: Credentials,
    /// Page to update
    pub page_id: String,
    /// Verify TLS certificates
    pub verify_ssl: bool,
}

/// Validated run parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    /// Capture or republish
    pub mode: RunMode,
    /// Wiki target; `None` only with `only_graphs`
    pub wiki: Option<WikiTarget>,
    /// Wiki credentials even without a target, for domain auth
    pub credentials: Option<Credentials>,
    /// Root folder for run folders
    pub root_folder: PathBuf,
    /// Image width on the wiki page
    pub graph_width: u32,
    /// Run identifier
    pub test_id: String,
    /// Requested worker count (reported, capped by policy)
    pub threads: usize,
    /// Timezone name
    pub tz: String,
    /// Capture only
    pub only_graphs: bool,
    /// WebDriver endpoint
    pub webdriver_url: String,
}

impl RunParameters {
    /// Validate raw arguments
    ///
    /// # Errors
    /// Returns [`ParameterError`] when a required value is missing, no work
    /// was requested, a window is malformed, or the config file is absent in
    /// capture mode.
    pub fn validate(raw: RawRunArgs) -> Result<Self, ParameterError> {
        let tz = raw.tz.unwrap_or_else(|| "UTC".to_string());
        let zone = parse_timezone(&tz)?;

        let credentials = match (non_empty(raw.wiki_login), non_empty(raw.wiki_password)) {
            (Some(login), Some(password)) => Some(Credentials::new(login, password)),
            (None, _) if !raw.only_graphs => return Err(ParameterError::Missing("confluence_login")),
            (_, None) if !raw.only_graphs => {
                return Err(ParameterError::Missing("confluence_password"))
            }
            _ => None,
        };

        let wiki = if raw.only_graphs {
            None
        } else {
            let url = non_empty(raw.wiki_url).ok_or(ParameterError::Missing("wiki_url"))?;
            let page_id =
                non_empty(raw.page_id).ok_or(ParameterError::Missing("confluence_page_id"))?;
            let credentials = credentials
                .clone()
                .ok_or(ParameterError::Missing("confluence_login"))?;
            Some(WikiTarget {
                url: url.trim_end_matches('/').to_string(),
                credentials,
                page_id,
                verify_ssl: !raw.wiki_ignore_verify_ssl,
            })
        };

        let mode = if !raw.upload_folders.is_empty() {
            if !raw.timestamps.is_empty() {
                tracing::warn!("Upload folders given; ignoring {} timestamps", raw.timestamps.len());
            }
            RunMode::Republish {
                folders: raw.upload_folders,
            }
        } else if raw.timestamps.is_empty() {
            return Err(ParameterError::NothingToDo);
        } else {
            let config = raw
                .config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            if !config.is_file() {
                return Err(ParameterError::ConfigNotFound(config));
            }
            RunMode::Capture {
                config,
                windows: parse_windows(&raw.timestamps, zone)?,
            }
        };

        Ok(Self {
            mode,
            wiki,
            credentials,
            root_folder: raw
                .root_folder
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_FOLDER)),
            graph_width: raw.graph_width.unwrap_or(DEFAULT_GRAPH_WIDTH),
            test_id: non_empty(raw.test_id).unwrap_or_else(|| DEFAULT_TEST_ID.to_string()),
            threads: raw.threads.unwrap_or(4),
            tz,
            only_graphs: raw.only_graphs,
            webdriver_url: non_empty(raw.webdriver_url)
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
        })
    }

    /// Folder for a run started at `started`
    #[must_use]
    pub fn run_folder(&self, started: DateTime<Local>) -> PathBuf {
        run_folder(&self.root_folder, &self.test_id, started)
    }
}

/// `{root}/{test_id}__{%Y-%m-%d_%H-%M-%S}`
#[must_use]
pub fn run_folder(root: &Path, test_id: &str, started: DateTime<Local>) -> PathBuf {
    root.join(format!(
        "{test_id}__{}",
        started.format(RUN_FOLDER_TIME_FORMAT)
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn capture_args(config: &Path) -> RawRunArgs {
        RawRunArgs {
            wiki_url: Some("https://wiki.example/".into()),
            config: Some(config.to_path_buf()),
            wiki_login: Some("user@corp".into()),
            wiki_password: Some("pw".into()),
            page_id: Some("12345".into()),
            timestamps: vec!["base__&from=1700000000000&to=1700003600000".into()],
            ..RawRunArgs::default()
        }
    }

    #[test]
    fn capture_defaults() {
        let config = NamedTempFile::new().unwrap();
        let params = RunParameters::validate(capture_args(config.path())).unwrap();

        let wiki = params.wiki.as_ref().unwrap();
        assert_eq!(wiki.url, "https://wiki.example");
        assert_eq!(wiki.page_id, "12345");
        assert!(wiki.verify_ssl);
        assert_eq!(params.root_folder, PathBuf::from("graphs"));
        assert_eq!(params.graph_width, 1500);
        assert_eq!(params.test_id, "-1");
        assert_eq!(params.threads, 4);
        assert_eq!(params.tz, "UTC");
        assert_eq!(params.webdriver_url, "http://localhost:4444");
        match params.mode {
            RunMode::Capture { windows, .. } => assert_eq!(windows[0].tag, "base"),
            RunMode::Republish { .. } => panic!("expected capture mode"),
        }
    }

    #[test]
    fn wiki_values_required_unless_only_graphs() {
        let config = NamedTempFile::new().unwrap();

        let mut args = capture_args(config.path());
        args.page_id = None;
        assert_eq!(
            RunParameters::validate(args.clone()),
            Err(ParameterError::Missing("confluence_page_id"))
        );

        args.wiki_password = None;
        assert_eq!(
            RunParameters::validate(args.clone()),
            Err(ParameterError::Missing("confluence_password"))
        );

        args.only_graphs = true;
        args.wiki_url = None;
        let params = RunParameters::validate(args).unwrap();
        assert!(params.wiki.is_none());
        assert!(params.credentials.is_none());
    }

    #[test]
    fn needs_work_and_config() {
        let config = NamedTempFile::new().unwrap();
        let mut args = capture_args(config.path());
        args.timestamps.clear();
        assert_eq!(
            RunParameters::validate(args.clone()),
            Err(ParameterError::NothingToDo)
        );

        args.timestamps = vec!["&from=1&to=2".into()];
        args.config = Some(PathBuf::from("/definitely/not/here.yaml"));
        assert!(matches!(
            RunParameters::validate(args),
            Err(ParameterError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn upload_folders_select_republish() {
        let mut args = capture_args(Path::new("/missing.yaml"));
        args.upload_folders = vec![PathBuf::from("graphs/a"), PathBuf::from("graphs/b")];
        let params = RunParameters::validate(args).unwrap();
        assert_eq!(
            params.mode,
            RunMode::Republish {
                folders: vec![PathBuf::from("graphs/a"), PathBuf::from("graphs/b")]
            }
        );
    }

    #[test]
    fn run_folder_name() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            run_folder(Path::new("graphs"), "42", started),
            PathBuf::from("graphs/42__2024-03-09_14-05-07")
        );
    }
}
