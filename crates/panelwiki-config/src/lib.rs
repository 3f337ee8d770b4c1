//! panelwiki configuration
//!
//! - [`resolve`] / [`load`]: YAML source configuration into [`SourceSpec`]s
//! - [`TimeWindow`]: tagged epoch ranges from the command line
//! - [`RunParameters`]: validated command line
//!
//! Everything here is pure validation; nothing touches the network.

#![warn(unreachable_pub)]

mod error;
mod run;
mod source;
mod window;

pub use error::{ConfigError, ParameterError, WindowError};
pub use run::{
    run_folder, RawRunArgs, RunMode, RunParameters, WikiTarget, DEFAULT_CONFIG_FILE,
    DEFAULT_GRAPH_WIDTH, DEFAULT_ROOT_FOLDER, DEFAULT_TEST_ID, DEFAULT_WEBDRIVER_URL,
    RUN_FOLDER_TIME_FORMAT,
};
pub use source::{
    load, resolve, AcquisitionMode, AuthMode, Credentials, Secret, SourceSpec, DEFAULT_HEIGHT,
    DEFAULT_WIDTH,
};
pub use window::{parse_timezone, parse_windows, TimeWindow, HUMAN_TIME_FORMAT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
