//! panelwiki command line
//!
//! Captures dashboard panels for the requested time windows and publishes
//! them to a Confluence page, or republishes earlier run folders.
//!
//! Usage:
//!   panelwiki -w <wiki> -l <login> -p <password> -i <page> -t 'baseline__&from=..&to=..'
//!   panelwiki -g -t '&from=..&to=..'            # capture only
//!   panelwiki -w <wiki> ... -u graphs/run1 graphs/run2   # merge and republish

use anyhow::{Context, Result};
use chrono::Local;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use panelwiki_capture::{
    HttpMonitoringClient, MonitoringClient, RenderApiStrategy, ScreenshotStrategy,
    StrategySelector, WebDriverClient,
};
use panelwiki_config::{
    RawRunArgs, RunParameters, DEFAULT_CONFIG_FILE, DEFAULT_ROOT_FOLDER, DEFAULT_TEST_ID,
    DEFAULT_WEBDRIVER_URL,
};
use panelwiki_core::{ReportPipeline, RunOutcome};
use panelwiki_publish::{ConfluenceClient, Publisher, StorageRenderer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn command() -> Command {
    Command::new("panelwiki")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Capture dashboard panels and publish them to a wiki page")
        .arg(
            Arg::new("wiki_url")
                .short('w')
                .long("wiki_url")
                .help("Confluence base URL (required unless --only_graphs)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_FILE)
                .help("Source configuration file"),
        )
        .arg(
            Arg::new("confluence_ignore_verify_ssl")
                .short('s')
                .long("confluence_ignore_verify_ssl")
                .action(ArgAction::SetTrue)
                .help("Skip TLS verification towards Confluence"),
        )
        .arg(
            Arg::new("confluence_login")
                .short('l')
                .long("confluence_login")
                .env("CONFLUENCE_LOGIN")
                .help("Confluence login"),
        )
        .arg(
            Arg::new("confluence_password")
                .short('p')
                .long("confluence_password")
                .env("CONFLUENCE_PASSWORD")
                .hide_env_values(true)
                .help("Confluence password"),
        )
        .arg(
            Arg::new("confluence_page_id")
                .short('i')
                .long("confluence_page_id")
                .help("Page to update"),
        )
        .arg(
            Arg::new("test_root_folder")
                .short('f')
                .long("test_root_folder")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_ROOT_FOLDER)
                .help("Folder that receives run folders"),
        )
        .arg(
            Arg::new("test_upload_folders")
                .short('u')
                .long("test_upload_folders")
                .value_parser(value_parser!(PathBuf))
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Earlier run folders to republish (merged when several)"),
        )
        .arg(
            Arg::new("graph_width")
                .short('W')
                .long("graph_width")
                .value_parser(value_parser!(u32))
                .help("Image width on the page [default: 1500]"),
        )
        .arg(
            Arg::new("test_id")
                .short('I')
                .long("test_id")
                .default_value(DEFAULT_TEST_ID)
                .allow_hyphen_values(true)
                .help("Run identifier used in the run folder name"),
        )
        .arg(
            Arg::new("threads")
                .short('T')
                .long("threads")
                .value_parser(value_parser!(usize))
                .help("Requested workers; captures always run one at a time [default: 4]"),
        )
        .arg(
            Arg::new("tz")
                .short('z')
                .long("tz")
                .default_value("UTC")
                .help("Timezone for window headings"),
        )
        .arg(
            Arg::new("timestamps")
                .short('t')
                .long("timestamps")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Windows as '<tag>__&from=<ms>&to=<ms>'"),
        )
        .arg(
            Arg::new("only_graphs")
                .short('g')
                .long("only_graphs")
                .action(ArgAction::SetTrue)
                .help("Capture images without publishing"),
        )
        .arg(
            Arg::new("webdriver_url")
                .long("webdriver_url")
                .env("WEBDRIVER_URL")
                .default_value(DEFAULT_WEBDRIVER_URL)
                .help("WebDriver endpoint for screenshot sources"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("More logging (-v debug, -vv trace)"),
        )
}

fn raw_args(matches: &ArgMatches) -> RawRunArgs {
    let string = |id: &str| matches.get_one::<String>(id).cloned();
    let strings = |id: &str| {
        matches
            .get_many::<String>(id)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    RawRunArgs {
        wiki_url: string("wiki_url"),
        config: matches.get_one::<PathBuf>("config").cloned(),
        wiki_ignore_verify_ssl: matches.get_flag("confluence_ignore_verify_ssl"),
        wiki_login: string("confluence_login"),
        wiki_password: string("confluence_password"),
        page_id: string("confluence_page_id"),
        root_folder: matches.get_one::<PathBuf>("test_root_folder").cloned(),
        upload_folders: matches
            .get_many::<PathBuf>("test_upload_folders")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        graph_width: matches.get_one::<u32>("graph_width").copied(),
        test_id: string("test_id"),
        threads: matches.get_one::<usize>("threads").copied(),
        tz: string("tz"),
        timestamps: strings("timestamps"),
        only_graphs: matches.get_flag("only_graphs"),
        webdriver_url: string("webdriver_url"),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn pipeline(params: &RunParameters) -> Result<ReportPipeline> {
    let monitoring: Arc<dyn MonitoringClient> =
        Arc::new(HttpMonitoringClient::new().context("building dashboard client")?);
    let browser = Arc::new(
        WebDriverClient::new(&params.webdriver_url).context("building WebDriver client")?,
    );
    let strategies = StrategySelector::new(
        Arc::new(RenderApiStrategy::new(Arc::clone(&monitoring))),
        Arc::new(ScreenshotStrategy::new(browser)),
    );

    let mut pipeline = ReportPipeline::new(monitoring, strategies);
    if let Some(wiki) = &params.wiki {
        let client = ConfluenceClient::new(wiki).context("building Confluence client")?;
        pipeline = pipeline.with_publisher(Publisher::new(
            Arc::new(client),
            StorageRenderer::new(params.graph_width),
        ));
    }
    Ok(pipeline)
}

fn summarize(outcome: &RunOutcome) {
    let manifest = &outcome.run.manifest;
    tracing::info!(
        "Run folder {}: {} images, {} failed",
        outcome.run.store.root().display(),
        manifest.len(),
        manifest.failure_count()
    );
    for (key, failure) in manifest.failures() {
        tracing::warn!("  {} [{}] {}", key, failure.reason, failure.message);
    }
    if let Some(report) = &outcome.published {
        tracing::info!(
            "Uploaded {} attachments (marker {})",
            report.attachments.len(),
            if report.marker_replaced { "replaced" } else { "absent, body replaced" }
        );
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let params = RunParameters::validate(raw_args(matches)).context("invalid arguments")?;
    let pipeline = pipeline(&params)?;
    let outcome = pipeline
        .run(&params, Local::now())
        .await
        .map_err(|e| {
            if e.is_configuration() {
                tracing::error!("Stopped before capturing anything");
            }
            e
        })?;
    summarize(&outcome);
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = command().get_matches();
    init_tracing(matches.get_count("verbose"));
    tracing::debug!("panelwiki {}", panelwiki_core::VERSION);

    if let Err(e) = run(&matches).await {
        tracing::error!("Run failed: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> RawRunArgs {
        let matches = command()
            .try_get_matches_from(std::iter::once("panelwiki").chain(args.iter().copied()))
            .unwrap();
        raw_args(&matches)
    }

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn defaults_are_applied() {
        let raw = parse(&["-g", "-t", "w__&from=1&to=2"]);
        assert_eq!(raw.config, Some(PathBuf::from(DEFAULT_CONFIG_FILE)));
        assert_eq!(raw.root_folder, Some(PathBuf::from(DEFAULT_ROOT_FOLDER)));
        assert_eq!(raw.graph_width, None);
        assert_eq!(raw.test_id.as_deref(), Some(DEFAULT_TEST_ID));
        assert_eq!(raw.threads, None);
        assert_eq!(raw.tz.as_deref(), Some("UTC"));
        assert!(raw.only_graphs);
        assert!(!raw.wiki_ignore_verify_ssl);
    }

    #[test]
    fn repeated_values_are_collected() {
        let raw = parse(&[
            "-w",
            "https://wiki.example",
            "-i",
            "123",
            "-t",
            "a__&from=1&to=2",
            "b__&from=3&to=4",
            "-u",
            "graphs/one",
            "-u",
            "graphs/two",
            "-W",
            "900",
            "-s",
        ]);
        assert_eq!(raw.timestamps, vec!["a__&from=1&to=2", "b__&from=3&to=4"]);
        assert_eq!(
            raw.upload_folders,
            vec![PathBuf::from("graphs/one"), PathBuf::from("graphs/two")]
        );
        assert_eq!(raw.wiki_url.as_deref(), Some("https://wiki.example"));
        assert_eq!(raw.page_id.as_deref(), Some("123"));
        assert_eq!(raw.graph_width, Some(900));
        assert!(raw.wiki_ignore_verify_ssl);
    }

    #[test]
    fn negative_test_id_is_a_value() {
        let raw = parse(&["-I", "-7", "-g", "-t", "&from=1&to=2"]);
        assert_eq!(raw.test_id.as_deref(), Some("-7"));
    }
}
