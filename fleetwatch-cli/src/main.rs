mod commands;
mod error;
mod tui;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use fleetwatch_core::client::{HttpMonitoringApi, MonitoringApi};
use fleetwatch_core::config::{load_file_config, Overrides, Settings};
use fleetwatch_core::snapshot::SnapshotMonitoringApi;
use fleetwatch_core::types::parse_report_date;

use crate::error::CliResult;
use crate::tui::run_tui;

#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(about = "Fleet vehicle monitoring dashboard", long_about = None)]
struct Cli {
    #[arg(long, env = "FLEETWATCH_BASE_URL", global = true)]
    base_url: Option<String>,
    #[arg(long, env = "FLEETWATCH_SESSION_TOKEN", global = true)]
    session_token: Option<String>,
    #[arg(long, env = "FLEETWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Serve data from a directory written by `fleetwatch snapshot`.
    #[arg(long, env = "FLEETWATCH_SNAPSHOT_DIR", global = true)]
    snapshot_dir: Option<PathBuf>,
    #[arg(long, env = "FLEETWATCH_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Interactive dashboard (default).
    Tui(QueryArgs),
    /// Print the fleets known to the backend.
    Orgs,
    /// Print one page of monitoring records with summary counters.
    List(ListArgs),
    /// Download the spreadsheet export, or write the filtered records as CSV.
    Export(ExportArgs),
    /// Upload an alert-record spreadsheet.
    Import { file: PathBuf },
    /// Capture the backend responses into a directory for offline use.
    Snapshot {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        out_dir: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct QueryArgs {
    /// Organization id; all fleets when omitted.
    #[arg(long)]
    org: Option<String>,
    /// Report date as yyyy-MM-dd; today when omitted.
    #[arg(long, value_parser = parse_date_arg)]
    date: Option<NaiveDate>,
}

impl QueryArgs {
    fn report_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Args, Debug, Clone)]
struct ListArgs {
    #[command(flatten)]
    query: QueryArgs,
    #[arg(long)]
    search: Option<String>,
    #[arg(long, default_value = "1")]
    page: String,
    #[arg(long)]
    page_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct ExportArgs {
    #[command(flatten)]
    query: QueryArgs,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Write the records locally as CSV instead of asking the backend.
    #[arg(long)]
    csv: bool,
    #[arg(long)]
    search: Option<String>,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_report_date(value).map_err(|err| err.to_string())
}

fn main() -> CliResult<()> {
    init_logging()?;

    let cli = Cli::parse();
    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| Command::Tui(QueryArgs::default()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let page_size = match &command {
        Command::List(args) => args.page_size,
        _ => None,
    };
    let file_config = load_file_config(cli.config.as_deref())?;
    let settings = Settings::resolve(
        file_config,
        Overrides {
            base_url: cli.base_url.clone(),
            session_token: cli.session_token.clone(),
            timeout_secs: cli.timeout_secs,
            page_size,
        },
    );

    let api: Arc<dyn MonitoringApi> = if let Some(snapshot_dir) = &cli.snapshot_dir {
        Arc::new(SnapshotMonitoringApi::from_dir(snapshot_dir.clone())?)
    } else {
        Arc::new(HttpMonitoringApi::try_new(&settings)?)
    };

    match command {
        Command::Tui(query) => {
            let token = CancellationToken::new();
            run_tui(
                &runtime,
                api,
                &settings,
                query.org.clone(),
                query.report_date(),
                token,
            )
        }
        Command::Orgs => runtime.block_on(commands::print_organizations(api, &settings)),
        Command::List(args) => runtime.block_on(commands::list(
            api,
            &settings,
            commands::ListRequest {
                organization_id: args.query.org.clone(),
                report_date: args.query.report_date(),
                search: args.search.unwrap_or_default(),
                page: args.page,
            },
        )),
        Command::Export(args) => runtime.block_on(commands::export(
            api,
            &settings,
            commands::ExportRequest {
                organization_id: args.query.org.clone(),
                report_date: args.query.report_date(),
                search: args.search.unwrap_or_default(),
                out_dir: args.out_dir,
                csv: args.csv,
            },
        )),
        Command::Import { file } => runtime.block_on(commands::import(api, &settings, &file)),
        Command::Snapshot { query, out_dir } => runtime.block_on(commands::snapshot(
            api,
            &settings,
            query.org.clone(),
            query.report_date(),
            &out_dir,
        )),
    }
}

const DEFAULT_LOG_FILTER: &str = "info";

/// Destination named by `FLEETWATCH_LOG`.
#[derive(Debug, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    Stdout,
    File(PathBuf),
    /// Per-user state directory, or nowhere when it cannot be opened.
    Default,
}

impl LogTarget {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => LogTarget::Default,
            Some("stderr") => LogTarget::Stderr,
            Some("stdout") => LogTarget::Stdout,
            Some(path) => LogTarget::File(PathBuf::from(path)),
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
/// Logs never go to the terminal by default since the dashboard owns it.
fn init_logging() -> CliResult<()> {
    let target = LogTarget::from_env_value(std::env::var("FLEETWATCH_LOG").ok().as_deref());
    let (writer, ansi) = match target {
        LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogTarget::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogTarget::File(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(&path)?)), false),
        LogTarget::Default => {
            let file = default_log_path().and_then(|path| open_log_file(&path).ok());
            match file {
                Some(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
                None => (BoxMakeWriter::new(std::io::sink), false),
            }
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .init();
    Ok(())
}

fn default_log_path() -> Option<PathBuf> {
    let state_dir = match std::env::var_os("XDG_STATE_HOME").filter(|dir| !dir.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None if cfg!(target_os = "macos") => {
            PathBuf::from(std::env::var_os("HOME")?).join("Library/Logs")
        }
        None => PathBuf::from(std::env::var_os("HOME")?).join(".local/state"),
    };
    Some(state_dir.join("fleetwatch").join("fleetwatch.log"))
}

fn open_log_file(path: &Path) -> CliResult<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?)
}
