mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use loader_core::settings::{
    DEFAULT_BOOT_LOG, DEFAULT_DATA_DIR, DEFAULT_RECHECK_SECS, DEFAULT_RETRY_SECS,
    DEFAULT_TEMPERATURE_FILE,
};
use loader_core::{LoaderSettings, Policy};

#[derive(Parser)]
#[command(
    name = "code-loader",
    about = "Load staged container images and bring up compose stacks at boot",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    loader: LoaderArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run provisioning cycles until interrupted (default)
    Run,

    /// Scan the data directory and show what the next cycle would do
    Plan {
        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LoaderArgs {
    /// Root holding images_to_load/, stacks_to_run/ and stacks_to_load/
    #[arg(long, global = true, env = "LOADER_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Append-only JSON-lines boot log
    #[arg(long, global = true, env = "BOOT_LOG_FILE", default_value = DEFAULT_BOOT_LOG)]
    pub boot_log: PathBuf,

    /// Stacks to pull but never bring up (comma-separated, case-insensitive)
    #[arg(long, global = true, env = "EXCLUDE_RUN", value_delimiter = ',')]
    pub exclude_run: Vec<String>,

    /// Keep archives and load manifests after processing
    #[arg(long, global = true, env = "NO_DELETE", value_parser = FalseyValueParser::new())]
    pub no_delete: bool,

    /// Status endpoint port
    #[arg(long, global = true, env = "STATUS_PORT", default_value_t = 8081)]
    pub port: u16,

    /// Do not serve the status endpoint
    #[arg(long, global = true, env = "DISABLE_STATUS_API", value_parser = FalseyValueParser::new())]
    pub no_status_api: bool,

    /// Print the status snapshot to stdout every second
    #[arg(long, global = true, env = "ENABLE_CONSOLE", value_parser = FalseyValueParser::new())]
    pub console: bool,

    /// Include raw collaborator output in status snapshots
    #[arg(long, global = true, env = "STATUS_INCLUDE_OUTPUT", value_parser = FalseyValueParser::new())]
    pub include_output: bool,

    /// Seconds between cycles after a success
    #[arg(long, global = true, env = "RECHECK_PERIOD_SEC", default_value_t = DEFAULT_RECHECK_SECS)]
    pub recheck_secs: u64,

    /// Seconds before retrying a failed cycle
    #[arg(long, global = true, env = "RECHECK_PERIOD_ON_ERROR_SEC", default_value_t = DEFAULT_RETRY_SECS)]
    pub retry_secs: u64,

    /// Thermal-zone file reporting CPU temperature in millidegrees
    #[arg(long, global = true, env = "CPU_TEMPERATURE_FILE", default_value = DEFAULT_TEMPERATURE_FILE)]
    pub temperature_file: PathBuf,
}

impl LoaderArgs {
    pub fn settings(&self) -> LoaderSettings {
        let mut settings = LoaderSettings::new(&self.data_dir);
        settings.boot_log = self.boot_log.clone();
        settings.policy = Policy::new(&self.exclude_run, !self.no_delete);
        settings.recheck_period = Duration::from_secs(self.recheck_secs);
        settings.retry_period = Duration::from_secs(self.retry_secs);
        settings
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Some(Commands::Plan { .. }) => tracing::Level::WARN,
        Some(Commands::Run) | None => tracing::Level::INFO,
    };

    // stdout belongs to the console reporter and `plan`
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Plan { json }) => cmd::plan::run(&cli.loader, json),
        Some(Commands::Run) | None => cmd::run::run(&cli.loader),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
