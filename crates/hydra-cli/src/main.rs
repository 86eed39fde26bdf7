//! hydra-cli - operator tool for the hydra service registry

use clap::{Parser, Subcommand};
use hydra_registry::Settings;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod session;

use session::Session;

#[derive(Parser)]
#[command(name = "hydra-cli")]
#[command(about = "Inspect and manage a hydra service registry")]
#[command(version)]
struct Cli {
    /// Profile state file
    #[arg(long, global = true, env = "HYDRA_CLI_STATE")]
    state_file: Option<PathBuf>,

    /// Seconds to wait for the registry to answer
    #[arg(long, global = true, value_name = "SECS")]
    connect_timeout: Option<u64>,

    /// Nodes updated within this many seconds count as active
    #[arg(long, global = true, value_name = "SECS")]
    active_threshold: Option<u64>,

    /// Nodes silent for longer than this many seconds are stale
    #[arg(long, global = true, value_name = "SECS")]
    stale_threshold: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a connection profile, or `config list`
    Config {
        /// Profile name, or `list` to show every profile
        name: String,

        /// Redis host
        #[arg(long)]
        url: Option<String>,

        /// Redis port
        #[arg(long)]
        port: Option<u16>,

        /// Redis database index
        #[arg(long)]
        db: Option<i64>,

        /// Redis password
        #[arg(long)]
        password: Option<String>,
    },

    /// Make a stored profile the active one
    Use {
        /// Profile name
        name: String,
    },

    /// List registered service instances
    Nodes {
        /// Only instances of this service
        service: Option<String>,

        /// Only recently updated instances
        #[arg(long)]
        active: bool,
    },

    /// List service routes
    Routes {
        /// Only routes of this service
        service: Option<String>,
    },

    /// List registered services
    Services {
        /// Only this service
        service: Option<String>,
    },

    /// Show the latest health snapshot of each instance
    Health {
        /// Only this service
        service: Option<String>,
    },

    /// Show recent health log entries of a service
    Healthlog {
        /// Service name
        service: String,

        /// Entries per instance
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Build and deliver messages
    Message {
        #[command(subcommand)]
        command: MessageCommands,
    },

    /// Call a service endpoint
    Rest {
        /// Route, e.g. `user-svc:[get]/v1/users`
        route: String,

        /// JSON payload file
        payload: Option<PathBuf>,
    },

    /// Manage stored service configs
    Cfg {
        #[command(subcommand)]
        command: CfgCommands,
    },

    /// Registry server commands
    Redis {
        #[command(subcommand)]
        command: RedisCommands,
    },

    /// Remove stale instances from the nodes list
    Refresh {
        /// Override the stale threshold, in seconds
        #[arg(long, value_name = "SECS")]
        stale_after: Option<u64>,
    },

    /// Open redis-cli against the active profile
    Shell,
}

#[derive(Subcommand)]
enum MessageCommands {
    /// Print a message skeleton
    Create,

    /// Deliver a message file now
    Send {
        /// Message file
        file: PathBuf,
    },

    /// Queue a message file for later pickup
    Queue {
        /// Message file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum CfgCommands {
    /// Store a config file under `service:version`
    Push {
        /// Config label
        label: String,
        /// JSON config file
        file: PathBuf,
    },

    /// Print a stored config
    Pull {
        /// Config label
        label: String,
    },

    /// List stored config labels
    List {
        /// Only this service
        service: Option<String>,
    },

    /// Remove a stored config
    Remove {
        /// Config label
        label: String,
    },
}

#[derive(Subcommand)]
enum RedisCommands {
    /// Print the server report
    Info,
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(secs) = self.connect_timeout {
            settings.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.active_threshold {
            settings.active_threshold = Duration::from_secs(secs);
        }
        if let Some(secs) = self.stale_threshold {
            settings.stale_threshold = Duration::from_secs(secs);
        }
        settings
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("HYDRA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();

    smol::block_on(async {
        let cli = match Cli::try_parse() {
            Ok(cli) => cli,
            Err(e) => {
                let _ = e.print();
                smol::Timer::after(Settings::default().shutdown_grace).await;
                return;
            }
        };

        let settings = cli.settings();
        let grace = settings.shutdown_grace;
        let mut session = Session::load(settings, cli.state_file).await;

        match commands::dispatch(cli.command, &mut session).await {
            Ok(output) => output.print(),
            Err(e) => report(&e),
        }

        session.close().await;
        debug!("Waiting {:?} before exit", grace);
        smol::Timer::after(grace).await;
    });
}

fn report(error: &anyhow::Error) {
    match error.downcast_ref::<hydra_registry::Error>() {
        Some(hydra_registry::Error::ConfigAbsent) => eprintln!("Warning: {}", error),
        _ => eprintln!("Error: {:#}", error),
    }
}
