use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{error, info};
use ovpn_monitor::configuration::config::{Config, ConfigOverrides};
use ovpn_monitor::controller::controller_handler::Controller;
use ovpn_monitor::error_handling::types::StorageError;
use ovpn_monitor::storage::database_storage::DatabaseStorage;
use ovpn_monitor::storage::report_filter::{for_request, ReportFilter, ReportWindow};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ovpn-monitor")]
#[command(version = "0.1.0")]
#[command(about = "Session and bandwidth monitor for OpenVPN management interfaces")]
struct Args {
    config_file: PathBuf,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print stored telemetry as JSON lines instead of monitoring
    Report {
        /// Print closed sessions instead of bandwidth rows
        #[arg(long, conflicts_with = "hosts")]
        sessions: bool,

        /// Print the known host aliases
        #[arg(long)]
        hosts: bool,

        /// Only rows of this host alias
        #[arg(long)]
        host: Option<String>,

        /// Look-back window: 15m, 30m, 1h, 3h, 6h, 12h or 1d
        #[arg(long)]
        window: Option<ReportWindow>,

        #[arg(long)]
        limit: Option<u64>,
    },
}

fn print_json_lines<T: Serialize>(items: &[T]) {
    for item in items {
        match serde_json::to_string(item) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Unable to serialize row: {}", e),
        }
    }
}

async fn report(
    config: &Config,
    sessions: bool,
    hosts: bool,
    filter: ReportFilter,
) -> Result<(), StorageError> {
    let storage = DatabaseStorage::connect(&config.database_url).await?;
    if hosts {
        print_json_lines(&storage.hosts(filter.since).await?);
    } else if sessions {
        print_json_lines(&storage.session_events(&filter).await?);
    } else {
        print_json_lines(&storage.bandwidth_rows(&filter).await?);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let mut config = Config::from_file(&args.config_file).unwrap_or_else(|e| {
        error!("Unable to import configuration from file: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = config.apply_overrides(&args.overrides) {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    info!("Configuration imported successfully");

    if let Some(Command::Report {
        sessions,
        hosts,
        host,
        window,
        limit,
    }) = args.command
    {
        let filter = for_request(host, window, limit, Utc::now());
        if let Err(e) = report(&config, sessions, hosts, filter).await {
            error!("Unable to produce the report: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let controller = Controller::new(config).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });

    info!("Starting the monitoring pipeline");
    if let Err(e) = controller.run().await {
        error!("Monitoring stopped: {}, exiting...", e);
        std::process::exit(1);
    }
}
