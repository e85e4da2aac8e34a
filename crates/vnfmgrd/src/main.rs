//! vnfmgrd daemon entry point.
//!
//! Loads a vendor dictionary, probes the broker, and runs periodic drift
//! reconciliation for one network.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vnfmgrd::{VnfMgr, VnfMgrConfig};

/// VNF adapter daemon.
#[derive(Debug, Parser)]
#[command(name = "vnfmgrd", about = "Dictionary-driven VNF rule reconciliation daemon")]
struct Args {
    /// Path to the vendor dictionary YAML.
    #[arg(long)]
    dictionary: PathBuf,

    /// Path to the desired rules JSON file.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Broker base URL, e.g. https://10.0.0.1:8443.
    #[arg(long)]
    broker_url: String,

    /// Static bearer token for broker authentication.
    #[arg(long)]
    auth_token: Option<String>,

    /// Network to reconcile.
    #[arg(long, default_value = "default")]
    network: String,

    /// Appliance identifier used in operations and audit records.
    #[arg(long, default_value = "vnf-appliance")]
    appliance: String,

    /// Seconds between reconciliation passes.
    #[arg(long, default_value_t = 60)]
    interval_secs: u64,

    /// Detect drift without repairing it.
    #[arg(long)]
    dry_run: bool,

    /// Delete device rules the orchestrator does not know about.
    #[arg(long)]
    auto_remove: bool,

    /// Maximum broker retries per call.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Broker connect/read timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Run a single reconciliation pass and exit.
    #[arg(long)]
    once: bool,
}

/// Initialize tracing/logging.
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = VnfMgrConfig {
        dictionary_path: args.dictionary,
        rules_path: args.rules,
        broker_url: args.broker_url,
        auth_token: args.auth_token,
        network_id: args.network,
        appliance_id: args.appliance,
        dry_run: args.dry_run,
        auto_remove: args.auto_remove,
        max_retries: args.max_retries,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let interval = Duration::from_secs(args.interval_secs);
    let once = args.once;

    let mgr = VnfMgr::new(config)?;
    mgr.probe_broker().await?;

    if once {
        mgr.run_once().await?;
        return Ok(());
    }

    info!(interval_secs = interval.as_secs(), "starting reconciliation loop");
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = mgr.run_once().await {
            error!(error = %e, "reconciliation pass failed");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    info!("--- Starting vnfmgrd ---");

    let args = Args::parse();
    match run(args).await {
        Ok(()) => {
            info!("vnfmgrd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("vnfmgrd error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
