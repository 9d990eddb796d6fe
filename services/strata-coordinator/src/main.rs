use std::path::PathBuf;

use clap::Parser;
use strata_coordinator::{bootstrap, telemetry};
use strata_core::StrataConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "strata-coordinator")]
#[command(about = "Strata coordinator: segment compaction scheduling", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to STRATA_CONFIG, ./config/strata, /etc/strata/strata)
    #[arg(long, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,

    /// JSON manifest of published segments to seed the metadata store with
    #[arg(long)]
    segments: Option<PathBuf>,

    /// JSON list of data source compaction configs
    #[arg(long)]
    compaction: Option<PathBuf>,

    /// Run a single compaction cycle, print its stats and exit
    #[arg(long)]
    once: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    telemetry::init_logging(&args.log_level)?;

    let settings = match &args.config {
        Some(path) => StrataConfig::from_file(path)?,
        None => StrataConfig::load()?,
    };
    strata_core::metrics::register_all();

    let mut coordinator = bootstrap(
        &settings,
        args.segments.as_deref(),
        args.compaction.as_deref(),
    )
    .await?;

    if args.once {
        let stats = coordinator.compactor.run_compaction_cycle().await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    coordinator.compactor.start_worker();
    info!(
        period_secs = settings.coordinator.period_secs,
        "Coordinator running, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    coordinator.compactor.shutdown().await?;
    info!(
        tasks = coordinator.submitter.submitted(),
        "Coordinator stopped"
    );
    Ok(())
}
