mod config;
mod sim;
mod telemetry;

use clap::Parser;
use config::{CliArgs, SimConfig};

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = SimConfig::try_from(args)?;

    telemetry::init_telemetry()?;

    if cfg!(debug_assertions) {
        tracing::info!("Starting simulation with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting simulation with {} allocators x {} ids",
            config.allocators,
            config.ids_per_allocator
        );
    }

    let report = sim::run(&config)?;
    report.verify()?;

    tracing::info!(
        leases = report.leases.len(),
        ids = report.total_ids(),
        conflicts = report.conflicts,
        elapsed_ms = report.elapsed.as_millis(),
        "simulation passed: no producer id was issued twice"
    );
    for worker in &report.workers {
        if let Some(reason) = &worker.stopped {
            tracing::warn!(owner_id = worker.owner_id, %reason, "allocator stopped early");
        }
    }
    Ok(())
}
