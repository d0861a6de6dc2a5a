use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod args;
mod error;
mod filter;
mod health;
mod quantity;
mod scheduler;
mod scoring;
mod telemetry;

use scheduler::Scheduler;
use scoring::{Scorer, ScoringPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    hyperion_common::init();
    let args = args::Args::parse();

    let policy = match args.policy.as_str() {
        "leastLoaded" => ScoringPolicy::LeastLoaded,
        "binPack" => ScoringPolicy::BinPack,
        other => {
            eprintln!(
                "{}",
                format!("Unrecognized scoring policy '{other}', falling back to CPU idleness")
                    .yellow()
            );
            ScoringPolicy::CpuIdle
        }
    };
    println!(
        "{}",
        format!("⚙️ Starting Hyperion scheduler '{}' with policy '{policy}'...", args.name).green()
    );

    // KUBECONFIG if set, in-cluster service account otherwise.
    let client = kube::Client::try_default().await?;
    let telemetry = Arc::new(telemetry::Client::new()?);
    let scheduler = Scheduler::new(client, args.name, Scorer::new(telemetry, policy));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        hyperion_common::shutdown::shutdown_signal().await;
        signal.cancel();
    });

    let health_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = health::run_health(health_shutdown).await {
            eprintln!("{}", format!("healthz endpoint failed: {e}").red());
        }
    });

    scheduler.run(shutdown).await?;
    println!("{}", "Scheduler shut down gracefully.".green());
    Ok(())
}
