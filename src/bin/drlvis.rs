//! drlvis: answer dashboard routes for one training run from the command line.
//!
//! Loads the run once, then prints the JSON body of one route:
//!
//! ```text
//! drlvis --logdir runs/cartpole get-log-tags
//! drlvis --logdir runs/cartpole get-frames --user 12
//! drlvis --logdir runs/cartpole get-confidence-frame --user 20,3
//! drlvis --logdir runs/cartpole tags
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use drlvis::config::TelemetryConfig;
use drlvis::query::QueryEngine;
use drlvis::store::ParquetEventLog;

// ── CLI ─────────────────────────────────────────────────────────────

/// Query the telemetry log of a reinforcement-learning run.
#[derive(Parser, Debug)]
#[command(name = "drlvis", version, about)]
struct Cli {
    /// Run directory holding the event segments.
    #[arg(long, env = "DRLVIS_LOGDIR", default_value = "backend/logs")]
    logdir: PathBuf,

    /// Polynomial degree of scalar trend curves.
    #[arg(long, env = "DRLVIS_TREND_DEGREE", default_value_t = 5)]
    trend_degree: usize,

    /// Route path (e.g. `get-log-tags`), or `tags` to list every category.
    target: String,

    /// Route parameter: an episode, `episode,index`, a tag or a distribution name.
    #[arg(long)]
    user: Option<String>,
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = TelemetryConfig::builder(&cli.logdir)
        .trend_degree(cli.trend_degree)
        .build();

    let snapshot = ParquetEventLog::load_snapshot(config.log_dir())
        .with_context(|| format!("failed to load run at {}", cli.logdir.display()))?;
    info!(events = snapshot.len(), series = snapshot.series_count(), "run loaded");
    let engine = QueryEngine::with_config(snapshot, &config);

    if cli.target == "tags" {
        let catalog = engine.catalog()?;
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    let response = engine.handle(&cli.target, cli.user.as_deref());
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if response.status != 200 {
        bail!("{} answered {}", cli.target, response.status);
    }
    Ok(())
}
