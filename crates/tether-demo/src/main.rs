//! # Tether Demo
//!
//! Runs a scripted scoreboard on the tether event system.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! tether
//!
//! # Run with a config file in the working directory
//! cp tether.example.toml tether.toml && tether
//!
//! # Override logging
//! RUST_LOG=tether_core=trace tether
//! ```

mod config;
mod metrics;
mod scoreboard;

use anyhow::Result;
use tether_core::EventCenter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        players = config.demo.players,
        rounds = config.demo.rounds,
        "Starting tether demo"
    );

    // Initialize metrics
    let prometheus = if config.metrics.enabled {
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let center = EventCenter::try_with_config(config.center.clone())?;
    let summary = scoreboard::run(&config.demo, &center);

    tracing::info!(
        goals = ?summary.totals,
        score_writes = summary.score_writes,
        announcements = summary.announcements,
        kickoffs = summary.kickoffs_seen,
        handles_peak = summary.handles_peak,
        handles_after = summary.handles_after,
        "Match over"
    );

    if let Some(handle) = prometheus {
        println!("{}", handle.render());
    }

    Ok(())
}
