//! Fare Insights - Uber fare analysis pipeline
//!
//! Cleans the raw trip export, derives time and distance features, and writes
//! the enriched data, static charts and a text report.

mod charts;
mod config;
mod data;
mod pipeline;
mod report;
mod stats;

use config::PipelineConfig;
use pipeline::Pipeline;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let summary = Pipeline::new(PipelineConfig::default()).run()?;

    if !summary.charts_failed.is_empty() {
        warn!("Charts not generated: {}", summary.charts_failed.join(", "));
    }
    info!(
        records = summary.records,
        charts = summary.charts_written,
        mean_fare = ?summary.mean_fare,
        busiest_day = summary.busiest_day.unwrap_or("no data"),
        "Analysis complete"
    );
    Ok(())
}
