//! Analysis Pipeline
//! Runs the stages in data-flow order: load, clean, derive, aggregate,
//! render and report.

use crate::charts::ChartRenderer;
use crate::config::PipelineConfig;
use crate::data::{clean_trips, enrich_frame, enrich_trips, load_trips, trips_from_frame};
use crate::report::{render_report, write_report};
use crate::stats::TripAnalysis;
use anyhow::{Context, Result};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

/// What one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub records: usize,
    pub charts_written: usize,
    pub charts_failed: Vec<String>,
    pub mean_fare: Option<f64>,
    pub busiest_day: Option<&'static str>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

/// Write `df` as a headed CSV, creating the parent directory first.
fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<RunSummary> {
        let config = &self.config;

        info!("Loading trips from {}", config.input_csv.display());
        let raw = load_trips(&config.input_csv)
            .with_context(|| format!("loading {}", config.input_csv.display()))?;

        let (mut cleaned, cleaning) = clean_trips(&raw).context("cleaning trips")?;
        info!(
            "Dropped {} incomplete rows and {} invalid records",
            cleaning.missing_dropped, cleaning.invalid_dropped
        );
        write_csv(&mut cleaned, &config.cleaned_csv)?;
        info!("Cleaned data saved to {}", config.cleaned_csv.display());

        let records = trips_from_frame(&cleaned).context("reading cleaned trips")?;
        let trips = enrich_trips(&records);
        let mut enhanced = enrich_frame(&cleaned, &trips).context("deriving features")?;
        write_csv(&mut enhanced, &config.enhanced_csv)?;
        info!(
            "Enhanced data saved to {} ({} columns)",
            config.enhanced_csv.display(),
            enhanced.width()
        );

        let analysis = TripAnalysis::compute(&trips);
        if let Some(fares) = &analysis.fares {
            debug!(
                mean = fares.mean,
                median = fares.median,
                std = fares.std,
                outliers = fares.outlier_count,
                "fare summary"
            );
        }

        let charts = ChartRenderer::new(config, &trips, &analysis)
            .render_all(&mut rand::thread_rng())
            .with_context(|| format!("preparing {}", config.chart_dir.display()))?;

        let missing_values: usize = enhanced.get_columns().iter().map(|c| c.null_count()).sum();
        let text = render_report(&analysis, enhanced.width(), missing_values);
        write_report(&config.report_path, &text)
            .with_context(|| format!("writing {}", config.report_path.display()))?;
        info!("Report saved to {}", config.report_path.display());

        Ok(RunSummary {
            records: analysis.record_count,
            charts_written: charts.written.len(),
            charts_failed: charts.failed,
            mean_fare: analysis.fares.as_ref().map(|f| f.mean),
            busiest_day: analysis.busiest_day_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::CHART_FILES;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    const RAW: &str = "\
key,fare_amount,pickup_datetime,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,passenger_count
a,10.0,2015-05-04 08:15:00 UTC,-73.99,40.73,-73.98,40.74,1
b,20.0,2015-05-04 13:15:00 UTC,-73.98,40.75,-73.97,40.76,2
c,30.0,2015-05-05 22:15:00 UTC,-73.97,40.76,-73.95,40.78,1
d,-5.0,2015-05-06 10:00:00 UTC,-73.97,40.76,-73.95,40.78,1
e,15.0,2015-05-06 11:00:00 UTC,,40.76,-73.95,40.78,1
";

    fn workspace(raw: &str) -> (TempDir, PipelineConfig) {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::rooted_at(dir.path());
        fs::create_dir_all(config.input_csv.parent().unwrap()).unwrap();
        fs::write(&config.input_csv, raw).unwrap();
        (dir, config)
    }

    #[test]
    fn run_writes_every_output() {
        let (_dir, config) = workspace(RAW);
        let summary = Pipeline::new(config.clone()).run().unwrap();

        assert_eq!(summary.records, 3);
        assert_relative_eq!(summary.mean_fare.unwrap(), 20.0, epsilon = 1e-9);
        assert_eq!(summary.busiest_day, Some("Monday"));
        assert!(summary.charts_failed.is_empty(), "{:?}", summary.charts_failed);
        assert_eq!(summary.charts_written, CHART_FILES.len());
        for file in CHART_FILES {
            let path = config.chart_path(file);
            assert!(fs::metadata(&path).unwrap().len() > 0, "empty {file}");
        }

        let cleaned = load_trips(&config.cleaned_csv).unwrap();
        assert_eq!(cleaned.height(), 3);

        let enhanced = fs::read_to_string(&config.enhanced_csv).unwrap();
        let header = enhanced.lines().next().unwrap();
        for column in ["hour", "weekday", "is_peak", "time_category", "distance"] {
            assert!(header.contains(column), "missing {column}");
        }
        assert_eq!(enhanced.lines().count(), 4);

        let report = fs::read_to_string(&config.report_path).unwrap();
        assert!(report.contains("- **Total Records**: 3"));
        assert!(report.contains("- **Average Fare**: $20.00"));
        assert!(report.contains("- **Missing Values**: 0 (after cleaning)"));
        assert!(report.contains("- **Data Completeness**: 100.0%"));
    }

    #[test]
    fn nan_coordinates_never_reach_the_report() {
        let (_dir, config) = workspace(
            "key,fare_amount,pickup_datetime,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,passenger_count
a,10.0,2015-05-04 08:15:00 UTC,NaN,40.73,-73.98,40.74,1
b,20.0,2015-05-04 13:15:00 UTC,-73.98,40.75,-73.97,40.76,2
c,30.0,2015-05-05 22:15:00 UTC,-73.97,40.76,-73.95,40.78,1
",
        );
        let summary = Pipeline::new(config.clone()).run().unwrap();
        assert_eq!(summary.records, 2);

        let report = fs::read_to_string(&config.report_path).unwrap();
        assert!(!report.contains("NaN"));
        assert!(report.contains("- **Correlation with Fare**: 1.000"));
    }

    #[test]
    fn all_rows_invalid_reports_no_data() {
        let (_dir, config) = workspace(
            "key,fare_amount,pickup_datetime,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,passenger_count
a,-1.0,2015-05-04 08:15:00 UTC,-73.99,40.73,-73.98,40.74,1
b,250.0,2015-05-04 13:15:00 UTC,-73.98,40.75,-73.97,40.76,2
c,30.0,2015-05-05 22:15:00 UTC,-73.97,40.76,-73.95,40.78,0
",
        );
        let summary = Pipeline::new(config.clone()).run().unwrap();
        assert_eq!(summary.records, 0);
        assert_eq!(summary.mean_fare, None);
        assert_eq!(summary.busiest_day, None);
        assert!(summary.charts_failed.is_empty(), "{:?}", summary.charts_failed);

        let enhanced = fs::read_to_string(&config.enhanced_csv).unwrap();
        assert_eq!(enhanced.lines().count(), 1);

        let report = fs::read_to_string(&config.report_path).unwrap();
        assert!(report.contains("- **Total Records**: 0"));
        assert!(report.contains("- **Average Fare**: no data"));
        assert!(report.contains("- **Data Completeness**: no data"));
        assert!(!report.contains("NaN"));
    }

    #[test]
    fn missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::rooted_at(dir.path());
        let err = Pipeline::new(config.clone()).run().unwrap_err();
        assert!(err.to_string().contains("loading"));
        assert!(!config.report_path.exists());
    }
}
