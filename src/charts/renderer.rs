//! Static Chart Renderer
//! Writes the fixed set of PNG charts for one analysis run.
//!
//! Every chart is drawn with plotters into an in-memory RGB buffer and then
//! encoded with `image`. Charts are independent: a failing chart is logged and
//! skipped while the rest are still written.

use crate::charts::plotter::{
    ChartPlotter, Panel, PanelText, RenderError, FOREST_GREEN, LIGHT_CORAL, ORANGE, PURPLE,
    SKY_BLUE, STEEL_BLUE,
};
use crate::config::PipelineConfig;
use crate::data::{weekday_name, EnrichedTrip};
use crate::stats::{fares_by_time_category, GroupSummary, TripAnalysis};
use image::RgbImage;
use plotters::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const FARE_DISTRIBUTION: &str = "fare_distribution.png";
pub const BOX_PLOT: &str = "boxPlot.png";
pub const FARE_BY_HOUR: &str = "fare_hour.png";
pub const RIDES_BY_HOUR: &str = "rides_hour.png";
pub const FARE_BY_WEEKDAY: &str = "fare_week.png";
pub const RIDES_BY_WEEKDAY: &str = "rides_weekday.png";
pub const FARE_BY_MONTH: &str = "fare_monthly.png";
pub const PEAK_ANALYSIS: &str = "peak_analysis.png";
pub const PASSENGER_ANALYSIS: &str = "passenger_analysis.png";
pub const SUMMARY_ANALYSIS: &str = "summary_analysis.png";
pub const CORRELATION_MATRIX: &str = "correlation_matrix.png";

/// Every chart file, in rendering order.
pub const CHART_FILES: [&str; 11] = [
    FARE_DISTRIBUTION,
    BOX_PLOT,
    FARE_BY_HOUR,
    RIDES_BY_HOUR,
    FARE_BY_WEEKDAY,
    RIDES_BY_WEEKDAY,
    FARE_BY_MONTH,
    PEAK_ANALYSIS,
    PASSENGER_ANALYSIS,
    SUMMARY_ANALYSIS,
    CORRELATION_MATRIX,
];

/// Outcome of one `render_all` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub written: Vec<String>,
    pub failed: Vec<String>,
}

/// Draw into a white canvas of `size` pixels and save it as PNG at `path`.
fn render_png<F>(path: &Path, size: (u32, u32), draw: F) -> Result<(), RenderError>
where
    F: FnOnce(&Panel<'_>) -> Result<(), RenderError>,
{
    let (width, height) = size;
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }

    let image = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| RenderError::Buffer(path.display().to_string()))?;
    image.save(path)?;
    Ok(())
}

/// Pick at most `cap` (distance, fare) points uniformly at random.
pub fn sample_fare_distance<R: Rng + ?Sized>(
    trips: &[EnrichedTrip],
    cap: usize,
    rng: &mut R,
) -> Vec<(f64, f64)> {
    trips
        .choose_multiple(rng, cap)
        .map(|t| (t.distance, t.fare()))
        .collect()
}

fn mean_values<K>(groups: &[(K, GroupSummary)]) -> Vec<Option<f64>> {
    groups.iter().map(|(_, s)| s.mean_fare).collect()
}

fn count_values<K>(groups: &[(K, GroupSummary)]) -> Vec<Option<f64>> {
    groups.iter().map(|(_, s)| Some(s.count as f64)).collect()
}

/// Renders every chart of a run into the configured chart directory.
pub struct ChartRenderer<'a> {
    config: &'a PipelineConfig,
    trips: &'a [EnrichedTrip],
    analysis: &'a TripAnalysis,
}

impl<'a> ChartRenderer<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        trips: &'a [EnrichedTrip],
        analysis: &'a TripAnalysis,
    ) -> Self {
        Self {
            config,
            trips,
            analysis,
        }
    }

    /// Render all charts. Only failing to create the chart directory is an
    /// error; individual chart failures are collected in the summary.
    pub fn render_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RenderSummary, RenderError> {
        fs::create_dir_all(&self.config.chart_dir)?;

        let mut summary = RenderSummary::default();
        for file in CHART_FILES {
            let path = self.config.chart_path(file);
            let result = match file {
                FARE_DISTRIBUTION => self.fare_distribution(&path),
                BOX_PLOT => self.box_plot(&path),
                FARE_BY_HOUR => self.fare_by_hour(&path),
                RIDES_BY_HOUR => self.rides_by_hour(&path),
                FARE_BY_WEEKDAY => self.fare_by_weekday(&path),
                RIDES_BY_WEEKDAY => self.rides_by_weekday(&path),
                FARE_BY_MONTH => self.fare_by_month(&path),
                PEAK_ANALYSIS => self.peak_analysis(&path),
                PASSENGER_ANALYSIS => self.passenger_analysis(&path),
                SUMMARY_ANALYSIS => self.summary_analysis(&path, rng),
                _ => self.correlation_matrix(&path),
            };

            match result {
                Ok(()) => {
                    info!("Generated {}", path.display());
                    summary.written.push(file.to_string());
                }
                Err(err) => {
                    warn!(chart = file, error = %err, "chart rendering failed");
                    summary.failed.push(file.to_string());
                }
            }
        }
        Ok(summary)
    }

    fn fares(&self) -> Vec<f64> {
        self.trips.iter().map(EnrichedTrip::fare).collect()
    }

    fn fare_distribution(&self, path: &Path) -> Result<(), RenderError> {
        let fares = self.fares();
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_histogram(
                root,
                PanelText::new("Uber Fare Distribution", "Fare Amount ($)", "Frequency"),
                &fares,
                self.config.histogram_bins,
                STEEL_BLUE,
                true,
            )
        })
    }

    fn box_plot(&self, path: &Path) -> Result<(), RenderError> {
        let groups: Vec<(String, Vec<f64>)> = fares_by_time_category(self.trips)
            .into_iter()
            .map(|(category, fares)| (category.to_string(), fares))
            .collect();
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_box_groups(
                root,
                PanelText::new(
                    "Fare Distribution by Time of Day",
                    "Time Category",
                    "Fare Amount ($)",
                ),
                &groups,
                STEEL_BLUE,
            )
        })
    }

    fn fare_by_hour(&self, path: &Path) -> Result<(), RenderError> {
        let points: Vec<(i32, f64)> = self
            .analysis
            .hourly
            .iter()
            .filter_map(|(hour, s)| s.mean_fare.map(|m| (*hour as i32, m)))
            .collect();
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_line(
                root,
                PanelText::new("Average Fare by Hour of Day", "Hour of Day", "Average Fare ($)"),
                &points,
                0,
                23,
                STEEL_BLUE,
            )
        })
    }

    fn rides_by_hour(&self, path: &Path) -> Result<(), RenderError> {
        let labels: Vec<String> = (0..24).map(|h| h.to_string()).collect();
        let counts: Vec<Option<f64>> = (0..24u32)
            .map(|h| {
                let count = self.analysis.hourly.get(&h).map_or(0, |s| s.count);
                Some(count as f64)
            })
            .collect();
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_bars(
                root,
                PanelText::new("Number of Rides by Hour of Day", "Hour of Day", "Number of Rides"),
                &labels,
                &counts,
                &[STEEL_BLUE],
            )
        })
    }

    fn weekday_labels(&self) -> Vec<String> {
        self.analysis
            .weekday
            .iter()
            .map(|(day, _)| weekday_name(*day).to_string())
            .collect()
    }

    fn fare_by_weekday(&self, path: &Path) -> Result<(), RenderError> {
        let labels = self.weekday_labels();
        let means = mean_values(&self.analysis.weekday);
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_bars(
                root,
                PanelText::new("Average Fare by Day of Week", "Day of Week", "Average Fare ($)"),
                &labels,
                &means,
                &[SKY_BLUE],
            )
        })
    }

    fn rides_by_weekday(&self, path: &Path) -> Result<(), RenderError> {
        let labels = self.weekday_labels();
        let counts = count_values(&self.analysis.weekday);
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_bars(
                root,
                PanelText::new("Number of Rides by Day of Week", "Day of Week", "Number of Rides"),
                &labels,
                &counts,
                &[LIGHT_CORAL],
            )
        })
    }

    fn fare_by_month(&self, path: &Path) -> Result<(), RenderError> {
        let points: Vec<(i32, f64)> = self
            .analysis
            .monthly
            .iter()
            .filter_map(|(month, s)| s.mean_fare.map(|m| (*month as i32, m)))
            .collect();
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_line(
                root,
                PanelText::new("Average Fare by Month", "Month", "Average Fare ($)"),
                &points,
                1,
                12,
                STEEL_BLUE,
            )
        })
    }

    fn peak_analysis(&self, path: &Path) -> Result<(), RenderError> {
        let labels: Vec<String> = self
            .analysis
            .peak
            .iter()
            .map(|(flag, _)| flag.to_string())
            .collect();
        let means = mean_values(&self.analysis.peak);
        let counts = count_values(&self.analysis.peak);
        let colors = [ORANGE, BLUE];

        render_png(path, self.config.wide_chart_size, |root| {
            let panels = root.split_evenly((1, 2));
            ChartPlotter::draw_bars(
                &panels[0],
                PanelText::new("Average Fare: Peak vs Off-Peak", "", "Average Fare ($)"),
                &labels,
                &means,
                &colors,
            )?;
            ChartPlotter::draw_bars(
                &panels[1],
                PanelText::new("Number of Rides: Peak vs Off-Peak", "", "Number of Rides"),
                &labels,
                &counts,
                &colors,
            )
        })
    }

    fn passenger_analysis(&self, path: &Path) -> Result<(), RenderError> {
        let labels: Vec<String> = self
            .analysis
            .passengers
            .keys()
            .map(|p| p.to_string())
            .collect();
        let means: Vec<Option<f64>> = self
            .analysis
            .passengers
            .values()
            .map(|s| s.mean_fare)
            .collect();
        let counts: Vec<Option<f64>> = self
            .analysis
            .passengers
            .values()
            .map(|s| Some(s.count as f64))
            .collect();

        render_png(path, self.config.wide_chart_size, |root| {
            let panels = root.split_evenly((1, 2));
            ChartPlotter::draw_bars(
                &panels[0],
                PanelText::new(
                    "Average Fare by Passenger Count",
                    "Number of Passengers",
                    "Average Fare ($)",
                ),
                &labels,
                &means,
                &[STEEL_BLUE],
            )?;
            ChartPlotter::draw_bars(
                &panels[1],
                PanelText::new(
                    "Number of Rides by Passenger Count",
                    "Number of Passengers",
                    "Number of Rides",
                ),
                &labels,
                &counts,
                &[FOREST_GREEN],
            )
        })
    }

    fn summary_analysis<R: Rng + ?Sized>(&self, path: &Path, rng: &mut R) -> Result<(), RenderError> {
        let labels: Vec<String> = ["Mean", "Median", "Std Dev", "Max"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let stats: Vec<Option<f64>> = match &self.analysis.fares {
            Some(f) => vec![Some(f.mean), Some(f.median), Some(f.std), Some(f.max)],
            None => vec![None; 4],
        };
        let distances: Vec<f64> = self.trips.iter().map(|t| t.distance).collect();
        let sample = sample_fare_distance(self.trips, self.config.scatter_sample_cap, rng);

        render_png(path, self.config.dashboard_size, |root| {
            let panels = root.split_evenly((2, 2));
            ChartPlotter::draw_bars(
                &panels[0],
                PanelText::new("Fare Statistics", "", "Amount ($)"),
                &labels,
                &stats,
                &[BLUE, FOREST_GREEN, ORANGE, RED],
            )?;
            ChartPlotter::draw_histogram(
                &panels[1],
                PanelText::new("Trip Distance Distribution", "Distance (degrees)", "Frequency"),
                &distances,
                self.config.histogram_bins,
                PURPLE,
                false,
            )?;
            ChartPlotter::draw_scatter(
                &panels[2],
                PanelText::new("Fare vs Distance", "Distance (degrees)", "Fare Amount ($)"),
                &sample,
                STEEL_BLUE,
            )?;
            ChartPlotter::draw_heatmap(&panels[3], "Correlation Matrix", &self.analysis.correlations)
        })
    }

    fn correlation_matrix(&self, path: &Path) -> Result<(), RenderError> {
        render_png(path, self.config.chart_size, |root| {
            ChartPlotter::draw_heatmap(root, "Correlation Matrix", &self.analysis.correlations)
        })
    }
}
