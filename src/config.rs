//! Pipeline Configuration
//! Fixed input/output locations and rendering tunables.

use std::path::{Path, PathBuf};

/// Default location of the raw trip export.
pub const RAW_CSV: &str = "Data/raw/uber.csv";
pub const CLEANED_CSV: &str = "Data/cleaned/uber_cleaned.csv";
pub const ENHANCED_CSV: &str = "Data/enhanced/uber_enhanced.csv";
pub const CHART_DIR: &str = "powerbi";
pub const REPORT_TXT: &str = "Documents/analysis_report.txt";

/// Upper bound on points drawn in the fare-vs-distance scatter.
pub const SCATTER_SAMPLE_CAP: usize = 5000;

/// Paths and tunables for one run of the analysis.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_csv: PathBuf,
    pub cleaned_csv: PathBuf,
    pub enhanced_csv: PathBuf,
    pub chart_dir: PathBuf,
    pub report_path: PathBuf,
    pub histogram_bins: usize,
    pub scatter_sample_cap: usize,
    /// Size of single-panel charts in pixels.
    pub chart_size: (u32, u32),
    /// Size of side-by-side comparison charts.
    pub wide_chart_size: (u32, u32),
    /// Size of the 2x2 summary dashboard.
    pub dashboard_size: (u32, u32),
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_csv: PathBuf::from(RAW_CSV),
            cleaned_csv: PathBuf::from(CLEANED_CSV),
            enhanced_csv: PathBuf::from(ENHANCED_CSV),
            chart_dir: PathBuf::from(CHART_DIR),
            report_path: PathBuf::from(REPORT_TXT),
            histogram_bins: 50,
            scatter_sample_cap: SCATTER_SAMPLE_CAP,
            chart_size: (1200, 720),
            wide_chart_size: (1800, 720),
            dashboard_size: (1800, 1440),
        }
    }
}

impl PipelineConfig {
    /// Rebase every default path under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Self::default();
        Self {
            input_csv: root.join(defaults.input_csv),
            cleaned_csv: root.join(defaults.cleaned_csv),
            enhanced_csv: root.join(defaults.enhanced_csv),
            chart_dir: root.join(defaults.chart_dir),
            report_path: root.join(defaults.report_path),
            ..defaults
        }
    }

    /// Full path of a chart file inside the chart directory.
    pub fn chart_path(&self, file_name: &str) -> PathBuf {
        self.chart_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_config_keeps_relative_layout() {
        let config = PipelineConfig::rooted_at(Path::new("/tmp/run"));
        assert_eq!(config.input_csv, PathBuf::from("/tmp/run/Data/raw/uber.csv"));
        assert_eq!(
            config.chart_path("boxPlot.png"),
            PathBuf::from("/tmp/run/powerbi/boxPlot.png")
        );
        assert_eq!(config.scatter_sample_cap, 5000);
    }
}
