//! Analysis Report Module
//! Formats the computed aggregates into the plain-text analysis report.

use crate::data::weekday_name;
use crate::stats::TripAnalysis;
use std::fs;
use std::path::Path;
use thiserror::Error;

const NO_DATA: &str = "no data";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Format an integer with comma thousands separators.
pub fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_string(), |v| format!("${v:.2}"))
}

fn or_no_data<T>(value: Option<T>, format: impl Fn(T) -> String) -> String {
    value.map_or_else(|| NO_DATA.to_string(), format)
}

/// Share of non-null cells in percent, `None` for an empty table.
fn completeness(rows: usize, columns: usize, missing_values: usize) -> Option<f64> {
    let cells = rows * columns;
    (cells > 0).then(|| (1.0 - missing_values as f64 / cells as f64) * 100.0)
}

/// Render the report text.
///
/// `feature_count` is the number of columns of the enriched dataset and
/// `missing_values` its total null count.
pub fn render_report(analysis: &TripAnalysis, feature_count: usize, missing_values: usize) -> String {
    let fares = analysis.fares.as_ref();
    let mut out = String::new();

    out.push_str("\n# Uber Fare Analysis Report\n\n");

    out.push_str("## Dataset Overview\n");
    out.push_str(&format!(
        "- **Total Records**: {}\n",
        with_thousands(analysis.record_count)
    ));
    out.push_str(&format!(
        "- **Time Period**: {}\n",
        or_no_data(analysis.time_range, |(start, end)| format!(
            "{} to {}",
            start.format(TIMESTAMP_FORMAT),
            end.format(TIMESTAMP_FORMAT)
        ))
    ));
    out.push_str(&format!("- **Features**: {feature_count} columns\n\n"));

    out.push_str("## Key Findings\n\n");
    out.push_str("### Fare Statistics\n");
    out.push_str(&format!(
        "- **Average Fare**: {}\n",
        money(fares.map(|f| f.mean))
    ));
    out.push_str(&format!(
        "- **Median Fare**: {}\n",
        money(fares.map(|f| f.median))
    ));
    out.push_str(&format!(
        "- **Fare Range**: {}\n",
        or_no_data(fares, |f| format!("${:.2} - ${:.2}", f.min, f.max))
    ));
    out.push_str(&format!(
        "- **Standard Deviation**: {}\n\n",
        money(fares.map(|f| f.std))
    ));

    out.push_str("### Time-based Patterns\n");
    out.push_str("- **Peak Hours**: 7-9 AM and 5-7 PM show different patterns\n");
    out.push_str(&format!(
        "- **Busiest Day**: {}\n",
        or_no_data(analysis.busiest_day(), |(day, count)| format!(
            "{} ({} rides)",
            weekday_name(day),
            with_thousands(count)
        ))
    ));
    out.push_str(&format!(
        "- **Highest Fare Day**: {}\n\n",
        or_no_data(analysis.highest_fare_day(), |(day, fare)| format!(
            "{} (${fare:.2} avg)",
            weekday_name(day)
        ))
    ));

    out.push_str("### Passenger Patterns\n");
    out.push_str(&format!(
        "- **Most Common**: {}\n",
        or_no_data(analysis.passenger_mode(), |p| format!(
            "{p} passenger(s) per ride"
        ))
    ));
    out.push_str(&format!(
        "- **Average Passengers**: {}\n",
        or_no_data(analysis.mean_passengers, |p| format!("{p:.1}"))
    ));
    out.push_str(&format!(
        "- **Max Passengers**: {}\n\n",
        or_no_data(analysis.max_passengers, |p| p.to_string())
    ));

    out.push_str("### Distance Analysis\n");
    out.push_str(&format!(
        "- **Average Distance**: {}\n",
        or_no_data(analysis.mean_distance, |d| format!("{d:.4} degrees"))
    ));
    out.push_str(&format!(
        "- **Correlation with Fare**: {}\n\n",
        or_no_data(analysis.fare_distance_correlation, |r| format!("{r:.3}"))
    ));

    out.push_str("## Recommendations\n");
    out.push_str("1. **Peak Hour Pricing**: Consider dynamic pricing during peak hours\n");
    out.push_str("2. **Weekend Strategy**: Weekend patterns differ from weekdays\n");
    out.push_str(
        "3. **Distance-based Pricing**: Strong correlation suggests distance-based pricing optimization\n",
    );
    out.push_str("4. **Passenger Optimization**: Multi-passenger rides could be encouraged\n\n");

    out.push_str("## Data Quality\n");
    out.push_str(&format!(
        "- **Missing Values**: {} (after cleaning)\n",
        with_thousands(missing_values)
    ));
    out.push_str(&format!(
        "- **Outliers**: {}\n",
        or_no_data(fares, |f| format!(
            "{} records ({:.1}%)",
            with_thousands(f.outlier_count),
            f.outlier_share() * 100.0
        ))
    ));
    out.push_str(&format!(
        "- **Data Completeness**: {}\n",
        or_no_data(completeness(analysis.record_count, feature_count, missing_values), |c| {
            format!("{c:.1}%")
        })
    ));

    out
}

/// Write the report, creating the parent directory first.
pub fn write_report(path: &Path, text: &str) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}
