//! CSV Trip Loader Module
//! Reads the raw trip export with Polars, validates the fixed schema and
//! logs an initial overview of the columns.

use crate::stats::FareSummary;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const KEY: &str = "key";
pub const PICKUP_DATETIME: &str = "pickup_datetime";
pub const FARE_AMOUNT: &str = "fare_amount";
pub const PICKUP_LONGITUDE: &str = "pickup_longitude";
pub const PICKUP_LATITUDE: &str = "pickup_latitude";
pub const DROPOFF_LONGITUDE: &str = "dropoff_longitude";
pub const DROPOFF_LATITUDE: &str = "dropoff_latitude";
pub const PASSENGER_COUNT: &str = "passenger_count";

/// Columns every input file must carry.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    KEY,
    PICKUP_DATETIME,
    FARE_AMOUNT,
    PICKUP_LONGITUDE,
    PICKUP_LATITUDE,
    DROPOFF_LONGITUDE,
    DROPOFF_LATITUDE,
    PASSENGER_COUNT,
];

const FLOAT_COLUMNS: [&str; 5] = [
    FARE_AMOUNT,
    PICKUP_LONGITUDE,
    PICKUP_LATITUDE,
    DROPOFF_LONGITUDE,
    DROPOFF_LATITUDE,
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Column {column} cannot be read as a number: {source}")]
    InvalidColumn { column: String, source: PolarsError },
    #[error("Column {column} holds the non-integer value {value}")]
    NonIntegral { column: String, value: f64 },
}

/// Null count and descriptive statistics of one loaded column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub null_count: usize,
    /// Set for the numeric schema columns only; NaN values are skipped.
    pub summary: Option<FareSummary>,
}

/// Load the raw trip CSV.
///
/// Every column is read as text and the numeric columns are then converted
/// with strict casts (fare and coordinates to `Float64`, passenger count to
/// `Int64`), so one unparsable value anywhere in the file fails the load.
/// Columns outside the schema are carried through untouched.
pub fn load_trips(path: &Path) -> Result<DataFrame, LoaderError> {
    if !path.is_file() {
        return Err(LoaderError::NotFound(path.to_path_buf()));
    }

    let mut df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    debug!(columns = ?column_names(&df), "parsed CSV header");
    validate_schema(&df)?;

    for name in FLOAT_COLUMNS {
        let values = cast_column(&df, name, &DataType::Float64)?;
        df.with_column(values)?;
    }
    normalize_passenger_count(&mut df)?;

    info!(
        rows = df.height(),
        columns = df.width(),
        "Loaded dataset from {}",
        path.display()
    );
    log_overview(&df);
    Ok(df)
}

/// Get list of column names from a DataFrame.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Null counts for every column plus statistics for the numeric ones.
pub fn profile_columns(df: &DataFrame) -> Result<Vec<ColumnProfile>, LoaderError> {
    df.get_columns()
        .iter()
        .map(|column| -> Result<ColumnProfile, LoaderError> {
            let name = column.name().to_string();
            let summary = if FLOAT_COLUMNS.contains(&name.as_str()) || name == PASSENGER_COUNT {
                let values = column.as_materialized_series().cast(&DataType::Float64)?;
                let finite: Vec<f64> = values
                    .f64()?
                    .into_iter()
                    .flatten()
                    .filter(|v| !v.is_nan())
                    .collect();
                FareSummary::compute(&finite)
            } else {
                None
            };
            Ok(ColumnProfile {
                name,
                null_count: column.null_count(),
                summary,
            })
        })
        .collect()
}

fn log_overview(df: &DataFrame) {
    let profiles = match profile_columns(df) {
        Ok(profiles) => profiles,
        Err(err) => {
            debug!(error = %err, "column overview unavailable");
            return;
        }
    };
    for profile in &profiles {
        info!(column = %profile.name, missing = profile.null_count, "Initial missing values");
        if let Some(s) = &profile.summary {
            debug!(
                column = %profile.name,
                count = s.count,
                mean = s.mean,
                std = s.std,
                min = s.min,
                q1 = s.q1,
                median = s.median,
                q3 = s.q3,
                max = s.max,
                "column statistics"
            );
        }
    }
    debug!("First rows:\n{}", df.head(Some(5)));
}

fn validate_schema(df: &DataFrame) -> Result<(), LoaderError> {
    let present = column_names(df);
    match REQUIRED_COLUMNS
        .iter()
        .find(|required| !present.iter().any(|c| c == *required))
    {
        Some(missing) => Err(LoaderError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

fn cast_column(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Series, LoaderError> {
    df.column(name)?
        .as_materialized_series()
        .strict_cast(dtype)
        .map_err(|source| LoaderError::InvalidColumn {
            column: name.to_string(),
            source,
        })
}

/// Passenger counts must be whole numbers. NaN becomes null so the cleaner
/// treats it as missing.
fn normalize_passenger_count(df: &mut DataFrame) -> Result<(), LoaderError> {
    let values = cast_column(df, PASSENGER_COUNT, &DataType::Float64)?;
    let values = values.f64()?;

    if let Some(value) = values
        .into_iter()
        .flatten()
        .find(|v| v.is_finite() && v.fract() != 0.0)
    {
        return Err(LoaderError::NonIntegral {
            column: PASSENGER_COUNT.to_string(),
            value,
        });
    }

    let counts: Int64Chunked = values
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()).map(|v| v as i64))
        .collect();
    df.with_column(counts.with_name(PASSENGER_COUNT.into()).into_series())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = ",key,fare_amount,pickup_datetime,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,passenger_count";

    fn write_csv(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("uber.csv");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_all_schema_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!(
                "{HEADER}\n\
                 0,2015-05-07 19:52:06.0000003,7.5,2015-05-07 19:52:06 UTC,-73.99,40.73,-73.99,40.72,1\n\
                 1,2009-07-17 20:04:56.0000002,7.7,2009-07-17 20:04:56 UTC,-73.99,40.72,-73.99,40.69,1\n"
            ),
        );

        let df = load_trips(&path).unwrap();
        assert_eq!(df.height(), 2);
        for name in REQUIRED_COLUMNS {
            assert!(df.column(name).is_ok(), "missing {name}");
        }
        assert_eq!(df.column(FARE_AMOUNT).unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column(PASSENGER_COUNT).unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = load_trips(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "key,fare_amount,pickup_datetime\nk,7.5,2015-05-07 19:52:06 UTC\n",
        );
        let err = load_trips(&path).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(ref c) if c == PICKUP_LONGITUDE));
    }

    #[test]
    fn non_numeric_fare_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!(
                "{HEADER}\n\
                 0,k0,cheap,2015-05-07 19:52:06 UTC,-73.99,40.73,-73.99,40.72,1\n"
            ),
        );
        let err = load_trips(&path).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidColumn { ref column, .. } if column == FARE_AMOUNT));
    }

    const GOOD_ROW: &str = "k,7.5,2015-05-07 19:52:06 UTC,-73.99,40.73,-73.99,40.72,1";
    const BARE_HEADER: &str = "key,fare_amount,pickup_datetime,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,passenger_count";

    #[test]
    fn unparsable_value_deep_in_the_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut body = format!("{BARE_HEADER}\n");
        for _ in 0..10_005 {
            body.push_str(GOOD_ROW);
            body.push('\n');
        }
        body.push_str("bad,abc,2015-05-07 19:52:06 UTC,-73.99,40.73,-73.99,40.72,1\n");
        let path = write_csv(&dir, &body);

        let err = load_trips(&path).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidColumn { ref column, .. } if column == FARE_AMOUNT));
    }

    #[test]
    fn fractional_passenger_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!(
                "{BARE_HEADER}\n\
                 {GOOD_ROW}\n\
                 k2,8.0,2015-05-07 20:00:00 UTC,-73.99,40.73,-73.99,40.72,6.5\n"
            ),
        );
        let err = load_trips(&path).unwrap_err();
        assert!(matches!(err, LoaderError::NonIntegral { value, .. } if value == 6.5));
    }

    #[test]
    fn whole_float_passenger_counts_are_accepted() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!(
                "{BARE_HEADER}\n\
                 k1,7.5,2015-05-07 19:52:06 UTC,-73.99,40.73,-73.99,40.72,2.0\n\
                 k2,8.0,2015-05-07 20:00:00 UTC,-73.99,40.73,-73.99,40.72,\n"
            ),
        );
        let df = load_trips(&path).unwrap();
        let counts: Vec<Option<i64>> = df.column(PASSENGER_COUNT).unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(counts, vec![Some(2), None]);
    }

    #[test]
    fn profiles_report_nulls_and_statistics() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!(
                "{BARE_HEADER}\n\
                 k1,10.0,2015-05-07 19:52:06 UTC,-73.99,40.73,-73.99,40.72,1\n\
                 k2,20.0,2015-05-07 20:00:00 UTC,,40.73,-73.99,40.72,2\n\
                 k3,30.0,2015-05-07 21:00:00 UTC,-73.97,40.73,-73.99,40.72,3\n"
            ),
        );
        let df = load_trips(&path).unwrap();
        let profiles = profile_columns(&df).unwrap();
        assert_eq!(profiles.len(), REQUIRED_COLUMNS.len());

        let fare = profiles.iter().find(|p| p.name == FARE_AMOUNT).unwrap();
        assert_eq!(fare.null_count, 0);
        let stats = fare.summary.unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!((stats.min, stats.median, stats.max), (10.0, 20.0, 30.0));

        let longitude = profiles.iter().find(|p| p.name == PICKUP_LONGITUDE).unwrap();
        assert_eq!(longitude.null_count, 1);
        assert_eq!(longitude.summary.unwrap().count, 2);

        let key = profiles.iter().find(|p| p.name == KEY).unwrap();
        assert!(key.summary.is_none());
    }
}
