//! Trip Cleaner Module
//! Drops incomplete rows and out-of-range fares / passenger counts.

use super::loader::{FARE_AMOUNT, PASSENGER_COUNT};
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

/// Fares must be strictly greater than this.
pub const MIN_FARE_EXCLUSIVE: f64 = 0.0;
/// Fares must be strictly lower than this (larger values are entry errors).
pub const MAX_FARE_EXCLUSIVE: f64 = 200.0;
/// Largest passenger count considered realistic.
pub const MAX_PASSENGERS: i64 = 6;

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Row counts observed while cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningReport {
    pub initial_rows: usize,
    pub missing_dropped: usize,
    pub invalid_dropped: usize,
    pub final_rows: usize,
}

/// Range predicate a complete trip row must satisfy.
pub fn valid_trip_predicate() -> Expr {
    col(FARE_AMOUNT)
        .gt(lit(MIN_FARE_EXCLUSIVE))
        .and(col(FARE_AMOUNT).lt(lit(MAX_FARE_EXCLUSIVE)))
        .and(col(PASSENGER_COUNT).gt(lit(0i64)))
        .and(col(PASSENGER_COUNT).lt_eq(lit(MAX_PASSENGERS)))
}

/// Keep only complete rows inside the valid fare and passenger ranges.
///
/// Rows are never repaired. The filter is a conjunction, so applying it to
/// its own output returns the same frame.
pub fn clean_trips(df: &DataFrame) -> Result<(DataFrame, CleaningReport), CleanerError> {
    let initial_rows = df.height();

    let complete = drop_incomplete(df)?;
    let after_missing = complete.height();

    let cleaned = complete.lazy().filter(valid_trip_predicate()).collect()?;

    let report = CleaningReport {
        initial_rows,
        missing_dropped: initial_rows - after_missing,
        invalid_dropped: after_missing - cleaned.height(),
        final_rows: cleaned.height(),
    };
    info!(
        missing = report.missing_dropped,
        invalid = report.invalid_dropped,
        remaining = report.final_rows,
        "Cleaned dataset"
    );
    Ok((cleaned, report))
}

/// Drop every row holding a null in any column, or NaN in a float column.
fn drop_incomplete(df: &DataFrame) -> Result<DataFrame, CleanerError> {
    let nan_as_null: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|column| column.dtype().is_float())
        .map(|column| col(column.name().clone()).fill_nan(lit(NULL)))
        .collect();

    let complete = df
        .clone()
        .lazy()
        .with_columns(nan_as_null)
        .collect()?
        .drop_nulls::<String>(None)?;
    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{KEY, PICKUP_LONGITUDE};

    fn sample_frame() -> DataFrame {
        df!(
            KEY => &["a", "b", "c", "d", "e", "f", "g", "h"],
            FARE_AMOUNT => &[Some(10.0), Some(-5.0), Some(0.0), Some(200.0), Some(199.99), None, Some(25.0), Some(12.0)],
            PASSENGER_COUNT => &[Some(1i64), Some(1), Some(2), Some(1), Some(6), Some(1), Some(0), Some(7)],
        )
        .unwrap()
    }

    #[test]
    fn keeps_only_rows_inside_bounds() {
        let (cleaned, report) = clean_trips(&sample_frame()).unwrap();

        let keys: Vec<&str> = cleaned
            .column(KEY)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(keys, vec!["a", "e"]);
        assert_eq!(
            report,
            CleaningReport {
                initial_rows: 8,
                missing_dropped: 1,
                invalid_dropped: 5,
                final_rows: 2,
            }
        );
    }

    #[test]
    fn cleaned_rows_satisfy_invariants() {
        let (cleaned, _) = clean_trips(&sample_frame()).unwrap();

        let fares = cleaned.column(FARE_AMOUNT).unwrap().f64().unwrap().clone();
        let passengers = cleaned.column(PASSENGER_COUNT).unwrap().i64().unwrap().clone();
        assert_eq!(fares.null_count(), 0);
        assert_eq!(passengers.null_count(), 0);
        assert!(fares.into_no_null_iter().all(|f| f > 0.0 && f < 200.0));
        assert!(passengers.into_no_null_iter().all(|p| p > 0 && p <= 6));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let (once, _) = clean_trips(&sample_frame()).unwrap();
        let (twice, report) = clean_trips(&once).unwrap();

        assert!(once.equals(&twice));
        assert_eq!(report.missing_dropped + report.invalid_dropped, 0);
    }

    #[test]
    fn null_in_any_column_drops_the_row() {
        let df = df!(
            KEY => &[Some("a"), None],
            FARE_AMOUNT => &[10.0, 11.0],
            PASSENGER_COUNT => &[1i64, 1],
        )
        .unwrap();
        let (cleaned, report) = clean_trips(&df).unwrap();
        assert_eq!(cleaned.height(), 1);
        assert_eq!(report.missing_dropped, 1);
    }

    #[test]
    fn nan_float_counts_as_missing() {
        let df = df!(
            KEY => &["a", "b", "c"],
            FARE_AMOUNT => &[10.0, f64::NAN, 12.0],
            PICKUP_LONGITUDE => &[-73.99, -73.98, f64::NAN],
            PASSENGER_COUNT => &[1i64, 1, 2],
        )
        .unwrap();
        let (cleaned, report) = clean_trips(&df).unwrap();

        assert_eq!(cleaned.height(), 1);
        assert_eq!(report.missing_dropped, 2);
        assert_eq!(report.invalid_dropped, 0);
        let longitude = cleaned.column(PICKUP_LONGITUDE).unwrap().f64().unwrap().get(0);
        assert_eq!(longitude, Some(-73.99));
    }
}
