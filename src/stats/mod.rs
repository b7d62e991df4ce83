//! Stats module - Grouped aggregates and descriptive statistics

mod calculator;

pub use calculator::{fares_by_time_category, CorrelationMatrix, FareSummary, GroupSummary, TripAnalysis};
