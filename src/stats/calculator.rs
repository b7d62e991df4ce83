//! Statistics Calculator Module
//! Grouped fare aggregates, descriptive statistics, IQR outliers and
//! correlations over enriched trips.

use crate::data::{weekday_name, EnrichedTrip, PeakFlag, TimeCategory, WEEKDAYS};
use chrono::{NaiveDateTime, Weekday};
use std::collections::BTreeMap;

/// Whisker multiplier for IQR outlier detection.
pub const IQR_FENCE: f64 = 1.5;

/// Mean fare and ride count for one group value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupSummary {
    pub count: usize,
    /// `None` when the group has no members.
    pub mean_fare: Option<f64>,
}

impl GroupSummary {
    pub fn from_fares(fares: &[f64]) -> Self {
        Self {
            count: fares.len(),
            mean_fare: mean(fares),
        }
    }
}

/// Group trips by a key and reduce each group to its mean fare and count.
pub fn group_by_key<K, F>(trips: &[EnrichedTrip], key: F) -> BTreeMap<K, GroupSummary>
where
    K: Ord,
    F: Fn(&EnrichedTrip) -> K,
{
    let mut fares: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for trip in trips {
        fares.entry(key(trip)).or_default().push(trip.fare());
    }
    fares
        .into_iter()
        .map(|(k, values)| (k, GroupSummary::from_fares(&values)))
        .collect()
}

pub fn by_hour(trips: &[EnrichedTrip]) -> BTreeMap<u32, GroupSummary> {
    group_by_key(trips, |t| t.hour)
}

pub fn by_month(trips: &[EnrichedTrip]) -> BTreeMap<u32, GroupSummary> {
    group_by_key(trips, |t| t.month)
}

pub fn by_passenger_count(trips: &[EnrichedTrip]) -> BTreeMap<u8, GroupSummary> {
    group_by_key(trips, |t| t.trip.passenger_count)
}

/// Monday..Sunday; days without rides keep a zero count and no mean.
pub fn by_weekday(trips: &[EnrichedTrip]) -> Vec<(Weekday, GroupSummary)> {
    let grouped = group_by_key(trips, |t| t.weekday_num());
    WEEKDAYS
        .iter()
        .map(|day| {
            let summary = grouped
                .get(&day.num_days_from_monday())
                .copied()
                .unwrap_or_default();
            (*day, summary)
        })
        .collect()
}

/// Off-Peak then Peak, both always present.
pub fn by_peak(trips: &[EnrichedTrip]) -> Vec<(PeakFlag, GroupSummary)> {
    let grouped = group_by_key(trips, |t| t.peak);
    PeakFlag::ALL
        .iter()
        .map(|flag| (*flag, grouped.get(flag).copied().unwrap_or_default()))
        .collect()
}

/// Raw fares per time category, Morning..Night.
pub fn fares_by_time_category(trips: &[EnrichedTrip]) -> Vec<(TimeCategory, Vec<f64>)> {
    TimeCategory::ALL
        .iter()
        .map(|category| {
            let fares = trips
                .iter()
                .filter(|t| t.time_category == *category)
                .map(EnrichedTrip::fare)
                .collect();
            (*category, fares)
        })
        .collect()
}

/// Descriptive statistics of the fare column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1); zero for a single value.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub outlier_count: usize,
}

impl FareSummary {
    /// `None` for an empty input.
    pub fn compute(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n == 0 {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        let q1 = percentile(&sorted, 25.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let (low, high) = (q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr);
        let outlier_count = values.iter().filter(|&&v| v < low || v > high).count();

        Some(Self {
            count: n,
            mean,
            median,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[n - 1],
            q1,
            q3,
            outlier_count,
        })
    }

    pub fn outlier_share(&self) -> f64 {
        self.outlier_count as f64 / self.count as f64
    }
}

/// Arithmetic mean, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Calculate percentile using linear interpolation (NumPy compatible).
pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_values[0];
    }

    let rank = (p / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(n - 1);
    let frac = rank - lower as f64;

    if lower == upper {
        sorted_values[lower]
    } else {
        sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
    }
}

/// Pearson correlation coefficient.
///
/// `None` for mismatched lengths, fewer than two points, or a constant input.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        None
    } else {
        Some((cov / denom).clamp(-1.0, 1.0))
    }
}

/// Pairwise Pearson correlations over the numeric trip features.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<&'static str>,
    /// Row-major, `labels.len()` squared entries.
    pub values: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    pub const LABELS: [&'static str; 5] =
        ["fare_amount", "distance", "passenger_count", "hour", "month"];

    pub fn compute(trips: &[EnrichedTrip]) -> Self {
        let columns: [Vec<f64>; 5] = [
            trips.iter().map(EnrichedTrip::fare).collect(),
            trips.iter().map(|t| t.distance).collect(),
            trips.iter().map(|t| f64::from(t.trip.passenger_count)).collect(),
            trips.iter().map(|t| f64::from(t.hour)).collect(),
            trips.iter().map(|t| f64::from(t.month)).collect(),
        ];

        let n = columns.len();
        let mut values = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let r = if i == j {
                    pearson(&columns[i], &columns[j]).map(|_| 1.0)
                } else {
                    pearson(&columns[i], &columns[j])
                };
                values.push(r);
            }
        }

        Self {
            labels: Self::LABELS.to_vec(),
            values,
        }
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row * self.size() + col).copied().flatten()
    }
}

/// Every aggregate the charts and the report consume.
#[derive(Debug, Clone)]
pub struct TripAnalysis {
    pub record_count: usize,
    pub fares: Option<FareSummary>,
    pub hourly: BTreeMap<u32, GroupSummary>,
    pub weekday: Vec<(Weekday, GroupSummary)>,
    pub monthly: BTreeMap<u32, GroupSummary>,
    pub passengers: BTreeMap<u8, GroupSummary>,
    pub peak: Vec<(PeakFlag, GroupSummary)>,
    pub mean_distance: Option<f64>,
    pub fare_distance_correlation: Option<f64>,
    pub mean_passengers: Option<f64>,
    pub max_passengers: Option<u8>,
    pub time_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub correlations: CorrelationMatrix,
}

impl TripAnalysis {
    pub fn compute(trips: &[EnrichedTrip]) -> Self {
        let fares: Vec<f64> = trips.iter().map(EnrichedTrip::fare).collect();
        let distances: Vec<f64> = trips.iter().map(|t| t.distance).collect();
        let passenger_counts: Vec<f64> = trips
            .iter()
            .map(|t| f64::from(t.trip.passenger_count))
            .collect();

        let time_range = trips
            .iter()
            .map(|t| t.trip.pickup)
            .min()
            .zip(trips.iter().map(|t| t.trip.pickup).max());

        Self {
            record_count: trips.len(),
            fares: FareSummary::compute(&fares),
            hourly: by_hour(trips),
            weekday: by_weekday(trips),
            monthly: by_month(trips),
            passengers: by_passenger_count(trips),
            peak: by_peak(trips),
            mean_distance: mean(&distances),
            fare_distance_correlation: pearson(&fares, &distances),
            mean_passengers: mean(&passenger_counts),
            max_passengers: trips.iter().map(|t| t.trip.passenger_count).max(),
            time_range,
            correlations: CorrelationMatrix::compute(trips),
        }
    }

    /// Weekday with the most rides; earliest day wins ties.
    pub fn busiest_day(&self) -> Option<(Weekday, usize)> {
        self.weekday
            .iter()
            .filter(|(_, s)| s.count > 0)
            .fold(None, |best: Option<(Weekday, usize)>, (day, s)| match best {
                Some((_, count)) if count >= s.count => best,
                _ => Some((*day, s.count)),
            })
    }

    /// Weekday with the highest mean fare; earliest day wins ties.
    pub fn highest_fare_day(&self) -> Option<(Weekday, f64)> {
        self.weekday
            .iter()
            .filter_map(|(day, s)| s.mean_fare.map(|m| (*day, m)))
            .fold(None, |best: Option<(Weekday, f64)>, (day, m)| match best {
                Some((_, top)) if top >= m => best,
                _ => Some((day, m)),
            })
    }

    /// Most frequent passenger count; the lowest value wins ties.
    pub fn passenger_mode(&self) -> Option<u8> {
        self.passengers
            .iter()
            .fold(None, |best: Option<(u8, usize)>, (value, s)| match best {
                Some((_, count)) if count >= s.count => best,
                _ => Some((*value, s.count)),
            })
            .map(|(value, _)| value)
    }

    pub fn busiest_day_name(&self) -> Option<&'static str> {
        self.busiest_day().map(|(day, _)| weekday_name(day))
    }
}
