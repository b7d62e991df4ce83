//! Feature Engineering Module
//! Turns cleaned rows into typed trips and derives calendar, peak, time-of-day
//! and distance features.

use super::loader::{
    DROPOFF_LATITUDE, DROPOFF_LONGITUDE, FARE_AMOUNT, PASSENGER_COUNT, PICKUP_DATETIME,
    PICKUP_LATITUDE, PICKUP_LONGITUDE,
};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Weekday};
use polars::prelude::*;
use std::fmt;
use thiserror::Error;

/// Weekdays in reporting order.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Unparsable pickup timestamp {value:?}")]
    InvalidTimestamp { value: String },
    #[error("Missing {column} in row {row}")]
    MissingValue { column: &'static str, row: usize },
    #[error("Passenger count {0} out of range")]
    InvalidPassengerCount(i64),
}

/// One cleaned trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripRecord {
    pub pickup: NaiveDateTime,
    pub pickup_longitude: f64,
    pub pickup_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_latitude: f64,
    pub fare_amount: f64,
    pub passenger_count: u8,
}

/// Commute-window indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeakFlag {
    OffPeak,
    Peak,
}

impl PeakFlag {
    /// Both flags in the order they are reported.
    pub const ALL: [PeakFlag; 2] = [PeakFlag::OffPeak, PeakFlag::Peak];

    /// Peak iff the hour falls in 7-9 or 17-19, bounds inclusive.
    pub fn from_hour(hour: u32) -> Self {
        if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
            PeakFlag::Peak
        } else {
            PeakFlag::OffPeak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PeakFlag::Peak => "Peak",
            PeakFlag::OffPeak => "Off-Peak",
        }
    }
}

impl fmt::Display for PeakFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Four-way split of the day. Independent of [`PeakFlag`]: hours 17-19 are
/// both `Peak` and `Evening`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeCategory {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeCategory {
    pub const ALL: [TimeCategory; 4] = [
        TimeCategory::Morning,
        TimeCategory::Afternoon,
        TimeCategory::Evening,
        TimeCategory::Night,
    ];

    /// [5,12) Morning, [12,17) Afternoon, [17,21) Evening, otherwise Night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeCategory::Morning,
            12..=16 => TimeCategory::Afternoon,
            17..=20 => TimeCategory::Evening,
            _ => TimeCategory::Night,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeCategory::Morning => "Morning",
            TimeCategory::Afternoon => "Afternoon",
            TimeCategory::Evening => "Evening",
            TimeCategory::Night => "Night",
        }
    }
}

impl fmt::Display for TimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Full English weekday name.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Euclidean norm of the coordinate delta, in raw degrees (not geodesic).
pub fn coordinate_distance(
    pickup_longitude: f64,
    pickup_latitude: f64,
    dropoff_longitude: f64,
    dropoff_latitude: f64,
) -> f64 {
    (dropoff_longitude - pickup_longitude).hypot(dropoff_latitude - pickup_latitude)
}

/// Parse a pickup timestamp, keeping its calendar fields as written.
///
/// Accepts `2015-05-07 19:52:06 UTC`, the same without the zone suffix
/// (optionally with fractional seconds or a `T` separator) and RFC 3339.
pub fn parse_pickup_timestamp(raw: &str) -> Result<NaiveDateTime, FeatureError> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_suffix("UTC").unwrap_or(trimmed).trim_end();

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(stripped, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .ok_or_else(|| FeatureError::InvalidTimestamp {
            value: raw.to_string(),
        })
}

/// Trip plus every derived feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichedTrip {
    pub trip: TripRecord,
    pub hour: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: Weekday,
    pub peak: PeakFlag,
    pub time_category: TimeCategory,
    pub distance: f64,
}

impl EnrichedTrip {
    pub fn derive(trip: TripRecord) -> Self {
        let hour = trip.pickup.hour();
        Self {
            trip,
            hour,
            day: trip.pickup.day(),
            month: trip.pickup.month(),
            year: trip.pickup.year(),
            weekday: trip.pickup.weekday(),
            peak: PeakFlag::from_hour(hour),
            time_category: TimeCategory::from_hour(hour),
            distance: coordinate_distance(
                trip.pickup_longitude,
                trip.pickup_latitude,
                trip.dropoff_longitude,
                trip.dropoff_latitude,
            ),
        }
    }

    /// 0 = Monday .. 6 = Sunday.
    pub fn weekday_num(&self) -> u32 {
        self.weekday.num_days_from_monday()
    }

    pub fn fare(&self) -> f64 {
        self.trip.fare_amount
    }
}

/// Read typed trips from a cleaned frame, in row order.
pub fn trips_from_frame(df: &DataFrame) -> Result<Vec<TripRecord>, FeatureError> {
    let timestamps = df.column(PICKUP_DATETIME)?.cast(&DataType::String)?;
    let timestamps = timestamps.str()?;
    let fares = df.column(FARE_AMOUNT)?.f64()?;
    let pickup_lon = df.column(PICKUP_LONGITUDE)?.f64()?;
    let pickup_lat = df.column(PICKUP_LATITUDE)?.f64()?;
    let dropoff_lon = df.column(DROPOFF_LONGITUDE)?.f64()?;
    let dropoff_lat = df.column(DROPOFF_LATITUDE)?.f64()?;
    let passengers = df.column(PASSENGER_COUNT)?.i64()?;

    let value = |v: Option<f64>, column: &'static str, row: usize| {
        v.ok_or(FeatureError::MissingValue { column, row })
    };

    (0..df.height())
        .map(|row| {
            let raw_ts = timestamps.get(row).ok_or(FeatureError::MissingValue {
                column: PICKUP_DATETIME,
                row,
            })?;
            let raw_passengers = passengers.get(row).ok_or(FeatureError::MissingValue {
                column: PASSENGER_COUNT,
                row,
            })?;
            let passenger_count = u8::try_from(raw_passengers)
                .map_err(|_| FeatureError::InvalidPassengerCount(raw_passengers))?;

            Ok(TripRecord {
                pickup: parse_pickup_timestamp(raw_ts)?,
                pickup_longitude: value(pickup_lon.get(row), PICKUP_LONGITUDE, row)?,
                pickup_latitude: value(pickup_lat.get(row), PICKUP_LATITUDE, row)?,
                dropoff_longitude: value(dropoff_lon.get(row), DROPOFF_LONGITUDE, row)?,
                dropoff_latitude: value(dropoff_lat.get(row), DROPOFF_LATITUDE, row)?,
                fare_amount: value(fares.get(row), FARE_AMOUNT, row)?,
                passenger_count,
            })
        })
        .collect()
}

/// Derive features for every trip.
pub fn enrich_trips(trips: &[TripRecord]) -> Vec<EnrichedTrip> {
    trips.iter().copied().map(EnrichedTrip::derive).collect()
}

/// Append the derived feature columns to the cleaned frame.
///
/// `enriched` must hold one entry per row of `df`, in row order.
pub fn enrich_frame(df: &DataFrame, enriched: &[EnrichedTrip]) -> Result<DataFrame, FeatureError> {
    let columns = vec![
        Column::new("hour".into(), enriched.iter().map(|t| t.hour as i32).collect::<Vec<_>>()),
        Column::new("day".into(), enriched.iter().map(|t| t.day as i32).collect::<Vec<_>>()),
        Column::new("month".into(), enriched.iter().map(|t| t.month as i32).collect::<Vec<_>>()),
        Column::new("year".into(), enriched.iter().map(|t| t.year).collect::<Vec<_>>()),
        Column::new(
            "weekday".into(),
            enriched
                .iter()
                .map(|t| weekday_name(t.weekday))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "weekday_num".into(),
            enriched
                .iter()
                .map(|t| t.weekday_num() as i32)
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "is_peak".into(),
            enriched.iter().map(|t| t.peak.label()).collect::<Vec<_>>(),
        ),
        Column::new(
            "time_category".into(),
            enriched
                .iter()
                .map(|t| t.time_category.label())
                .collect::<Vec<_>>(),
        ),
        Column::new("distance".into(), enriched.iter().map(|t| t.distance).collect::<Vec<_>>()),
    ];

    Ok(df.hstack(&columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::KEY;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn trip_at(hour: u32) -> TripRecord {
        TripRecord {
            pickup: NaiveDate::from_ymd_opt(2015, 5, 7)
                .unwrap()
                .and_hms_opt(hour, 52, 6)
                .unwrap(),
            pickup_longitude: -73.999817,
            pickup_latitude: 40.738354,
            dropoff_longitude: -73.999512,
            dropoff_latitude: 40.723217,
            fare_amount: 7.5,
            passenger_count: 1,
        }
    }

    #[test]
    fn peak_flag_boundaries() {
        assert_eq!(PeakFlag::from_hour(6), PeakFlag::OffPeak);
        assert_eq!(PeakFlag::from_hour(7), PeakFlag::Peak);
        assert_eq!(PeakFlag::from_hour(9), PeakFlag::Peak);
        assert_eq!(PeakFlag::from_hour(10), PeakFlag::OffPeak);
        assert_eq!(PeakFlag::from_hour(17), PeakFlag::Peak);
        assert_eq!(PeakFlag::from_hour(19), PeakFlag::Peak);
        assert_eq!(PeakFlag::from_hour(20), PeakFlag::OffPeak);

        let peak_hours: Vec<u32> = (0..24)
            .filter(|h| PeakFlag::from_hour(*h) == PeakFlag::Peak)
            .collect();
        assert_eq!(peak_hours, vec![7, 8, 9, 17, 18, 19]);
    }

    #[test]
    fn time_categories_partition_the_day() {
        let expected = [
            (0..5, TimeCategory::Night),
            (5..12, TimeCategory::Morning),
            (12..17, TimeCategory::Afternoon),
            (17..21, TimeCategory::Evening),
            (21..24, TimeCategory::Night),
        ];
        let mut covered = 0;
        for (hours, category) in expected {
            for hour in hours {
                assert_eq!(TimeCategory::from_hour(hour), category, "hour {hour}");
                covered += 1;
            }
        }
        assert_eq!(covered, 24);
    }

    #[test]
    fn evening_peak_overlap_is_allowed() {
        let trip = EnrichedTrip::derive(trip_at(18));
        assert_eq!(trip.peak, PeakFlag::Peak);
        assert_eq!(trip.time_category, TimeCategory::Evening);
    }

    #[test]
    fn distance_is_euclidean_in_degrees() {
        assert_relative_eq!(coordinate_distance(0.0, 0.0, 3.0, 4.0), 5.0);
        assert_eq!(coordinate_distance(-73.9, 40.7, -73.9, 40.7), 0.0);
        assert_relative_eq!(
            coordinate_distance(1.0, 2.0, -2.0, 6.0),
            coordinate_distance(-2.0, 6.0, 1.0, 2.0)
        );
        assert!(coordinate_distance(1.0, 2.0, 1.0, 2.000001) > 0.0);
    }

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 5, 7)
            .unwrap()
            .and_hms_opt(19, 52, 6)
            .unwrap();
        for raw in [
            "2015-05-07 19:52:06 UTC",
            "2015-05-07 19:52:06",
            "2015-05-07T19:52:06",
            "2015-05-07 19:52:06.000",
            "2015-05-07T19:52:06+00:00",
        ] {
            assert_eq!(parse_pickup_timestamp(raw).unwrap(), expected, "{raw}");
        }
        assert!(matches!(
            parse_pickup_timestamp("yesterday"),
            Err(FeatureError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn derives_calendar_fields() {
        // 2015-05-07 was a Thursday.
        let trip = EnrichedTrip::derive(trip_at(19));
        assert_eq!((trip.year, trip.month, trip.day, trip.hour), (2015, 5, 7, 19));
        assert_eq!(weekday_name(trip.weekday), "Thursday");
        assert_eq!(trip.weekday_num(), 3);
        assert!(trip.distance > 0.0);
    }

    #[test]
    fn frame_round_trip_appends_feature_columns() {
        let df = df!(
            KEY => &["a", "b"],
            FARE_AMOUNT => &[7.5, 12.0],
            PICKUP_DATETIME => &["2015-05-07 19:52:06 UTC", "2009-07-17 08:04:56 UTC"],
            PICKUP_LONGITUDE => &[-73.99, -73.98],
            PICKUP_LATITUDE => &[40.73, 40.72],
            DROPOFF_LONGITUDE => &[-73.99, -73.95],
            DROPOFF_LATITUDE => &[40.72, 40.76],
            PASSENGER_COUNT => &[1i64, 3],
        )
        .unwrap();

        let trips = trips_from_frame(&df).unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[1].passenger_count, 3);

        let enriched = enrich_trips(&trips);
        let frame = enrich_frame(&df, &enriched).unwrap();
        assert_eq!(frame.width(), df.width() + 9);
        assert_eq!(frame.height(), 2);

        let peaks: Vec<&str> = frame
            .column("is_peak")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(peaks, vec!["Peak", "Peak"]);
        let weekdays: Vec<&str> = frame
            .column("weekday")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(weekdays, vec!["Thursday", "Friday"]);
    }
}
