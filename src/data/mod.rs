//! Data module - CSV loading, cleaning and feature engineering

mod cleaner;
mod features;
mod loader;

pub use cleaner::clean_trips;
pub use features::{
    enrich_frame, enrich_trips, trips_from_frame, weekday_name, EnrichedTrip, PeakFlag,
    TimeCategory, TripRecord, WEEKDAYS,
};
pub use loader::load_trips;
