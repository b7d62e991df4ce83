//! Charts module - Static chart rendering

mod plotter;
mod renderer;

pub use renderer::{ChartRenderer, CHART_FILES};
