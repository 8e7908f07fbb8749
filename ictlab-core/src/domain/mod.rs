//! Domain types for ictlab

pub mod bar;
pub mod params;
pub mod trade;

pub use bar::{validate_series, Bar, BarError};
pub use params::{names, ParameterSet};
pub use trade::{Direction, EquityPoint, ExitReason, Trade};
