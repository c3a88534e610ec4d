//! Command implementations for the Taxi CLI

pub mod metric;
pub mod overview;
pub mod simulate;
pub mod status;
