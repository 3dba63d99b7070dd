//! Hourly thermal risk analysis for overhead transmission-line conductors.
//!
//! Given a line route, conductor parameters, a current schedule and hourly
//! observations from a sparse set of weather stations, the crate estimates
//! the distribution of conductor temperature at every discretized point of
//! the line and every hour, and from it the confidence-level temperature and
//! the probability of exceeding the design temperature.
#![warn(missing_docs)]
pub mod commands;
#[cfg(test)]
pub mod fixture;
pub mod geodesy;
pub mod input;
pub mod kriging;
pub mod log;
pub mod model;
pub mod montecarlo;
pub mod numerics;
pub mod output;
pub mod risk;
pub mod settings;
pub mod simulation;
pub mod thermal;
pub mod wind;
