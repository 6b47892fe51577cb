//! Monte Carlo runway simulator for early-stage businesses.
//!
//! [`simulation`] runs independent month-by-month trials of cash and client
//! counts under market shocks, strategic events and competitor pressure;
//! [`analysis`] reduces the trials to survival statistics and a 0–20 score.
//! [`report`] renders both as text for the command-line tools.

pub mod analysis;
pub mod config;
pub mod error;
pub mod events;
pub mod market;
pub mod report;
pub mod simulation;
pub mod types;
