//! Core domain types and logic.

pub mod analyze;
pub mod candlestick;
pub mod commission;
pub mod config_validation;
pub mod error;
pub mod invest;
pub mod position;
pub mod ranking;
pub mod rng;
pub mod simulator;
pub mod statistics;
pub mod store;
pub mod universe;
