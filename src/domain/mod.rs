//! Core domain types and logic.

pub mod allocation;
pub mod backtest;
pub mod config_validation;
pub mod drawdown;
pub mod error;
pub mod metrics;
pub mod nav;
pub mod period;
pub mod returns;
pub mod rolling;
pub mod schedule;
pub mod simulation;
pub mod strategy;
