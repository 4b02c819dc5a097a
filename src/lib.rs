//! Household Dispatch
//!
//! Linear-programming dispatch of a single household: PV, grid import and
//! export, flexible load and battery storage over a discrete horizon, with
//! shadow-price extraction and parameter sweeps.

pub mod config;
pub mod domain;
pub mod optimizer;
pub mod report;
pub mod sweep;
pub mod telemetry;
