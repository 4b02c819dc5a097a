//! Scenario data: the parameter set fed into every dispatch model and the
//! loader that assembles it from raw scenario inputs.

pub mod inputs;
pub mod params;
pub mod storage;

pub use inputs::{JsonDirectory, ScenarioData, ScenarioSource};
pub use params::{
    FlexibleLoad, GridLimits, ParameterError, ParameterSet, DEFAULT_MAX_EXPORT_KWH,
    DEFAULT_MAX_IMPORT_KWH,
};
pub use storage::{InvestmentSpec, StorageSpec, HOURS_PER_YEAR};
