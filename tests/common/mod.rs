#![allow(dead_code)]

use std::path::{Path, PathBuf};

use household_dispatch::domain::{
    FlexibleLoad, InvestmentSpec, JsonDirectory, ParameterSet, ScenarioSource, StorageSpec,
};
use household_dispatch::optimizer::{DispatchOutcome, DispatchResult};

/// Primal accuracy expected from the interior-point backend
pub const TOL: f64 = 1e-6;

pub fn manifest_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

pub fn fixture_dir(name: &str) -> PathBuf {
    manifest_dir().join("tests").join("fixtures").join(name)
}

/// Parameters assembled from a scenario folder
pub fn load(dir: &Path) -> ParameterSet {
    let data = JsonDirectory::new(dir)
        .load()
        .unwrap_or_else(|e| panic!("loading {}: {e:#}", dir.display()));
    ParameterSet::assemble(&data).expect("assembling parameters")
}

/// Flat PV 1.0, flat price 1.0, GI = GE = 0.1, D = 10
pub fn flat_day() -> ParameterSet {
    load(&fixture_dir("flat_day"))
}

/// The sample day shipped under `data/`, with storage and investment
pub fn reference_day() -> ParameterSet {
    load(&manifest_dir().join("data").join("reference_day"))
}

/// No PV, unit prices, reference load of 1 kWh every hour
pub fn dark_day(discomfort_weight: f64) -> ParameterSet {
    ParameterSet::new(vec![0.0; 24], vec![1.0; 24], vec![1.0; 24], 0.1, 0.1)
        .with_flexible_load(FlexibleLoad::new(vec![1.0; 24], 3.0, discomfort_weight))
}

/// Cheap nights, expensive evenings, some midday PV
pub fn arbitrage_day() -> ParameterSet {
    let prices: Vec<f64> = (0..24)
        .map(|h| match h {
            0..=5 => 0.5,
            17..=21 => 3.0,
            _ => 1.5,
        })
        .collect();
    let pv: Vec<f64> = (0..24)
        .map(|h| if (9..=15).contains(&h) { 1.5 } else { 0.0 })
        .collect();
    ParameterSet::new(pv, prices.clone(), prices, 0.2, 0.2)
        .with_flexible_load(FlexibleLoad::new(vec![1.0; 24], 3.0, 2.0))
        .with_storage(StorageSpec::default())
        .with_investment(InvestmentSpec::new(0.05, 5.0))
}

pub fn outcome(result: &DispatchResult) -> &DispatchOutcome {
    assert!(
        result.is_optimal(),
        "expected an optimal solve, got {}",
        result.status
    );
    result.outcome.as_ref().expect("optimal result has an outcome")
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual} (tolerance {tol})"
    );
}
