#![cfg(feature = "optimization")]
//! Sweep harness against the Clarabel backend

mod common;

use std::sync::Arc;

use common::*;
use household_dispatch::optimizer::{ClarabelSolver, LpSolver, Scenario};
use household_dispatch::report;
use household_dispatch::sweep::{
    run_battery_cost_sweep, run_discomfort_sweep, run_export_tariff_sweep, run_parallel, Knob,
    NamedSweep, Sweep, SweepAxis, SweepRange,
};

#[test]
fn test_export_tariff_sweep_ordering() {
    let records =
        run_export_tariff_sweep(&flat_day(), Scenario::Base, 0.0, 1.0, 0.5, &ClarabelSolver)
            .unwrap();

    assert_eq!(records.len(), 3);
    let tags: Vec<f64> = records
        .iter()
        .map(|r| r.tag(Knob::ExportTariff).unwrap())
        .collect();
    assert_eq!(tags, vec![0.0, 0.5, 1.0]);
    assert!(records.iter().all(|r| r.result.is_optimal()));

    // selling at 1.0 - GE, 14 kWh surplus
    assert_close(records[0].result.objective().unwrap(), 14.0, 1e-5);
    assert_close(records[1].result.objective().unwrap(), 7.0, 1e-5);
    assert_close(records[2].result.objective().unwrap(), 0.0, 1e-5);
}

#[test]
fn test_export_revenue_non_increasing_in_export_tariff() {
    let records = run_export_tariff_sweep(
        &reference_day(),
        Scenario::Base,
        0.0,
        2.6,
        0.2,
        &ClarabelSolver,
    )
    .unwrap();

    let revenue: Vec<f64> = records
        .iter()
        .map(|r| outcome(&r.result).breakdown.export_revenue)
        .collect();
    for pair in revenue.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-5, "export revenue rose: {pair:?}");
    }
    assert!(revenue[0] > *revenue.last().unwrap());
}

#[test]
fn test_deviation_non_increasing_in_discomfort_weight() {
    let records = run_discomfort_sweep(
        &reference_day(),
        Scenario::FlexibleLoad,
        SweepRange::values(vec![0.11, 0.57, 1.13, 1.71, 2.63, 3.37]),
        &ClarabelSolver,
    )
    .unwrap();

    let deviation: Vec<f64> = records
        .iter()
        .map(|r| outcome(&r.result).totals.deviation.unwrap())
        .collect();
    for pair in deviation.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-5, "deviation rose: {pair:?}");
    }
}

#[test]
fn test_battery_cost_sweep_uses_its_own_cost() {
    let base = arbitrage_day();
    let records = run_battery_cost_sweep(&base, 0.12, 1.0, 5, &ClarabelSolver).unwrap();

    assert_eq!(records.len(), 5);
    for record in &records {
        let cost = record.tag(Knob::BatteryUnitCost).unwrap();
        let outcome = outcome(&record.result);
        let scale = outcome.battery_scale.unwrap();
        assert_close(outcome.breakdown.battery_cost.unwrap(), cost * 6.0 * scale, 1e-9);
    }

    // installed capacity never grows as it gets more expensive
    let scales: Vec<f64> = records
        .iter()
        .map(|r| outcome(&r.result).battery_scale.unwrap())
        .collect();
    for pair in scales.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-4, "scale rose with cost: {pair:?}");
    }

    // the base set is never touched by the sweep
    assert_eq!(base.investment.as_ref().unwrap().unit_cost, 0.05);
}

#[test]
fn test_tolerance_preset_runs_end_to_end() {
    let sweep = NamedSweep::BatteryTolerance.sweep(&arbitrage_day()).unwrap();
    let records = sweep.run(&ClarabelSolver).unwrap();

    assert_eq!(records.len(), 4);
    let table = report::sweep_table(&records);
    assert_eq!(table.lines().count(), 4);
    assert!(table.lines().all(|line| line.contains("optimal")));
}

#[test]
fn test_two_axis_sweep_outer_major() {
    let tolerances = [0.0, 0.4];
    let weights = [0.5, 1.5, 3.0];
    let sweep = Sweep::nested(
        reference_day(),
        Scenario::FlexibleLoad,
        SweepAxis::new(Knob::ToleranceRatio, SweepRange::values(tolerances.to_vec())),
        SweepAxis::new(Knob::DiscomfortWeight, SweepRange::values(weights.to_vec())),
    );
    let records = sweep.run(&ClarabelSolver).unwrap();

    assert_eq!(records.len(), 6);
    for (i, record) in records.iter().enumerate() {
        let knobs: Vec<Knob> = record.tags.iter().map(|tag| tag.knob).collect();
        assert_eq!(knobs, vec![Knob::ToleranceRatio, Knob::DiscomfortWeight]);
        assert_eq!(record.tag(Knob::ToleranceRatio), Some(tolerances[i / 3]));
        assert_eq!(record.tag(Knob::DiscomfortWeight), Some(weights[i % 3]));
        assert!(record.result.is_optimal());
    }

    let objective = |i: usize| records[i].result.objective().unwrap();
    let deviation = |i: usize| outcome(&records[i].result).totals.deviation.unwrap();
    for row in [0, 3] {
        // stiffer penalty, less deviation and a lower objective
        assert!(deviation(row + 1) <= deviation(row) + 1e-5);
        assert!(deviation(row + 2) <= deviation(row + 1) + 1e-5);
        assert!(objective(row + 1) <= objective(row) + 1e-5);
        assert!(objective(row + 2) <= objective(row + 1) + 1e-5);
    }
    // a wider free band never hurts at the same weight
    for col in 0..3 {
        assert!(objective(col + 3) >= objective(col) - 1e-5);
    }
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let sweep = NamedSweep::BaseBuyPriceFactor.sweep(&reference_day()).unwrap();
    let solver: Arc<dyn LpSolver> = Arc::new(ClarabelSolver);

    let sequential = sweep.run(solver.as_ref()).unwrap();
    let parallel = run_parallel(&sweep, Arc::clone(&solver), 4).await.unwrap();

    assert_eq!(sequential.len(), parallel.len());
    for (s, p) in sequential.iter().zip(&parallel) {
        assert_eq!(s.tags, p.tags);
        assert_eq!(s.result.status, p.result.status);
        assert_close(
            s.result.objective().unwrap(),
            p.result.objective().unwrap(),
            1e-9,
        );
    }
}
