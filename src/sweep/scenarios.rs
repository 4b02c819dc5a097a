//! Preset sweeps for the four scenarios

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::{Knob, Sweep, SweepAxis, SweepError, SweepRange, TaggedResult};
use crate::domain::ParameterSet;
use crate::optimizer::{LpSolver, Scenario};

/// Discomfort weight used by the battery tolerance and cost sweeps
pub const SWEEP_DISCOMFORT_WEIGHT: f64 = 1.5;
/// Export tariff fixed during the sizing discomfort sweep
pub const SIZING_EXPORT_TARIFF: f64 = 0.4;

/// Vary the export tariff over `start..=stop` and re-solve `scenario` at each value
pub fn run_export_tariff_sweep(
    base: &ParameterSet,
    scenario: Scenario,
    start: f64,
    stop: f64,
    step: f64,
    solver: &dyn LpSolver,
) -> Result<Vec<TaggedResult>, SweepError> {
    Sweep::new(
        base.clone(),
        scenario,
        SweepAxis::new(Knob::ExportTariff, SweepRange::stepped(start, stop, step)),
    )
    .run(solver)
}

/// Buying price as a fraction of the selling price
pub fn run_buy_price_factor_sweep(
    base: &ParameterSet,
    scenario: Scenario,
    range: SweepRange,
    solver: &dyn LpSolver,
) -> Result<Vec<TaggedResult>, SweepError> {
    Sweep::new(
        base.clone(),
        scenario,
        SweepAxis::new(Knob::BuyPriceFactor, range),
    )
    .run(solver)
}

pub fn run_discomfort_sweep(
    base: &ParameterSet,
    scenario: Scenario,
    range: SweepRange,
    solver: &dyn LpSolver,
) -> Result<Vec<TaggedResult>, SweepError> {
    Sweep::new(
        base.clone(),
        scenario,
        SweepAxis::new(Knob::DiscomfortWeight, range),
    )
    .run(solver)
}

/// Battery unit cost over `points` evenly spaced values in `min_cost..=max_cost`
pub fn run_battery_cost_sweep(
    base: &ParameterSet,
    min_cost: f64,
    max_cost: f64,
    points: usize,
    solver: &dyn LpSolver,
) -> Result<Vec<TaggedResult>, SweepError> {
    Sweep::new(
        base.clone(),
        Scenario::BatterySizing,
        SweepAxis::new(
            Knob::BatteryUnitCost,
            SweepRange::linspace(min_cost, max_cost, points),
        ),
    )
    .run(solver)
}

/// Sweeps that can be requested by name from configuration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NamedSweep {
    BaseExportTariff,
    BaseBuyPriceFactor,
    FlexibleToleranceDiscomfort,
    BatteryExportTariff,
    BatteryBuyPriceFactor,
    BatteryDiscomfort,
    BatteryTolerance,
    SizingDiscomfort,
    SizingBatteryCost,
}

impl NamedSweep {
    pub fn scenario(self) -> Scenario {
        match self {
            NamedSweep::BaseExportTariff | NamedSweep::BaseBuyPriceFactor => Scenario::Base,
            NamedSweep::FlexibleToleranceDiscomfort => Scenario::FlexibleLoad,
            NamedSweep::BatteryExportTariff
            | NamedSweep::BatteryBuyPriceFactor
            | NamedSweep::BatteryDiscomfort
            | NamedSweep::BatteryTolerance => Scenario::Battery,
            NamedSweep::SizingDiscomfort | NamedSweep::SizingBatteryCost => {
                Scenario::BatterySizing
            }
        }
    }

    /// The preset sweep over `base`, with any fixed knobs already applied
    pub fn sweep(self, base: &ParameterSet) -> Result<Sweep, SweepError> {
        let mut base = base.clone();
        let axis = |knob, range| SweepAxis::new(knob, range);
        let export_tariffs = SweepRange::stepped(0.0, 2.6, 0.05);
        let buy_factors = SweepRange::stepped(0.0, 1.0, 0.1);

        let sweep = match self {
            NamedSweep::BaseExportTariff | NamedSweep::BatteryExportTariff => Sweep::new(
                base,
                self.scenario(),
                axis(Knob::ExportTariff, export_tariffs),
            ),
            NamedSweep::BaseBuyPriceFactor | NamedSweep::BatteryBuyPriceFactor => Sweep::new(
                base,
                self.scenario(),
                axis(Knob::BuyPriceFactor, buy_factors),
            ),
            NamedSweep::FlexibleToleranceDiscomfort => Sweep::nested(
                base,
                self.scenario(),
                axis(
                    Knob::ToleranceRatio,
                    SweepRange::stepped(0.0, 0.8, 0.1),
                ),
                axis(Knob::DiscomfortWeight, SweepRange::stepped(0.0, 4.0, 0.1)),
            ),
            NamedSweep::BatteryDiscomfort => Sweep::new(
                base,
                self.scenario(),
                axis(Knob::DiscomfortWeight, SweepRange::values(vec![1.0, 2.0, 3.0])),
            ),
            NamedSweep::BatteryTolerance => {
                base.set_discomfort_weight(SWEEP_DISCOMFORT_WEIGHT)?;
                Sweep::new(
                    base,
                    self.scenario(),
                    axis(
                        Knob::ToleranceRatio,
                        SweepRange::values(vec![0.2, 0.4, 0.6, 0.8]),
                    ),
                )
            }
            NamedSweep::SizingDiscomfort => {
                base.set_export_tariff(SIZING_EXPORT_TARIFF);
                Sweep::new(
                    base,
                    self.scenario(),
                    axis(Knob::DiscomfortWeight, SweepRange::linspace(0.0, 4.0, 20)),
                )
            }
            NamedSweep::SizingBatteryCost => {
                base.set_discomfort_weight(SWEEP_DISCOMFORT_WEIGHT)?;
                Sweep::new(
                    base,
                    self.scenario(),
                    axis(Knob::BatteryUnitCost, SweepRange::linspace(0.12, 1.0, 20)),
                )
            }
        };
        Ok(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlexibleLoad, InvestmentSpec, StorageSpec};
    use strum::IntoEnumIterator;

    fn base() -> ParameterSet {
        ParameterSet::new(vec![1.0; 4], vec![1.0; 4], vec![1.0; 4], 0.1, 0.1)
            .with_daily_demand(2.0)
            .with_flexible_load(FlexibleLoad::new(vec![1.0; 4], 3.0, 0.5))
            .with_storage(StorageSpec::default())
            .with_investment(InvestmentSpec::new(0.5, 10.0))
    }

    #[test]
    fn test_every_preset_builds() {
        for named in NamedSweep::iter() {
            let sweep = named.sweep(&base()).unwrap();
            assert_eq!(sweep.scenario(), named.scenario());
            assert!(!sweep.points().unwrap().is_empty(), "{named}");
        }
    }

    #[test]
    fn test_preset_grid_sizes() {
        let points = |named: NamedSweep| named.sweep(&base()).unwrap().points().unwrap().len();
        assert_eq!(points(NamedSweep::BaseExportTariff), 53);
        assert_eq!(points(NamedSweep::BaseBuyPriceFactor), 11);
        assert_eq!(points(NamedSweep::FlexibleToleranceDiscomfort), 9 * 41);
        assert_eq!(points(NamedSweep::SizingBatteryCost), 20);
    }

    #[test]
    fn test_fixed_knobs_applied_to_base() {
        let sweep = NamedSweep::SizingDiscomfort.sweep(&base()).unwrap();
        assert_eq!(sweep.base().export_tariff, SIZING_EXPORT_TARIFF);

        let sweep = NamedSweep::BatteryTolerance.sweep(&base()).unwrap();
        assert_eq!(
            sweep.base().flexible_load.as_ref().unwrap().discomfort_weight,
            SWEEP_DISCOMFORT_WEIGHT
        );
    }

    #[test]
    fn test_names_parse() {
        assert_eq!(
            "sizing_battery_cost".parse::<NamedSweep>().unwrap(),
            NamedSweep::SizingBatteryCost
        );
    }
}
