//! Normalized result records
//!
//! A record is created once per solve and never mutated afterwards. Optional
//! sections are omitted from the serialized form when the scenario has no such
//! feature, so a consumer can tell "not applicable" from "zero".

use serde::{Deserialize, Serialize};

use super::{
    ConstraintFamily, DispatchModel, LpSolution, Scenario, ShadowPrices, SolveStatus, VarId,
};

/// Outcome of one solve: status always, primal/dual values only when optimal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub scenario: Scenario,
    pub status: SolveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DispatchOutcome>,
}

impl DispatchResult {
    pub fn optimal(scenario: Scenario, outcome: DispatchOutcome) -> Self {
        Self {
            scenario,
            status: SolveStatus::Optimal,
            outcome: Some(outcome),
        }
    }

    pub fn failed(scenario: Scenario, status: SolveStatus) -> Self {
        Self {
            scenario,
            status,
            outcome: None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal() && self.outcome.is_some()
    }

    pub fn objective(&self) -> Option<f64> {
        self.outcome.as_ref().map(|outcome| outcome.objective)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub objective: f64,
    pub breakdown: ObjectiveBreakdown,
    pub hourly: HourlyDispatch,
    pub totals: DispatchTotals,
    /// Optimal battery scale, sizing scenario only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_scale: Option<f64>,
    pub duals: ShadowPrices,
}

/// Objective split into its economic terms; `net()` recombines them with
/// their signs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBreakdown {
    /// `sum z[h] * (s[h] - GE)`
    pub export_revenue: f64,
    /// `sum y[h] * (b[h] + GI)`
    pub import_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discomfort_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_cost: Option<f64>,
}

impl ObjectiveBreakdown {
    pub fn net(&self) -> f64 {
        self.export_revenue
            - self.import_cost
            - self.discomfort_penalty.unwrap_or(0.0)
            - self.battery_cost.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HourlyDispatch {
    pub pv_used: Vec<f64>,
    pub import: Vec<f64>,
    pub export: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc: Option<Vec<f64>>,
}

impl HourlyDispatch {
    /// `x + y + d - z - c` per hour, the energy delivered to the household
    pub fn net_supply(&self) -> Vec<f64> {
        (0..self.pv_used.len())
            .map(|hour| {
                let at = |series: &Option<Vec<f64>>| {
                    series.as_ref().map_or(0.0, |values| values[hour])
                };
                self.pv_used[hour] + self.import[hour] + at(&self.discharge)
                    - self.export[hour]
                    - at(&self.charge)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DispatchTotals {
    pub pv_available: f64,
    pub pv_used: f64,
    pub pv_curtailed: f64,
    pub import: f64,
    pub export: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_load: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge: Option<f64>,
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

impl DispatchModel {
    /// Read primal and dual values of an optimal solve into a result record
    pub(crate) fn extract(&self, solution: &LpSolution) -> DispatchOutcome {
        let params = &self.params;
        let vars = &self.vars;
        let series = |ids: &Option<Vec<VarId>>| ids.as_ref().map(|ids| solution.values_of(ids));

        let mut hourly = HourlyDispatch {
            pv_used: solution.values_of(&vars.pv_used),
            import: solution.values_of(&vars.import),
            export: solution.values_of(&vars.export),
            served: series(&vars.served),
            deviation: series(&vars.deviation),
            charge: series(&vars.charge),
            discharge: series(&vars.discharge),
            soc: series(&vars.soc),
        };
        if hourly.served.is_none() {
            // no served variable: the base scenario serves whatever it keeps
            hourly.served = Some(hourly.net_supply());
        }

        let export_revenue: f64 = hourly
            .export
            .iter()
            .zip(&params.sell_price)
            .map(|(z, s)| z * (s - params.export_tariff))
            .sum();
        let import_cost: f64 = hourly
            .import
            .iter()
            .zip(&params.buy_price)
            .map(|(y, b)| y * (b + params.import_tariff))
            .sum();
        let discomfort_penalty = match (&hourly.deviation, &params.flexible_load) {
            (Some(deviation), Some(flexible)) => Some(flexible.discomfort_weight * sum(deviation)),
            _ => None,
        };
        let battery_scale = vars.scale.map(|scale| solution.value(scale));
        let battery_cost = match (battery_scale, &params.investment, &params.storage) {
            (Some(scale), Some(investment), Some(storage)) => {
                Some(investment.unit_cost * storage.capacity_kwh * scale)
            }
            _ => None,
        };

        let pv_available = sum(&params.pv);
        let pv_used = sum(&hourly.pv_used);
        let totals = DispatchTotals {
            pv_available,
            pv_used,
            pv_curtailed: pv_available - pv_used,
            import: sum(&hourly.import),
            export: sum(&hourly.export),
            served: hourly.served.as_deref().map(sum),
            reference_load: hourly
                .served
                .as_ref()
                .and(params.flexible_load.as_ref())
                .map(|flexible| sum(&flexible.reference)),
            deviation: hourly.deviation.as_deref().map(sum),
            charge: hourly.charge.as_deref().map(sum),
            discharge: hourly.discharge.as_deref().map(sum),
        };

        let duals = ShadowPrices::from_keyed(
            self.program
                .constraints()
                .iter()
                .zip(&solution.duals)
                .map(|(constraint, dual)| (constraint.key, *dual)),
        );

        DispatchOutcome {
            objective: solution.objective,
            breakdown: ObjectiveBreakdown {
                export_revenue,
                import_cost,
                discomfort_penalty,
                battery_cost,
            },
            hourly,
            totals,
            battery_scale,
            duals,
        }
    }
}

impl DispatchOutcome {
    /// Per-hour marginal value of energy, absent for the base scenario
    pub fn energy_values(&self) -> Option<Vec<f64>> {
        self.duals
            .hourly(ConstraintFamily::Balance)
            .map(|by_hour| by_hour.values().copied().collect())
    }
}
