//! Dispatch model family
//!
//! One builder covers the four scenarios. A capability set decides which
//! blocks of variables and constraints are added on top of the common grid/PV
//! core:
//!
//! | scenario         | flexible_load | battery | battery_sizing |
//! |------------------|---------------|---------|----------------|
//! | `base`           |               |         |                |
//! | `flexible_load`  | x             |         |                |
//! | `battery`        | x             | x       |                |
//! | `battery_sizing` | x             | x       | x              |
//!
//! Every model maximises surplus: export revenue net of the export tariff,
//! minus import cost including the import tariff, minus the discomfort
//! penalty, minus the amortized battery investment.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::{
    Comparison, ConstraintFamily, ConstraintKey, LinearExpr, LinearProgram, LpSolver, Sense,
    VarId, VarKind,
};
use crate::domain::{ParameterError, ParameterSet};
use crate::optimizer::DispatchResult;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Parameters(#[from] ParameterError),

    #[error("Unsupported capability set: {0}")]
    Capabilities(&'static str),
}

/// The four scenarios of the model family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Scenario {
    /// Daily energy requirement, no intra-day flexibility
    Base,
    /// Hourly balance with a penalized deviation from a reference load
    FlexibleLoad,
    /// Flexible load plus a fixed-capacity battery
    Battery,
    /// Flexible load plus a battery whose capacity is a decision
    BatterySizing,
}

impl Scenario {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Scenario::Base => Capabilities::default(),
            Scenario::FlexibleLoad => Capabilities {
                flexible_load: true,
                ..Capabilities::default()
            },
            Scenario::Battery => Capabilities {
                flexible_load: true,
                battery: true,
                ..Capabilities::default()
            },
            Scenario::BatterySizing => Capabilities {
                flexible_load: true,
                battery: true,
                battery_sizing: true,
            },
        }
    }
}

/// Feature blocks of a dispatch model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub flexible_load: bool,
    pub battery: bool,
    pub battery_sizing: bool,
}

impl Capabilities {
    /// Check the combination and name the scenario it describes
    pub fn scenario(self) -> Result<Scenario, ModelError> {
        match (self.flexible_load, self.battery, self.battery_sizing) {
            (false, false, false) => Ok(Scenario::Base),
            (true, false, false) => Ok(Scenario::FlexibleLoad),
            (true, true, false) => Ok(Scenario::Battery),
            (true, true, true) => Ok(Scenario::BatterySizing),
            (_, false, true) => Err(ModelError::Capabilities(
                "battery_sizing requires battery",
            )),
            (false, true, _) => Err(ModelError::Capabilities(
                "battery requires flexible_load",
            )),
        }
    }
}

/// Variable handles of a built model; optional blocks are `None` when the
/// capability is off
#[derive(Debug, Clone, Default)]
pub struct DecisionVariables {
    pub pv_used: Vec<VarId>,
    pub import: Vec<VarId>,
    pub export: Vec<VarId>,
    pub served: Option<Vec<VarId>>,
    pub deviation: Option<Vec<VarId>>,
    pub charge: Option<Vec<VarId>>,
    pub discharge: Option<Vec<VarId>>,
    pub soc: Option<Vec<VarId>>,
    pub scale: Option<VarId>,
    pub lifetime_active: Option<Vec<VarId>>,
}

/// A fully assembled dispatch LP together with the parameters it came from
#[derive(Debug, Clone)]
pub struct DispatchModel {
    pub(crate) scenario: Scenario,
    pub(crate) params: ParameterSet,
    pub(crate) program: LinearProgram,
    pub(crate) vars: DecisionVariables,
}

impl DispatchModel {
    /// Validate the parameters and assemble variables, constraints and objective.
    ///
    /// Fails before any solver is involved when the capability set is
    /// inconsistent or a section the scenario needs is missing or malformed.
    #[instrument(name = "build_dispatch_model", skip_all, fields(hours = params.hours()))]
    pub fn build(params: ParameterSet, capabilities: Capabilities) -> Result<Self, ModelError> {
        let scenario = capabilities.scenario()?;
        params.validate()?;

        let hours = params.hours();
        let mut program = LinearProgram::new(Sense::Maximise);

        let pv_used = program.add_hourly(VarKind::PvUsed, hours, 0.0, None);
        let import = program.add_hourly(
            VarKind::Import,
            hours,
            0.0,
            Some(params.grid.max_import_kwh),
        );
        let export = program.add_hourly(
            VarKind::Export,
            hours,
            0.0,
            Some(params.grid.max_export_kwh),
        );

        for hour in 0..hours {
            program.add_constraint(
                ConstraintKey::hourly(ConstraintFamily::PvCap, hour),
                LinearExpr::new().term(pv_used[hour], 1.0),
                Comparison::LessEq,
                params.pv[hour],
            );
        }

        let mut objective = LinearExpr::new();
        for hour in 0..hours {
            objective.push(export[hour], params.sell_price[hour] - params.export_tariff);
            objective.push(import[hour], -(params.buy_price[hour] + params.import_tariff));
        }

        let mut model = Self {
            scenario,
            params,
            program,
            vars: DecisionVariables {
                pv_used,
                import,
                export,
                ..DecisionVariables::default()
            },
        };

        if capabilities.battery {
            model.add_storage(capabilities.battery_sizing, &mut objective)?;
        }
        if capabilities.flexible_load {
            model.add_flexible_load(&mut objective)?;
        } else {
            model.add_daily_demand()?;
        }

        model.program.set_objective(objective);
        debug!(
            %scenario,
            variables = model.program.variables().len(),
            constraints = model.program.constraints().len(),
            "dispatch model built"
        );
        Ok(model)
    }

    /// Build the preset capability set of `scenario`
    pub fn for_scenario(params: ParameterSet, scenario: Scenario) -> Result<Self, ModelError> {
        Self::build(params, scenario.capabilities())
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    pub fn variables(&self) -> &DecisionVariables {
        &self.vars
    }

    /// Hand the program to `solver` and extract a result record.
    ///
    /// Non-optimal outcomes come back as a record carrying only the status.
    #[instrument(name = "solve_dispatch_model", skip_all, fields(scenario = %self.scenario))]
    pub fn solve(&self, solver: &dyn LpSolver) -> DispatchResult {
        let output = solver.solve(&self.program);
        match output.solution() {
            Some(solution) => DispatchResult::optimal(self.scenario, self.extract(solution)),
            None => {
                warn!(
                    status = %output.status,
                    message = output.message.as_deref().unwrap_or(""),
                    "dispatch model not solved to optimality"
                );
                DispatchResult::failed(self.scenario, output.status)
            }
        }
    }

    /// Base scenario: a daily energy requirement and no exporting beyond own PV
    fn add_daily_demand(&mut self) -> Result<(), ModelError> {
        let demand = self.params.require_daily_demand()?;
        let hours = self.params.hours();
        let vars = &self.vars;

        let mut total = LinearExpr::new();
        for hour in 0..hours {
            self.program.add_constraint(
                ConstraintKey::hourly(ConstraintFamily::NoNetExport, hour),
                LinearExpr::new()
                    .term(vars.pv_used[hour], 1.0)
                    .term(vars.export[hour], -1.0),
                Comparison::GreaterEq,
                0.0,
            );
            total.push(vars.pv_used[hour], 1.0);
            total.push(vars.import[hour], 1.0);
            total.push(vars.export[hour], -1.0);
        }

        self.program.add_constraint(
            ConstraintKey::single(ConstraintFamily::DailyDemand),
            total,
            Comparison::GreaterEq,
            demand,
        );
        Ok(())
    }

    /// Served load with hourly balance and a penalized deviation from the reference
    fn add_flexible_load(&mut self, objective: &mut LinearExpr) -> Result<(), ModelError> {
        let flexible = self.params.require_flexible_load()?.clone();
        let hours = self.params.hours();

        let served = self.program.add_hourly(
            VarKind::Served,
            hours,
            0.0,
            Some(flexible.max_load_per_hour),
        );
        let deviation = self.program.add_hourly(VarKind::Deviation, hours, 0.0, None);

        for hour in 0..hours {
            // served - supply == 0; relaxing the rhs injects free energy
            let mut balance = LinearExpr::new()
                .term(served[hour], 1.0)
                .term(self.vars.pv_used[hour], -1.0)
                .term(self.vars.import[hour], -1.0)
                .term(self.vars.export[hour], 1.0);
            if let Some(discharge) = &self.vars.discharge {
                balance.push(discharge[hour], -1.0);
            }
            if let Some(charge) = &self.vars.charge {
                balance.push(charge[hour], 1.0);
            }
            self.program.add_constraint(
                ConstraintKey::hourly(ConstraintFamily::Balance, hour),
                balance,
                Comparison::Equal,
                0.0,
            );

            let reference = flexible.reference[hour];
            let band = flexible.tolerance_at(hour);
            self.program.add_constraint(
                ConstraintKey::hourly(ConstraintFamily::DeviationUp, hour),
                LinearExpr::new()
                    .term(deviation[hour], 1.0)
                    .term(served[hour], -1.0),
                Comparison::GreaterEq,
                -reference - band,
            );
            self.program.add_constraint(
                ConstraintKey::hourly(ConstraintFamily::DeviationDown, hour),
                LinearExpr::new()
                    .term(deviation[hour], 1.0)
                    .term(served[hour], 1.0),
                Comparison::GreaterEq,
                reference - band,
            );

            objective.push(deviation[hour], -flexible.discomfort_weight);
        }

        self.vars.served = Some(served);
        self.vars.deviation = Some(deviation);
        Ok(())
    }

    /// Battery with efficiency losses and a pinned terminal state.
    ///
    /// With `sizing`, every capacity-dependent limit and both SOC targets are
    /// proportional to a scale variable priced at the amortized unit cost.
    fn add_storage(&mut self, sizing: bool, objective: &mut LinearExpr) -> Result<(), ModelError> {
        let storage = self.params.require_storage()?.clone();
        let investment = if sizing {
            Some(self.params.require_investment()?.clone())
        } else {
            None
        };
        let hours = self.params.hours();
        let capacity = storage.capacity_kwh;
        let eta_c = storage.charge_efficiency;
        let eta_d = storage.discharge_efficiency;

        let charge = self.program.add_hourly(VarKind::Charge, hours, 0.0, None);
        let discharge = self.program.add_hourly(VarKind::Discharge, hours, 0.0, None);
        let soc = self.program.add_hourly(VarKind::Soc, hours, 0.0, None);
        let scale = investment.as_ref().map(|investment| {
            self.program
                .add_variable(VarKind::Scale, None, 0.0, Some(investment.max_scale))
        });

        // limit * (scale or 1): the constant goes to the rhs, or onto the scale term
        let capped = |program: &mut LinearProgram, family, hour, var: VarId, limit: f64| {
            let key = ConstraintKey::hourly(family, hour);
            let expr = LinearExpr::new().term(var, 1.0);
            match scale {
                Some(scale) => {
                    program.add_constraint(key, expr.term(scale, -limit), Comparison::LessEq, 0.0)
                }
                None => program.add_constraint(key, expr, Comparison::LessEq, limit),
            };
        };

        for hour in 0..hours {
            capped(
                &mut self.program,
                ConstraintFamily::ChargeCap,
                hour,
                charge[hour],
                storage.max_charge_kwh(),
            );
            capped(
                &mut self.program,
                ConstraintFamily::DischargeCap,
                hour,
                discharge[hour],
                storage.max_discharge_kwh(),
            );
            capped(
                &mut self.program,
                ConstraintFamily::SocCap,
                hour,
                soc[hour],
                capacity,
            );
        }

        // soc[0] = initial + eta_c c[0] - d[0] / eta_d
        let mut initial = LinearExpr::new()
            .term(soc[0], 1.0)
            .term(charge[0], -eta_c)
            .term(discharge[0], 1.0 / eta_d);
        let initial_rhs = match scale {
            Some(scale) => {
                initial.push(scale, -storage.initial_soc_kwh());
                0.0
            }
            None => storage.initial_soc_kwh(),
        };
        self.program.add_constraint(
            ConstraintKey::single(ConstraintFamily::SocInit),
            initial,
            Comparison::Equal,
            initial_rhs,
        );

        for hour in 1..hours {
            self.program.add_constraint(
                ConstraintKey::hourly(ConstraintFamily::SocDynamics, hour),
                LinearExpr::new()
                    .term(soc[hour], 1.0)
                    .term(soc[hour - 1], -1.0)
                    .term(charge[hour], -eta_c)
                    .term(discharge[hour], 1.0 / eta_d),
                Comparison::Equal,
                0.0,
            );
        }

        let mut terminal = LinearExpr::new().term(soc[hours - 1], 1.0);
        let terminal_rhs = match scale {
            Some(scale) => {
                terminal.push(scale, -storage.final_soc_kwh());
                0.0
            }
            None => storage.final_soc_kwh(),
        };
        self.program.add_constraint(
            ConstraintKey::single(ConstraintFamily::SocFinal),
            terminal,
            Comparison::Equal,
            terminal_rhs,
        );

        if let (Some(scale), Some(investment)) = (scale, investment.as_ref()) {
            objective.push(scale, -investment.unit_cost * capacity);

            if let Some(lifetime_hours) = investment.lifetime_hours() {
                self.add_lifetime_cutoff(
                    &charge,
                    &discharge,
                    lifetime_hours,
                    (storage.max_charge_kwh() + storage.max_discharge_kwh()) * investment.max_scale,
                );
            }
        }

        self.vars.charge = Some(charge);
        self.vars.discharge = Some(discharge);
        self.vars.soc = Some(soc);
        self.vars.scale = scale;
        Ok(())
    }

    /// Linear stand-in for a lifetime limit: an activity level per hour,
    /// capped at `lifetime_hours / h`, bounds battery throughput. Hours before
    /// the threshold are unaffected; later hours are throttled in proportion.
    /// This approximates, and does not model, degradation.
    fn add_lifetime_cutoff(
        &mut self,
        charge: &[VarId],
        discharge: &[VarId],
        lifetime_hours: f64,
        max_throughput: f64,
    ) {
        let hours = charge.len();
        let active = self
            .program
            .add_hourly(VarKind::LifetimeActive, hours, 0.0, Some(1.0));

        for hour in 0..hours {
            // hour 0 has a zero coefficient and is always satisfied
            if hour > 0 {
                self.program.add_constraint(
                    ConstraintKey::hourly(ConstraintFamily::LifetimeCutoff, hour),
                    LinearExpr::new().term(active[hour], hour as f64),
                    Comparison::LessEq,
                    lifetime_hours,
                );
            }
            self.program.add_constraint(
                ConstraintKey::hourly(ConstraintFamily::LifetimeThroughput, hour),
                LinearExpr::new()
                    .term(charge[hour], 1.0)
                    .term(discharge[hour], 1.0)
                    .term(active[hour], -max_throughput),
                Comparison::LessEq,
                0.0,
            );
        }

        self.vars.lifetime_active = Some(active);
    }
}

/// Build `scenario` from `params` and solve it in one go
pub fn solve_scenario(
    params: ParameterSet,
    scenario: Scenario,
    solver: &dyn LpSolver,
) -> Result<DispatchResult, ModelError> {
    Ok(DispatchModel::for_scenario(params, scenario)?.solve(solver))
}
