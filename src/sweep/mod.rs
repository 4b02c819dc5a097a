//! Sensitivity sweeps
//!
//! A sweep varies one knob, or two knobs nested outer × inner, re-solves a
//! scenario at every point and returns the results tagged with the swept
//! values in iteration order. Each point starts from its own clone of the base
//! parameter set, so no point can observe another point's knob.

pub mod parallel;
pub mod range;
pub mod scenarios;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::{ParameterError, ParameterSet};
use crate::optimizer::{DispatchModel, DispatchResult, LpSolver, ModelError, Scenario};

pub use parallel::run_parallel;
pub use range::SweepRange;
pub use scenarios::*;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Invalid sweep range: {0}")]
    InvalidRange(String),

    #[error(transparent)]
    Parameters(#[from] ParameterError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Sweep worker failed: {0}")]
    Worker(String),
}

/// Scenario parameter a sweep can vary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Knob {
    /// GE
    ExportTariff,
    /// GI
    ImportTariff,
    /// `b[h] = f * s[h]`
    BuyPriceFactor,
    /// lambda
    DiscomfortWeight,
    /// `tol[h] = r * ref_load[h]`
    ToleranceRatio,
    BatteryUnitCost,
}

impl Knob {
    pub fn apply(self, params: &mut ParameterSet, value: f64) -> Result<(), ParameterError> {
        match self {
            Knob::ExportTariff => params.set_export_tariff(value),
            Knob::ImportTariff => params.set_import_tariff(value),
            Knob::BuyPriceFactor => params.set_buy_price_factor(value),
            Knob::DiscomfortWeight => params.set_discomfort_weight(value)?,
            Knob::ToleranceRatio => params.set_tolerance_ratio(value)?,
            Knob::BatteryUnitCost => params.set_battery_unit_cost(value)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    pub knob: Knob,
    pub range: SweepRange,
}

impl SweepAxis {
    pub fn new(knob: Knob, range: SweepRange) -> Self {
        Self { knob, range }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepTag {
    pub knob: Knob,
    pub value: f64,
}

/// One grid point: its position in iteration order and the knob values
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub index: usize,
    pub tags: Vec<SweepTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedResult {
    pub tags: Vec<SweepTag>,
    pub result: DispatchResult,
}

impl TaggedResult {
    /// Value of `knob` at this point, if it was swept
    pub fn tag(&self, knob: Knob) -> Option<f64> {
        self.tags
            .iter()
            .find(|tag| tag.knob == knob)
            .map(|tag| tag.value)
    }
}

#[derive(Debug, Clone)]
pub struct Sweep {
    base: ParameterSet,
    scenario: Scenario,
    outer: SweepAxis,
    inner: Option<SweepAxis>,
}

impl Sweep {
    pub fn new(base: ParameterSet, scenario: Scenario, axis: SweepAxis) -> Self {
        Self {
            base,
            scenario,
            outer: axis,
            inner: None,
        }
    }

    /// Two knobs; the inner one varies fastest
    pub fn nested(
        base: ParameterSet,
        scenario: Scenario,
        outer: SweepAxis,
        inner: SweepAxis,
    ) -> Self {
        Self {
            base,
            scenario,
            outer,
            inner: Some(inner),
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn base(&self) -> &ParameterSet {
        &self.base
    }

    pub fn axes(&self) -> impl Iterator<Item = &SweepAxis> {
        std::iter::once(&self.outer).chain(self.inner.as_ref())
    }

    /// All grid points in iteration order
    pub fn points(&self) -> Result<Vec<SweepPoint>, SweepError> {
        let tag = |knob, value| SweepTag { knob, value };
        let outer = self.outer.range.points()?;
        let tags: Vec<Vec<SweepTag>> = match &self.inner {
            None => outer
                .into_iter()
                .map(|value| vec![tag(self.outer.knob, value)])
                .collect(),
            Some(inner) => outer
                .into_iter()
                .cartesian_product(inner.range.points()?)
                .map(|(o, i)| vec![tag(self.outer.knob, o), tag(inner.knob, i)])
                .collect(),
        };

        Ok(tags
            .into_iter()
            .enumerate()
            .map(|(index, tags)| SweepPoint { index, tags })
            .collect())
    }

    /// Fresh copy of the base parameters with the point's knobs applied
    pub fn prepare(&self, point: &SweepPoint) -> Result<ParameterSet, SweepError> {
        let mut params = self.base.clone();
        for tag in &point.tags {
            tag.knob.apply(&mut params, tag.value)?;
        }
        Ok(params)
    }

    /// Build and solve one point
    pub fn solve_point(
        &self,
        point: &SweepPoint,
        solver: &dyn LpSolver,
    ) -> Result<TaggedResult, SweepError> {
        let params = self.prepare(point)?;
        let result = DispatchModel::for_scenario(params, self.scenario)?.solve(solver);
        if !result.is_optimal() {
            warn!(point = point.index, status = %result.status, "sweep point not optimal");
        }
        Ok(TaggedResult {
            tags: point.tags.clone(),
            result,
        })
    }

    /// Solve every point sequentially on the calling thread.
    ///
    /// Build errors abort the sweep; non-optimal solves are kept as records.
    #[instrument(name = "sweep", skip_all, fields(scenario = %self.scenario))]
    pub fn run(&self, solver: &dyn LpSolver) -> Result<Vec<TaggedResult>, SweepError> {
        let points = self.points()?;
        info!(points = points.len(), "running sweep");

        let results = points
            .iter()
            .map(|point| {
                debug!(point = point.index, tags = ?point.tags, "solving sweep point");
                self.solve_point(point, solver)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let optimal = results.iter().filter(|r| r.result.is_optimal()).count();
        info!(optimal, total = results.len(), "sweep finished");
        Ok(results)
    }
}
