use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{InvestmentSpec, StorageSpec};

/// Generous operational bound on hourly grid import (kWh)
pub const DEFAULT_MAX_IMPORT_KWH: f64 = 1000.0;
/// Generous operational bound on hourly grid export (kWh)
pub const DEFAULT_MAX_EXPORT_KWH: f64 = 500.0;

/// Malformed or incomplete parameter set, raised before any solver call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("Missing parameter: {0}")]
    Missing(&'static str),

    #[error("Empty horizon: at least one hour is required")]
    EmptyHorizon,

    #[error("Length mismatch for {field}: expected {expected} hours, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} is not finite: {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Operational limits on the single grid connection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GridLimits {
    pub max_import_kwh: f64,
    pub max_export_kwh: f64,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            max_import_kwh: DEFAULT_MAX_IMPORT_KWH,
            max_export_kwh: DEFAULT_MAX_EXPORT_KWH,
        }
    }
}

/// Demand-side flexibility around a reference load profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlexibleLoad {
    /// Reference load per hour (kWh)
    pub reference: Vec<f64>,

    /// Upper bound on served load in any hour (kWh)
    pub max_load_per_hour: f64,

    /// Penalty per kWh of deviation outside the tolerance band (DKK/kWh)
    pub discomfort_weight: f64,

    /// Free deviation per hour (kWh). Absent means strict tracking.
    #[serde(default)]
    pub tolerance: Option<Vec<f64>>,
}

impl FlexibleLoad {
    pub fn new(reference: Vec<f64>, max_load_per_hour: f64, discomfort_weight: f64) -> Self {
        Self {
            reference,
            max_load_per_hour,
            discomfort_weight,
            tolerance: None,
        }
    }

    /// Tolerance band at `hour`, zero when no band is configured
    pub fn tolerance_at(&self, hour: usize) -> f64 {
        self.tolerance
            .as_ref()
            .and_then(|band| band.get(hour).copied())
            .unwrap_or(0.0)
    }
}

/// Everything one dispatch model needs, for one scenario.
///
/// Plain data: cloning yields a fully independent copy, which is what every
/// sweep point relies on before applying its knob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSet {
    /// PV energy available per hour before curtailment (kWh)
    pub pv: Vec<f64>,

    /// Buying price per hour (DKK/kWh)
    pub buy_price: Vec<f64>,

    /// Selling price per hour (DKK/kWh)
    pub sell_price: Vec<f64>,

    /// Import tariff added on top of the buying price (DKK/kWh)
    pub import_tariff: f64,

    /// Export tariff subtracted from the selling price (DKK/kWh)
    pub export_tariff: f64,

    #[serde(default)]
    pub grid: GridLimits,

    /// Minimum energy served over the horizon (base scenario only)
    #[serde(default)]
    pub daily_demand: Option<f64>,

    #[serde(default)]
    pub flexible_load: Option<FlexibleLoad>,

    #[serde(default)]
    pub storage: Option<StorageSpec>,

    #[serde(default)]
    pub investment: Option<InvestmentSpec>,
}

impl ParameterSet {
    pub fn new(
        pv: Vec<f64>,
        buy_price: Vec<f64>,
        sell_price: Vec<f64>,
        import_tariff: f64,
        export_tariff: f64,
    ) -> Self {
        Self {
            pv,
            buy_price,
            sell_price,
            import_tariff,
            export_tariff,
            grid: GridLimits::default(),
            daily_demand: None,
            flexible_load: None,
            storage: None,
            investment: None,
        }
    }

    pub fn with_daily_demand(mut self, daily_demand: f64) -> Self {
        self.daily_demand = Some(daily_demand);
        self
    }

    pub fn with_flexible_load(mut self, flexible_load: FlexibleLoad) -> Self {
        self.flexible_load = Some(flexible_load);
        self
    }

    pub fn with_storage(mut self, storage: StorageSpec) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_investment(mut self, investment: InvestmentSpec) -> Self {
        self.investment = Some(investment);
        self
    }

    pub fn with_grid_limits(mut self, grid: GridLimits) -> Self {
        self.grid = grid;
        self
    }

    /// Number of hours in the horizon
    pub fn hours(&self) -> usize {
        self.pv.len()
    }

    pub fn require_daily_demand(&self) -> Result<f64, ParameterError> {
        self.daily_demand.ok_or(ParameterError::Missing("daily_demand"))
    }

    pub fn require_flexible_load(&self) -> Result<&FlexibleLoad, ParameterError> {
        self.flexible_load
            .as_ref()
            .ok_or(ParameterError::Missing("flexible_load"))
    }

    pub fn require_storage(&self) -> Result<&StorageSpec, ParameterError> {
        self.storage.as_ref().ok_or(ParameterError::Missing("storage"))
    }

    pub fn require_investment(&self) -> Result<&InvestmentSpec, ParameterError> {
        self.investment
            .as_ref()
            .ok_or(ParameterError::Missing("investment"))
    }

    /// Set the export tariff (GE)
    pub fn set_export_tariff(&mut self, tariff: f64) {
        self.export_tariff = tariff;
    }

    /// Set the import tariff (GI)
    pub fn set_import_tariff(&mut self, tariff: f64) {
        self.import_tariff = tariff;
    }

    /// Buying price becomes `factor` times the selling price, hour by hour
    pub fn set_buy_price_factor(&mut self, factor: f64) {
        self.buy_price = self.sell_price.iter().map(|s| factor * s).collect();
    }

    pub fn set_discomfort_weight(&mut self, weight: f64) -> Result<(), ParameterError> {
        let flexible = self
            .flexible_load
            .as_mut()
            .ok_or(ParameterError::Missing("flexible_load"))?;
        flexible.discomfort_weight = weight;
        Ok(())
    }

    /// Tolerance band becomes `ratio` times the reference load, hour by hour
    pub fn set_tolerance_ratio(&mut self, ratio: f64) -> Result<(), ParameterError> {
        let flexible = self
            .flexible_load
            .as_mut()
            .ok_or(ParameterError::Missing("flexible_load"))?;
        flexible.tolerance = Some(flexible.reference.iter().map(|r| ratio * r).collect());
        Ok(())
    }

    pub fn set_battery_unit_cost(&mut self, unit_cost: f64) -> Result<(), ParameterError> {
        let investment = self
            .investment
            .as_mut()
            .ok_or(ParameterError::Missing("investment"))?;
        investment.unit_cost = unit_cost;
        Ok(())
    }

    /// Repeat every hourly profile `days` times, for multi-day horizons.
    ///
    /// Scalars, storage and investment specs are kept as they are.
    pub fn tiled(&self, days: usize) -> Self {
        let tile = |values: &[f64]| -> Vec<f64> {
            values.iter().copied().cycle().take(values.len() * days).collect()
        };

        let mut tiled = self.clone();
        tiled.pv = tile(&self.pv);
        tiled.buy_price = tile(&self.buy_price);
        tiled.sell_price = tile(&self.sell_price);
        if let Some(flexible) = tiled.flexible_load.as_mut() {
            flexible.reference = tile(&flexible.reference);
            flexible.tolerance = flexible.tolerance.as_deref().map(tile);
        }
        tiled
    }

    /// Check shapes and ranges of everything present.
    ///
    /// Presence of scenario-specific sections is checked by the model builder.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let hours = self.hours();
        if hours == 0 {
            return Err(ParameterError::EmptyHorizon);
        }

        check_hourly("pv", &self.pv, hours)?;
        check_hourly("buy_price", &self.buy_price, hours)?;
        check_hourly("sell_price", &self.sell_price, hours)?;
        check_non_negative("pv", &self.pv)?;

        check_finite("import_tariff", self.import_tariff)?;
        check_finite("export_tariff", self.export_tariff)?;
        check_finite("grid.max_import_kwh", self.grid.max_import_kwh)?;
        check_finite("grid.max_export_kwh", self.grid.max_export_kwh)?;
        if self.grid.max_import_kwh < 0.0 || self.grid.max_export_kwh < 0.0 {
            return Err(ParameterError::Invalid {
                field: "grid",
                reason: "grid limits cannot be negative".to_string(),
            });
        }

        if let Some(demand) = self.daily_demand {
            check_finite("daily_demand", demand)?;
        }

        if let Some(flexible) = &self.flexible_load {
            check_hourly("flexible_load.reference", &flexible.reference, hours)?;
            check_non_negative("flexible_load.reference", &flexible.reference)?;
            check_finite("flexible_load.max_load_per_hour", flexible.max_load_per_hour)?;
            check_finite("flexible_load.discomfort_weight", flexible.discomfort_weight)?;
            if flexible.max_load_per_hour < 0.0 {
                return Err(ParameterError::Invalid {
                    field: "flexible_load.max_load_per_hour",
                    reason: "cannot be negative".to_string(),
                });
            }
            if let Some(band) = &flexible.tolerance {
                check_hourly("flexible_load.tolerance", band, hours)?;
                check_non_negative("flexible_load.tolerance", band)?;
            }
        }

        if let Some(storage) = &self.storage {
            storage.validate()?;
        }

        if let Some(investment) = &self.investment {
            investment.validate()?;
        }

        Ok(())
    }
}

pub(crate) fn check_finite(field: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParameterError::NotFinite { field, value })
    }
}

fn check_hourly(field: &'static str, values: &[f64], hours: usize) -> Result<(), ParameterError> {
    if values.len() != hours {
        return Err(ParameterError::LengthMismatch {
            field,
            expected: hours,
            actual: values.len(),
        });
    }
    values.iter().try_for_each(|v| check_finite(field, *v))
}

fn check_non_negative(field: &'static str, values: &[f64]) -> Result<(), ParameterError> {
    match values.iter().position(|v| *v < 0.0) {
        Some(hour) => Err(ParameterError::Invalid {
            field,
            reason: format!("negative value {} at hour {}", values[hour], hour),
        }),
        None => Ok(()),
    }
}
