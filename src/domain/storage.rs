use serde::{Deserialize, Serialize};

use super::params::{check_finite, ParameterError};

pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Battery physical spec and boundary preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSpec {
    /// Nominal energy capacity (kWh)
    pub capacity_kwh: f64,

    /// Fraction of charged energy that ends up stored, in (0, 1]
    pub charge_efficiency: f64,

    /// Fraction of stored energy delivered on discharge, in (0, 1]
    pub discharge_efficiency: f64,

    /// Max charge per hour as a fraction of capacity
    pub max_charge_ratio: f64,

    /// Max discharge per hour as a fraction of capacity
    pub max_discharge_ratio: f64,

    /// SOC before the first hour as a fraction of capacity
    pub initial_soc_ratio: f64,

    /// SOC pinned at the last hour as a fraction of capacity
    pub final_soc_ratio: f64,
}

impl StorageSpec {
    pub fn max_charge_kwh(&self) -> f64 {
        self.max_charge_ratio * self.capacity_kwh
    }

    pub fn max_discharge_kwh(&self) -> f64 {
        self.max_discharge_ratio * self.capacity_kwh
    }

    pub fn initial_soc_kwh(&self) -> f64 {
        self.initial_soc_ratio * self.capacity_kwh
    }

    pub fn final_soc_kwh(&self) -> f64 {
        self.final_soc_ratio * self.capacity_kwh
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_finite("storage.capacity_kwh", self.capacity_kwh)?;
        check_finite("storage.charge_efficiency", self.charge_efficiency)?;
        check_finite("storage.discharge_efficiency", self.discharge_efficiency)?;
        check_finite("storage.max_charge_ratio", self.max_charge_ratio)?;
        check_finite("storage.max_discharge_ratio", self.max_discharge_ratio)?;
        check_finite("storage.initial_soc_ratio", self.initial_soc_ratio)?;
        check_finite("storage.final_soc_ratio", self.final_soc_ratio)?;

        if self.capacity_kwh <= 0.0 {
            return Err(invalid("storage.capacity_kwh", "must be positive"));
        }
        for (field, efficiency) in [
            ("storage.charge_efficiency", self.charge_efficiency),
            ("storage.discharge_efficiency", self.discharge_efficiency),
        ] {
            if efficiency <= 0.0 || efficiency > 1.0 {
                return Err(invalid(field, "must be in (0, 1]"));
            }
        }
        if self.max_charge_ratio < 0.0 || self.max_discharge_ratio < 0.0 {
            return Err(invalid("storage", "power ratios cannot be negative"));
        }
        for (field, ratio) in [
            ("storage.initial_soc_ratio", self.initial_soc_ratio),
            ("storage.final_soc_ratio", self.final_soc_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(invalid(field, "must be in [0, 1]"));
            }
        }
        Ok(())
    }
}

impl Default for StorageSpec {
    fn default() -> Self {
        Self {
            capacity_kwh: 6.0,
            charge_efficiency: 0.9,
            discharge_efficiency: 0.9,
            max_charge_ratio: 0.5,
            max_discharge_ratio: 0.5,
            initial_soc_ratio: 0.5,
            final_soc_ratio: 0.5,
        }
    }
}

/// Investment side of the battery-sizing scenario
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestmentSpec {
    /// Cost per kWh of installed capacity, amortized over the modelled horizon (DKK/kWh)
    pub unit_cost: f64,

    /// Battery lifetime; enables the lifetime cutoff proxy when set
    #[serde(default)]
    pub lifetime_years: Option<f64>,

    /// Upper bound on the capacity multiplier
    pub max_scale: f64,
}

impl InvestmentSpec {
    pub fn new(unit_cost: f64, max_scale: f64) -> Self {
        Self {
            unit_cost,
            lifetime_years: None,
            max_scale,
        }
    }

    pub fn with_lifetime_years(mut self, years: f64) -> Self {
        self.lifetime_years = Some(years);
        self
    }

    /// Hours after which utilization is throttled, if a lifetime is set
    pub fn lifetime_hours(&self) -> Option<f64> {
        self.lifetime_years.map(|years| years * HOURS_PER_YEAR)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_finite("investment.unit_cost", self.unit_cost)?;
        check_finite("investment.max_scale", self.max_scale)?;
        if self.unit_cost < 0.0 {
            return Err(invalid("investment.unit_cost", "cannot be negative"));
        }
        if self.max_scale <= 0.0 {
            return Err(invalid("investment.max_scale", "must be positive"));
        }
        if let Some(years) = self.lifetime_years {
            check_finite("investment.lifetime_years", years)?;
            if years <= 0.0 {
                return Err(invalid("investment.lifetime_years", "must be positive"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ParameterError {
    ParameterError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
