//! Data-loading collaborator.
//!
//! Scenario folders hold four JSON documents (PV profile, appliance params,
//! bus params, usage preferences). Some exports wrap top-level objects in a
//! single-element list and some don't, so both shapes are accepted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{FlexibleLoad, InvestmentSpec, ParameterError, ParameterSet, StorageSpec};

pub const DER_PRODUCTION_FILE: &str = "DER_production.json";
pub const APPLIANCE_PARAMS_FILE: &str = "appliance_params.json";
pub const BUS_PARAMS_FILE: &str = "bus_params.json";
pub const USAGE_PREFERENCE_FILE: &str = "usage_preference.json";

/// Discomfort weight used until a run or sweep overrides it (DKK/kWh)
pub const DEFAULT_DISCOMFORT_WEIGHT: f64 = 0.5;
/// Capacity multiplier bound used when the data does not provide one
pub const DEFAULT_MAX_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerProduction {
    /// PV output per hour as a fraction of installed power, in [0, 1]
    pub hourly_profile_ratio: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerParams {
    #[serde(rename = "max_power_kW")]
    pub max_power_kw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadParams {
    #[serde(rename = "max_load_kWh_per_hour")]
    pub max_load_kwh_per_hour: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageParams {
    #[serde(rename = "storage_capacity_kWh")]
    pub capacity_kwh: f64,
    #[serde(rename = "max_charging_power_ratio")]
    pub max_charge_ratio: f64,
    #[serde(rename = "max_discharging_power_ratio")]
    pub max_discharge_ratio: f64,
    #[serde(rename = "charging_efficiency")]
    pub charge_efficiency: f64,
    #[serde(rename = "discharging_efficiency")]
    pub discharge_efficiency: f64,
    #[serde(rename = "unit_cost_DKK_per_kWh", default)]
    pub unit_cost: Option<f64>,
    #[serde(default)]
    pub lifetime_years: Option<f64>,
    #[serde(default)]
    pub max_scale: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApplianceParams {
    #[serde(rename = "DER", default)]
    pub der: Vec<DerParams>,
    #[serde(default)]
    pub load: Vec<LoadParams>,
    #[serde(default)]
    pub storage: Vec<StorageParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusParams {
    #[serde(rename = "energy_price_DKK_per_kWh")]
    pub energy_price: Vec<f64>,
    #[serde(rename = "import_tariff_DKK/kWh")]
    pub import_tariff: f64,
    #[serde(rename = "export_tariff_DKK/kWh")]
    pub export_tariff: f64,
    #[serde(rename = "max_import_kW", default)]
    pub max_import: Option<f64>,
    #[serde(rename = "max_export_kW", default)]
    pub max_export: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoadPreference {
    #[serde(default)]
    pub min_total_energy_per_day_hour_equivalent: Option<f64>,
    #[serde(default)]
    pub hourly_profile_ratio: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoragePreference {
    pub initial_soc_ratio: f64,
    pub final_soc_ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsagePreferences {
    #[serde(default)]
    pub load_preferences: Vec<LoadPreference>,
    #[serde(default)]
    pub storage_preferences: Vec<StoragePreference>,
}

/// Raw inputs of one scenario folder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioData {
    pub der_production: DerProduction,
    pub appliances: ApplianceParams,
    pub bus: BusParams,
    pub usage: UsagePreferences,
}

/// Anything that can hand over the raw inputs of a scenario
pub trait ScenarioSource {
    fn load(&self) -> Result<ScenarioData>;
}

/// Scenario stored as the four JSON documents of one directory
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    root: PathBuf,
}

impl JsonDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.root.join(file);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: OneOrMany<T> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        parsed
            .into_first()
            .with_context(|| format!("{} holds an empty list", path.display()))
    }
}

impl ScenarioSource for JsonDirectory {
    fn load(&self) -> Result<ScenarioData> {
        tracing::debug!(root = %self.root.display(), "loading scenario data");
        Ok(ScenarioData {
            der_production: self.read(DER_PRODUCTION_FILE)?,
            appliances: self.read(APPLIANCE_PARAMS_FILE)?,
            bus: self.read(BUS_PARAMS_FILE)?,
            usage: self.read(USAGE_PREFERENCE_FILE)?,
        })
    }
}

impl ParameterSet {
    /// Assemble a parameter set from raw scenario inputs.
    ///
    /// PV is installed power times the ratio profile, selling price equals the
    /// buying price, and the reference load is the hourly cap times the load
    /// ratio profile. Optional sections are filled when their inputs exist.
    pub fn assemble(data: &ScenarioData) -> Result<Self, ParameterError> {
        let ratios = &data.der_production.hourly_profile_ratio;
        let hours = ratios.len();
        if hours == 0 {
            return Err(ParameterError::EmptyHorizon);
        }

        let pv_capacity = data
            .appliances
            .der
            .first()
            .ok_or(ParameterError::Missing("DER"))?
            .max_power_kw;
        let pv = ratios.iter().map(|r| pv_capacity * r).collect();

        require_hours("energy_price_DKK_per_kWh", &data.bus.energy_price, hours)?;
        let buy_price = data.bus.energy_price.clone();
        let sell_price = buy_price.clone();

        let mut params = ParameterSet::new(
            pv,
            buy_price,
            sell_price,
            data.bus.import_tariff,
            data.bus.export_tariff,
        );
        if let Some(max_import) = data.bus.max_import {
            params.grid.max_import_kwh = max_import;
        }
        if let Some(max_export) = data.bus.max_export {
            params.grid.max_export_kwh = max_export;
        }

        let load_preference = data.usage.load_preferences.first();
        params.daily_demand =
            load_preference.and_then(|p| p.min_total_energy_per_day_hour_equivalent);

        let load_ratios = load_preference.and_then(|p| p.hourly_profile_ratio.as_ref());
        if let (Some(load), Some(load_ratios)) = (data.appliances.load.first(), load_ratios) {
            require_hours("load hourly_profile_ratio", load_ratios, hours)?;
            let d_hour = load.max_load_kwh_per_hour;
            let reference = load_ratios.iter().map(|r| d_hour * r).collect();
            params.flexible_load = Some(FlexibleLoad::new(
                reference,
                d_hour,
                DEFAULT_DISCOMFORT_WEIGHT,
            ));
        }

        let storage = data.appliances.storage.first();
        let storage_preference = data.usage.storage_preferences.first();
        if let (Some(storage), Some(preference)) = (storage, storage_preference) {
            params.storage = Some(StorageSpec {
                capacity_kwh: storage.capacity_kwh,
                charge_efficiency: storage.charge_efficiency,
                discharge_efficiency: storage.discharge_efficiency,
                max_charge_ratio: storage.max_charge_ratio,
                max_discharge_ratio: storage.max_discharge_ratio,
                initial_soc_ratio: preference.initial_soc_ratio,
                final_soc_ratio: preference.final_soc_ratio,
            });
            params.investment = storage.unit_cost.map(|unit_cost| InvestmentSpec {
                unit_cost,
                lifetime_years: storage.lifetime_years,
                max_scale: storage.max_scale.unwrap_or(DEFAULT_MAX_SCALE),
            });
        }

        params.validate()?;
        Ok(params)
    }
}

/// Profiles must cover exactly the PV horizon, neither shorter nor longer
fn require_hours(field: &'static str, values: &[f64], hours: usize) -> Result<(), ParameterError> {
    if values.len() != hours {
        return Err(ParameterError::LengthMismatch {
            field,
            expected: hours,
            actual: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLIANCES: &str = r#"{
        "DER": [{"max_power_kW": 4.0}],
        "load": [{"max_load_kWh_per_hour": 2.0}],
        "storage": [{
            "storage_capacity_kWh": 6.0,
            "max_charging_power_ratio": 0.5,
            "max_discharging_power_ratio": 0.5,
            "charging_efficiency": 0.9,
            "discharging_efficiency": 0.95,
            "unit_cost_DKK_per_kWh": 0.4
        }]
    }"#;

    fn scenario_data() -> ScenarioData {
        let appliances: OneOrMany<ApplianceParams> = serde_json::from_str(APPLIANCES).unwrap();
        ScenarioData {
            der_production: DerProduction {
                hourly_profile_ratio: vec![0.0, 0.5, 1.0, 0.25],
            },
            appliances: appliances.into_first().unwrap(),
            bus: BusParams {
                energy_price: vec![1.0, 2.0, 3.0, 4.0],
                import_tariff: 0.1,
                export_tariff: 0.2,
                max_import: None,
                max_export: Some(8.0),
            },
            usage: UsagePreferences {
                load_preferences: vec![LoadPreference {
                    min_total_energy_per_day_hour_equivalent: Some(3.0),
                    hourly_profile_ratio: Some(vec![0.5, 0.5, 1.0, 0.0]),
                }],
                storage_preferences: vec![StoragePreference {
                    initial_soc_ratio: 0.5,
                    final_soc_ratio: 0.25,
                }],
            },
        }
    }

    #[test]
    fn test_one_or_many_unwraps_lists() {
        let many: OneOrMany<DerParams> = serde_json::from_str(r#"[{"max_power_kW": 3.0}]"#).unwrap();
        let one: OneOrMany<DerParams> = serde_json::from_str(r#"{"max_power_kW": 3.0}"#).unwrap();
        assert_eq!(many.into_first(), one.into_first());
    }

    #[test]
    fn test_assemble_full_scenario() {
        let params = ParameterSet::assemble(&scenario_data()).unwrap();

        assert_eq!(params.pv, vec![0.0, 2.0, 4.0, 1.0]);
        assert_eq!(params.buy_price, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(params.sell_price, params.buy_price);
        assert_eq!(params.export_tariff, 0.2);
        assert_eq!(params.grid.max_export_kwh, 8.0);
        assert_eq!(params.daily_demand, Some(3.0));

        let flexible = params.flexible_load.as_ref().unwrap();
        assert_eq!(flexible.reference, vec![1.0, 1.0, 2.0, 0.0]);
        assert_eq!(flexible.max_load_per_hour, 2.0);
        assert!(flexible.tolerance.is_none());

        let storage = params.storage.as_ref().unwrap();
        assert_eq!(storage.discharge_efficiency, 0.95);
        assert_eq!(storage.final_soc_ratio, 0.25);

        let investment = params.investment.as_ref().unwrap();
        assert_eq!(investment.unit_cost, 0.4);
        assert_eq!(investment.max_scale, DEFAULT_MAX_SCALE);
    }

    #[test]
    fn test_assemble_without_storage_preferences() {
        let mut data = scenario_data();
        data.usage.storage_preferences.clear();
        let params = ParameterSet::assemble(&data).unwrap();
        assert!(params.storage.is_none());
        assert!(params.investment.is_none());
    }

    #[test]
    fn test_assemble_short_price_list() {
        let mut data = scenario_data();
        data.bus.energy_price.truncate(2);
        assert!(matches!(
            ParameterSet::assemble(&data),
            Err(ParameterError::LengthMismatch { expected: 4, actual: 2, .. })
        ));
    }

    #[test]
    fn test_assemble_long_price_list() {
        let mut data = scenario_data();
        data.bus.energy_price.extend([5.0, 6.0]);
        assert!(matches!(
            ParameterSet::assemble(&data),
            Err(ParameterError::LengthMismatch { expected: 4, actual: 6, .. })
        ));
    }

    #[test]
    fn test_assemble_long_load_profile() {
        let mut data = scenario_data();
        if let Some(ratios) = data.usage.load_preferences[0].hourly_profile_ratio.as_mut() {
            ratios.push(0.5);
        }
        assert!(matches!(
            ParameterSet::assemble(&data),
            Err(ParameterError::LengthMismatch { expected: 4, actual: 5, .. })
        ));
    }

    #[test]
    fn test_assemble_requires_der() {
        let mut data = scenario_data();
        data.appliances.der.clear();
        assert_eq!(
            ParameterSet::assemble(&data),
            Err(ParameterError::Missing("DER"))
        );
    }
}
