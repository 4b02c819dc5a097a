use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{
    GridLimits, ParameterError, ParameterSet, DEFAULT_MAX_EXPORT_KWH, DEFAULT_MAX_IMPORT_KWH,
};
use crate::optimizer::Scenario;
use crate::sweep::NamedSweep;

pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "DISPATCH__";
/// Discomfort weight of the battery scenarios
pub const DEFAULT_BATTERY_DISCOMFORT_WEIGHT: f64 = 1.5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub data: DataConfig,
    #[validate(nested)]
    pub solver: SolverConfig,
    #[validate(nested)]
    pub grid: GridConfig,
    #[validate(nested)]
    pub investment: InvestmentConfig,
    #[validate(nested)]
    pub runs: RunsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataConfig {
    /// Folder holding the four scenario JSON files
    pub scenario_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            scenario_dir: PathBuf::from("data/reference_day"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SolverConfig {
    /// Wall-clock limit per solve; unset means no limit
    #[validate(range(min = 0.001))]
    pub time_limit_seconds: Option<f64>,
    #[validate(range(min = 1, max = 256))]
    pub workers: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: Some(60.0),
            workers: 1,
        }
    }
}

impl SolverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_seconds.map(Duration::from_secs_f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GridConfig {
    #[validate(range(min = 0.0))]
    pub max_import_kwh: f64,
    #[validate(range(min = 0.0))]
    pub max_export_kwh: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_import_kwh: DEFAULT_MAX_IMPORT_KWH,
            max_export_kwh: DEFAULT_MAX_EXPORT_KWH,
        }
    }
}

impl From<&GridConfig> for GridLimits {
    fn from(grid: &GridConfig) -> Self {
        GridLimits {
            max_import_kwh: grid.max_import_kwh,
            max_export_kwh: grid.max_export_kwh,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvestmentConfig {
    #[validate(range(exclusive_min = 0.0))]
    pub max_scale: f64,
    /// Enables the lifetime cutoff in the sizing scenario
    #[validate(range(exclusive_min = 0.0))]
    pub lifetime_years: Option<f64>,
    /// Days the daily profile is repeated for the sizing scenario
    #[validate(range(min = 1))]
    pub horizon_days: usize,
}

impl Default for InvestmentConfig {
    fn default() -> Self {
        Self {
            max_scale: crate::domain::inputs::DEFAULT_MAX_SCALE,
            lifetime_years: None,
            horizon_days: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunsConfig {
    /// Flexible-load scenario
    #[validate(range(min = 0.0))]
    pub discomfort_weight: f64,
    /// Flexible-load scenario; the battery scenarios always track strictly
    #[validate(range(min = 0.0))]
    pub tolerance_ratio: f64,
    /// Battery and battery-sizing scenarios
    #[serde(default = "default_battery_discomfort_weight")]
    #[validate(range(min = 0.0))]
    pub battery_discomfort_weight: f64,
    pub scenarios: Vec<Scenario>,
    pub sweeps: Vec<NamedSweep>,
    /// Where to write the JSON report; unset skips it
    pub output: Option<PathBuf>,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            discomfort_weight: crate::domain::inputs::DEFAULT_DISCOMFORT_WEIGHT,
            tolerance_ratio: 0.0,
            battery_discomfort_weight: DEFAULT_BATTERY_DISCOMFORT_WEIGHT,
            scenarios: vec![
                Scenario::Base,
                Scenario::FlexibleLoad,
                Scenario::Battery,
                Scenario::BatterySizing,
            ],
            sweeps: Vec::new(),
            output: None,
        }
    }
}

fn default_battery_discomfort_weight() -> f64 {
    DEFAULT_BATTERY_DISCOMFORT_WEIGHT
}

impl RunsConfig {
    /// Copy of `params` carrying the run settings of `scenario`
    pub fn scenario_params(
        &self,
        params: &ParameterSet,
        scenario: Scenario,
    ) -> Result<ParameterSet, ParameterError> {
        let mut params = params.clone();
        if params.flexible_load.is_none() {
            return Ok(params);
        }
        match scenario {
            Scenario::Base => {}
            Scenario::FlexibleLoad => {
                params.set_discomfort_weight(self.discomfort_weight)?;
                if self.tolerance_ratio > 0.0 {
                    params.set_tolerance_ratio(self.tolerance_ratio)?;
                }
            }
            Scenario::Battery | Scenario::BatterySizing => {
                params.set_discomfort_weight(self.battery_discomfort_weight)?;
            }
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// JSON log lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Defaults, then `config/default.toml`, then `DISPATCH__*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file(DEFAULT_CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().context("reading configuration")?;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_toml(toml: &str) -> Result<Config> {
        Config::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml)),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = with_toml("").unwrap();
        assert_eq!(config.solver.workers, 1);
        assert_eq!(config.runs.scenarios.len(), 4);
        assert_eq!(config.grid.max_import_kwh, 1000.0);
    }

    #[test]
    fn test_toml_overrides() {
        let config = with_toml(
            r#"
            [solver]
            workers = 4

            [runs]
            scenarios = ["base", "battery_sizing"]
            sweeps = ["base_export_tariff"]
            "#,
        )
        .unwrap();
        assert_eq!(config.solver.workers, 4);
        assert_eq!(
            config.runs.scenarios,
            vec![Scenario::Base, Scenario::BatterySizing]
        );
        assert_eq!(config.runs.sweeps, vec![NamedSweep::BaseExportTariff]);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(with_toml("[solver]\nworkers = 0").is_err());
    }

    #[test]
    fn test_negative_discomfort_rejected() {
        assert!(with_toml("[runs]\ndiscomfort_weight = -1.0").is_err());
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        assert!(with_toml("[runs]\nscenarios = [\"offgrid\"]").is_err());
    }

    fn flexible_params() -> ParameterSet {
        ParameterSet::new(vec![1.0; 3], vec![1.0; 3], vec![1.0; 3], 0.1, 0.1)
            .with_flexible_load(crate::domain::FlexibleLoad::new(vec![1.0, 2.0, 0.5], 3.0, 0.5))
    }

    #[test]
    fn test_tolerance_only_reaches_flexible_load() {
        let runs = RunsConfig {
            discomfort_weight: 0.8,
            tolerance_ratio: 0.4,
            ..RunsConfig::default()
        };
        let params = flexible_params();

        let flexible = runs.scenario_params(&params, Scenario::FlexibleLoad).unwrap();
        let flexible = flexible.flexible_load.unwrap();
        assert_eq!(flexible.discomfort_weight, 0.8);
        assert_eq!(flexible.tolerance, Some(vec![0.4, 0.8, 0.2]));

        for scenario in [Scenario::Battery, Scenario::BatterySizing] {
            let battery = runs.scenario_params(&params, scenario).unwrap();
            let battery = battery.flexible_load.unwrap();
            assert_eq!(battery.discomfort_weight, DEFAULT_BATTERY_DISCOMFORT_WEIGHT);
            assert!(battery.tolerance.is_none());
        }

        // the shared set is left as it was
        assert!(params.flexible_load.unwrap().tolerance.is_none());
    }

    #[test]
    fn test_battery_discomfort_from_toml() {
        let config = with_toml("[runs]\nbattery_discomfort_weight = 3.0").unwrap();
        let battery = config
            .runs
            .scenario_params(&flexible_params(), Scenario::Battery)
            .unwrap();
        assert_eq!(battery.flexible_load.unwrap().discomfort_weight, 3.0);
    }

    #[test]
    fn test_time_limit_conversion() {
        let solver = SolverConfig {
            time_limit_seconds: Some(1.5),
            workers: 1,
        };
        assert_eq!(solver.time_limit(), Some(Duration::from_millis(1500)));
    }
}
