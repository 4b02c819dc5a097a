use std::sync::Arc;

use anyhow::{Context, Result};
use household_dispatch::config::{Config, SolverConfig};
use household_dispatch::domain::{JsonDirectory, ParameterSet, ScenarioData, ScenarioSource};
use household_dispatch::optimizer::{solve_scenario, LpSolver, Scenario};
use household_dispatch::report::{self, SweepReport};
use household_dispatch::sweep::{run_parallel, TaggedResult};
use household_dispatch::telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::load()?;
    init_tracing(cfg.logging.json);

    let source = JsonDirectory::new(&cfg.data.scenario_dir);
    let data = source.load()?;
    let params = configured_params(&data, &cfg)?;
    let solver = build_solver(&cfg.solver)?;

    info!(
        hours = params.hours(),
        scenarios = cfg.runs.scenarios.len(),
        sweeps = cfg.runs.sweeps.len(),
        "starting household dispatch"
    );

    let mut reports = Vec::new();

    for &scenario in &cfg.runs.scenarios {
        let scenario_params = horizon(&params, scenario, &cfg)?;
        let result = solve_scenario(scenario_params, scenario, solver.as_ref())
            .with_context(|| format!("building {scenario} model"))?;
        println!("{}", report::summary(&result, &scenario.to_string()));
        reports.push(SweepReport::new(
            scenario.to_string(),
            vec![TaggedResult {
                tags: Vec::new(),
                result,
            }],
        ));
    }

    for &named in &cfg.runs.sweeps {
        let sweep = named
            .sweep(&horizon(&params, named.scenario(), &cfg)?)
            .with_context(|| format!("preparing sweep {named}"))?;
        let records = if cfg.solver.workers > 1 {
            run_parallel(&sweep, Arc::clone(&solver), cfg.solver.workers).await?
        } else {
            sweep.run(solver.as_ref())?
        };
        println!("=== sweep {named} ===");
        print!("{}", report::sweep_table(&records));
        reports.push(SweepReport::new(named.to_string(), records));
    }

    if let Some(path) = &cfg.runs.output {
        report::write_json(path, &reports)?;
    }

    info!("done");
    Ok(())
}

/// Assembled parameters with run settings applied. Limits present in the data
/// take precedence over configured ones.
fn configured_params(data: &ScenarioData, cfg: &Config) -> Result<ParameterSet> {
    let mut params = ParameterSet::assemble(data).context("assembling parameters")?;

    if data.bus.max_import.is_none() {
        params.grid.max_import_kwh = cfg.grid.max_import_kwh;
    }
    if data.bus.max_export.is_none() {
        params.grid.max_export_kwh = cfg.grid.max_export_kwh;
    }

    let data_max_scale = data.appliances.storage.first().and_then(|s| s.max_scale);
    if let Some(investment) = params.investment.as_mut() {
        if data_max_scale.is_none() {
            investment.max_scale = cfg.investment.max_scale;
        }
        if investment.lifetime_years.is_none() {
            investment.lifetime_years = cfg.investment.lifetime_years;
        }
    }

    params.validate().context("invalid run parameters")?;
    Ok(params)
}

/// Per-scenario run settings; the sizing scenario also runs over the
/// configured number of days
fn horizon(params: &ParameterSet, scenario: Scenario, cfg: &Config) -> Result<ParameterSet> {
    let params = cfg
        .runs
        .scenario_params(params, scenario)
        .with_context(|| format!("applying {scenario} run settings"))?;
    Ok(match scenario {
        Scenario::BatterySizing if cfg.investment.horizon_days > 1 => {
            params.tiled(cfg.investment.horizon_days)
        }
        _ => params,
    })
}

#[cfg(feature = "optimization")]
fn build_solver(cfg: &SolverConfig) -> Result<Arc<dyn LpSolver>> {
    use household_dispatch::optimizer::{ClarabelSolver, TimeLimited};

    let solver: Arc<dyn LpSolver> = match cfg.time_limit() {
        Some(limit) => Arc::new(TimeLimited::new(ClarabelSolver::new(), limit)),
        None => Arc::new(ClarabelSolver::new()),
    };
    Ok(solver)
}

#[cfg(not(feature = "optimization"))]
fn build_solver(_cfg: &SolverConfig) -> Result<Arc<dyn LpSolver>> {
    anyhow::bail!("built without the `optimization` feature, no LP backend available")
}
