use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument};

use super::{Sweep, SweepError, TaggedResult};
use crate::optimizer::{DispatchModel, LpSolver};

/// Solve the points of `sweep` on tokio's blocking pool, at most `workers`
/// at a time.
///
/// Every point gets its own parameter copy and its own model, so the only
/// thing shared between workers is the solver, which is `Sync`. Results come
/// back in iteration order regardless of completion order.
#[instrument(name = "parallel_sweep", skip_all, fields(scenario = %sweep.scenario(), workers = workers))]
pub async fn run_parallel(
    sweep: &Sweep,
    solver: Arc<dyn LpSolver>,
    workers: usize,
) -> Result<Vec<TaggedResult>, SweepError> {
    let points = sweep.points()?;
    let total = points.len();
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let scenario = sweep.scenario();
    info!(points = total, "running sweep in parallel");

    let mut tasks = JoinSet::new();
    for point in points {
        // parameters are prepared up front so a bad knob fails before any solve
        let params = sweep.prepare(&point)?;
        let solver = Arc::clone(&solver);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| SweepError::Worker(e.to_string()))?;
            let index = point.index;
            let result = tokio::task::spawn_blocking(move || {
                DispatchModel::for_scenario(params, scenario)
                    .map(|model| model.solve(solver.as_ref()))
            })
            .await
            .map_err(|e| SweepError::Worker(e.to_string()))??;
            Ok::<_, SweepError>((
                index,
                TaggedResult {
                    tags: point.tags,
                    result,
                },
            ))
        });
    }

    let mut indexed = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        indexed.push(joined.map_err(|e| SweepError::Worker(e.to_string()))??);
    }
    indexed.sort_by_key(|(index, _)| *index);

    info!(total, "parallel sweep finished");
    Ok(indexed.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{FlexibleLoad, ParameterSet};
    use crate::optimizer::{LinearProgram, LpSolution, Scenario, SolverOutput};
    use crate::sweep::{Knob, SweepAxis, SweepRange};

    /// Sleeps longer for earlier points so completion order is reversed, and
    /// reports the export tariff as the objective
    struct ReversingSolver;

    impl LpSolver for ReversingSolver {
        fn solve(&self, program: &LinearProgram) -> SolverOutput {
            // export coefficient is s - GE with s = 10
            let export_tariff = 10.0 - program.objective().terms()[0].1;
            std::thread::sleep(Duration::from_millis((40.0 - export_tariff * 10.0) as u64));
            SolverOutput::optimal(LpSolution {
                objective: export_tariff,
                values: vec![0.0; program.variables().len()],
                duals: vec![0.0; program.constraints().len()],
            })
        }
    }

    fn sweep() -> Sweep {
        let base = ParameterSet::new(vec![1.0; 4], vec![1.0; 4], vec![10.0; 4], 0.1, 0.1)
            .with_flexible_load(FlexibleLoad::new(vec![1.0; 4], 3.0, 0.5));
        Sweep::new(
            base,
            Scenario::FlexibleLoad,
            SweepAxis::new(Knob::ExportTariff, SweepRange::stepped(0.0, 3.0, 0.5)),
        )
    }

    #[tokio::test]
    async fn test_results_in_iteration_order() {
        let results = run_parallel(&sweep(), Arc::new(ReversingSolver), 4)
            .await
            .unwrap();

        let tags: Vec<f64> = results
            .iter()
            .map(|r| r.tag(Knob::ExportTariff).unwrap())
            .collect();
        assert_eq!(tags, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
        for record in &results {
            let objective = record.result.objective().unwrap();
            assert!((objective - record.tag(Knob::ExportTariff).unwrap()).abs() < 1e-12);
        }
    }

    #[tokio::test]
    async fn test_matches_sequential_run() {
        let sweep = sweep();
        let sequential = sweep.run(&ReversingSolver).unwrap();
        let parallel = run_parallel(&sweep, Arc::new(ReversingSolver), 2)
            .await
            .unwrap();
        assert_eq!(sequential, parallel);
    }
}
