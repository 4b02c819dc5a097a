use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;

use super::{ConstraintId, LinearProgram, VarId};

/// Outcome class of one solver call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimedOut,
    SolverError,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }
}

/// Primal and dual values of an optimal solve
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub objective: f64,
    /// Indexed by [`VarId`]
    pub values: Vec<f64>,
    /// Indexed by [`ConstraintId`], see [`super::ShadowPrices`] for the sign convention
    pub duals: Vec<f64>,
}

impl LpSolution {
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    pub fn values_of(&self, vars: &[VarId]) -> Vec<f64> {
        vars.iter().map(|var| self.value(*var)).collect()
    }

    pub fn dual(&self, constraint: ConstraintId) -> f64 {
        self.duals[constraint.index()]
    }
}

/// What a solver hands back. `solution` is only present for optimal solves.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub status: SolveStatus,
    pub solution: Option<LpSolution>,
    pub message: Option<String>,
}

impl SolverOutput {
    pub fn optimal(solution: LpSolution) -> Self {
        Self {
            status: SolveStatus::Optimal,
            solution: Some(solution),
            message: None,
        }
    }

    pub fn failed(status: SolveStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            solution: None,
            message: Some(message.into()),
        }
    }

    /// The solution, only when the status is optimal
    pub fn solution(&self) -> Option<&LpSolution> {
        if self.status.is_optimal() {
            self.solution.as_ref()
        } else {
            None
        }
    }
}

/// Black-box LP engine.
///
/// Implementations must report duals as the rate of change of the optimal
/// objective per unit relaxation of each constraint. Non-optimal outcomes are
/// returned as a status, never as a panic.
#[cfg_attr(test, mockall::automock)]
pub trait LpSolver: Send + Sync {
    fn solve(&self, program: &LinearProgram) -> SolverOutput;
}

/// Wall-clock limit around any solver.
///
/// The solve runs on its own thread; when the limit expires the result is
/// reported as [`SolveStatus::TimedOut`] and the thread is left to finish on
/// its own.
#[derive(Debug, Clone)]
pub struct TimeLimited<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimeLimited<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl<S> LpSolver for TimeLimited<S>
where
    S: LpSolver + Clone + 'static,
{
    fn solve(&self, program: &LinearProgram) -> SolverOutput {
        let (tx, rx) = mpsc::channel();
        let solver = self.inner.clone();
        let program = program.clone();
        thread::spawn(move || {
            // receiver may be gone after a timeout
            let _ = tx.send(solver.solve(&program));
        });

        match rx.recv_timeout(self.limit) {
            Ok(output) => output,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(limit_ms = self.limit.as_millis() as u64, "solver timed out");
                SolverOutput::failed(
                    SolveStatus::TimedOut,
                    format!("no result within {:?}", self.limit),
                )
            }
            Err(RecvTimeoutError::Disconnected) => {
                SolverOutput::failed(SolveStatus::SolverError, "solver thread panicked")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{LinearExpr, Sense, VarKind};

    #[derive(Debug, Clone)]
    struct SlowSolver {
        delay: Duration,
    }

    impl LpSolver for SlowSolver {
        fn solve(&self, program: &LinearProgram) -> SolverOutput {
            thread::sleep(self.delay);
            SolverOutput::optimal(LpSolution {
                objective: 0.0,
                values: vec![0.0; program.variables().len()],
                duals: vec![0.0; program.constraints().len()],
            })
        }
    }

    fn tiny_program() -> LinearProgram {
        let mut program = LinearProgram::new(Sense::Maximise);
        let x = program.add_variable(VarKind::PvUsed, Some(0), 0.0, Some(1.0));
        program.set_objective(LinearExpr::new().term(x, 1.0));
        program
    }

    #[test]
    fn test_time_limit_expires() {
        let solver = TimeLimited::new(
            SlowSolver {
                delay: Duration::from_millis(500),
            },
            Duration::from_millis(20),
        );
        let output = solver.solve(&tiny_program());
        assert_eq!(output.status, SolveStatus::TimedOut);
        assert!(output.solution().is_none());
    }

    #[test]
    fn test_time_limit_passes_result_through() {
        let solver = TimeLimited::new(
            SlowSolver {
                delay: Duration::from_millis(1),
            },
            Duration::from_secs(5),
        );
        let output = solver.solve(&tiny_program());
        assert!(output.status.is_optimal());
        assert_eq!(output.solution().unwrap().values, vec![0.0]);
    }

    #[test]
    fn test_failed_output_hides_solution() {
        let mut output = SolverOutput::failed(SolveStatus::Infeasible, "no feasible point");
        output.solution = Some(LpSolution {
            objective: 1.0,
            values: vec![],
            duals: vec![],
        });
        assert!(output.solution().is_none());
    }
}
