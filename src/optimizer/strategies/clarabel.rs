//! Clarabel backend
//!
//! Translates a [`LinearProgram`] into a `good_lp` model solved by the pure-Rust
//! Clarabel interior-point solver. The raw dual of every row is the rate of
//! change of the optimal objective per unit increase of its rhs, whatever the
//! sense. Relaxing a `>=` row lowers its rhs, so those duals are negated.
//!
//! Interior-point solutions are accurate to roughly 1e-8 relative. On LPs with
//! several optimal vertices the primal lands in the interior of the optimal
//! face rather than on a vertex.

use good_lp::solvers::{DualValues, SolutionWithDual};
use good_lp::{
    clarabel, constraint, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use tracing::{debug, warn};

use crate::optimizer::{
    Comparison, LinearExpr, LinearProgram, LpSolution, LpSolver, Sense, SolveStatus, SolverOutput,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ClarabelSolver;

impl ClarabelSolver {
    pub fn new() -> Self {
        Self
    }
}

fn to_expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    expr.terms()
        .iter()
        .map(|(var, coefficient)| *coefficient * vars[var.index()])
        .sum()
}

fn map_error(error: ResolutionError) -> SolverOutput {
    match error {
        ResolutionError::Infeasible => {
            SolverOutput::failed(SolveStatus::Infeasible, "problem is infeasible")
        }
        ResolutionError::Unbounded => {
            SolverOutput::failed(SolveStatus::Unbounded, "problem is unbounded")
        }
        other => {
            warn!(error = %other, "clarabel failed");
            SolverOutput::failed(SolveStatus::SolverError, other.to_string())
        }
    }
}

impl LpSolver for ClarabelSolver {
    fn solve(&self, program: &LinearProgram) -> SolverOutput {
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = program
            .variables()
            .iter()
            .map(|def| {
                let mut definition = variable().min(def.lower);
                if let Some(upper) = def.upper {
                    definition = definition.max(upper);
                }
                problem.add(definition)
            })
            .collect();

        let objective = to_expression(program.objective(), &vars);
        let unsolved = match program.sense() {
            Sense::Maximise => problem.maximise(objective),
            Sense::Minimise => problem.minimise(objective),
        };
        let mut model = unsolved.using(clarabel);

        let references: Vec<_> = program
            .constraints()
            .iter()
            .map(|row| {
                let lhs = to_expression(&row.expr, &vars);
                let rhs = row.rhs;
                let built = match row.cmp {
                    Comparison::LessEq => constraint!(lhs <= rhs),
                    Comparison::GreaterEq => constraint!(lhs >= rhs),
                    Comparison::Equal => constraint!(lhs == rhs),
                };
                model.add_constraint(built)
            })
            .collect();

        debug!(
            variables = vars.len(),
            constraints = references.len(),
            "solving with clarabel"
        );

        let mut solution = match model.solve() {
            Ok(solution) => solution,
            Err(error) => return map_error(error),
        };

        let values: Vec<f64> = vars.iter().map(|var| solution.value(*var)).collect();
        let objective = program.objective().evaluate(&values);

        let dual = solution.compute_dual();
        let duals = references
            .iter()
            .zip(program.constraints())
            .map(|(reference, row)| {
                let raw = dual.dual(reference.clone());
                match row.cmp {
                    Comparison::GreaterEq => -raw,
                    Comparison::LessEq | Comparison::Equal => raw,
                }
            })
            .collect();

        SolverOutput::optimal(LpSolution {
            objective,
            values,
            duals,
        })
    }
}
