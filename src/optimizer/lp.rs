use serde::{Deserialize, Serialize};
use strum::Display;

use super::ConstraintKey;

/// Handle of a decision variable inside one [`LinearProgram`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle of a constraint inside one [`LinearProgram`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(usize);

impl ConstraintId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a decision variable stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VarKind {
    PvUsed,
    Import,
    Export,
    Served,
    Deviation,
    Charge,
    Discharge,
    Soc,
    Scale,
    LifetimeActive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub kind: VarKind,
    pub hour: Option<usize>,
    pub lower: f64,
    /// `None` means unbounded above
    pub upper: Option<f64>,
}

/// Sparse linear combination of variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`LinearExpr::push`]
    pub fn term(mut self, var: VarId, coefficient: f64) -> Self {
        self.push(var, coefficient);
        self
    }

    /// Add `coefficient * var`; zero coefficients are dropped
    pub fn push(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression for a full primal vector
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coefficient)| coefficient * values[var.index()])
            .sum()
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        let mut expr = LinearExpr::new();
        for (var, coefficient) in iter {
            expr.push(var, coefficient);
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Comparison {
    #[strum(serialize = "<=")]
    LessEq,
    #[strum(serialize = ">=")]
    GreaterEq,
    #[strum(serialize = "==")]
    Equal,
}

/// `expr (<=|>=|==) rhs`, addressable by key for dual lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub key: ConstraintKey,
    pub expr: LinearExpr,
    pub cmp: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Amount by which the constraint is violated, zero when satisfied
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.expr.evaluate(values);
        match self.cmp {
            Comparison::LessEq => (lhs - self.rhs).max(0.0),
            Comparison::GreaterEq => (self.rhs - lhs).max(0.0),
            Comparison::Equal => (lhs - self.rhs).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Maximise,
    Minimise,
}

/// Solver-independent description of a linear program
#[derive(Debug, Clone)]
pub struct LinearProgram {
    sense: Sense,
    variables: Vec<VariableDef>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
}

impl LinearProgram {
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: LinearExpr::new(),
        }
    }

    pub fn add_variable(
        &mut self,
        kind: VarKind,
        hour: Option<usize>,
        lower: f64,
        upper: Option<f64>,
    ) -> VarId {
        self.variables.push(VariableDef {
            kind,
            hour,
            lower,
            upper,
        });
        VarId(self.variables.len() - 1)
    }

    /// One variable per hour, all with the same bounds
    pub fn add_hourly(
        &mut self,
        kind: VarKind,
        hours: usize,
        lower: f64,
        upper: Option<f64>,
    ) -> Vec<VarId> {
        (0..hours)
            .map(|hour| self.add_variable(kind, Some(hour), lower, upper))
            .collect()
    }

    pub fn add_constraint(
        &mut self,
        key: ConstraintKey,
        expr: LinearExpr,
        cmp: Comparison,
        rhs: f64,
    ) -> ConstraintId {
        self.constraints.push(LinearConstraint {
            key,
            expr,
            cmp,
            rhs,
        });
        ConstraintId(self.constraints.len() - 1)
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn constraint(&self, id: ConstraintId) -> &LinearConstraint {
        &self.constraints[id.index()]
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    /// Largest bound or constraint violation of a primal vector
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let bounds = self.variables.iter().zip(values).map(|(def, value)| {
            let below = (def.lower - value).max(0.0);
            let above = def.upper.map_or(0.0, |upper| (value - upper).max(0.0));
            below.max(above)
        });
        let rows = self.constraints.iter().map(|c| c.violation(values));
        bounds.chain(rows).fold(0.0, f64::max)
    }
}
