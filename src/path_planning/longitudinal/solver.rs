//! Solver interface consumed by mode selection
//!
//! Any constrained minimizer can drive the planner as long as it takes the
//! cost, the constraint set of one mode and an initial guess, and reports a
//! definite convergence status within its own iteration budget.

use std::fmt;

use crate::common::Trajectory;

use super::constraints::ConstraintSet;
use super::cost_function::CostFunction;

/// Outcome classification reported by a solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvergenceStatus {
    Converged,
    MaxIterationsReached,
    Infeasible,
    NumericalFailure,
}

impl ConvergenceStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged)
    }
}

impl fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvergenceStatus::Converged => "converged",
            ConvergenceStatus::MaxIterationsReached => "max iterations reached",
            ConvergenceStatus::Infeasible => "infeasible",
            ConvergenceStatus::NumericalFailure => "numerical failure",
        };
        f.write_str(name)
    }
}

/// Result of one solver invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub trajectory: Trajectory,
    pub cost: f64,
    pub status: ConvergenceStatus,
    pub iterations: usize,
}

impl SolverOutcome {
    pub fn new(trajectory: Trajectory, cost: f64, status: ConvergenceStatus) -> Self {
        Self {
            trajectory,
            cost,
            status,
            iterations: 0,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn is_converged(&self) -> bool {
        self.status.is_converged() && self.cost.is_finite()
    }
}

/// Minimize a cost subject to the bounds and inequalities of one mode
pub trait TrajectorySolver: Send + Sync {
    fn solve(
        &self,
        cost: &CostFunction,
        constraints: &ConstraintSet,
        initial_guess: &Trajectory,
    ) -> SolverOutcome;
}

impl<S: TrajectorySolver + ?Sized> TrajectorySolver for &S {
    fn solve(
        &self,
        cost: &CostFunction,
        constraints: &ConstraintSet,
        initial_guess: &Trajectory,
    ) -> SolverOutcome {
        (**self).solve(cost, constraints, initial_guess)
    }
}

impl<S: TrajectorySolver + ?Sized> TrajectorySolver for Box<S> {
    fn solve(
        &self,
        cost: &CostFunction,
        constraints: &ConstraintSet,
        initial_guess: &Trajectory,
    ) -> SolverOutcome {
        (**self).solve(cost, constraints, initial_guess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ConvergenceStatus::Converged.to_string(), "converged");
        assert_eq!(ConvergenceStatus::Infeasible.to_string(), "infeasible");
    }

    #[test]
    fn test_non_finite_cost_is_not_converged() {
        let outcome = SolverOutcome::new(
            Trajectory::from_positions(vec![0.0; 4]),
            f64::NAN,
            ConvergenceStatus::Converged,
        );
        assert!(!outcome.is_converged());
    }
}
