//! Augmented Lagrangian reference solver
//!
//! Outer loop updates inequality multipliers and the penalty parameter.
//! The inner loop minimizes the piecewise-quadratic augmented Lagrangian
//! with semi-smooth Newton steps and Armijo backtracking. Pinned samples
//! are eliminated, finite bounds on the remaining samples become rows.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

use crate::common::Trajectory;

use super::constraints::ConstraintSet;
use super::cost_function::CostFunction;
use super::solver::{ConvergenceStatus, SolverOutcome, TrajectorySolver};

/// Iteration budget and tolerances of the reference solver
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Multiplier updates
    pub max_outer_iterations: usize,
    /// Newton steps per multiplier update
    pub max_inner_iterations: usize,
    /// Largest accepted constraint violation
    pub constraint_tolerance: f64,
    /// Gradient norm of the inner problem, relative to its value
    pub stationarity_tolerance: f64,
    pub initial_penalty: f64,
    pub penalty_growth: f64,
    pub max_penalty: f64,
    /// Diagonal shift keeping the Newton system positive definite
    pub regularization: f64,
    /// Sufficient decrease parameter of the line search
    pub armijo: f64,
    /// Smallest line search step before giving up
    pub min_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_outer_iterations: 40,
            max_inner_iterations: 50,
            constraint_tolerance: 1e-6,
            stationarity_tolerance: 1e-9,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e8,
            regularization: 1e-10,
            armijo: 1e-4,
            min_step: 1e-12,
        }
    }
}

/// offset + sum(coeff * x[k]) >= 0
#[derive(Debug, Clone)]
struct Row {
    offset: f64,
    terms: Vec<(usize, f64)>,
}

impl Row {
    fn evaluate(&self, x: &[f64]) -> f64 {
        self.offset + self.terms.iter().map(|&(k, c)| c * x[k]).sum::<f64>()
    }
}

struct InnerResult {
    iterations: usize,
    converged: bool,
}

/// Deterministic constrained minimizer for quadratic costs and linear rows
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangianSolver {
    config: SolverConfig,
}

impl AugmentedLagrangianSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SolverConfig::default())
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn collect_rows(constraints: &ConstraintSet) -> Vec<Row> {
        let mut rows: Vec<Row> = constraints
            .inequalities()
            .iter()
            .map(|ineq| Row {
                offset: ineq.offset,
                terms: ineq.terms.clone(),
            })
            .collect();

        for (k, bound) in constraints.bounds().iter().enumerate() {
            if bound.is_fixed() {
                continue;
            }
            if bound.lower.is_finite() {
                rows.push(Row { offset: -bound.lower, terms: vec![(k, 1.0)] });
            }
            if bound.upper.is_finite() {
                rows.push(Row { offset: bound.upper, terms: vec![(k, -1.0)] });
            }
        }
        rows
    }

    fn max_violation(rows: &[Row], x: &[f64]) -> f64 {
        rows.iter()
            .map(|row| (-row.evaluate(x)).max(0.0))
            .fold(0.0, f64::max)
    }

    /// Augmented Lagrangian value, its gradient and the active row mask
    fn merit(
        cost: &CostFunction,
        rows: &[Row],
        lambda: &[f64],
        rho: f64,
        x: &[f64],
    ) -> (f64, Vec<f64>, Vec<bool>) {
        let mut value = cost.evaluate(x);
        let mut grad = cost.gradient(x);
        let mut active = Vec::with_capacity(rows.len());

        for (row, &l) in rows.iter().zip(lambda) {
            let shifted = l - rho * row.evaluate(x);
            let clipped = shifted.max(0.0);
            value += (clipped * clipped - l * l) / (2.0 * rho);
            active.push(shifted > 0.0);
            if clipped > 0.0 {
                for &(k, c) in &row.terms {
                    grad[k] -= clipped * c;
                }
            }
        }
        (value, grad, active)
    }

    fn merit_value(cost: &CostFunction, rows: &[Row], lambda: &[f64], rho: f64, x: &[f64]) -> f64 {
        rows.iter().zip(lambda).fold(cost.evaluate(x), |acc, (row, &l)| {
            let clipped = (l - rho * row.evaluate(x)).max(0.0);
            acc + (clipped * clipped - l * l) / (2.0 * rho)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn minimize_inner(
        &self,
        cost: &CostFunction,
        cost_hessian: &DMatrix<f64>,
        rows: &[Row],
        free: &[usize],
        lambda: &[f64],
        rho: f64,
        x: &mut [f64],
    ) -> Option<InnerResult> {
        let nf = free.len();
        if nf == 0 {
            return Some(InnerResult { iterations: 0, converged: true });
        }
        let mut free_pos = vec![None; x.len()];
        for (p, &k) in free.iter().enumerate() {
            free_pos[k] = Some(p);
        }

        let mut iterations = 0;
        let mut converged = false;
        let mut trial = x.to_vec();

        while iterations < self.config.max_inner_iterations {
            iterations += 1;
            let (value, grad, active) = Self::merit(cost, rows, lambda, rho, x);
            let g = DVector::from_iterator(nf, free.iter().map(|&k| grad[k]));
            if !value.is_finite() || g.iter().any(|v| !v.is_finite()) {
                return None;
            }
            if g.amax() <= self.config.stationarity_tolerance * (1.0 + value.abs()) {
                converged = true;
                break;
            }

            // Generalized Hessian restricted to the free samples
            let mut h = DMatrix::from_fn(nf, nf, |r, c| cost_hessian[(free[r], free[c])]);
            for (row, _) in rows.iter().zip(&active).filter(|(_, a)| **a) {
                for &(i, ci) in &row.terms {
                    let Some(pi) = free_pos[i] else { continue };
                    for &(j, cj) in &row.terms {
                        if let Some(pj) = free_pos[j] {
                            h[(pi, pj)] += rho * ci * cj;
                        }
                    }
                }
            }
            for p in 0..nf {
                h[(p, p)] += self.config.regularization;
            }

            let direction = -h.cholesky()?.solve(&g);
            let slope = g.dot(&direction);
            if !(slope < 0.0) {
                break;
            }

            // Slack absorbs rounding once the decrease is below machine precision
            let slack = 1e-12 * value.abs().max(1.0);
            let mut t = 1.0;
            let accepted = loop {
                trial.copy_from_slice(x);
                for (p, &k) in free.iter().enumerate() {
                    trial[k] += t * direction[p];
                }
                let candidate = Self::merit_value(cost, rows, lambda, rho, &trial);
                if candidate <= value + self.config.armijo * t * slope + slack {
                    break true;
                }
                t *= 0.5;
                if t < self.config.min_step {
                    break false;
                }
            };
            if !accepted {
                trace!(iterations, "line search stalled");
                break;
            }
            x.copy_from_slice(&trial);

            // A full step that keeps the active set lands on the exact minimizer
            // of the current quadratic piece.
            let unchanged = rows
                .iter()
                .zip(lambda)
                .zip(&active)
                .all(|((row, &l), &was)| (l - rho * row.evaluate(x) > 0.0) == was);
            if t == 1.0 && unchanged {
                converged = true;
                break;
            }
        }

        Some(InnerResult { iterations, converged })
    }

    fn finish(
        cost: &CostFunction,
        x: Vec<f64>,
        status: ConvergenceStatus,
        iterations: usize,
    ) -> SolverOutcome {
        let value = cost.evaluate(&x);
        SolverOutcome::new(Trajectory::from_positions(x), value, status).with_iterations(iterations)
    }
}

impl TrajectorySolver for AugmentedLagrangianSolver {
    fn solve(
        &self,
        cost: &CostFunction,
        constraints: &ConstraintSet,
        initial_guess: &Trajectory,
    ) -> SolverOutcome {
        let n = constraints.num_variables();
        if initial_guess.len() != n {
            return SolverOutcome::new(
                initial_guess.clone(),
                f64::INFINITY,
                ConvergenceStatus::NumericalFailure,
            );
        }

        let mut x = initial_guess.positions.clone();
        constraints.project_onto_bounds(&mut x);

        let free: Vec<usize> = constraints
            .bounds()
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_fixed())
            .map(|(k, _)| k)
            .collect();
        let rows = Self::collect_rows(constraints);
        let cost_hessian = cost.hessian(n);

        let mut lambda = vec![0.0; rows.len()];
        let mut rho = self.config.initial_penalty;
        let mut prev_violation = Self::max_violation(&rows, &x);
        let mut iterations = 0;

        for outer in 0..self.config.max_outer_iterations {
            let inner = match self.minimize_inner(cost, &cost_hessian, &rows, &free, &lambda, rho, &mut x) {
                Some(inner) => inner,
                None => {
                    debug!(outer, "numerical failure in Newton step");
                    return Self::finish(cost, x, ConvergenceStatus::NumericalFailure, iterations);
                }
            };
            iterations += inner.iterations;

            if x.iter().any(|v| !v.is_finite()) {
                return Self::finish(cost, x, ConvergenceStatus::NumericalFailure, iterations);
            }

            let violation = Self::max_violation(&rows, &x);
            trace!(outer, rho, violation, converged = inner.converged, "outer iteration");

            if violation <= self.config.constraint_tolerance && inner.converged {
                return Self::finish(cost, x, ConvergenceStatus::Converged, iterations);
            }

            for (l, row) in lambda.iter_mut().zip(&rows) {
                *l = (*l - rho * row.evaluate(&x)).max(0.0);
            }

            if violation > 0.25 * prev_violation {
                if rho >= self.config.max_penalty {
                    if violation > self.config.constraint_tolerance
                        && violation > 0.5 * prev_violation
                    {
                        debug!(outer, violation, "violation stalled at maximum penalty");
                        return Self::finish(cost, x, ConvergenceStatus::Infeasible, iterations);
                    }
                } else {
                    rho = (rho * self.config.penalty_growth).min(self.config.max_penalty);
                }
            }
            prev_violation = violation;
        }

        Self::finish(cost, x, ConvergenceStatus::MaxIterationsReached, iterations)
    }
}
