//! Mode selection: solve every convex sub-problem and keep the cheapest
//!
//! Each mode is solved independently against read-only shared inputs, so
//! the evaluation fans out over a rayon pool and fans back in with a
//! minimum-cost reduction. Ties go to the first-enumerated mode.

use std::sync::atomic::{AtomicBool, Ordering};

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::common::{ObstacleMode, Trajectory, TrajectoryError, TrajectoryResult};

use super::constraints::{ConstraintBuilder, ConstraintSet};
use super::cost_function::CostFunction;
use super::mode_enumerator::ModeEnumerator;
use super::solver::{ConvergenceStatus, SolverOutcome, TrajectorySolver};

/// How mode evaluations are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// One mode after another on the calling thread
    #[default]
    Sequential,
    /// Fan out over the global rayon pool
    Parallel,
}

/// Initial guesses tried per mode
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RetryPolicy {
    /// Only the caller's initial guess
    #[default]
    SingleShot,
    /// The caller's guess plus `attempts` Gaussian perturbations of it
    PerturbedRestarts { attempts: usize, sigma: f64, seed: u64 },
}

impl RetryPolicy {
    /// Guesses for the mode at `mode_index`. The first one is always the
    /// unperturbed base guess.
    pub fn initial_guesses(
        &self,
        base: &Trajectory,
        constraints: &ConstraintSet,
        mode_index: u64,
    ) -> Vec<Trajectory> {
        let mut guesses = vec![base.clone()];

        if let RetryPolicy::PerturbedRestarts { attempts, sigma, seed } = *self {
            let normal = match Normal::new(0.0, sigma) {
                Ok(normal) => normal,
                Err(_) => return guesses,
            };
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(mode_index));

            for _ in 0..attempts {
                let mut positions: Vec<f64> = base
                    .positions
                    .iter()
                    .zip(constraints.bounds())
                    .map(|(&s, b)| {
                        if b.is_fixed() {
                            s
                        } else {
                            s + normal.sample(&mut rng)
                        }
                    })
                    .collect();
                constraints.project_onto_bounds(&mut positions);
                guesses.push(Trajectory::from_positions(positions));
            }
        }

        guesses
    }
}

/// Report of one mode. `outcome` is `None` when the mode was skipped by
/// early exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeEvaluation {
    pub mode_index: u64,
    pub mode: ObstacleMode,
    pub outcome: Option<SolverOutcome>,
}

impl ModeEvaluation {
    pub fn status(&self) -> Option<ConvergenceStatus> {
        self.outcome.as_ref().map(|o| o.status)
    }

    pub fn converged_cost(&self) -> Option<f64> {
        self.outcome
            .as_ref()
            .filter(|o| o.is_converged())
            .map(|o| o.cost)
    }
}

/// Best converged trajectory of a planning call
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningResult {
    pub trajectory: Trajectory,
    pub cost: f64,
    pub mode: ObstacleMode,
    pub status: ConvergenceStatus,
}

/// Runs a solver over every mode and picks the cheapest converged result
pub struct ModeSelector<'s, S: TrajectorySolver + ?Sized> {
    solver: &'s S,
    strategy: ExecutionStrategy,
    retry: RetryPolicy,
    early_exit: bool,
    early_exit_tolerance: f64,
}

impl<'s, S: TrajectorySolver + ?Sized> ModeSelector<'s, S> {
    pub fn new(solver: &'s S) -> Self {
        Self {
            solver,
            strategy: ExecutionStrategy::default(),
            retry: RetryPolicy::default(),
            early_exit: false,
            early_exit_tolerance: 1e-9,
        }
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Skip the remaining modes once a converged cost reaches the cost
    /// function's lower bound.
    pub fn with_early_exit(mut self, enabled: bool) -> Self {
        self.early_exit = enabled;
        self
    }

    /// Solve every mode and report each outcome in enumeration order
    pub fn evaluate(
        &self,
        cost: &CostFunction,
        builder: &ConstraintBuilder<'_>,
        enumerator: &ModeEnumerator,
        initial_guess: &Trajectory,
    ) -> TrajectoryResult<Vec<ModeEvaluation>> {
        let done = AtomicBool::new(false);
        let lower_bound = cost.lower_bound() + self.early_exit_tolerance;

        let evaluate_one = |mode_index: u64, mode: ObstacleMode| -> TrajectoryResult<ModeEvaluation> {
            if self.early_exit && done.load(Ordering::Relaxed) {
                debug!(mode_index, "skipped after reaching the cost lower bound");
                return Ok(ModeEvaluation { mode_index, mode, outcome: None });
            }

            let constraints = builder.build(&mode)?;
            let outcome = self.solve_mode(cost, &constraints, initial_guess, mode_index);
            debug!(
                mode_index,
                status = %outcome.status,
                cost = outcome.cost,
                "evaluated mode"
            );
            if !outcome.is_converged() {
                warn!(mode_index, status = %outcome.status, "dropping mode");
            } else if self.early_exit && outcome.cost <= lower_bound {
                done.store(true, Ordering::Relaxed);
            }

            Ok(ModeEvaluation {
                mode_index,
                mode,
                outcome: Some(outcome),
            })
        };

        match self.strategy {
            ExecutionStrategy::Sequential => enumerator
                .iter()
                .enumerate()
                .map(|(i, mode)| evaluate_one(i as u64, mode))
                .collect(),
            ExecutionStrategy::Parallel => {
                let count = usize::try_from(enumerator.mode_count()).map_err(|_| {
                    TrajectoryError::TooManyObstacles {
                        count: enumerator.obstacle_count(),
                        limit: usize::BITS as usize - 1,
                    }
                })?;
                (0..count)
                    .into_par_iter()
                    .map(|i| {
                        let index = i as u64;
                        let mode = enumerator.mode(index).ok_or_else(|| {
                            TrajectoryError::InvalidParameter(format!(
                                "mode index {} out of range",
                                index
                            ))
                        })?;
                        evaluate_one(index, mode)
                    })
                    .collect()
            }
        }
    }

    /// Solve every mode and return the cheapest converged one
    pub fn select(
        &self,
        cost: &CostFunction,
        builder: &ConstraintBuilder<'_>,
        enumerator: &ModeEnumerator,
        initial_guess: &Trajectory,
    ) -> TrajectoryResult<PlanningResult> {
        let evaluations = self.evaluate(cost, builder, enumerator, initial_guess)?;
        let result = select_best(&evaluations)?;
        info!(
            modes = evaluations.len(),
            cost = result.cost,
            mode = ?result.mode.sides(),
            "selected trajectory"
        );
        Ok(result)
    }

    /// Best converged attempt over the retry policy's guesses, or the first
    /// attempt when none converged.
    fn solve_mode(
        &self,
        cost: &CostFunction,
        constraints: &ConstraintSet,
        initial_guess: &Trajectory,
        mode_index: u64,
    ) -> SolverOutcome {
        let mut best: Option<SolverOutcome> = None;
        let mut first: Option<SolverOutcome> = None;

        for guess in self.retry.initial_guesses(initial_guess, constraints, mode_index) {
            let outcome = self.solver.solve(cost, constraints, &guess);
            if outcome.is_converged()
                && best.as_ref().map_or(true, |b| outcome.cost < b.cost)
            {
                best = Some(outcome.clone());
            }
            if first.is_none() {
                first = Some(outcome);
            }
        }

        best.or(first).unwrap_or_else(|| {
            SolverOutcome::new(
                initial_guess.clone(),
                f64::INFINITY,
                ConvergenceStatus::NumericalFailure,
            )
        })
    }
}

/// Minimum-cost converged evaluation, first-enumerated on ties
pub fn select_best(evaluations: &[ModeEvaluation]) -> TrajectoryResult<PlanningResult> {
    evaluations
        .iter()
        .filter_map(|e| e.converged_cost().map(|c| (e, c)))
        .min_by_key(|(e, c)| (OrderedFloat(*c), e.mode_index))
        .and_then(|(e, _)| {
            e.outcome.as_ref().map(|o| PlanningResult {
                trajectory: o.trajectory.clone(),
                cost: o.cost,
                mode: e.mode.clone(),
                status: o.status,
            })
        })
        .ok_or(TrajectoryError::NoFeasibleMode {
            evaluated: evaluations.len(),
        })
}
