//! Longitudinal trajectory planner
//!
//! Validates a planning request, builds the cost and the shared constraint
//! inputs, then hands every obstacle mode to the [`ModeSelector`].

use tracing::debug;

use crate::common::{
    Obstacle, TimeGrid, Trajectory, TrajectoryError, TrajectoryResult, VehicleInitialState,
};

use super::augmented_lagrangian::AugmentedLagrangianSolver;
use super::constraints::{ConstraintBuilder, KinematicLimits, PINNED_PREFIX};
use super::cost_function::{CostFunction, CostWeights};
use super::kinematic_model::KinematicModel;
use super::mode_enumerator::{ModeEnumerator, DEFAULT_MAX_OBSTACLES};
use super::mode_selector::{
    ExecutionStrategy, ModeEvaluation, ModeSelector, PlanningResult, RetryPolicy,
};
use super::solver::TrajectorySolver;

/// Configuration for the longitudinal planner
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Planning horizon T [s]
    pub horizon: f64,
    /// Number of position samples N
    pub num_samples: usize,
    /// Desired cruise velocity [m/s]
    pub desired_velocity: f64,
    pub limits: KinematicLimits,
    pub weights: CostWeights,
    /// Obstacle cap for mode enumeration
    pub max_obstacles: usize,
    pub strategy: ExecutionStrategy,
    pub retry: RetryPolicy,
    /// Stop evaluating modes once the cost lower bound is reached
    pub early_exit: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            horizon: 10.0,
            num_samples: 30,
            desired_velocity: 20.0,
            limits: KinematicLimits::default(),
            weights: CostWeights::default(),
            max_obstacles: DEFAULT_MAX_OBSTACLES,
            strategy: ExecutionStrategy::Sequential,
            retry: RetryPolicy::SingleShot,
            early_exit: false,
        }
    }
}

impl PlannerConfig {
    pub fn with_horizon(mut self, horizon: f64, num_samples: usize) -> Self {
        self.horizon = horizon;
        self.num_samples = num_samples;
        self
    }

    pub fn with_desired_velocity(mut self, desired_velocity: f64) -> Self {
        self.desired_velocity = desired_velocity;
        self
    }

    pub fn with_limits(mut self, limits: KinematicLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_weights(mut self, weights: CostWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_max_obstacles(mut self, max_obstacles: usize) -> Self {
        self.max_obstacles = max_obstacles;
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_early_exit(mut self, early_exit: bool) -> Self {
        self.early_exit = early_exit;
        self
    }

    /// Checks everything that does not depend on a request
    pub fn validate(&self) -> TrajectoryResult<TimeGrid> {
        let grid = TimeGrid::new(self.horizon, self.num_samples)?;
        if !self.desired_velocity.is_finite() {
            return Err(TrajectoryError::InvalidParameter(format!(
                "desired velocity must be finite, got {}",
                self.desired_velocity
            )));
        }
        self.limits.validate()?;
        self.weights.validate()?;
        Ok(grid)
    }
}

/// Per-call inputs of the planner
#[derive(Debug, Clone, Default)]
pub struct PlanningRequest {
    pub initial_state: VehicleInitialState,
    pub obstacles: Vec<Obstacle>,
    /// Defaults to a constant-velocity ramp when absent
    pub initial_guess: Option<Trajectory>,
}

impl PlanningRequest {
    pub fn new(initial_state: VehicleInitialState) -> Self {
        Self {
            initial_state,
            obstacles: Vec::new(),
            initial_guess: None,
        }
    }

    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn with_obstacles(mut self, obstacles: Vec<Obstacle>) -> Self {
        self.obstacles = obstacles;
        self
    }

    pub fn with_initial_guess(mut self, guess: Trajectory) -> Self {
        self.initial_guess = Some(guess);
        self
    }
}

/// Validated inputs shared by every mode of one call
struct Problem<'r> {
    cost: CostFunction,
    builder: ConstraintBuilder<'r>,
    enumerator: ModeEnumerator,
    initial_guess: Trajectory,
}

/// Plans a longitudinal trajectory around obstacles by solving one convex
/// problem per obstacle mode and keeping the cheapest.
pub struct LongitudinalPlanner<S: TrajectorySolver> {
    config: PlannerConfig,
    solver: S,
}

impl<S: TrajectorySolver> LongitudinalPlanner<S> {
    pub fn new(config: PlannerConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Best converged trajectory over all obstacle modes
    pub fn plan(&self, request: &PlanningRequest) -> TrajectoryResult<PlanningResult> {
        let problem = self.prepare(request)?;
        self.selector().select(
            &problem.cost,
            &problem.builder,
            &problem.enumerator,
            &problem.initial_guess,
        )
    }

    /// Outcome of every obstacle mode, in enumeration order
    pub fn evaluate_modes(&self, request: &PlanningRequest) -> TrajectoryResult<Vec<ModeEvaluation>> {
        let problem = self.prepare(request)?;
        self.selector().evaluate(
            &problem.cost,
            &problem.builder,
            &problem.enumerator,
            &problem.initial_guess,
        )
    }

    /// Constant-velocity ramp at max(v0, 0) with the pinned prefix applied
    pub fn default_initial_guess(grid: &TimeGrid, initial_state: &VehicleInitialState) -> Trajectory {
        let mut guess = Trajectory::constant_velocity(grid, initial_state.velocity.max(0.0));
        let prefix = initial_state.pinned_prefix(grid.dt());
        for (s, p) in guess.positions.iter_mut().zip(prefix.iter()).take(PINNED_PREFIX) {
            *s = *p;
        }
        guess
    }

    fn selector(&self) -> ModeSelector<'_, S> {
        ModeSelector::new(&self.solver)
            .with_strategy(self.config.strategy)
            .with_retry_policy(self.config.retry)
            .with_early_exit(self.config.early_exit)
    }

    fn prepare<'r>(&self, request: &'r PlanningRequest) -> TrajectoryResult<Problem<'r>> {
        let grid = self.config.validate()?;

        let state = request.initial_state;
        if !state.velocity.is_finite() || !state.acceleration.is_finite() {
            return Err(TrajectoryError::InvalidParameter(format!(
                "initial state must be finite, got v0 = {}, a0 = {}",
                state.velocity, state.acceleration
            )));
        }

        let builder = ConstraintBuilder::new(grid, state, self.config.limits, &request.obstacles)?;
        let enumerator = ModeEnumerator::new(request.obstacles.len(), self.config.max_obstacles)?;

        let initial_guess = match &request.initial_guess {
            Some(guess) if guess.len() != grid.num_samples() => {
                return Err(TrajectoryError::InvalidParameter(format!(
                    "initial guess has {} samples, expected {}",
                    guess.len(),
                    grid.num_samples()
                )));
            }
            Some(guess) if !guess.is_finite() => {
                return Err(TrajectoryError::InvalidParameter(
                    "initial guess must be finite".to_string(),
                ));
            }
            Some(guess) => guess.clone(),
            None => Self::default_initial_guess(&grid, &state),
        };

        debug!(
            samples = grid.num_samples(),
            dt = grid.dt(),
            obstacles = request.obstacles.len(),
            modes = enumerator.mode_count(),
            "prepared planning problem"
        );

        Ok(Problem {
            cost: CostFunction::new(
                KinematicModel::new(&grid),
                self.config.desired_velocity,
                self.config.weights,
            ),
            builder,
            enumerator,
            initial_guess,
        })
    }
}

impl LongitudinalPlanner<AugmentedLagrangianSolver> {
    /// Planner with default configuration and the reference solver
    pub fn with_defaults() -> Self {
        Self::new(PlannerConfig::default(), AugmentedLagrangianSolver::with_defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ObstacleSide;
    use crate::path_planning::longitudinal::constraints::ConstraintSet;
    use crate::path_planning::longitudinal::solver::{ConvergenceStatus, SolverOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSolver {
        calls: AtomicUsize,
    }

    impl TrajectorySolver for CountingSolver {
        fn solve(
            &self,
            cost: &CostFunction,
            constraints: &ConstraintSet,
            initial_guess: &Trajectory,
        ) -> SolverOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let value = cost.evaluate(&initial_guess.positions);
            SolverOutcome::new(initial_guess.clone(), value, ConvergenceStatus::Converged)
                .with_iterations(constraints.num_variables())
        }
    }

    fn kinematic_velocity(grid: &TimeGrid, positions: &[f64]) -> Vec<f64> {
        KinematicModel::new(grid).derive(positions).velocity
    }

    #[test]
    fn test_no_obstacle_scenario() {
        let planner = LongitudinalPlanner::with_defaults();
        let request = PlanningRequest::new(VehicleInitialState::at_rest());

        let result = planner.plan(&request).unwrap();
        assert_eq!(result.status, ConvergenceStatus::Converged);
        assert!(result.mode.is_empty());
        assert!(result.cost.is_finite() && result.cost >= 0.0);

        let grid = TimeGrid::new(10.0, 30).unwrap();
        let velocity = kinematic_velocity(&grid, &result.trajectory.positions);
        assert!((velocity[velocity.len() - 1] - 20.0).abs() < 2.0);
        assert!(velocity.iter().all(|v| *v <= 30.0 + 1e-5));

        // Identical inputs give identical results
        assert_eq!(planner.plan(&request).unwrap(), result);
    }

    #[test]
    fn test_single_obstacle_scenario() {
        let planner = LongitudinalPlanner::with_defaults();
        let request = PlanningRequest::new(VehicleInitialState::at_rest())
            .with_obstacle(Obstacle::new(10, 15, 90.0, 110.0));

        let evaluations = planner.evaluate_modes(&request).unwrap();
        assert_eq!(evaluations.len(), 2);
        for evaluation in &evaluations {
            let Some(outcome) = evaluation.outcome.as_ref().filter(|o| o.is_converged()) else {
                continue;
            };
            let window = &outcome.trajectory.positions[10..=15];
            match evaluation.mode.side(0) {
                Some(ObstacleSide::Above) => assert!(window.iter().all(|s| *s >= 110.0 - 1e-5)),
                Some(ObstacleSide::Below) => assert!(window.iter().all(|s| *s <= 90.0 + 1e-5)),
                None => unreachable!(),
            }
        }

        let result = planner.plan(&request).unwrap();
        let cheapest = evaluations
            .iter()
            .filter_map(|e| e.converged_cost())
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.cost, cheapest);
        // 110 m is out of reach by sample 10 from rest
        assert_eq!(result.mode.sides(), &[ObstacleSide::Below]);
    }

    #[test]
    fn test_parallel_planning_matches_sequential() {
        let request = PlanningRequest::new(VehicleInitialState::new(5.0, 0.0))
            .with_obstacle(Obstacle::new(12, 16, 60.0, 75.0));
        let sequential = LongitudinalPlanner::with_defaults().plan(&request).unwrap();
        let parallel = LongitudinalPlanner::new(
            PlannerConfig::default().with_strategy(ExecutionStrategy::Parallel),
            AugmentedLagrangianSolver::with_defaults(),
        )
        .plan(&request)
        .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_minimum_sample_count() {
        let request = PlanningRequest::new(VehicleInitialState::at_rest());

        let planner = LongitudinalPlanner::new(
            PlannerConfig::default().with_horizon(3.0, 4),
            CountingSolver::default(),
        );
        assert!(planner.plan(&request).is_ok());

        let planner = LongitudinalPlanner::new(
            PlannerConfig::default().with_horizon(3.0, 3),
            CountingSolver::default(),
        );
        assert_eq!(
            planner.plan(&request),
            Err(TrajectoryError::InsufficientSamples { required: 4, actual: 3 })
        );
        assert_eq!(planner.solver().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_obstacles_single_solver_call() {
        let planner = LongitudinalPlanner::new(PlannerConfig::default(), CountingSolver::default());
        planner
            .plan(&PlanningRequest::new(VehicleInitialState::at_rest()))
            .unwrap();
        assert_eq!(planner.solver().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mode_count_grows_with_obstacles() {
        let planner = LongitudinalPlanner::new(PlannerConfig::default(), CountingSolver::default());
        let request = PlanningRequest::new(VehicleInitialState::at_rest()).with_obstacles(vec![
            Obstacle::new(4, 5, 5.0, 8.0),
            Obstacle::new(10, 12, 40.0, 50.0),
            Obstacle::new(20, 25, 150.0, 170.0),
        ]);
        let evaluations = planner.evaluate_modes(&request).unwrap();
        assert_eq!(evaluations.len(), 8);
        assert_eq!(planner.solver().calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_validation_happens_before_solving() {
        let planner = LongitudinalPlanner::new(
            PlannerConfig::default().with_max_obstacles(1),
            CountingSolver::default(),
        );
        let at_rest = PlanningRequest::new(VehicleInitialState::at_rest());

        let bad_window = at_rest.clone().with_obstacle(Obstacle::new(15, 10, 90.0, 110.0));
        assert!(matches!(
            planner.plan(&bad_window),
            Err(TrajectoryError::InvalidObstacleWindow { obstacle: 0, .. })
        ));

        let past_horizon = at_rest.clone().with_obstacle(Obstacle::new(25, 30, 90.0, 110.0));
        assert!(matches!(
            planner.plan(&past_horizon),
            Err(TrajectoryError::InvalidObstacleWindow { .. })
        ));

        let too_many = at_rest.clone().with_obstacles(vec![
            Obstacle::new(5, 6, 10.0, 20.0),
            Obstacle::new(10, 15, 90.0, 110.0),
        ]);
        assert_eq!(
            planner.plan(&too_many),
            Err(TrajectoryError::TooManyObstacles { count: 2, limit: 1 })
        );

        let short_guess = at_rest
            .clone()
            .with_initial_guess(Trajectory::from_positions(vec![0.0; 10]));
        assert!(matches!(
            planner.plan(&short_guess),
            Err(TrajectoryError::InvalidParameter(_))
        ));

        let nan_state = PlanningRequest::new(VehicleInitialState::new(f64::NAN, 0.0));
        assert!(matches!(
            planner.plan(&nan_state),
            Err(TrajectoryError::InvalidParameter(_))
        ));

        assert_eq!(planner.solver().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_configuration() {
        let request = PlanningRequest::new(VehicleInitialState::at_rest());
        for config in [
            PlannerConfig::default().with_horizon(0.0, 30),
            PlannerConfig::default().with_weights(CostWeights::new(1.0, -1.0, 1.0)),
            PlannerConfig::default().with_desired_velocity(f64::INFINITY),
            PlannerConfig::default().with_limits(KinematicLimits::new(f64::NAN, 15.0)),
        ] {
            let planner = LongitudinalPlanner::new(config, CountingSolver::default());
            assert!(matches!(
                planner.plan(&request),
                Err(TrajectoryError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_default_initial_guess() {
        let grid = TimeGrid::new(10.0, 30).unwrap();
        let state = VehicleInitialState::new(4.0, 1.0);
        let guess = LongitudinalPlanner::<CountingSolver>::default_initial_guess(&grid, &state);

        assert_eq!(guess.len(), 30);
        assert_eq!(&guess.positions[..3], &state.pinned_prefix(grid.dt()));
        for i in 3..30 {
            assert!((guess.positions[i] - 4.0 * grid.time_at(i)).abs() < 1e-12);
        }

        // Reversing vehicles start from a stationary ramp
        let reversing = VehicleInitialState::new(-3.0, 0.0);
        let guess = LongitudinalPlanner::<CountingSolver>::default_initial_guess(&grid, &reversing);
        assert!(guess.positions[3..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_caller_guess_is_forwarded() {
        let planner = LongitudinalPlanner::new(PlannerConfig::default(), CountingSolver::default());
        let grid = TimeGrid::new(10.0, 30).unwrap();
        let guess = Trajectory::constant_velocity(&grid, 12.0);
        let request = PlanningRequest::new(VehicleInitialState::new(12.0, 0.0))
            .with_initial_guess(guess.clone());

        let result = planner.plan(&request).unwrap();
        assert_eq!(result.trajectory, guess);
    }
}
