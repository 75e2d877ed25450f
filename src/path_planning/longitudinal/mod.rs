//! Longitudinal Trajectory Optimization Module
//!
//! Plans the position profile s(t) of a vehicle along a fixed path over a
//! finite horizon. Positions are sampled on a uniform time grid; velocity,
//! acceleration and jerk follow by forward finite differences. Obstacles
//! occupying a position band over a time window make the feasible set
//! non-convex, so every assignment of obstacles to `Above` or `Below` is
//! solved as its own convex problem and the cheapest converged result wins.
//!
//! # Components
//!
//! - `kinematic_model`: finite-difference velocity, acceleration and jerk
//! - `cost_function`: weighted tracking and comfort cost with gradient
//! - `constraints`: bounds and linear inequalities of one obstacle mode
//! - `mode_enumerator`: lazy sequence of all 2^M obstacle modes
//! - `solver`: interface consumed by mode selection
//! - `augmented_lagrangian`: reference solver
//! - `mode_selector`: sequential or parallel per-mode evaluation
//! - `planner`: request validation and end-to-end planning
//!
//! # Example
//!
//! ```no_run
//! use longitudinal_planner::common::{Obstacle, VehicleInitialState};
//! use longitudinal_planner::path_planning::longitudinal::{LongitudinalPlanner, PlanningRequest};
//!
//! let planner = LongitudinalPlanner::with_defaults();
//! let request = PlanningRequest::new(VehicleInitialState::at_rest())
//!     .with_obstacle(Obstacle::new(10, 15, 90.0, 110.0));
//!
//! let result = planner.plan(&request).unwrap();
//! println!("cost {:.3} mode {:?}", result.cost, result.mode.sides());
//! ```

pub mod kinematic_model;
pub mod cost_function;
pub mod constraints;
pub mod mode_enumerator;
pub mod solver;
pub mod augmented_lagrangian;
pub mod mode_selector;
pub mod planner;

// Re-exports
pub use kinematic_model::{KinematicModel, KinematicSample};
pub use cost_function::{CostFunction, CostWeights};
pub use constraints::{
    ConstraintBuilder, ConstraintKind, ConstraintSet, KinematicLimits, LinearInequality,
    VariableBound, PINNED_PREFIX,
};
pub use mode_enumerator::{ModeEnumerator, ModeIter, DEFAULT_MAX_OBSTACLES};
pub use solver::{ConvergenceStatus, SolverOutcome, TrajectorySolver};
pub use augmented_lagrangian::{AugmentedLagrangianSolver, SolverConfig};
pub use mode_selector::{
    select_best, ExecutionStrategy, ModeEvaluation, ModeSelector, PlanningResult, RetryPolicy,
};
pub use planner::{LongitudinalPlanner, PlannerConfig, PlanningRequest};
