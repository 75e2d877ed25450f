//! longitudinal_planner - longitudinal trajectory optimization for road vehicles
//!
//! This crate plans the speed profile of a vehicle along a fixed path,
//! trading off velocity tracking against acceleration and jerk while
//! keeping clear of other vehicles in the position-time plane.

// Core modules
pub mod common;

// Algorithm modules
pub mod path_planning;

// Re-export common types for convenience
pub use common::{Obstacle, ObstacleMode, ObstacleSide, TimeGrid, Trajectory, VehicleInitialState};
pub use common::{TrajectoryError, TrajectoryResult};
pub use path_planning::longitudinal::{LongitudinalPlanner, PlannerConfig, PlanningRequest, PlanningResult};
