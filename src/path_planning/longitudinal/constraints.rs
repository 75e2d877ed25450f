//! Bound and inequality constraints for one obstacle mode
//!
//! Every inequality is linear in the positions and stored as a sparse row
//! `offset + sum(coeff * s[k]) >= 0`.

use tracing::trace;

use crate::common::{
    Obstacle, ObstacleMode, ObstacleSide, TimeGrid, TrajectoryError, TrajectoryResult,
    VehicleInitialState,
};

use super::kinematic_model::KinematicModel;

/// Number of leading samples pinned by the initial state
pub const PINNED_PREFIX: usize = 3;

/// Velocity and acceleration caps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicLimits {
    /// Maximum velocity [m/s]
    pub max_velocity: f64,
    /// Maximum acceleration [m/ss]
    pub max_acceleration: f64,
}

impl KinematicLimits {
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self { max_velocity, max_acceleration }
    }

    pub fn validate(&self) -> TrajectoryResult<()> {
        if !self.max_velocity.is_finite() || !self.max_acceleration.is_finite() {
            return Err(TrajectoryError::InvalidParameter(format!(
                "kinematic limits must be finite, got v_max={} a_max={}",
                self.max_velocity, self.max_acceleration
            )));
        }
        Ok(())
    }
}

impl Default for KinematicLimits {
    fn default() -> Self {
        Self {
            max_velocity: 30.0,
            max_acceleration: 15.0,
        }
    }
}

/// Lower and upper bound of a single position sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableBound {
    pub lower: f64,
    pub upper: f64,
}

impl VariableBound {
    pub fn fixed(value: f64) -> Self {
        Self { lower: value, upper: value }
    }

    pub fn at_least(lower: f64) -> Self {
        Self { lower, upper: f64::INFINITY }
    }

    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    /// Amount by which `value` leaves the interval
    pub fn violation(&self, value: f64) -> f64 {
        (self.lower - value).max(value - self.upper).max(0.0)
    }
}

/// Origin of an inequality row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// v_max - velocity[i] >= 0
    VelocityLimit { index: usize },
    /// a_max - acceleration[i] >= 0
    AccelerationLimit { index: usize },
    /// s[i] - s_max >= 0 or s_min - s[i] >= 0
    Obstacle { obstacle: usize, index: usize, side: ObstacleSide },
}

/// offset + sum(coeff * s[k]) >= 0
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInequality {
    pub offset: f64,
    pub terms: Vec<(usize, f64)>,
    pub kind: ConstraintKind,
}

impl LinearInequality {
    pub fn evaluate(&self, positions: &[f64]) -> f64 {
        self.offset
            + self
                .terms
                .iter()
                .map(|&(k, c)| c * positions[k])
                .sum::<f64>()
    }

    pub fn violation(&self, positions: &[f64]) -> f64 {
        (-self.evaluate(positions)).max(0.0)
    }
}

/// Complete constraint description of one convex sub-problem
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    bounds: Vec<VariableBound>,
    inequalities: Vec<LinearInequality>,
    mode: ObstacleMode,
}

impl ConstraintSet {
    pub fn bounds(&self) -> &[VariableBound] {
        &self.bounds
    }

    pub fn inequalities(&self) -> &[LinearInequality] {
        &self.inequalities
    }

    pub fn mode(&self) -> &ObstacleMode {
        &self.mode
    }

    pub fn num_variables(&self) -> usize {
        self.bounds.len()
    }

    /// Values of every inequality row; feasible rows are non-negative
    pub fn evaluate_inequalities(&self, positions: &[f64]) -> Vec<f64> {
        self.inequalities
            .iter()
            .map(|row| row.evaluate(positions))
            .collect()
    }

    /// Largest bound or inequality violation of a candidate
    pub fn max_violation(&self, positions: &[f64]) -> f64 {
        let bound_violation = self
            .bounds
            .iter()
            .zip(positions.iter())
            .map(|(b, &s)| b.violation(s))
            .fold(0.0, f64::max);

        self.inequalities
            .iter()
            .map(|row| row.violation(positions))
            .fold(bound_violation, f64::max)
    }

    pub fn is_satisfied(&self, positions: &[f64], tolerance: f64) -> bool {
        positions.len() == self.bounds.len() && self.max_violation(positions) <= tolerance
    }

    pub fn project_onto_bounds(&self, positions: &mut [f64]) {
        for (s, b) in positions.iter_mut().zip(self.bounds.iter()) {
            *s = b.clamp(*s);
        }
    }

    /// Bounds with infinite ends replaced by `sentinel`, for solvers that need
    /// a finite box.
    pub fn finite_bounds(&self, sentinel: f64) -> Vec<(f64, f64)> {
        self.bounds
            .iter()
            .map(|b| {
                let lower = if b.lower.is_finite() { b.lower } else { -sentinel };
                let upper = if b.upper.is_finite() { b.upper } else { sentinel };
                (lower, upper)
            })
            .collect()
    }
}

/// Shared inputs from which a [`ConstraintSet`] is materialized per mode
#[derive(Debug, Clone)]
pub struct ConstraintBuilder<'a> {
    grid: TimeGrid,
    model: KinematicModel,
    initial_state: VehicleInitialState,
    limits: KinematicLimits,
    obstacles: &'a [Obstacle],
}

impl<'a> ConstraintBuilder<'a> {
    /// Validates every obstacle window against the grid
    pub fn new(
        grid: TimeGrid,
        initial_state: VehicleInitialState,
        limits: KinematicLimits,
        obstacles: &'a [Obstacle],
    ) -> TrajectoryResult<Self> {
        limits.validate()?;
        for (i, obstacle) in obstacles.iter().enumerate() {
            obstacle.validate(i, grid.num_samples())?;
        }

        Ok(Self {
            grid,
            model: KinematicModel::new(&grid),
            initial_state,
            limits,
            obstacles,
        })
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        self.obstacles
    }

    /// Bounds shared by every mode: pinned prefix, non-negative remainder
    pub fn bounds(&self) -> Vec<VariableBound> {
        let prefix = self.initial_state.pinned_prefix(self.grid.dt());
        (0..self.grid.num_samples())
            .map(|i| {
                if i < PINNED_PREFIX {
                    VariableBound::fixed(prefix[i])
                } else {
                    VariableBound::at_least(0.0)
                }
            })
            .collect()
    }

    pub fn build(&self, mode: &ObstacleMode) -> TrajectoryResult<ConstraintSet> {
        if mode.len() != self.obstacles.len() {
            return Err(TrajectoryError::InvalidParameter(format!(
                "mode covers {} obstacles, expected {}",
                mode.len(),
                self.obstacles.len()
            )));
        }

        let mut inequalities = self.kinematic_rows();
        for (k, (obstacle, &side)) in self.obstacles.iter().zip(mode.sides()).enumerate() {
            inequalities.extend(obstacle_rows(k, *obstacle, side));
        }
        trace!(rows = inequalities.len(), "built constraint set");

        Ok(ConstraintSet {
            bounds: self.bounds(),
            inequalities,
            mode: mode.clone(),
        })
    }

    fn kinematic_rows(&self) -> Vec<LinearInequality> {
        let n = self.grid.num_samples();
        let inv_dt = 1.0 / self.model.dt();
        let inv_dt2 = inv_dt * inv_dt;
        let mut rows = Vec::with_capacity(2 * n);

        // v_max - (s[i+1] - s[i]) / dt >= 0
        for i in 0..n - 1 {
            rows.push(LinearInequality {
                offset: self.limits.max_velocity,
                terms: vec![(i, inv_dt), (i + 1, -inv_dt)],
                kind: ConstraintKind::VelocityLimit { index: i },
            });
        }

        // a_max - (s[i+2] - 2 s[i+1] + s[i]) / dt^2 >= 0
        for i in 0..n - 2 {
            rows.push(LinearInequality {
                offset: self.limits.max_acceleration,
                terms: vec![(i, -inv_dt2), (i + 1, 2.0 * inv_dt2), (i + 2, -inv_dt2)],
                kind: ConstraintKind::AccelerationLimit { index: i },
            });
        }

        rows
    }
}

fn obstacle_rows(
    obstacle_index: usize,
    obstacle: Obstacle,
    side: ObstacleSide,
) -> impl Iterator<Item = LinearInequality> {
    obstacle.time_indices().map(move |i| {
        let (offset, coeff) = match side {
            ObstacleSide::Above => (-obstacle.s_max, 1.0),
            ObstacleSide::Below => (obstacle.s_min, -1.0),
        };
        LinearInequality {
            offset,
            terms: vec![(i, coeff)],
            kind: ConstraintKind::Obstacle {
                obstacle: obstacle_index,
                index: i,
                side,
            },
        }
    })
}
