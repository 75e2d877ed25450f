//! Common types used throughout longitudinal_planner

use std::ops::RangeInclusive;

use nalgebra::DVector;

use crate::common::error::{TrajectoryError, TrajectoryResult};

/// Minimum number of samples needed to compute a jerk sequence
pub const MIN_SAMPLES: usize = 4;

/// Equally spaced time instants spanning the planning horizon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    horizon: f64,
    num_samples: usize,
    dt: f64,
}

impl TimeGrid {
    pub fn new(horizon: f64, num_samples: usize) -> TrajectoryResult<Self> {
        if num_samples < MIN_SAMPLES {
            return Err(TrajectoryError::InsufficientSamples {
                required: MIN_SAMPLES,
                actual: num_samples,
            });
        }
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(TrajectoryError::InvalidParameter(format!(
                "horizon must be positive and finite, got {}",
                horizon
            )));
        }

        Ok(Self {
            horizon,
            num_samples,
            dt: horizon / (num_samples - 1) as f64,
        })
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Time step between consecutive samples [s]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time_at(&self, index: usize) -> f64 {
        index as f64 * self.dt
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.num_samples).map(|i| self.time_at(i)).collect()
    }
}

/// Planned path coordinate at every instant of a [`TimeGrid`]
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub positions: Vec<f64>,
}

impl Trajectory {
    pub fn from_positions(positions: Vec<f64>) -> Self {
        Self { positions }
    }

    /// s[i] = velocity * i * dt
    pub fn constant_velocity(grid: &TimeGrid, velocity: f64) -> Self {
        let positions = grid.times().into_iter().map(|t| velocity * t).collect();
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.positions
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.positions)
    }

    pub fn is_finite(&self) -> bool {
        self.positions.iter().all(|s| s.is_finite())
    }
}

impl From<DVector<f64>> for Trajectory {
    fn from(v: DVector<f64>) -> Self {
        Self { positions: v.iter().copied().collect() }
    }
}

impl From<Vec<f64>> for Trajectory {
    fn from(positions: Vec<f64>) -> Self {
        Self { positions }
    }
}

/// Vehicle state at the start of the horizon. Position is always zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleInitialState {
    pub velocity: f64,
    pub acceleration: f64,
}

impl VehicleInitialState {
    pub fn new(velocity: f64, acceleration: f64) -> Self {
        Self { velocity, acceleration }
    }

    pub fn at_rest() -> Self {
        Self { velocity: 0.0, acceleration: 0.0 }
    }

    pub fn position(&self) -> f64 {
        0.0
    }

    /// First three samples reproducing the initial velocity and acceleration
    /// under forward finite differences.
    pub fn pinned_prefix(&self, dt: f64) -> [f64; 3] {
        let v0 = self.velocity;
        let a0 = self.acceleration;
        [
            self.position(),
            v0 * dt,
            a0 * dt * dt + 2.0 * v0 * dt,
        ]
    }
}

impl Default for VehicleInitialState {
    fn default() -> Self {
        Self::at_rest()
    }
}

/// Another vehicle occupying the position band `[s_min, s_max]`
/// during the sample window `[t_start, t_end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub t_start: usize,
    pub t_end: usize,
    pub s_min: f64,
    pub s_max: f64,
}

impl Obstacle {
    pub fn new(t_start: usize, t_end: usize, s_min: f64, s_max: f64) -> Self {
        Self { t_start, t_end, s_min, s_max }
    }

    pub fn time_indices(&self) -> RangeInclusive<usize> {
        self.t_start..=self.t_end
    }

    pub fn window_len(&self) -> usize {
        self.t_end.saturating_sub(self.t_start) + 1
    }

    /// Check the window against a trajectory of `num_samples` entries.
    /// `index` is the position of this obstacle in the caller's list.
    pub fn validate(&self, index: usize, num_samples: usize) -> TrajectoryResult<()> {
        if self.t_start > self.t_end {
            return Err(TrajectoryError::InvalidObstacleWindow {
                obstacle: index,
                reason: format!("t_start {} is after t_end {}", self.t_start, self.t_end),
            });
        }
        if self.t_end >= num_samples {
            return Err(TrajectoryError::InvalidObstacleWindow {
                obstacle: index,
                reason: format!(
                    "t_end {} is outside the sample range [0, {}]",
                    self.t_end,
                    num_samples - 1
                ),
            });
        }
        if !self.s_min.is_finite() || !self.s_max.is_finite() || self.s_min > self.s_max {
            return Err(TrajectoryError::InvalidObstacleWindow {
                obstacle: index,
                reason: format!(
                    "position band [{}, {}] is not an ordered finite interval",
                    self.s_min, self.s_max
                ),
            });
        }
        Ok(())
    }

    /// True when `position` at sample `index` lies inside the occupied box
    pub fn occupies(&self, index: usize, position: f64) -> bool {
        self.time_indices().contains(&index) && position > self.s_min && position < self.s_max
    }
}

/// Which side of an obstacle band the trajectory passes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleSide {
    /// Stay ahead: s[i] >= s_max over the window
    Above,
    /// Stay behind: s[i] <= s_min over the window
    Below,
}

impl ObstacleSide {
    /// Bit convention used by mode enumeration: 1 = Above, 0 = Below
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            ObstacleSide::Above
        } else {
            ObstacleSide::Below
        }
    }
}

/// One side choice per obstacle, selecting a single convex sub-problem
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ObstacleMode {
    sides: Vec<ObstacleSide>,
}

impl ObstacleMode {
    pub fn new(sides: Vec<ObstacleSide>) -> Self {
        Self { sides }
    }

    /// Bit k of `bits` chooses the side of obstacle k
    pub fn from_bits(bits: u64, obstacle_count: usize) -> Self {
        let sides = (0..obstacle_count)
            .map(|k| ObstacleSide::from_bit(k < u64::BITS as usize && (bits >> k) & 1 == 1))
            .collect();
        Self { sides }
    }

    pub fn sides(&self) -> &[ObstacleSide] {
        &self.sides
    }

    pub fn side(&self, obstacle: usize) -> Option<ObstacleSide> {
        self.sides.get(obstacle).copied()
    }

    pub fn len(&self) -> usize {
        self.sides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }
}
