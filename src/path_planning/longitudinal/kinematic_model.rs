//! Finite-difference kinematic model
//!
//! Derives velocity, acceleration and jerk from a sampled position sequence
//! by iterated forward differences divided by the time step.

use itertools::Itertools;
use nalgebra::DMatrix;

use crate::common::{TimeGrid, TrajectoryError, TrajectoryResult, MIN_SAMPLES};

/// Derived kinematic sequences of one trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicSample {
    pub velocity: Vec<f64>,     // length N-1
    pub acceleration: Vec<f64>, // length N-2
    pub jerk: Vec<f64>,         // length N-3
}

/// Forward-difference model on a uniform time grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicModel {
    dt: f64,
}

impl KinematicModel {
    pub fn new(grid: &TimeGrid) -> Self {
        Self { dt: grid.dt() }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// y[i] = (x[i+1] - x[i]) / dt
    pub fn differentiate(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .tuple_windows()
            .map(|(a, b)| (b - a) / self.dt)
            .collect()
    }

    /// Adjoint of [`differentiate`](Self::differentiate): maps a residual of
    /// length m back onto m + 1 samples.
    pub fn difference_transpose(&self, residual: &[f64]) -> Vec<f64> {
        let m = residual.len();
        (0..=m)
            .map(|k| {
                let prev = if k > 0 { residual[k - 1] } else { 0.0 };
                let next = if k < m { residual[k] } else { 0.0 };
                (prev - next) / self.dt
            })
            .collect()
    }

    /// Dense matrix of the `order`-th difference operator acting on `n` samples.
    /// Shape is (n - order) x n.
    pub fn difference_operator(&self, n: usize, order: usize) -> DMatrix<f64> {
        let mut op = DMatrix::<f64>::identity(n, n);
        for level in 0..order {
            let rows = n.saturating_sub(level + 1);
            let cols = n - level;
            let step = DMatrix::from_fn(rows, cols, |r, c| {
                if c == r {
                    -1.0 / self.dt
                } else if c == r + 1 {
                    1.0 / self.dt
                } else {
                    0.0
                }
            });
            op = step * op;
        }
        op
    }

    /// Derived sequences without a length check. Shorter inputs simply give
    /// shorter (possibly empty) outputs.
    pub fn derive(&self, positions: &[f64]) -> KinematicSample {
        let velocity = self.differentiate(positions);
        let acceleration = self.differentiate(&velocity);
        let jerk = self.differentiate(&acceleration);
        KinematicSample { velocity, acceleration, jerk }
    }

    /// Derived sequences of a trajectory of at least four samples
    pub fn evaluate(&self, positions: &[f64]) -> TrajectoryResult<KinematicSample> {
        if positions.len() < MIN_SAMPLES {
            return Err(TrajectoryError::InsufficientSamples {
                required: MIN_SAMPLES,
                actual: positions.len(),
            });
        }
        Ok(self.derive(positions))
    }
}
