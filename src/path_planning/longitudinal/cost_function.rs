//! Quadratic tracking and comfort cost
//!
//! J = 0.5 * dt * ( w_v * sum (v - v_des)^2 + w_a * sum a^2 + w_j * sum j^2 )

use nalgebra::DMatrix;

use crate::common::{TrajectoryError, TrajectoryResult};

use super::kinematic_model::KinematicModel;

/// Weights of the three cost terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    /// Velocity tracking weight
    pub velocity: f64,
    /// Acceleration weight
    pub acceleration: f64,
    /// Jerk weight
    pub jerk: f64,
}

impl CostWeights {
    pub fn new(velocity: f64, acceleration: f64, jerk: f64) -> Self {
        Self { velocity, acceleration, jerk }
    }

    pub fn validate(&self) -> TrajectoryResult<()> {
        for (name, w) in [
            ("velocity", self.velocity),
            ("acceleration", self.acceleration),
            ("jerk", self.jerk),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(TrajectoryError::InvalidParameter(format!(
                    "{} weight must be finite and non-negative, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            velocity: 1.0,
            acceleration: 1.0,
            jerk: 1.0,
        }
    }
}

/// Objective of the longitudinal optimization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostFunction {
    model: KinematicModel,
    desired_velocity: f64,
    weights: CostWeights,
}

impl CostFunction {
    pub fn new(model: KinematicModel, desired_velocity: f64, weights: CostWeights) -> Self {
        Self {
            model,
            desired_velocity,
            weights,
        }
    }

    pub fn model(&self) -> &KinematicModel {
        &self.model
    }

    pub fn desired_velocity(&self) -> f64 {
        self.desired_velocity
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Scalar cost of a position sequence
    pub fn evaluate(&self, positions: &[f64]) -> f64 {
        let sample = self.model.derive(positions);
        let w = &self.weights;

        let velocity_term: f64 = sample
            .velocity
            .iter()
            .map(|v| (v - self.desired_velocity).powi(2))
            .sum();
        let acceleration_term: f64 = sample.acceleration.iter().map(|a| a * a).sum();
        let jerk_term: f64 = sample.jerk.iter().map(|j| j * j).sum();

        0.5 * self.model.dt()
            * (w.velocity * velocity_term + w.acceleration * acceleration_term + w.jerk * jerk_term)
    }

    /// Gradient with respect to every position entry
    pub fn gradient(&self, positions: &[f64]) -> Vec<f64> {
        let sample = self.model.derive(positions);
        let dt = self.model.dt();
        let w = &self.weights;

        // Back-propagate through jerk -> acceleration -> velocity -> position
        let g_jerk: Vec<f64> = sample.jerk.iter().map(|j| dt * w.jerk * j).collect();
        let g_acc: Vec<f64> = sample
            .acceleration
            .iter()
            .zip(self.back_propagate(&g_jerk, sample.acceleration.len()))
            .map(|(a, up)| dt * w.acceleration * a + up)
            .collect();
        let g_vel: Vec<f64> = sample
            .velocity
            .iter()
            .zip(self.back_propagate(&g_acc, sample.velocity.len()))
            .map(|(v, up)| dt * w.velocity * (v - self.desired_velocity) + up)
            .collect();

        self.back_propagate(&g_vel, positions.len())
    }

    /// Constant Hessian for a trajectory of `n` samples
    pub fn hessian(&self, n: usize) -> DMatrix<f64> {
        let dt = self.model.dt();
        let w = &self.weights;
        let mut h = DMatrix::<f64>::zeros(n, n);

        for (order, weight) in [(1, w.velocity), (2, w.acceleration), (3, w.jerk)] {
            if weight == 0.0 || n <= order {
                continue;
            }
            let d = self.model.difference_operator(n, order);
            h += (d.transpose() * &d) * (dt * weight);
        }
        h
    }

    /// A value no feasible trajectory can undercut
    pub fn lower_bound(&self) -> f64 {
        0.0
    }

    fn back_propagate(&self, residual: &[f64], target_len: usize) -> Vec<f64> {
        if residual.is_empty() {
            return vec![0.0; target_len];
        }
        self.model.difference_transpose(residual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TimeGrid;

    fn cost(weights: CostWeights) -> (TimeGrid, CostFunction) {
        let grid = TimeGrid::new(10.0, 30).unwrap();
        (grid, CostFunction::new(KinematicModel::new(&grid), 20.0, weights))
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                3.0 * x + (0.7 * x).sin() * 2.0 + 0.05 * x * x
            })
            .collect()
    }

    #[test]
    fn test_cost_is_non_negative() {
        let (_, f) = cost(CostWeights::new(0.3, 2.0, 0.1));
        for scale in [-5.0, 0.0, 1.0, 40.0] {
            let positions: Vec<f64> = wavy(30).iter().map(|s| s * scale).collect();
            assert!(f.evaluate(&positions) >= 0.0);
        }
    }

    #[test]
    fn test_cost_of_cruising_at_desired_velocity_is_zero() {
        let (grid, f) = cost(CostWeights::default());
        let positions: Vec<f64> = grid.times().iter().map(|t| 20.0 * t).collect();
        assert!(f.evaluate(&positions).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_term_only() {
        let (grid, f) = cost(CostWeights::new(1.0, 0.0, 0.0));
        let positions = vec![0.0; 30];
        // Standing still: every velocity sample misses v_des by 20
        let expected = 0.5 * grid.dt() * 29.0 * 400.0;
        assert!((f.evaluate(&positions) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let (_, f) = cost(CostWeights::new(1.0, 0.5, 0.25));
        let positions = wavy(30);
        let grad = f.gradient(&positions);
        assert_eq!(grad.len(), 30);

        let h = 1e-6;
        for k in [0, 1, 7, 15, 28, 29] {
            let mut plus = positions.clone();
            let mut minus = positions.clone();
            plus[k] += h;
            minus[k] -= h;
            let numeric = (f.evaluate(&plus) - f.evaluate(&minus)) / (2.0 * h);
            let scale = 1.0 + numeric.abs();
            assert!((numeric - grad[k]).abs() / scale < 1e-4, "k = {}", k);
        }
    }

    #[test]
    fn test_hessian_reproduces_gradient_change() {
        let (_, f) = cost(CostWeights::new(1.0, 0.5, 0.25));
        let x = wavy(30);
        let dx: Vec<f64> = (0..30).map(|i| ((i % 5) as f64 - 2.0) * 0.1).collect();
        let x_plus: Vec<f64> = x.iter().zip(dx.iter()).map(|(a, b)| a + b).collect();

        let g0 = f.gradient(&x);
        let g1 = f.gradient(&x_plus);
        let hd = f.hessian(30) * nalgebra::DVector::from_column_slice(&dx);

        for k in 0..30 {
            assert!((g1[k] - g0[k] - hd[k]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(CostWeights::new(1.0, -0.1, 0.0).validate().is_err());
        assert!(CostWeights::new(0.0, 0.0, 0.0).validate().is_ok());
    }
}
