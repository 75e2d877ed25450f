//! Error types for longitudinal_planner

use std::fmt;

/// Main error type for trajectory planning
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    /// Fewer samples than needed to form a jerk sequence
    InsufficientSamples { required: usize, actual: usize },
    /// Obstacle time window or position band is malformed
    InvalidObstacleWindow { obstacle: usize, reason: String },
    /// Mode enumeration would exceed the configured obstacle cap
    TooManyObstacles { count: usize, limit: usize },
    /// Every obstacle mode was rejected by the solver
    NoFeasibleMode { evaluated: usize },
    /// Invalid parameter
    InvalidParameter(String),
}

impl fmt::Display for TrajectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrajectoryError::InsufficientSamples { required, actual } => write!(
                f,
                "Insufficient samples: need at least {}, got {}",
                required, actual
            ),
            TrajectoryError::InvalidObstacleWindow { obstacle, reason } => {
                write!(f, "Invalid obstacle window (obstacle {}): {}", obstacle, reason)
            }
            TrajectoryError::TooManyObstacles { count, limit } => write!(
                f,
                "Too many obstacles: {} exceeds the limit of {}",
                count, limit
            ),
            TrajectoryError::NoFeasibleMode { evaluated } => write!(
                f,
                "No feasible mode: none of the {} evaluated modes converged",
                evaluated
            ),
            TrajectoryError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for TrajectoryError {}

/// Result type alias for trajectory planning operations
pub type TrajectoryResult<T> = Result<T, TrajectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrajectoryError::InsufficientSamples { required: 4, actual: 3 };
        assert_eq!(
            format!("{}", err),
            "Insufficient samples: need at least 4, got 3"
        );

        let err = TrajectoryError::TooManyObstacles { count: 21, limit: 20 };
        assert_eq!(
            format!("{}", err),
            "Too many obstacles: 21 exceeds the limit of 20"
        );
    }

    #[test]
    fn test_error_is_std_error() {
        let err: Box<dyn std::error::Error> =
            Box::new(TrajectoryError::NoFeasibleMode { evaluated: 2 });
        assert!(err.to_string().contains("2 evaluated modes"));
    }
}
