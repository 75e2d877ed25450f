//! Lazy enumeration of obstacle side assignments
//!
//! Mode `m` assigns obstacle `k` to `Above` when bit `k` of `m` is set,
//! so modes come out in binary counting order.

use crate::common::{ObstacleMode, TrajectoryError, TrajectoryResult};

use super::constraints::{ConstraintBuilder, ConstraintSet};

/// Default cap on the number of obstacles (2^20 modes)
pub const DEFAULT_MAX_OBSTACLES: usize = 20;

/// Hard cap imposed by the 64-bit mode index
const MODE_INDEX_BITS: usize = 63;

/// Finite, restartable sequence of all 2^M obstacle modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeEnumerator {
    obstacle_count: usize,
}

impl ModeEnumerator {
    pub fn new(obstacle_count: usize, max_obstacles: usize) -> TrajectoryResult<Self> {
        let limit = max_obstacles.min(MODE_INDEX_BITS);
        if obstacle_count > limit {
            return Err(TrajectoryError::TooManyObstacles {
                count: obstacle_count,
                limit,
            });
        }
        Ok(Self { obstacle_count })
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacle_count
    }

    pub fn mode_count(&self) -> u64 {
        1u64 << self.obstacle_count
    }

    /// Random access into the sequence
    pub fn mode(&self, index: u64) -> Option<ObstacleMode> {
        if index < self.mode_count() {
            Some(ObstacleMode::from_bits(index, self.obstacle_count))
        } else {
            None
        }
    }

    /// A fresh pass over every mode
    pub fn iter(&self) -> ModeIter {
        ModeIter {
            next: 0,
            end: self.mode_count(),
            obstacle_count: self.obstacle_count,
        }
    }

    /// Materializes one constraint set per mode as the sequence is consumed
    pub fn constraint_sets<'b>(
        &self,
        builder: &'b ConstraintBuilder<'b>,
    ) -> impl Iterator<Item = TrajectoryResult<ConstraintSet>> + 'b {
        self.iter().map(move |mode| builder.build(&mode))
    }
}

impl IntoIterator for &ModeEnumerator {
    type Item = ObstacleMode;
    type IntoIter = ModeIter;

    fn into_iter(self) -> ModeIter {
        self.iter()
    }
}

/// Iterator over obstacle modes in binary counting order
#[derive(Debug, Clone)]
pub struct ModeIter {
    next: u64,
    end: u64,
    obstacle_count: usize,
}

impl Iterator for ModeIter {
    type Item = ObstacleMode;

    fn next(&mut self) -> Option<ObstacleMode> {
        if self.next >= self.end {
            return None;
        }
        let mode = ObstacleMode::from_bits(self.next, self.obstacle_count);
        self.next += 1;
        Some(mode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl ExactSizeIterator for ModeIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Obstacle, ObstacleSide, TimeGrid, VehicleInitialState};
    use crate::path_planning::longitudinal::constraints::KinematicLimits;
    use std::collections::HashSet;

    #[test]
    fn test_no_obstacles_yield_single_mode() {
        let modes: Vec<_> = ModeEnumerator::new(0, DEFAULT_MAX_OBSTACLES)
            .unwrap()
            .iter()
            .collect();
        assert_eq!(modes.len(), 1);
        assert!(modes[0].is_empty());
    }

    #[test]
    fn test_all_assignments_are_distinct() {
        for m in 1..=6 {
            let enumerator = ModeEnumerator::new(m, DEFAULT_MAX_OBSTACLES).unwrap();
            let modes: HashSet<_> = enumerator.iter().collect();
            assert_eq!(modes.len(), 1 << m);
            assert!(modes.iter().all(|mode| mode.len() == m));
        }
    }

    #[test]
    fn test_binary_counting_order() {
        let enumerator = ModeEnumerator::new(2, DEFAULT_MAX_OBSTACLES).unwrap();
        let modes: Vec<_> = enumerator.iter().map(|m| m.sides().to_vec()).collect();
        use ObstacleSide::{Above, Below};
        assert_eq!(
            modes,
            vec![
                vec![Below, Below],
                vec![Above, Below],
                vec![Below, Above],
                vec![Above, Above],
            ]
        );
        assert_eq!(enumerator.mode(3).unwrap().sides(), &[Above, Above]);
        assert!(enumerator.mode(4).is_none());
    }

    #[test]
    fn test_sequence_is_restartable() {
        let enumerator = ModeEnumerator::new(3, DEFAULT_MAX_OBSTACLES).unwrap();
        let first: Vec<_> = enumerator.iter().collect();
        let second: Vec<_> = (&enumerator).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(enumerator.iter().len(), 8);
    }

    #[test]
    fn test_obstacle_cap() {
        assert!(ModeEnumerator::new(20, 20).is_ok());
        assert_eq!(
            ModeEnumerator::new(21, 20),
            Err(TrajectoryError::TooManyObstacles { count: 21, limit: 20 })
        );
        assert!(matches!(
            ModeEnumerator::new(64, usize::MAX),
            Err(TrajectoryError::TooManyObstacles { limit: 63, .. })
        ));
    }

    #[test]
    fn test_large_enumeration_is_lazy() {
        let enumerator = ModeEnumerator::new(40, 63).unwrap();
        let first_three: Vec<_> = enumerator.iter().take(3).collect();
        assert_eq!(first_three.len(), 3);
        assert_eq!(enumerator.mode_count(), 1u64 << 40);
    }

    #[test]
    fn test_constraint_sets_follow_modes() {
        let grid = TimeGrid::new(10.0, 30).unwrap();
        let obstacles = [
            Obstacle::new(5, 6, 10.0, 20.0),
            Obstacle::new(10, 15, 90.0, 110.0),
        ];
        let builder = ConstraintBuilder::new(
            grid,
            VehicleInitialState::at_rest(),
            KinematicLimits::default(),
            &obstacles,
        )
        .unwrap();
        let enumerator = ModeEnumerator::new(obstacles.len(), DEFAULT_MAX_OBSTACLES).unwrap();

        let sets: Vec<_> = enumerator
            .constraint_sets(&builder)
            .collect::<TrajectoryResult<_>>()
            .unwrap();
        assert_eq!(sets.len(), 4);
        for (set, mode) in sets.iter().zip(enumerator.iter()) {
            assert_eq!(set.mode(), &mode);
        }
    }
}
