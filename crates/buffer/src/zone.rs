//! Buffer occupancy and zone health.

use dbr_core::BufferSide;
use serde::{Deserialize, Serialize};

/// Health colour of one buffer.
///
/// Ordered so that the worse colour compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BufferHealth {
    /// Plenty of room
    Green,
    /// Filling up
    Yellow,
    /// Full
    Red,
}

impl BufferHealth {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferHealth::Green => "GREEN",
            BufferHealth::Yellow => "YELLOW",
            BufferHealth::Red => "RED",
        }
    }
}

impl std::fmt::Display for BufferHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Occupancy of one buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferOccupancy {
    /// Which buffer
    pub side: BufferSide,
    /// Configured size in slots
    pub capacity: u32,
    /// Schedules inside the buffer
    pub occupancy_count: usize,
    /// count / capacity * 100 (0 for a zero-size buffer)
    pub occupancy_percentage: f64,
    /// Highest count still reported GREEN: floor(0.4 * capacity)
    pub green_threshold: usize,
    /// Lowest count reported YELLOW: max(1, floor(0.6 * capacity))
    pub yellow_threshold: usize,
    /// Derived colour
    pub health: BufferHealth,
}

impl BufferOccupancy {
    /// Derive percentage, thresholds and colour from a count.
    ///
    /// RED wins over YELLOW, and YELLOW over GREEN, where the ranges overlap
    /// on small buffers. A zero-size buffer can never hold a schedule, so it
    /// always reports GREEN at 0%; schedules beside it show up as penetration.
    pub fn compute(side: BufferSide, capacity: u32, occupancy_count: usize) -> Self {
        let cap = capacity as usize;
        let green_threshold = cap * 4 / 10;
        let yellow_threshold = (cap * 6 / 10).max(1);

        let (occupancy_percentage, health) = if cap == 0 {
            (0.0, BufferHealth::Green)
        } else {
            let pct = occupancy_count as f64 / cap as f64 * 100.0;
            let health = if occupancy_count >= cap {
                BufferHealth::Red
            } else if occupancy_count >= yellow_threshold {
                BufferHealth::Yellow
            } else {
                BufferHealth::Green
            };
            (pct, health)
        };

        Self {
            side,
            capacity,
            occupancy_count,
            occupancy_percentage,
            green_threshold,
            yellow_threshold,
            health,
        }
    }

    /// Whether the buffer has no free slot.
    pub fn is_full(&self) -> bool {
        self.health == BufferHealth::Red
    }

    /// Free slots left (0 when full or over).
    pub fn free_slots(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.occupancy_count)
    }
}

/// Occupancy of both buffers of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatus {
    /// Pre-constraint buffer
    pub pre_constraint: BufferOccupancy,
    /// Post-constraint buffer
    pub post_constraint: BufferOccupancy,
}

impl ZoneStatus {
    /// Occupancy for one side.
    pub fn side(&self, side: BufferSide) -> &BufferOccupancy {
        match side {
            BufferSide::PreConstraint => &self.pre_constraint,
            BufferSide::PostConstraint => &self.post_constraint,
        }
    }

    /// Worse of the two colours.
    pub fn overall(&self) -> BufferHealth {
        self.pre_constraint.health.max(self.post_constraint.health)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(capacity: u32, count: usize) -> BufferHealth {
        BufferOccupancy::compute(BufferSide::PreConstraint, capacity, count).health
    }

    #[test]
    fn test_full_buffer_is_red() {
        let occ = BufferOccupancy::compute(BufferSide::PreConstraint, 5, 5);
        assert_eq!(occ.health, BufferHealth::Red);
        assert_eq!(occ.occupancy_percentage, 100.0);
        assert!(occ.is_full());
        assert_eq!(occ.free_slots(), 0);
    }

    #[test]
    fn test_small_buffer_single_schedule_is_yellow() {
        let occ = BufferOccupancy::compute(BufferSide::PostConstraint, 3, 1);
        assert_eq!(occ.yellow_threshold, 1);
        assert_eq!(occ.health, BufferHealth::Yellow);
        assert!((occ.occupancy_percentage - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_thresholds_for_ten_slots() {
        assert_eq!(health(10, 0), BufferHealth::Green);
        assert_eq!(health(10, 4), BufferHealth::Green);
        // between the green and yellow thresholds stays green
        assert_eq!(health(10, 5), BufferHealth::Green);
        assert_eq!(health(10, 6), BufferHealth::Yellow);
        assert_eq!(health(10, 9), BufferHealth::Yellow);
        assert_eq!(health(10, 10), BufferHealth::Red);
        assert_eq!(health(10, 12), BufferHealth::Red);
    }

    #[test]
    fn test_zero_size_buffer_is_never_red() {
        let occ = BufferOccupancy::compute(BufferSide::PreConstraint, 0, 0);
        assert_eq!(occ.health, BufferHealth::Green);
        assert_eq!(occ.occupancy_percentage, 0.0);
        assert_eq!(occ.yellow_threshold, 1);
    }

    #[test]
    fn test_health_ordering() {
        assert!(BufferHealth::Red > BufferHealth::Yellow);
        assert!(BufferHealth::Yellow > BufferHealth::Green);
    }
}
