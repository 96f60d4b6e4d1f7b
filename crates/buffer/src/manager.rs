//! Buffer zone manager.
//!
//! Derives occupancy, penetration, alerts and health for one board from the
//! set of schedules passed in. Nothing is cached: callers fetch the live
//! schedules and build a manager per query, so concurrent readers never see
//! stale board state.

use dbr_core::{BoardConfiguration, BufferPosition, BufferSide, Schedule, ScheduleId, Zone};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertLevel, BufferAlert};
use crate::health::{FlowMetrics, HealthMetrics};
use crate::zone::{BufferHealth, BufferOccupancy, ZoneStatus};

/// A schedule found beyond its buffer bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenetratingSchedule {
    /// The schedule
    pub schedule_id: ScheduleId,
    /// Its offset from the CCR
    pub position: i64,
    /// The buffer it overran
    pub zone: BufferSide,
}

/// Result of penetration detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenetrationReport {
    /// Whether any schedule lies outside `[-pre, post]`
    pub penetrated: bool,
    /// Penetrated buffers, pre-constraint first
    pub penetrated_zones: Vec<BufferSide>,
    /// Offending positions in ascending order
    pub overflow_positions: Vec<i64>,
    /// Offending schedules
    pub schedules: Vec<PenetratingSchedule>,
}

impl PenetrationReport {
    /// Number of schedules beyond the given buffer.
    pub fn overflow_count(&self, side: BufferSide) -> usize {
        self.schedules.iter().filter(|s| s.zone == side).count()
    }
}

/// Everything known about a board at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardReport {
    /// Occupancy per buffer
    pub zone_status: ZoneStatus,
    /// Penetration detection
    pub penetration: PenetrationReport,
    /// Alerts, most severe first
    pub alerts: Vec<BufferAlert>,
    /// Health and flow metrics
    pub health: HealthMetrics,
    /// Whether the rope allows releasing another schedule
    pub can_release: bool,
    /// When the report was generated
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Zone manager for one board.
pub struct BufferZoneManager<'a> {
    board: &'a BoardConfiguration,
    positions: Vec<(ScheduleId, BufferPosition)>,
}

impl<'a> BufferZoneManager<'a> {
    /// Build a manager from a board and its live schedules.
    ///
    /// Completed schedules and schedules of other boards are ignored.
    pub fn new<I>(board: &'a BoardConfiguration, schedules: I) -> Self
    where
        I: IntoIterator<Item = &'a Schedule>,
    {
        let positions = schedules
            .into_iter()
            .filter(|s| s.board_id == board.id && s.is_active())
            .map(|s| (s.id, s.buffer_position(board)))
            .collect();
        Self { board, positions }
    }

    /// Classify an offset against buffer sizes.
    pub fn classify(position: i64, pre_size: u32, post_size: u32) -> BufferPosition {
        BufferPosition::classify(position, pre_size, post_size)
    }

    /// The board this manager reports on.
    pub fn board(&self) -> &BoardConfiguration {
        self.board
    }

    /// Schedules inside the given buffer.
    pub fn occupancy(&self, side: BufferSide) -> usize {
        self.positions.iter().filter(|(_, p)| p.occupies(side)).count()
    }

    /// Occupancy and colour of both buffers.
    pub fn compute_zone_status(&self) -> ZoneStatus {
        ZoneStatus {
            pre_constraint: BufferOccupancy::compute(
                BufferSide::PreConstraint,
                self.board.pre_constraint_size,
                self.occupancy(BufferSide::PreConstraint),
            ),
            post_constraint: BufferOccupancy::compute(
                BufferSide::PostConstraint,
                self.board.post_constraint_size,
                self.occupancy(BufferSide::PostConstraint),
            ),
        }
    }

    /// Find schedules outside `[-pre, post]`.
    pub fn detect_penetration(&self) -> PenetrationReport {
        let mut schedules: Vec<PenetratingSchedule> = self
            .positions
            .iter()
            .filter_map(|(id, p)| {
                p.penetrated_side().map(|zone| PenetratingSchedule {
                    schedule_id: *id,
                    position: p.offset(),
                    zone,
                })
            })
            .collect();
        schedules.sort_by_key(|s| s.position);

        let mut penetrated_zones: Vec<BufferSide> = schedules.iter().map(|s| s.zone).collect();
        penetrated_zones.sort();
        penetrated_zones.dedup();

        PenetrationReport {
            penetrated: !schedules.is_empty(),
            penetrated_zones,
            overflow_positions: schedules.iter().map(|s| s.position).collect(),
            schedules,
        }
    }

    /// Alerts for the current state, most severe first.
    ///
    /// Each buffer yields at most one occupancy alert (RED or YELLOW), plus a
    /// CRITICAL alert when schedules have run beyond it.
    pub fn generate_alerts(&self) -> Vec<BufferAlert> {
        let status = self.compute_zone_status();
        let penetration = self.detect_penetration();
        let mut alerts = Vec::new();

        for side in [BufferSide::PreConstraint, BufferSide::PostConstraint] {
            let occ = status.side(side);

            if penetration.penetrated_zones.contains(&side) {
                let overflow = penetration.overflow_count(side);
                alerts.push(BufferAlert {
                    level: AlertLevel::Critical,
                    zone: side,
                    message: format!(
                        "{} schedule(s) beyond the {} buffer bound",
                        overflow, side
                    ),
                    occupancy_count: occ.occupancy_count,
                    capacity: occ.capacity,
                    overflow_count: overflow,
                });
            }

            let level = match occ.health {
                BufferHealth::Red => Some(AlertLevel::Red),
                BufferHealth::Yellow => Some(AlertLevel::Yellow),
                BufferHealth::Green => None,
            };
            if let Some(level) = level {
                alerts.push(BufferAlert {
                    level,
                    zone: side,
                    message: format!(
                        "{} buffer at {}/{} ({:.1}%)",
                        side, occ.occupancy_count, occ.capacity, occ.occupancy_percentage
                    ),
                    occupancy_count: occ.occupancy_count,
                    capacity: occ.capacity,
                    overflow_count: 0,
                });
            }
        }

        alerts.sort_by(|a, b| b.level.cmp(&a.level));
        alerts
    }

    /// Overall health and flow metrics.
    pub fn compute_health_metrics(&self) -> HealthMetrics {
        let status = self.compute_zone_status();
        HealthMetrics {
            overall_status: status.overall(),
            pre_constraint_status: status.pre_constraint.health,
            post_constraint_status: status.post_constraint.health,
            total_active_schedules: self.positions.len(),
            ccr_occupied: self.positions.iter().any(|(_, p)| p.zone() == Zone::Constraint),
            flow: FlowMetrics::from_percentages(
                status.pre_constraint.occupancy_percentage,
                status.post_constraint.occupancy_percentage,
            ),
        }
    }

    /// Whether the rope allows releasing one more schedule into the
    /// pre-constraint buffer.
    pub fn can_release(&self) -> bool {
        (self.occupancy(BufferSide::PreConstraint) as u32) < self.board.pre_constraint_size
    }

    /// Bundle every query into one report.
    pub fn report(&self) -> BoardReport {
        BoardReport {
            zone_status: self.compute_zone_status(),
            penetration: self.detect_penetration(),
            alerts: self.generate_alerts(),
            health: self.compute_health_metrics(),
            can_release: self.can_release(),
            generated_at: chrono::Utc::now(),
        }
    }
}
