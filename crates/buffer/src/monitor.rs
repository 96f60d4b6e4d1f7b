//! Storage-backed board monitoring.

use dbr_core::{BoardId, TenantId};
use dbr_storage::{Storage, StorageError};
use tracing::debug;

use crate::manager::{BoardReport, BufferZoneManager};

/// Read-only board queries against storage.
///
/// Every call fetches the live schedule set, so a monitor may run alongside
/// an advance without coordinating with it.
pub struct BoardMonitor;

impl BoardMonitor {
    /// Create a new monitor.
    pub fn new() -> Self {
        Self
    }

    /// Build a full report for one board.
    pub async fn report(
        &self,
        storage: &dyn Storage,
        tenant: &TenantId,
        board_id: BoardId,
    ) -> Result<BoardReport, StorageError> {
        let board = storage
            .load_board_configuration(board_id)
            .await?
            .filter(|b| &b.tenant == tenant)
            .ok_or_else(|| StorageError::NotFound(format!("board {}", board_id)))?;

        let schedules = storage.list_active_schedules(tenant, Some(board_id)).await?;
        let report = BufferZoneManager::new(&board, &schedules).report();

        debug!(
            board = %board_id,
            active = report.health.total_active_schedules,
            overall = %report.health.overall_status,
            alerts = report.alerts.len(),
            "board report"
        );
        Ok(report)
    }
}

impl Default for BoardMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::BufferHealth;
    use dbr_core::{BoardConfiguration, CapacityResource, Schedule, TimeUnit};
    use dbr_storage::MemoryStorage;

    #[tokio::test]
    async fn test_report_from_storage() {
        let mut storage = MemoryStorage::new();
        let tenant = TenantId::new("t1");
        let resource = CapacityResource::new(tenant.clone(), "review", 40.0, TimeUnit::Week);
        let board = BoardConfiguration::new(tenant.clone(), "b", resource.id, 2, 2);
        storage.save_board_configuration(&board).await.unwrap();
        for p in [-2, -1] {
            storage
                .save_schedule(&Schedule::new(&board, "s").with_position(p))
                .await
                .unwrap();
        }

        let report = BoardMonitor::new().report(&storage, &tenant, board.id).await.unwrap();
        assert_eq!(report.zone_status.pre_constraint.health, BufferHealth::Red);
        assert!(!report.can_release);
    }

    #[tokio::test]
    async fn test_report_rejects_foreign_board() {
        let mut storage = MemoryStorage::new();
        let resource = CapacityResource::new(TenantId::new("t1"), "review", 40.0, TimeUnit::Week);
        let board = BoardConfiguration::new(TenantId::new("t1"), "b", resource.id, 2, 2);
        storage.save_board_configuration(&board).await.unwrap();

        let result = BoardMonitor::new()
            .report(&storage, &TenantId::new("t2"), board.id)
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
