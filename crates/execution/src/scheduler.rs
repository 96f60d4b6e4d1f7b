//! Schedule membership and validation against storage.

use dbr_core::{
    BoardConfiguration, BoardId, CapacityResource, Schedule, ScheduleId, ScheduleStatus, WorkItem,
    WorkItemId,
};
use dbr_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};

/// Load figures for a schedule against its board's CCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityLoad {
    /// Hours the members need on the CCR
    pub demand: f64,
    /// Demand divided by capacity per time unit
    pub utilization: f64,
    /// Capacity left after the demand
    pub available: f64,
    /// Whether the demand fits
    pub can_accommodate: bool,
}

/// Creates schedules and manages their membership.
///
/// Membership only changes while a schedule is in planning; once the rope
/// releases it the set of work items is fixed.
pub struct ScheduleManager;

impl ScheduleManager {
    /// Create a new manager.
    pub fn new() -> Self {
        Self
    }

    /// Create a planning schedule on a board.
    pub async fn create_schedule(
        &self,
        storage: &mut dyn Storage,
        board_id: BoardId,
        name: &str,
    ) -> Result<Schedule> {
        let board = self.board(&*storage, board_id).await?;
        let schedule = Schedule::new(&board, name);
        storage.save_schedule(&schedule).await?;
        info!(schedule = %schedule.id, board = %board.id, "created schedule '{}'", name);
        Ok(schedule)
    }

    /// Add a Ready work item to a planning schedule.
    ///
    /// Returns false when the item is already a member.
    pub async fn add_work_item(
        &self,
        storage: &mut dyn Storage,
        schedule_id: ScheduleId,
        item_id: WorkItemId,
    ) -> Result<bool> {
        let mut schedule = self.planning_schedule(&*storage, schedule_id).await?;
        let mut item = self.item(&*storage, item_id).await?;

        if item.tenant != schedule.tenant {
            return Err(EngineError::NotFound(format!(
                "work item {} in tenant {}",
                item.id, schedule.tenant
            )));
        }
        match item.schedule_id {
            Some(current) if current == schedule.id => return Ok(false),
            Some(current) => {
                return Err(EngineError::AlreadyScheduled {
                    item: item.id,
                    schedule: current,
                })
            }
            None => {}
        }
        if !item.is_ready() {
            return Err(EngineError::ItemNotReady {
                item: item.id,
                status: item.status,
            });
        }

        let resource = self.ccr_name(&*storage, &schedule).await?;
        if !schedule.add_work_item(&item, &resource) {
            return Ok(false);
        }
        item.schedule_id = Some(schedule.id);
        item.updated_at = chrono::Utc::now();

        storage.save_work_item(&item).await?;
        storage.save_schedule(&schedule).await?;
        debug!(
            schedule = %schedule.id,
            item = %item.id,
            hours = schedule.total_required_capacity_hours,
            "work item added"
        );
        Ok(true)
    }

    /// Remove a work item from a planning schedule.
    ///
    /// Returns false when the item is not a member.
    pub async fn remove_work_item(
        &self,
        storage: &mut dyn Storage,
        schedule_id: ScheduleId,
        item_id: WorkItemId,
    ) -> Result<bool> {
        let mut schedule = self.planning_schedule(&*storage, schedule_id).await?;
        let mut item = self.item(&*storage, item_id).await?;

        let resource = self.ccr_name(&*storage, &schedule).await?;
        if !schedule.remove_work_item(&item, &resource) {
            return Ok(false);
        }
        item.schedule_id = None;
        item.updated_at = chrono::Utc::now();

        storage.save_work_item(&item).await?;
        storage.save_schedule(&schedule).await?;
        debug!(schedule = %schedule.id, item = %item.id, "work item removed");
        Ok(true)
    }

    /// Validate a schedule's members and load against its board's CCR.
    pub async fn validate(&self, storage: &dyn Storage, schedule_id: ScheduleId) -> Result<()> {
        let schedule = self.schedule(storage, schedule_id).await?;
        let resource = self.ccr(storage, &schedule).await?;
        let items = storage.load_work_items(&schedule.work_items).await?;
        schedule.validate(&items, &resource)?;
        Ok(())
    }

    /// Demand, utilization and headroom of a schedule on its CCR.
    pub async fn resource_load(&self, storage: &dyn Storage, schedule_id: ScheduleId) -> Result<CapacityLoad> {
        let schedule = self.schedule(storage, schedule_id).await?;
        let resource = self.ccr(storage, &schedule).await?;
        let items = storage.load_work_items(&schedule.work_items).await?;

        Ok(CapacityLoad {
            demand: resource.compute_total_demand(&items),
            utilization: resource.compute_utilization(&items),
            available: resource.compute_available_capacity(&items),
            can_accommodate: resource.can_accommodate(&items),
        })
    }

    async fn schedule(&self, storage: &dyn Storage, id: ScheduleId) -> Result<Schedule> {
        storage
            .load_schedule(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("schedule {id}")))
    }

    async fn planning_schedule(&self, storage: &dyn Storage, id: ScheduleId) -> Result<Schedule> {
        let schedule = self.schedule(storage, id).await?;
        if schedule.status != ScheduleStatus::Planning {
            return Err(EngineError::ScheduleReleased(id));
        }
        Ok(schedule)
    }

    async fn item(&self, storage: &dyn Storage, id: WorkItemId) -> Result<WorkItem> {
        storage
            .load_work_items(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NotFound(format!("work item {id}")))
    }

    async fn board(&self, storage: &dyn Storage, id: BoardId) -> Result<BoardConfiguration> {
        storage
            .load_board_configuration(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("board {id}")))
    }

    async fn ccr(&self, storage: &dyn Storage, schedule: &Schedule) -> Result<CapacityResource> {
        let board = self.board(storage, schedule.board_id).await?;
        storage
            .load_capacity_resource(board.ccr_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("capacity resource {}", board.ccr_id)))
    }

    async fn ccr_name(&self, storage: &dyn Storage, schedule: &Schedule) -> Result<String> {
        Ok(self.ccr(storage, schedule).await?.name)
    }
}

impl Default for ScheduleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbr_core::{ScheduleValidationError, TenantId, TimeUnit, WorkItemStatus};
    use dbr_storage::MemoryStorage;

    struct Fixture {
        storage: MemoryStorage,
        board: BoardConfiguration,
    }

    async fn fixture(capacity: f64) -> Fixture {
        let tenant = TenantId::new("acme");
        let mut storage = MemoryStorage::new();
        let ccr = CapacityResource::new(tenant.clone(), "press", capacity, TimeUnit::Week);
        let board = BoardConfiguration::new(tenant, "line", ccr.id, 5, 3);
        storage.save_capacity_resource(&ccr).await.unwrap();
        storage.save_board_configuration(&board).await.unwrap();
        Fixture { storage, board }
    }

    async fn ready_item(storage: &mut MemoryStorage, tenant: &TenantId, hours: f64) -> WorkItem {
        let item = WorkItem::new(tenant.clone(), "part")
            .with_hours("press", hours)
            .with_status(WorkItemStatus::Ready);
        storage.save_work_item(&item).await.unwrap();
        item
    }

    #[tokio::test]
    async fn test_create_schedule_starts_in_planning() {
        let mut fx = fixture(40.0).await;
        let schedule = ScheduleManager::new()
            .create_schedule(&mut fx.storage, fx.board.id, "batch-1")
            .await
            .unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Planning);
        assert_eq!(schedule.position, -6);

        let err = ScheduleManager::new()
            .create_schedule(&mut fx.storage, BoardId::new(), "orphan")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_and_remove_track_hours() {
        let mut fx = fixture(40.0).await;
        let manager = ScheduleManager::new();
        let tenant = fx.board.tenant.clone();
        let schedule = manager
            .create_schedule(&mut fx.storage, fx.board.id, "batch")
            .await
            .unwrap();
        let a = ready_item(&mut fx.storage, &tenant, 10.0).await;
        let b = ready_item(&mut fx.storage, &tenant, 15.0).await;

        assert!(manager.add_work_item(&mut fx.storage, schedule.id, a.id).await.unwrap());
        assert!(manager.add_work_item(&mut fx.storage, schedule.id, b.id).await.unwrap());
        assert!(!manager.add_work_item(&mut fx.storage, schedule.id, a.id).await.unwrap());

        let stored = fx.storage.load_schedule(schedule.id).await.unwrap().unwrap();
        assert_eq!(stored.work_items, vec![a.id, b.id]);
        assert!((stored.total_required_capacity_hours - 25.0).abs() < 1e-9);

        assert!(manager.remove_work_item(&mut fx.storage, schedule.id, a.id).await.unwrap());
        assert!(!manager.remove_work_item(&mut fx.storage, schedule.id, a.id).await.unwrap());
        let stored = fx.storage.load_schedule(schedule.id).await.unwrap().unwrap();
        assert!((stored.total_required_capacity_hours - 15.0).abs() < 1e-9);

        let items = fx.storage.load_work_items(&[a.id]).await.unwrap();
        assert_eq!(items[0].schedule_id, None);
    }

    #[tokio::test]
    async fn test_add_rejects_backlog_and_double_membership() {
        let mut fx = fixture(40.0).await;
        let manager = ScheduleManager::new();
        let tenant = fx.board.tenant.clone();
        let first = manager.create_schedule(&mut fx.storage, fx.board.id, "a").await.unwrap();
        let second = manager.create_schedule(&mut fx.storage, fx.board.id, "b").await.unwrap();

        let backlog = WorkItem::new(tenant.clone(), "later");
        fx.storage.save_work_item(&backlog).await.unwrap();
        let err = manager
            .add_work_item(&mut fx.storage, first.id, backlog.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ItemNotReady { .. }));

        let item = ready_item(&mut fx.storage, &tenant, 5.0).await;
        manager.add_work_item(&mut fx.storage, first.id, item.id).await.unwrap();
        let err = manager
            .add_work_item(&mut fx.storage, second.id, item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyScheduled { schedule, .. } if schedule == first.id));
    }

    #[tokio::test]
    async fn test_membership_frozen_after_release() {
        let mut fx = fixture(40.0).await;
        let tenant = fx.board.tenant.clone();
        let released = Schedule::new(&fx.board, "out").with_status(ScheduleStatus::PreConstraint);
        fx.storage.save_schedule(&released).await.unwrap();
        let item = ready_item(&mut fx.storage, &tenant, 5.0).await;

        let err = ScheduleManager::new()
            .add_work_item(&mut fx.storage, released.id, item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ScheduleReleased(id) if id == released.id));
    }

    #[tokio::test]
    async fn test_validate_reports_capacity_and_readiness() {
        let mut fx = fixture(20.0).await;
        let manager = ScheduleManager::new();
        let tenant = fx.board.tenant.clone();
        let schedule = manager.create_schedule(&mut fx.storage, fx.board.id, "big").await.unwrap();
        let a = ready_item(&mut fx.storage, &tenant, 12.0).await;
        let b = ready_item(&mut fx.storage, &tenant, 12.0).await;
        manager.add_work_item(&mut fx.storage, schedule.id, a.id).await.unwrap();

        manager.validate(&fx.storage, schedule.id).await.unwrap();
        let load = manager.resource_load(&fx.storage, schedule.id).await.unwrap();
        assert!((load.utilization - 0.6).abs() < 1e-9);
        assert!(load.can_accommodate);

        manager.add_work_item(&mut fx.storage, schedule.id, b.id).await.unwrap();
        let err = manager.validate(&fx.storage, schedule.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ScheduleValidationError::CapacityExceeded { .. })
        ));

        // a member slipping back out of Ready is named by validation
        let mut slipped = fx.storage.load_work_items(&[a.id]).await.unwrap().remove(0);
        slipped.set_status(WorkItemStatus::Backlog);
        fx.storage.save_work_item(&slipped).await.unwrap();
        let err = manager.validate(&fx.storage, schedule.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ScheduleValidationError::NotReady { item, .. }) if item == a.id
        ));
    }
}
