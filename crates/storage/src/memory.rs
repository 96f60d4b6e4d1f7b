//! In-memory storage with real transactional semantics.
//!
//! Writes go to a working copy; `commit` publishes it and `rollback`
//! discards it. Used to embed the scheduler without a filesystem and as the
//! storage double in tests.

use std::collections::HashMap;
use dbr_core::{
    BoardConfiguration, BoardId, CapacityResource, Dependency, DependencyId, ResourceId,
    Schedule, ScheduleId, TenantId, WorkItem, WorkItemId,
};
use super::{Storage, Result};

#[derive(Debug, Clone, Default)]
struct State {
    boards: HashMap<BoardId, BoardConfiguration>,
    resources: HashMap<ResourceId, CapacityResource>,
    schedules: HashMap<ScheduleId, Schedule>,
    work_items: HashMap<WorkItemId, WorkItem>,
    dependencies: HashMap<DependencyId, Dependency>,
    clocks: HashMap<TenantId, u64>,
}

/// Memory-backed storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    committed: State,
    working: State,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the working copy differs from the last commit in size.
    ///
    /// Cheap check intended for tests; it does not compare contents.
    pub fn has_uncommitted_inserts(&self) -> bool {
        self.committed.schedules.len() != self.working.schedules.len()
            || self.committed.work_items.len() != self.working.work_items.len()
            || self.committed.dependencies.len() != self.working.dependencies.len()
    }
}

fn sorted<T, K: Ord>(mut values: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    values.sort_by_key(|v| key(v));
    values
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn save_board_configuration(&mut self, board: &BoardConfiguration) -> Result<()> {
        self.working.boards.insert(board.id, board.clone());
        Ok(())
    }

    async fn load_board_configuration(&self, id: BoardId) -> Result<Option<BoardConfiguration>> {
        Ok(self.working.boards.get(&id).cloned())
    }

    async fn save_capacity_resource(&mut self, resource: &CapacityResource) -> Result<()> {
        self.working.resources.insert(resource.id, resource.clone());
        Ok(())
    }

    async fn load_capacity_resource(&self, id: ResourceId) -> Result<Option<CapacityResource>> {
        Ok(self.working.resources.get(&id).cloned())
    }

    async fn save_schedule(&mut self, schedule: &Schedule) -> Result<()> {
        self.working.schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        Ok(self.working.schedules.get(&id).cloned())
    }

    async fn list_active_schedules(
        &self,
        tenant: &TenantId,
        board: Option<BoardId>,
    ) -> Result<Vec<Schedule>> {
        let schedules: Vec<Schedule> = self
            .working
            .schedules
            .values()
            .filter(|s| &s.tenant == tenant && s.is_active())
            .filter(|s| board.map_or(true, |b| s.board_id == b))
            .cloned()
            .collect();
        Ok(sorted(schedules, |s| (s.created_at, s.id)))
    }

    async fn save_work_item(&mut self, item: &WorkItem) -> Result<()> {
        self.working.work_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn load_work_items(&self, ids: &[WorkItemId]) -> Result<Vec<WorkItem>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.work_items.get(id).cloned())
            .collect())
    }

    async fn list_work_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>> {
        let items: Vec<WorkItem> = self
            .working
            .work_items
            .values()
            .filter(|item| &item.tenant == tenant)
            .cloned()
            .collect();
        Ok(sorted(items, |item| (item.created_at, item.id)))
    }

    async fn save_dependency(&mut self, dependency: &Dependency) -> Result<()> {
        self.working.dependencies.insert(dependency.id, dependency.clone());
        Ok(())
    }

    async fn list_dependencies(&self, dependent: WorkItemId) -> Result<Vec<Dependency>> {
        let deps: Vec<Dependency> = self
            .working
            .dependencies
            .values()
            .filter(|d| d.dependent == dependent)
            .cloned()
            .collect();
        Ok(sorted(deps, |d| (d.created_at, d.id)))
    }

    async fn list_tenant_dependencies(&self, tenant: &TenantId) -> Result<Vec<Dependency>> {
        let deps: Vec<Dependency> = self
            .working
            .dependencies
            .values()
            .filter(|d| &d.tenant == tenant)
            .cloned()
            .collect();
        Ok(sorted(deps, |d| (d.created_at, d.id)))
    }

    async fn load_logical_time(&self, tenant: &TenantId) -> Result<u64> {
        Ok(self.working.clocks.get(tenant).copied().unwrap_or(0))
    }

    async fn save_logical_time(&mut self, tenant: &TenantId, logical_time: u64) -> Result<()> {
        self.working.clocks.insert(tenant.clone(), logical_time);
        Ok(())
    }

    async fn commit(&mut self, _message: &str) -> Result<()> {
        self.committed = self.working.clone();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.working = self.committed.clone();
        Ok(())
    }
}
