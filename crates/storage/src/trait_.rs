//! Storage trait abstraction.
//!
//! This is the whole contract the scheduling core has with its environment:
//! lookups of boards, resources, schedules, work items and dependencies, plus
//! mutation persistence with commit/rollback.

use async_trait::async_trait;
use dbr_core::{
    BoardConfiguration, BoardId, CapacityResource, Dependency, ResourceId, Schedule,
    ScheduleId, TenantId, WorkItem, WorkItemId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for DBR data.
///
/// Reads take `&self`; writes take `&mut self` and are pending until
/// `commit`.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Board layout ===

    /// Save a board configuration.
    async fn save_board_configuration(&mut self, board: &BoardConfiguration) -> Result<()>;

    /// Load a board configuration by ID.
    async fn load_board_configuration(&self, id: BoardId) -> Result<Option<BoardConfiguration>>;

    /// Save a capacity resource.
    async fn save_capacity_resource(&mut self, resource: &CapacityResource) -> Result<()>;

    /// Load a capacity resource by ID.
    async fn load_capacity_resource(&self, id: ResourceId) -> Result<Option<CapacityResource>>;

    // === Schedules ===

    /// Persist a schedule's position, status and membership.
    async fn save_schedule(&mut self, schedule: &Schedule) -> Result<()>;

    /// Load a schedule by ID.
    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>>;

    /// Non-completed schedules of a tenant, optionally restricted to a board.
    async fn list_active_schedules(
        &self,
        tenant: &TenantId,
        board: Option<BoardId>,
    ) -> Result<Vec<Schedule>>;

    // === Work items ===

    /// Save a work item.
    async fn save_work_item(&mut self, item: &WorkItem) -> Result<()>;

    /// Load the given work items. Unknown ids are skipped.
    async fn load_work_items(&self, ids: &[WorkItemId]) -> Result<Vec<WorkItem>>;

    /// All work items of a tenant.
    async fn list_work_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>>;

    // === Dependencies ===

    /// Save a dependency edge.
    async fn save_dependency(&mut self, dependency: &Dependency) -> Result<()>;

    /// Edges where the given item is the dependent.
    async fn list_dependencies(&self, dependent: WorkItemId) -> Result<Vec<Dependency>>;

    /// All edges of a tenant.
    async fn list_tenant_dependencies(&self, tenant: &TenantId) -> Result<Vec<Dependency>>;

    /// Backlog items of a tenant that wait on at least one prerequisite.
    async fn list_blocked_work_items(&self, tenant: &TenantId) -> Result<Vec<WorkItem>> {
        let dependencies = self.list_tenant_dependencies(tenant).await?;
        let items = self.list_work_items(tenant).await?;
        Ok(items
            .into_iter()
            .filter(|item| item.status == dbr_core::WorkItemStatus::Backlog)
            .filter(|item| dependencies.iter().any(|d| d.dependent == item.id))
            .collect())
    }

    // === Logical clock ===

    /// Logical time a tenant has reached. Zero for a tenant never advanced.
    async fn load_logical_time(&self, tenant: &TenantId) -> Result<u64>;

    /// Record the logical time a tenant has reached.
    async fn save_logical_time(&mut self, tenant: &TenantId, logical_time: u64) -> Result<()>;

    // === Transaction support ===

    /// Commit pending changes with a message.
    async fn commit(&mut self, message: &str) -> Result<()>;

    /// Rollback pending changes.
    async fn rollback(&mut self) -> Result<()>;
}
