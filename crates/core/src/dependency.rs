//! Dependency model - prerequisite edges between work items.

use serde::{Deserialize, Serialize};
use crate::id::{DependencyId, TenantId, WorkItemId};
use crate::Time;

/// A directed edge: `dependent` waits on `prerequisite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique identifier
    pub id: DependencyId,

    /// Owning tenant
    pub tenant: TenantId,

    /// The item that waits
    pub dependent: WorkItemId,

    /// The item waited on
    pub prerequisite: WorkItemId,

    /// Relationship type
    pub kind: DependencyKind,

    /// Creation timestamp
    pub created_at: Time,
}

impl Dependency {
    /// Create a finish-to-start edge.
    pub fn finish_to_start(tenant: TenantId, dependent: WorkItemId, prerequisite: WorkItemId) -> Self {
        Self::new(tenant, dependent, prerequisite, DependencyKind::FinishToStart)
    }

    /// Create an edge of the given kind.
    pub fn new(
        tenant: TenantId,
        dependent: WorkItemId,
        prerequisite: WorkItemId,
        kind: DependencyKind,
    ) -> Self {
        Self {
            id: DependencyId::new(),
            tenant,
            dependent,
            prerequisite,
            kind,
            created_at: chrono::Utc::now(),
        }
    }

    /// Whether this edge gates the dependent's readiness.
    pub fn gates_readiness(&self) -> bool {
        self.kind == DependencyKind::FinishToStart
    }
}

/// Types of relationships between work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Prerequisite must finish before the dependent can start
    FinishToStart,
    /// Prerequisite must start before the dependent can start
    StartToStart,
    /// Prerequisite must finish before the dependent can finish
    FinishToFinish,
    /// Prerequisite must start before the dependent can finish
    StartToFinish,
}
