//! Board configuration - the buffer layout around one CCR.

use serde::{Deserialize, Serialize};
use crate::id::{BoardId, ResourceId, TenantId};
use crate::position::BufferPosition;

/// Buffer layout of a DBR board.
///
/// Slots run from `-pre_constraint_size` through `post_constraint_size`, with
/// the CCR itself at slot 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfiguration {
    /// Unique identifier
    pub id: BoardId,

    /// Owning tenant
    pub tenant: TenantId,

    /// Display name
    pub name: String,

    /// The capacity constrained resource this board is paced by
    pub ccr_id: ResourceId,

    /// Pre-constraint buffer size in time units
    pub pre_constraint_size: u32,

    /// Post-constraint buffer size in time units
    pub post_constraint_size: u32,
}

impl BoardConfiguration {
    /// Create a new board configuration.
    pub fn new(
        tenant: TenantId,
        name: impl Into<String>,
        ccr_id: ResourceId,
        pre_constraint_size: u32,
        post_constraint_size: u32,
    ) -> Self {
        Self {
            id: BoardId::new(),
            tenant,
            name: name.into(),
            ccr_id,
            pre_constraint_size,
            post_constraint_size,
        }
    }

    /// Total board width: pre + CCR slot + post.
    pub fn width(&self) -> u32 {
        self.pre_constraint_size + 1 + self.post_constraint_size
    }

    /// Classify a raw offset against this board's buffers.
    pub fn classify(&self, offset: i64) -> BufferPosition {
        BufferPosition::classify(offset, self.pre_constraint_size, self.post_constraint_size)
    }

    /// Position a newly planned schedule starts at: one slot before the
    /// pre-constraint buffer, so its first advance releases it.
    pub fn entry_position(&self) -> i64 {
        -(self.pre_constraint_size as i64) - 1
    }

    /// Whether an offset lies past the post-constraint bound.
    pub fn is_past_post_bound(&self, offset: i64) -> bool {
        offset > self.post_constraint_size as i64
    }
}
