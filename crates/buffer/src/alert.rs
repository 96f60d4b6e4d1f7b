//! Buffer alerts.

use dbr_core::BufferSide;
use serde::{Deserialize, Serialize};

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    /// Buffer at or above its yellow threshold
    Yellow,
    /// Buffer full
    Red,
    /// Schedules beyond the buffer bound
    Critical,
}

impl AlertLevel {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Yellow => "YELLOW",
            AlertLevel::Red => "RED",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert raised for one buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferAlert {
    /// Severity
    pub level: AlertLevel,
    /// Buffer the alert is about
    pub zone: BufferSide,
    /// Human readable description
    pub message: String,
    /// Schedules inside the buffer
    pub occupancy_count: usize,
    /// Buffer size
    pub capacity: u32,
    /// Schedules beyond the bound (critical alerts only)
    pub overflow_count: usize,
}
