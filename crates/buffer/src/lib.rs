//! Buffer zone management (Layer 3)
//!
//! Zone occupancy, penetration detection, alerts and health metrics for DBR
//! boards.

#![warn(missing_docs)]

pub mod zone;
pub mod alert;
pub mod health;
pub mod manager;
pub mod monitor;

pub use zone::{BufferHealth, BufferOccupancy, ZoneStatus};
pub use alert::{AlertLevel, BufferAlert};
pub use health::{FlowMetrics, HealthMetrics, Risk};
pub use manager::{BoardReport, BufferZoneManager, PenetratingSchedule, PenetrationReport};
pub use monitor::BoardMonitor;
