//! Board health and flow metrics.

use serde::{Deserialize, Serialize};
use crate::zone::BufferHealth;

/// Three-level risk rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Low => "LOW",
            Risk::Medium => "MEDIUM",
            Risk::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flow indicators derived from buffer fill percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetrics {
    /// max(0, 100 - max(pre%, post%)) / 100
    pub throughput_rate: f64,
    /// Work piling up in front of the CCR while downstream runs dry
    pub bottleneck_risk: Risk,
    /// How close the fuller buffer is to overflowing
    pub penetration_risk: Risk,
    /// |pre% - post%|
    pub flow_balance: f64,
}

impl FlowMetrics {
    /// Derive the metrics from the two occupancy percentages.
    pub fn from_percentages(pre_pct: f64, post_pct: f64) -> Self {
        let fuller = pre_pct.max(post_pct);

        let bottleneck_risk = if pre_pct >= 80.0 && post_pct <= 20.0 {
            Risk::High
        } else if pre_pct >= 60.0 {
            Risk::Medium
        } else {
            Risk::Low
        };

        let penetration_risk = if fuller >= 90.0 {
            Risk::High
        } else if fuller >= 70.0 {
            Risk::Medium
        } else {
            Risk::Low
        };

        Self {
            throughput_rate: (100.0 - fuller).max(0.0) / 100.0,
            bottleneck_risk,
            penetration_risk,
            flow_balance: (pre_pct - post_pct).abs(),
        }
    }
}

/// Overall health of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Worse of the two buffer colours
    pub overall_status: BufferHealth,
    /// Pre-constraint colour
    pub pre_constraint_status: BufferHealth,
    /// Post-constraint colour
    pub post_constraint_status: BufferHealth,
    /// Active schedules on the board, wherever they sit
    pub total_active_schedules: usize,
    /// Whether a schedule sits at the CCR slot
    pub ccr_occupied: bool,
    /// Flow indicators
    pub flow: FlowMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_metrics_bottleneck() {
        let flow = FlowMetrics::from_percentages(100.0, 0.0);
        assert_eq!(flow.bottleneck_risk, Risk::High);
        assert_eq!(flow.penetration_risk, Risk::High);
        assert_eq!(flow.throughput_rate, 0.0);
        assert_eq!(flow.flow_balance, 100.0);
    }

    #[test]
    fn test_flow_metrics_medium_bands() {
        let flow = FlowMetrics::from_percentages(60.0, 50.0);
        assert_eq!(flow.bottleneck_risk, Risk::Medium);
        assert_eq!(flow.penetration_risk, Risk::Low);

        let flow = FlowMetrics::from_percentages(80.0, 40.0);
        // post above 20% keeps the bottleneck rating at medium
        assert_eq!(flow.bottleneck_risk, Risk::Medium);
        assert_eq!(flow.penetration_risk, Risk::Medium);
    }

    #[test]
    fn test_flow_metrics_quiet_board() {
        let flow = FlowMetrics::from_percentages(20.0, 40.0);
        assert_eq!(flow.bottleneck_risk, Risk::Low);
        assert_eq!(flow.penetration_risk, Risk::Low);
        assert!((flow.throughput_rate - 0.6).abs() < 1e-9);
        assert_eq!(flow.flow_balance, 20.0);
    }

    #[test]
    fn test_throughput_never_negative() {
        let flow = FlowMetrics::from_percentages(140.0, 0.0);
        assert_eq!(flow.throughput_rate, 0.0);
    }
}
