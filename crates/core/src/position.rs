//! Buffer position model.
//!
//! A schedule's position is an offset from the CCR slot. Negative offsets sit
//! upstream in the pre-constraint buffer, positive offsets downstream in the
//! post-constraint buffer. Call sites work with [`BufferPosition`], which
//! carries the zone the offset was classified into, instead of reasoning
//! about signs.

use serde::{Deserialize, Serialize};

/// One of the two buffers surrounding the CCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSide {
    /// Upstream of the CCR
    PreConstraint,
    /// Downstream of the CCR
    PostConstraint,
}

impl BufferSide {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferSide::PreConstraint => "pre_constraint",
            BufferSide::PostConstraint => "post_constraint",
        }
    }
}

impl std::fmt::Display for BufferSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone an offset falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// Inside the pre-constraint buffer
    PreConstraint,
    /// At the CCR
    Constraint,
    /// Inside the post-constraint buffer
    PostConstraint,
    /// Beyond the bound of the given buffer
    Penetration(BufferSide),
}

impl Zone {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::PreConstraint => "pre_constraint",
            Zone::Constraint => "constraint",
            Zone::PostConstraint => "post_constraint",
            Zone::Penetration(_) => "penetration",
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offset from the CCR together with its zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferPosition {
    offset: i64,
    zone: Zone,
}

impl BufferPosition {
    /// Classify an offset against buffer sizes.
    ///
    /// `[-pre, -1]` is pre-constraint, `0` the constraint, `[1, post]`
    /// post-constraint; anything else is penetration of the nearer side.
    /// A zero-size buffer has an empty range, so every offset on that side
    /// is penetration.
    pub fn classify(offset: i64, pre_size: u32, post_size: u32) -> Self {
        let pre = pre_size as i64;
        let post = post_size as i64;
        let zone = if offset == 0 {
            Zone::Constraint
        } else if offset < 0 {
            if offset >= -pre {
                Zone::PreConstraint
            } else {
                Zone::Penetration(BufferSide::PreConstraint)
            }
        } else if offset <= post {
            Zone::PostConstraint
        } else {
            Zone::Penetration(BufferSide::PostConstraint)
        };
        Self { offset, zone }
    }

    /// Raw offset from the CCR.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Classified zone.
    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Whether the offset lies outside both buffers.
    pub fn is_penetration(&self) -> bool {
        matches!(self.zone, Zone::Penetration(_))
    }

    /// Side that was penetrated, if any.
    pub fn penetrated_side(&self) -> Option<BufferSide> {
        match self.zone {
            Zone::Penetration(side) => Some(side),
            _ => None,
        }
    }

    /// Whether the schedule has run past the post-constraint bound.
    pub fn is_past_post_bound(&self) -> bool {
        self.zone == Zone::Penetration(BufferSide::PostConstraint)
    }

    /// Whether the schedule is in the given buffer.
    pub fn occupies(&self, side: BufferSide) -> bool {
        match side {
            BufferSide::PreConstraint => self.zone == Zone::PreConstraint,
            BufferSide::PostConstraint => self.zone == Zone::PostConstraint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ranges() {
        let zone = |p| BufferPosition::classify(p, 5, 3).zone();
        assert_eq!(zone(-6), Zone::Penetration(BufferSide::PreConstraint));
        assert_eq!(zone(-5), Zone::PreConstraint);
        assert_eq!(zone(-1), Zone::PreConstraint);
        assert_eq!(zone(0), Zone::Constraint);
        assert_eq!(zone(1), Zone::PostConstraint);
        assert_eq!(zone(3), Zone::PostConstraint);
        assert_eq!(zone(4), Zone::Penetration(BufferSide::PostConstraint));
    }

    #[test]
    fn test_classify_is_pure() {
        for p in -10..10 {
            assert_eq!(
                BufferPosition::classify(p, 4, 2),
                BufferPosition::classify(p, 4, 2)
            );
        }
    }

    #[test]
    fn test_zero_size_buffers_only_keep_ccr() {
        assert_eq!(BufferPosition::classify(0, 0, 0).zone(), Zone::Constraint);
        assert_eq!(
            BufferPosition::classify(-1, 0, 0).penetrated_side(),
            Some(BufferSide::PreConstraint)
        );
        assert!(BufferPosition::classify(1, 0, 0).is_past_post_bound());
    }

    #[test]
    fn test_post_bound_boundary() {
        // past the bound means > post, i.e. >= post + 1
        assert!(!BufferPosition::classify(3, 5, 3).is_past_post_bound());
        assert!(BufferPosition::classify(4, 5, 3).is_past_post_bound());
    }

    #[test]
    fn test_zone_serialization() {
        let json = serde_json::to_string(&Zone::PreConstraint).unwrap();
        assert_eq!(json, "\"pre_constraint\"");
        let json = serde_json::to_string(&Zone::Penetration(BufferSide::PostConstraint)).unwrap();
        assert_eq!(json, "{\"penetration\":\"post_constraint\"}");
    }
}
