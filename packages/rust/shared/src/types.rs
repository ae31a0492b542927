//! Core domain types for detected announcements.

use serde::{Deserialize, Serialize};

/// Placeholder for a field the block did not mention.
pub const SENTINEL: &str = "—";

/// Project label used when a block yields no text before its field markers.
pub const UNKNOWN_PROJECT: &str = "Unknown Project";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Completed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Completed => f.write_str("Completed"),
        }
    }
}

// ---------------------------------------------------------------------------
// AnnouncementRecord
// ---------------------------------------------------------------------------

/// One announcement derived from a detected page block.
///
/// Records are recomputed on every poll; only [`identifier`](Self::identifier)
/// outlives a cycle, via the detected set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    /// Dedup key derived from project, required points and reward.
    pub identifier: String,
    /// Best-effort project label.
    pub project: String,
    /// Required points, or [`SENTINEL`].
    pub required_points: String,
    /// Reward description, or [`SENTINEL`].
    pub reward: String,
    /// The block carries the "act now" phrase.
    pub urgent: bool,
    /// The block mentions the 15-point threshold.
    pub point_tier_15: bool,
    /// The block mentions the 190-point threshold.
    pub point_tier_190: bool,
    pub status: Status,
    /// Truncated block text for diagnostics.
    pub excerpt: String,
}

impl AnnouncementRecord {
    /// Active and carrying at least one urgency signal.
    pub fn is_actionable(&self) -> bool {
        self.status == Status::Active && (self.urgent || self.point_tier_15 || self.point_tier_190)
    }

    /// Human-readable point spend for alerts (`15`, `190`, or none).
    pub fn spend_tier(&self) -> Option<u32> {
        if self.point_tier_15 {
            Some(15)
        } else if self.point_tier_190 {
            Some(190)
        } else {
            None
        }
    }
}
