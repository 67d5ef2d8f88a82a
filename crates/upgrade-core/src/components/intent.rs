//! Upgrade Intent Component
//!
//! Per-object record of the tier the player wants and whether to hold it.

use bevy_ecs::prelude::*;

use upgrade_events::{IntentRecord, Quality};

/// Component: desired quality of an upgradable object
///
/// `active_order` is only set while the object carries the upgrade marker.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct UpgradeIntent {
    pub desired: Quality,
    /// Keep re-triggering work whenever quality drops below `desired`.
    pub keep: bool,
    /// Construction order currently standing in for the object.
    pub active_order: Option<Entity>,
    /// Set while the marker is being removed by the intent itself.
    pub skip_marker_removal: bool,
    /// Marker and order are created once the object is spawned.
    pub marker_pending_spawn: bool,
}

impl Default for UpgradeIntent {
    fn default() -> Self {
        Self {
            desired: Quality::MIN,
            keep: false,
            active_order: None,
            skip_marker_removal: false,
            marker_pending_spawn: false,
        }
    }
}

impl UpgradeIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same desired tier and keep flag.
    pub fn targets(&self, desired: Quality, keep: bool) -> bool {
        self.desired == desired && self.keep == keep
    }

    pub fn reset(&mut self) {
        self.desired = Quality::MIN;
        self.keep = false;
        self.marker_pending_spawn = false;
    }

    /// Persisted form; `order_id` is the stable id of `active_order`.
    pub fn to_record(&self, order_id: Option<u64>) -> IntentRecord {
        IntentRecord {
            desired: self.desired,
            keep: self.keep,
            active_order: order_id,
            marker_pending_spawn: self.marker_pending_spawn,
        }
    }
}

/// Observable lifecycle of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentState {
    Inactive,
    /// Below target, an order is (or will be) working on it.
    Scheduled,
    /// Target reached and held.
    Watching,
}
