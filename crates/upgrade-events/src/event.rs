//! Event Types
//!
//! Structured records of everything the upgrade engine does to the world.
//! One JSON object per line in the event log.

use serde::{Deserialize, Serialize};

use crate::quality::{Quality, QualityRange};

/// Which kind of order a job or event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// On-site structure work ("frame").
    Construction,
    /// Bench work on a portable item.
    Crafting,
}

/// How a labor task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCondition {
    Succeeded,
    Failed,
    Incompletable,
    Cancelled,
}

impl JobCondition {
    pub fn is_success(self) -> bool {
        matches!(self, JobCondition::Succeeded)
    }
}

/// Why an order was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyReason {
    /// Replaced or withdrawn; nothing is lost.
    Cancelled,
    /// The tier step finished.
    Completed,
    /// The construction attempt failed.
    Failed,
    /// Destroyed by something outside the engine.
    Killed,
}

/// One required material in an order, as logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSnapshot {
    pub def_name: String,
    pub count: u32,
    pub quality: QualityRange,
}

/// A single logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeEvent {
    pub event_id: String,
    pub tick: u64,
    /// The upgradable object the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thing_id: Option<u64>,
    #[serde(flatten)]
    pub kind: UpgradeEventKind,
}

impl UpgradeEvent {
    pub fn new(
        event_id: impl Into<String>,
        tick: u64,
        thing_id: Option<u64>,
        kind: UpgradeEventKind,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            tick,
            thing_id,
            kind,
        }
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeEventKind {
    /// An order was placed or will be placed once the object is spawned.
    IntentScheduled {
        current: Quality,
        desired: Quality,
        keep: bool,
    },
    /// The target tier is reached and is being held.
    IntentWatching { desired: Quality },
    IntentCancelled,
    OrderPlaced {
        order: OrderKind,
        order_id: u64,
        for_quality: Quality,
        requirements: Vec<RequirementSnapshot>,
    },
    /// A construction order was rebuilt because its tier snapshot went stale.
    OrderRegenerated { was: Quality, now: Quality },
    OrderDestroyed {
        order: OrderKind,
        order_id: u64,
        reason: DestroyReason,
    },
    QualityIncreased { from: Quality, to: Quality },
    JobStarted {
        worker_id: u64,
        order: OrderKind,
        /// Whether an existing crafting order is being resumed.
        #[serde(default)]
        resumed: bool,
    },
    JobEnded {
        worker_id: u64,
        order: OrderKind,
        condition: JobCondition,
    },
    NoJobAvailable { worker_id: u64, reason: String },
    /// The finished item could not be stored or placed.
    PlacementFailed { worker_id: u64 },
    ConstructionFailed { worker_id: u64 },
    /// Inconsistent state was found and repaired.
    Repaired { detail: String },
}

impl UpgradeEventKind {
    /// Short machine name of the variant, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            UpgradeEventKind::IntentScheduled { .. } => "intent_scheduled",
            UpgradeEventKind::IntentWatching { .. } => "intent_watching",
            UpgradeEventKind::IntentCancelled => "intent_cancelled",
            UpgradeEventKind::OrderPlaced { .. } => "order_placed",
            UpgradeEventKind::OrderRegenerated { .. } => "order_regenerated",
            UpgradeEventKind::OrderDestroyed { .. } => "order_destroyed",
            UpgradeEventKind::QualityIncreased { .. } => "quality_increased",
            UpgradeEventKind::JobStarted { .. } => "job_started",
            UpgradeEventKind::JobEnded { .. } => "job_ended",
            UpgradeEventKind::NoJobAvailable { .. } => "no_job_available",
            UpgradeEventKind::PlacementFailed { .. } => "placement_failed",
            UpgradeEventKind::ConstructionFailed { .. } => "construction_failed",
            UpgradeEventKind::Repaired { .. } => "repaired",
        }
    }
}
