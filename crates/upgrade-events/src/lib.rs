//! Shared data types for the quality upgrade engine.
//!
//! This crate contains pure data structures with no simulation logic:
//! quality tiers, logged events and the save file shape.

pub mod event;
pub mod quality;
pub mod save;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

pub use event::{
    DestroyReason, JobCondition, OrderKind, RequirementSnapshot, UpgradeEvent, UpgradeEventKind,
};
pub use quality::{ParseQualityError, Quality, QualityRange};
pub use save::{
    BenchRecord, BillRecord, CellRecord, ConstructionOrderRecord, IntentRecord, MaterialCount,
    SaveGame, StoreModeRecord, ThingKindRecord, ThingRecord, WorkOrderRecord, WorkerRecord,
    SAVE_FORMAT_VERSION,
};
