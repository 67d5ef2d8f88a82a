//! Save File Types
//!
//! The persisted shape of the world's upgradable things, their intents
//! and the orders working on them. References between records use the
//! stable thing ids, never in-memory handles.

use serde::{Deserialize, Serialize};

use crate::quality::Quality;

/// Current save format version.
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// A grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRecord {
    pub x: i32,
    pub z: i32,
}

/// A counted amount of one material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCount {
    pub def_name: String,
    pub count: u32,
}

impl MaterialCount {
    pub fn new(def_name: impl Into<String>, count: u32) -> Self {
        Self {
            def_name: def_name.into(),
            count,
        }
    }
}

/// What sort of thing a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThingKindRecord {
    /// Built in place.
    Structure,
    /// Portable and upgradable.
    Item,
    /// Portable raw material stack.
    Material,
}

/// Persisted upgrade intent of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub desired: Quality,
    pub keep: bool,
    /// Id of the order currently working on the object.
    #[serde(default)]
    pub active_order: Option<u64>,
    /// Marker and order creation deferred until the object is spawned.
    #[serde(default)]
    pub marker_pending_spawn: bool,
}

/// Where a finished item goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StoreModeRecord {
    DropOnFloor,
    BestStockpile,
    SpecificStockpile { zone_id: u32 },
}

/// A standing upgrade instruction on a workbench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub id: u64,
    /// Definitions of items the bill may upgrade. Empty allows all.
    #[serde(default)]
    pub allowed_defs: Vec<String>,
    pub search_radius: f32,
    pub store_mode: StoreModeRecord,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub min_skill: u32,
}

/// Workbench data attached to a structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchRecord {
    pub usable: bool,
    pub interaction_cell: CellRecord,
    #[serde(default)]
    pub bills: Vec<BillRecord>,
}

/// A structure or item in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingRecord {
    pub id: u64,
    pub def_name: String,
    #[serde(default)]
    pub stuff: Option<String>,
    pub kind: ThingKindRecord,
    #[serde(default)]
    pub quality: Option<Quality>,
    pub stack_count: u32,
    pub hit_points: u32,
    pub max_hit_points: u32,
    pub position: CellRecord,
    /// False while the thing is held inside an order.
    pub spawned: bool,
    #[serde(default)]
    pub forbidden: bool,
    #[serde(default)]
    pub burning: bool,
    #[serde(default)]
    pub player_owned: bool,
    #[serde(default)]
    pub intent: Option<IntentRecord>,
    #[serde(default)]
    pub bench: Option<BenchRecord>,
}

/// A pending structure upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionOrderRecord {
    pub id: u64,
    pub target: u64,
    pub generated_for_quality: Quality,
    pub position: CellRecord,
    #[serde(default)]
    pub delivered: Vec<MaterialCount>,
    pub work_left: f32,
    #[serde(default)]
    pub forbidden: bool,
}

/// An in-progress item upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderRecord {
    pub id: u64,
    pub target: u64,
    pub position: CellRecord,
    #[serde(default)]
    pub ingredients: Vec<MaterialCount>,
    pub work_left: f32,
    pub work_total: f32,
    /// Bench and bill the order was started for.
    #[serde(default)]
    pub bench_id: Option<u64>,
    #[serde(default)]
    pub bill_id: Option<u64>,
    #[serde(default)]
    pub creator: Option<u64>,
}

/// A colonist able to perform upgrade labor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: u64,
    pub name: String,
    pub position: CellRecord,
    pub construction_speed: f32,
    pub crafting_speed: f32,
    pub construction_success_chance: f32,
    pub crafting_skill: u32,
    pub max_danger: u8,
    pub move_speed: u32,
}

/// Complete save file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub version: u32,
    pub tick: u64,
    /// Next id to hand out, so ids are never reused after load.
    pub next_thing_id: u64,
    #[serde(default)]
    pub things: Vec<ThingRecord>,
    #[serde(default)]
    pub construction_orders: Vec<ConstructionOrderRecord>,
    #[serde(default)]
    pub work_orders: Vec<WorkOrderRecord>,
    #[serde(default)]
    pub workers: Vec<WorkerRecord>,
    /// Ids of objects carrying the upgrade marker.
    #[serde(default)]
    pub markers: Vec<u64>,
}

impl SaveGame {
    pub fn empty(tick: u64) -> Self {
        Self {
            version: SAVE_FORMAT_VERSION,
            tick,
            next_thing_id: 1,
            things: Vec::new(),
            construction_orders: Vec::new(),
            work_orders: Vec::new(),
            workers: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn thing(&self, id: u64) -> Option<&ThingRecord> {
        self.things.iter().find(|t| t.id == id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_save_parses_with_defaults() {
        let json = r#"{
            "version": 1,
            "tick": 600,
            "next_thing_id": 3,
            "things": [{
                "id": 1,
                "def_name": "table",
                "kind": "structure",
                "quality": "poor",
                "stack_count": 1,
                "hit_points": 100,
                "max_hit_points": 100,
                "position": {"x": 2, "z": 3},
                "spawned": true,
                "intent": {"desired": "good", "keep": false}
            }]
        }"#;

        let save = SaveGame::from_json(json).unwrap();
        let table = save.thing(1).unwrap();
        assert_eq!(table.quality, Some(Quality::Poor));
        assert!(!table.player_owned);
        let intent = table.intent.as_ref().unwrap();
        assert_eq!(intent.active_order, None);
        assert!(save.construction_orders.is_empty());
        assert!(save.markers.is_empty());
    }

    #[test]
    fn test_store_mode_tagging() {
        let json = serde_json::to_string(&StoreModeRecord::SpecificStockpile { zone_id: 2 }).unwrap();
        assert_eq!(json, r#"{"mode":"specific_stockpile","zone_id":2}"#);
    }
}
