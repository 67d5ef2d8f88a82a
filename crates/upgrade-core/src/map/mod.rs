//! Host World
//!
//! The minimal world the engine runs in: definitions, regions, markers,
//! reservations, stockpiles and thing lifecycle helpers.

pub mod defs;
pub mod markers;
pub mod regions;
pub mod reservations;
pub mod storage;
pub mod things;

pub use defs::{DefCategory, DefDatabase, Ingredient, IngredientSpec, RecipeDef, ThingDefinition};
pub use markers::{remove_marker, UpgradeMarkers};
pub use regions::{build_region_index, Region, RegionGrid, RegionId, RegionThings};
pub use reservations::Reservations;
pub use storage::{find_store_cell, StockpileZone, StorageZones};
pub use things::{
    destroy_thing, despawn_thing, place_near, spawn_thing, take_from_stack, ThingSpawn,
};
