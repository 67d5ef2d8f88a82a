//! Storage Zones
//!
//! Stockpiles where finished items are taken.

use bevy_ecs::prelude::*;

use crate::components::bench::{StoreMode, ThingFilter};
use crate::components::world::{Cell, CellRect};
use crate::map::regions::RegionGrid;
use crate::map::things::occupied_item_cells;

/// A rectangular stockpile.
#[derive(Debug, Clone)]
pub struct StockpileZone {
    pub id: u32,
    pub name: String,
    pub rect: CellRect,
    /// Higher is preferred.
    pub priority: u8,
    pub filter: ThingFilter,
}

impl StockpileZone {
    pub fn new(id: u32, name: impl Into<String>, rect: CellRect) -> Self {
        Self {
            id,
            name: name.into(),
            rect,
            priority: 1,
            filter: ThingFilter::allow_all(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_filter(mut self, filter: ThingFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Resource: all stockpiles on the map
#[derive(Resource, Debug, Default)]
pub struct StorageZones {
    zones: Vec<StockpileZone>,
}

impl StorageZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, zone: StockpileZone) {
        self.zones.push(zone);
    }

    pub fn with_zone(mut self, zone: StockpileZone) -> Self {
        self.add(zone);
        self
    }

    pub fn zone(&self, id: u32) -> Option<&StockpileZone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn zones(&self) -> &[StockpileZone] {
        &self.zones
    }
}

/// Free stockpile cell for a finished item, per the bill's store mode.
///
/// Zones are tried by descending priority; within a zone the cell
/// closest to `near` wins.
pub fn find_store_cell(world: &World, def_name: &str, mode: StoreMode, near: Cell) -> Option<Cell> {
    let zones = world.get_resource::<StorageZones>()?;
    let mut candidates: Vec<&StockpileZone> = match mode {
        StoreMode::DropOnFloor => return None,
        StoreMode::SpecificStockpile(id) => zones.zone(id).into_iter().collect(),
        StoreMode::BestStockpile => zones.zones().iter().collect(),
    };
    candidates.retain(|z| z.filter.allows(def_name));
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    let occupied = occupied_item_cells(world, None);
    let grid = world.resource::<RegionGrid>();

    candidates.into_iter().find_map(|zone| {
        zone.rect
            .cells()
            .filter(|c| grid.is_standable(*c) && !occupied.contains(c))
            .min_by_key(|c| (c.distance_sq(near), c.z, c.x))
    })
}
