//! Map Setup
//!
//! Region layouts and stockpiles.

use crate::components::bench::ThingFilter;
use crate::components::worker::Danger;
use crate::components::world::CellRect;
use crate::map::regions::RegionGrid;
use crate::map::storage::{StockpileZone, StorageZones};

/// One open 40x30 room.
pub fn create_open_map() -> RegionGrid {
    let mut grid = RegionGrid::new();
    grid.add_region(CellRect::new(0, 0, 39, 29), Danger::None);
    grid
}

/// The demo colony: hall, workshop and storage, with a dangerous cave
/// beyond the workshop.
pub fn create_colony_map() -> RegionGrid {
    let mut grid = RegionGrid::new();

    let hall = grid.add_region(CellRect::new(0, 0, 19, 14), Danger::None);
    let workshop = grid.add_region(CellRect::new(20, 0, 39, 14), Danger::None);
    let storage = grid.add_region(CellRect::new(0, 15, 39, 24), Danger::None);
    let cave = grid.add_region(CellRect::new(40, 0, 49, 24), Danger::Deadly);

    grid.connect(hall, workshop);
    grid.connect(hall, storage);
    grid.connect(workshop, storage);
    grid.connect(workshop, cave);
    grid
}

/// Stockpiles in the storage room.
pub fn create_stockpiles() -> StorageZones {
    StorageZones::new()
        .with_zone(StockpileZone::new(1, "General", CellRect::new(0, 20, 19, 24)))
        .with_zone(
            StockpileZone::new(2, "Armory", CellRect::new(30, 22, 39, 24))
                .with_priority(3)
                .with_filter(ThingFilter::only(["longsword", "rifle"])),
        )
}
