//! World Setup
//!
//! Resource initialization, demo definitions, maps and the seeded colony.

pub mod colony;
pub mod defs;
pub mod map;

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::components::world::{ThingRegistry, WorldState};
use crate::config::UpgradeSettings;
use crate::events::TickEvents;
use crate::map::markers::UpgradeMarkers;
use crate::map::regions::{RegionGrid, RegionThings};
use crate::map::reservations::Reservations;
use crate::map::storage::StorageZones;
use crate::systems::requirements::CostCache;
use crate::systems::tracker::ActiveIntentTracker;
use crate::SimRng;

pub use colony::{colony_structures, spawn_colony, ColonyConfig, ColonySummary};
pub use defs::create_def_database;
pub use map::{create_colony_map, create_open_map, create_stockpiles};

/// Inserts every resource the engine needs, with an empty map.
pub fn insert_resources(world: &mut World, settings: UpgradeSettings, seed: u64) {
    world.insert_resource(WorldState::new());
    world.insert_resource(ThingRegistry::new());
    world.insert_resource(settings);
    world.insert_resource(CostCache::new());
    world.insert_resource(create_def_database());
    world.insert_resource(RegionGrid::new());
    world.insert_resource(RegionThings::new());
    world.insert_resource(StorageZones::new());
    world.insert_resource(Reservations::new());
    world.insert_resource(UpgradeMarkers::new());
    world.insert_resource(ActiveIntentTracker::new());
    world.insert_resource(TickEvents::new());
    world.insert_resource(SimRng(SmallRng::seed_from_u64(seed)));
}

/// Default settings, demo definitions and one open room. Nothing spawned.
pub fn bare_world(seed: u64) -> World {
    let mut world = World::new();
    insert_resources(&mut world, UpgradeSettings::default(), seed);
    world.insert_resource(create_open_map());
    world
}

/// The demo colony on its multi-room map.
pub fn demo_world(seed: u64, settings: UpgradeSettings) -> (World, ColonySummary) {
    let mut world = World::new();
    insert_resources(&mut world, settings, seed);
    world.insert_resource(create_colony_map());
    world.insert_resource(create_stockpiles());

    let summary = world.resource_scope(|world, mut rng: Mut<SimRng>| {
        spawn_colony(world, &mut rng.0, &ColonyConfig::default())
    });
    (world, summary)
}

/// Runs `schedule` for `ticks` ticks.
pub fn run_ticks(world: &mut World, schedule: &mut Schedule, ticks: u64) {
    for _ in 0..ticks {
        schedule.run(world);
    }
}
