//! Colony Spawning
//!
//! Seeded furniture, workbenches, items, stockpiled materials and workers
//! of the demo colony.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use upgrade_events::Quality;

use crate::components::bench::{StoreMode, ThingFilter, UpgradeBill, Workbench};
use crate::components::thing::{ThingDef, ThingId, UpgradableKind};
use crate::components::worker::Worker;
use crate::components::world::{Cell, Position, ThingRegistry};
use crate::map::things::{spawn_thing, ThingSpawn};

const WORKER_NAMES: &[&str] = &["Ada", "Bo", "Cyrus", "Dagny", "Edda", "Fenn"];

/// Colony spawning parameters.
#[derive(Debug, Clone)]
pub struct ColonyConfig {
    pub workers: usize,
    pub tables: usize,
    pub items: usize,
    pub steel_stacks: usize,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            tables: 4,
            items: 6,
            steel_stacks: 12,
        }
    }
}

/// What was spawned.
#[derive(Debug, Clone, Default)]
pub struct ColonySummary {
    pub structures: usize,
    pub items: usize,
    pub material_stacks: usize,
    pub workers: usize,
}

fn random_low_quality(rng: &mut SmallRng) -> Quality {
    match rng.gen_range(0..3) {
        0 => Quality::Awful,
        1 => Quality::Poor,
        _ => Quality::Normal,
    }
}

fn spawn_benches(world: &mut World) {
    let smithy = spawn_thing(
        world,
        ThingSpawn::structure(ThingDef::new("smithy").with_stuff("steel"), Quality::Good, Cell::new(24, 4)),
    );
    world.entity_mut(smithy).insert(
        Workbench::new(Cell::new(24, 5)).with_bill(
            UpgradeBill::new(1)
                .with_filter(ThingFilter::only(["longsword", "rifle"]))
                .with_store_mode(StoreMode::BestStockpile),
        ),
    );

    let tailor = spawn_thing(
        world,
        ThingSpawn::structure(ThingDef::new("tailor_bench").with_stuff("wood_log"), Quality::Normal, Cell::new(32, 4)),
    );
    world.entity_mut(tailor).insert(
        Workbench::new(Cell::new(32, 5)).with_bill(
            UpgradeBill::new(2)
                .with_filter(ThingFilter::only(["parka"]))
                .with_radius(30.0)
                .with_store_mode(StoreMode::SpecificStockpile(1)),
        ),
    );
}

/// Spawns the colony and returns what was created.
pub fn spawn_colony(world: &mut World, rng: &mut SmallRng, config: &ColonyConfig) -> ColonySummary {
    let mut summary = ColonySummary::default();

    spawn_benches(world);
    summary.structures += 2;

    for i in 0..config.tables {
        let cell = Cell::new(3 + 4 * i as i32, 6);
        let stuff = if i % 2 == 0 { "steel" } else { "wood_log" };
        let def = if i % 3 == 2 { "armchair" } else { "table" };
        spawn_thing(
            world,
            ThingSpawn::structure(ThingDef::new(def).with_stuff(stuff), random_low_quality(rng), cell),
        );
        summary.structures += 1;
    }

    const ITEMS: [(&str, Option<&str>); 3] = [("longsword", Some("steel")), ("parka", Some("cloth")), ("rifle", None)];
    for i in 0..config.items {
        let (name, stuff) = ITEMS[i % ITEMS.len()];
        let mut def = ThingDef::new(name);
        if let Some(stuff) = stuff {
            def = def.with_stuff(stuff);
        }
        let cell = Cell::new(2 + 2 * i as i32, 17);
        spawn_thing(world, ThingSpawn::item(def, random_low_quality(rng), cell));
        summary.items += 1;
    }

    for i in 0..config.steel_stacks {
        let cell = Cell::new(2 + i as i32 % 18, 21 + (i / 18) as i32);
        let count = rng.gen_range(40..=75);
        spawn_thing(world, ThingSpawn::material("steel", count, cell));
        summary.material_stacks += 1;
    }
    for (i, (name, count)) in [("cloth", 75), ("cloth", 75), ("wood_log", 75), ("component", 25)]
        .into_iter()
        .enumerate()
    {
        spawn_thing(world, ThingSpawn::material(name, count, Cell::new(2 + i as i32, 23)));
        summary.material_stacks += 1;
    }

    for i in 0..config.workers {
        let name = WORKER_NAMES[i % WORKER_NAMES.len()];
        let worker = Worker::new(name)
            .with_speeds(rng.gen_range(8.0..14.0), rng.gen_range(8.0..14.0))
            .with_success_chance(rng.gen_range(0.75..1.0))
            .with_skill(rng.gen_range(3..12));
        let id = world.resource_mut::<ThingRegistry>().allocate_id();
        let entity = world.spawn((id, worker, Position(Cell::new(10 + i as i32, 10)))).id();
        world.resource_mut::<ThingRegistry>().register(id, entity);
        summary.workers += 1;
    }

    summary
}

/// Structures, lowest id first.
pub fn colony_structures(world: &mut World) -> Vec<Entity> {
    let mut query = world.query::<(Entity, &ThingId, &UpgradableKind)>();
    let mut structures: Vec<_> = query
        .iter(world)
        .filter(|(_, _, kind)| **kind == UpgradableKind::Structure)
        .map(|(entity, id, _)| (*id, entity))
        .collect();
    structures.sort();
    structures.into_iter().map(|(_, entity)| entity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::bare_world;
    use rand::SeedableRng;

    #[test]
    fn test_colony_is_seeded() {
        let mut first = bare_world(1);
        let mut second = bare_world(1);
        let config = ColonyConfig::default();

        let a = spawn_colony(&mut first, &mut SmallRng::seed_from_u64(7), &config);
        let b = spawn_colony(&mut second, &mut SmallRng::seed_from_u64(7), &config);

        assert_eq!(a.workers, 3);
        assert_eq!(a.structures, b.structures);
        assert_eq!(colony_structures(&mut first).len(), 6);
        assert_eq!(
            crate::persistence::capture(&mut first),
            crate::persistence::capture(&mut second)
        );
    }
}
