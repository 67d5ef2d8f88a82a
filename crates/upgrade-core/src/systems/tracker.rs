//! Active-Intent Tracker
//!
//! Registry of every intent that still needs attention. Swept each tick;
//! each intent gets a re-trigger check on its own slot of the check
//! interval.

use bevy_ecs::prelude::*;

use crate::components::intent::UpgradeIntent;
use crate::components::thing::{PlayerOwned, ThingId, UpgradableKind};
use crate::components::world::WorldState;
use crate::config::UpgradeSettings;
use crate::systems::intent::{check_and_do_upgrade, is_still_active};

/// Resource: structures whose intents are still active
#[derive(Resource, Debug, Default)]
pub struct ActiveIntentTracker {
    intents: Vec<Entity>,
}

impl ActiveIntentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, target: Entity) -> bool {
        self.intents.contains(&target)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.intents.iter().copied()
    }

    pub fn clear(&mut self) {
        self.intents.clear();
    }

    fn remove(&mut self, target: Entity) {
        self.intents.retain(|e| *e != target);
    }
}

/// Starts tracking `target` if it is not tracked yet and still active.
pub fn add_component(world: &mut World, target: Entity) {
    let Some(tracker) = world.get_resource::<ActiveIntentTracker>() else {
        return;
    };
    if tracker.contains(target) {
        return;
    }
    if is_still_active(world, target) {
        world.resource_mut::<ActiveIntentTracker>().intents.push(target);
    }
}

pub fn remove_component(world: &mut World, target: Entity) {
    if let Some(mut tracker) = world.get_resource_mut::<ActiveIntentTracker>() {
        tracker.remove(target);
    }
}

/// Spreads ids over the check interval.
fn hash_offset(id: u64) -> u64 {
    id.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32
}

/// Whether `tick` is this thing's slot in every `interval` ticks.
pub fn is_hash_interval_tick(id: ThingId, tick: u64, interval: u64) -> bool {
    if interval == 0 {
        return false;
    }
    (tick + hash_offset(id.0)) % interval == 0
}

/// System: drop inactive intents and re-trigger held ones on their slot
pub fn sweep_active_intents(world: &mut World) {
    let tick = world.resource::<WorldState>().current_tick;
    let interval = world
        .get_resource::<UpgradeSettings>()
        .map(|s| s.tracker.check_interval)
        .unwrap_or(600);
    let tracked: Vec<Entity> = match world.get_resource::<ActiveIntentTracker>() {
        Some(tracker) => tracker.intents.clone(),
        None => return,
    };

    for target in tracked.into_iter().rev() {
        let alive = world
            .get_entity(target)
            .map(|e| e.contains::<UpgradeIntent>())
            .unwrap_or(false);
        if !alive || !is_still_active(world, target) {
            remove_component(world, target);
            continue;
        }

        let Some(id) = world.get::<ThingId>(target).copied() else {
            continue;
        };
        if is_hash_interval_tick(id, tick, interval) {
            check_and_do_upgrade(world, target);
        }
    }
}

/// Rebuilds the registry from the player's structures after a load.
pub fn rebuild_on_load(world: &mut World) {
    world.resource_mut::<ActiveIntentTracker>().clear();

    let mut query =
        world.query_filtered::<(Entity, &ThingId, &UpgradableKind), (With<UpgradeIntent>, With<PlayerOwned>)>();
    let mut structures: Vec<(ThingId, Entity)> = query
        .iter(world)
        .filter(|(_, _, kind)| **kind == UpgradableKind::Structure)
        .map(|(entity, id, _)| (*id, entity))
        .collect();
    structures.sort_by_key(|(id, _)| *id);

    for (_, target) in structures {
        add_component(world, target);
    }
    tracing::info!(
        "Tracking {} active upgrade intents",
        world.resource::<ActiveIntentTracker>().len()
    );
}

/// Forgets everything tracked by a previous world.
pub fn start_new_world(world: &mut World) {
    if let Some(mut tracker) = world.get_resource_mut::<ActiveIntentTracker>() {
        tracker.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::thing::{ThingDef, ThingQuality};
    use crate::components::world::Cell;
    use crate::map::markers::UpgradeMarkers;
    use crate::map::things::{spawn_thing, ThingSpawn};
    use crate::setup::bare_world;
    use crate::systems::intent::set_desired_quality;
    use upgrade_events::Quality;

    fn table(world: &mut World, quality: Quality) -> Entity {
        spawn_thing(
            world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), quality, Cell::new(2, 2)),
        )
    }

    #[test]
    fn test_hash_interval_spreads_ids() {
        let slots: std::collections::HashSet<u64> = (1..=50)
            .map(|id| (0..600).find(|t| is_hash_interval_tick(ThingId(id), *t, 600)).unwrap())
            .collect();
        assert!(slots.len() > 40);
        assert!(!is_hash_interval_tick(ThingId(1), 5, 0));
    }

    #[test]
    fn test_add_requires_active_intent() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Good);
        world.entity_mut(table).insert(UpgradeIntent::new());

        add_component(&mut world, table);
        assert!(world.resource::<ActiveIntentTracker>().is_empty());
    }

    #[test]
    fn test_sweep_drops_finished_intents() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        set_desired_quality(&mut world, table, Quality::Normal, false).unwrap();
        assert!(world.resource::<ActiveIntentTracker>().contains(table));

        // Quality reached behind the engine's back, marker gone with it.
        world.get_mut::<ThingQuality>(table).unwrap().0 = Quality::Normal;
        world.resource_mut::<UpgradeMarkers>().remove_silently(table);
        sweep_active_intents(&mut world);

        assert!(world.resource::<ActiveIntentTracker>().is_empty());
    }

    #[test]
    fn test_sweep_retriggers_held_intent() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Good);
        set_desired_quality(&mut world, table, Quality::Good, true).unwrap();
        world.get_mut::<ThingQuality>(table).unwrap().0 = Quality::Poor;

        for tick in 0..600 {
            world.resource_mut::<WorldState>().current_tick = tick;
            sweep_active_intents(&mut world);
        }

        assert!(world.resource::<UpgradeMarkers>().has(table));
        assert!(world.get::<UpgradeIntent>(table).unwrap().active_order.is_some());
    }

    #[test]
    fn test_rebuild_on_load_finds_intents() {
        let mut world = bare_world(1);
        let held = table(&mut world, Quality::Good);
        let idle = table(&mut world, Quality::Good);
        set_desired_quality(&mut world, held, Quality::Good, true).unwrap();
        world.entity_mut(idle).insert(UpgradeIntent::new());

        start_new_world(&mut world);
        assert!(world.resource::<ActiveIntentTracker>().is_empty());

        rebuild_on_load(&mut world);
        let tracker = world.resource::<ActiveIntentTracker>();
        assert_eq!(tracker.iter().collect::<Vec<_>>(), vec![held]);
    }
}
