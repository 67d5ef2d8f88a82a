//! Save and Load
//!
//! Captures upgradable things, intents, orders, workers and markers into
//! a [`SaveGame`] and restores them. References are stored as stable
//! thing ids. Needed materials and construction work are recomputed on
//! load; running jobs and reservations are not saved.

use bevy_ecs::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use upgrade_events::{
    ConstructionOrderRecord, IntentRecord, SaveGame, ThingKindRecord, ThingRecord, WorkOrderRecord, WorkerRecord,
    SAVE_FORMAT_VERSION,
};

use crate::components::bench::Workbench;
use crate::components::intent::UpgradeIntent;
use crate::components::order::{BillRef, ConstructionOrder, WorkOrder};
use crate::components::thing::{
    Burning, Forbidden, HitPoints, PlayerOwned, Spawned, StackCount, ThingDef, ThingId, ThingQuality,
    UpgradableKind,
};
use crate::components::worker::{Danger, Worker};
use crate::components::world::{Cell, Position, ThingRegistry, WorldState};
use crate::map::markers::UpgradeMarkers;
use crate::map::reservations::Reservations;
use crate::map::things::{is_spawned, place_near, position_of, release_at, spawn_thing, thing_id_of, ThingSpawn};
use crate::systems::requirements::{compute_requirements, tier_scaled_work};
use crate::systems::tracker::{rebuild_on_load, start_new_world};

/// Errors that can occur when saving or loading.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access save file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse save file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("save refers to unknown thing {0}")]
    UnknownThing(u64),
}

fn id_of(world: &World, entity: Entity) -> Option<u64> {
    thing_id_of(world, entity).map(|id| id.0)
}

fn sorted_ids<F: bevy_ecs::query::QueryFilter>(world: &mut World) -> Vec<(ThingId, Entity)> {
    let mut query = world.query_filtered::<(&ThingId, Entity), F>();
    let mut ids: Vec<(ThingId, Entity)> = query.iter(world).map(|(id, e)| (*id, e)).collect();
    ids.sort();
    ids
}

fn thing_record(world: &World, id: ThingId, entity: Entity) -> Option<ThingRecord> {
    let def = world.get::<ThingDef>(entity)?;
    let kind = world
        .get::<UpgradableKind>(entity)
        .map(|k| ThingKindRecord::from(*k))
        .unwrap_or(ThingKindRecord::Material);
    let hit_points = world.get::<HitPoints>(entity).copied().unwrap_or(HitPoints::full(100));
    let active_order = world
        .get::<UpgradeIntent>(entity)
        .and_then(|i| i.active_order)
        .and_then(|order| id_of(world, order));

    Some(ThingRecord {
        id: id.0,
        def_name: def.def_name.clone(),
        stuff: def.stuff.clone(),
        kind,
        quality: world.get::<ThingQuality>(entity).map(|q| q.0),
        stack_count: world.get::<StackCount>(entity).map(|s| s.0).unwrap_or(1),
        hit_points: hit_points.current,
        max_hit_points: hit_points.max,
        position: position_of(world, entity).unwrap_or_default().into(),
        spawned: is_spawned(world, entity),
        forbidden: world.get::<Forbidden>(entity).is_some(),
        burning: world.get::<Burning>(entity).is_some(),
        player_owned: world.get::<PlayerOwned>(entity).is_some(),
        intent: world.get::<UpgradeIntent>(entity).map(|i| i.to_record(active_order)),
        bench: world.get::<Workbench>(entity).map(Workbench::to_record),
    })
}

/// Snapshot of everything the engine persists.
pub fn capture(world: &mut World) -> SaveGame {
    let mut save = SaveGame::empty(world.resource::<WorldState>().current_tick);
    save.next_thing_id = world.resource::<ThingRegistry>().next_id();

    let things = sorted_ids::<(With<ThingDef>, Without<ConstructionOrder>, Without<WorkOrder>, Without<Worker>)>(world);
    save.things = things
        .into_iter()
        .filter_map(|(id, entity)| thing_record(world, id, entity))
        .collect();

    for (id, entity) in sorted_ids::<With<ConstructionOrder>>(world) {
        let Some(order) = world.get::<ConstructionOrder>(entity) else {
            continue;
        };
        let Some(target) = id_of(world, order.target) else {
            tracing::warn!("Construction order {} lost its target, not saved", id.0);
            continue;
        };
        save.construction_orders.push(ConstructionOrderRecord {
            id: id.0,
            target,
            generated_for_quality: order.generated_for_quality,
            position: position_of(world, entity).unwrap_or_default().into(),
            delivered: order.delivered_materials(),
            work_left: order.work_left,
            forbidden: world.get::<Forbidden>(entity).is_some(),
        });
    }

    for (id, entity) in sorted_ids::<With<WorkOrder>>(world) {
        let Some(order) = world.get::<WorkOrder>(entity) else {
            continue;
        };
        let Some(target) = id_of(world, order.target) else {
            tracing::warn!("Work order {} lost its target, not saved", id.0);
            continue;
        };
        save.work_orders.push(WorkOrderRecord {
            id: id.0,
            target,
            position: position_of(world, entity).unwrap_or_default().into(),
            ingredients: order.ingredients.clone(),
            work_left: order.work_left,
            work_total: order.work_total,
            bench_id: order.bill.and_then(|b| id_of(world, b.bench)),
            bill_id: order.bill.map(|b| b.bill_id),
            creator: order.creator.and_then(|c| id_of(world, c)),
        });
    }

    for (id, entity) in sorted_ids::<With<Worker>>(world) {
        let Some(worker) = world.get::<Worker>(entity) else {
            continue;
        };
        save.workers.push(WorkerRecord {
            id: id.0,
            name: worker.name.clone(),
            position: position_of(world, entity).unwrap_or_default().into(),
            construction_speed: worker.construction_speed,
            crafting_speed: worker.crafting_speed,
            construction_success_chance: worker.construction_success_chance,
            crafting_skill: worker.crafting_skill,
            max_danger: worker.max_danger.as_u8(),
            move_speed: worker.move_speed,
        });
    }

    let markers = world.resource::<UpgradeMarkers>();
    save.markers = markers.iter().filter_map(|e| id_of(world, e)).collect();
    save.markers.sort_unstable();
    save
}

fn entity_for(world: &World, id: u64) -> Result<Entity, PersistenceError> {
    world
        .resource::<ThingRegistry>()
        .entity(ThingId(id))
        .ok_or(PersistenceError::UnknownThing(id))
}

/// Removes every saved kind of entity and the state that refers to them.
fn clear_world(world: &mut World) {
    let mut query = world.query_filtered::<Entity, Or<(With<ThingId>, With<Worker>)>>();
    let entities: Vec<Entity> = query.iter(world).collect();
    for entity in entities {
        world.despawn(entity);
    }
    world.resource_mut::<ThingRegistry>().clear();
    world.resource_mut::<UpgradeMarkers>().clear();
    world.resource_mut::<Reservations>().clear();
    start_new_world(world);
}

fn restore_thing(world: &mut World, record: &ThingRecord) {
    let spawn = ThingSpawn {
        id: Some(ThingId(record.id)),
        def: ThingDef {
            def_name: record.def_name.clone(),
            stuff: record.stuff.clone(),
        },
        kind: UpgradableKind::from_record(record.kind),
        quality: record.quality,
        stack_count: record.stack_count,
        hit_points: Some(HitPoints {
            current: record.hit_points,
            max: record.max_hit_points,
        }),
        cell: record.position.into(),
        spawned: record.spawned,
        player_owned: record.player_owned,
        forbidden: record.forbidden,
        burning: record.burning,
    };
    let entity = spawn_thing(world, spawn);
    if let Some(bench) = &record.bench {
        world.entity_mut(entity).insert(Workbench::from_record(bench));
    }
}

fn restore_construction_order(world: &mut World, record: &ConstructionOrderRecord) -> Result<(), PersistenceError> {
    let target = entity_for(world, record.target)?;
    let needed = compute_requirements(world, target);
    let work_total = tier_scaled_work(world, target);

    let mut order = ConstructionOrder::new(target, record.generated_for_quality, needed, work_total);
    for material in &record.delivered {
        order.deliver(&material.def_name, material.count);
    }
    order.work_left = record.work_left.min(work_total);

    let id = ThingId(record.id);
    let mut entity = world.spawn((id, order, Position(record.position.into()), Spawned));
    if record.forbidden {
        entity.insert(Forbidden);
    }
    let entity = entity.id();
    world.resource_mut::<ThingRegistry>().register(id, entity);
    Ok(())
}

fn restore_work_order(world: &mut World, record: &WorkOrderRecord) -> Result<(), PersistenceError> {
    let target = entity_for(world, record.target)?;
    let bill = match (record.bench_id, record.bill_id) {
        (Some(bench), Some(bill_id)) => Some(BillRef {
            bench: entity_for(world, bench)?,
            bill_id,
        }),
        _ => None,
    };
    let creator = record.creator.map(|c| entity_for(world, c)).transpose()?;

    let id = ThingId(record.id);
    let entity = world
        .spawn((
            id,
            WorkOrder {
                target,
                ingredients: record.ingredients.clone(),
                work_left: record.work_left,
                work_total: record.work_total,
                bill,
                creator,
            },
            Position(record.position.into()),
            Spawned,
        ))
        .id();
    world.resource_mut::<ThingRegistry>().register(id, entity);
    Ok(())
}

fn restore_worker(world: &mut World, record: &WorkerRecord) {
    let id = ThingId(record.id);
    let worker = Worker {
        name: record.name.clone(),
        construction_speed: record.construction_speed,
        crafting_speed: record.crafting_speed,
        construction_success_chance: record.construction_success_chance,
        crafting_skill: record.crafting_skill,
        max_danger: Danger::from_u8(record.max_danger),
        move_speed: record.move_speed,
    };
    let entity = world.spawn((id, worker, Position(record.position.into()))).id();
    world.resource_mut::<ThingRegistry>().register(id, entity);
}

fn restore_intent(world: &mut World, thing: Entity, record: &IntentRecord) -> Result<(), PersistenceError> {
    let active_order = record.active_order.map(|id| entity_for(world, id)).transpose()?;
    world.entity_mut(thing).insert(UpgradeIntent {
        desired: record.desired,
        keep: record.keep,
        active_order,
        skip_marker_removal: false,
        marker_pending_spawn: record.marker_pending_spawn,
    });
    Ok(())
}

/// Things left in hand by jobs that were not saved go back on the floor.
///
/// Structures and anything holding an intent stay where they are; their
/// intent is waiting for them to be placed.
fn put_down_orphans(world: &mut World) {
    let mut held = world.query_filtered::<(Entity, &Position, Option<&UpgradableKind>), (
        With<ThingDef>,
        Without<Spawned>,
        Without<UpgradeIntent>,
    )>();
    let orphans: Vec<(Entity, Cell)> = held
        .iter(world)
        .filter(|(_, _, kind)| *kind != Some(&UpgradableKind::Structure))
        .map(|(e, p, _)| (e, p.0))
        .collect();
    let mut orders = world.query::<&WorkOrder>();
    let in_orders: Vec<Entity> = orders.iter(world).map(|o| o.target).collect();

    for (thing, cell) in orphans.into_iter().filter(|(e, _)| !in_orders.contains(e)) {
        if let Err(e) = place_near(world, thing, cell) {
            tracing::warn!("Orphaned {:?} dropped in place: {}", thing, e);
            release_at(world, thing, cell);
        }
    }
}

/// Every id the save refers to must be one it defines.
fn check_references(save: &SaveGame) -> Result<(), PersistenceError> {
    let known: HashSet<u64> = save
        .things
        .iter()
        .map(|t| t.id)
        .chain(save.workers.iter().map(|w| w.id))
        .chain(save.construction_orders.iter().map(|o| o.id))
        .chain(save.work_orders.iter().map(|o| o.id))
        .collect();

    let references = save
        .construction_orders
        .iter()
        .map(|o| o.target)
        .chain(
            save.work_orders
                .iter()
                .flat_map(|o| [Some(o.target), o.bench_id, o.creator])
                .flatten(),
        )
        .chain(
            save.things
                .iter()
                .filter_map(|t| t.intent.as_ref().and_then(|i| i.active_order)),
        )
        .chain(save.markers.iter().copied());

    for id in references {
        if !known.contains(&id) {
            return Err(PersistenceError::UnknownThing(id));
        }
    }
    Ok(())
}

/// Replaces the world's saved state with `save`.
///
/// The save is checked before anything is cleared; a rejected save leaves
/// the world as it was.
pub fn restore(world: &mut World, save: &SaveGame) -> Result<(), PersistenceError> {
    if save.version != SAVE_FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: save.version,
            expected: SAVE_FORMAT_VERSION,
        });
    }
    check_references(save)?;

    clear_world(world);
    world.resource_mut::<WorldState>().current_tick = save.tick;

    for record in &save.things {
        restore_thing(world, record);
    }
    for record in &save.workers {
        restore_worker(world, record);
    }
    for record in &save.construction_orders {
        restore_construction_order(world, record)?;
    }
    for record in &save.work_orders {
        restore_work_order(world, record)?;
    }
    for record in &save.things {
        if let Some(intent) = &record.intent {
            let thing = entity_for(world, record.id)?;
            restore_intent(world, thing, intent)?;
        }
    }
    for id in &save.markers {
        let thing = entity_for(world, *id)?;
        world.resource_mut::<UpgradeMarkers>().add(thing);
    }
    world.resource_mut::<ThingRegistry>().set_next_id(save.next_thing_id);

    put_down_orphans(world);
    rebuild_on_load(world);
    tracing::info!(
        "Loaded tick {}: {} things, {} construction orders, {} work orders",
        save.tick,
        save.things.len(),
        save.construction_orders.len(),
        save.work_orders.len()
    );
    Ok(())
}

/// Writes the world's state as pretty JSON.
pub fn save_to_file(world: &mut World, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let json = capture(world).to_json()?;
    fs::write(path, json)?;
    Ok(())
}

/// Reads a save file without applying it.
pub fn read_save(path: impl AsRef<Path>) -> Result<SaveGame, PersistenceError> {
    let json = fs::read_to_string(path)?;
    Ok(SaveGame::from_json(&json)?)
}

/// Reads a save file and restores it into `world`.
pub fn load_from_file(world: &mut World, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let save = read_save(path)?;
    restore(world, &save)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::bare_world;
    use crate::map::things::{hold, take_from_stack};
    use crate::systems::intent::set_desired_quality;
    use crate::systems::tracker::ActiveIntentTracker;
    use upgrade_events::Quality;

    fn marked_table(world: &mut World) -> Entity {
        let table = spawn_thing(
            world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), Quality::Poor, Cell::new(5, 5)),
        );
        set_desired_quality(world, table, Quality::Good, false).unwrap();
        table
    }

    #[test]
    fn test_capture_uses_stable_ids() {
        let mut world = bare_world(1);
        let table = marked_table(&mut world);
        let order = world.get::<UpgradeIntent>(table).unwrap().active_order.unwrap();
        world.get_mut::<ConstructionOrder>(order).unwrap().deliver("steel", 30);

        let save = capture(&mut world);
        let table_id = id_of(&world, table).unwrap();
        let order_id = id_of(&world, order).unwrap();

        assert_eq!(save.markers, vec![table_id]);
        let record = save.thing(table_id).unwrap();
        assert_eq!(record.intent.as_ref().unwrap().active_order, Some(order_id));
        assert_eq!(save.construction_orders[0].target, table_id);
        assert_eq!(save.construction_orders[0].delivered[0].count, 30);
    }

    #[test]
    fn test_restore_rebuilds_links() {
        let mut world = bare_world(1);
        let table = marked_table(&mut world);
        let table_id = thing_id_of(&world, table).unwrap();
        let save = capture(&mut world);

        let mut loaded = bare_world(2);
        restore(&mut loaded, &save).unwrap();

        let table = loaded.resource::<ThingRegistry>().entity(table_id).unwrap();
        let intent = loaded.get::<UpgradeIntent>(table).unwrap();
        assert_eq!(intent.desired, Quality::Good);
        let order = loaded.get::<ConstructionOrder>(intent.active_order.unwrap()).unwrap();
        assert_eq!(order.target, table);
        assert_eq!(order.needed[0].count, 90);
        assert!(loaded.resource::<UpgradeMarkers>().has(table));
        assert!(loaded.resource::<ActiveIntentTracker>().contains(table));
        assert_eq!(loaded.resource::<ThingRegistry>().next_id(), save.next_thing_id);
    }

    #[test]
    fn test_restore_rejects_other_versions() {
        let mut world = bare_world(1);
        let mut save = capture(&mut world);
        save.version = SAVE_FORMAT_VERSION + 1;

        let result = restore(&mut world, &save);
        assert!(matches!(result, Err(PersistenceError::UnsupportedVersion { .. })));
    }

    #[test]
    fn test_restore_rejects_dangling_marker() {
        let mut world = bare_world(1);
        let mut save = capture(&mut world);
        save.markers.push(999);

        let result = restore(&mut world, &save);
        assert!(matches!(result, Err(PersistenceError::UnknownThing(999))));
    }

    #[test]
    fn test_rejected_save_leaves_world_alone() {
        let mut world = bare_world(1);
        let table = marked_table(&mut world);
        let order = world.get::<UpgradeIntent>(table).unwrap().active_order.unwrap();
        let mut save = capture(&mut world);
        save.markers.insert(0, 999);
        save.tick = 5000;

        let result = restore(&mut world, &save);
        assert!(matches!(result, Err(PersistenceError::UnknownThing(999))));

        assert_eq!(world.resource::<WorldState>().current_tick, 0);
        assert!(world.resource::<UpgradeMarkers>().has(table));
        assert!(world.resource::<ActiveIntentTracker>().contains(table));
        assert_eq!(world.get::<ConstructionOrder>(order).unwrap().target, table);
        assert_eq!(world.resource::<ThingRegistry>().entity(thing_id_of(&world, table).unwrap()), Some(table));
    }

    #[test]
    fn test_rejects_work_order_for_missing_bench() {
        let mut world = bare_world(1);
        let sword = spawn_thing(
            &mut world,
            ThingSpawn::item(ThingDef::new("longsword").with_stuff("steel"), Quality::Poor, Cell::new(6, 6)),
        );
        let mut save = capture(&mut world);
        save.work_orders.push(WorkOrderRecord {
            id: save.next_thing_id,
            target: id_of(&world, sword).unwrap(),
            ingredients: Vec::new(),
            work_left: 100.0,
            work_total: 800.0,
            position: Cell::new(6, 7).into(),
            bench_id: Some(404),
            bill_id: Some(1),
            creator: None,
        });

        let result = restore(&mut world, &save);
        assert!(matches!(result, Err(PersistenceError::UnknownThing(404))));
        assert!(is_spawned(&world, sword));
    }

    #[test]
    fn test_held_structure_keeps_deferred_intent() {
        let mut world = bare_world(1);
        let table = spawn_thing(
            &mut world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), Quality::Poor, Cell::new(5, 5)),
        );
        hold(&mut world, table);
        set_desired_quality(&mut world, table, Quality::Good, false).unwrap();
        let table_id = thing_id_of(&world, table).unwrap();
        let save = capture(&mut world);

        let mut loaded = bare_world(1);
        restore(&mut loaded, &save).unwrap();

        let table = loaded.resource::<ThingRegistry>().entity(table_id).unwrap();
        assert!(!is_spawned(&loaded, table));
        let intent = loaded.get::<UpgradeIntent>(table).unwrap();
        assert!(intent.marker_pending_spawn);
        assert!(intent.active_order.is_none());
        let mut orders = loaded.query::<&ConstructionOrder>();
        assert_eq!(orders.iter(&loaded).count(), 0);
    }

    #[test]
    fn test_carried_stack_is_put_down() {
        let mut world = bare_world(1);
        let stack = spawn_thing(&mut world, ThingSpawn::material("steel", 50, Cell::new(3, 3)));
        let carried = take_from_stack(&mut world, stack, 20).unwrap();
        let carried_id = thing_id_of(&world, carried).unwrap();
        let save = capture(&mut world);

        let mut loaded = bare_world(1);
        restore(&mut loaded, &save).unwrap();
        let carried = loaded.resource::<ThingRegistry>().entity(carried_id).unwrap();
        assert!(is_spawned(&loaded, carried));
        assert_eq!(loaded.get::<StackCount>(carried).unwrap().0, 20);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        let mut world = bare_world(1);
        marked_table(&mut world);

        save_to_file(&mut world, &path).unwrap();
        let mut loaded = bare_world(1);
        load_from_file(&mut loaded, &path).unwrap();

        assert_eq!(capture(&mut loaded), capture(&mut world));
    }
}
