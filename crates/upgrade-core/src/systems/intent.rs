//! Upgrade Intent State Machine
//!
//! The public mutation contract for structure upgrades. An intent is
//! Inactive, Scheduled (an order stands in for the structure and the
//! structure is marked) or Watching (target reached, held by `keep`).

use bevy_ecs::prelude::*;

use upgrade_events::{Quality, UpgradeEventKind};

use crate::components::intent::{IntentState, UpgradeIntent};
use crate::components::order::{ConstructionOrder, DestroyMode};
use crate::components::thing::{HitPoints, ThingQuality, UpgradableKind};
use crate::error::UpgradeError;
use crate::events::emit;
use crate::map::markers::UpgradeMarkers;
use crate::map::things::is_spawned;
use crate::systems::orders::{destroy_construction_order, place_construction_order};
use crate::systems::requirements::compute_requirements;
use crate::systems::tracker;

fn quality_of(world: &World, target: Entity) -> Option<Quality> {
    world.get::<ThingQuality>(target).map(|q| q.0)
}

fn is_marked(world: &World, target: Entity) -> bool {
    world
        .get_resource::<UpgradeMarkers>()
        .map(|m| m.has(target))
        .unwrap_or(false)
}

fn add_marker(world: &mut World, target: Entity) {
    if let Some(mut markers) = world.get_resource_mut::<UpgradeMarkers>() {
        markers.add(target);
    }
}

/// Asks for `target` to be upgraded to `desired`, optionally holding it
/// there.
///
/// Repeating the current (desired, keep) pair does nothing.
pub fn set_desired_quality(
    world: &mut World,
    target: Entity,
    desired: Quality,
    keep: bool,
) -> Result<(), UpgradeError> {
    let Some(entity) = world.get_entity(target) else {
        return Err(UpgradeError::MissingEntity(target));
    };
    if entity.get::<UpgradableKind>() != Some(&UpgradableKind::Structure) {
        return Err(UpgradeError::NotAStructure(target));
    }
    if !entity.contains::<ThingQuality>() {
        return Err(UpgradeError::NoQuality(target));
    }

    match world.get::<UpgradeIntent>(target) {
        Some(intent) if intent.targets(desired, keep) => return Ok(()),
        Some(_) => {}
        None => {
            world.entity_mut(target).insert(UpgradeIntent::new());
        }
    }

    apply_desired_quality(world, target, desired, keep);
    Ok(())
}

/// The transition behind [`set_desired_quality`], without the repeat
/// check.
fn apply_desired_quality(world: &mut World, target: Entity, desired: Quality, keep: bool) {
    let Some(current) = quality_of(world, target) else {
        return;
    };

    if current < desired {
        if let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) {
            intent.desired = desired;
            intent.keep = keep;
        }
        emit(world, Some(target), UpgradeEventKind::IntentScheduled { current, desired, keep });

        if !is_spawned(world, target) {
            tracing::debug!("{:?} not spawned; order deferred", target);
            if let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) {
                intent.marker_pending_spawn = true;
            }
            return;
        }

        place_construction_order(world, target);
        add_marker(world, target);
        tracker::add_component(world, target);
    } else if keep {
        drop_order_and_marker(world, target);
        if let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) {
            intent.desired = desired;
            intent.keep = keep;
            intent.marker_pending_spawn = false;
        }
        tracing::debug!("{:?} holding at {}", target, desired);
        emit(world, Some(target), UpgradeEventKind::IntentWatching { desired });
        tracker::add_component(world, target);
    } else {
        cancel_upgrade(world, target);
    }
}

/// Withdraws a standing order and marker without touching the intent.
fn drop_order_and_marker(world: &mut World, target: Entity) {
    let order = world
        .get_mut::<UpgradeIntent>(target)
        .and_then(|mut intent| intent.active_order.take());
    if let Some(mut markers) = world.get_resource_mut::<UpgradeMarkers>() {
        markers.remove_silently(target);
    }
    if let Some(order) = order {
        destroy_construction_order(world, order, DestroyMode::Cancel);
    }
}

/// Resets the intent, removes its order and marker and stops tracking it.
///
/// While `skip_marker_removal` is set the marker is left to whoever is
/// already removing it.
pub fn cancel_upgrade(world: &mut World, target: Entity) {
    let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) else {
        return;
    };
    intent.reset();
    let order = intent.active_order.take();
    let skip_marker = intent.skip_marker_removal;

    if !skip_marker {
        if let Some(mut markers) = world.get_resource_mut::<UpgradeMarkers>() {
            markers.remove_silently(target);
        }
    }
    tracker::remove_component(world, target);

    if let Some(order) = order {
        destroy_construction_order(world, order, DestroyMode::Cancel);
    }
    tracing::debug!("Upgrade of {:?} cancelled", target);
    emit(world, Some(target), UpgradeEventKind::IntentCancelled);
}

/// Whether the intent still needs tracking.
///
/// Marked structures are active; a stale order is regenerated for the
/// current tier on the way. A marker without a live order, or an order
/// without a marker, is repaired by cancelling.
pub fn is_still_active(world: &mut World, target: Entity) -> bool {
    let Some(intent) = world.get::<UpgradeIntent>(target).cloned() else {
        return false;
    };
    let quality = quality_of(world, target);
    let order = intent
        .active_order
        .and_then(|o| world.get::<ConstructionOrder>(o).map(|c| c.generated_for_quality));

    if is_marked(world, target) {
        let Some(generated_for) = order else {
            tracing::warn!("{:?} is marked but has no live order; cancelling", target);
            emit(
                world,
                Some(target),
                UpgradeEventKind::Repaired {
                    detail: "marker without order".into(),
                },
            );
            cancel_upgrade(world, target);
            return false;
        };
        if let Some(now) = quality.filter(|q| *q != generated_for) {
            tracing::debug!("Order for {:?} was made for {}, now {}", target, generated_for, now);
            emit(world, Some(target), UpgradeEventKind::OrderRegenerated { was: generated_for, now });
            place_construction_order(world, target);
        }
        return true;
    }

    if intent.active_order.is_some() {
        tracing::warn!("{:?} has an order but no marker; cancelling", target);
        emit(
            world,
            Some(target),
            UpgradeEventKind::Repaired {
                detail: "order without marker".into(),
            },
        );
        cancel_upgrade(world, target);
        return false;
    }

    if intent.keep {
        return true;
    }
    quality.map(|q| q < intent.desired).unwrap_or(false)
}

/// Re-triggers a held intent whose structure fell below its target.
///
/// Only unmarked, fully repaired structures are re-triggered.
pub fn check_and_do_upgrade(world: &mut World, target: Entity) {
    let Some(intent) = world.get::<UpgradeIntent>(target).cloned() else {
        return;
    };
    if is_marked(world, target) || !intent.keep {
        return;
    }
    let healthy = world.get::<HitPoints>(target).map(|hp| hp.is_full()).unwrap_or(true);
    let below = quality_of(world, target).map(|q| q < intent.desired).unwrap_or(false);
    if healthy && below {
        tracing::debug!("Re-triggering upgrade of {:?} to {}", target, intent.desired);
        apply_desired_quality(world, target, intent.desired, intent.keep);
    }
}

/// Hook for a marker removed from outside the engine.
pub fn notify_marker_removed(world: &mut World, target: Entity) {
    let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) else {
        return;
    };
    intent.skip_marker_removal = true;
    cancel_upgrade(world, target);
    if let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) {
        intent.skip_marker_removal = false;
    }
}

/// Hook for a structure about to be destroyed.
pub fn notify_object_destroyed(world: &mut World, target: Entity) {
    let order = world
        .get_mut::<UpgradeIntent>(target)
        .and_then(|mut intent| intent.active_order.take());
    if let Some(order) = order {
        destroy_construction_order(world, order, DestroyMode::Kill);
    }
    cancel_upgrade(world, target);
}

/// Hook for a structure entering the world.
///
/// Refreshes an existing order's requirements and creates a deferred
/// order and marker.
pub fn post_spawn_setup(world: &mut World, target: Entity) {
    let Some(intent) = world.get::<UpgradeIntent>(target).cloned() else {
        return;
    };

    if let Some(order) = intent.active_order {
        if world.get::<ConstructionOrder>(order).is_some() {
            let needed = compute_requirements(world, target);
            if let Some(mut construction) = world.get_mut::<ConstructionOrder>(order) {
                construction.needed = needed;
            }
        }
    }

    if !intent.marker_pending_spawn {
        return;
    }
    if let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) {
        intent.marker_pending_spawn = false;
    }
    let below = quality_of(world, target).map(|q| q < intent.desired).unwrap_or(false);
    if below {
        place_construction_order(world, target);
        add_marker(world, target);
        tracker::add_component(world, target);
    }
}

/// Observable state of the structure's upgrade.
pub fn intent_state(world: &World, target: Entity) -> IntentState {
    let Some(intent) = world.get::<UpgradeIntent>(target) else {
        return IntentState::Inactive;
    };
    let quality = quality_of(world, target);
    if intent.active_order.is_some() || intent.marker_pending_spawn {
        return IntentState::Scheduled;
    }
    match quality {
        Some(q) if q < intent.desired => IntentState::Scheduled,
        Some(_) if intent.keep => IntentState::Watching,
        _ => IntentState::Inactive,
    }
}

/// Text shown when inspecting a marked structure.
pub fn inspect_string(world: &World, target: Entity) -> Option<String> {
    if !is_marked(world, target) {
        return None;
    }
    let desired = world.get::<UpgradeIntent>(target)?.desired;
    Some(format!("Upgrading to {}", desired))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::thing::ThingDef;
    use crate::components::world::Cell;
    use crate::map::markers::remove_marker;
    use crate::map::things::{spawn_thing, ThingSpawn};
    use crate::setup::bare_world;
    use crate::systems::orders::complete_construction;
    use crate::systems::tracker::ActiveIntentTracker;

    fn table(world: &mut World, quality: Quality) -> Entity {
        spawn_thing(
            world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), quality, Cell::new(4, 4)),
        )
    }

    fn order_of(world: &World, target: Entity) -> Option<Entity> {
        world.get::<UpgradeIntent>(target).and_then(|i| i.active_order)
    }

    fn tracked(world: &World, target: Entity) -> bool {
        world.resource::<ActiveIntentTracker>().contains(target)
    }

    #[test]
    fn test_schedule_places_order_and_marker() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);

        set_desired_quality(&mut world, table, Quality::Good, false).unwrap();

        assert!(order_of(&world, table).is_some());
        assert!(world.resource::<UpgradeMarkers>().has(table));
        assert!(tracked(&world, table));
        assert_eq!(intent_state(&world, table), IntentState::Scheduled);
        assert_eq!(inspect_string(&world, table).as_deref(), Some("Upgrading to good"));
    }

    #[test]
    fn test_repeat_request_is_noop() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);

        set_desired_quality(&mut world, table, Quality::Good, false).unwrap();
        let order = order_of(&world, table);
        set_desired_quality(&mut world, table, Quality::Good, false).unwrap();

        assert_eq!(order_of(&world, table), order);
        assert!(world.get_entity(order.unwrap()).is_some());
    }

    #[test]
    fn test_items_are_rejected() {
        let mut world = bare_world(1);
        let sword = spawn_thing(
            &mut world,
            ThingSpawn::item(ThingDef::new("longsword").with_stuff("steel"), Quality::Poor, Cell::new(1, 1)),
        );
        assert_eq!(
            set_desired_quality(&mut world, sword, Quality::Good, false),
            Err(UpgradeError::NotAStructure(sword))
        );
    }

    #[test]
    fn test_completion_without_keep_ends_intent() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        set_desired_quality(&mut world, table, Quality::Normal, false).unwrap();

        let order = order_of(&world, table).unwrap();
        complete_construction(&mut world, order);

        assert_eq!(world.get::<ThingQuality>(table).unwrap().0, Quality::Normal);
        assert!(world.get_entity(order).is_none());
        assert!(order_of(&world, table).is_none());
        assert!(!world.resource::<UpgradeMarkers>().has(table));
        assert!(!is_still_active(&mut world, table));
        assert_eq!(intent_state(&world, table), IntentState::Inactive);
    }

    #[test]
    fn test_keep_climbs_to_target_then_watches() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        set_desired_quality(&mut world, table, Quality::Legendary, true).unwrap();

        let mut completions = 0;
        while let Some(order) = order_of(&world, table) {
            complete_construction(&mut world, order);
            completions += 1;
            assert!(completions <= 5);
        }

        assert_eq!(completions, 5);
        assert_eq!(world.get::<ThingQuality>(table).unwrap().0, Quality::Legendary);
        assert_eq!(intent_state(&world, table), IntentState::Watching);
        assert!(tracked(&world, table));
        assert!(is_still_active(&mut world, table));
    }

    #[test]
    fn test_keep_retriggers_after_drop() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Good);
        set_desired_quality(&mut world, table, Quality::Good, true).unwrap();
        assert_eq!(intent_state(&world, table), IntentState::Watching);

        world.get_mut::<ThingQuality>(table).unwrap().0 = Quality::Normal;
        check_and_do_upgrade(&mut world, table);
        assert!(order_of(&world, table).is_some());
        assert!(world.resource::<UpgradeMarkers>().has(table));
    }

    #[test]
    fn test_damaged_structure_not_retriggered() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Good);
        set_desired_quality(&mut world, table, Quality::Good, true).unwrap();

        world.get_mut::<ThingQuality>(table).unwrap().0 = Quality::Normal;
        world.get_mut::<HitPoints>(table).unwrap().current = 10;
        check_and_do_upgrade(&mut world, table);
        assert!(order_of(&world, table).is_none());
    }

    #[test]
    fn test_external_marker_removal_cancels() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        set_desired_quality(&mut world, table, Quality::Good, false).unwrap();
        let order = order_of(&world, table).unwrap();

        assert!(remove_marker(&mut world, table));

        assert!(world.get_entity(order).is_none());
        let intent = world.get::<UpgradeIntent>(table).unwrap();
        assert_eq!(intent.desired, Quality::MIN);
        assert!(!intent.skip_marker_removal);
        assert!(!tracked(&world, table));
    }

    #[test]
    fn test_stale_order_regenerated() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        set_desired_quality(&mut world, table, Quality::Excellent, false).unwrap();
        let order = order_of(&world, table).unwrap();

        world.get_mut::<ThingQuality>(table).unwrap().0 = Quality::Normal;
        assert!(is_still_active(&mut world, table));

        let fresh = order_of(&world, table).unwrap();
        assert_ne!(fresh, order);
        assert!(world.get_entity(order).is_none());
        let construction = world.get::<ConstructionOrder>(fresh).unwrap();
        assert_eq!(construction.generated_for_quality, Quality::Normal);
    }

    #[test]
    fn test_order_without_marker_repaired() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        set_desired_quality(&mut world, table, Quality::Good, false).unwrap();
        let order = order_of(&world, table).unwrap();

        world.resource_mut::<UpgradeMarkers>().remove_silently(table);
        assert!(!is_still_active(&mut world, table));
        assert!(world.get_entity(order).is_none());
        assert_eq!(intent_state(&world, table), IntentState::Inactive);
    }

    #[test]
    fn test_unspawned_target_defers_order() {
        let mut world = bare_world(1);
        let table = spawn_thing(
            &mut world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), Quality::Poor, Cell::new(4, 4))
                .unspawned(),
        );

        set_desired_quality(&mut world, table, Quality::Normal, false).unwrap();
        assert!(order_of(&world, table).is_none());
        assert!(!world.resource::<UpgradeMarkers>().has(table));
        assert_eq!(intent_state(&world, table), IntentState::Scheduled);

        crate::map::things::release_at(&mut world, table, Cell::new(4, 4));
        assert!(order_of(&world, table).is_some());
        assert!(world.resource::<UpgradeMarkers>().has(table));
    }

    #[test]
    fn test_lowering_target_with_keep_withdraws_order() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Normal);
        set_desired_quality(&mut world, table, Quality::Masterwork, false).unwrap();
        let order = order_of(&world, table).unwrap();

        set_desired_quality(&mut world, table, Quality::Poor, true).unwrap();
        assert!(world.get_entity(order).is_none());
        assert!(!world.resource::<UpgradeMarkers>().has(table));
        assert_eq!(intent_state(&world, table), IntentState::Watching);
    }

    #[test]
    fn test_destroying_structure_tears_down() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        set_desired_quality(&mut world, table, Quality::Good, false).unwrap();
        let order = order_of(&world, table).unwrap();

        crate::map::things::destroy_thing(&mut world, table);
        assert!(world.get_entity(table).is_none());
        assert!(world.get_entity(order).is_none());
        assert!(!world.resource::<UpgradeMarkers>().has(table));
        assert!(!tracked(&world, table));
    }
}
