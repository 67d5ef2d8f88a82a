//! Order Lifecycle
//!
//! Placing, completing and tearing down construction orders over
//! structures and crafting work orders holding items.

use bevy_ecs::prelude::*;

use upgrade_events::{MaterialCount, OrderKind, Quality, UpgradeEventKind};

use crate::components::intent::UpgradeIntent;
use crate::components::order::{BillRef, ConstructionOrder, DestroyMode, OwningOrder, WorkOrder};
use crate::components::thing::{Spawned, ThingQuality};
use crate::components::world::{Cell, Position, ThingRegistry};
use crate::events::emit;
use crate::map::things::{
    despawn_thing, hold, is_spawned, place_near, position_of, release_at, spawn_refund, thing_id_of,
};
use crate::systems::intent;
use crate::systems::requirements::{compute_requirements, tier_scaled_work};

fn refund_of(materials: &[MaterialCount], fraction: f32) -> Vec<MaterialCount> {
    materials
        .iter()
        .map(|m| MaterialCount::new(m.def_name.clone(), (m.count as f32 * fraction).floor() as u32))
        .filter(|m| m.count > 0)
        .collect()
}

fn order_id(world: &World, order: Entity) -> u64 {
    thing_id_of(world, order).map(|id| id.0).unwrap_or(0)
}

/// Places a fresh construction order over `target` for its current tier.
///
/// An existing order of the target is cancelled first. Returns `None` if
/// the target has no quality or no position.
pub fn place_construction_order(world: &mut World, target: Entity) -> Option<Entity> {
    let stale = world
        .get_mut::<UpgradeIntent>(target)
        .and_then(|mut intent| intent.active_order.take());
    if let Some(stale) = stale {
        if world.get_entity(stale).is_some() {
            destroy_construction_order(world, stale, DestroyMode::Cancel);
        }
    }

    let quality = world.get::<ThingQuality>(target)?.0;
    let cell = position_of(world, target)?;
    let needed = compute_requirements(world, target);
    let work = tier_scaled_work(world, target);
    let snapshots = needed.iter().map(|l| l.snapshot()).collect();

    let id = world.resource_mut::<ThingRegistry>().allocate_id();
    let order = world
        .spawn((
            id,
            ConstructionOrder::new(target, quality, needed, work),
            Position(cell),
            Spawned,
        ))
        .id();
    world.resource_mut::<ThingRegistry>().register(id, order);

    if let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) {
        intent.active_order = Some(order);
    }

    tracing::debug!("Placed construction order {} for {:?} at {}", id.0, target, quality);
    emit(
        world,
        Some(target),
        UpgradeEventKind::OrderPlaced {
            order: OrderKind::Construction,
            order_id: id.0,
            for_quality: quality,
            requirements: snapshots,
        },
    );
    Some(order)
}

/// Tears down a construction order.
///
/// Delivered materials are refunded per `mode`. If the order was still
/// the target's active order and `mode` cancels intents, the target's
/// upgrade is cancelled.
pub fn destroy_construction_order(world: &mut World, order: Entity, mode: DestroyMode) {
    let Some(construction) = world.get::<ConstructionOrder>(order).cloned() else {
        return;
    };
    let target = construction.target;
    let id = order_id(world, order);
    let cell = position_of(world, order);

    let mut owned = false;
    if let Some(mut intent) = world.get_mut::<UpgradeIntent>(target) {
        if intent.active_order == Some(order) {
            intent.active_order = None;
            owned = true;
        }
    }

    despawn_thing(world, order);
    if let Some(cell) = cell {
        let refund = refund_of(&construction.delivered_materials(), mode.refund_fraction());
        spawn_refund(world, &refund, cell);
    }

    emit(
        world,
        Some(target),
        UpgradeEventKind::OrderDestroyed {
            order: OrderKind::Construction,
            order_id: id,
            reason: mode.reason(),
        },
    );

    if owned && mode.cancels_intent() && world.get_entity(target).is_some() {
        intent::cancel_upgrade(world, target);
    }
}

/// The desired tier and keep flag to re-apply after an order ends.
fn desired_of(world: &World, target: Entity) -> Option<(Quality, bool)> {
    world.get::<UpgradeIntent>(target).map(|i| (i.desired, i.keep))
}

fn reapply(world: &mut World, target: Entity, desired: Option<(Quality, bool)>) {
    let Some((desired, keep)) = desired else {
        return;
    };
    if world.get_entity(target).is_none() {
        return;
    }
    if let Err(e) = intent::set_desired_quality(world, target, desired, keep) {
        tracing::warn!("Could not re-apply upgrade target for {:?}: {}", target, e);
    }
}

/// Finishes a construction order: contents are used up, the target gains
/// one tier if still below its desired tier, and the desired tier is
/// applied again.
pub fn complete_construction(world: &mut World, order: Entity) {
    let Some(target) = world.get::<ConstructionOrder>(order).map(|o| o.target) else {
        return;
    };
    let desired = desired_of(world, target);

    let wanted = desired.map(|(q, _)| q).unwrap_or(Quality::MIN);
    let increased = world.get_mut::<ThingQuality>(target).and_then(|mut quality| {
        if quality.0 >= wanted {
            return None;
        }
        let from = quality.0;
        let next = from.next()?;
        quality.0 = next;
        Some((from, next))
    });
    if let Some((from, to)) = increased {
        tracing::info!("{:?} upgraded from {} to {}", target, from, to);
        emit(world, Some(target), UpgradeEventKind::QualityIncreased { from, to });
    }

    destroy_construction_order(world, order, DestroyMode::Complete);
    reapply(world, target, desired);
}

/// A failed construction attempt: half the contents are refunded and
/// the desired tier is applied again, placing a new order.
pub fn fail_construction(world: &mut World, order: Entity) {
    let Some(target) = world.get::<ConstructionOrder>(order).map(|o| o.target) else {
        return;
    };
    let desired = desired_of(world, target);
    destroy_construction_order(world, order, DestroyMode::FailConstruction);
    reapply(world, target, desired);
}

/// Creates a crafting order at `cell` holding `target`.
///
/// The target is taken off the floor; the order's work comes from the
/// target's tier-scaled work value.
pub fn create_work_order(
    world: &mut World,
    target: Entity,
    ingredients: Vec<MaterialCount>,
    cell: Cell,
    bill: Option<BillRef>,
    creator: Option<Entity>,
) -> Entity {
    let work = tier_scaled_work(world, target);
    hold(world, target);

    let id = world.resource_mut::<ThingRegistry>().allocate_id();
    let quality = world
        .get::<ThingQuality>(target)
        .map(|q| q.0)
        .unwrap_or_default();
    let order = world
        .spawn((
            id,
            WorkOrder {
                target,
                ingredients,
                work_left: work,
                work_total: work,
                bill,
                creator,
            },
            Position(cell),
            Spawned,
        ))
        .id();
    world.resource_mut::<ThingRegistry>().register(id, order);

    emit(
        world,
        Some(target),
        UpgradeEventKind::OrderPlaced {
            order: OrderKind::Crafting,
            order_id: id.0,
            for_quality: quality,
            requirements: Vec::new(),
        },
    );
    order
}

/// Tears down a crafting order and returns its target.
///
/// Consumed ingredients are never refunded. On `Complete` the target
/// stays held for the caller; in every other mode it is put back on the
/// floor where the order was.
pub fn destroy_work_order(world: &mut World, order: Entity, mode: DestroyMode) -> Option<Entity> {
    let work = world.get::<WorkOrder>(order).cloned()?;
    let target = work.target;
    let id = order_id(world, order);
    let cell = position_of(world, order)
        .or_else(|| work.creator.and_then(|c| position_of(world, c)));

    despawn_thing(world, order);
    emit(
        world,
        Some(target),
        UpgradeEventKind::OrderDestroyed {
            order: WorkOrder::KIND,
            order_id: id,
            reason: mode.reason(),
        },
    );

    if world.get_entity(target).is_none() {
        return None;
    }
    if mode != DestroyMode::Complete && !is_spawned(world, target) {
        if let Some(cell) = cell {
            if let Err(e) = place_near(world, target, cell) {
                tracing::warn!("Returned item dropped in place: {}", e);
                release_at(world, target, cell);
            }
        }
    }
    Some(target)
}
