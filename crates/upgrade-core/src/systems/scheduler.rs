//! Job Scheduler
//!
//! Hands idle workers upgrade jobs. Construction orders come first, then
//! item upgrade bills at workbenches.

use bevy_ecs::prelude::*;
use thiserror::Error;

use upgrade_events::{Quality, UpgradeEventKind};

use crate::components::bench::{UpgradeBill, Workbench};
use crate::components::order::{ConstructionOrder, WorkOrder};
use crate::components::thing::{Burning, Forbidden, PlayerOwned, Spawned, ThingQuality, UpgradableKind};
use crate::components::worker::Worker;
use crate::components::world::{Cell, Position, WorldState};
use crate::config::UpgradeSettings;
use crate::events::emit;
use crate::map::regions::RegionGrid;
use crate::map::reservations::Reservations;
use crate::map::things::{position_of, thing_id_of};
use crate::systems::allocation::{allocate, AllocationFailure};
use crate::systems::labor::{start_job, ConstructJob, CraftJob, CurrentJob, LaborTask};
use crate::systems::requirements::compute_requirements;
use crate::systems::search::{find_candidates, SearchRequest};

/// Ticks a bill rests after an attempt that found nothing to do.
pub const RECHECK_TICKS: u64 = 500;

/// Why an attempt produced no job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoJob {
    #[error("no reachable construction order")]
    NoOrder,
    #[error("no workbench with a live bill")]
    NoBench,
    #[error("no item to upgrade")]
    NoItem,
    #[error(transparent)]
    Materials(#[from] AllocationFailure),
}

/// System: give every idle worker the first upgrade job it can start
pub fn assign_upgrade_jobs(world: &mut World) {
    let mut query = world.query_filtered::<Entity, (With<Worker>, With<Position>, Without<CurrentJob>)>();
    let mut idle: Vec<Entity> = query.iter(world).collect();
    idle.sort();

    for worker in idle {
        match find_construction_job(world, worker) {
            Ok(task) => {
                if start_job(world, worker, task) {
                    continue;
                }
            }
            Err(reason) => tracing::trace!("{:?}: {}", worker, reason),
        }
        match find_item_upgrade_job(world, worker) {
            Ok(task) => {
                start_job(world, worker, task);
            }
            Err(reason) => tracing::trace!("{:?}: {}", worker, reason),
        }
    }
}

fn reachable(world: &World, worker: Entity, to: Cell) -> bool {
    let (Some(from), Some(stats)) = (position_of(world, worker), world.get::<Worker>(worker)) else {
        return false;
    };
    world.resource::<RegionGrid>().can_reach(from, to, stats)
}

/// Nearest reachable construction order the worker can deliver to or build.
pub fn find_construction_job(world: &mut World, worker: Entity) -> Result<LaborTask, NoJob> {
    let origin = position_of(world, worker).ok_or(NoJob::NoOrder)?;

    let mut query =
        world.query_filtered::<(Entity, &ConstructionOrder, &Position), (With<Spawned>, Without<Forbidden>)>();
    let mut orders: Vec<(i32, Entity, Entity, Cell)> = query
        .iter(world)
        .map(|(entity, order, pos)| (pos.0.distance_sq(origin), entity, order.target, pos.0))
        .collect();
    orders.sort_by_key(|(d, entity, _, _)| (*d, *entity));

    let mut last_failure = NoJob::NoOrder;
    for (_, order, target, cell) in orders {
        if world.get_entity(target).is_none() {
            continue;
        }
        // Someone else's order, or behind a wall.
        if !world.resource::<Reservations>().can_reserve(worker, order) || !reachable(world, worker, cell) {
            continue;
        }

        let remaining = match world.get::<ConstructionOrder>(order) {
            Some(o) => o.remaining_materials(),
            None => continue,
        };
        // Everything delivered: straight to building.
        if remaining.is_empty() {
            return Ok(LaborTask::Construct(ConstructJob::new(order, Vec::new())));
        }

        let candidates = find_candidates(world, &SearchRequest::new(worker, cell));
        match allocate(&remaining, &candidates, &[target]) {
            Ok(assignments) => return Ok(LaborTask::Construct(ConstructJob::new(order, assignments))),
            Err(failure) => last_failure = failure.into(),
        }
    }
    Err(last_failure)
}

/// Highest tier (exclusive) items at `bench` may be raised from.
fn item_tier_cap(world: &World, bench: Entity) -> Quality {
    let (mut cap, limit_to_bench) = world
        .get_resource::<UpgradeSettings>()
        .map(|s| (s.limits.max_quality, s.limits.limit_item_quality_to_workbench))
        .unwrap_or((Quality::MAX, true));
    if limit_to_bench {
        if let Some(bench_quality) = world.get::<ThingQuality>(bench) {
            cap = cap.min(bench_quality.0);
        }
    }
    cap
}

fn bench_usable(world: &World, worker: Entity, bench: Entity, cell: Cell) -> bool {
    let Some(entity) = world.get_entity(bench) else {
        return false;
    };
    if !entity.contains::<Spawned>() || entity.contains::<Burning>() || entity.contains::<Forbidden>() {
        return false;
    }
    if !entity.get::<Workbench>().map(|b| b.usable).unwrap_or(false) {
        return false;
    }
    world.resource::<Reservations>().can_reserve(worker, bench) && reachable(world, worker, cell)
}

/// An unfinished work order near the bench the worker could pick up again.
fn find_reusable_order(world: &mut World, worker: Entity, anchor: Cell, radius: f32) -> Option<(Entity, Entity)> {
    let mut query = world.query_filtered::<(Entity, &WorkOrder, &Position), (With<Spawned>, Without<Forbidden>)>();
    let mut orders: Vec<(i32, Entity, Entity)> = query
        .iter(world)
        .map(|(entity, order, pos)| (pos.0.distance_sq(anchor), entity, order.target))
        .filter(|(d, _, _)| (*d as f32) < radius * radius)
        .collect();
    orders.sort_by_key(|(d, entity, _)| (*d, *entity));

    orders.into_iter().find_map(|(_, order, target)| {
        let cell = position_of(world, order)?;
        let free = world.resource::<Reservations>().can_reserve(worker, order);
        (free && world.get_entity(target).is_some() && reachable(world, worker, cell)).then_some((order, target))
    })
}

fn postpone_bill(world: &mut World, bench: Entity, bill_id: u64) {
    let tick = world.resource::<WorldState>().current_tick;
    if let Some(mut workbench) = world.get_mut::<Workbench>(bench) {
        if let Some(bill) = workbench.bill_mut(bill_id) {
            bill.next_tick_to_search = tick + RECHECK_TICKS;
        }
    }
}

/// First item upgrade job any reachable bench offers.
pub fn find_item_upgrade_job(world: &mut World, worker: Entity) -> Result<LaborTask, NoJob> {
    let tick = world.resource::<WorldState>().current_tick;
    let origin = position_of(world, worker).ok_or(NoJob::NoBench)?;
    let skill = world.get::<Worker>(worker).map(|w| w.crafting_skill).unwrap_or(0);

    let mut query = world.query::<(Entity, &Workbench)>();
    let mut benches: Vec<(i32, Entity, Cell, Vec<UpgradeBill>)> = query
        .iter(world)
        .map(|(entity, bench)| {
            let bills: Vec<UpgradeBill> = bench
                .bills
                .iter()
                .filter(|b| b.should_do_now(tick) && b.min_skill <= skill)
                .cloned()
                .collect();
            (bench.interaction_cell.distance_sq(origin), entity, bench.interaction_cell, bills)
        })
        .filter(|bench| !bench.3.is_empty())
        .collect();
    benches.sort_by_key(|(d, entity, _, _)| (*d, *entity));

    let mut last_failure = NoJob::NoBench;
    for (_, bench, cell, bills) in benches {
        if !bench_usable(world, worker, bench, cell) {
            continue;
        }
        for bill in bills {
            // Half-done work at this bench goes first.
            if let Some((order, target)) = find_reusable_order(world, worker, cell, bill.search_radius) {
                return Ok(LaborTask::Craft(CraftJob::resume(bench, bill.id, order, target)));
            }
            match find_item_for_bill(world, worker, bench, cell, &bill) {
                Ok(task) => return Ok(task),
                Err(reason) => {
                    postpone_bill(world, bench, bill.id);
                    if let NoJob::Materials(failure) = &reason {
                        let worker_id = thing_id_of(world, worker).map(|id| id.0).unwrap_or(0);
                        emit(
                            world,
                            Some(bench),
                            UpgradeEventKind::NoJobAvailable {
                                worker_id,
                                reason: failure.to_string(),
                            },
                        );
                    }
                    last_failure = reason;
                }
            }
        }
    }
    Err(last_failure)
}

fn find_item_for_bill(
    world: &mut World,
    worker: Entity,
    bench: Entity,
    cell: Cell,
    bill: &UpgradeBill,
) -> Result<LaborTask, NoJob> {
    let cap = item_tier_cap(world, bench);
    let request = SearchRequest::new(worker, cell)
        .with_radius(bill.search_radius)
        .with_filter(&bill.filter);
    let items: Vec<Entity> = find_candidates(world, &request)
        .into_iter()
        .filter(|c| c.quality.is_some_and(|q| q < cap) && c.stack_count <= 1)
        .map(|c| c.entity)
        .filter(|e| {
            world.get::<UpgradableKind>(*e) == Some(&UpgradableKind::Item) && world.get::<PlayerOwned>(*e).is_some()
        })
        .collect();
    if items.is_empty() {
        return Err(NoJob::NoItem);
    }

    // Ingredients ignore the bill filter.
    let ingredients = find_candidates(world, &SearchRequest::new(worker, cell).with_radius(bill.search_radius));
    let mut last_failure = NoJob::NoItem;
    for item in items {
        let requirements = compute_requirements(world, item);
        match allocate(&requirements, &ingredients, &[item]) {
            Ok(assignments) => return Ok(LaborTask::Craft(CraftJob::new(bench, bill.id, item, assignments))),
            Err(failure) => last_failure = failure.into(),
        }
    }
    Err(last_failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::intent::UpgradeIntent;
    use crate::components::thing::{StackCount, ThingDef};
    use crate::components::world::ThingRegistry;
    use crate::events::TickEvents;
    use crate::map::regions::build_region_index;
    use crate::map::things::{spawn_thing, ThingSpawn};
    use crate::setup::bare_world;
    use crate::systems::intent::set_desired_quality;
    use crate::systems::orders::create_work_order;

    fn worker(world: &mut World, cell: Cell) -> Entity {
        let id = world.resource_mut::<ThingRegistry>().allocate_id();
        world.spawn((id, Worker::new("Cy"), Position(cell))).id()
    }

    fn smithy(world: &mut World, quality: Quality) -> Entity {
        let bench = spawn_thing(
            world,
            ThingSpawn::structure(ThingDef::new("smithy").with_stuff("steel"), quality, Cell::new(20, 10)),
        );
        world
            .entity_mut(bench)
            .insert(Workbench::new(Cell::new(20, 11)).with_bill(UpgradeBill::new(1)));
        bench
    }

    fn sword(world: &mut World, quality: Quality) -> Entity {
        spawn_thing(
            world,
            ThingSpawn::item(ThingDef::new("longsword").with_stuff("steel"), quality, Cell::new(16, 12)),
        )
    }

    fn steel(world: &mut World, stacks: u32) {
        for i in 0..stacks {
            spawn_thing(world, ThingSpawn::material("steel", 75, Cell::new(22 + i as i32, 14)));
        }
    }

    fn current_job(world: &World, worker: Entity) -> Option<&LaborTask> {
        world.get::<CurrentJob>(worker).map(|j| &j.0)
    }

    #[test]
    fn test_item_job_targets_item_first() {
        let mut world = bare_world(1);
        smithy(&mut world, Quality::Legendary);
        let sword = sword(&mut world, Quality::Poor);
        steel(&mut world, 3);
        let worker = worker(&mut world, Cell::new(18, 18));
        build_region_index(&mut world);

        assign_upgrade_jobs(&mut world);

        match current_job(&world, worker) {
            Some(LaborTask::Craft(job)) => assert_eq!(job.target, sword),
            other => panic!("expected a crafting job, got {:?}", other),
        }
        assert!(world.resource::<Reservations>().claimant_of(sword) == Some(worker));
    }

    #[test]
    fn test_construction_preferred_over_items() {
        let mut world = bare_world(1);
        smithy(&mut world, Quality::Legendary);
        sword(&mut world, Quality::Poor);
        steel(&mut world, 3);
        let table = spawn_thing(
            &mut world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), Quality::Poor, Cell::new(12, 12)),
        );
        set_desired_quality(&mut world, table, Quality::Normal, false).unwrap();
        let order = world.get::<UpgradeIntent>(table).unwrap().active_order.unwrap();
        let worker = worker(&mut world, Cell::new(18, 18));
        build_region_index(&mut world);

        assign_upgrade_jobs(&mut world);

        match current_job(&world, worker) {
            Some(LaborTask::Construct(job)) => assert_eq!(job.order, order),
            other => panic!("expected a construction job, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_ingredients_postpones_bill() {
        let mut world = bare_world(1);
        world.resource_mut::<WorldState>().current_tick = 100;
        let bench = smithy(&mut world, Quality::Legendary);
        sword(&mut world, Quality::Poor);
        steel(&mut world, 1);
        let worker = worker(&mut world, Cell::new(18, 18));
        build_region_index(&mut world);

        assign_upgrade_jobs(&mut world);

        assert!(current_job(&world, worker).is_none());
        let bill = world.get::<Workbench>(bench).unwrap().bill(1).unwrap();
        assert_eq!(bill.next_tick_to_search, 100 + RECHECK_TICKS);
        let events = world.resource::<TickEvents>();
        assert_eq!(events.of_kind("no_job_available").count(), 1);

        // Resting bills are skipped without another event.
        assign_upgrade_jobs(&mut world);
        assert_eq!(world.resource::<TickEvents>().of_kind("no_job_available").count(), 1);
    }

    #[test]
    fn test_bench_quality_caps_items() {
        let mut world = bare_world(1);
        let bench = smithy(&mut world, Quality::Normal);
        sword(&mut world, Quality::Normal);
        steel(&mut world, 4);
        let worker = worker(&mut world, Cell::new(18, 18));
        build_region_index(&mut world);

        assert_eq!(item_tier_cap(&world, bench), Quality::Normal);
        assert_eq!(find_item_upgrade_job(&mut world, worker).unwrap_err(), NoJob::NoItem);
    }

    #[test]
    fn test_unfinished_order_is_resumed() {
        let mut world = bare_world(1);
        let bench = smithy(&mut world, Quality::Legendary);
        let sword = sword(&mut world, Quality::Poor);
        let order = create_work_order(&mut world, sword, Vec::new(), Cell::new(20, 11), None, None);
        let worker = worker(&mut world, Cell::new(18, 18));
        build_region_index(&mut world);

        match find_item_upgrade_job(&mut world, worker) {
            Ok(LaborTask::Craft(job)) => {
                assert_eq!(job.order, Some(order));
                assert_eq!(job.bench, bench);
            }
            other => panic!("expected a resumed crafting job, got {:?}", other),
        }
    }

    #[test]
    fn test_stacked_items_are_not_upgraded() {
        let mut world = bare_world(1);
        smithy(&mut world, Quality::Legendary);
        let sword = sword(&mut world, Quality::Poor);
        world.entity_mut(sword).insert(StackCount(3));
        steel(&mut world, 3);
        let worker = worker(&mut world, Cell::new(18, 18));
        build_region_index(&mut world);

        assert_eq!(find_item_upgrade_job(&mut world, worker).unwrap_err(), NoJob::NoItem);
        assert!(world.resource::<Reservations>().claimant_of(sword).is_none());
    }
}
