//! Crafting Upgrade Job
//!
//! Fetch the item and its ingredients to a bench, fold them into a work
//! order, work it off, raise the item one tier and store it.

use bevy_ecs::prelude::*;
use std::collections::VecDeque;

use upgrade_events::{JobCondition, MaterialCount, OrderKind, UpgradeEventKind};

use crate::components::bench::{StoreMode, Workbench};
use crate::components::order::{BillRef, DestroyMode, OwningOrder, WorkOrder};
use crate::components::thing::{Burning, Forbidden, Spawned, StackCount, ThingDef, ThingQuality};
use crate::components::worker::Worker;
use crate::components::world::Cell;
use crate::events::emit;
use crate::map::reservations::Reservations;
use crate::map::storage::find_store_cell;
use crate::map::things::{
    despawn_thing, hold, is_spawned, place_near, position_of, release_at, take_from_stack, thing_id_of,
};
use crate::systems::allocation::Assignment;
use crate::systems::orders::{create_work_order, destroy_work_order};

use super::{drop_carried, move_worker_toward, JobDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CraftStage {
    /// Walking to the next thing to fetch.
    Traveling,
    /// Picking the next thing up.
    CollectingIngredients,
    /// Carrying to the bench and putting down.
    AtBench,
    MaterializeWorkOrder,
    PerformingWork,
    Completing,
    /// Carrying the finished item to a stockpile.
    StoringProduct,
}

#[derive(Debug, Clone)]
pub struct CraftJob {
    pub bench: Entity,
    pub bill_id: u64,
    /// The item being upgraded.
    pub target: Entity,
    /// Work order this job continues, if any.
    pub order: Option<Entity>,
    pub stage: CraftStage,
    queue: VecDeque<Assignment>,
    /// Stacks put down at the bench so far.
    placed: Vec<Entity>,
    carried: Option<Entity>,
    store_cell: Option<Cell>,
    resumed: bool,
}

impl CraftJob {
    /// A fresh upgrade: the item is fetched first, then `ingredients`.
    pub fn new(bench: Entity, bill_id: u64, target: Entity, ingredients: Vec<Assignment>) -> Self {
        let mut queue = VecDeque::with_capacity(ingredients.len() + 1);
        queue.push_back(Assignment { entity: target, count: 1 });
        queue.extend(ingredients.into_iter().filter(|a| a.count > 0));
        Self {
            bench,
            bill_id,
            target,
            order: None,
            stage: CraftStage::Traveling,
            queue,
            placed: Vec::new(),
            carried: None,
            store_cell: None,
            resumed: false,
        }
    }

    /// Continues an existing work order; it is carried to the bench
    /// instead of collecting ingredients.
    pub fn resume(bench: Entity, bill_id: u64, order: Entity, target: Entity) -> Self {
        let mut queue = VecDeque::with_capacity(1);
        queue.push_back(Assignment { entity: order, count: 1 });
        Self {
            bench,
            bill_id,
            target,
            order: Some(order),
            stage: CraftStage::Traveling,
            queue,
            placed: Vec::new(),
            carried: None,
            store_cell: None,
            resumed: true,
        }
    }

    fn interaction_cell(&self, world: &World) -> Option<Cell> {
        world.get::<Workbench>(self.bench).map(|b| b.interaction_cell)
    }

    fn store_mode(&self, world: &World) -> StoreMode {
        world
            .get::<Workbench>(self.bench)
            .and_then(|b| b.bill(self.bill_id))
            .map(|bill| bill.store_mode)
            .unwrap_or(StoreMode::DropOnFloor)
    }

    fn travel(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let Some(next) = self.queue.front() else {
            self.stage = CraftStage::AtBench;
            return None;
        };
        let Some(cell) = position_of(world, next.entity) else {
            return Some(JobCondition::Incompletable);
        };
        if move_worker_toward(world, worker, cell) {
            self.stage = CraftStage::CollectingIngredients;
        }
        None
    }

    fn collect(&mut self, world: &mut World) -> Option<JobCondition> {
        let Some(next) = self.queue.pop_front() else {
            self.stage = CraftStage::AtBench;
            return None;
        };
        let usable = world
            .get_entity(next.entity)
            .map(|e| e.contains::<Spawned>() && !e.contains::<Forbidden>())
            .unwrap_or(false);
        if !usable {
            tracing::debug!("Ingredient {:?} vanished before pickup", next.entity);
            return Some(JobCondition::Incompletable);
        }

        // Only a single item can be raised a tier.
        let stacked = world.get::<StackCount>(next.entity).is_some_and(|c| c.0 > 1);
        if next.entity == self.target && stacked {
            tracing::debug!("{:?} is a stack, not a single item", next.entity);
            return Some(JobCondition::Incompletable);
        }

        let taken = if next.entity != self.target && world.get::<StackCount>(next.entity).is_some() {
            take_from_stack(world, next.entity, next.count)
        } else {
            hold(world, next.entity);
            Some(next.entity)
        };
        let Some(taken) = taken else {
            return Some(JobCondition::Incompletable);
        };
        self.carried = Some(taken);
        self.stage = CraftStage::AtBench;
        None
    }

    fn deliver_to_bench(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let cell = self.interaction_cell(world)?;
        if !move_worker_toward(world, worker, cell) {
            return None;
        }
        if let Some(carried) = self.carried.take() {
            release_at(world, carried, cell);
            if let Some(mut reservations) = world.get_resource_mut::<Reservations>() {
                reservations.reserve(worker, carried);
            }
            if Some(carried) != self.order {
                self.placed.push(carried);
            }
        }
        self.stage = if self.queue.is_empty() {
            CraftStage::MaterializeWorkOrder
        } else {
            CraftStage::Traveling
        };
        None
    }

    fn materialize(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        if self.order.is_some() {
            self.stage = CraftStage::PerformingWork;
            return None;
        }
        let cell = self.interaction_cell(world)?;

        // Fold the placed stacks into per-material totals.
        let mut ingredients: Vec<MaterialCount> = Vec::new();
        for stack in std::mem::take(&mut self.placed) {
            if stack == self.target {
                continue;
            }
            let def = world.get::<ThingDef>(stack).map(|d| d.def_name.clone());
            let count = world.get::<StackCount>(stack).map(|c| c.0).unwrap_or(0);
            if let Some(def) = def {
                match ingredients.iter_mut().find(|m| m.def_name == def) {
                    Some(existing) => existing.count += count,
                    None => ingredients.push(MaterialCount::new(def, count)),
                }
            }
            despawn_thing(world, stack);
        }

        let bill = Some(BillRef {
            bench: self.bench,
            bill_id: self.bill_id,
        });
        let order = create_work_order(world, self.target, ingredients, cell, bill, Some(worker));
        if let Some(mut reservations) = world.get_resource_mut::<Reservations>() {
            reservations.reserve(worker, order);
        }
        self.order = Some(order);
        self.stage = CraftStage::PerformingWork;
        None
    }

    fn perform(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let order = self.order?;
        let speed = world.get::<Worker>(worker).map(|w| w.crafting_speed).unwrap_or(0.0);
        let Some(mut work) = world.get_mut::<WorkOrder>(order) else {
            return Some(JobCondition::Incompletable);
        };
        if work.apply_work(speed) {
            self.stage = CraftStage::Completing;
        }
        None
    }

    fn complete(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let order = self.order.take()?;
        let Some(target) = destroy_work_order(world, order, DestroyMode::Complete) else {
            return Some(JobCondition::Incompletable);
        };

        let increased = world.get_mut::<ThingQuality>(target).and_then(|mut quality| {
            let from = quality.0;
            let next = from.next()?;
            quality.0 = next;
            Some((from, next))
        });
        if let Some((from, to)) = increased {
            tracing::info!("{:?} upgraded from {} to {}", target, from, to);
            emit(world, Some(target), UpgradeEventKind::QualityIncreased { from, to });
        }

        // Stockpile if there is room, else down at the worker's feet.
        let worker_cell = position_of(world, worker).unwrap_or_default();
        let def_name = world.get::<ThingDef>(target).map(|d| d.def_name.clone()).unwrap_or_default();
        if let Some(cell) = find_store_cell(world, &def_name, self.store_mode(world), worker_cell) {
            self.carried = Some(target);
            self.store_cell = Some(cell);
            self.stage = CraftStage::StoringProduct;
            return None;
        }

        if let Err(e) = place_near(world, target, worker_cell) {
            tracing::error!("{:?} could not put down upgraded {:?}: {}", worker, target, e);
            let worker_id = thing_id_of(world, worker).map(|id| id.0).unwrap_or(0);
            emit(world, Some(target), UpgradeEventKind::PlacementFailed { worker_id });
            release_at(world, target, worker_cell);
        }
        Some(JobCondition::Succeeded)
    }

    fn store(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let (Some(cell), Some(carried)) = (self.store_cell, self.carried) else {
            return Some(JobCondition::Succeeded);
        };
        if !move_worker_toward(world, worker, cell) {
            return None;
        }
        self.carried = None;
        if let Err(e) = place_near(world, carried, cell) {
            tracing::error!("{:?} could not store {:?}: {}", worker, carried, e);
            release_at(world, carried, cell);
        }
        Some(JobCondition::Succeeded)
    }
}

impl JobDriver for CraftJob {
    const KIND: OrderKind = OrderKind::Crafting;

    fn claims(&self) -> Vec<Entity> {
        let mut claims = vec![self.bench, self.target];
        claims.extend(self.queue.iter().map(|a| a.entity));
        claims.dedup();
        claims
    }

    fn resumes(&self) -> bool {
        self.resumed
    }

    fn check_end(&self, world: &World) -> Option<JobCondition> {
        if self.stage >= CraftStage::Completing {
            return None;
        }
        let Some(bench) = world.get_entity(self.bench) else {
            return Some(JobCondition::Failed);
        };
        if bench.contains::<Burning>() || !is_spawned(world, self.bench) {
            return Some(JobCondition::Failed);
        }
        match bench.get::<Workbench>() {
            Some(b) if b.usable && b.has_live_bill(self.bill_id) => {}
            _ => return Some(JobCondition::Failed),
        }
        if world.get_entity(self.target).is_none() {
            return Some(JobCondition::Incompletable);
        }
        None
    }

    fn step(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        match self.stage {
            CraftStage::Traveling => self.travel(world, worker),
            CraftStage::CollectingIngredients => self.collect(world),
            CraftStage::AtBench => self.deliver_to_bench(world, worker),
            CraftStage::MaterializeWorkOrder => self.materialize(world, worker),
            CraftStage::PerformingWork => self.perform(world, worker),
            CraftStage::Completing => self.complete(world, worker),
            CraftStage::StoringProduct => self.store(world, worker),
        }
    }

    fn finish(&mut self, world: &mut World, worker: Entity, condition: JobCondition) {
        if let Some(carried) = self.carried.take() {
            drop_carried(world, worker, carried);
        }
        if condition == JobCondition::Cancelled {
            if let Some(order) = self.order.take() {
                if world.get::<WorkOrder>(order).is_some() {
                    destroy_work_order(world, order, DestroyMode::Cancel);
                }
            }
        }
    }
}
