//! Construction Upgrade Job
//!
//! Haul the missing materials into a construction order, then build it.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::VecDeque;

use upgrade_events::{JobCondition, OrderKind, UpgradeEventKind};

use crate::components::order::{ConstructionOrder, OwningOrder};
use crate::components::thing::{Forbidden, StackCount, ThingDef};
use crate::components::worker::Worker;
use crate::events::emit;
use crate::map::things::{despawn_thing, is_spawned, position_of, take_from_stack, thing_id_of};
use crate::systems::allocation::Assignment;
use crate::systems::orders::{complete_construction, fail_construction};
use crate::SimRng;

use super::{drop_carried, move_worker_toward, JobDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructStage {
    /// Walking to the next stack, or to the site once nothing is left.
    Traveling,
    /// Carrying a stack into the order.
    DeliveringMaterials,
    Constructing,
}

#[derive(Debug, Clone)]
pub struct ConstructJob {
    pub order: Entity,
    pub stage: ConstructStage,
    queue: VecDeque<Assignment>,
    carried: Option<Entity>,
}

impl ConstructJob {
    pub fn new(order: Entity, materials: Vec<Assignment>) -> Self {
        Self {
            order,
            stage: ConstructStage::Traveling,
            queue: materials.into_iter().filter(|a| a.count > 0).collect(),
            carried: None,
        }
    }

    fn travel(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let Some(next) = self.queue.front().copied() else {
            let site = position_of(world, self.order)?;
            if move_worker_toward(world, worker, site) {
                self.stage = ConstructStage::Constructing;
            }
            return None;
        };

        let usable = world
            .get_entity(next.entity)
            .map(|e| !e.contains::<Forbidden>())
            .unwrap_or(false)
            && is_spawned(world, next.entity);
        if !usable {
            return Some(JobCondition::Incompletable);
        }
        let cell = position_of(world, next.entity)?;
        if !move_worker_toward(world, worker, cell) {
            return None;
        }

        self.queue.pop_front();
        let Some(taken) = take_from_stack(world, next.entity, next.count) else {
            return Some(JobCondition::Incompletable);
        };
        self.carried = Some(taken);
        self.stage = ConstructStage::DeliveringMaterials;
        None
    }

    fn deliver(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let site = position_of(world, self.order)?;
        if !move_worker_toward(world, worker, site) {
            return None;
        }
        if let Some(carried) = self.carried.take() {
            let def = world.get::<ThingDef>(carried).map(|d| d.def_name.clone());
            let count = world.get::<StackCount>(carried).map(|c| c.0).unwrap_or(0);
            if let (Some(def), Some(mut order)) = (def, world.get_mut::<ConstructionOrder>(self.order)) {
                order.deliver(&def, count);
            }
            despawn_thing(world, carried);
        }
        self.stage = ConstructStage::Traveling;
        None
    }

    fn construct(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        let (speed, chance) = world
            .get::<Worker>(worker)
            .map(|w| (w.construction_speed, w.construction_success_chance))
            .unwrap_or((0.0, 1.0));
        let mut order = world.get_mut::<ConstructionOrder>(self.order)?;
        if !order.is_fully_delivered() {
            return Some(JobCondition::Incompletable);
        }
        if !order.apply_work(speed) {
            return None;
        }

        let roll = world
            .get_resource_mut::<SimRng>()
            .map(|mut rng| rng.0.gen::<f32>())
            .unwrap_or(0.0);
        if roll < chance {
            complete_construction(world, self.order);
            Some(JobCondition::Succeeded)
        } else {
            let target = world.get::<ConstructionOrder>(self.order).map(|o| o.target);
            tracing::info!("{:?} botched construction on {:?}", worker, target);
            fail_construction(world, self.order);
            let worker_id = thing_id_of(world, worker).map(|id| id.0).unwrap_or(0);
            emit(world, target, UpgradeEventKind::ConstructionFailed { worker_id });
            Some(JobCondition::Failed)
        }
    }
}

impl JobDriver for ConstructJob {
    const KIND: OrderKind = OrderKind::Construction;

    fn claims(&self) -> Vec<Entity> {
        let mut claims = vec![self.order];
        claims.extend(self.queue.iter().map(|a| a.entity));
        claims
    }

    fn check_end(&self, world: &World) -> Option<JobCondition> {
        let Some(order) = world.get_entity(self.order) else {
            return Some(JobCondition::Incompletable);
        };
        if order.contains::<Forbidden>() {
            return Some(JobCondition::Incompletable);
        }
        let target = order.get::<ConstructionOrder>()?.target;
        if world.get_entity(target).is_none() || !is_spawned(world, target) {
            return Some(JobCondition::Incompletable);
        }
        None
    }

    fn step(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        match self.stage {
            ConstructStage::Traveling => self.travel(world, worker),
            ConstructStage::DeliveringMaterials => self.deliver(world, worker),
            ConstructStage::Constructing => self.construct(world, worker),
        }
    }

    fn finish(&mut self, world: &mut World, worker: Entity, _condition: JobCondition) {
        if let Some(carried) = self.carried.take() {
            drop_carried(world, worker, carried);
        }
    }
}
