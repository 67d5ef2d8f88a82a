//! Labor Tasks
//!
//! Multi-tick jobs a worker runs one step per tick: crafting upgrades at
//! a bench and construction upgrades on site.

pub mod construct;
pub mod craft;

use bevy_ecs::prelude::*;

use upgrade_events::{JobCondition, OrderKind, UpgradeEventKind};

use crate::components::worker::Worker;
use crate::components::world::{Cell, Position};
use crate::events::emit;
use crate::map::reservations::Reservations;
use crate::map::things::{is_spawned, place_near, position_of, release_at, thing_id_of};

pub use construct::{ConstructJob, ConstructStage};
pub use craft::{CraftJob, CraftStage};

/// Shared surface of both job kinds.
pub trait JobDriver {
    const KIND: OrderKind;

    /// Things the worker claims for the whole job.
    fn claims(&self) -> Vec<Entity>;

    /// Whether the job resumes an existing order.
    fn resumes(&self) -> bool {
        false
    }

    /// Conditions that end the job regardless of its stage.
    fn check_end(&self, world: &World) -> Option<JobCondition>;

    /// Advances one tick. Returns the ending once the job is over.
    fn step(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition>;

    /// Cleanup for any ending.
    fn finish(&mut self, world: &mut World, worker: Entity, condition: JobCondition);
}

/// A worker's running job.
#[derive(Debug, Clone)]
pub enum LaborTask {
    Craft(CraftJob),
    Construct(ConstructJob),
}

impl LaborTask {
    pub fn kind(&self) -> OrderKind {
        match self {
            LaborTask::Craft(_) => CraftJob::KIND,
            LaborTask::Construct(_) => ConstructJob::KIND,
        }
    }

    fn claims(&self) -> Vec<Entity> {
        match self {
            LaborTask::Craft(job) => job.claims(),
            LaborTask::Construct(job) => job.claims(),
        }
    }

    fn resumes(&self) -> bool {
        match self {
            LaborTask::Craft(job) => job.resumes(),
            LaborTask::Construct(job) => job.resumes(),
        }
    }

    fn check_end(&self, world: &World) -> Option<JobCondition> {
        match self {
            LaborTask::Craft(job) => job.check_end(world),
            LaborTask::Construct(job) => job.check_end(world),
        }
    }

    fn step(&mut self, world: &mut World, worker: Entity) -> Option<JobCondition> {
        match self {
            LaborTask::Craft(job) => job.step(world, worker),
            LaborTask::Construct(job) => job.step(world, worker),
        }
    }

    fn finish(&mut self, world: &mut World, worker: Entity, condition: JobCondition) {
        match self {
            LaborTask::Craft(job) => job.finish(world, worker, condition),
            LaborTask::Construct(job) => job.finish(world, worker, condition),
        }
    }
}

/// Component: the job a worker is running
#[derive(Component, Debug, Clone)]
pub struct CurrentJob(pub LaborTask);

fn worker_id(world: &World, worker: Entity) -> u64 {
    thing_id_of(world, worker).map(|id| id.0).unwrap_or(0)
}

/// Claims the job's things and hands the job to the worker.
///
/// Returns false, without starting, if anything is already claimed by
/// someone else.
pub fn start_job(world: &mut World, worker: Entity, task: LaborTask) -> bool {
    let claims = task.claims();
    {
        let mut reservations = world.resource_mut::<Reservations>();
        if !claims.iter().all(|thing| reservations.can_reserve(worker, *thing)) {
            return false;
        }
        for thing in &claims {
            reservations.reserve(worker, *thing);
        }
    }

    let kind = task.kind();
    let resumed = task.resumes();
    world.entity_mut(worker).insert(CurrentJob(task));
    tracing::debug!("{:?} started {:?} job", worker, kind);
    emit(
        world,
        None,
        UpgradeEventKind::JobStarted {
            worker_id: worker_id(world, worker),
            order: kind,
            resumed,
        },
    );
    true
}

fn end_job(world: &mut World, worker: Entity, mut task: LaborTask, condition: JobCondition) {
    task.finish(world, worker, condition);
    if let Some(mut reservations) = world.get_resource_mut::<Reservations>() {
        reservations.release_all_by(worker);
    }
    tracing::debug!("{:?} ended {:?} job: {:?}", worker, task.kind(), condition);
    emit(
        world,
        None,
        UpgradeEventKind::JobEnded {
            worker_id: worker_id(world, worker),
            order: task.kind(),
            condition,
        },
    );
}

/// Interrupts the worker's job.
pub fn cancel_job(world: &mut World, worker: Entity) {
    let Some(CurrentJob(task)) = world.get_entity_mut(worker).and_then(|mut e| e.take::<CurrentJob>()) else {
        return;
    };
    end_job(world, worker, task, JobCondition::Cancelled);
}

/// System: advance every running job by one step
pub fn step_labor_tasks(world: &mut World) {
    let mut query = world.query_filtered::<Entity, (With<CurrentJob>, With<Worker>)>();
    let mut workers: Vec<Entity> = query.iter(world).collect();
    workers.sort();

    for worker in workers {
        let Some(CurrentJob(mut task)) = world.entity_mut(worker).take::<CurrentJob>() else {
            continue;
        };
        let ending = match task.check_end(world) {
            Some(condition) => Some(condition),
            None => task.step(world, worker),
        };
        match ending {
            Some(condition) => end_job(world, worker, task, condition),
            None => {
                world.entity_mut(worker).insert(CurrentJob(task));
            }
        }
    }
}

/// Moves the worker up to its speed toward `cell`. Returns true once there.
pub fn move_worker_toward(world: &mut World, worker: Entity, cell: Cell) -> bool {
    let speed = world.get::<Worker>(worker).map(|w| w.move_speed).unwrap_or(1);
    let Some(mut position) = world.get_mut::<Position>(worker) else {
        return false;
    };
    if position.0 != cell {
        position.0 = position.0.step_toward(cell, speed);
    }
    position.0 == cell
}

/// Puts a carried thing down near the worker.
pub fn drop_carried(world: &mut World, worker: Entity, carried: Entity) {
    if world.get_entity(carried).is_none() || is_spawned(world, carried) {
        return;
    }
    let Some(cell) = position_of(world, worker) else {
        return;
    };
    if let Err(e) = place_near(world, carried, cell) {
        tracing::warn!("{:?} dropped {:?} in place: {}", worker, carried, e);
        release_at(world, carried, cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::bare_world;

    #[test]
    fn test_move_worker_toward() {
        let mut world = bare_world(1);
        let worker = world
            .spawn((Worker::new("Ada"), Position(Cell::new(0, 0))))
            .id();

        assert!(!move_worker_toward(&mut world, worker, Cell::new(5, 1)));
        assert_eq!(position_of(&world, worker), Some(Cell::new(2, 1)));
        assert!(!move_worker_toward(&mut world, worker, Cell::new(5, 1)));
        assert!(move_worker_toward(&mut world, worker, Cell::new(5, 1)));
        assert!(move_worker_toward(&mut world, worker, Cell::new(5, 1)));
    }
}
