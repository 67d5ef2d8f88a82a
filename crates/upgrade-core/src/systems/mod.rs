//! ECS Systems
//!
//! Requirement pricing, search, allocation, the intent and order
//! lifecycles, labor, scheduling and the per-tick schedule.

pub mod allocation;
pub mod intent;
pub mod labor;
pub mod orders;
pub mod requirements;
pub mod scheduler;
pub mod search;
pub mod tracker;

use bevy_ecs::prelude::*;

use crate::components::world::WorldState;
use crate::events::flush_tick_events;
use crate::map::regions::build_region_index;

pub use allocation::{allocate, AllocationFailure, Assignment};
pub use intent::{
    cancel_upgrade, check_and_do_upgrade, inspect_string, intent_state, is_still_active, notify_marker_removed,
    notify_object_destroyed, post_spawn_setup, set_desired_quality,
};
pub use labor::{
    cancel_job, start_job, step_labor_tasks, ConstructJob, ConstructStage, CraftJob, CraftStage, CurrentJob,
    JobDriver, LaborTask,
};
pub use orders::{
    complete_construction, create_work_order, destroy_construction_order, destroy_work_order, fail_construction,
    place_construction_order,
};
pub use requirements::{apply_settings, compute_requirements, tier_scaled_work, CostCache};
pub use scheduler::{assign_upgrade_jobs, NoJob, RECHECK_TICKS};
pub use search::{find_candidates, Candidate, SearchRequest};
pub use tracker::{rebuild_on_load, start_new_world, sweep_active_intents, ActiveIntentTracker};

/// System: move the clock forward
pub fn advance_world_tick(mut state: ResMut<WorldState>) {
    state.advance_tick();
}

/// One simulation tick, in order.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            build_region_index,
            assign_upgrade_jobs,
            step_labor_tasks,
            sweep_active_intents,
            flush_tick_events,
            advance_world_tick,
        )
            .chain(),
    );
    schedule
}
