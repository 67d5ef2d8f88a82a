//! Quality Upgrade Engine Library
//!
//! Players mark furniture, buildings and crafted items for a better quality
//! tier. The engine turns those marks into construction orders and workbench
//! jobs, prices and allocates the materials, and drives workers through the
//! labor until the target tier is reached.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod map;
pub mod options;
pub mod persistence;
pub mod setup;
pub mod systems;

pub use config::UpgradeSettings;
pub use error::{PlacementError, UpgradeError};
pub use options::{apply_option, can_be_upgraded, upgrade_options, UpgradeOption};
pub use persistence::PersistenceError;
pub use setup::{bare_world, demo_world, run_ticks};
pub use systems::build_schedule;

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
