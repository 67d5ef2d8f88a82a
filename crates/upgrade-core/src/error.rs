//! Error Types

use bevy_ecs::entity::Entity;
use thiserror::Error;

/// Errors from the public upgrade operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpgradeError {
    #[error("entity {0:?} does not exist")]
    MissingEntity(Entity),
    #[error("thing {0:?} has no quality")]
    NoQuality(Entity),
    #[error("thing {0:?} is not a structure; items are upgraded through workbench bills")]
    NotAStructure(Entity),
}

/// A thing could not be put down anywhere near where it was wanted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("thing {0:?} does not exist")]
    MissingEntity(Entity),
    #[error("no free cell within {radius} of ({x}, {z})")]
    NoFreeCell { x: i32, z: i32, radius: i32 },
}
