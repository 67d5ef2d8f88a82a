//! Worker Components
//!
//! Colonists that haul materials and perform upgrade labor.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// How dangerous a region is to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Danger {
    #[default]
    None,
    Some,
    Deadly,
}

impl Danger {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Danger::None,
            1 => Danger::Some,
            _ => Danger::Deadly,
        }
    }
}

/// Component: a colonist able to do upgrade work
#[derive(Component, Debug, Clone)]
pub struct Worker {
    pub name: String,
    /// Construction work applied per tick.
    pub construction_speed: f32,
    /// Crafting work applied per tick.
    pub crafting_speed: f32,
    /// Chance in [0, 1] that a finished construction attempt succeeds.
    pub construction_success_chance: f32,
    pub crafting_skill: u32,
    /// Highest region danger the worker will enter.
    pub max_danger: Danger,
    /// Cells moved per tick.
    pub move_speed: u32,
}

impl Worker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            construction_speed: 10.0,
            crafting_speed: 10.0,
            construction_success_chance: 1.0,
            crafting_skill: 5,
            max_danger: Danger::Some,
            move_speed: 2,
        }
    }

    pub fn with_speeds(mut self, construction: f32, crafting: f32) -> Self {
        self.construction_speed = construction;
        self.crafting_speed = crafting;
        self
    }

    pub fn with_success_chance(mut self, chance: f32) -> Self {
        self.construction_success_chance = chance.clamp(0.0, 1.0);
        self
    }

    pub fn with_skill(mut self, skill: u32) -> Self {
        self.crafting_skill = skill;
        self
    }

    pub fn with_max_danger(mut self, danger: Danger) -> Self {
        self.max_danger = danger;
        self
    }
}
