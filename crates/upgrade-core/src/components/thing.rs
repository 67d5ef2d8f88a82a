//! Thing Components
//!
//! Structures, items and material stacks share these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use upgrade_events::{Quality, ThingKindRecord};

/// Component: stable identifier, survives save/load
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ThingId(pub u64);

/// Component: definition name plus the material variant it was made from
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThingDef {
    pub def_name: String,
    pub stuff: Option<String>,
}

impl ThingDef {
    pub fn new(def_name: impl Into<String>) -> Self {
        Self {
            def_name: def_name.into(),
            stuff: None,
        }
    }

    pub fn with_stuff(mut self, stuff: impl Into<String>) -> Self {
        self.stuff = Some(stuff.into());
        self
    }
}

/// Component: current quality tier
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThingQuality(pub Quality);

/// Component: whether the thing is built in place or portable
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradableKind {
    Structure,
    Item,
}

impl From<UpgradableKind> for ThingKindRecord {
    fn from(kind: UpgradableKind) -> Self {
        match kind {
            UpgradableKind::Structure => ThingKindRecord::Structure,
            UpgradableKind::Item => ThingKindRecord::Item,
        }
    }
}

impl UpgradableKind {
    /// `None` for raw material stacks.
    pub fn from_record(kind: ThingKindRecord) -> Option<Self> {
        match kind {
            ThingKindRecord::Structure => Some(UpgradableKind::Structure),
            ThingKindRecord::Item => Some(UpgradableKind::Item),
            ThingKindRecord::Material => None,
        }
    }
}

/// Component: number of units in a stack
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackCount(pub u32);

/// Component: structural integrity
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitPoints {
    pub current: u32,
    pub max: u32,
}

impl HitPoints {
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }
}

/// Marker: the thing is placed in the world (not held or carried)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Spawned;

/// Marker: workers may not touch this thing
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Forbidden;

/// Marker: the thing is on fire
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Burning;

/// Marker: can be picked up and carried
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Haulable;

/// Marker: belongs to the player's colony
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct PlayerOwned;
