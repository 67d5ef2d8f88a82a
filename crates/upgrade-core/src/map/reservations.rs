//! Reservations
//!
//! Exclusive claims workers hold on things they intend to use.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

/// Resource: thing -> claiming worker
#[derive(Resource, Debug, Default)]
pub struct Reservations {
    claims: HashMap<Entity, Entity>,
}

impl Reservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unclaimed, or already claimed by `claimant`.
    pub fn can_reserve(&self, claimant: Entity, thing: Entity) -> bool {
        self.claims
            .get(&thing)
            .map(|holder| *holder == claimant)
            .unwrap_or(true)
    }

    pub fn reserve(&mut self, claimant: Entity, thing: Entity) -> bool {
        if !self.can_reserve(claimant, thing) {
            return false;
        }
        self.claims.insert(thing, claimant);
        true
    }

    pub fn claimant_of(&self, thing: Entity) -> Option<Entity> {
        self.claims.get(&thing).copied()
    }

    pub fn release(&mut self, thing: Entity) {
        self.claims.remove(&thing);
    }

    pub fn release_all_by(&mut self, claimant: Entity) {
        self.claims.retain(|_, holder| *holder != claimant);
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn clear(&mut self) {
        self.claims.clear();
    }
}
