//! Upgrade Markers
//!
//! The externally visible "marked for upgrade" flag. Removing a marker
//! from outside the engine cancels the object's upgrade.

use bevy_ecs::prelude::*;
use std::collections::BTreeSet;

use crate::systems::intent::notify_marker_removed;

/// Resource: objects currently marked for upgrade
#[derive(Resource, Debug, Default)]
pub struct UpgradeMarkers {
    marked: BTreeSet<Entity>,
}

impl UpgradeMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the object was already marked.
    pub fn add(&mut self, entity: Entity) -> bool {
        self.marked.insert(entity)
    }

    pub fn has(&self, entity: Entity) -> bool {
        self.marked.contains(&entity)
    }

    /// Removes without notifying anyone.
    pub fn remove_silently(&mut self, entity: Entity) -> bool {
        self.marked.remove(&entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.marked.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    pub fn clear(&mut self) {
        self.marked.clear();
    }
}

/// Removes the marker from an object and notifies its intent.
///
/// Returns false if the object was not marked.
pub fn remove_marker(world: &mut World, entity: Entity) -> bool {
    let removed = world.resource_mut::<UpgradeMarkers>().remove_silently(entity);
    if removed {
        notify_marker_removed(world, entity);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut markers = UpgradeMarkers::new();
        let e = Entity::from_raw(4);
        assert!(markers.add(e));
        assert!(!markers.add(e));
        assert_eq!(markers.len(), 1);
        assert!(markers.remove_silently(e));
        assert!(!markers.has(e));
    }

    #[test]
    fn test_remove_unmarked_is_noop() {
        let mut world = World::new();
        world.insert_resource(UpgradeMarkers::new());
        let e = world.spawn_empty().id();
        assert!(!remove_marker(&mut world, e));
    }
}
