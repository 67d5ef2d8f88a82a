//! World Components
//!
//! Grid cells, the tick clock and the stable id registry.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use upgrade_events::CellRecord;

use super::thing::ThingId;

/// A grid cell on the map floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub z: i32,
}

impl Cell {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn distance_sq(self, other: Cell) -> i32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    /// Chebyshev distance, the number of steps for an 8-way mover.
    pub fn steps_to(self, other: Cell) -> u32 {
        (self.x - other.x).unsigned_abs().max((self.z - other.z).unsigned_abs())
    }

    /// The cell reached by moving up to `steps` cells toward `target`.
    pub fn step_toward(self, target: Cell, steps: u32) -> Cell {
        let steps = steps as i32;
        let dx = (target.x - self.x).clamp(-steps, steps);
        let dz = (target.z - self.z).clamp(-steps, steps);
        Cell::new(self.x + dx, self.z + dz)
    }

    pub fn adjacent_8(self) -> impl Iterator<Item = Cell> {
        const OFFSETS: [(i32, i32); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        OFFSETS
            .into_iter()
            .map(move |(dx, dz)| Cell::new(self.x + dx, self.z + dz))
    }
}

impl From<CellRecord> for Cell {
    fn from(r: CellRecord) -> Self {
        Cell::new(r.x, r.z)
    }
}

impl From<Cell> for CellRecord {
    fn from(c: Cell) -> Self {
        CellRecord { x: c.x, z: c.z }
    }
}

/// Axis-aligned inclusive cell rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRect {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl CellRect {
    pub fn new(min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_z: min_z.min(max_z),
            max_x: min_x.max(max_x),
            max_z: min_z.max(max_z),
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= self.min_x && cell.x <= self.max_x && cell.z >= self.min_z && cell.z <= self.max_z
    }

    /// The cell inside the rectangle closest to `cell`.
    pub fn closest_cell_to(&self, cell: Cell) -> Cell {
        Cell::new(
            cell.x.clamp(self.min_x, self.max_x),
            cell.z.clamp(self.min_z, self.max_z),
        )
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.min_z..=self.max_z)
            .flat_map(move |z| (self.min_x..=self.max_x).map(move |x| Cell::new(x, z)))
    }

    pub fn area(&self) -> u32 {
        ((self.max_x - self.min_x + 1) * (self.max_z - self.min_z + 1)) as u32
    }
}

/// Component: where a thing or worker stands.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position(pub Cell);

/// Resource: simulation clock
#[derive(Resource, Debug, Default)]
pub struct WorldState {
    pub current_tick: u64,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }
}

/// Resource: maps stable thing ids to live entities
///
/// Ids survive save/load; entities do not.
#[derive(Resource, Debug)]
pub struct ThingRegistry {
    next_id: u64,
    by_id: HashMap<ThingId, Entity>,
}

impl Default for ThingRegistry {
    fn default() -> Self {
        Self {
            next_id: 1,
            by_id: HashMap::new(),
        }
    }
}

impl ThingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> ThingId {
        let id = ThingId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Registers an entity under a known id, bumping the allocator past it.
    pub fn register(&mut self, id: ThingId, entity: Entity) {
        self.next_id = self.next_id.max(id.0 + 1);
        self.by_id.insert(id, entity);
    }

    pub fn unregister(&mut self, id: ThingId) {
        self.by_id.remove(&id);
    }

    pub fn entity(&self, id: ThingId) -> Option<Entity> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.next_id = 1;
    }

    pub fn set_next_id(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_distances() {
        let a = Cell::new(0, 0);
        let b = Cell::new(3, 4);
        assert_eq!(a.distance_sq(b), 25);
        assert_eq!(a.steps_to(b), 4);
        assert_eq!(a.step_toward(b, 2), Cell::new(2, 2));
        assert_eq!(a.step_toward(b, 10), b);
    }

    #[test]
    fn test_rect_closest_cell() {
        let rect = CellRect::new(5, 5, 9, 9);
        assert_eq!(rect.closest_cell_to(Cell::new(0, 7)), Cell::new(5, 7));
        assert_eq!(rect.closest_cell_to(Cell::new(6, 6)), Cell::new(6, 6));
        assert_eq!(rect.area(), 25);
        assert_eq!(rect.cells().count(), 25);
    }

    #[test]
    fn test_registry_ids_monotonic() {
        let mut registry = ThingRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert!(b > a);

        registry.register(ThingId(40), Entity::from_raw(1));
        assert_eq!(registry.allocate_id(), ThingId(41));
        assert_eq!(registry.entity(ThingId(40)), Some(Entity::from_raw(1)));
    }
}
