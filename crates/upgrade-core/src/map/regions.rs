//! Region Graph
//!
//! The map floor is partitioned into rectangular regions connected to
//! their neighbors. Searches walk this graph breadth-first.

use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::components::thing::Spawned;
use crate::components::worker::{Danger, Worker};
use crate::components::world::{Cell, CellRect, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);

/// A rectangular patch of walkable floor.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub rect: CellRect,
    pub neighbors: Vec<RegionId>,
    pub danger: Danger,
    /// Walls and locked doors.
    pub passable: bool,
}

impl Region {
    /// Whether the worker is willing and able to enter.
    pub fn allows(&self, worker: &Worker) -> bool {
        self.passable && self.danger <= worker.max_danger
    }
}

/// Resource: all regions of the map
#[derive(Resource, Debug, Default)]
pub struct RegionGrid {
    regions: Vec<Region>,
}

impl RegionGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&mut self, rect: CellRect, danger: Danger) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(Region {
            id,
            rect,
            neighbors: Vec::new(),
            danger,
            passable: true,
        });
        id
    }

    /// Links two regions both ways.
    pub fn connect(&mut self, a: RegionId, b: RegionId) {
        if a == b {
            return;
        }
        if let Some(region) = self.regions.get_mut(a.0 as usize) {
            if !region.neighbors.contains(&b) {
                region.neighbors.push(b);
            }
        }
        if let Some(region) = self.regions.get_mut(b.0 as usize) {
            if !region.neighbors.contains(&a) {
                region.neighbors.push(a);
            }
        }
    }

    pub fn set_passable(&mut self, id: RegionId, passable: bool) {
        if let Some(region) = self.regions.get_mut(id.0 as usize) {
            region.passable = passable;
        }
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.0 as usize)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_at(&self, cell: Cell) -> Option<&Region> {
        self.regions.iter().find(|r| r.rect.contains(cell))
    }

    /// Region at `cell`, only if it can be stood in.
    pub fn valid_region_at(&self, cell: Cell) -> Option<&Region> {
        self.region_at(cell).filter(|r| r.passable)
    }

    pub fn is_standable(&self, cell: Cell) -> bool {
        self.valid_region_at(cell).is_some()
    }

    /// Breadth-first walk from `start`.
    ///
    /// `entry(from, to)` decides whether a neighbor is entered. `process`
    /// is called once per visited region and stops the walk by returning
    /// true.
    pub fn breadth_first_traverse<E, P>(&self, start: RegionId, mut entry: E, mut process: P)
    where
        E: FnMut(&Region, &Region) -> bool,
        P: FnMut(&Region) -> bool,
    {
        let Some(root) = self.region(start) else {
            return;
        };

        let mut visited: HashSet<RegionId> = HashSet::new();
        let mut queue: VecDeque<&Region> = VecDeque::new();
        visited.insert(root.id);
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            if process(current) {
                return;
            }
            for neighbor_id in &current.neighbors {
                if visited.contains(neighbor_id) {
                    continue;
                }
                let Some(neighbor) = self.region(*neighbor_id) else {
                    continue;
                };
                if entry(current, neighbor) {
                    visited.insert(neighbor.id);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    /// Whether the worker can walk from one cell to another.
    pub fn can_reach(&self, from: Cell, to: Cell, worker: &Worker) -> bool {
        let (Some(start), Some(goal)) = (self.valid_region_at(from), self.valid_region_at(to)) else {
            return false;
        };
        if start.id == goal.id {
            return true;
        }
        if !goal.allows(worker) {
            return false;
        }

        let goal_id = goal.id;
        let mut found = false;
        self.breadth_first_traverse(
            start.id,
            |_, to| to.allows(worker),
            |region| {
                found = region.id == goal_id;
                found
            },
        );
        found
    }
}

/// Resource: spawned things listed per region, rebuilt every tick
#[derive(Resource, Debug, Default)]
pub struct RegionThings {
    by_region: HashMap<RegionId, Vec<Entity>>,
}

impl RegionThings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn things_in(&self, region: RegionId) -> &[Entity] {
        self.by_region
            .get(&region)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.by_region.clear();
    }

    pub fn insert(&mut self, region: RegionId, entity: Entity) {
        self.by_region.entry(region).or_default().push(entity);
    }
}

/// System: rebuild the per-region thing listing
pub fn build_region_index(world: &mut World) {
    let mut query = world.query_filtered::<(Entity, &Position), With<Spawned>>();
    let mut entries: Vec<(Entity, Cell)> = query
        .iter(world)
        .map(|(entity, position)| (entity, position.0))
        .collect();
    entries.sort_by_key(|(entity, _)| *entity);

    world.resource_scope(|world, mut index: Mut<RegionThings>| {
        index.clear();
        let grid = world.resource::<RegionGrid>();
        for (entity, cell) in entries {
            if let Some(region) = grid.region_at(cell) {
                index.insert(region.id, entity);
            }
        }
    });
}
