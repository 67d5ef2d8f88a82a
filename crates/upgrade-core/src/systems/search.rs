//! Spatial Candidate Search
//!
//! Breadth-first walk over the region graph from an anchor cell,
//! collecting portable things a worker could fetch.

use bevy_ecs::prelude::*;

use upgrade_events::Quality;

use crate::components::bench::{ThingFilter, UNBOUNDED_RADIUS};
use crate::components::thing::{Burning, Forbidden, Haulable, Spawned, StackCount, ThingDef, ThingQuality};
use crate::components::worker::Worker;
use crate::components::world::{Cell, Position};
use crate::map::regions::{Region, RegionGrid, RegionThings};
use crate::map::reservations::Reservations;

/// A reachable stack that could satisfy a requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub entity: Entity,
    pub def_name: String,
    pub stack_count: u32,
    pub quality: Option<Quality>,
    pub distance_sq: i32,
}

impl Candidate {
    pub fn new(entity: Entity, def_name: impl Into<String>, stack_count: u32) -> Self {
        Self {
            entity,
            def_name: def_name.into(),
            stack_count,
            quality: None,
            distance_sq: 0,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn at_distance_sq(mut self, distance_sq: i32) -> Self {
        self.distance_sq = distance_sq;
        self
    }
}

/// Parameters of one search.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// The worker who would fetch the things.
    pub actor: Entity,
    pub anchor: Cell,
    /// [`UNBOUNDED_RADIUS`] disables the distance limit on regions.
    pub radius: f32,
    pub filter: Option<&'a ThingFilter>,
}

impl<'a> SearchRequest<'a> {
    pub fn new(actor: Entity, anchor: Cell) -> Self {
        Self {
            actor,
            anchor,
            radius: UNBOUNDED_RADIUS,
            filter: None,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_filter(mut self, filter: &'a ThingFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn is_unbounded(&self) -> bool {
        self.radius >= UNBOUNDED_RADIUS
    }
}

/// Whether a search may step into `region`.
///
/// The cheap per-axis bounds check runs before the exact squared
/// distance check.
fn may_enter(region: &Region, worker: &Worker, request: &SearchRequest) -> bool {
    if !region.allows(worker) {
        return false;
    }
    if request.is_unbounded() {
        return true;
    }

    let anchor = request.anchor;
    let closest = region.rect.closest_cell_to(anchor);
    if (closest.x - anchor.x).abs() as f32 > request.radius {
        return false;
    }
    if (closest.z - anchor.z).abs() as f32 > request.radius {
        return false;
    }
    closest.distance_sq(anchor) as f32 <= request.radius * request.radius
}

/// The thing as a candidate, if the actor could use it.
fn accept(world: &World, entity: Entity, request: &SearchRequest, reservations: &Reservations) -> Option<Candidate> {
    let thing = world.get_entity(entity)?;
    if !thing.contains::<Spawned>() || !thing.contains::<Haulable>() {
        return None;
    }
    if thing.contains::<Forbidden>() || thing.contains::<Burning>() {
        return None;
    }
    let def = thing.get::<ThingDef>()?;
    if let Some(filter) = request.filter {
        if !filter.allows(&def.def_name) {
            return None;
        }
    }
    if !reservations.can_reserve(request.actor, entity) {
        return None;
    }

    let cell = thing.get::<Position>()?.0;
    let distance_sq = cell.distance_sq(request.anchor);
    if distance_sq as f32 >= request.radius * request.radius {
        return None;
    }

    Some(Candidate {
        entity,
        def_name: def.def_name.clone(),
        stack_count: thing.get::<StackCount>().map(|s| s.0).unwrap_or(1),
        quality: thing.get::<ThingQuality>().map(|q| q.0),
        distance_sq,
    })
}

/// Candidates reachable from `request.anchor`, closest first.
///
/// The result is a snapshot; callers exclude things they already hold.
pub fn find_candidates(world: &World, request: &SearchRequest) -> Vec<Candidate> {
    let Some(worker) = world.get::<Worker>(request.actor) else {
        return Vec::new();
    };
    let grid = world.resource::<RegionGrid>();
    let index = world.resource::<RegionThings>();
    let reservations = world.resource::<Reservations>();

    let Some(start) = grid.valid_region_at(request.anchor) else {
        return Vec::new();
    };

    let mut found: Vec<Candidate> = Vec::new();
    grid.breadth_first_traverse(
        start.id,
        |_, to| may_enter(to, worker, request),
        |region| {
            found.extend(
                index
                    .things_in(region.id)
                    .iter()
                    .filter_map(|e| accept(world, *e, request, reservations)),
            );
            false
        },
    );

    found.sort_by_key(|c| c.distance_sq);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::worker::Danger;
    use crate::components::world::{CellRect, ThingRegistry};
    use crate::map::regions::build_region_index;
    use crate::map::things::{spawn_thing, ThingSpawn};

    /// Two 10x10 rooms side by side, then a dangerous third room.
    fn world() -> (World, Entity) {
        let mut world = World::new();
        let mut grid = RegionGrid::new();
        let a = grid.add_region(CellRect::new(0, 0, 9, 9), Danger::None);
        let b = grid.add_region(CellRect::new(10, 0, 19, 9), Danger::None);
        let c = grid.add_region(CellRect::new(20, 0, 29, 9), Danger::Deadly);
        grid.connect(a, b);
        grid.connect(b, c);
        world.insert_resource(grid);
        world.insert_resource(RegionThings::new());
        world.insert_resource(Reservations::new());
        world.insert_resource(ThingRegistry::new());

        let worker = world
            .spawn(Worker::new("Ada").with_max_danger(Danger::Some))
            .id();
        (world, worker)
    }

    fn steel(world: &mut World, count: u32, x: i32, z: i32) -> Entity {
        spawn_thing(world, ThingSpawn::material("steel", count, Cell::new(x, z)))
    }

    #[test]
    fn test_sorted_by_distance() {
        let (mut world, worker) = world();
        let far = steel(&mut world, 5, 15, 0);
        let near = steel(&mut world, 5, 2, 0);
        build_region_index(&mut world);

        let found = find_candidates(&world, &SearchRequest::new(worker, Cell::new(0, 0)));
        let order: Vec<Entity> = found.iter().map(|c| c.entity).collect();
        assert_eq!(order, vec![near, far]);
        assert_eq!(found[0].distance_sq, 4);
        assert_eq!(found[1].stack_count, 5);
    }

    #[test]
    fn test_dangerous_region_not_entered() {
        let (mut world, worker) = world();
        steel(&mut world, 5, 25, 0);
        build_region_index(&mut world);

        assert!(find_candidates(&world, &SearchRequest::new(worker, Cell::new(0, 0))).is_empty());
    }

    #[test]
    fn test_radius_limits_regions_and_things() {
        let (mut world, worker) = world();
        let inside = steel(&mut world, 5, 3, 0);
        steel(&mut world, 5, 5, 0);
        steel(&mut world, 5, 12, 0);
        build_region_index(&mut world);

        let request = SearchRequest::new(worker, Cell::new(0, 0)).with_radius(5.0);
        let found = find_candidates(&world, &request);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity, inside);
    }

    #[test]
    fn test_filters_forbidden_reserved_and_unlisted() {
        let (mut world, worker) = world();
        let forbidden = steel(&mut world, 5, 1, 1);
        world.entity_mut(forbidden).insert(Forbidden);
        let reserved = steel(&mut world, 5, 2, 2);
        let other = world.spawn(Worker::new("Bo")).id();
        world.resource_mut::<Reservations>().reserve(other, reserved);
        let wood = spawn_thing(&mut world, ThingSpawn::material("wood_log", 5, Cell::new(3, 3)));
        let ok = steel(&mut world, 5, 4, 4);
        build_region_index(&mut world);

        let filter = ThingFilter::only(["steel"]);
        let request = SearchRequest::new(worker, Cell::new(0, 0)).with_filter(&filter);
        let found: Vec<Entity> = find_candidates(&world, &request).iter().map(|c| c.entity).collect();
        assert_eq!(found, vec![ok]);
        assert!(!found.contains(&wood));
    }

    #[test]
    fn test_anchor_off_map_finds_nothing() {
        let (mut world, worker) = world();
        steel(&mut world, 5, 1, 1);
        build_region_index(&mut world);
        assert!(find_candidates(&world, &SearchRequest::new(worker, Cell::new(-5, -5))).is_empty());
    }
}
