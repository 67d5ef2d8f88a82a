//! Thing Lifecycle
//!
//! Spawning, splitting, holding, placing and destroying things.

use bevy_ecs::prelude::*;
use std::collections::HashSet;

use upgrade_events::{MaterialCount, Quality};

use crate::components::intent::UpgradeIntent;
use crate::components::order::{ConstructionOrder, DestroyMode, WorkOrder};
use crate::components::thing::{
    Burning, Forbidden, Haulable, HitPoints, PlayerOwned, Spawned, StackCount, ThingDef, ThingId,
    ThingQuality, UpgradableKind,
};
use crate::components::world::{Cell, Position, ThingRegistry};
use crate::error::PlacementError;
use crate::map::defs::DefDatabase;
use crate::map::regions::RegionGrid;
use crate::map::reservations::Reservations;
use crate::systems::{intent, orders};

/// How far from the wanted cell a dropped thing may land.
pub const PLACE_NEAR_RADIUS: i32 = 3;

/// Everything needed to put a new thing into the world.
#[derive(Debug, Clone)]
pub struct ThingSpawn {
    pub id: Option<ThingId>,
    pub def: ThingDef,
    pub kind: Option<UpgradableKind>,
    pub quality: Option<Quality>,
    pub stack_count: u32,
    pub hit_points: Option<HitPoints>,
    pub cell: Cell,
    pub spawned: bool,
    pub player_owned: bool,
    pub forbidden: bool,
    pub burning: bool,
}

impl ThingSpawn {
    fn base(def: ThingDef, kind: Option<UpgradableKind>, cell: Cell) -> Self {
        Self {
            id: None,
            def,
            kind,
            quality: None,
            stack_count: 1,
            hit_points: None,
            cell,
            spawned: true,
            player_owned: false,
            forbidden: false,
            burning: false,
        }
    }

    /// A raw material stack.
    pub fn material(def_name: impl Into<String>, count: u32, cell: Cell) -> Self {
        let mut spawn = Self::base(ThingDef::new(def_name), None, cell);
        spawn.stack_count = count;
        spawn
    }

    pub fn item(def: ThingDef, quality: Quality, cell: Cell) -> Self {
        let mut spawn = Self::base(def, Some(UpgradableKind::Item), cell);
        spawn.quality = Some(quality);
        spawn.player_owned = true;
        spawn
    }

    pub fn structure(def: ThingDef, quality: Quality, cell: Cell) -> Self {
        let mut spawn = Self::base(def, Some(UpgradableKind::Structure), cell);
        spawn.quality = Some(quality);
        spawn.player_owned = true;
        spawn
    }

    pub fn with_id(mut self, id: ThingId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_quality(mut self, quality: Option<Quality>) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_hit_points(mut self, hit_points: HitPoints) -> Self {
        self.hit_points = Some(hit_points);
        self
    }

    pub fn owned(mut self, player_owned: bool) -> Self {
        self.player_owned = player_owned;
        self
    }

    pub fn forbidden(mut self) -> Self {
        self.forbidden = true;
        self
    }

    pub fn burning(mut self) -> Self {
        self.burning = true;
        self
    }

    /// Created held (inside an order or carried) rather than on the floor.
    pub fn unspawned(mut self) -> Self {
        self.spawned = false;
        self
    }

    fn is_haulable(&self) -> bool {
        !matches!(self.kind, Some(UpgradableKind::Structure))
    }
}

/// Creates the entity and registers its id.
pub fn spawn_thing(world: &mut World, spawn: ThingSpawn) -> Entity {
    let id = match spawn.id {
        Some(id) => id,
        None => world.resource_mut::<ThingRegistry>().allocate_id(),
    };
    let hit_points = spawn.hit_points.unwrap_or_else(|| {
        let max = world
            .get_resource::<DefDatabase>()
            .and_then(|db| db.thing(&spawn.def.def_name))
            .map(|d| d.max_hit_points)
            .unwrap_or(100);
        HitPoints::full(max)
    });
    let haulable = spawn.is_haulable();

    let mut entity = world.spawn((
        id,
        spawn.def,
        StackCount(spawn.stack_count),
        hit_points,
        Position(spawn.cell),
    ));
    if let Some(kind) = spawn.kind {
        entity.insert(kind);
    }
    if let Some(quality) = spawn.quality {
        entity.insert(ThingQuality(quality));
    }
    if haulable {
        entity.insert(Haulable);
    }
    if spawn.spawned {
        entity.insert(Spawned);
    }
    if spawn.player_owned {
        entity.insert(PlayerOwned);
    }
    if spawn.forbidden {
        entity.insert(Forbidden);
    }
    if spawn.burning {
        entity.insert(Burning);
    }
    let entity = entity.id();

    world.resource_mut::<ThingRegistry>().register(id, entity);
    entity
}

pub fn is_spawned(world: &World, entity: Entity) -> bool {
    world.get::<Spawned>(entity).is_some()
}

pub fn position_of(world: &World, entity: Entity) -> Option<Cell> {
    world.get::<Position>(entity).map(|p| p.0)
}

pub fn thing_id_of(world: &World, entity: Entity) -> Option<ThingId> {
    world.get::<ThingId>(entity).copied()
}

/// Takes the thing off the floor without destroying it.
pub fn hold(world: &mut World, entity: Entity) {
    if let Some(mut e) = world.get_entity_mut(entity) {
        e.remove::<Spawned>();
    }
}

/// Puts a held thing back on the floor at exactly `cell`.
pub fn release_at(world: &mut World, entity: Entity, cell: Cell) {
    let Some(mut e) = world.get_entity_mut(entity) else {
        return;
    };
    e.insert((Position(cell), Spawned));
    if world.get::<UpgradeIntent>(entity).is_some() {
        intent::post_spawn_setup(world, entity);
    }
}

/// Splits `count` units off a stack, held and ready to carry.
///
/// Taking the whole stack (or more) holds the original entity.
pub fn take_from_stack(world: &mut World, stack: Entity, count: u32) -> Option<Entity> {
    let available = world.get::<StackCount>(stack)?.0;
    if count >= available {
        hold(world, stack);
        return Some(stack);
    }

    let def = world.get::<ThingDef>(stack)?.clone();
    let cell = position_of(world, stack)?;
    let quality = world.get::<ThingQuality>(stack).map(|q| q.0);
    if let Some(mut remaining) = world.get_mut::<StackCount>(stack) {
        remaining.0 -= count;
    }

    let mut spawn = ThingSpawn::material(def.def_name.clone(), count, cell)
        .with_quality(quality)
        .unspawned();
    spawn.def = def;
    Some(spawn_thing(world, spawn))
}

/// Cells holding a spawned portable thing, other than `ignore`.
pub fn occupied_item_cells(world: &World, ignore: Option<Entity>) -> HashSet<Cell> {
    world
        .iter_entities()
        .filter(|e| Some(e.id()) != ignore)
        .filter(|e| e.contains::<Spawned>() && e.contains::<Haulable>())
        .filter_map(|e| e.get::<Position>().map(|p| p.0))
        .collect()
}

/// Drops a held thing on the nearest free standable cell around `cell`.
pub fn place_near(world: &mut World, entity: Entity, cell: Cell) -> Result<Cell, PlacementError> {
    if world.get_entity(entity).is_none() {
        return Err(PlacementError::MissingEntity(entity));
    }
    let occupied = occupied_item_cells(world, Some(entity));
    let grid = world.resource::<RegionGrid>();

    let mut found = None;
    'rings: for radius in 0..=PLACE_NEAR_RADIUS {
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs().max(dz.abs()) != radius {
                    continue;
                }
                let candidate = Cell::new(cell.x + dx, cell.z + dz);
                if grid.is_standable(candidate) && !occupied.contains(&candidate) {
                    found = Some(candidate);
                    break 'rings;
                }
            }
        }
    }

    match found {
        Some(target) => {
            release_at(world, entity, target);
            Ok(target)
        }
        None => Err(PlacementError::NoFreeCell {
            x: cell.x,
            z: cell.z,
            radius: PLACE_NEAR_RADIUS,
        }),
    }
}

/// Spawns material stacks around `cell`.
pub fn spawn_refund(world: &mut World, materials: &[MaterialCount], cell: Cell) {
    for material in materials.iter().filter(|m| m.count > 0) {
        let stack = spawn_thing(
            world,
            ThingSpawn::material(material.def_name.clone(), material.count, cell).unspawned(),
        );
        if let Err(e) = place_near(world, stack, cell) {
            tracing::warn!("Refund of {} {} dropped in place: {}", material.count, material.def_name, e);
            release_at(world, stack, cell);
        }
    }
}

/// Removes the entity and forgets its id. No notifications.
pub fn despawn_thing(world: &mut World, entity: Entity) {
    if let Some(id) = thing_id_of(world, entity) {
        world.resource_mut::<ThingRegistry>().unregister(id);
    }
    if let Some(mut reservations) = world.get_resource_mut::<Reservations>() {
        reservations.release(entity);
    }
    world.despawn(entity);
}

/// Destroys a thing from outside the engine (fire, deconstruction, ...).
///
/// Orders are torn down as killed, upgradable objects drop their intent.
pub fn destroy_thing(world: &mut World, entity: Entity) {
    if world.get::<ConstructionOrder>(entity).is_some() {
        orders::destroy_construction_order(world, entity, DestroyMode::Kill);
        return;
    }
    if world.get::<WorkOrder>(entity).is_some() {
        orders::destroy_work_order(world, entity, DestroyMode::Kill);
        return;
    }
    if world.get::<UpgradeIntent>(entity).is_some() {
        intent::notify_object_destroyed(world, entity);
    }
    despawn_thing(world, entity);
}
