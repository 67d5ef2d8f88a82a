//! Upgrade Options
//!
//! What the upgrade command offers for a selection of objects, and
//! applying the chosen option.

use bevy_ecs::prelude::*;

use upgrade_events::Quality;

use crate::components::thing::{PlayerOwned, ThingDef, ThingQuality, UpgradableKind};
use crate::config::UpgradeSettings;
use crate::error::UpgradeError;
use crate::map::defs::DefDatabase;
use crate::systems::intent::set_desired_quality;

/// One entry of the upgrade command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOption {
    pub desired: Quality,
    pub keep: bool,
    pub label: String,
}

impl UpgradeOption {
    fn new(desired: Quality, keep: bool) -> Self {
        let label = if keep {
            format!("Upgrade to {} and keep", desired)
        } else {
            format!("Upgrade to {}", desired)
        };
        Self { desired, keep, label }
    }
}

fn keep_option_enabled(world: &World) -> bool {
    world
        .get_resource::<UpgradeSettings>()
        .map(|s| s.limits.keep_option_enabled)
        .unwrap_or(false)
}

/// Whether the upgrade command applies to `thing` at all.
///
/// Structures need a build cost or a recipe producing them; items need
/// the recipe.
pub fn can_be_upgraded(world: &World, thing: Entity) -> bool {
    let Some(entity) = world.get_entity(thing) else {
        return false;
    };
    if !entity.contains::<PlayerOwned>() {
        return false;
    }
    let Some(quality) = entity.get::<ThingQuality>().map(|q| q.0) else {
        return false;
    };
    if !keep_option_enabled(world) && quality >= Quality::MAX {
        return false;
    }

    let (Some(def), Some(kind)) = (entity.get::<ThingDef>(), entity.get::<UpgradableKind>()) else {
        return false;
    };
    let Some(db) = world.get_resource::<DefDatabase>() else {
        return false;
    };
    match kind {
        UpgradableKind::Structure => {
            db.thing(&def.def_name).is_some_and(|d| d.is_buildable())
                || db.production_recipe_for(&def.def_name).is_some()
        }
        UpgradableKind::Item => db.production_recipe_for(&def.def_name).is_some(),
    }
}

/// Options for `selection`, highest tier first.
///
/// Tiers above the lowest quality in the selection are offered as plain
/// upgrades; every allowed tier gets a keep variant when keeping is
/// enabled.
pub fn upgrade_options(world: &World, selection: &[Entity]) -> Vec<UpgradeOption> {
    let upgradable: Vec<Entity> = selection
        .iter()
        .copied()
        .filter(|e| can_be_upgraded(world, *e))
        .collect();
    if upgradable.is_empty() {
        return Vec::new();
    }

    let lowest = upgradable
        .iter()
        .filter_map(|e| world.get::<ThingQuality>(*e).map(|q| q.0))
        .min()
        .unwrap_or(Quality::MAX);
    let max = world
        .get_resource::<UpgradeSettings>()
        .map(|s| s.limits.max_quality)
        .unwrap_or(Quality::MAX);
    let keep = keep_option_enabled(world);

    let mut options = Vec::new();
    for tier in Quality::ALL.iter().rev().copied().filter(|q| *q <= max) {
        if tier > lowest {
            options.push(UpgradeOption::new(tier, false));
        }
        if keep {
            options.push(UpgradeOption::new(tier, true));
        }
    }
    options
}

/// Applies `option` to every structure in `selection`.
///
/// Returns how many objects took the new target; the rest are logged.
pub fn apply_option(world: &mut World, selection: &[Entity], option: &UpgradeOption) -> usize {
    let mut applied = 0;
    for thing in selection {
        match set_desired_quality(world, *thing, option.desired, option.keep) {
            Ok(()) => applied += 1,
            Err(UpgradeError::NotAStructure(_)) => {
                tracing::debug!("{:?} is upgraded through bills, not the command", thing)
            }
            Err(e) => tracing::warn!("Could not apply '{}' to {:?}: {}", option.label, thing, e),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::intent::UpgradeIntent;
    use crate::components::world::Cell;
    use crate::map::defs::{Ingredient, RecipeDef, ThingDefinition};
    use crate::map::things::{spawn_thing, ThingSpawn};
    use crate::setup::bare_world;

    fn table(world: &mut World, quality: Quality) -> Entity {
        spawn_thing(
            world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), quality, Cell::new(4, 4)),
        )
    }

    fn set_keep_enabled(world: &mut World, enabled: bool) {
        world.resource_mut::<UpgradeSettings>().limits.keep_option_enabled = enabled;
    }

    #[test]
    fn test_can_be_upgraded() {
        let mut world = bare_world(1);
        let poor = table(&mut world, Quality::Poor);
        let legendary = table(&mut world, Quality::Legendary);
        let sword = spawn_thing(
            &mut world,
            ThingSpawn::item(ThingDef::new("longsword").with_stuff("steel"), Quality::Poor, Cell::new(6, 6)),
        );
        let sculpture = spawn_thing(
            &mut world,
            ThingSpawn::item(ThingDef::new("sculpture"), Quality::Poor, Cell::new(7, 7)),
        );
        let foreign = spawn_thing(
            &mut world,
            ThingSpawn::structure(ThingDef::new("table").with_stuff("steel"), Quality::Poor, Cell::new(8, 8))
                .owned(false),
        );

        assert!(can_be_upgraded(&world, poor));
        assert!(!can_be_upgraded(&world, legendary));
        assert!(can_be_upgraded(&world, sword));
        assert!(!can_be_upgraded(&world, sculpture));
        assert!(!can_be_upgraded(&world, foreign));

        set_keep_enabled(&mut world, true);
        assert!(can_be_upgraded(&world, legendary));
    }

    #[test]
    fn test_recipe_only_structure_can_be_upgraded() {
        let mut world = bare_world(1);
        {
            let mut db = world.resource_mut::<DefDatabase>();
            db.add_thing(ThingDefinition::structure("grand_statue").with_work_to_make(900.0));
            db.add_thing(ThingDefinition::structure("rubble_pile"));
            db.add_recipe(RecipeDef::new("make_grand_statue", "grand_statue").with_ingredient(Ingredient::stuff(80.0)));
        }
        let statue = spawn_thing(
            &mut world,
            ThingSpawn::structure(ThingDef::new("grand_statue").with_stuff("steel"), Quality::Poor, Cell::new(5, 5)),
        );
        let rubble = spawn_thing(
            &mut world,
            ThingSpawn::structure(ThingDef::new("rubble_pile"), Quality::Poor, Cell::new(9, 9)),
        );

        assert!(!world.resource::<DefDatabase>().thing("grand_statue").unwrap().is_buildable());
        assert!(can_be_upgraded(&world, statue));
        assert!(!can_be_upgraded(&world, rubble));
        assert_eq!(upgrade_options(&world, &[statue, rubble])[0].desired, Quality::Legendary);
    }

    #[test]
    fn test_options_start_above_lowest_tier() {
        let mut world = bare_world(1);
        let normal = table(&mut world, Quality::Normal);
        let good = table(&mut world, Quality::Good);

        let tiers: Vec<Quality> = upgrade_options(&world, &[good, normal])
            .into_iter()
            .map(|o| o.desired)
            .collect();
        assert_eq!(
            tiers,
            vec![
                Quality::Legendary,
                Quality::Masterwork,
                Quality::Excellent,
                Quality::Good
            ]
        );
    }

    #[test]
    fn test_keep_options_and_max_quality() {
        let mut world = bare_world(1);
        let excellent = table(&mut world, Quality::Excellent);
        set_keep_enabled(&mut world, true);
        world.resource_mut::<UpgradeSettings>().limits.max_quality = Quality::Masterwork;

        let options = upgrade_options(&world, &[excellent]);
        assert_eq!(options[0], UpgradeOption::new(Quality::Masterwork, false));
        assert_eq!(options[0].label, "Upgrade to masterwork");
        assert_eq!(options[1].label, "Upgrade to masterwork and keep");
        assert!(options.iter().all(|o| o.desired <= Quality::Masterwork));
        // One plain option, then a keep option for each of the six allowed tiers.
        assert_eq!(options.len(), 7);
    }

    #[test]
    fn test_apply_option_skips_items() {
        let mut world = bare_world(1);
        let table = table(&mut world, Quality::Poor);
        let sword = spawn_thing(
            &mut world,
            ThingSpawn::item(ThingDef::new("longsword").with_stuff("steel"), Quality::Poor, Cell::new(6, 6)),
        );
        let option = UpgradeOption::new(Quality::Good, false);

        assert_eq!(apply_option(&mut world, &[table, sword], &option), 1);
        assert_eq!(world.get::<UpgradeIntent>(table).unwrap().desired, Quality::Good);
        assert!(world.get::<UpgradeIntent>(sword).is_none());
    }
}
