//! Requirement Calculator
//!
//! Materials needed to raise an object by one tier: the object's base
//! cost, scaled by the multiplier of its current tier and rounded up.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use upgrade_events::{MaterialCount, Quality, QualityRange};

use crate::components::order::RequirementLine;
use crate::components::thing::{ThingDef, ThingQuality, UpgradableKind};
use crate::config::UpgradeSettings;
use crate::map::defs::{DefDatabase, IngredientSpec};

/// Tier-independent cost of one kind of object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseCost {
    Lines(Vec<MaterialCount>),
    /// Nothing is known about how the object is made: one more of the
    /// same object at the same tier is required.
    SameTierDuplicate,
}

/// Resource: base costs per (definition, material) pair
#[derive(Resource, Debug, Default)]
pub struct CostCache {
    entries: HashMap<(String, Option<String>), BaseCost>,
    hits: u64,
    misses: u64,
}

impl CostCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_resolve(&mut self, db: &DefDatabase, def: &ThingDef) -> BaseCost {
        let key = (def.def_name.clone(), def.stuff.clone());
        if let Some(cost) = self.entries.get(&key) {
            self.hits += 1;
            return cost.clone();
        }
        self.misses += 1;
        let cost = resolve_base_cost(db, def);
        self.entries.insert(key, cost.clone());
        cost
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Works out the base cost without consulting the cache.
///
/// Direct build costs win; otherwise the first production recipe for the
/// object's definition; otherwise [`BaseCost::SameTierDuplicate`].
pub fn resolve_base_cost(db: &DefDatabase, def: &ThingDef) -> BaseCost {
    if let Some(definition) = db.thing(&def.def_name) {
        if definition.is_buildable() {
            return BaseCost::Lines(definition.cost_list_adjusted(def.stuff.as_deref()));
        }
    }

    let Some(recipe) = db.production_recipe_for(&def.def_name) else {
        return BaseCost::SameTierDuplicate;
    };

    let mut lines: Vec<MaterialCount> = Vec::new();
    for ingredient in &recipe.ingredients {
        let def_name = match &ingredient.spec {
            IngredientSpec::Fixed(name) => name.clone(),
            IngredientSpec::Stuff => match &def.stuff {
                Some(stuff) => stuff.clone(),
                None => {
                    tracing::warn!(
                        "Recipe {} wants a material but {} has none; ingredient skipped",
                        recipe.name,
                        def.def_name
                    );
                    continue;
                }
            },
        };
        let count = db.count_required_of_for(ingredient.base_count, &def_name);
        match lines.iter_mut().find(|l| l.def_name == def_name) {
            Some(line) => line.count += count,
            None => lines.push(MaterialCount::new(def_name, count)),
        }
    }
    BaseCost::Lines(lines)
}

/// Multiplier for upgrading out of `quality`.
///
/// The terminal tier has no transition; asking for it is logged as an
/// error and yields 0.
pub fn tier_multiplier(settings: &UpgradeSettings, quality: Quality) -> f32 {
    match settings.multipliers.for_transition(quality) {
        Some(multiplier) => multiplier,
        None => {
            tracing::error!("Tier multiplier requested for {}, which has no further tier", quality);
            0.0
        }
    }
}

fn scale(count: u32, multiplier: f32) -> u32 {
    (count as f32 * multiplier).ceil().max(0.0) as u32
}

/// Requirement lines for an object of `def` currently at `quality`.
pub fn requirements_for(
    def: &ThingDef,
    quality: Quality,
    db: &DefDatabase,
    settings: &UpgradeSettings,
    cache: &mut CostCache,
) -> Vec<RequirementLine> {
    let multiplier = tier_multiplier(settings, quality);
    let lines = match cache.get_or_resolve(db, def) {
        BaseCost::Lines(lines) => lines
            .iter()
            .map(|l| RequirementLine::new(l.def_name.clone(), scale(l.count, multiplier)))
            .collect::<Vec<_>>(),
        BaseCost::SameTierDuplicate => vec![RequirementLine::new(def.def_name.clone(), scale(1, multiplier))
            .with_quality(QualityRange::exactly(quality))],
    };
    lines.into_iter().filter(|l| l.count > 0).collect()
}

/// Requirement lines for the object's current tier. Empty if it has no quality.
pub fn compute_requirements(world: &mut World, entity: Entity) -> Vec<RequirementLine> {
    let Some(quality) = world.get::<ThingQuality>(entity).map(|q| q.0) else {
        return Vec::new();
    };
    let Some(def) = world.get::<ThingDef>(entity).cloned() else {
        return Vec::new();
    };

    world.resource_scope(|world, mut cache: Mut<CostCache>| {
        let db = world.resource::<DefDatabase>();
        let settings = world.resource::<UpgradeSettings>();
        requirements_for(&def, quality, db, settings, &mut cache)
    })
}

/// Labor needed for one tier step: build work for structures, make work
/// for items, scaled like the materials.
pub fn tier_scaled_work(world: &World, entity: Entity) -> f32 {
    let Some(quality) = world.get::<ThingQuality>(entity).map(|q| q.0) else {
        return 0.0;
    };
    let Some(def) = world.get::<ThingDef>(entity) else {
        return 0.0;
    };
    let base = world
        .resource::<DefDatabase>()
        .thing(&def.def_name)
        .map(|d| match world.get::<UpgradableKind>(entity) {
            Some(UpgradableKind::Structure) => d.work_to_build,
            _ => d.work_to_make,
        })
        .unwrap_or(0.0);
    base * tier_multiplier(world.resource::<UpgradeSettings>(), quality)
}

/// Replaces the settings and drops cached base costs.
pub fn apply_settings(world: &mut World, settings: UpgradeSettings) {
    world.insert_resource(settings);
    if let Some(mut cache) = world.get_resource_mut::<CostCache>() {
        cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::defs::{Ingredient, RecipeDef, ThingDefinition};

    fn db() -> DefDatabase {
        DefDatabase::new()
            .with_thing(ThingDefinition::material("steel", 75))
            .with_thing(ThingDefinition::material("component", 25))
            .with_thing(
                ThingDefinition::structure("table")
                    .with_stuff_cost(45)
                    .with_work_to_build(1000.0),
            )
            .with_thing(ThingDefinition::item("longsword").with_work_to_make(400.0))
            .with_thing(ThingDefinition::item("rifle"))
            .with_thing(ThingDefinition::item("sculpture"))
            .with_recipe(
                RecipeDef::new("make_longsword", "longsword").with_ingredient(Ingredient::stuff(100.0)),
            )
            .with_recipe(
                RecipeDef::new("make_rifle", "rifle")
                    .with_ingredient(Ingredient::fixed("steel", 30.0))
                    .with_ingredient(Ingredient::fixed("component", 3.0)),
            )
    }

    fn lines(def: &ThingDef, quality: Quality, settings: &UpgradeSettings) -> Vec<RequirementLine> {
        requirements_for(def, quality, &db(), settings, &mut CostCache::new())
    }

    #[test]
    fn test_build_cost_scaled_by_tier() {
        let table = ThingDef::new("table").with_stuff("steel");
        let settings = UpgradeSettings::default();

        assert_eq!(lines(&table, Quality::Awful, &settings), vec![RequirementLine::new("steel", 45)]);
        assert_eq!(lines(&table, Quality::Poor, &settings), vec![RequirementLine::new("steel", 90)]);
        assert_eq!(lines(&table, Quality::Masterwork, &settings), vec![RequirementLine::new("steel", 270)]);
    }

    #[test]
    fn test_fractional_counts_round_up() {
        let mut settings = UpgradeSettings::default();
        settings.multipliers.awful_to_poor = 1.5;
        let rifle = ThingDef::new("rifle");

        let result = lines(&rifle, Quality::Awful, &settings);
        assert_eq!(result[0], RequirementLine::new("steel", 45));
        assert_eq!(result[1], RequirementLine::new("component", 5));
    }

    #[test]
    fn test_recipe_uses_object_material() {
        let sword = ThingDef::new("longsword").with_stuff("steel");
        let result = lines(&sword, Quality::Normal, &UpgradeSettings::default());
        assert_eq!(result, vec![RequirementLine::new("steel", 300)]);
    }

    #[test]
    fn test_unknown_recipe_falls_back_to_duplicate() {
        let sculpture = ThingDef::new("sculpture");
        let result = lines(&sculpture, Quality::Good, &UpgradeSettings::default());
        assert_eq!(
            result,
            vec![RequirementLine::new("sculpture", 4).with_quality(QualityRange::exactly(Quality::Good))]
        );
    }

    #[test]
    fn test_terminal_tier_yields_nothing() {
        let table = ThingDef::new("table").with_stuff("steel");
        assert!(lines(&table, Quality::Legendary, &UpgradeSettings::default()).is_empty());
        assert_eq!(tier_multiplier(&UpgradeSettings::default(), Quality::Legendary), 0.0);
    }

    #[test]
    fn test_cache_keyed_by_material() {
        let db = db();
        let settings = UpgradeSettings::default();
        let mut cache = CostCache::new();

        let steel_table = ThingDef::new("table").with_stuff("steel");
        let wood_table = ThingDef::new("table").with_stuff("wood_log");
        requirements_for(&steel_table, Quality::Poor, &db, &settings, &mut cache);
        requirements_for(&steel_table, Quality::Good, &db, &settings, &mut cache);
        let wood = requirements_for(&wood_table, Quality::Poor, &db, &settings, &mut cache);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
        assert_eq!(wood[0].def_name, "wood_log");
    }

    #[test]
    fn test_compute_requirements_needs_quality() {
        let mut world = World::new();
        world.insert_resource(db());
        world.insert_resource(UpgradeSettings::default());
        world.insert_resource(CostCache::new());

        let bare = world.spawn(ThingDef::new("table").with_stuff("steel")).id();
        assert!(compute_requirements(&mut world, bare).is_empty());

        let table = world
            .spawn((
                ThingDef::new("table").with_stuff("steel"),
                ThingQuality(Quality::Normal),
                UpgradableKind::Structure,
            ))
            .id();
        assert_eq!(compute_requirements(&mut world, table), vec![RequirementLine::new("steel", 135)]);
        assert_eq!(tier_scaled_work(&world, table), 3000.0);
    }

    #[test]
    fn test_apply_settings_clears_cache() {
        let mut world = World::new();
        world.insert_resource(db());
        world.insert_resource(UpgradeSettings::default());
        world.insert_resource(CostCache::new());
        let table = world
            .spawn((ThingDef::new("table").with_stuff("steel"), ThingQuality(Quality::Poor)))
            .id();

        compute_requirements(&mut world, table);
        assert_eq!(world.resource::<CostCache>().len(), 1);

        let mut settings = UpgradeSettings::default();
        settings.multipliers.poor_to_normal = 1.0;
        apply_settings(&mut world, settings);
        assert!(world.resource::<CostCache>().is_empty());
        assert_eq!(compute_requirements(&mut world, table), vec![RequirementLine::new("steel", 45)]);
    }
}
