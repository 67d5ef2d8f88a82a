//! Definition Database
//!
//! Static descriptions of every kind of thing and every production recipe.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use upgrade_events::MaterialCount;

/// Broad category of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefCategory {
    /// Built in place; never hauled.
    Structure,
    /// Portable, carries a quality.
    Item,
    /// Portable raw material, stackable.
    Material,
}

/// Description of one kind of thing.
#[derive(Debug, Clone)]
pub struct ThingDefinition {
    pub name: String,
    pub category: DefCategory,
    /// Fixed build costs.
    pub cost_list: Vec<MaterialCount>,
    /// Units of the thing's own material needed to build it.
    pub cost_stuff_count: u32,
    pub work_to_build: f32,
    pub work_to_make: f32,
    /// Units of this material counted as one unit of volume by recipes.
    pub volume_per_unit: f32,
    pub max_hit_points: u32,
    pub stack_limit: u32,
    pub has_quality: bool,
}

impl ThingDefinition {
    fn base(name: impl Into<String>, category: DefCategory) -> Self {
        Self {
            name: name.into(),
            category,
            cost_list: Vec::new(),
            cost_stuff_count: 0,
            work_to_build: 0.0,
            work_to_make: 0.0,
            volume_per_unit: 1.0,
            max_hit_points: 100,
            stack_limit: 1,
            has_quality: false,
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        let mut def = Self::base(name, DefCategory::Structure);
        def.has_quality = true;
        def
    }

    pub fn item(name: impl Into<String>) -> Self {
        let mut def = Self::base(name, DefCategory::Item);
        def.has_quality = true;
        def
    }

    pub fn material(name: impl Into<String>, stack_limit: u32) -> Self {
        let mut def = Self::base(name, DefCategory::Material);
        def.stack_limit = stack_limit;
        def
    }

    pub fn with_cost(mut self, def_name: impl Into<String>, count: u32) -> Self {
        self.cost_list.push(MaterialCount::new(def_name, count));
        self
    }

    pub fn with_stuff_cost(mut self, count: u32) -> Self {
        self.cost_stuff_count = count;
        self
    }

    pub fn with_work_to_build(mut self, work: f32) -> Self {
        self.work_to_build = work;
        self
    }

    pub fn with_work_to_make(mut self, work: f32) -> Self {
        self.work_to_make = work;
        self
    }

    pub fn with_volume(mut self, volume_per_unit: f32) -> Self {
        self.volume_per_unit = volume_per_unit;
        self
    }

    pub fn with_hit_points(mut self, max: u32) -> Self {
        self.max_hit_points = max;
        self
    }

    pub fn without_quality(mut self) -> Self {
        self.has_quality = false;
        self
    }

    pub fn is_haulable(&self) -> bool {
        self.category != DefCategory::Structure
    }

    /// Has a direct construction cost.
    pub fn is_buildable(&self) -> bool {
        !self.cost_list.is_empty() || self.cost_stuff_count > 0
    }

    /// Fixed costs plus the material-variant cost, merged by definition.
    pub fn cost_list_adjusted(&self, stuff: Option<&str>) -> Vec<MaterialCount> {
        let mut costs: Vec<MaterialCount> = Vec::new();
        if let Some(stuff) = stuff {
            if self.cost_stuff_count > 0 {
                costs.push(MaterialCount::new(stuff, self.cost_stuff_count));
            }
        }
        for cost in &self.cost_list {
            match costs.iter_mut().find(|c| c.def_name == cost.def_name) {
                Some(existing) => existing.count += cost.count,
                None => costs.push(cost.clone()),
            }
        }
        costs
    }
}

/// Which material an ingredient accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngredientSpec {
    /// Exactly this definition.
    Fixed(String),
    /// Whatever material the product is made from.
    Stuff,
}

#[derive(Debug, Clone)]
pub struct Ingredient {
    pub spec: IngredientSpec,
    /// Volume before dividing by the material's volume per unit.
    pub base_count: f32,
}

impl Ingredient {
    pub fn fixed(def_name: impl Into<String>, count: f32) -> Self {
        Self {
            spec: IngredientSpec::Fixed(def_name.into()),
            base_count: count,
        }
    }

    pub fn stuff(count: f32) -> Self {
        Self {
            spec: IngredientSpec::Stuff,
            base_count: count,
        }
    }
}

/// A production recipe.
#[derive(Debug, Clone)]
pub struct RecipeDef {
    pub name: String,
    pub products: Vec<MaterialCount>,
    pub ingredients: Vec<Ingredient>,
    pub is_surgery: bool,
}

impl RecipeDef {
    pub fn new(name: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            products: vec![MaterialCount::new(product, 1)],
            ingredients: Vec::new(),
            is_surgery: false,
        }
    }

    pub fn with_ingredient(mut self, ingredient: Ingredient) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    /// Produces exactly one kind of product, and it is `def_name`.
    pub fn produces_only(&self, def_name: &str) -> bool {
        self.products.len() == 1 && self.products[0].def_name == def_name
    }
}

/// Resource: every definition and recipe
#[derive(Resource, Debug, Default)]
pub struct DefDatabase {
    things: HashMap<String, ThingDefinition>,
    recipes: Vec<RecipeDef>,
}

impl DefDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thing(&mut self, def: ThingDefinition) {
        self.things.insert(def.name.clone(), def);
    }

    pub fn add_recipe(&mut self, recipe: RecipeDef) {
        self.recipes.push(recipe);
    }

    pub fn with_thing(mut self, def: ThingDefinition) -> Self {
        self.add_thing(def);
        self
    }

    pub fn with_recipe(mut self, recipe: RecipeDef) -> Self {
        self.add_recipe(recipe);
        self
    }

    pub fn thing(&self, def_name: &str) -> Option<&ThingDefinition> {
        self.things.get(def_name)
    }

    pub fn recipes(&self) -> &[RecipeDef] {
        &self.recipes
    }

    /// First non-surgical recipe making only `def_name` from a non-empty
    /// ingredient list.
    pub fn production_recipe_for(&self, def_name: &str) -> Option<&RecipeDef> {
        self.recipes
            .iter()
            .find(|r| !r.is_surgery && r.produces_only(def_name) && !r.ingredients.is_empty())
    }

    /// Whole units of `def_name` covering `base_count` volume.
    pub fn count_required_of_for(&self, base_count: f32, def_name: &str) -> u32 {
        let volume = self
            .thing(def_name)
            .map(|d| d.volume_per_unit)
            .filter(|v| *v > 0.0)
            .unwrap_or(1.0);
        (base_count / volume).ceil().max(0.0) as u32
    }

    pub fn len(&self) -> usize {
        self.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }
}
