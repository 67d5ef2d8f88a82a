//! Demo Definitions
//!
//! Materials, furniture, workbenches and craftable items of the demo colony.

use crate::map::defs::{DefDatabase, Ingredient, RecipeDef, ThingDefinition};

/// Every definition and recipe the demo colony uses.
pub fn create_def_database() -> DefDatabase {
    DefDatabase::new()
        // === MATERIALS ===
        .with_thing(ThingDefinition::material("steel", 75))
        .with_thing(ThingDefinition::material("wood_log", 75))
        .with_thing(ThingDefinition::material("cloth", 75))
        .with_thing(ThingDefinition::material("component", 25))
        // === FURNITURE ===
        .with_thing(
            ThingDefinition::structure("table")
                .with_stuff_cost(45)
                .with_work_to_build(100.0)
                .with_hit_points(100),
        )
        .with_thing(
            ThingDefinition::structure("armchair")
                .with_stuff_cost(110)
                .with_work_to_build(150.0)
                .with_hit_points(100),
        )
        // === WORKBENCHES ===
        .with_thing(
            ThingDefinition::structure("smithy")
                .with_stuff_cost(100)
                .with_cost("component", 2)
                .with_work_to_build(300.0)
                .with_hit_points(200),
        )
        .with_thing(
            ThingDefinition::structure("tailor_bench")
                .with_stuff_cost(75)
                .with_cost("component", 2)
                .with_work_to_build(250.0)
                .with_hit_points(150),
        )
        // === ITEMS ===
        .with_thing(ThingDefinition::item("longsword").with_work_to_make(400.0))
        .with_thing(ThingDefinition::item("parka").with_work_to_make(300.0))
        .with_thing(ThingDefinition::item("rifle").with_work_to_make(500.0))
        .with_thing(ThingDefinition::item("sculpture").with_work_to_make(800.0))
        // === RECIPES ===
        .with_recipe(RecipeDef::new("make_longsword", "longsword").with_ingredient(Ingredient::stuff(100.0)))
        .with_recipe(RecipeDef::new("make_parka", "parka").with_ingredient(Ingredient::stuff(80.0)))
        .with_recipe(
            RecipeDef::new("make_rifle", "rifle")
                .with_ingredient(Ingredient::fixed("steel", 30.0))
                .with_ingredient(Ingredient::fixed("component", 3.0)),
        )
}
