//! Writes recipe data into the constant combinators beside each factory.
//!
//! Every factory with a recipe owns two combinators at fixed tile offsets:
//! one listing the recipe's ingredients, one holding its primary output.
//! Finding zero or several combinators at an offset, or one without the
//! expected marker signal, aborts the whole pass.

use tracing::{debug, warn};

use crate::blueprint::{Area, Blueprint, SignalId};
use crate::config::BlockLayout;
use crate::error::{CombinatorRole, SyncError};
use crate::metadata::RecipeSource;
use crate::models::ResultDescriptor;

/// What a synchronisation pass wrote and what it had to compromise on
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    /// Factories whose combinators were written
    pub synced: usize,
    /// Recipes whose ingredient list did not fit in the combinator
    pub truncated: Vec<String>,
    /// (recipe, guessed output) pairs where the two names differ
    pub output_mismatches: Vec<(String, String)>,
}

/// Guess a recipe's main product: the first result it lists.
pub fn guess_primary_output(
    recipe: &str,
    recipes: &impl RecipeSource,
) -> Result<SignalId, SyncError> {
    let results = recipes
        .results_of(recipe)
        .ok_or_else(|| SyncError::UnknownRecipe(recipe.to_string()))?;
    let first = results
        .first()
        .ok_or_else(|| SyncError::NoResults(recipe.to_string()))?;

    let guess = match first {
        ResultDescriptor::Bare(name) => SignalId::new(first.kind(), name.as_str()),
        ResultDescriptor::Counted { name, kind, .. } => SignalId::new(*kind, name.as_str()),
    };
    if guess.name != recipe {
        warn!(
            recipe,
            output = %guess.name,
            "guessed primary output differs from the recipe name"
        );
    }
    Ok(guess)
}

fn find_combinator(
    blueprint: &Blueprint,
    factory: usize,
    role: CombinatorRole,
    layout: &BlockLayout,
) -> Result<usize, SyncError> {
    let (offset, marker) = match role {
        CombinatorRole::Ingredients => (layout.ingredients_offset, &layout.ingredients_marker),
        CombinatorRole::Output => (layout.output_offset, &layout.output_marker),
    };

    let owner = &blueprint.entities[factory];
    let (x, y) = owner.tile_position();
    let (x, y) = (x + offset.0, y + offset.1);
    let found = blueprint.find_entities_by_name_in_area(&layout.combinator, &Area::tile(x, y));

    let &[index] = found.as_slice() else {
        return Err(SyncError::CombinatorCount {
            role,
            factory: owner.entity_number,
            x,
            y,
            found: found.len(),
        });
    };

    let combinator = &blueprint.entities[index];
    if combinator.signal_name(0) != Some(marker.as_str()) {
        return Err(SyncError::MarkerMismatch {
            role,
            combinator: combinator.entity_number,
            expected: marker.clone(),
            found: combinator.signal_name(0).map(str::to_string),
        });
    }
    Ok(index)
}

fn write_ingredients(
    blueprint: &mut Blueprint,
    factory: usize,
    recipe: &str,
    recipes: &impl RecipeSource,
    layout: &BlockLayout,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    let combinator = find_combinator(blueprint, factory, CombinatorRole::Ingredients, layout)?;
    let ingredients = recipes
        .ingredients_of(recipe)
        .ok_or_else(|| SyncError::UnknownRecipe(recipe.to_string()))?;

    if ingredients.len() > layout.last_slot {
        warn!(
            recipe,
            ingredients = ingredients.len(),
            slots = layout.last_slot,
            "recipe has more ingredients than combinator slots, some ingredients skipped"
        );
        report.truncated.push(recipe.to_string());
    }

    let entity = &mut blueprint.entities[combinator];
    for (slot, ingredient) in (1..=layout.last_slot).zip(ingredients) {
        entity.set_signal(
            slot,
            SignalId::new(ingredient.kind, ingredient.name.as_str()),
            ingredient.amount,
        );
    }
    Ok(())
}

fn write_output(
    blueprint: &mut Blueprint,
    factory: usize,
    recipe: &str,
    recipes: &impl RecipeSource,
    layout: &BlockLayout,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    let combinator = find_combinator(blueprint, factory, CombinatorRole::Output, layout)?;
    let output = guess_primary_output(recipe, recipes)?;
    if output.name != recipe {
        report
            .output_mismatches
            .push((recipe.to_string(), output.name.clone()));
    }

    let entity = &mut blueprint.entities[combinator];
    let current = entity.signal_name(1);
    if current != Some(layout.output_unset.as_str()) && current != Some(output.name.as_str()) {
        return Err(SyncError::OutputSlotMismatch {
            combinator: entity.entity_number,
            unset: layout.output_unset.clone(),
            guess: output.name,
            found: current.map(str::to_string),
        });
    }
    entity.set_signal(1, output, 1);
    Ok(())
}

/// Write both combinators of every factory that has a recipe, in reading order.
///
/// Errors stop the pass; combinators already written stay written.
pub fn sync_block(
    blueprint: &mut Blueprint,
    recipes: &impl RecipeSource,
    layout: &BlockLayout,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    for factory in blueprint.find_entities_by_name_in_reading_order(&layout.factory) {
        let Some(recipe) = blueprint.entities[factory].recipe.clone() else {
            continue;
        };
        write_ingredients(blueprint, factory, &recipe, recipes, layout, &mut report)?;
        write_output(blueprint, factory, &recipe, recipes, layout, &mut report)?;
        debug!(
            recipe = %recipe,
            factory = blueprint.entities[factory].entity_number,
            "combinators written"
        );
        report.synced += 1;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::blueprint::Entity;
    use crate::grid::Position;
    use crate::metadata::Footprint;
    use crate::models::{Ingredient, SignalKind};

    #[derive(Default)]
    struct Recipes(HashMap<String, (Vec<Ingredient>, Vec<ResultDescriptor>)>);

    impl Recipes {
        fn with(mut self, name: &str, ingredients: Vec<Ingredient>, results: Vec<ResultDescriptor>) -> Self {
            self.0.insert(name.to_string(), (ingredients, results));
            self
        }
    }

    impl RecipeSource for Recipes {
        fn ingredients_of(&self, recipe: &str) -> Option<&[Ingredient]> {
            self.0.get(recipe).map(|(i, _)| i.as_slice())
        }

        fn results_of(&self, recipe: &str) -> Option<&[ResultDescriptor]> {
            self.0.get(recipe).map(|(_, r)| r.as_slice())
        }
    }

    fn item(name: &str, amount: i32) -> Ingredient {
        Ingredient {
            name: name.to_string(),
            kind: SignalKind::Item,
            amount,
        }
    }

    fn counted(name: &str) -> ResultDescriptor {
        ResultDescriptor::Counted {
            name: name.to_string(),
            kind: SignalKind::Item,
            amount: 1,
        }
    }

    fn moss_recipes() -> Recipes {
        Recipes::default().with(
            "moss-farm-mk01",
            vec![
                item("steel-plate", 20),
                Ingredient {
                    name: "water".to_string(),
                    kind: SignalKind::Fluid,
                    amount: 100,
                },
            ],
            vec![counted("moss-farm-mk01")],
        )
    }

    fn combinator(number: u32, tile: (i32, i32), marker: &str) -> Entity {
        let mut c = Entity::new(
            number,
            "constant-combinator",
            Position::new(tile.0 as f64 + 0.5, tile.1 as f64 + 0.5),
        );
        c.set_signal(0, SignalId::virtual_signal(marker), 1);
        c
    }

    /// One 7x7 factory at tile (`x`, 0) with both combinators in place
    fn block(x: i32, recipe: Option<&str>) -> Blueprint {
        let mut factory = Entity::new(1, "automated-factory-mk01", Position::new(x as f64 + 3.5, 3.5));
        factory.footprint = Footprint {
            width: 7,
            height: 7,
        };
        factory.recipe = recipe.map(str::to_string);

        let mut output = combinator(3, (x + 7, 8), "signal-red");
        output.set_signal(1, SignalId::virtual_signal("signal-info"), 1);

        let mut bp = Blueprint::default();
        bp.entities.push(factory);
        bp.entities.push(combinator(2, (x + 7, 6), "signal-cyan"));
        bp.entities.push(output);
        bp
    }

    #[test]
    fn writes_ingredients_and_output() {
        let mut bp = block(0, Some("moss-farm-mk01"));

        let report = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap();

        assert_eq!(report.synced, 1);
        assert!(report.truncated.is_empty());
        assert!(report.output_mismatches.is_empty());

        let ingredients = &bp.entities[1];
        assert_eq!(ingredients.signal_name(0), Some("signal-cyan"));
        assert_eq!(ingredients.signal_name(1), Some("steel-plate"));
        assert_eq!(ingredients.signal(1).unwrap().count, 20);
        assert_eq!(ingredients.signal(2).unwrap().signal.kind, SignalKind::Fluid);
        assert_eq!(ingredients.signal(2).unwrap().count, 100);

        let output = &bp.entities[2];
        assert_eq!(output.signal_name(1), Some("moss-farm-mk01"));
        assert_eq!(output.signal(1).unwrap().count, 1);
        assert_eq!(output.signal(1).unwrap().signal.kind, SignalKind::Item);
    }

    #[test]
    fn long_ingredient_lists_are_truncated_to_the_last_slot() {
        let ingredients = (0..25).map(|i| item(&format!("part-{i}"), i + 1)).collect();
        let recipes = Recipes::default().with("big", ingredients, vec![counted("big")]);
        let mut bp = block(0, Some("big"));
        bp.entities[1].set_signal(20, SignalId::virtual_signal("signal-dot"), 42);

        let report = sync_block(&mut bp, &recipes, &BlockLayout::default()).unwrap();

        assert_eq!(report.truncated, vec!["big".to_string()]);
        let c = &bp.entities[1];
        for slot in 1..=19 {
            assert_eq!(c.signal_name(slot), Some(format!("part-{}", slot - 1).as_str()));
        }
        assert_eq!(c.signal_name(20), Some("signal-dot"));
        assert_eq!(c.signal(20).unwrap().count, 42);
    }

    #[test]
    fn nineteen_ingredients_fit_without_warning() {
        let ingredients = (0..19).map(|i| item(&format!("part-{i}"), 1)).collect();
        let recipes = Recipes::default().with("fits", ingredients, vec![counted("fits")]);
        let mut bp = block(0, Some("fits"));

        let report = sync_block(&mut bp, &recipes, &BlockLayout::default()).unwrap();

        assert!(report.truncated.is_empty());
        assert_eq!(bp.entities[1].signal_name(19), Some("part-18"));
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut bp = block(0, Some("moss-farm-mk01"));
        let recipes = moss_recipes();
        sync_block(&mut bp, &recipes, &BlockLayout::default()).unwrap();
        let first = serde_json::to_value(&bp).unwrap();

        sync_block(&mut bp, &recipes, &BlockLayout::default()).unwrap();

        assert_eq!(serde_json::to_value(&bp).unwrap(), first);
    }

    #[test]
    fn factories_without_recipes_need_no_combinators() {
        let mut bp = block(0, None);
        bp.entities.truncate(1);

        let report = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap();

        assert_eq!(report.synced, 0);
    }

    #[test]
    fn missing_combinator_is_fatal() {
        let mut bp = block(0, Some("moss-farm-mk01"));
        bp.entities.remove(1);

        let err = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap_err();

        assert!(matches!(
            err,
            SyncError::CombinatorCount {
                role: CombinatorRole::Ingredients,
                x: 7,
                y: 6,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_combinator_is_fatal() {
        let mut bp = block(0, Some("moss-farm-mk01"));
        bp.entities.push(combinator(9, (7, 8), "signal-red"));

        let err = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap_err();

        assert!(matches!(
            err,
            SyncError::CombinatorCount {
                role: CombinatorRole::Output,
                found: 2,
                ..
            }
        ));
        // The ingredients were already written before the output check failed.
        assert_eq!(bp.entities[1].signal_name(1), Some("steel-plate"));
    }

    #[test]
    fn wrong_marker_is_fatal() {
        let mut bp = block(0, Some("moss-farm-mk01"));
        bp.entities[1].set_signal(0, SignalId::virtual_signal("signal-red"), 1);

        let err = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap_err();

        assert!(matches!(
            err,
            SyncError::MarkerMismatch {
                role: CombinatorRole::Ingredients,
                combinator: 2,
                ..
            }
        ));
    }

    #[test]
    fn output_slot_holding_another_item_is_fatal() {
        let mut bp = block(0, Some("moss-farm-mk01"));
        bp.entities[2].set_signal(1, SignalId::new(SignalKind::Item, "iron-plate"), 1);

        let err = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap_err();

        assert!(matches!(err, SyncError::OutputSlotMismatch { combinator: 3, .. }));
        assert_eq!(bp.entities[2].signal_name(1), Some("iron-plate"));
    }

    #[test]
    fn output_named_differently_is_reported_not_fatal() {
        let recipes = Recipes::default()
            .with(
                "coal-gas",
                vec![item("coal", 10)],
                vec![
                    ResultDescriptor::Counted {
                        name: "coal-gas".to_string(),
                        kind: SignalKind::Fluid,
                        amount: 50,
                    },
                    counted("ash"),
                ],
            )
            .with(
                "ash-separation",
                vec![item("ash", 10)],
                vec![ResultDescriptor::Bare("iron-ore".to_string())],
            );

        let out = guess_primary_output("coal-gas", &recipes).unwrap();
        assert_eq!(out, SignalId::new(SignalKind::Fluid, "coal-gas"));

        let mut bp = block(0, Some("ash-separation"));
        let report = sync_block(&mut bp, &recipes, &BlockLayout::default()).unwrap();
        assert_eq!(
            report.output_mismatches,
            vec![("ash-separation".to_string(), "iron-ore".to_string())]
        );
        assert_eq!(bp.entities[2].signal_name(1), Some("iron-ore"));
    }

    #[test]
    fn unknown_recipe_is_fatal() {
        let mut bp = block(0, Some("mystery"));
        let err = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap_err();
        assert!(matches!(err, SyncError::UnknownRecipe(name) if name == "mystery"));
    }

    #[test]
    fn factories_are_processed_in_reading_order() {
        let mut bp = block(20, Some("moss-farm-mk01"));
        let mut left = block(0, Some("mystery"));
        for (i, e) in left.entities.iter_mut().enumerate() {
            e.entity_number = 10 + i as u32;
        }
        bp.entities.append(&mut left.entities);

        // The left factory comes first in reading order and fails before the
        // right one is touched.
        let err = sync_block(&mut bp, &moss_recipes(), &BlockLayout::default()).unwrap_err();
        assert!(matches!(err, SyncError::UnknownRecipe(_)));
        assert_eq!(bp.entities[1].signal_name(1), None);
    }
}
