//! Game data extraction
//!
//! Walks a directory of JSON prototype dumps (the layout of the game's
//! `data.raw` table, one or more files) and loads item groups, items,
//! fluids, recipes and crafting machines into the database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::{
    Ingredient, Item, ItemGroup, ItemSubgroup, Machine, Recipe, ResultDescriptor, SignalKind,
};

/// Prototype types that define inventory items
const ITEM_TYPES: &[&str] = &[
    "item",
    "ammo",
    "armor",
    "blueprint",
    "blueprint-book",
    "capsule",
    "copy-paste-tool",
    "deconstruction-item",
    "gun",
    "item-with-entity-data",
    "item-with-inventory",
    "item-with-label",
    "item-with-tags",
    "module",
    "rail-planner",
    "repair-tool",
    "selection-tool",
    "spidertron-remote",
    "tool",
    "upgrade-item",
];

/// Prototype types that craft recipes
const MACHINE_TYPES: &[&str] = &["assembling-machine", "furnace", "rocket-silo"];

/// Everything parsed out of one dump file
#[derive(Debug, Default)]
struct ExtractedData {
    groups: Vec<ItemGroup>,
    subgroups: Vec<ItemSubgroup>,
    items: Vec<Item>,
    recipes: Vec<Recipe>,
    machines: Vec<Machine>,
}

/// Find all JSON files under the data directory, sorted by path so recipe
/// order is reproducible
pub fn find_data_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(data_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

fn str_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

fn order_of(raw: &Value) -> String {
    str_field(raw, "order").unwrap_or_default().to_string()
}

/// Amounts may be written as floats; the fractional part is dropped.
/// Amounts outside `i32` have no value.
fn amount_of(value: &Value) -> Option<i32> {
    if let Some(v) = value.as_i64() {
        return i32::try_from(v).ok();
    }
    let v = value.as_f64()?.trunc();
    (v >= i32::MIN as f64 && v <= i32::MAX as f64).then_some(v as i32)
}

/// `["name", amount]` or `{"name": .., "amount": .., "type": ..}`
fn parse_ingredient(raw: &Value) -> Option<Ingredient> {
    match raw {
        Value::Array(parts) => Some(Ingredient {
            name: parts.first()?.as_str()?.to_string(),
            kind: SignalKind::Item,
            amount: amount_of(parts.get(1)?)?,
        }),
        Value::Object(_) => Some(Ingredient {
            name: str_field(raw, "name")?.to_string(),
            kind: SignalKind::parse(str_field(raw, "type").unwrap_or("item")),
            amount: amount_of(raw.get("amount")?)?,
        }),
        _ => None,
    }
}

/// Result entries: bare name, `["name", amount]`, or an object whose amount
/// may be given as a min/max range
fn parse_result(raw: &Value) -> Option<ResultDescriptor> {
    match raw {
        Value::String(name) => Some(ResultDescriptor::Bare(name.clone())),
        Value::Array(parts) => Some(ResultDescriptor::Counted {
            name: parts.first()?.as_str()?.to_string(),
            kind: SignalKind::Item,
            amount: parts.get(1).and_then(amount_of).unwrap_or(1),
        }),
        Value::Object(_) => Some(ResultDescriptor::Counted {
            name: str_field(raw, "name")?.to_string(),
            kind: SignalKind::parse(str_field(raw, "type").unwrap_or("item")),
            amount: raw
                .get("amount")
                .or_else(|| raw.get("amount_max"))
                .and_then(amount_of)
                .unwrap_or(1),
        }),
        _ => None,
    }
}

/// Parse one recipe prototype. Ingredients are read from the top level, falling
/// back to the `normal` block; results prefer the `normal` block.
fn parse_recipe(name: &str, raw: &Value) -> Recipe {
    let normal = raw.get("normal").filter(|n| n.is_object());
    let body = normal.unwrap_or(raw);
    let ingredient_source = match raw.get("ingredients") {
        Some(_) => raw,
        None => body,
    };

    let mut ingredients: Vec<Ingredient> = Vec::new();
    for part in ingredient_source
        .get("ingredients")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(ingredient) = parse_ingredient(part) else {
            debug!(recipe = name, ?part, "skipping unreadable ingredient");
            continue;
        };
        // Repeated ingredients keep their first position and the last amount.
        match ingredients.iter_mut().find(|i| i.name == ingredient.name) {
            Some(existing) => existing.amount = ingredient.amount,
            None => ingredients.push(ingredient),
        }
    }

    let results = match str_field(body, "result") {
        Some(result) => vec![ResultDescriptor::Bare(result.to_string())],
        None => body
            .get("results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(parse_result)
            .collect(),
    };

    Recipe {
        name: name.to_string(),
        category: str_field(raw, "category").unwrap_or("crafting").to_string(),
        ingredients,
        results,
    }
}

fn is_hidden(raw: &Value) -> bool {
    let flagged = raw
        .get("flags")
        .and_then(Value::as_array)
        .is_some_and(|flags| flags.iter().any(|f| f == "hidden"));
    flagged || raw.get("hidden").and_then(Value::as_bool).unwrap_or(false)
}

/// Tile size from a `collision_box` of `[[x1, y1], [x2, y2]]`
fn tile_size(raw: &Value) -> (u32, u32) {
    let corner = |i: usize| -> Option<(f64, f64)> {
        let c = raw.get("collision_box")?.get(i)?;
        Some((c.get(0)?.as_f64()?, c.get(1)?.as_f64()?))
    };
    match (corner(0), corner(1)) {
        (Some((x1, y1)), Some((x2, y2))) => (
            ((x2 - x1).ceil() as u32).max(1),
            ((y2 - y1).ceil() as u32).max(1),
        ),
        _ => (1, 1),
    }
}

fn prototypes<'a>(
    table: &'a Map<String, Value>,
    kind: &str,
) -> impl Iterator<Item = (&'a String, &'a Value)> {
    table
        .get(kind)
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
}

/// Parse a single dump file
fn parse_data_file(filepath: &Path) -> Result<ExtractedData> {
    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read {}", filepath.display()))?;
    let root: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", filepath.display()))?;
    let Some(table) = root.as_object() else {
        bail!("{} is not a prototype table", filepath.display());
    };

    let mut data = ExtractedData::default();

    for (name, raw) in prototypes(table, "item-group") {
        data.groups.push(ItemGroup {
            name: name.clone(),
            order: order_of(raw),
        });
    }

    for (name, raw) in prototypes(table, "item-subgroup") {
        let Some(group) = str_field(raw, "group") else {
            debug!(subgroup = %name, "subgroup without group");
            continue;
        };
        data.subgroups.push(ItemSubgroup {
            name: name.clone(),
            group: group.to_string(),
            order: order_of(raw),
        });
    }

    for kind in ITEM_TYPES {
        for (name, raw) in prototypes(table, kind) {
            data.items.push(Item {
                name: name.clone(),
                kind: SignalKind::Item,
                subgroup: Some(str_field(raw, "subgroup").unwrap_or("other").to_string()),
                order: order_of(raw),
                hidden: is_hidden(raw),
            });
        }
    }

    for (name, raw) in prototypes(table, "fluid") {
        data.items.push(Item {
            name: name.clone(),
            kind: SignalKind::Fluid,
            subgroup: Some(str_field(raw, "subgroup").unwrap_or("fluid").to_string()),
            order: order_of(raw),
            hidden: is_hidden(raw),
        });
    }

    for (name, raw) in prototypes(table, "recipe") {
        data.recipes.push(parse_recipe(name, raw));
    }

    for kind in MACHINE_TYPES {
        for (name, raw) in prototypes(table, kind) {
            let (tile_width, tile_height) = tile_size(raw);
            data.machines.push(Machine {
                name: name.clone(),
                tile_width,
                tile_height,
                crafting_categories: raw
                    .get("crafting_categories")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect(),
            });
        }
    }

    Ok(data)
}

fn store(conn: &Connection, data: &ExtractedData) -> Result<()> {
    for group in &data.groups {
        db::upsert_item_group(conn, group)?;
    }
    for subgroup in &data.subgroups {
        db::upsert_item_subgroup(conn, subgroup)?;
    }
    for item in &data.items {
        db::upsert_item(conn, item)?;
    }
    for recipe in &data.recipes {
        db::upsert_recipe(conn, recipe)?;
    }
    for machine in &data.machines {
        db::upsert_machine(conn, machine)?;
    }
    Ok(())
}

/// Extract all prototype data under `data_dir` and populate the database
pub fn extract_to_database(conn: &Connection, data_dir: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    info!("Scanning {} for data dumps...", data_dir.display());
    let files = find_data_files(data_dir)?;
    info!("Found {} JSON files", files.len());

    let tx = conn.unchecked_transaction()?;
    for filepath in &files {
        match parse_data_file(filepath) {
            Ok(data) => {
                store(&tx, &data)?;

                stats.files += 1;
                stats.groups += data.groups.len();
                stats.subgroups += data.subgroups.len();
                stats.items += data.items.len();
                stats.recipes += data.recipes.len();
                stats.machines += data.machines.len();

                info!(
                    "  Parsed: {} (recipes: {}, items: {}, machines: {})",
                    filepath.display(),
                    data.recipes.len(),
                    data.items.len(),
                    data.machines.len()
                );
            }
            Err(e) => {
                warn!("  Error parsing {}: {:#}", filepath.display(), e);
                stats.errors += 1;
            }
        }
    }
    tx.commit()?;

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub files: usize,
    pub groups: usize,
    pub subgroups: usize,
    pub items: usize,
    pub recipes: usize,
    pub machines: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} files: {} recipes, {} items, {} machines, {} groups, {} subgroups. Errors: {}",
            self.files,
            self.recipes,
            self.items,
            self.machines,
            self.groups,
            self.subgroups,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normal_mode_and_bare_result() {
        let raw = json!({
            "category": "advanced-crafting",
            "normal": {
                "ingredients": [["iron-plate", 2], ["iron-gear-wheel", 1]],
                "result": "inserter"
            },
            "expensive": {
                "ingredients": [["iron-plate", 4]],
                "result": "inserter"
            }
        });

        let recipe = parse_recipe("inserter", &raw);

        assert_eq!(recipe.category, "advanced-crafting");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].amount, 2);
        assert_eq!(recipe.results, vec![ResultDescriptor::Bare("inserter".into())]);
    }

    #[test]
    fn top_level_ingredients_win_over_normal_block() {
        let raw = json!({
            "ingredients": [["stone", 3]],
            "normal": {
                "ingredients": [["iron-plate", 2]],
                "result": "furnace"
            },
            "result": "ignored"
        });

        let recipe = parse_recipe("furnace", &raw);

        assert_eq!(recipe.ingredients.len(), 1);
        assert_eq!(recipe.ingredients[0].name, "stone");
        assert_eq!(recipe.results, vec![ResultDescriptor::Bare("furnace".into())]);
    }

    #[test]
    fn out_of_range_amounts_are_skipped() {
        assert_eq!(amount_of(&json!(3_000_000_000i64)), None);
        assert_eq!(amount_of(&json!(-3_000_000_000i64)), None);
        assert_eq!(amount_of(&json!(1e12)), None);
        assert_eq!(amount_of(&json!(i32::MAX)), Some(i32::MAX));

        let raw = json!({
            "ingredients": [["a", 1], ["b", 3_000_000_000i64]],
            "result": "c"
        });
        let recipe = parse_recipe("c", &raw);
        let names: Vec<_> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn object_entries_carry_type_and_amount() {
        let raw = json!({
            "ingredients": [
                {"type": "fluid", "name": "water", "amount": 7.5},
                {"type": "item", "name": "coal", "amount": 3}
            ],
            "results": [
                {"type": "fluid", "name": "coal-gas", "amount": 40},
                {"name": "ash", "amount_min": 1, "amount_max": 3},
                ["tar", 2]
            ]
        });

        let recipe = parse_recipe("coal-gas", &raw);

        assert_eq!(recipe.category, "crafting");
        assert_eq!(recipe.ingredients[0].kind, SignalKind::Fluid);
        assert_eq!(recipe.ingredients[0].amount, 7);
        assert_eq!(recipe.results[0].kind(), SignalKind::Fluid);
        assert!(matches!(
            &recipe.results[1],
            ResultDescriptor::Counted { name, amount: 3, .. } if name == "ash"
        ));
        assert_eq!(recipe.results[2].name(), "tar");
    }

    #[test]
    fn repeated_ingredient_keeps_first_position() {
        let raw = json!({
            "ingredients": [["a", 1], ["b", 2], ["a", 5]],
            "result": "c"
        });

        let recipe = parse_recipe("c", &raw);

        let names: Vec<_> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(recipe.ingredients[0].amount, 5);
    }

    #[test]
    fn collision_box_rounds_up_to_tiles() {
        assert_eq!(tile_size(&json!({"collision_box": [[-3.3, -3.3], [3.3, 3.3]]})), (7, 7));
        assert_eq!(tile_size(&json!({"collision_box": [[-1.2, -0.7], [1.2, 0.7]]})), (3, 2));
        assert_eq!(tile_size(&json!({})), (1, 1));
    }

    #[test]
    fn hidden_flag_in_either_form() {
        assert!(is_hidden(&json!({"flags": ["hidden"]})));
        assert!(is_hidden(&json!({"hidden": true})));
        assert!(!is_hidden(&json!({"flags": ["goes-to-quickbar"]})));
    }

    #[test]
    fn extracts_a_directory_of_dumps() {
        let dir = std::env::temp_dir().join(format!("cv-extend-extract-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("mods")).unwrap();

        fs::write(
            dir.join("a-base.json"),
            json!({
                "item-group": {"production": {"order": "b"}},
                "item-subgroup": {"factory": {"group": "production", "order": "a"}},
                "item": {"moss-farm-mk01": {"subgroup": "factory", "order": "a"}},
                "recipe": {
                    "moss-farm-mk01": {"ingredients": [["steel-plate", 20]], "result": "moss-farm-mk01"}
                },
                "assembling-machine": {
                    "automated-factory-mk01": {
                        "collision_box": [[-3.4, -3.4], [3.4, 3.4]],
                        "crafting_categories": ["crafting"]
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("mods").join("b-extra.json"),
            json!({
                "fluid": {"water": {"order": "a"}},
                "recipe": {
                    "moss-farm-mk02": {"ingredients": [["moss-farm-mk01", 1]], "result": "moss-farm-mk02"}
                }
            })
            .to_string(),
        )
        .unwrap();
        fs::write(dir.join("broken.json"), "{ not json").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let stats = extract_to_database(&conn, &dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.recipes, 2);

        let recipes = db::list_recipes(&conn).unwrap();
        let names: Vec<_> = recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["moss-farm-mk01", "moss-farm-mk02"]);

        let machines = db::list_machines(&conn).unwrap();
        assert_eq!(machines[0].tile_width, 7);
        assert_eq!(machines[0].crafting_categories, vec!["crafting".to_string()]);

        let items = db::list_items(&conn).unwrap();
        let water = items.iter().find(|i| i.name == "water").unwrap();
        assert_eq!(water.kind, SignalKind::Fluid);
        assert_eq!(water.subgroup.as_deref(), Some("fluid"));
    }
}
