//! Database schema and operations for the static game data

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::{
    Ingredient, Item, ItemGroup, ItemSubgroup, Machine, Recipe, ResultDescriptor, SignalKind,
};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Display grouping for items
        CREATE TABLE IF NOT EXISTS item_groups (
            name TEXT PRIMARY KEY,
            sort_order TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS item_subgroups (
            name TEXT PRIMARY KEY,
            group_name TEXT NOT NULL,
            sort_order TEXT NOT NULL
        );

        -- Items and fluids
        CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            subgroup TEXT,
            sort_order TEXT NOT NULL,
            hidden INTEGER NOT NULL DEFAULT 0
        );

        -- Recipes, ordinal preserves the order they appear in the game data
        CREATE TABLE IF NOT EXISTS recipes (
            name TEXT PRIMARY KEY,
            ordinal INTEGER NOT NULL,
            category TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_name TEXT,
            ordinal INTEGER,
            item_name TEXT NOT NULL,
            kind TEXT NOT NULL,
            amount INTEGER NOT NULL,
            PRIMARY KEY (recipe_name, ordinal)
        );

        -- amount is NULL for bare `result = "name"` descriptors
        CREATE TABLE IF NOT EXISTS recipe_results (
            recipe_name TEXT,
            ordinal INTEGER,
            item_name TEXT NOT NULL,
            kind TEXT NOT NULL,
            amount INTEGER,
            PRIMARY KEY (recipe_name, ordinal)
        );

        -- Crafting machines and their footprint in tiles
        CREATE TABLE IF NOT EXISTS machines (
            name TEXT PRIMARY KEY,
            tile_width INTEGER NOT NULL,
            tile_height INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS machine_categories (
            machine_name TEXT,
            category TEXT,
            PRIMARY KEY (machine_name, category)
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_category ON recipes(category);
        "#,
    )?;
    Ok(())
}

/// Clear all extracted data (for re-extraction)
pub fn clear_extracted_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM machine_categories;
        DELETE FROM machines;
        DELETE FROM recipe_results;
        DELETE FROM recipe_ingredients;
        DELETE FROM recipes;
        DELETE FROM items;
        DELETE FROM item_subgroups;
        DELETE FROM item_groups;
        "#,
    )?;
    Ok(())
}

pub fn upsert_item_group(conn: &Connection, group: &ItemGroup) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO item_groups (name, sort_order) VALUES (?1, ?2)",
        (&group.name, &group.order),
    )?;
    Ok(())
}

pub fn upsert_item_subgroup(conn: &Connection, subgroup: &ItemSubgroup) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO item_subgroups (name, group_name, sort_order) VALUES (?1, ?2, ?3)",
        (&subgroup.name, &subgroup.group, &subgroup.order),
    )?;
    Ok(())
}

pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (name, kind, subgroup, sort_order, hidden)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &item.name,
            item.kind.as_str(),
            &item.subgroup,
            &item.order,
            item.hidden,
        ),
    )?;
    Ok(())
}

/// Insert or replace a recipe with its ingredients and results.
///
/// A recipe seen for the first time is appended to the data order; replacing
/// an existing recipe keeps its original position.
pub fn upsert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "INSERT INTO recipes (name, ordinal, category)
         VALUES (?1, (SELECT COALESCE(MAX(ordinal), -1) + 1 FROM recipes), ?2)
         ON CONFLICT(name) DO UPDATE SET category = excluded.category",
        (&recipe.name, &recipe.category),
    )?;
    conn.execute(
        "DELETE FROM recipe_ingredients WHERE recipe_name = ?1",
        [&recipe.name],
    )?;
    conn.execute(
        "DELETE FROM recipe_results WHERE recipe_name = ?1",
        [&recipe.name],
    )?;

    for (ordinal, ingredient) in recipe.ingredients.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_ingredients (recipe_name, ordinal, item_name, kind, amount)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                &recipe.name,
                ordinal as i64,
                &ingredient.name,
                ingredient.kind.as_str(),
                ingredient.amount,
            ),
        )?;
    }

    for (ordinal, result) in recipe.results.iter().enumerate() {
        let amount = match result {
            ResultDescriptor::Bare(_) => None,
            ResultDescriptor::Counted { amount, .. } => Some(*amount),
        };
        conn.execute(
            "INSERT INTO recipe_results (recipe_name, ordinal, item_name, kind, amount)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                &recipe.name,
                ordinal as i64,
                result.name(),
                result.kind().as_str(),
                amount,
            ),
        )?;
    }
    Ok(())
}

pub fn upsert_machine(conn: &Connection, machine: &Machine) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO machines (name, tile_width, tile_height) VALUES (?1, ?2, ?3)",
        (&machine.name, machine.tile_width, machine.tile_height),
    )?;
    conn.execute(
        "DELETE FROM machine_categories WHERE machine_name = ?1",
        [&machine.name],
    )?;
    for category in &machine.crafting_categories {
        conn.execute(
            "INSERT OR IGNORE INTO machine_categories (machine_name, category) VALUES (?1, ?2)",
            (&machine.name, category),
        )?;
    }
    Ok(())
}

pub fn list_item_groups(conn: &Connection) -> Result<Vec<ItemGroup>> {
    let mut stmt = conn.prepare("SELECT name, sort_order FROM item_groups ORDER BY sort_order, name")?;

    let rows = stmt.query_map([], |row| {
        Ok(ItemGroup {
            name: row.get(0)?,
            order: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn list_item_subgroups(conn: &Connection) -> Result<Vec<ItemSubgroup>> {
    let mut stmt = conn.prepare(
        "SELECT name, group_name, sort_order FROM item_subgroups ORDER BY sort_order, name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(ItemSubgroup {
            name: row.get(0)?,
            group: row.get(1)?,
            order: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn list_items(conn: &Connection) -> Result<Vec<Item>> {
    let mut stmt =
        conn.prepare("SELECT name, kind, subgroup, sort_order, hidden FROM items ORDER BY name")?;

    let rows = stmt.query_map([], |row| {
        Ok(Item {
            name: row.get(0)?,
            kind: SignalKind::parse(&row.get::<_, String>(1)?),
            subgroup: row.get(2)?,
            order: row.get(3)?,
            hidden: row.get(4)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all recipes in data order, with ingredients and results attached
pub fn list_recipes(conn: &Connection) -> Result<Vec<Recipe>> {
    let mut stmt = conn.prepare("SELECT name, category FROM recipes ORDER BY ordinal")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut headers = Vec::new();
    for row in rows {
        headers.push(row?);
    }

    let mut ingredients_stmt = conn.prepare(
        "SELECT item_name, kind, amount FROM recipe_ingredients
         WHERE recipe_name = ?1 ORDER BY ordinal",
    )?;
    let mut results_stmt = conn.prepare(
        "SELECT item_name, kind, amount FROM recipe_results
         WHERE recipe_name = ?1 ORDER BY ordinal",
    )?;

    let mut recipes = Vec::with_capacity(headers.len());
    for (name, category) in headers {
        let ingredients = ingredients_stmt
            .query_map([&name], |row| {
                Ok(Ingredient {
                    name: row.get(0)?,
                    kind: SignalKind::parse(&row.get::<_, String>(1)?),
                    amount: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let results = results_stmt
            .query_map([&name], |row| {
                let item_name: String = row.get(0)?;
                let kind = SignalKind::parse(&row.get::<_, String>(1)?);
                let amount: Option<i32> = row.get(2)?;
                Ok(match amount {
                    None => ResultDescriptor::Bare(item_name),
                    Some(amount) => ResultDescriptor::Counted {
                        name: item_name,
                        kind,
                        amount,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        recipes.push(Recipe {
            name,
            category,
            ingredients,
            results,
        });
    }
    Ok(recipes)
}

pub fn list_machines(conn: &Connection) -> Result<Vec<Machine>> {
    let mut stmt = conn.prepare("SELECT name, tile_width, tile_height FROM machines ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Machine {
            name: row.get(0)?,
            tile_width: row.get(1)?,
            tile_height: row.get(2)?,
            crafting_categories: Vec::new(),
        })
    })?;

    let mut machines = Vec::new();
    for row in rows {
        machines.push(row?);
    }

    let mut categories_stmt = conn.prepare(
        "SELECT category FROM machine_categories WHERE machine_name = ?1 ORDER BY category",
    )?;
    for machine in &mut machines {
        machine.crafting_categories = categories_stmt
            .query_map([&machine.name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
    }
    Ok(machines)
}

/// Number of recipes currently stored
pub fn count_recipes(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Category of a single recipe, if it exists
pub fn recipe_category(conn: &Connection, name: &str) -> Result<Option<String>> {
    let category = conn
        .query_row(
            "SELECT category FROM recipes WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(category)
}
