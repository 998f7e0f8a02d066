//! Read-only lookup over the static game data.
//!
//! The index is built once from the database and passed by reference to
//! whatever needs recipe or item information.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::db;
use crate::models::{Ingredient, Item, ItemGroup, ItemSubgroup, Machine, Recipe, ResultDescriptor};

/// Tile footprint of an entity. Anything that is not a known machine is 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Default for Footprint {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }
}

/// Recipe queries needed by the combinator synchronizer
pub trait RecipeSource {
    /// Ingredients of a recipe in data order, `None` if the recipe is unknown
    fn ingredients_of(&self, recipe: &str) -> Option<&[Ingredient]>;

    /// Result descriptors of a recipe in data order, `None` if the recipe is unknown
    fn results_of(&self, recipe: &str) -> Option<&[ResultDescriptor]>;
}

/// Display sort key for an item: (group index, subgroup index, order, name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ItemSortKey {
    pub group_index: usize,
    pub subgroup_index: usize,
    pub order: String,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct MetadataIndex {
    recipes: Vec<Recipe>,
    recipe_index: HashMap<String, usize>,
    machines: HashMap<String, Machine>,
    items: HashMap<String, Item>,
    group_index: HashMap<String, usize>,
    subgroup_index: HashMap<String, usize>,
    subgroup_to_group: HashMap<String, String>,
    sorted_items: Vec<String>,
    item_position: HashMap<String, usize>,
}

impl MetadataIndex {
    /// Load every table from the database and build the index
    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(Self::from_parts(
            db::list_item_groups(conn)?,
            db::list_item_subgroups(conn)?,
            db::list_items(conn)?,
            db::list_recipes(conn)?,
            db::list_machines(conn)?,
        ))
    }

    /// Build the index from already loaded records. `recipes` must be in data
    /// order; groups and subgroups are ranked by their order string then name.
    pub fn from_parts(
        mut groups: Vec<ItemGroup>,
        mut subgroups: Vec<ItemSubgroup>,
        items: Vec<Item>,
        recipes: Vec<Recipe>,
        machines: Vec<Machine>,
    ) -> Self {
        groups.sort_by(|a, b| (&a.order, &a.name).cmp(&(&b.order, &b.name)));
        subgroups.sort_by(|a, b| (&a.order, &a.name).cmp(&(&b.order, &b.name)));

        let group_index = groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.clone(), i))
            .collect();
        let subgroup_index = subgroups
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let subgroup_to_group = subgroups
            .iter()
            .map(|s| (s.name.clone(), s.group.clone()))
            .collect();
        let recipe_index = recipes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();

        let mut index = Self {
            recipes,
            recipe_index,
            machines: machines.into_iter().map(|m| (m.name.clone(), m)).collect(),
            items: items.into_iter().map(|i| (i.name.clone(), i)).collect(),
            group_index,
            subgroup_index,
            subgroup_to_group,
            sorted_items: Vec::new(),
            item_position: HashMap::new(),
        };

        let mut keys: Vec<ItemSortKey> = index
            .items
            .keys()
            .filter_map(|name| index.sort_key(name))
            .collect();
        keys.sort();
        index.sorted_items = keys.into_iter().map(|k| k.name).collect();
        index.item_position = index
            .sorted_items
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        index
    }

    /// True when no recipes are loaded (nothing has been extracted yet)
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipe_index.get(name).map(|&i| &self.recipes[i])
    }

    /// Candidate ladder for a machine: every recipe whose category it can
    /// craft, in data order. Unknown machines have an empty ladder.
    pub fn recipes_for_machine(&self, machine: &str) -> Vec<String> {
        let Some(machine) = self.machines.get(machine) else {
            return Vec::new();
        };
        self.recipes
            .iter()
            .filter(|r| machine.crafting_categories.contains(&r.category))
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn footprint(&self, entity: &str) -> Footprint {
        self.machines
            .get(entity)
            .map(|m| Footprint {
                width: m.tile_width,
                height: m.tile_height,
            })
            .unwrap_or_default()
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn item_subgroup(&self, name: &str) -> Option<&str> {
        self.items.get(name)?.subgroup.as_deref()
    }

    pub fn item_group(&self, name: &str) -> Option<&str> {
        let subgroup = self.item_subgroup(name)?;
        self.subgroup_to_group.get(subgroup).map(String::as_str)
    }

    pub fn item_order(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(|i| i.order.as_str())
    }

    pub fn item_is_hidden(&self, name: &str) -> bool {
        self.items.get(name).is_some_and(|i| i.hidden)
    }

    /// Sort key used for display ordering. Hidden items and items without a
    /// resolvable group have none.
    pub fn sort_key(&self, name: &str) -> Option<ItemSortKey> {
        let item = self.items.get(name)?;
        if item.hidden {
            return None;
        }
        let subgroup = item.subgroup.as_deref()?;
        let group = self.subgroup_to_group.get(subgroup)?;
        Some(ItemSortKey {
            group_index: *self.group_index.get(group)?,
            subgroup_index: *self.subgroup_index.get(subgroup)?,
            order: item.order.clone(),
            name: item.name.clone(),
        })
    }

    /// All sortable items in display order
    pub fn sorted_items(&self) -> &[String] {
        &self.sorted_items
    }

    /// Items immediately before and after `name` in display order
    pub fn adjacent_items(&self, name: &str) -> (Option<&str>, Option<&str>) {
        let Some(&i) = self.item_position.get(name) else {
            return (None, None);
        };
        let prev = i
            .checked_sub(1)
            .and_then(|p| self.sorted_items.get(p))
            .map(String::as_str);
        let next = self.sorted_items.get(i + 1).map(String::as_str);
        (prev, next)
    }
}

impl RecipeSource for MetadataIndex {
    fn ingredients_of(&self, recipe: &str) -> Option<&[Ingredient]> {
        self.recipe(recipe).map(|r| r.ingredients.as_slice())
    }

    fn results_of(&self, recipe: &str) -> Option<&[ResultDescriptor]> {
        self.recipe(recipe).map(|r| r.results.as_slice())
    }
}
