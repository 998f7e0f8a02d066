//! Data models for game items, recipes and crafting machines

use serde::{Deserialize, Serialize};

/// Signal namespace of an identifier. Ingredients and results are items or
/// fluids; combinator markers such as `signal-cyan` are virtual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    #[default]
    Item,
    Fluid,
    Virtual,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Item => "item",
            SignalKind::Fluid => "fluid",
            SignalKind::Virtual => "virtual",
        }
    }

    /// Parse the stored/raw form. Anything unrecognised is treated as an item,
    /// which is what the game assumes when `type` is omitted.
    pub fn parse(s: &str) -> Self {
        match s {
            "fluid" => SignalKind::Fluid,
            "virtual" => SignalKind::Virtual,
            _ => SignalKind::Item,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemGroup {
    pub name: String,
    pub order: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemSubgroup {
    pub name: String,
    pub group: String,
    pub order: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub kind: SignalKind,
    pub subgroup: Option<String>,
    pub order: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub kind: SignalKind,
    pub amount: i32,
}

/// One entry of a recipe's result list
#[derive(Debug, Clone, PartialEq)]
pub enum ResultDescriptor {
    /// Single `result = "name"` style recipes
    Bare(String),
    Counted {
        name: String,
        kind: SignalKind,
        amount: i32,
    },
}

impl ResultDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ResultDescriptor::Bare(name) => name,
            ResultDescriptor::Counted { name, .. } => name,
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            ResultDescriptor::Bare(_) => SignalKind::Item,
            ResultDescriptor::Counted { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub category: String,
    pub ingredients: Vec<Ingredient>,
    pub results: Vec<ResultDescriptor>,
}

/// A crafting entity (assembler, furnace, ...) and the recipe categories it runs
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub crafting_categories: Vec<String>,
}
