//! Blueprint JSON model and entity queries
//!
//! Reads and writes the game's blueprint JSON (`{"blueprint": {"entities": [...]}}`).
//! Fields this tool does not interpret are kept in `extra` maps so a document
//! round-trips unchanged apart from the recipes and signals written here.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::grid::{reading_order, Position, Positioned};
use crate::metadata::Footprint;
use crate::models::SignalKind;

/// Top level of a blueprint JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintDocument {
    pub blueprint: Blueprint,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalId {
    #[serde(rename = "type", default)]
    pub kind: SignalKind,
    pub name: String,
}

impl SignalId {
    pub fn new(kind: SignalKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn virtual_signal(name: impl Into<String>) -> Self {
        Self::new(SignalKind::Virtual, name)
    }
}

/// One constant combinator slot. `index` is 1-based as stored by the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFilter {
    pub signal: SignalId,
    pub count: i32,
    pub index: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlBehavior {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<SignalFilter>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_number: u32,
    pub name: String,
    /// Centre of the entity in tile units
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_behavior: Option<ControlBehavior>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub footprint: Footprint,
}

/// Axis-aligned rectangle in tile units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Area {
    /// The 1x1 area covering tile (x, y)
    pub fn tile(x: i32, y: i32) -> Self {
        Self {
            left: x as f64,
            top: y as f64,
            right: (x + 1) as f64,
            bottom: (y + 1) as f64,
        }
    }

    /// Strict overlap: rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Area) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

impl Entity {
    pub fn new(entity_number: u32, name: impl Into<String>, position: Position) -> Self {
        Self {
            entity_number,
            name: name.into(),
            position,
            recipe: None,
            control_behavior: None,
            extra: Map::new(),
            footprint: Footprint::default(),
        }
    }

    /// Top-left tile covered by the entity
    pub fn tile_position(&self) -> (i32, i32) {
        let x = self.position.x - self.footprint.width as f64 / 2.0;
        let y = self.position.y - self.footprint.height as f64 / 2.0;
        (x.floor() as i32, y.floor() as i32)
    }

    /// Tiles covered by the entity
    pub fn tile_area(&self) -> Area {
        let (x, y) = self.tile_position();
        Area {
            left: x as f64,
            top: y as f64,
            right: x as f64 + self.footprint.width as f64,
            bottom: y as f64 + self.footprint.height as f64,
        }
    }

    /// Signal in a 0-based slot
    pub fn signal(&self, slot: usize) -> Option<&SignalFilter> {
        self.control_behavior
            .as_ref()?
            .filters
            .iter()
            .find(|f| f.index as usize == slot + 1)
    }

    pub fn signal_name(&self, slot: usize) -> Option<&str> {
        self.signal(slot).map(|f| f.signal.name.as_str())
    }

    /// Overwrite a 0-based slot, keeping filters ordered by slot
    pub fn set_signal(&mut self, slot: usize, signal: SignalId, count: i32) {
        let index = slot as u32 + 1;
        let filters = &mut self
            .control_behavior
            .get_or_insert_with(ControlBehavior::default)
            .filters;

        match filters.iter_mut().find(|f| f.index == index) {
            Some(existing) => {
                existing.signal = signal;
                existing.count = count;
            }
            None => {
                filters.push(SignalFilter {
                    signal,
                    count,
                    index,
                });
                filters.sort_by_key(|f| f.index);
            }
        }
    }
}

impl Positioned for Entity {
    fn position(&self) -> Position {
        self.position
    }
}

impl Blueprint {
    /// Set each entity's footprint from the game data
    pub fn assign_footprints(&mut self, footprint: impl Fn(&str) -> Footprint) {
        for entity in &mut self.entities {
            entity.footprint = footprint(&entity.name);
        }
    }

    /// Indices of all entities with the given name, in document order
    pub fn find_entities_by_name(&self, name: &str) -> Vec<usize> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name == name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of all entities with the given name, sorted top to bottom then left to right
    pub fn find_entities_by_name_in_reading_order(&self, name: &str) -> Vec<usize> {
        let mut found = self.find_entities_by_name(name);
        found.sort_by(|&a, &b| reading_order(&self.entities[a], &self.entities[b]));
        found
    }

    /// Indices of entities with the given name whose tiles overlap `area`
    pub fn find_entities_by_name_in_area(&self, name: &str, area: &Area) -> Vec<usize> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name == name && e.tile_area().overlaps(area))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Read a blueprint JSON document from disk
pub fn read_blueprint(path: &Path) -> Result<BlueprintDocument> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_blueprint(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_blueprint(content: &str) -> Result<BlueprintDocument> {
    Ok(serde_json::from_str(content)?)
}

pub fn to_json(document: &BlueprintDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}
