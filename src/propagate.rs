//! Recipe propagation across the factory grid.
//!
//! Each enabled direction is one full sweep. Vertical sweeps guess the next
//! tier by name; horizontal sweeps step along the source's candidate ladder.
//! A guess is only taken if the target can run it, and a target that already
//! has a recipe is never touched. Sweeps run South, North, East, West, so a
//! later sweep sees what earlier ones assigned.

use tracing::debug;

use crate::blueprint::Blueprint;
use crate::grid::{neighbor, Cell, Direction, Grid, Position, Positioned, GRID_HEIGHT, GRID_WIDTH};
use crate::naming::{guess_downgraded, guess_upgraded};

pub const SWEEP_ORDER: [Direction; 4] = [
    Direction::South,
    Direction::North,
    Direction::East,
    Direction::West,
];

/// One factory of the grid
#[derive(Debug, Clone)]
pub struct ProductionUnit {
    /// Index of the factory in the blueprint's entity list
    pub entity: usize,
    pub position: Position,
    pub recipe: Option<String>,
    /// Recipes the factory can run, in data order
    pub candidates: Vec<String>,
}

impl Positioned for ProductionUnit {
    fn position(&self) -> Position {
        self.position
    }
}

/// A recipe filled in by propagation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub source: Cell,
    pub target: Cell,
    pub direction: Direction,
    pub recipe: String,
}

/// Cells in the order a sweep visits them, chosen so assignments cascade
/// in the sweep's direction.
fn sweep_cells(direction: Direction) -> Vec<Cell> {
    match direction {
        Direction::South | Direction::East => Cell::all().collect(),
        Direction::North => (0..GRID_HEIGHT)
            .rev()
            .flat_map(|row| (0..GRID_WIDTH).map(move |col| Cell::new(row, col)))
            .collect(),
        Direction::West => Cell::all().rev().collect(),
    }
}

fn guess_for(source: &ProductionUnit, direction: Direction) -> Option<String> {
    let recipe = source.recipe.as_deref()?;
    match direction {
        Direction::North => guess_downgraded(recipe),
        Direction::South => guess_upgraded(recipe),
        Direction::East | Direction::West => {
            let Some(i) = source.candidates.iter().position(|c| c == recipe) else {
                debug!(recipe, "recipe is not on its own factory's ladder");
                return None;
            };
            let (_, step) = direction.delta();
            source.candidates.get(i.checked_add_signed(step)?).cloned()
        }
    }
}

fn propagate_from(
    grid: &mut Grid<ProductionUnit>,
    source: Cell,
    direction: Direction,
) -> Option<Assignment> {
    grid.get(source).recipe.as_ref()?;
    let target = neighbor(source, direction)?;
    if grid.get(target).recipe.is_some() {
        return None;
    }

    let guess = guess_for(grid.get(source), direction)?;
    let unit = grid.get_mut(target);
    if !unit.candidates.contains(&guess) {
        debug!(%source, %target, guess = %guess, "guess not runnable by neighbour");
        return None;
    }

    debug!(%source, %target, ?direction, recipe = %guess, "assigned recipe");
    unit.recipe = Some(guess.clone());
    Some(Assignment {
        source,
        target,
        direction,
        recipe: guess,
    })
}

/// A production unit for every `factory` entity in the blueprint.
/// `ladder` supplies the recipes a factory entity can run.
pub fn units_from_blueprint(
    blueprint: &Blueprint,
    factory: &str,
    ladder: impl Fn(&str) -> Vec<String>,
) -> Vec<ProductionUnit> {
    blueprint
        .find_entities_by_name(factory)
        .into_iter()
        .map(|i| {
            let entity = &blueprint.entities[i];
            ProductionUnit {
                entity: i,
                position: entity.position,
                recipe: entity.recipe.clone(),
                candidates: ladder(&entity.name),
            }
        })
        .collect()
}

/// Copy the grid's recipes back onto the blueprint entities they came from
pub fn write_back(grid: Grid<ProductionUnit>, blueprint: &mut Blueprint) {
    for unit in grid.into_units() {
        blueprint.entities[unit.entity].recipe = unit.recipe;
    }
}

/// Fill unset recipes from configured neighbours, one sweep per enabled direction
pub fn guess_recipes(grid: &mut Grid<ProductionUnit>, directions: &[Direction]) -> Vec<Assignment> {
    let mut assignments = Vec::new();
    for direction in SWEEP_ORDER.into_iter().filter(|d| directions.contains(d)) {
        for cell in sweep_cells(direction) {
            if let Some(assignment) = propagate_from(grid, cell, direction) {
                assignments.push(assignment);
            }
        }
    }
    assignments
}
