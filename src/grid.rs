//! Spatial index for the 10x8 factory grid of a block.
//!
//! Units are placed in reading order (top to bottom, then left to right).
//! The grid is two stacked half-blocks of four rows: moving down never
//! crosses from row 3 into row 4, while moving up does. Horizontal moves
//! wrap onto the neighbouring row.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::GridError;

pub const GRID_WIDTH: usize = 10;
pub const GRID_HEIGHT: usize = 8;
pub const HALF_HEIGHT: usize = 4;
pub const GRID_SIZE: usize = GRID_WIDTH * GRID_HEIGHT;

/// A point in tile units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub trait Positioned {
    fn position(&self) -> Position;
}

/// Compare by (y, x): top to bottom, then left to right
pub fn reading_order<A: Positioned, B: Positioned>(a: &A, b: &B) -> Ordering {
    let (a, b) = (a.position(), b.position());
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// Stable sort by (y, x)
pub fn sort_reading_order<T: Positioned>(items: &mut [T]) {
    items.sort_by(reading_order);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// (row, column) step
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
            Direction::East => (0, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    fn index(self) -> usize {
        self.row * GRID_WIDTH + self.col
    }

    /// Every cell in reading order
    pub fn all() -> impl DoubleEndedIterator<Item = Cell> {
        (0..GRID_SIZE).map(|i| Cell::new(i / GRID_WIDTH, i % GRID_WIDTH))
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The cell one step from `cell` in `direction`, if the block topology has one.
pub fn neighbor(cell: Cell, direction: Direction) -> Option<Cell> {
    let (dr, dc) = direction.delta();
    let col = cell.col as isize + dc;

    if col < 0 {
        return (cell.row > 0).then(|| Cell::new(cell.row - 1, GRID_WIDTH - 1));
    }
    if col >= GRID_WIDTH as isize {
        return (cell.row < GRID_HEIGHT - 1).then(|| Cell::new(cell.row + 1, 0));
    }
    if dr > 0 && (cell.row == HALF_HEIGHT - 1 || cell.row >= GRID_HEIGHT - 1) {
        return None;
    }

    let row = cell.row as isize + dr;
    if row < 0 || row >= GRID_HEIGHT as isize {
        return None;
    }
    Some(Cell::new(row as usize, col as usize))
}

/// Exactly [`GRID_SIZE`] units indexed by [`Cell`]
#[derive(Debug, Clone)]
pub struct Grid<T> {
    units: Vec<T>,
}

impl<T: Positioned> Grid<T> {
    /// Sort `units` into reading order and lay them out row by row.
    pub fn build(mut units: Vec<T>) -> Result<Self, GridError> {
        if units.len() != GRID_SIZE {
            return Err(GridError::WrongUnitCount {
                expected: GRID_SIZE,
                found: units.len(),
            });
        }
        sort_reading_order(&mut units);
        Ok(Self { units })
    }
}

impl<T> Grid<T> {
    pub fn get(&self, cell: Cell) -> &T {
        &self.units[cell.index()]
    }

    pub fn get_mut(&mut self, cell: Cell) -> &mut T {
        &mut self.units[cell.index()]
    }

    /// Units with their cells in reading order
    pub fn iter(&self) -> impl Iterator<Item = (Cell, &T)> {
        Cell::all().zip(self.units.iter())
    }

    pub fn into_units(self) -> Vec<T> {
        self.units
    }
}
