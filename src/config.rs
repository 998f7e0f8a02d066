//! Fixed layout of a CastleVantress block

/// Entity names, offsets and marker signals that identify the companion
/// combinators of each factory in the block.
#[derive(Debug, Clone)]
pub struct BlockLayout {
    /// Entity name of the grid's production units
    pub factory: String,
    /// Entity name of the signal holders next to each factory
    pub combinator: String,
    /// Tile offset (x, y) of the ingredients combinator from the factory's tile position
    pub ingredients_offset: (i32, i32),
    /// Slot 0 marker identifying the ingredients combinator
    pub ingredients_marker: String,
    /// Tile offset (x, y) of the output combinator from the factory's tile position
    pub output_offset: (i32, i32),
    /// Slot 0 marker identifying the output combinator
    pub output_marker: String,
    /// Placeholder held in the output slot before it is first written
    pub output_unset: String,
    /// Highest slot index a combinator accepts
    pub last_slot: usize,
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            factory: "automated-factory-mk01".to_string(),
            combinator: "constant-combinator".to_string(),
            ingredients_offset: (7, 6),
            ingredients_marker: "signal-cyan".to_string(),
            output_offset: (7, 8),
            output_marker: "signal-red".to_string(),
            output_unset: "signal-info".to_string(),
            last_slot: 19,
        }
    }
}

impl BlockLayout {
    /// Default layout with a different factory entity
    pub fn with_factory(factory: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            ..Self::default()
        }
    }
}
