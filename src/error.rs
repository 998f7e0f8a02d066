//! Structural errors that abort a block pass

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("expected {expected} production units, found {found}")]
    WrongUnitCount { expected: usize, found: usize },
}

/// Which of a factory's two companion combinators a [`SyncError`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinatorRole {
    Ingredients,
    Output,
}

impl std::fmt::Display for CombinatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinatorRole::Ingredients => write!(f, "ingredients"),
            CombinatorRole::Output => write!(f, "output"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{role} combinator for factory #{factory} at tile ({x}, {y}): expected exactly one, found {found}")]
    CombinatorCount {
        role: CombinatorRole,
        factory: u32,
        x: i32,
        y: i32,
        found: usize,
    },

    #[error("{role} combinator #{combinator} has {found:?} in slot 0, expected '{expected}'")]
    MarkerMismatch {
        role: CombinatorRole,
        combinator: u32,
        expected: String,
        found: Option<String>,
    },

    #[error("output combinator #{combinator} holds {found:?} in slot 1, expected '{unset}' or '{guess}'")]
    OutputSlotMismatch {
        combinator: u32,
        unset: String,
        guess: String,
        found: Option<String>,
    },

    #[error("recipe '{0}' not found in game data")]
    UnknownRecipe(String),

    #[error("recipe '{0}' has no results")]
    NoResults(String),
}
