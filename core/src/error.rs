use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Mine count is impossible for the board size")]
    InvalidConfiguration,
    #[error("Coordinates are outside the board")]
    OutOfBounds,
    #[error("Saved game is corrupt: {0}")]
    CorruptState(String),
    #[error("No saved game")]
    NoSavedState,
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl GameError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptState(reason.into())
    }
}

pub type Result<T> = core::result::Result<T, GameError>;
