//! Lookup failures at the game API edge

use crate::unit::{UnitId, WingId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    #[error("unknown action kind '{0}'")]
    UnknownActionKind(String),

    #[error("unknown wing {0}")]
    UnknownWing(WingId),
}

pub type GameResult<T> = Result<T, GameError>;
