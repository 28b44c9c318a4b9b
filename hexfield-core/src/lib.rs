//! HEXFIELD Core - Rules and state engine
//!
//! This crate provides the core of a hex-grid tactical wargame:
//! - Board geometry (offset hex grid, sides, vertices, bearings)
//! - Battlefield map and unit counters
//! - Snapshot-based undo/redo log
//! - Action state machine and game session
//! - Arbitrator answering legality and dice outcomes
//! - Scenario setup from JSON

pub mod board;
pub mod map;
pub mod unit;
pub mod undo;
pub mod action;
pub mod dice;
pub mod config;
pub mod arbitrator;
pub mod error;
pub mod game;
pub mod scenario;

// Re-exports for convenient access
pub use board::{Angle, Geometry, HexRef, HexSideRef, HexVertexRef, Located, Point};
pub use map::{HexCell, Map, Terrain, Weather};
pub use unit::{
    Cohesion, MoveTier, Munitions, PlayerId, Position, Tiredness, Unit, UnitCategory, UnitId,
    UnitProfile, WingId,
};
pub use undo::{Restorable, UndoLog};
pub use action::{
    Action, ActionKind, ActionRegistry, ActionStatus, BasicKind, GameObserver, NullObserver,
    ProgressionEvent, RecoveryKind,
};
pub use dice::{AttackKind, CombatOutcome, CombatTable, DiceRoll, Recovery, RecoveryOutcome, RecoveryTable};
pub use config::RulesConfig;
pub use arbitrator::{AllowedActions, Arbitrator, CostProfile, MoveMode, MoveOption, RotationOption, TerrainCosts, ZoneHex};
pub use error::{GameError, GameResult};
pub use game::{Game, GameState, OrderInstruction, Player, Wing};
pub use scenario::Scenario;
