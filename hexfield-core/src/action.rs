//! Action lifecycle: statuses, kinds and the registry of kinds
//!
//! An action is one activation of one unit. It only ever advances through
//! INITIATED -> STARTED -> FINISHED -> FINALIZED, or leaves INITIATED for
//! CANCELLED. The transitions themselves are driven by the game, which owns
//! the undo log and the progression observers.

use crate::dice::Recovery;
use crate::unit::UnitId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Initiated,
    Started,
    Finished,
    Finalized,
    Cancelled,
}

impl ActionStatus {
    /// Position along the forward chain; `None` for the cancelled branch
    pub fn rank(self) -> Option<u8> {
        match self {
            ActionStatus::Initiated => Some(0),
            ActionStatus::Started => Some(1),
            ActionStatus::Finished => Some(2),
            ActionStatus::Finalized => Some(3),
            ActionStatus::Cancelled => None,
        }
    }

    /// STARTED or any later forward status
    pub fn is_started(self) -> bool {
        self.rank().is_some_and(|r| r >= 1)
    }

    pub fn is_finished(self) -> bool {
        self.rank().is_some_and(|r| r >= 2)
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionStatus::Initiated => "initiated",
            ActionStatus::Started => "started",
            ActionStatus::Finished => "finished",
            ActionStatus::Finalized => "finalized",
            ActionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// KINDS
// ============================================================================

/// Behaviour shared by every action of one kind
pub trait ActionKind: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Whether the owning unit's turn may close with this action in its current state
    fn is_finishable(&self, _action: &Action) -> bool {
        true
    }

    /// Recovery check resolved by this kind, if any
    fn recovery(&self) -> Option<Recovery> {
        None
    }
}

/// Kind with no extra prerequisites
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicKind {
    name: String,
}

impl BasicKind {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl ActionKind for BasicKind {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Recovery activity waiting on a dice result once started
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryKind {
    recovery: Recovery,
}

impl RecoveryKind {
    pub fn new(recovery: Recovery) -> Self {
        Self { recovery }
    }
}

impl ActionKind for RecoveryKind {
    fn name(&self) -> &str {
        self.recovery.name()
    }

    fn is_finishable(&self, action: &Action) -> bool {
        action.status() != ActionStatus::Started
    }

    fn recovery(&self) -> Option<Recovery> {
        Some(self.recovery)
    }
}

// ============================================================================
// ACTION
// ============================================================================

/// One activation of one unit
#[derive(Clone, Debug)]
pub struct Action {
    unit: UnitId,
    kind: Arc<dyn ActionKind>,
    status: ActionStatus,
    /// Moves and rotations performed so far
    steps: u32,
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.unit == other.unit
            && self.kind.name() == other.kind.name()
            && self.status == other.status
            && self.steps == other.steps
    }
}

impl Action {
    pub fn new(unit: UnitId, kind: Arc<dyn ActionKind>) -> Self {
        Self {
            unit,
            kind,
            status: ActionStatus::Initiated,
            steps: 0,
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn kind(&self) -> &Arc<dyn ActionKind> {
        &self.kind
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// True until the first move or rotation has been made
    pub fn is_first_step(&self) -> bool {
        self.steps == 0
    }

    pub fn is_finishable(&self) -> bool {
        self.kind.is_finishable(self)
    }

    pub fn recovery(&self) -> Option<Recovery> {
        self.kind.recovery()
    }

    pub(crate) fn set_status(&mut self, status: ActionStatus) {
        self.status = status;
    }

    pub(crate) fn record_step(&mut self) {
        self.steps += 1;
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Named action kinds available to a game, supplied at construction
#[derive(Clone, Debug, Default)]
pub struct ActionRegistry {
    kinds: FxHashMap<String, Arc<dyn ActionKind>>,
}

impl ActionRegistry {
    pub const MOVE: &'static str = "move";
    pub const ROTATE: &'static str = "rotate";
    pub const CONFRONT: &'static str = "confront";
    pub const ESCAPE: &'static str = "escape";
    pub const SHOCK_ATTACK: &'static str = "shock-attack";
    pub const FIRE_ATTACK: &'static str = "fire-attack";
    pub const NO_ACTION: &'static str = "no-action";

    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Movement, combat and recovery kinds of the base ruleset
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for name in [
            Self::MOVE,
            Self::ROTATE,
            Self::CONFRONT,
            Self::ESCAPE,
            Self::SHOCK_ATTACK,
            Self::FIRE_ATTACK,
            Self::NO_ACTION,
        ] {
            registry.register(Arc::new(BasicKind::new(name)));
        }
        for recovery in Recovery::ALL {
            registry.register(Arc::new(RecoveryKind::new(recovery)));
        }
        registry
    }

    /// Add or replace a kind under its own name
    pub fn register(&mut self, kind: Arc<dyn ActionKind>) {
        self.kinds.insert(kind.name().to_string(), kind);
    }

    pub fn with(mut self, kind: Arc<dyn ActionKind>) -> Self {
        self.register(kind);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionKind>> {
        self.kinds.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// PROGRESSION
// ============================================================================

/// Status change of an action, published to observers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionEvent {
    pub unit: UnitId,
    pub action: String,
    pub status: ActionStatus,
}

/// Presentation-side listener for action progression
pub trait GameObserver {
    fn progression(&mut self, _event: &ProgressionEvent) {}

    /// Close any widgetry opened for the current action
    fn close_actuators(&mut self) {}
}

/// Observer that ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl GameObserver for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order() {
        assert!(!ActionStatus::Initiated.is_started());
        assert!(ActionStatus::Started.is_started());
        assert!(ActionStatus::Finalized.is_started());
        assert!(!ActionStatus::Cancelled.is_started());
        assert!(ActionStatus::Finished.is_finished());
        assert!(!ActionStatus::Started.is_finished());
        assert_eq!(ActionStatus::Cancelled.rank(), None);
    }

    #[test]
    fn test_recovery_kind_waits_for_roll() {
        let registry = ActionRegistry::standard();
        let kind = registry.get("rest").unwrap();
        let mut action = Action::new(UnitId(3), kind);
        assert_eq!(action.recovery(), Some(Recovery::Rest));
        assert!(action.is_finishable());

        action.set_status(ActionStatus::Started);
        assert!(!action.is_finishable());

        action.set_status(ActionStatus::Finished);
        assert!(action.is_finishable());
    }

    #[test]
    fn test_basic_kind_always_finishable() {
        let mut action = Action::new(UnitId(1), Arc::new(BasicKind::new("move")));
        action.set_status(ActionStatus::Started);
        assert!(action.is_finishable());
        assert!(action.recovery().is_none());
    }

    #[test]
    fn test_standard_registry() {
        let registry = ActionRegistry::standard();
        for name in ["move", "rotate", "escape", "shock-attack", "rally", "no-action"] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(registry.get("spellcasting").is_none());

        let extended = registry.with(Arc::new(BasicKind::new("spellcasting")));
        assert!(extended.contains("spellcasting"));
        assert_eq!(extended.names().len(), 12);
    }

    #[test]
    fn test_action_equality_ignores_kind_identity() {
        let a = Action::new(UnitId(1), Arc::new(BasicKind::new("move")));
        let b = Action::new(UnitId(1), Arc::new(BasicKind::new("move")));
        assert_eq!(a, b);

        let mut c = b.clone();
        c.record_step();
        assert_ne!(a, c);
        assert!(!c.is_first_step());
    }
}
