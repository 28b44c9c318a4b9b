//! Game state, transactions and the action state machine
//!
//! `GameState` is plain data: the map, the unit roster, players, wings and
//! the turn pointer. `Game` wraps it with the undo log, the arbitrator and
//! the action registry, and is the only way to mutate it. Every mutation
//! goes through a `touch_*` helper that registers the object with the log
//! before handing out a mutable reference.

use crate::action::{
    Action, ActionRegistry, ActionStatus, GameObserver, NullObserver, ProgressionEvent,
};
use crate::arbitrator::{AllowedActions, Arbitrator, CostProfile, MoveOption, RotationOption};
use crate::board::{Angle, HexRef};
use crate::config::RulesConfig;
use crate::dice::{CombatOutcome, DiceRoll, Recovery, RecoveryOutcome};
use crate::error::{GameError, GameResult};
use crate::map::{HexCell, Map, Terrain, Weather};
use crate::undo::{Restorable, UndoLog};
use crate::unit::{MoveTier, PlayerId, Position, Tiredness, Unit, UnitId, WingId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// PLAYERS AND WINGS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// Standing instruction of a wing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderInstruction {
    Attack,
    #[default]
    Defend,
    Regroup,
    Retreat,
}

/// Command grouping of units sharing a player and an instruction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wing {
    pub id: WingId,
    pub player: PlayerId,
    #[serde(default)]
    pub order: OrderInstruction,
    #[serde(default)]
    pub leader: Option<UnitId>,
}

impl Wing {
    pub fn new(id: WingId, player: PlayerId) -> Self {
        Self {
            id,
            player,
            order: OrderInstruction::default(),
            leader: None,
        }
    }

    pub fn with_order(mut self, order: OrderInstruction) -> Self {
        self.order = order;
        self
    }

    pub fn with_leader(mut self, leader: UnitId) -> Self {
        self.leader = Some(leader);
        self
    }
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Turn pointer, selection and wing instructions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GameMeta {
    current_player: usize,
    turn: u32,
    selected: Option<UnitId>,
    focused: Option<UnitId>,
    wings: Vec<Wing>,
}

/// Everything the arbitrator reads
#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    map: Map,
    units: FxHashMap<UnitId, Unit>,
    players: Vec<Player>,
    meta: GameMeta,
    // Collaborator inputs, outside the undo log
    weather: Weather,
    fatigue: FxHashMap<WingId, Tiredness>,
}

impl GameState {
    fn new(map: Map, players: Vec<Player>) -> Self {
        Self {
            map,
            units: FxHashMap::default(),
            players,
            meta: GameMeta {
                turn: 1,
                ..GameMeta::default()
            },
            weather: Weather::default(),
            fatigue: FxHashMap::default(),
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Whole roster, ordered by id
    pub fn units(&self) -> Vec<&Unit> {
        let mut units: Vec<&Unit> = self.units.values().collect();
        units.sort_by_key(|u| u.id());
        units
    }

    /// Units standing in `hex`, in stacking order
    pub fn units_at(&self, hex: HexRef) -> impl Iterator<Item = &Unit> + '_ {
        self.map
            .occupants(hex)
            .iter()
            .filter_map(|occupant| self.units.get(&occupant.unit))
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.meta.current_player]
    }

    pub fn turn(&self) -> u32 {
        self.meta.turn
    }

    pub fn selected(&self) -> Option<UnitId> {
        self.meta.selected
    }

    pub fn focused(&self) -> Option<UnitId> {
        self.meta.focused
    }

    pub fn wings(&self) -> &[Wing] {
        &self.meta.wings
    }

    pub fn wing(&self, id: WingId) -> Option<&Wing> {
        self.meta.wings.iter().find(|w| w.id == id)
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    /// Fatigue aggregate of a wing
    pub fn wing_tiredness(&self, id: WingId) -> Tiredness {
        self.fatigue.get(&id).copied().unwrap_or_default()
    }
}

/// Objects the undo log can capture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKey {
    Cell(HexRef),
    Unit(UnitId),
    Meta,
}

#[derive(Clone, Debug)]
pub enum Capture {
    Cell(Option<HexCell>),
    Unit(Option<Box<Unit>>),
    Meta(GameMeta),
}

impl Restorable<StateKey> for GameState {
    type Capture = Capture;

    fn capture(&self, key: &StateKey) -> Capture {
        match key {
            StateKey::Cell(hex) => Capture::Cell(self.map.cell(*hex).cloned()),
            StateKey::Unit(id) => Capture::Unit(self.units.get(id).cloned().map(Box::new)),
            StateKey::Meta => Capture::Meta(self.meta.clone()),
        }
    }

    fn restore(&mut self, key: &StateKey, capture: Capture) {
        match (key, capture) {
            (StateKey::Cell(hex), Capture::Cell(cell)) => self.map.replace_cell(*hex, cell),
            (StateKey::Unit(id), Capture::Unit(unit)) => match unit {
                Some(unit) => {
                    self.units.insert(*id, *unit);
                }
                None => {
                    self.units.remove(id);
                }
            },
            (StateKey::Meta, Capture::Meta(meta)) => self.meta = meta,
            (key, capture) => panic!("capture {capture:?} does not belong to {key:?}"),
        }
    }
}

// ============================================================================
// GAME
// ============================================================================

/// Transactional game session
pub struct Game {
    state: GameState,
    log: UndoLog<StateKey, Capture>,
    arbitrator: Arbitrator,
    registry: ActionRegistry,
    observer: Box<dyn GameObserver>,
    events: Vec<ProgressionEvent>,
}

impl Game {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// New session with the standard action kinds and default rules
    pub fn new(map: Map, players: Vec<Player>) -> Self {
        assert!(!players.is_empty(), "a game needs at least one player");
        Self {
            state: GameState::new(map, players),
            log: UndoLog::new(),
            arbitrator: Arbitrator::default(),
            registry: ActionRegistry::standard(),
            observer: Box::new(NullObserver),
            events: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the rules; resets the cost profile to terrain costs
    pub fn with_rules(mut self, rules: RulesConfig) -> Self {
        self.arbitrator = Arbitrator::new(rules);
        self
    }

    pub fn with_costs(mut self, costs: Box<dyn CostProfile>) -> Self {
        let rules = self.arbitrator.rules().clone();
        self.arbitrator = Arbitrator::new(rules).with_costs(costs);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn GameObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Setup: declare a wing (not undoable)
    pub fn add_wing(&mut self, wing: Wing) {
        assert!(
            self.state.wing(wing.id).is_none(),
            "wing {} declared twice",
            wing.id
        );
        self.state.meta.wings.push(wing);
    }

    /// Setup: add a detached unit to the roster (not undoable)
    pub fn add_unit(&mut self, unit: Unit) {
        assert!(
            !self.state.units.contains_key(&unit.id()),
            "unit {} added twice",
            unit.id()
        );
        self.state.units.insert(unit.id(), unit);
    }

    /// Setup: ground type of a hex (not undoable)
    pub fn set_terrain(&mut self, hex: HexRef, terrain: Terrain) {
        self.state.map.set_terrain(hex, terrain);
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn arbitrator(&self) -> &Arbitrator {
        &self.arbitrator
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn unit(&self, id: UnitId) -> GameResult<&Unit> {
        self.state.unit(id).ok_or(GameError::UnknownUnit(id))
    }

    pub fn current_player(&self) -> &Player {
        self.state.current_player()
    }

    /// Progression events emitted since the last call
    pub fn take_events(&mut self) -> Vec<ProgressionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether every unit's action allows closing the turn
    pub fn turn_is_finishable(&self) -> bool {
        self.state.units.values().all(|u| u.is_finishable())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn allowed_actions(&self, id: UnitId) -> GameResult<AllowedActions> {
        Ok(self.arbitrator.allowed_actions(&self.state, self.unit(id)?))
    }

    /// Moves for the unit's next step; nothing once its action has finished
    /// or the unit has already been activated this turn
    pub fn allowed_moves(&self, id: UnitId) -> GameResult<Vec<MoveOption>> {
        let unit = self.unit(id)?;
        if unit.is_spent() {
            return Ok(Vec::new());
        }
        let first_step = match unit.action() {
            None => true,
            Some(action) => match action.status() {
                ActionStatus::Initiated | ActionStatus::Finalized | ActionStatus::Cancelled => true,
                ActionStatus::Started => action.is_first_step(),
                ActionStatus::Finished => return Ok(Vec::new()),
            },
        };
        Ok(self.arbitrator.allowed_moves(&self.state, unit, first_step))
    }

    pub fn allowed_rotations(&self, id: UnitId) -> GameResult<Vec<RotationOption>> {
        let unit = self.unit(id)?;
        if unit.is_spent() || unit.action().is_some_and(|a| a.status() == ActionStatus::Finished) {
            return Ok(Vec::new());
        }
        Ok(self.arbitrator.allowed_rotations(&self.state, unit))
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// Group the following mutations into one undoable step
    pub fn open_transaction(&mut self) {
        self.log.open();
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.log.undo(&mut self.state);
        debug!(undone, depth = self.log.depth(), "undo");
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.log.redo(&mut self.state);
        debug!(redone, depth = self.log.depth(), "redo");
        redone
    }

    /// Make everything done so far permanent
    pub fn clear_history(&mut self) {
        self.log.clear();
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    fn touch_unit(&mut self, id: UnitId) -> &mut Unit {
        self.log.register(&self.state, StateKey::Unit(id));
        self.state
            .units
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unit {id} is not in the roster"))
    }

    fn touch_cell(&mut self, hex: HexRef) -> &mut HexCell {
        self.log.register(&self.state, StateKey::Cell(hex));
        self.state.map.cell_mut(hex)
    }

    fn touch_meta(&mut self) -> &mut GameMeta {
        self.log.register(&self.state, StateKey::Meta);
        &mut self.state.meta
    }

    fn touch_wing(&mut self, id: WingId) -> GameResult<&mut Wing> {
        if self.state.wing(id).is_none() {
            return Err(GameError::UnknownWing(id));
        }
        let meta = self.touch_meta();
        Ok(meta
            .wings
            .iter_mut()
            .find(|w| w.id == id)
            .unwrap_or_else(|| panic!("wing {id} vanished")))
    }

    /// Apply an arbitrary change to a unit as one undoable step
    pub fn modify_unit<F>(&mut self, id: UnitId, change: F) -> GameResult<()>
    where
        F: FnOnce(&mut Unit),
    {
        self.unit(id)?;
        self.log.open();
        change(self.touch_unit(id));
        Ok(())
    }

    // ========================================================================
    // UNIT LIFECYCLE
    // ========================================================================

    /// Attach a detached unit to the map
    pub fn place_unit(&mut self, id: UnitId, position: Position, angle: Angle) -> GameResult<()> {
        let unit = self.unit(id)?;
        assert!(!unit.is_on_map(), "unit {id} is already on the map");
        assert!(
            self.arbitrator
                .is_valid_deployment(unit.category(), &position, angle),
            "unit {id} cannot deploy at {position} facing {angle}"
        );
        self.log.open();
        self.relocate(id, Some(position), angle);
        debug!(unit = %id, %position, angle, "unit placed");
        Ok(())
    }

    /// Detach a unit from the map, dropping its action
    pub fn remove_unit(&mut self, id: UnitId) -> GameResult<()> {
        assert!(self.unit(id)?.is_on_map(), "unit {id} is not on the map");
        self.log.open();
        self.detach(id);
        Ok(())
    }

    fn detach(&mut self, id: UnitId) {
        let angle = self.touch_unit(id).angle();
        self.touch_unit(id).set_action(None);
        self.relocate(id, None, angle);
        let meta = &self.state.meta;
        if meta.selected == Some(id) || meta.focused == Some(id) {
            let meta = self.touch_meta();
            if meta.selected == Some(id) {
                meta.selected = None;
            }
            if meta.focused == Some(id) {
                meta.focused = None;
            }
        }
        debug!(unit = %id, "unit removed");
    }

    /// Move the unit's stacking entries and position together
    fn relocate(&mut self, id: UnitId, position: Option<Position>, angle: Angle) {
        let unit = self.touch_unit(id);
        let old = unit.position();
        let character = unit.is_character();
        unit.set_location(position, angle);
        if old == position {
            return;
        }
        for hex in old.map(|p| p.hexes()).unwrap_or_default() {
            self.touch_cell(hex).remove(id);
        }
        for hex in position.map(|p| p.hexes()).unwrap_or_default() {
            self.touch_cell(hex).append(id, character);
        }
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    /// Select a unit of the current player; refused while another unit has focus
    /// and for units whose activation this turn is over
    pub fn select_unit(&mut self, id: UnitId) -> GameResult<bool> {
        let unit = self.unit(id)?;
        if self.state.focused().is_some_and(|f| f != id) {
            return Ok(false);
        }
        if unit.player() != self.state.current_player().id || unit.is_spent() {
            return Ok(false);
        }
        self.log.open();
        if let Some(previous) = self.state.selected().filter(|&p| p != id) {
            let started = self
                .state
                .unit(previous)
                .and_then(|u| u.action())
                .is_some_and(|a| matches!(a.status(), ActionStatus::Started | ActionStatus::Finished));
            if started {
                self.finalize(previous);
            }
        }
        self.touch_meta().selected = Some(id);
        Ok(true)
    }

    pub fn set_focused_unit(&mut self, id: Option<UnitId>) {
        self.log.open();
        self.touch_meta().focused = id;
    }

    // ========================================================================
    // ACTION STATE MACHINE
    // ========================================================================

    /// Create a new INITIATED action of the named kind
    ///
    /// A still-INITIATED action is cancelled first. Replacing an action that
    /// has started but not been finalized is a caller bug, and so is
    /// reactivating a spent unit with anything but `no-action`.
    pub fn start_action(&mut self, id: UnitId, kind: &str) -> GameResult<()> {
        let spent = self.unit(id)?.is_spent();
        if !self.registry.contains(kind) {
            return Err(GameError::UnknownActionKind(kind.to_string()));
        }
        assert!(
            !spent || kind == ActionRegistry::NO_ACTION,
            "unit {id} has already acted this turn"
        );
        self.log.open();
        self.begin(id, kind)
    }

    pub fn mark_as_started(&mut self, id: UnitId) -> GameResult<()> {
        let status = self.action_status(id)?;
        assert!(
            status == ActionStatus::Initiated,
            "cannot start the {status} action of unit {id}"
        );
        self.log.open();
        self.advance(id, ActionStatus::Started);
        Ok(())
    }

    /// Finish a started action; a no-op once finished
    pub fn mark_as_finished(&mut self, id: UnitId) -> GameResult<()> {
        let status = self.action_status(id)?;
        if status.is_finished() {
            return Ok(());
        }
        assert!(
            status == ActionStatus::Started,
            "cannot finish the {status} action of unit {id}"
        );
        self.log.open();
        self.advance(id, ActionStatus::Finished);
        Ok(())
    }

    /// Finalize a started action; idempotent
    pub fn finalize_action(&mut self, id: UnitId) -> GameResult<()> {
        self.action_status(id)?;
        self.log.open();
        self.finalize(id);
        Ok(())
    }

    /// Cancel an action that has not started
    pub fn cancel_action(&mut self, id: UnitId) -> GameResult<()> {
        self.action_status(id)?;
        self.log.open();
        self.cancel(id);
        Ok(())
    }

    fn action_status(&self, id: UnitId) -> GameResult<ActionStatus> {
        let unit = self.unit(id)?;
        Ok(unit
            .action()
            .unwrap_or_else(|| panic!("unit {id} has no action"))
            .status())
    }

    fn begin(&mut self, id: UnitId, kind: &str) -> GameResult<()> {
        let kind = self
            .registry
            .get(kind)
            .ok_or_else(|| GameError::UnknownActionKind(kind.to_string()))?;
        if let Some(status) = self.state.unit(id).and_then(|u| u.action()).map(|a| a.status()) {
            match status {
                ActionStatus::Initiated => self.cancel(id),
                ActionStatus::Started | ActionStatus::Finished => {
                    panic!("unit {id} cannot replace its {status} action")
                }
                ActionStatus::Finalized | ActionStatus::Cancelled => {}
            }
        }
        debug!(unit = %id, kind = kind.name(), "action initiated");
        self.touch_unit(id).set_action(Some(Action::new(id, kind)));
        self.touch_meta().focused = Some(id);
        Ok(())
    }

    /// Move the action forward along INITIATED -> STARTED -> FINISHED -> FINALIZED
    fn advance(&mut self, id: UnitId, status: ActionStatus) {
        let current_player = self.state.current_player().id;
        let unit = self.touch_unit(id);
        if status != ActionStatus::Finalized && unit.player() == current_player {
            unit.set_played(true);
        }
        let action = unit
            .action_mut()
            .unwrap_or_else(|| panic!("unit {id} has no action"));
        action.set_status(status);
        let name = action.name().to_string();
        if status != ActionStatus::Finalized {
            self.touch_meta().focused = None;
        }
        self.emit(id, name, status);
    }

    fn finalize(&mut self, id: UnitId) {
        let Some(action) = self.state.unit(id).and_then(|u| u.action()) else {
            panic!("unit {id} has no action");
        };
        match action.status() {
            ActionStatus::Finalized => {}
            ActionStatus::Started | ActionStatus::Finished => {
                self.observer.close_actuators();
                self.advance(id, ActionStatus::Finalized);
            }
            status => panic!("cannot finalize the {status} action of unit {id}"),
        }
    }

    fn cancel(&mut self, id: UnitId) {
        let Some(action) = self.state.unit(id).and_then(|u| u.action()) else {
            panic!("unit {id} has no action");
        };
        assert!(
            action.status() == ActionStatus::Initiated,
            "cannot cancel the {} action of unit {id}",
            action.status()
        );
        let name = action.name().to_string();
        self.observer.close_actuators();
        self.touch_unit(id).set_action(None);
        if self.state.focused() == Some(id) {
            self.touch_meta().focused = None;
        }
        self.emit(id, name, ActionStatus::Cancelled);
    }

    fn emit(&mut self, unit: UnitId, action: String, status: ActionStatus) {
        debug!(unit = %unit, action = %action, %status, "action progression");
        let event = ProgressionEvent {
            unit,
            action,
            status,
        };
        self.observer.progression(&event);
        self.events.push(event);
    }

    /// Make sure the unit has a STARTED action, beginning `kind` if it has none
    fn ensure_started(&mut self, id: UnitId, kind: &str) -> GameResult<()> {
        let unit = self.unit(id)?;
        assert!(!unit.is_spent(), "unit {id} has already acted this turn");
        let status = unit.action().map(|a| a.status());
        match status {
            None | Some(ActionStatus::Finalized) | Some(ActionStatus::Cancelled) => {
                self.begin(id, kind)?;
                self.advance(id, ActionStatus::Started);
            }
            Some(ActionStatus::Initiated) => self.advance(id, ActionStatus::Started),
            Some(ActionStatus::Started) => {}
            Some(ActionStatus::Finished) => panic!("unit {id} has already finished its action"),
        }
        Ok(())
    }

    /// Start an attack, closing a started action of another kind first
    fn start_attack(&mut self, id: UnitId, kind: &str) -> GameResult<()> {
        let unit = self.unit(id)?;
        assert!(!unit.is_spent(), "unit {id} has already acted this turn");
        let other = unit
            .action()
            .is_some_and(|a| a.status() == ActionStatus::Started && a.name() != kind);
        if other {
            self.advance(id, ActionStatus::Finished);
            self.finalize(id);
            self.begin(id, kind)?;
            self.advance(id, ActionStatus::Started);
            return Ok(());
        }
        self.ensure_started(id, kind)
    }

    // ========================================================================
    // MOVEMENT
    // ========================================================================

    /// Step forward along an option returned by the arbitrator
    pub fn move_unit(&mut self, id: UnitId, option: &MoveOption) -> GameResult<()> {
        assert!(self.unit(id)?.is_on_map(), "unit {id} is not on the map");
        self.log.open();
        self.ensure_started(id, ActionRegistry::MOVE)?;
        let angle = self.touch_unit(id).angle();
        self.relocate(id, Some(option.target), angle);
        self.pay(id, option.cost, option.tier);
        debug!(unit = %id, target = %option.target, tier = ?option.tier, "unit moved");
        Ok(())
    }

    /// Turn (and for formations possibly pivot) along an option returned by the arbitrator
    pub fn rotate_unit(&mut self, id: UnitId, option: &RotationOption) -> GameResult<()> {
        assert!(self.unit(id)?.is_on_map(), "unit {id} is not on the map");
        self.log.open();
        self.ensure_started(id, ActionRegistry::ROTATE)?;
        self.relocate(id, Some(option.position), option.angle);
        self.pay(id, option.cost, option.tier);
        debug!(unit = %id, angle = option.angle, "unit rotated");
        Ok(())
    }

    fn pay(&mut self, id: UnitId, cost: f32, tier: MoveTier) {
        let unit = self.touch_unit(id);
        unit.spend(cost, tier);
        if let Some(action) = unit.action_mut() {
            action.record_step();
        }
        // The minimal advance ends the activation
        if tier == MoveTier::Minimal {
            self.advance(id, ActionStatus::Finished);
        }
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Apply a dice result to the unit's pending recovery action
    pub fn resolve_recovery(&mut self, id: UnitId, roll: DiceRoll) -> GameResult<RecoveryOutcome> {
        let unit = self.unit(id)?;
        let recovery = unit
            .action()
            .and_then(|a| a.recovery())
            .unwrap_or_else(|| panic!("unit {id} has no pending recovery"));
        let wing_tiredness = self.state.wing_tiredness(unit.wing());

        self.log.open();
        self.ensure_started(id, recovery.name())?;
        let outcome = self.arbitrator.arbitrate_recovery(&self.state, recovery, roll);
        if outcome.success {
            let unit = self.touch_unit(id);
            match recovery {
                Recovery::Rest => {
                    let before = unit.tiredness();
                    let mut rested = before.recover().max(wing_tiredness);
                    if outcome.minor_resting_capacity {
                        rested = rested.recover();
                    }
                    unit.set_tiredness(rested.min(before));
                }
                Recovery::Reload => unit.set_munitions(unit.munitions().replenish()),
                Recovery::Reorganize => unit.set_cohesion(unit.cohesion().recover()),
                Recovery::Rally => unit.set_cohesion(unit.cohesion().recover()),
            }
        }
        self.advance(id, ActionStatus::Finished);
        info!(unit = %id, recovery = recovery.name(), sum = roll.sum(), success = outcome.success, "recovery resolved");
        Ok(outcome)
    }

    /// Resolve a shock attack against a defender
    pub fn resolve_shock_attack(
        &mut self,
        attacker: UnitId,
        defender: UnitId,
        roll: DiceRoll,
    ) -> GameResult<CombatOutcome> {
        let outcome = self
            .arbitrator
            .arbitrate_shock_attack(self.unit(attacker)?, self.unit(defender)?, roll);
        self.log.open();
        self.start_attack(attacker, ActionRegistry::SHOCK_ATTACK)?;
        let unit = self.touch_unit(attacker);
        unit.set_charging(false);
        unit.set_engaging(true);
        if outcome.success {
            self.inflict_loss(defender);
        }
        self.advance(attacker, ActionStatus::Finished);
        info!(attacker = %attacker, defender = %defender, sum = roll.sum(), success = outcome.success, "shock attack resolved");
        Ok(outcome)
    }

    /// Resolve missile fire against a target
    pub fn resolve_fire_attack(
        &mut self,
        attacker: UnitId,
        target: UnitId,
        roll: DiceRoll,
    ) -> GameResult<CombatOutcome> {
        let outcome = self
            .arbitrator
            .arbitrate_fire_attack(self.unit(attacker)?, self.unit(target)?, roll);
        self.log.open();
        self.start_attack(attacker, ActionRegistry::FIRE_ATTACK)?;
        if outcome.munitions_depleted {
            let unit = self.touch_unit(attacker);
            unit.set_munitions(unit.munitions().deplete());
        }
        if outcome.success {
            let unit = self.touch_unit(target);
            unit.set_cohesion(unit.cohesion().worsen());
        }
        self.advance(attacker, ActionStatus::Finished);
        info!(attacker = %attacker, target = %target, sum = roll.sum(), success = outcome.success, "fire attack resolved");
        Ok(outcome)
    }

    /// Step loss and cohesion hit; a unit with no steps left leaves the map
    fn inflict_loss(&mut self, id: UnitId) {
        let unit = self.touch_unit(id);
        let steps = unit.steps().saturating_sub(1);
        unit.set_steps(steps);
        unit.set_cohesion(unit.cohesion().worsen());
        if steps == 0 && unit.is_on_map() {
            info!(unit = %id, "unit eliminated");
            self.detach(id);
        }
    }

    // ========================================================================
    // COMMAND
    // ========================================================================

    fn leads(&self, leader: UnitId) -> GameResult<Option<WingId>> {
        let unit = self.unit(leader)?;
        let wing = self
            .state
            .wing(unit.wing())
            .ok_or(GameError::UnknownWing(unit.wing()))?;
        Ok((wing.leader == Some(leader)).then_some(wing.id))
    }

    /// Leader hands a specific order to a unit of its wing
    pub fn give_order(&mut self, leader: UnitId, target: UnitId) -> GameResult<bool> {
        let target_wing = self.unit(target)?.wing();
        if self.leads(leader)? != Some(target_wing) || leader == target {
            return Ok(false);
        }
        self.log.open();
        self.touch_unit(target).set_ordered(true);
        debug!(leader = %leader, target = %target, "specific order given");
        Ok(true)
    }

    /// Leader changes the wing instruction once per turn
    pub fn change_orders(&mut self, leader: UnitId, order: OrderInstruction) -> GameResult<bool> {
        let Some(wing) = self.leads(leader)? else {
            return Ok(false);
        };
        if self.unit(leader)?.has_played() {
            return Ok(false);
        }
        self.log.open();
        self.touch_wing(wing)?.order = order;
        self.touch_unit(leader).set_played(true);
        info!(wing = %wing, ?order, "wing orders changed");
        Ok(true)
    }

    /// Set a wing instruction directly (setup and scripted scenarios)
    pub fn change_wing_order(&mut self, wing: WingId, order: OrderInstruction) -> GameResult<()> {
        self.log.open();
        self.touch_wing(wing)?.order = order;
        Ok(())
    }

    pub fn take_command(&mut self, id: UnitId) -> GameResult<bool> {
        let unit = self.unit(id)?;
        if !unit.profile().commander || self.leads(id)?.is_some() {
            return Ok(false);
        }
        let wing = unit.wing();
        self.log.open();
        self.touch_wing(wing)?.leader = Some(id);
        Ok(true)
    }

    pub fn leave_command(&mut self, id: UnitId) -> GameResult<bool> {
        let Some(wing) = self.leads(id)? else {
            return Ok(false);
        };
        self.log.open();
        self.touch_wing(wing)?.leader = None;
        Ok(true)
    }

    // ========================================================================
    // COLLABORATOR INPUTS
    // ========================================================================

    pub fn set_weather(&mut self, weather: Weather) {
        debug!(?weather, "weather changed");
        self.state.weather = weather;
    }

    pub fn set_wing_tiredness(&mut self, wing: WingId, tiredness: Tiredness) -> GameResult<()> {
        if self.state.wing(wing).is_none() {
            return Err(GameError::UnknownWing(wing));
        }
        self.state.fatigue.insert(wing, tiredness);
        Ok(())
    }

    // ========================================================================
    // TURN
    // ========================================================================

    /// Close the current player's turn and hand over to the next player
    ///
    /// Refused while some action cannot be finished yet. Everything done
    /// before a completed turn becomes permanent.
    pub fn end_turn(&mut self) -> bool {
        if !self.turn_is_finishable() {
            warn!(player = %self.current_player().id, "turn cannot be closed yet");
            return false;
        }

        let ids: Vec<UnitId> = self.state.units().iter().map(|u| u.id()).collect();
        for &id in &ids {
            match self.state.units[&id].action().map(|a| a.status()) {
                Some(ActionStatus::Started | ActionStatus::Finished) => self.finalize(id),
                Some(ActionStatus::Initiated) => self.cancel(id),
                _ => {}
            }
        }

        let markers: Vec<(UnitId, bool)> = self
            .state
            .units()
            .into_iter()
            .filter(|u| u.is_on_map())
            .map(|u| {
                let engaging = !u.is_character()
                    && !self.arbitrator.hostiles_in_forward_zone(&self.state, u).is_empty();
                (u.id(), engaging)
            })
            .collect();
        for (id, engaging) in markers {
            self.touch_unit(id).set_engaging(engaging);
        }

        let player_count = self.state.players.len();
        let meta = self.touch_meta();
        meta.current_player = (meta.current_player + 1) % player_count;
        if meta.current_player == 0 {
            meta.turn += 1;
        }
        meta.selected = None;
        meta.focused = None;

        let player = self.state.current_player().id;
        for id in ids {
            if self.state.units[&id].player() == player {
                self.touch_unit(id).reset_for_turn();
            }
        }

        self.log.clear();
        info!(turn = self.state.turn(), player = %player, "turn started");
        true
    }
}
