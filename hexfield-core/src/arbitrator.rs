//! Rule engine: legality and outcome queries over a game state
//!
//! The arbitrator holds no game state of its own. Every query reads the
//! state it is handed and answers with data; an illegal option is simply
//! absent from the result. Querying a unit that is not on the map is a
//! caller bug and panics.

use crate::board::{angle_diff, invert, is_edge_angle, rotate, Angle, HexRef, HexSideRef, FACINGS};
use crate::config::RulesConfig;
use crate::dice::{AttackKind, CombatOutcome, DiceRoll, Recovery, RecoveryOutcome};
use crate::game::{GameState, OrderInstruction};
use crate::map::{Map, Terrain};
use crate::unit::{Cohesion, MoveTier, Munitions, Position, Unit, UnitCategory, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// One hex of a unit's front arc and the heading that reaches it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneHex {
    pub hex: HexRef,
    pub angle: Angle,
}

/// A legal step forward
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveOption {
    pub target: Position,
    /// Heading of the step; the unit keeps its facing
    pub direction: Angle,
    pub cost: f32,
    pub tier: MoveTier,
}

/// A legal facing change
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationOption {
    pub angle: Angle,
    /// Resulting position (formations pivoting around one end move)
    pub position: Position,
    pub cost: f32,
    pub tier: MoveTier,
}

/// How a forward move is constrained by the wing's instructions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    /// Ordered individually; no wing constraint
    Free,
    Attack,
    Defend,
    Regroup,
    Retreat,
}

impl From<OrderInstruction> for MoveMode {
    fn from(order: OrderInstruction) -> Self {
        match order {
            OrderInstruction::Attack => MoveMode::Attack,
            OrderInstruction::Defend => MoveMode::Defend,
            OrderInstruction::Regroup => MoveMode::Regroup,
            OrderInstruction::Retreat => MoveMode::Retreat,
        }
    }
}

/// Capability map: what a unit may be offered right now
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedActions {
    pub move_forward: Option<MoveMode>,
    pub move_back: bool,
    pub escape: bool,
    pub confront: bool,
    pub shock_attack: bool,
    pub fire_attack: bool,
    pub rest: bool,
    pub reload: bool,
    pub reorganize: bool,
    pub rally: bool,
    pub create_formation: bool,
    pub join_formation: bool,
    pub release_troops: bool,
    pub break_formation: bool,
    pub take_command: bool,
    pub leave_command: bool,
    pub change_orders: bool,
    pub give_specific_orders: bool,
    pub spellcasting: bool,
    pub merge: bool,
    pub miscellaneous: bool,
    pub destroyed: bool,
}

impl AllowedActions {
    /// Names of every granted capability, in vocabulary order
    pub fn allowed_names(&self) -> Vec<&'static str> {
        let flags = [
            (self.move_forward.is_some(), "move-forward"),
            (self.move_back, "move-back"),
            (self.escape, "escape"),
            (self.confront, "confront"),
            (self.shock_attack, "shock-attack"),
            (self.fire_attack, "fire-attack"),
            (self.rest, "rest"),
            (self.reload, "reload"),
            (self.reorganize, "reorganize"),
            (self.rally, "rally"),
            (self.create_formation, "create-formation"),
            (self.join_formation, "join-formation"),
            (self.release_troops, "release-troops"),
            (self.break_formation, "break-formation"),
            (self.take_command, "take-command"),
            (self.leave_command, "leave-command"),
            (self.change_orders, "change-orders"),
            (self.give_specific_orders, "give-specific-orders"),
            (self.spellcasting, "spellcasting"),
            (self.merge, "merge"),
            (self.miscellaneous, "miscellaneous"),
            (self.destroyed, "destroyed"),
        ];
        flags
            .into_iter()
            .filter_map(|(granted, name)| granted.then_some(name))
            .collect()
    }
}

// ============================================================================
// COSTS
// ============================================================================

/// Movement and rotation pricing, swappable per game
pub trait CostProfile: fmt::Debug + Send + Sync {
    /// Cost to enter `target`, `None` when it cannot be entered
    fn move_cost(&self, map: &Map, unit: &Unit, target: &Position) -> Option<f32>;

    /// Cost to turn to `angle`, `None` when the turn is not allowed
    fn rotation_cost(&self, unit: &Unit, angle: Angle) -> Option<f32>;
}

/// Default pricing: the worst terrain entered, flat rotation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainCosts {
    pub rotation: f32,
}

impl TerrainCosts {
    pub fn new(rotation: f32) -> Self {
        Self { rotation }
    }
}

impl Default for TerrainCosts {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl CostProfile for TerrainCosts {
    fn move_cost(&self, map: &Map, _unit: &Unit, target: &Position) -> Option<f32> {
        target
            .hexes()
            .into_iter()
            .map(|hex| {
                if map.geometry().contains(hex) {
                    map.terrain(hex).move_cost()
                } else {
                    None
                }
            })
            .try_fold(0.0f32, |worst, cost| cost.map(|c| worst.max(c)))
    }

    fn rotation_cost(&self, _unit: &Unit, _angle: Angle) -> Option<f32> {
        Some(self.rotation)
    }
}

// ============================================================================
// ARBITRATOR
// ============================================================================

#[derive(Debug)]
pub struct Arbitrator {
    rules: RulesConfig,
    costs: Box<dyn CostProfile>,
}

impl Default for Arbitrator {
    fn default() -> Self {
        Self::new(RulesConfig::default())
    }
}

impl Arbitrator {
    pub fn new(rules: RulesConfig) -> Self {
        let costs = Box::new(TerrainCosts::new(rules.rotation_cost));
        Self { rules, costs }
    }

    pub fn with_costs(mut self, costs: Box<dyn CostProfile>) -> Self {
        self.costs = costs;
        self
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn costs(&self) -> &dyn CostProfile {
        self.costs.as_ref()
    }

    // ========================================================================
    // ZONES AND ENGAGEMENT
    // ========================================================================

    /// Hexes spanning the unit's front arc
    pub fn forward_zone(&self, unit: &Unit) -> Vec<ZoneHex> {
        let facing = unit.angle();
        match on_map(unit) {
            Position::Hex(hex) => {
                let spread: &[i32] = if is_edge_angle(facing) { &[-60, 0, 60] } else { &[-30, 30] };
                spread
                    .iter()
                    .map(|&delta| {
                        let angle = rotate(facing, delta);
                        ZoneHex { hex: hex.neighbor(angle), angle }
                    })
                    .collect()
            }
            Position::Side(side) => {
                let mut zone: Vec<ZoneHex> = Vec::with_capacity(3);
                for hex in side.hexes() {
                    for delta in [-30, 30] {
                        let angle = rotate(facing, delta);
                        let front = hex.neighbor(angle);
                        if !side.contains(front) && !zone.iter().any(|z| z.hex == front) {
                            zone.push(ZoneHex { hex: front, angle });
                        }
                    }
                }
                zone
            }
        }
    }

    pub fn zone_contains(&self, unit: &Unit, hex: HexRef) -> bool {
        self.forward_zone(unit).iter().any(|z| z.hex == hex)
    }

    pub fn is_hostile(&self, a: &Unit, b: &Unit) -> bool {
        a.player() != b.player()
    }

    /// Hostile neighbors whose front arc covers the unit
    pub fn engaging_units(&self, state: &GameState, unit: &Unit, require_active: bool) -> Vec<UnitId> {
        let mut engagers = Vec::new();
        for hex in unit.hexes() {
            for (_, neighbor) in hex.neighbors() {
                if unit.occupies(neighbor) {
                    continue;
                }
                for other in state.units_at(neighbor) {
                    if !self.is_hostile(unit, other) || other.is_character() {
                        continue;
                    }
                    if require_active && !(other.is_engaging() || other.is_charging()) {
                        continue;
                    }
                    if engagers.contains(&other.id()) {
                        continue;
                    }
                    if self.forward_zone(other).iter().any(|z| unit.occupies(z.hex)) {
                        engagers.push(other.id());
                    }
                }
            }
        }
        engagers
    }

    pub fn is_unit_engaged(&self, state: &GameState, unit: &Unit, require_active: bool) -> bool {
        !self.engaging_units(state, unit, require_active).is_empty()
    }

    /// Hostile units standing in the unit's front arc
    pub fn hostiles_in_forward_zone(&self, state: &GameState, unit: &Unit) -> Vec<UnitId> {
        let mut hostiles = Vec::new();
        for zone in self.forward_zone(unit) {
            for other in state.units_at(zone.hex) {
                if self.is_hostile(unit, other) && !hostiles.contains(&other.id()) {
                    hostiles.push(other.id());
                }
            }
        }
        hostiles
    }

    /// Adjacent hexes a unit may flee into
    ///
    /// A hex is closed when it is off the grid, holds a hostile unit, cannot
    /// be entered or lies in the front arc of a hostile unit adjacent to the
    /// fleeing one.
    pub fn escape_hexes(&self, state: &GameState, unit: &Unit) -> Vec<HexRef> {
        let own = unit.hexes();
        let mut adjacent: Vec<HexRef> = Vec::new();
        for hex in &own {
            for (_, neighbor) in hex.neighbors() {
                if !own.contains(&neighbor) && !adjacent.contains(&neighbor) {
                    adjacent.push(neighbor);
                }
            }
        }

        let mut threatened: Vec<HexRef> = Vec::new();
        for hex in &adjacent {
            for other in state.units_at(*hex) {
                if self.is_hostile(unit, other) && !other.is_character() {
                    threatened.extend(self.forward_zone(other).into_iter().map(|z| z.hex));
                }
            }
        }

        adjacent
            .into_iter()
            .filter(|hex| {
                state.map().geometry().contains(*hex)
                    && state.map().terrain(*hex) != Terrain::Impassable
                    && !threatened.contains(hex)
                    && !state.units_at(*hex).any(|other| self.is_hostile(unit, other))
            })
            .collect()
    }

    // ========================================================================
    // CAPABILITIES
    // ========================================================================

    pub fn move_mode(&self, state: &GameState, unit: &Unit) -> MoveMode {
        if unit.is_ordered() {
            return MoveMode::Free;
        }
        state
            .wing(unit.wing())
            .map_or(MoveMode::Free, |wing| wing.order.into())
    }

    /// Regroup and retreat instructions forbid attacking unless the unit was ordered
    pub fn attack_allowed(&self, state: &GameState, unit: &Unit) -> bool {
        unit.is_ordered()
            || !matches!(
                self.move_mode(state, unit),
                MoveMode::Regroup | MoveMode::Retreat
            )
    }

    /// The single authoritative source of what may be offered to the player
    pub fn allowed_actions(&self, state: &GameState, unit: &Unit) -> AllowedActions {
        on_map(unit);
        let mut allowed = AllowedActions::default();

        if unit.is_spent() {
            allowed.miscellaneous = true;
            return allowed;
        }

        if unit.is_routed() {
            if self.escape_hexes(state, unit).is_empty() {
                allowed.destroyed = true;
            } else {
                allowed.escape = true;
                allowed.rally = unit.is_ordered();
            }
            return allowed;
        }

        let charging = unit.is_charging();
        let attack_allowed = self.attack_allowed(state, unit);
        let hostile_in_front = !self.hostiles_in_forward_zone(state, unit).is_empty();
        let engagers = self.engaging_units(state, unit, false);
        let engaged = !engagers.is_empty();

        if engaged {
            allowed.escape = !charging;
            allowed.confront = !charging
                && engagers.iter().any(|&id| {
                    state
                        .unit(id)
                        .is_some_and(|e| !e.hexes().iter().any(|&h| self.zone_contains(unit, h)))
                });
            allowed.shock_attack = hostile_in_front && attack_allowed;
        } else {
            let mode = self.move_mode(state, unit);
            allowed.move_forward = Some(mode);
            allowed.move_back = !charging && mode != MoveMode::Attack;
            allowed.rest = !charging && unit.tiredness() > state.wing_tiredness(unit.wing());
            allowed.reload = unit.profile().fire_range > 0 && unit.munitions() != Munitions::Plentiful;
            allowed.reorganize = unit.cohesion() == Cohesion::Disrupted;
            allowed.shock_attack =
                hostile_in_front && attack_allowed && unit.cohesion() == Cohesion::GoodOrder;
        }
        allowed.fire_attack = !charging && attack_allowed && !self.fire_targets(state, unit).is_empty();

        match unit.category() {
            UnitCategory::Troop => {
                allowed.merge = self.merge_partner(state, unit).is_some();
                allowed.create_formation = !engaged && self.adjacent_friend(state, unit, UnitCategory::Troop);
                allowed.join_formation = !engaged && self.adjacent_friend(state, unit, UnitCategory::Formation);
            }
            UnitCategory::Formation => {
                allowed.release_troops = !engaged;
                allowed.break_formation = true;
            }
            UnitCategory::Character => {}
        }

        if unit.profile().commander {
            let leads = state
                .wing(unit.wing())
                .is_some_and(|wing| wing.leader == Some(unit.id()));
            allowed.take_command = !leads;
            allowed.leave_command = leads;
            allowed.change_orders = leads && !unit.has_played();
            allowed.give_specific_orders = leads;
        }
        allowed.spellcasting = unit.profile().spellcaster && !engaged;
        allowed.miscellaneous = true;
        allowed
    }

    /// Friendly troop of the same family sharing the hex, if the merged unit fits
    pub fn merge_partner(&self, state: &GameState, unit: &Unit) -> Option<UnitId> {
        let hex = on_map(unit).anchor();
        state
            .units_at(hex)
            .find(|other| {
                other.id() != unit.id()
                    && other.category() == UnitCategory::Troop
                    && !self.is_hostile(unit, other)
                    && other.profile().family == unit.profile().family
                    && other.steps() + unit.steps() <= unit.profile().max_steps
            })
            .map(|other| other.id())
    }

    fn adjacent_friend(&self, state: &GameState, unit: &Unit, category: UnitCategory) -> bool {
        let hex = on_map(unit).anchor();
        hex.neighbors().iter().any(|(_, neighbor)| {
            state.units_at(*neighbor).any(|other| {
                other.category() == category
                    && !self.is_hostile(unit, other)
                    && other.profile().family == unit.profile().family
            })
        })
    }

    // ========================================================================
    // MOVEMENT
    // ========================================================================

    /// Budget a cost of `cost` would be paid from, if any
    fn tier(&self, unit: &Unit, cost: f32, first_step: bool) -> Option<MoveTier> {
        if unit.movement_points() >= cost {
            Some(MoveTier::Normal)
        } else if !unit.is_exhausted() && unit.extended_movement_points() >= cost {
            Some(MoveTier::Extended)
        } else if first_step {
            Some(MoveTier::Minimal)
        } else {
            None
        }
    }

    fn nearest_hostile(&self, state: &GameState, unit: &Unit, hexes: &[HexRef]) -> Option<u32> {
        state
            .units()
            .into_iter()
            .filter(|other| self.is_hostile(unit, other))
            .flat_map(|other| other.hexes())
            .flat_map(|target| hexes.iter().map(move |hex| hex.distance_to(target)))
            .min()
    }

    fn is_blocked(&self, state: &GameState, unit: &Unit, target: &Position) -> bool {
        target
            .hexes()
            .into_iter()
            .any(|hex| state.units_at(hex).any(|other| self.is_hostile(unit, other)))
    }

    /// Steps into the front arc and what each would cost
    pub fn allowed_moves(&self, state: &GameState, unit: &Unit, first_step: bool) -> Vec<MoveOption> {
        let facing = unit.angle();
        let candidates: Vec<(Angle, Position)> = match on_map(unit) {
            Position::Hex(_) => self
                .forward_zone(unit)
                .into_iter()
                .map(|z| (z.angle, Position::Hex(z.hex)))
                .collect(),
            Position::Side(side) => [-30, 30]
                .into_iter()
                .map(|delta| {
                    let angle = rotate(facing, delta);
                    let moved = HexSideRef::new(side.from.neighbor(angle), side.to.neighbor(angle));
                    (angle, Position::Side(moved))
                })
                .collect(),
        };

        let mode = self.move_mode(state, unit);
        let before = self.nearest_hostile(state, unit, &unit.hexes());

        candidates
            .into_iter()
            .filter(|(_, target)| !self.is_blocked(state, unit, target))
            .filter(|(_, target)| {
                let after = self.nearest_hostile(state, unit, &target.hexes());
                match (mode, before, after) {
                    (MoveMode::Attack, Some(before), Some(after)) => after <= before,
                    (MoveMode::Retreat, Some(before), Some(after)) => after >= before,
                    _ => true,
                }
            })
            .filter_map(|(direction, target)| {
                let cost = self.costs.move_cost(state.map(), unit, &target)?;
                let tier = self.tier(unit, cost, first_step)?;
                Some(MoveOption { target, direction, cost, tier })
            })
            .collect()
    }

    /// Facing changes and what each would cost
    pub fn allowed_rotations(&self, state: &GameState, unit: &Unit) -> Vec<RotationOption> {
        let facing = unit.angle();
        let candidates: Vec<(Angle, Position)> = match on_map(unit) {
            position @ Position::Hex(_) => FACINGS
                .iter()
                .filter(|&&angle| angle != facing)
                .map(|&angle| (angle, position))
                .collect(),
            position @ Position::Side(side) => {
                let mut candidates = vec![(invert(facing), position)];
                for delta in [-60, 60] {
                    let out = rotate(side.angle(), delta);
                    let around_from = HexSideRef::new(side.from, side.from.neighbor(out));
                    let back = rotate(invert(side.angle()), delta);
                    let around_to = HexSideRef::new(side.to.neighbor(back), side.to);
                    for pivoted in [around_from, around_to] {
                        let target = Position::Side(pivoted);
                        if self.is_blocked(state, unit, &target)
                            || self.costs.move_cost(state.map(), unit, &target).is_none()
                        {
                            continue;
                        }
                        candidates.push((rotate(facing, delta), target));
                    }
                }
                candidates
            }
        };

        candidates
            .into_iter()
            .filter_map(|(angle, position)| {
                let cost = self.costs.rotation_cost(unit, angle)?;
                // A facing change never qualifies for the minimal tier
                let tier = self.tier(unit, cost, false)?;
                Some(RotationOption { angle, position, cost, tier })
            })
            .collect()
    }

    // ========================================================================
    // COMBAT AND RECOVERY
    // ========================================================================

    pub fn arbitrate_recovery(&self, state: &GameState, recovery: Recovery, roll: DiceRoll) -> RecoveryOutcome {
        self.rules.recovery.interpret(recovery, roll, state.weather())
    }

    /// Whether the attacker stands outside the defender's front arc
    pub fn is_flank_attack(&self, attacker: &Unit, defender: &Unit) -> bool {
        let zone = self.forward_zone(defender);
        !attacker.hexes().iter().any(|hex| zone.iter().any(|z| z.hex == *hex))
    }

    pub fn arbitrate_shock_attack(&self, attacker: &Unit, defender: &Unit, roll: DiceRoll) -> CombatOutcome {
        let flank = self.is_flank_attack(attacker, defender);
        self.rules
            .combat
            .interpret(AttackKind::Shock, roll, flank, attacker.is_charging())
    }

    pub fn arbitrate_fire_attack(&self, attacker: &Unit, target: &Unit, roll: DiceRoll) -> CombatOutcome {
        let flank = self.is_flank_attack(attacker, target);
        self.rules.combat.interpret(AttackKind::Fire, roll, flank, false)
    }

    /// Target within missile range and inside the attacker's 120 degree field of fire
    pub fn is_in_fire_range(&self, state: &GameState, attacker: &Unit, target: &Unit) -> bool {
        let range = attacker.profile().fire_range;
        let (Some(from), Some(to)) = (attacker.position(), target.position()) else {
            return false;
        };
        if range == 0 {
            return false;
        }
        let distance = from
            .hexes()
            .iter()
            .flat_map(|a| to.hexes().into_iter().map(move |b| a.distance_to(b)))
            .min()
            .unwrap_or(u32::MAX);
        if distance == 0 || distance > range {
            return false;
        }
        let bearing = state.map().angle_between(&from, &to);
        let off = (bearing - attacker.angle() as f64).rem_euclid(360.0);
        off.min(360.0 - off) <= 60.0 + 1e-6
    }

    /// Hostile units the unit could shoot at now
    pub fn fire_targets(&self, state: &GameState, unit: &Unit) -> Vec<UnitId> {
        if unit.profile().fire_range == 0 || unit.munitions() == Munitions::Exhausted {
            return Vec::new();
        }
        state
            .units()
            .into_iter()
            .filter(|other| self.is_hostile(unit, other) && self.is_in_fire_range(state, unit, other))
            .map(|other| other.id())
            .collect()
    }

    /// Formations must lie across a hex-side perpendicular to their facing
    pub fn is_valid_deployment(&self, category: UnitCategory, position: &Position, angle: Angle) -> bool {
        if !FACINGS.contains(&angle) {
            return false;
        }
        match (category, position) {
            (UnitCategory::Formation, Position::Side(side)) => angle_diff(side.angle(), angle) == 90,
            (UnitCategory::Formation, Position::Hex(_)) => false,
            (_, Position::Hex(_)) => true,
            (_, Position::Side(_)) => false,
        }
    }
}

/// Position of a unit that must be on the map
fn on_map(unit: &Unit) -> Position {
    unit.position()
        .unwrap_or_else(|| panic!("unit {} is not on the map", unit.id()))
}
