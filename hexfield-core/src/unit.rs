//! Unit definitions: identity, profile, status tracks and position

use crate::action::{Action, ActionStatus};
use crate::board::{Angle, Geometry, HexRef, HexSideRef, Located, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Roster key of a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WingId(pub u8);

impl fmt::Display for WingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

// ============================================================================
// STATUS TRACKS
// ============================================================================

/// Kind of counter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Troop,
    /// Two troops deployed along a hex-side
    Formation,
    Character,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tiredness {
    #[default]
    Fresh,
    Tired,
    Exhausted,
}

impl Tiredness {
    pub fn worsen(self) -> Self {
        match self {
            Tiredness::Fresh => Tiredness::Tired,
            _ => Tiredness::Exhausted,
        }
    }

    pub fn recover(self) -> Self {
        match self {
            Tiredness::Exhausted => Tiredness::Tired,
            _ => Tiredness::Fresh,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohesion {
    #[default]
    GoodOrder,
    Disrupted,
    Routed,
}

impl Cohesion {
    pub fn worsen(self) -> Self {
        match self {
            Cohesion::GoodOrder => Cohesion::Disrupted,
            _ => Cohesion::Routed,
        }
    }

    pub fn recover(self) -> Self {
        match self {
            Cohesion::Routed => Cohesion::Disrupted,
            _ => Cohesion::GoodOrder,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Munitions {
    #[default]
    Plentiful,
    Scarce,
    Exhausted,
}

impl Munitions {
    pub fn deplete(self) -> Self {
        match self {
            Munitions::Plentiful => Munitions::Scarce,
            _ => Munitions::Exhausted,
        }
    }

    pub fn replenish(self) -> Self {
        match self {
            Munitions::Exhausted => Munitions::Scarce,
            _ => Munitions::Plentiful,
        }
    }
}

// ============================================================================
// POSITION
// ============================================================================

/// Where a unit stands: one hex, or a hex-side for formations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Hex(HexRef),
    Side(HexSideRef),
}

impl Position {
    pub fn hexes(&self) -> Vec<HexRef> {
        match self {
            Position::Hex(hex) => vec![*hex],
            Position::Side(side) => side.hexes().to_vec(),
        }
    }

    pub fn contains(&self, hex: HexRef) -> bool {
        match self {
            Position::Hex(h) => *h == hex,
            Position::Side(side) => side.contains(hex),
        }
    }

    /// Hex used as the reference point (first hex of a side)
    pub fn anchor(&self) -> HexRef {
        match self {
            Position::Hex(hex) => *hex,
            Position::Side(side) => side.from,
        }
    }
}

impl Located for Position {
    fn location(&self, geometry: &Geometry) -> Point {
        match self {
            Position::Hex(hex) => hex.location(geometry),
            Position::Side(side) => side.location(geometry),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Hex(hex) => write!(f, "{hex}"),
            Position::Side(side) => write!(f, "{side}"),
        }
    }
}

// ============================================================================
// PROFILE
// ============================================================================

/// Static characteristics shared by every unit of a type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitProfile {
    pub name: String,
    /// Troops and the formation they deploy into share a family
    pub family: String,
    pub movement_points: f32,
    pub extended_movement_points: f32,
    pub max_steps: u8,
    /// Missile range in hexes, 0 for melee-only units
    pub fire_range: u32,
    pub commander: bool,
    pub spellcaster: bool,
}

impl Default for UnitProfile {
    fn default() -> Self {
        Self::troop("troop")
    }
}

impl UnitProfile {
    pub fn troop(name: &str) -> Self {
        Self {
            name: name.to_string(),
            family: name.to_string(),
            movement_points: 2.0,
            extended_movement_points: 3.0,
            max_steps: 2,
            fire_range: 0,
            commander: false,
            spellcaster: false,
        }
    }

    pub fn formation(name: &str) -> Self {
        Self {
            movement_points: 1.0,
            extended_movement_points: 2.0,
            max_steps: 4,
            ..Self::troop(name)
        }
    }

    pub fn character(name: &str) -> Self {
        Self {
            movement_points: 3.0,
            extended_movement_points: 4.0,
            max_steps: 1,
            ..Self::troop(name)
        }
    }

    pub fn with_family(mut self, family: &str) -> Self {
        self.family = family.to_string();
        self
    }

    pub fn with_movement(mut self, normal: f32, extended: f32) -> Self {
        self.movement_points = normal;
        self.extended_movement_points = extended;
        self
    }

    pub fn with_fire_range(mut self, range: u32) -> Self {
        self.fire_range = range;
        self
    }

    pub fn as_commander(mut self) -> Self {
        self.commander = true;
        self
    }

    pub fn as_spellcaster(mut self) -> Self {
        self.spellcaster = true;
        self
    }
}

// ============================================================================
// UNIT
// ============================================================================

/// Which budget a move or rotation is paid from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveTier {
    Normal,
    Extended,
    /// Forced minimal advance, allowed once on the first step
    Minimal,
}

/// A counter on (or off) the battlefield
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    id: UnitId,
    player: PlayerId,
    wing: WingId,
    category: UnitCategory,
    profile: UnitProfile,
    position: Option<Position>,
    angle: Angle,
    movement_points: f32,
    extended_movement_points: f32,
    steps: u8,
    tiredness: Tiredness,
    cohesion: Cohesion,
    munitions: Munitions,
    charging: bool,
    engaging: bool,
    ordered: bool,
    played: bool,
    action: Option<Action>,
}

impl Unit {
    /// Create a detached unit with full budgets
    pub fn new(
        id: UnitId,
        player: PlayerId,
        wing: WingId,
        category: UnitCategory,
        profile: UnitProfile,
    ) -> Self {
        Self {
            id,
            player,
            wing,
            category,
            movement_points: profile.movement_points,
            extended_movement_points: profile.extended_movement_points,
            steps: profile.max_steps,
            profile,
            position: None,
            angle: 0,
            tiredness: Tiredness::Fresh,
            cohesion: Cohesion::GoodOrder,
            munitions: Munitions::Plentiful,
            charging: false,
            engaging: false,
            ordered: false,
            played: false,
            action: None,
        }
    }

    pub fn with_tiredness(mut self, tiredness: Tiredness) -> Self {
        self.tiredness = tiredness;
        self
    }

    pub fn with_cohesion(mut self, cohesion: Cohesion) -> Self {
        self.cohesion = cohesion;
        self
    }

    pub fn with_munitions(mut self, munitions: Munitions) -> Self {
        self.munitions = munitions;
        self
    }

    pub fn with_steps(mut self, steps: u8) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_charging(mut self, charging: bool) -> Self {
        self.charging = charging;
        self
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn wing(&self) -> WingId {
        self.wing
    }

    pub fn category(&self) -> UnitCategory {
        self.category
    }

    pub fn profile(&self) -> &UnitProfile {
        &self.profile
    }

    pub fn is_character(&self) -> bool {
        self.category == UnitCategory::Character
    }

    pub fn is_formation(&self) -> bool {
        self.category == UnitCategory::Formation
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn is_on_map(&self) -> bool {
        self.position.is_some()
    }

    /// Hexes covered by the unit (empty when detached)
    pub fn hexes(&self) -> Vec<HexRef> {
        self.position.map(|p| p.hexes()).unwrap_or_default()
    }

    pub fn occupies(&self, hex: HexRef) -> bool {
        self.position.is_some_and(|p| p.contains(hex))
    }

    pub fn angle(&self) -> Angle {
        self.angle
    }

    pub fn movement_points(&self) -> f32 {
        self.movement_points
    }

    pub fn extended_movement_points(&self) -> f32 {
        self.extended_movement_points
    }

    pub fn steps(&self) -> u8 {
        self.steps
    }

    pub fn tiredness(&self) -> Tiredness {
        self.tiredness
    }

    pub fn is_exhausted(&self) -> bool {
        self.tiredness == Tiredness::Exhausted
    }

    pub fn cohesion(&self) -> Cohesion {
        self.cohesion
    }

    pub fn is_routed(&self) -> bool {
        self.cohesion == Cohesion::Routed
    }

    pub fn munitions(&self) -> Munitions {
        self.munitions
    }

    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn is_engaging(&self) -> bool {
        self.engaging
    }

    /// Received a specific order from its leader this turn
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Has acted during its player's current turn
    pub fn has_played(&self) -> bool {
        self.played
    }

    /// Played this turn and its activation is over; no further activation until reset
    pub fn is_spent(&self) -> bool {
        self.played
            && self
                .action
                .as_ref()
                .is_some_and(|a| a.status() == ActionStatus::Finalized)
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// Whether the unit's turn may be closed
    pub fn is_finishable(&self) -> bool {
        self.action.as_ref().map_or(true, |a| a.is_finishable())
    }

    // ========================================================================
    // MUTATORS (reached through the game, which registers the unit first)
    // ========================================================================

    pub fn set_tiredness(&mut self, tiredness: Tiredness) {
        self.tiredness = tiredness;
    }

    pub fn set_cohesion(&mut self, cohesion: Cohesion) {
        self.cohesion = cohesion;
    }

    pub fn set_munitions(&mut self, munitions: Munitions) {
        self.munitions = munitions;
    }

    pub fn set_charging(&mut self, charging: bool) {
        self.charging = charging;
    }

    pub fn set_engaging(&mut self, engaging: bool) {
        self.engaging = engaging;
    }

    pub(crate) fn set_ordered(&mut self, ordered: bool) {
        self.ordered = ordered;
    }

    pub(crate) fn set_played(&mut self, played: bool) {
        self.played = played;
    }

    pub(crate) fn set_steps(&mut self, steps: u8) {
        self.steps = steps;
    }

    pub(crate) fn set_location(&mut self, position: Option<Position>, angle: Angle) {
        self.position = position;
        self.angle = angle;
    }

    pub(crate) fn action_mut(&mut self) -> Option<&mut Action> {
        self.action.as_mut()
    }

    pub(crate) fn set_action(&mut self, action: Option<Action>) {
        self.action = action;
    }

    /// Pay for a move or rotation from the budget the tier names
    pub(crate) fn spend(&mut self, cost: f32, tier: MoveTier) {
        match tier {
            MoveTier::Normal => {
                self.movement_points = (self.movement_points - cost).max(0.0);
            }
            MoveTier::Extended => {
                self.movement_points = 0.0;
                self.extended_movement_points = (self.extended_movement_points - cost).max(0.0);
            }
            MoveTier::Minimal => {
                self.movement_points = 0.0;
                self.extended_movement_points = 0.0;
            }
        }
    }

    /// Start-of-turn reset for the unit's own player
    pub(crate) fn reset_for_turn(&mut self) {
        self.movement_points = self.profile.movement_points;
        self.extended_movement_points = self.profile.extended_movement_points;
        self.played = false;
        self.ordered = false;
        self.action = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn troop() -> Unit {
        Unit::new(
            UnitId(1),
            PlayerId(0),
            WingId(0),
            UnitCategory::Troop,
            UnitProfile::troop("pikemen"),
        )
    }

    #[test]
    fn test_new_unit_is_detached() {
        let unit = troop();
        assert!(!unit.is_on_map());
        assert!(unit.hexes().is_empty());
        assert_eq!(unit.movement_points(), 2.0);
        assert_eq!(unit.extended_movement_points(), 3.0);
        assert_eq!(unit.steps(), 2);
        assert!(unit.is_finishable());
    }

    #[test]
    fn test_spend_by_tier() {
        let mut unit = troop();
        unit.spend(1.0, MoveTier::Normal);
        assert_eq!(unit.movement_points(), 1.0);
        assert_eq!(unit.extended_movement_points(), 3.0);

        unit.spend(1.5, MoveTier::Extended);
        assert_eq!(unit.movement_points(), 0.0);
        assert_eq!(unit.extended_movement_points(), 1.5);

        unit.spend(2.0, MoveTier::Minimal);
        assert_eq!(unit.extended_movement_points(), 0.0);

        unit.reset_for_turn();
        assert_eq!(unit.movement_points(), 2.0);
        assert_eq!(unit.extended_movement_points(), 3.0);
    }

    #[test]
    fn test_status_tracks_saturate() {
        assert_eq!(Tiredness::Exhausted.worsen(), Tiredness::Exhausted);
        assert_eq!(Tiredness::Fresh.recover(), Tiredness::Fresh);
        assert_eq!(Cohesion::GoodOrder.worsen().worsen(), Cohesion::Routed);
        assert_eq!(Cohesion::Routed.recover(), Cohesion::Disrupted);
        assert_eq!(Munitions::Exhausted.replenish(), Munitions::Scarce);
        assert_eq!(Munitions::Plentiful.deplete(), Munitions::Scarce);
    }

    #[test]
    fn test_side_position() {
        let side = HexRef::new(2, 2).side_to(0);
        let position = Position::Side(side);
        assert_eq!(position.hexes(), vec![HexRef::new(2, 2), HexRef::new(2, 1)]);
        assert!(position.contains(HexRef::new(2, 1)));
        assert_eq!(position.anchor(), HexRef::new(2, 2));
    }
}
