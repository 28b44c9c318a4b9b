//! Scenario - battlefield setup read from JSON
//!
//! A scenario describes the starting position only: grid, ground, players,
//! wings, unit profiles and where each unit stands. It is not a save format
//! for a game in progress.

use crate::board::{Angle, Geometry, HexRef, HexSideRef};
use crate::config::RulesConfig;
use crate::game::{Game, OrderInstruction, Player, Wing};
use crate::map::{Map, Terrain, Weather};
use crate::unit::{
    Cohesion, Munitions, PlayerId, Position, Tiredness, Unit, UnitCategory, UnitId, UnitProfile,
    WingId,
};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ground override for one hex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainPatch {
    pub hex: HexRef,
    pub terrain: Terrain,
}

/// Starting fatigue aggregate of a wing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WingFatigue {
    pub wing: WingId,
    pub tiredness: Tiredness,
}

/// One unit of the order of battle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSetup {
    pub id: UnitId,
    pub player: PlayerId,
    pub wing: WingId,
    pub category: UnitCategory,
    /// Name of an entry in the scenario's profile list
    pub profile: String,
    /// Hex for troops and characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<HexRef>,
    /// Two adjacent hexes for formations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<[HexRef; 2]>,
    #[serde(default)]
    pub angle: Angle,
    #[serde(default)]
    pub tiredness: Tiredness,
    #[serde(default)]
    pub cohesion: Cohesion,
    #[serde(default)]
    pub munitions: Munitions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u8>,
    #[serde(default)]
    pub charging: bool,
}

impl UnitSetup {
    fn position(&self) -> anyhow::Result<Option<Position>> {
        match (self.hex, self.side) {
            (Some(_), Some(_)) => bail!("unit {} gives both a hex and a side", self.id),
            (Some(hex), None) => Ok(Some(Position::Hex(hex))),
            (None, Some([from, to])) => {
                if from.is_adjacent(to).is_none() {
                    bail!("unit {}: {from} and {to} are not adjacent", self.id);
                }
                Ok(Some(Position::Side(HexSideRef::new(from, to))))
            }
            (None, None) => Ok(None),
        }
    }
}

/// Starting position of a battle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
    pub players: Vec<Player>,
    #[serde(default)]
    pub wings: Vec<Wing>,
    #[serde(default)]
    pub profiles: Vec<UnitProfile>,
    pub units: Vec<UnitSetup>,
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub fatigue: Vec<WingFatigue>,
    #[serde(default)]
    pub rules: RulesConfig,
}

impl Scenario {
    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn profile(&self, name: &str) -> Option<&UnitProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Set up a game at the start of the first player's turn
    pub fn build(&self) -> anyhow::Result<Game> {
        if self.players.is_empty() {
            bail!("scenario '{}' has no players", self.name);
        }

        let mut game = Game::new(Map::new(self.geometry), self.players.clone())
            .with_rules(self.rules.clone());
        game.set_weather(self.weather);
        for patch in &self.terrain {
            game.set_terrain(patch.hex, patch.terrain);
        }
        for wing in &self.wings {
            if !self.players.iter().any(|p| p.id == wing.player) {
                bail!("wing {} belongs to unknown player {}", wing.id, wing.player);
            }
            game.add_wing(wing.clone());
        }
        for fatigue in &self.fatigue {
            game.set_wing_tiredness(fatigue.wing, fatigue.tiredness)?;
        }

        for setup in &self.units {
            let profile = self
                .profile(&setup.profile)
                .with_context(|| format!("unit {} uses unknown profile '{}'", setup.id, setup.profile))?;
            if game.state().wing(setup.wing).is_none() {
                bail!("unit {} belongs to unknown wing {}", setup.id, setup.wing);
            }
            if game.state().unit(setup.id).is_some() {
                bail!("unit {} declared twice", setup.id);
            }

            let mut unit = Unit::new(setup.id, setup.player, setup.wing, setup.category, profile.clone())
                .with_tiredness(setup.tiredness)
                .with_cohesion(setup.cohesion)
                .with_munitions(setup.munitions)
                .with_charging(setup.charging);
            if let Some(steps) = setup.steps {
                unit = unit.with_steps(steps);
            }
            game.add_unit(unit);

            if let Some(position) = setup.position()? {
                if !game
                    .arbitrator()
                    .is_valid_deployment(setup.category, &position, setup.angle)
                {
                    bail!(
                        "unit {} cannot deploy at {position} facing {}",
                        setup.id,
                        setup.angle
                    );
                }
                game.place_unit(setup.id, position, setup.angle)?;
            }
        }

        game.clear_history();
        Ok(game)
    }

    /// Small two-player engagement used when no scenario file is given
    pub fn skirmish() -> Self {
        let spearmen = UnitProfile::troop("spearmen").with_family("spear");
        let pike = UnitProfile::formation("pike").with_family("spear");
        let archers = UnitProfile::troop("archers").with_fire_range(3);
        let general = UnitProfile::character("general").as_commander();

        let setup = |id: u32, player: u8, profile: &UnitProfile, category, hex: Option<HexRef>, angle| UnitSetup {
            id: UnitId(id),
            player: PlayerId(player),
            wing: WingId(player),
            category,
            profile: profile.name.clone(),
            hex,
            side: None,
            angle,
            tiredness: Tiredness::Fresh,
            cohesion: Cohesion::GoodOrder,
            munitions: Munitions::Plentiful,
            steps: None,
            charging: false,
        };

        let mut units = vec![
            setup(1, 0, &spearmen, UnitCategory::Troop, Some(HexRef::new(4, 7)), 0),
            setup(2, 0, &archers, UnitCategory::Troop, Some(HexRef::new(5, 8)), 0),
            setup(3, 0, &general, UnitCategory::Character, Some(HexRef::new(4, 8)), 0),
            setup(11, 1, &spearmen, UnitCategory::Troop, Some(HexRef::new(4, 3)), 180),
            setup(12, 1, &archers, UnitCategory::Troop, Some(HexRef::new(3, 2)), 180),
            setup(13, 1, &general, UnitCategory::Character, Some(HexRef::new(4, 2)), 180),
        ];
        let mut pikes = setup(14, 1, &pike, UnitCategory::Formation, None, 90);
        pikes.side = Some([HexRef::new(6, 3), HexRef::new(6, 2)]);
        units.push(pikes);

        Self {
            name: "skirmish".to_string(),
            geometry: Geometry::regular(120.0, 10, 12),
            terrain: vec![
                TerrainPatch { hex: HexRef::new(4, 5), terrain: Terrain::Rough },
                TerrainPatch { hex: HexRef::new(5, 5), terrain: Terrain::Difficult },
                TerrainPatch { hex: HexRef::new(2, 5), terrain: Terrain::Impassable },
            ],
            players: vec![Player::new(PlayerId(0), "blue"), Player::new(PlayerId(1), "red")],
            wings: vec![
                Wing::new(WingId(0), PlayerId(0))
                    .with_order(OrderInstruction::Attack)
                    .with_leader(UnitId(3)),
                Wing::new(WingId(1), PlayerId(1)).with_leader(UnitId(13)),
            ],
            profiles: vec![spearmen, pike, archers, general],
            units,
            weather: Weather::Clear,
            fatigue: Vec::new(),
            rules: RulesConfig::default(),
        }
    }
}
