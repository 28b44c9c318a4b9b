//! Serializable views of a game shared by the commands

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use hexfield_core::{
    ActionStatus, Angle, Cohesion, Game, Munitions, PlayerId, Position, Scenario, Tiredness,
    Unit, UnitCategory, UnitId, Weather, WingId,
};

/// Scenario from a file, or the built-in skirmish
pub fn load_scenario(path: Option<&Path>) -> Result<Scenario> {
    match path {
        Some(path) => Scenario::load(path),
        None => Ok(Scenario::skirmish()),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ActionReport {
    pub name: String,
    pub status: ActionStatus,
    pub steps: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct UnitReport {
    pub id: UnitId,
    pub player: PlayerId,
    pub wing: WingId,
    pub profile: String,
    pub category: UnitCategory,
    pub position: Option<Position>,
    pub angle: Angle,
    pub movement_points: f32,
    pub extended_movement_points: f32,
    pub steps: u8,
    pub tiredness: Tiredness,
    pub cohesion: Cohesion,
    pub munitions: Munitions,
    pub charging: bool,
    pub engaging: bool,
    pub ordered: bool,
    pub played: bool,
    pub action: Option<ActionReport>,
}

impl UnitReport {
    pub fn from_unit(unit: &Unit) -> Self {
        Self {
            id: unit.id(),
            player: unit.player(),
            wing: unit.wing(),
            profile: unit.profile().name.clone(),
            category: unit.category(),
            position: unit.position(),
            angle: unit.angle(),
            movement_points: unit.movement_points(),
            extended_movement_points: unit.extended_movement_points(),
            steps: unit.steps(),
            tiredness: unit.tiredness(),
            cohesion: unit.cohesion(),
            munitions: unit.munitions(),
            charging: unit.is_charging(),
            engaging: unit.is_engaging(),
            ordered: unit.is_ordered(),
            played: unit.has_played(),
            action: unit.action().map(|a| ActionReport {
                name: a.name().to_string(),
                status: a.status(),
                steps: a.steps(),
            }),
        }
    }

    /// One-line summary for text output
    pub fn summary(&self) -> String {
        let position = self
            .position
            .map(|p| p.to_string())
            .unwrap_or_else(|| "off-map".to_string());
        let action = self
            .action
            .as_ref()
            .map(|a| format!(" [{} {}]", a.name, a.status))
            .unwrap_or_default();
        format!(
            "#{:<3} {:<10} {:<12} facing {:>3}  mp {:.1}/{:.1}  steps {}  {:?}/{:?}/{:?}{}",
            self.id.0,
            self.profile,
            position,
            self.angle,
            self.movement_points,
            self.extended_movement_points,
            self.steps,
            self.tiredness,
            self.cohesion,
            self.munitions,
            action
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StateReport {
    pub scenario: String,
    pub turn: u32,
    pub current_player: String,
    pub weather: Weather,
    pub selected: Option<UnitId>,
    pub focused: Option<UnitId>,
    pub turn_finishable: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub units: Vec<UnitReport>,
}

impl StateReport {
    pub fn capture(scenario: &str, game: &Game) -> Self {
        let state = game.state();
        Self {
            scenario: scenario.to_string(),
            turn: state.turn(),
            current_player: state.current_player().name.clone(),
            weather: state.weather(),
            selected: state.selected(),
            focused: state.focused(),
            turn_finishable: game.turn_is_finishable(),
            can_undo: game.can_undo(),
            can_redo: game.can_redo(),
            units: state.units().into_iter().map(UnitReport::from_unit).collect(),
        }
    }

    pub fn print_text(&self) {
        println!("\n=== {} ===", self.scenario);
        println!("Turn:     {}", self.turn);
        println!("Player:   {}", self.current_player);
        println!("Weather:  {:?}", self.weather);
        if let Some(selected) = self.selected {
            println!("Selected: {}", selected);
        }
        println!(
            "Turn finishable: {}  undo: {}  redo: {}",
            self.turn_finishable, self.can_undo, self.can_redo
        );
        println!("\nUnits:");
        for unit in &self.units {
            println!("  {}", unit.summary());
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
