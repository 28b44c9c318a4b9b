//! Inspect command - what the current player's units may do right now
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: collect_options(), report_options()
//! - Level 3: unit_options()
//! - Level 4: formatting utilities

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use hexfield_core::{Game, MoveOption, RotationOption, Unit};

use crate::report::{load_scenario, print_json, StateReport, UnitReport};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct InspectArgs {
    /// Scenario JSON file (built-in skirmish when omitted)
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, Serialize)]
struct UnitOptions {
    unit: UnitReport,
    allowed: Vec<&'static str>,
    moves: Vec<MoveOption>,
    rotations: Vec<RotationOption>,
}

#[derive(Clone, Debug, Serialize)]
struct Inspection {
    state: StateReport,
    options: Vec<UnitOptions>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run inspect command
pub fn run(args: InspectArgs) -> Result<()> {
    let scenario = load_scenario(args.scenario.as_deref())?;
    let game = scenario.build()?;

    tracing::info!(
        "Inspecting '{}' (turn {}, player {})",
        scenario.name,
        game.state().turn(),
        game.current_player().name
    );

    let inspection = Inspection {
        state: StateReport::capture(&scenario.name, &game),
        options: collect_options(&game)?,
    };

    report_options(&inspection, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Options for every on-map unit of the current player
fn collect_options(game: &Game) -> Result<Vec<UnitOptions>> {
    let player = game.current_player().id;
    game.state()
        .units()
        .into_iter()
        .filter(|u| u.player() == player && u.is_on_map())
        .map(|u| unit_options(game, u))
        .collect()
}

fn report_options(inspection: &Inspection, args: &InspectArgs) -> Result<()> {
    if args.json {
        print_json(inspection)
    } else {
        print_text(inspection);
        Ok(())
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn unit_options(game: &Game, unit: &Unit) -> Result<UnitOptions> {
    let id = unit.id();
    Ok(UnitOptions {
        unit: UnitReport::from_unit(unit),
        allowed: game.allowed_actions(id)?.allowed_names(),
        moves: game.allowed_moves(id)?,
        rotations: game.allowed_rotations(id)?,
    })
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn print_text(inspection: &Inspection) {
    inspection.state.print_text();

    println!("\n=== Options for {} ===", inspection.state.current_player);
    for options in &inspection.options {
        println!("\n{}", options.unit.summary());
        println!("  allowed:   {}", options.allowed.join(", "));
        let moves: Vec<String> = options.moves.iter().map(format_move).collect();
        println!("  moves:     {}", if moves.is_empty() { "-".to_string() } else { moves.join(", ") });
        let rotations: Vec<String> = options.rotations.iter().map(format_rotation).collect();
        println!(
            "  rotations: {}",
            if rotations.is_empty() { "-".to_string() } else { rotations.join(", ") }
        );
    }
}

fn format_move(option: &MoveOption) -> String {
    format!("{}@{} ({:.1} {:?})", option.target, option.direction, option.cost, option.tier)
}

fn format_rotation(option: &RotationOption) -> String {
    format!("{} ({:.1} {:?})", option.angle, option.cost, option.tier)
}
