//! Run command - replay a JSON command script against a scenario
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: load_script(), execute_script(), report_results()
//! - Level 3: execute_command() and its precondition checks
//! - Level 4: dice and formatting utilities
//!
//! A script is a JSON array of objects tagged by `command`:
//!
//! ```json
//! [
//!   { "command": "select", "unit": 1 },
//!   { "command": "move", "unit": 1, "direction": 0 },
//!   { "command": "recover", "unit": 2, "dice": [3, 4] },
//!   { "command": "end-turn" }
//! ]
//! ```
//!
//! Commands the rules refuse are reported and the script carries on.
//! Commands that would misuse the game API (unknown units, units off the
//! map, finishing an action that has not started) abort the run.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use hexfield_core::{
    ActionRegistry, ActionStatus, Angle, CombatOutcome, DiceRoll, Game, HexRef, OrderInstruction,
    ProgressionEvent, UnitId, Weather,
};

use crate::report::{load_scenario, print_json, StateReport};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct RunArgs {
    /// Scenario JSON file (built-in skirmish when omitted)
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Command script JSON file
    #[arg(long, value_name = "FILE")]
    pub script: PathBuf,

    /// Random seed for dice not given in the script
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// One scripted intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ScriptCommand {
    Select { unit: UnitId },
    Start { unit: UnitId, kind: String },
    Move { unit: UnitId, direction: Angle },
    Rotate {
        unit: UnitId,
        angle: Angle,
        /// Hex the unit must still cover afterwards (formation pivots)
        #[serde(default)]
        keep: Option<HexRef>,
    },
    Started { unit: UnitId },
    Finish { unit: UnitId },
    Finalize { unit: UnitId },
    Cancel { unit: UnitId },
    Recover {
        unit: UnitId,
        #[serde(default)]
        dice: Option<[u8; 2]>,
    },
    Shock {
        unit: UnitId,
        target: UnitId,
        #[serde(default)]
        dice: Option<[u8; 2]>,
    },
    Fire {
        unit: UnitId,
        target: UnitId,
        #[serde(default)]
        dice: Option<[u8; 2]>,
    },
    Order { leader: UnitId, unit: UnitId },
    ChangeOrders { leader: UnitId, order: OrderInstruction },
    Weather { weather: Weather },
    Undo,
    Redo,
    EndTurn,
}

impl ScriptCommand {
    fn name(&self) -> &'static str {
        match self {
            ScriptCommand::Select { .. } => "select",
            ScriptCommand::Start { .. } => "start",
            ScriptCommand::Move { .. } => "move",
            ScriptCommand::Rotate { .. } => "rotate",
            ScriptCommand::Started { .. } => "started",
            ScriptCommand::Finish { .. } => "finish",
            ScriptCommand::Finalize { .. } => "finalize",
            ScriptCommand::Cancel { .. } => "cancel",
            ScriptCommand::Recover { .. } => "recover",
            ScriptCommand::Shock { .. } => "shock",
            ScriptCommand::Fire { .. } => "fire",
            ScriptCommand::Order { .. } => "order",
            ScriptCommand::ChangeOrders { .. } => "change-orders",
            ScriptCommand::Weather { .. } => "weather",
            ScriptCommand::Undo => "undo",
            ScriptCommand::Redo => "redo",
            ScriptCommand::EndTurn => "end-turn",
        }
    }
}

/// Outcome of one script step
#[derive(Clone, Debug, Serialize)]
struct StepRecord {
    step: usize,
    command: &'static str,
    accepted: bool,
    outcome: String,
    /// Action progression published while the step ran
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<ProgressionEvent>,
}

#[derive(Clone, Debug, Serialize)]
struct RunResults {
    steps: Vec<StepRecord>,
    final_state: StateReport,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run script command
///
/// 1. Load the scenario and the script
/// 2. Execute every command in order
/// 3. Report each step and the final state
pub fn run(args: RunArgs) -> Result<()> {
    let scenario = load_scenario(args.scenario.as_deref())?;
    let script = load_script(&args.script)?;
    let mut game = scenario.build()?;

    tracing::info!(
        "Running {} commands against '{}'",
        script.len(),
        scenario.name
    );

    let mut rng = create_rng(args.seed);
    let steps = execute_script(&mut game, &script, &mut rng)?;

    let results = RunResults {
        steps,
        final_state: StateReport::capture(&scenario.name, &game),
    };
    report_results(&results, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn load_script(path: &Path) -> Result<Vec<ScriptCommand>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse script: {}", path.display()))
}

fn execute_script(
    game: &mut Game,
    script: &[ScriptCommand],
    rng: &mut ChaCha8Rng,
) -> Result<Vec<StepRecord>> {
    let mut steps = Vec::with_capacity(script.len());
    for (index, command) in script.iter().enumerate() {
        let step = index + 1;
        let (accepted, outcome) = execute_command(game, command, rng)
            .with_context(|| format!("step {} ({})", step, command.name()))?;
        tracing::info!("Step {}: {} -> {}", step, command.name(), outcome);
        steps.push(StepRecord {
            step,
            command: command.name(),
            accepted,
            outcome,
            events: game.take_events(),
        });
    }
    Ok(steps)
}

fn report_results(results: &RunResults, args: &RunArgs) -> Result<()> {
    if args.json {
        print_json(results)
    } else {
        print_text_results(results);
        Ok(())
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Apply one command; returns whether the rules accepted it and a description
fn execute_command(
    game: &mut Game,
    command: &ScriptCommand,
    rng: &mut ChaCha8Rng,
) -> Result<(bool, String)> {
    let result = match command {
        ScriptCommand::Select { unit } => {
            let accepted = game.select_unit(*unit)?;
            (accepted, verdict(accepted, format!("selected {unit}"), "selection refused"))
        }
        ScriptCommand::Start { unit, kind } => {
            require_replaceable(game, *unit)?;
            if game.unit(*unit)?.is_spent() && kind != ActionRegistry::NO_ACTION {
                return Ok((false, format!("{unit} has already acted this turn")));
            }
            game.start_action(*unit, kind)?;
            (true, format!("{unit} initiated {kind}"))
        }
        ScriptCommand::Move { unit, direction } => {
            require_on_map(game, *unit)?;
            let option = game
                .allowed_moves(*unit)?
                .into_iter()
                .find(|o| o.direction == *direction);
            match option {
                Some(option) => {
                    game.move_unit(*unit, &option)?;
                    (true, format!("{unit} moved to {} ({:?})", option.target, option.tier))
                }
                None => (false, format!("{unit} cannot move toward {direction}")),
            }
        }
        ScriptCommand::Rotate { unit, angle, keep } => {
            require_on_map(game, *unit)?;
            let option = game
                .allowed_rotations(*unit)?
                .into_iter()
                .find(|o| o.angle == *angle && keep.map_or(true, |hex| o.position.contains(hex)));
            match option {
                Some(option) => {
                    game.rotate_unit(*unit, &option)?;
                    (true, format!("{unit} now faces {}", option.angle))
                }
                None => (false, format!("{unit} cannot turn to {angle}")),
            }
        }
        ScriptCommand::Started { unit } => {
            require_status(game, *unit, &[ActionStatus::Initiated])?;
            game.mark_as_started(*unit)?;
            (true, format!("{unit} started its action"))
        }
        ScriptCommand::Finish { unit } => {
            let status = require_status(game, *unit, &[ActionStatus::Started, ActionStatus::Finished])?;
            if !status.is_finished() && !game.unit(*unit)?.is_finishable() {
                return Ok((false, format!("{unit} cannot finish its action yet")));
            }
            game.mark_as_finished(*unit)?;
            (true, format!("{unit} finished its action"))
        }
        ScriptCommand::Finalize { unit } => {
            require_status(
                game,
                *unit,
                &[ActionStatus::Started, ActionStatus::Finished, ActionStatus::Finalized],
            )?;
            game.finalize_action(*unit)?;
            (true, format!("{unit} finalized its action"))
        }
        ScriptCommand::Cancel { unit } => {
            require_status(game, *unit, &[ActionStatus::Initiated])?;
            game.cancel_action(*unit)?;
            (true, format!("{unit} cancelled its action"))
        }
        ScriptCommand::Recover { unit, dice } => {
            let pending = game.unit(*unit)?.action().filter(|a| !a.status().is_finished());
            let Some(recovery) = pending.and_then(|a| a.recovery()) else {
                bail!("unit {unit} has no pending recovery action");
            };
            let roll = dice_roll(*dice, rng)?;
            let outcome = game.resolve_recovery(*unit, roll)?;
            (
                outcome.success,
                format!(
                    "{unit} {} rolled {} ({})",
                    recovery.name(),
                    roll.sum(),
                    if outcome.success { "success" } else { "failure" }
                ),
            )
        }
        ScriptCommand::Shock { unit, target, dice } => {
            require_on_map(game, *unit)?;
            require_replaceable(game, *unit)?;
            let state = game.state();
            let attacker = game.unit(*unit)?;
            let allowed = game.arbitrator().allowed_actions(state, attacker).shock_attack
                && game
                    .arbitrator()
                    .hostiles_in_forward_zone(state, attacker)
                    .contains(target);
            if !allowed {
                return Ok((false, format!("{unit} cannot shock {target}")));
            }
            let roll = dice_roll(*dice, rng)?;
            let outcome = game.resolve_shock_attack(*unit, *target, roll)?;
            (outcome.success, format_attack(*unit, *target, &outcome))
        }
        ScriptCommand::Fire { unit, target, dice } => {
            require_on_map(game, *unit)?;
            require_replaceable(game, *unit)?;
            let state = game.state();
            let attacker = game.unit(*unit)?;
            let allowed = game.arbitrator().allowed_actions(state, attacker).fire_attack
                && game.arbitrator().fire_targets(state, attacker).contains(target);
            if !allowed {
                return Ok((false, format!("{unit} cannot fire at {target}")));
            }
            let roll = dice_roll(*dice, rng)?;
            let outcome = game.resolve_fire_attack(*unit, *target, roll)?;
            (outcome.success, format_attack(*unit, *target, &outcome))
        }
        ScriptCommand::Order { leader, unit } => {
            let accepted = game.give_order(*leader, *unit)?;
            (accepted, verdict(accepted, format!("{leader} ordered {unit}"), "order refused"))
        }
        ScriptCommand::ChangeOrders { leader, order } => {
            let accepted = game.change_orders(*leader, *order)?;
            (
                accepted,
                verdict(accepted, format!("{leader} changed orders to {order:?}"), "order change refused"),
            )
        }
        ScriptCommand::Weather { weather } => {
            game.set_weather(*weather);
            (true, format!("weather is now {weather:?}"))
        }
        ScriptCommand::Undo => {
            let accepted = game.undo();
            (accepted, verdict(accepted, "undone".to_string(), "nothing to undo"))
        }
        ScriptCommand::Redo => {
            let accepted = game.redo();
            (accepted, verdict(accepted, "redone".to_string(), "nothing to redo"))
        }
        ScriptCommand::EndTurn => {
            let accepted = game.end_turn();
            let outcome = if accepted {
                format!(
                    "turn {} for {}",
                    game.state().turn(),
                    game.current_player().name
                )
            } else {
                "an action still awaits completion".to_string()
            };
            (accepted, outcome)
        }
    };
    Ok(result)
}

/// A new action may not replace one that started and is not finalized
fn require_replaceable(game: &Game, unit: UnitId) -> Result<()> {
    let status = game.unit(unit)?.action().map(|a| a.status());
    if let Some(status @ (ActionStatus::Started | ActionStatus::Finished)) = status {
        bail!("unit {unit} still has a {status} action");
    }
    Ok(())
}

/// Map queries are only defined for deployed units
fn require_on_map(game: &Game, unit: UnitId) -> Result<()> {
    if !game.unit(unit)?.is_on_map() {
        bail!("unit {unit} is not on the map");
    }
    Ok(())
}

fn require_status(game: &Game, unit: UnitId, expected: &[ActionStatus]) -> Result<ActionStatus> {
    let Some(action) = game.unit(unit)?.action() else {
        bail!("unit {unit} has no action");
    };
    let status = action.status();
    if !expected.contains(&status) {
        bail!("unit {unit} has a {status} {} action", action.name());
    }
    Ok(status)
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

/// Create RNG from seed or random
fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Scripted dice, or a fresh roll
fn dice_roll(dice: Option<[u8; 2]>, rng: &mut ChaCha8Rng) -> Result<DiceRoll> {
    match dice {
        Some([first, second]) => {
            if !(1..=6).contains(&first) || !(1..=6).contains(&second) {
                bail!("dice must show 1 to 6, got {first} and {second}");
            }
            Ok(DiceRoll::new(first, second))
        }
        None => Ok(DiceRoll::roll(rng)),
    }
}

fn verdict(accepted: bool, yes: String, no: &str) -> String {
    if accepted {
        yes
    } else {
        no.to_string()
    }
}

fn format_attack(attacker: UnitId, target: UnitId, outcome: &CombatOutcome) -> String {
    format!(
        "{attacker} {:?} attack on {target}: rolled {} against {}{} ({})",
        outcome.kind,
        outcome.roll.sum(),
        outcome.threshold,
        if outcome.flank { ", flank" } else { "" },
        if outcome.success { "hit" } else { "miss" }
    )
}

/// Print results as text
fn print_text_results(results: &RunResults) {
    println!("\n=== Script ===");
    for step in &results.steps {
        println!(
            "{:>3}. {:<14} {} {}",
            step.step,
            step.command,
            if step.accepted { "ok  " } else { "no  " },
            step.outcome
        );
        for event in &step.events {
            println!("       {} {} {}", event.unit, event.action, event.status);
        }
    }
    results.final_state.print_text();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let json = r#"[
            { "command": "select", "unit": 1 },
            { "command": "rotate", "unit": 14, "angle": 150, "keep": { "col": 6, "row": 3 } },
            { "command": "recover", "unit": 2, "dice": [3, 4] },
            { "command": "change-orders", "leader": 3, "order": "retreat" },
            { "command": "end-turn" }
        ]"#;
        let script: Vec<ScriptCommand> = serde_json::from_str(json).unwrap();
        assert_eq!(script.len(), 5);
        assert_eq!(script[0], ScriptCommand::Select { unit: UnitId(1) });
        assert_eq!(
            script[1],
            ScriptCommand::Rotate {
                unit: UnitId(14),
                angle: 150,
                keep: Some(HexRef::new(6, 3))
            }
        );
        assert_eq!(
            script[2],
            ScriptCommand::Recover {
                unit: UnitId(2),
                dice: Some([3, 4])
            }
        );
        assert_eq!(script[4], ScriptCommand::EndTurn);
        assert_eq!(script[3].name(), "change-orders");
    }

    #[test]
    fn test_scripted_dice_are_validated() {
        let mut rng = create_rng(Some(1));
        assert_eq!(dice_roll(Some([2, 6]), &mut rng).unwrap().sum(), 8);
        assert!(dice_roll(Some([0, 6]), &mut rng).is_err());
        let rolled = dice_roll(None, &mut rng).unwrap();
        assert!((2..=12).contains(&rolled.sum()));
    }

    #[test]
    fn test_refused_commands_do_not_abort() {
        let mut game = hexfield_core::Scenario::skirmish().build().unwrap();
        let mut rng = create_rng(Some(7));
        // Red's unit cannot be selected on blue's turn
        let (accepted, _) =
            execute_command(&mut game, &ScriptCommand::Select { unit: UnitId(11) }, &mut rng).unwrap();
        assert!(!accepted);

        let (accepted, _) = execute_command(&mut game, &ScriptCommand::Undo, &mut rng).unwrap();
        assert!(!accepted);
    }

    #[test]
    fn test_misuse_aborts() {
        let mut game = hexfield_core::Scenario::skirmish().build().unwrap();
        let mut rng = create_rng(Some(7));
        assert!(execute_command(&mut game, &ScriptCommand::Finish { unit: UnitId(1) }, &mut rng).is_err());
        assert!(execute_command(&mut game, &ScriptCommand::Select { unit: UnitId(99) }, &mut rng).is_err());
        assert!(execute_command(
            &mut game,
            &ScriptCommand::Recover {
                unit: UnitId(2),
                dice: Some([1, 1])
            },
            &mut rng
        )
        .is_err());
    }

    #[test]
    fn test_off_map_unit_aborts() {
        let mut game = hexfield_core::Scenario::skirmish().build().unwrap();
        let mut rng = create_rng(Some(7));
        game.remove_unit(UnitId(1)).unwrap();

        let commands = [
            ScriptCommand::Move {
                unit: UnitId(1),
                direction: 0,
            },
            ScriptCommand::Rotate {
                unit: UnitId(1),
                angle: 60,
                keep: None,
            },
            ScriptCommand::Shock {
                unit: UnitId(1),
                target: UnitId(11),
                dice: Some([1, 1]),
            },
            ScriptCommand::Fire {
                unit: UnitId(1),
                target: UnitId(11),
                dice: Some([1, 1]),
            },
        ];
        for command in &commands {
            let error = execute_command(&mut game, command, &mut rng).unwrap_err();
            assert!(error.to_string().contains("not on the map"));
        }
    }

    #[test]
    fn test_spent_unit_is_refused() {
        let mut game = hexfield_core::Scenario::skirmish().build().unwrap();
        let mut rng = create_rng(Some(7));
        let script = [
            ScriptCommand::Select { unit: UnitId(1) },
            ScriptCommand::Move {
                unit: UnitId(1),
                direction: 0,
            },
            ScriptCommand::Select { unit: UnitId(2) },
            ScriptCommand::Select { unit: UnitId(1) },
            ScriptCommand::Move {
                unit: UnitId(1),
                direction: 0,
            },
            ScriptCommand::Start {
                unit: UnitId(1),
                kind: "move".to_string(),
            },
        ];
        let steps = execute_script(&mut game, &script, &mut rng).unwrap();
        let accepted: Vec<bool> = steps.iter().map(|s| s.accepted).collect();
        assert_eq!(accepted, vec![true, true, true, false, false, false]);
    }

    #[test]
    fn test_move_then_undo() {
        let mut game = hexfield_core::Scenario::skirmish().build().unwrap();
        let mut rng = create_rng(Some(7));
        let before = game.state().clone();
        let script = [
            ScriptCommand::Select { unit: UnitId(1) },
            ScriptCommand::Move {
                unit: UnitId(1),
                direction: 0,
            },
        ];
        let steps = execute_script(&mut game, &script, &mut rng).unwrap();
        assert!(steps.iter().all(|s| s.accepted));
        assert_ne!(game.state(), &before);
        assert!(steps[0].events.is_empty());
        assert_eq!(steps[1].events.len(), 1);
        assert_eq!(steps[1].events[0].status, ActionStatus::Started);
        assert!(game.take_events().is_empty());

        while game.undo() {}
        assert_eq!(game.state(), &before);
    }
}
