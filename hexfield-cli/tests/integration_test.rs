//! Integration tests for the HEXFIELD rules engine
//!
//! Tests the full stack: scenario setup, the arbitrator, the action state
//! machine, undo/redo and the command-line binary

use hexfield_core::{
    ActionStatus, Cohesion, DiceRoll, Game, Geometry, HexRef, Map, MoveTier, Munitions, Player,
    PlayerId, Position, Scenario, Tiredness, Unit, UnitCategory, UnitId, UnitProfile, Wing, WingId,
};
use std::process::Command;

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Two players, one wing each, nothing on the board
fn empty_game() -> Game {
    let mut game = Game::new(
        Map::new(Geometry::regular(100.0, 10, 12)),
        vec![Player::new(PlayerId(0), "blue"), Player::new(PlayerId(1), "red")],
    );
    game.add_wing(Wing::new(WingId(0), PlayerId(0)).with_leader(UnitId(9)));
    game.add_wing(Wing::new(WingId(1), PlayerId(1)));
    game
}

fn deploy(game: &mut Game, unit: Unit, hex: HexRef, angle: u16) -> UnitId {
    let id = unit.id();
    game.add_unit(unit);
    game.place_unit(id, Position::Hex(hex), angle).unwrap();
    id
}

fn troop(id: u32, player: u8, profile: UnitProfile) -> Unit {
    Unit::new(UnitId(id), PlayerId(player), WingId(player), UnitCategory::Troop, profile)
}

fn spearmen(id: u32, player: u8) -> Unit {
    troop(id, player, UnitProfile::troop("spearmen"))
}

fn unit(game: &Game, id: UnitId) -> &Unit {
    game.unit(id).unwrap()
}

fn hexfield(args: &[&str]) -> serde_json::Value {
    let output = Command::new(env!("CARGO_BIN_EXE_hexfield"))
        .args(args)
        .output()
        .expect("failed to launch hexfield");
    assert!(
        output.status.success(),
        "hexfield {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("hexfield did not print JSON")
}

// ============================================================================
// MOVEMENT
// ============================================================================

#[test]
fn test_move_budget_tiers() {
    let mut game = empty_game();
    let id = deploy(&mut game, spearmen(1, 0), HexRef::new(5, 9), 0);
    deploy(&mut game, spearmen(11, 1), HexRef::new(0, 0), 180);

    let mut tiers = Vec::new();
    loop {
        let moves = game.allowed_moves(id).unwrap();
        let Some(step) = moves.into_iter().find(|m| m.direction == 0) else {
            break;
        };
        tiers.push(step.tier);
        game.move_unit(id, &step).unwrap();
    }

    assert_eq!(
        tiers,
        vec![
            MoveTier::Normal,
            MoveTier::Normal,
            MoveTier::Extended,
            MoveTier::Extended,
            MoveTier::Extended,
        ]
    );
    assert_eq!(unit(&game, id).position(), Some(Position::Hex(HexRef::new(5, 4))));
    assert_eq!(unit(&game, id).action().unwrap().status(), ActionStatus::Started);
    assert!(game.allowed_rotations(id).unwrap().is_empty());
}

#[test]
fn test_minimal_advance_ends_the_action() {
    let mut game = empty_game();
    let slow = troop(1, 0, UnitProfile::troop("levy").with_movement(0.5, 0.5));
    let id = deploy(&mut game, slow, HexRef::new(5, 9), 0);

    let moves = game.allowed_moves(id).unwrap();
    assert_eq!(moves.len(), 3);
    assert!(moves.iter().all(|m| m.tier == MoveTier::Minimal));

    game.move_unit(id, &moves[0]).unwrap();
    assert_eq!(unit(&game, id).action().unwrap().status(), ActionStatus::Finished);
    assert!(game.allowed_moves(id).unwrap().is_empty());

    let events = game.take_events();
    assert_eq!(events.last().unwrap().status, ActionStatus::Finished);
    assert!(game.end_turn());
}

// ============================================================================
// ENGAGEMENT
// ============================================================================

#[test]
fn test_engagement_is_directional() {
    let mut game = empty_game();
    let a = deploy(&mut game, spearmen(1, 0), HexRef::new(4, 4), 0);
    // b stands in front of a but faces away from it
    let b = deploy(&mut game, spearmen(2, 1), HexRef::new(4, 3), 0);

    let arbitrator = game.arbitrator();
    assert!(!arbitrator.is_unit_engaged(game.state(), unit(&game, a), false));
    assert!(arbitrator.is_unit_engaged(game.state(), unit(&game, b), false));

    let allowed_a = game.allowed_actions(a).unwrap();
    assert!(allowed_a.move_forward.is_some());
    assert!(allowed_a.shock_attack);

    let allowed_b = game.allowed_actions(b).unwrap();
    assert!(allowed_b.move_forward.is_none());
    assert!(allowed_b.escape);
    assert!(allowed_b.confront);
}

#[test]
fn test_routed_unit_only_escapes_until_ordered() {
    let mut game = empty_game();
    let general = Unit::new(
        UnitId(9),
        PlayerId(0),
        WingId(0),
        UnitCategory::Character,
        UnitProfile::character("general").as_commander(),
    );
    deploy(&mut game, general, HexRef::new(1, 1), 0);
    let id = deploy(&mut game, spearmen(1, 0).with_cohesion(Cohesion::Routed), HexRef::new(4, 4), 0);

    assert_eq!(game.allowed_actions(id).unwrap().allowed_names(), vec!["escape"]);

    assert!(game.give_order(UnitId(9), id).unwrap());
    assert_eq!(
        game.allowed_actions(id).unwrap().allowed_names(),
        vec!["escape", "rally"]
    );
}

// ============================================================================
// UNDO / REDO
// ============================================================================

#[test]
fn test_undo_restores_exact_state() {
    let mut game = Scenario::skirmish().build().unwrap();
    let initial = game.state().clone();

    assert!(game.select_unit(UnitId(1)).unwrap());
    let selected = game.state().clone();

    let step = game.allowed_moves(UnitId(1)).unwrap()[0];
    game.move_unit(UnitId(1), &step).unwrap();
    let moved = game.state().clone();

    let turn = game.allowed_rotations(UnitId(1)).unwrap()[0];
    game.rotate_unit(UnitId(1), &turn).unwrap();
    assert_ne!(game.state(), &moved);

    assert!(game.undo());
    assert_eq!(game.state(), &moved);
    assert!(game.undo());
    assert_eq!(game.state(), &selected);
    assert!(game.undo());
    assert_eq!(game.state(), &initial);
    assert!(!game.undo());

    assert!(game.redo());
    assert_eq!(game.state(), &selected);
    assert!(game.redo());
    assert_eq!(game.state(), &moved);

    // A fresh intent forks history
    game.set_focused_unit(None);
    assert!(!game.can_redo());
}

#[test]
fn test_completed_turn_is_permanent() {
    let mut game = Scenario::skirmish().build().unwrap();
    let step = game.allowed_moves(UnitId(1)).unwrap()[0];
    game.move_unit(UnitId(1), &step).unwrap();
    assert!(game.end_turn());

    assert!(!game.can_undo());
    assert_eq!(game.current_player().name, "red");
    assert_eq!(
        unit(&game, UnitId(1)).action().unwrap().status(),
        ActionStatus::Finalized
    );
}

// ============================================================================
// RECOVERY AND COMBAT
// ============================================================================

#[test]
fn test_turn_waits_for_recovery_roll() {
    let mut game = empty_game();
    let id = deploy(
        &mut game,
        spearmen(1, 0).with_tiredness(Tiredness::Exhausted),
        HexRef::new(4, 4),
        0,
    );
    assert!(game.allowed_actions(id).unwrap().rest);

    game.start_action(id, "rest").unwrap();
    game.mark_as_started(id).unwrap();
    assert!(!game.turn_is_finishable());
    assert!(!game.end_turn());

    let outcome = game.resolve_recovery(id, DiceRoll::new(5, 5)).unwrap();
    assert!(outcome.success);
    assert!(outcome.minor_resting_capacity);
    assert_eq!(unit(&game, id).tiredness(), Tiredness::Fresh);
    assert!(game.end_turn());
}

#[test]
fn test_failed_rest_changes_nothing() {
    let mut game = empty_game();
    let id = deploy(
        &mut game,
        spearmen(1, 0).with_tiredness(Tiredness::Exhausted),
        HexRef::new(4, 4),
        0,
    );
    game.start_action(id, "rest").unwrap();

    let outcome = game.resolve_recovery(id, DiceRoll::new(6, 5)).unwrap();
    assert!(!outcome.success);
    assert_eq!(unit(&game, id).tiredness(), Tiredness::Exhausted);
    assert_eq!(unit(&game, id).action().unwrap().status(), ActionStatus::Finished);
}

#[test]
fn test_fire_on_the_flank() {
    let mut game = empty_game();
    let archers = troop(1, 0, UnitProfile::troop("archers").with_fire_range(3));
    let archers = deploy(&mut game, archers, HexRef::new(4, 6), 0);
    let target = deploy(&mut game, spearmen(2, 1), HexRef::new(4, 4), 180);

    assert_eq!(
        game.arbitrator().fire_targets(game.state(), unit(&game, archers)),
        vec![target]
    );

    let outcome = game.resolve_fire_attack(archers, target, DiceRoll::new(3, 3)).unwrap();
    assert!(outcome.flank);
    assert_eq!(outcome.threshold, 9);
    assert!(outcome.success);
    assert!(outcome.munitions_depleted);
    assert_eq!(unit(&game, archers).munitions(), Munitions::Scarce);
    assert_eq!(unit(&game, target).cohesion(), Cohesion::Disrupted);
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_scenario_from_json_plays_both_sides() {
    let json = r#"{
        "name": "crossing",
        "geometry": { "hex_width": 100.0, "hex_height": 86.6, "margin_x": 0.0,
                      "margin_y": 0.0, "col_count": 8, "row_count": 8 },
        "terrain": [{ "hex": { "col": 3, "row": 3 }, "terrain": "impassable" }],
        "players": [{ "id": 0, "name": "north" }, { "id": 1, "name": "south" }],
        "wings": [{ "id": 0, "player": 0 }, { "id": 1, "player": 1 }],
        "profiles": [{ "name": "pike", "movement_points": 1.0, "extended_movement_points": 2.0,
                       "max_steps": 4 }, { "name": "levy" }],
        "units": [
            { "id": 1, "player": 0, "wing": 0, "category": "formation", "profile": "pike",
              "side": [{ "col": 2, "row": 2 }, { "col": 2, "row": 1 }], "angle": 90 },
            { "id": 2, "player": 1, "wing": 1, "category": "troop", "profile": "levy",
              "hex": { "col": 5, "row": 6 }, "angle": 0 }
        ]
    }"#;
    let mut game = Scenario::from_json(json).unwrap().build().unwrap();
    assert_eq!(game.current_player().name, "north");
    assert!(unit(&game, UnitId(1)).is_formation());
    assert_eq!(unit(&game, UnitId(1)).hexes().len(), 2);
    assert!(!game.allowed_moves(UnitId(1)).unwrap().is_empty());

    assert!(game.end_turn());
    assert_eq!(game.current_player().name, "south");
    assert!(game.select_unit(UnitId(2)).unwrap());
    assert!(game.end_turn());
    assert_eq!(game.state().turn(), 2);
}

// ============================================================================
// COMMAND LINE
// ============================================================================

#[test]
fn test_cli_roll() {
    let report = hexfield(&["roll", "--kind", "rest", "--dice", "5", "5", "--json"]);
    assert_eq!(report["success"], true);
    assert_eq!(report["minor_resting_capacity"], true);
    assert_eq!(report["threshold"], 10);
}

#[test]
fn test_cli_inspect_default_skirmish() {
    let report = hexfield(&["inspect", "--json"]);
    assert_eq!(report["state"]["current_player"], "blue");
    let options = report["options"].as_array().unwrap();
    assert_eq!(options.len(), 3);
    assert!(options
        .iter()
        .all(|o| o["allowed"].as_array().unwrap().iter().any(|a| a == "miscellaneous")));
}

#[test]
fn test_cli_run_script() {
    let script = r#"[
        { "command": "select", "unit": 1 },
        { "command": "move", "unit": 1, "direction": 0 },
        { "command": "select", "unit": 11 },
        { "command": "end-turn" }
    ]"#;
    let path = std::env::temp_dir().join(format!("hexfield-script-{}.json", std::process::id()));
    std::fs::write(&path, script).unwrap();

    let report = hexfield(&["run", "--script", path.to_str().unwrap(), "--seed", "3", "--json"]);
    std::fs::remove_file(&path).ok();

    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[1]["accepted"], true);
    // Red's spearmen cannot be selected on blue's turn
    assert_eq!(steps[2]["accepted"], false);
    assert_eq!(report["final_state"]["current_player"], "red");
}

#[test]
fn test_cli_runs_bundled_scenario() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../scenarios");
    let scenario = format!("{dir}/ford.json");
    let script = format!("{dir}/ford-opening.json");

    let game = Scenario::load(std::path::Path::new(&scenario)).unwrap().build().unwrap();
    assert_eq!(game.state().units().len(), 9);
    assert_eq!(game.state().wing_tiredness(WingId(1)), Tiredness::Tired);

    let report = hexfield(&["run", "--scenario", &scenario, "--script", &script, "--seed", "42", "--json"]);
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 14);
    // Both turn ends go through
    assert_eq!(steps[8]["accepted"], true);
    assert_eq!(steps[13]["accepted"], true);
    assert_eq!(report["final_state"]["turn"], 2);
    assert_eq!(report["final_state"]["weather"], "rain");
}
