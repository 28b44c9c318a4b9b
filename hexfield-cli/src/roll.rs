//! Roll command - interpret a single recovery roll

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use hexfield_core::{DiceRoll, Recovery, RecoveryOutcome, RecoveryTable, Weather};

use crate::report::print_json;

#[derive(Args)]
pub struct RollArgs {
    /// Recovery to check
    #[arg(long, value_parser = ["rest", "reload", "reorganize", "rally"])]
    pub kind: String,

    /// The two dice, each 1 to 6
    #[arg(long, num_args = 2, value_names = ["A", "B"], value_parser = clap::value_parser!(u8).range(1..=6))]
    pub dice: Vec<u8>,

    /// Weather in effect (clear, hot, cloudy, rain, storm)
    #[arg(long, default_value = "clear")]
    pub weather: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RollReport {
    threshold: i16,
    weather: Weather,
    #[serde(flatten)]
    outcome: RecoveryOutcome,
}

pub fn run(args: RollArgs) -> Result<()> {
    let report = interpret(&args)?;
    if args.json {
        return print_json(&report);
    }

    println!(
        "{} with {} + {} = {} against {} in {:?} weather: {}",
        report.outcome.recovery.name(),
        report.outcome.roll.first,
        report.outcome.roll.second,
        report.outcome.roll.sum(),
        report.threshold,
        report.weather,
        if report.outcome.success { "success" } else { "failure" }
    );
    if report.outcome.minor_resting_capacity {
        println!("Doubles: minor resting capacity");
    }
    Ok(())
}

fn interpret(args: &RollArgs) -> Result<RollReport> {
    let recovery = Recovery::from_name(&args.kind)
        .with_context(|| format!("unknown recovery '{}'", args.kind))?;
    let weather: Weather = serde_json::from_value(serde_json::Value::String(args.weather.clone()))
        .with_context(|| format!("unknown weather '{}'", args.weather))?;
    let roll = DiceRoll::new(args.dice[0], args.dice[1]);

    let table = RecoveryTable::default();
    tracing::debug!(?recovery, ?weather, sum = roll.sum(), "interpreting roll");
    Ok(RollReport {
        threshold: table.threshold(recovery, weather),
        weather,
        outcome: table.interpret(recovery, roll, weather),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(kind: &str, dice: [u8; 2], weather: &str) -> RollArgs {
        RollArgs {
            kind: kind.to_string(),
            dice: dice.to_vec(),
            weather: weather.to_string(),
            json: true,
        }
    }

    #[test]
    fn test_rest_doubles() {
        let report = interpret(&args("rest", [5, 5], "clear")).unwrap();
        assert!(report.outcome.success);
        assert!(report.outcome.minor_resting_capacity);
        assert_eq!(report.threshold, 10);
    }

    #[test]
    fn test_storm_hampers_reload() {
        let report = interpret(&args("reload", [4, 4], "storm")).unwrap();
        assert_eq!(report.threshold, 6);
        assert!(!report.outcome.success);
    }

    #[test]
    fn test_unknown_weather() {
        assert!(interpret(&args("rally", [1, 2], "fog")).is_err());
    }
}
