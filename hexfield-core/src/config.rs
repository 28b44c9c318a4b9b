//! Rules configuration
//!
//! Everything the arbitrator reads as data rather than code. A scenario may
//! override any part of it.

use crate::dice::{CombatTable, RecoveryTable};
use serde::{Deserialize, Serialize};

/// Tables and costs for one ruleset profile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Recovery check thresholds
    pub recovery: RecoveryTable,
    /// Attack thresholds and bonuses
    pub combat: CombatTable,
    /// Flat cost of a facing change
    pub rotation_cost: f32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            recovery: RecoveryTable::default(),
            combat: CombatTable::default(),
            rotation_cost: 0.5,
        }
    }
}

impl RulesConfig {
    /// Replace the recovery table
    pub fn with_recovery(mut self, recovery: RecoveryTable) -> Self {
        self.recovery = recovery;
        self
    }

    /// Replace the combat table
    pub fn with_combat(mut self, combat: CombatTable) -> Self {
        self.combat = combat;
        self
    }

    pub fn with_rotation_cost(mut self, cost: f32) -> Self {
        self.rotation_cost = cost;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::Recovery;

    #[test]
    fn test_partial_override_from_json() {
        let json = r#"{ "recovery": { "rest": 9 }, "rotation_cost": 1.0 }"#;
        let rules: RulesConfig = serde_json::from_str(json).unwrap();
        assert_eq!(rules.recovery.rest, 9);
        assert_eq!(rules.recovery.rally, 8);
        assert_eq!(rules.combat, CombatTable::default());
        assert_eq!(rules.rotation_cost, 1.0);
    }

    #[test]
    fn test_builders() {
        let rules = RulesConfig::default()
            .with_recovery(RecoveryTable::default().with_threshold(Recovery::Rally, 6))
            .with_rotation_cost(0.0);
        assert_eq!(rules.recovery.rally, 6);
        assert_eq!(rules.rotation_cost, 0.0);
    }
}
