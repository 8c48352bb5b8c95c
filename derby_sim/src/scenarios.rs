//! Race meet scenarios for the simulation harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: Full meet under the configured card
    FullMeet,

    /// SIM-002: Long pause in every round
    PauseResume,

    /// SIM-003: Rounds cancelled mid-race and rerun
    EarlyStop,

    /// SIM-004: Three rounds of five
    ShortCard,

    // ═══════════════════════════════════════════════════
    // EDGE CASES
    // ═══════════════════════════════════════════════════
    /// SIM-005: Empty rosters and an empty program
    EmptyField,

    /// SIM-006: Cards the pool cannot fill
    ThinField,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FullMeet,
            ScenarioId::PauseResume,
            ScenarioId::EarlyStop,
            ScenarioId::ShortCard,
            // Edge cases
            ScenarioId::EmptyField,
            ScenarioId::ThinField,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FullMeet => "full_meet",
            ScenarioId::PauseResume => "pause_resume",
            ScenarioId::EarlyStop => "early_stop",
            ScenarioId::ShortCard => "short_card",
            ScenarioId::EmptyField => "empty_field",
            ScenarioId::ThinField => "thin_field",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FullMeet => "Every round to the line, auto-advancing, standings checked",
            ScenarioId::PauseResume => "30s pause in every round, progress frozen then continuous",
            ScenarioId::EarlyStop => "Stop mid-race twice, no result recorded, rerun from zero",
            ScenarioId::ShortCard => "3 rounds x 5 entrants, distances follow the table",
            ScenarioId::EmptyField => "Zero-entrant rounds and an empty program complete at once",
            ScenarioId::ThinField => "Oversized roster and too many rounds are rejected up front",
        }
    }

    /// Returns true if this scenario exercises an edge case.
    pub fn is_edge_case(&self) -> bool {
        matches!(self, ScenarioId::EmptyField | ScenarioId::ThinField)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full_meet" | "fullmeet" | "sim-001" => Ok(ScenarioId::FullMeet),
            "pause_resume" | "pauseresume" | "sim-002" => Ok(ScenarioId::PauseResume),
            "early_stop" | "earlystop" | "sim-003" => Ok(ScenarioId::EarlyStop),
            "short_card" | "shortcard" | "sim-004" => Ok(ScenarioId::ShortCard),
            "empty_field" | "emptyfield" | "sim-005" => Ok(ScenarioId::EmptyField),
            "thin_field" | "thinfield" | "sim-006" => Ok(ScenarioId::ThinField),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
            assert_eq!(id.to_string(), id.name());
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("SIM-003".parse::<ScenarioId>(), Ok(ScenarioId::EarlyStop));
        assert_eq!("ShortCard".parse::<ScenarioId>(), Ok(ScenarioId::ShortCard));
        assert!("photo_finish".parse::<ScenarioId>().is_err());
    }
}
