//! Scenario failures.

use derby_core::{DerbyError, SessionStatus};
use thiserror::Error;

/// Why a scenario failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    /// A session call the scenario relies on was rejected
    #[error("{step} failed: {source}")]
    Engine {
        step: &'static str,
        #[source]
        source: DerbyError,
    },

    /// The session reached a state it must never be in
    #[error("{0}")]
    Invariant(String),

    /// A control call left the session in the wrong state
    #[error("{action} left session {status:?}")]
    UnexpectedStatus {
        action: &'static str,
        status: SessionStatus,
    },

    /// The virtual duration ran out
    #[error("meet not complete after {ticks} ticks")]
    Timeout { ticks: u64 },
}

impl ScenarioError {
    pub fn engine(step: &'static str) -> impl FnOnce(DerbyError) -> Self {
        move |source| ScenarioError::Engine { step, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ScenarioError::engine("start")(DerbyError::NoProgram);
        assert_eq!(err.to_string(), "start failed: No race program has been generated");
        assert!(std::error::Error::source(&err).is_some());

        let err = ScenarioError::UnexpectedStatus {
            action: "pause",
            status: SessionStatus::Complete,
        };
        assert_eq!(err.to_string(), "pause left session Complete");

        assert_eq!(
            ScenarioError::Timeout { ticks: 120 }.to_string(),
            "meet not complete after 120 ticks"
        );
    }
}
