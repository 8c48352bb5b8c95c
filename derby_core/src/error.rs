//! Error types for the race engine.

use thiserror::Error;

/// Errors surfaced by program generation and session control.
///
/// Nothing is retried. Configuration problems are reported before any
/// round starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerbyError {
    /// More rounds were requested than the distance table covers
    #[error("Configuration error: {requested} rounds requested, distance table covers {available}")]
    DistanceTableExceeded { requested: usize, available: usize },

    /// Roster size is larger than the competitor pool
    #[error("Insufficient competitors: roster needs {required}, pool has {available}")]
    InsufficientCompetitors { required: usize, available: usize },

    /// Session configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A race was started before any program was generated or loaded
    #[error("No race program has been generated")]
    NoProgram,
}

impl DerbyError {
    /// Returns true for errors caused by bad round/roster configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DerbyError::DistanceTableExceeded { .. }
                | DerbyError::InsufficientCompetitors { .. }
                | DerbyError::InvalidConfig(_)
        )
    }
}
