//! Error types for the Derby environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A signal was published while nobody was subscribed
    #[error("No listeners for signal: {0}")]
    NoListeners(String),
}

impl EnvError {
    /// Creates a no-listeners error.
    pub fn no_listeners(signal: impl std::fmt::Display) -> Self {
        Self::NoListeners(signal.to_string())
    }
}
