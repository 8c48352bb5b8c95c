//! Derby Core - Multi-Round Race Engine
//!
//! This library runs a meet of timed horse races:
//! 1. **Pool**: a fixed catalogue of twenty competitors with random performance
//! 2. **Schedule**: up to six rounds of rising distance, each with its own roster
//! 3. **Progression**: a clock-driven controller that fixes finish estimates at
//!    start and derives progress from elapsed time
//! 4. **Results**: the standing of every completed round, in order
//!
//! [`RaceSession`] ties the engines together and commits state to a
//! [`StateSink`] for presentation layers.

pub mod board;
pub mod competitor;
pub mod error;
pub mod progression;
pub mod results;
pub mod schedule;
pub mod session;

// Re-export key types for convenience
pub use board::{Commit, RaceBoard, StateSink};
pub use competitor::{generate_pool, Appearance, Competitor};
pub use error::DerbyError;
pub use progression::{Lane, Phase, RaceProgression, TickOutcome};
pub use results::{ResultsAggregator, RoundResult};
pub use schedule::{generate_schedule, validate_program, LapDescriptor, Round, DISTANCE_TABLE};
pub use session::{RaceSession, RaceSignal, SessionConfig, SessionStatus};
