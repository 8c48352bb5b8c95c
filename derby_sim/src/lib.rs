//! Derby Deterministic Simulation Harness
//!
//! This crate runs race meets on a virtual clock, so that a whole meet with
//! all its random draws is reproducible from a single 64-bit seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: the virtual clock advances only when the harness steps it
//! - **Randomness**: pool, schedule and finish estimates each draw from a
//!   stream derived from the seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock + Seeded Streams)          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                          │                                  │
//! │                  ┌───────▼────────┐                         │
//! │                  │  RaceSession   │──► RaceBoard (commits)  │
//! │                  └───────┬────────┘                         │
//! │                          │ signals                          │
//! │                  ┌───────▼────────┐                         │
//! │                  │ Invariant checks│──► SimExport (frames)  │
//! │                  └────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use derby_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::FullMeet);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::ScenarioError;
pub use exporter::{LaneFrame, SimEvent, SimExport, SimFrame, StandingExport};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
