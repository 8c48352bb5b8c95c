//! Derby Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Derby race
//! engine to run against both a **real** clock (tokio) and a **virtual**
//! clock (simulation harness, tests).
//!
//! # Core Concept
//!
//! The engine never reads the wall clock or OS entropy directly. Everything
//! that would make a run non-reproducible is routed through the context:
//! - Time (`now()`, `sleep()`)
//! - Randomness (`derive_rng()`)
//!
//! Cross-component notifications (round started, round completed) travel over
//! an explicit [`SignalBus`] instead of a global event bus.
//!
//! # Example
//!
//! ```ignore
//! use derby_env::DerbyContext;
//!
//! async fn drive<Ctx: DerbyContext>(ctx: &Ctx, session: &mut Session) {
//!     while session.is_running() {
//!         ctx.sleep(Duration::from_millis(16)).await;
//!         session.tick();
//!     }
//! }
//! ```

mod context;
mod error;
mod signal;
mod tokio_impl;
mod types;

pub use context::DerbyContext;
pub use error::EnvError;
pub use signal::{SignalBus, SignalReceiver};
pub use tokio_impl::TokioContext;
pub use types::SessionId;
