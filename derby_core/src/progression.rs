//! The race progression controller.
//!
//! Drives a single round through `Idle → Running (⇄ Paused) → Finished`.
//!
//! # Timing Model
//!
//! When a round starts every competitor gets a fixed *estimated finish
//! duration*. Progress is then a pure function of elapsed time:
//!
//! ```text
//! progress_i = clamp(elapsed / estimate_i, 0, 1) * 100
//! ```
//!
//! The controller never reads a clock. The host passes `now` into every
//! transition (or calls [`RaceProgression::advance`] with a delta), so the
//! same code runs under a real-time loop, a virtual clock or a test that
//! steps time by hand.
//!
//! Because estimates are fixed at start, they fully determine the finish
//! order: the standing is the roster sorted by ascending estimate, with
//! ties kept in roster order.

use crate::competitor::Competitor;
use crate::results::RoundResult;
use crate::schedule::{LapDescriptor, Round};
use rand::Rng;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Shortest allowed finish estimate, in seconds.
pub const MIN_FINISH_SECS: f64 = 3.0;

/// Longest allowed finish estimate, in seconds.
pub const MAX_FINISH_SECS: f64 = 20.0;

/// Range of the random multiplier applied to `distance / performance`.
///
/// With distances of 1200–2200m and performance 1–100 the raw value for an
/// average field lands around 10s.
pub const FINISH_FACTOR_RANGE: RangeInclusive<f64> = 0.2..=0.4;

/// Progress value at which a lane counts as done.
pub const FINISH_LINE: f64 = 100.0;

/// Estimated finish duration in seconds, clamped to
/// `[MIN_FINISH_SECS, MAX_FINISH_SECS]`.
pub fn estimate_finish_secs(distance: u32, performance: u32, factor: f64) -> f64 {
    let raw = (distance as f64 / performance.max(1) as f64) * factor;
    raw.clamp(MIN_FINISH_SECS, MAX_FINISH_SECS)
}

/// Draws a factor from `FINISH_FACTOR_RANGE` and estimates the finish.
pub fn sample_finish_secs<R: Rng + ?Sized>(distance: u32, performance: u32, rng: &mut R) -> f64 {
    let factor = rng.gen_range(FINISH_FACTOR_RANGE);
    estimate_finish_secs(distance, performance, factor)
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No round loaded (initial, or after `stop`)
    Idle,

    /// Round loaded and time is flowing
    Running,

    /// Round loaded, elapsed time frozen
    Paused,

    /// Every lane crossed the line; result already emitted
    Finished,
}

/// One competitor's slot in the progression snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Lane {
    /// The competitor in this lane
    pub competitor: Arc<Competitor>,

    /// Fixed at round start, in seconds
    pub estimate_secs: f64,

    /// Percentage in [0, 100], never decreases while the round runs
    pub progress: f64,
}

impl Lane {
    /// Returns true once the lane reached the finish line.
    pub fn is_done(&self) -> bool {
        self.progress >= FINISH_LINE
    }

    /// Time already covered according to the current progress.
    fn covered_secs(&self) -> f64 {
        self.progress / FINISH_LINE * self.estimate_secs
    }

    fn sample(&mut self, elapsed_secs: f64) {
        let fraction = (elapsed_secs / self.estimate_secs).clamp(0.0, 1.0);
        self.progress = self.progress.max(fraction * FINISH_LINE);
    }
}

/// What a transition produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing is loaded
    Idle,

    /// Round is suspended
    Paused,

    /// Round still in progress
    Running,

    /// The round completed during this call
    Completed(RoundResult),

    /// The round completed during an earlier call
    Finished,
}

impl TickOutcome {
    /// Returns true if the round has reached the finish.
    pub fn is_complete(&self) -> bool {
        matches!(self, TickOutcome::Completed(_) | TickOutcome::Finished)
    }
}

/// State machine for a single running round.
#[derive(Debug, Clone)]
pub struct RaceProgression {
    phase: Phase,

    /// Lap of the loaded round
    lap: Option<LapDescriptor>,

    /// Progression snapshot, one lane per roster entry in roster order
    lanes: Vec<Lane>,

    /// Round start (possibly synthetic after a resume)
    started_at: Duration,

    /// Latest time the host reported
    clock: Duration,
}

impl Default for RaceProgression {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceProgression {
    /// Creates an idle controller.
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            lap: None,
            lanes: Vec::new(),
            started_at: Duration::ZERO,
            clock: Duration::ZERO,
        }
    }

    /// Loads a round and starts it at `now`.
    ///
    /// Any previous snapshot is discarded. Every lane gets a fresh finish
    /// estimate drawn from `rng`. An empty roster completes immediately with
    /// an empty standing.
    pub fn start<R: Rng + ?Sized>(&mut self, round: &Round, now: Duration, rng: &mut R) -> TickOutcome {
        self.lanes = round
            .roster
            .iter()
            .map(|competitor| Lane {
                estimate_secs: sample_finish_secs(round.distance, competitor.performance, rng),
                competitor: Arc::clone(competitor),
                progress: 0.0,
            })
            .collect();
        self.lap = Some(round.lap());
        self.started_at = now;
        self.clock = now;
        self.phase = Phase::Running;

        if self.lanes.is_empty() {
            return self.complete();
        }
        TickOutcome::Running
    }

    /// Samples progress at `now` and detects completion.
    pub fn tick(&mut self, now: Duration) -> TickOutcome {
        match self.phase {
            Phase::Idle => return TickOutcome::Idle,
            Phase::Paused => return TickOutcome::Paused,
            Phase::Finished => return TickOutcome::Finished,
            Phase::Running => {}
        }

        self.clock = self.clock.max(now);
        let elapsed = self.clock.saturating_sub(self.started_at).as_secs_f64();
        for lane in &mut self.lanes {
            lane.sample(elapsed);
        }

        if self.lanes.iter().all(Lane::is_done) {
            return self.complete();
        }
        TickOutcome::Running
    }

    /// Moves the controller's clock forward by `delta` and ticks.
    pub fn advance(&mut self, delta: Duration) -> TickOutcome {
        let now = self.clock + delta;
        if self.phase == Phase::Paused {
            // Time passes while paused; progress must not
            self.clock = now;
        }
        self.tick(now)
    }

    /// Suspends a running round. Returns false if nothing was running.
    pub fn pause(&mut self, now: Duration) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.clock = self.clock.max(now);
        self.phase = Phase::Paused;
        true
    }

    /// Continues a paused round. Returns false if nothing was paused.
    ///
    /// The start timestamp is rewritten so that the elapsed time at `now`
    /// equals the time already covered by the snapshot.
    pub fn resume(&mut self, now: Duration) -> bool {
        if self.phase != Phase::Paused {
            return false;
        }
        let covered = self
            .lanes
            .iter()
            .map(Lane::covered_secs)
            .fold(0.0_f64, f64::max);

        self.clock = self.clock.max(now);
        self.started_at = self.clock.saturating_sub(Duration::from_secs_f64(covered));
        self.phase = Phase::Running;
        true
    }

    /// Cancels the round and discards the snapshot without a result.
    pub fn stop(&mut self) {
        self.phase = Phase::Idle;
        self.lap = None;
        self.lanes.clear();
        self.started_at = Duration::ZERO;
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true while time is flowing.
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Lap of the loaded round, if any.
    pub fn lap(&self) -> Option<LapDescriptor> {
        self.lap
    }

    /// The progression snapshot.
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Start timestamp of the loaded round.
    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    /// Finish order implied by the estimates, stable on ties.
    pub fn standing(&self) -> Vec<Arc<Competitor>> {
        let mut order: Vec<&Lane> = self.lanes.iter().collect();
        order.sort_by(|a, b| a.estimate_secs.total_cmp(&b.estimate_secs));
        order.into_iter().map(|l| Arc::clone(&l.competitor)).collect()
    }

    fn complete(&mut self) -> TickOutcome {
        self.phase = Phase::Finished;
        let round = self.lap.map(|lap| lap.round).unwrap_or_default();
        TickOutcome::Completed(RoundResult::new(round, self.standing()))
    }
}
