//! Race Session - Orchestrates the race engines with the environment context.
//!
//! This module is the integration layer between the pure engines (pool,
//! schedule, progression, results) and the environment abstraction
//! (`DerbyContext`).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RaceSession                          │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Context: DerbyContext                    │   │
//! │  │  • now() → round start / elapsed time                │   │
//! │  │  • sleep() → tick cadence                            │   │
//! │  │  • derive_rng() → pool / schedule / race streams     │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                               │
//! │  ┌─────────┐ ┌──────────┐ ┌─────────────┐ ┌─────────────┐   │
//! │  │  POOL   │ │ SCHEDULE │ │ PROGRESSION │ │   RESULTS   │   │
//! │  └─────────┘ └──────────┘ └─────────────┘ └─────────────┘   │
//! │        │ commits                       │ signals             │
//! │   StateSink                        SignalBus                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use derby_core::{RaceSession, SessionConfig};
//! use derby_env::TokioContext;
//!
//! let mut session = RaceSession::with_board(TokioContext::shared(), SessionConfig::default())?;
//! session.generate_program()?;
//! session.start()?;
//! session.run().await;
//! ```

use crate::board::{Commit, RaceBoard, StateSink};
use crate::competitor::{generate_pool, Competitor};
use crate::error::DerbyError;
use crate::progression::{Lane, Phase, RaceProgression, TickOutcome};
use crate::results::{ResultsAggregator, RoundResult};
use crate::schedule::{
    generate_schedule, validate_program, LapDescriptor, Round, DEFAULT_ROSTER_SIZE,
    DEFAULT_ROUND_COUNT, DISTANCE_TABLE,
};

use derby_env::{DerbyContext, SessionId, SignalBus, SignalReceiver};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const POOL_STREAM: u64 = 1;
const SCHEDULE_STREAM: u64 = 2;
const RACE_STREAM: u64 = 3;

/// Configuration for a race session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Rounds per meet (default: 6, at most the distance table length)
    pub round_count: usize,

    /// Competitors per round (default: 10)
    pub roster_size: usize,

    /// Live loop cadence in milliseconds (default: 16)
    pub tick_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            round_count: DEFAULT_ROUND_COUNT,
            roster_size: DEFAULT_ROSTER_SIZE,
            tick_interval_ms: 16,
        }
    }
}

impl SessionConfig {
    /// Checks everything that can be checked without a pool.
    ///
    /// Roster size against pool size is checked when the schedule is built.
    pub fn validate(&self) -> Result<(), DerbyError> {
        if self.round_count > DISTANCE_TABLE.len() {
            return Err(DerbyError::DistanceTableExceeded {
                requested: self.round_count,
                available: DISTANCE_TABLE.len(),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(DerbyError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, DerbyError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DerbyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Live loop cadence.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Cross-component notifications published on the session's signal bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RaceSignal {
    /// Auto-advance loaded the next round
    RoundStarted { round: u32 },

    /// A round finished and its result was recorded
    RoundCompleted { round: u32, winner: Option<u32> },

    /// The last scheduled round finished
    MeetCompleted { rounds: usize },
}

/// Coarse session state, derived from the program and the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    /// No program yet
    NotGenerated,

    /// Program generated, nothing started
    Ready,

    /// A round is running
    Running { round: u32 },

    /// A round is paused
    Paused { round: u32 },

    /// The current round was stopped; `start` runs it again from scratch
    Stopped { round: u32 },

    /// Every scheduled round has a result
    Complete,
}

/// A race meet: pool, schedule, the running round and its results.
///
/// Generic over the context and the state sink, so the same session drives
/// a real-time loop or a virtual clock, and commits to any store.
pub struct RaceSession<Ctx, S = RaceBoard>
where
    Ctx: DerbyContext,
    S: StateSink,
{
    /// Session identifier
    pub id: SessionId,

    /// Environment context
    pub context: Arc<Ctx>,

    /// Configuration
    pub config: SessionConfig,

    /// Where state commits go
    sink: S,

    /// Round started / completed notifications
    signals: SignalBus<RaceSignal>,

    pool: Vec<Arc<Competitor>>,

    /// `None` until a program is generated or loaded
    schedule: Option<Vec<Round>>,

    /// Index of the current round in the schedule
    cursor: Option<usize>,

    progression: RaceProgression,

    results: ResultsAggregator,

    complete: bool,

    pool_rng: ChaCha8Rng,
    schedule_rng: ChaCha8Rng,
    race_rng: ChaCha8Rng,
}

impl<Ctx> RaceSession<Ctx, RaceBoard>
where
    Ctx: DerbyContext,
{
    /// Creates a session committing to an in-memory `RaceBoard`.
    pub fn with_board(context: Arc<Ctx>, config: SessionConfig) -> Result<Self, DerbyError> {
        Self::new(context, config, RaceBoard::new())
    }
}

impl<Ctx, S> RaceSession<Ctx, S>
where
    Ctx: DerbyContext,
    S: StateSink,
{
    /// Creates a new session.
    ///
    /// Fails if the configuration can never produce a schedule.
    pub fn new(context: Arc<Ctx>, config: SessionConfig, sink: S) -> Result<Self, DerbyError> {
        config.validate()?;

        let id = match context.seed() {
            0 => SessionId::new(),
            seed => SessionId::from_seed(seed),
        };

        Ok(Self {
            id,
            pool_rng: context.derive_rng(POOL_STREAM),
            schedule_rng: context.derive_rng(SCHEDULE_STREAM),
            race_rng: context.derive_rng(RACE_STREAM),
            context,
            config,
            sink,
            signals: SignalBus::default(),
            pool: Vec::new(),
            schedule: None,
            cursor: None,
            progression: RaceProgression::new(),
            results: ResultsAggregator::new(),
            complete: false,
        })
    }

    /// Generates the pool and the schedule.
    ///
    /// Returns `Ok(false)` without touching anything if a program already
    /// exists. On error no program is installed.
    pub fn generate_program(&mut self) -> Result<bool, DerbyError> {
        if self.schedule.is_some() {
            debug!(session = %self.id, "Program already generated");
            return Ok(false);
        }

        let pool = generate_pool(&mut self.pool_rng);
        let schedule = generate_schedule(
            &pool,
            self.config.round_count,
            self.config.roster_size,
            &mut self.schedule_rng,
        )?;

        info!(
            session = %self.id,
            competitors = pool.len(),
            rounds = schedule.len(),
            "Program generated"
        );
        self.install(pool, schedule);
        Ok(true)
    }

    /// Replaces the program with an externally built one.
    ///
    /// Resets the session first, so results of the old program are dropped.
    /// A program that fails validation leaves the session as it was.
    pub fn load_program(
        &mut self,
        pool: Vec<Arc<Competitor>>,
        schedule: Vec<Round>,
    ) -> Result<(), DerbyError> {
        validate_program(&pool, &schedule)?;
        self.reset();
        self.install(pool, schedule);
        Ok(())
    }

    fn install(&mut self, pool: Vec<Arc<Competitor>>, schedule: Vec<Round>) {
        self.sink.commit(Commit::TotalRounds(schedule.len() as u32));
        self.pool = pool;
        self.schedule = Some(schedule);
        self.cursor = None;
        self.complete = false;
    }

    /// Starts the current round (round 1 on a fresh program).
    ///
    /// No-op if a round is already loaded or the meet is complete.
    pub fn start(&mut self) -> Result<SessionStatus, DerbyError> {
        let empty = match &self.schedule {
            None => return Err(DerbyError::NoProgram),
            Some(schedule) => schedule.is_empty(),
        };
        if self.complete || self.progression.phase() != Phase::Idle {
            return Ok(self.status());
        }
        if empty {
            self.complete = true;
            self.publish(RaceSignal::MeetCompleted { rounds: 0 });
            return Ok(self.status());
        }

        let index = self.cursor.unwrap_or(0);
        self.cursor = Some(index);
        let outcome = self.begin_round(index);
        Ok(self.settle(outcome))
    }

    /// Play/pause control: start if nothing is loaded, otherwise flip
    /// between running and paused.
    pub fn toggle(&mut self) -> Result<SessionStatus, DerbyError> {
        match self.progression.phase() {
            Phase::Running => Ok(self.pause()),
            Phase::Paused => Ok(self.resume()),
            Phase::Idle | Phase::Finished => self.start(),
        }
    }

    /// Freezes the running round.
    pub fn pause(&mut self) -> SessionStatus {
        if self.progression.pause(self.context.now()) {
            info!(session = %self.id, "Race paused");
            self.sink.commit(Commit::RaceInProgress(false));
        }
        self.status()
    }

    /// Continues a paused round where it left off.
    pub fn resume(&mut self) -> SessionStatus {
        if self.progression.resume(self.context.now()) {
            info!(session = %self.id, "Race resumed");
            self.sink.commit(Commit::RaceInProgress(true));
        }
        self.status()
    }

    /// Cancels the current round without recording a result.
    pub fn stop(&mut self) -> SessionStatus {
        if self.progression.phase() != Phase::Idle {
            self.progression.stop();
            info!(session = %self.id, "Race stopped");
            self.sink.commit(Commit::RaceInProgress(false));
        }
        self.status()
    }

    /// Drops the program, the results and any running round.
    pub fn reset(&mut self) {
        self.progression.stop();
        self.pool.clear();
        self.schedule = None;
        self.cursor = None;
        self.results.clear();
        self.complete = false;
        self.sink.commit(Commit::Reset);
        debug!(session = %self.id, "Session reset");
    }

    /// Samples progress at the context's current time.
    ///
    /// Finishing a round records its result and, if rounds remain, starts
    /// the next one before returning.
    pub fn tick(&mut self) -> SessionStatus {
        let outcome = self.progression.tick(self.context.now());
        self.settle(outcome)
    }

    /// Drives the session until it stops running.
    ///
    /// Returns when the meet completes, or when the current round is paused
    /// or stopped.
    pub async fn run(&mut self) -> SessionStatus {
        let interval = self.config.tick_interval();
        while self.progression.is_running() {
            self.context.sleep(interval).await;
            self.tick();
        }
        self.status()
    }

    fn settle(&mut self, mut outcome: TickOutcome) -> SessionStatus {
        while let TickOutcome::Completed(result) = outcome {
            outcome = self.finish_round(result);
        }
        self.status()
    }

    fn finish_round(&mut self, result: RoundResult) -> TickOutcome {
        let round = result.round;
        let winner = result.winner().map(|c| c.id);
        info!(session = %self.id, round, winner = ?winner, "Round finished");

        self.sink.commit(Commit::RaceFinished(true));
        self.sink.commit(Commit::RaceInProgress(false));
        self.sink.commit(Commit::RoundResult(result.clone()));
        self.results.record(result);
        self.publish(RaceSignal::RoundCompleted { round, winner });

        let total = self.total_rounds();
        let next = self.cursor.map_or(0, |i| i + 1);
        if (round as usize) < total && next < total {
            self.cursor = Some(next);
            let outcome = self.begin_round(next);
            if let Some(lap) = self.progression.lap() {
                debug!(session = %self.id, round = lap.round, "Auto-advanced");
                self.publish(RaceSignal::RoundStarted { round: lap.round });
            }
            outcome
        } else {
            self.complete = true;
            info!(session = %self.id, rounds = self.results.len(), "Meet complete");
            self.publish(RaceSignal::MeetCompleted {
                rounds: self.results.len(),
            });
            TickOutcome::Finished
        }
    }

    fn begin_round(&mut self, index: usize) -> TickOutcome {
        let Some(round) = self.schedule.as_ref().and_then(|s| s.get(index)).cloned() else {
            return TickOutcome::Idle;
        };

        self.sink.commit(Commit::RaceInProgress(true));
        self.sink.commit(Commit::CurrentLap(round.lap()));
        self.sink.commit(Commit::RacingCompetitors(round.roster.clone()));
        self.sink.commit(Commit::RaceFinished(false));
        info!(session = %self.id, lap = %round.lap(), entrants = round.len(), "Round started");

        self.progression
            .start(&round, self.context.now(), &mut self.race_rng)
    }

    fn publish(&self, signal: RaceSignal) {
        // Nobody listening is normal for headless runs
        if let Err(e) = self.signals.publish(signal) {
            debug!(session = %self.id, error = %e, "Signal not delivered");
        }
    }

    /// Registers a listener for race signals.
    pub fn subscribe(&self) -> SignalReceiver<RaceSignal> {
        self.signals.subscribe()
    }

    /// Coarse session state.
    pub fn status(&self) -> SessionStatus {
        let Some(schedule) = &self.schedule else {
            return SessionStatus::NotGenerated;
        };
        if self.complete {
            return SessionStatus::Complete;
        }
        let round = self.progression.lap().map(|lap| lap.round).unwrap_or_default();
        match self.progression.phase() {
            Phase::Running => SessionStatus::Running { round },
            Phase::Paused => SessionStatus::Paused { round },
            Phase::Finished => SessionStatus::Complete,
            Phase::Idle => match self.cursor.and_then(|i| schedule.get(i)) {
                Some(current) => SessionStatus::Stopped {
                    round: current.sequence,
                },
                None => SessionStatus::Ready,
            },
        }
    }

    /// Returns true while a round is running.
    pub fn is_running(&self) -> bool {
        self.progression.is_running()
    }

    /// Returns true once every scheduled round has a result.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The competitor pool.
    pub fn pool(&self) -> &[Arc<Competitor>] {
        &self.pool
    }

    /// The schedule (empty until generated).
    pub fn schedule(&self) -> &[Round] {
        self.schedule.as_deref().unwrap_or_default()
    }

    /// Number of scheduled rounds.
    pub fn total_rounds(&self) -> usize {
        self.schedule().len()
    }

    /// The round currently loaded, if any.
    pub fn current_round(&self) -> Option<&Round> {
        self.cursor.and_then(|i| self.schedule().get(i))
    }

    /// Lap of the loaded round.
    pub fn current_lap(&self) -> Option<LapDescriptor> {
        self.progression.lap()
    }

    /// Per-competitor progress of the loaded round.
    pub fn progress(&self) -> &[Lane] {
        self.progression.lanes()
    }

    /// Recorded results, oldest first.
    pub fn results(&self) -> &[RoundResult] {
        self.results.list_results()
    }

    /// The state sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
