//! Scenario runner - executes race meet scenarios on a virtual clock.
//!
//! Every scenario drives a `RaceSession<SimContext>` tick by tick and checks
//! the engine's guarantees after each step:
//! - progress stays in [0, 100] and never decreases within a round
//! - the loaded lap always matches the schedule
//! - each standing is a permutation of its roster, ordered by estimate
//! - results arrive in round order

use crate::context::SimContext;
use crate::error::ScenarioError::{self, Invariant};
use crate::exporter::{LaneFrame, SimEvent, SimExport, SimFrame};
use crate::scenarios::ScenarioId;

use derby_core::progression::MIN_FINISH_SECS;
use derby_core::{
    DerbyError, LapDescriptor, RaceSession, RaceSignal, SessionConfig, SessionStatus,
    DISTANCE_TABLE,
};
use derby_env::{DerbyContext, SignalReceiver};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a scenario step.
type Check = Result<(), ScenarioError>;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Rounds with a recorded result
    pub rounds_completed: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Rounds observed on the track
    pub rounds_started: u64,

    /// Signals received from the session
    pub signals_received: u64,

    /// Progress values checked
    pub progress_samples: u64,

    /// Pauses issued
    pub pauses: u64,

    /// Rounds cancelled
    pub stops: u64,

    /// Longest finish estimate seen (seconds)
    pub longest_estimate_secs: f64,
}

/// Runs race meet scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Card used by the configurable scenarios
    config: SessionConfig,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Maximum duration in seconds
    max_duration_secs: f64,

    /// Export a frame every N ticks
    frame_interval: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: SessionConfig::default(),
            tick_rate_hz: 60,
            max_duration_secs: 600.0,
            frame_interval: 10,
        }
    }

    /// Sets the session configuration.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets how often a frame is exported.
    pub fn with_frame_interval(mut self, ticks: u64) -> Self {
        self.frame_interval = ticks.max(1);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_with_export(scenario).0
    }

    /// Runs a scenario and returns the result with its recorded frames.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        if scenario.is_edge_case() {
            debug!("Edge case scenario: {}", scenario.description());
        }

        match scenario {
            ScenarioId::FullMeet => self.run_full_meet(),
            ScenarioId::PauseResume => self.run_pause_resume(),
            ScenarioId::EarlyStop => self.run_early_stop(),
            ScenarioId::ShortCard => self.run_short_card(),
            ScenarioId::EmptyField => self.run_empty_field(),
            ScenarioId::ThinField => self.run_thin_field(),
        }
    }

    /// SIM-001: FullMeet - the configured card from first gate to last result.
    ///
    /// **Assertion**: one result per round, 2 signals per round.
    fn run_full_meet(&self) -> (ScenarioResult, SimExport) {
        info!(
            "SIM-001: FullMeet - {} rounds x {} entrants",
            self.config.round_count, self.config.roster_size
        );
        let rounds = self.config.round_count;

        self.with_trial(ScenarioId::FullMeet, self.config.clone(), |trial| {
            trial.generate()?;
            trial.start()?;
            trial.drive_to_completion()?;
            trial.expect_complete(rounds)
        })
    }

    /// SIM-002: PauseResume - every round is paused for 30s of virtual time.
    ///
    /// **Assertion**: paused progress is frozen; after resume it moves by at
    /// most one tick's worth.
    fn run_pause_resume(&self) -> (ScenarioResult, SimExport) {
        info!("SIM-002: PauseResume - 30s pause in every round");
        let rounds = self.config.round_count;

        self.with_trial(ScenarioId::PauseResume, self.config.clone(), |trial| {
            trial.generate()?;
            trial.start()?;

            while !trial.session.is_complete() {
                let round = trial.current_round();
                trial.drive_for(1.0)?;

                let frozen = trial.progress_values();
                trial.pause()?;
                trial.drive_for(30.0)?;
                if trial.progress_values() != frozen {
                    return Err(Invariant(format!("round {} moved while paused", round)));
                }

                trial.resume()?;
                trial.step()?;
                let max_jump = 100.0 * trial.dt.as_secs_f64() / MIN_FINISH_SECS + 1e-6;
                if trial.current_round() == round {
                    for (now, before) in trial.progress_values().iter().zip(&frozen) {
                        if now - before > max_jump {
                            return Err(Invariant(format!(
                                "round {} jumped from {:.2} to {:.2} on resume",
                                round, before, now
                            )));
                        }
                    }
                }

                trial.drive_past_round(round)?;
            }

            trial.expect_complete(rounds)
        })
    }

    /// SIM-003: EarlyStop - cancel round 1 and, if scheduled, round 2.
    ///
    /// **Assertion**: a stopped round records nothing and reruns from zero.
    fn run_early_stop(&self) -> (ScenarioResult, SimExport) {
        info!("SIM-003: EarlyStop - stop and rerun");
        let rounds = self.config.round_count;

        self.with_trial(ScenarioId::EarlyStop, self.config.clone(), |trial| {
            trial.generate()?;
            trial.start()?;

            let mut cancelled = 0;
            while !trial.session.is_complete() {
                let round = trial.current_round();
                if cancelled < 2 && round as usize == cancelled + 1 {
                    trial.drive_for(1.5)?;
                    trial.stop_and_rerun(round)?;
                    cancelled += 1;
                }
                trial.drive_past_round(round)?;
            }

            trial.expect_complete(rounds)
        })
    }

    /// SIM-004: ShortCard - three rounds of five entrants.
    ///
    /// **Assertion**: distances follow the table, rosters have five entrants.
    fn run_short_card(&self) -> (ScenarioResult, SimExport) {
        info!("SIM-004: ShortCard - 3 rounds x 5 entrants");
        let config = SessionConfig {
            round_count: 3,
            roster_size: 5,
            ..self.config.clone()
        };

        self.with_trial(ScenarioId::ShortCard, config, |trial| {
            trial.generate()?;

            for (k, round) in trial.session.schedule().iter().enumerate() {
                if round.distance != DISTANCE_TABLE[k] || round.len() != 5 {
                    return Err(Invariant(format!(
                        "round {} is {}m with {} entrants",
                        round.sequence,
                        round.distance,
                        round.len()
                    )));
                }
            }

            trial.start()?;
            trial.drive_to_completion()?;
            trial.expect_complete(3)
        })
    }

    /// SIM-005: EmptyField - nobody to race.
    ///
    /// **Assertion**: zero-entrant rounds complete on start with empty
    /// standings; an empty program completes with no results.
    fn run_empty_field(&self) -> (ScenarioResult, SimExport) {
        info!("SIM-005: EmptyField - zero entrants, empty program");
        let config = SessionConfig {
            roster_size: 0,
            ..self.config.clone()
        };
        let rounds = config.round_count;

        self.with_trial(ScenarioId::EmptyField, config, |trial| {
            trial.generate()?;
            trial.start()?;
            trial.expect_complete(rounds)?;
            if trial.ticks != 0 {
                return Err(Invariant(format!("empty rounds needed {} ticks", trial.ticks)));
            }
            if let Some(result) = trial.session.results().iter().find(|r| !r.standing.is_empty()) {
                return Err(Invariant(format!("round {} has a standing", result.round)));
            }

            trial
                .session
                .load_program(Vec::new(), Vec::new())
                .map_err(ScenarioError::engine("loading an empty program"))?;
            match trial.session.start() {
                Ok(SessionStatus::Complete) if trial.session.results().is_empty() => Ok(()),
                other => Err(Invariant(format!("empty program ended as {:?}", other))),
            }
        })
    }

    /// SIM-006: ThinField - cards that can never be filled.
    ///
    /// **Assertion**: configuration errors surface before anything starts.
    fn run_thin_field(&self) -> (ScenarioResult, SimExport) {
        info!("SIM-006: ThinField - oversized roster, too many rounds");
        let scenario = ScenarioId::ThinField;
        let mut export = SimExport::new(scenario.name(), self.seed);

        let outcome = self.check_thin_field();
        let passed = outcome.is_ok();
        export.finalize(passed, &[]);

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: 0,
            final_time_secs: 0.0,
            rounds_completed: 0,
            failure_reason: outcome.err().map(|e| e.to_string()),
            metrics: ScenarioMetrics::default(),
        };
        (result, export)
    }

    fn check_thin_field(&self) -> Check {
        let context = SimContext::shared(self.seed);

        let oversized = SessionConfig {
            roster_size: 25,
            ..self.config.clone()
        };
        let mut session = RaceSession::with_board(context.clone(), oversized)
            .map_err(ScenarioError::engine("oversized roster setup"))?;
        match session.generate_program() {
            Err(DerbyError::InsufficientCompetitors { required: 25, .. }) => {}
            other => return Err(Invariant(format!("oversized roster gave {:?}", other))),
        }
        if session.status() != SessionStatus::NotGenerated {
            return Err(Invariant("failed generation left a program behind".into()));
        }
        if session.start() != Err(DerbyError::NoProgram) {
            return Err(Invariant("start without a program did not fail".into()));
        }

        let too_long = SessionConfig {
            round_count: DISTANCE_TABLE.len() + 1,
            ..self.config.clone()
        };
        match RaceSession::with_board(context, too_long) {
            Err(DerbyError::DistanceTableExceeded { .. }) => Ok(()),
            Err(e) => Err(Invariant(format!("too many rounds gave {}", e))),
            Ok(_) => Err(Invariant("too many rounds accepted".into())),
        }
    }

    /// Builds a trial, runs `body` against it and collects the result.
    fn with_trial<F>(&self, scenario: ScenarioId, config: SessionConfig, body: F) -> (ScenarioResult, SimExport)
    where
        F: FnOnce(&mut Trial) -> Check,
    {
        let mut trial = match Trial::new(self, scenario, config) {
            Ok(trial) => trial,
            Err(e) => {
                warn!("{} could not start: {}", scenario.name(), e);
                let mut export = SimExport::new(scenario.name(), self.seed);
                export.finalize(false, &[]);
                let result = ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    total_ticks: 0,
                    final_time_secs: 0.0,
                    rounds_completed: 0,
                    failure_reason: Some(e.to_string()),
                    metrics: ScenarioMetrics::default(),
                };
                return (result, export);
            }
        };

        let outcome = body(&mut trial);
        trial.conclude(scenario, self.seed, outcome)
    }
}

/// One session under test plus everything observed about it.
struct Trial {
    context: Arc<SimContext>,
    session: RaceSession<SimContext>,
    signals: SignalReceiver<RaceSignal>,
    dt: Duration,
    max_ticks: u64,
    ticks: u64,
    frame_interval: u64,
    metrics: ScenarioMetrics,

    /// Lap and progress seen after the previous step
    last_lap: Option<LapDescriptor>,
    last_progress: Vec<f64>,

    /// Signals not yet attached to a frame
    pending_events: Vec<SimEvent>,
    export: SimExport,
}

impl Trial {
    fn new(runner: &ScenarioRunner, scenario: ScenarioId, config: SessionConfig) -> Result<Self, DerbyError> {
        let context = SimContext::shared(runner.seed);
        let session = RaceSession::with_board(context.clone(), config)?;
        let signals = session.subscribe();

        Ok(Self {
            context,
            session,
            signals,
            dt: Duration::from_secs_f64(1.0 / runner.tick_rate_hz as f64),
            max_ticks: (runner.max_duration_secs * runner.tick_rate_hz as f64) as u64,
            ticks: 0,
            frame_interval: runner.frame_interval,
            metrics: ScenarioMetrics::default(),
            last_lap: None,
            last_progress: Vec::new(),
            pending_events: Vec::new(),
            export: SimExport::new(scenario.name(), runner.seed),
        })
    }

    fn generate(&mut self) -> Check {
        self.session
            .generate_program()
            .map(|_| ())
            .map_err(ScenarioError::engine("program generation"))
    }

    fn start(&mut self) -> Check {
        self.session
            .start()
            .map_err(ScenarioError::engine("start"))?;
        self.observe(None, &HashMap::new(), 0)
    }

    fn pause(&mut self) -> Check {
        self.metrics.pauses += 1;
        match self.session.pause() {
            SessionStatus::Paused { .. } => Ok(()),
            status => Err(ScenarioError::UnexpectedStatus { action: "pause", status }),
        }
    }

    fn resume(&mut self) -> Check {
        match self.session.resume() {
            SessionStatus::Running { .. } => Ok(()),
            status => Err(ScenarioError::UnexpectedStatus { action: "resume", status }),
        }
    }

    /// Stops the running round, checks nothing was recorded, starts it again.
    fn stop_and_rerun(&mut self, round: u32) -> Check {
        self.metrics.stops += 1;
        let recorded = self.session.results().len();

        if self.session.stop() != (SessionStatus::Stopped { round }) {
            return Err(Invariant(format!("stop in round {} did not hold the round", round)));
        }
        self.last_lap = None;
        self.last_progress.clear();

        self.drive_for(25.0)?;
        if self.session.results().len() != recorded || !self.session.progress().is_empty() {
            return Err(Invariant(format!("stopped round {} kept racing", round)));
        }

        self.start()?;
        if self.current_round() != round {
            return Err(Invariant(format!(
                "rerun loaded round {} instead of {}",
                self.current_round(),
                round
            )));
        }
        if self.progress_values().iter().any(|&p| p != 0.0) {
            return Err(Invariant(format!("rerun of round {} did not start from zero", round)));
        }
        Ok(())
    }

    /// Advances one tick and checks everything that changed.
    fn step(&mut self) -> Check {
        let lap = self.session.current_lap();
        let estimates: HashMap<u32, f64> = self
            .session
            .progress()
            .iter()
            .map(|lane| (lane.competitor.id, lane.estimate_secs))
            .collect();
        let recorded = self.session.results().len();

        self.context.advance_time(self.dt);
        self.session.tick();
        self.ticks += 1;

        self.observe(lap.map(|l| l.round), &estimates, recorded)
    }

    fn drive_for(&mut self, secs: f64) -> Check {
        let steps = (secs / self.dt.as_secs_f64()).ceil() as u64;
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    fn drive_past_round(&mut self, round: u32) -> Check {
        while !self.session.is_complete() && self.current_round() == round {
            self.guard()?;
            self.step()?;
        }
        Ok(())
    }

    fn drive_to_completion(&mut self) -> Check {
        while !self.session.is_complete() {
            self.guard()?;
            self.step()?;
        }
        Ok(())
    }

    fn guard(&self) -> Check {
        if self.ticks >= self.max_ticks {
            return Err(ScenarioError::Timeout { ticks: self.ticks });
        }
        Ok(())
    }

    fn current_round(&self) -> u32 {
        self.session.current_lap().map(|lap| lap.round).unwrap_or_default()
    }

    fn progress_values(&self) -> Vec<f64> {
        self.session.progress().iter().map(|lane| lane.progress).collect()
    }

    /// Checks the session after a transition.
    ///
    /// `round` and `estimates` describe the round loaded before it.
    fn observe(&mut self, round: Option<u32>, estimates: &HashMap<u32, f64>, recorded: usize) -> Check {
        self.drain_signals();
        self.check_new_results(round, estimates, recorded)?;

        let lap = self.session.current_lap();
        if let Some(lap) = lap {
            let scheduled = (lap.round as usize)
                .checked_sub(1)
                .and_then(|index| self.session.schedule().get(index))
                .map(|r| r.lap());
            if scheduled != Some(lap) || self.session.sink().current_lap != Some(lap) {
                return Err(Invariant(format!("lap {} does not match the schedule", lap)));
            }
        }

        let progress = self.progress_values();
        if lap != self.last_lap {
            self.metrics.rounds_started += 1;
            self.last_progress = vec![0.0; progress.len()];
            for lane in self.session.progress() {
                self.metrics.longest_estimate_secs =
                    self.metrics.longest_estimate_secs.max(lane.estimate_secs);
            }
        }
        for (i, (&now, &before)) in progress.iter().zip(&self.last_progress).enumerate() {
            self.metrics.progress_samples += 1;
            if !(0.0..=100.0).contains(&now) {
                return Err(Invariant(format!("lane {} progress {} out of range", i, now)));
            }
            if now < before {
                return Err(Invariant(format!(
                    "lane {} went back from {:.3} to {:.3}",
                    i, before, now
                )));
            }
        }
        self.last_lap = lap;
        self.last_progress = progress;

        if self.ticks % self.frame_interval == 0 || !self.pending_events.is_empty() {
            self.record_frame();
        }
        Ok(())
    }

    fn check_new_results(&self, round: Option<u32>, estimates: &HashMap<u32, f64>, recorded: usize) -> Check {
        let results = self.session.results();
        for (index, result) in results.iter().enumerate().skip(recorded) {
            if result.round as usize != index + 1 {
                return Err(Invariant(format!(
                    "result {} recorded for round {}",
                    index + 1,
                    result.round
                )));
            }

            let Some(scheduled) = self.session.schedule().get(index) else {
                return Err(Invariant(format!("result for unscheduled round {}", result.round)));
            };
            let entered: HashSet<u32> = scheduled.roster.iter().map(|c| c.id).collect();
            let placed: HashSet<u32> = result.standing.iter().map(|c| c.id).collect();
            if result.standing.len() != scheduled.len() || entered != placed {
                return Err(Invariant(format!("round {} standing is not its roster", result.round)));
            }

            if Some(result.round) == round {
                let ordered = result.standing.windows(2).all(|pair| {
                    let a = estimates.get(&pair[0].id).copied().unwrap_or(f64::MAX);
                    let b = estimates.get(&pair[1].id).copied().unwrap_or(f64::MAX);
                    a <= b
                });
                if !ordered {
                    return Err(Invariant(format!(
                        "round {} standing ignores estimates",
                        result.round
                    )));
                }
            }

            if let Some(winner) = result.winner() {
                debug!("  round {} won by {}", result.round, winner);
            }
        }
        Ok(())
    }

    fn drain_signals(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            self.metrics.signals_received += 1;
            debug!("  t={:.2}s | {:?}", self.context.now().as_secs_f64(), signal);
            self.pending_events.push(SimEvent::info(format!("{:?}", signal)));
        }
    }

    fn record_frame(&mut self) {
        let frame = SimFrame {
            time_sec: self.context.now().as_secs_f64(),
            lap: self.session.current_lap().map(|lap| lap.to_string()),
            lanes: self.session.progress().iter().map(LaneFrame::from).collect(),
            events: std::mem::take(&mut self.pending_events),
        };
        self.export.add_frame(frame);
    }

    fn expect_complete(&mut self, rounds: usize) -> Check {
        if self.session.status() != SessionStatus::Complete {
            return Err(Invariant(format!("meet ended as {:?}", self.session.status())));
        }
        if self.session.results().len() != rounds {
            return Err(Invariant(format!(
                "{} results for {} rounds",
                self.session.results().len(),
                rounds
            )));
        }

        // RoundCompleted for each round, RoundStarted for each but the first,
        // one MeetCompleted
        self.drain_signals();
        let expected = if rounds == 0 { 1 } else { 2 * rounds as u64 };
        if self.metrics.signals_received != expected {
            return Err(Invariant(format!(
                "{} signals for {} rounds",
                self.metrics.signals_received, rounds
            )));
        }
        Ok(())
    }

    fn conclude(mut self, scenario: ScenarioId, seed: u64, outcome: Check) -> (ScenarioResult, SimExport) {
        if let Err(e) = &outcome {
            let at = self.context.now().as_secs_f64();
            warn!("{} failed at t={:.2}s: {}", scenario.name(), at, e);
            self.pending_events.push(SimEvent::warn(e.to_string()));
        }
        self.record_frame();
        let passed = outcome.is_ok();
        self.export.finalize(passed, self.session.results());

        info!(
            "  ticks={} | rounds={} | signals={} | t={:.1}s",
            self.ticks,
            self.session.results().len(),
            self.metrics.signals_received,
            self.context.now().as_secs_f64()
        );

        let result = ScenarioResult {
            scenario,
            seed,
            passed,
            total_ticks: self.ticks,
            final_time_secs: self.context.now().as_secs_f64(),
            rounds_completed: self.session.results().len(),
            failure_reason: outcome.err().map(|e| e.to_string()),
            metrics: self.metrics,
        };
        (result, self.export)
    }
}
