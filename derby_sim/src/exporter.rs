//! JSON exporter for simulation runs.
//!
//! Exports sampled race frames and final standings so a run can be replayed
//! or charted offline.

use derby_core::{Lane, RoundResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Track header of the loaded round, e.g. `2nd Lap - 1400m`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lap: Option<String>,

    /// Per-competitor progress, in lane order
    pub lanes: Vec<LaneFrame>,

    /// Signals observed since the previous frame
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// Progress of one competitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneFrame {
    pub id: u32,
    pub name: String,
    pub progress: f64,
    pub estimate_secs: f64,
}

impl From<&Lane> for LaneFrame {
    fn from(lane: &Lane) -> Self {
        Self {
            id: lane.competitor.id,
            name: lane.competitor.name.clone(),
            progress: lane.progress,
            estimate_secs: lane.estimate_secs,
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    /// Creates an info-level event.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    /// Creates a warn-level event.
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Finish order of one round, by competitor id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingExport {
    pub round: u32,
    pub order: Vec<u32>,
}

impl From<&RoundResult> for StandingExport {
    fn from(result: &RoundResult) -> Self {
        Self {
            round: result.round,
            order: result.standing.iter().map(|c| c.id).collect(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Standings of every completed round
    pub standings: Vec<StandingExport>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            standings: Vec::new(),
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, results: &[RoundResult]) {
        self.passed = passed;
        self.standings = results.iter().map(StandingExport::from).collect();
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
