//! State sink: where the engine publishes race state for presentation layers.
//!
//! The engine never reads back from the sink. It commits small, ordered
//! mutations; a sink may mirror them into a store, forward them to a UI or
//! simply record them.

use crate::competitor::Competitor;
use crate::results::RoundResult;
use crate::schedule::LapDescriptor;
use serde::Serialize;
use std::sync::Arc;

/// A single state mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Commit {
    /// Number of rounds in the generated program
    TotalRounds(u32),

    /// Round now on the track
    CurrentLap(LapDescriptor),

    /// Roster of the round now on the track
    RacingCompetitors(Vec<Arc<Competitor>>),

    /// Whether time is flowing
    RaceInProgress(bool),

    /// Raised around a result commit, lowered when the next round loads
    RaceFinished(bool),

    /// A completed round
    RoundResult(RoundResult),

    /// Everything returns to the initial state
    Reset,
}

/// Receiver of engine state commits.
pub trait StateSink: Send {
    /// Applies one mutation.
    fn commit(&mut self, commit: Commit);
}

/// In-memory race store.
///
/// Mirrors every commit into plain fields and keeps the ordered commit log,
/// which is what the harness and tests inspect.
#[derive(Debug, Clone, Default)]
pub struct RaceBoard {
    pub total_rounds: u32,
    pub current_lap: Option<LapDescriptor>,
    pub racing: Vec<Arc<Competitor>>,
    pub is_race_in_progress: bool,
    pub is_race_finished: bool,
    pub results: Vec<RoundResult>,

    /// Every commit received, oldest first
    pub log: Vec<Commit>,
}

impl RaceBoard {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lap header for the track, e.g. `1st Lap - 1200m`.
    pub fn lap_label(&self) -> Option<String> {
        self.current_lap.map(|lap| lap.to_string())
    }
}

impl StateSink for RaceBoard {
    fn commit(&mut self, commit: Commit) {
        match &commit {
            Commit::TotalRounds(n) => self.total_rounds = *n,
            Commit::CurrentLap(lap) => self.current_lap = Some(*lap),
            Commit::RacingCompetitors(roster) => self.racing = roster.clone(),
            Commit::RaceInProgress(flag) => self.is_race_in_progress = *flag,
            Commit::RaceFinished(flag) => self.is_race_finished = *flag,
            Commit::RoundResult(result) => self.results.push(result.clone()),
            Commit::Reset => {
                *self = Self {
                    log: std::mem::take(&mut self.log),
                    ..Self::default()
                };
            }
        }
        self.log.push(commit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commits_update_fields() {
        let mut board = RaceBoard::new();
        board.commit(Commit::TotalRounds(6));
        board.commit(Commit::CurrentLap(LapDescriptor { round: 1, distance: 1200 }));
        board.commit(Commit::RaceInProgress(true));

        assert_eq!(board.total_rounds, 6);
        assert!(board.is_race_in_progress);
        assert_eq!(board.lap_label().as_deref(), Some("1st Lap - 1200m"));
        assert_eq!(board.log.len(), 3);
    }

    #[test]
    fn test_reset_clears_state_but_keeps_log() {
        let mut board = RaceBoard::new();
        board.commit(Commit::RaceFinished(true));
        board.commit(Commit::RoundResult(RoundResult::new(1, Vec::new())));
        board.commit(Commit::Reset);

        assert!(!board.is_race_finished);
        assert!(board.results.is_empty());
        assert_eq!(board.current_lap, None);
        assert_eq!(board.log.last(), Some(&Commit::Reset));
        assert_eq!(board.log.len(), 3);
    }
}
