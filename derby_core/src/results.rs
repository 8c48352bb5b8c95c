//! Completed-round results.

use crate::competitor::Competitor;
use serde::Serialize;
use std::sync::Arc;

/// Final standing of one round. First entry is the winner.
///
/// The standing vector is owned by the result, detached from the roster it
/// was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundResult {
    /// Sequence number of the round
    pub round: u32,

    /// Finish order, a permutation of the round's roster
    pub standing: Vec<Arc<Competitor>>,
}

impl RoundResult {
    /// Creates a result.
    pub fn new(round: u32, standing: Vec<Arc<Competitor>>) -> Self {
        Self { round, standing }
    }

    /// Returns the winner, if anybody raced.
    pub fn winner(&self) -> Option<&Arc<Competitor>> {
        self.standing.first()
    }
}

/// Append-only list of round results in recording order.
#[derive(Debug, Clone, Default)]
pub struct ResultsAggregator {
    results: Vec<RoundResult>,
}

impl ResultsAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result.
    pub fn record(&mut self, result: RoundResult) {
        self.results.push(result);
    }

    /// All recorded results, oldest first.
    pub fn list_results(&self) -> &[RoundResult] {
        &self.results
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Drops every result (session reset).
    pub fn clear(&mut self) {
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::competitor::APPEARANCE_CATALOGUE;

    fn result(round: u32, ids: &[u32]) -> RoundResult {
        let standing = ids
            .iter()
            .map(|&id| Arc::new(Competitor::new(id, format!("H{}", id), 50, APPEARANCE_CATALOGUE[1])))
            .collect();
        RoundResult::new(round, standing)
    }

    #[test]
    fn test_record_keeps_order() {
        let mut agg = ResultsAggregator::new();
        agg.record(result(1, &[3, 1, 2]));
        agg.record(result(2, &[5, 4]));

        let rounds: Vec<u32> = agg.list_results().iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 2]);
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn test_list_results_is_idempotent() {
        let mut agg = ResultsAggregator::new();
        agg.record(result(1, &[2, 1]));

        let first = agg.list_results().to_vec();
        let second = agg.list_results().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_recorded_results_are_untouched_by_later_records() {
        let mut agg = ResultsAggregator::new();
        agg.record(result(1, &[2, 1]));
        let snapshot = agg.list_results()[0].clone();

        agg.record(result(2, &[7, 8, 9]));
        assert_eq!(agg.list_results()[0], snapshot);
    }

    #[test]
    fn test_winner() {
        assert_eq!(result(1, &[4, 2]).winner().map(|c| c.id), Some(4));
        assert!(result(1, &[]).winner().is_none());
    }

    #[test]
    fn test_clear() {
        let mut agg = ResultsAggregator::new();
        agg.record(result(1, &[1]));
        agg.clear();
        assert!(agg.is_empty());
    }
}
