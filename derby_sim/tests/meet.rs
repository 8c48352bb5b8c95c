//! Full meets driven end to end through the simulation context.

use derby_core::{Commit, RaceSession, RaceSignal, SessionConfig, SessionStatus};
use derby_env::DerbyContext;
use derby_sim::scenarios::ScenarioId;
use derby_sim::{ScenarioRunner, SimContext};
use proptest::prelude::*;
use std::time::Duration;

fn ids(session: &RaceSession<SimContext>) -> Vec<Vec<u32>> {
    session
        .results()
        .iter()
        .map(|r| r.standing.iter().map(|c| c.id).collect())
        .collect()
}

async fn run_meet(seed: u64) -> RaceSession<SimContext> {
    let mut session = RaceSession::with_board(SimContext::shared(seed), SessionConfig::default()).unwrap();
    session.generate_program().unwrap();
    session.start().unwrap();
    assert_eq!(session.run().await, SessionStatus::Complete);
    session
}

#[test]
fn all_scenarios_pass_across_seeds() {
    for seed in [1, 42, 1234, 987_654_321] {
        let runner = ScenarioRunner::new(seed);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} (seed={}) failed: {:?}",
                scenario, seed, result.failure_reason
            );
        }
    }
}

#[tokio::test]
async fn run_completes_instantly_on_virtual_clock() {
    let session = run_meet(42).await;

    assert_eq!(session.results().len(), 6);
    let elapsed = session.context.now();
    assert!(elapsed >= Duration::from_secs(6 * 3));
    assert!(elapsed <= Duration::from_secs(6 * 21));
}

#[tokio::test]
async fn same_seed_replays_the_meet() {
    let a = run_meet(2024).await;
    let b = run_meet(2024).await;

    assert_eq!(ids(&a), ids(&b));
    assert_eq!(a.context.now(), b.context.now());
    assert_eq!(a.id, b.id);
}

#[tokio::test]
async fn different_seeds_draw_different_programs() {
    let a = run_meet(1).await;
    let b = run_meet(2).await;

    let pool = |s: &RaceSession<SimContext>| -> Vec<u32> { s.pool().iter().map(|c| c.performance).collect() };
    assert_ne!(pool(&a), pool(&b));
}

#[tokio::test]
async fn board_sees_every_round_in_order() {
    let session = run_meet(77).await;
    let board = session.sink();

    let laps: Vec<u32> = board
        .log
        .iter()
        .filter_map(|c| match c {
            Commit::CurrentLap(lap) => Some(lap.round),
            _ => None,
        })
        .collect();
    assert_eq!(laps, vec![1, 2, 3, 4, 5, 6]);

    let rounds: Vec<u32> = board.results.iter().map(|r| r.round).collect();
    assert_eq!(rounds, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(board.lap_label().as_deref(), Some("6th Lap - 2200m"));
    assert_eq!(board.total_rounds, 6);
}

#[tokio::test]
async fn signals_reach_a_listener_task() {
    let context = SimContext::shared(9);
    let mut session = RaceSession::with_board(context, SessionConfig::default()).unwrap();
    let mut signals = session.subscribe();

    let listener = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(signal) = signals.recv().await {
            seen.push(signal);
        }
        seen
    });

    session.generate_program().unwrap();
    session.start().unwrap();
    session.run().await;
    drop(session);

    let seen = listener.await.unwrap();
    assert_eq!(seen.len(), 12);
    assert!(matches!(seen.first(), Some(RaceSignal::RoundCompleted { round: 1, .. })));
    assert_eq!(seen.get(1), Some(&RaceSignal::RoundStarted { round: 2 }));
    assert_eq!(seen.last(), Some(&RaceSignal::MeetCompleted { rounds: 6 }));
}

#[tokio::test]
async fn paused_meet_resumes_to_completion() {
    let context = SimContext::shared(5);
    let mut session = RaceSession::with_board(context.clone(), SessionConfig::default()).unwrap();
    session.generate_program().unwrap();
    session.start().unwrap();

    context.advance_time(Duration::from_secs(1));
    session.tick();
    assert_eq!(session.toggle().unwrap(), SessionStatus::Paused { round: 1 });
    assert_eq!(session.run().await, SessionStatus::Paused { round: 1 });

    context.advance_time(Duration::from_secs(300));
    assert_eq!(session.toggle().unwrap(), SessionStatus::Running { round: 1 });
    assert_eq!(session.run().await, SessionStatus::Complete);
    assert_eq!(session.results().len(), 6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_any_seed_any_card_completes(
        seed in any::<u64>(),
        rounds in 0usize..=6,
        roster_size in 0usize..=20,
    ) {
        let config = SessionConfig { round_count: rounds, roster_size, ..Default::default() };
        let result = ScenarioRunner::new(seed).with_config(config).run(ScenarioId::FullMeet);

        prop_assert!(result.passed, "failed: {:?}", result.failure_reason);
        prop_assert_eq!(result.rounds_completed, rounds);
    }
}
