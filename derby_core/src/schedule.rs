//! Round schedule generation.
//!
//! A schedule is an ordered list of rounds. Round `k` always runs over
//! `DISTANCE_TABLE[k - 1]` metres; its roster is an independent draw from the
//! pool, so the same competitor may race in several rounds.

use crate::competitor::Competitor;
use crate::error::DerbyError;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Distance in metres for each round, ascending.
pub const DISTANCE_TABLE: [u32; 6] = [1200, 1400, 1600, 1800, 2000, 2200];

/// Default number of rounds in a meet.
pub const DEFAULT_ROUND_COUNT: usize = 6;

/// Default number of competitors per round.
pub const DEFAULT_ROSTER_SIZE: usize = 10;

/// One timed race instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Round {
    /// 1-based position in the schedule
    pub sequence: u32,

    /// Race length in metres
    pub distance: u32,

    /// Entrants, in lane order. No duplicates.
    pub roster: Vec<Arc<Competitor>>,
}

impl Round {
    /// Creates a round.
    pub fn new(sequence: u32, distance: u32, roster: Vec<Arc<Competitor>>) -> Self {
        Self {
            sequence,
            distance,
            roster,
        }
    }

    /// Returns the lap descriptor shown while this round runs.
    pub fn lap(&self) -> LapDescriptor {
        LapDescriptor {
            round: self.sequence,
            distance: self.distance,
        }
    }

    /// Returns the number of entrants.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// Returns true if nobody is entered.
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }
}

/// The `{round, distance}` pair committed when a round starts.
///
/// Displays as the track header, e.g. `2nd Lap - 1400m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LapDescriptor {
    pub round: u32,
    pub distance: u32,
}

impl std::fmt::Display for LapDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{} Lap - {}m",
            self.round,
            ordinal_suffix(self.round),
            self.distance
        )
    }
}

/// English ordinal suffix for a positive number.
pub fn ordinal_suffix(n: u32) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Builds the round schedule from a pool.
///
/// # Arguments
/// * `pool` - Competitors to draw from
/// * `round_count` - Number of rounds (at most `DISTANCE_TABLE.len()`)
/// * `roster_size` - Entrants per round (at most `pool.len()`)
/// * `rng` - Random source for roster draws
///
/// # Returns
/// * `Ok(vec![])` - The pool is empty
/// * `Err(DerbyError::DistanceTableExceeded)` - Too many rounds
/// * `Err(DerbyError::InsufficientCompetitors)` - Pool smaller than a roster
pub fn generate_schedule<R: Rng + ?Sized>(
    pool: &[Arc<Competitor>],
    round_count: usize,
    roster_size: usize,
    rng: &mut R,
) -> Result<Vec<Round>, DerbyError> {
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    if round_count > DISTANCE_TABLE.len() {
        return Err(DerbyError::DistanceTableExceeded {
            requested: round_count,
            available: DISTANCE_TABLE.len(),
        });
    }

    // Rejection sampling below would never terminate
    if pool.len() < roster_size {
        return Err(DerbyError::InsufficientCompetitors {
            required: roster_size,
            available: pool.len(),
        });
    }

    let schedule = DISTANCE_TABLE
        .iter()
        .take(round_count)
        .enumerate()
        .map(|(index, &distance)| {
            Round::new(index as u32 + 1, distance, sample_roster(pool, roster_size, rng))
        })
        .collect();

    Ok(schedule)
}

/// Draws `roster_size` distinct competitors by rejection sampling.
///
/// Caller guarantees `roster_size <= pool.len()`.
fn sample_roster<R: Rng + ?Sized>(
    pool: &[Arc<Competitor>],
    roster_size: usize,
    rng: &mut R,
) -> Vec<Arc<Competitor>> {
    let mut used = HashSet::with_capacity(roster_size);
    let mut roster = Vec::with_capacity(roster_size);

    while roster.len() < roster_size {
        let index = rng.gen_range(0..pool.len());
        if used.insert(index) {
            roster.push(Arc::clone(&pool[index]));
        }
    }

    roster
}

/// Checks a hand-built program before it is installed.
///
/// Rounds must be numbered 1, 2, 3... in order, and every roster must hold
/// distinct members of `pool`.
pub fn validate_program(pool: &[Arc<Competitor>], schedule: &[Round]) -> Result<(), DerbyError> {
    let known: HashSet<u32> = pool.iter().map(|c| c.id).collect();

    for (index, round) in schedule.iter().enumerate() {
        if round.sequence as usize != index + 1 {
            return Err(DerbyError::InvalidConfig(format!(
                "round at position {} is numbered {}",
                index + 1,
                round.sequence
            )));
        }

        let mut entered = HashSet::with_capacity(round.len());
        for competitor in &round.roster {
            if !entered.insert(competitor.id) {
                return Err(DerbyError::InvalidConfig(format!(
                    "round {} lists competitor {} twice",
                    round.sequence, competitor.id
                )));
            }
            if !known.contains(&competitor.id) {
                return Err(DerbyError::InvalidConfig(format!(
                    "round {} lists competitor {} who is not in the pool",
                    round.sequence, competitor.id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::competitor::{generate_pool, APPEARANCE_CATALOGUE};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pool_of(n: u32) -> Vec<Arc<Competitor>> {
        (1..=n)
            .map(|id| {
                Arc::new(Competitor::new(
                    id,
                    format!("Horse {}", id),
                    50,
                    APPEARANCE_CATALOGUE[0],
                ))
            })
            .collect()
    }

    fn assert_distinct_members(round: &Round, pool: &[Arc<Competitor>]) {
        let ids: HashSet<u32> = round.roster.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), round.roster.len());
        for c in &round.roster {
            assert!(pool.iter().any(|p| Arc::ptr_eq(p, c)));
        }
    }

    #[test]
    fn test_generated_program_validates() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let pool = generate_pool(&mut rng);
        let schedule = generate_schedule(&pool, 6, 10, &mut rng).unwrap();

        assert_eq!(validate_program(&pool, &schedule), Ok(()));
        assert_eq!(validate_program(&[], &[]), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_numbering() {
        let pool = pool_of(4);
        let zero = vec![Round::new(0, 1200, pool.clone())];
        let skipped = vec![
            Round::new(1, 1200, pool.clone()),
            Round::new(3, 1400, pool.clone()),
        ];

        for schedule in [zero, skipped] {
            match validate_program(&pool, &schedule) {
                Err(DerbyError::InvalidConfig(msg)) => assert!(msg.contains("numbered")),
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[test]
    fn test_validate_rejects_bad_rosters() {
        let pool = pool_of(4);

        let roster = vec![pool[0].clone(), pool[2].clone(), pool[0].clone()];
        let doubled = vec![Round::new(1, 1200, roster)];
        assert!(matches!(
            validate_program(&pool, &doubled),
            Err(DerbyError::InvalidConfig(msg)) if msg.contains("twice")
        ));

        let outsider = pool_of(5).pop().unwrap();
        let foreign = vec![Round::new(1, 1200, vec![pool[1].clone(), outsider])];
        assert!(matches!(
            validate_program(&pool, &foreign),
            Err(DerbyError::InvalidConfig(msg)) if msg.contains("not in the pool")
        ));
    }

    #[test]
    fn test_empty_pool_gives_empty_schedule() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let schedule = generate_schedule(&[], 6, 10, &mut rng).unwrap();
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_single_round_from_twelve() {
        let pool = pool_of(12);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let schedule = generate_schedule(&pool, 1, 10, &mut rng).unwrap();

        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].sequence, 1);
        assert_eq!(schedule[0].distance, 1200);
        assert_eq!(schedule[0].len(), 10);
        assert_distinct_members(&schedule[0], &pool);
    }

    #[test]
    fn test_default_schedule_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let pool = generate_pool(&mut rng);
        let schedule =
            generate_schedule(&pool, DEFAULT_ROUND_COUNT, DEFAULT_ROSTER_SIZE, &mut rng).unwrap();

        assert_eq!(schedule.len(), 6);
        for (k, round) in schedule.iter().enumerate() {
            assert_eq!(round.sequence, k as u32 + 1);
            assert_eq!(round.distance, DISTANCE_TABLE[k]);
            assert_eq!(round.len(), DEFAULT_ROSTER_SIZE);
            assert_distinct_members(round, &pool);
        }
    }

    #[test]
    fn test_roster_larger_than_pool_is_rejected() {
        let pool = pool_of(4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate_schedule(&pool, 6, 10, &mut rng).unwrap_err();

        assert_eq!(
            err,
            DerbyError::InsufficientCompetitors {
                required: 10,
                available: 4
            }
        );
    }

    #[test]
    fn test_too_many_rounds_is_rejected() {
        let pool = pool_of(20);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate_schedule(&pool, 7, 10, &mut rng).unwrap_err();

        assert_eq!(
            err,
            DerbyError::DistanceTableExceeded {
                requested: 7,
                available: 6
            }
        );
    }

    #[test]
    fn test_roster_equal_to_pool_takes_everyone() {
        let pool = pool_of(10);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let schedule = generate_schedule(&pool, 2, 10, &mut rng).unwrap();

        for round in &schedule {
            let mut ids: Vec<u32> = round.roster.iter().map(|c| c.id).collect();
            ids.sort_unstable();
            assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_lap_label() {
        let lap = LapDescriptor { round: 2, distance: 1500 };
        assert_eq!(lap.to_string(), "2nd Lap - 1500m");
    }

    #[test]
    fn test_ordinal_suffix() {
        assert_eq!(ordinal_suffix(1), "st");
        assert_eq!(ordinal_suffix(2), "nd");
        assert_eq!(ordinal_suffix(3), "rd");
        assert_eq!(ordinal_suffix(5), "th");
        assert_eq!(ordinal_suffix(11), "th");
        assert_eq!(ordinal_suffix(12), "th");
        assert_eq!(ordinal_suffix(22), "nd");
    }

    proptest! {
        #[test]
        fn prop_rosters_are_distinct_pool_members(
            seed in any::<u64>(),
            pool_size in 1u32..30,
            roster_size in 0usize..30,
            rounds in 0usize..=6,
        ) {
            prop_assume!(roster_size <= pool_size as usize);
            let pool = pool_of(pool_size);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let schedule = generate_schedule(&pool, rounds, roster_size, &mut rng).unwrap();

            prop_assert_eq!(schedule.len(), rounds);
            for (k, round) in schedule.iter().enumerate() {
                prop_assert_eq!(round.distance, DISTANCE_TABLE[k]);
                prop_assert_eq!(round.len(), roster_size);
                let ids: HashSet<u32> = round.roster.iter().map(|c| c.id).collect();
                prop_assert_eq!(ids.len(), roster_size);
                prop_assert!(ids.iter().all(|id| (1..=pool_size).contains(id)));
            }
        }
    }
}
