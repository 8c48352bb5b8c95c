//! Competitor pool generation.
//!
//! The pool has a fixed shape (one competitor per catalogue name) and random
//! content: the name order, the appearance assignment and every performance
//! value are drawn from the injected random source.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Valid performance values. Higher is faster.
pub const PERFORMANCE_RANGE: RangeInclusive<u32> = 1..=100;

/// Names handed out to the pool. Pool size equals the catalogue size.
pub const NAME_CATALOGUE: [&str; 20] = [
    "Thunder Road",
    "Silver Arrow",
    "Midnight Dancer",
    "Golden Spur",
    "Storm Chaser",
    "Lucky Clover",
    "Iron Duke",
    "Velvet Comet",
    "Desert Wind",
    "Scarlet Flame",
    "Northern Star",
    "Blue Thistle",
    "Copper Kettle",
    "Wild Orchid",
    "Royal Ransom",
    "Quiet Riot",
    "Paper Tiger",
    "Shadowfax",
    "Morning Glory",
    "Last Crusade",
];

/// Decorative silks palette. Shorter than the name catalogue, so
/// appearances wrap and repeat within a pool.
pub const APPEARANCE_CATALOGUE: [Appearance; 10] = [
    Appearance::new("Crimson", "#DC143C"),
    Appearance::new("Royal Blue", "#4169E1"),
    Appearance::new("Forest Green", "#228B22"),
    Appearance::new("Goldenrod", "#DAA520"),
    Appearance::new("Dark Orange", "#FF8C00"),
    Appearance::new("Slate Gray", "#708090"),
    Appearance::new("Orchid", "#DA70D6"),
    Appearance::new("Teal", "#008080"),
    Appearance::new("Saddle Brown", "#8B4513"),
    Appearance::new("Black", "#000000"),
];

/// Colour pair worn by a competitor. Purely decorative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Appearance {
    /// Human readable colour name
    pub name: &'static str,

    /// CSS-style hex code
    pub hex: &'static str,
}

impl Appearance {
    /// Creates an appearance entry.
    pub const fn new(name: &'static str, hex: &'static str) -> Self {
        Self { name, hex }
    }
}

/// A single entrant of the pool.
///
/// Never mutated after creation. Rosters, progression lanes and standings
/// all hold `Arc<Competitor>` handles to the same instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Competitor {
    /// Unique within a pool, 1..=N
    pub id: u32,

    /// Unique within a pool
    pub name: String,

    /// Speed rating in [1, 100]
    pub performance: u32,

    /// Silks colour
    pub appearance: Appearance,
}

impl Competitor {
    /// Creates a competitor.
    pub fn new(id: u32, name: impl Into<String>, performance: u32, appearance: Appearance) -> Self {
        Self {
            id,
            name: name.into(),
            performance,
            appearance,
        }
    }
}

impl std::fmt::Display for Competitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.id, self.name)
    }
}

/// Generates the competitor pool.
///
/// Names and appearances are shuffled independently; ids follow the
/// shuffled name order starting at 1.
pub fn generate_pool<R: Rng + ?Sized>(rng: &mut R) -> Vec<Arc<Competitor>> {
    let mut names = NAME_CATALOGUE;
    let mut appearances = APPEARANCE_CATALOGUE;
    names.shuffle(rng);
    appearances.shuffle(rng);

    names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            Arc::new(Competitor::new(
                position as u32 + 1,
                *name,
                rng.gen_range(PERFORMANCE_RANGE),
                appearances[position % appearances.len()],
            ))
        })
        .collect()
}
