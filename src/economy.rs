//! Economy: payout formulas for scoring events
//!
//! Everything here is a pure function of the progression state plus an
//! injected random roll, so payouts are reproducible in tests.
//!
//! # Payout chain
//!
//! gain = base × ball multiplier × max(1, population × 0.75) × (1 + income% / 100)
//!
//! Where the ball multiplier is the rarity multiplier (×1..×4), scaled by the
//! micro percentage for micro balls, or replaced outright by the master
//! multiplier for the master ball. The gain is rounded and only then doubled
//! on a critical hit.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::{BASKET_FALLBACK_VALUE, BASKET_LANE_VALUES, OFFLINE_MIN_SECS, OFFLINE_RATE};
use crate::progression::ProgressionState;
use crate::progression::upgrades::collection_bonus;

/// Ball rarity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Normal,
    Uncommon,
    Rare,
    Legendary,
}

impl Rarity {
    pub fn multiplier(&self) -> f64 {
        match self {
            Rarity::Normal => 1.0,
            Rarity::Uncommon => 2.0,
            Rarity::Rare => 3.0,
            Rarity::Legendary => 4.0,
        }
    }

    /// Roll a rarity, checking the rarest tier first.
    ///
    /// Each tier gets its own independent roll against its percentage.
    pub fn roll<R: Rng>(state: &ProgressionState, rng: &mut R) -> Self {
        let stats = &state.derived;
        if rng.random::<f64>() < stats.legendary_chance_percent / 100.0 {
            return Rarity::Legendary;
        }
        if rng.random::<f64>() < stats.rare_chance_percent / 100.0 {
            return Rarity::Rare;
        }
        if rng.random::<f64>() < stats.uncommon_chance_percent / 100.0 {
            return Rarity::Uncommon;
        }
        Rarity::Normal
    }
}

/// The properties of a ball that affect its payout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreSource {
    pub rarity: Rarity,
    pub is_master: bool,
    pub is_micro: bool,
}

/// Result of scoring one event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payout {
    pub amount: f64,
    pub critical: bool,
}

/// `max(1, population * 0.75)`
pub fn population_multiplier(state: &ProgressionState) -> f64 {
    (f64::from(state.population()) * 0.75).max(1.0)
}

/// `1 + (permanent% + derived%) / 100`
pub fn income_multiplier(state: &ProgressionState) -> f64 {
    let stats = &state.derived;
    1.0 + (stats.permanent_income_boost_percent + stats.derived_income_boost_percent) / 100.0
}

/// Master ball multiplier: `1 + master + owned + floor(owned / 10) * 5`
pub fn master_multiplier(state: &ProgressionState) -> f64 {
    1.0 + state.master_multiplier as f64 + collection_bonus(state.owned_count())
}

/// Per-ball multiplier before population and income scaling
pub fn ball_multiplier(state: &ProgressionState, source: ScoreSource) -> f64 {
    if source.is_master {
        return master_multiplier(state);
    }

    let mut multiplier = source.rarity.multiplier();
    if source.is_micro {
        let stats = &state.derived;
        let micro_percent =
            1.0 + stats.micro_value_percent + stats.permanent_micro_boost_percent;
        multiplier *= micro_percent / 100.0;
    }
    multiplier
}

/// Unrounded gain for a scoring event
pub fn raw_gain(state: &ProgressionState, source: ScoreSource, base: f64) -> f64 {
    let gain = base
        * ball_multiplier(state, source)
        * population_multiplier(state)
        * income_multiplier(state);

    // Early micro marbles would otherwise round to nothing
    if source.is_micro && gain > 0.01 && gain < 1.0 {
        return 1.0;
    }
    gain
}

/// Score an event with an explicit critical roll in `[0, 1)`
pub fn score_with_roll(
    state: &ProgressionState,
    source: ScoreSource,
    base: f64,
    crit_roll: f64,
) -> Payout {
    let critical = crit_roll * 100.0 < state.derived.critical_chance_percent;
    // Round first so a critical is always exactly twice the normal payout
    let mut amount = raw_gain(state, source, base).round();
    if critical {
        amount *= 2.0;
    }
    Payout { amount, critical }
}

/// Score an event, rolling for a critical hit
pub fn score<R: Rng>(
    state: &ProgressionState,
    source: ScoreSource,
    base: f64,
    rng: &mut R,
) -> Payout {
    score_with_roll(state, source, base, rng.random::<f64>())
}

/// Base value of a peg hit
pub fn peg_base_value(state: &ProgressionState) -> f64 {
    state.derived.peg_value.max(1.0)
}

/// Base value of a landing in basket `lane` (0 = leftmost)
pub fn basket_base_value(state: &ProgressionState, lane: usize) -> f64 {
    let lane_value = BASKET_LANE_VALUES
        .get(lane)
        .copied()
        .unwrap_or(BASKET_FALLBACK_VALUE);
    lane_value + state.derived.basket_value_bonus
}

/// Reward for catching the bonus marble
pub fn bonus_reward(state: &ProgressionState) -> f64 {
    let rate = 0.10 + f64::from(state.upgrades.bonus_value) * 0.05;
    (state.peak_mps * rate).round().max(100.0)
}

/// One-time grant for time spent away; zero below the minimum absence
pub fn offline_grant(peak_mps: f64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= OFFLINE_MIN_SECS || peak_mps <= 0.0 {
        return 0.0;
    }
    (peak_mps * OFFLINE_RATE * elapsed_secs).floor()
}

/// Accumulates income between one-second snapshots
#[derive(Debug, Clone, Default)]
pub struct IncomeTracker {
    buffer: f64,
}

impl IncomeTracker {
    /// Add earned income to the balance and every running total
    pub fn credit(&mut self, state: &mut ProgressionState, amount: f64) {
        state.money += amount;
        state.lifetime_earnings += amount;
        state.total_earnings += amount;
        self.buffer += amount;
    }

    /// Close the current one-second window and update the income stats
    pub fn snapshot(&mut self, state: &mut ProgressionState) -> f64 {
        let mps = self.buffer.round();
        state.current_mps = mps;
        if mps > state.peak_mps {
            state.peak_mps = mps;
        }
        if mps > state.all_time_peak_mps {
            state.all_time_peak_mps = mps;
        }
        self.buffer = 0.0;
        mps
    }

    pub fn pending(&self) -> f64 {
        self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer = 0.0;
    }
}
