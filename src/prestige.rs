//! Prestige: melt the current run into shards and master power
//!
//! Rewards are computed from run statistics, then [`commit`] builds a brand
//! new [`ProgressionState`] from defaults plus the carried permanent fields.
//! There is no partial path: either the whole new state replaces the old one
//! or nothing changes.

use serde::{Deserialize, Serialize};

use crate::progression::ProgressionState;

/// Population required before prestige is offered
pub const REQUIRED_POPULATION: u32 = 50;
/// Balance required before prestige is offered
pub const REQUIRED_MONEY: f64 = 100_000_000.0;

/// Whether the run meets both prestige thresholds
pub fn is_eligible(state: &ProgressionState) -> bool {
    state.population() >= REQUIRED_POPULATION && state.money >= REQUIRED_MONEY
}

/// What a prestige would pay out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrestigeRewards {
    pub shards: u64,
    pub master_multiplier_gain: u64,
}

impl PrestigeRewards {
    /// Rewards for the run as it stands
    pub fn compute(state: &ProgressionState) -> Self {
        let population = f64::from(state.population());

        // Population/10 + lifetime/2B + run peak/1M, at least one shard
        let base = (population / 10.0 + state.lifetime_earnings / 2e9 + state.peak_mps / 1e6)
            .floor()
            .max(1.0);
        let shard_percent = state.derived.shard_multiplier_percent;
        let shards = if shard_percent > 0.0 {
            (base * (1.0 + shard_percent / 100.0)).floor()
        } else {
            base
        };

        // 5 per 50 population, plus the skin collection bonus
        let master_gain = (5.0 * population / 50.0).floor() + state.derived.derived_master_bonus;

        Self {
            shards: shards as u64,
            master_multiplier_gain: master_gain as u64,
        }
    }
}

/// Build the post-prestige state
///
/// Run-scoped fields come back at their defaults; permanent fields are
/// carried and the rewards added on top.
pub fn commit(state: &ProgressionState, rewards: PrestigeRewards) -> ProgressionState {
    let mut next = ProgressionState {
        kinetic_shards: state.kinetic_shards.saturating_add(rewards.shards),
        times_prestiged: state.times_prestiged.saturating_add(1),
        master_multiplier: state
            .master_multiplier
            .saturating_add(rewards.master_multiplier_gain),
        perm_upgrades_levels: state.perm_upgrades_levels.clone(),
        perm_upgrade_costs: state.perm_upgrade_costs.clone(),
        owned_marbles: state.owned_marbles.clone(),
        active_marble_skin_id: state.active_marble_skin_id.clone(),
        all_time_peak_mps: state.all_time_peak_mps.max(state.peak_mps),
        total_earnings: state.total_earnings,
        total_play_time: state.total_play_time,
        last_save_time: state.last_save_time,
        settings: state.settings.clone(),
        ..ProgressionState::default()
    };
    next.recompute_derived();
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::catalog::{PERM_INCOME, PERM_SHARD_MULTI};
    use crate::progression::UpgradeLevels;
    use crate::settings::Theme;
    use proptest::prelude::*;

    fn bare_state() -> ProgressionState {
        let mut state = ProgressionState::default();
        state.owned_marbles.clear();
        state.recompute_derived();
        state
    }

    #[test]
    fn test_nine_shard_scenario() {
        let mut state = bare_state();
        state.upgrades.extra_ball = 50;
        state.lifetime_earnings = 4_000_000_000.0;
        state.peak_mps = 2_000_000.0;
        state.recompute_derived();

        let rewards = PrestigeRewards::compute(&state);
        assert_eq!(rewards.shards, 9);
        assert_eq!(rewards.master_multiplier_gain, 5);
    }

    #[test]
    fn test_minimum_one_shard() {
        let state = bare_state();
        assert_eq!(PrestigeRewards::compute(&state).shards, 1);
    }

    #[test]
    fn test_shard_multiplier_floors() {
        let mut state = bare_state();
        state.upgrades.extra_ball = 50;
        state.lifetime_earnings = 4_000_000_000.0;
        state.peak_mps = 2_000_000.0;
        state.perm_upgrades_levels.insert(PERM_SHARD_MULTI.to_string(), 1);
        state.recompute_derived();
        // floor(9 * 1.1) = 9
        assert_eq!(PrestigeRewards::compute(&state).shards, 9);

        state.perm_upgrades_levels.insert(PERM_SHARD_MULTI.to_string(), 5);
        state.recompute_derived();
        // floor(9 * 1.5) = 13
        assert_eq!(PrestigeRewards::compute(&state).shards, 13);
    }

    #[test]
    fn test_eligibility() {
        let mut state = bare_state();
        state.upgrades.extra_ball = 50;
        state.money = 99_999_999.0;
        assert!(!is_eligible(&state));
        state.money = 100_000_000.0;
        assert!(is_eligible(&state));
        state.upgrades.extra_ball = 49;
        assert!(!is_eligible(&state));
    }

    #[test]
    fn test_commit_resets_run_and_carries_permanent() {
        let mut state = ProgressionState::default();
        state.money = 5e8;
        state.lifetime_earnings = 4e9;
        state.upgrades.extra_ball = 60;
        state.upgrades.peg_value = 12;
        state.current_mps = 1234.0;
        state.peak_mps = 2e6;
        state.all_time_peak_mps = 1e6;
        state.total_earnings = 9e9;
        state.total_play_time = 3600.0;
        state.kinetic_shards = 4;
        state.perm_upgrades_levels.insert(PERM_INCOME.to_string(), 2);
        state.perm_upgrade_costs.insert(PERM_INCOME.to_string(), 5);
        state.settings.peg_muted = true;
        state.settings.sfx_volume = 0.2;
        state.settings.theme = Theme::Purple;
        state.recompute_derived();

        let rewards = PrestigeRewards {
            shards: 9,
            master_multiplier_gain: 7,
        };
        let next = commit(&state, rewards);

        // Run fields
        assert_eq!(next.money, 0.0);
        assert_eq!(next.lifetime_earnings, 0.0);
        assert_eq!(next.upgrades, UpgradeLevels::default());
        assert_eq!(next.current_mps, 0.0);
        assert_eq!(next.peak_mps, 0.0);

        // Permanent fields
        assert_eq!(next.kinetic_shards, 13);
        assert_eq!(next.times_prestiged, 1);
        assert_eq!(next.master_multiplier, 7);
        assert_eq!(next.perm_level(PERM_INCOME), 2);
        assert_eq!(next.perm_upgrade_costs.get(PERM_INCOME), Some(&5));
        assert_eq!(next.owned_marbles, state.owned_marbles);
        assert_eq!(next.all_time_peak_mps, 2e6);
        assert_eq!(next.total_earnings, 9e9);
        assert_eq!(next.total_play_time, 3600.0);
        assert_eq!(next.settings, state.settings);

        // Derived stats recomputed from the reset levels
        assert_eq!(next.derived.peg_value, 1.0);
        assert_eq!(next.derived.permanent_income_boost_percent, 10.0);
        assert!(next.master_unlocked());
    }

    proptest! {
        #[test]
        fn prop_commit_never_loses_permanent_progress(
            shards in 0u64..1_000_000,
            master in 0u64..1_000_000,
            prestiged in 0u32..1000,
            gain_shards in 0u64..1000,
            gain_master in 0u64..1000,
            money in 0.0f64..1e15,
            population in 1u32..500,
        ) {
            let mut state = ProgressionState::default();
            state.kinetic_shards = shards;
            state.master_multiplier = master;
            state.times_prestiged = prestiged;
            state.money = money;
            state.upgrades.extra_ball = population;
            state.recompute_derived();

            let next = commit(&state, PrestigeRewards {
                shards: gain_shards,
                master_multiplier_gain: gain_master,
            });

            prop_assert!(next.kinetic_shards >= state.kinetic_shards);
            prop_assert!(next.master_multiplier >= state.master_multiplier);
            prop_assert_eq!(next.times_prestiged, state.times_prestiged + 1);
            prop_assert_eq!(&next.owned_marbles, &state.owned_marbles);
            prop_assert_eq!(&next.settings, &state.settings);
            prop_assert_eq!(next.money, 0.0);
            prop_assert_eq!(next.population(), 1);
        }
    }
}
