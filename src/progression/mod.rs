//! Durable player progression
//!
//! `ProgressionState` is the single aggregate that gets saved, migrated and
//! swapped out on prestige. Field names serialize to the same camelCase layout
//! the web build has always written, so older saves keep loading.

pub mod catalog;
pub mod upgrades;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

pub use catalog::{MarbleSkin, PermUpgradeConfig, SkinRarity, find_perm_upgrade, find_skin};
pub use upgrades::{DerivedStats, UPGRADES, UpgradeConfig, UpgradeId, UpgradeLevels};

/// Schema version written by this build
pub const CURRENT_VERSION: u32 = 2;

/// Complete player progression (serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressionState {
    pub version: u32,

    // === Run economy ===
    pub money: f64,
    /// Earned during the current run
    pub lifetime_earnings: f64,
    pub upgrades: UpgradeLevels,
    #[serde(flatten)]
    pub derived: DerivedStats,

    // === Statistics ===
    /// Income snapshot from the last one-second window
    pub current_mps: f64,
    /// Best one-second window this run
    pub peak_mps: f64,
    /// Best one-second window across every run
    pub all_time_peak_mps: f64,
    /// Earned across every run
    pub total_earnings: f64,
    /// Seconds spent with the simulation running
    pub total_play_time: f64,
    /// Unix timestamp (ms) of the last save
    pub last_save_time: f64,

    // === Prestige ===
    pub kinetic_shards: u64,
    pub master_multiplier: u64,
    pub times_prestiged: u32,
    pub perm_upgrades_levels: BTreeMap<String, u32>,
    pub perm_upgrade_costs: BTreeMap<String, u64>,

    // === Collection ===
    pub owned_marbles: BTreeSet<String>,
    #[serde(rename = "activeMarbleSkinID")]
    pub active_marble_skin_id: String,

    #[serde(flatten)]
    pub settings: Settings,
}

impl Default for ProgressionState {
    fn default() -> Self {
        let owned_marbles: BTreeSet<String> = [catalog::STARTER_SKIN.to_string()].into();
        let mut state = Self {
            version: CURRENT_VERSION,
            money: 0.0,
            lifetime_earnings: 0.0,
            upgrades: UpgradeLevels::default(),
            derived: DerivedStats::default(),
            current_mps: 0.0,
            peak_mps: 0.0,
            all_time_peak_mps: 0.0,
            total_earnings: 0.0,
            total_play_time: 0.0,
            last_save_time: 0.0,
            kinetic_shards: 0,
            master_multiplier: 0,
            times_prestiged: 0,
            perm_upgrades_levels: BTreeMap::new(),
            perm_upgrade_costs: BTreeMap::new(),
            owned_marbles,
            active_marble_skin_id: catalog::STARTER_SKIN.to_string(),
            settings: Settings::default(),
        };
        state.recompute_derived();
        state
    }
}

impl ProgressionState {
    /// Non-micro balls the board should hold
    pub fn population(&self) -> u32 {
        self.upgrades.extra_ball
    }

    /// Target ball count, never below one
    pub fn target_ball_count(&self) -> usize {
        self.population().max(1) as usize
    }

    /// The master ball joins the board once any prestige has happened
    pub fn master_unlocked(&self) -> bool {
        self.master_multiplier > 0 || self.times_prestiged > 0
    }

    pub fn owned_count(&self) -> usize {
        self.owned_marbles.len()
    }

    pub fn owns_skin(&self, id: &str) -> bool {
        self.owned_marbles.contains(id)
    }

    pub fn perm_level(&self, id: &str) -> u32 {
        self.perm_upgrades_levels.get(id).copied().unwrap_or(0)
    }

    /// Texture of the equipped skin, if it has one
    pub fn active_texture(&self) -> Option<&'static str> {
        find_skin(&self.active_marble_skin_id).and_then(|skin| skin.texture)
    }

    /// Rebuild every derived stat from levels, shard upgrades and skins.
    ///
    /// Must run after any change to `upgrades`, `perm_upgrades_levels` or
    /// `owned_marbles`.
    pub fn recompute_derived(&mut self) {
        self.derived =
            DerivedStats::compute(&self.upgrades, &self.perm_upgrades_levels, self.owned_count());
    }
}
