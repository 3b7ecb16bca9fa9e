//! Run-scoped upgrade table, levels and the derived stat block
//!
//! Derived stats are never edited directly. `DerivedStats::compute` is the
//! only producer; everything else reads them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::{PERM_BONUS_CHANCE, PERM_INCOME, PERM_MICRO_BOOST, PERM_SHARD_MULTI};

/// Hard cap for every percentage-chance stat
pub const CHANCE_CAP_PERCENT: f64 = 20.0;

/// Run-scoped upgrade identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeId {
    ExtraBall,
    PegValue,
    MicroValue,
    UncommonChance,
    BasketValue,
    CriticalChance,
    BonusValue,
    RareChance,
    BallSpeed,
    LegendaryChance,
}

/// Static description of an upgrade line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpgradeConfig {
    pub id: UpgradeId,
    pub name: &'static str,
    pub description: &'static str,
    pub base_cost: f64,
    pub cost_multiplier: f64,
    /// Minimum ball population before the upgrade can be bought
    pub unlocks_at: u32,
    /// Percentage stat ceiling; purchases stop once reached
    pub max_percent: Option<f64>,
}

/// Upgrade table, ordered by unlock threshold
pub static UPGRADES: [UpgradeConfig; 10] = [
    UpgradeConfig {
        id: UpgradeId::ExtraBall,
        name: "Extra Marble",
        description: "Adds another marble to the board.",
        base_cost: 25.0,
        cost_multiplier: 1.4,
        unlocks_at: 1,
        max_percent: None,
    },
    UpgradeConfig {
        id: UpgradeId::PegValue,
        name: "Peg Value +",
        description: "Increases money earned per bounce.",
        base_cost: 100.0,
        cost_multiplier: 1.64,
        unlocks_at: 10,
        max_percent: None,
    },
    UpgradeConfig {
        id: UpgradeId::MicroValue,
        name: "Micro Value +",
        description: "Increases Micro marble value.",
        base_cost: 200.0,
        cost_multiplier: 1.4,
        unlocks_at: 15,
        max_percent: None,
    },
    UpgradeConfig {
        id: UpgradeId::UncommonChance,
        name: "Uncommon Chance +",
        description: "Chance for Uncommon marbles.",
        base_cost: 500.0,
        cost_multiplier: 1.64,
        unlocks_at: 20,
        max_percent: Some(CHANCE_CAP_PERCENT),
    },
    UpgradeConfig {
        id: UpgradeId::BasketValue,
        name: "Basket Value +",
        description: "Increases bottom basket rewards.",
        base_cost: 2000.0,
        cost_multiplier: 1.48,
        unlocks_at: 30,
        max_percent: None,
    },
    UpgradeConfig {
        id: UpgradeId::CriticalChance,
        name: "Critical Chance +",
        description: "Chance for critical hits (2x).",
        base_cost: 5000.0,
        cost_multiplier: 1.64,
        unlocks_at: 35,
        max_percent: Some(CHANCE_CAP_PERCENT),
    },
    UpgradeConfig {
        id: UpgradeId::BonusValue,
        name: "Bonus Value +",
        description: "Improves Bonus Marble rewards.",
        base_cost: 7500.0,
        cost_multiplier: 1.4,
        unlocks_at: 40,
        max_percent: None,
    },
    UpgradeConfig {
        id: UpgradeId::RareChance,
        name: "Rare Chance +",
        description: "Chance for Rare marbles.",
        base_cost: 10000.0,
        cost_multiplier: 1.64,
        unlocks_at: 45,
        max_percent: Some(CHANCE_CAP_PERCENT),
    },
    UpgradeConfig {
        id: UpgradeId::BallSpeed,
        name: "Speed",
        description: "Marbles move faster.",
        base_cost: 25000.0,
        cost_multiplier: 1.8,
        unlocks_at: 55,
        max_percent: None,
    },
    UpgradeConfig {
        id: UpgradeId::LegendaryChance,
        name: "Legendary Chance +",
        description: "Chance for Legendary marbles.",
        base_cost: 50000.0,
        cost_multiplier: 1.64,
        unlocks_at: 60,
        max_percent: Some(CHANCE_CAP_PERCENT),
    },
];

impl UpgradeId {
    pub const ALL: [UpgradeId; 10] = [
        UpgradeId::ExtraBall,
        UpgradeId::PegValue,
        UpgradeId::MicroValue,
        UpgradeId::UncommonChance,
        UpgradeId::BasketValue,
        UpgradeId::CriticalChance,
        UpgradeId::BonusValue,
        UpgradeId::RareChance,
        UpgradeId::BallSpeed,
        UpgradeId::LegendaryChance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeId::ExtraBall => "extraBall",
            UpgradeId::PegValue => "pegValue",
            UpgradeId::MicroValue => "microValue",
            UpgradeId::UncommonChance => "uncommonChance",
            UpgradeId::BasketValue => "basketValue",
            UpgradeId::CriticalChance => "criticalChance",
            UpgradeId::BonusValue => "bonusValue",
            UpgradeId::RareChance => "rareChance",
            UpgradeId::BallSpeed => "ballSpeed",
            UpgradeId::LegendaryChance => "legendaryChance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }

    /// Static config for this upgrade
    pub fn config(&self) -> &'static UpgradeConfig {
        // UPGRADES is indexed in the same order as ALL
        &UPGRADES[*self as usize]
    }
}

impl UpgradeConfig {
    /// `floor(base * multiplier^level)`
    pub fn cost_at(&self, level: u32) -> f64 {
        let exponent = i32::try_from(level).unwrap_or(i32::MAX);
        (self.base_cost * self.cost_multiplier.powi(exponent)).floor()
    }
}

/// Purchased level of every run-scoped upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpgradeLevels {
    /// Level equals the number of non-micro balls on the board
    pub extra_ball: u32,
    pub peg_value: u32,
    pub ball_speed: u32,
    pub basket_value: u32,
    pub uncommon_chance: u32,
    pub rare_chance: u32,
    pub legendary_chance: u32,
    pub critical_chance: u32,
    pub micro_value: u32,
    pub bonus_value: u32,
}

impl Default for UpgradeLevels {
    fn default() -> Self {
        Self {
            extra_ball: 1,
            peg_value: 0,
            ball_speed: 0,
            basket_value: 0,
            uncommon_chance: 0,
            rare_chance: 0,
            legendary_chance: 0,
            critical_chance: 0,
            micro_value: 0,
            bonus_value: 0,
        }
    }
}

impl UpgradeLevels {
    pub fn get(&self, id: UpgradeId) -> u32 {
        match id {
            UpgradeId::ExtraBall => self.extra_ball,
            UpgradeId::PegValue => self.peg_value,
            UpgradeId::MicroValue => self.micro_value,
            UpgradeId::UncommonChance => self.uncommon_chance,
            UpgradeId::BasketValue => self.basket_value,
            UpgradeId::CriticalChance => self.critical_chance,
            UpgradeId::BonusValue => self.bonus_value,
            UpgradeId::RareChance => self.rare_chance,
            UpgradeId::BallSpeed => self.ball_speed,
            UpgradeId::LegendaryChance => self.legendary_chance,
        }
    }

    pub fn get_mut(&mut self, id: UpgradeId) -> &mut u32 {
        match id {
            UpgradeId::ExtraBall => &mut self.extra_ball,
            UpgradeId::PegValue => &mut self.peg_value,
            UpgradeId::MicroValue => &mut self.micro_value,
            UpgradeId::UncommonChance => &mut self.uncommon_chance,
            UpgradeId::BasketValue => &mut self.basket_value,
            UpgradeId::CriticalChance => &mut self.critical_chance,
            UpgradeId::BonusValue => &mut self.bonus_value,
            UpgradeId::RareChance => &mut self.rare_chance,
            UpgradeId::BallSpeed => &mut self.ball_speed,
            UpgradeId::LegendaryChance => &mut self.legendary_chance,
        }
    }
}

/// Stats computed from upgrade levels, shard upgrades and skin count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DerivedStats {
    pub peg_value: f64,
    /// Global physics time scale
    pub ball_speed: f64,

    pub uncommon_chance_percent: f64,
    pub rare_chance_percent: f64,
    pub legendary_chance_percent: f64,
    pub critical_chance_percent: f64,

    pub micro_value_percent: f64,
    pub bonus_value_percent: f64,
    pub basket_value_bonus: f64,

    pub permanent_income_boost_percent: f64,
    pub permanent_micro_boost_percent: f64,
    pub derived_income_boost_percent: f64,
    pub derived_master_bonus: f64,
    pub shard_multiplier_percent: f64,
    /// Probability (0-1) that a due bonus marble actually spawns
    pub bonus_chance: f64,
}

impl Default for DerivedStats {
    fn default() -> Self {
        Self::compute(&UpgradeLevels::default(), &BTreeMap::new(), 1)
    }
}

/// Skin milestone bonus: +1 per skin, +5 more for every 10 owned
pub fn collection_bonus(owned_count: usize) -> f64 {
    let owned = owned_count as f64;
    owned + (owned / 10.0).floor() * 5.0
}

impl DerivedStats {
    /// The single source of every derived stat
    pub fn compute(
        upgrades: &UpgradeLevels,
        perm_levels: &BTreeMap<String, u32>,
        owned_count: usize,
    ) -> Self {
        let perm = |id: &str| f64::from(perm_levels.get(id).copied().unwrap_or(0));
        let capped = |level: u32| f64::from(level).min(CHANCE_CAP_PERCENT);
        let speed_exponent = i32::try_from(upgrades.ball_speed).unwrap_or(i32::MAX);

        Self {
            peg_value: 1.0 + f64::from(upgrades.peg_value) * 2.0,
            ball_speed: 1.05_f64.powi(speed_exponent),

            uncommon_chance_percent: capped(upgrades.uncommon_chance),
            rare_chance_percent: capped(upgrades.rare_chance),
            legendary_chance_percent: capped(upgrades.legendary_chance),
            critical_chance_percent: capped(upgrades.critical_chance),

            micro_value_percent: f64::from(upgrades.micro_value),
            bonus_value_percent: f64::from(upgrades.bonus_value) * 5.0,
            basket_value_bonus: f64::from(upgrades.basket_value) * 10.0,

            permanent_income_boost_percent: perm(PERM_INCOME) * 5.0,
            permanent_micro_boost_percent: perm(PERM_MICRO_BOOST) * 2.0,
            derived_income_boost_percent: collection_bonus(owned_count),
            derived_master_bonus: collection_bonus(owned_count),
            shard_multiplier_percent: perm(PERM_SHARD_MULTI) * 10.0,
            bonus_chance: (0.5 + perm(PERM_BONUS_CHANCE) * 0.01).min(1.0),
        }
    }

    /// Current value of the stat an upgrade's percentage cap applies to
    pub fn capped_percent(&self, id: UpgradeId) -> Option<f64> {
        match id {
            UpgradeId::UncommonChance => Some(self.uncommon_chance_percent),
            UpgradeId::RareChance => Some(self.rare_chance_percent),
            UpgradeId::LegendaryChance => Some(self.legendary_chance_percent),
            UpgradeId::CriticalChance => Some(self.critical_chance_percent),
            _ => None,
        }
    }
}
