//! Purchases: run upgrades for money, permanent upgrades and skins for shards
//!
//! Every purchase validates first and only then mutates, so a rejected
//! request leaves the state exactly as it was.

use thiserror::Error;

use crate::progression::catalog::PERM_COST_GROWTH;
use crate::progression::{ProgressionState, UpgradeId, find_perm_upgrade, find_skin};

/// Why a purchase was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PurchaseError {
    #[error("unknown item `{0}`")]
    UnknownId(String),
    #[error("costs {cost}, only {available} available")]
    InsufficientFunds { cost: f64, available: f64 },
    #[error("unlocks at population {required}, currently {population}")]
    Locked { required: u32, population: u32 },
    #[error("already at the {cap}% cap")]
    Capped { cap: f64 },
    #[error("already at max level {max}")]
    MaxLevel { max: u32 },
    #[error("skin `{0}` is already owned")]
    AlreadyOwned(String),
    #[error("skin `{0}` is not owned")]
    NotOwned(String),
}

/// Money price of the next level of `id`
pub fn upgrade_cost(state: &ProgressionState, id: UpgradeId) -> f64 {
    id.config().cost_at(state.upgrades.get(id))
}

/// Check a run upgrade without buying it
pub fn check_upgrade(state: &ProgressionState, id: UpgradeId) -> Result<f64, PurchaseError> {
    let config = id.config();
    let population = state.population();
    if population < config.unlocks_at {
        return Err(PurchaseError::Locked {
            required: config.unlocks_at,
            population,
        });
    }
    if let (Some(cap), Some(current)) = (config.max_percent, state.derived.capped_percent(id)) {
        if current >= cap {
            return Err(PurchaseError::Capped { cap });
        }
    }

    let cost = upgrade_cost(state, id);
    if state.money < cost {
        return Err(PurchaseError::InsufficientFunds {
            cost,
            available: state.money,
        });
    }
    Ok(cost)
}

/// Buy one level of a run upgrade; returns the new level
pub fn buy_upgrade(state: &mut ProgressionState, id: UpgradeId) -> Result<u32, PurchaseError> {
    let cost = check_upgrade(state, id)?;

    state.money -= cost;
    let level = state.upgrades.get_mut(id);
    *level += 1;
    let level = *level;
    state.recompute_derived();
    Ok(level)
}

/// Shard price of the next level of a permanent upgrade
pub fn permanent_upgrade_cost(state: &ProgressionState, id: &str) -> Option<u64> {
    let config = find_perm_upgrade(id)?;
    Some(
        state
            .perm_upgrade_costs
            .get(id)
            .copied()
            .unwrap_or(config.base_cost),
    )
}

/// Buy one level of a permanent upgrade; returns the new level
pub fn buy_permanent_upgrade(state: &mut ProgressionState, id: &str) -> Result<u32, PurchaseError> {
    let config = find_perm_upgrade(id).ok_or_else(|| PurchaseError::UnknownId(id.to_string()))?;
    let level = state.perm_level(id);
    if let Some(max) = config.max_level.filter(|&max| level >= max) {
        return Err(PurchaseError::MaxLevel { max });
    }

    let cost = permanent_upgrade_cost(state, id).unwrap_or(config.base_cost);
    if state.kinetic_shards < cost {
        return Err(PurchaseError::InsufficientFunds {
            cost: cost as f64,
            available: state.kinetic_shards as f64,
        });
    }

    state.kinetic_shards -= cost;
    state.perm_upgrades_levels.insert(id.to_string(), level + 1);
    let next_cost = (cost as f64 * PERM_COST_GROWTH).floor() as u64;
    state.perm_upgrade_costs.insert(id.to_string(), next_cost);
    state.recompute_derived();
    Ok(level + 1)
}

/// Shard price of a skin given the current collection size
pub fn skin_price(state: &ProgressionState, id: &str) -> Option<u64> {
    find_skin(id).map(|skin| skin.price(state.owned_count()))
}

/// Buy a skin; returns the shards spent
pub fn buy_skin(state: &mut ProgressionState, id: &str) -> Result<u64, PurchaseError> {
    let skin = find_skin(id).ok_or_else(|| PurchaseError::UnknownId(id.to_string()))?;
    if state.owns_skin(id) {
        return Err(PurchaseError::AlreadyOwned(id.to_string()));
    }
    let price = skin.price(state.owned_count());
    if state.kinetic_shards < price {
        return Err(PurchaseError::InsufficientFunds {
            cost: price as f64,
            available: state.kinetic_shards as f64,
        });
    }

    state.kinetic_shards -= price;
    state.owned_marbles.insert(skin.id.clone());
    state.recompute_derived();
    Ok(price)
}

/// Equip an owned skin
pub fn equip_skin(state: &mut ProgressionState, id: &str) -> Result<(), PurchaseError> {
    if find_skin(id).is_none() {
        return Err(PurchaseError::UnknownId(id.to_string()));
    }
    if !state.owns_skin(id) {
        return Err(PurchaseError::NotOwned(id.to_string()));
    }
    state.active_marble_skin_id = id.to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::catalog::{PERM_BONUS_CHANCE, PERM_INCOME, STARTER_SKIN};
    use proptest::prelude::*;

    #[test]
    fn test_buy_upgrade_debits_and_recomputes() {
        let mut state = ProgressionState::default();
        state.money = 1000.0;
        // Population starts at 1, so the first purchase is priced at level 1
        let cost = upgrade_cost(&state, UpgradeId::ExtraBall);
        assert_eq!(cost, UpgradeId::ExtraBall.config().cost_at(1));
        assert!(cost > 25.0);
        assert_eq!(buy_upgrade(&mut state, UpgradeId::ExtraBall), Ok(2));
        assert_eq!(state.money, 1000.0 - cost);
        assert_eq!(state.population(), 2);
        assert_eq!(state.lifetime_earnings, 0.0);
        assert!(upgrade_cost(&state, UpgradeId::ExtraBall) > cost);
    }

    #[test]
    fn test_locked_upgrade_is_rejected() {
        let mut state = ProgressionState::default();
        state.money = 1e12;
        let before = state.clone();
        assert_eq!(
            buy_upgrade(&mut state, UpgradeId::PegValue),
            Err(PurchaseError::Locked {
                required: 10,
                population: 1
            })
        );
        assert_eq!(state, before);

        state.upgrades.extra_ball = 10;
        assert!(buy_upgrade(&mut state, UpgradeId::PegValue).is_ok());
        assert_eq!(state.derived.peg_value, 3.0);
    }

    #[test]
    fn test_chance_cap() {
        let mut state = ProgressionState::default();
        state.money = f64::MAX / 2.0;
        state.upgrades.extra_ball = 100;
        state.upgrades.critical_chance = 19;
        state.recompute_derived();

        assert_eq!(buy_upgrade(&mut state, UpgradeId::CriticalChance), Ok(20));
        assert_eq!(
            buy_upgrade(&mut state, UpgradeId::CriticalChance),
            Err(PurchaseError::Capped { cap: 20.0 })
        );
        assert_eq!(state.derived.critical_chance_percent, 20.0);
    }

    #[test]
    fn test_permanent_upgrade_cost_growth() {
        let mut state = ProgressionState::default();
        state.kinetic_shards = 10;
        assert_eq!(buy_permanent_upgrade(&mut state, PERM_INCOME), Ok(1));
        assert_eq!(state.kinetic_shards, 7);
        // floor(3 * 1.4) = 4
        assert_eq!(permanent_upgrade_cost(&state, PERM_INCOME), Some(4));
        assert_eq!(state.derived.permanent_income_boost_percent, 5.0);

        assert_eq!(buy_permanent_upgrade(&mut state, PERM_INCOME), Ok(2));
        assert_eq!(state.kinetic_shards, 3);
        assert!(matches!(
            buy_permanent_upgrade(&mut state, PERM_INCOME),
            Err(PurchaseError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_permanent_upgrade_max_level() {
        let mut state = ProgressionState::default();
        state.kinetic_shards = u64::MAX / 2;
        state.perm_upgrades_levels.insert(PERM_BONUS_CHANCE.to_string(), 49);
        assert_eq!(buy_permanent_upgrade(&mut state, PERM_BONUS_CHANCE), Ok(50));
        assert!((state.derived.bonus_chance - 1.0).abs() < 1e-9);
        assert_eq!(
            buy_permanent_upgrade(&mut state, PERM_BONUS_CHANCE),
            Err(PurchaseError::MaxLevel { max: 50 })
        );
    }

    #[test]
    fn test_unknown_ids() {
        let mut state = ProgressionState::default();
        state.kinetic_shards = 1000;
        let before = state.clone();
        assert!(matches!(
            buy_permanent_upgrade(&mut state, "perm_nope"),
            Err(PurchaseError::UnknownId(_))
        ));
        assert!(matches!(buy_skin(&mut state, "nope"), Err(PurchaseError::UnknownId(_))));
        assert!(matches!(equip_skin(&mut state, "nope"), Err(PurchaseError::UnknownId(_))));
        assert_eq!(state, before);
    }

    #[test]
    fn test_skin_purchase_and_equip() {
        let mut state = ProgressionState::default();
        state.kinetic_shards = 10_000;
        let skin = crate::progression::catalog::MARBLE_SKINS
            .iter()
            .find(|s| s.id != STARTER_SKIN)
            .expect("catalog has more than the starter");

        assert!(matches!(
            equip_skin(&mut state, &skin.id),
            Err(PurchaseError::NotOwned(_))
        ));
        let price = skin.price(1);
        assert_eq!(buy_skin(&mut state, &skin.id), Ok(price));
        assert_eq!(state.kinetic_shards, 10_000 - price);
        assert_eq!(state.derived.derived_master_bonus, 2.0);
        assert_eq!(
            buy_skin(&mut state, &skin.id),
            Err(PurchaseError::AlreadyOwned(skin.id.clone()))
        );

        assert_eq!(equip_skin(&mut state, &skin.id), Ok(()));
        assert_eq!(state.active_marble_skin_id, skin.id);
    }

    proptest! {
        #[test]
        fn prop_insufficient_funds_never_mutates(
            idx in 0usize..10,
            level in 0u32..40,
            shortfall in 0.01f64..0.99,
        ) {
            let id = UpgradeId::ALL[idx];
            let mut state = ProgressionState::default();
            state.upgrades.extra_ball = 100;
            *state.upgrades.get_mut(id) = level.max(1);
            state.recompute_derived();
            let mut rich = state.clone();
            rich.money = f64::MAX;
            prop_assume!(check_upgrade(&rich, id).is_ok());

            state.money = upgrade_cost(&state, id) * shortfall;
            let before = state.clone();
            let result = buy_upgrade(&mut state, id);
            prop_assert!(
                matches!(result, Err(PurchaseError::InsufficientFunds { .. })),
                "unexpected result {:?}",
                result
            );
            prop_assert_eq!(state, before);
        }
    }
}
