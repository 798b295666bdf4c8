use bevy::prelude::Resource;
use serde::Serialize;

use crate::{
    balance_config::BalanceCalculationSettings,
    characters::{Archetype, StatKind, ARCHETYPE_COUNT},
    stats::{StatStore, StatTable},
};

/// Authored attacker-row advantages. Intentionally asymmetric.
const BASE_MATCHUPS: [[f32; ARCHETYPE_COUNT]; ARCHETYPE_COUNT] = [
    // warrior vs  warrior, mage, support, tank
    [0.0, 2.0, 3.0, -2.0],
    // mage
    [-1.0, 0.0, 1.0, 2.0],
    // support
    [-2.0, 0.0, 0.0, 2.0],
    // tank
    [2.0, -2.0, -1.0, 0.0],
];

/// Scale applied to normalized health, damage, speed, utility differences.
const STAT_DIFFERENCE_SCALE: [f32; 4] = [5.0, 6.0, 4.0, 4.0];
const STAT_MATCHUP_CAP: f32 = 3.0;
const STAT_LAYER_BLEND: f32 = 0.5;
const MIN_POPULARITY_WEIGHT: f32 = 0.1;

pub fn base_matchup(attacker: Archetype, defender: Archetype) -> f32 {
    if attacker == defender {
        return 0.0;
    }
    BASE_MATCHUPS[attacker.index()][defender.index()]
}

/// Stat-driven advantage of `attacker` over `defender`, clamped to ±3.
pub fn stat_matchup(
    attacker: Archetype,
    attacker_stats: &StatTable,
    defender_stats: &StatTable,
) -> f32 {
    let weights = attacker.profile().matchup_weights;
    let ours = attacker_stats.combat();
    let theirs = defender_stats.combat();
    let mut total = 0.0;
    for index in 0..StatKind::COMBAT.len() {
        let normalized = (ours[index] - theirs[index]) / 100.0;
        total += normalized * STAT_DIFFERENCE_SCALE[index] * weights[index];
    }
    total.clamp(-STAT_MATCHUP_CAP, STAT_MATCHUP_CAP)
}

/// Directional advantage table refreshed once per recalculation cycle.
#[derive(Resource, Debug, Clone, Default, Serialize)]
pub struct MatchupMatrix {
    values: [[f32; ARCHETYPE_COUNT]; ARCHETYPE_COUNT],
    built: bool,
}

impl MatchupMatrix {
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Neutral 0 until the matrix has been built.
    pub fn advantage(&self, attacker: Archetype, defender: Archetype) -> f32 {
        if !self.built || attacker == defender {
            return 0.0;
        }
        self.values[attacker.index()][defender.index()]
    }

    /// Blends the base table with the stat layer for every roster pair.
    pub fn update(&mut self, store: &StatStore) {
        self.values = [[0.0; ARCHETYPE_COUNT]; ARCHETYPE_COUNT];
        for (attacker, attacker_stats) in store.tables() {
            for (defender, defender_stats) in store.tables() {
                if attacker == defender {
                    continue;
                }
                let stat_layer = stat_matchup(attacker, attacker_stats, defender_stats);
                self.values[attacker.index()][defender.index()] = (1.0 - STAT_LAYER_BLEND)
                    * base_matchup(attacker, defender)
                    + STAT_LAYER_BLEND * stat_layer;
            }
        }
        self.built = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Popularity-weighted average advantage of `attacker` against the rest
    /// of the roster, clamped to the configured cap.
    pub fn dynamic_adjustment(
        &self,
        attacker: Archetype,
        store: &StatStore,
        settings: &BalanceCalculationSettings,
    ) -> f32 {
        let mut weighted = 0.0;
        let mut weight_total = 0.0;
        for (defender, table) in store.tables() {
            if defender == attacker {
                continue;
            }
            let weight = (table.get(StatKind::Popularity) / 100.0).max(MIN_POPULARITY_WEIGHT);
            weighted += self.advantage(attacker, defender) * weight;
            weight_total += weight;
        }
        if weight_total <= f32::EPSILON {
            return 0.0;
        }
        let cap = settings.max_matchup_modifier.abs();
        (weighted / weight_total).clamp(-cap, cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::BaseStats;

    fn store() -> StatStore {
        let mut store = StatStore::default();
        for archetype in Archetype::ALL {
            store.insert(archetype, archetype.as_str(), BaseStats::default());
        }
        store
    }

    #[test]
    fn self_pairs_are_zero() {
        let mut matrix = MatchupMatrix::default();
        let mut store = store();
        store.set(Archetype::Tank, StatKind::Health, 400.0).unwrap();
        matrix.update(&store);
        for archetype in Archetype::ALL {
            assert_eq!(base_matchup(archetype, archetype), 0.0);
            assert_eq!(matrix.advantage(archetype, archetype), 0.0);
        }
    }

    #[test]
    fn unbuilt_matrix_is_neutral() {
        let matrix = MatchupMatrix::default();
        assert_eq!(matrix.advantage(Archetype::Warrior, Archetype::Support), 0.0);
    }

    #[test]
    fn equal_stats_keep_half_base_relationship() {
        let mut matrix = MatchupMatrix::default();
        matrix.update(&store());
        assert!((matrix.advantage(Archetype::Warrior, Archetype::Support) - 1.5).abs() < 1e-6);
        assert!((matrix.advantage(Archetype::Tank, Archetype::Warrior) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn stat_layer_is_capped() {
        let strong = StatTable::from_base(&BaseStats::uniform(400.0));
        let weak = StatTable::from_base(&BaseStats::uniform(1.0));
        assert_eq!(stat_matchup(Archetype::Warrior, &strong, &weak), 3.0);
        assert_eq!(stat_matchup(Archetype::Warrior, &weak, &strong), -3.0);
    }

    #[test]
    fn dynamic_adjustment_weights_by_popularity() {
        let mut store = store();
        let settings = BalanceCalculationSettings::default();
        let mut matrix = MatchupMatrix::default();
        matrix.update(&store);
        let neutral = matrix.dynamic_adjustment(Archetype::Warrior, &store, &settings);

        store
            .set(Archetype::Support, StatKind::Popularity, 100.0)
            .unwrap();
        store.set(Archetype::Tank, StatKind::Popularity, 0.0).unwrap();
        let skewed = matrix.dynamic_adjustment(Archetype::Warrior, &store, &settings);
        assert!(skewed > neutral);
    }
}
