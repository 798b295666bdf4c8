use bevy::prelude::*;
use serde::Serialize;

use crate::{
    balance_config::{BalanceCalculationSettings, BalanceSettingsHandle},
    characters::StatKind,
    stats::StatStore,
};

const DIVERSITY_SCALE: f32 = 2.0;
const BALANCE_PENALTY: f32 = 3.0;
const ENGAGEMENT_PENALTY: f32 = 2.0;

/// Aggregate health of the current meta, each component in [0, 100].
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetaHealthScore {
    pub diversity: f32,
    pub balance: f32,
    pub engagement: f32,
    pub overall: f32,
}

impl Default for MetaHealthScore {
    fn default() -> Self {
        Self::from_components(0.0, 100.0, 100.0)
    }
}

impl MetaHealthScore {
    pub fn from_components(diversity: f32, balance: f32, engagement: f32) -> Self {
        Self {
            diversity,
            balance,
            engagement,
            overall: 0.4 * diversity + 0.4 * balance + 0.2 * engagement,
        }
    }

    pub fn compute(store: &StatStore, settings: &BalanceCalculationSettings) -> Self {
        Self::from_components(
            diversity_score(store),
            balance_score(store, settings),
            engagement_score(store, settings),
        )
    }
}

/// Mean pairwise absolute difference over the combat stats, scaled by two.
pub fn diversity_score(store: &StatStore) -> f32 {
    let tables: Vec<[f32; 4]> = store.tables().map(|(_, table)| table.combat()).collect();
    if tables.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut pairs = 0u32;
    for (index, first) in tables.iter().enumerate() {
        for second in &tables[index + 1..] {
            let difference: f32 = first
                .iter()
                .zip(second)
                .map(|(a, b)| (a - b).abs())
                .sum::<f32>()
                / first.len() as f32;
            total += difference;
            pairs += 1;
        }
    }
    (total / pairs as f32 * DIVERSITY_SCALE).clamp(0.0, 100.0)
}

pub fn balance_score(store: &StatStore, settings: &BalanceCalculationSettings) -> f32 {
    if store.is_empty() {
        return 100.0;
    }
    let excess: f32 = store
        .tables()
        .map(|(_, table)| {
            ((table.get(StatKind::WinRate) - 50.0).abs() - settings.ideal_win_rate_range).max(0.0)
        })
        .sum::<f32>()
        / store.len() as f32;
    (100.0 - BALANCE_PENALTY * excess).max(0.0)
}

pub fn engagement_score(store: &StatStore, settings: &BalanceCalculationSettings) -> f32 {
    let (min, max) = store
        .tables()
        .map(|(_, table)| table.get(StatKind::Popularity))
        .fold((f32::MAX, f32::MIN), |(min, max), value| {
            (min.min(value), max.max(value))
        });
    if min > max {
        return 100.0;
    }
    let excess = (max - min) - settings.ideal_popularity_range;
    if excess <= 0.0 {
        100.0
    } else {
        (100.0 - ENGAGEMENT_PENALTY * excess).max(0.0)
    }
}

pub fn score_meta_health(
    store: Res<StatStore>,
    settings: Res<BalanceSettingsHandle>,
    mut score: ResMut<MetaHealthScore>,
) {
    *score = MetaHealthScore::compute(&store, settings.get().as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::{Archetype, BaseStats};
    use bevy_ecs::system::RunSystemOnce;
    use std::sync::Arc;

    fn store() -> StatStore {
        let mut store = StatStore::default();
        for archetype in Archetype::ALL {
            store.insert(archetype, archetype.as_str(), BaseStats::default());
        }
        store
    }

    #[test]
    fn balance_is_perfect_at_neutral_win_rates() {
        let mut store = store();
        store.set(Archetype::Tank, StatKind::Health, 300.0).unwrap();
        store.set(Archetype::Mage, StatKind::Popularity, 99.0).unwrap();
        let settings = BalanceCalculationSettings::default();
        assert_eq!(balance_score(&store, &settings), 100.0);
    }

    #[test]
    fn balance_penalizes_excess_deviation() {
        let mut store = store();
        store.set(Archetype::Warrior, StatKind::WinRate, 65.0).unwrap();
        let settings = BalanceCalculationSettings::default();
        // (15 - 5) / 4 characters * 3
        assert!((balance_score(&store, &settings) - 92.5).abs() < 1e-4);
    }

    #[test]
    fn diversity_grows_with_stat_spread() {
        let mut store = store();
        let mut previous = diversity_score(&store);
        assert_eq!(previous, 0.0);
        for damage in [55.0, 60.0, 70.0, 90.0] {
            store.set(Archetype::Mage, StatKind::Damage, damage).unwrap();
            let current = diversity_score(&store);
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn engagement_drops_two_points_per_excess() {
        let mut store = store();
        let settings = BalanceCalculationSettings::default();
        assert_eq!(engagement_score(&store, &settings), 100.0);
        store.set(Archetype::Warrior, StatKind::Popularity, 90.0).unwrap();
        store.set(Archetype::Tank, StatKind::Popularity, 50.0).unwrap();
        // spread 40 against an ideal range of 30
        assert!((engagement_score(&store, &settings) - 80.0).abs() < 1e-4);
    }

    #[test]
    fn overall_weights_components() {
        let score = MetaHealthScore::from_components(50.0, 100.0, 0.0);
        assert!((score.overall - 60.0).abs() < 1e-5);
    }

    #[test]
    fn system_writes_score_resource() {
        let mut world = World::new();
        let mut store = store();
        store.set(Archetype::Support, StatKind::WinRate, 80.0).unwrap();
        world.insert_resource(store);
        world.insert_resource(BalanceSettingsHandle::new(Arc::new(
            BalanceCalculationSettings::default(),
        )));
        world.insert_resource(MetaHealthScore::default());
        world.run_system_once(score_meta_health);
        let score = world.resource::<MetaHealthScore>();
        assert!(score.balance < 100.0);
    }
}
