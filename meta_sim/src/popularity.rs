use std::collections::BTreeMap;

use bevy::prelude::Resource;
use rand::Rng;
use serde::Serialize;

use crate::{
    balance_config::BalanceCalculationSettings,
    characters::{Archetype, StatKind},
    matchup::MatchupMatrix,
    stats::StatStore,
};

const TREND_SMOOTHING: f32 = 0.3;
const TREND_WIN_RATE_FACTOR: f32 = 0.1;
const CENTRALIZATION_KICKER_START: f32 = 85.0;
const CENTRALIZATION_KICKER_SCALE: f32 = 0.05;
const COUNTER_META_FLOOR: f32 = 60.0;
const COUNTER_META_SPAN: f32 = 40.0;
const COUNTER_META_SCALE: f32 = 0.5;
const COUNTER_META_CAP: f32 = 3.0;
const PERFORMANCE_SCALE: f32 = 0.2;
const META_ADAPTATION_THRESHOLD: f32 = 65.0;
const META_ADAPTATION_SCALE: f32 = 0.4;
const POPULARITY_STEP: f32 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PopularityTrend {
    pub last_popularity: f32,
    pub trend: f32,
}

/// Smoothed popularity movement per character.
#[derive(Resource, Debug, Clone, Default)]
pub struct PopularityTrends {
    entries: BTreeMap<Archetype, PopularityTrend>,
}

impl PopularityTrends {
    pub fn seeded(store: &StatStore) -> Self {
        let mut trends = Self::default();
        trends.seed(store);
        trends
    }

    /// Records current popularity as the baseline with a flat trend.
    pub fn seed(&mut self, store: &StatStore) {
        self.entries = store
            .tables()
            .map(|(archetype, table)| {
                (
                    archetype,
                    PopularityTrend {
                        last_popularity: table.get(StatKind::Popularity),
                        trend: 0.0,
                    },
                )
            })
            .collect();
    }

    /// `trend = lerp(trend, current - last, 0.3)`; run once per cycle before
    /// popularity effects are computed.
    pub fn update(&mut self, store: &StatStore) {
        for (archetype, table) in store.tables() {
            let current = table.get(StatKind::Popularity);
            let entry = self.entries.entry(archetype).or_insert(PopularityTrend {
                last_popularity: current,
                trend: 0.0,
            });
            let delta = current - entry.last_popularity;
            entry.trend += (delta - entry.trend) * TREND_SMOOTHING;
            entry.last_popularity = current;
        }
    }

    pub fn trend(&self, archetype: Archetype) -> f32 {
        self.entries
            .get(&archetype)
            .map(|entry| entry.trend)
            .unwrap_or(0.0)
    }

    pub fn get(&self, archetype: Archetype) -> Option<PopularityTrend> {
        self.entries.get(&archetype).copied()
    }
}

/// Win-rate adjustment derived from popularity signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PopularityAdjustment {
    pub overcentralization: f32,
    pub underdog: f32,
    pub trend: f32,
    pub counter_meta: f32,
    pub total: f32,
}

pub fn popularity_adjustment(
    archetype: Archetype,
    store: &StatStore,
    trends: &PopularityTrends,
    matrix: &MatchupMatrix,
    settings: &BalanceCalculationSettings,
) -> PopularityAdjustment {
    let popularity = store.get_or_default(archetype, StatKind::Popularity);

    let mut overcentralization = 0.0;
    if popularity > settings.high_popularity_threshold {
        overcentralization -=
            (popularity - settings.high_popularity_threshold) * settings.overcentralization_penalty;
    }
    if popularity > CENTRALIZATION_KICKER_START {
        let excess = popularity - CENTRALIZATION_KICKER_START;
        overcentralization -= excess * excess * CENTRALIZATION_KICKER_SCALE;
    }

    let underdog = if popularity < settings.low_popularity_threshold {
        (settings.low_popularity_threshold - popularity) * settings.underdog_bonus
    } else {
        0.0
    };

    let trend = -trends.trend(archetype) * TREND_WIN_RATE_FACTOR;

    let mut counter_meta = 0.0;
    for (opponent, table) in store.tables() {
        if opponent == archetype {
            continue;
        }
        let opponent_popularity = table.get(StatKind::Popularity);
        if opponent_popularity > COUNTER_META_FLOOR {
            let weight = (opponent_popularity - COUNTER_META_FLOOR) / COUNTER_META_SPAN;
            counter_meta += matrix.advantage(archetype, opponent) * weight * COUNTER_META_SCALE;
        }
    }
    let counter_meta = counter_meta.clamp(0.0, COUNTER_META_CAP);

    PopularityAdjustment {
        overcentralization,
        underdog,
        trend,
        counter_meta,
        total: overcentralization + underdog + trend + counter_meta,
    }
}

pub fn apply_popularity_effects(
    store: &StatStore,
    trends: &PopularityTrends,
    matrix: &MatchupMatrix,
    settings: &BalanceCalculationSettings,
) -> BTreeMap<Archetype, PopularityAdjustment> {
    store
        .roster()
        .into_iter()
        .map(|archetype| {
            (
                archetype,
                popularity_adjustment(archetype, store, trends, matrix, settings),
            )
        })
        .collect()
}

/// Popularity movement produced by one performance update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopularityShift {
    pub character: Archetype,
    pub performance: f32,
    pub appeal: f32,
    pub meta_adaptation: f32,
    pub previous: f32,
    pub value: f32,
}

/// Evolves popularity from win rate, archetype appeal and counter-picking of
/// the dominant character. All shifts are computed from the same snapshot.
pub fn update_popularity_based_on_performance<R: Rng + ?Sized>(
    store: &mut StatStore,
    matrix: &MatchupMatrix,
    settings: &BalanceCalculationSettings,
    rng: &mut R,
) -> Vec<PopularityShift> {
    let most_popular = store
        .tables()
        .map(|(archetype, table)| (archetype, table.get(StatKind::Popularity)))
        .fold(None, |best: Option<(Archetype, f32)>, candidate| match best {
            Some((_, value)) if value >= candidate.1 => best,
            _ => Some(candidate),
        });

    let jitter_bound = settings.popularity_jitter.abs();
    let mut shifts = Vec::with_capacity(store.len());
    for (archetype, table) in store.tables() {
        let performance = (table.get(StatKind::WinRate) - 50.0) * PERFORMANCE_SCALE;
        let jitter = if jitter_bound > 0.0 {
            rng.gen_range(-jitter_bound..=jitter_bound)
        } else {
            0.0
        };
        let appeal = archetype.profile().base_appeal
            + settings.archetype_modifiers(archetype).popularity
            + jitter;

        let meta_adaptation = match most_popular {
            Some((leader, leader_popularity))
                if leader != archetype && leader_popularity > META_ADAPTATION_THRESHOLD =>
            {
                matrix.advantage(archetype, leader).max(0.0) * META_ADAPTATION_SCALE
            }
            _ => 0.0,
        };

        let previous = table.get(StatKind::Popularity);
        let total = (performance + appeal + meta_adaptation) * POPULARITY_STEP;
        shifts.push(PopularityShift {
            character: archetype,
            performance,
            appeal,
            meta_adaptation,
            previous,
            value: StatKind::Popularity.clamp(previous + total),
        });
    }

    for shift in &mut shifts {
        if let Ok(change) = store.write_derived(shift.character, StatKind::Popularity, shift.value)
        {
            shift.value = change.value;
        }
    }
    shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::BaseStats;
    use rand::{rngs::SmallRng, SeedableRng};

    fn store() -> StatStore {
        let mut store = StatStore::default();
        for archetype in Archetype::ALL {
            store.insert(archetype, archetype.as_str(), BaseStats::default());
        }
        store
    }

    #[test]
    fn trend_follows_lerp() {
        let mut store = store();
        let mut trends = PopularityTrends::seeded(&store);
        store
            .set(Archetype::Mage, StatKind::Popularity, 60.0)
            .unwrap();
        trends.update(&store);
        assert!((trends.trend(Archetype::Mage) - 3.0).abs() < 1e-6);
        trends.update(&store);
        assert!((trends.trend(Archetype::Mage) - 2.1).abs() < 1e-6);
        assert_eq!(trends.trend(Archetype::Tank), 0.0);
    }

    #[test]
    fn overcentralized_character_is_penalized() {
        let mut store = store();
        store
            .set(Archetype::Warrior, StatKind::Popularity, 95.0)
            .unwrap();
        let settings = BalanceCalculationSettings::default();
        let mut matrix = MatchupMatrix::default();
        matrix.update(&store);
        let trends = PopularityTrends::default();
        let effects = apply_popularity_effects(&store, &trends, &matrix, &settings);
        let dominant = effects[&Archetype::Warrior].total;
        for archetype in [Archetype::Mage, Archetype::Support, Archetype::Tank] {
            assert!(dominant < effects[&archetype].total);
        }
        // 25 points over 70 at 0.15, plus (95 - 85)^2 * 0.05
        assert!((effects[&Archetype::Warrior].overcentralization + 8.75).abs() < 1e-4);
    }

    #[test]
    fn underdog_bonus_scales_with_deficit() {
        let mut store = store();
        store.set(Archetype::Tank, StatKind::Popularity, 10.0).unwrap();
        let settings = BalanceCalculationSettings::default();
        let adjustment = popularity_adjustment(
            Archetype::Tank,
            &store,
            &PopularityTrends::default(),
            &MatchupMatrix::default(),
            &settings,
        );
        assert!((adjustment.underdog - 2.0).abs() < 1e-5);
    }

    #[test]
    fn counter_meta_rewards_counters_only() {
        let mut store = store();
        store.set(Archetype::Mage, StatKind::Popularity, 100.0).unwrap();
        let settings = BalanceCalculationSettings::default();
        let mut matrix = MatchupMatrix::default();
        matrix.update(&store);
        let trends = PopularityTrends::default();
        // warrior beats mage in the base table, tank loses to it
        let warrior =
            popularity_adjustment(Archetype::Warrior, &store, &trends, &matrix, &settings);
        let tank = popularity_adjustment(Archetype::Tank, &store, &trends, &matrix, &settings);
        assert!((warrior.counter_meta - 0.5).abs() < 1e-5);
        assert_eq!(tank.counter_meta, 0.0);
    }

    #[test]
    fn performance_update_respects_bounds() {
        let mut store = store();
        store.set(Archetype::Warrior, StatKind::WinRate, 100.0).unwrap();
        store
            .set(Archetype::Warrior, StatKind::Popularity, 99.5)
            .unwrap();
        let settings = BalanceCalculationSettings::default();
        let matrix = MatchupMatrix::default();
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..20 {
            let shifts =
                update_popularity_based_on_performance(&mut store, &matrix, &settings, &mut rng);
            for shift in shifts {
                assert!((0.0..=100.0).contains(&shift.value));
            }
        }
        assert_eq!(store.get(Archetype::Warrior, StatKind::Popularity), Ok(100.0));
    }

    #[test]
    fn winners_gain_popularity_without_jitter() {
        let mut store = store();
        store.set(Archetype::Support, StatKind::WinRate, 60.0).unwrap();
        let settings = BalanceCalculationSettings {
            popularity_jitter: 0.0,
            ..BalanceCalculationSettings::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let shifts = update_popularity_based_on_performance(
            &mut store,
            &MatchupMatrix::default(),
            &settings,
            &mut rng,
        );
        let support = shifts
            .iter()
            .find(|shift| shift.character == Archetype::Support)
            .unwrap();
        // (10 * 0.2 - 0.2 appeal) * 0.3
        assert!((support.value - 50.54).abs() < 1e-4);
    }
}
