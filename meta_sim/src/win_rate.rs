use std::collections::BTreeMap;

use bevy::prelude::Resource;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    balance_config::BalanceCalculationSettings,
    characters::{Archetype, StatKind},
    matchup::MatchupMatrix,
    popularity::{apply_popularity_effects, PopularityTrends},
    power::base_win_rates,
    stats::StatStore,
};

const DRIFT_FREQUENCY: f32 = 0.1;

/// Signals that produced one character's win rate in the last cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WinRateBreakdown {
    pub base: f32,
    pub matchup: f32,
    pub popularity: f32,
    pub variance: f32,
    pub drift: f32,
    /// Unsmoothed sum of the terms above.
    pub target: f32,
    pub previous: f32,
    pub value: f32,
}

/// Outcome of the most recent recalculation.
#[derive(Resource, Debug, Clone, Default, Serialize)]
pub struct WinRateReport {
    pub cycle: u64,
    pub entries: BTreeMap<Archetype, WinRateBreakdown>,
}

impl WinRateReport {
    pub fn get(&self, archetype: Archetype) -> Option<&WinRateBreakdown> {
        self.entries.get(&archetype)
    }
}

/// Periodic per-archetype movement independent of player action.
pub fn meta_drift(archetype: Archetype, cycle: u64, amplitude: f32) -> f32 {
    let frequency = archetype.profile().drift_frequency;
    (cycle as f32 * DRIFT_FREQUENCY * frequency).sin() * amplitude
}

/// `momentum * previous + (1 - momentum) * target`, clamped to [0, 100].
pub fn blend_win_rate(previous: f32, target: f32, momentum: f32) -> f32 {
    let momentum = momentum.clamp(0.0, 1.0);
    StatKind::WinRate.clamp(momentum * previous + (1.0 - momentum) * target)
}

/// Runs one recalculation cycle: matrix refresh, trend update, then the
/// configured number of aggregation passes written back to the store.
pub fn recalculate_win_rates<R: Rng + ?Sized>(
    store: &mut StatStore,
    matrix: &mut MatchupMatrix,
    trends: &mut PopularityTrends,
    settings: &BalanceCalculationSettings,
    rng: &mut R,
    cycle: u64,
) -> WinRateReport {
    matrix.update(store);
    trends.update(store);

    let variance_bound = settings.max_random_variance.abs();
    let mut report = WinRateReport {
        cycle,
        entries: BTreeMap::new(),
    };

    for iteration in 0..settings.effective_iterations() {
        let base_rates = base_win_rates(store, settings, cycle);
        let popularity = apply_popularity_effects(store, trends, matrix, settings);

        let mut pass = BTreeMap::new();
        for (archetype, base) in base_rates {
            let matchup = matrix.dynamic_adjustment(archetype, store, settings)
                * settings.matchup_influence;
            let popularity = popularity
                .get(&archetype)
                .map(|adjustment| adjustment.total)
                .unwrap_or(0.0);
            let variance = if variance_bound > 0.0 {
                rng.gen_range(-variance_bound..=variance_bound)
            } else {
                0.0
            };
            let drift = meta_drift(archetype, cycle, settings.meta_drift_amplitude);
            let target = base + matchup + popularity + variance + drift;
            let previous = store.get_or_default(archetype, StatKind::WinRate);
            pass.insert(
                archetype,
                WinRateBreakdown {
                    base,
                    matchup,
                    popularity,
                    variance,
                    drift,
                    target,
                    previous,
                    value: blend_win_rate(previous, target, settings.calculation_momentum),
                },
            );
        }

        for (archetype, breakdown) in &mut pass {
            if let Ok(change) = store.write_derived(*archetype, StatKind::WinRate, breakdown.value)
            {
                breakdown.value = change.value;
            }
        }
        debug!(
            target: "meta_sim::win_rate",
            cycle,
            iteration,
            "win_rate.pass_complete"
        );
        report.entries = pass;
    }

    info!(
        target: "meta_sim::win_rate",
        cycle,
        characters = report.entries.len(),
        "win_rate.recalculated"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::BaseStats;
    use crate::rng::SimulationRng;

    fn store() -> StatStore {
        let mut store = StatStore::default();
        for archetype in Archetype::ALL {
            store.insert(archetype, archetype.as_str(), BaseStats::default());
        }
        store
    }

    fn quiet_settings() -> BalanceCalculationSettings {
        BalanceCalculationSettings {
            max_random_variance: 0.0,
            matchup_influence: 0.0,
            ..BalanceCalculationSettings::default()
        }
    }

    #[test]
    fn equal_stats_hold_neutral_win_rate() {
        let mut store = store();
        let mut matrix = MatchupMatrix::default();
        let mut trends = PopularityTrends::seeded(&store);
        let mut rng = SimulationRng::new(9);
        let report = recalculate_win_rates(
            &mut store,
            &mut matrix,
            &mut trends,
            &quiet_settings(),
            &mut rng,
            0,
        );
        for archetype in Archetype::ALL {
            let value = store.get(archetype, StatKind::WinRate).unwrap();
            assert!((value - 50.0).abs() < 1e-3, "{archetype}: {value}");
            assert_eq!(report.get(archetype).unwrap().drift, 0.0);
        }
        assert!(matrix.is_built());
    }

    #[test]
    fn momentum_smooths_toward_target() {
        assert!((blend_win_rate(50.0, 60.0, 0.7) - 53.0).abs() < 1e-4);
        assert_eq!(blend_win_rate(99.0, 400.0, 0.0), 100.0);
    }

    #[test]
    fn variance_stays_within_bound() {
        let mut store = store();
        let mut matrix = MatchupMatrix::default();
        let mut trends = PopularityTrends::seeded(&store);
        let mut rng = SimulationRng::new(3);
        let settings = BalanceCalculationSettings {
            max_random_variance: 2.0,
            ..BalanceCalculationSettings::default()
        };
        for cycle in 0..25 {
            let report = recalculate_win_rates(
                &mut store,
                &mut matrix,
                &mut trends,
                &settings,
                &mut rng,
                cycle,
            );
            for breakdown in report.entries.values() {
                assert!(breakdown.variance.abs() <= 2.0);
                assert!((0.0..=100.0).contains(&breakdown.value));
            }
        }
    }

    #[test]
    fn stronger_character_wins_more() {
        let mut store = store();
        store.set(Archetype::Mage, StatKind::Damage, 90.0).unwrap();
        let mut matrix = MatchupMatrix::default();
        let mut trends = PopularityTrends::seeded(&store);
        let mut rng = SimulationRng::new(1);
        let report = recalculate_win_rates(
            &mut store,
            &mut matrix,
            &mut trends,
            &quiet_settings(),
            &mut rng,
            0,
        );
        let mage = report.get(Archetype::Mage).unwrap();
        let tank = report.get(Archetype::Tank).unwrap();
        assert!(mage.base > tank.base);
        assert!(mage.value > 50.0);
    }

    #[test]
    fn iterations_compound_blending() {
        let mut single = store();
        let mut repeated = store();
        for target in [&mut single, &mut repeated] {
            target.set(Archetype::Warrior, StatKind::Health, 95.0).unwrap();
        }
        let once = quiet_settings();
        let thrice = BalanceCalculationSettings {
            calculation_iterations: 3,
            ..quiet_settings()
        };
        let mut rng = SimulationRng::new(5);
        recalculate_win_rates(
            &mut single,
            &mut MatchupMatrix::default(),
            &mut PopularityTrends::default(),
            &once,
            &mut rng,
            0,
        );
        recalculate_win_rates(
            &mut repeated,
            &mut MatchupMatrix::default(),
            &mut PopularityTrends::default(),
            &thrice,
            &mut rng,
            0,
        );
        let one = single.get(Archetype::Warrior, StatKind::WinRate).unwrap();
        let three = repeated.get(Archetype::Warrior, StatKind::WinRate).unwrap();
        assert!(three > one);
        assert!(one > 50.0);
    }
}
