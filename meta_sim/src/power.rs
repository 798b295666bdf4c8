use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    balance_config::{BalanceCalculationSettings, PowerWeights},
    characters::{Archetype, PenaltyTerm, StatKind, SynergyTerm},
    stats::{StatStore, StatTable},
};

const BASE_SHARE: f32 = 0.6;
const ARCHETYPE_SHARE: f32 = 0.3;
const SYNERGY_SHARE: f32 = 0.1;

const BALANCE_BONUS_SPREAD: f32 = 20.0;
const BALANCE_BONUS_SCALE: f32 = 0.1;
const SPECIALIZATION_MARGIN: f32 = 20.0;
const SPECIALIZATION_SCALE: f32 = 0.05;
const META_CYCLE_FREQUENCY: f32 = 0.1;
const META_CYCLE_AMPLITUDE: f32 = 2.0;

pub const MIN_CONVERTED_WIN_RATE: f32 = 25.0;
pub const MAX_CONVERTED_WIN_RATE: f32 = 75.0;
const NEUTRAL_WIN_RATE: f32 = 50.0;

/// Power components for one character.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PowerBreakdown {
    pub base: f32,
    pub archetype: f32,
    pub synergy: f32,
    pub total: f32,
}

#[inline]
fn combat_value(stats: &[f32; 4], stat: StatKind) -> f32 {
    match stat {
        StatKind::Health => stats[0],
        StatKind::Damage => stats[1],
        StatKind::Speed => stats[2],
        StatKind::Utility => stats[3],
        StatKind::WinRate | StatKind::Popularity => 0.0,
    }
}

pub fn base_power(stats: &[f32; 4], weights: &PowerWeights) -> f32 {
    stats
        .iter()
        .zip(weights.as_array())
        .map(|(value, weight)| value * weight)
        .sum()
}

pub fn archetype_power(archetype: Archetype, stats: &[f32; 4]) -> f32 {
    let profile = archetype.profile();
    let linear: f32 = stats
        .iter()
        .zip(profile.coefficients)
        .map(|(value, coefficient)| value * coefficient)
        .sum();

    let synergy = match profile.synergy {
        SynergyTerm::Min { a, b, scale } => {
            combat_value(stats, a).min(combat_value(stats, b)) * scale
        }
        SynergyTerm::Sum { a, b, scale } => {
            (combat_value(stats, a) + combat_value(stats, b)) * scale
        }
    };

    let penalty = match profile.penalty {
        PenaltyTerm::Above {
            stat,
            threshold,
            scale,
        } => (combat_value(stats, stat) - threshold).max(0.0) * scale,
        PenaltyTerm::Below {
            stat,
            threshold,
            scale,
        } => (threshold - combat_value(stats, stat)).max(0.0) * scale,
    };

    linear + synergy - penalty
}

pub fn synergy_power(archetype: Archetype, stats: &[f32; 4], cycle: u64) -> f32 {
    let mean = stats.iter().sum::<f32>() / stats.len() as f32;
    let max_deviation = stats
        .iter()
        .map(|value| (value - mean).abs())
        .fold(0.0f32, f32::max);
    let balance_bonus = ((BALANCE_BONUS_SPREAD - max_deviation) * BALANCE_BONUS_SCALE).max(0.0);

    let peak = stats.iter().copied().fold(f32::MIN, f32::max);
    let specialization_bonus =
        ((peak - (mean + SPECIALIZATION_MARGIN)) * SPECIALIZATION_SCALE).max(0.0);

    let profile = archetype.profile();
    let oscillation = (cycle as f32 * META_CYCLE_FREQUENCY).sin()
        * META_CYCLE_AMPLITUDE
        * profile.oscillation_weight
        * (combat_value(stats, profile.dominant) / 100.0);

    balance_bonus + specialization_bonus + oscillation
}

pub fn calculate_power(
    archetype: Archetype,
    table: &StatTable,
    weights: &PowerWeights,
    cycle: u64,
) -> PowerBreakdown {
    let stats = table.combat();
    let base = base_power(&stats, weights);
    let archetype_value = archetype_power(archetype, &stats);
    let synergy = synergy_power(archetype, &stats, cycle);
    PowerBreakdown {
        base,
        archetype: archetype_value,
        synergy,
        total: BASE_SHARE * base + ARCHETYPE_SHARE * archetype_value + SYNERGY_SHARE * synergy,
    }
}

pub fn calculate_base_power_levels(
    store: &StatStore,
    settings: &BalanceCalculationSettings,
    cycle: u64,
) -> BTreeMap<Archetype, PowerBreakdown> {
    store
        .tables()
        .map(|(archetype, table)| {
            (
                archetype,
                calculate_power(archetype, table, &settings.power_weights, cycle),
            )
        })
        .collect()
}

pub fn average_power(levels: &BTreeMap<Archetype, PowerBreakdown>) -> f32 {
    if levels.is_empty() {
        return 0.0;
    }
    levels.values().map(|level| level.total).sum::<f32>() / levels.len() as f32
}

/// Scales power relative to the roster average into a [25, 75] win rate.
pub fn power_to_win_rate(power: f32, average: f32, modifier: f32) -> f32 {
    let relative = if average > f32::EPSILON && power.is_finite() {
        NEUTRAL_WIN_RATE * (power / average)
    } else {
        NEUTRAL_WIN_RATE
    };
    (relative + modifier).clamp(MIN_CONVERTED_WIN_RATE, MAX_CONVERTED_WIN_RATE)
}

pub fn base_win_rates(
    store: &StatStore,
    settings: &BalanceCalculationSettings,
    cycle: u64,
) -> BTreeMap<Archetype, f32> {
    let levels = calculate_base_power_levels(store, settings, cycle);
    let average = average_power(&levels);
    levels
        .iter()
        .map(|(archetype, level)| {
            let modifier = settings.archetype_modifiers(*archetype).win_rate;
            (*archetype, power_to_win_rate(level.total, average, modifier))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::BaseStats;

    fn uniform_store() -> StatStore {
        let mut store = StatStore::default();
        for archetype in Archetype::ALL {
            store.insert(archetype, archetype.as_str(), BaseStats::default());
        }
        store
    }

    #[test]
    fn tank_formula_matches_reference() {
        let stats = [80.0, 40.0, 70.0, 60.0];
        let expected = 1.3 * 80.0 + 0.8 * 60.0 + 0.4 * 40.0 + 0.15 * (80.0 + 60.0)
            - (70.0 - 60.0) * 0.2;
        assert!((archetype_power(Archetype::Tank, &stats) - expected).abs() < 1e-4);
    }

    #[test]
    fn balance_bonus_rewards_clustered_stats() {
        let even = synergy_power(Archetype::Warrior, &[50.0; 4], 0);
        assert!((even - 2.0).abs() < 1e-5);
        let spread = synergy_power(Archetype::Warrior, &[20.0, 80.0, 50.0, 50.0], 0);
        assert!(spread < even);
    }

    #[test]
    fn specialization_bonus_applies_past_margin() {
        let stats = [30.0, 100.0, 30.0, 40.0];
        // mean 50, peak exceeds mean + 20 by 30
        let value = synergy_power(Archetype::Mage, &stats, 0);
        assert!((value - 1.5).abs() < 1e-5);
    }

    #[test]
    fn equal_stats_convert_to_neutral_win_rate() {
        let store = uniform_store();
        let settings = BalanceCalculationSettings::default();
        let rates = base_win_rates(&store, &settings, 0);
        for rate in rates.values() {
            assert!((rate - 50.0).abs() < 1e-4);
        }
    }

    #[test]
    fn conversion_is_reproducible() {
        let mut store = uniform_store();
        store
            .set(Archetype::Mage, StatKind::Damage, 83.0)
            .unwrap();
        let settings = BalanceCalculationSettings::default();
        let first = base_win_rates(&store, &settings, 7);
        let second = base_win_rates(&store, &settings, 7);
        for (a, b) in first.values().zip(second.values()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn conversion_clamps_and_falls_back() {
        assert_eq!(power_to_win_rate(400.0, 100.0, 0.0), MAX_CONVERTED_WIN_RATE);
        assert_eq!(power_to_win_rate(1.0, 100.0, 0.0), MIN_CONVERTED_WIN_RATE);
        assert_eq!(power_to_win_rate(10.0, 0.0, 2.0), 52.0);
    }
}
