use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{characters::Archetype, error::MetaError};

pub const BUILTIN_BALANCE_SETTINGS: &str = include_str!("data/balance_settings.json");

const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerWeights {
    pub health: f32,
    pub damage: f32,
    pub speed: f32,
    pub utility: f32,
}

impl Default for PowerWeights {
    fn default() -> Self {
        Self {
            health: 0.25,
            damage: 0.3,
            speed: 0.2,
            utility: 0.25,
        }
    }
}

impl PowerWeights {
    pub fn sum(&self) -> f32 {
        self.health + self.damage + self.speed + self.utility
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.health, self.damage, self.speed, self.utility]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeModifiers {
    pub win_rate: f32,
    pub popularity: f32,
}

/// Tuning for power, matchup, popularity and win-rate calculations.
///
/// Loaded once when the simulation starts. Only [`normalize_weights`] and
/// [`reset`] change it afterwards.
///
/// [`normalize_weights`]: BalanceCalculationSettings::normalize_weights
/// [`reset`]: BalanceCalculationSettings::reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceCalculationSettings {
    pub power_weights: PowerWeights,
    pub matchup_influence: f32,
    pub max_matchup_modifier: f32,
    pub high_popularity_threshold: f32,
    pub low_popularity_threshold: f32,
    pub overcentralization_penalty: f32,
    pub underdog_bonus: f32,
    pub ideal_win_rate_range: f32,
    pub ideal_popularity_range: f32,
    pub calculation_iterations: u32,
    pub max_random_variance: f32,
    pub meta_drift_amplitude: f32,
    pub calculation_momentum: f32,
    pub popularity_jitter: f32,
    pub archetype_modifiers: BTreeMap<Archetype, ArchetypeModifiers>,
}

impl Default for BalanceCalculationSettings {
    fn default() -> Self {
        Self {
            power_weights: PowerWeights::default(),
            matchup_influence: 0.5,
            max_matchup_modifier: 8.0,
            high_popularity_threshold: 70.0,
            low_popularity_threshold: 30.0,
            overcentralization_penalty: 0.15,
            underdog_bonus: 0.1,
            ideal_win_rate_range: 5.0,
            ideal_popularity_range: 30.0,
            calculation_iterations: 1,
            max_random_variance: 1.5,
            meta_drift_amplitude: 1.0,
            calculation_momentum: 0.7,
            popularity_jitter: 0.3,
            archetype_modifiers: BTreeMap::new(),
        }
    }
}

impl BalanceCalculationSettings {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_BALANCE_SETTINGS)
                .expect("builtin balance settings should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, BalanceSettingsError> {
        let settings: BalanceCalculationSettings = serde_json::from_str(json)?;
        settings.log_violations();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, BalanceSettingsError> {
        let contents =
            fs::read_to_string(path).map_err(|source| BalanceSettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&contents)
    }

    pub fn archetype_modifiers(&self, archetype: Archetype) -> ArchetypeModifiers {
        self.archetype_modifiers
            .get(&archetype)
            .copied()
            .unwrap_or_default()
    }

    /// Invariants that are reported but never enforced at use time.
    pub fn violations(&self) -> Vec<MetaError> {
        let mut violations = Vec::new();
        let sum = self.power_weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            violations.push(MetaError::ConfigurationInvariantViolated(format!(
                "power weights sum to {sum:.3}, expected 1.0"
            )));
        }
        if self.low_popularity_threshold >= self.high_popularity_threshold {
            violations.push(MetaError::ConfigurationInvariantViolated(format!(
                "low popularity threshold {} is not below high threshold {}",
                self.low_popularity_threshold, self.high_popularity_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.calculation_momentum) {
            violations.push(MetaError::ConfigurationInvariantViolated(format!(
                "calculation momentum {} outside [0, 1)",
                self.calculation_momentum
            )));
        }
        if self.calculation_iterations == 0 {
            violations.push(MetaError::ConfigurationInvariantViolated(
                "calculation iterations must be at least 1".to_string(),
            ));
        }
        if self.max_random_variance < 0.0 || self.max_matchup_modifier < 0.0 {
            violations.push(MetaError::ConfigurationInvariantViolated(
                "variance and matchup bounds must be non-negative".to_string(),
            ));
        }
        violations
    }

    pub fn log_violations(&self) {
        for violation in self.violations() {
            warn!(
                target: "meta_sim::config",
                error = %violation,
                "balance_settings.invariant_violated"
            );
        }
    }

    /// Rescales the power weights so they sum to 1.0.
    pub fn normalize_weights(&mut self) {
        let sum = self.power_weights.sum();
        if sum <= f32::EPSILON {
            self.power_weights = PowerWeights::default();
            return;
        }
        self.power_weights.health /= sum;
        self.power_weights.damage /= sum;
        self.power_weights.speed /= sum;
        self.power_weights.utility /= sum;
    }

    /// Iteration count with the zero case treated as one pass.
    pub fn effective_iterations(&self) -> u32 {
        self.calculation_iterations.max(1)
    }
}

#[derive(Debug, Error)]
pub enum BalanceSettingsError {
    #[error("failed to parse balance settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read balance settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Resource, Debug, Clone)]
pub struct BalanceSettingsHandle(pub Arc<BalanceCalculationSettings>);

impl BalanceSettingsHandle {
    pub fn new(settings: Arc<BalanceCalculationSettings>) -> Self {
        Self(settings)
    }

    pub fn get(&self) -> Arc<BalanceCalculationSettings> {
        Arc::clone(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_settings_are_consistent() {
        let settings = BalanceCalculationSettings::builtin();
        assert!(settings.violations().is_empty());
        assert!((settings.power_weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn weight_violation_is_reported_not_fatal() {
        let json = r#"{"power_weights":{"health":0.5,"damage":0.5,"speed":0.5,"utility":0.5}}"#;
        let settings = BalanceCalculationSettings::from_json_str(json).unwrap();
        let violations = settings.violations();
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            MetaError::ConfigurationInvariantViolated(_)
        ));
    }

    #[test]
    fn normalize_rescales_weights() {
        let mut settings = BalanceCalculationSettings {
            power_weights: PowerWeights {
                health: 1.0,
                damage: 1.0,
                speed: 1.0,
                utility: 1.0,
            },
            ..BalanceCalculationSettings::default()
        };
        settings.normalize_weights();
        assert!((settings.power_weights.health - 0.25).abs() < 1e-6);
        assert!(settings.violations().is_empty());
    }

    #[test]
    fn archetype_modifiers_default_to_zero() {
        let json = r#"{"archetype_modifiers":{"tank":{"win_rate":-1.5}}}"#;
        let settings = BalanceCalculationSettings::from_json_str(json).unwrap();
        assert_eq!(settings.archetype_modifiers(Archetype::Tank).win_rate, -1.5);
        assert_eq!(
            settings.archetype_modifiers(Archetype::Mage),
            ArchetypeModifiers::default()
        );
    }
}
