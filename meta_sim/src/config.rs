use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;

use crate::{
    balance_config::BalanceCalculationSettings,
    event_config::{EventCatalog, EventGenerationConfig},
    rng::DEFAULT_SEED,
    roster_config::CharacterRosterConfig,
    wallet::ResourcePool,
};

pub const BALANCE_SETTINGS_ENV: &str = "META_BALANCE_SETTINGS_PATH";
pub const CHARACTER_ROSTER_ENV: &str = "META_CHARACTER_ROSTER_PATH";
pub const EVENT_CATALOG_ENV: &str = "META_EVENT_CATALOG_PATH";
pub const EVENT_GENERATION_ENV: &str = "META_EVENT_GENERATION_PATH";
pub const SEED_ENV: &str = "META_SIM_SEED";

/// Where a loaded config came from; `None` means the compiled-in copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    path: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn is_builtin(&self) -> bool {
        self.path.is_none()
    }
}

/// Sources of every config the simulation was built from.
#[derive(Resource, Debug, Clone, Default)]
pub struct ConfigSources {
    pub balance_settings: ConfigSource,
    pub character_roster: ConfigSource,
    pub event_catalog: ConfigSource,
    pub event_generation: ConfigSource,
}

pub fn load_balance_settings_from_env() -> (Arc<BalanceCalculationSettings>, ConfigSource) {
    load_with_env_paths(
        BALANCE_SETTINGS_ENV,
        "balance_settings",
        BalanceCalculationSettings::builtin,
        BalanceCalculationSettings::from_file,
    )
}

pub fn load_character_roster_from_env() -> (Arc<CharacterRosterConfig>, ConfigSource) {
    load_with_env_paths(
        CHARACTER_ROSTER_ENV,
        "character_roster",
        CharacterRosterConfig::builtin,
        CharacterRosterConfig::from_file,
    )
}

pub fn load_event_catalog_from_env() -> (Arc<EventCatalog>, ConfigSource) {
    load_with_env_paths(
        EVENT_CATALOG_ENV,
        "event_catalog",
        EventCatalog::builtin,
        EventCatalog::from_file,
    )
}

pub fn load_event_generation_from_env() -> (Arc<EventGenerationConfig>, ConfigSource) {
    load_with_env_paths(
        EVENT_GENERATION_ENV,
        "event_generation",
        EventGenerationConfig::builtin,
        EventGenerationConfig::from_file,
    )
}

fn load_with_env_paths<T, E>(
    env_var: &str,
    label: &'static str,
    builtin: fn() -> Arc<T>,
    from_file: fn(&Path) -> Result<T, E>,
) -> (Arc<T>, ConfigSource)
where
    E: std::fmt::Display,
{
    let override_path = env::var(env_var).ok().map(PathBuf::from);
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(format!("src/data/{label}.json"));

    let candidates: Vec<PathBuf> = match override_path {
        Some(ref path) => vec![path.clone()],
        None => vec![default_path.clone()],
    };

    for path in candidates {
        match from_file(&path) {
            Ok(cfg) => {
                tracing::info!(
                    target: "meta_sim::config",
                    path = %path.display(),
                    "{label}.loaded=file"
                );
                return (Arc::new(cfg), ConfigSource::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "meta_sim::config",
                    path = %path.display(),
                    error = %err,
                    "{label}.load_failed"
                );
            }
        }
    }

    tracing::info!(
        target: "meta_sim::config",
        "{label}.loaded=builtin"
    );
    (builtin(), ConfigSource::new(None))
}

/// Everything needed to build a [`MetaSimulation`](crate::MetaSimulation).
#[derive(Debug, Clone)]
pub struct MetaSimulationConfig {
    pub settings: Arc<BalanceCalculationSettings>,
    pub roster: Arc<CharacterRosterConfig>,
    pub catalog: Arc<EventCatalog>,
    pub generation: Arc<EventGenerationConfig>,
    pub seed: u64,
    pub starting_resources: ResourcePool,
    pub sources: ConfigSources,
}

impl MetaSimulationConfig {
    /// Compiled-in data with the default seed.
    pub fn builtin() -> Self {
        Self {
            settings: BalanceCalculationSettings::builtin(),
            roster: CharacterRosterConfig::builtin(),
            catalog: EventCatalog::builtin(),
            generation: EventGenerationConfig::builtin(),
            seed: DEFAULT_SEED,
            starting_resources: ResourcePool::new(10, 10),
            sources: ConfigSources::default(),
        }
    }

    /// Loads every config honouring the override env vars. `META_SIM_SEED`
    /// replaces the default seed when it parses.
    pub fn from_env() -> Self {
        let (settings, balance_source) = load_balance_settings_from_env();
        let (roster, roster_source) = load_character_roster_from_env();
        let (catalog, catalog_source) = load_event_catalog_from_env();
        let (generation, generation_source) = load_event_generation_from_env();
        let seed = match env::var(SEED_ENV) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    target: "meta_sim::config",
                    value = %raw,
                    "seed.invalid"
                );
                DEFAULT_SEED
            }),
            Err(_) => DEFAULT_SEED,
        };
        Self {
            settings,
            roster,
            catalog,
            generation,
            seed,
            sources: ConfigSources {
                balance_settings: balance_source,
                character_roster: roster_source,
                event_catalog: catalog_source,
                event_generation: generation_source,
            },
            ..Self::builtin()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_settings(mut self, settings: BalanceCalculationSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn with_roster(mut self, roster: CharacterRosterConfig) -> Self {
        self.roster = Arc::new(roster);
        self
    }

    pub fn with_catalog(mut self, catalog: EventCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_generation(mut self, generation: EventGenerationConfig) -> Self {
        self.generation = Arc::new(generation);
        self
    }

    pub fn with_resources(mut self, resources: ResourcePool) -> Self {
        self.starting_resources = resources;
        self
    }
}

impl Default for MetaSimulationConfig {
    fn default() -> Self {
        Self::builtin()
    }
}
