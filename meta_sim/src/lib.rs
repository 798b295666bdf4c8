//! Meta-balance simulation for a four-archetype competitive game.
//!
//! Stats feed a power model and a matchup matrix, popularity bends the
//! resulting win rates, and an event engine lets a player spend resources
//! reacting to crises and opportunities. [`MetaSimulation`] is the entry
//! point; it drives a headless Bevy [`App`] built by [`build_headless_app`].

pub mod balance_config;
pub mod characters;
pub mod commands;
pub mod config;
mod error;
pub mod event_config;
pub mod events;
pub mod feedback;
pub mod matchup;
pub mod meta_health;
pub mod phase;
pub mod popularity;
pub mod power;
mod rng;
pub mod roster_config;
mod sentiment;
mod simulation;
pub mod stats;
pub mod systems;
pub mod wallet;
pub mod win_rate;

use bevy::prelude::*;

pub use balance_config::{BalanceCalculationSettings, BalanceSettingsHandle};
pub use characters::{Archetype, BaseStats, StatKind};
pub use config::{ConfigSources, MetaSimulationConfig};
pub use error::MetaError;
pub use event_config::{
    EventCatalog, EventCategory, EventDefinition, EventGenerationConfig, ResponseOption,
};
pub use events::{ActiveEvent, EventInstanceId, EventResolution, EventState, ResolutionOutcome};
pub use meta_health::MetaHealthScore;
pub use phase::GamePhase;
pub use rng::{SimulationRng, DEFAULT_SEED};
pub use roster_config::CharacterRosterConfig;
pub use sentiment::{CommunitySentiment, NEUTRAL_SENTIMENT};
pub use simulation::MetaSimulation;
pub use stats::{StatChange, StatModifier, StatStore};
pub use systems::CycleReport;
pub use wallet::{PlayerResources, ResourceCost, ResourcePool, ResourceWallet};
pub use win_rate::{WinRateBreakdown, WinRateReport};

/// Construct a Bevy [`App`] holding the simulation state and the phase
/// pipeline.
pub fn build_headless_app(config: &MetaSimulationConfig) -> App {
    let mut app = App::new();

    config.settings.log_violations();
    let store = StatStore::from_roster(&config.roster);
    let trends = popularity::PopularityTrends::seeded(&store);
    let health = MetaHealthScore::compute(&store, &config.settings);
    let sentiment = CommunitySentiment::new(NEUTRAL_SENTIMENT, config.generation.sentiment_blend);
    let ledger = events::EventLedger::with_history_limit(config.generation.history_limit);

    app.insert_resource(BalanceSettingsHandle::new(config.settings.clone()))
        .insert_resource(event_config::EventCatalogHandle::new(config.catalog.clone()))
        .insert_resource(event_config::EventGenerationHandle::new(
            config.generation.clone(),
        ))
        .insert_resource(config.sources.clone())
        .insert_resource(store)
        .insert_resource(trends)
        .insert_resource(matchup::MatchupMatrix::default())
        .insert_resource(WinRateReport::default())
        .insert_resource(health)
        .insert_resource(sentiment)
        .insert_resource(SimulationRng::new(config.seed))
        .insert_resource(PlayerResources::new(config.starting_resources))
        .insert_resource(ledger)
        .insert_resource(events::EventScheduler::default())
        .insert_resource(events::MajorChangeTracker::default())
        .insert_resource(feedback::FeedbackQueue::default())
        .insert_resource(phase::PhaseState::default())
        .insert_resource(CycleReport::default())
        .add_plugins(MinimalPlugins)
        .add_systems(
            Update,
            (
                systems::advance_clock.run_if(systems::time_pending),
                systems::recalculate_win_rates_system.run_if(systems::recalculation_requested),
                systems::community_feedback_system.run_if(systems::feedback_requested),
                systems::generate_phase_events_system.run_if(systems::event_generation_requested),
                systems::seasonal_event_system.run_if(systems::seasonal_event_requested),
                systems::reaction_event_system.run_if(systems::reaction_event_requested),
                meta_health::score_meta_health,
                systems::finish_update,
            )
                .chain(),
        );

    app
}

/// Run one pass of the phase pipeline.
///
/// Systems only act on work queued in [`phase::PhaseState`], so an update
/// with nothing pending leaves the simulation untouched.
pub fn run_update(app: &mut App) {
    app.update();
}
