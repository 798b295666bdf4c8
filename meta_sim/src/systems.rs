use bevy::{ecs::system::SystemParam, prelude::*};
use serde::Serialize;
use tracing::info;

use crate::{
    balance_config::BalanceSettingsHandle,
    event_config::{EventCatalogHandle, EventCategory, EventGenerationHandle},
    events::{
        generate_phase_events, roll_category, spawn_from_category, EventContext, EventInstanceId,
        EventLedger, EventResolution, EventScheduler,
    },
    feedback::{compose_feedback, FeedbackItem, FeedbackQueue},
    matchup::MatchupMatrix,
    meta_health::MetaHealthScore,
    phase::PhaseState,
    popularity::{update_popularity_based_on_performance, PopularityTrends},
    rng::SimulationRng,
    sentiment::CommunitySentiment,
    stats::StatStore,
    wallet::PlayerResources,
    win_rate::{recalculate_win_rates, WinRateReport},
};

/// Side effects of one schedule run, drained by the facade afterwards.
#[derive(Resource, Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub spawned: Vec<EventInstanceId>,
    pub resolutions: Vec<EventResolution>,
    pub feedback: Vec<FeedbackItem>,
    pub recalculated: bool,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty()
            && self.resolutions.is_empty()
            && self.feedback.is_empty()
            && !self.recalculated
    }
}

#[derive(SystemParam)]
pub struct RecalculationParams<'w> {
    pub phase: ResMut<'w, PhaseState>,
    pub settings: Res<'w, BalanceSettingsHandle>,
    pub store: ResMut<'w, StatStore>,
    pub matrix: ResMut<'w, MatchupMatrix>,
    pub trends: ResMut<'w, PopularityTrends>,
    pub rng: ResMut<'w, SimulationRng>,
    pub win_rates: ResMut<'w, WinRateReport>,
    pub report: ResMut<'w, CycleReport>,
}

#[derive(SystemParam)]
pub struct FeedbackParams<'w> {
    pub settings: Res<'w, BalanceSettingsHandle>,
    pub generation: Res<'w, EventGenerationHandle>,
    pub store: ResMut<'w, StatStore>,
    pub matrix: Res<'w, MatchupMatrix>,
    pub rng: ResMut<'w, SimulationRng>,
    pub sentiment: ResMut<'w, CommunitySentiment>,
    pub queue: ResMut<'w, FeedbackQueue>,
}

#[derive(SystemParam)]
pub struct GenerationParams<'w> {
    pub phase: ResMut<'w, PhaseState>,
    pub catalog: Res<'w, EventCatalogHandle>,
    pub generation: Res<'w, EventGenerationHandle>,
    pub sentiment: Res<'w, CommunitySentiment>,
    pub rng: ResMut<'w, SimulationRng>,
    pub ledger: ResMut<'w, EventLedger>,
    pub report: ResMut<'w, CycleReport>,
}

#[derive(SystemParam)]
pub struct ClockParams<'w> {
    pub phase: ResMut<'w, PhaseState>,
    pub catalog: Res<'w, EventCatalogHandle>,
    pub generation: Res<'w, EventGenerationHandle>,
    pub store: ResMut<'w, StatStore>,
    pub sentiment: ResMut<'w, CommunitySentiment>,
    pub resources: ResMut<'w, PlayerResources>,
    pub rng: ResMut<'w, SimulationRng>,
    pub ledger: ResMut<'w, EventLedger>,
    pub scheduler: ResMut<'w, EventScheduler>,
    pub queue: ResMut<'w, FeedbackQueue>,
    pub report: ResMut<'w, CycleReport>,
}

pub fn time_pending(phase: Res<PhaseState>) -> bool {
    phase.has_pending_time()
}

pub fn recalculation_requested(phase: Res<PhaseState>) -> bool {
    phase.pending.recalculate
}

pub fn feedback_requested(phase: Res<PhaseState>) -> bool {
    phase.pending.feedback
}

pub fn event_generation_requested(phase: Res<PhaseState>) -> bool {
    phase.pending.generate_events
}

pub fn seasonal_event_requested(phase: Res<PhaseState>) -> bool {
    phase.pending.seasonal_event
}

pub fn reaction_event_requested(phase: Res<PhaseState>) -> bool {
    phase.pending.reaction_event
}

/// Moves queued time onto the clock: event countdowns, continuous
/// generation and the feedback queue.
pub fn advance_clock(mut params: ClockParams) {
    let dt = params.phase.take_pending_time();
    let week = params.phase.week();
    let now = params.phase.elapsed();
    let mut ctx = EventContext {
        store: &mut *params.store,
        sentiment: &mut *params.sentiment,
        wallet: params.resources.wallet_mut(),
        rng: &mut *params.rng,
        week,
    };
    let expired = params.ledger.tick(dt, &mut ctx);
    if expired.iter().any(EventResolution::touched_base_stats) {
        params.phase.pending.recalculate = true;
    }
    params.report.resolutions.extend(expired);

    let generation = params.generation.get();
    if params.scheduler.advance(dt, &generation, &mut *params.rng) {
        let category = roll_category(&generation, params.sentiment.value(), &mut *params.rng);
        let catalog = params.catalog.get();
        if let Some(id) = spawn_from_category(
            &mut params.ledger,
            &catalog,
            &generation,
            category,
            &mut *params.rng,
            week,
            now,
        ) {
            params.report.spawned.push(id);
        }
    }

    if let Some(item) = params.queue.tick(dt) {
        info!(
            target: "meta_sim::feedback",
            character = %item.character,
            tone = item.tone.as_str(),
            message = %item.message,
            "feedback.shown"
        );
        params.report.feedback.push(item);
    }
}

pub fn recalculate_win_rates_system(mut params: RecalculationParams) {
    let settings = params.settings.get();
    let cycle = params.phase.complete_cycle();
    let report = recalculate_win_rates(
        &mut params.store,
        &mut params.matrix,
        &mut params.trends,
        &settings,
        &mut *params.rng,
        cycle,
    );
    *params.win_rates = report;
    params.report.recalculated = true;
}

/// Evolves popularity, queues per-character reactions and lets sentiment
/// drift toward overall meta health.
pub fn community_feedback_system(mut params: FeedbackParams) {
    let settings = params.settings.get();
    let generation = params.generation.get();
    update_popularity_based_on_performance(
        &mut params.store,
        &params.matrix,
        &settings,
        &mut *params.rng,
    );
    let items = compose_feedback(&params.store, &settings, generation.feedback_item_delay);
    let queued = items.len();
    params.queue.extend(items);

    let health = MetaHealthScore::compute(&params.store, &settings);
    let sentiment = params
        .sentiment
        .drift_toward(health.overall, generation.feedback_sentiment_drift);
    info!(
        target: "meta_sim::feedback",
        queued,
        meta_health = health.overall,
        sentiment,
        "feedback.queued"
    );
}

pub fn generate_phase_events_system(mut params: GenerationParams) {
    let generation = params.generation.get();
    let catalog = params.catalog.get();
    let week = params.phase.week();
    let now = params.phase.elapsed();
    let spawned = generate_phase_events(
        &mut params.ledger,
        &catalog,
        &generation,
        params.sentiment.value(),
        &mut *params.rng,
        week,
        now,
    );
    params.phase.record_generated(spawned.len() as u32);
    params.report.spawned.extend(spawned);
}

pub fn seasonal_event_system(params: GenerationParams) {
    spawn_dedicated(params, EventCategory::Seasonal);
}

pub fn reaction_event_system(params: GenerationParams) {
    spawn_dedicated(params, EventCategory::Reaction);
}

fn spawn_dedicated(mut params: GenerationParams, category: EventCategory) {
    let generation = params.generation.get();
    let catalog = params.catalog.get();
    let week = params.phase.week();
    let now = params.phase.elapsed();
    if let Some(id) = spawn_from_category(
        &mut params.ledger,
        &catalog,
        &generation,
        category,
        &mut *params.rng,
        week,
        now,
    ) {
        params.phase.record_generated(1);
        params.report.spawned.push(id);
    }
}

pub fn finish_update(mut phase: ResMut<PhaseState>) {
    phase.clear_pending();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        balance_config::BalanceCalculationSettings,
        characters::{Archetype, BaseStats, StatKind},
        event_config::{EventCatalog, EventGenerationConfig},
        phase::GamePhase,
        wallet::ResourcePool,
    };
    use bevy_ecs::system::RunSystemOnce;
    use std::sync::Arc;

    fn world() -> World {
        let mut world = World::new();
        let mut store = StatStore::default();
        for archetype in Archetype::ALL {
            store.insert(archetype, archetype.as_str(), BaseStats::default());
        }
        world.insert_resource(PopularityTrends::seeded(&store));
        world.insert_resource(store);
        world.insert_resource(BalanceSettingsHandle::new(Arc::new(
            BalanceCalculationSettings::default(),
        )));
        world.insert_resource(EventCatalogHandle::new(EventCatalog::builtin()));
        world.insert_resource(EventGenerationHandle::new(Arc::new(
            EventGenerationConfig::default(),
        )));
        world.insert_resource(PhaseState::default());
        world.insert_resource(MatchupMatrix::default());
        world.insert_resource(SimulationRng::new(21));
        world.insert_resource(WinRateReport::default());
        world.insert_resource(CycleReport::default());
        world.insert_resource(CommunitySentiment::default());
        world.insert_resource(FeedbackQueue::default());
        world.insert_resource(EventLedger::default());
        world.insert_resource(EventScheduler::default());
        world.insert_resource(PlayerResources::new(ResourcePool::new(5, 5)));
        world
    }

    #[test]
    fn recalculation_advances_cycle_and_builds_matrix() {
        let mut world = world();
        world.run_system_once(recalculate_win_rates_system);
        assert_eq!(world.resource::<PhaseState>().cycle(), 1);
        assert!(world.resource::<MatchupMatrix>().is_built());
        assert_eq!(world.resource::<WinRateReport>().entries.len(), 4);
        assert!(world.resource::<CycleReport>().recalculated);
    }

    #[test]
    fn feedback_system_queues_one_item_per_character() {
        let mut world = world();
        world.run_system_once(community_feedback_system);
        assert_eq!(world.resource::<FeedbackQueue>().len(), 4);
    }

    #[test]
    fn event_phase_spawns_within_configured_range() {
        let mut world = world();
        world.resource_mut::<PhaseState>().enter(GamePhase::Event);
        world.run_system_once(generate_phase_events_system);
        let spawned = world.resource::<EventLedger>().open_count();
        assert!((1..=2).contains(&spawned));
        assert_eq!(
            world.resource::<PhaseState>().events_generated_this_phase(),
            spawned as u32
        );
    }

    #[test]
    fn clock_expires_events_and_requests_recalculation() {
        let mut world = world();
        let definition = EventCatalog::builtin()
            .definition("exploit_discovered")
            .cloned()
            .unwrap();
        world.resource_mut::<EventLedger>().spawn(definition, 0, 0.0);
        world.resource_mut::<PhaseState>().queue_time(1_000.0);
        world.run_system_once(advance_clock);

        let report = world.resource::<CycleReport>();
        assert_eq!(report.resolutions.len(), 1);
        assert!(world.resource::<EventLedger>().active().is_empty());
        assert!(world.resource::<PhaseState>().pending.recalculate);
        assert!(world.resource::<CommunitySentiment>().value() < 50.0);
        assert!(
            world
                .resource::<StatStore>()
                .get(Archetype::Warrior, StatKind::Popularity)
                .unwrap()
                > 50.0
        );
    }
}
