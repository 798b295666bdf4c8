use bevy::{ecs::system::SystemState, prelude::*};
use tracing::{info, warn};

use crate::{
    balance_config::BalanceSettingsHandle,
    build_headless_app, run_update,
    characters::{Archetype, StatKind},
    config::MetaSimulationConfig,
    error::MetaError,
    event_config::{EventCatalogHandle, EventDefinition, EventGenerationHandle},
    events::{
        ActiveEvent, EventContext, EventInstanceId, EventLedger, EventResolution, EventScheduler,
        MajorChangeTracker,
    },
    feedback::FeedbackQueue,
    matchup::MatchupMatrix,
    meta_health::MetaHealthScore,
    phase::{GamePhase, PhaseState},
    popularity::PopularityTrends,
    rng::SimulationRng,
    sentiment::CommunitySentiment,
    stats::{StatChange, StatModifier, StatStore},
    systems::CycleReport,
    wallet::{PlayerResources, ResourceCost, ResourceWallet},
    win_rate::WinRateReport,
};

type EventParams<'w> = (
    ResMut<'w, EventLedger>,
    ResMut<'w, StatStore>,
    ResMut<'w, CommunitySentiment>,
    ResMut<'w, PlayerResources>,
    ResMut<'w, SimulationRng>,
    Res<'w, PhaseState>,
);

/// Composition root and call-level interface of the simulation.
///
/// Every operation takes `&mut self`, so a recalculation and an event
/// resolution can never interleave. Work bound to phases and time runs in
/// the app schedule on the next update.
pub struct MetaSimulation {
    app: App,
}

impl MetaSimulation {
    pub fn new(config: MetaSimulationConfig) -> Self {
        Self {
            app: build_headless_app(&config),
        }
    }

    pub fn builtin() -> Self {
        Self::new(MetaSimulationConfig::builtin())
    }

    pub fn from_env() -> Self {
        Self::new(MetaSimulationConfig::from_env())
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn world(&self) -> &World {
        &self.app.world
    }

    pub fn week(&self) -> u32 {
        self.world().resource::<PhaseState>().week()
    }

    pub fn phase(&self) -> GamePhase {
        self.world().resource::<PhaseState>().phase()
    }

    pub fn cycle(&self) -> u64 {
        self.world().resource::<PhaseState>().cycle()
    }

    /// Enters `phase`. Planning recalculates win rates, Feedback evolves
    /// popularity and queues reactions, Event rolls new events.
    pub fn advance_phase(&mut self, phase: GamePhase) -> CycleReport {
        self.app.world.resource_mut::<PhaseState>().enter(phase);
        info!(
            target: "meta_sim::phase",
            phase = %phase,
            week = self.week(),
            "phase.entered"
        );
        self.run_schedule()
    }

    /// Starts the next week; every `season_interval` weeks a seasonal event
    /// is queued.
    pub fn advance_week(&mut self) -> CycleReport {
        let generation = self.app.world.resource::<EventGenerationHandle>().get();
        let elapsed = self.app.world.resource::<PhaseState>().elapsed();
        let week = {
            let mut phase = self.app.world.resource_mut::<PhaseState>();
            let week = phase.advance_week();
            if generation.is_season_week(week) {
                phase.pending.seasonal_event = true;
            }
            week
        };
        self.app
            .world
            .resource_mut::<StatStore>()
            .set_stamp(week, elapsed);
        info!(target: "meta_sim::phase", week, "week.advanced");
        self.run_schedule()
    }

    /// Applies `value += value * percent / 100`. Changes to anything but win
    /// rate trigger a recalculation; large changes feed the reaction tracker.
    pub fn modify_stat(
        &mut self,
        character: Archetype,
        stat: StatKind,
        percent: f32,
    ) -> Result<StatChange, MetaError> {
        let change = self
            .app
            .world
            .resource_mut::<StatStore>()
            .modify_by_percent(character, stat, percent)?;
        let burst = self.track_major_change(percent);
        if change.stat != StatKind::WinRate {
            self.request_recalculation();
        } else if burst {
            self.run_schedule();
        }
        Ok(change)
    }

    pub fn set_stat(
        &mut self,
        character: Archetype,
        stat: StatKind,
        value: f32,
    ) -> Result<StatChange, MetaError> {
        let change = self
            .app
            .world
            .resource_mut::<StatStore>()
            .set(character, stat, value)?;
        self.after_player_change(change);
        Ok(change)
    }

    pub fn get_stat(&self, character: Archetype, stat: StatKind) -> Result<f32, MetaError> {
        self.world().resource::<StatStore>().get(character, stat)
    }

    /// Name-keyed variant for hosts that speak strings.
    pub fn modify_stat_by_name(
        &mut self,
        character: &str,
        stat: &str,
        percent: f32,
    ) -> Result<StatChange, MetaError> {
        let (character, stat) = parse_keys(character, stat)?;
        self.modify_stat(character, stat, percent)
    }

    pub fn get_stat_by_name(&self, character: &str, stat: &str) -> Result<f32, MetaError> {
        let (character, stat) = parse_keys(character, stat)?;
        self.get_stat(character, stat)
    }

    pub fn undo_last_modifier(
        &mut self,
        character: Archetype,
    ) -> Result<Option<StatModifier>, MetaError> {
        let undone = self
            .app
            .world
            .resource_mut::<StatStore>()
            .undo_last_modifier(character)?;
        if let Some(modifier) = &undone {
            if modifier.stat != StatKind::WinRate {
                self.request_recalculation();
            }
        }
        Ok(undone)
    }

    /// Restores base stats and rewinds every input of the recalculation, so
    /// the next cycle replays the first one.
    pub fn reset_all_characters(&mut self) {
        let world = &mut self.app.world;
        world.resource_mut::<StatStore>().reset_all();
        let trends = PopularityTrends::seeded(world.resource::<StatStore>());
        world.insert_resource(trends);
        world.resource_mut::<MatchupMatrix>().reset();
        world.insert_resource(WinRateReport::default());
        world.resource_mut::<MajorChangeTracker>().clear();
        world.resource_mut::<EventScheduler>().reset();
        world.resource_mut::<PhaseState>().reset_cycle();
        world.resource_mut::<SimulationRng>().reseed();
        info!(target: "meta_sim::stats", "characters.reset");
    }

    pub fn recalculate_win_rates(&mut self) -> WinRateReport {
        self.app.world.resource_mut::<PhaseState>().pending.recalculate = true;
        self.run_schedule();
        self.world().resource::<WinRateReport>().clone()
    }

    pub fn win_rate_report(&self) -> &WinRateReport {
        self.world().resource::<WinRateReport>()
    }

    /// Spawns an event from a host-supplied definition. Explicit triggers
    /// bypass the simultaneous-event cap.
    pub fn trigger_event(
        &mut self,
        mut definition: EventDefinition,
    ) -> Result<EventInstanceId, MetaError> {
        definition.normalize();
        definition
            .validate()
            .map_err(|err| MetaError::ConfigurationInvariantViolated(err.to_string()))?;
        let phase = self.world().resource::<PhaseState>();
        let (week, now) = (phase.week(), phase.elapsed());
        Ok(self
            .app
            .world
            .resource_mut::<EventLedger>()
            .spawn(definition, week, now))
    }

    pub fn trigger_catalog_event(&mut self, id: &str) -> Result<EventInstanceId, MetaError> {
        let catalog = self.world().resource::<EventCatalogHandle>().get();
        let definition = catalog
            .definition(id)
            .cloned()
            .ok_or_else(|| MetaError::UnknownEventDefinition(id.to_string()))?;
        self.trigger_event(definition)
    }

    pub fn mark_event_displayed(&mut self, id: EventInstanceId) -> Result<(), MetaError> {
        self.app
            .world
            .resource_mut::<EventLedger>()
            .mark_displayed(id)
    }

    pub fn resolve_event(
        &mut self,
        id: EventInstanceId,
        response: &str,
    ) -> Result<EventResolution, MetaError> {
        let resolution = self.with_event_context(|ledger, ctx| ledger.resolve(id, response, ctx))?;
        if resolution.touched_base_stats() {
            self.request_recalculation();
        }
        Ok(resolution)
    }

    /// Expires an open event through the same path as a timed-out countdown.
    pub fn force_expire_event(
        &mut self,
        id: EventInstanceId,
    ) -> Result<EventResolution, MetaError> {
        let resolution = self.with_event_context(|ledger, ctx| ledger.expire(id, ctx))?;
        if resolution.touched_base_stats() {
            self.request_recalculation();
        }
        Ok(resolution)
    }

    pub fn clear_active_events(&mut self) -> Vec<EventResolution> {
        let resolutions = self.with_event_context(|ledger, ctx| ledger.clear_all(ctx));
        if resolutions.iter().any(EventResolution::touched_base_stats) {
            self.request_recalculation();
        }
        resolutions
    }

    pub fn active_events(&self) -> &[ActiveEvent] {
        self.world().resource::<EventLedger>().active()
    }

    pub fn event_history(&self) -> impl Iterator<Item = &EventResolution> {
        self.world().resource::<EventLedger>().history()
    }

    pub fn community_sentiment(&self) -> f32 {
        self.world().resource::<CommunitySentiment>().value()
    }

    /// Scored against the current stats, not the last schedule run.
    pub fn meta_health(&self) -> MetaHealthScore {
        let settings = self.world().resource::<BalanceSettingsHandle>().get();
        MetaHealthScore::compute(self.world().resource::<StatStore>(), &settings)
    }

    /// Advances event countdowns, continuous generation and the feedback
    /// queue by `dt`.
    pub fn advance_time(&mut self, dt: f32) -> CycleReport {
        self.app.world.resource_mut::<PhaseState>().queue_time(dt);
        self.run_schedule()
    }

    pub fn available_resources(&self) -> ResourceCost {
        self.world().resource::<PlayerResources>().wallet().available()
    }

    pub fn set_wallet(&mut self, wallet: impl ResourceWallet + 'static) {
        self.app
            .world
            .resource_mut::<PlayerResources>()
            .replace(Box::new(wallet));
    }

    pub fn stat_store(&self) -> &StatStore {
        self.world().resource::<StatStore>()
    }

    pub fn pending_feedback(&self) -> usize {
        self.world().resource::<FeedbackQueue>().len()
    }

    fn after_player_change(&mut self, change: StatChange) {
        if change.stat != StatKind::WinRate {
            self.request_recalculation();
        }
    }

    /// Returns true when the change completes a burst and a reaction event
    /// is queued.
    fn track_major_change(&mut self, percent: f32) -> bool {
        let generation = self.world().resource::<EventGenerationHandle>().get();
        let now = self.world().resource::<PhaseState>().elapsed();
        let burst = self
            .app
            .world
            .resource_mut::<MajorChangeTracker>()
            .record(percent, now, &generation);
        if burst {
            info!(target: "meta_sim::events", percent, "event.reaction.burst_detected");
            self.app
                .world
                .resource_mut::<PhaseState>()
                .pending
                .reaction_event = true;
        }
        burst
    }

    fn request_recalculation(&mut self) {
        self.app.world.resource_mut::<PhaseState>().pending.recalculate = true;
        self.run_schedule();
    }

    fn run_schedule(&mut self) -> CycleReport {
        run_update(&mut self.app);
        std::mem::take(&mut *self.app.world.resource_mut::<CycleReport>())
    }

    fn with_event_context<T>(
        &mut self,
        f: impl FnOnce(&mut EventLedger, &mut EventContext<'_>) -> T,
    ) -> T {
        let mut state: SystemState<EventParams<'static>> = SystemState::new(&mut self.app.world);
        let (mut ledger, mut store, mut sentiment, mut resources, mut rng, phase) =
            state.get_mut(&mut self.app.world);
        let mut ctx = EventContext {
            store: &mut *store,
            sentiment: &mut *sentiment,
            wallet: resources.wallet_mut(),
            rng: &mut *rng,
            week: phase.week(),
        };
        f(&mut *ledger, &mut ctx)
    }
}

impl Default for MetaSimulation {
    fn default() -> Self {
        Self::builtin()
    }
}

fn parse_keys(character: &str, stat: &str) -> Result<(Archetype, StatKind), MetaError> {
    let archetype = character.parse::<Archetype>().map_err(|_| {
        warn!(target: "meta_sim::stats", character, "stat.lookup.unknown_character");
        MetaError::InvalidCharacter(character.to_string())
    })?;
    let stat = stat
        .parse::<StatKind>()
        .map_err(|_| MetaError::InvalidStat(stat.to_string()))?;
    Ok((archetype, stat))
}
