use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
};

use bevy::prelude::Resource;
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    characters::{Archetype, StatKind},
    error::MetaError,
    event_config::{
        EffectTarget, EventCatalog, EventCategory, EventDefinition, EventGenerationConfig,
        ResponseOption, StatEffect, TargetSelector,
    },
    rng::SimulationRng,
    sentiment::CommunitySentiment,
    stats::{StatChange, StatStore},
    wallet::{ResourceCost, ResourceWallet},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventInstanceId(pub u64);

impl fmt::Display for EventInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Pending,
    Displayed,
    Resolved,
    Expired,
}

impl EventState {
    pub fn is_open(self) -> bool {
        matches!(self, EventState::Pending | EventState::Displayed)
    }
}

/// Live instance of an event definition with its countdown.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveEvent {
    pub id: EventInstanceId,
    pub definition: EventDefinition,
    pub state: EventState,
    pub time_remaining: f32,
    pub week: u32,
    pub spawned_at: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Success,
    Failure,
    Expired,
}

/// Record of how an event left the active set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResolution {
    pub id: EventInstanceId,
    pub definition_id: String,
    pub category: EventCategory,
    pub response_id: String,
    pub outcome: ResolutionOutcome,
    pub cost: ResourceCost,
    pub changes: Vec<StatChange>,
    pub sentiment_before: f32,
    pub sentiment_after: f32,
    pub message: Option<String>,
    pub week: u32,
}

impl EventResolution {
    /// True when any stat other than win rate moved.
    pub fn touched_base_stats(&self) -> bool {
        self.changes
            .iter()
            .any(|change| change.stat != StatKind::WinRate && change.delta() != 0.0)
    }
}

/// Mutable state an event response writes into.
pub struct EventContext<'a> {
    pub store: &'a mut StatStore,
    pub sentiment: &'a mut CommunitySentiment,
    pub wallet: &'a mut dyn ResourceWallet,
    pub rng: &'a mut SimulationRng,
    pub week: u32,
}

/// Open events plus a bounded record of how past events ended.
#[derive(Resource, Debug, Clone)]
pub struct EventLedger {
    active: Vec<ActiveEvent>,
    history: VecDeque<EventResolution>,
    retired: BTreeMap<EventInstanceId, EventState>,
    history_limit: usize,
    next_id: u64,
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::with_history_limit(64)
    }
}

impl EventLedger {
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            active: Vec::new(),
            history: VecDeque::new(),
            retired: BTreeMap::new(),
            history_limit: history_limit.max(1),
            next_id: 1,
        }
    }

    pub fn active(&self) -> &[ActiveEvent] {
        &self.active
    }

    pub fn open_count(&self) -> usize {
        self.active.len()
    }

    pub fn get(&self, id: EventInstanceId) -> Option<&ActiveEvent> {
        self.active.iter().find(|event| event.id == id)
    }

    /// State of an event whether it is still open or already retired.
    pub fn state(&self, id: EventInstanceId) -> Option<EventState> {
        self.get(id)
            .map(|event| event.state)
            .or_else(|| self.retired.get(&id).copied())
    }

    pub fn history(&self) -> impl Iterator<Item = &EventResolution> {
        self.history.iter()
    }

    pub fn spawn(&mut self, definition: EventDefinition, week: u32, now: f32) -> EventInstanceId {
        let id = EventInstanceId(self.next_id);
        self.next_id += 1;
        info!(
            target: "meta_sim::events",
            id = %id,
            definition = %definition.id,
            category = %definition.category,
            ttl = definition.time_to_live,
            "event.spawned"
        );
        self.active.push(ActiveEvent {
            id,
            time_remaining: definition.time_to_live,
            definition,
            state: EventState::Pending,
            week,
            spawned_at: now,
        });
        id
    }

    pub fn mark_displayed(&mut self, id: EventInstanceId) -> Result<(), MetaError> {
        let index = self.lookup(id)?;
        let event = &mut self.active[index];
        if event.state == EventState::Pending {
            event.state = EventState::Displayed;
        }
        Ok(())
    }

    /// Applies a player response. Validation and affordability are checked
    /// before anything is written, so a failed call changes nothing.
    pub fn resolve(
        &mut self,
        id: EventInstanceId,
        response_id: &str,
        ctx: &mut EventContext<'_>,
    ) -> Result<EventResolution, MetaError> {
        let index = self.lookup(id)?;
        let response = self.active[index]
            .definition
            .response(response_id)
            .cloned()
            .ok_or_else(|| MetaError::ResponseNotFound {
                event: id,
                response: response_id.to_string(),
            })?;

        if !ctx.wallet.can_spend(&response.cost) {
            warn!(
                target: "meta_sim::events",
                id = %id,
                response = %response.id,
                cost = %response.cost,
                available = %ctx.wallet.available(),
                "event.resolve.unaffordable"
            );
            return Err(MetaError::InsufficientResources {
                required: response.cost,
                available: ctx.wallet.available(),
            });
        }
        ctx.wallet.spend(&response.cost)?;

        let success = !response.is_gamble() || ctx.rng.gen::<f32>() < response.success_chance();
        let (effects, sentiment_delta, message, outcome) = if success {
            (
                &response.effects,
                response.sentiment_delta,
                response.success_message.clone(),
                ResolutionOutcome::Success,
            )
        } else {
            (
                &response.failure_effects,
                response.failure_sentiment_delta,
                response.failure_message.clone(),
                ResolutionOutcome::Failure,
            )
        };

        let resolution = self.apply_outcome(
            index,
            &response,
            effects,
            sentiment_delta,
            message,
            outcome,
            ctx,
        );
        info!(
            target: "meta_sim::events",
            id = %id,
            response = %resolution.response_id,
            outcome = ?resolution.outcome,
            sentiment = resolution.sentiment_after,
            "event.resolved"
        );
        Ok(resolution)
    }

    /// Expires an open event, applying its penalty once and without cost.
    pub fn expire(
        &mut self,
        id: EventInstanceId,
        ctx: &mut EventContext<'_>,
    ) -> Result<EventResolution, MetaError> {
        let index = self.lookup(id)?;
        let mut penalty = self.active[index]
            .definition
            .expiration_penalty
            .clone()
            .unwrap_or_else(|| ResponseOption {
                id: "expired".to_string(),
                ..ResponseOption::default()
            });
        penalty.cost = ResourceCost::FREE;
        let resolution = self.apply_outcome(
            index,
            &penalty,
            &penalty.effects,
            penalty.sentiment_delta,
            penalty.success_message.clone(),
            ResolutionOutcome::Expired,
            ctx,
        );
        info!(
            target: "meta_sim::events",
            id = %id,
            penalty = %resolution.response_id,
            sentiment = resolution.sentiment_after,
            "event.expired"
        );
        Ok(resolution)
    }

    /// Counts every open event down and expires those that reach zero.
    pub fn tick(&mut self, dt: f32, ctx: &mut EventContext<'_>) -> Vec<EventResolution> {
        let dt = dt.max(0.0);
        let mut due = Vec::new();
        for event in &mut self.active {
            event.time_remaining -= dt;
            if event.time_remaining <= 0.0 {
                due.push(event.id);
            }
        }
        due.into_iter()
            .filter_map(|id| self.expire(id, ctx).ok())
            .collect()
    }

    /// Expires every open event through the regular expiration path.
    pub fn clear_all(&mut self, ctx: &mut EventContext<'_>) -> Vec<EventResolution> {
        let ids: Vec<_> = self.active.iter().map(|event| event.id).collect();
        ids.into_iter()
            .filter_map(|id| self.expire(id, ctx).ok())
            .collect()
    }

    fn lookup(&self, id: EventInstanceId) -> Result<usize, MetaError> {
        if let Some(index) = self.active.iter().position(|event| event.id == id) {
            return Ok(index);
        }
        match self.retired.get(&id) {
            Some(state) => Err(MetaError::EventAlreadyResolved { id, state: *state }),
            None => Err(MetaError::EventNotFound(id)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_outcome(
        &mut self,
        index: usize,
        response: &ResponseOption,
        effects: &[StatEffect],
        sentiment_delta: f32,
        message: Option<String>,
        outcome: ResolutionOutcome,
        ctx: &mut EventContext<'_>,
    ) -> EventResolution {
        let event = self.active.remove(index);
        let changes = apply_effects(effects, ctx.store);
        let sentiment_before = ctx.sentiment.value();
        let sentiment_after = ctx.sentiment.apply_event_delta(sentiment_delta);
        let state = if outcome == ResolutionOutcome::Expired {
            EventState::Expired
        } else {
            EventState::Resolved
        };
        self.retired.insert(event.id, state);

        let resolution = EventResolution {
            id: event.id,
            definition_id: event.definition.id,
            category: event.definition.category,
            response_id: response.id.clone(),
            outcome,
            cost: response.cost,
            changes,
            sentiment_before,
            sentiment_after,
            message,
            week: ctx.week,
        };
        if self.history.len() >= self.history_limit {
            if let Some(dropped) = self.history.pop_front() {
                self.retired.remove(&dropped.id);
            }
        }
        self.history.push_back(resolution.clone());
        resolution
    }
}

/// Characters an effect target names, given current stats.
pub fn resolve_targets(target: EffectTarget, store: &StatStore) -> Vec<Archetype> {
    let pick = |stat: StatKind, highest: bool| {
        store
            .tables()
            .map(|(archetype, table)| (archetype, table.get(stat)))
            .fold(None, |best: Option<(Archetype, f32)>, candidate| match best {
                Some((_, value)) if (highest && value >= candidate.1)
                    || (!highest && value <= candidate.1) =>
                {
                    best
                }
                _ => Some(candidate),
            })
            .map(|(archetype, _)| vec![archetype])
            .unwrap_or_default()
    };
    match target {
        EffectTarget::Character(archetype) => vec![archetype],
        EffectTarget::Selector(TargetSelector::MostPopular) => pick(StatKind::Popularity, true),
        EffectTarget::Selector(TargetSelector::LeastPopular) => pick(StatKind::Popularity, false),
        EffectTarget::Selector(TargetSelector::HighestWinRate) => pick(StatKind::WinRate, true),
        EffectTarget::Selector(TargetSelector::LowestWinRate) => pick(StatKind::WinRate, false),
        EffectTarget::Selector(TargetSelector::All) => store.roster(),
    }
}

/// Applies percentage effects through the store; targets missing from the
/// roster are skipped.
pub fn apply_effects(effects: &[StatEffect], store: &mut StatStore) -> Vec<StatChange> {
    let mut changes = Vec::new();
    for effect in effects {
        for character in resolve_targets(effect.target, store) {
            match store.modify_by_percent(character, effect.stat, effect.magnitude) {
                Ok(change) => changes.push(change),
                Err(err) => warn!(
                    target: "meta_sim::events",
                    target_character = %character,
                    error = %err,
                    "event.effect.skipped"
                ),
            }
        }
    }
    changes
}

/// Scheduled-roll weights after sentiment boosts, in roll order.
pub fn category_weights(
    config: &EventGenerationConfig,
    sentiment: f32,
) -> [(EventCategory, f32); 5] {
    let mut weights = EventCategory::SCHEDULED
        .map(|category| (category, config.category_weights.weight(category).max(0.0)));
    if sentiment < config.low_sentiment_threshold {
        weights[0].1 +=
            (config.low_sentiment_threshold - sentiment) * config.crisis_boost_per_point;
    }
    if sentiment > config.high_sentiment_threshold {
        weights[1].1 +=
            (sentiment - config.high_sentiment_threshold) * config.opportunity_boost_per_point;
    }
    weights
}

/// Walks the weights in fixed order; an unclaimed roll selects the fallback
/// category rather than renormalizing.
pub fn roll_category<R: Rng + ?Sized>(
    config: &EventGenerationConfig,
    sentiment: f32,
    rng: &mut R,
) -> EventCategory {
    let roll: f32 = rng.gen();
    let mut cumulative = 0.0;
    for (category, weight) in category_weights(config, sentiment) {
        cumulative += weight;
        if roll < cumulative {
            return category;
        }
    }
    config.fallback_category
}

pub fn pick_definition<'c, R: Rng + ?Sized>(
    catalog: &'c EventCatalog,
    category: EventCategory,
    rng: &mut R,
) -> Option<&'c EventDefinition> {
    let pool: Vec<&EventDefinition> = catalog.by_category(category).collect();
    pool.choose(rng).copied()
}

/// Spawns one event from `category`, honouring the simultaneous cap.
#[allow(clippy::too_many_arguments)]
pub fn spawn_from_category<R: Rng + ?Sized>(
    ledger: &mut EventLedger,
    catalog: &EventCatalog,
    config: &EventGenerationConfig,
    category: EventCategory,
    rng: &mut R,
    week: u32,
    now: f32,
) -> Option<EventInstanceId> {
    if ledger.open_count() >= config.max_simultaneous_events {
        info!(
            target: "meta_sim::events",
            category = %category,
            open = ledger.open_count(),
            "event.spawn.skipped_at_capacity"
        );
        return None;
    }
    let Some(definition) = pick_definition(catalog, category, rng) else {
        warn!(
            target: "meta_sim::events",
            category = %category,
            "event.spawn.empty_pool"
        );
        return None;
    };
    Some(ledger.spawn(definition.clone(), week, now))
}

/// Turn-based generation on entering the event phase.
#[allow(clippy::too_many_arguments)]
pub fn generate_phase_events<R: Rng + ?Sized>(
    ledger: &mut EventLedger,
    catalog: &EventCatalog,
    config: &EventGenerationConfig,
    sentiment: f32,
    rng: &mut R,
    week: u32,
    now: f32,
) -> Vec<EventInstanceId> {
    let (low, high) = config.events_per_phase();
    let count = rng.gen_range(low..=high);
    let mut spawned = Vec::new();
    for _ in 0..count {
        if ledger.open_count() >= config.max_simultaneous_events {
            break;
        }
        let category = roll_category(config, sentiment, rng);
        if let Some(id) = spawn_from_category(ledger, catalog, config, category, rng, week, now) {
            spawned.push(id);
        }
    }
    spawned
}

/// Timestamps of recent major balance changes.
#[derive(Resource, Debug, Clone, Default)]
pub struct MajorChangeTracker {
    changes: VecDeque<f32>,
}

impl MajorChangeTracker {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Records a change of `percent` at `now`. Returns true when the burst
    /// size is reached inside the window; the tracker is then cleared.
    pub fn record(&mut self, percent: f32, now: f32, config: &EventGenerationConfig) -> bool {
        if percent.abs() < config.major_change_threshold {
            return false;
        }
        self.changes.push_back(now);
        while let Some(&oldest) = self.changes.front() {
            if now - oldest > config.major_change_window {
                self.changes.pop_front();
            } else {
                break;
            }
        }
        if self.changes.len() >= config.major_change_burst.max(1) {
            self.changes.clear();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

/// Countdown for continuous-mode trigger rolls.
#[derive(Resource, Debug, Clone, Default)]
pub struct EventScheduler {
    countdown: Option<f32>,
}

impl EventScheduler {
    /// Advances the countdown; returns true when a roll fires and succeeds.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        config: &EventGenerationConfig,
        rng: &mut R,
    ) -> bool {
        if !config.continuous {
            return false;
        }
        let remaining = self
            .countdown
            .get_or_insert_with(|| sample_interval(config, rng));
        *remaining -= dt.max(0.0);
        if *remaining > 0.0 {
            return false;
        }
        self.countdown = Some(sample_interval(config, rng));
        rng.gen::<f32>() < config.trigger_chance
    }

    pub fn reset(&mut self) {
        self.countdown = None;
    }
}

fn sample_interval<R: Rng + ?Sized>(config: &EventGenerationConfig, rng: &mut R) -> f32 {
    let (low, high) = config.interval_bounds();
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}
