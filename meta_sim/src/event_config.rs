use std::{
    collections::HashSet,
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    characters::{Archetype, StatKind},
    wallet::ResourceCost,
};

pub const BUILTIN_EVENT_CATALOG: &str = include_str!("data/event_catalog.json");
pub const BUILTIN_EVENT_GENERATION: &str = include_str!("data/event_generation.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Crisis,
    Opportunity,
    Community,
    Technical,
    Competitive,
    /// Only spawned by the weekly season trigger.
    Seasonal,
    /// Only spawned by a burst of major balance changes.
    Reaction,
}

impl EventCategory {
    /// Categories drawn by the scheduled roll, in roll order.
    pub const SCHEDULED: [EventCategory; 5] = [
        EventCategory::Crisis,
        EventCategory::Opportunity,
        EventCategory::Community,
        EventCategory::Technical,
        EventCategory::Competitive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Crisis => "crisis",
            EventCategory::Opportunity => "opportunity",
            EventCategory::Community => "community",
            EventCategory::Technical => "technical",
            EventCategory::Competitive => "competitive",
            EventCategory::Seasonal => "seasonal",
            EventCategory::Reaction => "reaction",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Minor,
    #[default]
    Moderate,
    Major,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelector {
    MostPopular,
    LeastPopular,
    HighestWinRate,
    LowestWinRate,
    All,
}

impl TargetSelector {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetSelector::MostPopular => "most_popular",
            TargetSelector::LeastPopular => "least_popular",
            TargetSelector::HighestWinRate => "highest_win_rate",
            TargetSelector::LowestWinRate => "lowest_win_rate",
            TargetSelector::All => "all",
        }
    }
}

/// Who an effect lands on. Selectors are resolved against current stats at
/// resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EffectTarget {
    Character(Archetype),
    Selector(TargetSelector),
}

impl TryFrom<String> for EffectTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EffectTarget> for String {
    fn from(target: EffectTarget) -> Self {
        target.to_string()
    }
}

impl FromStr for EffectTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let selector = match normalized.as_str() {
            "most_popular" => Some(TargetSelector::MostPopular),
            "least_popular" => Some(TargetSelector::LeastPopular),
            "highest_win_rate" => Some(TargetSelector::HighestWinRate),
            "lowest_win_rate" => Some(TargetSelector::LowestWinRate),
            "all" => Some(TargetSelector::All),
            _ => None,
        };
        if let Some(selector) = selector {
            return Ok(EffectTarget::Selector(selector));
        }
        normalized
            .parse::<Archetype>()
            .map(EffectTarget::Character)
            .map_err(|_| format!("unknown effect target '{value}'"))
    }
}

impl fmt::Display for EffectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectTarget::Character(archetype) => f.write_str(archetype.as_str()),
            EffectTarget::Selector(selector) => f.write_str(selector.as_str()),
        }
    }
}

/// Percentage stat change applied through the stat store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatEffect {
    pub target: EffectTarget,
    pub stat: StatKind,
    pub magnitude: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseOption {
    pub id: String,
    pub label: String,
    pub cost: ResourceCost,
    pub effects: Vec<StatEffect>,
    pub sentiment_delta: f32,
    /// Absent means the response always succeeds.
    pub success_chance: Option<f32>,
    pub success_message: Option<String>,
    pub failure_message: Option<String>,
    pub failure_effects: Vec<StatEffect>,
    pub failure_sentiment_delta: f32,
}

impl ResponseOption {
    pub fn success_chance(&self) -> f32 {
        self.success_chance.unwrap_or(1.0).clamp(0.0, 1.0)
    }

    pub fn is_gamble(&self) -> bool {
        self.success_chance() < 1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub severity: EventSeverity,
    pub time_to_live: f32,
    pub responses: Vec<ResponseOption>,
    /// Applied without cost when the countdown runs out.
    pub expiration_penalty: Option<ResponseOption>,
}

impl Default for EventDefinition {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            category: EventCategory::Community,
            severity: EventSeverity::default(),
            time_to_live: 60.0,
            responses: Vec::new(),
            expiration_penalty: None,
        }
    }
}

impl EventDefinition {
    pub fn response(&self, id: &str) -> Option<&ResponseOption> {
        self.responses
            .iter()
            .find(|response| response.id.eq_ignore_ascii_case(id))
    }

    pub fn normalize(&mut self) {
        self.id.make_ascii_lowercase();
        if self.title.is_empty() {
            self.title = self.id.clone();
        }
        for response in &mut self.responses {
            response.id.make_ascii_lowercase();
            if response.label.is_empty() {
                response.label = response.id.clone();
            }
        }
    }

    pub fn validate(&self) -> Result<(), EventCatalogError> {
        if self.id.is_empty() {
            return Err(EventCatalogError::MissingId);
        }
        let mut seen = HashSet::new();
        for response in &self.responses {
            if !seen.insert(response.id.as_str()) {
                return Err(EventCatalogError::DuplicateResponse {
                    event: self.id.clone(),
                    response: response.id.clone(),
                });
            }
        }
        for response in self.responses.iter().chain(&self.expiration_penalty) {
            if let Some(chance) = response.success_chance {
                if !chance.is_finite() {
                    return Err(EventCatalogError::InvalidSuccessChance {
                        event: self.id.clone(),
                        response: response.id.clone(),
                        value: chance,
                    });
                }
            }
        }
        if !self.time_to_live.is_finite() || self.time_to_live <= 0.0 {
            return Err(EventCatalogError::InvalidTimeToLive {
                id: self.id.clone(),
                value: self.time_to_live,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventCatalog {
    pub version: u32,
    pub events: Vec<EventDefinition>,
}

impl EventCatalog {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_EVENT_CATALOG).expect("builtin event catalog should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, EventCatalogError> {
        let mut catalog: EventCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self, EventCatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| EventCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn definition(&self, id: &str) -> Option<&EventDefinition> {
        let normalized = id.to_ascii_lowercase();
        self.events.iter().find(|event| event.id == normalized)
    }

    pub fn by_category(&self, category: EventCategory) -> impl Iterator<Item = &EventDefinition> {
        self.events
            .iter()
            .filter(move |event| event.category == category)
    }

    fn validate(&mut self) -> Result<(), EventCatalogError> {
        let mut seen = HashSet::new();
        for event in &mut self.events {
            event.normalize();
            event.validate()?;
            if !seen.insert(event.id.clone()) {
                return Err(EventCatalogError::Duplicate {
                    id: event.id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EventCatalogError {
    #[error("failed to parse event catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read event catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate event id {id}")]
    Duplicate { id: String },
    #[error("event {event} declares response {response} twice")]
    DuplicateResponse { event: String, response: String },
    #[error("event definition is missing an id")]
    MissingId,
    #[error("event {id} has invalid time to live {value}")]
    InvalidTimeToLive { id: String, value: f32 },
    #[error("event {event} response {response} has invalid success chance {value}")]
    InvalidSuccessChance {
        event: String,
        response: String,
        value: f32,
    },
}

/// Scheduled-roll weights. They need not sum to 1; the remainder selects
/// [`EventGenerationConfig::fallback_category`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub crisis: f32,
    pub opportunity: f32,
    pub community: f32,
    pub technical: f32,
    pub competitive: f32,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            crisis: 0.25,
            opportunity: 0.25,
            community: 0.2,
            technical: 0.15,
            competitive: 0.1,
        }
    }
}

impl CategoryWeights {
    pub fn weight(&self, category: EventCategory) -> f32 {
        match category {
            EventCategory::Crisis => self.crisis,
            EventCategory::Opportunity => self.opportunity,
            EventCategory::Community => self.community,
            EventCategory::Technical => self.technical,
            EventCategory::Competitive => self.competitive,
            EventCategory::Seasonal | EventCategory::Reaction => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventGenerationConfig {
    pub min_events_per_phase: u32,
    pub max_events_per_phase: u32,
    pub continuous: bool,
    pub min_time_between_events: f32,
    pub max_time_between_events: f32,
    pub trigger_chance: f32,
    pub max_simultaneous_events: usize,
    pub category_weights: CategoryWeights,
    pub fallback_category: EventCategory,
    pub low_sentiment_threshold: f32,
    pub high_sentiment_threshold: f32,
    pub crisis_boost_per_point: f32,
    pub opportunity_boost_per_point: f32,
    pub major_change_threshold: f32,
    pub major_change_window: f32,
    pub major_change_burst: usize,
    pub season_interval: u32,
    pub sentiment_blend: f32,
    pub feedback_item_delay: f32,
    pub feedback_sentiment_drift: f32,
    pub history_limit: usize,
}

impl Default for EventGenerationConfig {
    fn default() -> Self {
        Self {
            min_events_per_phase: 1,
            max_events_per_phase: 2,
            continuous: false,
            min_time_between_events: 30.0,
            max_time_between_events: 90.0,
            trigger_chance: 0.35,
            max_simultaneous_events: 3,
            category_weights: CategoryWeights::default(),
            fallback_category: EventCategory::Community,
            low_sentiment_threshold: 30.0,
            high_sentiment_threshold: 70.0,
            crisis_boost_per_point: 0.01,
            opportunity_boost_per_point: 0.01,
            major_change_threshold: 15.0,
            major_change_window: 60.0,
            major_change_burst: 3,
            season_interval: 5,
            sentiment_blend: 0.6,
            feedback_item_delay: 1.5,
            feedback_sentiment_drift: 0.1,
            history_limit: 64,
        }
    }
}

impl EventGenerationConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_EVENT_GENERATION)
                .expect("builtin event generation config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, EventCatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, EventCatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| EventCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Inclusive per-phase spawn range with the bounds put in order.
    pub fn events_per_phase(&self) -> (u32, u32) {
        let low = self.min_events_per_phase.min(self.max_events_per_phase);
        let high = self.min_events_per_phase.max(self.max_events_per_phase);
        (low, high)
    }

    pub fn interval_bounds(&self) -> (f32, f32) {
        let low = self.min_time_between_events.max(0.0);
        let high = self.max_time_between_events.max(low);
        (low, high)
    }

    /// True when the weekly season trigger fires for `week`.
    pub fn is_season_week(&self, week: u32) -> bool {
        self.season_interval > 0 && week > 0 && week % self.season_interval == 0
    }
}

#[derive(Resource, Debug, Clone)]
pub struct EventCatalogHandle(pub Arc<EventCatalog>);

impl EventCatalogHandle {
    pub fn new(catalog: Arc<EventCatalog>) -> Self {
        Self(catalog)
    }

    pub fn get(&self) -> Arc<EventCatalog> {
        Arc::clone(&self.0)
    }
}

#[derive(Resource, Debug, Clone)]
pub struct EventGenerationHandle(pub Arc<EventGenerationConfig>);

impl EventGenerationHandle {
    pub fn new(config: Arc<EventGenerationConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<EventGenerationConfig> {
        Arc::clone(&self.0)
    }
}
