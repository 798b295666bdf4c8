use std::collections::VecDeque;

use bevy::prelude::Resource;
use serde::Serialize;

use crate::{
    balance_config::BalanceCalculationSettings,
    characters::{Archetype, StatKind},
    stats::StatStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackTone {
    Overpowered,
    Underpowered,
    Overplayed,
    Overlooked,
    Satisfied,
}

impl FeedbackTone {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackTone::Overpowered => "overpowered",
            FeedbackTone::Underpowered => "underpowered",
            FeedbackTone::Overplayed => "overplayed",
            FeedbackTone::Overlooked => "overlooked",
            FeedbackTone::Satisfied => "satisfied",
        }
    }
}

/// Community reaction to one character, shown after `delay` elapses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackItem {
    pub character: Archetype,
    pub name: String,
    pub tone: FeedbackTone,
    pub message: String,
    pub delay: f32,
}

/// Win rate outside the ideal band dominates the tone, popularity
/// outside its thresholds comes second.
pub fn feedback_tone(
    win_rate: f32,
    popularity: f32,
    settings: &BalanceCalculationSettings,
) -> FeedbackTone {
    if win_rate > 50.0 + settings.ideal_win_rate_range {
        FeedbackTone::Overpowered
    } else if win_rate < 50.0 - settings.ideal_win_rate_range {
        FeedbackTone::Underpowered
    } else if popularity > settings.high_popularity_threshold {
        FeedbackTone::Overplayed
    } else if popularity < settings.low_popularity_threshold {
        FeedbackTone::Overlooked
    } else {
        FeedbackTone::Satisfied
    }
}

pub fn compose_feedback(
    store: &StatStore,
    settings: &BalanceCalculationSettings,
    delay: f32,
) -> Vec<FeedbackItem> {
    store
        .roster()
        .into_iter()
        .filter_map(|archetype| {
            let record = store.record(archetype).ok()?;
            let win_rate = record.stats.get(StatKind::WinRate);
            let popularity = record.stats.get(StatKind::Popularity);
            let tone = feedback_tone(win_rate, popularity, settings);
            let message = match tone {
                FeedbackTone::Overpowered => {
                    format!("{} is winning {win_rate:.1}% of games. Nerf when?", record.name)
                }
                FeedbackTone::Underpowered => {
                    format!("{} feels unplayable at {win_rate:.1}%.", record.name)
                }
                FeedbackTone::Overplayed => {
                    format!("Every lobby has a {}. {popularity:.0}% pick rate.", record.name)
                }
                FeedbackTone::Overlooked => {
                    format!("Nobody plays {} anymore.", record.name)
                }
                FeedbackTone::Satisfied => format!("{} feels fair right now.", record.name),
            };
            Some(FeedbackItem {
                character: archetype,
                name: record.name.clone(),
                tone,
                message,
                delay: delay.max(0.0),
            })
        })
        .collect()
}

/// Items waiting to be shown one at a time.
#[derive(Resource, Debug, Clone, Default)]
pub struct FeedbackQueue {
    items: VecDeque<FeedbackItem>,
    waited: f32,
}

impl FeedbackQueue {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = FeedbackItem>) {
        self.items.extend(items);
    }

    /// Emits at most one item, once the head has waited its delay.
    pub fn tick(&mut self, dt: f32) -> Option<FeedbackItem> {
        let delay = self.items.front()?.delay;
        self.waited += dt.max(0.0);
        if self.waited < delay {
            return None;
        }
        self.waited = 0.0;
        self.items.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::BaseStats;

    fn item(character: Archetype, delay: f32) -> FeedbackItem {
        FeedbackItem {
            character,
            name: character.to_string(),
            tone: FeedbackTone::Satisfied,
            message: String::new(),
            delay,
        }
    }

    #[test]
    fn queue_emits_one_item_per_elapsed_delay() {
        let mut queue = FeedbackQueue::default();
        queue.extend([item(Archetype::Mage, 1.0), item(Archetype::Tank, 1.0)]);
        assert!(queue.tick(0.5).is_none());
        assert_eq!(queue.tick(0.5).unwrap().character, Archetype::Mage);
        // a large step still releases a single item
        assert_eq!(queue.tick(10.0).unwrap().character, Archetype::Tank);
        assert!(queue.tick(10.0).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn tone_prefers_win_rate_signal() {
        let settings = BalanceCalculationSettings::default();
        assert_eq!(feedback_tone(60.0, 90.0, &settings), FeedbackTone::Overpowered);
        assert_eq!(feedback_tone(50.0, 90.0, &settings), FeedbackTone::Overplayed);
        assert_eq!(feedback_tone(44.0, 10.0, &settings), FeedbackTone::Underpowered);
        assert_eq!(feedback_tone(50.0, 10.0, &settings), FeedbackTone::Overlooked);
        assert_eq!(feedback_tone(52.0, 50.0, &settings), FeedbackTone::Satisfied);
    }

    #[test]
    fn compose_covers_roster_in_order() {
        let mut store = StatStore::default();
        store.insert(Archetype::Tank, "Gorm", BaseStats::default());
        store.insert(Archetype::Warrior, "Brakka", BaseStats::default());
        let items = compose_feedback(&store, &BalanceCalculationSettings::default(), 2.0);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Brakka");
        assert_eq!(items[1].message, "Gorm feels fair right now.");
    }
}
