use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::Resource;
use serde::Serialize;
use tracing::debug;

use crate::{
    characters::{Archetype, BaseStats, StatKind, STAT_COUNT},
    error::MetaError,
    roster_config::CharacterRosterConfig,
};

const MODIFIER_HISTORY_LIMIT: usize = 512;

/// Clamped stat values for one character.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatTable {
    values: [f32; STAT_COUNT],
}

impl StatTable {
    pub fn from_base(base: &BaseStats) -> Self {
        let mut table = Self {
            values: [0.0; STAT_COUNT],
        };
        for stat in StatKind::ALL {
            table.set(stat, base.value(stat));
        }
        table
    }

    #[inline]
    pub fn get(&self, stat: StatKind) -> f32 {
        self.values[stat.index()]
    }

    /// Stores the clamped value and returns what was stored.
    pub fn set(&mut self, stat: StatKind, value: f32) -> f32 {
        let clamped = stat.clamp(value);
        self.values[stat.index()] = clamped;
        clamped
    }

    /// Health, damage, speed, utility in that order.
    pub fn combat(&self) -> [f32; 4] {
        [
            self.get(StatKind::Health),
            self.get(StatKind::Damage),
            self.get(StatKind::Speed),
            self.get(StatKind::Utility),
        ]
    }
}

/// Audit record for a balance change applied through the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatModifier {
    pub character: Archetype,
    pub stat: StatKind,
    /// Percentage applied, `None` for absolute writes.
    pub percent: Option<f32>,
    pub previous: f32,
    pub value: f32,
    pub week: u32,
    pub elapsed: f32,
}

/// Result of a single stat write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatChange {
    pub character: Archetype,
    pub stat: StatKind,
    pub previous: f32,
    pub value: f32,
}

impl StatChange {
    pub fn delta(&self) -> f32 {
        self.value - self.previous
    }
}

#[derive(Debug, Clone)]
pub struct CharacterRecord {
    pub name: String,
    pub base: BaseStats,
    pub stats: StatTable,
}

#[derive(Debug, Clone, Copy, Default)]
struct ModifierStamp {
    week: u32,
    elapsed: f32,
}

/// Authoritative per-character stat tables.
#[derive(Resource, Debug, Clone, Default)]
pub struct StatStore {
    characters: BTreeMap<Archetype, CharacterRecord>,
    history: VecDeque<StatModifier>,
    stamp: ModifierStamp,
}

impl StatStore {
    pub fn from_roster(roster: &CharacterRosterConfig) -> Self {
        let mut store = Self::default();
        for entry in &roster.characters {
            store.insert(entry.archetype, entry.name.clone(), entry.base);
        }
        store
    }

    pub fn insert(&mut self, archetype: Archetype, name: impl Into<String>, base: BaseStats) {
        self.characters.insert(
            archetype,
            CharacterRecord {
                name: name.into(),
                base,
                stats: StatTable::from_base(&base),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn contains(&self, character: Archetype) -> bool {
        self.characters.contains_key(&character)
    }

    /// Roster members in archetype order.
    pub fn roster(&self) -> Vec<Archetype> {
        self.characters.keys().copied().collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = (Archetype, &StatTable)> {
        self.characters
            .iter()
            .map(|(archetype, record)| (*archetype, &record.stats))
    }

    pub fn record(&self, character: Archetype) -> Result<&CharacterRecord, MetaError> {
        self.characters
            .get(&character)
            .ok_or_else(|| MetaError::InvalidCharacter(character.to_string()))
    }

    pub fn table(&self, character: Archetype) -> Result<&StatTable, MetaError> {
        self.record(character).map(|record| &record.stats)
    }

    pub fn get(&self, character: Archetype, stat: StatKind) -> Result<f32, MetaError> {
        self.table(character).map(|table| table.get(stat))
    }

    /// Legacy lookup: 0 for characters missing from the roster.
    pub fn get_or_default(&self, character: Archetype, stat: StatKind) -> f32 {
        self.get(character, stat).unwrap_or(0.0)
    }

    /// Legacy lookup: 50 for characters missing from the roster.
    pub fn base_value_or_default(&self, character: Archetype, stat: StatKind) -> f32 {
        self.characters
            .get(&character)
            .map(|record| record.base.value(stat))
            .unwrap_or(50.0)
    }

    pub fn set(
        &mut self,
        character: Archetype,
        stat: StatKind,
        value: f32,
    ) -> Result<StatChange, MetaError> {
        let change = self.write(character, stat, value)?;
        self.journal(change, None);
        Ok(change)
    }

    /// Applies `value += value * percent / 100` and clamps.
    pub fn modify_by_percent(
        &mut self,
        character: Archetype,
        stat: StatKind,
        percent: f32,
    ) -> Result<StatChange, MetaError> {
        let current = self.get(character, stat)?;
        let change = self.write(character, stat, current + current * percent / 100.0)?;
        self.journal(change, Some(percent));
        Ok(change)
    }

    /// Write produced by the simulation itself; not recorded in the journal.
    pub fn write_derived(
        &mut self,
        character: Archetype,
        stat: StatKind,
        value: f32,
    ) -> Result<StatChange, MetaError> {
        self.write(character, stat, value)
    }

    /// Restores base values and clears the modifier journal.
    pub fn reset_all(&mut self) {
        for record in self.characters.values_mut() {
            record.stats = StatTable::from_base(&record.base);
        }
        self.history.clear();
        self.stamp = ModifierStamp::default();
    }

    pub fn history(&self) -> impl Iterator<Item = &StatModifier> {
        self.history.iter()
    }

    /// Reverts the most recent journaled change for `character`.
    pub fn undo_last_modifier(
        &mut self,
        character: Archetype,
    ) -> Result<Option<StatModifier>, MetaError> {
        self.record(character)?;
        let Some(position) = self
            .history
            .iter()
            .rposition(|entry| entry.character == character)
        else {
            return Ok(None);
        };
        let Some(modifier) = self.history.remove(position) else {
            return Ok(None);
        };
        self.write(character, modifier.stat, modifier.previous)?;
        debug!(
            target: "meta_sim::stats",
            character = %character,
            stat = %modifier.stat,
            restored = modifier.previous,
            "stat.modifier_undone"
        );
        Ok(Some(modifier))
    }

    pub fn set_stamp(&mut self, week: u32, elapsed: f32) {
        self.stamp = ModifierStamp { week, elapsed };
    }

    fn write(
        &mut self,
        character: Archetype,
        stat: StatKind,
        value: f32,
    ) -> Result<StatChange, MetaError> {
        let record = self
            .characters
            .get_mut(&character)
            .ok_or_else(|| MetaError::InvalidCharacter(character.to_string()))?;
        let previous = record.stats.get(stat);
        let stored = record.stats.set(stat, value);
        Ok(StatChange {
            character,
            stat,
            previous,
            value: stored,
        })
    }

    fn journal(&mut self, change: StatChange, percent: Option<f32>) {
        debug!(
            target: "meta_sim::stats",
            character = %change.character,
            stat = %change.stat,
            previous = change.previous,
            value = change.value,
            percent = ?percent,
            "stat.modified"
        );
        if self.history.len() >= MODIFIER_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(StatModifier {
            character: change.character,
            stat: change.stat,
            percent,
            previous: change.previous,
            value: change.value,
            week: self.stamp.week,
            elapsed: self.stamp.elapsed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StatStore {
        let mut store = StatStore::default();
        store.insert(Archetype::Warrior, "Warrior", BaseStats::default());
        store.insert(
            Archetype::Mage,
            "Mage",
            BaseStats {
                health: 40.0,
                damage: 70.0,
                ..BaseStats::default()
            },
        );
        store
    }

    #[test]
    fn win_rate_starts_neutral() {
        let store = store();
        assert_eq!(store.get(Archetype::Mage, StatKind::WinRate), Ok(50.0));
        assert_eq!(store.get(Archetype::Mage, StatKind::Damage), Ok(70.0));
    }

    #[test]
    fn percent_modification_compounds_on_current_value() {
        let mut store = store();
        let change = store
            .modify_by_percent(Archetype::Warrior, StatKind::Damage, 10.0)
            .unwrap();
        assert!((change.value - 55.0).abs() < 1e-5);
        let change = store
            .modify_by_percent(Archetype::Warrior, StatKind::Damage, -20.0)
            .unwrap();
        assert!((change.value - 44.0).abs() < 1e-5);
    }

    #[test]
    fn writes_are_clamped() {
        let mut store = store();
        store
            .modify_by_percent(Archetype::Warrior, StatKind::Health, -500.0)
            .unwrap();
        assert_eq!(store.get(Archetype::Warrior, StatKind::Health), Ok(1.0));
        store
            .set(Archetype::Warrior, StatKind::Popularity, 180.0)
            .unwrap();
        assert_eq!(store.get(Archetype::Warrior, StatKind::Popularity), Ok(100.0));
    }

    #[test]
    fn missing_character_fails_loudly() {
        let mut store = store();
        assert_eq!(
            store.get(Archetype::Tank, StatKind::Health),
            Err(MetaError::InvalidCharacter("tank".to_string()))
        );
        assert!(store.set(Archetype::Tank, StatKind::Health, 10.0).is_err());
        assert_eq!(store.get_or_default(Archetype::Tank, StatKind::Health), 0.0);
        assert_eq!(
            store.base_value_or_default(Archetype::Tank, StatKind::Health),
            50.0
        );
    }

    #[test]
    fn reset_restores_base_and_clears_history() {
        let mut store = store();
        store
            .modify_by_percent(Archetype::Mage, StatKind::Speed, 30.0)
            .unwrap();
        store
            .write_derived(Archetype::Mage, StatKind::WinRate, 61.0)
            .unwrap();
        store.reset_all();
        assert_eq!(store.get(Archetype::Mage, StatKind::Speed), Ok(50.0));
        assert_eq!(store.get(Archetype::Mage, StatKind::WinRate), Ok(50.0));
        assert_eq!(store.history().count(), 0);
    }

    #[test]
    fn undo_restores_previous_value() {
        let mut store = store();
        store.set_stamp(3, 12.5);
        store
            .modify_by_percent(Archetype::Warrior, StatKind::Speed, 20.0)
            .unwrap();
        store
            .modify_by_percent(Archetype::Mage, StatKind::Speed, 20.0)
            .unwrap();
        let undone = store
            .undo_last_modifier(Archetype::Warrior)
            .unwrap()
            .expect("journaled change");
        assert_eq!(undone.week, 3);
        assert_eq!(undone.percent, Some(20.0));
        assert_eq!(store.get(Archetype::Warrior, StatKind::Speed), Ok(50.0));
        assert!((store.get(Archetype::Mage, StatKind::Speed).unwrap() - 60.0).abs() < 1e-5);
        assert_eq!(store.undo_last_modifier(Archetype::Warrior), Ok(None));
    }

    #[test]
    fn derived_writes_skip_the_journal() {
        let mut store = store();
        store
            .write_derived(Archetype::Warrior, StatKind::WinRate, 57.0)
            .unwrap();
        assert_eq!(store.history().count(), 0);
    }
}
