use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::characters::{Archetype, BaseStats};

pub const BUILTIN_CHARACTER_ROSTER: &str = include_str!("data/character_roster.json");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CharacterRosterConfig {
    pub version: u32,
    pub characters: Vec<RosterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    pub archetype: Archetype,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base: BaseStats,
}

impl CharacterRosterConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_CHARACTER_ROSTER)
                .expect("builtin character roster should parse"),
        )
    }

    /// One character per archetype with default stats.
    pub fn uniform(base: BaseStats) -> Self {
        Self {
            version: 1,
            characters: Archetype::ALL
                .iter()
                .map(|archetype| RosterEntry {
                    archetype: *archetype,
                    name: archetype.as_str().to_string(),
                    base,
                })
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, RosterConfigError> {
        let mut roster: CharacterRosterConfig = serde_json::from_str(json)?;
        roster.validate()?;
        Ok(roster)
    }

    pub fn from_file(path: &Path) -> Result<Self, RosterConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| RosterConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    fn validate(&mut self) -> Result<(), RosterConfigError> {
        let mut seen = HashSet::new();
        for entry in &mut self.characters {
            if !seen.insert(entry.archetype) {
                return Err(RosterConfigError::Duplicate(entry.archetype));
            }
            if entry.name.is_empty() {
                entry.name = entry.archetype.as_str().to_string();
            }
        }
        if self.characters.is_empty() {
            return Err(RosterConfigError::Empty);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RosterConfigError {
    #[error("failed to parse character roster: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read character roster from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate roster entry for archetype {0}")]
    Duplicate(Archetype),
    #[error("character roster is empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_roster_covers_every_archetype() {
        let roster = CharacterRosterConfig::builtin();
        for archetype in Archetype::ALL {
            assert!(roster
                .characters
                .iter()
                .any(|entry| entry.archetype == archetype));
        }
    }

    #[test]
    fn duplicate_archetypes_rejected() {
        let json = r#"{"characters":[{"archetype":"tank"},{"archetype":"tank"}]}"#;
        assert!(matches!(
            CharacterRosterConfig::from_json_str(json),
            Err(RosterConfigError::Duplicate(Archetype::Tank))
        ));
    }

    #[test]
    fn missing_names_fall_back_to_archetype() {
        let json = r#"{"characters":[{"archetype":"mage","base":{"damage":72.0}}]}"#;
        let roster = CharacterRosterConfig::from_json_str(json).unwrap();
        assert_eq!(roster.characters[0].name, "mage");
        assert_eq!(roster.characters[0].base.damage, 72.0);
        assert_eq!(roster.characters[0].base.health, 50.0);
    }
}
