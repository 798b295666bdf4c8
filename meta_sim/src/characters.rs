use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Combat role of a character. Each roster slot is keyed by its archetype.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Warrior,
    Mage,
    Support,
    Tank,
}

pub const ARCHETYPE_COUNT: usize = 4;

impl Archetype {
    pub const ALL: [Archetype; ARCHETYPE_COUNT] = [
        Archetype::Warrior,
        Archetype::Mage,
        Archetype::Support,
        Archetype::Tank,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Archetype::Warrior => "warrior",
            Archetype::Mage => "mage",
            Archetype::Support => "support",
            Archetype::Tank => "tank",
        }
    }

    pub fn profile(self) -> &'static ArchetypeProfile {
        &ARCHETYPE_PROFILES[self.index()]
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "warrior" | "melee" | "fighter" => Ok(Archetype::Warrior),
            "mage" | "caster" | "wizard" => Ok(Archetype::Mage),
            "support" | "healer" => Ok(Archetype::Support),
            "tank" | "guardian" => Ok(Archetype::Tank),
            _ => Err(()),
        }
    }
}

/// Per-character stats tracked by the stat store.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Health,
    Damage,
    Speed,
    Utility,
    WinRate,
    Popularity,
}

pub const STAT_COUNT: usize = 6;

impl StatKind {
    pub const ALL: [StatKind; STAT_COUNT] = [
        StatKind::Health,
        StatKind::Damage,
        StatKind::Speed,
        StatKind::Utility,
        StatKind::WinRate,
        StatKind::Popularity,
    ];

    /// Combat stats that feed power and matchup calculations.
    pub const COMBAT: [StatKind; 4] = [
        StatKind::Health,
        StatKind::Damage,
        StatKind::Speed,
        StatKind::Utility,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatKind::Health => "health",
            StatKind::Damage => "damage",
            StatKind::Speed => "speed",
            StatKind::Utility => "utility",
            StatKind::WinRate => "win_rate",
            StatKind::Popularity => "popularity",
        }
    }

    pub fn is_percentage(self) -> bool {
        matches!(self, StatKind::WinRate | StatKind::Popularity)
    }

    pub fn bounds(self) -> (f32, f32) {
        if self.is_percentage() {
            (0.0, 100.0)
        } else {
            (1.0, f32::MAX)
        }
    }

    pub fn clamp(self, value: f32) -> f32 {
        let (min, max) = self.bounds();
        if value.is_nan() {
            return min;
        }
        value.clamp(min, max)
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "health" | "hp" => Ok(StatKind::Health),
            "damage" | "dmg" => Ok(StatKind::Damage),
            "speed" | "spd" => Ok(StatKind::Speed),
            "utility" | "util" => Ok(StatKind::Utility),
            "win_rate" | "winrate" | "wr" => Ok(StatKind::WinRate),
            "popularity" | "pop" => Ok(StatKind::Popularity),
            _ => Err(()),
        }
    }
}

/// Authored starting values for one character.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseStats {
    pub health: f32,
    pub damage: f32,
    pub speed: f32,
    pub utility: f32,
    pub popularity: f32,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            health: 50.0,
            damage: 50.0,
            speed: 50.0,
            utility: 50.0,
            popularity: 50.0,
        }
    }
}

impl BaseStats {
    pub fn uniform(value: f32) -> Self {
        Self {
            health: value,
            damage: value,
            speed: value,
            utility: value,
            popularity: value,
        }
    }

    /// Starting value for a stat; win rate always starts at the neutral 50.
    pub fn value(&self, stat: StatKind) -> f32 {
        match stat {
            StatKind::Health => self.health,
            StatKind::Damage => self.damage,
            StatKind::Speed => self.speed,
            StatKind::Utility => self.utility,
            StatKind::WinRate => 50.0,
            StatKind::Popularity => self.popularity,
        }
    }
}

/// Stat interaction folded into the archetype power formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynergyTerm {
    Min { a: StatKind, b: StatKind, scale: f32 },
    Sum { a: StatKind, b: StatKind, scale: f32 },
}

/// Threshold penalty subtracted from archetype power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PenaltyTerm {
    Above {
        stat: StatKind,
        threshold: f32,
        scale: f32,
    },
    Below {
        stat: StatKind,
        threshold: f32,
        scale: f32,
    },
}

/// Coefficient table describing how an archetype turns stats into power,
/// matchups and appeal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchetypeProfile {
    /// Linear weights over health, damage, speed, utility.
    pub coefficients: [f32; 4],
    pub synergy: SynergyTerm,
    pub penalty: PenaltyTerm,
    pub dominant: StatKind,
    pub oscillation_weight: f32,
    pub drift_frequency: f32,
    pub base_appeal: f32,
    /// Weights applied to stat differences when this archetype attacks.
    pub matchup_weights: [f32; 4],
}

// Coefficients plus synergy scale sum to 2.8 for every archetype, so equal
// stats produce equal archetype power.
const ARCHETYPE_PROFILES: [ArchetypeProfile; ARCHETYPE_COUNT] = [
    ArchetypeProfile {
        coefficients: [0.9, 1.2, 0.4, 0.1],
        synergy: SynergyTerm::Min {
            a: StatKind::Health,
            b: StatKind::Damage,
            scale: 0.2,
        },
        penalty: PenaltyTerm::Below {
            stat: StatKind::Speed,
            threshold: 35.0,
            scale: 0.15,
        },
        dominant: StatKind::Damage,
        oscillation_weight: 1.0,
        drift_frequency: 1.0,
        base_appeal: 0.4,
        matchup_weights: [0.35, 0.35, 0.2, 0.1],
    },
    ArchetypeProfile {
        coefficients: [0.1, 1.4, 0.3, 0.9],
        synergy: SynergyTerm::Min {
            a: StatKind::Damage,
            b: StatKind::Utility,
            scale: 0.1,
        },
        penalty: PenaltyTerm::Below {
            stat: StatKind::Health,
            threshold: 40.0,
            scale: 0.2,
        },
        dominant: StatKind::Damage,
        oscillation_weight: 0.8,
        drift_frequency: 1.3,
        base_appeal: 0.5,
        matchup_weights: [0.15, 0.45, 0.15, 0.25],
    },
    ArchetypeProfile {
        coefficients: [0.5, 0.2, 0.4, 1.5],
        synergy: SynergyTerm::Min {
            a: StatKind::Utility,
            b: StatKind::Speed,
            scale: 0.2,
        },
        penalty: PenaltyTerm::Above {
            stat: StatKind::Damage,
            threshold: 60.0,
            scale: 0.15,
        },
        dominant: StatKind::Utility,
        oscillation_weight: 0.6,
        drift_frequency: 0.7,
        base_appeal: -0.2,
        matchup_weights: [0.2, 0.1, 0.2, 0.5],
    },
    ArchetypeProfile {
        coefficients: [1.3, 0.4, 0.0, 0.8],
        synergy: SynergyTerm::Sum {
            a: StatKind::Health,
            b: StatKind::Utility,
            scale: 0.15,
        },
        penalty: PenaltyTerm::Above {
            stat: StatKind::Speed,
            threshold: 60.0,
            scale: 0.2,
        },
        dominant: StatKind::Health,
        oscillation_weight: 0.9,
        drift_frequency: 0.9,
        base_appeal: 0.1,
        matchup_weights: [0.5, 0.2, 0.05, 0.25],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archetype_aliases_parse() {
        assert_eq!("Melee".parse::<Archetype>(), Ok(Archetype::Warrior));
        assert_eq!("caster".parse::<Archetype>(), Ok(Archetype::Mage));
        assert!("rogue".parse::<Archetype>().is_err());
    }

    #[test]
    fn percentage_stats_clamp_to_hundred() {
        assert_eq!(StatKind::WinRate.clamp(140.0), 100.0);
        assert_eq!(StatKind::Popularity.clamp(-3.0), 0.0);
        assert_eq!(StatKind::Health.clamp(-20.0), 1.0);
        assert_eq!(StatKind::Speed.clamp(f32::NAN), 1.0);
    }

    #[test]
    fn profiles_share_uniform_power_budget() {
        for archetype in Archetype::ALL {
            let profile = archetype.profile();
            let synergy = match profile.synergy {
                SynergyTerm::Min { scale, .. } => scale,
                SynergyTerm::Sum { scale, .. } => scale * 2.0,
            };
            let total: f32 = profile.coefficients.iter().sum::<f32>() + synergy;
            assert!((total - 2.8).abs() < 1e-5, "{archetype} budget {total}");
        }
    }
}
