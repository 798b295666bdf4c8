use std::fmt;
use std::str::FromStr;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

/// Step of the weekly game loop reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Planning,
    Implementation,
    Feedback,
    Event,
}

impl GamePhase {
    pub const ALL: [GamePhase; 4] = [
        GamePhase::Planning,
        GamePhase::Implementation,
        GamePhase::Feedback,
        GamePhase::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GamePhase::Planning => "planning",
            GamePhase::Implementation => "implementation",
            GamePhase::Feedback => "feedback",
            GamePhase::Event => "event",
        }
    }

    /// Phase that follows in the weekly loop; Event wraps to Planning.
    pub fn next(self) -> GamePhase {
        match self {
            GamePhase::Planning => GamePhase::Implementation,
            GamePhase::Implementation => GamePhase::Feedback,
            GamePhase::Feedback => GamePhase::Event,
            GamePhase::Event => GamePhase::Planning,
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GamePhase {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "planning" | "plan" | "recalculation" => Ok(GamePhase::Planning),
            "implementation" | "implement" => Ok(GamePhase::Implementation),
            "feedback" => Ok(GamePhase::Feedback),
            "event" | "events" => Ok(GamePhase::Event),
            _ => Err(()),
        }
    }
}

/// Work requested for the next schedule run. Cleared once the run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingWork {
    pub recalculate: bool,
    pub feedback: bool,
    pub generate_events: bool,
    pub seasonal_event: bool,
    pub reaction_event: bool,
}

/// Week, phase and clock of the running simulation.
#[derive(Resource, Debug, Clone, Default)]
pub struct PhaseState {
    week: u32,
    phase: GamePhase,
    /// Recalculation cycles completed; drives oscillation and drift terms.
    cycle: u64,
    elapsed: f32,
    pending_dt: f32,
    events_generated_this_phase: u32,
    pub pending: PendingWork,
}

impl PhaseState {
    pub fn week(&self) -> u32 {
        self.week
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn events_generated_this_phase(&self) -> u32 {
        self.events_generated_this_phase
    }

    pub fn record_generated(&mut self, count: u32) {
        self.events_generated_this_phase = self.events_generated_this_phase.saturating_add(count);
    }

    /// Enters `phase` and queues the work bound to it.
    pub fn enter(&mut self, phase: GamePhase) {
        self.phase = phase;
        self.events_generated_this_phase = 0;
        match phase {
            GamePhase::Planning => self.pending.recalculate = true,
            GamePhase::Feedback => self.pending.feedback = true,
            GamePhase::Event => self.pending.generate_events = true,
            GamePhase::Implementation => {}
        }
    }

    /// Returns the new week number.
    pub fn advance_week(&mut self) -> u32 {
        self.week = self.week.wrapping_add(1);
        self.events_generated_this_phase = 0;
        self.week
    }

    pub fn complete_cycle(&mut self) -> u64 {
        let cycle = self.cycle;
        self.cycle = self.cycle.wrapping_add(1);
        cycle
    }

    pub fn reset_cycle(&mut self) {
        self.cycle = 0;
    }

    pub fn queue_time(&mut self, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.pending_dt += dt;
        }
    }

    pub fn has_pending_time(&self) -> bool {
        self.pending_dt > 0.0
    }

    /// Moves queued time onto the clock and returns it.
    pub fn take_pending_time(&mut self) -> f32 {
        let dt = std::mem::take(&mut self.pending_dt);
        self.elapsed += dt;
        dt
    }

    pub fn clear_pending(&mut self) {
        self.pending = PendingWork::default();
    }
}
