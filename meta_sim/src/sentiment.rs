use bevy::prelude::Resource;
use serde::Serialize;
use tracing::debug;

pub const NEUTRAL_SENTIMENT: f32 = 50.0;
const DEFAULT_EVENT_BLEND: f32 = 0.6;

/// Community mood in [0, 100].
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommunitySentiment {
    value: f32,
    /// Share of an event delta applied immediately.
    blend: f32,
}

impl Default for CommunitySentiment {
    fn default() -> Self {
        Self {
            value: NEUTRAL_SENTIMENT,
            blend: DEFAULT_EVENT_BLEND,
        }
    }
}

impl CommunitySentiment {
    pub fn new(value: f32, blend: f32) -> Self {
        Self {
            value: clamp_sentiment(value),
            blend: blend.clamp(0.0, 1.0),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn blend(&self) -> f32 {
        self.blend
    }

    /// Moves toward `value + delta` by the blend factor instead of jumping.
    pub fn apply_event_delta(&mut self, delta: f32) -> f32 {
        if delta == 0.0 {
            return self.value;
        }
        let previous = self.value;
        let target = clamp_sentiment(self.value + delta);
        self.value = clamp_sentiment(self.value + (target - self.value) * self.blend);
        debug!(
            target: "meta_sim::sentiment",
            previous,
            delta,
            value = self.value,
            "sentiment.shifted"
        );
        self.value
    }

    pub fn drift_toward(&mut self, target: f32, rate: f32) -> f32 {
        let target = clamp_sentiment(target);
        self.value = clamp_sentiment(self.value + (target - self.value) * rate.clamp(0.0, 1.0));
        self.value
    }
}

fn clamp_sentiment(value: f32) -> f32 {
    if value.is_nan() {
        return NEUTRAL_SENTIMENT;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_delta_is_blended() {
        let mut sentiment = CommunitySentiment::default();
        sentiment.apply_event_delta(10.0);
        assert!((sentiment.value() - 56.0).abs() < 1e-5);
    }

    #[test]
    fn delta_target_is_clamped_first() {
        let mut sentiment = CommunitySentiment::new(95.0, 0.5);
        sentiment.apply_event_delta(20.0);
        assert!((sentiment.value() - 97.5).abs() < 1e-5);
        sentiment.apply_event_delta(-400.0);
        assert!(sentiment.value() >= 0.0);
    }

    #[test]
    fn drift_moves_partially() {
        let mut sentiment = CommunitySentiment::default();
        sentiment.drift_toward(80.0, 0.25);
        assert!((sentiment.value() - 57.5).abs() < 1e-5);
    }
}
