// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Accent profiles for the post-schedule velocity pass.
//!
//! The accent pass may raise an event's velocity but never moves it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::rhythm::{is_beat_step, is_offbeat_step};
use crate::timebase::bernoulli;

/// Where accents tend to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccentMode {
    /// Uniform accent probability.
    #[default]
    Random,
    /// Biased toward 8th-note offbeats.
    OffbeatFocused,
    /// Biased toward quarter-note downbeats.
    DownbeatFocused,
}

/// Accent lane configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccentProfile {
    /// Base accent probability per step.
    #[serde(default = "default_prob")]
    pub prob: f64,
    /// Velocity gain applied to accented events.
    #[serde(default = "default_gain")]
    pub velocity_scale: f64,
    /// Placement steering.
    #[serde(default)]
    pub mode: AccentMode,
}

fn default_prob() -> f64 {
    0.0
}

fn default_gain() -> f64 {
    1.2
}

impl Default for AccentProfile {
    fn default() -> Self {
        Self {
            prob: default_prob(),
            velocity_scale: default_gain(),
            mode: AccentMode::Random,
        }
    }
}

impl AccentProfile {
    /// Effective accent probability at `step` after placement steering.
    pub fn prob_at(&self, step: usize) -> f64 {
        let bias = match self.mode {
            AccentMode::Random => 0.0,
            AccentMode::OffbeatFocused => {
                if is_offbeat_step(step) {
                    0.35
                } else {
                    -0.1
                }
            }
            AccentMode::DownbeatFocused => {
                if is_beat_step(step) {
                    0.35
                } else {
                    -0.05
                }
            }
        };
        (self.prob + bias).clamp(0.0, 1.0)
    }

    /// Decide the accent gate for one step; `Some(gain)` means accent.
    pub fn roll<R: Rng>(&self, step: usize, rng: &mut R) -> Option<f64> {
        if bernoulli(rng, self.prob_at(step)) {
            Some(self.velocity_scale)
        } else {
            None
        }
    }
}

/// Scale a velocity by an accent gain, clipped to the MIDI range.
pub fn accent_velocity(velocity: u8, gain: f64) -> u8 {
    ((velocity as f64 * gain).round() as i64).clamp(1, 127) as u8
}
