// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Long-horizon parameter modulators.
//!
//! Each modulator drives one named parameter path per bar. All modes clip
//! to `[min_val, max_val]` and bound the per-bar delta.

use rand::Rng;

use crate::config::{ModulatorConfig, ModulatorMode};
use crate::timebase::normal_clamped;

/// Advance a modulated value by one bar.
pub fn step_modulator<R: Rng>(
    value: f64,
    cfg: &ModulatorConfig,
    bar: u32,
    rng: &mut R,
) -> f64 {
    let next = match cfg.mode {
        ModulatorMode::RandomWalk => {
            let delta = rng.gen_range(-cfg.step_per_bar..=cfg.step_per_bar);
            value + delta
        }
        ModulatorMode::Ou => {
            let mid = 0.5 * (cfg.min_val + cfg.max_val);
            let tau = cfg.tau.unwrap_or(32.0).max(1e-6);
            let theta = 1.0 / tau;
            let noise = normal_clamped(rng, 0.0, cfg.step_per_bar, -1.0, 1.0);
            value + theta * (mid - value) + noise
        }
        ModulatorMode::Sine => {
            let tau = cfg.tau.unwrap_or(32.0).max(1e-6);
            let phase = (cfg.phase.unwrap_or(0.0) + bar as f64 / tau) % 1.0;
            cfg.min_val
                + 0.5 * (1.0 + (2.0 * std::f64::consts::PI * phase).sin())
                    * (cfg.max_val - cfg.min_val)
        }
    };

    let clipped = next.clamp(cfg.min_val, cfg.max_val);
    let delta = clipped - value;
    if delta.abs() > cfg.max_delta_per_bar {
        value + cfg.max_delta_per_bar.copysign(delta)
    } else {
        clipped
    }
}

/// Clamp a proposed value's distance from the previous one.
pub fn clamp_delta(prev: f64, proposed: f64, max_delta: f64) -> f64 {
    let delta = proposed - prev;
    if delta.abs() > max_delta {
        prev + max_delta.copysign(delta)
    } else {
        proposed
    }
}
