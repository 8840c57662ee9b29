// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-bar pattern metrics.
//!
//! These are read-only inputs to the feedback controller:
//! entrainment E, syncopation S, hat density H, micro magnitude T and the
//! union-mask entropy written to the telemetry CSV.

use crate::rhythm::{empty_mask, is_beat_step, is_offbeat_step, onset_count, StepMask};
use crate::timebase::{ticks_to_ms, STEPS_PER_BAR};

use super::{DrumEvent, LayerId};

/// Metrics for one emitted bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarMetrics {
    /// Entrainment in [0,1]: lag-4 autocorrelation of the union mask.
    pub e: f64,
    /// Syncopation in [0,1]: weak-position weighting of onsets.
    pub s: f64,
    /// Fraction of 16th steps carrying a hat onset.
    pub hat_density: f64,
    /// Bernoulli entropy of the union mask, in bits.
    pub entropy: f64,
}

/// Union onset mask across all layers for one bar.
pub fn union_mask(events: &[DrumEvent], bar: u32) -> StepMask {
    let mut mask = empty_mask();
    for ev in events {
        if ev.bar == bar {
            mask[ev.step as usize] = true;
        }
    }
    mask
}

/// Onset mask for the hat layers in one bar.
pub fn hat_mask(events: &[DrumEvent], bar: u32) -> StepMask {
    let mut mask = empty_mask();
    for ev in events {
        if ev.bar == bar && matches!(ev.layer, LayerId::HatClosed | LayerId::HatOpen) {
            mask[ev.step as usize] = true;
        }
    }
    mask
}

/// Entrainment: normalized autocorrelation of the mask at period 4.
///
/// 1.0 when every onset is echoed a quarter-note later (four-on-floor,
/// straight 16ths); 0.0 for an empty bar or a pattern with no quarter-pulse
/// reinforcement.
pub fn entrainment(mask: &StepMask) -> f64 {
    let onsets = onset_count(mask);
    if onsets == 0 {
        return 0.0;
    }
    let mut matched = 0usize;
    for i in 0..STEPS_PER_BAR {
        if mask[i] && mask[(i + 4) % STEPS_PER_BAR] {
            matched += 1;
        }
    }
    matched as f64 / onsets as f64
}

/// Syncopation: onsets weighted by metric weakness, averaged over onsets.
///
/// Quarter positions weigh 0, 8th offbeats 0.4, 16th positions 0.65; the
/// result is already in [0,1].
pub fn syncopation(mask: &StepMask) -> f64 {
    let mut total = 0.0;
    let mut active = 0usize;
    for (i, &on) in mask.iter().enumerate() {
        if !on {
            continue;
        }
        active += 1;
        total += if is_beat_step(i) {
            0.0
        } else if is_offbeat_step(i) {
            0.4
        } else {
            0.65
        };
    }
    if active == 0 {
        0.0
    } else {
        (total / active as f64).clamp(0.0, 1.0)
    }
}

/// Hat density: occupied hat steps over 16.
pub fn hat_density(mask: &StepMask) -> f64 {
    onset_count(mask) as f64 / STEPS_PER_BAR as f64
}

/// Bernoulli entropy of the mask's onset rate, in bits.
pub fn entropy(mask: &StepMask) -> f64 {
    let p = onset_count(mask) as f64 / STEPS_PER_BAR as f64;
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// Mean absolute micro offset in milliseconds for one layer in one bar.
pub fn mean_abs_micro_ms(
    events: &[DrumEvent],
    layer: LayerId,
    bar: u32,
    ppq: u32,
    bpm: f64,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for ev in events {
        if ev.bar == bar && ev.layer == layer {
            sum += ticks_to_ms(ev.micro_offset_ticks.abs(), ppq, bpm);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Normalized inter-onset-interval variance for a layer across the clip.
/// Scale-independent; 0 for perfectly regular layers.
pub fn dispersion(events: &[DrumEvent], layer: LayerId, ppq: u32) -> f64 {
    let mut ticks: Vec<u64> = events
        .iter()
        .filter(|e| e.layer == layer)
        .map(|e| e.start_tick(ppq))
        .collect();
    ticks.sort_unstable();
    if ticks.len() < 3 {
        return 0.0;
    }
    let iois: Vec<f64> = ticks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let mean = iois.iter().sum::<f64>() / iois.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let var = iois.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / iois.len() as f64;
    var / (mean * mean)
}

/// Compute the metric bundle for one bar.
pub fn measure_bar(events: &[DrumEvent], bar: u32, _ppq: u32, _bpm: f64) -> BarMetrics {
    let union = union_mask(events, bar);
    let hats = hat_mask(events, bar);
    BarMetrics {
        e: entrainment(&union),
        s: syncopation(&union),
        hat_density: hat_density(&hats),
        entropy: entropy(&union),
    }
}
