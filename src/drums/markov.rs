// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Probability-vector state for the feedback controller.
//!
//! Gated layers carry a per-step probability vector `p[0..16]`. The sync
//! bias nudges it toward a strong-beat profile when syncopation falls below
//! the target band and toward an offbeat profile when it rises above; masks
//! are then sampled with a short Markov memory (a freshly fired step damps
//! the next draw).

use rand::Rng;

use crate::rhythm::{is_beat_step, is_offbeat_step, StepMask};
use crate::timebase::STEPS_PER_BAR;

/// Probability floor.
pub const P_FLOOR: f64 = 0.02;
/// Probability ceiling.
pub const P_CEIL: f64 = 0.98;
/// Successive-onset damping.
pub const STICKINESS: f64 = 0.25;

/// Per-step probability vector.
pub type ProbVector = [f64; STEPS_PER_BAR];

/// Strong-beat profile pulled in when S drops below `S_low`.
fn strong_weight(step: usize) -> f64 {
    if is_beat_step(step) {
        0.9
    } else if is_offbeat_step(step) {
        0.3
    } else {
        0.15
    }
}

/// Offbeat-favouring profile pulled in when S exceeds `S_high`.
fn offbeat_weight(step: usize) -> f64 {
    if is_offbeat_step(step) {
        0.85
    } else if is_beat_step(step) {
        0.25
    } else {
        0.4
    }
}

/// Initialise a probability vector from a base onset mask.
pub fn init_probs(mask: &StepMask) -> ProbVector {
    let mut p = [P_FLOOR; STEPS_PER_BAR];
    for (i, &on) in mask.iter().enumerate() {
        p[i] = if on { 0.85 } else { 0.1 };
    }
    p
}

/// Sync bias: move each `p[i]` toward the profile midpoint, bounded by
/// `max_delta` per bar. No-op while S sits inside the band.
pub fn bias_probs(p: &mut ProbVector, s: f64, s_low: f64, s_high: f64, max_delta: f64) {
    let profile: fn(usize) -> f64 = if s < s_low {
        strong_weight
    } else if s > s_high {
        offbeat_weight
    } else {
        return;
    };
    for (i, prob) in p.iter_mut().enumerate() {
        let target = 0.5 * (*prob + profile(i));
        let delta = (target - *prob).clamp(-max_delta, max_delta);
        *prob = (*prob + delta).clamp(P_FLOOR, P_CEIL);
    }
}

/// Halve the offbeat entries; part of the rescue action.
pub fn damp_offbeats(p: &mut ProbVector) {
    for (i, prob) in p.iter_mut().enumerate() {
        if !is_beat_step(i) {
            *prob = (*prob * 0.5).max(P_FLOOR);
        }
    }
}

/// Sample a mask from the probability vector.
///
/// `offbeats_only` restricts candidates to steps 2/6/10/14. A fired step
/// damps the immediately following draw by [`STICKINESS`].
pub fn sample_mask<R: Rng>(p: &ProbVector, offbeats_only: bool, rng: &mut R) -> StepMask {
    let mut mask = [false; STEPS_PER_BAR];
    let mut prev_fired = false;
    for (i, &base) in p.iter().enumerate() {
        if offbeats_only && !is_offbeat_step(i) {
            prev_fired = false;
            continue;
        }
        let mut prob = base.clamp(P_FLOOR, P_CEIL);
        if prev_fired {
            prob = (prob * (1.0 - STICKINESS)).clamp(P_FLOOR, P_CEIL);
        }
        if rng.gen::<f64>() < prob {
            mask[i] = true;
            prev_fired = true;
        } else {
            prev_fired = false;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::{mask_from_steps, onset_count};
    use crate::timebase::SeedChain;

    #[test]
    fn test_init_probs() {
        let p = init_probs(&mask_from_steps(&[0, 4]));
        assert!((p[0] - 0.85).abs() < 1e-9);
        assert!((p[1] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_bias_pulls_toward_strong() {
        let mut p = [0.5; STEPS_PER_BAR];
        bias_probs(&mut p, 0.1, 0.35, 0.55, 1.0);
        assert!(p[0] > 0.5, "beat step rises when S too low");
        assert!(p[1] < 0.5, "weak step falls when S too low");
    }

    #[test]
    fn test_bias_pulls_toward_offbeat() {
        let mut p = [0.5; STEPS_PER_BAR];
        bias_probs(&mut p, 0.9, 0.35, 0.55, 1.0);
        assert!(p[2] > 0.5, "offbeat rises when S too high");
        assert!(p[0] < 0.5, "beat falls when S too high");
    }

    #[test]
    fn test_bias_inside_band_is_noop() {
        let mut p = [0.5; STEPS_PER_BAR];
        let before = p;
        bias_probs(&mut p, 0.45, 0.35, 0.55, 1.0);
        assert_eq!(p, before);
    }

    #[test]
    fn test_bias_delta_bounded() {
        let mut p = [0.1; STEPS_PER_BAR];
        bias_probs(&mut p, 0.0, 0.35, 0.55, 0.05);
        for (i, &prob) in p.iter().enumerate() {
            assert!(
                (prob - 0.1).abs() <= 0.05 + 1e-12,
                "step {} moved too far: {}",
                i,
                prob
            );
        }
    }

    #[test]
    fn test_damp_offbeats_keeps_beats() {
        let mut p = [0.8; STEPS_PER_BAR];
        damp_offbeats(&mut p);
        assert!((p[0] - 0.8).abs() < 1e-9);
        assert!((p[2] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_sample_mask_extremes() {
        let mut rng = SeedChain::new(1).rng("markov", 0, 0);
        let hot = [P_CEIL; STEPS_PER_BAR];
        let mask = sample_mask(&hot, false, &mut rng);
        assert!(onset_count(&mask) > 10);

        let cold = [P_FLOOR; STEPS_PER_BAR];
        let mask = sample_mask(&cold, false, &mut rng);
        assert!(onset_count(&mask) < 4);
    }

    #[test]
    fn test_sample_mask_offbeats_only() {
        let mut rng = SeedChain::new(2).rng("markov", 0, 0);
        let hot = [P_CEIL; STEPS_PER_BAR];
        let mask = sample_mask(&hot, true, &mut rng);
        for (i, &on) in mask.iter().enumerate() {
            assert!(!on || is_offbeat_step(i));
        }
    }
}
