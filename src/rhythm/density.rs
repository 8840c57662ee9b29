// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Density shaping: target clamps and near-kick thinning.

use super::StepMask;
use crate::timebase::STEPS_PER_BAR;

/// Local weight per step: for each kick onset, a step contributes
/// `1 - distance/16`, summed over kicks. Steps far from every kick end up
/// with low weight (the "void").
pub fn void_weights(kick_mask: &StepMask) -> [f64; STEPS_PER_BAR] {
    let mut weights = [0.0; STEPS_PER_BAR];
    let kicks: Vec<usize> = kick_mask
        .iter()
        .enumerate()
        .filter(|(_, &v)| v)
        .map(|(i, _)| i)
        .collect();
    for (step, w) in weights.iter_mut().enumerate() {
        for &k in &kicks {
            let d = step.abs_diff(k);
            let d = d.min(STEPS_PER_BAR - d); // circular distance
            *w += 1.0 - d as f64 / STEPS_PER_BAR as f64;
        }
    }
    weights
}

/// Clamp the number of onsets to `target_ratio * 16 ± tol * 16`.
///
/// Surplus onsets are pruned lowest-weight first; deficits are filled at the
/// lowest-weight silent steps. Ties resolve to the earlier step so the
/// result is deterministic.
pub fn enforce_density(
    mask: &mut StepMask,
    target_ratio: f64,
    tol: f64,
    weights: &[f64; STEPS_PER_BAR],
) {
    let n = STEPS_PER_BAR;
    let target = (n as f64 * target_ratio).round() as usize;
    let allow = (tol * n as f64).round() as usize;
    let on: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, &v)| v)
        .map(|(i, _)| i)
        .collect();

    if on.len() > target + allow {
        let mut by_weight = on.clone();
        by_weight.sort_by(|&a, &b| {
            weights[a]
                .partial_cmp(&weights[b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let prune = on.len() - (target + allow);
        for &i in by_weight.iter().take(prune) {
            mask[i] = false;
        }
    } else if on.len() < target.saturating_sub(allow) {
        let mut off: Vec<usize> = (0..n).filter(|&i| !mask[i]).collect();
        off.sort_by(|&a, &b| {
            weights[a]
                .partial_cmp(&weights[b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let add = (target - allow) - on.len();
        for &i in off.iter().take(add) {
            mask[i] = true;
        }
    }
}

/// Per-step keep probabilities thinned near kicks.
///
/// Steps within `window` of a kick get `bias` added (negative bias thins),
/// clamped to [0, 1].
pub fn thin_probs_near_kick(
    base_prob: f64,
    kick_mask: &StepMask,
    window: usize,
    bias: f64,
) -> [f64; STEPS_PER_BAR] {
    let mut probs = [base_prob; STEPS_PER_BAR];
    for (k, &on) in kick_mask.iter().enumerate() {
        if !on {
            continue;
        }
        for d in 0..=window {
            let lo = (k + STEPS_PER_BAR - d) % STEPS_PER_BAR;
            let hi = (k + d) % STEPS_PER_BAR;
            probs[lo] = (probs[lo] + bias).clamp(0.0, 1.0);
            if hi != lo {
                probs[hi] = (probs[hi] + bias).clamp(0.0, 1.0);
            }
        }
    }
    probs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::{mask_from_steps, onset_count};

    #[test]
    fn test_void_weights_peak_at_kicks() {
        let kick = mask_from_steps(&[0]);
        let w = void_weights(&kick);
        assert!(w[0] > w[8]);
        assert!((w[0] - 1.0).abs() < 1e-9);
        assert!((w[8] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_enforce_density_prunes_surplus() {
        let kick = mask_from_steps(&[0, 4, 8, 12]);
        let w = void_weights(&kick);
        let mut mask = [true; STEPS_PER_BAR];
        enforce_density(&mut mask, 0.5, 0.0, &w);
        assert_eq!(onset_count(&mask), 8);
    }

    #[test]
    fn test_enforce_density_fills_deficit() {
        let kick = mask_from_steps(&[0]);
        let w = void_weights(&kick);
        let mut mask = mask_from_steps(&[0]);
        enforce_density(&mut mask, 0.5, 0.0, &w);
        assert_eq!(onset_count(&mask), 8);
    }

    #[test]
    fn test_enforce_density_within_tolerance_untouched() {
        let kick = mask_from_steps(&[0, 4, 8, 12]);
        let w = void_weights(&kick);
        let mut mask = mask_from_steps(&[0, 2, 4, 6, 8, 10, 12]);
        let before = mask;
        enforce_density(&mut mask, 0.5, 0.1, &w);
        assert_eq!(mask, before);
    }

    #[test]
    fn test_thin_probs_near_kick() {
        let kick = mask_from_steps(&[4]);
        let probs = thin_probs_near_kick(1.0, &kick, 1, -0.5);
        assert!((probs[3] - 0.5).abs() < 1e-9);
        assert!((probs[4] - 0.5).abs() < 1e-9);
        assert!((probs[5] - 0.5).abs() < 1e-9);
        assert!((probs[0] - 1.0).abs() < 1e-9);
    }
}
