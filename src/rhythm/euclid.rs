// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Euclidean rhythm masks via Bjorklund's algorithm.

use super::StepMask;
use crate::timebase::STEPS_PER_BAR;

/// Generate a Euclidean rhythm pattern of `steps` slots with `pulses` onsets.
pub fn euclidean(pulses: usize, steps: usize) -> Vec<bool> {
    if steps == 0 {
        return vec![];
    }
    if pulses >= steps {
        return vec![true; steps];
    }
    if pulses == 0 {
        return vec![false; steps];
    }

    // Bjorklund's algorithm
    let mut pattern = vec![vec![true]; pulses];
    let mut remainder = vec![vec![false]; steps - pulses];

    while remainder.len() > 1 {
        let min_len = pattern.len().min(remainder.len());
        for i in 0..min_len {
            let tail = remainder[i].clone();
            pattern[i].extend(tail);
        }
        let new_remainder: Vec<Vec<bool>> = if pattern.len() > min_len {
            pattern.drain(min_len..).collect()
        } else {
            remainder.drain(min_len..).collect()
        };
        remainder = new_remainder;
    }

    let mut result: Vec<bool> = pattern.into_iter().flatten().collect();
    for r in remainder {
        result.extend(r);
    }
    result
}

/// Rotate a mask right by `rot` steps (onset at 0 moves to `rot`).
pub fn rotate(mask: &[bool], rot: usize) -> Vec<bool> {
    let n = mask.len();
    if n == 0 {
        return Vec::new();
    }
    let r = rot % n;
    if r == 0 {
        return mask.to_vec();
    }
    let mut out = Vec::with_capacity(n);
    out.extend_from_slice(&mask[n - r..]);
    out.extend_from_slice(&mask[..n - r]);
    out
}

/// Euclidean bar mask: `fills` onsets over the 16-step grid, rotated.
pub fn bar_mask(fills: usize, rot: usize) -> StepMask {
    let rotated = rotate(&euclidean(fills, STEPS_PER_BAR), rot);
    let mut mask = [false; STEPS_PER_BAR];
    mask.copy_from_slice(&rotated);
    mask
}

/// Per-bar rotation from a fractional drift rate.
///
/// `round(rate * bar + initial)` folded onto the 16-step grid; the rate is
/// clamped to `max_rate` before accumulation.
pub fn drift_rotation(rate_per_bar: f64, max_rate: f64, initial: usize, bar: u32) -> usize {
    let rate = rate_per_bar.clamp(0.0, max_rate.max(0.0));
    let rot = (rate * bar as f64).round() as i64 + initial as i64;
    rot.rem_euclid(STEPS_PER_BAR as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(mask: &[bool]) -> usize {
        mask.iter().filter(|&&v| v).count()
    }

    #[test]
    fn test_euclidean_counts() {
        // Classic 3-over-8
        let p = euclidean(3, 8);
        assert_eq!(p.len(), 8);
        assert_eq!(count(&p), 3);

        // 5-over-8
        assert_eq!(count(&euclidean(5, 8)), 5);

        // 4-over-16 (four-on-floor)
        let p = euclidean(4, 16);
        assert_eq!(count(&p), 4);
        assert!(p[0] && p[4] && p[8] && p[12]);
    }

    #[test]
    fn test_euclidean_edges() {
        assert_eq!(euclidean(0, 8), vec![false; 8]);
        assert_eq!(euclidean(8, 8), vec![true; 8]);
        assert!(euclidean(1, 16)[0]);
    }

    #[test]
    fn test_rotate() {
        let mask = vec![true, false, false, false];
        assert_eq!(rotate(&mask, 1), vec![false, true, false, false]);
        assert_eq!(rotate(&mask, 4), mask);
        assert_eq!(rotate(&mask, 5), rotate(&mask, 1));
    }

    #[test]
    fn test_bar_mask() {
        let mask = bar_mask(4, 2);
        assert!(mask[2] && mask[6] && mask[10] && mask[14]);
    }

    #[test]
    fn test_drift_rotation() {
        // 0.5 steps per bar: rotations 0,1,1,2,...
        assert_eq!(drift_rotation(0.5, 1.0, 0, 0), 0);
        assert_eq!(drift_rotation(0.5, 1.0, 0, 1), 1);
        assert_eq!(drift_rotation(0.5, 1.0, 0, 2), 1);
        assert_eq!(drift_rotation(0.5, 1.0, 0, 3), 2);

        // Clamped by max rate.
        assert_eq!(drift_rotation(8.0, 0.0, 0, 5), 0);

        // Initial rotation folds onto the grid.
        assert_eq!(drift_rotation(0.0, 1.0, 18, 0), 2);
    }
}
