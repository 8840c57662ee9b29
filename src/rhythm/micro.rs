// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Micro-timing: swing and beat-bin offsets.
//!
//! Ordering is fixed: swing first, then the sampled bin offset, then the
//! per-layer aggregate cap. The result is a signed tick offset relative to
//! the quantised step position; events never move, only their offsets do.

use rand::Rng;

use crate::timebase::{ms_to_ticks, sample_bins, step_ticks};

/// Swing contribution in ticks for a step.
///
/// Odd 16th steps are delayed by `(swing_percent - 0.5) * step_ticks * 2`;
/// even steps are untouched. `swing_percent = 0.5` is straight time.
pub fn swing_ticks(step: usize, swing_percent: f64, ppq: u32) -> i64 {
    if step % 2 == 0 {
        return 0;
    }
    let st = step_ticks(ppq) as f64;
    ((swing_percent - 0.5) * st * 2.0).round().max(0.0) as i64
}

/// Sample a beat-bin offset in milliseconds, clamped to `cap_ms`.
pub fn beat_bin_ms<R: Rng>(
    bins_ms: &[f64],
    probs: &[f64],
    cap_ms: Option<f64>,
    rng: &mut R,
) -> f64 {
    if bins_ms.is_empty() || probs.is_empty() {
        return 0.0;
    }
    let ms = sample_bins(rng, bins_ms, probs);
    match cap_ms {
        Some(cap) => ms.clamp(-cap.abs(), cap.abs()),
        None => ms,
    }
}

/// Full micro offset for one onset: swing, then bin, then aggregate cap.
///
/// `cap_ms` bounds the total magnitude (the `T_ms_cap` target); `None`
/// leaves the sum uncapped.
#[allow(clippy::too_many_arguments)]
pub fn micro_offset_ticks<R: Rng>(
    step: usize,
    swing_percent: Option<f64>,
    bins_ms: &[f64],
    probs: &[f64],
    bin_cap_ms: Option<f64>,
    cap_ms: Option<f64>,
    ppq: u32,
    bpm: f64,
    rng: &mut R,
) -> i64 {
    let mut offset = match swing_percent {
        Some(sp) => swing_ticks(step, sp, ppq),
        None => 0,
    };
    let bin = beat_bin_ms(bins_ms, probs, bin_cap_ms, rng);
    offset += ms_to_ticks(bin, ppq, bpm);

    if let Some(cap) = cap_ms {
        let cap_ticks = ms_to_ticks(cap.abs(), ppq, bpm);
        offset = offset.clamp(-cap_ticks, cap_ticks);
    }
    offset
}

/// Tick cap corresponding to a millisecond cap, for invariant checks.
pub fn cap_ticks(cap_ms: f64, ppq: u32, bpm: f64) -> i64 {
    ms_to_ticks(cap_ms.abs(), ppq, bpm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebase::SeedChain;

    #[test]
    fn test_swing_straight() {
        for step in 0..16 {
            assert_eq!(swing_ticks(step, 0.5, 1920), 0);
        }
    }

    #[test]
    fn test_swing_delays_odd_steps() {
        // 0.55 swing at 1920 PPQ: (0.05) * 480 * 2 = 48 ticks.
        assert_eq!(swing_ticks(1, 0.55, 1920), 48);
        assert_eq!(swing_ticks(3, 0.55, 1920), 48);
        assert_eq!(swing_ticks(0, 0.55, 1920), 0);
        assert_eq!(swing_ticks(2, 0.55, 1920), 0);
    }

    #[test]
    fn test_beat_bin_clamped() {
        let mut rng = SeedChain::new(9).rng("micro", 0, 0);
        for _ in 0..100 {
            let ms = beat_bin_ms(&[-20.0, 0.0, 20.0], &[0.4, 0.2, 0.4], Some(10.0), &mut rng);
            assert!(ms.abs() <= 10.0);
        }
    }

    #[test]
    fn test_micro_offset_respects_total_cap() {
        let mut rng = SeedChain::new(10).rng("micro", 0, 0);
        let cap = cap_ticks(12.0, 1920, 132.0);
        for step in 0..16 {
            let off = micro_offset_ticks(
                step,
                Some(0.58),
                &[-10.0, -6.0, -2.0, 0.0],
                &[0.4, 0.35, 0.2, 0.05],
                Some(12.0),
                Some(12.0),
                1920,
                132.0,
                &mut rng,
            );
            assert!(off.abs() <= cap, "offset {} above cap {}", off, cap);
        }
    }

    #[test]
    fn test_empty_bins_no_offset() {
        let mut rng = SeedChain::new(11).rng("micro", 0, 0);
        let off = micro_offset_ticks(0, None, &[], &[], None, None, 1920, 120.0, &mut rng);
        assert_eq!(off, 0);
    }
}
