// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tick math and deterministic random streams.
//!
//! All timing is derived from PPQ (ticks per quarter note) and BPM. Bars are
//! 4/4 with 16 logical steps, so one step is `ppq / 4` ticks.
//!
//! Randomness is never global: every sampler takes an explicit RNG state,
//! and states are derived from the root seed through a stable SplitMix64
//! hash over `(stage tag, component index, bar index)`. Two runs with the
//! same configuration and seed produce bit-identical output.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Fixed number of logical steps per 4/4 bar.
pub const STEPS_PER_BAR: usize = 16;

/// Ticks per second for the given resolution and tempo.
pub fn ticks_per_second(ppq: u32, bpm: f64) -> f64 {
    (ppq as f64 * bpm) / 60.0
}

/// Ticks per millisecond for the given resolution and tempo.
pub fn ticks_per_ms(ppq: u32, bpm: f64) -> f64 {
    ticks_per_second(ppq, bpm) / 1000.0
}

/// Convert milliseconds to integer ticks (rounded, signed).
pub fn ms_to_ticks(ms: f64, ppq: u32, bpm: f64) -> i64 {
    (ms * ticks_per_ms(ppq, bpm)).round() as i64
}

/// Convert ticks to milliseconds.
pub fn ticks_to_ms(ticks: i64, ppq: u32, bpm: f64) -> f64 {
    ticks as f64 / ticks_per_ms(ppq, bpm)
}

/// Ticks per quarter-note beat.
pub fn ticks_per_beat(ppq: u32) -> u64 {
    ppq as u64
}

/// Ticks per 4/4 bar.
pub fn ticks_per_bar(ppq: u32) -> u64 {
    ticks_per_beat(ppq) * 4
}

/// Ticks per 16th-note step.
pub fn step_ticks(ppq: u32) -> u64 {
    ppq as u64 / 4
}

/// SplitMix64 mixing step.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Deterministic seed chain rooted at the configured RNG seed.
///
/// Derivation folds a canonical byte encoding of the tags into a SplitMix64
/// state, so stream identity depends only on the values, never on call
/// order or platform.
#[derive(Debug, Clone, Copy)]
pub struct SeedChain {
    root: u64,
}

impl SeedChain {
    /// Create a chain from the root seed.
    pub fn new(root: u64) -> Self {
        Self { root }
    }

    /// Root seed this chain was created with.
    pub fn root(&self) -> u64 {
        self.root
    }

    /// Derive the 64-bit seed for `(stage, component, bar)`.
    pub fn derive_seed(&self, stage: &str, component: u32, bar: u32) -> u64 {
        let mut state = self.root;
        let _ = splitmix64(&mut state);
        for &b in stage.as_bytes() {
            state ^= b as u64;
            let _ = splitmix64(&mut state);
        }
        state ^= (component as u64) << 32 | bar as u64;
        splitmix64(&mut state)
    }

    /// Derive a PCG stream for `(stage, component, bar)`.
    pub fn rng(&self, stage: &str, component: u32, bar: u32) -> Pcg32 {
        Pcg32::seed_from_u64(self.derive_seed(stage, component, bar))
    }
}

/// Bernoulli draw with probability `p`.
pub fn bernoulli<R: Rng>(rng: &mut R, p: f64) -> bool {
    if p <= 0.0 {
        return false;
    }
    if p >= 1.0 {
        return true;
    }
    rng.gen::<f64>() < p
}

/// Index draw proportional to `weights`; zero or negative weights never win.
///
/// Falls back to the last index when the total weight is non-positive so the
/// caller always gets a valid index for a non-empty slice.
pub fn weighted_choice<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    debug_assert!(!weights.is_empty());
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return weights.len() - 1;
    }
    let mut roll = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        roll -= w;
        if roll <= 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

/// Sample from a discrete distribution of values with matching probabilities.
pub fn sample_bins<R: Rng>(rng: &mut R, values: &[f64], probs: &[f64]) -> f64 {
    debug_assert_eq!(values.len(), probs.len());
    let r = rng.gen::<f64>();
    let mut acc = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        acc += p;
        if r <= acc {
            return values[i];
        }
    }
    *values.last().unwrap_or(&0.0)
}

/// Truncated normal draw via Box-Muller, clamped to `[lo, hi]`.
pub fn normal_clamped<R: Rng>(rng: &mut R, mean: f64, sd: f64, lo: f64, hi: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    (mean + sd * z).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversions() {
        // 120 BPM at 1920 PPQ: 1 beat = 500ms = 1920 ticks.
        assert_eq!(ms_to_ticks(500.0, 1920, 120.0), 1920);
        assert_eq!(ms_to_ticks(-500.0, 1920, 120.0), -1920);
        assert!((ticks_to_ms(1920, 1920, 120.0) - 500.0).abs() < 1e-9);
        assert_eq!(ticks_per_bar(1920), 7680);
        assert_eq!(step_ticks(1920), 480);
        assert_eq!(step_ticks(96), 24);
    }

    #[test]
    fn test_seed_chain_stable() {
        let chain = SeedChain::new(1234);
        let a = chain.derive_seed("drums/kick", 0, 3);
        let b = chain.derive_seed("drums/kick", 0, 3);
        assert_eq!(a, b);

        // Distinct tags, components and bars give distinct streams.
        assert_ne!(a, chain.derive_seed("drums/hat_c", 0, 3));
        assert_ne!(a, chain.derive_seed("drums/kick", 1, 3));
        assert_ne!(a, chain.derive_seed("drums/kick", 0, 4));
    }

    #[test]
    fn test_seed_chain_rng_replay() {
        let chain = SeedChain::new(99);
        let mut r1 = chain.rng("bass", 0, 0);
        let mut r2 = chain.rng("bass", 0, 0);
        for _ in 0..32 {
            assert_eq!(r1.gen::<u64>(), r2.gen::<u64>());
        }
    }

    #[test]
    fn test_bernoulli_extremes() {
        let mut rng = SeedChain::new(7).rng("test", 0, 0);
        assert!(!bernoulli(&mut rng, 0.0));
        assert!(bernoulli(&mut rng, 1.0));
    }

    #[test]
    fn test_weighted_choice_respects_zero_weights() {
        let mut rng = SeedChain::new(11).rng("test", 0, 0);
        for _ in 0..100 {
            let idx = weighted_choice(&mut rng, &[0.0, 1.0, 0.0]);
            assert_eq!(idx, 1);
        }
    }

    #[test]
    fn test_sample_bins_distribution_edges() {
        let mut rng = SeedChain::new(5).rng("test", 0, 0);
        let v = sample_bins(&mut rng, &[-10.0, -6.0, -2.0, 0.0], &[0.4, 0.35, 0.2, 0.05]);
        assert!([-10.0, -6.0, -2.0, 0.0].contains(&v));
    }

    #[test]
    fn test_normal_clamped_bounds() {
        let mut rng = SeedChain::new(3).rng("test", 0, 0);
        for _ in 0..200 {
            let v = normal_clamped(&mut rng, 0.0, 10.0, -1.0, 1.0);
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
