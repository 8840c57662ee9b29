// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Slot scoring and step selection for the bass engine.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::SlotLabel;
use crate::rhythm::{is_beat_step, is_offbeat_step};
use crate::timebase::STEPS_PER_BAR;

use super::{BassModeName, KickOverlapPolicy};

/// Scoring weights; defaults per the engine's tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BassWeights {
    #[serde(default = "default_w_tag")]
    pub w_tag: f64,
    #[serde(default = "default_w_anchor")]
    pub w_anchor: f64,
    #[serde(default = "default_w_strength")]
    pub w_strength: f64,
    #[serde(default = "default_w_density")]
    pub w_density: f64,
    #[serde(default = "default_w_overlap")]
    pub w_overlap: f64,
    #[serde(default = "default_w_kick_avoid")]
    pub w_kick_avoid: f64,
}

fn default_w_tag() -> f64 {
    1.0
}
fn default_w_anchor() -> f64 {
    0.6
}
fn default_w_strength() -> f64 {
    0.5
}
fn default_w_density() -> f64 {
    0.3
}
fn default_w_overlap() -> f64 {
    2.0
}
fn default_w_kick_avoid() -> f64 {
    2.0
}

impl Default for BassWeights {
    fn default() -> Self {
        Self {
            w_tag: default_w_tag(),
            w_anchor: default_w_anchor(),
            w_strength: default_w_strength(),
            w_density: default_w_density(),
            w_overlap: default_w_overlap(),
            w_kick_avoid: default_w_kick_avoid(),
        }
    }
}

/// Metric strength of a slot: bar start strongest, then beats, offbeats,
/// remaining 16ths; a snare zone adds weight.
pub fn beat_strength(label: &SlotLabel, step: usize) -> f64 {
    let base = if label.bar_start {
        1.0
    } else if is_beat_step(step) {
        0.8
    } else if is_offbeat_step(step) {
        0.5
    } else {
        0.2
    };
    if label.snare_zone {
        base + 0.1
    } else {
        base
    }
}

/// Mode-specific preference over slot labels (the `w_tag` term).
pub fn tag_preference(mode: BassModeName, label: &SlotLabel, step: usize) -> f64 {
    let mut w = 0.0;
    match mode {
        BassModeName::SubAnchor => {
            if label.bar_start {
                w += 1.0;
            }
            if label.post_kick {
                w += 0.4;
            }
        }
        BassModeName::RootFifthDriver => {
            if label.bar_start {
                w += 0.8;
            }
            if is_beat_step(step) {
                w += 0.6;
            }
            if label.post_kick {
                w += 0.3;
            }
        }
        BassModeName::PocketGroove => {
            if label.snare_zone {
                w += 0.7;
            }
            if label.hat_dense {
                w += 0.5;
            }
            if label.post_kick {
                w += 0.4;
            }
            if is_offbeat_step(step) {
                w += 0.4;
            }
        }
        BassModeName::RollingOstinato => {
            if label.hat_dense {
                w += 0.6;
            }
            if is_offbeat_step(step) {
                w += 0.5;
            }
            if label.post_kick {
                w += 0.3;
            }
        }
        BassModeName::OffbeatStabs => {
            if label.hat_sparse {
                w += 0.6;
            }
            if is_offbeat_step(step) {
                w += 0.9;
            }
            if label.pre_kick {
                w += 0.2;
            }
        }
        BassModeName::LeadIsh => {
            if label.hat_dense {
                w += 0.4;
            }
            if is_offbeat_step(step) {
                w += 0.4;
            }
            if label.fill_zone {
                w += 0.3;
            }
        }
    }
    w
}

/// Mode anchor affinity (the `w_anchor` term): 1 when the slot matches the
/// mode's anchor concept.
pub fn anchor_match(mode: BassModeName, label: &SlotLabel, step: usize) -> f64 {
    let hit = match mode {
        BassModeName::SubAnchor => label.bar_start,
        BassModeName::RootFifthDriver => label.bar_start || is_beat_step(step),
        BassModeName::PocketGroove => label.snare_zone || label.hat_dense,
        BassModeName::RollingOstinato => label.hat_dense,
        BassModeName::OffbeatStabs => label.hat_sparse && !label.is_kick,
        BassModeName::LeadIsh => true,
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Score one slot given the notes already placed in the bar.
pub fn slot_score(
    mode: BassModeName,
    policy: KickOverlapPolicy,
    label: &SlotLabel,
    step: usize,
    existing: &[usize],
    weights: &BassWeights,
) -> f64 {
    let sparsity = if existing.iter().any(|&s| s.abs_diff(step) <= 1) {
        0.0
    } else {
        1.0
    };
    let overlap = if existing.contains(&step) { 1.0 } else { 0.0 };
    let kick_avoid = if label.is_kick && matches!(policy, KickOverlapPolicy::Forbid) {
        1.0
    } else {
        0.0
    };

    weights.w_tag * tag_preference(mode, label, step)
        + weights.w_anchor * anchor_match(mode, label, step)
        + weights.w_strength * beat_strength(label, step)
        + weights.w_density * sparsity
        - weights.w_overlap * overlap
        - weights.w_kick_avoid * kick_avoid
}

/// Score window treated as a tie during selection.
const TIE_EPS: f64 = 0.05;

/// Greedy top-k step selection under gap and run-length constraints.
///
/// `forbidden` steps are never selected. Each pick draws uniformly among
/// the candidates within [`TIE_EPS`] of the best remaining score, so
/// retries with a fresh RNG stream explore different near-tied layouts
/// while clearly-ranked steps stay stable.
pub fn select_steps<R: Rng>(
    scores: &[f64; STEPS_PER_BAR],
    forbidden: &[usize],
    target: usize,
    min_gap: usize,
    max_consecutive: usize,
    existing: &[usize],
    rng: &mut R,
) -> Vec<usize> {
    let mut chosen: Vec<usize> = existing.to_vec();
    let mut added = Vec::new();

    while added.len() < target {
        let eligible: Vec<usize> = (0..STEPS_PER_BAR)
            .filter(|step| {
                !forbidden.contains(step)
                    && !chosen.contains(step)
                    && !(min_gap > 1
                        && chosen.iter().any(|&s| s.abs_diff(*step) < min_gap))
                    && run_length_with(&chosen, *step) <= max_consecutive
            })
            .collect();
        let Some(best) = eligible
            .iter()
            .map(|&s| scores[s])
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            })
        else {
            break;
        };
        let tied: Vec<usize> = eligible
            .into_iter()
            .filter(|&s| scores[s] >= best - TIE_EPS)
            .collect();
        let step = tied[rng.gen_range(0..tied.len())];
        chosen.push(step);
        added.push(step);
    }

    added.sort_unstable();
    added
}

/// Length of the consecutive run `step` would join.
fn run_length_with(chosen: &[usize], step: usize) -> usize {
    let mut len = 1;
    let mut s = step;
    while s > 0 && chosen.contains(&(s - 1)) {
        len += 1;
        s -= 1;
    }
    let mut s = step;
    while s + 1 < STEPS_PER_BAR && chosen.contains(&(s + 1)) {
        len += 1;
        s += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebase::SeedChain;

    fn label() -> SlotLabel {
        SlotLabel::default()
    }

    #[test]
    fn test_default_weights() {
        let w = BassWeights::default();
        assert_eq!(w.w_tag, 1.0);
        assert_eq!(w.w_anchor, 0.6);
        assert_eq!(w.w_strength, 0.5);
        assert_eq!(w.w_density, 0.3);
        assert_eq!(w.w_overlap, 2.0);
    }

    #[test]
    fn test_beat_strength_ordering() {
        let mut start = label();
        start.bar_start = true;
        assert!(beat_strength(&start, 0) > beat_strength(&label(), 4));
        assert!(beat_strength(&label(), 4) > beat_strength(&label(), 2));
        assert!(beat_strength(&label(), 2) > beat_strength(&label(), 3));
    }

    #[test]
    fn test_kick_avoid_penalty() {
        let mut kick = label();
        kick.is_kick = true;
        let w = BassWeights::default();
        let forbidden = slot_score(
            BassModeName::SubAnchor,
            KickOverlapPolicy::Forbid,
            &kick,
            4,
            &[],
            &w,
        );
        let allowed = slot_score(
            BassModeName::SubAnchor,
            KickOverlapPolicy::Allow,
            &kick,
            4,
            &[],
            &w,
        );
        assert!(forbidden < allowed);
    }

    #[test]
    fn test_overlap_penalty() {
        let w = BassWeights::default();
        let clear = slot_score(
            BassModeName::PocketGroove,
            KickOverlapPolicy::Allow,
            &label(),
            6,
            &[],
            &w,
        );
        let occupied = slot_score(
            BassModeName::PocketGroove,
            KickOverlapPolicy::Allow,
            &label(),
            6,
            &[6],
            &w,
        );
        assert!(occupied < clear);
    }

    #[test]
    fn test_select_steps_respects_target_and_forbidden() {
        let mut rng = SeedChain::new(1).rng("score", 0, 0);
        let mut scores = [0.0; STEPS_PER_BAR];
        scores[2] = 3.0;
        scores[6] = 2.0;
        scores[10] = 1.0;
        let chosen = select_steps(&scores, &[2], 2, 1, 8, &[], &mut rng);
        assert_eq!(chosen, vec![6, 10]);
    }

    #[test]
    fn test_select_steps_min_gap() {
        let mut rng = SeedChain::new(2).rng("score", 0, 0);
        let mut scores = [0.0; STEPS_PER_BAR];
        scores[4] = 3.0;
        scores[5] = 2.9;
        scores[8] = 2.0;
        let chosen = select_steps(&scores, &[], 2, 2, 8, &[], &mut rng);
        assert_eq!(chosen, vec![4, 8], "step 5 too close to 4");
    }

    #[test]
    fn test_select_steps_max_consecutive() {
        let mut rng = SeedChain::new(3).rng("score", 0, 0);
        let mut scores = [0.0; STEPS_PER_BAR];
        for (i, s) in scores.iter_mut().enumerate().take(5) {
            *s = 5.0 - i as f64 * 0.1;
        }
        let chosen = select_steps(&scores, &[], 5, 1, 2, &[], &mut rng);
        // Runs longer than 2 are rejected.
        for w in chosen.windows(3) {
            assert!(!(w[1] == w[0] + 1 && w[2] == w[1] + 1));
        }
    }

    #[test]
    fn test_select_steps_retries_vary_near_ties() {
        // All-zero scores are one big tie: distinct streams pick distinct
        // layouts, which is what gives validation retries their power.
        let scores = [0.0; STEPS_PER_BAR];
        let chain = SeedChain::new(4);
        let layouts: Vec<Vec<usize>> = (0..4)
            .map(|attempt| {
                let mut rng = chain.rng("score", attempt, 0);
                select_steps(&scores, &[], 4, 1, 8, &[], &mut rng)
            })
            .collect();
        assert!(
            layouts.windows(2).any(|w| w[0] != w[1]),
            "four attempts never diverged"
        );

        // Same stream, same layout.
        let mut a = chain.rng("score", 0, 0);
        let mut b = chain.rng("score", 0, 0);
        assert_eq!(
            select_steps(&scores, &[], 4, 1, 8, &[], &mut a),
            select_steps(&scores, &[], 4, 1, 8, &[], &mut b)
        );
    }
}
