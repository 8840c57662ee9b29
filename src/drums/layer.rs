// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-bar layer construction: mask building and event emission.

use std::collections::BTreeMap;

use rand::Rng;

use crate::config::{Guard, LayerConfig};
use crate::rhythm::conditions::apply_conditions;
use crate::rhythm::euclid::{bar_mask, drift_rotation};
use crate::rhythm::micro::micro_offset_ticks;
use crate::rhythm::{is_offbeat_step, StepMask};
use crate::timebase::{bernoulli, step_ticks};

use super::{DrumEvent, LayerId};

/// Build one bar's onset mask for a layer.
///
/// Order: Euclidean mask with drifted rotation, offbeat restriction,
/// condition stack, displacement. The kick skips conditions and
/// displacement while `guard.kick_immutable` holds.
pub fn build_bar_mask<R: Rng>(
    id: LayerId,
    cfg: &LayerConfig,
    bar: u32,
    guard: &Guard,
    prev_masks: &BTreeMap<String, StepMask>,
    rng: &mut R,
) -> StepMask {
    let rot = drift_rotation(
        cfg.rotation_rate_per_bar,
        guard.max_rot_rate,
        cfg.rot as usize,
        bar,
    );
    let mut mask = bar_mask(cfg.fills as usize, rot);

    if cfg.offbeats_only {
        for (step, slot) in mask.iter_mut().enumerate() {
            if !is_offbeat_step(step) {
                *slot = false;
            }
        }
    }

    let kick_frozen = id == LayerId::Kick && guard.kick_immutable;
    if !kick_frozen {
        apply_conditions(&mut mask, bar, &cfg.conditions, prev_masks, rng);

        if cfg.displace_into_2_prob > 0.0
            && mask[0]
            && !mask[2]
            && bernoulli(rng, cfg.displace_into_2_prob)
        {
            mask[0] = false;
            mask[2] = true;
        }
    }

    mask
}

/// Emit events for a frozen mask: micro-timing, ratchet flags and
/// pre-ghosts. Appends to `out`.
#[allow(clippy::too_many_arguments)]
pub fn emit_events<R: Rng>(
    id: LayerId,
    cfg: &LayerConfig,
    mask: &StepMask,
    bar: u32,
    swing_percent: Option<f64>,
    t_ms_cap: f64,
    ppq: u32,
    bpm: f64,
    rng: &mut R,
    out: &mut Vec<DrumEvent>,
) {
    let half_step = (step_ticks(ppq) / 2).max(1);
    let bins_fallback;
    let (bins, probs): (&[f64], &[f64]) = if cfg.beat_bins_ms.is_empty() && cfg.micro_ms != 0.0 {
        bins_fallback = [cfg.micro_ms];
        (&bins_fallback, &[1.0])
    } else {
        (&cfg.beat_bins_ms, &cfg.beat_bins_probs)
    };

    for (step, &on) in mask.iter().enumerate() {
        if !on {
            continue;
        }
        let micro = micro_offset_ticks(
            step,
            swing_percent,
            bins,
            probs,
            cfg.beat_bin_cap_ms,
            Some(t_ms_cap),
            ppq,
            bpm,
            rng,
        );

        let ratchet = if cfg.ratchet_prob > 0.0 && bernoulli(rng, cfg.ratchet_prob) {
            cfg.ratchet_repeat.max(2) as u8
        } else {
            1
        };

        out.push(DrumEvent {
            layer: id,
            bar,
            step: step as u8,
            velocity: cfg.velocity,
            micro_offset_ticks: micro,
            duration_ticks: half_step,
            offset_32nds: 0,
            ratchet,
        });

        // Quiet ghost one 32nd ahead; step 0 would cross the bar start.
        if step > 0 && cfg.ghost_pre1_prob > 0.0 && bernoulli(rng, cfg.ghost_pre1_prob) {
            out.push(DrumEvent {
                layer: id,
                bar,
                step: step as u8,
                velocity: cfg.velocity.saturating_sub(40).max(60),
                micro_offset_ticks: 0,
                duration_ticks: (half_step / 2).max(1),
                offset_32nds: -1,
                ratchet: 1,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::onset_count;
    use crate::timebase::SeedChain;

    fn guard() -> Guard {
        Guard::default()
    }

    #[test]
    fn test_kick_four_on_floor() {
        let cfg = LayerConfig::new(36, 4);
        let mut rng = SeedChain::new(1).rng("layer", 0, 0);
        let mask = build_bar_mask(LayerId::Kick, &cfg, 0, &guard(), &BTreeMap::new(), &mut rng);
        assert!(mask[0] && mask[4] && mask[8] && mask[12]);
        assert_eq!(onset_count(&mask), 4);
    }

    #[test]
    fn test_offbeats_only_restricts() {
        let mut cfg = LayerConfig::new(46, 16);
        cfg.offbeats_only = true;
        let mut rng = SeedChain::new(2).rng("layer", 0, 0);
        let mask = build_bar_mask(
            LayerId::HatOpen,
            &cfg,
            0,
            &guard(),
            &BTreeMap::new(),
            &mut rng,
        );
        for (step, &on) in mask.iter().enumerate() {
            assert!(!on || is_offbeat_step(step));
        }
        assert_eq!(onset_count(&mask), 4);
    }

    #[test]
    fn test_kick_immutable_skips_conditions() {
        let mut cfg = LayerConfig::new(36, 4);
        cfg.conditions
            .push(crate::rhythm::conditions::StepCondition::Prob { p: 0.0 });
        let mut rng = SeedChain::new(3).rng("layer", 0, 0);

        let mask = build_bar_mask(LayerId::Kick, &cfg, 0, &guard(), &BTreeMap::new(), &mut rng);
        assert_eq!(onset_count(&mask), 4, "immutable kick ignores Prob(0)");

        let mut open = Guard::default();
        open.kick_immutable = false;
        let mask = build_bar_mask(LayerId::Kick, &cfg, 0, &open, &BTreeMap::new(), &mut rng);
        assert_eq!(onset_count(&mask), 0, "mutable kick honours Prob(0)");
    }

    #[test]
    fn test_displacement_moves_downbeat() {
        let mut cfg = LayerConfig::new(38, 1);
        cfg.displace_into_2_prob = 1.0;
        let mut rng = SeedChain::new(4).rng("layer", 0, 0);
        let mask = build_bar_mask(
            LayerId::Snare,
            &cfg,
            0,
            &guard(),
            &BTreeMap::new(),
            &mut rng,
        );
        assert!(!mask[0]);
        assert!(mask[2]);
    }

    #[test]
    fn test_emit_plain_events() {
        let cfg = LayerConfig::new(36, 4);
        let mut rng = SeedChain::new(5).rng("layer", 0, 0);
        let mask = crate::rhythm::mask_from_steps(&[0, 4, 8, 12]);
        let mut out = Vec::new();
        emit_events(
            LayerId::Kick,
            &cfg,
            &mask,
            0,
            None,
            12.0,
            1920,
            120.0,
            &mut rng,
            &mut out,
        );
        assert_eq!(out.len(), 4);
        for ev in &out {
            assert_eq!(ev.micro_offset_ticks, 0);
            assert_eq!(ev.ratchet, 1);
            assert_eq!(ev.offset_32nds, 0);
            assert_eq!(ev.duration_ticks, 240);
        }
    }

    #[test]
    fn test_emit_ghosts() {
        let mut cfg = LayerConfig::new(36, 4);
        cfg.ghost_pre1_prob = 1.0;
        let mut rng = SeedChain::new(6).rng("layer", 0, 0);
        let mask = crate::rhythm::mask_from_steps(&[0, 8]);
        let mut out = Vec::new();
        emit_events(
            LayerId::Kick,
            &cfg,
            &mask,
            0,
            None,
            12.0,
            1920,
            120.0,
            &mut rng,
            &mut out,
        );
        // Step 0 gets no ghost; step 8 gets one.
        assert_eq!(out.len(), 3);
        let ghost = out.iter().find(|e| e.offset_32nds == -1).unwrap();
        assert_eq!(ghost.step, 8);
        assert!(ghost.velocity < 110);
        // Ghost lands one 32nd before its parent step.
        assert_eq!(ghost.start_tick(1920), 8 * 480 - 240);
    }

    #[test]
    fn test_emit_ratchets_flagged() {
        let mut cfg = LayerConfig::new(42, 8);
        cfg.ratchet_prob = 0.3;
        cfg.ratchet_repeat = 3;
        let mut rng = SeedChain::new(7).rng("layer", 0, 0);
        let mask = crate::rhythm::mask_from_steps(&[0, 2, 4, 6, 8, 10, 12, 14]);
        let mut out = Vec::new();
        emit_events(
            LayerId::HatClosed,
            &cfg,
            &mask,
            0,
            None,
            12.0,
            1920,
            120.0,
            &mut rng,
            &mut out,
        );
        assert!(out.iter().all(|e| e.ratchet == 1 || e.ratchet == 3));
    }
}
