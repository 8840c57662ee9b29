// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bass-line validation: density, register, kick-overlap and motif
//! coherence checks, plus the fixed-order relaxation repairs.

use crate::analysis::SlotGrid;
use crate::timebase::STEPS_PER_BAR;

use super::motif::hamming_similarity;
use super::{BassModeProfile, BassNote, KickOverlapPolicy};

/// A failed constraint found during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    KickOverlap { bar: u32, step: usize },
    Density { bar: u32, count: usize, min: usize, max: usize },
    Register { bar: u32, pitch: u8 },
    Coherence { bar: u32, similarity: f64 },
}

/// Relaxation stages, applied in this order when retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relaxation {
    KickOverlap,
    Density,
    Coherence,
}

/// Fixed relaxation order.
pub const RELAX_ORDER: [Relaxation; 3] = [
    Relaxation::KickOverlap,
    Relaxation::Density,
    Relaxation::Coherence,
];

fn steps_of_bar(notes: &[BassNote], bar: u32) -> Vec<usize> {
    let mut steps: Vec<usize> = notes
        .iter()
        .filter(|n| n.meta.bar == bar)
        .map(|n| n.meta.step as usize)
        .collect();
    steps.sort_unstable();
    steps.dedup();
    steps
}

fn kick_collides(policy: KickOverlapPolicy, is_kick: bool, step: usize) -> bool {
    match policy {
        KickOverlapPolicy::Allow => false,
        KickOverlapPolicy::AllowBarStart => is_kick && step != 0,
        KickOverlapPolicy::Forbid => is_kick,
    }
}

/// Check every constraint; an empty result means the line is valid.
pub fn check(
    notes: &[BassNote],
    grid: &SlotGrid,
    profiles: &[BassModeProfile],
    bars: u32,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for bar in 0..bars {
        let profile = &profiles[bar as usize];
        let bar_notes: Vec<&BassNote> =
            notes.iter().filter(|n| n.meta.bar == bar).collect();

        let count = bar_notes.len();
        if count < profile.density_min || count > profile.density_max {
            violations.push(Violation::Density {
                bar,
                count,
                min: profile.density_min,
                max: profile.density_max,
            });
        }

        for note in &bar_notes {
            if note.pitch < profile.register_lo || note.pitch > profile.register_hi {
                violations.push(Violation::Register {
                    bar,
                    pitch: note.pitch,
                });
            }
            let step = note.meta.step as usize;
            if step < STEPS_PER_BAR {
                let is_kick = grid.label(bar as usize, step).is_kick;
                if kick_collides(profile.kick_overlap, is_kick, step) {
                    violations.push(Violation::KickOverlap { bar, step });
                }
            }
        }
    }

    // Motif coherence between adjacent bars, skipping variation boundaries.
    for bar in 0..bars.saturating_sub(1) {
        let next = bar + 1;
        if super::motif::boundary_variation(next).is_some() {
            continue;
        }
        let a = steps_of_bar(notes, bar);
        let b = steps_of_bar(notes, next);
        if a.is_empty() && b.is_empty() {
            continue;
        }
        let similarity = hamming_similarity(&a, &b);
        if similarity < 0.5 {
            violations.push(Violation::Coherence {
                bar: next,
                similarity,
            });
        }
    }

    violations
}

/// Apply one relaxation stage in place, returning a summary when anything
/// changed.
pub fn relax(
    notes: &mut Vec<BassNote>,
    grid: &SlotGrid,
    profiles: &[BassModeProfile],
    bars: u32,
    stage: Relaxation,
) -> Option<String> {
    match stage {
        Relaxation::KickOverlap => {
            let before = notes.len();
            notes.retain(|n| {
                let bar = n.meta.bar;
                let step = n.meta.step as usize;
                if bar >= bars || step >= STEPS_PER_BAR {
                    return true;
                }
                let profile = &profiles[bar as usize];
                let is_kick = grid.label(bar as usize, step).is_kick;
                !kick_collides(profile.kick_overlap, is_kick, step)
            });
            let removed = before - notes.len();
            (removed > 0).then(|| format!("removed {} kick-colliding bass notes", removed))
        }
        Relaxation::Density => {
            let mut edits = 0usize;
            for bar in 0..bars {
                let profile = &profiles[bar as usize];
                let mut idx: Vec<usize> = notes
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.meta.bar == bar)
                    .map(|(i, _)| i)
                    .collect();
                // Surplus: keep the anchor and earliest notes, drop from the end.
                while idx.len() > profile.density_max {
                    let Some(drop) = idx.pop() else { break };
                    notes.remove(drop);
                    edits += 1;
                    idx = notes
                        .iter()
                        .enumerate()
                        .filter(|(_, n)| n.meta.bar == bar)
                        .map(|(i, _)| i)
                        .collect();
                }
                // Deficit: pad with root pulses on free, collision-safe steps.
                let mut count = idx.len();
                if count < profile.density_min {
                    let occupied = steps_of_bar(notes, bar);
                    let root = notes
                        .iter()
                        .find(|n| n.meta.bar == bar)
                        .map(|n| n.pitch)
                        .unwrap_or(profile.register_lo);
                    for step in 0..STEPS_PER_BAR {
                        if count >= profile.density_min {
                            break;
                        }
                        if occupied.contains(&step) {
                            continue;
                        }
                        let is_kick = grid.label(bar as usize, step).is_kick;
                        if kick_collides(profile.kick_overlap, is_kick, step) {
                            continue;
                        }
                        notes.push(BassNote {
                            pitch: root,
                            start_beat: bar as f64 * 4.0 + step as f64 * 0.25,
                            duration_beats: 0.25 * profile.gate_steps,
                            velocity: profile.velocity_normal,
                            meta: super::BassNoteMeta {
                                bar,
                                step: step as u8,
                                pool_index: 0,
                                anchor: false,
                            },
                        });
                        count += 1;
                        edits += 1;
                    }
                }
            }
            notes.sort_by(|a, b| {
                a.start_beat
                    .partial_cmp(&b.start_beat)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            (edits > 0).then(|| format!("adjusted density with {} edits", edits))
        }
        // Coherence is accepted as-is once the earlier stages ran.
        Relaxation::Coherence => Some("accepted reduced motif coherence".to_string()),
    }
}
