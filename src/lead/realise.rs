// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Lead realiser: fuses rhythm and contour templates into logical notes,
//! samples tone functions, maps degrees to pitches with voice-leading, and
//! aligns events onto the drum slot grid.

use rand::Rng;
use tracing::warn;

use crate::analysis::{SlotGrid, SlotLabel};
use crate::bass::BassNote;
use crate::error::Diagnostics;
use crate::music::{HarmonyTrack, KeySpec};
use crate::rhythm::is_offbeat_step;
use crate::timebase::{step_ticks, ticks_per_bar, weighted_choice, SeedChain, STEPS_PER_BAR};

use super::phrase::{PhraseRole, PhraseSegment};
use super::templates::{pick_contour, pick_rhythm, AnchorType, Tension};
use super::{LeadConfig, LeadModeProfile, LeadWeights};

/// Position of a logical note inside its phrase segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhrasePosition {
    Start,
    Inner,
    End,
}

/// Harmonic function of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneCategory {
    Chord,
    Color,
    Passing,
}

/// A planned note before pitch and slot assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalNote {
    pub segment: u32,
    pub role: PhraseRole,
    pub position: PhrasePosition,
    pub bar: u32,
    pub step: usize,
    pub length_steps: usize,
    pub accent: bool,
    pub strong: bool,
    pub contour_index: usize,
    pub contour_interval: i8,
    pub emphasised: bool,
    pub tension: Tension,
    pub anchor: AnchorType,
    pub resolution_required: bool,
}

/// A fully realised lead note.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start_tick: u64,
    pub duration_ticks: u64,
    pub degree: usize,
    pub category: ToneCategory,
    pub bar: u32,
    pub step: usize,
    /// Closes a phrase; pinned to a resolution degree.
    pub phrase_end: bool,
}

/// Probabilities over {chord, color, passing} for a note context.
pub fn function_profile(role: PhraseRole, position: PhrasePosition, strong: bool) -> [f64; 3] {
    let mut p = match (position, strong) {
        (PhrasePosition::Start, true) => [0.8, 0.15, 0.05],
        (PhrasePosition::Start, false) => [0.6, 0.25, 0.15],
        (PhrasePosition::Inner, true) => [0.55, 0.3, 0.15],
        (PhrasePosition::Inner, false) => [0.35, 0.3, 0.35],
        (PhrasePosition::End, true) => [0.9, 0.1, 0.0],
        (PhrasePosition::End, false) => [0.75, 0.2, 0.05],
    };
    // Responses answer more plainly than calls.
    if role == PhraseRole::Resp {
        p[0] += 0.1;
    }
    p
}

/// Run the full realisation for a phrase plan.
#[allow(clippy::too_many_arguments)]
pub fn realise(
    grid: &SlotGrid,
    key: KeySpec,
    harmony: &HarmonyTrack,
    plan: &[PhraseSegment],
    profile: &LeadModeProfile,
    config: &LeadConfig,
    bass: Option<&[BassNote]>,
    chain: &SeedChain,
    ppq: u32,
) -> (Vec<LeadNote>, Diagnostics) {
    let mut diagnostics = Diagnostics::default();
    let logical = plan_logical_notes(grid, plan, chain);
    let degrees = assign_degrees(
        &logical,
        key,
        harmony,
        &config.phrase_end_resolution_degrees,
        chain,
    );
    let pitches = lead_pitches(&logical, &degrees, key, profile, config, chain);
    let mut notes = align_slots(
        grid,
        &logical,
        &degrees,
        &pitches,
        profile,
        &config.weights,
        config.max_step_jitter,
        config.min_inter_note_gap_steps,
        ppq,
        &mut diagnostics,
    );
    enforce_phrase_end_resolution(&mut notes, plan, key, profile, config);
    clip_durations(&mut notes, ppq);
    if let Some(bass_notes) = bass {
        if config.bass_interaction.enabled {
            resolve_bass_collisions(
                &mut notes,
                bass_notes,
                key,
                harmony,
                profile,
                config,
                ppq,
            );
        }
    }
    (notes, diagnostics)
}

/// Fuse rhythm templates into bar-tiled logical notes.
fn plan_logical_notes(
    grid: &SlotGrid,
    plan: &[PhraseSegment],
    chain: &SeedChain,
) -> Vec<LogicalNote> {
    let mut out = Vec::new();
    for segment in plan {
        let mut rhythm_rng = chain.rng("lead/rhythm", segment.id, 0);
        let mut contour_rng = chain.rng("lead/contour", segment.id, 0);
        let rhythm = pick_rhythm(segment.role, &mut rhythm_rng);
        let contour = pick_contour(segment.role, &mut contour_rng);

        let seg_first = out.len();
        let mut contour_index = 0usize;
        for bar in segment.start_bar..segment.end_bar() {
            for ev in rhythm.events {
                let bar_idx = (bar as usize).min(grid.bar_count().saturating_sub(1));
                let label = grid.label(bar_idx, ev.step);
                let ci = contour_index % contour.intervals.len();
                out.push(LogicalNote {
                    segment: segment.id,
                    role: segment.role,
                    position: PhrasePosition::Inner,
                    bar,
                    step: ev.step,
                    length_steps: ev.length_steps,
                    accent: ev.accent,
                    strong: label.bar_start || label.snare_zone || label.is_kick,
                    contour_index,
                    contour_interval: contour.intervals[ci],
                    emphasised: contour.emphasis_indices.contains(&ci),
                    tension: contour.tension[ci],
                    anchor: ev.anchor,
                    resolution_required: segment.resolution_required,
                });
                contour_index += 1;
            }
        }
        if out.len() > seg_first {
            out[seg_first].position = PhrasePosition::Start;
            let last = out.len() - 1;
            out[last].position = PhrasePosition::End;
        }
    }
    out
}

/// Sample tone categories and walk the contour into concrete degrees.
fn assign_degrees(
    logical: &[LogicalNote],
    key: KeySpec,
    harmony: &HarmonyTrack,
    resolution_degrees: &[usize],
    chain: &SeedChain,
) -> Vec<(usize, ToneCategory)> {
    let degree_count = key.scale_type.degree_count();
    let mut out = Vec::with_capacity(logical.len());
    let mut prev_degree: usize = harmony.tonic(0);
    let mut cum_offset: i32 = 0;

    for (ordinal, note) in logical.iter().enumerate() {
        let bar = note.bar as usize;
        let probs = function_profile(note.role, note.position, note.strong);
        let mut rng = chain.rng("lead/function", note.segment, ordinal as u32);
        let mut category = match weighted_choice(&mut rng, &probs) {
            0 => ToneCategory::Chord,
            1 => ToneCategory::Color,
            _ => ToneCategory::Passing,
        };
        // Passing tones on strong beats degrade to chord tones.
        if category == ToneCategory::Passing && note.strong {
            category = ToneCategory::Chord;
        }

        if note.contour_index == 0 {
            cum_offset = 0;
        }
        cum_offset += note.contour_interval as i32;
        let raw = ((harmony.tonic(bar) as i32 - 1 + cum_offset)
            .rem_euclid(degree_count as i32)) as usize
            + 1;

        let mut degree = match category {
            ToneCategory::Chord => nearest_degree(raw, harmony.chord_tones(bar), degree_count),
            ToneCategory::Color => nearest_degree(raw, harmony.color_tones(bar), degree_count),
            ToneCategory::Passing => {
                // Step off the previous degree in the contour's direction.
                let dir: i32 = if note.contour_interval < 0 { -1 } else { 1 };
                let stepped =
                    (prev_degree as i32 - 1 + dir).rem_euclid(degree_count as i32) as usize + 1;
                stepped
            }
        };

        // Phrase-end resolution.
        if note.position == PhrasePosition::End
            && (note.resolution_required || note.tension == Tension::Resolve)
        {
            degree = nearest_degree(degree, resolution_degrees, degree_count);
        }

        prev_degree = degree;
        out.push((degree, category));
    }
    out
}

/// Nearest degree (cyclic distance) to `target` from `candidates`.
fn nearest_degree(target: usize, candidates: &[usize], degree_count: usize) -> usize {
    let dist = |a: usize, b: usize| {
        let d = (a as i32 - b as i32).rem_euclid(degree_count as i32) as usize;
        d.min(degree_count - d)
    };
    candidates
        .iter()
        .copied()
        .min_by_key(|&c| (dist(target, c), c))
        .unwrap_or(target)
}

/// Voice-leading: choose an octave for each degree minimising jump,
/// gravity distance and emphasis violations.
fn lead_pitches(
    logical: &[LogicalNote],
    degrees: &[(usize, ToneCategory)],
    key: KeySpec,
    profile: &LeadModeProfile,
    config: &LeadConfig,
    chain: &SeedChain,
) -> Vec<u8> {
    let w = &config.weights;
    let mut out = Vec::with_capacity(logical.len());
    let mut prev_pitch: Option<u8> = None;
    let mut drift: i16 = 0;
    let mut current_segment = u32::MAX;

    for (note, &(degree, _)) in logical.iter().zip(degrees) {
        if note.segment != current_segment {
            current_segment = note.segment;
            let mut rng = chain.rng("lead/drift", note.segment, 0);
            let d = config.register_drift_per_phrase as i16;
            drift = *[-d, 0, d]
                .get(rng.gen_range(0..3usize))
                .unwrap_or(&0);
        }
        let gravity = (profile.gravity_center as i16 + drift)
            .clamp(profile.register_low as i16, profile.register_high as i16);

        let anchor = prev_pitch.unwrap_or(key.snap(gravity.clamp(0, 127) as u8));
        let mut best: Option<(f64, u8)> = None;
        for octave_offset in -2i8..=3 {
            let pitch = key.degree_to_pitch(degree, octave_offset);
            if pitch < profile.register_low || pitch > profile.register_high {
                continue;
            }
            let jump = (pitch as f64 - anchor as f64).abs();
            let gravity_pull = (pitch as f64 - gravity as f64).abs();
            let violates = note.emphasised
                && prev_pitch.is_some()
                && ((note.contour_interval > 0 && pitch <= anchor)
                    || (note.contour_interval < 0 && pitch >= anchor));
            let cost =
                w.alpha * jump + w.beta * gravity_pull + w.gamma * f64::from(violates as u8);
            let better = match best {
                None => true,
                Some((best_cost, best_pitch)) => {
                    cost < best_cost - 1e-12 || (cost < best_cost + 1e-12 && pitch < best_pitch)
                }
            };
            if better {
                best = Some((cost, pitch));
            }
        }
        let pitch = best
            .map(|(_, p)| p)
            .unwrap_or_else(|| key.snap(profile.gravity_center));
        prev_pitch = Some(pitch);
        out.push(pitch);
    }
    out
}

fn role_slot_pref(role: PhraseRole, label: &SlotLabel, step: usize) -> f64 {
    let mut w = 0.0;
    match role {
        PhraseRole::Call => {
            if label.bar_start {
                w += 0.8;
            }
            if label.hat_dense {
                w += 0.4;
            }
            if is_offbeat_step(step) {
                w += 0.3;
            }
        }
        PhraseRole::Resp => {
            if label.snare_zone {
                w += 0.6;
            }
            if label.hat_sparse {
                w += 0.4;
            }
            if is_offbeat_step(step) {
                w += 0.3;
            }
        }
    }
    w
}

fn anchor_bonus(anchor: AnchorType, label: &SlotLabel, step: usize) -> f64 {
    let hit = match anchor {
        AnchorType::BarStart => label.bar_start,
        AnchorType::Offbeat => is_offbeat_step(step),
        AnchorType::SnareZone => label.snare_zone,
        AnchorType::Any => return 0.5,
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Align each logical note onto a slot near its nominal step.
#[allow(clippy::too_many_arguments)]
fn align_slots(
    grid: &SlotGrid,
    logical: &[LogicalNote],
    degrees: &[(usize, ToneCategory)],
    pitches: &[u8],
    profile: &LeadModeProfile,
    weights: &LeadWeights,
    max_jitter: usize,
    min_gap: usize,
    ppq: u32,
    diagnostics: &mut Diagnostics,
) -> Vec<LeadNote> {
    let mut notes: Vec<LeadNote> = Vec::with_capacity(logical.len());
    let mut placed: Vec<u64> = Vec::new(); // absolute step index

    for ((note, &(degree, category)), &pitch) in logical.iter().zip(degrees).zip(pitches) {
        let bar_idx = (note.bar as usize).min(grid.bar_count().saturating_sub(1));
        let jitter = max_jitter as i32;

        let mut best: Option<(f64, usize)> = None;
        for dj in -jitter..=jitter {
            let cand = note.step as i32 + dj;
            if !(0..STEPS_PER_BAR as i32).contains(&cand) {
                continue;
            }
            let cand = cand as usize;
            // Phrase openings stay in the first quarter of their bar.
            if note.position == PhrasePosition::Start && cand > 3 {
                continue;
            }
            let abs = note.bar as u64 * STEPS_PER_BAR as u64 + cand as u64;
            if placed.contains(&abs) {
                continue;
            }
            if min_gap > 0
                && placed
                    .iter()
                    .any(|&p| p.abs_diff(abs) < min_gap as u64)
            {
                continue;
            }
            let label = grid.label(bar_idx, cand);
            let sparsity = if placed.iter().any(|&p| p.abs_diff(abs) <= 1) {
                0.0
            } else {
                1.0
            };
            let score = weights.w_pref * role_slot_pref(note.role, &label, cand)
                + weights.w_anchor * anchor_bonus(note.anchor, &label, cand)
                + weights.w_strength * f64::from(note.strong as u8)
                + weights.w_density * sparsity;
            let better = match best {
                None => true,
                Some((bs, bc)) => score > bs + 1e-12 || (score > bs - 1e-12 && cand < bc),
            };
            if better {
                best = Some((score, cand));
            }
        }

        match best {
            Some((_, step)) => {
                let abs = note.bar as u64 * STEPS_PER_BAR as u64 + step as u64;
                placed.push(abs);
                let start_tick =
                    note.bar as u64 * ticks_per_bar(ppq) + step as u64 * step_ticks(ppq);
                let velocity = if note.accent {
                    profile.velocity_accent
                } else {
                    profile.velocity_normal
                };
                notes.push(LeadNote {
                    pitch,
                    velocity,
                    start_tick,
                    duration_ticks: note.length_steps as u64 * step_ticks(ppq),
                    degree,
                    category,
                    bar: note.bar,
                    step,
                    phrase_end: note.position == PhrasePosition::End,
                });
            }
            None => {
                diagnostics.lead_events_dropped += 1;
                warn!(
                    bar = note.bar,
                    step = note.step,
                    "lead event dropped: no slot satisfies the minimum gap"
                );
            }
        }
    }

    notes.sort_by_key(|n| n.start_tick);
    notes
}

/// Pin each resolution-required segment's closing note (temporally last
/// after alignment) to the nearest resolution degree.
fn enforce_phrase_end_resolution(
    notes: &mut [LeadNote],
    plan: &[PhraseSegment],
    key: KeySpec,
    profile: &LeadModeProfile,
    config: &LeadConfig,
) {
    let degree_count = key.scale_type.degree_count();
    for segment in plan.iter().filter(|s| s.resolution_required) {
        let Some(last_idx) = notes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.bar >= segment.start_bar && n.bar < segment.end_bar())
            .max_by_key(|(_, n)| n.start_tick)
            .map(|(i, _)| i)
        else {
            continue;
        };
        let note = &mut notes[last_idx];
        note.phrase_end = true;
        if config.phrase_end_resolution_degrees.contains(&note.degree) {
            continue;
        }
        let degree = nearest_degree(
            note.degree,
            &config.phrase_end_resolution_degrees,
            degree_count,
        );
        // Nearest realisation of the resolved degree to the current pitch.
        let mut best: Option<(i32, u8)> = None;
        for octave_offset in -2i8..=3 {
            let p = key.degree_to_pitch(degree, octave_offset);
            if p < profile.register_low || p > profile.register_high {
                continue;
            }
            let dist = (p as i32 - note.pitch as i32).abs();
            if best.map(|(d, _)| dist < d).unwrap_or(true) {
                best = Some((dist, p));
            }
        }
        if let Some((_, p)) = best {
            note.pitch = p;
            note.degree = degree;
            note.category = ToneCategory::Chord;
        }
    }
}

/// Monophony: clip each note at the next onset.
fn clip_durations(notes: &mut [LeadNote], _ppq: u32) {
    for i in 0..notes.len().saturating_sub(1) {
        let next_start = notes[i + 1].start_tick;
        let end = notes[i].start_tick + notes[i].duration_ticks;
        if end > next_start {
            notes[i].duration_ticks = next_start.saturating_sub(notes[i].start_tick).max(1);
        }
    }
}

/// Resolve close encounters with the bass: substitute a neighbour degree,
/// then shift octave, then shorten the lead note.
#[allow(clippy::too_many_arguments)]
fn resolve_bass_collisions(
    notes: &mut [LeadNote],
    bass: &[BassNote],
    key: KeySpec,
    harmony: &HarmonyTrack,
    profile: &LeadModeProfile,
    config: &LeadConfig,
    ppq: u32,
) {
    let interaction = &config.bass_interaction;
    let min_dist = interaction.min_semitone_distance as i32;

    for note in notes.iter_mut() {
        let note_end = note.start_tick + note.duration_ticks;
        for b in bass {
            let b_start = (b.start_beat * ppq as f64).round() as u64;
            let b_end = b_start + (b.duration_beats * ppq as f64).round().max(1.0) as u64;
            if b_start >= note_end || b_end <= note.start_tick {
                continue;
            }

            let force_off_root = interaction.avoid_root_on_bass_hits
                && b.meta.step % 4 == 0
                && b.pitch % 12 == key.root_pc
                && note.degree == 1;

            let too_close = (note.pitch as i32 - b.pitch as i32).abs() < min_dist;
            if !too_close && !force_off_root {
                continue;
            }

            let bar = note.bar as usize;
            let pool: &[usize] = match note.category {
                ToneCategory::Chord => harmony.chord_tones(bar),
                ToneCategory::Color => harmony.color_tones(bar),
                ToneCategory::Passing => harmony.chord_tones(bar),
            };

            // 1. Same-category neighbour degree. Phrase-end notes keep
            // their resolution degree and go straight to octave shifts.
            let mut fixed = false;
            let pool: &[usize] = if note.phrase_end { &[] } else { pool };
            for &cand_degree in pool {
                if cand_degree == note.degree || (force_off_root && cand_degree == 1) {
                    continue;
                }
                for octave_offset in -1i8..=2 {
                    let p = key.degree_to_pitch(cand_degree, octave_offset);
                    if p < profile.register_low || p > profile.register_high {
                        continue;
                    }
                    if (p as i32 - b.pitch as i32).abs() >= min_dist {
                        note.pitch = p;
                        note.degree = cand_degree;
                        fixed = true;
                        break;
                    }
                }
                if fixed {
                    break;
                }
            }
            if fixed {
                continue;
            }

            // 2. Octave shift within register.
            for shift in [12i32, -12] {
                let p = note.pitch as i32 + shift;
                if (profile.register_low as i32..=profile.register_high as i32).contains(&p)
                    && (p - b.pitch as i32).abs() >= min_dist
                {
                    note.pitch = p as u8;
                    fixed = true;
                    break;
                }
            }
            if fixed {
                continue;
            }

            // 3. Shorten the lead note to end before the bass onset.
            if b_start > note.start_tick {
                note.duration_ticks = (b_start - note.start_tick).max(1);
            }
        }
    }
}
