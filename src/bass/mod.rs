// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Groove-aware bass engine.
//!
//! Reads the analyzed drum grid, picks a per-bar mode, selects steps by
//! drum-aware slot scoring, realises pitches from a repeating motif, and
//! validates the result with bounded retries and a fixed relaxation order.

pub mod motif;
pub mod score;
pub mod validate;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::SlotGrid;
use crate::error::{Diagnostics, EngineError};
use crate::rhythm::is_offbeat_step;
use crate::timebase::{SeedChain, STEPS_PER_BAR};

use motif::{boundary_variation, Motif};
use score::{slot_score, BassWeights};

/// Validation attempts before relaxation begins.
const MAX_ATTEMPTS: u32 = 4;

/// The six bass personalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BassModeName {
    SubAnchor,
    RootFifthDriver,
    PocketGroove,
    RollingOstinato,
    OffbeatStabs,
    LeadIsh,
}

/// How a mode treats slots occupied by the kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickOverlapPolicy {
    /// Never share a step with the kick.
    Forbid,
    /// Share only the bar-start step.
    AllowBarStart,
    /// No restriction.
    Allow,
}

/// Static per-mode parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BassModeProfile {
    pub name: BassModeName,
    pub density_min: usize,
    pub density_max: usize,
    pub register_lo: u8,
    pub register_hi: u8,
    /// Semitone offsets from the root forming the pitch pool.
    pub pitch_pool: &'static [i8],
    pub kick_overlap: KickOverlapPolicy,
    pub offbeat_only: bool,
    pub max_consecutive_notes: usize,
    /// Note length in 16th steps.
    pub gate_steps: f64,
    pub velocity_normal: u8,
    pub velocity_accent: u8,
}

impl BassModeName {
    /// Profile for this mode.
    pub fn profile(self) -> BassModeProfile {
        match self {
            BassModeName::SubAnchor => BassModeProfile {
                name: self,
                density_min: 1,
                density_max: 3,
                register_lo: 33,
                register_hi: 48,
                pitch_pool: &[0, 12],
                kick_overlap: KickOverlapPolicy::AllowBarStart,
                offbeat_only: false,
                max_consecutive_notes: 2,
                gate_steps: 1.0,
                velocity_normal: 100,
                velocity_accent: 108,
            },
            BassModeName::RootFifthDriver => BassModeProfile {
                name: self,
                density_min: 2,
                density_max: 6,
                register_lo: 34,
                register_hi: 52,
                pitch_pool: &[0, 7, 12],
                kick_overlap: KickOverlapPolicy::AllowBarStart,
                offbeat_only: false,
                max_consecutive_notes: 3,
                gate_steps: 0.5,
                velocity_normal: 96,
                velocity_accent: 110,
            },
            BassModeName::PocketGroove => BassModeProfile {
                name: self,
                density_min: 4,
                density_max: 10,
                register_lo: 34,
                register_hi: 54,
                pitch_pool: &[0, 7, 10],
                kick_overlap: KickOverlapPolicy::Allow,
                offbeat_only: false,
                max_consecutive_notes: 4,
                gate_steps: 0.4,
                velocity_normal: 90,
                velocity_accent: 115,
            },
            BassModeName::RollingOstinato => BassModeProfile {
                name: self,
                density_min: 4,
                density_max: 8,
                register_lo: 36,
                register_hi: 52,
                pitch_pool: &[0, 7, 10, 12],
                kick_overlap: KickOverlapPolicy::AllowBarStart,
                offbeat_only: false,
                max_consecutive_notes: 8,
                gate_steps: 0.6,
                velocity_normal: 92,
                velocity_accent: 105,
            },
            BassModeName::OffbeatStabs => BassModeProfile {
                name: self,
                density_min: 2,
                density_max: 4,
                register_lo: 36,
                register_hi: 55,
                pitch_pool: &[0, 12],
                kick_overlap: KickOverlapPolicy::Forbid,
                offbeat_only: true,
                max_consecutive_notes: 2,
                gate_steps: 0.3,
                velocity_normal: 105,
                velocity_accent: 120,
            },
            BassModeName::LeadIsh => BassModeProfile {
                name: self,
                density_min: 6,
                density_max: 12,
                register_lo: 38,
                register_hi: 62,
                pitch_pool: &[0, 7, 10, 12, 14],
                kick_overlap: KickOverlapPolicy::Allow,
                offbeat_only: false,
                max_consecutive_notes: 6,
                gate_steps: 0.6,
                velocity_normal: 90,
                velocity_accent: 105,
            },
        }
    }
}

/// Bass section of the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BassConfig {
    /// Fixed mode; overrides tags and energy.
    #[serde(default)]
    pub mode: Option<BassModeName>,
    /// Explicit per-bar mode list, cycled over the bars.
    #[serde(default)]
    pub per_bar_modes: Option<Vec<BassModeName>>,
    /// Root MIDI note.
    #[serde(default = "default_root_note")]
    pub root_note: u8,
    /// Optional density target as a fraction of the 16 steps.
    #[serde(default)]
    pub density_target: Option<f64>,
    /// Slot-scoring weights.
    #[serde(default)]
    pub weights: BassWeights,
    /// Minimum distance between successive onsets, in steps.
    #[serde(default = "default_min_gap")]
    pub min_inter_note_gap_steps: usize,
    /// Emit ghost notes one 32nd before each kick.
    #[serde(default)]
    pub prekick_ghosts: bool,
}

fn default_root_note() -> u8 {
    45
}

fn default_min_gap() -> usize {
    1
}

impl Default for BassConfig {
    fn default() -> Self {
        Self {
            mode: None,
            per_bar_modes: None,
            root_note: default_root_note(),
            density_target: None,
            weights: BassWeights::default(),
            min_inter_note_gap_steps: default_min_gap(),
            prekick_ghosts: false,
        }
    }
}

impl BassConfig {
    /// Range checks for the bass section.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.root_note > 127 {
            return Err(EngineError::InvalidConfig(format!(
                "bass root_note {} above 127",
                self.root_note
            )));
        }
        if let Some(d) = self.density_target {
            if !(0.0..=1.0).contains(&d) {
                return Err(EngineError::InvalidConfig(format!(
                    "bass density_target {} out of range [0,1]",
                    d
                )));
            }
        }
        if let Some(modes) = &self.per_bar_modes {
            if modes.is_empty() {
                return Err(EngineError::InvalidConfig(
                    "bass per_bar_modes must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Provenance for one bass note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BassNoteMeta {
    pub bar: u32,
    pub step: u8,
    pub pool_index: usize,
    pub anchor: bool,
}

/// A pitched bass event in beat time.
#[derive(Debug, Clone, PartialEq)]
pub struct BassNote {
    pub pitch: u8,
    pub start_beat: f64,
    pub duration_beats: f64,
    pub velocity: u8,
    pub meta: BassNoteMeta,
}

/// Bass engine output.
#[derive(Debug, Clone, PartialEq)]
pub struct BassResult {
    pub notes: Vec<BassNote>,
    pub modes: Vec<BassModeName>,
    pub diagnostics: Diagnostics,
}

/// Pick a mode from tags and analyzed drum energy.
pub fn choose_mode(tags: &[String], energy: f64) -> BassModeName {
    let has = |t: &str| tags.iter().any(|tag| tag.eq_ignore_ascii_case(t));

    if has("minimal") || has("dubby") {
        return if energy < 4.0 {
            BassModeName::SubAnchor
        } else {
            BassModeName::OffbeatStabs
        };
    }
    if has("warehouse") || has("urgent") || has("industrial") {
        return if energy < 6.0 {
            BassModeName::RootFifthDriver
        } else if energy < 9.0 {
            BassModeName::PocketGroove
        } else {
            BassModeName::RollingOstinato
        };
    }
    if has("rolling") || has("hypnotic") {
        return if energy < 6.0 {
            BassModeName::PocketGroove
        } else {
            BassModeName::RollingOstinato
        };
    }

    if energy < 4.0 {
        BassModeName::SubAnchor
    } else if energy < 8.0 {
        BassModeName::RootFifthDriver
    } else {
        BassModeName::RollingOstinato
    }
}

/// Generate the bass line for an analyzed drum grid.
///
/// Validation failures retry with an incremented RNG stream up to four
/// attempts, then relax constraints in the fixed order kick-overlap →
/// density → motif coherence. The pipeline never fails here.
pub fn generate(
    grid: &SlotGrid,
    config: &BassConfig,
    tags: &[String],
    chain: &SeedChain,
    bars: u32,
) -> BassResult {
    let modes = plan_modes(grid, config, tags, bars);
    let profiles: Vec<BassModeProfile> = modes.iter().map(|m| m.profile()).collect();
    let mut diagnostics = Diagnostics::default();

    let mut notes = Vec::new();
    let mut valid = false;
    for attempt in 0..MAX_ATTEMPTS {
        notes = build_line(grid, config, &profiles, chain, bars, attempt);
        if validate::check(&notes, grid, &profiles, bars).is_empty() {
            valid = true;
            break;
        }
    }

    if !valid {
        diagnostics.bass_relaxations += 1;
        for stage in validate::RELAX_ORDER {
            if let Some(summary) = validate::relax(&mut notes, grid, &profiles, bars, stage) {
                warn!(stage = ?stage, %summary, "bass validation relaxed");
                diagnostics.warn(format!("bass: {}", summary));
            }
            if validate::check(&notes, grid, &profiles, bars).is_empty() {
                break;
            }
        }
    }

    if config.prekick_ghosts {
        add_prekick_ghosts(&mut notes, grid, config, &profiles, bars);
    }

    notes.sort_by(|a, b| {
        a.start_beat
            .partial_cmp(&b.start_beat)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.pitch.cmp(&b.pitch))
    });

    BassResult {
        notes,
        modes,
        diagnostics,
    }
}

/// Per-bar mode assignment: fixed override, explicit list, or tags+energy.
fn plan_modes(
    grid: &SlotGrid,
    config: &BassConfig,
    tags: &[String],
    bars: u32,
) -> Vec<BassModeName> {
    if let Some(fixed) = config.mode {
        return vec![fixed; bars as usize];
    }
    if let Some(list) = &config.per_bar_modes {
        return (0..bars as usize)
            .map(|bar| list[bar % list.len()])
            .collect();
    }
    (0..bars as usize)
        .map(|bar| {
            let energy = if bar < grid.bar_count() {
                grid.bar(bar).energy()
            } else {
                grid.mean_energy()
            };
            choose_mode(tags, energy)
        })
        .collect()
}

/// One full construction pass over all bars.
fn build_line(
    grid: &SlotGrid,
    config: &BassConfig,
    profiles: &[BassModeProfile],
    chain: &SeedChain,
    bars: u32,
    attempt: u32,
) -> Vec<BassNote> {
    let mut notes = Vec::new();
    let mut current_motif: Option<Motif> = None;
    let mut prev_mode: Option<BassModeName> = None;

    for bar in 0..bars {
        let profile = &profiles[bar as usize];
        let mut rng = chain.rng("bass/steps", attempt, bar);

        let mode_changed = prev_mode != Some(profile.name);
        prev_mode = Some(profile.name);

        if mode_changed || current_motif.is_none() {
            let steps = pick_steps(grid, config, profile, bar, &mut rng);
            current_motif = Some(Motif::from_steps(&steps, profile.pitch_pool));
        } else if let Some(m) = current_motif.as_mut() {
            if let Some(variation) = boundary_variation(bar) {
                m.vary(variation, profile.pitch_pool, &mut rng);
            }
        }

        if let Some(motif) = &current_motif {
            realise_bar(grid, config, profile, motif, bar, &mut notes);
        }
    }

    notes
}

/// Score and select the onset steps for a fresh motif. Each validation
/// attempt arrives with its own RNG stream, so near-tied slots land
/// differently from retry to retry.
fn pick_steps<R: Rng>(
    grid: &SlotGrid,
    config: &BassConfig,
    profile: &BassModeProfile,
    bar: u32,
    rng: &mut R,
) -> Vec<usize> {
    let bar_idx = (bar as usize).min(grid.bar_count().saturating_sub(1));

    let density_mid =
        config.density_target.map(|d| d * STEPS_PER_BAR as f64).unwrap_or_else(|| {
            (profile.density_min + profile.density_max) as f64 / 2.0
        });
    let target = (density_mid.round() as usize)
        .clamp(profile.density_min, profile.density_max);

    let mut forbidden: Vec<usize> = Vec::new();
    for step in 0..STEPS_PER_BAR {
        let label = grid.label(bar_idx, step);
        let forbid_kick = match profile.kick_overlap {
            KickOverlapPolicy::Forbid => label.is_kick,
            KickOverlapPolicy::AllowBarStart => label.is_kick && step != 0,
            KickOverlapPolicy::Allow => false,
        };
        if forbid_kick || (profile.offbeat_only && !is_offbeat_step(step)) {
            forbidden.push(step);
        }
    }

    let mut anchored: Vec<usize> = Vec::new();
    if !profile.offbeat_only && !forbidden.contains(&0) {
        anchored.push(0);
    }

    let mut scores = [0.0; STEPS_PER_BAR];
    for (step, slot) in scores.iter_mut().enumerate() {
        let label = grid.label(bar_idx, step);
        *slot = slot_score(
            profile.name,
            profile.kick_overlap,
            &label,
            step,
            &anchored,
            &config.weights,
        );
    }

    let remaining = target.saturating_sub(anchored.len());
    let mut steps = anchored.clone();
    steps.extend(score::select_steps(
        &scores,
        &forbidden,
        remaining,
        config.min_inter_note_gap_steps,
        profile.max_consecutive_notes,
        &anchored,
        rng,
    ));
    steps.sort_unstable();
    steps.dedup();
    steps
}

/// Realise one bar of notes from the motif cells.
fn realise_bar(
    grid: &SlotGrid,
    config: &BassConfig,
    profile: &BassModeProfile,
    motif: &Motif,
    bar: u32,
    notes: &mut Vec<BassNote>,
) {
    let bar_idx = (bar as usize).min(grid.bar_count().saturating_sub(1));
    let root = config
        .root_note
        .clamp(profile.register_lo, profile.register_hi);
    let gravity = (profile.register_lo as i16 + profile.register_hi as i16) / 2;

    let mut bar_notes: Vec<BassNote> = Vec::with_capacity(motif.cells.len());
    for &(step, pool_index) in &motif.cells {
        let offset = profile.pitch_pool.get(pool_index).copied().unwrap_or(0);
        let pitch = (root as i16 + offset as i16)
            .clamp(profile.register_lo as i16, profile.register_hi as i16)
            as u8;
        let label = grid.label(bar_idx, step.min(STEPS_PER_BAR - 1));
        let velocity = if label.bar_start || label.hat_dense {
            profile.velocity_accent
        } else {
            profile.velocity_normal
        };
        bar_notes.push(BassNote {
            pitch,
            start_beat: bar as f64 * 4.0 + step as f64 * 0.25,
            duration_beats: 0.25 * profile.gate_steps,
            velocity,
            meta: BassNoteMeta {
                bar,
                step: step as u8,
                pool_index,
                anchor: step == 0,
            },
        });
    }

    // Register gravitation: keep the bar's average near the register centre.
    if !bar_notes.is_empty() {
        let avg: i16 = bar_notes.iter().map(|n| n.pitch as i16).sum::<i16>()
            / bar_notes.len() as i16;
        let shift: i16 = if avg > gravity + 6 {
            -12
        } else if avg < gravity - 6 {
            12
        } else {
            0
        };
        if shift != 0 {
            for n in bar_notes.iter_mut() {
                let moved = n.pitch as i16 + shift;
                if (profile.register_lo as i16..=profile.register_hi as i16).contains(&moved) {
                    n.pitch = moved as u8;
                }
            }
        }
    }

    notes.extend(bar_notes);
}

/// Ghost notes one 32nd before every kick, ending strictly before it.
fn add_prekick_ghosts(
    notes: &mut Vec<BassNote>,
    grid: &SlotGrid,
    config: &BassConfig,
    profiles: &[BassModeProfile],
    bars: u32,
) {
    for bar in 0..bars {
        let bar_idx = (bar as usize).min(grid.bar_count().saturating_sub(1));
        let profile = &profiles[bar as usize];
        let root = config
            .root_note
            .clamp(profile.register_lo, profile.register_hi);
        for &step in &grid.bar(bar_idx).kick_steps {
            let start = bar as f64 * 4.0 + step as f64 * 0.25 - 0.125;
            if start < bar as f64 * 4.0 {
                continue;
            }
            notes.push(BassNote {
                pitch: root,
                start_beat: start,
                duration_beats: 0.12,
                velocity: 70,
                meta: BassNoteMeta {
                    bar,
                    step: step as u8,
                    pool_index: 0,
                    anchor: false,
                },
            });
        }
    }
}
