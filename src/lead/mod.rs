// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Theory-aware lead engine.
//!
//! Plans CALL/RESP phrases over the bar range, fuses rhythm and contour
//! templates into logical notes, assigns function-typed scale degrees and
//! realises them as pitches via voice-leading, aligned to the drum grid.

pub mod phrase;
pub mod realise;
pub mod templates;

use serde::{Deserialize, Serialize};

use crate::analysis::SlotGrid;
use crate::bass::BassNote;
use crate::error::{Diagnostics, EngineError};
use crate::music::{HarmonyTrack, KeySpec, ScaleType};
use crate::timebase::SeedChain;

pub use phrase::{PhraseRole, PhraseSegment};
pub use realise::{LeadNote, LogicalNote, PhrasePosition, ToneCategory};

/// The built-in lead personalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadModeName {
    LyricalCr,
    HypnoticArp,
    RollingArp,
    MinimalStab,
}

/// Static per-mode parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadModeProfile {
    pub name: LeadModeName,
    pub register_low: u8,
    pub register_high: u8,
    pub gravity_center: u8,
    pub velocity_normal: u8,
    pub velocity_accent: u8,
}

impl LeadModeName {
    /// Profile for this mode.
    pub fn profile(self) -> LeadModeProfile {
        match self {
            LeadModeName::LyricalCr => LeadModeProfile {
                name: self,
                register_low: 62,
                register_high: 84,
                gravity_center: 72,
                velocity_normal: 92,
                velocity_accent: 108,
            },
            LeadModeName::HypnoticArp => LeadModeProfile {
                name: self,
                register_low: 60,
                register_high: 79,
                gravity_center: 67,
                velocity_normal: 88,
                velocity_accent: 100,
            },
            LeadModeName::RollingArp => LeadModeProfile {
                name: self,
                register_low: 60,
                register_high: 81,
                gravity_center: 69,
                velocity_normal: 90,
                velocity_accent: 104,
            },
            LeadModeName::MinimalStab => LeadModeProfile {
                name: self,
                register_low: 64,
                register_high: 86,
                gravity_center: 74,
                velocity_normal: 98,
                velocity_accent: 114,
            },
        }
    }

    /// Map aesthetic tags to a mode; `None` when nothing matches.
    pub fn from_tags(tags: &[String]) -> Option<Self> {
        let has = |t: &str| tags.iter().any(|tag| tag.eq_ignore_ascii_case(t));
        if has("lyrical") || has("lyrical_cr") {
            Some(LeadModeName::LyricalCr)
        } else if has("hypnotic") {
            Some(LeadModeName::HypnoticArp)
        } else if has("rolling") {
            Some(LeadModeName::RollingArp)
        } else if has("minimal") {
            Some(LeadModeName::MinimalStab)
        } else {
            None
        }
    }
}

/// Explicit key override in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    pub root_pc: u8,
    pub scale: ScaleType,
}

/// Scoring and voice-leading weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeadWeights {
    #[serde(default = "default_w_pref")]
    pub w_pref: f64,
    #[serde(default = "default_w_anchor")]
    pub w_anchor: f64,
    #[serde(default = "default_w_strength")]
    pub w_strength: f64,
    #[serde(default = "default_w_density")]
    pub w_density: f64,
    #[serde(default = "default_w_overlap")]
    pub w_overlap: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

fn default_w_pref() -> f64 {
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
fn default_alpha() -> f64 {
    1.0
}
fn default_beta() -> f64 {
    0.3
}
fn default_gamma() -> f64 {
    0.5
}

impl Default for LeadWeights {
    fn default() -> Self {
        Self {
            w_pref: default_w_pref(),
            w_anchor: default_w_anchor(),
            w_strength: default_w_strength(),
            w_density: default_w_density(),
            w_overlap: default_w_overlap(),
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
        }
    }
}

/// Bass-interaction policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BassInteractionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum semitone distance to any overlapping bass note.
    #[serde(default = "default_min_distance")]
    pub min_semitone_distance: u8,
    /// Keep the lead off the root when the bass states it on a strong beat.
    #[serde(default)]
    pub avoid_root_on_bass_hits: bool,
}

fn default_true() -> bool {
    true
}
fn default_min_distance() -> u8 {
    3
}

impl Default for BassInteractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_semitone_distance: default_min_distance(),
            avoid_root_on_bass_hits: false,
        }
    }
}

/// Lead section of the engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeadConfig {
    /// Fixed mode; otherwise tags decide, falling back to minimal stabs.
    #[serde(default)]
    pub mode: Option<LeadModeName>,
    /// Key override; otherwise derived from tags or the bass line.
    #[serde(default)]
    pub key: Option<KeyConfig>,
    #[serde(default = "default_phrase_min")]
    pub phrase_min_bars: u32,
    #[serde(default = "default_phrase_max")]
    pub phrase_max_bars: u32,
    /// Role cycle, e.g. "CRCR".
    #[serde(default = "default_pattern")]
    pub call_response_pattern: String,
    /// Degrees a phrase may end on.
    #[serde(default = "default_resolution_degrees")]
    pub phrase_end_resolution_degrees: Vec<usize>,
    #[serde(default)]
    pub weights: LeadWeights,
    /// Slot-alignment search radius in steps.
    #[serde(default = "default_jitter")]
    pub max_step_jitter: usize,
    #[serde(default = "default_gap")]
    pub min_inter_note_gap_steps: usize,
    /// Register drift applied once per phrase, in semitones.
    #[serde(default = "default_drift")]
    pub register_drift_per_phrase: u8,
    #[serde(default)]
    pub bass_interaction: BassInteractionConfig,
}

fn default_phrase_min() -> u32 {
    2
}
fn default_phrase_max() -> u32 {
    4
}
fn default_pattern() -> String {
    "CRCR".to_string()
}
fn default_resolution_degrees() -> Vec<usize> {
    vec![1, 5]
}
fn default_jitter() -> usize {
    2
}
fn default_gap() -> usize {
    1
}
fn default_drift() -> u8 {
    2
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            mode: None,
            key: None,
            phrase_min_bars: default_phrase_min(),
            phrase_max_bars: default_phrase_max(),
            call_response_pattern: default_pattern(),
            phrase_end_resolution_degrees: default_resolution_degrees(),
            weights: LeadWeights::default(),
            max_step_jitter: default_jitter(),
            min_inter_note_gap_steps: default_gap(),
            register_drift_per_phrase: default_drift(),
            bass_interaction: BassInteractionConfig::default(),
        }
    }
}

impl LeadConfig {
    /// Range checks for the lead section.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.phrase_min_bars == 0 || self.phrase_min_bars > self.phrase_max_bars {
            return Err(EngineError::InvalidConfig(format!(
                "lead phrase bars [{},{}] invalid",
                self.phrase_min_bars, self.phrase_max_bars
            )));
        }
        if !self
            .call_response_pattern
            .chars()
            .all(|c| matches!(c.to_ascii_uppercase(), 'C' | 'R'))
            || self.call_response_pattern.is_empty()
        {
            return Err(EngineError::InvalidConfig(format!(
                "lead call_response_pattern '{}' must be a non-empty string of C/R",
                self.call_response_pattern
            )));
        }
        for &d in &self.phrase_end_resolution_degrees {
            if !(1..=7).contains(&d) {
                return Err(EngineError::InvalidConfig(format!(
                    "lead resolution degree {} out of range [1,7]",
                    d
                )));
            }
        }
        if let Some(k) = &self.key {
            if k.root_pc > 11 {
                return Err(EngineError::InvalidConfig(format!(
                    "lead key root_pc {} out of range [0,11]",
                    k.root_pc
                )));
            }
        }
        Ok(())
    }
}

/// Lead engine output.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadResult {
    pub notes: Vec<LeadNote>,
    pub key: KeySpec,
    pub mode: LeadModeName,
    pub diagnostics: Diagnostics,
}

/// Generate the lead line against an analyzed drum grid.
pub fn generate(
    grid: &SlotGrid,
    config: &LeadConfig,
    tags: &[String],
    bass: Option<&[BassNote]>,
    chain: &SeedChain,
    bars: u32,
    ppq: u32,
) -> LeadResult {
    let mode = config
        .mode
        .or_else(|| LeadModeName::from_tags(tags))
        .unwrap_or(LeadModeName::MinimalStab);
    let profile = mode.profile();

    let key = match &config.key {
        Some(k) => KeySpec::new(k.root_pc, k.scale, 5),
        None => phrase::derive_key(tags, bass, KeySpec::new(9, ScaleType::Aeolian, 5)),
    };
    let harmony = HarmonyTrack::tonic_minor(key, bars as usize);
    let plan = phrase::plan_phrases(
        bars,
        config.phrase_min_bars,
        config.phrase_max_bars,
        &config.call_response_pattern,
    );

    let (notes, diagnostics) = realise::realise(
        grid, key, &harmony, &plan, &profile, config, bass, chain, ppq,
    );

    LeadResult {
        notes,
        key,
        mode,
        diagnostics,
    }
}
