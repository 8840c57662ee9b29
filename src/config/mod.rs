// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for a generation run.
//!
//! This module provides the declarative records consumed by the engines:
//! timebase, per-layer rhythm parameters, controller targets and guardrails,
//! parameter modulators, and the optional bass/lead sections. Configurations
//! load from JSON; unknown keys are rejected at parse time, and `validate`
//! checks every declared range before generation starts.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bass::BassConfig;
use crate::error::EngineError;
use crate::lead::LeadConfig;
use crate::rhythm::accent::AccentProfile;
use crate::rhythm::conditions::StepCondition;

/// Layer names the drum engine recognises.
pub const KNOWN_LAYERS: [&str; 5] = ["kick", "hat_c", "hat_o", "snare", "clap"];

/// Supported PPQ resolutions.
pub const KNOWN_PPQ: [u32; 5] = [96, 192, 480, 960, 1920];

/// Which engines run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    /// Drums only.
    #[serde(rename = "drums_only")]
    DrumsOnly,
    /// Drums plus bass.
    #[serde(rename = "drums+bass", alias = "drums_bass")]
    DrumsBass,
    /// Drums, bass and lead.
    #[serde(rename = "full")]
    Full,
}

impl EngineMode {
    /// True when the bass engine runs.
    pub fn has_bass(self) -> bool {
        matches!(self, EngineMode::DrumsBass | EngineMode::Full)
    }

    /// True when the lead engine runs.
    pub fn has_lead(self) -> bool {
        matches!(self, EngineMode::Full)
    }

    /// Stable name used in metadata.
    pub fn name(self) -> &'static str {
        match self {
            EngineMode::DrumsOnly => "drums_only",
            EngineMode::DrumsBass => "drums+bass",
            EngineMode::Full => "full",
        }
    }
}

/// Root configuration for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine selection.
    pub mode: EngineMode,
    /// Tempo in BPM.
    pub bpm: f64,
    /// Ticks per quarter note.
    pub ppq: u32,
    /// Number of 4/4 bars.
    pub bars: u32,
    /// Root RNG seed; the whole run is a pure function of config + seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Per-layer drum parameters, keyed by layer name.
    #[serde(default)]
    pub layers: BTreeMap<String, LayerConfig>,
    /// Controller and density targets.
    #[serde(default)]
    pub targets: Targets,
    /// Continuity guardrails.
    #[serde(default)]
    pub guard: Guard,
    /// Long-horizon parameter modulators (feedback variant).
    #[serde(default)]
    pub modulators: Vec<ModulatorConfig>,
    /// Accent lane for the post-schedule velocity pass.
    #[serde(default)]
    pub accent: AccentProfile,
    /// Run the closed-loop controller instead of the open-loop renderer.
    #[serde(default)]
    pub feedback: bool,
    /// Aesthetic tags steering bass/lead mode and key selection.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Bass engine section.
    #[serde(default)]
    pub bass: Option<BassConfig>,
    /// Lead engine section.
    #[serde(default)]
    pub lead: Option<LeadConfig>,
}

fn default_seed() -> u64 {
    1234
}

impl EngineConfig {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_json(&contents)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse JSON configuration")
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize configuration to JSON")
    }

    /// Save configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Check every declared range; must pass before any generation.
    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        if !(60.0..=240.0).contains(&self.bpm) {
            return Err(EngineError::InvalidConfig(format!(
                "bpm {} out of range [60,240]",
                self.bpm
            )));
        }
        if !KNOWN_PPQ.contains(&self.ppq) {
            return Err(EngineError::InvalidConfig(format!(
                "ppq {} not one of {:?}",
                self.ppq, KNOWN_PPQ
            )));
        }
        if self.ppq % 4 != 0 {
            return Err(EngineError::InvalidConfig(format!(
                "ppq {} not divisible by 4",
                self.ppq
            )));
        }
        if !(1..=128).contains(&self.bars) {
            return Err(EngineError::InvalidConfig(format!(
                "bars {} out of range [1,128]",
                self.bars
            )));
        }

        for (name, layer) in &self.layers {
            if !KNOWN_LAYERS.contains(&name.as_str()) {
                return Err(EngineError::ReferenceMissing(format!(
                    "unknown layer '{}'",
                    name
                )));
            }
            layer.validate(name)?;
            for cond in &layer.conditions {
                if let Some(referenced) = cond.referenced_layer() {
                    if !self.layers.contains_key(referenced) {
                        return Err(EngineError::ReferenceMissing(format!(
                            "layer '{}' condition references unknown layer '{}'",
                            name, referenced
                        )));
                    }
                }
            }
        }

        self.targets.validate()?;

        for (i, m) in self.modulators.iter().enumerate() {
            m.validate(i, &self.layers)?;
        }

        if !(0.0..=1.0).contains(&self.accent.prob) {
            return Err(EngineError::InvalidConfig(format!(
                "accent.prob {} out of range [0,1]",
                self.accent.prob
            )));
        }

        if let Some(bass) = &self.bass {
            bass.validate()?;
        }
        if let Some(lead) = &self.lead {
            lead.validate()?;
        }
        Ok(())
    }
}

/// Parameters for one drum layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayerConfig {
    /// Steps per bar; 16 in this engine.
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Euclidean onset count.
    pub fills: u32,
    /// Initial mask rotation.
    #[serde(default)]
    pub rot: u32,
    /// MIDI note number.
    pub note: u8,
    /// Base velocity.
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    /// Swing percentage; 0.5 is straight, capped at 0.62.
    #[serde(default)]
    pub swing_percent: Option<f64>,
    /// Constant micro offset in milliseconds when no bins are set.
    #[serde(default)]
    pub micro_ms: f64,
    /// Discrete micro-offset bins in milliseconds.
    #[serde(default)]
    pub beat_bins_ms: Vec<f64>,
    /// Probabilities for `beat_bins_ms`.
    #[serde(default)]
    pub beat_bins_probs: Vec<f64>,
    /// Clamp for a sampled bin offset.
    #[serde(default)]
    pub beat_bin_cap_ms: Option<f64>,
    /// Restrict onsets to 8th-note offbeats (steps 2, 6, 10, 14).
    #[serde(default)]
    pub offbeats_only: bool,
    /// Probability an onset becomes a ratchet.
    #[serde(default)]
    pub ratchet_prob: f64,
    /// Sub-hit count for ratcheted onsets.
    #[serde(default = "default_ratchet_repeat")]
    pub ratchet_repeat: u32,
    /// Note of the layer that chokes this one.
    #[serde(default)]
    pub choke_with_note: Option<u8>,
    /// Mask rotation drift in steps per bar.
    #[serde(default)]
    pub rotation_rate_per_bar: f64,
    /// Probability of a quiet ghost one 32nd before an onset.
    #[serde(default)]
    pub ghost_pre1_prob: f64,
    /// Probability of displacing the beat-1 onset onto step 2.
    #[serde(default)]
    pub displace_into_2_prob: f64,
    /// Condition stack applied after mask construction.
    #[serde(default)]
    pub conditions: Vec<StepCondition>,
}

fn default_steps() -> u32 {
    16
}

fn default_velocity() -> u8 {
    100
}

fn default_ratchet_repeat() -> u32 {
    2
}

impl LayerConfig {
    /// Minimal layer with a note and fill count.
    pub fn new(note: u8, fills: u32) -> Self {
        Self {
            steps: default_steps(),
            fills,
            rot: 0,
            note,
            velocity: default_velocity(),
            swing_percent: None,
            micro_ms: 0.0,
            beat_bins_ms: Vec::new(),
            beat_bins_probs: Vec::new(),
            beat_bin_cap_ms: None,
            offbeats_only: false,
            ratchet_prob: 0.0,
            ratchet_repeat: default_ratchet_repeat(),
            choke_with_note: None,
            rotation_rate_per_bar: 0.0,
            ghost_pre1_prob: 0.0,
            displace_into_2_prob: 0.0,
            conditions: Vec::new(),
        }
    }

    fn validate(&self, name: &str) -> std::result::Result<(), EngineError> {
        if self.steps != 16 {
            return Err(EngineError::InvalidConfig(format!(
                "layer '{}': steps must be 16, got {}",
                name, self.steps
            )));
        }
        if self.fills > self.steps {
            return Err(EngineError::InvalidConfig(format!(
                "layer '{}': fills {} exceeds steps {}",
                name, self.fills, self.steps
            )));
        }
        if self.note > 127 {
            return Err(EngineError::InvalidConfig(format!(
                "layer '{}': note {} above 127",
                name, self.note
            )));
        }
        if !(1..=127).contains(&self.velocity) {
            return Err(EngineError::InvalidConfig(format!(
                "layer '{}': velocity {} out of range [1,127]",
                name, self.velocity
            )));
        }
        if let Some(sp) = self.swing_percent {
            if !(0.5..=0.62).contains(&sp) {
                return Err(EngineError::InvalidConfig(format!(
                    "layer '{}': swing_percent {} out of range [0.5,0.62]",
                    name, sp
                )));
            }
        }
        if !(0.0..=0.3).contains(&self.ratchet_prob) {
            return Err(EngineError::InvalidConfig(format!(
                "layer '{}': ratchet_prob {} out of range [0,0.3]",
                name, self.ratchet_prob
            )));
        }
        if self.beat_bins_ms.len() != self.beat_bins_probs.len() {
            return Err(EngineError::InvalidConfig(format!(
                "layer '{}': beat_bins_ms and beat_bins_probs lengths differ",
                name
            )));
        }
        for p in [self.ghost_pre1_prob, self.displace_into_2_prob] {
            if !(0.0..=1.0).contains(&p) {
                return Err(EngineError::InvalidConfig(format!(
                    "layer '{}': probability {} out of range [0,1]",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// Metric targets driving the density clamp and the feedback controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Targets {
    /// Syncopation band lower edge.
    #[serde(rename = "S_low", default = "default_s_low")]
    pub s_low: f64,
    /// Syncopation band upper edge.
    #[serde(rename = "S_high", default = "default_s_high")]
    pub s_high: f64,
    /// Entrainment target.
    #[serde(rename = "E_target", default = "default_e_target")]
    pub e_target: f64,
    /// Aggregate micro-offset cap in milliseconds per layer.
    #[serde(rename = "T_ms_cap", default = "default_t_cap")]
    pub t_ms_cap: f64,
    /// Hat density band lower edge.
    #[serde(rename = "H_low", default = "default_h_low")]
    pub h_low: f64,
    /// Hat density band upper edge.
    #[serde(rename = "H_high", default = "default_h_high")]
    pub h_high: f64,
    /// Hat density clamp target.
    #[serde(default = "default_hat_target")]
    pub hat_density_target: f64,
    /// Hat density clamp tolerance.
    #[serde(default = "default_hat_tol")]
    pub hat_density_tol: f64,
}

fn default_s_low() -> f64 {
    0.35
}
fn default_s_high() -> f64 {
    0.55
}
fn default_e_target() -> f64 {
    0.8
}
fn default_t_cap() -> f64 {
    12.0
}
fn default_h_low() -> f64 {
    0.5
}
fn default_h_high() -> f64 {
    0.85
}
fn default_hat_target() -> f64 {
    0.7
}
fn default_hat_tol() -> f64 {
    0.05
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            s_low: default_s_low(),
            s_high: default_s_high(),
            e_target: default_e_target(),
            t_ms_cap: default_t_cap(),
            h_low: default_h_low(),
            h_high: default_h_high(),
            hat_density_target: default_hat_target(),
            hat_density_tol: default_hat_tol(),
        }
    }
}

impl Targets {
    fn validate(&self) -> std::result::Result<(), EngineError> {
        if self.s_low > self.s_high {
            return Err(EngineError::InvalidConfig(format!(
                "S_low {} above S_high {}",
                self.s_low, self.s_high
            )));
        }
        if self.t_ms_cap < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "T_ms_cap {} negative",
                self.t_ms_cap
            )));
        }
        for (name, v) in [
            ("E_target", self.e_target),
            ("hat_density_target", self.hat_density_target),
            ("hat_density_tol", self.hat_density_tol),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::InvalidConfig(format!(
                    "{} {} out of range [0,1]",
                    name, v
                )));
            }
        }
        Ok(())
    }
}

/// Continuity guardrails for the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Guard {
    /// Minimum entrainment before rescue triggers.
    #[serde(rename = "min_E", default = "default_min_e")]
    pub min_e: f64,
    /// Maximum rotation drift rate in steps per bar.
    #[serde(default = "default_max_rot")]
    pub max_rot_rate: f64,
    /// Freeze the kick layer: no conditions, no variation, no rescue edits.
    #[serde(default = "default_kick_immutable")]
    pub kick_immutable: bool,
}

fn default_min_e() -> f64 {
    0.7
}
fn default_max_rot() -> f64 {
    0.125
}
fn default_kick_immutable() -> bool {
    true
}

impl Default for Guard {
    fn default() -> Self {
        Self {
            min_e: default_min_e(),
            max_rot_rate: default_max_rot(),
            kick_immutable: default_kick_immutable(),
        }
    }
}

/// Modulation mode for a parameter path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulatorMode {
    /// Bounded random increments.
    RandomWalk,
    /// Ornstein-Uhlenbeck relaxation toward the range midpoint.
    Ou,
    /// Sine phase-locked to the bar index.
    Sine,
}

/// A long-horizon parameter modulator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModulatorConfig {
    /// Target parameter path, e.g. `hat_c.swing_percent` or `thin_bias`.
    pub param_path: String,
    /// Modulation mode.
    pub mode: ModulatorMode,
    /// Lower clip.
    pub min_val: f64,
    /// Upper clip.
    pub max_val: f64,
    /// Increment scale per bar.
    #[serde(default = "default_step_per_bar")]
    pub step_per_bar: f64,
    /// OU relaxation constant / sine period in bars.
    #[serde(default)]
    pub tau: Option<f64>,
    /// Per-bar delta cap.
    #[serde(default = "default_max_delta")]
    pub max_delta_per_bar: f64,
    /// Initial sine phase in [0,1).
    #[serde(default)]
    pub phase: Option<f64>,
}

fn default_step_per_bar() -> f64 {
    0.01
}
fn default_max_delta() -> f64 {
    0.05
}

impl ModulatorConfig {
    fn validate(
        &self,
        index: usize,
        layers: &BTreeMap<String, LayerConfig>,
    ) -> std::result::Result<(), EngineError> {
        if self.min_val > self.max_val {
            return Err(EngineError::InvalidConfig(format!(
                "modulator {}: min_val {} above max_val {}",
                index, self.min_val, self.max_val
            )));
        }
        if !param_path_is_known(&self.param_path, layers) {
            return Err(EngineError::ReferenceMissing(format!(
                "modulator {}: unknown param_path '{}'",
                index, self.param_path
            )));
        }
        Ok(())
    }
}

/// Recognised modulator parameter paths.
pub fn param_path_is_known(path: &str, layers: &BTreeMap<String, LayerConfig>) -> bool {
    match path {
        "thin_bias" | "accent.prob" | "kick.rotation_rate_per_bar" => true,
        _ => match path.split_once('.') {
            Some((layer, field)) => {
                layers.contains_key(layer)
                    && matches!(field, "swing_percent" | "ratchet_prob")
            }
            None => false,
        },
    }
}
