// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Drum engine: Euclidean layers, condition gates, micro-timing, chokes,
//! density shaping and the closed-loop controller variant.
//!
//! Two render paths share the same step core. The open-loop path builds
//! every bar from the layer configurations alone; the feedback path
//! ([`controller`]) drives per-step probabilities toward the configured
//! metric targets bar by bar.

pub mod controller;
pub mod layer;
pub mod markov;
pub mod metrics;
pub mod modulate;

use std::collections::BTreeMap;

use crate::config::{EngineConfig, LayerConfig, KNOWN_LAYERS};
use crate::error::Diagnostics;
use crate::rhythm::density::{enforce_density, void_weights};
use crate::rhythm::{empty_mask, StepMask};
use crate::timebase::{step_ticks, ticks_per_bar, SeedChain};

use metrics::BarMetrics;

/// Drum layer identity, in engine processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerId {
    Kick,
    HatClosed,
    HatOpen,
    Snare,
    Clap,
}

impl LayerId {
    /// All layers in processing order (kick first: later stages read its mask).
    pub const ALL: [LayerId; 5] = [
        LayerId::Kick,
        LayerId::HatClosed,
        LayerId::HatOpen,
        LayerId::Snare,
        LayerId::Clap,
    ];

    /// Configuration name for this layer.
    pub fn name(self) -> &'static str {
        match self {
            LayerId::Kick => "kick",
            LayerId::HatClosed => "hat_c",
            LayerId::HatOpen => "hat_o",
            LayerId::Snare => "snare",
            LayerId::Clap => "clap",
        }
    }

    /// Parse a configuration layer name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "kick" => Some(LayerId::Kick),
            "hat_c" => Some(LayerId::HatClosed),
            "hat_o" => Some(LayerId::HatOpen),
            "snare" => Some(LayerId::Snare),
            "clap" => Some(LayerId::Clap),
            _ => None,
        }
    }

    /// Stable component index for seed derivation.
    pub fn component(self) -> u32 {
        match self {
            LayerId::Kick => 0,
            LayerId::HatClosed => 1,
            LayerId::HatOpen => 2,
            LayerId::Snare => 3,
            LayerId::Clap => 4,
        }
    }

    /// General MIDI percussion default for this layer.
    pub fn default_note(self) -> u8 {
        match self {
            LayerId::Kick => 36,
            LayerId::HatClosed => 42,
            LayerId::HatOpen => 46,
            LayerId::Snare => 38,
            LayerId::Clap => 39,
        }
    }
}

/// One scheduled drum onset on the 16-step grid.
///
/// `micro_offset_ticks` stays within the layer's micro cap; structural
/// placement off the 16th grid (pre-ghosts) is carried by `offset_32nds`.
/// `ratchet > 1` means the onset splits into that many equal sub-hits at
/// scheduling time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumEvent {
    pub layer: LayerId,
    pub bar: u32,
    pub step: u8,
    pub velocity: u8,
    pub micro_offset_ticks: i64,
    pub duration_ticks: u64,
    pub offset_32nds: i8,
    pub ratchet: u8,
}

impl DrumEvent {
    /// Absolute start tick, clamped to the bar start so micro offsets never
    /// pull an event before its own bar.
    pub fn start_tick(&self, ppq: u32) -> u64 {
        let bar_start = self.bar as u64 * ticks_per_bar(ppq);
        let half = (step_ticks(ppq) / 2) as i64;
        let nominal = bar_start as i64
            + self.step as i64 * step_ticks(ppq) as i64
            + self.offset_32nds as i64 * half
            + self.micro_offset_ticks;
        nominal.max(bar_start as i64) as u64
    }

    /// Absolute end tick.
    pub fn end_tick(&self, ppq: u32) -> u64 {
        self.start_tick(ppq) + self.duration_ticks.max(1)
    }
}

/// Drum render output: events plus per-bar metrics and recovery counters.
#[derive(Debug, Clone)]
pub struct DrumRender {
    pub events: Vec<DrumEvent>,
    pub metrics: Vec<BarMetrics>,
    pub diagnostics: Diagnostics,
}

/// Render the drum tracks for a validated configuration.
///
/// Dispatches to the closed-loop controller when `feedback` is set,
/// otherwise runs the open-loop per-bar builder.
pub fn render(config: &EngineConfig, chain: &SeedChain) -> DrumRender {
    if config.feedback {
        controller::run_session(config, chain, None)
    } else {
        render_open_loop(config, chain)
    }
}

/// Configured layers in processing order.
pub fn ordered_layers(config: &EngineConfig) -> Vec<(LayerId, &LayerConfig)> {
    let mut out = Vec::new();
    for name in KNOWN_LAYERS {
        if let (Some(id), Some(cfg)) = (LayerId::parse(name), config.layers.get(name)) {
            out.push((id, cfg));
        }
    }
    out
}

/// Remove choked onsets: a layer configured with `choke_with_note` loses
/// any onset at a step where the choking layer fires.
pub fn apply_chokes(
    masks: &mut BTreeMap<LayerId, StepMask>,
    layers: &[(LayerId, &LayerConfig)],
) {
    for (id, cfg) in layers {
        let Some(choke_note) = cfg.choke_with_note else {
            continue;
        };
        let Some((choker, _)) = layers.iter().find(|(_, c)| c.note == choke_note) else {
            continue;
        };
        if choker == id {
            continue;
        }
        let choker_mask = match masks.get(choker) {
            Some(m) => *m,
            None => continue,
        };
        if let Some(mask) = masks.get_mut(id) {
            for step in 0..mask.len() {
                if choker_mask[step] {
                    mask[step] = false;
                }
            }
        }
    }
}

/// Accent pass: one gate roll per occupied step, applied to every event on
/// that step. Velocities may rise; positions never change.
pub fn apply_accents(
    events: &mut [DrumEvent],
    config: &EngineConfig,
    chain: &SeedChain,
    accent_prob_override: Option<f64>,
) {
    use crate::rhythm::accent::accent_velocity;

    let mut profile = config.accent.clone();
    if let Some(p) = accent_prob_override {
        profile.prob = p.clamp(0.0, 1.0);
    }
    if profile.prob <= 0.0 {
        return;
    }

    let mut gates: BTreeMap<(u32, u8), Option<f64>> = BTreeMap::new();
    for ev in events.iter() {
        let key = (ev.bar, ev.step);
        if !gates.contains_key(&key) {
            let mut rng = chain.rng("drums/accent", ev.step as u32, ev.bar);
            gates.insert(key, profile.roll(ev.step as usize, &mut rng));
        }
    }
    for ev in events.iter_mut() {
        if let Some(Some(gain)) = gates.get(&(ev.bar, ev.step)) {
            ev.velocity = accent_velocity(ev.velocity, *gain);
        }
    }
}

/// Open-loop render: every bar is built from the layer configurations.
fn render_open_loop(config: &EngineConfig, chain: &SeedChain) -> DrumRender {
    let layers = ordered_layers(config);
    let mut events: Vec<DrumEvent> = Vec::new();
    let mut bar_metrics: Vec<BarMetrics> = Vec::new();
    let mut prev_masks: BTreeMap<String, StepMask> = BTreeMap::new();

    for bar in 0..config.bars {
        let mut masks: BTreeMap<LayerId, StepMask> = BTreeMap::new();

        for (id, cfg) in &layers {
            let mut rng = chain.rng("drums/mask", id.component(), bar);
            let mask = layer::build_bar_mask(
                *id,
                cfg,
                bar,
                &config.guard,
                &prev_masks,
                &mut rng,
            );
            masks.insert(*id, mask);
        }

        apply_chokes(&mut masks, &layers);

        // Hat density clamp, biased away from the kick's void weights.
        if let Some(hat_mask) = masks.get(&LayerId::HatClosed).copied() {
            let kick_mask = masks
                .get(&LayerId::Kick)
                .copied()
                .unwrap_or_else(empty_mask);
            let weights = void_weights(&kick_mask);
            let mut clamped = hat_mask;
            enforce_density(
                &mut clamped,
                config.targets.hat_density_target,
                config.targets.hat_density_tol,
                &weights,
            );
            masks.insert(LayerId::HatClosed, clamped);
        }

        // Masks are frozen here; micro-timing and ornaments follow.
        for (id, cfg) in &layers {
            let mask = masks[id];
            let mut rng = chain.rng("drums/micro", id.component(), bar);
            layer::emit_events(
                *id,
                cfg,
                &mask,
                bar,
                cfg.swing_percent,
                config.targets.t_ms_cap,
                config.ppq,
                config.bpm,
                &mut rng,
                &mut events,
            );
        }

        for (id, _) in &layers {
            prev_masks.insert(id.name().to_string(), masks[id]);
        }

        bar_metrics.push(metrics::measure_bar(
            &events, bar, config.ppq, config.bpm,
        ));
    }

    apply_accents(&mut events, config, chain, None);

    DrumRender {
        events,
        metrics: bar_metrics,
        diagnostics: Diagnostics::default(),
    }
}

/// Deterministic backbone: kick 4/4, straight-16th closed hats with a
/// velocity staircase, snare and clap backbeats. No randomness at all.
pub fn backbone_events(bars: u32) -> Vec<DrumEvent> {
    let hat_velocities = [80u8, 65, 75, 65];
    let mut events = Vec::new();
    for bar in 0..bars {
        for step in [0u8, 4, 8, 12] {
            events.push(plain_event(LayerId::Kick, bar, step, 110));
        }
        for step in 0..16u8 {
            events.push(plain_event(
                LayerId::HatClosed,
                bar,
                step,
                hat_velocities[(step % 4) as usize],
            ));
        }
        for step in [4u8, 12] {
            events.push(plain_event(LayerId::Snare, bar, step, 96));
            events.push(plain_event(LayerId::Clap, bar, step, 92));
        }
    }
    events
}

fn plain_event(layer: LayerId, bar: u32, step: u8, velocity: u8) -> DrumEvent {
    DrumEvent {
        layer,
        bar,
        step,
        velocity,
        micro_offset_ticks: 0,
        duration_ticks: 0, // filled by the scheduler from step length
        offset_32nds: 0,
        ratchet: 1,
    }
}

/// Fill in zero durations with half a step, the engine's nominal hit length.
pub fn finalize_durations(events: &mut [DrumEvent], ppq: u32) {
    let half_step = (step_ticks(ppq) / 2).max(1);
    for ev in events.iter_mut() {
        if ev.duration_ticks == 0 {
            ev.duration_ticks = half_step;
        }
    }
}
