// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Closed-loop drum session.
//!
//! Per bar the controller cycles MEASURE → BIAS → MODULATE → GUARD → EMIT.
//! Measurement reads the metrics of the previous bar; the sync bias nudges
//! per-step probabilities toward the target syncopation band; modulators
//! drive named parameters; the guard triggers a one-bar rescue whenever
//! entrainment falls below `min_E`. The kick never varies while
//! `kick_immutable` holds.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::debug;

use crate::config::{EngineConfig, LayerConfig};
use crate::error::Diagnostics;
use crate::rhythm::density::{enforce_density, thin_probs_near_kick, void_weights};
use crate::rhythm::{empty_mask, StepMask};
use crate::timebase::{bernoulli, SeedChain, STEPS_PER_BAR};

use super::markov::{self, ProbVector};
use super::metrics::{self, BarMetrics};
use super::modulate::{clamp_delta, step_modulator};
use super::{apply_accents, apply_chokes, layer, ordered_layers, DrumEvent, DrumRender, LayerId};

/// Controller phases within one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Measure,
    Bias,
    Modulate,
    Guard,
    Emit,
}

/// Per-bar cap on sync-bias probability moves.
const BIAS_DELTA_CAP: f64 = 0.08;
/// Per-bar cap on the thin-bias feedback nudge.
const THIN_DELTA_CAP: f64 = 0.03;
/// Thin bias operating range.
const THIN_RANGE: (f64, f64) = (-0.8, 0.0);

/// Mutable parameters owned by the controller.
struct ParamState {
    thin_bias: f64,
    accent_prob: Option<f64>,
    swing: BTreeMap<String, f64>,
    ratchet: BTreeMap<String, f64>,
    kick_rot_rate: f64,
}

impl ParamState {
    fn new() -> Self {
        Self {
            thin_bias: -0.2,
            accent_prob: None,
            swing: BTreeMap::new(),
            ratchet: BTreeMap::new(),
            kick_rot_rate: 0.0,
        }
    }

    fn apply(&mut self, path: &str, value: f64) {
        match path {
            "thin_bias" => self.thin_bias = value.clamp(THIN_RANGE.0, THIN_RANGE.1),
            "accent.prob" => self.accent_prob = Some(value.clamp(0.0, 1.0)),
            "kick.rotation_rate_per_bar" => self.kick_rot_rate = value.max(0.0),
            _ => {
                if let Some((layer, field)) = path.split_once('.') {
                    match field {
                        "swing_percent" => {
                            self.swing
                                .insert(layer.to_string(), value.clamp(0.5, 0.62));
                        }
                        "ratchet_prob" => {
                            self.ratchet
                                .insert(layer.to_string(), value.clamp(0.0, 0.3));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Run the feedback session over all configured bars.
///
/// `csv` receives one `bar,E,S,H_density,entropy` row per bar, best-effort:
/// write failures are ignored.
pub fn run_session(
    config: &EngineConfig,
    chain: &SeedChain,
    mut csv: Option<&mut dyn Write>,
) -> DrumRender {
    let layers = ordered_layers(config);
    let gated: Vec<LayerId> = layers
        .iter()
        .map(|(id, _)| *id)
        .filter(|id| matches!(id, LayerId::HatClosed | LayerId::HatOpen))
        .collect();

    // Probability state seeded from each gated layer's Euclidean mask.
    let mut probs: BTreeMap<LayerId, ProbVector> = BTreeMap::new();
    for (id, cfg) in &layers {
        if gated.contains(id) {
            let base = crate::rhythm::euclid::bar_mask(cfg.fills as usize, cfg.rot as usize);
            probs.insert(*id, markov::init_probs(&base));
        }
    }

    let mut params = ParamState::new();
    let mut mod_values: Vec<f64> = config
        .modulators
        .iter()
        .map(|m| 0.5 * (m.min_val + m.max_val))
        .collect();
    let mut rot_accum: BTreeMap<LayerId, f64> = BTreeMap::new();

    let mut events: Vec<DrumEvent> = Vec::new();
    let mut bar_metrics: Vec<BarMetrics> = Vec::new();
    let mut diagnostics = Diagnostics::default();
    let mut rescue_bar = false;
    let mut prev_masks: BTreeMap<String, StepMask> = BTreeMap::new();

    if let Some(w) = csv.as_mut() {
        let _ = writeln!(w, "bar,E,S,H_density,entropy");
    }

    for bar in 0..config.bars {
        let mut measured: Option<BarMetrics> = None;
        let mut phase = Phase::Measure;

        loop {
            match phase {
                Phase::Measure => {
                    measured = bar_metrics.last().copied();
                    phase = Phase::Bias;
                }
                Phase::Bias => {
                    if let Some(m) = measured {
                        for p in probs.values_mut() {
                            markov::bias_probs(
                                p,
                                m.s,
                                config.targets.s_low,
                                config.targets.s_high,
                                BIAS_DELTA_CAP,
                            );
                        }
                        // Thin-bias feedback toward the syncopation midpoint.
                        let s_mid = 0.5 * (config.targets.s_low + config.targets.s_high);
                        let proposed = params.thin_bias + 0.1 * (s_mid - m.s);
                        params.thin_bias = clamp_delta(params.thin_bias, proposed, THIN_DELTA_CAP)
                            .clamp(THIN_RANGE.0, THIN_RANGE.1);
                    }
                    phase = Phase::Modulate;
                }
                Phase::Modulate => {
                    for (i, mod_cfg) in config.modulators.iter().enumerate() {
                        let mut rng = chain.rng("drums/modulator", i as u32, bar);
                        mod_values[i] = step_modulator(mod_values[i], mod_cfg, bar, &mut rng);
                        params.apply(&mod_cfg.param_path, mod_values[i]);
                    }
                    phase = Phase::Guard;
                }
                Phase::Guard => {
                    rescue_bar = false;
                    if let Some(m) = measured {
                        if m.e < config.guard.min_e {
                            rescue_bar = true;
                            diagnostics.rescues += 1;
                            for p in probs.values_mut() {
                                markov::damp_offbeats(p);
                            }
                            for accum in rot_accum.values_mut() {
                                *accum = 0.0;
                            }
                            debug!(bar, e = m.e, "rescue triggered");
                        }
                    }
                    phase = Phase::Emit;
                }
                Phase::Emit => {
                    let metrics = emit_bar(
                        config,
                        chain,
                        &layers,
                        &gated,
                        &probs,
                        &params,
                        &mut rot_accum,
                        &mut prev_masks,
                        bar,
                        rescue_bar,
                        &mut events,
                    );
                    if let Some(w) = csv.as_mut() {
                        let _ = writeln!(
                            w,
                            "{},{:.4},{:.4},{:.4},{:.4}",
                            bar, metrics.e, metrics.s, metrics.hat_density, metrics.entropy
                        );
                    }
                    bar_metrics.push(metrics);
                    break;
                }
            }
        }
    }

    DrumRender {
        events,
        metrics: bar_metrics,
        diagnostics,
    }
}

/// Build and schedule one bar with the current controller state.
#[allow(clippy::too_many_arguments)]
fn emit_bar(
    config: &EngineConfig,
    chain: &SeedChain,
    layers: &[(LayerId, &LayerConfig)],
    gated: &[LayerId],
    probs: &BTreeMap<LayerId, ProbVector>,
    params: &ParamState,
    rot_accum: &mut BTreeMap<LayerId, f64>,
    prev_masks: &mut BTreeMap<String, StepMask>,
    bar: u32,
    rescue_bar: bool,
    events: &mut Vec<DrumEvent>,
) -> BarMetrics {
    let mut masks: BTreeMap<LayerId, StepMask> = BTreeMap::new();

    for (id, cfg) in layers {
        let mut rng = chain.rng("drums/mask", id.component(), bar);
        let mask = if gated.contains(id) {
            if rescue_bar && *id == LayerId::HatClosed {
                // Straightened recovery bar: full 16ths restore the pulse.
                [true; STEPS_PER_BAR]
            } else {
                markov::sample_mask(&probs[id], cfg.offbeats_only, &mut rng)
            }
        } else {
            // Euclid-driven layers keep their configured shape, with the
            // controller owning rotation drift.
            let rate = if *id == LayerId::Kick {
                if config.guard.kick_immutable {
                    0.0
                } else {
                    params.kick_rot_rate.max(cfg.rotation_rate_per_bar)
                }
            } else {
                cfg.rotation_rate_per_bar
            };
            let accum = rot_accum.entry(*id).or_insert(0.0);
            *accum = (*accum + rate.clamp(0.0, config.guard.max_rot_rate))
                % STEPS_PER_BAR as f64;
            let rot = (cfg.rot as usize + accum.round() as usize) % STEPS_PER_BAR;
            let mut base = crate::rhythm::euclid::bar_mask(cfg.fills as usize, rot);
            let kick_frozen = *id == LayerId::Kick && config.guard.kick_immutable;
            if !kick_frozen {
                crate::rhythm::conditions::apply_conditions(
                    &mut base,
                    bar,
                    &cfg.conditions,
                    prev_masks,
                    &mut rng,
                );
            }
            base
        };
        masks.insert(*id, mask);
    }

    let kick_mask = masks
        .get(&LayerId::Kick)
        .copied()
        .unwrap_or_else(empty_mask);

    // Hat thinning near kicks, then the density clamp. The rescue bar skips
    // both so the straightened pattern survives intact.
    if !rescue_bar {
        if let Some(hat) = masks.get_mut(&LayerId::HatClosed) {
            let keep = thin_probs_near_kick(1.0, &kick_mask, 1, params.thin_bias);
            let mut rng = chain.rng("drums/thin", 0, bar);
            for (step, slot) in hat.iter_mut().enumerate() {
                if *slot && !bernoulli(&mut rng, keep[step]) {
                    *slot = false;
                }
            }
            let weights = void_weights(&kick_mask);
            enforce_density(
                hat,
                config.targets.hat_density_target,
                config.targets.hat_density_tol,
                &weights,
            );
        }
    }

    apply_chokes(&mut masks, layers);

    // Frozen masks become next bar's PRE/NOT_PRE reference.
    for (id, _) in layers {
        prev_masks.insert(id.name().to_string(), masks[id]);
    }

    let bar_event_start = events.len();
    for (id, cfg) in layers {
        let swing = if rescue_bar {
            Some(0.5)
        } else {
            params
                .swing
                .get(id.name())
                .copied()
                .or(cfg.swing_percent)
        };
        let layer_cfg;
        let cfg_ref: &LayerConfig = if let Some(rp) = params.ratchet.get(id.name()) {
            layer_cfg = LayerConfig {
                ratchet_prob: *rp,
                ..(*cfg).clone()
            };
            &layer_cfg
        } else {
            cfg
        };
        let mut rng = chain.rng("drums/micro", id.component(), bar);
        layer::emit_events(
            *id,
            cfg_ref,
            &masks[id],
            bar,
            swing,
            config.targets.t_ms_cap,
            config.ppq,
            config.bpm,
            &mut rng,
            events,
        );
    }

    apply_accents(
        &mut events[bar_event_start..],
        config,
        chain,
        params.accent_prob,
    );

    metrics::measure_bar(events, bar, config.ppq, config.bpm)
}
