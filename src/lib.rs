// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! GROOVESEED - deterministic techno groove generation.
//!
//! A generative pipeline that turns a declarative configuration plus an
//! RNG seed into drum, bass and lead patterns rendered as MIDI:
//!
//! 1. The drum engine builds per-layer Euclidean step masks, applies
//!    condition gates, micro-timing, chokes and density shaping; its
//!    feedback variant closes the loop over per-bar metrics.
//! 2. The drum analyzer freezes the emitted grid into labelled slots.
//! 3. The groove bass engine realises a mode-driven, collision-aware line
//!    over the analyzed grid.
//! 4. The lead engine plans CALL/RESP phrases and realises a theory-aware
//!    melody with voice-leading and bass interaction.
//!
//! The same configuration and seed always produce byte-identical output.

pub mod analysis;
pub mod bass;
pub mod config;
pub mod drums;
pub mod error;
pub mod lead;
pub mod merge;
pub mod midi;
pub mod music;
pub mod rhythm;
pub mod seeds;
pub mod timebase;

pub use analysis::SlotGrid;
pub use bass::BassResult;
pub use config::{EngineConfig, EngineMode};
pub use drums::metrics::BarMetrics;
pub use drums::DrumEvent;
pub use error::{Diagnostics, EngineError};
pub use lead::LeadResult;
pub use midi::{MidiWriter, Track};
pub use timebase::SeedChain;

/// Output of a full generation run.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub drum_events: Vec<DrumEvent>,
    pub bar_metrics: Vec<BarMetrics>,
    pub grid: SlotGrid,
    pub bass: Option<BassResult>,
    pub lead: Option<LeadResult>,
    pub diagnostics: Diagnostics,
}

impl GenerateResult {
    /// Note tracks in merge order: drums, then bass, then lead.
    pub fn tracks(&self, config: &EngineConfig) -> Vec<Track> {
        let mut tracks = vec![merge::drum_track(&self.drum_events, config)];
        if let Some(bass) = &self.bass {
            tracks.push(merge::bass_track(&bass.notes, config));
        }
        if let Some(lead) = &self.lead {
            tracks.push(merge::lead_track(&lead.notes, config));
        }
        tracks
    }

    /// Flattened event stream obeying the merger sort law.
    pub fn merged_stream(&self, config: &EngineConfig) -> Vec<merge::TimedEvent> {
        merge::merged_stream(&self.tracks(config))
    }

    /// Multi-track MIDI writer for the whole run.
    pub fn midi_writer(&self, config: &EngineConfig) -> MidiWriter {
        let mut writer = MidiWriter::new(config.ppq as u16, config.bpm);
        for track in self.tracks(config) {
            writer.add_track(track);
        }
        writer
    }
}

/// Run the full pipeline for a configuration.
///
/// Validates first; configuration and reference errors are fatal.
/// Recovered conditions (bass relaxations, dropped lead events, rescues)
/// are collected in the result's diagnostics.
pub fn generate(config: &EngineConfig) -> Result<GenerateResult, EngineError> {
    generate_with_telemetry(config, None)
}

/// Like [`generate`], with an optional CSV sink receiving one
/// `bar,E,S,H_density,entropy` row per bar from the feedback controller.
/// Telemetry is best-effort and only produced on feedback runs.
pub fn generate_with_telemetry(
    config: &EngineConfig,
    csv: Option<&mut dyn std::io::Write>,
) -> Result<GenerateResult, EngineError> {
    config.validate()?;
    let chain = SeedChain::new(config.seed);

    let mut drums = if config.feedback {
        drums::controller::run_session(config, &chain, csv)
    } else {
        drums::render(config, &chain)
    };
    drums::finalize_durations(&mut drums.events, config.ppq);
    let mut diagnostics = drums.diagnostics.clone();

    for (id, _) in drums::ordered_layers(config) {
        let dispersion = drums::metrics::dispersion(&drums.events, id, config.ppq);
        tracing::debug!(layer = id.name(), dispersion, "layer timing dispersion");
    }

    let grid = analysis::analyze(&drums.events, config.bars, config.ppq);

    let bass = if config.mode.has_bass() {
        let bass_config = config.bass.clone().unwrap_or_default();
        let result = bass::generate(&grid, &bass_config, &config.tags, &chain, config.bars);
        diagnostics.absorb(result.diagnostics.clone());
        Some(result)
    } else {
        None
    };

    let lead = if config.mode.has_lead() {
        let lead_config = config.lead.clone().unwrap_or_default();
        let bass_notes = bass.as_ref().map(|b| b.notes.as_slice());
        let result = lead::generate(
            &grid,
            &lead_config,
            &config.tags,
            bass_notes,
            &chain,
            config.bars,
            config.ppq,
        );
        diagnostics.absorb(result.diagnostics.clone());
        Some(result)
    } else {
        None
    };

    Ok(GenerateResult {
        drum_events: drums.events,
        bar_metrics: drums.metrics,
        grid,
        bass,
        lead,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_validates_first() {
        let mut config = EngineConfig::from_json(
            r#"{
                "mode": "drums_only",
                "bpm": 120,
                "ppq": 1920,
                "bars": 1,
                "layers": { "kick": { "fills": 4, "note": 36 } }
            }"#,
        )
        .unwrap();
        config.bpm = 500.0;
        assert!(matches!(
            generate(&config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_full_mode_produces_three_tracks() {
        let config = EngineConfig::from_json(
            r#"{
                "mode": "full",
                "bpm": 132,
                "ppq": 1920,
                "bars": 4,
                "tags": ["warehouse"],
                "layers": {
                    "kick": { "fills": 4, "note": 36, "velocity": 110 },
                    "hat_c": { "fills": 12, "note": 42, "velocity": 80 },
                    "snare": { "fills": 2, "rot": 4, "note": 38, "velocity": 96 }
                }
            }"#,
        )
        .unwrap();
        let result = generate(&config).unwrap();
        let tracks = result.tracks(&config);
        assert_eq!(tracks.len(), 3);
        assert!(!tracks[0].notes.is_empty());
        assert!(!tracks[1].notes.is_empty());
        assert!(!tracks[2].notes.is_empty());
    }

    #[test]
    fn test_generate_byte_determinism() {
        let config = EngineConfig::from_json(
            r#"{
                "mode": "full",
                "bpm": 132,
                "ppq": 1920,
                "bars": 8,
                "seed": 9001,
                "layers": {
                    "kick": { "fills": 4, "note": 36, "velocity": 110 },
                    "hat_c": { "fills": 12, "note": 42, "velocity": 80,
                               "swing_percent": 0.55 },
                    "snare": { "fills": 2, "rot": 4, "note": 38 }
                }
            }"#,
        )
        .unwrap();
        let a = generate(&config).unwrap().midi_writer(&config).export_to_bytes();
        let b = generate(&config).unwrap().midi_writer(&config).export_to_bytes();
        assert_eq!(a, b);
    }
}
