// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for GROOVESEED.
//!
//! These exercise the full pipeline through the public API: configuration
//! in, sorted events and MIDI bytes out.

use grooveseed::bass::BassModeName;
use grooveseed::config::EngineConfig;
use grooveseed::drums::LayerId;
use grooveseed::merge::EventKind;
use grooveseed::{generate, SeedChain};

fn warehouse_config() -> EngineConfig {
    EngineConfig::from_json(
        r#"{
            "mode": "full",
            "bpm": 132,
            "ppq": 1920,
            "bars": 8,
            "seed": 4242,
            "tags": ["warehouse"],
            "guard": { "kick_immutable": true },
            "targets": { "hat_density_target": 0.7, "hat_density_tol": 0.05 },
            "layers": {
                "kick":  { "fills": 4,  "note": 36, "velocity": 110 },
                "hat_c": { "fills": 12, "note": 42, "velocity": 80,
                           "swing_percent": 0.55,
                           "beat_bins_ms": [-10, -6, -2, 0],
                           "beat_bins_probs": [0.4, 0.35, 0.2, 0.05],
                           "beat_bin_cap_ms": 12 },
                "snare": { "fills": 2, "rot": 4,  "note": 38, "velocity": 96 },
                "clap":  { "fills": 2, "rot": 12, "note": 39, "velocity": 92 }
            }
        }"#,
    )
    .unwrap()
}

/// Metronome baseline: a lone four-on-the-floor kick layer produces
/// exactly eight quarter-note events over two bars, nothing else.
#[test]
fn test_metronome_baseline() {
    let config = EngineConfig::from_json(
        r#"{
            "mode": "drums_only",
            "bpm": 120,
            "ppq": 1920,
            "bars": 2,
            "layers": { "kick": { "fills": 4, "rot": 0, "note": 36, "velocity": 110 } }
        }"#,
    )
    .unwrap();
    let result = generate(&config).unwrap();

    assert_eq!(result.drum_events.len(), 8);
    let ticks: Vec<u64> = result
        .drum_events
        .iter()
        .map(|e| e.start_tick(config.ppq))
        .collect();
    let quarter = config.ppq as u64;
    let expected: Vec<u64> = (0..8).map(|i| i * quarter).collect();
    assert_eq!(ticks, expected);
    for ev in &result.drum_events {
        assert_eq!(ev.velocity, 110);
        assert_eq!(ev.layer, LayerId::Kick);
    }

    let tracks = result.tracks(&config);
    assert_eq!(tracks.len(), 1, "drums_only produces a single track");
    assert_eq!(tracks[0].notes.len(), 8);
}

/// Warehouse groove: hat density clamps to its band, the kick never moves,
/// and entrainment stays high.
#[test]
fn test_warehouse_groove() {
    let config = warehouse_config();
    let result = generate(&config).unwrap();

    let in_band = result
        .bar_metrics
        .iter()
        .filter(|m| (0.65..=0.75).contains(&m.hat_density))
        .count();
    assert!(in_band >= 7, "hat density in band for only {}/8 bars", in_band);

    for bar in 0..config.bars {
        let kick_steps: Vec<u8> = result
            .drum_events
            .iter()
            .filter(|e| e.bar == bar && e.layer == LayerId::Kick)
            .map(|e| e.step)
            .collect();
        assert_eq!(kick_steps, vec![0, 4, 8, 12], "kick moved in bar {}", bar);
    }

    let mut es: Vec<f64> = result.bar_metrics.iter().map(|m| m.e).collect();
    es.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = es[es.len() / 2];
    assert!(median >= 0.75, "entrainment median {}", median);
}

/// Bass minimal: forced sub-anchor over the warehouse drums stays sparse,
/// in register, and off the kick except at bar starts.
#[test]
fn test_bass_minimal() {
    let mut config = warehouse_config();
    config.mode = grooveseed::EngineMode::DrumsBass;
    config.bass = Some(grooveseed::bass::BassConfig {
        mode: Some(BassModeName::SubAnchor),
        root_note: 45,
        ..Default::default()
    });
    let result = generate(&config).unwrap();
    let bass = result.bass.as_ref().expect("bass requested");
    assert!(!bass.notes.is_empty());

    for bar in 0..config.bars {
        let count = bass.notes.iter().filter(|n| n.meta.bar == bar).count();
        assert!(
            (1..=4).contains(&count),
            "bar {} has {} bass notes",
            bar,
            count
        );
    }
    for note in &bass.notes {
        assert!(
            (33..=52).contains(&note.pitch),
            "bass pitch {} out of range",
            note.pitch
        );
        let step = note.meta.step as usize;
        let is_kick = result.grid.label(note.meta.bar as usize, step).is_kick;
        assert!(
            !is_kick || step == 0,
            "bass coincides with kick at bar {} step {}",
            note.meta.bar,
            step
        );
    }
}

/// Lead lyrical over 4 bars: phrases open early, close on a resolution
/// degree, and keep the melodic motion tight.
#[test]
fn test_lead_lyrical_four_bars() {
    let config = EngineConfig::from_json(
        r#"{
            "mode": "full",
            "bpm": 128,
            "ppq": 1920,
            "bars": 4,
            "seed": 99,
            "tags": ["lyrical", "key_9_aeolian"],
            "layers": {
                "kick":  { "fills": 4,  "note": 36, "velocity": 110 },
                "hat_c": { "fills": 12, "note": 42, "velocity": 80 },
                "snare": { "fills": 2, "rot": 4, "note": 38, "velocity": 96 }
            }
        }"#,
    )
    .unwrap();
    let result = generate(&config).unwrap();
    let lead = result.lead.as_ref().expect("lead requested");
    assert!(!lead.notes.is_empty());
    assert_eq!(lead.key.root_pc, 9);

    // One 4-bar phrase: its opening note lands in the first quarter.
    let first = lead.notes.iter().min_by_key(|n| n.start_tick).unwrap();
    assert!(first.step <= 3, "phrase opens at step {}", first.step);

    let last = lead.notes.iter().max_by_key(|n| n.start_tick).unwrap();
    assert!(
        [1usize, 5].contains(&last.degree),
        "phrase ends on degree {}",
        last.degree
    );

    for note in &lead.notes {
        assert!(lead.key.contains(note.pitch), "pitch {} off-scale", note.pitch);
    }

    let jumps: Vec<f64> = lead
        .notes
        .windows(2)
        .map(|w| (w[1].pitch as f64 - w[0].pitch as f64).abs())
        .collect();
    let avg = jumps.iter().sum::<f64>() / jumps.len().max(1) as f64;
    assert!(avg <= 5.0, "average jump {}", avg);
}

/// Determinism replay: identical configuration and seed produce identical
/// bytes for every emitted track.
#[test]
fn test_determinism_replay() {
    let mut config = warehouse_config();
    config.feedback = true;
    config.bass = Some(grooveseed::bass::BassConfig::default());

    let a = generate(&config).unwrap().midi_writer(&config).export_to_bytes();
    let b = generate(&config).unwrap().midi_writer(&config).export_to_bytes();
    assert_eq!(a, b);

    // A different seed diverges.
    let mut other = config.clone();
    other.seed += 1;
    let c = generate(&other).unwrap().midi_writer(&other).export_to_bytes();
    assert_ne!(a, c);
}

/// Rescue trigger: an unentrained opening bar forces exactly one rescue
/// bar, and entrainment recovers by bar 2.
#[test]
fn test_rescue_trigger() {
    let config = EngineConfig::from_json(
        r#"{
            "mode": "drums_only",
            "bpm": 132,
            "ppq": 1920,
            "bars": 3,
            "feedback": true,
            "guard": { "min_E": 0.7 },
            "targets": { "hat_density_target": 0.15, "hat_density_tol": 0.1 },
            "layers": {
                "hat_c": { "fills": 16, "offbeats_only": true,
                           "note": 42, "velocity": 80 },
                "snare": { "fills": 2, "rot": 1, "note": 38, "velocity": 96 }
            }
        }"#,
    )
    .unwrap();
    let result = generate(&config).unwrap();

    assert!(result.bar_metrics[0].e < 0.7, "bar 0 must start unentrained");
    assert_eq!(result.diagnostics.rescues, 1);
    let recovered = result.bar_metrics[1].e >= 0.7 || result.bar_metrics[2].e >= 0.7;
    assert!(recovered, "entrainment never recovered");
}

/// Sort law: the flattened stream is non-decreasing in
/// (tick, off-before-on, track, pitch).
#[test]
fn test_merged_stream_sort_law() {
    let mut config = warehouse_config();
    config.bass = Some(grooveseed::bass::BassConfig::default());
    let result = generate(&config).unwrap();
    let stream = result.merged_stream(&config);
    assert!(!stream.is_empty());

    for w in stream.windows(2) {
        let a = (w[0].tick, w[0].kind, w[0].track, w[0].pitch);
        let b = (w[1].tick, w[1].kind, w[1].track, w[1].pitch);
        assert!(a <= b, "stream out of order: {:?} then {:?}", a, b);
    }
    assert!(stream.iter().any(|e| e.kind == EventKind::NoteOff));
}

/// Analyzer idempotence: re-analyzing the emitted drums and re-running the
/// bass with the same seed reproduces the same notes.
#[test]
fn test_analyzer_bass_idempotence() {
    let config = warehouse_config();
    let result = generate(&config).unwrap();

    let grid_a = grooveseed::analysis::analyze(&result.drum_events, config.bars, config.ppq);
    let grid_b = grooveseed::analysis::analyze(&result.drum_events, config.bars, config.ppq);
    assert_eq!(grid_a, grid_b);

    let chain = SeedChain::new(config.seed);
    let bass_config = grooveseed::bass::BassConfig::default();
    let pass_a = grooveseed::bass::generate(&grid_a, &bass_config, &config.tags, &chain, config.bars);
    let pass_b = grooveseed::bass::generate(&grid_b, &bass_config, &config.tags, &chain, config.bars);
    assert_eq!(pass_a.notes, pass_b.notes);
}

/// Drum invariants: steps stay on the grid and micro offsets inside the cap.
#[test]
fn test_drum_event_invariants() {
    let config = warehouse_config();
    let result = generate(&config).unwrap();
    let cap = grooveseed::rhythm::micro::cap_ticks(
        config.targets.t_ms_cap,
        config.ppq,
        config.bpm,
    );
    for ev in &result.drum_events {
        assert!(ev.step < 16);
        assert!(
            ev.micro_offset_ticks.abs() <= cap,
            "micro offset {} above cap {}",
            ev.micro_offset_ticks,
            cap
        );
    }
}

/// Invalid configurations fail before generation, with the error kind the
/// taxonomy promises.
#[test]
fn test_invalid_configuration_is_fatal() {
    let mut config = warehouse_config();
    config.layers.get_mut("hat_c").unwrap().swing_percent = Some(0.9);
    assert!(matches!(
        generate(&config),
        Err(grooveseed::EngineError::InvalidConfig(_))
    ));

    let mut config = warehouse_config();
    config.modulators.push(grooveseed::config::ModulatorConfig {
        param_path: "hat_c.fills".to_string(),
        mode: grooveseed::config::ModulatorMode::RandomWalk,
        min_val: 0.0,
        max_val: 1.0,
        step_per_bar: 0.01,
        tau: None,
        max_delta_per_bar: 0.05,
        phase: None,
    });
    assert!(matches!(
        generate(&config),
        Err(grooveseed::EngineError::ReferenceMissing(_))
    ));
}

/// MIDI output contract: SMF-1 header, configured PPQ, one tempo track
/// plus one chunk per engine track.
#[test]
fn test_midi_output_contract() {
    let mut config = warehouse_config();
    config.bass = Some(grooveseed::bass::BassConfig::default());
    let result = generate(&config).unwrap();
    let bytes = result.midi_writer(&config).export_to_bytes();

    assert_eq!(&bytes[0..4], b"MThd");
    assert_eq!(&bytes[8..10], &1u16.to_be_bytes());
    // drums + bass + lead + tempo track
    assert_eq!(&bytes[10..12], &4u16.to_be_bytes());
    assert_eq!(&bytes[12..14], &(config.ppq as u16).to_be_bytes());

    // Tempo meta: 60_000_000 / 132 microseconds per quarter.
    let micros = (60_000_000.0_f64 / config.bpm) as u32;
    let tempo_bytes = [
        ((micros >> 16) & 0xFF) as u8,
        ((micros >> 8) & 0xFF) as u8,
        (micros & 0xFF) as u8,
    ];
    let found = bytes
        .windows(6)
        .any(|w| w[0] == 0xFF && w[1] == 0x51 && w[2] == 0x03 && w[3..6] == tempo_bytes);
    assert!(found, "tempo meta event missing");
}
