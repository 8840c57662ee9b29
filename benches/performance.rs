// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for GROOVESEED
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Euclidean mask generation
//! - Drum analysis throughput
//! - Full pipeline renders (open-loop and feedback)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use grooveseed::config::EngineConfig;
use grooveseed::rhythm::euclid;

fn bench_euclid(c: &mut Criterion) {
    let mut group = c.benchmark_group("euclid");
    for fills in [4usize, 7, 12] {
        group.bench_with_input(BenchmarkId::new("mask", fills), &fills, |b, &fills| {
            b.iter(|| euclid::bar_mask(black_box(fills), black_box(3)))
        });
    }
    group.finish();
}

fn session_config(bars: u32, feedback: bool) -> EngineConfig {
    let json = format!(
        r#"{{
            "mode": "drums_only",
            "bpm": 132,
            "ppq": 1920,
            "bars": {},
            "feedback": {},
            "layers": {{
                "kick":  {{ "fills": 4,  "note": 36, "velocity": 110 }},
                "hat_c": {{ "fills": 12, "note": 42, "velocity": 80,
                            "swing_percent": 0.55 }},
                "snare": {{ "fills": 2, "rot": 4, "note": 38, "velocity": 96 }}
            }}
        }}"#,
        bars, feedback
    );
    EngineConfig::from_json(&json).unwrap()
}

fn bench_analysis(c: &mut Criterion) {
    let config = session_config(32, false);
    let result = grooveseed::generate(&config).unwrap();
    c.bench_function("analyze_32_bars", |b| {
        b.iter(|| {
            grooveseed::analysis::analyze(
                black_box(&result.drum_events),
                config.bars,
                config.ppq,
            )
        })
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    for bars in [8u32, 32] {
        let open = session_config(bars, false);
        group.bench_with_input(BenchmarkId::new("open_loop", bars), &open, |b, config| {
            b.iter(|| grooveseed::generate(black_box(config)).unwrap())
        });
        let fb = session_config(bars, true);
        group.bench_with_input(BenchmarkId::new("feedback", bars), &fb, |b, config| {
            b.iter(|| grooveseed::generate(black_box(config)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_euclid, bench_analysis, bench_pipeline);
criterion_main!(benches);
