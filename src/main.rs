// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use grooveseed::config::EngineConfig;
use grooveseed::seeds::{self, SaveOptions};

fn print_usage() {
    println!("GROOVESEED - deterministic techno groove generator");
    println!();
    println!("Usage: grooveseed <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  render --config <FILE>       Generate and save a seed project");
    println!("    --out <FILE>               Write a single MIDI file instead");
    println!("    --seeds-root <DIR>         Seed tree root (default: seeds)");
    println!("    --summary <TEXT>           Summary stored in metadata");
    println!("    --csv <FILE>               Controller telemetry CSV (feedback runs)");
    println!("  seeds [--seeds-root <DIR>]   List saved seed projects");
    println!("  rebuild-index [--seeds-root <DIR>]");
    println!("  help                         Show this help message");
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn render(args: &[String]) -> Result<()> {
    let config_path = flag_value(args, "--config")
        .context("render requires --config <FILE>")?;
    let config = EngineConfig::load(&config_path)?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", config_path))?;

    let csv_path = flag_value(args, "--csv");
    let mut csv_file = match &csv_path {
        Some(path) => Some(
            std::fs::File::create(path).with_context(|| format!("cannot create {}", path))?,
        ),
        None => None,
    };
    let result = grooveseed::generate_with_telemetry(
        &config,
        csv_file.as_mut().map(|f| f as &mut dyn Write),
    )?;
    if let Some(path) = &csv_path {
        println!("Wrote telemetry to {}", path);
    }

    for warning in &result.diagnostics.warnings {
        eprintln!("warning: {}", warning);
    }

    if let Some(out) = flag_value(args, "--out") {
        result
            .midi_writer(&config)
            .export(&out)
            .with_context(|| format!("cannot write {}", out))?;
        println!(
            "Wrote {} ({}, bpm={}, ppq={}, bars={})",
            out,
            config.mode.name(),
            config.bpm,
            config.ppq,
            config.bars
        );
        return Ok(());
    }

    let seeds_root = PathBuf::from(
        flag_value(args, "--seeds-root").unwrap_or_else(|| "seeds".to_string()),
    );
    let tracks = result.tracks(&config);
    let mut iter = tracks.into_iter();
    let drums = iter.next().context("pipeline produced no drum track")?;
    let bass = config.mode.has_bass().then(|| iter.next()).flatten();
    let lead = config.mode.has_lead().then(|| iter.next()).flatten();

    let meta = seeds::save_seed(
        &seeds_root,
        &config,
        drums,
        bass,
        lead,
        SaveOptions {
            summary: flag_value(args, "--summary"),
            ..Default::default()
        },
    )?;
    println!(
        "Saved seed {} ({} assets) under {}",
        meta.seed_id,
        meta.assets.len(),
        seeds_root.display()
    );
    Ok(())
}

fn list_seeds(args: &[String]) -> Result<()> {
    let seeds_root = PathBuf::from(
        flag_value(args, "--seeds-root").unwrap_or_else(|| "seeds".to_string()),
    );
    let metas = seeds::list_seeds(&seeds_root)?;
    if metas.is_empty() {
        println!("No seeds under {}", seeds_root.display());
        return Ok(());
    }
    for meta in metas {
        println!(
            "{}  {}  bpm={} bars={} tags=[{}]",
            meta.seed_id,
            meta.engine_mode,
            meta.bpm,
            meta.bars,
            meta.tags.join(",")
        );
    }
    Ok(())
}

fn rebuild_index(args: &[String]) -> Result<()> {
    let seeds_root = PathBuf::from(
        flag_value(args, "--seeds-root").unwrap_or_else(|| "seeds".to_string()),
    );
    let metas = seeds::rebuild_index(&seeds_root)?;
    println!("Indexed {} seeds under {}", metas.len(), seeds_root.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("GROOVESEED - deterministic techno groove generator");
        println!("Run with help for usage information");
        return Ok(());
    };

    match command.as_str() {
        "render" => render(&args[1..]),
        "seeds" => list_seeds(&args[1..]),
        "rebuild-index" => rebuild_index(&args[1..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => bail!("unknown command: {}", other),
    }
}
