// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Seed projects: self-contained on-disk snapshots of a generation run.
//!
//! A seed directory holds the exact input configuration, a metadata
//! descriptor and the rendered MIDI assets:
//!
//! ```text
//! seeds/<seed_id>/config.json
//! seeds/<seed_id>/metadata.json
//! seeds/<seed_id>/drums/main.mid
//! seeds/<seed_id>/bass/main.mid          (when bass was generated)
//! seeds/<seed_id>/leads/variants/v1.mid  (when a lead was generated)
//! ```
//!
//! Asset paths are stored relative to the seed directory. An `index.json`
//! at the root summarises all seeds for tooling.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::midi::{MidiWriter, Track};

/// Canonical drum render path inside a seed directory.
pub const RENDER_PATH: &str = "drums/main.mid";

/// One rendered asset in the seed directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Which engine produced it: "drums", "bass", "lead".
    pub role: String,
    /// Asset kind, currently always "midi".
    pub kind: String,
    /// Path relative to the seed directory.
    pub path: String,
    /// Human-readable description.
    pub description: String,
}

/// Metadata descriptor persisted as `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedMetadata {
    pub seed_id: String,
    pub created_at: String,
    pub engine_mode: String,
    pub bpm: f64,
    pub bars: u32,
    pub ppq: u32,
    pub rng_seed: u64,
    pub render_path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub parent_seed_id: Option<String>,
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
    #[serde(default = "default_file_version")]
    pub file_version: u32,
}

fn default_file_version() -> u32 {
    1
}

/// Optional fields for [`save_seed`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Explicit seed id; generated from time, mode and seed when absent.
    pub seed_id: Option<String>,
    pub summary: Option<String>,
    pub prompt: Option<String>,
    pub parent_seed_id: Option<String>,
}

fn generate_seed_id(config: &EngineConfig) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}_{}_{}", secs, config.mode.name().replace('+', "_"), config.seed)
}

fn write_midi(path: &Path, config: &EngineConfig, track: Track) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = MidiWriter::new(config.ppq as u16, config.bpm);
    writer.add_track(track);
    writer.export(path)?;
    Ok(())
}

/// Persist a generation run as a seed project and return its metadata.
pub fn save_seed(
    seeds_root: &Path,
    config: &EngineConfig,
    drums: Track,
    bass: Option<Track>,
    lead: Option<Track>,
    options: SaveOptions,
) -> Result<SeedMetadata> {
    let seed_id = options
        .seed_id
        .unwrap_or_else(|| generate_seed_id(config));
    let seed_dir = seeds_root.join(&seed_id);
    fs::create_dir_all(&seed_dir)?;

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(seed_dir.join("config.json"), config_json)?;

    let mut assets = vec![AssetRecord {
        role: "drums".to_string(),
        kind: "midi".to_string(),
        path: RENDER_PATH.to_string(),
        description: "Main drum render".to_string(),
    }];
    write_midi(&seed_dir.join(RENDER_PATH), config, drums)?;

    if let Some(track) = bass {
        let path = "bass/main.mid";
        write_midi(&seed_dir.join(path), config, track)?;
        assets.push(AssetRecord {
            role: "bass".to_string(),
            kind: "midi".to_string(),
            path: path.to_string(),
            description: "Groove bass render".to_string(),
        });
    }

    if let Some(track) = lead {
        let path = "leads/variants/v1.mid";
        write_midi(&seed_dir.join(path), config, track)?;
        assets.push(AssetRecord {
            role: "lead".to_string(),
            kind: "midi".to_string(),
            path: path.to_string(),
            description: "Lead line variant".to_string(),
        });
    }

    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string());

    let metadata = SeedMetadata {
        seed_id: seed_id.clone(),
        created_at,
        engine_mode: config.mode.name().to_string(),
        bpm: config.bpm,
        bars: config.bars,
        ppq: config.ppq,
        rng_seed: config.seed,
        render_path: RENDER_PATH.to_string(),
        tags: config.tags.clone(),
        summary: options.summary,
        prompt: options.prompt,
        parent_seed_id: options.parent_seed_id,
        assets,
        file_version: 1,
    };
    let metadata_json = serde_json::to_string_pretty(&metadata)?;
    fs::write(seed_dir.join("metadata.json"), metadata_json)?;

    update_index(seeds_root, &metadata)?;
    Ok(metadata)
}

/// Load a seed's configuration and metadata by id.
pub fn load_seed(seeds_root: &Path, seed_id: &str) -> Result<(EngineConfig, SeedMetadata)> {
    let seed_dir = seeds_root.join(seed_id);
    let config_raw = fs::read_to_string(seed_dir.join("config.json"))?;
    let config: EngineConfig = serde_json::from_str(&config_raw)?;
    let meta_raw = fs::read_to_string(seed_dir.join("metadata.json"))?;
    let metadata: SeedMetadata = serde_json::from_str(&meta_raw)?;
    Ok((config, metadata))
}

fn index_path(seeds_root: &Path) -> PathBuf {
    seeds_root.join("index.json")
}

/// Rescan every seed directory and rewrite `index.json`.
///
/// Directories without readable metadata are skipped, not errors.
pub fn rebuild_index(seeds_root: &Path) -> Result<Vec<SeedMetadata>> {
    fs::create_dir_all(seeds_root)?;
    let mut metas: Vec<SeedMetadata> = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(seeds_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    for dir in entries {
        let meta_path = dir.join("metadata.json");
        let Ok(raw) = fs::read_to_string(&meta_path) else {
            continue;
        };
        match serde_json::from_str::<SeedMetadata>(&raw) {
            Ok(meta) => metas.push(meta),
            Err(_) => continue,
        }
    }

    let json = serde_json::to_string_pretty(&metas)?;
    fs::write(index_path(seeds_root), json)?;
    Ok(metas)
}

/// Insert or replace one entry in `index.json`.
pub fn update_index(seeds_root: &Path, meta: &SeedMetadata) -> Result<()> {
    let mut metas: Vec<SeedMetadata> = match fs::read_to_string(index_path(seeds_root)) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    metas.retain(|m| m.seed_id != meta.seed_id);
    metas.push(meta.clone());
    metas.sort_by(|a, b| a.seed_id.cmp(&b.seed_id));
    let json = serde_json::to_string_pretty(&metas)?;
    fs::write(index_path(seeds_root), json)?;
    Ok(())
}

/// List seeds from `index.json`, rebuilding it when missing.
pub fn list_seeds(seeds_root: &Path) -> Result<Vec<SeedMetadata>> {
    match fs::read_to_string(index_path(seeds_root)) {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(_) => rebuild_index(seeds_root),
    }
}
