// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error taxonomy and generation diagnostics.
//!
//! Fatal conditions (bad configuration, unknown references) are surfaced as
//! [`EngineError`] before any generation starts. Recoverable conditions
//! (bass constraint relaxation, dropped lead events) never fail the
//! pipeline; they are counted in a [`Diagnostics`] record attached to the
//! generation result.

use thiserror::Error;

/// Errors surfaced by the generation core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration value is outside its declared range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration references something that does not exist
    /// (modulator parameter path, scale name, layer name).
    #[error("unknown reference: {0}")]
    ReferenceMissing(String),

    /// Filesystem failure while persisting or loading a seed project.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a configuration or metadata file.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Convenience result alias for the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Counters and warnings for conditions recovered during generation.
///
/// These are informational: a non-empty diagnostics record still means a
/// successful run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Bass validation attempts that exhausted retries and relaxed a rule.
    pub bass_relaxations: u32,
    /// Lead events dropped because no slot satisfied the minimum gap.
    pub lead_events_dropped: u32,
    /// Controller rescue bars emitted.
    pub rescues: u32,
    /// Human-readable warnings, in emission order.
    pub warnings: Vec<String>,
}

impl Diagnostics {
    /// Record a warning and keep a counter in sync.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Merge another diagnostics record into this one.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.bass_relaxations += other.bass_relaxations;
        self.lead_events_dropped += other.lead_events_dropped;
        self.rescues += other.rescues;
        self.warnings.extend(other.warnings);
    }

    /// True when nothing had to be recovered.
    pub fn is_clean(&self) -> bool {
        self.bass_relaxations == 0
            && self.lead_events_dropped == 0
            && self.rescues == 0
            && self.warnings.is_empty()
    }
}
