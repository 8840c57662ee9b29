// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Key derivation and phrase planning.
//!
//! The key comes from seed tags of the form `key_<pc>_<scale>` when
//! present, else from the pitch-class histogram of the bass line, else
//! from the mode default. Phrases tile the bar range with CALL/RESP roles
//! taken cyclically from the configured pattern.

use crate::bass::BassNote;
use crate::music::{KeySpec, ScaleType};

/// Phrase role of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseRole {
    Call,
    Resp,
}

impl PhraseRole {
    /// Short label used in form names.
    pub fn letter(self) -> char {
        match self {
            PhraseRole::Call => 'C',
            PhraseRole::Resp => 'R',
        }
    }
}

/// One role-tagged phrase segment. Segments tile `[0, bars)` exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseSegment {
    pub id: u32,
    pub start_bar: u32,
    pub bars: u32,
    pub role: PhraseRole,
    pub form_label: String,
    pub resolution_required: bool,
}

impl PhraseSegment {
    /// Bar just past the segment end.
    pub fn end_bar(&self) -> u32 {
        self.start_bar + self.bars
    }
}

/// Parse a `key_<pc>_<scale>` tag, e.g. `key_9_aeolian`.
pub fn key_from_tag(tag: &str) -> Option<(u8, ScaleType)> {
    let rest = tag.strip_prefix("key_")?;
    let (pc_str, scale_str) = rest.split_once('_')?;
    let pc: u8 = pc_str.parse().ok()?;
    if pc > 11 {
        return None;
    }
    let scale = ScaleType::parse(scale_str)?;
    Some((pc, scale))
}

/// Derive the working key: tags first, then the bass pitch-class
/// histogram, then the default.
pub fn derive_key(
    tags: &[String],
    bass_notes: Option<&[BassNote]>,
    default: KeySpec,
) -> KeySpec {
    for tag in tags {
        if let Some((pc, scale)) = key_from_tag(tag) {
            return KeySpec::new(pc, scale, default.default_root_octave);
        }
    }

    if let Some(notes) = bass_notes {
        if !notes.is_empty() {
            let mut histogram = [0usize; 12];
            for n in notes {
                histogram[(n.pitch % 12) as usize] += 1;
            }
            let root_pc = histogram
                .iter()
                .enumerate()
                .max_by(|(pa, a), (pb, b)| a.cmp(b).then(pb.cmp(pa)))
                .map(|(pc, _)| pc as u8)
                .unwrap_or(default.root_pc);
            return KeySpec::new(root_pc, default.scale_type, default.default_root_octave);
        }
    }

    default
}

/// Choose the phrase length: the largest divisor of `bars` inside
/// `[min_bars, max_bars]`; when none divides, `max_bars` with the final
/// phrase truncated.
pub fn phrase_length(bars: u32, min_bars: u32, max_bars: u32) -> u32 {
    let min = min_bars.max(1);
    let max = max_bars.max(min);
    for len in (min..=max).rev() {
        if bars % len == 0 {
            return len;
        }
    }
    max
}

/// Plan the phrase segments over `bars` bars.
///
/// Roles cycle through `pattern` (characters `C` and `R`); a segment whose
/// pattern position is last of its cycle requires resolution, as does the
/// final segment of the piece.
pub fn plan_phrases(bars: u32, min_bars: u32, max_bars: u32, pattern: &str) -> Vec<PhraseSegment> {
    let len = phrase_length(bars, min_bars, max_bars);
    let roles: Vec<PhraseRole> = pattern
        .chars()
        .filter_map(|c| match c.to_ascii_uppercase() {
            'C' => Some(PhraseRole::Call),
            'R' => Some(PhraseRole::Resp),
            _ => None,
        })
        .collect();
    let roles = if roles.is_empty() {
        vec![PhraseRole::Call, PhraseRole::Resp]
    } else {
        roles
    };

    let mut segments = Vec::new();
    let mut start = 0u32;
    let mut index = 0usize;
    while start < bars {
        let seg_bars = len.min(bars - start);
        let role = roles[index % roles.len()];
        let cycle = index / roles.len() + 1;
        let pattern_last = index % roles.len() == roles.len() - 1;
        segments.push(PhraseSegment {
            id: index as u32,
            start_bar: start,
            bars: seg_bars,
            role,
            form_label: format!("{}{}", role.letter(), cycle),
            resolution_required: pattern_last || start + seg_bars >= bars,
        });
        start += seg_bars;
        index += 1;
    }
    segments
}
