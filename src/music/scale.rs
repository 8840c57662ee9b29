// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Scale and key system for pitched generation.
//!
//! Provides the minor-mode scale family used by the bass and lead engines,
//! note-name parsing, degree-to-pitch mapping, and the per-bar harmony
//! track (static tonic-minor in this version).

use std::fmt;

use serde::{Deserialize, Serialize};

/// MIDI note number type (0-127).
pub type MidiNote = u8;

/// Note names (pitch classes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Note {
    C,
    Cs, // C# / Db
    D,
    Ds, // D# / Eb
    E,
    F,
    Fs, // F# / Gb
    G,
    Gs, // G# / Ab
    A,
    As, // A# / Bb
    B,
}

impl Note {
    /// All notes in chromatic order
    pub const ALL: [Note; 12] = [
        Note::C,
        Note::Cs,
        Note::D,
        Note::Ds,
        Note::E,
        Note::F,
        Note::Fs,
        Note::G,
        Note::Gs,
        Note::A,
        Note::As,
        Note::B,
    ];

    /// Get the pitch class (0-11) for this note
    pub fn pitch_class(self) -> u8 {
        match self {
            Note::C => 0,
            Note::Cs => 1,
            Note::D => 2,
            Note::Ds => 3,
            Note::E => 4,
            Note::F => 5,
            Note::Fs => 6,
            Note::G => 7,
            Note::Gs => 8,
            Note::A => 9,
            Note::As => 10,
            Note::B => 11,
        }
    }

    /// Get note from pitch class
    pub fn from_pitch_class(pc: u8) -> Self {
        Note::ALL[(pc % 12) as usize]
    }

    /// Parse note from string (e.g., "C", "C#", "Db", "F#")
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();
        match s.as_str() {
            "C" => Some(Note::C),
            "C#" | "CS" | "DB" => Some(Note::Cs),
            "D" => Some(Note::D),
            "D#" | "DS" | "EB" => Some(Note::Ds),
            "E" | "FB" => Some(Note::E),
            "F" | "E#" | "ES" => Some(Note::F),
            "F#" | "FS" | "GB" => Some(Note::Fs),
            "G" => Some(Note::G),
            "G#" | "GS" | "AB" => Some(Note::Gs),
            "A" => Some(Note::A),
            "A#" | "AS" | "BB" => Some(Note::As),
            "B" | "CB" => Some(Note::B),
            _ => None,
        }
    }

    /// MIDI note at the given octave (octave 3 root = C3 = 36 convention).
    pub fn at_octave(self, octave: u8) -> MidiNote {
        (12 * octave + self.pitch_class()).min(127)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::C => write!(f, "C"),
            Note::Cs => write!(f, "C#"),
            Note::D => write!(f, "D"),
            Note::Ds => write!(f, "D#"),
            Note::E => write!(f, "E"),
            Note::F => write!(f, "F"),
            Note::Fs => write!(f, "F#"),
            Note::G => write!(f, "G"),
            Note::Gs => write!(f, "G#"),
            Note::A => write!(f, "A"),
            Note::As => write!(f, "A#"),
            Note::B => write!(f, "B"),
        }
    }
}

/// Scale types supported by the pitched engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    /// Natural minor.
    Aeolian,
    /// Minor with raised 6th.
    Dorian,
    /// Minor with lowered 2nd.
    Phrygian,
    /// Five-note minor.
    MinorPent,
}

impl ScaleType {
    /// Semitone offsets from the root, ascending within one octave.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleType::Aeolian => &[0, 2, 3, 5, 7, 8, 10],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleType::MinorPent => &[0, 3, 5, 7, 10],
        }
    }

    /// Parse a scale type from its configuration spelling.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace([' ', '-'], "_");
        match s.as_str() {
            "aeolian" | "minor" | "natural_minor" => Some(ScaleType::Aeolian),
            "dorian" => Some(ScaleType::Dorian),
            "phrygian" => Some(ScaleType::Phrygian),
            "minor_pent" | "minor_pentatonic" | "pentatonic" => Some(ScaleType::MinorPent),
            _ => None,
        }
    }

    /// Number of degrees in one octave of this scale.
    pub fn degree_count(self) -> usize {
        self.intervals().len()
    }
}

/// A key: root pitch class, scale type, default root octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub root_pc: u8,
    pub scale_type: ScaleType,
    pub default_root_octave: u8,
}

impl KeySpec {
    /// Create a key, folding the pitch class into 0..12.
    pub fn new(root_pc: u8, scale_type: ScaleType, default_root_octave: u8) -> Self {
        Self {
            root_pc: root_pc % 12,
            scale_type,
            default_root_octave,
        }
    }

    /// A-minor default used when nothing else decides the key.
    pub fn default_minor() -> Self {
        Self::new(9, ScaleType::Aeolian, 2)
    }

    /// Root MIDI note at the default octave.
    pub fn root_midi(&self) -> MidiNote {
        (12 * self.default_root_octave + self.root_pc).min(127)
    }

    /// True when `pitch` belongs to this key's scale.
    pub fn contains(&self, pitch: MidiNote) -> bool {
        let rel = (pitch as i16 - self.root_pc as i16).rem_euclid(12) as u8;
        self.scale_type.intervals().contains(&rel)
    }

    /// MIDI pitch for a 1-based degree with an octave offset from the
    /// default root octave.
    pub fn degree_to_pitch(&self, degree: usize, octave_offset: i8) -> MidiNote {
        let intervals = self.scale_type.intervals();
        let idx = (degree.saturating_sub(1)) % intervals.len();
        let base = self.root_midi() as i16 + intervals[idx] as i16 + 12 * octave_offset as i16;
        base.clamp(0, 127) as MidiNote
    }

    /// 1-based degree of `pitch` if it is in the scale.
    pub fn degree_of(&self, pitch: MidiNote) -> Option<usize> {
        let rel = (pitch as i16 - self.root_pc as i16).rem_euclid(12) as u8;
        self.scale_type
            .intervals()
            .iter()
            .position(|&i| i == rel)
            .map(|p| p + 1)
    }

    /// Nearest in-scale pitch to `target`, ties resolved downward.
    pub fn snap(&self, target: MidiNote) -> MidiNote {
        let mut best = target;
        let mut best_dist = i16::MAX;
        for cand in 0..=127u8 {
            if !self.contains(cand) {
                continue;
            }
            let d = (cand as i16 - target as i16).abs();
            if d < best_dist || (d == best_dist && cand < best) {
                best_dist = d;
                best = cand;
            }
        }
        best
    }

    /// All in-scale pitches within `[lo, hi]`, ascending.
    pub fn pitches_in_range(&self, lo: MidiNote, hi: MidiNote) -> Vec<MidiNote> {
        (lo..=hi).filter(|&p| self.contains(p)).collect()
    }
}

/// Per-bar harmonic content. Static tonic-minor: every bar carries the same
/// tonic, chord tones (1, 3, 5) and color tones (7, 9 folded to 2, 4, 6).
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonyTrack {
    bars: usize,
    tonic_degree: usize,
    chord_tone_degrees: Vec<usize>,
    color_tone_degrees: Vec<usize>,
}

impl HarmonyTrack {
    /// Build the static tonic-minor track for `bars` bars.
    pub fn tonic_minor(key: KeySpec, bars: usize) -> Self {
        let (chord, color) = match key.scale_type {
            // Pentatonic has five degrees: 1-b3-4-5-b7.
            ScaleType::MinorPent => (vec![1, 2, 4], vec![3, 5]),
            _ => (vec![1, 3, 5], vec![2, 4, 6, 7]),
        };
        Self {
            bars,
            tonic_degree: 1,
            chord_tone_degrees: chord,
            color_tone_degrees: color,
        }
    }

    /// Number of bars covered.
    pub fn bars(&self) -> usize {
        self.bars
    }

    /// Tonic degree for the given bar.
    pub fn tonic(&self, _bar: usize) -> usize {
        self.tonic_degree
    }

    /// Chord-tone degrees for the given bar.
    pub fn chord_tones(&self, _bar: usize) -> &[usize] {
        &self.chord_tone_degrees
    }

    /// Color-tone degrees for the given bar.
    pub fn color_tones(&self, _bar: usize) -> &[usize] {
        &self.color_tone_degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_parse_and_pitch_class() {
        assert_eq!(Note::parse("A"), Some(Note::A));
        assert_eq!(Note::parse("Eb"), Some(Note::Ds));
        assert_eq!(Note::parse("f#"), Some(Note::Fs));
        assert_eq!(Note::parse("H"), None);
        assert_eq!(Note::A.pitch_class(), 9);
        assert_eq!(Note::from_pitch_class(21), Note::A);
    }

    #[test]
    fn test_scale_intervals() {
        assert_eq!(ScaleType::Aeolian.intervals(), &[0, 2, 3, 5, 7, 8, 10]);
        assert_eq!(ScaleType::MinorPent.intervals(), &[0, 3, 5, 7, 10]);
        assert_eq!(ScaleType::parse("minor"), Some(ScaleType::Aeolian));
        assert_eq!(ScaleType::parse("minor-pentatonic"), Some(ScaleType::MinorPent));
        assert_eq!(ScaleType::parse("lydian"), None);
    }

    #[test]
    fn test_keyspec_contains_and_degrees() {
        // A aeolian at octave 2: root A2 = 33.
        let key = KeySpec::new(9, ScaleType::Aeolian, 2);
        assert_eq!(key.root_midi(), 33);
        assert!(key.contains(33)); // A
        assert!(key.contains(40)); // E
        assert!(!key.contains(34)); // Bb not in A minor

        assert_eq!(key.degree_of(33), Some(1));
        assert_eq!(key.degree_of(40), Some(5));
        assert_eq!(key.degree_of(34), None);

        assert_eq!(key.degree_to_pitch(1, 0), 33);
        assert_eq!(key.degree_to_pitch(5, 0), 40);
        assert_eq!(key.degree_to_pitch(1, 1), 45);
    }

    #[test]
    fn test_snap_prefers_nearest() {
        let key = KeySpec::new(9, ScaleType::Aeolian, 2);
        // 34 (Bb) is not in A minor; neighbours 33 (A) and 35 (B) both are,
        // tie resolves downward.
        assert_eq!(key.snap(34), 33);
        assert_eq!(key.snap(40), 40);
    }

    #[test]
    fn test_pitches_in_range() {
        let key = KeySpec::new(9, ScaleType::MinorPent, 2);
        let pitches = key.pitches_in_range(33, 45);
        assert!(pitches.contains(&33));
        assert!(pitches.contains(&45));
        for p in pitches {
            assert!(key.contains(p));
        }
    }

    #[test]
    fn test_harmony_track_static() {
        let key = KeySpec::default_minor();
        let track = HarmonyTrack::tonic_minor(key, 8);
        assert_eq!(track.bars(), 8);
        assert_eq!(track.tonic(0), track.tonic(7));
        assert_eq!(track.chord_tones(0), &[1, 3, 5]);
        assert!(track.color_tones(3).contains(&7));
    }
}
