// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Event merger: converts engine outputs to note tracks, expands ratchets,
//! clips to the clip boundary, and provides the sorted single-stream view
//! with the `(tick, off-before-on, track, pitch)` ordering.

use crate::bass::BassNote;
use crate::config::EngineConfig;
use crate::drums::{DrumEvent, LayerId};
use crate::lead::LeadNote;
use crate::midi::{NoteEvent, Track};
use crate::timebase::ticks_per_bar;

/// Track indices in the merged output.
pub const TRACK_DRUMS: u8 = 0;
pub const TRACK_BASS: u8 = 1;
pub const TRACK_LEAD: u8 = 2;

/// Channel assignments (GM percussion on 10, zero-indexed 9).
pub const CHANNEL_DRUMS: u8 = 9;
pub const CHANNEL_BASS: u8 = 1;
pub const CHANNEL_LEAD: u8 = 2;

/// Event kind in the flattened stream; note_off orders first at a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    NoteOff,
    NoteOn,
}

/// One element of the flattened, sorted event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub tick: u64,
    pub kind: EventKind,
    pub track: u8,
    pub channel: u8,
    pub pitch: u8,
    pub velocity: u8,
}

/// Convert drum events to a note track, expanding ratchets into equal
/// sub-hits and clipping at the clip end.
pub fn drum_track(events: &[DrumEvent], config: &EngineConfig) -> Track {
    let total_ticks = config.bars as u64 * ticks_per_bar(config.ppq);
    let mut track = Track::new("Drums", CHANNEL_DRUMS);

    for ev in events {
        let note = layer_note(ev.layer, config);
        let start = ev.start_tick(config.ppq);
        if start >= total_ticks {
            continue;
        }
        let duration = ev.duration_ticks.max(1);
        if ev.ratchet > 1 {
            let rep = ev.ratchet as u64;
            let sub = (duration / rep).max(1);
            for r in 0..rep {
                let t = start + r * sub;
                if t >= total_ticks {
                    break;
                }
                track.add_note(NoteEvent::new(
                    t,
                    note,
                    ev.velocity,
                    sub.min(total_ticks - t),
                ));
            }
        } else {
            track.add_note(NoteEvent::new(
                start,
                note,
                ev.velocity,
                duration.min(total_ticks - start),
            ));
        }
    }
    track.sort();
    track
}

fn layer_note(layer: LayerId, config: &EngineConfig) -> u8 {
    config
        .layers
        .get(layer.name())
        .map(|c| c.note)
        .unwrap_or_else(|| layer.default_note())
}

/// Convert bass notes (beat time) to a note track.
pub fn bass_track(notes: &[BassNote], config: &EngineConfig) -> Track {
    let total_ticks = config.bars as u64 * ticks_per_bar(config.ppq);
    let ppq = config.ppq as f64;
    let mut track = Track::new("Bass", CHANNEL_BASS);
    for n in notes {
        let tick = (n.start_beat * ppq).round().max(0.0) as u64;
        if tick >= total_ticks {
            continue;
        }
        let duration = ((n.duration_beats * ppq).round() as u64).max(1);
        track.add_note(NoteEvent::new(
            tick,
            n.pitch,
            n.velocity,
            duration.min(total_ticks - tick),
        ));
    }
    track.sort();
    track
}

/// Convert lead notes (already in ticks) to a note track.
pub fn lead_track(notes: &[LeadNote], config: &EngineConfig) -> Track {
    let total_ticks = config.bars as u64 * ticks_per_bar(config.ppq);
    let mut track = Track::new("Lead", CHANNEL_LEAD);
    for n in notes {
        if n.start_tick >= total_ticks {
            continue;
        }
        track.add_note(NoteEvent::new(
            n.start_tick,
            n.pitch,
            n.velocity,
            n.duration_ticks.max(1).min(total_ticks - n.start_tick),
        ));
    }
    track.sort();
    track
}

/// Flatten tracks into one stream obeying the sort law:
/// non-decreasing `(tick, off-before-on, track, pitch)`.
pub fn merged_stream(tracks: &[Track]) -> Vec<TimedEvent> {
    let mut out = Vec::new();
    for (index, track) in tracks.iter().enumerate() {
        for n in &track.notes {
            out.push(TimedEvent {
                tick: n.tick,
                kind: EventKind::NoteOn,
                track: index as u8,
                channel: track.channel,
                pitch: n.note,
                velocity: n.velocity.max(1),
            });
            out.push(TimedEvent {
                tick: n.end_tick(),
                kind: EventKind::NoteOff,
                track: index as u8,
                channel: track.channel,
                pitch: n.note,
                velocity: 0,
            });
        }
    }
    out.sort_by_key(|e| (e.tick, e.kind, e.track, e.pitch));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn config() -> EngineConfig {
        EngineConfig::from_json(
            r#"{
                "mode": "drums_only",
                "bpm": 120,
                "ppq": 1920,
                "bars": 1,
                "layers": { "kick": { "fills": 4, "note": 36 } }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_drum_track_notes() {
        let config = config();
        let mut events = crate::drums::backbone_events(1);
        events.retain(|e| e.layer == LayerId::Kick);
        crate::drums::finalize_durations(&mut events, config.ppq);
        let track = drum_track(&events, &config);
        assert_eq!(track.notes.len(), 4);
        assert_eq!(track.notes[0].note, 36);
        assert_eq!(track.channel, CHANNEL_DRUMS);
    }

    #[test]
    fn test_ratchet_expansion() {
        let config = config();
        let ev = DrumEvent {
            layer: LayerId::HatClosed,
            bar: 0,
            step: 0,
            velocity: 80,
            micro_offset_ticks: 0,
            duration_ticks: 240,
            offset_32nds: 0,
            ratchet: 3,
        };
        let track = drum_track(&[ev], &config);
        assert_eq!(track.notes.len(), 3);
        assert_eq!(track.notes[0].tick, 0);
        assert_eq!(track.notes[1].tick, 80);
        assert_eq!(track.notes[2].tick, 160);
    }

    #[test]
    fn test_boundary_clipping() {
        let config = config(); // 1 bar = 7680 ticks
        let ev = DrumEvent {
            layer: LayerId::Kick,
            bar: 0,
            step: 15,
            velocity: 110,
            micro_offset_ticks: 0,
            duration_ticks: 2000,
            offset_32nds: 0,
            ratchet: 1,
        };
        let track = drum_track(&[ev], &config);
        let n = &track.notes[0];
        assert!(n.tick + n.duration <= 7680);
    }

    #[test]
    fn test_sort_law() {
        let config = config();
        let mut events = crate::drums::backbone_events(2);
        crate::drums::finalize_durations(&mut events, config.ppq);
        let track = drum_track(&events, &config);
        let stream = merged_stream(&[track]);

        for w in stream.windows(2) {
            let a = (w[0].tick, w[0].kind, w[0].track, w[0].pitch);
            let b = (w[1].tick, w[1].kind, w[1].track, w[1].pitch);
            assert!(a <= b, "stream out of order: {:?} then {:?}", a, b);
        }
    }

    #[test]
    fn test_off_before_on_at_same_tick() {
        let mut track = Track::new("Mono", 0);
        track.add_note(NoteEvent::new(0, 60, 100, 100));
        track.add_note(NoteEvent::new(100, 62, 100, 100));
        let stream = merged_stream(&[track]);
        let at_100: Vec<&TimedEvent> = stream.iter().filter(|e| e.tick == 100).collect();
        assert_eq!(at_100[0].kind, EventKind::NoteOff);
        assert_eq!(at_100[1].kind, EventKind::NoteOn);
    }
}
