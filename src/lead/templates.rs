// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Built-in rhythm and contour templates for the lead realiser.
//!
//! Templates are one bar long and tiled across a segment. Selection is a
//! weighted draw filtered by role, keyed to the segment's RNG stream.

use rand::Rng;

use crate::timebase::weighted_choice;

use super::phrase::PhraseRole;

/// Slot affinity a rhythm event prefers during alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorType {
    BarStart,
    Offbeat,
    SnareZone,
    Any,
}

/// One event of a rhythm template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhythmEvent {
    pub step: usize,
    pub length_steps: usize,
    pub accent: bool,
    pub anchor: AnchorType,
}

/// A one-bar rhythm cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhythmTemplate {
    pub id: &'static str,
    pub call: bool,
    pub resp: bool,
    pub weight: f64,
    pub events: &'static [RhythmEvent],
}

/// Tension stages along a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tension {
    Rise,
    Peak,
    Fall,
    Hold,
    Resolve,
}

/// A melodic contour: degree intervals with emphasis marks and a tension
/// profile, both cycled over the segment's events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourTemplate {
    pub id: &'static str,
    pub call: bool,
    pub resp: bool,
    pub weight: f64,
    pub intervals: &'static [i8],
    pub emphasis_indices: &'static [usize],
    pub tension: &'static [Tension],
}

const fn ev(step: usize, length_steps: usize, accent: bool, anchor: AnchorType) -> RhythmEvent {
    RhythmEvent {
        step,
        length_steps,
        accent,
        anchor,
    }
}

/// Built-in rhythm templates.
pub const RHYTHM_TEMPLATES: &[RhythmTemplate] = &[
    RhythmTemplate {
        id: "call_pickup",
        call: true,
        resp: false,
        weight: 1.0,
        events: &[
            ev(0, 2, true, AnchorType::BarStart),
            ev(3, 1, false, AnchorType::Any),
            ev(6, 2, false, AnchorType::Offbeat),
            ev(10, 1, false, AnchorType::Offbeat),
            ev(12, 2, true, AnchorType::Any),
        ],
    },
    RhythmTemplate {
        id: "call_offbeat_run",
        call: true,
        resp: false,
        weight: 0.8,
        events: &[
            ev(2, 2, false, AnchorType::Offbeat),
            ev(6, 2, true, AnchorType::Offbeat),
            ev(10, 2, false, AnchorType::Offbeat),
            ev(14, 2, false, AnchorType::Offbeat),
        ],
    },
    RhythmTemplate {
        id: "call_sparse",
        call: true,
        resp: true,
        weight: 0.6,
        events: &[
            ev(0, 4, true, AnchorType::BarStart),
            ev(8, 2, false, AnchorType::Any),
            ev(12, 2, false, AnchorType::SnareZone),
        ],
    },
    RhythmTemplate {
        id: "resp_answer",
        call: false,
        resp: true,
        weight: 1.0,
        events: &[
            ev(0, 2, false, AnchorType::BarStart),
            ev(4, 2, true, AnchorType::SnareZone),
            ev(8, 4, false, AnchorType::Any),
        ],
    },
    RhythmTemplate {
        id: "resp_tail",
        call: false,
        resp: true,
        weight: 0.8,
        events: &[
            ev(2, 2, false, AnchorType::Offbeat),
            ev(6, 2, false, AnchorType::Any),
            ev(12, 4, true, AnchorType::SnareZone),
        ],
    },
    RhythmTemplate {
        id: "resp_rest",
        call: false,
        resp: true,
        weight: 0.5,
        events: &[
            ev(3, 4, false, AnchorType::SnareZone),
            ev(12, 3, true, AnchorType::Any),
        ],
    },
];

/// Built-in contour templates.
pub const CONTOUR_TEMPLATES: &[ContourTemplate] = &[
    ContourTemplate {
        id: "arch",
        call: true,
        resp: true,
        weight: 1.0,
        intervals: &[0, 2, 1, -1, -2],
        emphasis_indices: &[2],
        tension: &[
            Tension::Rise,
            Tension::Rise,
            Tension::Peak,
            Tension::Fall,
            Tension::Resolve,
        ],
    },
    ContourTemplate {
        id: "rise",
        call: true,
        resp: false,
        weight: 0.9,
        intervals: &[0, 1, 1, 2],
        emphasis_indices: &[3],
        tension: &[Tension::Hold, Tension::Rise, Tension::Rise, Tension::Peak],
    },
    ContourTemplate {
        id: "fall_resolve",
        call: false,
        resp: true,
        weight: 1.0,
        intervals: &[0, -1, -1, -2],
        emphasis_indices: &[0],
        tension: &[
            Tension::Peak,
            Tension::Fall,
            Tension::Fall,
            Tension::Resolve,
        ],
    },
    ContourTemplate {
        id: "wave",
        call: true,
        resp: true,
        weight: 0.7,
        intervals: &[0, 2, -1, 2, -2],
        emphasis_indices: &[1, 3],
        tension: &[
            Tension::Rise,
            Tension::Peak,
            Tension::Fall,
            Tension::Peak,
            Tension::Resolve,
        ],
    },
    ContourTemplate {
        id: "drone_turn",
        call: true,
        resp: true,
        weight: 0.5,
        intervals: &[0, 0, 1, 0],
        emphasis_indices: &[2],
        tension: &[Tension::Hold, Tension::Hold, Tension::Rise, Tension::Resolve],
    },
];

fn role_matches(call: bool, resp: bool, role: PhraseRole) -> bool {
    match role {
        PhraseRole::Call => call,
        PhraseRole::Resp => resp,
    }
}

/// Weighted draw of a rhythm template for a role.
pub fn pick_rhythm<R: Rng>(role: PhraseRole, rng: &mut R) -> &'static RhythmTemplate {
    let candidates: Vec<&RhythmTemplate> = RHYTHM_TEMPLATES
        .iter()
        .filter(|t| role_matches(t.call, t.resp, role))
        .collect();
    let weights: Vec<f64> = candidates.iter().map(|t| t.weight).collect();
    candidates[weighted_choice(rng, &weights)]
}

/// Weighted draw of a contour template for a role.
pub fn pick_contour<R: Rng>(role: PhraseRole, rng: &mut R) -> &'static ContourTemplate {
    let candidates: Vec<&ContourTemplate> = CONTOUR_TEMPLATES
        .iter()
        .filter(|t| role_matches(t.call, t.resp, role))
        .collect();
    let weights: Vec<f64> = candidates.iter().map(|t| t.weight).collect();
    candidates[weighted_choice(rng, &weights)]
}
