// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Drum analyzer: turns the emitted drum stream into a per-bar slot grid.
//!
//! Every 16th-note slot gets a label record describing its relationship to
//! the kick, snare and hat layers. The grid is built once in a single pass
//! and read-only afterwards; the bass and lead engines borrow it.

use crate::drums::{DrumEvent, LayerId};
use crate::timebase::{step_ticks, ticks_per_bar, STEPS_PER_BAR};

/// Labels for one 16th-note slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotLabel {
    /// A kick onset sits within a quarter step of this slot.
    pub is_kick: bool,
    /// The next slot carries a kick.
    pub pre_kick: bool,
    /// The previous slot carried a kick.
    pub post_kick: bool,
    /// A snare or clap onset within one step.
    pub snare_zone: bool,
    /// First slot of the bar.
    pub bar_start: bool,
    /// Last slot of the bar.
    pub bar_end: bool,
    /// Last two slots of the last bar of a 4-bar group.
    pub fill_zone: bool,
    /// Three or more hat onsets in the surrounding five-slot window.
    pub hat_dense: bool,
    /// No hat onsets in the surrounding five-slot window.
    pub hat_sparse: bool,
}

/// One bar of slot labels plus the per-layer step sets behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSlots {
    pub labels: [SlotLabel; STEPS_PER_BAR],
    pub kick_steps: Vec<usize>,
    pub snare_steps: Vec<usize>,
    pub hat_steps: Vec<usize>,
}

impl BarSlots {
    /// Drum energy of this bar: kicks weighted 1, snares 0.8, hats 0.5.
    pub fn energy(&self) -> f64 {
        self.kick_steps.len() as f64
            + 0.8 * self.snare_steps.len() as f64
            + 0.5 * self.hat_steps.len() as f64
    }
}

/// The full analyzed grid, one [`BarSlots`] per bar.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotGrid {
    bars: Vec<BarSlots>,
}

impl SlotGrid {
    /// Number of analyzed bars.
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Slots of one bar.
    pub fn bar(&self, bar: usize) -> &BarSlots {
        &self.bars[bar]
    }

    /// Label at `(bar, step)`.
    pub fn label(&self, bar: usize, step: usize) -> SlotLabel {
        self.bars[bar].labels[step]
    }

    /// Mean drum energy per bar across the grid.
    pub fn mean_energy(&self) -> f64 {
        if self.bars.is_empty() {
            return 0.0;
        }
        self.bars.iter().map(|b| b.energy()).sum::<f64>() / self.bars.len() as f64
    }
}

/// Analyze a drum event stream over `bars` bars.
///
/// Events are bucketed to their nearest 16th step by tick, so the grid is
/// stable under micro-timing. Deterministic in event ordering.
pub fn analyze(events: &[DrumEvent], bars: u32, ppq: u32) -> SlotGrid {
    let bar_ticks = ticks_per_bar(ppq);
    let st = step_ticks(ppq);
    let quarter_step = st / 4;

    let mut out: Vec<BarSlots> = (0..bars)
        .map(|_| BarSlots {
            labels: [SlotLabel::default(); STEPS_PER_BAR],
            kick_steps: Vec::new(),
            snare_steps: Vec::new(),
            hat_steps: Vec::new(),
        })
        .collect();

    for ev in events {
        let tick = ev.start_tick(ppq);
        let bar = ((tick / bar_ticks) as usize).min(bars.saturating_sub(1) as usize);
        let tick_in_bar = tick - bar as u64 * bar_ticks;
        let step = nearest_step(tick_in_bar, st);
        let offset = tick_in_bar.abs_diff(step as u64 * st);

        let slots = &mut out[bar];
        match ev.layer {
            LayerId::Kick => {
                if !slots.kick_steps.contains(&step) {
                    slots.kick_steps.push(step);
                }
                if offset <= quarter_step {
                    slots.labels[step].is_kick = true;
                }
            }
            LayerId::Snare | LayerId::Clap => {
                if !slots.snare_steps.contains(&step) {
                    slots.snare_steps.push(step);
                }
            }
            LayerId::HatClosed | LayerId::HatOpen => {
                if !slots.hat_steps.contains(&step) {
                    slots.hat_steps.push(step);
                }
            }
        }
    }

    for (bar, slots) in out.iter_mut().enumerate() {
        slots.kick_steps.sort_unstable();
        slots.snare_steps.sort_unstable();
        slots.hat_steps.sort_unstable();

        let kick_at: Vec<bool> = (0..STEPS_PER_BAR)
            .map(|s| slots.labels[s].is_kick)
            .collect();

        for step in 0..STEPS_PER_BAR {
            let label = &mut slots.labels[step];
            label.bar_start = step == 0;
            label.bar_end = step == STEPS_PER_BAR - 1;
            label.pre_kick = kick_at[(step + 1) % STEPS_PER_BAR];
            label.post_kick = kick_at[(step + STEPS_PER_BAR - 1) % STEPS_PER_BAR];
            label.fill_zone = bar % 4 == 3 && step >= STEPS_PER_BAR - 2;

            label.snare_zone = slots
                .snare_steps
                .iter()
                .any(|&s| s.abs_diff(step) <= 1);

            let hat_window = slots
                .hat_steps
                .iter()
                .filter(|&&s| {
                    let lo = step.saturating_sub(2);
                    let hi = (step + 2).min(STEPS_PER_BAR - 1);
                    s >= lo && s <= hi
                })
                .count();
            label.hat_dense = hat_window >= 3;
            label.hat_sparse = hat_window == 0;
        }
    }

    SlotGrid { bars: out }
}

fn nearest_step(tick_in_bar: u64, step_ticks: u64) -> usize {
    let step = ((tick_in_bar + step_ticks / 2) / step_ticks) as usize;
    step.min(STEPS_PER_BAR - 1)
}
