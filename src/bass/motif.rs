// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bass motif store: a short cell of `(step, pool_index)` pairs repeated
//! bar to bar with controlled variation at phrase boundaries.

use rand::Rng;

use crate::rhythm::is_beat_step;
use crate::timebase::STEPS_PER_BAR;

/// A 1-bar pitch+rhythm cell. `pool_index` points into the mode's pitch
/// pool; step order is ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Motif {
    pub cells: Vec<(usize, usize)>,
}

/// Mode-safe variations applied at 2/4/8-bar boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variation {
    /// Move one cell's pool index by ±1.
    NudgePool,
    /// Swap root and fifth assignments.
    SwapRootFifth,
    /// Substitute one cell with its octave pool entry.
    OctaveSub,
    /// Add one cell at a free step.
    AddNote,
    /// Remove one non-anchor cell.
    RemoveNote,
}

impl Motif {
    /// Build a motif from selected steps: the bar-start anchor and beats
    /// take the root, offbeats the fifth when the pool has one, the rest
    /// alternate.
    pub fn from_steps(steps: &[usize], pool: &[i8]) -> Self {
        let root_idx = pool.iter().position(|&o| o == 0).unwrap_or(0);
        let fifth_idx = pool.iter().position(|&o| o == 7).unwrap_or(root_idx);
        let mut cells = Vec::with_capacity(steps.len());
        for (i, &step) in steps.iter().enumerate() {
            let idx = if step == 0 || is_beat_step(step) {
                root_idx
            } else if fifth_idx != root_idx {
                fifth_idx
            } else if pool.len() > 1 {
                // No fifth in the pool: alternate through what exists.
                i % pool.len()
            } else {
                root_idx
            };
            cells.push((step, idx));
        }
        cells.sort_unstable();
        Self { cells }
    }

    /// Steps of this motif, ascending.
    pub fn steps(&self) -> Vec<usize> {
        self.cells.iter().map(|&(s, _)| s).collect()
    }

    /// Apply one variation in place.
    pub fn vary<R: Rng>(&mut self, variation: Variation, pool: &[i8], rng: &mut R) {
        if self.cells.is_empty() {
            return;
        }
        match variation {
            Variation::NudgePool => {
                let i = rng.gen_range(0..self.cells.len());
                let (_, idx) = self.cells[i];
                let next = if rng.gen::<bool>() {
                    (idx + 1).min(pool.len() - 1)
                } else {
                    idx.saturating_sub(1)
                };
                self.cells[i].1 = next;
            }
            Variation::SwapRootFifth => {
                let root_idx = pool.iter().position(|&o| o == 0).unwrap_or(0);
                let fifth_idx = pool.iter().position(|&o| o == 7).unwrap_or(root_idx);
                if root_idx == fifth_idx {
                    return;
                }
                for cell in self.cells.iter_mut() {
                    // The bar-start anchor keeps the root.
                    if cell.0 == 0 {
                        continue;
                    }
                    if cell.1 == root_idx {
                        cell.1 = fifth_idx;
                    } else if cell.1 == fifth_idx {
                        cell.1 = root_idx;
                    }
                }
            }
            Variation::OctaveSub => {
                if let Some(oct_idx) = pool.iter().position(|&o| o == 12 || o == -12) {
                    let i = rng.gen_range(0..self.cells.len());
                    self.cells[i].1 = oct_idx;
                }
            }
            Variation::AddNote => {
                let occupied = self.steps();
                let free: Vec<usize> = (0..STEPS_PER_BAR)
                    .filter(|s| !occupied.contains(s))
                    .collect();
                if free.is_empty() {
                    return;
                }
                let step = free[rng.gen_range(0..free.len())];
                let idx = rng.gen_range(0..pool.len());
                self.cells.push((step, idx));
                self.cells.sort_unstable();
            }
            Variation::RemoveNote => {
                if self.cells.len() <= 1 {
                    return;
                }
                let removable: Vec<usize> = self
                    .cells
                    .iter()
                    .enumerate()
                    .filter(|(_, &(s, _))| s != 0)
                    .map(|(i, _)| i)
                    .collect();
                if let Some(&i) = removable.get(rng.gen_range(0..removable.len().max(1))) {
                    self.cells.remove(i);
                }
            }
        }
    }
}

/// Variation kind for a bar boundary, largest period first. Non-boundary
/// bars return `None` and repeat the motif verbatim.
pub fn boundary_variation(bar: u32) -> Option<Variation> {
    if bar == 0 {
        None
    } else if bar % 8 == 0 {
        Some(Variation::OctaveSub)
    } else if bar % 4 == 0 {
        Some(Variation::SwapRootFifth)
    } else if bar % 2 == 0 {
        Some(Variation::NudgePool)
    } else {
        None
    }
}

/// Hamming similarity of two step-onset sets over the 16-step grid:
/// agreeing positions (both on or both off) over 16.
pub fn hamming_similarity(a: &[usize], b: &[usize]) -> f64 {
    let mut agree = 0;
    for step in 0..STEPS_PER_BAR {
        if a.contains(&step) == b.contains(&step) {
            agree += 1;
        }
    }
    agree as f64 / STEPS_PER_BAR as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebase::SeedChain;

    const POOL: [i8; 3] = [0, 7, 12];

    #[test]
    fn test_from_steps_assigns_root_on_beats() {
        let motif = Motif::from_steps(&[0, 4, 6, 10], &POOL);
        assert_eq!(motif.cells[0], (0, 0));
        assert_eq!(motif.cells[1], (4, 0));
        assert_eq!(motif.cells[2].1, 1, "offbeat takes the fifth");
    }

    #[test]
    fn test_swap_root_fifth_keeps_anchor() {
        let mut motif = Motif::from_steps(&[0, 4, 6], &POOL);
        let mut rng = SeedChain::new(1).rng("motif", 0, 0);
        motif.vary(Variation::SwapRootFifth, &POOL, &mut rng);
        assert_eq!(motif.cells[0].1, 0, "anchor keeps root");
        assert_eq!(motif.cells[1].1, 1, "beat root becomes fifth");
        assert_eq!(motif.cells[2].1, 0, "fifth becomes root");
    }

    #[test]
    fn test_add_and_remove() {
        let mut rng = SeedChain::new(2).rng("motif", 0, 0);
        let mut motif = Motif::from_steps(&[0, 6], &POOL);
        motif.vary(Variation::AddNote, &POOL, &mut rng);
        assert_eq!(motif.cells.len(), 3);
        motif.vary(Variation::RemoveNote, &POOL, &mut rng);
        assert_eq!(motif.cells.len(), 2);
        assert!(motif.steps().contains(&0), "anchor never removed");
    }

    #[test]
    fn test_boundary_schedule() {
        assert_eq!(boundary_variation(0), None);
        assert_eq!(boundary_variation(1), None);
        assert_eq!(boundary_variation(2), Some(Variation::NudgePool));
        assert_eq!(boundary_variation(4), Some(Variation::SwapRootFifth));
        assert_eq!(boundary_variation(8), Some(Variation::OctaveSub));
        assert_eq!(boundary_variation(6), Some(Variation::NudgePool));
    }

    #[test]
    fn test_hamming_similarity() {
        assert_eq!(hamming_similarity(&[0, 4], &[0, 4]), 1.0);
        let sim = hamming_similarity(&[0, 4], &[0, 6]);
        assert!((sim - 14.0 / 16.0).abs() < 1e-9);
        assert_eq!(hamming_similarity(&[], &[]), 1.0);
    }
}
