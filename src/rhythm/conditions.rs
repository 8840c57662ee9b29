// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Step-condition gates applied after mask construction.
//!
//! Conditions compose left-to-right; an onset survives only if every
//! condition passes. `Pre`/`NotPre` look at the referenced layer's mask in
//! the previous bar at the same step.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::StepMask;
use crate::timebase::bernoulli;

/// A single gate in a layer's condition stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StepCondition {
    /// Keep the onset with probability `p`.
    Prob { p: f64 },
    /// Keep the onset only if `layer` had an onset at this step last bar.
    Pre { layer: String },
    /// Keep the onset only if `layer` had no onset at this step last bar.
    NotPre { layer: String },
    /// Keep onsets only in the final bar of each 4-bar phrase.
    Fill,
    /// Keep onsets when `(bar + offset) % n == 0`.
    EveryN {
        n: u32,
        #[serde(default)]
        offset: u32,
    },
}

impl StepCondition {
    /// Layer name referenced by this condition, if any.
    pub fn referenced_layer(&self) -> Option<&str> {
        match self {
            StepCondition::Pre { layer } | StepCondition::NotPre { layer } => Some(layer),
            _ => None,
        }
    }
}

/// True when `bar` is the last bar of its 4-bar phrase.
pub fn is_fill_bar(bar: u32) -> bool {
    (bar + 1) % 4 == 0
}

/// EVERY_N schedule test on 0-based bar indices.
pub fn every_n(bar: u32, n: u32, offset: u32) -> bool {
    n > 0 && (bar + offset) % n == 0
}

/// Apply a condition stack to one bar's mask.
///
/// `prev_bar` maps layer names to their final masks from the previous bar;
/// a missing entry (including bar 0) fails `Pre` and passes `NotPre`.
pub fn apply_conditions<R: Rng>(
    mask: &mut StepMask,
    bar: u32,
    conditions: &[StepCondition],
    prev_bar: &BTreeMap<String, StepMask>,
    rng: &mut R,
) {
    if conditions.is_empty() {
        return;
    }
    for step in 0..mask.len() {
        if !mask[step] {
            continue;
        }
        for cond in conditions {
            let pass = match cond {
                StepCondition::Prob { p } => bernoulli(rng, *p),
                StepCondition::Pre { layer } => {
                    prev_bar.get(layer).map(|m| m[step]).unwrap_or(false)
                }
                StepCondition::NotPre { layer } => {
                    !prev_bar.get(layer).map(|m| m[step]).unwrap_or(false)
                }
                StepCondition::Fill => is_fill_bar(bar),
                StepCondition::EveryN { n, offset } => every_n(bar, *n, *offset),
            };
            if !pass {
                mask[step] = false;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::mask_from_steps;
    use crate::timebase::SeedChain;

    fn no_prev() -> BTreeMap<String, StepMask> {
        BTreeMap::new()
    }

    #[test]
    fn test_fill_bar_schedule() {
        assert!(!is_fill_bar(0));
        assert!(is_fill_bar(3));
        assert!(is_fill_bar(7));
        assert!(!is_fill_bar(4));
    }

    #[test]
    fn test_every_n() {
        assert!(every_n(0, 4, 0));
        assert!(!every_n(1, 4, 0));
        assert!(every_n(2, 4, 2));
        assert!(!every_n(3, 0, 0));
    }

    #[test]
    fn test_prob_zero_and_one() {
        let mut rng = SeedChain::new(1).rng("cond", 0, 0);

        let mut mask = mask_from_steps(&[0, 4, 8, 12]);
        apply_conditions(
            &mut mask,
            0,
            &[StepCondition::Prob { p: 0.0 }],
            &no_prev(),
            &mut rng,
        );
        assert_eq!(mask.iter().filter(|&&v| v).count(), 0);

        let mut mask = mask_from_steps(&[0, 4, 8, 12]);
        apply_conditions(
            &mut mask,
            0,
            &[StepCondition::Prob { p: 1.0 }],
            &no_prev(),
            &mut rng,
        );
        assert_eq!(mask.iter().filter(|&&v| v).count(), 4);
    }

    #[test]
    fn test_pre_references_previous_bar() {
        let mut rng = SeedChain::new(2).rng("cond", 0, 0);
        let mut prev = no_prev();
        prev.insert("kick".to_string(), mask_from_steps(&[0, 8]));

        let mut mask = mask_from_steps(&[0, 4, 8, 12]);
        apply_conditions(
            &mut mask,
            1,
            &[StepCondition::Pre {
                layer: "kick".to_string(),
            }],
            &prev,
            &mut rng,
        );
        assert!(mask[0] && mask[8]);
        assert!(!mask[4] && !mask[12]);
    }

    #[test]
    fn test_not_pre_negates() {
        let mut rng = SeedChain::new(3).rng("cond", 0, 0);
        let mut prev = no_prev();
        prev.insert("kick".to_string(), mask_from_steps(&[0, 8]));

        let mut mask = mask_from_steps(&[0, 4, 8, 12]);
        apply_conditions(
            &mut mask,
            1,
            &[StepCondition::NotPre {
                layer: "kick".to_string(),
            }],
            &prev,
            &mut rng,
        );
        assert!(!mask[0] && !mask[8]);
        assert!(mask[4] && mask[12]);
    }

    #[test]
    fn test_pre_on_first_bar_fails() {
        let mut rng = SeedChain::new(4).rng("cond", 0, 0);
        let mut mask = mask_from_steps(&[0]);
        apply_conditions(
            &mut mask,
            0,
            &[StepCondition::Pre {
                layer: "kick".to_string(),
            }],
            &no_prev(),
            &mut rng,
        );
        assert!(!mask[0]);
    }

    #[test]
    fn test_conditions_compose_left_to_right() {
        let mut rng = SeedChain::new(5).rng("cond", 0, 0);
        // FILL fails on bar 0, so even Prob(1.0) onsets are removed.
        let mut mask = mask_from_steps(&[2, 6]);
        apply_conditions(
            &mut mask,
            0,
            &[StepCondition::Prob { p: 1.0 }, StepCondition::Fill],
            &no_prev(),
            &mut rng,
        );
        assert_eq!(mask.iter().filter(|&&v| v).count(), 0);

        let mut mask = mask_from_steps(&[2, 6]);
        apply_conditions(
            &mut mask,
            3,
            &[StepCondition::Prob { p: 1.0 }, StepCondition::Fill],
            &no_prev(),
            &mut rng,
        );
        assert_eq!(mask.iter().filter(|&&v| v).count(), 2);
    }

    #[test]
    fn test_condition_json_shape() {
        let cond: StepCondition =
            serde_json::from_str(r#"{"kind":"every_n","n":4,"offset":2}"#).unwrap();
        assert_eq!(cond, StepCondition::EveryN { n: 4, offset: 2 });

        let cond: StepCondition = serde_json::from_str(r#"{"kind":"prob","p":0.5}"#).unwrap();
        assert_eq!(cond, StepCondition::Prob { p: 0.5 });
    }
}
