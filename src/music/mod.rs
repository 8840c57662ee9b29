// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Music theory primitives: pitch classes, scales, keys, harmony.

pub mod scale;

pub use scale::{HarmonyTrack, KeySpec, Note, ScaleType};
