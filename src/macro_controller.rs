//! Stability Macro Controller
//!
//! Contract:
//! - One knob (stability) plus the mode push the four character controls
//! - No reverse mapping
//! - No state
//! - Safe at control/audio rate (no allocation)
//!
//! Every mode has its own resting point at full stability and a slope that
//! `u = 1 - stability` walks along toward the chaotic end.

use crate::controls::Controls;
use crate::dsp::utils::clamp01;
use crate::mode::{Mode, MODE_COUNT};
use serde::{Deserialize, Serialize};

// =============================================================================
// Character table
// =============================================================================

/// Derived character controls, all in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterTargets {
    pub memory: f32,
    pub coherence: f32,
    pub entropy: f32,
    pub resistance: f32,
}

/// `(base, slope)` pairs; value = `base + slope * u`.
#[derive(Clone, Copy)]
struct CharacterCurve {
    memory: (f32, f32),
    coherence: (f32, f32),
    entropy: (f32, f32),
    resistance: (f32, f32),
}

const CHARACTER_CURVES: [CharacterCurve; MODE_COUNT] = [
    // Living Signal
    CharacterCurve {
        memory: (0.55, 0.35),
        coherence: (0.70, -0.45),
        entropy: (0.25, 0.60),
        resistance: (0.72, -0.35),
    },
    // Uncanny Causality
    CharacterCurve {
        memory: (0.70, 0.25),
        coherence: (0.62, -0.48),
        entropy: (0.32, 0.58),
        resistance: (0.68, -0.40),
    },
    // Spectral Ghost
    CharacterCurve {
        memory: (0.66, 0.22),
        coherence: (0.45, -0.35),
        entropy: (0.40, 0.55),
        resistance: (0.60, -0.35),
    },
    // Rainforest Memory
    CharacterCurve {
        memory: (0.80, 0.20),
        coherence: (0.48, -0.32),
        entropy: (0.36, 0.48),
        resistance: (0.55, -0.30),
    },
    // Process Imprint
    CharacterCurve {
        memory: (0.62, 0.30),
        coherence: (0.50, -0.35),
        entropy: (0.48, 0.43),
        resistance: (0.66, -0.33),
    },
    // Digital Failure
    CharacterCurve {
        memory: (0.48, 0.42),
        coherence: (0.58, -0.52),
        entropy: (0.52, 0.46),
        resistance: (0.62, -0.37),
    },
    // Anti-Space
    CharacterCurve {
        memory: (0.54, 0.30),
        coherence: (0.74, -0.40),
        entropy: (0.20, 0.66),
        resistance: (0.70, -0.35),
    },
    // Afterimage
    CharacterCurve {
        memory: (0.78, 0.20),
        coherence: (0.60, -0.42),
        entropy: (0.28, 0.63),
        resistance: (0.68, -0.40),
    },
    // Habit Room
    CharacterCurve {
        memory: (0.85, 0.15),
        coherence: (0.40, -0.30),
        entropy: (0.38, 0.58),
        resistance: (0.50, -0.30),
    },
];

#[inline(always)]
fn along((base, slope): (f32, f32), u: f32) -> f32 {
    clamp01(base + slope * u)
}

pub fn compute_character_targets(mode: Mode, stability: f32) -> CharacterTargets {
    let u = 1.0 - clamp01(stability);
    let curve = &CHARACTER_CURVES[mode.index()];
    CharacterTargets {
        memory: along(curve.memory, u),
        coherence: along(curve.coherence, u),
        entropy: along(curve.entropy, u),
        resistance: along(curve.resistance, u),
    }
}

// =============================================================================
// Breath sync
// =============================================================================

/// Breathing period: free-running Hz, or a note division of the host tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BreathSync {
    #[default]
    Free,
    #[serde(rename = "1 Bar")]
    Bar,
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/8")]
    Eighth,
    #[serde(rename = "1/16")]
    Sixteenth,
    #[serde(rename = "1/8T")]
    EighthTriplet,
    #[serde(rename = "1/4D")]
    DottedQuarter,
}

impl BreathSync {
    pub fn is_synced(self) -> bool {
        self != BreathSync::Free
    }

    /// Breath period in beats. `Free` reports 1 beat, which the engine
    /// ignores while tempo sync is off.
    pub fn beats(self) -> f32 {
        match self {
            BreathSync::Free => 1.0,
            BreathSync::Bar => 4.0,
            BreathSync::Half => 2.0,
            BreathSync::Quarter => 1.0,
            BreathSync::Eighth => 0.5,
            BreathSync::Sixteenth => 0.25,
            BreathSync::EighthTriplet => 1.0 / 3.0,
            BreathSync::DottedQuarter => 1.5,
        }
    }
}

// =============================================================================
// Macro -> Controls
// =============================================================================

/// Everything a host exposes besides the mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroInput {
    pub stability: f32,
    pub breath_sync: BreathSync,
    pub breath_rate_hz: f32,
    pub breath_depth: f32,
    /// Host tempo. Non-positive means "unknown" and falls back to 120.
    pub bpm: f32,
    pub wild_ir_bank: bool,
    pub freeze: bool,
    pub dry: f32,
    pub wet: f32,
}

impl Default for MacroInput {
    fn default() -> Self {
        let c = Controls::default();
        Self {
            stability: c.stability,
            breath_sync: BreathSync::Free,
            breath_rate_hz: c.breath_rate_hz,
            breath_depth: c.breath_depth,
            bpm: c.bpm,
            wild_ir_bank: c.wild_ir_bank,
            freeze: c.freeze,
            dry: c.dry,
            wet: c.wet,
        }
    }
}

/// Build a full, sanitized control set for `mode` from the macro inputs.
pub fn controls_from_macro(mode: Mode, input: &MacroInput) -> Controls {
    let stability = clamp01(if input.stability.is_finite() {
        input.stability
    } else {
        Controls::default().stability
    });
    let character = compute_character_targets(mode, stability);
    let bpm = if input.bpm > 0.0 { input.bpm } else { 120.0 };

    Controls {
        memory: character.memory,
        coherence: character.coherence,
        entropy: character.entropy,
        resistance: character.resistance,
        stability,
        breath_rate_hz: input.breath_rate_hz,
        breath_depth: input.breath_depth,
        breath_beats: input.breath_sync.beats(),
        bpm,
        tempo_sync: input.breath_sync.is_synced(),
        wild_ir_bank: input.wild_ir_bank,
        freeze: input.freeze,
        wet: input.wet,
        dry: input.dry,
    }
    .sanitized()
}
