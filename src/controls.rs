//! Engine control set.
//!
//! `Controls` is a plain value: the engine stores a sanitized copy on every
//! `set_controls` and never mutates individual fields afterwards.

use crate::dsp::utils::clamp01;
use serde::{Deserialize, Serialize};

pub const BREATH_RATE_MIN_HZ: f32 = 0.03;
pub const BREATH_RATE_MAX_HZ: f32 = 8.0;
pub const BREATH_BEATS_MIN: f32 = 0.0625;
pub const BPM_MIN: f32 = 30.0;
pub const BPM_MAX: f32 = 260.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    /// Feedback/learning depth. Replaces "room size".
    pub memory: f32,
    /// Phase and stereo-image lock.
    pub coherence: f32,
    /// Probability of disorder events.
    pub entropy: f32,
    /// Feedback damping.
    pub resistance: f32,
    /// Realistic (1) -> unstable -> autonomous (0).
    pub stability: f32,
    pub breath_rate_hz: f32,
    pub breath_depth: f32,
    /// Breath period in beats; only read when `tempo_sync` is set.
    pub breath_beats: f32,
    pub bpm: f32,
    pub tempo_sync: bool,
    pub wild_ir_bank: bool,
    pub freeze: bool,
    pub wet: f32,
    pub dry: f32,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            memory: 0.5,
            coherence: 0.5,
            entropy: 0.5,
            resistance: 0.5,
            stability: 0.5,
            breath_rate_hz: 0.25,
            breath_depth: 1.0,
            breath_beats: 1.0,
            bpm: 120.0,
            tempo_sync: false,
            wild_ir_bank: false,
            freeze: false,
            wet: 0.7,
            dry: 0.3,
        }
    }
}

#[inline]
fn finite_or(x: f32, fallback: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        fallback
    }
}

impl Controls {
    /// Clamp every field into its documented range. Non-finite values fall
    /// back to the default for that field.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            memory: clamp01(finite_or(self.memory, d.memory)),
            coherence: clamp01(finite_or(self.coherence, d.coherence)),
            entropy: clamp01(finite_or(self.entropy, d.entropy)),
            resistance: clamp01(finite_or(self.resistance, d.resistance)),
            stability: clamp01(finite_or(self.stability, d.stability)),
            breath_rate_hz: finite_or(self.breath_rate_hz, d.breath_rate_hz)
                .clamp(BREATH_RATE_MIN_HZ, BREATH_RATE_MAX_HZ),
            breath_depth: clamp01(finite_or(self.breath_depth, d.breath_depth)),
            breath_beats: finite_or(self.breath_beats, d.breath_beats).max(BREATH_BEATS_MIN),
            bpm: finite_or(self.bpm, d.bpm).clamp(BPM_MIN, BPM_MAX),
            tempo_sync: self.tempo_sync,
            wild_ir_bank: self.wild_ir_bank,
            freeze: self.freeze,
            wet: clamp01(finite_or(self.wet, d.wet)),
            dry: clamp01(finite_or(self.dry, d.dry)),
        }
    }

    #[inline]
    pub fn instability(&self) -> f32 {
        1.0 - self.stability
    }

    /// Breathing LFO rate: free-running, or one cycle per `breath_beats`
    /// beats when tempo-synced.
    pub fn breath_hz(&self) -> f32 {
        if self.tempo_sync {
            let beats = self.breath_beats.max(BREATH_BEATS_MIN);
            let beat_hz = self.bpm.max(BPM_MIN) / 60.0;
            beat_hz / beats
        } else {
            self.breath_rate_hz
        }
    }
}
