//! Feature Tracker
//!
//! Two single-pole running estimators updated once per sample from the mono
//! (post lo-fi) input:
//! - **envelope**: smoothed `|m|`
//! - **brightness**: smoothed `|m - m_prev|`, a cheap spectral-change proxy
//!
//! Values are unbounded positive drivers. Consumers clamp at the point of
//! use.

const ENVELOPE_DECAY: f32 = 0.993;
const ENVELOPE_WEIGHT: f32 = 0.007;
const BRIGHTNESS_DECAY: f32 = 0.986;
const BRIGHTNESS_WEIGHT: f32 = 0.014;

#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureTracker {
    envelope: f32,
    brightness: f32,
    previous: f32,
}

impl FeatureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn update(&mut self, mono: f32) {
        self.envelope = self.envelope * ENVELOPE_DECAY + mono.abs() * ENVELOPE_WEIGHT;
        let hf = (mono - self.previous).abs();
        self.brightness = self.brightness * BRIGHTNESS_DECAY + hf * BRIGHTNESS_WEIGHT;
        self.previous = mono;
    }

    #[inline]
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    #[inline]
    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
