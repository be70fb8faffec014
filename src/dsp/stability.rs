//! Stability dynamics.
//!
//! `resolve_stability` blends the stability control with an optional
//! per-sample CV. That single value is the source of `instability` for every
//! other stage in the sample.
//!
//! `StabilityCvShaper` turns a stereo side-chain into that CV. It runs on the
//! host side of the engine, writes into a caller-owned buffer and keeps a
//! held peak meter for display.

use super::utils::clamp01;
use serde::{Deserialize, Serialize};

/// `clamp01(stability + amount * cv[index])`. A missing CV, an index past the
/// end of the slice, or a non-finite CV sample all read as 0.
#[inline]
pub fn resolve_stability(stability: f32, cv: Option<&[f32]>, index: usize, amount: f32) -> f32 {
    let sample = cv
        .and_then(|cv| cv.get(index).copied())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);
    let amount = if amount.is_finite() { amount } else { 0.0 };
    clamp01(stability + amount * sample)
}

// =============================================================================
// CV shaper
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CvSmoothing {
    /// Pass the clamped side-chain through unchanged.
    #[default]
    Raw,
    /// Asymmetric envelope of `|cv|`, stepped.
    Envelope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CvFilterTime {
    #[default]
    Fast,
    Medium,
    Slow,
}

impl CvFilterTime {
    pub fn seconds(self) -> f32 {
        match self {
            CvFilterTime::Fast => 0.020,
            CvFilterTime::Medium => 0.120,
            CvFilterTime::Slow => 0.600,
        }
    }

    /// Sample-and-hold period of the envelope output.
    pub fn step_period(self) -> usize {
        match self {
            CvFilterTime::Fast => 12,
            CvFilterTime::Medium => 48,
            CvFilterTime::Slow => 160,
        }
    }
}

const METER_HOLD: f32 = 0.92;
const METER_IDLE_DECAY: f32 = 0.90;

pub struct StabilityCvShaper {
    sample_rate: f32,
    smoothing: CvSmoothing,
    filter_time: CvFilterTime,
    attack_alpha: f32,
    release_alpha: f32,
    envelope: f32,
    held: f32,
    step_counter: usize,
    meter: f32,
}

impl StabilityCvShaper {
    pub fn new(sample_rate: f32) -> Self {
        let mut shaper = Self {
            sample_rate: 1.0,
            smoothing: CvSmoothing::Raw,
            filter_time: CvFilterTime::Fast,
            attack_alpha: 1.0,
            release_alpha: 1.0,
            envelope: 0.0,
            held: 0.0,
            step_counter: 0,
            meter: 0.0,
        };
        shaper.set_sample_rate(sample_rate);
        shaper
    }

    pub fn set_smoothing(&mut self, smoothing: CvSmoothing) {
        self.smoothing = smoothing;
    }

    pub fn set_filter_time(&mut self, filter_time: CvFilterTime) {
        if self.filter_time != filter_time {
            self.filter_time = filter_time;
            self.update_coefficients();
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        let tau = self.filter_time.seconds();
        let attack_tau = (tau * 0.30).max(0.001);
        let release_tau = (tau * 2.40).max(0.005);
        self.attack_alpha = 1.0 - (-1.0 / (attack_tau * self.sample_rate)).exp();
        self.release_alpha = 1.0 - (-1.0 / (release_tau * self.sample_rate)).exp();
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.held = 0.0;
        self.step_counter = 0;
        self.meter = 0.0;
    }

    /// Shape `min(left, right, out)` samples of side-chain into `out` and
    /// update the held meter. Returns the block peak.
    pub fn process(&mut self, left: &[f32], right: &[f32], out: &mut [f32]) -> f32 {
        let mut peak = 0.0f32;
        for ((l, r), o) in left.iter().zip(right).zip(out.iter_mut()) {
            let raw = (0.5 * (l + r)).clamp(-1.0, 1.0);
            let raw = if raw.is_finite() { raw } else { 0.0 };
            let shaped = match self.smoothing {
                CvSmoothing::Raw => raw,
                CvSmoothing::Envelope => {
                    let target = raw.abs();
                    let alpha = if target > self.envelope {
                        self.attack_alpha
                    } else {
                        self.release_alpha
                    };
                    self.envelope += alpha * (target - self.envelope);
                    if self.step_counter % self.filter_time.step_period() == 0 {
                        self.held = self.envelope;
                    }
                    self.step_counter = self.step_counter.wrapping_add(1);
                    self.held
                }
            };
            *o = shaped;
            peak = peak.max(shaped.abs());
        }
        self.meter = (self.meter * METER_HOLD).max(peak);
        peak
    }

    /// Call once per block while the CV input is switched off.
    pub fn idle(&mut self) {
        self.meter *= METER_IDLE_DECAY;
    }

    #[inline]
    pub fn meter(&self) -> f32 {
        self.meter
    }
}
