//! Multi-band Convolution Engine
//!
//! Splits the lo-fi mono signal into three bands with two cascaded one-pole
//! filters and convolves each band against its own living IR.
//!
//! The kernel is strided and truncated on purpose: the tap count is capped
//! by stability and the stride grows with instability and entropy, so the
//! per-sample cost stays bounded no matter how long the IR has grown.
//!
//! # Per-tap readout
//! - input history at `max(0, k - zero)`
//! - plus feedback history at `k + 1`, scaled by `feedback_amount`, when the
//!   mode learns or instability exceeds 0.7
//! - in failure mode every 5th tap may be dropped (p = 0.35 * entropy)

use super::history::HistoryBuffers;
use super::rng::EngineRng;
use super::utils::{clamp01, sine_cycles, soft_clip};
use crate::controls::Controls;
use crate::mode::ModeTraits;

// =============================================================================
// Band split
// =============================================================================

const LOW_SPLIT_COEFF: f32 = 0.08;
const HIGH_SPLIT_COEFF: f32 = 0.04;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bands {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

/// Two cascaded one-pole filters. `low + mid + high` reconstructs the input.
#[derive(Clone, Copy, Debug, Default)]
pub struct BandSplitter {
    lp_state: f32,
    hp_state: f32,
}

impl BandSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn split(&mut self, x: f32) -> Bands {
        self.lp_state += LOW_SPLIT_COEFF * (x - self.lp_state);
        let low = self.lp_state;
        let hp_in = x - low;
        self.hp_state += HIGH_SPLIT_COEFF * (hp_in - self.hp_state);
        let high = hp_in - self.hp_state;
        Bands {
            low,
            mid: x - low - high,
            high,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// Kernel parameters
// =============================================================================

const DIRECT_LEAK: f32 = 0.10;
const FAILURE_TAP_BASE: usize = 64;
const NORMAL_TAP_BASE: usize = 112;
const STABLE_EXTRA_TAPS: f32 = 192.0;

/// Per-sample kernel settings shared by all three bands.
#[derive(Clone, Copy, Debug)]
pub struct ConvolveParams {
    pub tap_cap: usize,
    pub stride: usize,
    /// 0.0 disables the feedback readout.
    pub feedback_amount: f32,
    /// Probability of dropping a stride-5 tap. 0.0 outside failure mode.
    pub drop_chance: f32,
    /// Learning-mode resonance added after the soft clip.
    pub resonance: f32,
}

impl ConvolveParams {
    /// Derive the kernel for one sample. `learned_bias` is the value from
    /// before this sample's residue update.
    pub fn new(
        controls: &Controls,
        traits: &ModeTraits,
        stability: f32,
        learned_bias: f32,
        envelope: f32,
        frame: usize,
        sample_rate: f32,
    ) -> Self {
        let instability = 1.0 - stability;

        let base = if traits.failure {
            FAILURE_TAP_BASE
        } else {
            NORMAL_TAP_BASE
        };
        let tap_cap = base + (stability * STABLE_EXTRA_TAPS) as usize;
        let stride = 2 + (instability * 5.0 + controls.entropy * 3.0) as usize;

        let feedback_amount = if traits.learning || instability > 0.7 {
            (0.01 + 0.25 * controls.memory + 0.12 * instability)
                * (1.0 - 0.72 * controls.resistance)
        } else {
            0.0
        };

        let drop_chance = if traits.failure {
            controls.entropy * 0.35
        } else {
            0.0
        };

        let resonance = if traits.learning {
            let freq = 50.0 + 2100.0 * clamp01(learned_bias + controls.entropy * 0.5);
            sine_cycles(freq * frame as f32 / sample_rate)
                * envelope
                * (0.03 + 0.22 * instability)
        } else {
            0.0
        };

        Self {
            tap_cap,
            stride,
            feedback_amount,
            drop_chance,
            resonance,
        }
    }
}

/// Convolve one band sample against `ir`. Returns silence for an empty IR.
pub fn convolve_sample(
    input: f32,
    ir: &[f32],
    zero_index: usize,
    history: &HistoryBuffers,
    rng: &mut EngineRng,
    params: &ConvolveParams,
) -> f32 {
    let ir_size = ir.len().min(history.len().saturating_sub(1));
    if ir_size == 0 {
        return 0.0;
    }

    let tap_cap = params.tap_cap.min(ir_size);
    let mut wet = 0.0f32;

    for k in (0..tap_cap).step_by(params.stride.max(2)) {
        let mut x = history.input_at(k.saturating_sub(zero_index));
        if params.feedback_amount != 0.0 {
            x += history.feedback_at(k + 1) * params.feedback_amount;
        }

        if params.drop_chance > 0.0 && k % 5 == 0 && rng.chance(params.drop_chance) {
            continue;
        }

        wet += x * ir[k];
    }

    wet += input * DIRECT_LEAK;
    soft_clip(wet) + params.resonance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;

    fn params(mode: Mode, controls: &Controls, stability: f32) -> ConvolveParams {
        ConvolveParams::new(controls, &mode.traits(), stability, 0.0, 0.0, 0, 48_000.0)
    }

    #[test]
    fn test_band_split_reconstructs() {
        let mut split = BandSplitter::new();
        for i in 0..256 {
            let x = ((i * 37) % 19) as f32 / 19.0 - 0.5;
            let b = split.split(x);
            assert!((b.low + b.mid + b.high - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_band_split_dc_goes_low() {
        let mut split = BandSplitter::new();
        let mut b = Bands::default();
        for _ in 0..2000 {
            b = split.split(1.0);
        }
        assert!((b.low - 1.0).abs() < 1e-3);
        assert!(b.high.abs() < 1e-3);
    }

    #[test]
    fn test_kernel_shape() {
        let c = Controls {
            entropy: 1.0,
            ..Controls::default()
        };
        let p = params(Mode::LivingSignal, &c, 1.0);
        assert_eq!(p.tap_cap, 112 + 192);
        assert_eq!(p.stride, 5);
        assert_eq!(p.feedback_amount, 0.0);

        let p = params(Mode::DigitalFailure, &c, 0.0);
        assert_eq!(p.tap_cap, 64);
        assert_eq!(p.stride, 10);
        assert!(p.feedback_amount > 0.0);
        assert!((p.drop_chance - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_empty_ir_is_silent() {
        let history = HistoryBuffers::new();
        let mut rng = EngineRng::new(1);
        let p = params(Mode::LivingSignal, &Controls::default(), 0.5);
        assert_eq!(convolve_sample(0.8, &[], 0, &history, &mut rng, &p), 0.0);
    }

    #[test]
    fn test_direct_leak_and_taps() {
        let mut history = HistoryBuffers::new();
        history.write_input(0.5);
        let mut rng = EngineRng::new(1);
        let p = ConvolveParams {
            tap_cap: 8,
            stride: 2,
            feedback_amount: 0.0,
            drop_chance: 0.0,
            resonance: 0.0,
        };
        let ir = [1.0, 0.0, 0.0, 0.0];
        let wet = convolve_sample(0.2, &ir, 0, &history, &mut rng, &p);
        assert!((wet - (0.5f32 + 0.02).tanh()).abs() < 1e-6);

        // A zero offset larger than the tap clamps the delay to 0
        let ir = [0.0, 0.0, 1.0, 0.0];
        let wet = convolve_sample(0.0, &ir, 4, &history, &mut rng, &p);
        assert!((wet - 0.5f32.tanh()).abs() < 1e-6);
    }
}
