//! Lo-Fi Transport Stage
//!
//! Sample-rate reduction, wow and wet zippering. Every counter and phase here
//! persists across blocks, so the hold grid never restarts at a block edge.
//!
//! Per sample:
//! 1. `begin_sample` advances the hold counter, re-samples the input once per
//!    hold period (never while frozen) and applies the wow wobble.
//! 2. The caller convolves only when the returned frame says `refresh`, then
//!    stores the result with `store_wet`; otherwise it reads `held_wet`.
//! 3. `finish_wet` applies the zipper gate and the step quantizer.

use super::utils::{advance_phase, clamp01, quantize, sine_cycles};

const HOLD_SPAN: f32 = 12.0;
const FAILURE_HOLD_SPAN: f32 = 22.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoFiFrame {
    /// `clamp01(0.35 + 0.45 * entropy + 0.35 * instability)`
    pub depth: f32,
    /// True when this sample opened a new hold frame (and not frozen).
    pub refresh: bool,
    /// Held input with wow applied.
    pub mono: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct LoFiTransport {
    hold_counter: usize,
    hold_period: usize,
    held_input: f32,
    held_wet: f32,
    wow_phase: f32,
    zipper_counter: usize,
}

impl Default for LoFiTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoFiTransport {
    pub fn new() -> Self {
        Self {
            hold_counter: 0,
            hold_period: 1,
            held_input: 0.0,
            held_wet: 0.0,
            wow_phase: 0.0,
            zipper_counter: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn depth(entropy: f32, instability: f32) -> f32 {
        clamp01(0.35 + 0.45 * entropy + 0.35 * instability)
    }

    #[inline]
    pub fn hold_period(&self) -> usize {
        self.hold_period
    }

    #[inline]
    pub fn held_wet(&self) -> f32 {
        self.held_wet
    }

    #[inline]
    pub fn store_wet(&mut self, wet: f32) {
        self.held_wet = wet;
    }

    pub fn begin_sample(
        &mut self,
        input: f32,
        entropy: f32,
        instability: f32,
        failure: bool,
        freeze: bool,
    ) -> LoFiFrame {
        let depth = Self::depth(entropy, instability);
        let span = if failure { FAILURE_HOLD_SPAN } else { HOLD_SPAN };
        self.hold_period = 1 + (depth * span) as usize;

        let opened = self.hold_counter % self.hold_period == 0;
        self.hold_counter = self.hold_counter.wrapping_add(1);
        let refresh = opened && !freeze;
        if refresh {
            self.held_input = input;
        }

        advance_phase(&mut self.wow_phase, 0.00011 + 0.0018 * depth);
        let wow = sine_cycles(self.wow_phase);
        let mono = self.held_input * (1.0 + wow * (0.02 + 0.06 * depth));

        LoFiFrame {
            depth,
            refresh,
            mono,
        }
    }

    /// Zipper gate, then quantize to `1 / (6 + 10 * coherence + 8 * stability)`.
    pub fn finish_wet(&mut self, wet: f32, depth: f32, coherence: f32, stability: f32) -> f32 {
        let zipper = 2 + (depth * 6.0).round() as usize;
        let pass = self.zipper_counter % zipper == 0;
        self.zipper_counter = self.zipper_counter.wrapping_add(1);

        let wet = if pass { wet } else { self.held_wet };
        let step = 1.0 / (6.0 + coherence * 10.0 + stability * 8.0);
        quantize(wet, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_period_range() {
        let mut lofi = LoFiTransport::new();
        lofi.begin_sample(0.0, 0.0, 0.0, false, false);
        assert_eq!(lofi.hold_period(), 1 + (0.35f32 * 12.0) as usize);
        lofi.begin_sample(0.0, 1.0, 1.0, false, false);
        assert_eq!(lofi.hold_period(), 13);
        lofi.begin_sample(0.0, 1.0, 1.0, true, false);
        assert_eq!(lofi.hold_period(), 23);
    }

    #[test]
    fn test_input_held_between_refreshes() {
        let mut lofi = LoFiTransport::new();
        let mut refreshes = 0;
        for i in 0..130 {
            let frame = lofi.begin_sample(i as f32, 1.0, 1.0, false, false);
            if frame.refresh {
                refreshes += 1;
            }
        }
        // Period 13 over 130 samples
        assert_eq!(refreshes, 10);
    }

    #[test]
    fn test_freeze_blocks_refresh() {
        let mut lofi = LoFiTransport::new();
        let first = lofi.begin_sample(0.5, 0.0, 0.0, false, false);
        assert!(first.refresh);
        for _ in 0..100 {
            let frame = lofi.begin_sample(-0.9, 0.0, 0.0, false, true);
            assert!(!frame.refresh);
            // wow stays within a few percent of the held value
            assert!((frame.mono - 0.5).abs() < 0.5 * 0.1);
        }
    }

    #[test]
    fn test_zipper_gate_and_quantize() {
        let mut lofi = LoFiTransport::new();
        lofi.store_wet(0.0);
        // depth 1 -> zipper period 8
        let first = lofi.finish_wet(0.9, 1.0, 1.0, 1.0);
        assert!((first - quantize(0.9, 1.0 / 24.0)).abs() < 1e-6);
        for _ in 1..8 {
            assert_eq!(lofi.finish_wet(0.9, 1.0, 1.0, 1.0), 0.0);
        }
        assert!(lofi.finish_wet(0.9, 1.0, 1.0, 1.0) > 0.8);
    }
}
