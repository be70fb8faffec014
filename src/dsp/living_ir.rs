//! Living IR Engine
//!
//! Re-derives the three active band IRs (low / mid / high) from the bank on
//! every update tick. Nothing is patched incrementally: each tick morphs fresh
//! base buffers out of the bank and runs them through the full mutation chain.
//!
//! # Tick pipeline (fixed order)
//! 1. Blend indices from the feature tracker + entropy / memory / instability
//! 2. Two morphed base IRs from adjacent bank entries
//! 3. Band derivation: mid = base A <-> base B, low = A <-> first entry,
//!    high = B <-> last entry
//! 4. Elastic time ("breathing") on all bands
//! 5. Modulation (speed wobble, grain swap, hold, bit reduction, drive)
//! 6. Spectral misalignment on mid and high
//! 7. Mode structural edits (acausal reversal, feedback learning, stuck band)
//!
//! Stage 5 and 6 run on the already-stretched length, so the order matters.
//!
//! Everything a tick reads (controls, stability, features, frame counter) is
//! captured in a `TickContext` before the tick starts.
//!
//! ## Audio Thread Safety
//! - Band and scratch buffers pre-allocated to `MAX_IR_LEN` in `new()`
//! - Resampling stages write into scratch and swap, never reallocate

use super::history::HistoryBuffers;
use super::ir_bank::{BankHalf, IrBank};
use super::ir_buffer::{IrBuffer, MAX_IR_LEN};
use super::rng::EngineRng;
use super::utils::{clamp01, soft_clip};
use crate::controls::Controls;
use crate::mode::ModeTraits;
use std::f32::consts::TAU;

/// Shortest IR the elastic stretch may produce.
const MIN_STRETCH_LEN: usize = 128;
/// Longest leading segment the acausal edit may skip.
const MAX_ZERO_INDEX: usize = 256;
const SMEAR_LEN: usize = 96;
const LOW_REVERSE_LEN: usize = 48;

/// Snapshot of everything a single update reads.
#[derive(Clone, Copy, Debug)]
pub struct TickContext {
    pub controls: Controls,
    pub traits: ModeTraits,
    pub mode_skew: f32,
    /// Dynamic (CV-blended) stability for this sample.
    pub stability: f32,
    pub envelope: f32,
    pub brightness: f32,
    pub frame: usize,
    pub sample_rate: f32,
}

impl TickContext {
    #[inline]
    fn instability(&self) -> f32 {
        1.0 - self.stability
    }
}

/// Which band a failure-mode tick left stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StuckBand {
    Low,
    High,
}

pub struct LivingIr {
    low: IrBuffer,
    mid: IrBuffer,
    high: IrBuffer,
    base_a: IrBuffer,
    base_b: IrBuffer,
    scratch: IrBuffer,
    zero_index: usize,
}

impl LivingIr {
    pub fn new() -> Self {
        Self {
            low: IrBuffer::with_capacity(MAX_IR_LEN),
            mid: IrBuffer::with_capacity(MAX_IR_LEN),
            high: IrBuffer::with_capacity(MAX_IR_LEN),
            base_a: IrBuffer::with_capacity(MAX_IR_LEN),
            base_b: IrBuffer::with_capacity(MAX_IR_LEN),
            scratch: IrBuffer::with_capacity(MAX_IR_LEN),
            zero_index: 0,
        }
    }

    /// Safe default: bank entries 0, 1, 2 as low, mid, high.
    pub fn activate_defaults(&mut self, bank: &IrBank) {
        self.low.copy_from(bank.entry(0));
        self.mid.copy_from(bank.entry(1));
        self.high.copy_from(bank.entry(2));
        self.zero_index = 0;
    }

    #[inline]
    pub fn low(&self) -> &[f32] {
        self.low.as_slice()
    }

    #[inline]
    pub fn mid(&self) -> &[f32] {
        self.mid.as_slice()
    }

    #[inline]
    pub fn high(&self) -> &[f32] {
        self.high.as_slice()
    }

    /// Delay offset the convolution subtracts from each tap.
    #[inline]
    pub fn zero_index(&self) -> usize {
        self.zero_index
    }

    /// Run one full living update. Returns the band left stale by a failure
    /// tick, if any.
    pub fn update(
        &mut self,
        bank: &IrBank,
        history: &HistoryBuffers,
        rng: &mut EngineRng,
        ctx: &TickContext,
    ) -> Option<StuckBand> {
        let c = &ctx.controls;
        let instability = ctx.instability();

        let index_a = clamp01(ctx.envelope * 5.0 + c.entropy * 0.35 + instability * 0.2);
        let index_b = clamp01(ctx.brightness * 7.5 + c.memory * 0.25);
        let half = BankHalf::from_wild(c.wild_ir_bank);

        bank.sample_into(half, index_a, &mut self.base_a);
        bank.sample_into(half, index_b, &mut self.base_b);

        let morph =
            0.5 + 0.48 * (ctx.frame as f32 * (0.0007 + ctx.mode_skew * 0.0005)).sin();

        let Self {
            low,
            mid,
            high,
            base_a,
            base_b,
            scratch,
            zero_index,
        } = self;

        mid.morph_from(base_a.as_slice(), base_b.as_slice(), morph);
        low.morph_from(base_a.as_slice(), bank.first(half), 0.4 + 0.5 * c.memory);
        high.morph_from(base_b.as_slice(), bank.last(half), 0.45 + 0.45 * c.entropy);

        for band in [&mut *low, &mut *mid, &mut *high] {
            apply_elastic_time(band, scratch, rng, ctx);
        }
        for band in [&mut *low, &mut *mid, &mut *high] {
            apply_modulation(band, scratch, rng, ctx);
        }
        apply_spectral_misalignment(mid.as_mut_slice(), rng, ctx);
        apply_spectral_misalignment(high.as_mut_slice(), rng, ctx);

        // --- Structural edits ---
        if ctx.traits.acausal || instability > 0.6 {
            *zero_index = (mid.len() / 2).min(MAX_ZERO_INDEX);
            let early = (mid.len() / 5).max(16).min(mid.len());
            mid.as_mut_slice()[..early].reverse();
            let n = low.len().min(LOW_REVERSE_LEN);
            low.as_mut_slice()[..n].reverse();
        } else {
            *zero_index = 0;
        }

        if ctx.traits.learning {
            let learn = 0.00005 + 0.005 * instability;
            for (i, s) in mid.as_mut_slice().iter_mut().enumerate() {
                *s += history.feedback_at(i + 1) * learn;
            }
        }

        if ctx.traits.failure && rng.chance(c.entropy * 0.28) {
            let stuck = if rng.chance(0.5) {
                let n = mid.len().min(low.len());
                low.copy_from(&mid.as_slice()[..n]);
                StuckBand::Low
            } else {
                let n = mid.len().min(high.len());
                high.copy_from(&mid.as_slice()[..n]);
                StuckBand::High
            };
            return Some(stuck);
        }

        None
    }
}

impl Default for LivingIr {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Stages
// =============================================================================

/// Breathing ratio for this tick. 1.0 when the mode does not breathe.
pub fn breathing_ratio(ctx: &TickContext) -> f32 {
    if !ctx.traits.breathing {
        return 1.0;
    }
    let c = &ctx.controls;
    let breath_hz = c.breath_hz().max(0.01);
    let phase = TAU * breath_hz * (ctx.frame as f32 / ctx.sample_rate);
    let lfo = 0.5 + 0.5 * (phase * (0.8 + ctx.instability() * 1.8)).sin();
    (1.0 + (lfo * 2.0 - 1.0) * (0.65 + 0.95 * c.breath_depth)).max(0.35)
}

/// Resample the IR to `max(128, round(len * ratio))` samples, then optionally
/// smear a short random segment into a decaying hold.
fn apply_elastic_time(
    ir: &mut IrBuffer,
    scratch: &mut IrBuffer,
    rng: &mut EngineRng,
    ctx: &TickContext,
) {
    if ir.is_empty() {
        return;
    }

    let ratio = breathing_ratio(ctx);
    let target = ((ir.len() as f32 * ratio).round() as usize).max(MIN_STRETCH_LEN);
    let out_len = scratch.set_len(target);

    let src_ir = ir.as_slice();
    let last = src_ir.len() - 1;
    let divisor = ratio.max(0.001);
    for (i, out) in scratch.as_mut_slice().iter_mut().enumerate() {
        let src = i as f32 / divisor;
        let i0 = (src as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let t = src - i0 as f32;
        *out = src_ir[i0] + (src_ir[i1] - src_ir[i0]) * t;
    }

    if ctx.traits.smear && ctx.frame % 5 == 0 {
        let start = (rng.uniform(0.0, out_len as f32 * 0.70) as usize).min(out_len - 1);
        let len = SMEAR_LEN.min(out_len - start);
        let mut hold = 0.0f32;
        for s in &mut scratch.as_mut_slice()[start..start + len] {
            hold = 0.985 * hold + 0.015 * *s;
            *s = hold;
        }
    }

    std::mem::swap(ir, scratch);
}

/// Micro-pitch wobble, grain-swap jitter, sample-and-hold, bit reduction
/// and drive.
fn apply_modulation(
    ir: &mut IrBuffer,
    scratch: &mut IrBuffer,
    rng: &mut EngineRng,
    ctx: &TickContext,
) {
    if ir.is_empty() {
        return;
    }

    let c = &ctx.controls;
    let instability = ctx.instability();

    // Speed wobble
    let lfo = (ctx.frame as f32 * (0.00028 + 0.0004 * c.entropy)).sin();
    let micro_speed = 1.0 + lfo * (0.08 + 0.23 * instability);
    let n = scratch.set_len(ir.len());
    let src_ir = ir.as_slice();
    for (i, out) in scratch.as_mut_slice().iter_mut().enumerate() {
        let src = i as f32 * micro_speed;
        let i0 = src as usize;
        let i1 = (i0 + 1).min(n - 1);
        let t = src - i0 as f32;
        let a = src_ir.get(i0).copied().unwrap_or(0.0);
        let b = src_ir[i1];
        *out = a + (b - a) * t;
    }
    std::mem::swap(ir, scratch);

    let samples = ir.as_mut_slice();

    // Grain swap
    let grain_step = ((18.0 - c.entropy * 12.0) as usize).max(4);
    let jitter_span = 18.0 + c.entropy * 24.0;
    let mut i = grain_step;
    while i < n {
        let jitter = rng.uniform(0.0, jitter_span) as usize;
        let j = (i + jitter).min(n - 1);
        samples.swap(i, j);
        i += grain_step;
    }

    // Hold, quantize, drive
    let bits = (2.0 + c.coherence * 10.0 + ctx.stability * 4.0) as u32;
    let q = (1u32 << bits.min(24)) as f32;
    let hold = 1 + (c.entropy * 9.0 + instability * 4.0) as usize;
    let drive = 1.1 + 4.0 * c.memory + 3.0 * instability;

    for i in 0..n {
        let phase = i % hold;
        if phase != 0 {
            samples[i] = samples[i - phase];
        }
        let quantized = (samples[i] * q).round() / q;
        samples[i] = soft_clip(quantized * drive);
    }
}

/// Phase-scrambling 2-tap rotation plus random 8-sample polarity flips.
fn apply_spectral_misalignment(ir: &mut [f32], rng: &mut EngineRng, ctx: &TickContext) {
    if ir.len() < 4 {
        return;
    }
    let c = &ctx.controls;
    if !(ctx.traits.misalign || c.coherence < 0.6) {
        return;
    }

    let instability = ctx.instability();
    let rot = 0.03 + 0.9 * (1.0 - c.coherence) + 0.5 * instability;
    let (sin_r, cos_r) = rot.sin_cos();
    for i in 2..ir.len() {
        let a = ir[i];
        let b = ir[i - 1];
        ir[i] = a * cos_r - b * sin_r;
    }

    let flip_p = c.entropy * (0.2 + 0.5 * instability);
    for s in ir.iter_mut().step_by(8) {
        if rng.chance(flip_p) {
            *s = -*s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;

    fn ctx(mode: Mode, controls: Controls, frame: usize) -> TickContext {
        TickContext {
            controls,
            traits: mode.traits(),
            mode_skew: mode.skew(),
            stability: controls.stability,
            envelope: 0.0,
            brightness: 0.0,
            frame,
            sample_rate: 48_000.0,
        }
    }

    fn engine_parts() -> (IrBank, HistoryBuffers, EngineRng, LivingIr) {
        let bank = IrBank::build();
        let mut living = LivingIr::new();
        living.activate_defaults(&bank);
        (bank, HistoryBuffers::new(), EngineRng::new(1), living)
    }

    #[test]
    fn test_defaults_match_bank() {
        let (bank, _, _, living) = engine_parts();
        assert_eq!(living.low(), bank.entry(0));
        assert_eq!(living.mid(), bank.entry(1));
        assert_eq!(living.high(), bank.entry(2));
        assert_eq!(living.zero_index(), 0);
    }

    #[test]
    fn test_non_breathing_mode_keeps_ratio_one() {
        let c = ctx(Mode::DigitalFailure, Controls::default(), 12_345);
        assert_eq!(breathing_ratio(&c), 1.0);
        let c = ctx(Mode::LivingSignal, Controls::default(), 12_345);
        let r = breathing_ratio(&c);
        assert!((0.35..=2.6).contains(&r));
    }

    #[test]
    fn test_update_is_deterministic() {
        let (bank, history, _, mut a) = engine_parts();
        let mut b = LivingIr::new();
        b.activate_defaults(&bank);
        let mut rng_a = EngineRng::new(9);
        let mut rng_b = EngineRng::new(9);
        let mut controls = Controls::default();
        controls.entropy = 0.9;
        controls.coherence = 0.2;
        let c = ctx(Mode::Afterimage, controls, 40);
        a.update(&bank, &history, &mut rng_a, &c);
        b.update(&bank, &history, &mut rng_b, &c);
        assert_eq!(a.low(), b.low());
        assert_eq!(a.mid(), b.mid());
        assert_eq!(a.high(), b.high());
    }

    #[test]
    fn test_bands_stay_bounded_and_sized() {
        let (bank, history, mut rng, mut living) = engine_parts();
        for (k, mode) in Mode::ALL.iter().enumerate() {
            let mut controls = Controls::default();
            controls.stability = 0.1;
            controls.entropy = 1.0;
            controls.wild_ir_bank = k % 2 == 0;
            let c = ctx(*mode, controls, k * 977);
            living.update(&bank, &history, &mut rng, &c);
            for band in [living.low(), living.mid(), living.high()] {
                assert!(!band.is_empty());
                assert!(band.len() <= MAX_IR_LEN);
                // tanh drive, then at most a 2-tap rotation on top
                assert!(band.iter().all(|v| v.is_finite() && v.abs() < 16.0));
            }
        }
    }

    #[test]
    fn test_acausal_sets_zero_index() {
        let (bank, history, mut rng, mut living) = engine_parts();
        let mut controls = Controls::default();
        controls.stability = 0.9;
        living.update(&bank, &history, &mut rng, &ctx(Mode::UncannyCausality, controls, 0));
        assert!(living.zero_index() > 0);
        assert!(living.zero_index() <= MAX_ZERO_INDEX);

        living.update(&bank, &history, &mut rng, &ctx(Mode::AntiSpace, controls, 0));
        assert_eq!(living.zero_index(), 0);

        // High instability turns the acausal edit on in any mode
        controls.stability = 0.2;
        living.update(&bank, &history, &mut rng, &ctx(Mode::AntiSpace, controls, 0));
        assert!(living.zero_index() > 0);
    }

    #[test]
    fn test_failure_mode_sticks_bands() {
        let (bank, history, mut rng, mut living) = engine_parts();
        let mut controls = Controls::default();
        controls.entropy = 1.0;
        let mut stuck = 0;
        for frame in 0..200 {
            let c = ctx(Mode::DigitalFailure, controls, frame * 256);
            if let Some(band) = living.update(&bank, &history, &mut rng, &c) {
                stuck += 1;
                let copy = match band {
                    StuckBand::Low => living.low(),
                    StuckBand::High => living.high(),
                };
                assert_eq!(copy, &living.mid()[..copy.len()]);
            }
        }
        // p = 0.28 per tick
        assert!(stuck > 20 && stuck < 100, "stuck = {stuck}");
    }

    #[test]
    fn test_misalignment_skipped_when_coherent() {
        let mut rng = EngineRng::new(3);
        let mut controls = Controls::default();
        controls.coherence = 0.9;
        let c = ctx(Mode::LivingSignal, controls, 0);
        let mut ir = vec![0.25f32; 64];
        apply_spectral_misalignment(&mut ir, &mut rng, &c);
        assert!(ir.iter().all(|v| *v == 0.25));

        let c = ctx(Mode::SpectralGhost, controls, 0);
        apply_spectral_misalignment(&mut ir, &mut rng, &c);
        assert!(ir.iter().any(|v| *v != 0.25));
    }
}
