//! Procedural IR Synthesizer
//!
//! Pure generators for the raw impulse responses that populate the IR bank.
//! Each generator depends only on its arguments: noise sources are seeded
//! from the parameters themselves, so building the bank twice yields
//! bit-identical buffers regardless of what the engine has done since.
//!
//! All generators synthesize at a fixed 48 kHz reference rate. Bank content
//! does not follow the host sample rate.
//!
//! Every generator adds a direct-path spike at sample 0 so the IR always
//! carries zero-delay energy.

use super::rng::synth_rng;
use super::utils::sine_cycles;
use rand::Rng;

/// Reference rate the bank is synthesized at.
pub const SYNTH_RATE: f32 = 48_000.0;

// =============================================================================
// Generators
// =============================================================================

/// Exponentially decaying, low-passed noise with a sinusoidal shimmer.
///
/// * `decay_seconds` - envelope time constant (floored at 20 ms)
/// * `diffusion` - noise excitation level
/// * `tone` - low-pass brightness and shimmer frequency (120 Hz .. 1320 Hz)
pub fn generate_ir(length: usize, decay_seconds: f32, diffusion: f32, tone: f32) -> Vec<f32> {
    let mut ir = vec![0.0f32; length];
    let mut rng = synth_rng(ir_seed(length, decay_seconds, diffusion, tone));

    let decay = decay_seconds.max(0.02);
    let alpha = 0.02 + 0.35 * tone;
    let shimmer_hz = 120.0 + 1200.0 * tone;
    let mut lp_state = 0.0f32;

    for (i, s) in ir.iter_mut().enumerate() {
        let t = i as f32 / SYNTH_RATE;
        let env = (-t / decay).exp();
        let excitation = rng.gen_range(-1.0f32..1.0) * (0.25 + 0.75 * diffusion);
        lp_state += alpha * (excitation - lp_state);
        let shimmer = sine_cycles(shimmer_hz * t) * 0.07;
        *s = env * (lp_state + shimmer);
    }

    if let Some(first) = ir.first_mut() {
        *first += 1.0;
    }
    ir
}

/// Gated tonal bursts ("code-like" discrete reflections).
///
/// Higher `density` shortens the gate step (64 .. 12 samples) and raises the
/// burst pitch. The gate is open two steps out of every five.
pub fn generate_morse_ir(length: usize, density: f32) -> Vec<f32> {
    let mut ir = vec![0.0f32; length];
    let step = ((64.0 - density * 52.0) as i64).max(6) as usize;
    let tone_hz = 330.0 + 90.0 * density;
    let len_f = length.max(1) as f32;

    for (i, s) in ir.iter_mut().enumerate() {
        let env = (-(i as f32) / len_f * 4.0).exp();
        let gate = (i / step) % 5 < 2;
        let tone = sine_cycles(tone_hz * i as f32 / SYNTH_RATE);
        *s = if gate { 0.65 } else { -0.18 } * env * tone;
    }

    if let Some(first) = ir.first_mut() {
        *first += 0.9;
    }
    ir
}

/// Rectified "breath" sinusoid plus periodic clicks.
pub fn generate_body_ir(length: usize, pulse_hz: f32) -> Vec<f32> {
    let mut ir = vec![0.0f32; length];

    for (i, s) in ir.iter_mut().enumerate() {
        let t = i as f32 / SYNTH_RATE;
        let breath = sine_cycles(pulse_hz * t).max(0.0);
        let click = if i % 347 < 4 { 0.6 } else { 0.0 };
        let env = (-t * 2.2).exp();
        *s = env * (0.45 * breath + click);
    }

    if let Some(first) = ir.first_mut() {
        *first += 0.55;
    }
    ir
}

// =============================================================================
// Morphing
// =============================================================================

/// Per-sample linear blend of two IRs of possibly different lengths.
/// Missing samples count as silence; the result has the longer length.
pub fn morph_ir(a: &[f32], b: &[f32], t: f32) -> Vec<f32> {
    let mut out = vec![0.0f32; a.len().max(b.len())];
    morph_slice(&mut out, a, b, t);
    out
}

/// Fill `out` with the morph of `a` and `b`. `out.len()` decides how many
/// samples are produced.
#[inline]
pub(crate) fn morph_slice(out: &mut [f32], a: &[f32], b: &[f32], t: f32) {
    for (i, o) in out.iter_mut().enumerate() {
        let av = a.get(i).copied().unwrap_or(0.0);
        let bv = b.get(i).copied().unwrap_or(0.0);
        *o = av + (bv - av) * t;
    }
}

fn ir_seed(length: usize, decay_seconds: f32, diffusion: f32, tone: f32) -> u64 {
    let base = (length as u64)
        .wrapping_mul(1337)
        .wrapping_add((decay_seconds * 100.0).max(0.0) as u64);
    base ^ (u64::from(diffusion.to_bits()) << 32) ^ u64::from(tone.to_bits())
}
