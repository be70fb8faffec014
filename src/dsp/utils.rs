use std::f32::consts::TAU;

#[inline]
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Final-stage saturator. Output is always within [-1, 1].
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Round `x` to the nearest multiple of `step`.
#[inline]
pub fn quantize(x: f32, step: f32) -> f32 {
    (x / step).round() * step
}

#[inline]
pub fn sine_cycles(cycles: f32) -> f32 {
    (TAU * cycles).sin()
}

/// Advance a normalised phase and wrap it back into [0, 1).
#[inline]
pub fn advance_phase(phase: &mut f32, inc: f32) {
    *phase += inc;
    if *phase > 1.0 {
        *phase -= 1.0;
    }
}

pub fn peak_abs(x: &[f32]) -> f32 {
    x.iter().fold(0.0f32, |m, v| m.max(v.abs()))
}
