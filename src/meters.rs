//! Lock-free engine meters.
//!
//! The engine owns an `Arc<Meters>` and stores into it once per block with
//! relaxed atomics; a UI or host thread holds a clone and reads whenever it
//! likes. Floats are stored as their bit patterns in `AtomicU32`.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
pub struct Meters {
    output_peak_l: AtomicU32,
    output_peak_r: AtomicU32,
    dynamic_stability: AtomicU32,
    stability_cv: AtomicU32,
}

#[inline]
fn store(cell: &AtomicU32, val: f32) {
    cell.store(val.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

impl Meters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_output_peak_l(&self, val: f32) {
        store(&self.output_peak_l, val);
    }

    pub fn set_output_peak_r(&self, val: f32) {
        store(&self.output_peak_r, val);
    }

    /// Stability after the CV blend, at the last sample of the block.
    pub fn set_dynamic_stability(&self, val: f32) {
        store(&self.dynamic_stability, val);
    }

    /// Held CV peak, usually `StabilityCvShaper::meter()`.
    pub fn set_stability_cv(&self, val: f32) {
        store(&self.stability_cv, val);
    }

    pub fn get_output_peak_l(&self) -> f32 {
        load(&self.output_peak_l)
    }

    pub fn get_output_peak_r(&self) -> f32 {
        load(&self.output_peak_r)
    }

    pub fn get_dynamic_stability(&self) -> f32 {
        load(&self.dynamic_stability)
    }

    pub fn get_stability_cv(&self) -> f32 {
        load(&self.stability_cv)
    }

    pub fn reset(&self) {
        self.set_output_peak_l(0.0);
        self.set_output_peak_r(0.0);
        self.set_dynamic_stability(0.0);
        self.set_stability_cv(0.0);
    }
}
