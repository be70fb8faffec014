//! Fixed-capacity impulse-response storage.
//!
//! The living IR update rebuilds three band IRs many times per second. All
//! of that work happens inside `IrBuffer`s that are allocated once, at
//! engine construction, with room for the longest IR any update can produce.
//! Lengths change freely; capacity never does.
//!
//! ## Audio Thread Safety
//! - Storage allocated in `with_capacity()`
//! - `std::mem::swap` of two buffers exchanges boxes, no copy or allocation

use super::ir_synth::morph_slice;

/// Upper bound on any active IR length.
///
/// Longest bank entry is 5120 samples and the elastic stretch tops out at
/// a 2.6x ratio (13312), so 16k covers every reachable length.
pub const MAX_IR_LEN: usize = 16_384;

#[derive(Clone, Debug)]
pub struct IrBuffer {
    data: Box<[f32]>,
    len: usize,
}

impl IrBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "IR buffer capacity must be > 0");
        Self {
            data: vec![0.0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data[..self.len]
    }

    /// Resize within capacity and return the usable length.
    /// Newly exposed samples hold stale data; callers overwrite them.
    #[inline]
    pub fn set_len(&mut self, len: usize) -> usize {
        self.len = len.min(self.capacity());
        self.len
    }

    /// Replace contents with `src` (truncated to capacity).
    pub fn copy_from(&mut self, src: &[f32]) {
        let n = self.set_len(src.len());
        self.data[..n].copy_from_slice(&src[..n]);
    }

    /// Non-allocating `morph_ir`: `a + (b - a) * t`, sized to the longer input.
    pub fn morph_from(&mut self, a: &[f32], b: &[f32], t: f32) {
        let n = self.set_len(a.len().max(b.len()));
        morph_slice(&mut self.data[..n], a, b, t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_truncates_to_capacity() {
        let mut buf = IrBuffer::with_capacity(4);
        buf.copy_from(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buf.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_morph_pads_shorter_input() {
        let mut buf = IrBuffer::with_capacity(8);
        buf.morph_from(&[1.0, 1.0], &[0.0, 0.0, 2.0], 0.5);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_slice(), &[0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_swap_keeps_capacity() {
        let mut a = IrBuffer::with_capacity(16);
        let mut b = IrBuffer::with_capacity(16);
        a.copy_from(&[1.0; 10]);
        b.copy_from(&[2.0; 3]);
        std::mem::swap(&mut a, &mut b);
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 10);
        assert_eq!(a.capacity(), 16);
    }
}
