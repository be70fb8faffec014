//! Input / feedback history rings.
//!
//! Two fixed-size rings sharing one write cursor. The cursor always points at
//! the slot written by the current sample; reading at delay `d` returns the
//! sample written `d` steps ago (`d = 0` is the current slot).
//!
//! Capacity is twice the largest IR length the convolution could address, so
//! wraparound can never alias a live tap.

/// Conservative bound on addressable IR taps.
pub const MAX_HISTORY_TAPS: usize = 6144;
pub const HISTORY_LEN: usize = MAX_HISTORY_TAPS * 2;

/// Per-sample decay applied to the current input slot while frozen.
pub const FREEZE_DECAY: f32 = 0.998;

pub struct HistoryBuffers {
    input: Box<[f32]>,
    feedback: Box<[f32]>,
    write: usize,
}

impl HistoryBuffers {
    pub fn new() -> Self {
        Self {
            input: vec![0.0; HISTORY_LEN].into_boxed_slice(),
            feedback: vec![0.0; HISTORY_LEN].into_boxed_slice(),
            write: 0,
        }
    }

    pub fn clear(&mut self) {
        self.input.fill(0.0);
        self.feedback.fill(0.0);
        self.write = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.input.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    #[inline]
    pub fn write_index(&self) -> usize {
        self.write
    }

    #[inline]
    fn slot(&self, delay: usize) -> usize {
        let n = self.input.len();
        (self.write + n - delay % n) % n
    }

    #[inline]
    pub fn input_at(&self, delay: usize) -> f32 {
        self.input[self.slot(delay)]
    }

    #[inline]
    pub fn feedback_at(&self, delay: usize) -> f32 {
        self.feedback[self.slot(delay)]
    }

    #[inline]
    pub fn write_input(&mut self, x: f32) {
        self.input[self.write] = x;
    }

    /// Freeze path: the current slot decays instead of being overwritten.
    #[inline]
    pub fn decay_input(&mut self) {
        self.input[self.write] *= FREEZE_DECAY;
    }

    #[inline]
    pub fn write_feedback(&mut self, x: f32) {
        self.feedback[self.write] = x;
    }

    #[inline]
    pub fn advance(&mut self) {
        self.write = (self.write + 1) % self.input.len();
    }

    pub fn input_energy(&self) -> f32 {
        self.input.iter().map(|v| v * v).sum()
    }
}

impl Default for HistoryBuffers {
    fn default() -> Self {
        Self::new()
    }
}
