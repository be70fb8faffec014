//! Deterministic random source.
//!
//! Every stochastic step of the engine (grain jitter, polarity flips, smear
//! placement, dropped taps, stuck updates) draws from one `EngineRng` owned
//! by the engine instance. ChaCha8 is used rather than `SmallRng` because its
//! output stream is fixed across platforms and `rand` releases, which is what
//! makes renders bit-reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed used when the caller does not supply one.
pub const ENGINE_SEED: u64 = 0x00C0_FFEE;

#[derive(Clone, Debug)]
pub struct EngineRng {
    seed: u64,
    rng: ChaCha8Rng,
}

impl EngineRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Rewind the stream to its construction seed.
    pub fn reseed(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform in [lo, hi). Never panics on an empty or inverted range.
    #[inline]
    pub fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.rng.gen::<f32>()
    }

    /// True with probability `p` (p <= 0 never, p >= 1 always).
    #[inline]
    pub fn chance(&mut self, p: f32) -> bool {
        self.rng.gen::<f32>() < p
    }
}

/// Standalone generator for the pure IR synthesizers.
pub fn synth_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}
