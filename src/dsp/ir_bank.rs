//! IR Bank
//!
//! Sixteen precomputed impulse responses, built once per engine lifetime.
//! Entries 0..8 are the "core" half (realistic decays, morse, body), entries
//! 8..16 are the "wild" half: more extreme parameters, then bit-mangled so
//! they always sound rougher than anything in the core half.
//!
//! The bank is read-only after construction. Nothing hands out `&mut` access
//! to an entry; only the engine's three active IRs ever change.

use super::ir_buffer::IrBuffer;
use super::ir_synth::{generate_body_ir, generate_ir, generate_morse_ir};
use super::utils::clamp01;

pub const BANK_SIZE: usize = 16;
pub const HALF_SIZE: usize = 8;

/// Which half of the bank feeds the living update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankHalf {
    Core,
    Wild,
}

impl BankHalf {
    pub fn from_wild(wild: bool) -> Self {
        if wild {
            BankHalf::Wild
        } else {
            BankHalf::Core
        }
    }

    #[inline]
    pub fn start(self) -> usize {
        match self {
            BankHalf::Core => 0,
            BankHalf::Wild => HALF_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Recipe {
    Decay {
        length: usize,
        decay: f32,
        diffusion: f32,
        tone: f32,
    },
    Morse {
        length: usize,
        density: f32,
    },
    Body {
        length: usize,
        pulse_hz: f32,
    },
}

impl Recipe {
    fn render(self) -> Vec<f32> {
        match self {
            Recipe::Decay {
                length,
                decay,
                diffusion,
                tone,
            } => generate_ir(length, decay, diffusion, tone),
            Recipe::Morse { length, density } => generate_morse_ir(length, density),
            Recipe::Body { length, pulse_hz } => generate_body_ir(length, pulse_hz),
        }
    }
}

const fn decay(length: usize, decay: f32, diffusion: f32, tone: f32) -> Recipe {
    Recipe::Decay {
        length,
        decay,
        diffusion,
        tone,
    }
}

const fn morse(length: usize, density: f32) -> Recipe {
    Recipe::Morse { length, density }
}

const fn body(length: usize, pulse_hz: f32) -> Recipe {
    Recipe::Body { length, pulse_hz }
}

const RECIPES: [Recipe; BANK_SIZE] = [
    // Core
    decay(640, 0.30, 0.30, 0.05),
    decay(960, 0.80, 0.60, 0.25),
    decay(1408, 1.60, 0.80, 0.55),
    decay(2048, 2.80, 0.95, 0.88),
    morse(1536, 0.40),
    morse(2048, 0.78),
    body(1664, 1.6),
    body(2304, 3.1),
    // Wild
    decay(384, 0.10, 0.98, 0.98),
    decay(3072, 5.60, 0.25, 0.95),
    morse(4096, 0.96),
    body(4096, 7.2),
    decay(819, 0.23, 0.99, 0.12),
    morse(1200, 0.10),
    body(5120, 0.4),
    decay(4608, 7.80, 1.0, 0.50),
];

#[derive(Clone, Debug)]
pub struct IrBank {
    entries: Box<[Box<[f32]>]>,
}

impl IrBank {
    pub fn build() -> Self {
        let entries: Vec<Box<[f32]>> = RECIPES
            .iter()
            .enumerate()
            .map(|(idx, recipe)| {
                let mut ir = recipe.render();
                if idx >= HALF_SIZE {
                    scramble_wild(&mut ir);
                }
                ir.into_boxed_slice()
            })
            .collect();

        let bank = Self {
            entries: entries.into_boxed_slice(),
        };
        log::debug!(
            "IR bank built: {} entries, longest {} samples",
            bank.len(),
            bank.longest()
        );
        bank
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by absolute index, clamped into the bank.
    #[inline]
    pub fn entry(&self, index: usize) -> &[f32] {
        &self.entries[index.min(self.entries.len() - 1)]
    }

    #[inline]
    pub fn first(&self, half: BankHalf) -> &[f32] {
        self.entry(half.start())
    }

    #[inline]
    pub fn last(&self, half: BankHalf) -> &[f32] {
        self.entry(half.start() + HALF_SIZE - 1)
    }

    pub fn longest(&self) -> usize {
        self.entries.iter().map(|e| e.len()).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.entries.iter().map(|e| &e[..])
    }

    /// Interpolate between the two nearest entries of `half` at a normalised
    /// `position` (0 = first entry, 1 = last entry), writing into `out`.
    pub fn sample_into(&self, half: BankHalf, position: f32, out: &mut IrBuffer) {
        let pos = clamp01(position) * (HALF_SIZE - 1) as f32;
        let i0 = (pos as usize).min(HALF_SIZE - 1);
        let i1 = (i0 + 1).min(HALF_SIZE - 1);
        let frac = pos - i0 as f32;
        let start = half.start();
        out.morph_from(self.entry(start + i0), self.entry(start + i1), frac);
    }
}

/// Wild-half distortion: sign flip every 17th sample, x1.8 every 31st, then
/// a hard tanh drive.
fn scramble_wild(ir: &mut [f32]) {
    for (i, s) in ir.iter_mut().enumerate() {
        if i % 17 == 0 {
            *s = -*s;
        }
        if i % 31 == 0 {
            *s *= 1.8;
        }
        *s = (*s * 2.8).tanh();
    }
}
