//! Reverb modes and their capability table.
//!
//! Each mode turns on a fixed set of behaviours spread across the living IR
//! update, the convolution, the wet shaping and the stereo post stage.
//! Instead of re-testing the mode at every call site, the engine looks up a
//! `ModeTraits` record once when the mode changes and consults its flags.

use serde::{Deserialize, Serialize};

pub const MODE_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    #[default]
    #[serde(rename = "Living Signal")]
    LivingSignal,
    #[serde(rename = "Uncanny Causality")]
    UncannyCausality,
    #[serde(rename = "Spectral Ghost")]
    SpectralGhost,
    #[serde(rename = "Rainforest Memory")]
    RainforestMemory,
    #[serde(rename = "Process Imprint")]
    ProcessImprint,
    #[serde(rename = "Digital Failure")]
    DigitalFailure,
    #[serde(rename = "Anti-Space")]
    AntiSpace,
    #[serde(rename = "Afterimage")]
    Afterimage,
    #[serde(rename = "Habit Room")]
    HabitRoom,
}

impl Mode {
    pub const ALL: [Mode; MODE_COUNT] = [
        Mode::LivingSignal,
        Mode::UncannyCausality,
        Mode::SpectralGhost,
        Mode::RainforestMemory,
        Mode::ProcessImprint,
        Mode::DigitalFailure,
        Mode::AntiSpace,
        Mode::Afterimage,
        Mode::HabitRoom,
    ];

    pub const fn count() -> usize {
        MODE_COUNT
    }

    /// Total: out-of-range indices clamp to the nearest end.
    pub fn from_index(index: i32) -> Mode {
        let clamped = index.clamp(0, MODE_COUNT as i32 - 1) as usize;
        Self::ALL[clamped]
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::LivingSignal => "Living Signal",
            Mode::UncannyCausality => "Uncanny Causality",
            Mode::SpectralGhost => "Spectral Ghost",
            Mode::RainforestMemory => "Rainforest Memory",
            Mode::ProcessImprint => "Process Imprint",
            Mode::DigitalFailure => "Digital Failure",
            Mode::AntiSpace => "Anti-Space",
            Mode::Afterimage => "Afterimage",
            Mode::HabitRoom => "Habit Room",
        }
    }

    /// Position of the mode in [0, 1]; skews the mid-band morph rate.
    #[inline]
    pub fn skew(self) -> f32 {
        self.index() as f32 / (MODE_COUNT - 1) as f32
    }

    #[inline]
    pub fn traits(self) -> ModeTraits {
        MODE_TRAITS[self.index()]
    }
}

/// Per-mode capability flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ModeTraits {
    /// Elastic time-stretch ("breathing") of the active IRs.
    pub breathing: bool,
    /// Every 5th living update freezes a short IR segment into a decaying hold.
    pub smear: bool,
    /// Spectral misalignment regardless of coherence.
    pub misalign: bool,
    /// Reverse leading IR segments and skip true zero delay.
    pub acausal: bool,
    /// Learn from the wet history: IR injection, feedback taps, resonance.
    pub learning: bool,
    /// Learned-bias residue tone added to the wet signal.
    pub residue: bool,
    /// Autonomous drone regardless of instability.
    pub drone: bool,
    /// Low/high IRs trade places on a slow square wave.
    pub band_swap: bool,
    /// Deliberately unreliable processing: slow stale updates, sparse taps,
    /// stuck bands, long lo-fi holds, polarity flips.
    pub failure: bool,
    /// Stereo collapse and block-start cross-feed.
    pub anti_space: bool,
}

const NONE: ModeTraits = ModeTraits {
    breathing: false,
    smear: false,
    misalign: false,
    acausal: false,
    learning: false,
    residue: false,
    drone: false,
    band_swap: false,
    failure: false,
    anti_space: false,
};

const MODE_TRAITS: [ModeTraits; MODE_COUNT] = [
    // Living Signal
    ModeTraits {
        breathing: true,
        ..NONE
    },
    // Uncanny Causality
    ModeTraits {
        breathing: true,
        acausal: true,
        ..NONE
    },
    // Spectral Ghost
    ModeTraits {
        smear: true,
        misalign: true,
        band_swap: true,
        ..NONE
    },
    // Rainforest Memory
    ModeTraits {
        learning: true,
        ..NONE
    },
    // Process Imprint
    ModeTraits {
        misalign: true,
        band_swap: true,
        ..NONE
    },
    // Digital Failure
    ModeTraits {
        failure: true,
        ..NONE
    },
    // Anti-Space
    ModeTraits {
        anti_space: true,
        ..NONE
    },
    // Afterimage
    ModeTraits {
        breathing: true,
        smear: true,
        misalign: true,
        residue: true,
        ..NONE
    },
    // Habit Room
    ModeTraits {
        breathing: true,
        learning: true,
        residue: true,
        drone: true,
        ..NONE
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_index_clamps() {
        assert_eq!(Mode::from_index(0), Mode::LivingSignal);
        assert_eq!(Mode::from_index(8), Mode::HabitRoom);
        assert_eq!(Mode::from_index(-1), Mode::LivingSignal);
        assert_eq!(Mode::from_index(9), Mode::HabitRoom);
        assert_eq!(Mode::from_index(i32::MIN), Mode::LivingSignal);
        assert_eq!(Mode::from_index(i32::MAX), Mode::HabitRoom);
    }

    #[test]
    fn test_from_index_monotonic() {
        for i in 0..MODE_COUNT as i32 {
            assert_eq!(Mode::from_index(i).index(), i as usize);
        }
        assert_eq!(Mode::count(), 9);
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<&str> = Mode::ALL.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MODE_COUNT);
        assert_eq!(Mode::AntiSpace.name(), "Anti-Space");
    }

    #[test]
    fn test_trait_table() {
        assert!(Mode::HabitRoom.traits().drone);
        assert!(Mode::DigitalFailure.traits().failure);
        assert!(!Mode::DigitalFailure.traits().breathing);
        assert!(Mode::SpectralGhost.traits().smear && Mode::Afterimage.traits().smear);
        let learning: Vec<Mode> = Mode::ALL
            .iter()
            .copied()
            .filter(|m| m.traits().learning)
            .collect();
        assert_eq!(learning, vec![Mode::RainforestMemory, Mode::HabitRoom]);
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&Mode::DigitalFailure).unwrap();
        assert_eq!(json, "\"Digital Failure\"");
        let back: Mode = serde_json::from_str("\"Habit Room\"").unwrap();
        assert_eq!(back, Mode::HabitRoom);
    }
}
