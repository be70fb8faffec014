//! weirdverb: a procedural convolution reverb whose impulse responses are
//! synthesized at startup and then keep mutating while audio runs.
//!
//! The engine is a plain real-time DSP object. A host owns it, feeds it
//! stereo blocks and pushes `Mode` / `Controls` between blocks:
//!
//! ```
//! use weirdverb::{Controls, Mode, WeirdReverb};
//!
//! let mut verb = WeirdReverb::new(48_000.0, 64, Mode::SpectralGhost);
//! verb.set_controls(Controls { stability: 0.3, ..Controls::default() });
//!
//! let mut left = vec![0.0f32; 64];
//! let mut right = vec![0.0f32; 64];
//! left[0] = 1.0;
//! verb.process_block(&mut left, &mut right, None, 0.0);
//! assert!(left.iter().all(|s| s.abs() <= 1.0));
//! ```

pub mod controls;
pub mod debug;
pub mod dsp;
pub mod engine;
pub mod macro_controller;
pub mod meters;
pub mod mode;
pub mod presets;

pub use controls::Controls;
pub use dsp::stability::{CvFilterTime, CvSmoothing, StabilityCvShaper};
pub use engine::{ActiveIrs, EngineConfig, WeirdReverb};
pub use macro_controller::{
    compute_character_targets, controls_from_macro, BreathSync, CharacterTargets, MacroInput,
};
pub use meters::Meters;
pub use mode::{Mode, ModeTraits};
pub use presets::{CvSettings, FactoryPreset, PresetManager};
