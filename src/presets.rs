use crate::controls::Controls;
use crate::dsp::stability::{CvFilterTime, CvSmoothing, StabilityCvShaper};
use crate::engine::WeirdReverb;
use crate::macro_controller::{controls_from_macro, BreathSync, MacroInput};
use crate::mode::Mode;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

const FACTORY_PRESETS_JSON: &str = include_str!("../presets.json");

const OUTPUT_DB_MIN: f32 = -18.0;
const OUTPUT_DB_MAX: f32 = 12.0;

// =============================================================================
// STABILITY CV SETTINGS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvSettings {
    pub enabled: bool,
    /// Bipolar: negative amounts push toward instability as the CV rises.
    pub amount: f32,
    pub smoothing: CvSmoothing,
    pub filter_time: CvFilterTime,
}

impl Default for CvSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 0.0,
            smoothing: CvSmoothing::Raw,
            filter_time: CvFilterTime::Fast,
        }
    }
}

impl CvSettings {
    /// Amount to pass to `process_block`; 0 while the CV input is off.
    pub fn effective_amount(&self) -> f32 {
        if self.enabled {
            self.amount
        } else {
            0.0
        }
    }

    pub fn configure(&self, shaper: &mut StabilityCvShaper) {
        shaper.set_smoothing(self.smoothing);
        shaper.set_filter_time(self.filter_time);
    }
}

// =============================================================================
// FACTORY PRESETS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryPreset {
    pub name: String,
    pub mode: Mode,
    #[serde(default)]
    pub wild_ir_bank: bool,
    pub stability: f32,
    #[serde(default)]
    pub breath_sync: BreathSync,
    pub breath_rate_hz: f32,
    pub breath_depth: f32,
    #[serde(default)]
    pub cv: CvSettings,
    pub dry: f32,
    pub wet: f32,
    /// Host-side output trim, applied after the engine.
    #[serde(default)]
    pub output_db: f32,
}

impl FactoryPreset {
    fn init() -> Self {
        let c = Controls::default();
        Self {
            name: "Init".to_string(),
            mode: Mode::default(),
            wild_ir_bank: false,
            stability: c.stability,
            breath_sync: BreathSync::Free,
            breath_rate_hz: c.breath_rate_hz,
            breath_depth: c.breath_depth,
            cv: CvSettings::default(),
            dry: c.dry,
            wet: c.wet,
            output_db: 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        ensure!(!self.name.trim().is_empty(), "preset name is empty");
        ensure!(unit.contains(&self.stability), "stability {} out of [0, 1]", self.stability);
        ensure!(unit.contains(&self.breath_depth), "breath depth {} out of [0, 1]", self.breath_depth);
        ensure!(unit.contains(&self.dry), "dry {} out of [0, 1]", self.dry);
        ensure!(unit.contains(&self.wet), "wet {} out of [0, 1]", self.wet);
        ensure!(
            (crate::controls::BREATH_RATE_MIN_HZ..=crate::controls::BREATH_RATE_MAX_HZ)
                .contains(&self.breath_rate_hz),
            "breath rate {} Hz out of range",
            self.breath_rate_hz
        );
        ensure!(
            (-1.0..=1.0).contains(&self.cv.amount),
            "cv amount {} out of [-1, 1]",
            self.cv.amount
        );
        ensure!(
            (OUTPUT_DB_MIN..=OUTPUT_DB_MAX).contains(&self.output_db),
            "output {} dB out of range",
            self.output_db
        );
        Ok(())
    }

    pub fn macro_input(&self, bpm: f32) -> MacroInput {
        MacroInput {
            stability: self.stability,
            breath_sync: self.breath_sync,
            breath_rate_hz: self.breath_rate_hz,
            breath_depth: self.breath_depth,
            bpm,
            wild_ir_bank: self.wild_ir_bank,
            freeze: false,
            dry: self.dry,
            wet: self.wet,
        }
    }

    pub fn controls(&self, bpm: f32) -> Controls {
        controls_from_macro(self.mode, &self.macro_input(bpm))
    }

    /// Linear gain of `output_db`.
    pub fn output_gain(&self) -> f32 {
        10f32.powf(self.output_db / 20.0)
    }

    /// Load mode and controls into the engine. Does not reset it.
    pub fn apply(&self, engine: &mut WeirdReverb, bpm: f32) {
        engine.set_mode(self.mode);
        engine.set_controls(self.controls(bpm));
    }
}

#[derive(Debug)]
pub struct PresetManager {
    presets: Vec<FactoryPreset>,
}

impl PresetManager {
    /// Load the baked-in table. This is fallible but non-fatal: on failure
    /// the manager holds a single "Init" preset and the error is logged.
    pub fn new() -> Self {
        match Self::try_load() {
            Ok(manager) => {
                log::debug!("loaded {} factory presets", manager.len());
                manager
            }
            Err(e) => {
                log::warn!("factory presets unavailable, using Init only: {e:#}");
                Self::default()
            }
        }
    }

    pub fn try_load() -> Result<Self> {
        Self::from_json(FACTORY_PRESETS_JSON).context("baked-in factory presets")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let presets: Vec<FactoryPreset> =
            serde_json::from_str(json).context("malformed preset JSON")?;
        ensure!(!presets.is_empty(), "preset table is empty");

        for (i, preset) in presets.iter().enumerate() {
            preset
                .validate()
                .with_context(|| format!("preset #{i} '{}'", preset.name))?;
            ensure!(
                !presets[..i].iter().any(|p| p.name == preset.name),
                "duplicate preset name '{}'",
                preset.name
            );
        }
        Ok(Self { presets })
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Index is clamped into range.
    pub fn get(&self, index: usize) -> &FactoryPreset {
        &self.presets[index.min(self.presets.len() - 1)]
    }

    pub fn find(&self, name: &str) -> Option<&FactoryPreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FactoryPreset> {
        self.presets.iter()
    }
}

impl Default for PresetManager {
    fn default() -> Self {
        Self {
            presets: vec![FactoryPreset::init()],
        }
    }
}
