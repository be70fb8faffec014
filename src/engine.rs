//! WeirdReverb engine.
//!
//! Owns the IR bank, the living IRs and all per-sample state, and runs the
//! per-sample chain:
//!
//! ```text
//! stability(cv) -> lo-fi hold/wow -> history write -> features
//!   -> living update (every N samples) -> band split -> 3x convolve (on refresh)
//!   -> residue -> drone -> failure flip/quantize -> zipper/quantize
//!   -> dry/wet -> AntiSpace post -> soft clip -> feedback write
//! ```
//!
//! ## Audio Thread Safety
//! - Every buffer is sized in `new()`; `process_block` never allocates
//! - No locks, no I/O; meters are relaxed atomic stores
//! - Real-time diagnostics go through `wv_log!`, never `log`

use crate::controls::Controls;
use crate::dsp::convolver::{convolve_sample, BandSplitter, ConvolveParams};
use crate::dsp::feature::FeatureTracker;
use crate::dsp::history::HistoryBuffers;
use crate::dsp::ir_bank::IrBank;
use crate::dsp::living_ir::{LivingIr, TickContext};
use crate::dsp::lofi::LoFiTransport;
use crate::dsp::post;
use crate::dsp::rng::{EngineRng, ENGINE_SEED};
use crate::dsp::stability::resolve_stability;
use crate::dsp::utils::{advance_phase, clamp01, quantize, sine_cycles, soft_clip};
use crate::meters::Meters;
use crate::mode::{Mode, ModeTraits};
use crate::wv_log;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Constants
// =============================================================================

const MIN_UPDATE_INTERVAL: usize = 16;
const MIN_FAILURE_UPDATE_INTERVAL: usize = 24;
const FAILURE_UPDATE_FACTOR: usize = 8;

/// Low/high IRs trade places while `(frame / BAND_SWAP_PERIOD)` is even.
const BAND_SWAP_PERIOD: usize = 1024;

const LOW_WEIGHT: f32 = 0.55;
const MID_WEIGHT: f32 = 0.95;
const HIGH_WEIGHT: f32 = 1.25;

const HIGH_ZERO_SPREAD: f32 = 48.0;
const DRONE_THRESHOLD: f32 = 0.75;
const DRONE_PARTIAL: f32 = 2.618;

// =============================================================================
// Configuration
// =============================================================================

/// Construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Nominal host block size. Sets the living-IR update interval.
    pub block_size: usize,
    pub mode: Mode,
    /// Seed of the engine RNG. The bank does not depend on it.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_size: 64,
            mode: Mode::LivingSignal,
            seed: ENGINE_SEED,
        }
    }
}

impl EngineConfig {
    fn sanitized(self) -> Self {
        let sample_rate = if self.sample_rate.is_finite() {
            self.sample_rate.max(1.0)
        } else {
            Self::default().sample_rate
        };
        Self {
            sample_rate,
            block_size: self.block_size.max(1),
            ..self
        }
    }
}

/// Borrowed view of the three active IRs.
#[derive(Debug, Clone, Copy)]
pub struct ActiveIrs<'a> {
    pub low: &'a [f32],
    pub mid: &'a [f32],
    pub high: &'a [f32],
}

// =============================================================================
// Engine
// =============================================================================

pub struct WeirdReverb {
    sample_rate: f32,
    block_size: usize,
    mode: Mode,
    traits: ModeTraits,
    controls: Controls,

    bank: IrBank,
    living: LivingIr,
    history: HistoryBuffers,
    features: FeatureTracker,
    splitter: BandSplitter,
    lofi: LoFiTransport,
    rng: EngineRng,

    frame: usize,
    learned_bias: f32,
    drone_phase: f32,
    dynamic_stability: f32,

    meters: Arc<Meters>,
}

impl WeirdReverb {
    pub fn new(sample_rate: f64, block_size: usize, mode: Mode) -> Self {
        Self::from_config(EngineConfig {
            sample_rate,
            block_size,
            mode,
            ..EngineConfig::default()
        })
    }

    pub fn from_config(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let controls = Controls::default();

        let mut engine = Self {
            sample_rate: config.sample_rate as f32,
            block_size: config.block_size,
            mode: config.mode,
            traits: config.mode.traits(),
            controls,
            bank: IrBank::build(),
            living: LivingIr::new(),
            history: HistoryBuffers::new(),
            features: FeatureTracker::new(),
            splitter: BandSplitter::new(),
            lofi: LoFiTransport::new(),
            rng: EngineRng::new(config.seed),
            frame: 0,
            learned_bias: 0.0,
            drone_phase: 0.0,
            dynamic_stability: controls.stability,
            meters: Arc::new(Meters::new()),
        };
        engine.reset();

        log::debug!(
            "weirdverb engine ready: {} Hz, block {}, mode '{}', seed {:#x}",
            config.sample_rate,
            config.block_size,
            config.mode.name(),
            config.seed
        );
        engine
    }

    /// Zero every working state, reactivate bank entries 0/1/2 and reseed
    /// the RNG. The bank itself is kept.
    pub fn reset(&mut self) {
        self.history.clear();
        self.features.reset();
        self.splitter.reset();
        self.lofi.reset();
        self.living.activate_defaults(&self.bank);
        self.rng.reseed();
        self.frame = 0;
        self.learned_bias = 0.0;
        self.drone_phase = 0.0;
        self.dynamic_stability = self.controls.stability;
        self.meters.reset();
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.traits = mode.traits();
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.name()
    }

    /// Replace the whole control set. Out-of-range fields are clamped.
    pub fn set_controls(&mut self, controls: Controls) {
        self.controls = controls.sanitized();
    }

    #[inline]
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn meters(&self) -> Arc<Meters> {
        Arc::clone(&self.meters)
    }

    pub fn bank(&self) -> &IrBank {
        &self.bank
    }

    pub fn active_irs(&self) -> ActiveIrs<'_> {
        ActiveIrs {
            low: self.living.low(),
            mid: self.living.mid(),
            high: self.living.high(),
        }
    }

    #[inline]
    pub fn zero_index(&self) -> usize {
        self.living.zero_index()
    }

    /// Stability after the CV blend, as of the last processed sample.
    #[inline]
    pub fn dynamic_stability(&self) -> f32 {
        self.dynamic_stability
    }

    pub fn input_history_energy(&self) -> f32 {
        self.history.input_energy()
    }

    /// Samples between living-IR updates.
    fn update_interval(&self) -> usize {
        let base = (self.block_size / 2).max(MIN_UPDATE_INTERVAL);
        if self.traits.failure {
            (base * FAILURE_UPDATE_FACTOR).max(MIN_FAILURE_UPDATE_INTERVAL)
        } else {
            base
        }
    }

    fn update_living(&mut self, controls: &Controls, stability: f32) {
        let ctx = TickContext {
            controls: *controls,
            traits: self.traits,
            mode_skew: self.mode.skew(),
            stability,
            envelope: self.features.envelope(),
            brightness: self.features.brightness(),
            frame: self.frame,
            sample_rate: self.sample_rate,
        };

        let Self {
            living,
            bank,
            history,
            rng,
            ..
        } = self;

        #[cfg(all(debug_assertions, feature = "assert_process_allocs"))]
        let stuck =
            assert_no_alloc::assert_no_alloc(|| living.update(bank, history, rng, &ctx));
        #[cfg(not(all(debug_assertions, feature = "assert_process_allocs")))]
        let stuck = living.update(bank, history, rng, &ctx);

        if let Some(band) = stuck {
            wv_log!("[FAIL] {:?} band stuck at frame {}", band, ctx.frame);
        }
    }

    /// Process `min(left.len(), right.len())` samples in place.
    ///
    /// `cv` is an optional per-sample stability offset scaled by `cv_amount`.
    /// Samples past the end of a short `cv` slice read as 0.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        cv: Option<&[f32]>,
        cv_amount: f32,
    ) {
        let n = left.len().min(right.len());
        let c = self.controls;
        let traits = self.traits;
        let update_interval = self.update_interval();

        let mut peak_l = 0.0f32;
        let mut peak_r = 0.0f32;

        for i in 0..n {
            let stability = resolve_stability(c.stability, cv, i, cv_amount);
            self.dynamic_stability = stability;
            let instability = 1.0 - stability;

            let in_l = finite_or_zero(left[i]);
            let in_r = finite_or_zero(right[i]);
            let mono_in = 0.5 * (in_l + in_r);

            // --- Lo-fi transport & history ---
            let lofi =
                self.lofi
                    .begin_sample(mono_in, c.entropy, instability, traits.failure, c.freeze);
            if c.freeze {
                self.history.decay_input();
            } else {
                self.history.write_input(lofi.mono);
            }
            self.features.update(lofi.mono);

            // --- Living IR ---
            if !c.freeze {
                let due = self.frame % update_interval == 0;
                self.frame = self.frame.wrapping_add(1);
                if due {
                    self.update_living(&c, stability);
                }
            }

            // --- Convolution ---
            let bands = self.splitter.split(lofi.mono);
            let zero = self.living.zero_index();
            let low_zero = zero / 2;
            let high_zero = zero + (instability * HIGH_ZERO_SPREAD) as usize;

            let mut wet = self.lofi.held_wet();
            if lofi.refresh {
                let params = ConvolveParams::new(
                    &c,
                    &traits,
                    stability,
                    self.learned_bias,
                    self.features.envelope(),
                    self.frame,
                    self.sample_rate,
                );
                let swap = traits.band_swap && (self.frame / BAND_SWAP_PERIOD) % 2 == 0;
                let (ir_low, ir_high) = if swap {
                    (self.living.high(), self.living.low())
                } else {
                    (self.living.low(), self.living.high())
                };

                let wet_low =
                    convolve_sample(bands.low, ir_low, low_zero, &self.history, &mut self.rng, &params);
                let wet_mid = convolve_sample(
                    bands.mid,
                    self.living.mid(),
                    zero,
                    &self.history,
                    &mut self.rng,
                    &params,
                );
                let wet_high =
                    convolve_sample(bands.high, ir_high, high_zero, &self.history, &mut self.rng, &params);

                wet = LOW_WEIGHT * wet_low + MID_WEIGHT * wet_mid + HIGH_WEIGHT * wet_high;
                self.lofi.store_wet(wet);
            }

            // --- Wet shaping ---
            if traits.residue {
                let target = clamp01(
                    self.features.brightness() * 16.0 + self.features.envelope() * 3.0,
                );
                self.learned_bias = 0.998 * self.learned_bias + 0.002 * target;
                let freq = 140.0 + self.learned_bias * 1600.0;
                let residue = sine_cycles(freq * self.frame as f32 / self.sample_rate);
                wet += residue * (0.01 + 0.12 * c.memory * instability);
            }

            if instability > DRONE_THRESHOLD || traits.drone {
                advance_phase(
                    &mut self.drone_phase,
                    0.0006 + 0.0022 * c.entropy + 0.001 * self.features.envelope(),
                );
                let drone = sine_cycles(self.drone_phase)
                    + 0.35 * sine_cycles(self.drone_phase * DRONE_PARTIAL);
                wet += drone * 0.08 * instability;
            }

            if traits.failure {
                if self.rng.chance(c.entropy * 0.02) {
                    wet = -wet;
                }
                wet = quantize(wet, 1.0 / (3.0 + c.coherence * 12.0));
            }

            let wet = self.lofi.finish_wet(wet, lofi.depth, c.coherence, stability);

            // --- Mix & post ---
            let mut out_l = c.dry * in_l + c.wet * wet;
            let mut out_r = c.dry * in_r + c.wet * wet;
            if traits.anti_space {
                (out_l, out_r) = post::anti_space(out_l, out_r, in_l, in_r, i, &c, instability);
            }

            let out_l = soft_clip(out_l);
            let out_r = soft_clip(out_r);
            left[i] = out_l;
            right[i] = out_r;
            peak_l = peak_l.max(out_l.abs());
            peak_r = peak_r.max(out_r.abs());

            self.history.write_feedback(wet);
            self.history.advance();
        }

        self.meters.set_output_peak_l(peak_l);
        self.meters.set_output_peak_r(peak_r);
        self.meters.set_dynamic_stability(self.dynamic_stability);
    }
}

#[inline]
fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::utils::peak_abs;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SR: f64 = 48_000.0;
    const BLOCK: usize = 64;

    fn noise(len: usize, seed: u64, amp: f32) -> Vec<f32> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen_range(-amp..amp)).collect()
    }

    /// Run `input` (mono, duplicated to both channels) through the engine in
    /// `BLOCK`-sized chunks and return the left output.
    fn render(engine: &mut WeirdReverb, input: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(input.len());
        for chunk in input.chunks(BLOCK) {
            let mut l = chunk.to_vec();
            let mut r = chunk.to_vec();
            engine.process_block(&mut l, &mut r, None, 0.0);
            out.extend_from_slice(&l);
        }
        out
    }

    #[test]
    fn test_deterministic_across_instances() {
        let input = noise(6000, 7, 0.8);
        for mode in Mode::ALL {
            let controls = Controls {
                entropy: 0.9,
                stability: 0.2,
                ..Controls::default()
            };
            let mut a = WeirdReverb::new(SR, BLOCK, mode);
            let mut b = WeirdReverb::new(SR, BLOCK, mode);
            a.set_controls(controls);
            b.set_controls(controls);
            let out_a = render(&mut a, &input);
            let out_b = render(&mut b, &input);
            assert!(
                out_a.iter().zip(&out_b).all(|(x, y)| x.to_bits() == y.to_bits()),
                "mode {} is not deterministic",
                mode.name()
            );
        }
    }

    #[test]
    fn test_reset_replays_identically() {
        let warmup = noise(3000, 1, 0.5);
        let input = noise(3000, 2, 0.5);

        let mut used = WeirdReverb::new(SR, BLOCK, Mode::Afterimage);
        render(&mut used, &warmup);
        used.reset();
        let replay = render(&mut used, &input);

        let mut fresh = WeirdReverb::new(SR, BLOCK, Mode::Afterimage);
        let expected = render(&mut fresh, &input);
        assert_eq!(replay, expected);
    }

    #[test]
    fn test_reset_restores_initial_irs() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::UncannyCausality);
        render(&mut engine, &noise(2000, 3, 0.5));
        engine.reset();
        let irs = engine.active_irs();
        assert_eq!(irs.low, engine.bank().entry(0));
        assert_eq!(irs.mid, engine.bank().entry(1));
        assert_eq!(irs.high, engine.bank().entry(2));
        assert_eq!(engine.zero_index(), 0);
        assert_eq!(engine.input_history_energy(), 0.0);
    }

    #[test]
    fn test_output_bounded_under_extremes() {
        let input = noise(4000, 11, 10.0);
        for mode in Mode::ALL {
            let mut engine = WeirdReverb::new(SR, BLOCK, mode);
            engine.set_controls(Controls {
                memory: 1.0,
                entropy: 1.0,
                coherence: 0.0,
                resistance: 0.0,
                stability: 0.0,
                wild_ir_bank: true,
                wet: 1.0,
                dry: 1.0,
                ..Controls::default()
            });
            let out = render(&mut engine, &input);
            assert!(out.iter().all(|v| v.is_finite() && v.abs() <= 1.0), "{}", mode.name());
        }
    }

    #[test]
    fn test_non_finite_input_is_ignored() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::RainforestMemory);
        let mut l = vec![f32::NAN; BLOCK];
        let mut r = vec![f32::INFINITY; BLOCK];
        engine.process_block(&mut l, &mut r, None, 0.0);
        assert!(l.iter().chain(&r).all(|v| v.is_finite()));
        assert!(engine.input_history_energy().is_finite());
    }

    #[test]
    fn test_living_signal_silence_stays_quiet() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::LivingSignal);
        engine.set_controls(Controls::default());
        engine.reset();
        let out = render(&mut engine, &vec![0.0; 48_000]);
        assert!(peak_abs(&out) < 0.05);
    }

    #[test]
    fn test_silence_after_reset_per_mode() {
        for mode in Mode::ALL {
            let mut engine = WeirdReverb::new(SR, BLOCK, mode);
            engine.set_controls(Controls::default());
            engine.reset();
            let out = render(&mut engine, &vec![0.0; 48_000]);
            let peak = peak_abs(&out);
            let traits = mode.traits();

            if traits.residue || traits.drone {
                // Autonomous tones keep running but stay bounded
                assert!(out.iter().all(|v| v.is_finite() && v.abs() <= 1.0), "{}", mode.name());
                assert!(peak > 0.0, "{}", mode.name());
            } else {
                assert_eq!(peak, 0.0, "{}", mode.name());
            }
        }

        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::Afterimage);
        let out = render(&mut engine, &vec![0.0; 48_000]);
        assert!(peak_abs(&out) < 0.1);
    }

    #[test]
    fn test_tail_dies_out_after_input_stops() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::SpectralGhost);
        engine.set_controls(Controls {
            stability: 0.8,
            ..Controls::default()
        });
        render(&mut engine, &noise(4800, 5, 0.7));
        let tail = render(&mut engine, &vec![0.0; 9600]);
        assert!(peak_abs(&tail[tail.len() - 960..]) < 1e-3);
    }

    #[test]
    fn test_drone_self_oscillation_is_bounded() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::HabitRoom);
        let out = render(&mut engine, &vec![0.0; 24_000]);
        assert!(peak_abs(&out) > 0.0);
        assert!(out.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_digital_failure_impulse_has_tail() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::DigitalFailure);
        engine.set_controls(Controls {
            entropy: 1.0,
            stability: 0.0,
            ..Controls::default()
        });
        let mut input = vec![0.0f32; 96_000];
        input[0] = 1.0;
        let out = render(&mut engine, &input);
        assert!(out[500..].iter().any(|v| *v != 0.0));
        assert!(out.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_freeze_holds_irs_and_decays_history() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::Afterimage);
        render(&mut engine, &noise(4096, 9, 0.6));

        engine.set_controls(Controls {
            freeze: true,
            ..Controls::default()
        });
        let before = engine.active_irs();
        let (low, mid, high) = (before.low.to_vec(), before.mid.to_vec(), before.high.to_vec());

        let mut energy = engine.input_history_energy();
        assert!(energy > 0.0);
        for k in 0..40 {
            render(&mut engine, &noise(BLOCK, 100 + k, 0.9));
            let now = engine.input_history_energy();
            assert!(now <= energy);
            energy = now;
        }

        let after = engine.active_irs();
        assert_eq!(after.low, low.as_slice());
        assert_eq!(after.mid, mid.as_slice());
        assert_eq!(after.high, high.as_slice());
    }

    #[test]
    fn test_bank_untouched_by_processing() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::LivingSignal);
        let snapshot: Vec<Vec<f32>> = engine.bank().iter().map(|e| e.to_vec()).collect();
        let input = noise(1024, 21, 0.5);
        for (k, mode) in Mode::ALL.into_iter().enumerate() {
            engine.set_mode(mode);
            engine.set_controls(Controls {
                wild_ir_bank: k % 2 == 1,
                stability: 0.1,
                ..Controls::default()
            });
            render(&mut engine, &input);
        }
        engine.reset();
        let after: Vec<Vec<f32>> = engine.bank().iter().map(|e| e.to_vec()).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_set_controls_clamps() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::AntiSpace);
        engine.set_controls(Controls {
            stability: 4.0,
            wet: -1.0,
            bpm: 5.0,
            ..Controls::default()
        });
        let c = engine.controls();
        assert_eq!(c.stability, 1.0);
        assert_eq!(c.wet, 0.0);
        assert_eq!(c.bpm, crate::controls::BPM_MIN);
    }

    #[test]
    fn test_cv_drives_dynamic_stability() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::LivingSignal);
        let cv = vec![1.0f32; BLOCK];
        let mut l = vec![0.0; BLOCK];
        let mut r = vec![0.0; BLOCK];
        engine.process_block(&mut l, &mut r, Some(&cv), -1.0);
        assert_eq!(engine.dynamic_stability(), 0.0);
        assert_eq!(engine.meters().get_dynamic_stability(), 0.0);

        // Short CV slice: the tail of the block falls back to the control value
        engine.process_block(&mut l, &mut r, Some(&cv[..8]), -1.0);
        assert_eq!(engine.dynamic_stability(), 0.5);
    }

    #[test]
    fn test_mismatched_lengths_process_common_prefix() {
        let mut engine = WeirdReverb::new(SR, BLOCK, Mode::LivingSignal);
        let mut l = vec![0.25f32; 32];
        let mut r = vec![0.25f32; 16];
        engine.process_block(&mut l, &mut r, None, 0.0);
        assert!(l[16..].iter().all(|v| *v == 0.25));
    }

    #[test]
    fn test_anti_space_collapses_wide_input() {
        let mut engine = WeirdReverb::new(SR, 256, Mode::AntiSpace);
        engine.set_controls(Controls {
            dry: 1.0,
            wet: 0.0,
            ..Controls::default()
        });
        let mut l = vec![0.5f32; 256];
        let mut r = vec![-0.5f32; 256];
        engine.process_block(&mut l, &mut r, None, 0.0);
        // Cross-feed keeps the block start wide, then the image is mono
        assert!((l[0] - r[0]).abs() > 0.1);
        for i in post::CROSS_FEED_SAMPLES..256 {
            assert!((l[i] - r[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_config_defaults_and_clamping() {
        let cfg: EngineConfig = serde_json::from_str(r#"{ "block_size": 0 }"#).unwrap();
        assert_eq!(cfg.sample_rate, 48_000.0);
        let engine = WeirdReverb::from_config(cfg);
        assert_eq!(engine.block_size(), 1);
        assert_eq!(engine.mode_name(), "Living Signal");

        let engine = WeirdReverb::new(-5.0, 64, Mode::HabitRoom);
        assert_eq!(engine.sample_rate(), 1.0);
    }
}
