//! Oscillator
//!
//! A naive (non band-limited) multi-waveform oscillator. Each waveform is
//! scaled so its RMS level matches the others, then clamped to `[-1, 1]`.

use crate::atomic::AtomicF64;
use crate::module::{clamp_audio, AudioModule};
use core::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_2_PI, PI, SQRT_2, TAU};
use std::sync::Arc;

/// sqrt(3): RMS of a full-scale saw or triangle is 1/sqrt(3)
const SAW_TRI_GAIN: f64 = 1.732_050_807_568_877_2;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    Noise,
}

impl Waveform {
    pub const ALL: [Waveform; 5] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
        Waveform::Noise,
    ];

    fn to_u8(self) -> u8 {
        match self {
            Waveform::Sine => 0,
            Waveform::Square => 1,
            Waveform::Sawtooth => 2,
            Waveform::Triangle => 3,
            Waveform::Noise => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Waveform::Square,
            2 => Waveform::Sawtooth,
            3 => Waveform::Triangle,
            4 => Waveform::Noise,
            _ => Waveform::Sine,
        }
    }

    /// Loudness normalization factor applied to the raw shape
    pub fn gain(self) -> f64 {
        match self {
            Waveform::Sine => SQRT_2,
            Waveform::Sawtooth | Waveform::Triangle => SAW_TRI_GAIN,
            Waveform::Square | Waveform::Noise => 1.0,
        }
    }
}

/// Convert a MIDI note number to frequency in Hz (A4 = note 69 = 440 Hz)
pub fn midi_to_frequency(note: u8) -> f64 {
    440.0 * 2.0_f64.powf((note as f64 - 69.0) / 12.0)
}

/// Oscillator parameters, shared between control threads and the renderer.
///
/// Each field is its own atomic cell; the derived frequency is recomputed by
/// the oscillator itself whenever any of the raw fields change.
#[derive(Debug)]
pub struct OscillatorParams {
    waveform: AtomicU8,
    base_frequency: AtomicF64,
    octave: AtomicI32,
    cents: AtomicI32,
}

impl OscillatorParams {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform: AtomicU8::new(waveform.to_u8()),
            base_frequency: AtomicF64::new(440.0),
            octave: AtomicI32::new(0),
            cents: AtomicI32::new(0),
        }
    }

    pub fn waveform(&self) -> Waveform {
        Waveform::from_u8(self.waveform.load(Ordering::Relaxed))
    }

    pub fn set_waveform(&self, waveform: Waveform) {
        self.waveform.store(waveform.to_u8(), Ordering::Relaxed);
    }

    pub fn base_frequency(&self) -> f64 {
        self.base_frequency.get()
    }

    /// Set the base frequency in Hz. Negative values are clamped to 0.
    pub fn set_base_frequency(&self, hz: f64) {
        self.base_frequency.set(hz.max(0.0));
    }

    pub fn octave(&self) -> i32 {
        self.octave.load(Ordering::Relaxed)
    }

    pub fn set_octave(&self, octave: i32) {
        self.octave.store(octave, Ordering::Relaxed);
    }

    /// Fine-tune offset in cents
    pub fn cents(&self) -> i32 {
        self.cents.load(Ordering::Relaxed)
    }

    pub fn set_cents(&self, cents: i32) {
        self.cents.store(cents, Ordering::Relaxed);
    }

    /// `base × 2^octave × 2^(cents/1200)`
    pub fn frequency(&self) -> f64 {
        derive_frequency(self.base_frequency(), self.octave(), self.cents())
    }
}

impl Default for OscillatorParams {
    fn default() -> Self {
        Self::new(Waveform::Sine)
    }
}

fn derive_frequency(base: f64, octave: i32, cents: i32) -> f64 {
    base * 2.0_f64.powi(octave) * 2.0_f64.powf(cents as f64 / 1200.0)
}

/// Periodic signal source
///
/// Phase runs in radians over `[0, 2π)`. Noise does not advance phase.
pub struct Oscillator {
    params: Arc<OscillatorParams>,
    sample_rate: f64,
    phase: f64,
    // (base, octave, cents) the cached frequency was derived from
    tuning: (f64, i32, i32),
    frequency: f64,
    rng: SmallRng,
}

impl Oscillator {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, Arc::new(OscillatorParams::default()))
    }

    /// Create an oscillator reading from an existing parameter set
    pub fn with_params(sample_rate: f64, params: Arc<OscillatorParams>) -> Self {
        let tuning = (params.base_frequency(), params.octave(), params.cents());
        Self {
            frequency: derive_frequency(tuning.0, tuning.1, tuning.2),
            tuning,
            params,
            sample_rate,
            phase: 0.0,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Use a fixed noise seed (for reproducible renders)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn params(&self) -> &Arc<OscillatorParams> {
        &self.params
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Frequency currently in effect, re-derived if the tuning changed
    pub fn frequency(&mut self) -> f64 {
        let tuning = (
            self.params.base_frequency(),
            self.params.octave(),
            self.params.cents(),
        );
        if tuning != self.tuning {
            self.tuning = tuning;
            self.frequency = derive_frequency(tuning.0, tuning.1, tuning.2);
        }
        self.frequency
    }

    fn shape(&mut self, waveform: Waveform) -> f64 {
        match waveform {
            Waveform::Sine => self.phase.sin(),
            Waveform::Square => {
                if self.phase < PI {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => self.phase / PI - 1.0,
            Waveform::Triangle => FRAC_2_PI * self.phase.sin().asin(),
            Waveform::Noise => self.rng.gen_range(-1.0..=1.0),
        }
    }
}

impl AudioModule for Oscillator {
    fn tick(&mut self) -> f64 {
        let waveform = self.params.waveform();
        let sample = self.shape(waveform) * waveform.gain();

        if waveform != Waveform::Noise {
            let increment = TAU * self.frequency() / self.sample_rate;
            self.phase = (self.phase + increment).rem_euclid(TAU);
        }

        clamp_audio(sample)
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}
