//! Startup configuration
//!
//! Initial values for the patch and the sequencer. Every field has a default,
//! so a partial JSON document only overrides what it names:
//!
//! ```json
//! { "synth": { "cutoff": 2500.0, "osc1": { "waveform": "square" } },
//!   "sequencer": { "bpm": 96.0, "scale": "dorian" } }
//! ```

use crate::error::{Error, Result};
use crate::oscillator::Waveform;
use crate::scale::Scale;
use crate::sequencer::{MAX_BPM, MAX_STEPS, MIN_BPM};
use serde::{Deserialize, Serialize};

/// Per-oscillator tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorConfig {
    pub waveform: Waveform,
    /// Octave offset, typically -2..=2
    pub octave: i32,
    /// Fine-tune in cents, typically -100..=100
    pub cents: i32,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            octave: 0,
            cents: 0,
        }
    }
}

/// Initial synthesizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sample_rate: f64,
    pub master_volume: f64,
    pub osc1: OscillatorConfig,
    pub osc2: OscillatorConfig,
    pub blend: f64,
    /// Filter cutoff in Hz
    pub cutoff: f64,
    pub resonance: f64,
    /// Envelope attack in seconds
    pub attack: f64,
    /// Envelope release in seconds
    pub release: f64,
    /// Note the voice is tuned to before the first note-on
    pub initial_note: u8,
    /// Fixed noise seed; `None` seeds from the OS
    pub noise_seed: Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            master_volume: 0.8,
            osc1: OscillatorConfig {
                waveform: Waveform::Sawtooth,
                ..OscillatorConfig::default()
            },
            osc2: OscillatorConfig {
                waveform: Waveform::Sine,
                octave: -1,
                cents: 0,
            },
            blend: 0.5,
            cutoff: 10_000.0,
            resonance: 0.0,
            attack: 0.02,
            release: 0.2,
            initial_note: 60,
            noise_seed: None,
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.initial_note > 127 {
            return Err(Error::InvalidConfig(format!(
                "initial_note must be 0-127, got {}",
                self.initial_note
            )));
        }
        Ok(())
    }
}

/// Initial sequencer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub bpm: f64,
    /// Active steps, 1..=16
    pub steps: usize,
    /// Root MIDI note
    pub root: u8,
    pub scale: Scale,
    pub random_notes: bool,
    pub random_rhythm: bool,
    /// Velocity sent with every sequenced note
    pub velocity: u8,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            steps: MAX_STEPS,
            root: 60,
            scale: Scale::Major,
            random_notes: false,
            random_rhythm: false,
            velocity: 100,
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(Error::InvalidConfig(format!(
                "bpm must be {MIN_BPM}-{MAX_BPM}, got {}",
                self.bpm
            )));
        }
        if !(1..=MAX_STEPS).contains(&self.steps) {
            return Err(Error::InvalidConfig(format!(
                "steps must be 1-{MAX_STEPS}, got {}",
                self.steps
            )));
        }
        if self.root > 127 {
            return Err(Error::InvalidConfig(format!(
                "root must be 0-127, got {}",
                self.root
            )));
        }
        Ok(())
    }
}

/// Complete startup configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub synth: SynthConfig,
    pub sequencer: SequencerConfig,
}

impl Config {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.synth.validate()?;
        self.sequencer.validate()
    }
}
