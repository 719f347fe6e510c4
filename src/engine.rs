//! Synthesis engine
//!
//! The engine is split across threads in two halves created together:
//!
//! - [`SynthEngine`]: a cheap, cloneable control handle. Note events and
//!   mapped-parameter events from any thread go through it. Every write is a
//!   single atomic store; nothing blocks.
//! - [`SynthRenderer`]: owns the patch graph and its per-sample state. It
//!   lives on the render thread and pulls one sample per
//!   [`SynthRenderer::render_sample`] call.
//!
//! The patch is fixed:
//!
//! ```text
//! Osc1 ─┐
//!       ├─▶ Mixer ─▶ Filter ─▶ VCA ─▶ × master ─▶ out
//! Osc2 ─┘                      ▲
//!                   Envelope ──┘ (control)
//! ```

use crate::atomic::AtomicF64;
use crate::config::SynthConfig;
use crate::error::Result;
use crate::envelope::{Envelope, EnvelopeParams};
use crate::filter::{Filter, FilterParams};
use crate::mapping::Parameter;
use crate::mixer::{Mixer, MixerParams};
use crate::module::AudioModule;
use crate::oscillator::{midi_to_frequency, Oscillator, OscillatorParams};
use crate::vca::Vca;
use std::sync::Arc;
use tracing::{trace, warn};

/// Lowest cutoff reached by the mapped `filter.cutoff` control
pub const CUTOFF_MIN_HZ: f64 = 50.0;
/// Highest cutoff reached by the mapped `filter.cutoff` control
pub const CUTOFF_MAX_HZ: f64 = 20_000.0;

/// Longest attack/release reachable through a mapped control, in seconds
pub const MAX_ENVELOPE_TIME: f64 = 2.0;

/// Fine-tune range reachable through a mapped control, in cents
pub const PITCH_RANGE_CENTS: f64 = 100.0;

/// Receives note events (implemented by [`SynthEngine`], and by test doubles)
pub trait NoteTarget: Send + Sync {
    fn note_on(&self, note: u8, velocity: u8);
    fn note_off(&self, note: u8);
}

#[derive(Debug)]
struct EngineShared {
    osc1: Arc<OscillatorParams>,
    osc2: Arc<OscillatorParams>,
    mixer: Arc<MixerParams>,
    filter: Arc<FilterParams>,
    envelope: Arc<EnvelopeParams>,
    master_volume: AtomicF64,
}

/// Control handle for the synthesizer
#[derive(Debug, Clone)]
pub struct SynthEngine {
    shared: Arc<EngineShared>,
}

/// Render-thread half: owns the patch graph
pub struct SynthRenderer {
    output: Vca,
    shared: Arc<EngineShared>,
}

impl SynthEngine {
    /// Build the patch and return its control and render halves.
    ///
    /// A non-positive or non-finite `sample_rate` is replaced by the default
    /// rate. Use [`SynthEngine::try_new`] to reject such a config instead.
    pub fn new(config: &SynthConfig) -> (SynthEngine, SynthRenderer) {
        let sample_rate = if config.sample_rate.is_finite() && config.sample_rate > 0.0 {
            config.sample_rate
        } else {
            let fallback = SynthConfig::default().sample_rate;
            warn!(
                sample_rate = config.sample_rate,
                fallback, "invalid sample rate, using default"
            );
            fallback
        };

        let osc1 = Arc::new(OscillatorParams::new(config.osc1.waveform));
        osc1.set_octave(config.osc1.octave);
        osc1.set_cents(config.osc1.cents);

        let osc2 = Arc::new(OscillatorParams::new(config.osc2.waveform));
        osc2.set_octave(config.osc2.octave);
        osc2.set_cents(config.osc2.cents);

        let shared = Arc::new(EngineShared {
            osc1,
            osc2,
            mixer: Arc::new(MixerParams::new(config.blend)),
            filter: Arc::new(FilterParams::new(config.cutoff, config.resonance)),
            envelope: Arc::new(EnvelopeParams::new(config.attack, config.release)),
            master_volume: AtomicF64::new(config.master_volume.clamp(0.0, 1.0)),
        });

        let initial = config.initial_note.min(127);
        shared.envelope.gate().set_note(initial);
        shared.osc1.set_base_frequency(midi_to_frequency(initial));
        shared.osc2.set_base_frequency(midi_to_frequency(initial));

        let sr = sample_rate;
        let mut oscillator1 = Oscillator::with_params(sr, Arc::clone(&shared.osc1));
        let mut oscillator2 = Oscillator::with_params(sr, Arc::clone(&shared.osc2));
        if let Some(seed) = config.noise_seed {
            oscillator1 = oscillator1.with_seed(seed);
            oscillator2 = oscillator2.with_seed(seed.wrapping_add(1));
        }

        let mut mixer = Mixer::with_params(Arc::clone(&shared.mixer));
        mixer.set_input_a(oscillator1);
        mixer.set_input_b(oscillator2);

        let mut filter = Filter::with_params(sr, Arc::clone(&shared.filter));
        filter.set_input(mixer);

        let mut output = Vca::new();
        output.set_audio_input(filter);
        output.set_control_input(Envelope::with_params(sr, Arc::clone(&shared.envelope)));

        let renderer = SynthRenderer {
            output,
            shared: Arc::clone(&shared),
        };
        (SynthEngine { shared }, renderer)
    }

    /// Validate `config`, then build as [`SynthEngine::new`]
    pub fn try_new(config: &SynthConfig) -> Result<(SynthEngine, SynthRenderer)> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Start a note. Last-note priority: the new note always takes the
    /// voice and always retriggers the envelope, even when repeated.
    ///
    /// `velocity` is reserved and does not affect the sound.
    pub fn note_on(&self, note: u8, _velocity: u8) {
        let note = note.min(127);

        let hz = midi_to_frequency(note);
        self.shared.osc1.set_base_frequency(hz);
        self.shared.osc2.set_base_frequency(hz);

        self.shared.envelope.trigger_note(note);
    }

    /// Release the voice, but only if `note` is the one currently held.
    ///
    /// The comparison and the release are one atomic step on the gate, so a
    /// note-on landing from another thread is never cut by a stale note-off.
    pub fn note_off(&self, note: u8) {
        self.shared.envelope.release_note(note);
    }

    /// Note currently owning the voice
    pub fn current_note(&self) -> u8 {
        self.shared.envelope.gate().note()
    }

    /// Whether the last envelope command was a note-on
    pub fn is_gate_open(&self) -> bool {
        self.shared.envelope.gate().is_open()
    }

    /// Apply a 0-127 controller value to a parameter by name.
    ///
    /// Unknown names are ignored.
    pub fn set_mapped_control(&self, name: &str, value: u8) {
        match Parameter::from_name(name) {
            Some(parameter) => self.set_parameter(parameter, value),
            None => trace!(name, value, "ignoring unknown mapped control"),
        }
    }

    /// Apply a 0-127 controller value to a parameter
    pub fn set_parameter(&self, parameter: Parameter, value: u8) {
        let normalized = value.min(127) as f64 / 127.0;

        match parameter {
            Parameter::FilterCutoff => self
                .shared
                .filter
                .set_cutoff(CUTOFF_MIN_HZ + (CUTOFF_MAX_HZ - CUTOFF_MIN_HZ) * normalized),
            Parameter::FilterResonance => self.shared.filter.set_resonance(normalized),
            Parameter::MasterVolume => self.set_master_volume(normalized),
            Parameter::MixerBlend => self.shared.mixer.set_blend(normalized),
            Parameter::EnvelopeAttack => self
                .shared
                .envelope
                .set_attack(normalized * MAX_ENVELOPE_TIME),
            Parameter::EnvelopeRelease => self
                .shared
                .envelope
                .set_release(normalized * MAX_ENVELOPE_TIME),
            Parameter::Osc1Pitch => self.shared.osc1.set_cents(pitch_cents(normalized)),
            Parameter::Osc2Pitch => self.shared.osc2.set_cents(pitch_cents(normalized)),
        }
    }

    pub fn master_volume(&self) -> f64 {
        self.shared.master_volume.get()
    }

    /// Set output gain, clamped to `[0, 1]`
    pub fn set_master_volume(&self, volume: f64) {
        self.shared.master_volume.set(volume.clamp(0.0, 1.0));
    }

    pub fn osc1(&self) -> &OscillatorParams {
        &self.shared.osc1
    }

    pub fn osc2(&self) -> &OscillatorParams {
        &self.shared.osc2
    }

    pub fn mixer(&self) -> &MixerParams {
        &self.shared.mixer
    }

    pub fn filter(&self) -> &FilterParams {
        &self.shared.filter
    }

    pub fn envelope(&self) -> &EnvelopeParams {
        &self.shared.envelope
    }
}

impl NoteTarget for SynthEngine {
    fn note_on(&self, note: u8, velocity: u8) {
        SynthEngine::note_on(self, note, velocity);
    }

    fn note_off(&self, note: u8) {
        SynthEngine::note_off(self, note);
    }
}

/// Map `[0, 1]` to whole cents in `[-100, 100]`, truncating toward zero
fn pitch_cents(normalized: f64) -> i32 {
    (normalized * 2.0 * PITCH_RANGE_CENTS - PITCH_RANGE_CENTS) as i32
}

impl SynthRenderer {
    /// Produce the next output sample
    #[inline]
    pub fn render_sample(&mut self) -> f64 {
        self.output.tick() * self.shared.master_volume.get()
    }

    /// Fill `out` with consecutive samples
    pub fn render_block(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.render_sample() as f32;
        }
    }

    /// Silence all module state (phase, filter memory, envelope level)
    pub fn reset(&mut self) {
        self.output.reset();
    }
}
