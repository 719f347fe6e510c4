//! # Monosynth: Monophonic Modular Synthesizer Core
//!
//! `monosynth` is a single-voice subtractive synthesizer built from small audio
//! modules wired into a fixed patch, with lock-free parameter control, a
//! controller mapping table with learn mode, and a scale-aware step sequencer.
//!
//! ## Architecture
//!
//! - **Modules** - [`Oscillator`], [`Mixer`], [`Filter`], [`Envelope`] and
//!   [`Vca`] all implement [`AudioModule`]: one sample per `tick()`
//! - **Engine** - [`SynthEngine`] (control handle, any thread) and
//!   [`SynthRenderer`] (owns the graph, render thread) share parameter cells
//!   made of atomics
//! - **Control** - [`ParameterMap`] maps controller numbers to parameters;
//!   [`MidiRouter`] feeds raw MIDI through it
//! - **Sequencer** - [`Sequencer`] plays a 16-step pattern of scale degrees
//! - **Runtime** - render and sequencer threads stopped by a [`StopToken`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use monosynth::prelude::*;
//!
//! let (engine, renderer) = SynthEngine::new(&SynthConfig::default());
//!
//! // Render thread: 16-bit PCM into any sink
//! let token = StopToken::new();
//! let sink = |block: &[f32]| -> monosynth::Result<()> {
//!     let mut bytes = vec![0u8; block.len() * 2];
//!     encode_pcm16_le(block, &mut bytes);
//!     Ok(())
//! };
//! let render = spawn_render_loop(renderer, sink, token.clone()).unwrap();
//!
//! // Sequencer thread drives the engine
//! let sequencer = Sequencer::new(engine.clone(), &SequencerConfig::default());
//! sequencer.start();
//! let clock = sequencer.spawn(token.clone()).unwrap();
//!
//! // Controller input from anywhere
//! let router = MidiRouter::new(engine, std::sync::Arc::new(ParameterMap::new()));
//! router.handle_message(&[0xB0, 74, 40]);
//!
//! token.cancel();
//! clock.join().unwrap();
//! render.join().unwrap().unwrap();
//! ```

pub mod atomic;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod mapping;
pub mod midi;
pub mod mixer;
pub mod module;
pub mod oscillator;
pub mod runtime;
pub mod scale;
pub mod sequencer;
pub mod vca;

/// Prelude module for convenient imports
pub mod prelude {
    // Modules
    pub use crate::envelope::{Envelope, EnvelopeParams, EnvelopeStage};
    pub use crate::filter::{Filter, FilterParams};
    pub use crate::mixer::{Mixer, MixerParams};
    pub use crate::module::{AudioModule, Constant};
    pub use crate::oscillator::{midi_to_frequency, Oscillator, OscillatorParams, Waveform};
    pub use crate::vca::Vca;

    // Engine
    pub use crate::atomic::{AtomicF64, EnvelopeGate, GateEdge};
    pub use crate::engine::{NoteTarget, SynthEngine, SynthRenderer};

    // Control
    pub use crate::mapping::{Awaiting, ControlOutcome, Parameter, ParameterMap};
    pub use crate::midi::{MidiEvent, MidiRouter};

    // Sequencing
    pub use crate::scale::Scale;
    pub use crate::sequencer::{Sequencer, MAX_STEPS};

    // Runtime
    pub use crate::config::{Config, OscillatorConfig, SequencerConfig, SynthConfig};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::{
        encode_pcm16_le, spawn_render_loop, AudioSink, StopToken, BLOCK_FRAMES,
    };
}

// Re-export key types at crate root for convenience
pub use prelude::*;
