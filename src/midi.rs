//! MIDI input
//!
//! Decodes raw channel-voice messages and routes them: notes go straight to
//! the engine, controller changes go through the [`ParameterMap`] (which may
//! consume them for learn mode) before reaching the engine. Messages on every
//! channel are accepted.

use crate::engine::SynthEngine;
use crate::mapping::{ControlOutcome, ParameterMap};
use std::sync::Arc;
use tracing::trace;

/// Decoded channel-voice message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
}

impl MidiEvent {
    /// Decode a three-byte message. Note-on with velocity 0 is a note-off.
    /// Anything else (short messages, other status bytes) yields `None`.
    pub fn parse(msg: &[u8]) -> Option<Self> {
        let [status, data1, data2] = *msg else {
            return None;
        };
        let (data1, data2) = (data1 & 0x7F, data2 & 0x7F);

        match status & 0xF0 {
            0x90 if data2 > 0 => Some(MidiEvent::NoteOn {
                note: data1,
                velocity: data2,
            }),
            0x80 | 0x90 => Some(MidiEvent::NoteOff { note: data1 }),
            0xB0 => Some(MidiEvent::ControlChange {
                controller: data1,
                value: data2,
            }),
            _ => None,
        }
    }
}

/// Routes MIDI input to an engine through a shared controller map
#[derive(Debug, Clone)]
pub struct MidiRouter {
    engine: SynthEngine,
    mapping: Arc<ParameterMap>,
}

impl MidiRouter {
    pub fn new(engine: SynthEngine, mapping: Arc<ParameterMap>) -> Self {
        Self { engine, mapping }
    }

    pub fn engine(&self) -> &SynthEngine {
        &self.engine
    }

    pub fn mapping(&self) -> &Arc<ParameterMap> {
        &self.mapping
    }

    /// Decode and route a raw message. Returns the decoded event, if any.
    pub fn handle_message(&self, msg: &[u8]) -> Option<MidiEvent> {
        let event = MidiEvent::parse(msg);
        match event {
            Some(event) => {
                self.handle_event(event);
            }
            None => trace!(?msg, "ignored midi message"),
        }
        event
    }

    /// Route a decoded event. Controller events report how they resolved.
    pub fn handle_event(&self, event: MidiEvent) -> Option<ControlOutcome> {
        match event {
            MidiEvent::NoteOn { note, velocity } => {
                self.engine.note_on(note, velocity);
                None
            }
            MidiEvent::NoteOff { note } => {
                self.engine.note_off(note);
                None
            }
            MidiEvent::ControlChange { controller, value } => {
                let outcome = self.mapping.control_change(controller, value);
                if let ControlOutcome::Dispatch { parameter, value } = outcome {
                    self.engine.set_parameter(parameter, value);
                }
                Some(outcome)
            }
        }
    }
}
