//! Voltage-Controlled Amplifier (VCA)
//!
//! Multiplies an audio-range input by a control-range input. No clamping is
//! applied: a `[-1, 1]` audio signal times a `[0, 1]` control signal is
//! already bounded.

use crate::module::AudioModule;

/// Amplitude stage of the patch
#[derive(Default)]
pub struct Vca {
    audio: Option<Box<dyn AudioModule>>,
    control: Option<Box<dyn AudioModule>>,
}

impl Vca {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_audio_input(&mut self, input: impl AudioModule + 'static) {
        self.audio = Some(Box::new(input));
    }

    pub fn set_control_input(&mut self, input: impl AudioModule + 'static) {
        self.control = Some(Box::new(input));
    }
}

impl AudioModule for Vca {
    fn tick(&mut self) -> f64 {
        match (self.audio.as_mut(), self.control.as_mut()) {
            (Some(audio), Some(control)) => audio.tick() * control.tick(),
            _ => 0.0,
        }
    }

    fn reset(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            audio.reset();
        }
        if let Some(control) = self.control.as_mut() {
            control.reset();
        }
    }
}
