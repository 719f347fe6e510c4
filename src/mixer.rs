//! Two-input equal-power crossfader

use crate::atomic::AtomicF64;
use crate::module::{clamp_audio, tick_or_silence, AudioModule};
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

/// Mixer parameters shared with control threads
#[derive(Debug)]
pub struct MixerParams {
    blend: AtomicF64,
}

impl MixerParams {
    pub fn new(blend: f64) -> Self {
        Self {
            blend: AtomicF64::new(blend.clamp(0.0, 1.0)),
        }
    }

    /// Crossfade position: 0.0 = all A, 1.0 = all B
    pub fn blend(&self) -> f64 {
        self.blend.get()
    }

    /// Set the crossfade position, clamped to `[0, 1]`
    pub fn set_blend(&self, blend: f64) {
        self.blend.set(blend.clamp(0.0, 1.0));
    }
}

impl Default for MixerParams {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Equal-power crossfade weights `(cos(b·π/2), sin(b·π/2))`
#[inline]
pub fn equal_power_weights(blend: f64) -> (f64, f64) {
    // cos(π/2) is not exactly zero in f64
    if blend >= 1.0 {
        return (0.0, 1.0);
    }
    let angle = blend * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Crossfades two inputs with constant perceived loudness.
///
/// An unconnected input contributes silence. Output is clamped to `[-1, 1]`.
pub struct Mixer {
    input_a: Option<Box<dyn AudioModule>>,
    input_b: Option<Box<dyn AudioModule>>,
    params: Arc<MixerParams>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::with_params(Arc::new(MixerParams::default()))
    }

    pub fn with_params(params: Arc<MixerParams>) -> Self {
        Self {
            input_a: None,
            input_b: None,
            params,
        }
    }

    pub fn set_input_a(&mut self, input: impl AudioModule + 'static) {
        self.input_a = Some(Box::new(input));
    }

    pub fn set_input_b(&mut self, input: impl AudioModule + 'static) {
        self.input_b = Some(Box::new(input));
    }

    pub fn params(&self) -> &Arc<MixerParams> {
        &self.params
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioModule for Mixer {
    fn tick(&mut self) -> f64 {
        let a = tick_or_silence(&mut self.input_a);
        let b = tick_or_silence(&mut self.input_b);
        let (wa, wb) = equal_power_weights(self.params.blend());
        clamp_audio(a * wa + b * wb)
    }

    fn reset(&mut self) {
        if let Some(input) = self.input_a.as_mut() {
            input.reset();
        }
        if let Some(input) = self.input_b.as_mut() {
            input.reset();
        }
    }
}
