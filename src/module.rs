//! The audio module capability
//!
//! Anything placed in the patch graph produces one sample per call to
//! [`AudioModule::tick`]. Two signal conventions share the trait:
//!
//! | Role          | Range      | Examples                      |
//! |---------------|------------|-------------------------------|
//! | Audio         | `[-1, 1]`  | oscillator, mixer, filter     |
//! | Control       | `[0, 1]`   | envelope                      |
//!
//! The graph does not distinguish them by type, only by how they are wired
//! (audio input vs. control input).

/// A signal source advanced by exactly one sample per call.
///
/// All modules must be `Send` so the patch can be moved onto a dedicated
/// render thread.
pub trait AudioModule: Send {
    /// Produce the next sample, advancing internal state by one time step.
    fn tick(&mut self) -> f64;

    /// Reset internal state (phase, delay lines, envelope level).
    fn reset(&mut self) {}
}

impl<M: AudioModule + ?Sized> AudioModule for Box<M> {
    fn tick(&mut self) -> f64 {
        (**self).tick()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Clamp a sample to the audio range `[-1, 1]`.
#[inline]
pub fn clamp_audio(sample: f64) -> f64 {
    sample.clamp(-1.0, 1.0)
}

/// Clamp a sample to the control range `[0, 1]`.
#[inline]
pub fn clamp_control(sample: f64) -> f64 {
    sample.clamp(0.0, 1.0)
}

/// Tick an optional input, treating a missing connection as silence.
#[inline]
pub(crate) fn tick_or_silence(input: &mut Option<Box<dyn AudioModule>>) -> f64 {
    input.as_mut().map_or(0.0, |m| m.tick())
}

/// Outputs a fixed value every sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant(pub f64);

impl AudioModule for Constant {
    fn tick(&mut self) -> f64 {
        self.0
    }
}
