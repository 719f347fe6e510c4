//! Two-pole resonant low-pass filter
//!
//! Two cascaded one-pole stages with feedback taken from the second stage's
//! output give a resonant 12 dB/oct response:
//!
//! ```text
//! x   = clamp(in) - feedback · d2
//! d1 += alpha · (x  - d1)
//! d2 += alpha · (d1 - d2)
//! out = clamp(d2)
//! ```
//!
//! `alpha = min(0.49, cutoff / sample_rate)` keeps the poles inside the unit
//! circle at every resonance setting, and `feedback = 2 · (4 · resonance) · alpha`
//! lets the top of the resonance range approach self-oscillation.
//!
//! Coefficients are only recomputed after a cutoff or resonance change: the
//! setters raise a stale flag that the render thread consumes on its next tick.

use crate::atomic::AtomicF64;
use crate::module::{clamp_audio, AudioModule};
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ceiling on normalized cutoff
pub const MAX_NORMALIZED_CUTOFF: f64 = 0.49;

/// Internal resonance gain
pub const RESONANCE_BOOST: f64 = 4.0;

/// Filter parameters shared with control threads
#[derive(Debug)]
pub struct FilterParams {
    cutoff: AtomicF64,
    resonance: AtomicF64,
    stale: AtomicBool,
}

impl FilterParams {
    pub fn new(cutoff: f64, resonance: f64) -> Self {
        Self {
            cutoff: AtomicF64::new(cutoff.max(0.0)),
            resonance: AtomicF64::new(resonance.clamp(0.0, 1.0)),
            stale: AtomicBool::new(true),
        }
    }

    /// Cutoff frequency in Hz
    pub fn cutoff(&self) -> f64 {
        self.cutoff.get()
    }

    /// Set the cutoff in Hz (negative values clamp to 0) and mark coefficients stale
    pub fn set_cutoff(&self, hz: f64) {
        self.cutoff.set(hz.max(0.0));
        self.stale.store(true, Ordering::Release);
    }

    pub fn resonance(&self) -> f64 {
        self.resonance.get()
    }

    /// Set resonance, clamped to `[0, 1]`, and mark coefficients stale
    pub fn set_resonance(&self, resonance: f64) {
        self.resonance.set(resonance.clamp(0.0, 1.0));
        self.stale.store(true, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Clear the stale flag, returning whether it was set
    fn take_stale(&self) -> bool {
        self.stale.swap(false, Ordering::AcqRel)
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::new(10_000.0, 0.0)
    }
}

/// Derived filter coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coefficients {
    pub alpha: f64,
    pub feedback: f64,
}

impl Coefficients {
    pub fn compute(cutoff: f64, resonance: f64, sample_rate: f64) -> Self {
        let g = (cutoff / sample_rate).min(MAX_NORMALIZED_CUTOFF);
        let q = resonance.clamp(0.0, 1.0) * RESONANCE_BOOST;
        Self {
            alpha: g,
            feedback: 2.0 * q * g,
        }
    }
}

/// Resonant low-pass filter
pub struct Filter {
    input: Option<Box<dyn AudioModule>>,
    params: Arc<FilterParams>,
    sample_rate: f64,
    coefficients: Coefficients,
    delay1: f64,
    delay2: f64,
}

impl Filter {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, Arc::new(FilterParams::default()))
    }

    pub fn with_params(sample_rate: f64, params: Arc<FilterParams>) -> Self {
        let mut filter = Self {
            input: None,
            params,
            sample_rate,
            coefficients: Coefficients::default(),
            delay1: 0.0,
            delay2: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    pub fn set_input(&mut self, input: impl AudioModule + 'static) {
        self.input = Some(Box::new(input));
    }

    pub fn params(&self) -> &Arc<FilterParams> {
        &self.params
    }

    /// Coefficients currently in use
    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }

    fn update_coefficients(&mut self) {
        self.params.take_stale();
        self.coefficients = Coefficients::compute(
            self.params.cutoff(),
            self.params.resonance(),
            self.sample_rate,
        );
    }

    /// Run one sample through the two-pole core
    pub fn process(&mut self, input: f64) -> f64 {
        if self.params.is_stale() {
            self.update_coefficients();
        }

        let Coefficients { alpha, feedback } = self.coefficients;
        let x = clamp_audio(input) - feedback * self.delay2;
        self.delay1 += alpha * (x - self.delay1);
        self.delay2 += alpha * (self.delay1 - self.delay2);

        clamp_audio(self.delay2)
    }
}

impl AudioModule for Filter {
    fn tick(&mut self) -> f64 {
        match self.input.as_mut() {
            Some(input) => {
                let sample = input.tick();
                self.process(sample)
            }
            None => 0.0,
        }
    }

    fn reset(&mut self) {
        self.delay1 = 0.0;
        self.delay2 = 0.0;
        if let Some(input) = self.input.as_mut() {
            input.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Constant;
    use crate::oscillator::{Oscillator, OscillatorParams, Waveform};
    use approx::assert_relative_eq;

    const SR: f64 = 44100.0;

    #[test]
    fn test_coefficients() {
        let c = Coefficients::compute(4410.0, 0.5, SR);
        assert_relative_eq!(c.alpha, 0.1, epsilon = 1e-12);
        assert_relative_eq!(c.feedback, 2.0 * 2.0 * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_cutoff_ceiling() {
        let c = Coefficients::compute(40_000.0, 1.0, SR);
        assert_eq!(c.alpha, MAX_NORMALIZED_CUTOFF);
        assert_relative_eq!(c.feedback, 8.0 * MAX_NORMALIZED_CUTOFF, epsilon = 1e-12);
    }

    #[test]
    fn test_resonance_clamped_on_assignment() {
        let params = FilterParams::default();
        params.set_resonance(1.5);
        assert_eq!(params.resonance(), 1.0);
        params.set_resonance(-0.2);
        assert_eq!(params.resonance(), 0.0);
    }

    #[test]
    fn test_coefficients_recomputed_lazily() {
        let mut filter = Filter::new(SR);
        assert!(!filter.params().is_stale());
        let before = filter.coefficients();

        filter.params().set_cutoff(441.0);
        assert!(filter.params().is_stale());
        // Not recomputed until the next sample
        assert_eq!(filter.coefficients(), before);

        filter.process(0.0);
        assert!(!filter.params().is_stale());
        assert_relative_eq!(filter.coefficients().alpha, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_dc_passes_through() {
        let mut filter = Filter::new(SR);
        filter.params().set_cutoff(1000.0);
        filter.set_input(Constant(0.5));
        let mut out = 0.0;
        for _ in 0..20_000 {
            out = filter.tick();
        }
        assert_relative_eq!(out, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_output_bounded_for_all_resonances() {
        for resonance in [0.0, 0.25, 0.5, 0.75, 1.0] {
            for cutoff in [50.0, 1000.0, 10_000.0, 20_000.0, 30_000.0] {
                for waveform in [Waveform::Square, Waveform::Sawtooth, Waveform::Noise] {
                    let osc_params = Arc::new(OscillatorParams::new(waveform));
                    osc_params.set_base_frequency(220.0);
                    let osc = Oscillator::with_params(SR, osc_params).with_seed(3);

                    let mut filter = Filter::with_params(
                        SR,
                        Arc::new(FilterParams::new(cutoff, resonance)),
                    );
                    filter.set_input(osc);

                    for _ in 0..10_000 {
                        let s = filter.tick();
                        assert!(s.is_finite() && (-1.0..=1.0).contains(&s));
                    }
                }
            }
        }
    }

    #[test]
    fn test_input_clamped() {
        let mut filter = Filter::with_params(SR, Arc::new(FilterParams::new(20_000.0, 0.0)));
        filter.set_input(Constant(10.0));
        let mut out = 0.0;
        for _ in 0..1000 {
            out = filter.tick();
        }
        assert!(out <= 1.0);
        assert_relative_eq!(out, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_input_is_silent() {
        let mut filter = Filter::new(SR);
        assert_eq!(filter.tick(), 0.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = Filter::new(SR);
        filter.set_input(Constant(1.0));
        for _ in 0..100 {
            filter.tick();
        }
        filter.reset();
        assert_eq!(filter.process(0.0), 0.0);
    }
}
