//! Attack / Sustain / Release envelope generator
//!
//! ```text
//!            noteOn                 noteOff
//!   IDLE ──────────▶ ATTACK ──(≥1)──▶ SUSTAIN ──────────▶ RELEASE ──(≤0)──▶ IDLE
//!                      ▲                                     │
//!                      └──────────── noteOn ─────────────────┘
//! ```
//!
//! A note-on never resets the level: retriggering during release resumes the
//! attack from the partially decayed value. Sustain forces the level to 1.0
//! every sample.

use crate::atomic::{AtomicF64, EnvelopeGate, GateEdge};
use crate::module::{clamp_control, AudioModule};
use std::sync::Arc;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Sustain,
    Release,
}

/// Per-sample step for a ramp of `time` seconds.
///
/// A zero or negative time degenerates to a full-scale step.
#[inline]
pub fn ramp_increment(time: f64, sample_rate: f64) -> f64 {
    if time > 0.0 {
        1.0 / (time * sample_rate)
    } else {
        1.0
    }
}

/// Envelope parameters and note gate, shared with control threads
#[derive(Debug)]
pub struct EnvelopeParams {
    attack: AtomicF64,
    release: AtomicF64,
    gate: EnvelopeGate,
}

impl EnvelopeParams {
    pub fn new(attack: f64, release: f64) -> Self {
        Self {
            attack: AtomicF64::new(attack),
            release: AtomicF64::new(release),
            gate: EnvelopeGate::new(),
        }
    }

    /// Attack time in seconds
    pub fn attack(&self) -> f64 {
        self.attack.get()
    }

    pub fn set_attack(&self, seconds: f64) {
        self.attack.set(seconds);
    }

    /// Release time in seconds
    pub fn release(&self) -> f64 {
        self.release.get()
    }

    pub fn set_release(&self, seconds: f64) {
        self.release.set(seconds);
    }

    /// Request the attack stage from any thread
    pub fn trigger(&self) {
        self.gate.open();
    }

    /// Request the release stage from any thread
    pub fn release_gate(&self) {
        self.gate.close();
    }

    /// Hand the gate to `note` and request the attack stage
    pub fn trigger_note(&self, note: u8) {
        self.gate.open_note(note);
    }

    /// Request the release stage if `note` still owns the gate
    pub fn release_note(&self, note: u8) -> bool {
        self.gate.close_note(note)
    }

    pub fn gate(&self) -> &EnvelopeGate {
        &self.gate
    }
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self::new(0.01, 0.3)
    }
}

/// Control-range envelope generator
pub struct Envelope {
    params: Arc<EnvelopeParams>,
    sample_rate: f64,
    stage: EnvelopeStage,
    value: f64,
    seen_gate: u64,
}

impl Envelope {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, Arc::new(EnvelopeParams::default()))
    }

    pub fn with_params(sample_rate: f64, params: Arc<EnvelopeParams>) -> Self {
        let seen_gate = params.gate().sequence();
        Self {
            params,
            sample_rate,
            stage: EnvelopeStage::Idle,
            value: 0.0,
            seen_gate,
        }
    }

    pub fn params(&self) -> &Arc<EnvelopeParams> {
        &self.params
    }

    /// Enter attack immediately, keeping the current level
    pub fn note_on(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    /// Enter release immediately from whatever stage is active
    pub fn note_off(&mut self) {
        self.stage = EnvelopeStage::Release;
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn attack_increment(&self) -> f64 {
        ramp_increment(self.params.attack(), self.sample_rate)
    }

    pub fn release_increment(&self) -> f64 {
        ramp_increment(self.params.release(), self.sample_rate)
    }

    fn apply_gate(&mut self) {
        match self.params.gate().poll(&mut self.seen_gate) {
            Some(GateEdge::Open) => self.note_on(),
            Some(GateEdge::Close) => self.note_off(),
            None => {}
        }
    }
}

impl AudioModule for Envelope {
    fn tick(&mut self) -> f64 {
        self.apply_gate();

        match self.stage {
            EnvelopeStage::Idle => {
                self.value = 0.0;
            }
            EnvelopeStage::Attack => {
                self.value += self.attack_increment();
                if self.value >= 1.0 {
                    self.value = 1.0;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.value = 1.0;
            }
            EnvelopeStage::Release => {
                self.value -= self.release_increment();
                if self.value <= 0.0 {
                    self.value = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        clamp_control(self.value)
    }

    fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.value = 0.0;
        self.seen_gate = self.params.gate().sequence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 1000.0;

    fn envelope(attack: f64, release: f64) -> Envelope {
        Envelope::with_params(SR, Arc::new(EnvelopeParams::new(attack, release)))
    }

    #[test]
    fn test_idle_outputs_zero() {
        let mut env = envelope(0.1, 0.1);
        for _ in 0..10 {
            assert_eq!(env.tick(), 0.0);
        }
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_attack_reaches_sustain() {
        let mut env = envelope(0.1, 0.1);
        env.note_on();
        // attack·sr = 100 samples, plus slack for float accumulation
        for _ in 0..101 {
            env.tick();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert_eq!(env.value(), 1.0);
    }

    #[test]
    fn test_release_reaches_idle() {
        let mut env = envelope(0.01, 0.05);
        env.note_on();
        for _ in 0..20 {
            env.tick();
        }
        env.note_off();
        for _ in 0..51 {
            env.tick();
        }
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.value(), 0.0);
    }

    #[test]
    fn test_value_stays_in_range() {
        let mut env = envelope(0.003, 0.007);
        for i in 0..5000 {
            if i % 37 == 0 {
                env.note_on();
            }
            if i % 53 == 0 {
                env.note_off();
            }
            let v = env.tick();
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_retrigger_keeps_level() {
        let mut env = envelope(0.008, 0.008);
        env.note_on();
        for _ in 0..8 {
            env.tick();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        env.note_off();
        for _ in 0..4 {
            env.tick();
        }
        assert_eq!(env.value(), 0.5);
        assert_eq!(env.stage(), EnvelopeStage::Release);

        env.note_on();
        let next = env.tick();
        assert_eq!(next, 0.5 + env.attack_increment());
    }

    #[test]
    fn test_sustain_pins_to_one() {
        let mut env = envelope(0.0, 0.1);
        env.note_on();
        env.tick();
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        env.value = 0.3;
        assert_eq!(env.tick(), 1.0);
    }

    #[test]
    fn test_zero_times_are_instant() {
        let mut env = envelope(0.0, -1.0);
        assert_eq!(env.attack_increment(), 1.0);
        assert_eq!(env.release_increment(), 1.0);

        env.note_on();
        assert_eq!(env.tick(), 1.0);
        env.note_off();
        assert_eq!(env.tick(), 0.0);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_time_change_applies_without_recompute_call() {
        let env = envelope(0.1, 0.1);
        assert_relative_eq!(env.attack_increment(), 0.01);
        env.params().set_attack(0.5);
        assert_relative_eq!(env.attack_increment(), 0.002);
    }

    #[test]
    fn test_gate_from_shared_params() {
        let mut env = envelope(0.0, 0.0);
        let params = Arc::clone(env.params());

        params.trigger();
        assert_eq!(env.tick(), 1.0);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        params.release_gate();
        assert_eq!(env.tick(), 0.0);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_note_off_from_attack() {
        let mut env = envelope(1.0, 1.0);
        env.note_on();
        for _ in 0..10 {
            env.tick();
        }
        env.note_off();
        env.tick();
        assert_eq!(env.stage(), EnvelopeStage::Release);
        assert!(env.value() < 0.01);
    }
}
