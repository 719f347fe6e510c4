//! Step Sequencer
//!
//! A 16-step pattern of `(gate, scale degree)` pairs played on a sixteenth-note
//! clock. On each step the sequencer:
//!
//! 1. releases the note left over from the previous step, so adjacent steps
//!    never overlap
//! 2. decides the gate (pattern value, or a coin flip with random rhythm)
//! 3. picks a note (pattern degree through the scale, or a random degree in
//!    a random octave -1..=1 with random notes) and sends note-on
//! 4. advances to `(step + 1) mod active_steps`
//!
//! All pattern and transport state lives in atomics so a control surface can
//! edit it while the clock thread is running.

use crate::atomic::AtomicF64;
use crate::config::SequencerConfig;
use crate::engine::NoteTarget;
use crate::error::{Error, Result};
use crate::runtime::StopToken;
use crate::scale::Scale;
use core::sync::atomic::{AtomicBool, AtomicI16, AtomicI8, AtomicU8, AtomicUsize, Ordering};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Pattern length
pub const MAX_STEPS: usize = 16;

/// Clock poll interval while the transport is stopped
pub const IDLE_POLL: Duration = Duration::from_millis(50);

/// Slowest accepted tempo
pub const MIN_BPM: f64 = 1.0;
/// Fastest accepted tempo
pub const MAX_BPM: f64 = 1000.0;

const NO_NOTE: i16 = -1;

/// Clamp a tempo into `MIN_BPM..=MAX_BPM`. Non-finite or non-positive
/// values are rejected.
pub fn clamp_bpm(bpm: f64) -> Option<f64> {
    (bpm.is_finite() && bpm > 0.0).then(|| bpm.clamp(MIN_BPM, MAX_BPM))
}

/// Step duration for `bpm`: one sixteenth note, `60 / (bpm · 4)` seconds.
///
/// The tempo is clamped first, so any input gives a finite period.
pub fn step_period(bpm: f64) -> Duration {
    let bpm = clamp_bpm(bpm).unwrap_or(MIN_BPM);
    Duration::from_secs_f64(60.0 / (bpm * 4.0))
}

#[derive(Debug)]
struct Step {
    gate: AtomicBool,
    degree: AtomicI8,
}

#[derive(Debug)]
struct SequencerState {
    steps: [Step; MAX_STEPS],
    current_step: AtomicUsize,
    last_note: AtomicI16,
    bpm: AtomicF64,
    step_count: AtomicUsize,
    root: AtomicU8,
    scale: AtomicU8,
    random_notes: AtomicBool,
    random_rhythm: AtomicBool,
    velocity: AtomicU8,
    running: AtomicBool,
}

/// Sequencer control handle.
///
/// Cloning shares the same pattern and transport. `T` receives the notes.
#[derive(Debug)]
pub struct Sequencer<T> {
    state: Arc<SequencerState>,
    target: T,
}

impl<T: Clone> Clone for Sequencer<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            target: self.target.clone(),
        }
    }
}

impl<T: NoteTarget> Sequencer<T> {
    /// Create a stopped sequencer with the default pattern: a gate on every
    /// even step, degrees climbing the scale.
    pub fn new(target: T, config: &SequencerConfig) -> Self {
        let degrees = config.scale.degree_count();
        let steps = core::array::from_fn(|i| Step {
            gate: AtomicBool::new(i % 2 == 0),
            degree: AtomicI8::new((i % degrees) as i8),
        });

        Self {
            state: Arc::new(SequencerState {
                steps,
                current_step: AtomicUsize::new(0),
                last_note: AtomicI16::new(NO_NOTE),
                bpm: AtomicF64::new(
                    clamp_bpm(config.bpm).unwrap_or(SequencerConfig::default().bpm),
                ),
                step_count: AtomicUsize::new(config.steps.clamp(1, MAX_STEPS)),
                root: AtomicU8::new(config.root.min(127)),
                scale: AtomicU8::new(config.scale.to_u8()),
                random_notes: AtomicBool::new(config.random_notes),
                random_rhythm: AtomicBool::new(config.random_rhythm),
                velocity: AtomicU8::new(config.velocity.min(127)),
                running: AtomicBool::new(false),
            }),
            target,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn start(&self) {
        self.state.running.store(true, Ordering::SeqCst);
        debug!("sequencer started");
    }

    /// Stop the transport and release any note still sounding
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        self.flush();
        debug!("sequencer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Send note-off for the last played note, if any
    pub fn flush(&self) {
        if let Some(note) = self.take_last_note() {
            self.target.note_off(note);
        }
    }

    fn take_last_note(&self) -> Option<u8> {
        match self.state.last_note.swap(NO_NOTE, Ordering::SeqCst) {
            NO_NOTE => None,
            note => Some(note as u8),
        }
    }

    /// Note sounding from the previous step
    pub fn last_note(&self) -> Option<u8> {
        match self.state.last_note.load(Ordering::Acquire) {
            NO_NOTE => None,
            note => Some(note as u8),
        }
    }

    pub fn bpm(&self) -> f64 {
        self.state.bpm.get()
    }

    /// Set tempo, clamped to `MIN_BPM..=MAX_BPM`. Non-finite or
    /// non-positive values are ignored.
    pub fn set_bpm(&self, bpm: f64) {
        if let Some(bpm) = clamp_bpm(bpm) {
            self.state.bpm.set(bpm);
        }
    }

    pub fn step_period(&self) -> Duration {
        step_period(self.bpm())
    }

    pub fn step_count(&self) -> usize {
        self.state.step_count.load(Ordering::Relaxed)
    }

    /// Set the active step count, clamped to `1..=16`
    pub fn set_step_count(&self, count: usize) {
        self.state
            .step_count
            .store(count.clamp(1, MAX_STEPS), Ordering::Relaxed);
    }

    pub fn current_step(&self) -> usize {
        self.state.current_step.load(Ordering::Relaxed)
    }

    pub fn root(&self) -> u8 {
        self.state.root.load(Ordering::Relaxed)
    }

    pub fn set_root(&self, root: u8) {
        self.state.root.store(root.min(127), Ordering::Relaxed);
    }

    pub fn scale(&self) -> Scale {
        Scale::from_u8(self.state.scale.load(Ordering::Relaxed))
    }

    pub fn set_scale(&self, scale: Scale) {
        self.state.scale.store(scale.to_u8(), Ordering::Relaxed);
    }

    pub fn random_notes(&self) -> bool {
        self.state.random_notes.load(Ordering::Relaxed)
    }

    pub fn set_random_notes(&self, enabled: bool) {
        self.state.random_notes.store(enabled, Ordering::Relaxed);
    }

    pub fn random_rhythm(&self) -> bool {
        self.state.random_rhythm.load(Ordering::Relaxed)
    }

    pub fn set_random_rhythm(&self, enabled: bool) {
        self.state.random_rhythm.store(enabled, Ordering::Relaxed);
    }

    pub fn velocity(&self) -> u8 {
        self.state.velocity.load(Ordering::Relaxed)
    }

    /// Read a step's `(gate, degree)`
    pub fn step(&self, index: usize) -> Option<(bool, i8)> {
        self.state.steps.get(index).map(|step| {
            (
                step.gate.load(Ordering::Relaxed),
                step.degree.load(Ordering::Relaxed),
            )
        })
    }

    pub fn set_step(&self, index: usize, gate: bool, degree: i8) -> Result<()> {
        let step = self.state.steps.get(index).ok_or_else(|| {
            Error::InvalidConfig(format!("step index {index} out of range 0-{}", MAX_STEPS - 1))
        })?;
        step.gate.store(gate, Ordering::Relaxed);
        step.degree.store(degree, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_gate(&self, index: usize, gate: bool) {
        if let Some(step) = self.state.steps.get(index) {
            step.gate.store(gate, Ordering::Relaxed);
        }
    }

    pub fn set_degree(&self, index: usize, degree: i8) {
        if let Some(step) = self.state.steps.get(index) {
            step.degree.store(degree, Ordering::Relaxed);
        }
    }

    /// Jump the playhead (wrapped into the pattern)
    pub fn set_current_step(&self, index: usize) {
        self.state
            .current_step
            .store(index % MAX_STEPS, Ordering::Relaxed);
    }

    fn random_note<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        let scale = self.scale();
        let intervals = scale.intervals();
        let interval = intervals[rng.gen_range(0..intervals.len())];
        let octave = rng.gen_range(-1..=1);
        self.root() as i32 + interval + 12 * octave
    }

    /// Play the current step and advance. Returns the note started, if any.
    pub fn process_step<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u8> {
        self.flush();

        let index = self.current_step();
        let (gate, degree) = self.step(index).unwrap_or((false, 0));

        let gate_on = if self.random_rhythm() {
            rng.gen_bool(0.5)
        } else {
            gate
        };

        let played = if gate_on {
            let note = if self.random_notes() {
                self.random_note(rng)
            } else {
                self.scale().note_for_degree(self.root(), degree as i32)
            };
            let note = note.clamp(0, 127) as u8;
            self.target.note_on(note, self.velocity());
            self.state.last_note.store(note as i16, Ordering::SeqCst);
            Some(note)
        } else {
            None
        };

        self.state
            .current_step
            .store((index + 1) % self.step_count(), Ordering::Relaxed);

        played
    }

    /// Clock loop: play steps while running, idle-poll while stopped, and
    /// release any held note before returning on cancellation.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R, token: &StopToken) {
        debug!("sequencer clock started");
        while !token.is_cancelled() {
            if self.is_running() {
                self.process_step(rng);
                // A stop() that raced this step found nothing to release
                if !self.is_running() {
                    self.flush();
                }
                token.wait(self.step_period());
            } else {
                self.flush();
                token.wait(IDLE_POLL);
            }
        }
        self.flush();
        debug!("sequencer clock stopped");
    }
}

impl<T> Sequencer<T>
where
    T: NoteTarget + Clone + 'static,
{
    /// Run the clock loop on its own thread
    pub fn spawn(&self, token: StopToken) -> Result<JoinHandle<()>> {
        let sequencer = self.clone();
        thread::Builder::new()
            .name("monosynth-sequencer".into())
            .spawn(move || {
                let mut rng = SmallRng::from_entropy();
                sequencer.run(&mut rng, &token);
            })
            .map_err(|source| Error::Spawn {
                name: "sequencer",
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        On(u8),
        Off(u8),
    }

    #[derive(Debug, Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.lock().clone()
        }

        fn clear(&self) {
            self.0.lock().clear();
        }
    }

    impl NoteTarget for Recorder {
        fn note_on(&self, note: u8, _velocity: u8) {
            self.0.lock().push(Event::On(note));
        }

        fn note_off(&self, note: u8) {
            self.0.lock().push(Event::Off(note));
        }
    }

    fn sequencer() -> (Sequencer<Recorder>, Recorder) {
        let recorder = Recorder::default();
        let seq = Sequencer::new(recorder.clone(), &SequencerConfig::default());
        (seq, recorder)
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_default_pattern() {
        let (seq, _) = sequencer();
        for i in 0..MAX_STEPS {
            let (gate, degree) = seq.step(i).unwrap();
            assert_eq!(gate, i % 2 == 0);
            assert_eq!(degree as usize, i % 7);
        }
        assert_eq!(seq.step(MAX_STEPS), None);
    }

    #[test]
    fn test_step_period() {
        assert_eq!(step_period(120.0), Duration::from_millis(125));
        assert_eq!(step_period(60.0), Duration::from_millis(250));
    }

    #[test]
    fn test_plays_pattern_in_order() {
        let (seq, rec) = sequencer();
        let mut rng = rng();

        assert_eq!(seq.process_step(&mut rng), Some(60));
        assert_eq!(seq.current_step(), 1);
        assert_eq!(seq.process_step(&mut rng), None);
        assert_eq!(seq.process_step(&mut rng), Some(64));

        assert_eq!(rec.events(), vec![Event::On(60), Event::Off(60), Event::On(64)]);
    }

    #[test]
    fn test_previous_note_released_before_next() {
        let (seq, rec) = sequencer();
        for i in 0..MAX_STEPS {
            seq.set_gate(i, true);
        }
        let mut rng = rng();
        seq.process_step(&mut rng);
        seq.process_step(&mut rng);

        assert_eq!(rec.events(), vec![Event::On(60), Event::Off(60), Event::On(62)]);
        assert_eq!(seq.last_note(), Some(62));
    }

    #[test]
    fn test_negative_and_octave_degrees() {
        let (seq, _) = sequencer();
        seq.set_step(0, true, -1).unwrap();
        seq.set_step(1, true, 7).unwrap();
        let mut rng = rng();

        assert_eq!(seq.process_step(&mut rng), Some(60 + 11 - 12));
        assert_eq!(seq.process_step(&mut rng), Some(72));
    }

    #[test]
    fn test_step_count_wraps() {
        let (seq, _) = sequencer();
        seq.set_step_count(3);
        let mut rng = rng();
        for _ in 0..3 {
            seq.process_step(&mut rng);
        }
        assert_eq!(seq.current_step(), 0);

        seq.set_step_count(0);
        assert_eq!(seq.step_count(), 1);
        seq.set_step_count(99);
        assert_eq!(seq.step_count(), MAX_STEPS);
    }

    #[test]
    fn test_scale_and_root_changes_apply() {
        let (seq, _) = sequencer();
        seq.set_root(48);
        seq.set_scale(Scale::PentatonicMinor);
        seq.set_step(0, true, 5).unwrap();
        assert_eq!(seq.process_step(&mut rng()), Some(60));
    }

    #[test]
    fn test_notes_clamped_to_midi_range() {
        let (seq, _) = sequencer();
        seq.set_root(120);
        seq.set_step(0, true, 14).unwrap();
        assert_eq!(seq.process_step(&mut rng()), Some(127));
    }

    #[test]
    fn test_random_notes_stay_in_scale() {
        let (seq, _) = sequencer();
        seq.set_random_notes(true);
        for i in 0..MAX_STEPS {
            seq.set_gate(i, true);
        }
        let mut rng = rng();
        for _ in 0..200 {
            let note = seq.process_step(&mut rng).unwrap() as i32;
            let offset = note - 60;
            assert!((-12..24).contains(&offset));
            assert!(Scale::Major.intervals().contains(&offset.rem_euclid(12)));
        }
    }

    #[test]
    fn test_random_rhythm_mixes_gates() {
        let (seq, _) = sequencer();
        seq.set_random_rhythm(true);
        let mut rng = rng();
        let played = (0..200)
            .filter(|_| seq.process_step(&mut rng).is_some())
            .count();
        assert!(played > 50 && played < 150, "played {played}");
    }

    #[test]
    fn test_stop_flushes_held_note() {
        let (seq, rec) = sequencer();
        seq.start();
        seq.process_step(&mut rng());
        rec.clear();

        seq.stop();
        assert!(!seq.is_running());
        assert_eq!(rec.events(), vec![Event::Off(60)]);
        assert_eq!(seq.last_note(), None);

        seq.stop();
        assert_eq!(rec.events(), vec![Event::Off(60)]);
    }

    #[test]
    fn test_set_step_out_of_range() {
        let (seq, _) = sequencer();
        assert!(seq.set_step(MAX_STEPS, true, 0).is_err());
    }

    #[test]
    fn test_bpm_ignores_invalid() {
        let (seq, _) = sequencer();
        seq.set_bpm(0.0);
        seq.set_bpm(-10.0);
        seq.set_bpm(f64::NAN);
        assert_eq!(seq.bpm(), 120.0);
        seq.set_bpm(150.0);
        assert_eq!(seq.step_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_bpm_clamped_to_range() {
        let (seq, _) = sequencer();
        seq.set_bpm(1e-20);
        assert_eq!(seq.bpm(), MIN_BPM);
        assert_eq!(seq.step_period(), Duration::from_secs(15));

        seq.set_bpm(1e9);
        assert_eq!(seq.bpm(), MAX_BPM);
        assert_eq!(seq.step_period(), Duration::from_millis(15));

        assert_eq!(step_period(1e-20), Duration::from_secs(15));
        assert_eq!(step_period(0.0), Duration::from_secs(15));
        assert_eq!(step_period(f64::NAN), Duration::from_secs(15));
    }

    #[test]
    fn test_new_sanitizes_bpm() {
        let config = SequencerConfig {
            bpm: f64::NAN,
            ..SequencerConfig::default()
        };
        let seq = Sequencer::new(Recorder::default(), &config);
        assert_eq!(seq.bpm(), 120.0);

        let config = SequencerConfig {
            bpm: 1e-300,
            ..SequencerConfig::default()
        };
        let seq = Sequencer::new(Recorder::default(), &config);
        assert_eq!(seq.bpm(), MIN_BPM);
    }

    #[derive(Debug, Clone, Default)]
    struct SlowTarget(Recorder);

    impl NoteTarget for SlowTarget {
        fn note_on(&self, note: u8, velocity: u8) {
            thread::sleep(Duration::from_millis(60));
            self.0.note_on(note, velocity);
        }

        fn note_off(&self, note: u8) {
            self.0.note_off(note);
        }
    }

    #[test]
    fn test_stop_during_step_leaves_no_stuck_note() {
        let target = SlowTarget::default();
        let config = SequencerConfig {
            bpm: 30.0,
            ..SequencerConfig::default()
        };
        let seq = Sequencer::new(target.clone(), &config);
        seq.start();

        let token = StopToken::new();
        let handle = seq.spawn(token.clone()).unwrap();

        // Lands while the first note-on is still in flight
        thread::sleep(Duration::from_millis(20));
        seq.stop();
        thread::sleep(Duration::from_millis(300));

        assert_eq!(target.0.events(), vec![Event::On(60), Event::Off(60)]);
        assert_eq!(seq.last_note(), None);

        token.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn test_stopped_clock_emits_nothing() {
        let (seq, rec) = sequencer();
        let token = StopToken::new();
        let handle = seq.spawn(token.clone()).unwrap();

        thread::sleep(Duration::from_millis(120));
        token.cancel();
        handle.join().unwrap();

        assert!(rec.events().is_empty());
    }

    #[test]
    fn test_cancel_flushes_and_exits() {
        let (seq, rec) = sequencer();
        seq.set_bpm(MAX_BPM);
        for i in 0..MAX_STEPS {
            seq.set_gate(i, true);
        }
        seq.start();

        let token = StopToken::new();
        let handle = seq.spawn(token.clone()).unwrap();
        thread::sleep(Duration::from_millis(100));
        token.cancel();
        handle.join().unwrap();

        let events = rec.events();
        assert!(events.len() >= 2);
        // Every note-on is matched by a note-off, the last one included
        let ons = events.iter().filter(|e| matches!(e, Event::On(_))).count();
        let offs = events.iter().filter(|e| matches!(e, Event::Off(_))).count();
        assert_eq!(ons, offs);
        assert!(matches!(events.last(), Some(Event::Off(_))));
        assert_eq!(seq.last_note(), None);
    }
}
