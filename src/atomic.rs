//! Lock-free parameter cells
//!
//! Every synthesis parameter is written by control threads (sequencer,
//! MIDI, UI) and read once per sample by the render thread. The cells here
//! let both sides touch a value without ever taking a lock.

use core::sync::atomic::{AtomicU64, Ordering};

/// Atomic f64 for lock-free communication between threads
///
/// Uses AtomicU64 internally since there's no native AtomicF64.
/// Suitable for real-time audio thread communication.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// Create a new atomic f64 with the given initial value
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    /// Get the current value
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Set a new value
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Edge delivered from a control thread to the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEdge {
    /// Start (or restart) the attack stage
    Open,
    /// Enter the release stage
    Close,
}

const LEVEL_BIT: u64 = 1;
const NOTE_SHIFT: u32 = 1;
const NOTE_MASK: u64 = 0x7F;
const SEQ_SHIFT: u32 = 8;

/// Note gate shared between control threads and the render thread
///
/// Packs a command sequence number, the held note and the gate level into a
/// single `AtomicU64`:
///
/// ```text
/// seq << 8 | note << 1 | level
/// ```
///
/// Every open/close bumps the sequence, so a retrigger of an already-open
/// gate is still seen as a fresh edge. Because the note lives in the same
/// word, [`EnvelopeGate::close_note`] compares the held note and closes in
/// one step: a release for a note that has just been replaced is dropped.
#[derive(Debug, Default)]
pub struct EnvelopeGate(AtomicU64);

#[inline]
fn pack(seq: u64, note: u8, open: bool) -> u64 {
    (seq << SEQ_SHIFT) | ((note as u64 & NOTE_MASK) << NOTE_SHIFT) | open as u64
}

#[inline]
fn unpack_note(packed: u64) -> u8 {
    ((packed >> NOTE_SHIFT) & NOTE_MASK) as u8
}

impl EnvelopeGate {
    pub fn new() -> Self {
        Self::with_note(0)
    }

    /// Closed gate holding `note`
    pub fn with_note(note: u8) -> Self {
        Self(AtomicU64::new(pack(0, note, false)))
    }

    /// Open the gate for the note already held
    pub fn open(&self) {
        self.update(|note, _| Some((note, true)));
    }

    /// Take the gate for `note` and open it
    pub fn open_note(&self, note: u8) {
        self.update(|_, _| Some((note, true)));
    }

    /// Close the gate regardless of the held note
    pub fn close(&self) {
        self.update(|note, _| Some((note, false)));
    }

    /// Close the gate only if `note` is the held note. Returns whether it closed.
    pub fn close_note(&self, note: u8) -> bool {
        self.update(|held, _| (held == note & NOTE_MASK as u8).then_some((held, false)))
    }

    /// Replace the held note without issuing an edge
    pub fn set_note(&self, note: u8) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
                let seq = packed >> SEQ_SHIFT;
                Some(pack(seq, note, packed & LEVEL_BIT == LEVEL_BIT))
            });
    }

    /// Apply a command as one atomic step. `command` sees the held note and
    /// level and returns the new pair, or `None` to leave the gate untouched.
    fn update(&self, mut command: impl FnMut(u8, bool) -> Option<(u8, bool)>) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
                let (note, open) = command(unpack_note(packed), packed & LEVEL_BIT == LEVEL_BIT)?;
                let seq = (packed >> SEQ_SHIFT).wrapping_add(1);
                Some(pack(seq, note, open))
            })
            .is_ok()
    }

    /// Whether the most recent command opened the gate
    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire) & LEVEL_BIT == LEVEL_BIT
    }

    /// Note that currently owns the gate
    pub fn note(&self) -> u8 {
        unpack_note(self.0.load(Ordering::Acquire))
    }

    /// Current command sequence number
    pub fn sequence(&self) -> u64 {
        self.0.load(Ordering::Acquire) >> SEQ_SHIFT
    }

    /// Return the latest edge if one arrived since `seen`, updating `seen`.
    ///
    /// Commands issued between two polls collapse to the last one.
    pub fn poll(&self, seen: &mut u64) -> Option<GateEdge> {
        let packed = self.0.load(Ordering::Acquire);
        let seq = packed >> SEQ_SHIFT;
        if seq == *seen {
            return None;
        }
        *seen = seq;
        Some(if packed & LEVEL_BIT == LEVEL_BIT {
            GateEdge::Open
        } else {
            GateEdge::Close
        })
    }
}
