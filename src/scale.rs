//! Scale table
//!
//! Maps a scale to its semitone intervals and translates signed scale
//! degrees to MIDI notes. Degrees wrap with floor division, so `-1` is the
//! top of the scale one octave below the root:
//!
//! ```text
//! index  = degree mod len      (floor)
//! octave = ⌊degree / len⌋
//! note   = root + intervals[index] + 12 · octave
//! ```

use crate::error::Error;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Musical scales available to the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Major,
    MinorNatural,
    Dorian,
    PentatonicMajor,
    PentatonicMinor,
    Chromatic,
}

impl Scale {
    pub const ALL: [Scale; 6] = [
        Scale::Major,
        Scale::MinorNatural,
        Scale::Dorian,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Chromatic,
    ];

    /// Semitone offsets from the root, one per degree within the octave.
    ///
    /// Never empty.
    pub fn intervals(self) -> &'static [i32] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::MinorNatural => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 2, 3, 5, 7],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    /// Number of degrees per octave
    pub fn degree_count(self) -> usize {
        self.intervals().len()
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::MinorNatural => "minor_natural",
            Scale::Dorian => "dorian",
            Scale::PentatonicMajor => "pentatonic_major",
            Scale::PentatonicMinor => "pentatonic_minor",
            Scale::Chromatic => "chromatic",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Scale::Major => 0,
            Scale::MinorNatural => 1,
            Scale::Dorian => 2,
            Scale::PentatonicMajor => 3,
            Scale::PentatonicMinor => 4,
            Scale::Chromatic => 5,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(Scale::Major)
    }

    /// Split a degree into `(interval index, octave)` using floor semantics
    pub fn decompose(self, degree: i32) -> (usize, i32) {
        let len = self.degree_count() as i32;
        (degree.rem_euclid(len) as usize, degree.div_euclid(len))
    }

    /// Semitone offset of `degree` from the root
    pub fn semitones(self, degree: i32) -> i32 {
        let (index, octave) = self.decompose(degree);
        self.intervals()[index] + 12 * octave
    }

    /// MIDI note for `degree` above `root`. May fall outside 0..=127.
    pub fn note_for_degree(self, root: u8, degree: i32) -> i32 {
        root as i32 + self.semitones(degree)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Scale::Major
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scale::ALL
            .into_iter()
            .find(|scale| scale.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownScale(s.to_string()))
    }
}
