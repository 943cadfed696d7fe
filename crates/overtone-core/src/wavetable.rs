//! Precomputed wavetables for the four oscillator shapes
//!
//! One read-only table per waveform, all of length [`TABLE_SIZE`], filled
//! from closed-form formulae on first use and shared as `&'static` by both
//! threads without synchronization. The length is a power of two so that a
//! `u16` phase accumulator indexes the table with natural wraparound.

use std::fmt;
use std::sync::OnceLock;

/// Table length. Must stay in lockstep with the 16-bit phase accumulator:
/// `u16` overflow is the modulo operation.
pub const TABLE_SIZE: usize = 1 << 16;

/// The available oscillator shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Saw,
}

impl Waveform {
    /// All waveforms in display order
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Saw,
    ];

    /// Get the name of this waveform
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "Sine",
            Waveform::Square => "Square",
            Waveform::Triangle => "Triangle",
            Waveform::Saw => "Saw",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The four precomputed tables
pub struct WaveTables {
    sine: Box<[f32]>,
    square: Box<[f32]>,
    triangle: Box<[f32]>,
    saw: Box<[f32]>,
}

static TABLES: OnceLock<WaveTables> = OnceLock::new();

impl WaveTables {
    /// Get the shared tables, computing them on first call.
    ///
    /// Call once during startup, before the audio stream starts, so the
    /// realtime thread never pays for initialization.
    pub fn shared() -> &'static WaveTables {
        TABLES.get_or_init(WaveTables::compute)
    }

    /// Get the table for a waveform
    #[inline]
    pub fn table(&self, waveform: Waveform) -> &[f32] {
        match waveform {
            Waveform::Sine => &self.sine,
            Waveform::Square => &self.square,
            Waveform::Triangle => &self.triangle,
            Waveform::Saw => &self.saw,
        }
    }

    fn compute() -> WaveTables {
        let mut sine = vec![0.0f32; TABLE_SIZE].into_boxed_slice();
        let mut square = vec![0.0f32; TABLE_SIZE].into_boxed_slice();
        let mut triangle = vec![0.0f32; TABLE_SIZE].into_boxed_slice();
        let mut saw = vec![0.0f32; TABLE_SIZE].into_boxed_slice();

        let phase_per_index = std::f64::consts::TAU / TABLE_SIZE as f64;
        let two_over_pi = 2.0 / std::f64::consts::PI;

        for i in 0..TABLE_SIZE {
            let s = (i as f64 * phase_per_index).sin();
            sine[i] = s as f32;
            square[i] = if s >= 0.0 { 0.5 } else { -0.5 };
            triangle[i] = (two_over_pi * s.asin()) as f32;
            saw[i] = (i as f64 / TABLE_SIZE as f64 * 2.0 - 1.0) as f32;
        }

        WaveTables {
            sine,
            square,
            triangle,
            saw,
        }
    }
}
