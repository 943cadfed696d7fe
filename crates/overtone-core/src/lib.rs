//! Overtone Core - Realtime additive synthesis engine
//!
//! A bank of wavetable oscillators mixed into a stereo stream, controlled
//! from a GUI thread over lock-free queues. The audio callback owns the
//! engine exclusively; the UI keeps an eventually-consistent mirror that is
//! updated only by acknowledged responses.

pub mod audio;
pub mod controller;
pub mod engine;
pub mod music;
pub mod recorder;
pub mod types;
pub mod wavetable;

pub use types::*;
