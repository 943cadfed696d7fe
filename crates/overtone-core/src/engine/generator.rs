//! Stereo mix loop
//!
//! The generator sums every sounding voice into an output buffer of stereo
//! frames and hard-clips the result. Clipping here is a safety limiter for
//! ears and speakers, not an effect; with sane volumes it never engages.

use crate::engine::bank::OscillatorBank;
use crate::types::StereoSample;
use crate::wavetable::WaveTables;

/// Mixes the oscillator bank into stereo buffers
pub struct Generator {
    bank: OscillatorBank,
    tables: &'static WaveTables,
}

impl Generator {
    pub fn new() -> Self {
        Self {
            bank: OscillatorBank::new(),
            tables: WaveTables::shared(),
        }
    }

    pub fn bank(&self) -> &OscillatorBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut OscillatorBank {
        &mut self.bank
    }

    /// Fill one buffer of output frames.
    ///
    /// Zeroes the buffer, accumulates each sounding voice one full pass at
    /// a time (mix order is irrelevant), then clamps every channel to
    /// [-1, 1]. Runs on the realtime thread: no allocation, no syscalls.
    pub fn write_samples(&mut self, output: &mut [StereoSample]) {
        output.fill(StereoSample::silence());

        for oscillator in self.bank.iter_mut() {
            if !oscillator.is_sounding() {
                continue;
            }

            let table = self.tables.table(oscillator.waveform());
            for frame in output.iter_mut() {
                let (phase, volume, left_gain, right_gain) = oscillator.advance_sample();
                let sample = table[usize::from(phase)] * volume;
                frame.left += sample * left_gain;
                frame.right += sample * right_gain;
            }
        }

        for frame in output.iter_mut() {
            *frame = frame.clamped();
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}
