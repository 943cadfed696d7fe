//! A single oscillator voice
//!
//! An oscillator, while sounding, walks a wavetable with a 16-bit phase
//! accumulator and reports a per-sample (phase, volume, pan gain) tuple to
//! the generator. It is a small state machine plus four faders; all of its
//! operations are called only on the realtime thread, once per sample or in
//! response to a dispatched request.

use crate::engine::fader::{Fader, DEFAULT_FADE_LENGTH};
use crate::types::SAMPLE_RATE;
use crate::wavetable::{Waveform, TABLE_SIZE};

/// Fade lengths per parameter kind, in samples. Tuning constants; 256 is
/// inaudible as a ramp but removes clicks on every parameter jump.
pub const VOLUME_FADE_LENGTH: u16 = DEFAULT_FADE_LENGTH;
pub const PHASE_STEP_FADE_LENGTH: u16 = DEFAULT_FADE_LENGTH;
pub const PAN_FADE_LENGTH: u16 = DEFAULT_FADE_LENGTH;

/// Convert a frequency to the per-sample phase increment.
///
/// One full table walk per cycle: `step = round(hz * N / sample_rate)`.
#[inline]
pub fn hz_to_phase_step(hz: f32) -> u16 {
    (f64::from(hz) * TABLE_SIZE as f64 / f64::from(SAMPLE_RATE)).round() as u16
}

/// Decompose a pan position in [-1, 1] into (left, right) channel gains.
///
/// Linear panning: the near channel stays at unity, the far channel is
/// attenuated. Center keeps both at 1.
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let left = if pan > 0.0 { 1.0 - pan } else { 1.0 };
    let right = if pan < 0.0 { 1.0 + pan } else { 1.0 };
    (left.clamp(0.0, 1.0), right.clamp(0.0, 1.0))
}

/// User-facing parameters of one voice
///
/// Plain `Copy` data: this struct travels by value through the request and
/// response queues and is what the control-side mirror stores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorSettings {
    pub waveform: Waveform,
    /// Hz
    pub frequency: f32,
    /// Linear gain in [0, 1]
    pub volume: f32,
    /// -1 = full left, 0 = center, +1 = full right
    pub pan: f32,
}

impl OscillatorSettings {
    pub fn new(waveform: Waveform, frequency: f32, volume: f32) -> Self {
        debug_assert!((0.0..=1.0).contains(&volume));
        Self {
            waveform,
            frequency,
            volume,
            pan: 0.0,
        }
    }
}

impl Default for OscillatorSettings {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: 0.0,
            volume: 0.0,
            pan: 0.0,
        }
    }
}

/// Voice lifecycle state
///
/// `Uninitialized` and `Deactivated` are silent and skipped by the mix
/// loop; everything else is sounding. The fading states resolve when the
/// volume fader completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Empty slot, reusable by the bank
    #[default]
    Uninitialized,
    Active,
    /// Muted but still owns its slot and settings
    Deactivated,
    FadingIn,
    FadingOutToDeactivated,
    FadingOutToUninitialized,
}

/// A single voice: wavetable selector, phase accumulator, and four faders
#[derive(Debug, Clone)]
pub struct Oscillator {
    settings: OscillatorSettings,
    state: VoiceState,

    // Wraps at u16::MAX back to 0, which is exactly a table revolution.
    phase_counter: u16,
    phase_step: u16,

    volume_fader: Fader,
    // Faded in f32 and rounded per sample; a step jump on a sustained tone
    // is audible as a click.
    phase_step_fader: Fader,
    left_gain_fader: Fader,
    right_gain_fader: Fader,
}

impl Oscillator {
    pub fn new(settings: OscillatorSettings) -> Self {
        let phase_step = hz_to_phase_step(settings.frequency);
        let (left_gain, right_gain) = pan_gains(settings.pan);
        Self {
            settings,
            state: VoiceState::Uninitialized,
            // Back up one step so the first advance lands on phase 0.
            phase_counter: 0u16.wrapping_sub(phase_step),
            phase_step,
            volume_fader: Fader::with_length(settings.volume, VOLUME_FADE_LENGTH),
            phase_step_fader: Fader::with_length(f32::from(phase_step), PHASE_STEP_FADE_LENGTH),
            left_gain_fader: Fader::with_length(left_gain, PAN_FADE_LENGTH),
            right_gain_fader: Fader::with_length(right_gain, PAN_FADE_LENGTH),
        }
    }

    /// One-sample step: returns (phase, volume, left gain, right gain).
    ///
    /// Drives all four faders and resolves any volume-fade completion into
    /// the state transition it was armed for.
    #[inline]
    pub fn advance_sample(&mut self) -> (u16, f32, f32, f32) {
        self.phase_step = self.phase_step_fader.update().round() as u16;
        self.phase_counter = self.phase_counter.wrapping_add(self.phase_step);

        let volume = self.volume_fader.update();
        self.settings.volume = volume;
        if self.volume_fader.just_completed() {
            self.on_volume_fade_end();
        }

        let left_gain = self.left_gain_fader.update();
        let right_gain = self.right_gain_fader.update();

        (self.phase_counter, volume, left_gain, right_gain)
    }

    fn on_volume_fade_end(&mut self) {
        match self.state {
            VoiceState::FadingIn => self.state = VoiceState::Active,
            VoiceState::FadingOutToDeactivated => self.state = VoiceState::Deactivated,
            VoiceState::FadingOutToUninitialized => self.reset(),
            _ => {}
        }
    }

    /// Fade in from silence toward `volume`
    pub fn activate(&mut self, volume: f32) {
        self.begin_volume_fade(0.0, volume, VoiceState::FadingIn);
    }

    /// Fade out to silence. With `remove` the voice resets to
    /// `Uninitialized` when the fade completes, freeing its slot;
    /// otherwise it parks in `Deactivated`.
    pub fn deactivate(&mut self, remove: bool) {
        let target_state = if remove {
            VoiceState::FadingOutToUninitialized
        } else {
            VoiceState::FadingOutToDeactivated
        };
        self.begin_volume_fade(self.volume_fader.value(), 0.0, target_state);
    }

    /// Glide the phase step toward the new frequency
    pub fn set_frequency(&mut self, frequency: f32) {
        self.phase_step_fader.fade(
            self.phase_step_fader.value(),
            f32::from(hz_to_phase_step(frequency)),
        );
        self.settings.frequency = frequency;
    }

    /// Fade toward a new volume. On a silent voice this only stores the
    /// value, so the next activation fades in to the updated target.
    pub fn set_volume(&mut self, volume: f32) {
        if self.is_sounding() {
            self.begin_volume_fade(self.volume_fader.value(), volume, VoiceState::Active);
        } else {
            self.settings.volume = volume;
        }
    }

    /// Fade both channel gains toward the decomposition of `pan`
    pub fn set_pan(&mut self, pan: f32) {
        let (left_gain, right_gain) = pan_gains(pan);
        self.left_gain_fader.fade(self.left_gain_fader.value(), left_gain);
        self.right_gain_fader
            .fade(self.right_gain_fader.value(), right_gain);
        self.settings.pan = pan;
    }

    /// Switch the wavetable immediately (no crossfade)
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.settings.waveform = waveform;
    }

    fn begin_volume_fade(&mut self, from: f32, to: f32, state: VoiceState) {
        self.state = state;
        self.volume_fader.fade(from, to);
        self.settings.volume = from;
    }

    fn reset(&mut self) {
        *self = Oscillator::default();
    }

    #[inline]
    pub fn state(&self) -> VoiceState {
        self.state
    }

    #[inline]
    pub fn settings(&self) -> OscillatorSettings {
        self.settings
    }

    #[inline]
    pub fn waveform(&self) -> Waveform {
        self.settings.waveform
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state != VoiceState::Uninitialized
    }

    /// True while the voice contributes to the mix
    #[inline]
    pub fn is_sounding(&self) -> bool {
        matches!(
            self.state,
            VoiceState::Active
                | VoiceState::FadingIn
                | VoiceState::FadingOutToDeactivated
                | VoiceState::FadingOutToUninitialized
        )
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(OscillatorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sounding_voice(frequency: f32, volume: f32) -> Oscillator {
        let mut osc = Oscillator::new(OscillatorSettings::new(Waveform::Sine, frequency, volume));
        osc.activate(volume);
        osc
    }

    fn settle(osc: &mut Oscillator) {
        for _ in 0..=u32::from(VOLUME_FADE_LENGTH) {
            osc.advance_sample();
        }
    }

    #[test]
    fn test_pan_gain_decomposition() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(-1.0), (1.0, 0.0));
        assert_eq!(pan_gains(1.0), (0.0, 1.0));
        assert_eq!(pan_gains(0.5), (0.5, 1.0));
        assert_eq!(pan_gains(-0.25), (1.0, 0.75));
    }

    #[test]
    fn test_pan_power_bounds() {
        // Linear panning: l^2 + r^2 lies in [1, 2] across the whole range
        let mut pan = -1.0f32;
        while pan <= 1.0 {
            let (l, r) = pan_gains(pan);
            let power = l * l + r * r;
            assert!(
                (1.0..=2.0).contains(&power),
                "pan {}: power {}",
                pan,
                power
            );
            pan += 0.05;
        }
    }

    #[test]
    fn test_phase_step_conversion() {
        assert_eq!(hz_to_phase_step(0.0), 0);
        // 440 Hz at 44.1 kHz: 440 * 65536 / 44100 = 653.9... -> 654
        assert_eq!(hz_to_phase_step(440.0), 654);
    }

    #[test]
    fn test_first_advance_starts_at_phase_zero() {
        let mut osc = sounding_voice(440.0, 0.5);
        let (phase, _, _, _) = osc.advance_sample();
        assert_eq!(phase, 0);
    }

    #[test]
    fn test_phase_is_periodic() {
        // With constant step s, phase returns to 0 after N / gcd(N, s) samples
        fn gcd(a: u64, b: u64) -> u64 {
            if b == 0 {
                a
            } else {
                gcd(b, a % b)
            }
        }

        for step in [654u16, 1024, 7, 65535] {
            let mut osc = sounding_voice(0.0, 0.5);
            // Pin the step directly so no fade is in flight
            osc.phase_step_fader = Fader::with_length(f32::from(step), PHASE_STEP_FADE_LENGTH);
            osc.phase_counter = 0u16.wrapping_sub(step);

            let period = TABLE_SIZE as u64 / gcd(TABLE_SIZE as u64, u64::from(step));
            let (first, _, _, _) = osc.advance_sample();
            assert_eq!(first, 0);
            for _ in 1..period {
                osc.advance_sample();
            }
            let (phase, _, _, _) = osc.advance_sample();
            assert_eq!(phase, 0, "step {} period {}", step, period);
        }
    }

    #[test]
    fn test_fade_in_reaches_active() {
        let mut osc = sounding_voice(440.0, 0.8);
        assert_eq!(osc.state(), VoiceState::FadingIn);

        settle(&mut osc);
        assert_eq!(osc.state(), VoiceState::Active);
        assert!((osc.settings().volume - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_deactivate_parks_in_deactivated() {
        let mut osc = sounding_voice(440.0, 0.8);
        settle(&mut osc);

        osc.deactivate(false);
        assert_eq!(osc.state(), VoiceState::FadingOutToDeactivated);
        settle(&mut osc);
        assert_eq!(osc.state(), VoiceState::Deactivated);
        assert!(!osc.is_sounding());
        assert!(osc.is_initialized());
    }

    #[test]
    fn test_remove_resets_to_uninitialized() {
        let mut osc = sounding_voice(440.0, 0.8);
        settle(&mut osc);

        osc.deactivate(true);
        assert_eq!(osc.state(), VoiceState::FadingOutToUninitialized);
        settle(&mut osc);
        assert_eq!(osc.state(), VoiceState::Uninitialized);
        assert_eq!(osc.settings(), OscillatorSettings::default());
    }

    #[test]
    fn test_reactivation_from_deactivated() {
        let mut osc = sounding_voice(440.0, 0.8);
        settle(&mut osc);
        osc.deactivate(false);
        settle(&mut osc);

        osc.activate(0.4);
        assert_eq!(osc.state(), VoiceState::FadingIn);
        settle(&mut osc);
        assert_eq!(osc.state(), VoiceState::Active);
        assert!((osc.settings().volume - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_fade_out_envelope_is_monotone() {
        let mut osc = sounding_voice(440.0, 0.8);
        settle(&mut osc);

        osc.deactivate(true);
        let mut previous = f32::INFINITY;
        for _ in 0..u32::from(VOLUME_FADE_LENGTH) {
            let (_, volume, _, _) = osc.advance_sample();
            assert!(volume <= previous);
            previous = volume;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn test_set_volume_on_silent_voice_stores_without_fading() {
        let mut osc = Oscillator::new(OscillatorSettings::new(Waveform::Sine, 440.0, 0.5));
        osc.set_volume(0.9);
        assert_eq!(osc.settings().volume, 0.9);
        assert_eq!(osc.state(), VoiceState::Uninitialized);

        // The next activation fades in toward a caller-supplied target;
        // the stored value is what the control surface reads back.
        osc.activate(osc.settings().volume);
        settle(&mut osc);
        assert!((osc.settings().volume - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_set_volume_while_sounding_fades() {
        let mut osc = sounding_voice(440.0, 0.8);
        settle(&mut osc);

        osc.set_volume(0.2);
        assert_eq!(osc.state(), VoiceState::Active);
        let (_, volume, _, _) = osc.advance_sample();
        assert!(volume < 0.8 && volume > 0.2);
        settle(&mut osc);
        assert!((osc.settings().volume - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_set_volume_settles_identically() {
        let mut once = sounding_voice(440.0, 0.8);
        let mut twice = sounding_voice(440.0, 0.8);
        settle(&mut once);
        settle(&mut twice);

        once.set_volume(0.4);
        twice.set_volume(0.4);
        twice.set_volume(0.4);
        settle(&mut once);
        settle(&mut twice);

        assert_eq!(once.settings().volume, twice.settings().volume);
        assert_eq!(once.state(), twice.state());
    }

    #[test]
    fn test_set_pan_fades_gains() {
        let mut osc = sounding_voice(440.0, 0.5);
        settle(&mut osc);

        osc.set_pan(-1.0);
        let (_, _, left_mid, right_mid) = osc.advance_sample();
        assert!(right_mid < 1.0 && right_mid > 0.0);
        assert_eq!(left_mid, 1.0);

        for _ in 0..u32::from(PAN_FADE_LENGTH) {
            osc.advance_sample();
        }
        let (_, _, left, right) = osc.advance_sample();
        assert_eq!(left, 1.0);
        assert_eq!(right, 0.0);
    }

    #[test]
    fn test_set_frequency_glides_phase_step() {
        let mut osc = sounding_voice(440.0, 0.5);
        settle(&mut osc);

        osc.set_frequency(880.0);
        assert_eq!(osc.settings().frequency, 880.0);
        // Mid-glide the step sits between the old and new values
        for _ in 0..u32::from(PHASE_STEP_FADE_LENGTH) / 2 {
            osc.advance_sample();
        }
        let mid = osc.phase_step;
        assert!(mid > hz_to_phase_step(440.0) && mid < hz_to_phase_step(880.0));

        for _ in 0..u32::from(PHASE_STEP_FADE_LENGTH) {
            osc.advance_sample();
        }
        assert_eq!(osc.phase_step, hz_to_phase_step(880.0));
    }

    #[test]
    fn test_set_waveform_is_immediate() {
        let mut osc = sounding_voice(440.0, 0.5);
        osc.set_waveform(Waveform::Saw);
        assert_eq!(osc.waveform(), Waveform::Saw);
    }
}
