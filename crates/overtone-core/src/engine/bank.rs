//! Fixed-capacity oscillator bank
//!
//! The bank is the complete voice state of the engine: an array of
//! [`MAX_OSCILLATORS`] slots whose index doubles as the oscillator id
//! handed to the control surface. Fixed capacity keeps the realtime thread
//! allocation-free; `Uninitialized` slots are reusable.

use crate::engine::oscillator::{Oscillator, OscillatorSettings};
use crate::types::{OscillatorId, MAX_OSCILLATORS};
use crate::wavetable::Waveform;

/// The engine's voices, indexed by [`OscillatorId`]
#[derive(Debug, Default)]
pub struct OscillatorBank {
    slots: [Oscillator; MAX_OSCILLATORS],
}

impl OscillatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a voice in the lowest free slot and fade it in.
    ///
    /// Returns the new id, or `None` when every slot is occupied. A slot
    /// stays occupied until a removal fade-out completes, so an id is never
    /// reissued while its voice is still audible.
    pub fn add(&mut self, settings: OscillatorSettings) -> Option<OscillatorId> {
        let id = self.next_free_id()?;
        let mut oscillator = Oscillator::new(settings);
        oscillator.activate(settings.volume);
        self.slots[usize::from(id)] = oscillator;
        Some(id)
    }

    /// Begin removing a voice: fade out, then reset the slot to
    /// `Uninitialized`. Fails if the slot isn't in use.
    pub fn remove(&mut self, id: OscillatorId) -> bool {
        match self.initialized_mut(id) {
            Some(oscillator) => {
                oscillator.deactivate(true);
                true
            }
            None => false,
        }
    }

    /// Fade an existing voice back in at the given volume
    pub fn activate(&mut self, id: OscillatorId, volume: f32) -> bool {
        match self.initialized_mut(id) {
            Some(oscillator) => {
                oscillator.activate(volume);
                true
            }
            None => false,
        }
    }

    /// Fade a voice out, keeping its slot and settings
    pub fn deactivate(&mut self, id: OscillatorId) -> bool {
        match self.initialized_mut(id) {
            Some(oscillator) => {
                oscillator.deactivate(false);
                true
            }
            None => false,
        }
    }

    pub fn set_frequency(&mut self, id: OscillatorId, frequency: f32) -> bool {
        match self.initialized_mut(id) {
            Some(oscillator) => {
                oscillator.set_frequency(frequency);
                true
            }
            None => false,
        }
    }

    pub fn set_volume(&mut self, id: OscillatorId, volume: f32) -> bool {
        match self.initialized_mut(id) {
            Some(oscillator) => {
                oscillator.set_volume(volume);
                true
            }
            None => false,
        }
    }

    pub fn set_pan(&mut self, id: OscillatorId, pan: f32) -> bool {
        match self.initialized_mut(id) {
            Some(oscillator) => {
                oscillator.set_pan(pan);
                true
            }
            None => false,
        }
    }

    pub fn set_waveform(&mut self, id: OscillatorId, waveform: Waveform) -> bool {
        match self.initialized_mut(id) {
            Some(oscillator) => {
                oscillator.set_waveform(waveform);
                true
            }
            None => false,
        }
    }

    /// Number of voices currently contributing to the mix
    pub fn count_sounding(&self) -> usize {
        self.slots.iter().filter(|o| o.is_sounding()).count()
    }

    pub fn capacity(&self) -> usize {
        MAX_OSCILLATORS
    }

    /// Read access to a slot, in use or not
    pub fn get(&self, id: OscillatorId) -> Option<&Oscillator> {
        self.slots.get(usize::from(id))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Oscillator> {
        self.slots.iter_mut()
    }

    fn next_free_id(&self) -> Option<OscillatorId> {
        self.slots
            .iter()
            .position(|o| !o.is_initialized())
            .map(|index| index as OscillatorId)
    }

    fn initialized_mut(&mut self, id: OscillatorId) -> Option<&mut Oscillator> {
        self.slots
            .get_mut(usize::from(id))
            .filter(|o| o.is_initialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::oscillator::{VoiceState, VOLUME_FADE_LENGTH};

    fn settings() -> OscillatorSettings {
        OscillatorSettings::new(Waveform::Sine, 440.0, 0.5)
    }

    fn run_fade(bank: &mut OscillatorBank) {
        for slot in bank.iter_mut() {
            for _ in 0..=u32::from(VOLUME_FADE_LENGTH) {
                slot.advance_sample();
            }
        }
    }

    #[test]
    fn test_add_assigns_lowest_free_slot() {
        let mut bank = OscillatorBank::new();
        assert_eq!(bank.add(settings()), Some(0));
        assert_eq!(bank.add(settings()), Some(1));
        assert_eq!(bank.add(settings()), Some(2));
        assert_eq!(bank.count_sounding(), 3);
    }

    #[test]
    fn test_add_past_capacity_fails() {
        let mut bank = OscillatorBank::new();
        for i in 0..MAX_OSCILLATORS {
            assert_eq!(bank.add(settings()), Some(i as OscillatorId));
        }
        // The ninth add is rejected; existing voices are unaffected
        assert_eq!(bank.add(settings()), None);
        assert_eq!(bank.count_sounding(), MAX_OSCILLATORS);
    }

    #[test]
    fn test_operations_on_free_slot_fail() {
        let mut bank = OscillatorBank::new();
        assert!(!bank.remove(0));
        assert!(!bank.activate(0, 0.5));
        assert!(!bank.deactivate(0));
        assert!(!bank.set_frequency(0, 880.0));
        assert!(!bank.set_volume(0, 0.5));
        assert!(!bank.set_pan(0, 0.0));
        assert!(!bank.set_waveform(0, Waveform::Saw));
    }

    #[test]
    fn test_out_of_range_id_fails() {
        let mut bank = OscillatorBank::new();
        bank.add(settings());
        assert!(!bank.set_volume(MAX_OSCILLATORS as OscillatorId, 0.5));
        assert!(!bank.remove(u8::MAX));
    }

    #[test]
    fn test_id_not_reissued_while_fading_out() {
        let mut bank = OscillatorBank::new();
        let id = bank.add(settings()).unwrap();
        assert!(bank.remove(id));

        // The slot is still fading out, so a new add lands elsewhere
        assert_eq!(bank.get(id).unwrap().state(), VoiceState::FadingOutToUninitialized);
        assert_eq!(bank.add(settings()), Some(1));
    }

    #[test]
    fn test_slot_reused_after_fade_out_completes() {
        let mut bank = OscillatorBank::new();
        let id = bank.add(settings()).unwrap();
        assert!(bank.remove(id));
        run_fade(&mut bank);

        assert_eq!(bank.get(id).unwrap().state(), VoiceState::Uninitialized);
        assert_eq!(bank.add(settings()), Some(id));
    }

    #[test]
    fn test_deactivated_slot_keeps_its_id() {
        let mut bank = OscillatorBank::new();
        let id = bank.add(settings()).unwrap();
        assert!(bank.deactivate(id));
        run_fade(&mut bank);

        assert_eq!(bank.count_sounding(), 0);
        // Deactivated, not free: the next add goes to a different slot
        assert_eq!(bank.add(settings()), Some(1));
        assert!(bank.activate(id, 0.7));
        assert_eq!(bank.get(id).unwrap().state(), VoiceState::FadingIn);
    }
}
