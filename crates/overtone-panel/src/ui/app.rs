//! Main iced application for the Overtone control surface
//!
//! The panel never reads engine state directly. Widgets are rendered from
//! the controller's mirror, user input becomes requests on the lock-free
//! queue, and a ~60fps tick drains responses and deferred work. The mirror
//! (and therefore the widgets) only move once the engine has acknowledged
//! a change.

use std::time::Duration;

use iced::widget::{button, column, container, pick_list, row, scrollable, text};
use iced::{time, Center, Element, Fill, Subscription, Task};

use overtone_core::controller::EngineController;
use overtone_core::engine::OscillatorSettings;
use overtone_core::music::Pitch;
use overtone_core::types::{OscillatorId, MAX_OSCILLATORS};
use overtone_core::wavetable::Waveform;

use super::oscillator_strip::{self, OscillatorMessage};

/// Volume a freshly added voice fades in to
const DEFAULT_ADD_VOLUME: f32 = 0.2;

/// Application state
pub struct SynthPanel {
    /// Control-side half of the engine; `None` when audio failed to start
    controller: Option<EngineController>,
    /// Waveform selected for the next add
    add_waveform: Waveform,
    /// Pitch selected for the next add
    add_pitch: Pitch,
    /// Selectable pitches for the add row
    pitch_options: Vec<Pitch>,
    /// Status line (dropped intents, audio-offline notice)
    status: String,
}

/// Messages that can be sent to the application
#[derive(Debug, Clone)]
pub enum Message {
    /// Periodic tick: drain responses and deferred work
    Tick,
    /// Waveform picked for the next add
    AddWaveformSelected(Waveform),
    /// Pitch picked for the next add
    AddPitchSelected(Pitch),
    /// Add a new oscillator with the selected waveform and pitch
    AddOscillator,
    /// A message from one oscillator strip
    Oscillator(OscillatorId, OscillatorMessage),
}

impl SynthPanel {
    pub fn new(controller: Option<EngineController>) -> Self {
        let status = if controller.is_some() {
            String::new()
        } else {
            "audio offline - controls are inert".to_string()
        };
        Self {
            controller,
            add_waveform: Waveform::Sine,
            add_pitch: Pitch::new(overtone_core::music::Note::A, 3),
            pitch_options: Pitch::range(1..=7),
            status,
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                if let Some(controller) = &mut self.controller {
                    controller.process_responses();
                }
            }
            Message::AddWaveformSelected(waveform) => self.add_waveform = waveform,
            Message::AddPitchSelected(pitch) => self.add_pitch = pitch,
            Message::AddOscillator => {
                let settings = OscillatorSettings::new(
                    self.add_waveform,
                    self.add_pitch.frequency(),
                    DEFAULT_ADD_VOLUME,
                );
                self.send(|controller| controller.add_oscillator(settings));
            }
            Message::Oscillator(id, message) => self.update_oscillator(id, message),
        }
        Task::none()
    }

    fn update_oscillator(&mut self, id: OscillatorId, message: OscillatorMessage) {
        match message {
            OscillatorMessage::Remove => {
                self.send(|controller| controller.remove_oscillator(id));
            }
            OscillatorMessage::SetActive(true) => {
                // Reactivate at the last acknowledged volume
                let volume = self
                    .controller
                    .as_ref()
                    .and_then(|c| c.mirror().get(id))
                    .map(|o| o.settings.volume)
                    .unwrap_or(DEFAULT_ADD_VOLUME);
                self.send(|controller| controller.activate_oscillator(id, volume));
            }
            OscillatorMessage::SetActive(false) => {
                self.send(|controller| controller.deactivate_oscillator(id));
            }
            OscillatorMessage::WaveformSelected(waveform) => {
                self.send(|controller| controller.set_waveform(id, waveform));
            }
            OscillatorMessage::VolumeChanged(volume) => {
                self.send(|controller| controller.set_volume(id, volume));
            }
            OscillatorMessage::PanChanged(pan) => {
                self.send(|controller| controller.set_pan(id, pan));
            }
            OscillatorMessage::FrequencyChanged(frequency) => {
                self.send(|controller| controller.set_frequency(id, frequency));
            }
        }
    }

    /// Push an intent; when the queue rejects it, surface that and leave
    /// the mirror untouched
    fn send(&mut self, push: impl FnOnce(&mut EngineController) -> bool) {
        match &mut self.controller {
            Some(controller) => {
                if push(controller) {
                    self.status.clear();
                } else {
                    self.status = "control queue full - change dropped".to_string();
                }
            }
            None => {
                self.status = "audio offline - controls are inert".to_string();
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let header = text("Overtone").size(24);

        let add_row = row![
            pick_list(
                Waveform::ALL,
                Some(self.add_waveform),
                Message::AddWaveformSelected
            )
            .width(110),
            pick_list(
                self.pitch_options.as_slice(),
                Some(self.add_pitch),
                Message::AddPitchSelected
            )
            .width(90),
            button(text("Add Oscillator").size(13)).on_press(Message::AddOscillator),
        ]
        .spacing(8)
        .align_y(Center);

        let mut content = column![header].spacing(12).padding(16);

        if !self.status.is_empty() {
            content = content.push(text(&self.status).size(12));
        }
        content = content.push(add_row);

        if let Some(controller) = &self.controller {
            content = content.push(
                text(format!(
                    "{} of {} voices in use",
                    controller.mirror().len(),
                    MAX_OSCILLATORS
                ))
                .size(12),
            );
            for (&id, oscillator) in controller.mirror().iter() {
                content = content.push(
                    oscillator_strip::view(id, oscillator)
                        .map(move |message| Message::Oscillator(id, message)),
                );
            }
        }

        container(scrollable(content)).width(Fill).into()
    }

    /// Subscribe to the ~60fps tick that keeps the mirror in sync
    pub fn subscription(&self) -> Subscription<Message> {
        time::every(Duration::from_millis(16)).map(|_| Message::Tick)
    }
}
