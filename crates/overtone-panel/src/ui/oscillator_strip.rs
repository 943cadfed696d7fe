//! One oscillator's control strip
//!
//! Rendered purely from the mirrored settings; every interaction becomes a
//! request and the widgets move when the ack updates the mirror.

use iced::widget::{button, checkbox, column, container, pick_list, row, slider, text};
use iced::{Center, Element, Fill};

use overtone_core::controller::MirrorOscillator;
use overtone_core::types::OscillatorId;
use overtone_core::wavetable::Waveform;

/// Messages for a single oscillator strip
#[derive(Debug, Clone)]
pub enum OscillatorMessage {
    /// Fade out and free the slot
    Remove,
    /// Activate (true) or deactivate (false) the voice
    SetActive(bool),
    WaveformSelected(Waveform),
    VolumeChanged(f32),
    PanChanged(f32),
    FrequencyChanged(f32),
}

/// Build the strip for one mirrored oscillator
pub fn view(id: OscillatorId, oscillator: &MirrorOscillator) -> Element<'static, OscillatorMessage> {
    let settings = oscillator.settings;

    let header = row![
        text(format!("Osc {}", id)).size(14).width(50),
        button(text("Remove").size(11))
            .on_press(OscillatorMessage::Remove)
            .padding([4, 8]),
        checkbox(oscillator.active).label("Active").on_toggle(OscillatorMessage::SetActive),
        pick_list(
            Waveform::ALL,
            Some(settings.waveform),
            OscillatorMessage::WaveformSelected
        )
        .width(110),
    ]
    .spacing(8)
    .align_y(Center);

    let volume = row![
        text("VOL").size(10).width(40),
        slider(0.0..=1.0, settings.volume, OscillatorMessage::VolumeChanged)
            .step(0.01)
            .width(Fill),
        text(format!("{:.2}", settings.volume)).size(10).width(50),
    ]
    .spacing(8)
    .align_y(Center);

    let pan = row![
        text("PAN").size(10).width(40),
        slider(-1.0..=1.0, settings.pan, OscillatorMessage::PanChanged)
            .step(0.01)
            .width(Fill),
        text(format!("{:+.2}", settings.pan)).size(10).width(50),
    ]
    .spacing(8)
    .align_y(Center);

    let frequency = row![
        text("FREQ").size(10).width(40),
        slider(
            20.0..=8000.0,
            settings.frequency,
            OscillatorMessage::FrequencyChanged
        )
        .step(1.0)
        .width(Fill),
        text(format!("{:.0} Hz", settings.frequency)).size(10).width(50),
    ]
    .spacing(8)
    .align_y(Center);

    container(column![header, volume, pan, frequency].spacing(4))
        .padding(8)
        .width(Fill)
        .into()
}
