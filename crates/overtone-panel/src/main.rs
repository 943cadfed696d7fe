//! Overtone - interactive additive synthesizer
//!
//! Entry point for the GUI application. It:
//! 1. Starts the CPAL audio system (the realtime engine lives in its callback)
//! 2. Launches the iced control surface with the engine controller
//!
//! There is no runtime configuration; everything is a compile-time
//! constant. Session capture included: build with
//! `--features session-capture` to write the whole session as a 2-channel
//! float WAV on shutdown (debug aid; the capture allocates in the
//! callback).

mod ui;

use iced::{Size, Task};

use overtone_core::audio::start_audio_system;
use ui::app::{Message, SynthPanel};

fn main() -> iced::Result {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("overtone starting up");

    let (audio_handle, controller) = match start_audio_system() {
        Ok((handle, controller)) => {
            log::info!(
                "audio system started ({} Hz, ~{:.1}ms latency)",
                handle.sample_rate(),
                handle.latency_ms()
            );
            (Some(handle), Some(controller))
        }
        Err(e) => {
            eprintln!("Warning: could not start audio system: {}", e);
            eprintln!("Running in UI-only mode (no audio output)");
            (None, None)
        }
    };

    // The boot closure must be Fn but is only called once; hand the
    // controller over through a cell
    let controller_cell = std::cell::RefCell::new(controller);

    let result = iced::application(
        move || {
            let controller = controller_cell.borrow_mut().take();
            (SynthPanel::new(controller), Task::none())
        },
        update,
        view,
    )
    .subscription(subscription)
    .title("Overtone")
    .window_size(Size::new(520.0, 760.0))
    .run();

    // Keep the stream alive until the UI is done
    drop(audio_handle);
    log::info!("overtone stopped");

    result
}

/// Update function for iced
fn update(panel: &mut SynthPanel, message: Message) -> Task<Message> {
    panel.update(message)
}

/// View function for iced
fn view(panel: &SynthPanel) -> iced::Element<'_, Message> {
    panel.view()
}

/// Subscription function for iced
fn subscription(panel: &SynthPanel) -> iced::Subscription<Message> {
    panel.subscription()
}
