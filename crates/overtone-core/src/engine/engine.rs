//! The realtime engine
//!
//! Owned exclusively by the audio callback (moved into the stream closure,
//! no mutex, no sharing). Each callback drains the request queue, answers
//! every request, then renders the oscillator bank into the output buffer.
//! Draining before rendering guarantees that a request enqueued before the
//! callback began takes effect in the buffer that callback produces.

use basedrop::{Handle, Owned};

use crate::controller::EngineController;
use crate::engine::deferred::{
    chunk_collector_handle, deferred_channel, DeferredCaller, DeferredTask,
};
use crate::engine::generator::Generator;
use crate::engine::request::{
    request_channel, response_channel, Action, Request, Response,
};
use crate::types::StereoSample;
use crate::wavetable::WaveTables;

/// Realtime half of the engine. Lives on the audio thread.
pub struct Engine {
    generator: Generator,
    request_rx: rtrb::Consumer<Request>,
    response_tx: rtrb::Producer<Response>,
    deferred: DeferredCaller,
    chunk_handle: Handle,
    /// Copy every rendered buffer to the control thread for the session
    /// recorder. The copy allocates in the callback, which breaks the
    /// no-allocation contract, so this is a compile-time switch (the
    /// `session-capture` feature) and never a runtime option.
    capture_session: bool,
}

impl Engine {
    /// Build the engine together with its control-side counterpart, with
    /// all three channels wired between them.
    pub fn new_pair() -> (Engine, EngineController) {
        // Force table initialization here, on the constructing thread,
        // so the first audio callback doesn't pay for it.
        let _ = WaveTables::shared();

        let (request_tx, request_rx) = request_channel();
        let (response_tx, response_rx) = response_channel();
        let (deferred_tx, deferred_rx) = deferred_channel();

        let engine = Engine {
            generator: Generator::new(),
            request_rx,
            response_tx,
            deferred: DeferredCaller::new(deferred_tx),
            chunk_handle: chunk_collector_handle(),
            capture_session: cfg!(feature = "session-capture"),
        };
        let controller = EngineController::new(request_tx, response_rx, deferred_rx);
        (engine, controller)
    }

    /// Drain and answer all pending requests.
    ///
    /// Wait-free: each pop, bank mutation, and response push is O(1) with
    /// no locks. Responses go out in the order requests came in, which is
    /// what lets the control side match them against its in-flight FIFO.
    pub fn process_requests(&mut self) {
        while let Ok(request) = self.request_rx.pop() {
            let response = self.dispatch(&request);
            if let Err(rtrb::PushError::Full(_)) = self.response_tx.push(response) {
                // The response queue is sized to cover the worst-case
                // request burst, so this is a programming error.
                debug_assert!(false, "response queue full: queue sizing bug");
            }
        }
    }

    /// Produce one buffer of output.
    pub fn render(&mut self, output: &mut [StereoSample]) {
        self.process_requests();
        self.generator.write_samples(output);

        if self.capture_session {
            let chunk = Owned::new(&self.chunk_handle, output.to_vec());
            if let Err(task) = self.deferred.defer(DeferredTask::AppendSession(chunk)) {
                // Recorder fell behind; drop this chunk. The Owned inside
                // defers the deallocation to the collector thread.
                drop(task);
            }
        }
    }

    fn dispatch(&mut self, request: &Request) -> Response {
        let kind = request.action.kind();
        let bank = self.generator.bank_mut();
        match request.action {
            Action::AddOscillator { settings } => {
                let id = bank.add(settings);
                let mut response = Response::new(request.request_id, kind, id.is_some());
                response.oscillator_id = id;
                response.settings = Some(settings);
                response
            }
            Action::RemoveOscillator { id } => {
                let success = bank.remove(id);
                let mut response = Response::new(request.request_id, kind, success);
                response.oscillator_id = Some(id);
                response
            }
            Action::ActivateOscillator { id, volume } => {
                let success = bank.activate(id, volume);
                let mut response = Response::new(request.request_id, kind, success);
                response.oscillator_id = Some(id);
                response.volume = Some(volume);
                response
            }
            Action::DeactivateOscillator { id } => {
                let success = bank.deactivate(id);
                let mut response = Response::new(request.request_id, kind, success);
                response.oscillator_id = Some(id);
                response
            }
            Action::SetFrequency { id, frequency } => {
                let success = bank.set_frequency(id, frequency);
                let mut response = Response::new(request.request_id, kind, success);
                response.oscillator_id = Some(id);
                response.frequency = Some(frequency);
                response
            }
            Action::SetVolume { id, volume } => {
                let success = bank.set_volume(id, volume);
                let mut response = Response::new(request.request_id, kind, success);
                response.oscillator_id = Some(id);
                response.volume = Some(volume);
                response
            }
            Action::SetPan { id, pan } => {
                let success = bank.set_pan(id, pan);
                let mut response = Response::new(request.request_id, kind, success);
                response.oscillator_id = Some(id);
                response.pan = Some(pan);
                response
            }
            Action::SetWaveform { id, waveform } => {
                let success = bank.set_waveform(id, waveform);
                let mut response = Response::new(request.request_id, kind, success);
                response.oscillator_id = Some(id);
                response.waveform = Some(waveform);
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::oscillator::{OscillatorSettings, VOLUME_FADE_LENGTH};
    use crate::engine::request::REQUEST_QUEUE_CAPACITY;
    use crate::types::MAX_OSCILLATORS;
    use crate::wavetable::Waveform;

    fn settings() -> OscillatorSettings {
        OscillatorSettings::new(Waveform::Sine, 440.0, 0.5)
    }

    fn render(engine: &mut Engine, frames: usize) -> Vec<StereoSample> {
        let mut buffer = vec![StereoSample::silence(); frames];
        engine.render(&mut buffer);
        buffer
    }

    #[test]
    fn test_add_request_round_trip() {
        let (mut engine, mut controller) = Engine::new_pair();
        assert!(controller.add_oscillator(settings()));

        let _ = render(&mut engine, 64);
        controller.process_responses();

        let mirrored: Vec<_> = controller.mirror().iter().collect();
        assert_eq!(mirrored.len(), 1);
        let (&id, oscillator) = mirrored[0];
        assert_eq!(id, 0);
        assert_eq!(oscillator.settings, settings());
        assert!(oscillator.active);
    }

    #[test]
    fn test_requests_take_effect_before_the_buffer() {
        let (mut engine, mut controller) = Engine::new_pair();
        assert!(controller.add_oscillator(settings()));

        // The very first rendered buffer already contains the new voice
        // (quiet, because it is fading in from zero)
        let buffer = render(&mut engine, usize::from(VOLUME_FADE_LENGTH));
        assert!(buffer.iter().any(|frame| frame.peak() > 0.0));
    }

    #[test]
    fn test_one_response_per_request_in_order() {
        let (mut engine, mut controller) = Engine::new_pair();
        assert!(controller.add_oscillator(settings()));
        assert!(controller.set_frequency(0, 880.0));
        assert!(controller.set_volume(0, 0.3));
        assert!(controller.set_pan(0, -0.5));

        let _ = render(&mut engine, 64);
        controller.process_responses();

        // All four acks applied in order; the mirror reflects the last writes
        let oscillator = controller.mirror().get(0).unwrap();
        assert_eq!(oscillator.settings.frequency, 880.0);
        assert_eq!(oscillator.settings.volume, 0.3);
        assert_eq!(oscillator.settings.pan, -0.5);
        assert_eq!(controller.pending_requests(), 0);
    }

    #[test]
    fn test_burst_past_queue_capacity_drops_at_the_push() {
        let (mut engine, mut controller) = Engine::new_pair();

        let mut accepted = 0;
        for _ in 0..REQUEST_QUEUE_CAPACITY + 1 {
            if controller.add_oscillator(settings()) {
                accepted += 1;
            }
        }
        // The 33rd push is rejected by the queue, not answered later
        assert_eq!(accepted, REQUEST_QUEUE_CAPACITY);

        // The 32 accepted requests all get answered: the first 8 fill the
        // bank, the rest fail benignly
        let _ = render(&mut engine, 64);
        controller.process_responses();
        assert_eq!(controller.pending_requests(), 0);
        assert_eq!(controller.mirror().len(), MAX_OSCILLATORS);
    }

    #[test]
    fn test_add_past_bank_capacity_is_benign_failure() {
        let (mut engine, mut controller) = Engine::new_pair();
        for _ in 0..MAX_OSCILLATORS + 1 {
            assert!(controller.add_oscillator(settings()));
        }

        let _ = render(&mut engine, 64);
        controller.process_responses();

        // Eight voices mirrored; the ninth add failed and was suppressed
        assert_eq!(controller.mirror().len(), MAX_OSCILLATORS);
    }

    #[test]
    fn test_remove_fades_out_then_frees_the_slot() {
        let (mut engine, mut controller) = Engine::new_pair();
        assert!(controller.add_oscillator(settings()));
        let _ = render(&mut engine, usize::from(VOLUME_FADE_LENGTH) + 1);
        controller.process_responses();

        assert!(controller.remove_oscillator(0));
        // The response arrives with the next buffer, while audio is still
        // fading out underneath
        let fade = render(&mut engine, usize::from(VOLUME_FADE_LENGTH));
        controller.process_responses();
        assert!(controller.mirror().is_empty());

        // Decreasing envelope across the fade, dead silence after it
        let peak = |frames: &[StereoSample]| {
            frames.iter().map(StereoSample::peak).fold(0.0f32, f32::max)
        };
        assert!(peak(&fade[..64]) > peak(&fade[fade.len() - 64..]));
        let after = render(&mut engine, 64);
        assert_eq!(peak(&after), 0.0);

        // Once the fade is complete the slot is reusable and id 0 comes back
        assert!(controller.add_oscillator(settings()));
        let _ = render(&mut engine, 8);
        controller.process_responses();
        assert!(controller.mirror().get(0).is_some());
    }

    #[test]
    fn test_id_stability_across_modifications() {
        let (mut engine, mut controller) = Engine::new_pair();
        assert!(controller.add_oscillator(settings()));
        assert!(controller.set_frequency(0, 880.0));
        assert!(controller.set_volume(0, 0.3));

        let _ = render(&mut engine, usize::from(VOLUME_FADE_LENGTH) * 2);
        controller.process_responses();

        let oscillator = controller.mirror().get(0).unwrap();
        assert_eq!(oscillator.settings.frequency, 880.0);
        assert_eq!(oscillator.settings.volume, 0.3);
    }

    #[cfg(feature = "session-capture")]
    #[test]
    fn test_session_capture_defers_buffers() {
        let (mut engine, mut controller) = Engine::new_pair();
        assert!(controller.add_oscillator(settings()));

        let _ = render(&mut engine, 128);
        let _ = render(&mut engine, 128);
        controller.process_responses();

        assert_eq!(controller.session_frames(), 256);
    }
}
