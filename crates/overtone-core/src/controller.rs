//! Control-side view of the engine
//!
//! The control surface never touches the oscillator bank. It talks to the
//! realtime thread through [`EngineController`]: intents go out as
//! requests, and the surface's picture of the bank - the mirror - is
//! updated only when the matching response comes back. The mirror is
//! eventually consistent, lagging the engine by one callback plus one UI
//! frame.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use crate::engine::{Action, DeferredTask, OscillatorSettings, Request, RequestKind, Response};
use crate::recorder::SessionRecorder;
use crate::types::{OscillatorId, RequestId};
use crate::wavetable::Waveform;

/// One mirrored voice: its acknowledged settings plus whether it is
/// currently audible (activate/deactivate acks toggle this).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorOscillator {
    pub settings: OscillatorSettings,
    pub active: bool,
}

/// The control surface's replica of the oscillator bank.
///
/// Keyed by id in a `BTreeMap` so the UI renders voices in stable id
/// order frame after frame.
#[derive(Debug, Default)]
pub struct MirrorView {
    oscillators: BTreeMap<OscillatorId, MirrorOscillator>,
}

impl MirrorView {
    pub fn get(&self, id: OscillatorId) -> Option<&MirrorOscillator> {
        self.oscillators.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OscillatorId, &MirrorOscillator)> {
        self.oscillators.iter()
    }

    pub fn len(&self) -> usize {
        self.oscillators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oscillators.is_empty()
    }

    /// Apply one acknowledged response.
    ///
    /// Failures split two ways: an add can fail benignly (the bank was
    /// full, the intended insert is simply suppressed), while a failed
    /// modification of an id this mirror offered means the two sides have
    /// diverged - a programming error, trapped in debug builds and dropped
    /// in release builds.
    fn apply(&mut self, response: &Response) {
        if !response.success {
            match response.kind {
                RequestKind::AddOscillator => {
                    log::info!("add oscillator rejected: bank is full");
                }
                kind => {
                    debug_assert!(false, "{:?} failed for a mirrored oscillator", kind);
                    log::error!("{:?} failed for oscillator {:?}", kind, response.oscillator_id);
                }
            }
            return;
        }

        let id = match response.oscillator_id {
            Some(id) => id,
            None => {
                debug_assert!(false, "successful {:?} without an id", response.kind);
                return;
            }
        };

        match response.kind {
            RequestKind::AddOscillator => {
                if let Some(settings) = response.settings {
                    self.oscillators
                        .insert(id, MirrorOscillator { settings, active: true });
                }
            }
            RequestKind::RemoveOscillator => {
                let removed = self.oscillators.remove(&id);
                debug_assert!(removed.is_some(), "removed an id the mirror never had");
            }
            RequestKind::ActivateOscillator => {
                if let Some(oscillator) = self.oscillators.get_mut(&id) {
                    oscillator.active = true;
                    if let Some(volume) = response.volume {
                        oscillator.settings.volume = volume;
                    }
                }
            }
            RequestKind::DeactivateOscillator => {
                if let Some(oscillator) = self.oscillators.get_mut(&id) {
                    oscillator.active = false;
                }
            }
            RequestKind::SetFrequency => {
                if let (Some(oscillator), Some(frequency)) =
                    (self.oscillators.get_mut(&id), response.frequency)
                {
                    oscillator.settings.frequency = frequency;
                }
            }
            RequestKind::SetVolume => {
                if let (Some(oscillator), Some(volume)) =
                    (self.oscillators.get_mut(&id), response.volume)
                {
                    oscillator.settings.volume = volume;
                }
            }
            RequestKind::SetPan => {
                if let (Some(oscillator), Some(pan)) =
                    (self.oscillators.get_mut(&id), response.pan)
                {
                    oscillator.settings.pan = pan;
                }
            }
            RequestKind::SetWaveform => {
                if let (Some(oscillator), Some(waveform)) =
                    (self.oscillators.get_mut(&id), response.waveform)
                {
                    oscillator.settings.waveform = waveform;
                }
            }
        }
    }
}

/// Non-realtime half of the engine. Lives with the UI.
///
/// Owns the request producer, both return queues, the in-flight FIFO used
/// to match acks, and the session recorder.
pub struct EngineController {
    request_tx: rtrb::Producer<Request>,
    response_rx: rtrb::Consumer<Response>,
    deferred_rx: rtrb::Consumer<DeferredTask>,
    next_request_id: RequestId,
    in_flight: VecDeque<RequestId>,
    mirror: MirrorView,
    recorder: SessionRecorder,
}

impl EngineController {
    pub(crate) fn new(
        request_tx: rtrb::Producer<Request>,
        response_rx: rtrb::Consumer<Response>,
        deferred_rx: rtrb::Consumer<DeferredTask>,
    ) -> Self {
        let mut recorder = SessionRecorder::new();
        if cfg!(feature = "session-capture") {
            recorder.set_path(PathBuf::from(crate::recorder::SESSION_FILE));
        }
        Self {
            request_tx,
            response_rx,
            deferred_rx,
            next_request_id: 0,
            in_flight: VecDeque::new(),
            mirror: MirrorView::default(),
            recorder,
        }
    }

    /// Call once per UI frame: run deferred work, then reconcile the
    /// mirror against incoming responses.
    pub fn process_responses(&mut self) {
        while let Ok(task) = self.deferred_rx.pop() {
            match task {
                DeferredTask::AppendSession(chunk) => self.recorder.append(&chunk),
            }
        }

        while let Ok(response) = self.response_rx.pop() {
            // Responses come back in send order; the head of the in-flight
            // FIFO must be the ack we are looking at.
            let expected = self.in_flight.pop_front();
            if expected != Some(response.request_id) {
                debug_assert!(
                    false,
                    "response {} does not match expected {:?}",
                    response.request_id, expected
                );
                log::error!(
                    "out-of-order response {} (expected {:?}); dropping",
                    response.request_id,
                    expected
                );
                continue;
            }
            self.mirror.apply(&response);
        }
    }

    pub fn add_oscillator(&mut self, settings: OscillatorSettings) -> bool {
        self.push(Action::AddOscillator { settings })
    }

    pub fn remove_oscillator(&mut self, id: OscillatorId) -> bool {
        self.push(Action::RemoveOscillator { id })
    }

    pub fn activate_oscillator(&mut self, id: OscillatorId, volume: f32) -> bool {
        self.push(Action::ActivateOscillator { id, volume })
    }

    pub fn deactivate_oscillator(&mut self, id: OscillatorId) -> bool {
        self.push(Action::DeactivateOscillator { id })
    }

    pub fn set_frequency(&mut self, id: OscillatorId, frequency: f32) -> bool {
        self.push(Action::SetFrequency { id, frequency })
    }

    pub fn set_volume(&mut self, id: OscillatorId, volume: f32) -> bool {
        self.push(Action::SetVolume { id, volume })
    }

    pub fn set_pan(&mut self, id: OscillatorId, pan: f32) -> bool {
        self.push(Action::SetPan { id, pan })
    }

    pub fn set_waveform(&mut self, id: OscillatorId, waveform: Waveform) -> bool {
        self.push(Action::SetWaveform { id, waveform })
    }

    /// The mirrored bank, for rendering widgets
    pub fn mirror(&self) -> &MirrorView {
        &self.mirror
    }

    /// Requests sent but not yet acknowledged
    pub fn pending_requests(&self) -> usize {
        self.in_flight.len()
    }

    /// Stereo frames captured so far
    pub fn session_frames(&self) -> usize {
        self.recorder.frames()
    }

    /// Push an intent; on success the request id joins the in-flight FIFO.
    ///
    /// A full queue rejects the push and the intent is dropped - the
    /// mirror must not change until a response confirms the mutation, so
    /// there is nothing else to do here.
    fn push(&mut self, action: Action) -> bool {
        let request_id = self.next_request_id;
        let request = Request { request_id, action };
        match self.request_tx.push(request) {
            Ok(()) => {
                self.next_request_id = self.next_request_id.wrapping_add(1);
                self.in_flight.push_back(request_id);
                true
            }
            Err(rtrb::PushError::Full(request)) => {
                log::warn!("request queue full; dropping {:?}", request.action.kind());
                false
            }
        }
    }
}
