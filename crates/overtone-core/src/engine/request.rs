//! Lock-free request/response protocol between the control surface and the
//! realtime engine
//!
//! The control thread pushes [`Request`]s onto an SPSC ring buffer; the
//! realtime thread drains the queue at the top of every audio callback,
//! applies each request to the oscillator bank, and answers with exactly
//! one [`Response`] on a second ring buffer. Both payloads are plain
//! `Copy` values: a closed tagged union with a bounded size, stored in the
//! queue by value, so no allocation ever happens on either side of a push
//! and nothing needs destruction on the realtime thread.
//!
//! The `rtrb` ringbuffers are wait-free on both ends: a push or pop is a
//! couple of atomic loads/stores, never a lock, never a syscall.

use crate::engine::oscillator::OscillatorSettings;
use crate::types::{OscillatorId, RequestId};
use crate::wavetable::Waveform;

/// What a request asks the engine to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Claim a free slot and fade a new voice in
    AddOscillator { settings: OscillatorSettings },
    /// Fade a voice out and free its slot once silent
    RemoveOscillator { id: OscillatorId },
    ActivateOscillator { id: OscillatorId, volume: f32 },
    DeactivateOscillator { id: OscillatorId },
    SetFrequency { id: OscillatorId, frequency: f32 },
    SetVolume { id: OscillatorId, volume: f32 },
    SetPan { id: OscillatorId, pan: f32 },
    SetWaveform { id: OscillatorId, waveform: Waveform },
}

impl Action {
    pub fn kind(&self) -> RequestKind {
        match self {
            Action::AddOscillator { .. } => RequestKind::AddOscillator,
            Action::RemoveOscillator { .. } => RequestKind::RemoveOscillator,
            Action::ActivateOscillator { .. } => RequestKind::ActivateOscillator,
            Action::DeactivateOscillator { .. } => RequestKind::DeactivateOscillator,
            Action::SetFrequency { .. } => RequestKind::SetFrequency,
            Action::SetVolume { .. } => RequestKind::SetVolume,
            Action::SetPan { .. } => RequestKind::SetPan,
            Action::SetWaveform { .. } => RequestKind::SetWaveform,
        }
    }
}

/// Discriminant of a request, echoed on its response so the mirror knows
/// which mutation to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    AddOscillator,
    RemoveOscillator,
    ActivateOscillator,
    DeactivateOscillator,
    SetFrequency,
    SetVolume,
    SetPan,
    SetWaveform,
}

/// A control-surface intent, tagged with its ack id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Request {
    pub request_id: RequestId,
    pub action: Action,
}

/// The realtime thread's answer to one request.
///
/// Echoes the parameters the mirror needs to update itself on success. The
/// optional fields are populated per kind: `oscillator_id` for everything
/// that targets a voice (including a successful add), `settings` for adds,
/// and the single changed parameter for the setters.
#[derive(Debug, Clone, Copy)]
pub struct Response {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub success: bool,
    pub oscillator_id: Option<OscillatorId>,
    pub settings: Option<OscillatorSettings>,
    pub frequency: Option<f32>,
    pub volume: Option<f32>,
    pub pan: Option<f32>,
    pub waveform: Option<Waveform>,
}

impl Response {
    /// A response with every echo field empty
    pub fn new(request_id: RequestId, kind: RequestKind, success: bool) -> Self {
        Self {
            request_id,
            kind,
            success,
            oscillator_id: None,
            settings: None,
            frequency: None,
            volume: None,
            pan: None,
            waveform: None,
        }
    }
}

/// Capacity of the request queue (control -> realtime).
///
/// A full queue rejects the push and the control surface drops the intent;
/// 32 is far beyond what a human generates between two audio callbacks.
pub const REQUEST_QUEUE_CAPACITY: usize = 32;

/// Capacity of the response queue (realtime -> control).
///
/// Must be at least the request capacity: the callback answers every
/// request it drains, so the worst-case burst of responses per callback is
/// bounded by the request queue. A full response queue is a sizing bug,
/// not an expected condition.
pub const RESPONSE_QUEUE_CAPACITY: usize = 32;

/// Create the request channel (producer for the control thread, consumer
/// for the realtime thread)
pub fn request_channel() -> (rtrb::Producer<Request>, rtrb::Consumer<Request>) {
    rtrb::RingBuffer::new(REQUEST_QUEUE_CAPACITY)
}

/// Create the response channel (producer for the realtime thread, consumer
/// for the control thread)
pub fn response_channel() -> (rtrb::Producer<Response>, rtrb::Consumer<Response>) {
    rtrb::RingBuffer::new(RESPONSE_QUEUE_CAPACITY)
}
