//! Deferred-work channel: realtime thread -> control thread
//!
//! The realtime thread must never free memory or make a syscall, so any
//! work with that shape is shipped to the control thread on a third SPSC
//! ring buffer. The payload is a closed enum moved by value; moving an
//! owned buffer across the queue transfers the memory without copying or
//! allocating on the push.
//!
//! The session chunks travelling through this channel are the one thing
//! the realtime thread may ever have to let go of, so they are allocated
//! as [`basedrop::Owned`] against the chunk collector defined below. A
//! chunk dropped in the callback (queue full, or the control side gone)
//! only enqueues a pointer; the collector thread frees it later.

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle, Owned};

use crate::types::StereoSample;

/// Capacity of the deferred-work queue
pub const DEFERRED_QUEUE_CAPACITY: usize = 512;

/// Work the realtime thread hands off to the control thread.
///
/// A closed set rather than boxed closures: packaging a closure would
/// allocate on the realtime side, and everything the engine ever defers is
/// known at compile time.
pub enum DeferredTask {
    /// A rendered buffer destined for the session recorder
    AppendSession(Owned<Vec<StereoSample>>),
}

/// Create the deferred-work channel (producer for the realtime thread,
/// consumer for the control thread)
pub fn deferred_channel() -> (rtrb::Producer<DeferredTask>, rtrb::Consumer<DeferredTask>) {
    rtrb::RingBuffer::new(DEFERRED_QUEUE_CAPACITY)
}

/// Realtime-side handle for deferring work
pub struct DeferredCaller {
    producer: rtrb::Producer<DeferredTask>,
}

impl DeferredCaller {
    pub fn new(producer: rtrb::Producer<DeferredTask>) -> Self {
        Self { producer }
    }

    /// Enqueue a task for the control thread.
    ///
    /// On a full queue the task is handed back; the caller may drop it
    /// (deallocation of the chunk inside is still deferred).
    pub fn defer(&mut self, task: DeferredTask) -> Result<(), DeferredTask> {
        self.producer.push(task).map_err(|err| match err {
            rtrb::PushError::Full(task) => task,
        })
    }
}

static CHUNK_COLLECTOR: OnceLock<Handle> = OnceLock::new();

/// Handle the session chunks are allocated against.
///
/// The first call spawns the thread that owns the chunk collector and
/// runs it for the life of the process: session buffers freed there never
/// cost the audio callback a syscall, no matter where they were dropped.
pub fn chunk_collector_handle() -> Handle {
    CHUNK_COLLECTOR
        .get_or_init(|| {
            // The collector is !Sync, so it is built on the thread that
            // will run it and only a handle comes back out.
            let (handle_tx, handle_rx) = mpsc::channel();
            thread::Builder::new()
                .name("overtone-chunk-gc".to_string())
                .spawn(move || {
                    let mut collector = Collector::new();
                    handle_tx
                        .send(collector.handle())
                        .expect("chunk collector handle receiver dropped");

                    // A session chunk is a buffer-length Vec; reclaiming
                    // at 10Hz keeps the backlog to a few callbacks' worth
                    loop {
                        collector.collect();
                        thread::sleep(Duration::from_millis(100));
                    }
                })
                .expect("failed to spawn chunk collector thread");
            handle_rx
                .recv()
                .expect("chunk collector thread died before handing out a handle")
        })
        .clone()
}
