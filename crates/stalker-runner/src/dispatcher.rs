//! Outbound dispatcher.
//!
//! Commands are queued by any number of callers and transmitted by a single
//! writer thread, one complete `write_all` per command, in enqueue order.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use metrics::counter;
use stalker_hci::Command;
use tracing::{debug, error, trace};

use crate::session::SessionFlags;
use crate::transport::{Transport, TransportError};

/// Unbounded FIFO of commands awaiting transmission.
///
/// Cloning gives another handle to the same queue. Because every handle owns
/// both ends of the channel, enqueueing cannot fail.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        OutboundQueue { tx, rx }
    }

    /// Append a command. Never blocks.
    pub fn enqueue(&self, command: Command) {
        trace!(%command, "enqueued");
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(command);
    }

    /// Number of commands waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Pop the oldest command, waiting at most `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Command> {
        match self.rx.recv_timeout(timeout) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The writer loop: drains the queue onto a transport.
pub struct OutboundDispatcher<T> {
    queue: OutboundQueue,
    transport: T,
    flags: Arc<SessionFlags>,
    io_timeout: Duration,
}

impl<T: Transport> OutboundDispatcher<T> {
    /// Create a dispatcher writing to `transport`.
    pub fn new(queue: OutboundQueue, transport: T, flags: Arc<SessionFlags>, io_timeout: Duration) -> Self {
        OutboundDispatcher {
            queue,
            transport,
            flags,
            io_timeout,
        }
    }

    /// Run until the session stops or a write fails.
    ///
    /// An empty pop is just a liveness poll. A write fault clears `alive` and
    /// is returned; it is never retried.
    pub fn run(mut self) -> Result<(), TransportError> {
        debug!("writer started");

        while self.flags.is_alive() {
            let Some(command) = self.queue.pop_timeout(self.io_timeout) else {
                continue;
            };

            let bytes = command.encode();
            debug!(opcode = format_args!("0x{:04x}", command.opcode()), bytes = %hex::encode(&bytes), "transmitting");

            if let Err(e) = self.transport.write_all(&bytes) {
                error!(error = %e, %command, "write failed, stopping session");
                counter!("stalker.transport.faults", "side" => "writer").increment(1);
                self.flags.fail();
                return Err(e);
            }
            counter!("stalker.frames.sent").increment(1);
        }

        debug!(pending = self.queue.len(), "writer stopped");
        Ok(())
    }
}
