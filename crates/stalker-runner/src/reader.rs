//! Inbound reader.
//!
//! Pulls bytes off the transport one frame at a time and hands each decoded
//! unit to a [`NotificationSink`]. Protocol anomalies (unknown codes, stray
//! leading bytes) are reported and skipped; only transport faults end the
//! loop. A frame cut off by a stop is reported as
//! [`Notification::TruncatedFrame`].
//!
//! There is no byte-level resynchronization: after a stray byte the very next
//! byte is treated as a fresh frame kind.

use std::sync::Arc;

use crossbeam_channel::Sender;
use metrics::counter;
use stalker_hci::{classify, Event, Notification, EVENT_HEADER_SIZE, FRAME_KIND_EVENT};
use tracing::{debug, error, info, warn};

use crate::session::SessionFlags;
use crate::transport::{Transport, TransportError};

/// Consumer of decoded notifications.
pub trait NotificationSink: Send + 'static {
    /// Receive one notification, in arrival order.
    fn notify(&mut self, notification: Notification);
}

impl NotificationSink for Sender<Notification> {
    fn notify(&mut self, notification: Notification) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(notification);
    }
}

impl NotificationSink for Box<dyn FnMut(Notification) + Send> {
    fn notify(&mut self, notification: Notification) {
        (**self)(notification)
    }
}

/// Sink that writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&mut self, notification: Notification) {
        match notification.anomaly() {
            Some(_) => warn!("{}", notification),
            None => info!("{}", notification),
        }
    }
}

/// The reader loop.
pub struct InboundReader<T, S> {
    transport: T,
    sink: S,
    flags: Arc<SessionFlags>,
}

impl<T: Transport, S: NotificationSink> InboundReader<T, S> {
    /// Create a reader pulling from `transport` into `sink`.
    pub fn new(transport: T, sink: S, flags: Arc<SessionFlags>) -> Self {
        InboundReader { transport, sink, flags }
    }

    /// Run until the session or the reader is stopped, or a read fails.
    ///
    /// A read fault clears `alive` and is returned to the session owner.
    pub fn run(mut self) -> Result<(), TransportError> {
        debug!("reader started");

        let result = self.read_loop();
        match &result {
            Ok(()) => debug!("reader stopped"),
            Err(e) => {
                error!(error = %e, "read failed, stopping session");
                counter!("stalker.transport.faults", "side" => "reader").increment(1);
                self.flags.fail();
            }
        }
        result
    }

    fn read_loop(&mut self) -> Result<(), TransportError> {
        while self.flags.reader_should_run() {
            let mut kind = [0u8; 1];
            if self.transport.read(&mut kind)? == 0 {
                continue;
            }

            if kind[0] != FRAME_KIND_EVENT {
                self.emit(Notification::MalformedFrame(kind[0]));
                continue;
            }

            let mut frame = vec![kind[0]];
            if !self.read_into(&mut frame, EVENT_HEADER_SIZE - 1)? {
                self.discard(frame, EVENT_HEADER_SIZE);
                break;
            }
            let len = frame[EVENT_HEADER_SIZE - 1] as usize;
            if !self.read_into(&mut frame, len)? {
                self.discard(frame, EVENT_HEADER_SIZE + len);
                break;
            }

            match Event::decode(&frame) {
                Ok(event) => self.emit(classify(event)),
                Err(e) => warn!(error = %e, "dropping undecodable event"),
            }
        }
        Ok(())
    }

    /// Append exactly `len` bytes to `frame`, riding out timeouts while the
    /// reader runs.
    ///
    /// Returns `false` if the reader is stopped first; `frame` then holds only
    /// the bytes actually received.
    fn read_into(&mut self, frame: &mut Vec<u8>, len: usize) -> Result<bool, TransportError> {
        let start = frame.len();
        frame.resize(start + len, 0);
        let mut filled = 0;
        while filled < len {
            if !self.flags.reader_should_run() {
                frame.truncate(start + filled);
                return Ok(false);
            }
            filled += self.transport.read(&mut frame[start + filled..])?;
        }
        Ok(true)
    }

    /// Report a partial frame cut off by a stop. The sink decides how loudly.
    fn discard(&mut self, bytes: Vec<u8>, expected: usize) {
        self.emit(Notification::TruncatedFrame { expected, bytes });
    }

    fn emit(&mut self, notification: Notification) {
        counter!("stalker.events.received", "kind" => notification.kind()).increment(1);
        // Presentation belongs to the sink; keep this at debug so anomalies
        // are not logged twice.
        debug!(kind = notification.kind(), name = ?notification.name(), "{}", notification);
        self.sink.notify(notification);
    }
}
