//! Device session.
//!
//! A session owns the transport, the outbound queue and the two worker
//! threads. Its lifecycle is
//!
//! ```text
//! Stopped --start()--> Running --stop() / fault--> Stopping --join()--> Stopped
//! ```
//!
//! Cancellation is cooperative: `stop()` only clears a flag, which each loop
//! observes after its current blocking call returns. Shutdown therefore takes
//! up to one I/O timeout, and a transport that never times out can hang
//! `join()`. Dropping a running session waits a bounded time instead and logs
//! what it could not return.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use stalker_hci::{Command, DeviceInit, ProtocolError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dispatcher::{OutboundDispatcher, OutboundQueue};
use crate::reader::{InboundReader, NotificationSink};
use crate::transport::{Transport, TransportError};

/// Errors from session control.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A worker loop hit a transport fault.
    #[error("transport fault: {0}")]
    Transport(#[from] TransportError),

    /// Initialization command could not be built.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// `start()` called while worker threads still exist.
    #[error("session already started")]
    AlreadyRunning,

    /// A worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread role.
        name: &'static str,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Liveness flags shared by the session and its worker threads.
#[derive(Debug, Default)]
pub struct SessionFlags {
    alive: AtomicBool,
    reader_alive: AtomicBool,
}

impl SessionFlags {
    /// Create cleared flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both flags.
    pub fn start(&self) {
        self.reader_alive.store(true, Ordering::SeqCst);
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Clear `alive`, stopping both loops.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Clear `reader_alive` only.
    pub fn stop_reader(&self) {
        self.reader_alive.store(false, Ordering::SeqCst);
    }

    /// Record a transport fault.
    pub fn fail(&self) {
        self.stop();
    }

    /// Whether the session is alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether the reader should keep going.
    pub fn reader_should_run(&self) -> bool {
        self.is_alive() && self.reader_alive.load(Ordering::SeqCst)
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No worker threads.
    Stopped,
    /// Workers running and `alive` set.
    Running,
    /// `alive` cleared, workers not yet joined.
    Stopping,
}

/// Cloneable handle that can stop a session from another thread.
#[derive(Clone)]
pub struct StopHandle {
    flags: Arc<SessionFlags>,
}

impl StopHandle {
    /// Clear `alive`.
    pub fn stop(&self) {
        self.flags.stop();
    }

    /// Whether the session is alive.
    pub fn is_alive(&self) -> bool {
        self.flags.is_alive()
    }
}

type Worker = JoinHandle<Result<(), TransportError>>;

/// Slack on top of two I/O timeouts when `Drop` waits for workers.
const DROP_GRACE: Duration = Duration::from_millis(50);
const DROP_POLL: Duration = Duration::from_millis(5);

/// A session with one radio over one transport.
pub struct DeviceSession<T: Transport> {
    transport: T,
    config: SessionConfig,
    queue: OutboundQueue,
    flags: Arc<SessionFlags>,
    reader: Option<Worker>,
    writer: Option<Worker>,
}

impl<T: Transport> DeviceSession<T> {
    /// Create a stopped session.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        DeviceSession {
            transport,
            config,
            queue: OutboundQueue::new(),
            flags: Arc::new(SessionFlags::new()),
            reader: None,
            writer: None,
        }
    }

    /// Start the reader and writer threads.
    ///
    /// Notifications go to `sink`. If configured, GAP_DeviceInit is queued
    /// once both threads are running.
    pub fn start<S: NotificationSink>(&mut self, sink: S) -> Result<(), SessionError> {
        if self.reader.is_some() || self.writer.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        let init = if self.config.init_device {
            Some(DeviceInit::default().build()?)
        } else {
            None
        };

        let read_half = self.transport.try_clone()?;
        let write_half = self.transport.try_clone()?;
        let io_timeout = self.config.io_timeout();

        self.flags.start();

        let reader = InboundReader::new(read_half, sink, Arc::clone(&self.flags));
        self.reader = Some(self.spawn("reader", move || reader.run())?);

        let dispatcher = OutboundDispatcher::new(self.queue.clone(), write_half, Arc::clone(&self.flags), io_timeout);
        self.writer = Some(self.spawn("writer", move || dispatcher.run())?);

        info!(io_timeout_ms = io_timeout.as_millis() as u64, "session started");

        if let Some(command) = init {
            self.enqueue(command);
        }
        Ok(())
    }

    fn spawn<F>(&self, name: &'static str, f: F) -> Result<Worker, SessionError>
    where
        F: FnOnce() -> Result<(), TransportError> + Send + 'static,
    {
        thread::Builder::new()
            .name(format!("stalker-{}", name))
            .spawn(f)
            .map_err(|source| {
                self.flags.stop();
                SessionError::Spawn { name, source }
            })
    }

    /// Queue a command for transmission. Never blocks.
    pub fn enqueue(&self, command: Command) {
        self.queue.enqueue(command);
    }

    /// A handle to the outbound queue for other producer threads.
    pub fn queue(&self) -> OutboundQueue {
        self.queue.clone()
    }

    /// Number of commands not yet transmitted.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Signal both loops to stop.
    pub fn stop(&self) {
        debug!("stop requested");
        self.flags.stop();
    }

    /// Signal only the reader to stop; the writer keeps draining.
    pub fn stop_reader(&self) {
        debug!("reader stop requested");
        self.flags.stop_reader();
    }

    /// A handle that can stop this session from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flags: Arc::clone(&self.flags),
        }
    }

    /// Whether the session is alive.
    pub fn is_alive(&self) -> bool {
        self.flags.is_alive()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        match (self.reader.is_some() || self.writer.is_some(), self.flags.is_alive()) {
            (false, _) => SessionState::Stopped,
            (true, true) => SessionState::Running,
            (true, false) => SessionState::Stopping,
        }
    }

    /// Wait for the writer and, unless `transmit_only`, the reader.
    ///
    /// Returns the first transport fault either loop reported.
    pub fn join(&mut self, transmit_only: bool) -> Result<(), SessionError> {
        let mut result = Ok(());

        if let Some(writer) = self.writer.take() {
            result = join_worker(writer, "writer");
        }

        if !transmit_only {
            if let Some(reader) = self.reader.take() {
                let reader_result = join_worker(reader, "reader");
                if result.is_ok() {
                    result = reader_result;
                }
            }
        }

        debug!(state = ?self.state(), "joined");
        result
    }
}

impl<T: Transport> Drop for DeviceSession<T> {
    /// Stops the workers and gives them a bounded wait to exit.
    ///
    /// Worker faults found here are logged, since nobody is left to return
    /// them to. A worker still blocked after the wait is detached.
    fn drop(&mut self) {
        self.flags.stop();
        if self.reader.is_none() && self.writer.is_none() {
            return;
        }

        warn!("session dropped without join, waiting for workers");
        let deadline = Instant::now() + self.config.io_timeout() * 2 + DROP_GRACE;
        for (name, worker) in [("writer", self.writer.take()), ("reader", self.reader.take())] {
            let Some(worker) = worker else { continue };
            while !worker.is_finished() && Instant::now() < deadline {
                thread::sleep(DROP_POLL);
            }
            if !worker.is_finished() {
                warn!(worker = name, "worker still blocked at drop, detaching");
                continue;
            }
            if let Err(e) = join_worker(worker, name) {
                warn!(worker = name, error = %e, "worker failed before drop");
            }
        }
    }
}

fn join_worker(worker: Worker, name: &'static str) -> Result<(), SessionError> {
    match worker.join() {
        Ok(result) => result.map_err(SessionError::from),
        Err(_) => Err(SessionError::ThreadPanicked(name)),
    }
}
