//! Transport channels.
//!
//! A transport is a blocking duplex byte pipe with a read timeout. Reads that
//! time out return `Ok(0)`; only real I/O failures are errors. The session
//! clones a transport into a read half and a write half so the reader and
//! writer threads never share a handle.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use thiserror::Error;

/// Transport-level faults. Any of these is fatal to the loop that hits it.
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error on the underlying device.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port could not be opened or cloned.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The other end went away.
    #[error("transport disconnected")]
    Disconnected,
}

/// A blocking byte channel to the radio.
pub trait Transport: Send + 'static {
    /// Read up to `buf.len()` bytes, blocking at most one I/O timeout.
    ///
    /// Returns `Ok(0)` on timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `data`, blocking until it has been handed to the device.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Open another handle to the same channel.
    fn try_clone(&self) -> Result<Self, TransportError>
    where
        Self: Sized;
}

// ============================================================================
// Serial Port
// ============================================================================

/// A transport over a serial port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `port` at `baud_rate` with the given read timeout.
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(port, baud_rate).timeout(timeout).open()?;
        Ok(SerialTransport { port })
    }

    /// Name of the underlying port, if known.
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn try_clone(&self) -> Result<Self, TransportError> {
        Ok(SerialTransport {
            port: self.port.try_clone()?,
        })
    }
}

// ============================================================================
// In-Memory Pair
// ============================================================================

/// Host side of an in-memory transport pair.
///
/// Useful for tests and for driving a session without hardware. Clones share
/// the same buffers.
#[derive(Clone)]
pub struct MemoryTransport {
    inbound: Receiver<Vec<u8>>,
    pending: Arc<Mutex<VecDeque<u8>>>,
    outbound: Sender<Vec<u8>>,
    faulted: Arc<AtomicBool>,
    timeout: Duration,
}

/// Radio side of an in-memory transport pair.
#[derive(Clone)]
pub struct MemoryDevice {
    to_host: Sender<Vec<u8>>,
    from_host: Receiver<Vec<u8>>,
    faulted: Arc<AtomicBool>,
}

/// Create a connected in-memory transport pair.
pub fn memory_pair(timeout: Duration) -> (MemoryTransport, MemoryDevice) {
    let (to_host, inbound) = crossbeam_channel::unbounded();
    let (outbound, from_host) = crossbeam_channel::unbounded();
    let faulted = Arc::new(AtomicBool::new(false));

    let transport = MemoryTransport {
        inbound,
        pending: Arc::new(Mutex::new(VecDeque::new())),
        outbound,
        faulted: Arc::clone(&faulted),
        timeout,
    };
    let device = MemoryDevice {
        to_host,
        from_host,
        faulted,
    };
    (transport, device)
}

impl MemoryTransport {
    fn check_fault(&self) -> Result<(), TransportError> {
        if self.faulted.load(Ordering::SeqCst) {
            Err(TransportError::Disconnected)
        } else {
            Ok(())
        }
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.check_fault()?;

        let mut pending = self.pending.lock();
        if pending.is_empty() {
            match self.inbound.recv_timeout(self.timeout) {
                Ok(chunk) => pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Disconnected),
            }
            self.check_fault()?;
        }

        let n = buf.len().min(pending.len());
        for (dst, byte) in buf.iter_mut().zip(pending.drain(..n)) {
            *dst = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.check_fault()?;
        self.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    fn try_clone(&self) -> Result<Self, TransportError> {
        Ok(self.clone())
    }
}

impl MemoryDevice {
    /// Send bytes to the host as one chunk.
    pub fn inject(&self, data: &[u8]) {
        let _ = self.to_host.send(data.to_vec());
    }

    /// Wait for the next write made by the host.
    pub fn recv_written(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.from_host.recv_timeout(timeout).ok()
    }

    /// Take the next write made by the host, if one is waiting.
    pub fn try_written(&self) -> Option<Vec<u8>> {
        self.from_host.try_recv().ok()
    }

    /// Make every further host read and write fail.
    pub fn fail(&self) {
        self.faulted.store(true, Ordering::SeqCst);
    }
}
