//! Threaded session driver for serial HCI radios.
//!
//! A [`DeviceSession`] runs two threads over one [`Transport`]:
//!
//! - the **writer** ([`OutboundDispatcher`]) drains an unbounded
//!   [`OutboundQueue`] and writes each command as one complete frame;
//! - the **reader** ([`InboundReader`]) decodes event frames and hands each
//!   [`Notification`](stalker_hci::Notification) to a [`NotificationSink`].
//!
//! The only state they share is the queue and the [`SessionFlags`].
//!
//! ```rust
//! use std::time::Duration;
//! use stalker_hci::{DeviceDiscovery, Notification};
//! use stalker_runner::{memory_pair, DeviceSession, SessionConfig};
//!
//! let (transport, device) = memory_pair(Duration::from_millis(10));
//! let config = SessionConfig { io_timeout_ms: 10, init_device: false };
//! let (tx, rx) = crossbeam_channel::unbounded::<Notification>();
//!
//! let mut session = DeviceSession::new(transport, config);
//! session.start(tx)?;
//! session.enqueue(DeviceDiscovery::default().build()?);
//! assert_eq!(
//!     device.recv_written(Duration::from_secs(1)),
//!     Some(vec![0x01, 0x04, 0xfe, 0x03, 0x03, 0x01, 0x00])
//! );
//!
//! device.inject(&[0x04, 0x3e, 0x01, 0x02]);
//! assert_eq!(rx.recv_timeout(Duration::from_secs(1))?.name(), Some("LE Advertising Report"));
//!
//! session.stop();
//! session.join(false)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod dispatcher;
pub mod reader;
pub mod session;
pub mod transport;

pub use config::{ConfigError, RunnerConfig, SerialConfig, SessionConfig};
pub use dispatcher::{OutboundDispatcher, OutboundQueue};
pub use reader::{InboundReader, LogSink, NotificationSink};
pub use session::{DeviceSession, SessionError, SessionFlags, SessionState, StopHandle};
pub use transport::{memory_pair, MemoryDevice, MemoryTransport, SerialTransport, Transport, TransportError};
