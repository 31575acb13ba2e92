//! Event classification.
//!
//! Turns a decoded [`Event`] (or a stray leading byte) into the
//! [`Notification`] handed to consumers. Classification never fails: gaps in
//! the code tables become notifications of their own so that nothing read off
//! the wire is dropped silently.

use std::fmt;

use crate::constants::*;
use crate::error::ProtocolError;
use crate::frame::{Event, VendorHeader};

/// One decoded unit from the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Vendor specific event (code 0xFF).
    Vendor {
        /// Opcode/status prefix, when the parameters carry one.
        header: Option<VendorHeader>,
        /// The raw event.
        event: Event,
    },

    /// Event from the Bluetooth core event table.
    Core {
        /// Registered event name.
        name: &'static str,
        /// The raw event.
        event: Event,
    },

    /// LE meta event with a registered sub-event.
    Le {
        /// Sub-event code.
        sub_event: u8,
        /// Registered sub-event name.
        name: &'static str,
        /// The raw event.
        event: Event,
    },

    /// LE meta event whose sub-event is not registered (or missing).
    UnknownSubEvent {
        /// Sub-event code, `None` when the event carried no parameters.
        sub_event: Option<u8>,
        /// The raw event.
        event: Event,
    },

    /// Event code in none of the tables.
    UnknownEvent(Event),

    /// Leading byte that is not a known frame kind.
    MalformedFrame(u8),

    /// Partial frame discarded because reading stopped before it completed.
    TruncatedFrame {
        /// Full frame length, as far as the header was read.
        expected: usize,
        /// Bytes received so far, starting with the kind byte.
        bytes: Vec<u8>,
    },
}

impl Notification {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Vendor { .. } => "vendor",
            Notification::Core { .. } => "core",
            Notification::Le { .. } => "le",
            Notification::UnknownSubEvent { .. } => "unknown_sub_event",
            Notification::UnknownEvent(_) => "unknown_event",
            Notification::MalformedFrame(_) => "malformed",
            Notification::TruncatedFrame { .. } => "truncated",
        }
    }

    /// The underlying event, if this notification came from an event frame.
    pub fn event(&self) -> Option<&Event> {
        match self {
            Notification::Vendor { event, .. }
            | Notification::Core { event, .. }
            | Notification::Le { event, .. }
            | Notification::UnknownSubEvent { event, .. }
            | Notification::UnknownEvent(event) => Some(event),
            Notification::MalformedFrame(_) | Notification::TruncatedFrame { .. } => None,
        }
    }

    /// The registered name for core and LE events.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Notification::Core { name, .. } | Notification::Le { name, .. } => Some(*name),
            Notification::Vendor { header, .. } => header.and_then(|h| h.name()),
            _ => None,
        }
    }

    /// The protocol anomaly this notification reports, if any.
    pub fn anomaly(&self) -> Option<ProtocolError> {
        match self {
            Notification::UnknownSubEvent { sub_event, .. } => Some(ProtocolError::UnknownSubEvent(*sub_event)),
            Notification::UnknownEvent(event) => Some(ProtocolError::UnknownEventCode(event.code())),
            Notification::MalformedFrame(byte) => Some(ProtocolError::MalformedHeader(*byte)),
            Notification::TruncatedFrame { expected, bytes } => Some(ProtocolError::FrameTooShort {
                expected: *expected,
                actual: bytes.len(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Vendor { header: Some(header), .. } => match header.name() {
                Some(name) => write!(f, "Vendor specific event \"{}\"", name),
                None => write!(f, "Vendor specific event 0x{:04x}", header.opcode),
            },
            Notification::Vendor { header: None, .. } => write!(f, "Vendor specific event"),
            Notification::Core { name, .. } => write!(f, "Bluetooth event \"{}\"", name),
            Notification::Le { name, .. } => write!(f, "Bluetooth LE event \"{}\"", name),
            Notification::UnknownSubEvent { sub_event: Some(code), .. } => {
                write!(f, "Unknown LE sub-event code {:02x}", code)
            }
            Notification::UnknownSubEvent { sub_event: None, .. } => write!(f, "LE event without sub-event code"),
            Notification::UnknownEvent(event) => write!(f, "Unknown event code {:02x}", event.code()),
            Notification::MalformedFrame(byte) => write!(f, "wrong packet type {:02x}", byte),
            Notification::TruncatedFrame { expected, bytes } => {
                write!(f, "truncated frame ({} of {} bytes discarded)", bytes.len(), expected)
            }
        }
    }
}

/// Classify a decoded event against the code tables.
///
/// The vendor code is checked first, then the core table, then the LE meta
/// code.
pub fn classify(event: Event) -> Notification {
    let code = event.code();

    if code == EVENT_CODE_VENDOR {
        return Notification::Vendor {
            header: event.vendor_header(),
            event,
        };
    }

    if let Some(name) = core_event_name(code) {
        return Notification::Core { name, event };
    }

    if code == EVENT_CODE_LE_META {
        let sub_event = event.sub_event();
        return match sub_event.and_then(|sub| le_event_name(sub).map(|name| (sub, name))) {
            Some((sub_event, name)) => Notification::Le { sub_event, name, event },
            None => Notification::UnknownSubEvent { sub_event, event },
        };
    }

    Notification::UnknownEvent(event)
}
