//! Serial HCI framing for BLE radio modules
//!
//! This crate provides the wire layer for radios that speak an HCI-style
//! command/event protocol over a serial link. It builds and encodes command
//! frames, decodes event frames and classifies them against the Bluetooth
//! core and LE event tables. It does not implement any BLE stack logic.
//!
//! # Protocol Overview
//!
//! Every frame starts with a kind byte:
//!
//! - **Commands** (host → radio): `0x01`, 2-byte little-endian opcode
//! - **Events** (radio → host): `0x04`, 1-byte event code
//!
//! followed by a one-byte parameter length and the parameters, packed
//! little-endian per a [`Layout`].
//!
//! # Example
//!
//! ```rust
//! use stalker_hci::{classify, Command, Event, Notification};
//!
//! let cmd = Command::with_format(0xfe04, "BBB", &[3u8.into(), 1u8.into(), 0u8.into()])?;
//! assert_eq!(cmd.encode(), [0x01, 0x04, 0xfe, 0x03, 0x03, 0x01, 0x00]);
//!
//! let event = Event::decode(&[0x04, 0x3e, 0x01, 0x02])?;
//! assert_eq!(classify(event).name(), Some("LE Advertising Report"));
//! # Ok::<(), stalker_hci::ProtocolError>(())
//! ```

mod commands;
mod constants;
mod error;
mod events;
mod frame;
mod layout;

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use events::*;
pub use frame::*;
pub use layout::*;
