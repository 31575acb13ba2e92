//! Command builders.
//!
//! Each builder is plain data that produces a [`Command`] through the generic
//! layout encoder. Building has no side effects; hand the result to a session
//! to transmit it.

use crate::constants::*;
use crate::error::ProtocolError;
use crate::frame::Command;
use crate::layout::{FieldSpec, Layout};

/// GAP profile role: broadcaster.
pub const GAP_PROFILE_BROADCASTER: u8 = 0x01;
/// GAP profile role: observer.
pub const GAP_PROFILE_OBSERVER: u8 = 0x02;
/// GAP profile role: peripheral.
pub const GAP_PROFILE_PERIPHERAL: u8 = 0x04;
/// GAP profile role: central.
pub const GAP_PROFILE_CENTRAL: u8 = 0x08;

/// Discovery mode: non-discoverable scan.
pub const DISCOVERY_MODE_NONDISCOVERABLE: u8 = 0;
/// Discovery mode: general mode scan.
pub const DISCOVERY_MODE_GENERAL: u8 = 1;
/// Discovery mode: limited mode scan.
pub const DISCOVERY_MODE_LIMITED: u8 = 2;
/// Discovery mode: scan for all devices.
pub const DISCOVERY_MODE_ALL: u8 = 3;

/// GAP_DeviceInit parameters.
///
/// All-zero IRK/CSRK values ask the radio to generate random keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInit {
    /// Bitmask of `GAP_PROFILE_*` roles.
    pub profile_role: u8,
    /// Advertisement report buffers to allocate (central/observer only).
    pub max_scan_responses: u8,
    /// Identity Resolving Key.
    pub irk: [u8; 16],
    /// Connection Signature Resolving Key.
    pub csrk: [u8; 16],
    /// Initial signature counter.
    pub sign_counter: u32,
}

impl Default for DeviceInit {
    fn default() -> Self {
        DeviceInit {
            profile_role: GAP_PROFILE_CENTRAL,
            max_scan_responses: 0x03,
            irk: [0; 16],
            csrk: [0; 16],
            sign_counter: 0x01,
        }
    }
}

impl DeviceInit {
    /// Build the GAP_DeviceInit command.
    pub fn build(&self) -> Result<Command, ProtocolError> {
        Command::with_format(
            OPCODE_GAP_DEVICE_INIT,
            "BB16s16sL",
            &[
                self.profile_role.into(),
                self.max_scan_responses.into(),
                self.irk.into(),
                self.csrk.into(),
                self.sign_counter.into(),
            ],
        )
    }
}

/// GAP_DeviceDiscoveryRequest parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDiscovery {
    /// One of the `DISCOVERY_MODE_*` values.
    pub mode: u8,
    /// Send SCAN_REQ (1) or not (0).
    pub active_scan: u8,
    /// Restrict the scan to the white list (1) or not (0).
    pub white_list: u8,
}

impl Default for DeviceDiscovery {
    fn default() -> Self {
        DeviceDiscovery {
            mode: DISCOVERY_MODE_ALL,
            active_scan: 1,
            white_list: 0,
        }
    }
}

impl DeviceDiscovery {
    /// Build the GAP_DeviceDiscoveryRequest command.
    pub fn build(&self) -> Result<Command, ProtocolError> {
        Command::with_format(
            OPCODE_GAP_DEVICE_DISCOVERY_REQUEST,
            "BBB",
            &[self.mode.into(), self.active_scan.into(), self.white_list.into()],
        )
    }
}

/// GATT_DiscCharsByUUID parameters.
///
/// Discovers characteristics of a known UUID within a handle range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscCharsByUuid {
    /// Connection handle of the link ([`LOOPBACK_CONNECTION_HANDLE`] loops back).
    pub connection_handle: u16,
    /// First requested handle.
    pub start_handle: u16,
    /// Last requested handle.
    pub end_handle: u16,
    /// 2- or 16-byte characteristic UUID.
    pub char_type: Vec<u8>,
}

impl DiscCharsByUuid {
    /// Build the GATT_DiscCharsByUUID command.
    pub fn build(&self) -> Result<Command, ProtocolError> {
        if !matches!(self.char_type.len(), 2 | 16) {
            return Err(ProtocolError::LayoutMismatch {
                index: 3,
                reason: format!("UUID must be 2 or 16 bytes, got {}", self.char_type.len()),
            });
        }

        let layout = Layout::new(vec![
            FieldSpec::U16,
            FieldSpec::U16,
            FieldSpec::U16,
            FieldSpec::Bytes(self.char_type.len()),
        ]);
        Command::new(
            OPCODE_GATT_DISC_CHARS_BY_UUID,
            &layout,
            &[
                self.connection_handle.into(),
                self.start_handle.into(),
                self.end_handle.into(),
                self.char_type.clone().into(),
            ],
        )
    }
}
