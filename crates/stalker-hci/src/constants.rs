//! Protocol constants
//!
//! Frame kind tags, opcodes and the fixed event code tables used by the
//! serial HCI transport. The tables must match the radio firmware byte for
//! byte, so entries are never renamed.

// ============================================================================
// Frame Kinds
// ============================================================================

/// Leading byte of a command frame (host → radio).
pub const FRAME_KIND_COMMAND: u8 = 0x01;
/// Leading byte of an event frame (radio → host).
pub const FRAME_KIND_EVENT: u8 = 0x04;

/// Command header: kind + 2-byte opcode + length.
pub const COMMAND_HEADER_SIZE: usize = 4;
/// Event header: kind + event code + length.
pub const EVENT_HEADER_SIZE: usize = 3;
/// The length field is a single byte.
pub const MAX_PARAM_LEN: usize = u8::MAX as usize;

// ============================================================================
// Event Codes
// ============================================================================

/// Core event carrying an LE sub-event in its first parameter byte.
pub const EVENT_CODE_LE_META: u8 = 0x3e;
/// Vendor specific event.
pub const EVENT_CODE_VENDOR: u8 = 0xff;

/// Bluetooth core event codes.
pub const BLUETOOTH_EVENTS: &[(u8, &str)] = &[
    (0x05, "Disconnection Complete"),
    (0x08, "Encryption Change"),
    (0x0c, "Read Remote Version Information Complete"),
    (0x0e, "Command Complete"),
    (0x0f, "Command Status"),
    (0x10, "Hardware Error (optional)"),
    (0x13, "Number Of Completed Packets"),
    (0x1a, "Data Buffer Overflow"),
    (0x30, "Encryption Key Refresh Complete"),
];

/// LE sub-event codes, found under [`EVENT_CODE_LE_META`].
pub const BLUETOOTH_LE_EVENTS: &[(u8, &str)] = &[
    (0x01, "LE Connection Complete"),
    (0x02, "LE Advertising Report"),
    (0x03, "LE Connection Update Complete"),
    (0x04, "LE Read Remote Used Features Complete"),
    (0x05, "LE Long Term Key Requested"),
];

/// Vendor event opcodes reported inside [`EVENT_CODE_VENDOR`] frames.
pub const VENDOR_EVENTS: &[(u16, &str)] = &[
    (0x0600, "GAP_DeviceInitDone"),
    (0x0601, "GAP_DeviceDiscovery"),
    (0x0602, "GAP_AdvertDataUpdateDone"),
    (0x0603, "GAP_MakeDiscoverableDone"),
    (0x0604, "GAP_EndDiscoverableDone"),
    (0x0605, "GAP_LinkEstablished"),
    (0x0606, "GAP_LinkTerminated"),
    (0x0607, "GAP_LinkParamUpdate"),
    (0x0608, "GAP_RandomAddrChanged"),
    (0x0609, "GAP_SignatureUpdated"),
    (0x060a, "GAP_AuthenticationComplete"),
    (0x060b, "GAP_PasskeyNeeded"),
    (0x060c, "GAP_SlaveRequestedSecurity"),
    (0x060d, "GAP_DeviceInformation"),
    (0x060e, "GAP_BondComplete"),
    (0x060f, "GAP_PairingRequested"),
    (0x067f, "CommandStatus"),
];

// ============================================================================
// Status Codes
// ============================================================================

/// Status values carried by ATT events.
pub const ATT_EVENT_STATUS: &[(u8, &str)] = &[
    (0x00, "Success"),
    (0x14, "BLENotConnected"),
    (0x17, "BLETimeout"),
    (0x1a, "BLEProcedureComplete"),
];

/// Status values returned in the Command Status event for GATT commands.
pub const GATT_COMMAND_STATUS: &[(u8, &str)] = &[
    (0x00, "SUCCESS"),
    (0x02, "INVALIDPARAMETER"),
    (0x04, "MSG_BUFFER_NOT_AVAIL"),
    (0x13, "bleMemAllocError"),
    (0x14, "bleNotConnected"),
    (0x40, "bleInvalidPDU"),
];

// ============================================================================
// Command Opcodes
// ============================================================================

/// GAP_DeviceInit.
pub const OPCODE_GAP_DEVICE_INIT: u16 = 0xfe00;
/// GAP_DeviceDiscoveryRequest.
pub const OPCODE_GAP_DEVICE_DISCOVERY_REQUEST: u16 = 0xfe04;
/// GATT_DiscCharsByUUID.
pub const OPCODE_GATT_DISC_CHARS_BY_UUID: u16 = 0xfd88;

/// Connection handle that loops GATT commands back to the local host.
pub const LOOPBACK_CONNECTION_HANDLE: u16 = 0xfffe;

// ============================================================================
// Lookups
// ============================================================================

fn lookup<K: PartialEq + Copy>(table: &'static [(K, &'static str)], key: K) -> Option<&'static str> {
    table.iter().find(|(code, _)| *code == key).map(|(_, name)| *name)
}

/// Name of a core event code, if registered.
pub fn core_event_name(code: u8) -> Option<&'static str> {
    lookup(BLUETOOTH_EVENTS, code)
}

/// Name of an LE sub-event code, if registered.
pub fn le_event_name(sub_event: u8) -> Option<&'static str> {
    lookup(BLUETOOTH_LE_EVENTS, sub_event)
}

/// Name of a vendor event opcode, if registered.
pub fn vendor_event_name(opcode: u16) -> Option<&'static str> {
    lookup(VENDOR_EVENTS, opcode)
}

/// Name of an ATT event status.
pub fn att_status_name(status: u8) -> Option<&'static str> {
    lookup(ATT_EVENT_STATUS, status)
}

/// Name of a GATT command status.
pub fn gatt_status_name(status: u8) -> Option<&'static str> {
    lookup(GATT_COMMAND_STATUS, status)
}
