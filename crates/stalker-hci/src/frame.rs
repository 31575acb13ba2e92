//! Frame encoding/decoding.
//!
//! Both frame kinds share one header shape: a kind byte, a code, and a
//! one-byte parameter length followed by the parameters.
//!
//! ```text
//! Command:  +------+-----------+-----------+-----+----------------+
//!           | 0x01 | opcode_lo | opcode_hi | len | params[0..len] |
//!           +------+-----------+-----------+-----+----------------+
//!
//! Event:    +------+------+-----+----------------+
//!           | 0x04 | code | len | params[0..len] |
//!           +------+------+-----+----------------+
//! ```

use std::fmt;

use bytes::{BufMut, Bytes};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::layout::{FieldValue, Layout};

/// A command frame (host → radio).
///
/// Built once and then consumed by transmission; the parameter bytes are
/// already packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: u16,
    params: Bytes,
}

impl Command {
    /// Build a command by packing `values` according to `layout`.
    pub fn new(opcode: u16, layout: &Layout, values: &[FieldValue]) -> Result<Self, ProtocolError> {
        let params = layout.pack(values)?;
        Ok(Command { opcode, params })
    }

    /// Build a command from a struct-style format string, e.g. `"BBB"`.
    pub fn with_format(opcode: u16, format: &str, values: &[FieldValue]) -> Result<Self, ProtocolError> {
        Command::new(opcode, &Layout::parse(format)?, values)
    }

    /// Build a command from already packed parameters.
    pub fn from_params(opcode: u16, params: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let params = params.into();
        check_param_len(params.len())?;
        Ok(Command { opcode, params })
    }

    /// The 16-bit opcode.
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    /// The packed parameter bytes.
    pub fn params(&self) -> &Bytes {
        &self.params
    }

    /// Unpack the parameters with a caller-supplied layout.
    pub fn unpack(&self, layout: &Layout) -> Result<Vec<FieldValue>, ProtocolError> {
        layout.unpack(&self.params)
    }

    /// Encode the command to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(COMMAND_HEADER_SIZE + self.params.len());
        buf.put_u8(FRAME_KIND_COMMAND);
        buf.put_u16_le(self.opcode);
        buf.put_u8(self.params.len() as u8);
        buf.extend_from_slice(&self.params);
        buf
    }

    /// Decode a complete command frame.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (header, params) = split_frame(data, FRAME_KIND_COMMAND, COMMAND_HEADER_SIZE)?;
        Ok(Command {
            opcode: u16::from_le_bytes([header[1], header[2]]),
            params: Bytes::copy_from_slice(params),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command(opcode=0x{:04X}, len={})", self.opcode, self.params.len())
    }
}

/// An event frame (radio → host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    code: u8,
    params: Bytes,
}

/// The opcode and status that lead the parameters of a vendor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorHeader {
    /// Vendor event opcode (e.g. 0x0600 GAP_DeviceInitDone).
    pub opcode: u16,
    /// Status byte following the opcode, if present.
    pub status: Option<u8>,
}

impl VendorHeader {
    /// Registered name of the vendor opcode.
    pub fn name(&self) -> Option<&'static str> {
        vendor_event_name(self.opcode)
    }
}

impl Event {
    /// Build an event from a code and packed parameters.
    pub fn new(code: u8, params: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let params = params.into();
        check_param_len(params.len())?;
        Ok(Event { code, params })
    }

    /// Build an event by packing `values` according to `layout`.
    pub fn with_layout(code: u8, layout: &Layout, values: &[FieldValue]) -> Result<Self, ProtocolError> {
        let params = layout.pack(values)?;
        Ok(Event { code, params })
    }

    /// The event code.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// The raw parameter bytes.
    pub fn params(&self) -> &Bytes {
        &self.params
    }

    /// LE sub-event code, for LE meta events with at least one parameter byte.
    pub fn sub_event(&self) -> Option<u8> {
        if self.code == EVENT_CODE_LE_META {
            self.params.first().copied()
        } else {
            None
        }
    }

    /// Opcode/status header of a vendor event, when the parameters carry one.
    pub fn vendor_header(&self) -> Option<VendorHeader> {
        if self.code != EVENT_CODE_VENDOR || self.params.len() < 2 {
            return None;
        }
        Some(VendorHeader {
            opcode: u16::from_le_bytes([self.params[0], self.params[1]]),
            status: self.params.get(2).copied(),
        })
    }

    /// Unpack the parameters with a caller-supplied layout.
    pub fn unpack(&self, layout: &Layout) -> Result<Vec<FieldValue>, ProtocolError> {
        layout.unpack(&self.params)
    }

    /// Encode the event to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(EVENT_HEADER_SIZE + self.params.len());
        buf.put_u8(FRAME_KIND_EVENT);
        buf.put_u8(self.code);
        buf.put_u8(self.params.len() as u8);
        buf.extend_from_slice(&self.params);
        buf
    }

    /// Decode a complete event frame.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (header, params) = split_frame(data, FRAME_KIND_EVENT, EVENT_HEADER_SIZE)?;
        Ok(Event {
            code: header[1],
            params: Bytes::copy_from_slice(params),
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event(code=0x{:02X}, len={})", self.code, self.params.len())
    }
}

/// Either frame kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Host → radio command.
    Command(Command),
    /// Radio → host event.
    Event(Event),
}

impl Frame {
    /// The kind byte this frame is encoded with.
    pub fn kind(&self) -> u8 {
        match self {
            Frame::Command(_) => FRAME_KIND_COMMAND,
            Frame::Event(_) => FRAME_KIND_EVENT,
        }
    }

    /// Encode the frame to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Command(cmd) => cmd.encode(),
            Frame::Event(event) => event.encode(),
        }
    }
}

impl From<Command> for Frame {
    fn from(cmd: Command) -> Self {
        Frame::Command(cmd)
    }
}

impl From<Event> for Frame {
    fn from(event: Event) -> Self {
        Frame::Event(event)
    }
}

/// Decode a complete frame, picking the variant from the leading byte.
pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
    match data.first() {
        Some(&FRAME_KIND_COMMAND) => Command::decode(data).map(Frame::Command),
        Some(&FRAME_KIND_EVENT) => Event::decode(data).map(Frame::Event),
        Some(&kind) => Err(ProtocolError::MalformedHeader(kind)),
        None => Err(ProtocolError::FrameTooShort {
            expected: 1,
            actual: 0,
        }),
    }
}

fn check_param_len(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_PARAM_LEN {
        return Err(ProtocolError::ParamsTooLong {
            max: MAX_PARAM_LEN,
            actual: len,
        });
    }
    Ok(())
}

/// Validate kind and length, returning (header, params).
fn split_frame(data: &[u8], kind: u8, header_size: usize) -> Result<(&[u8], &[u8]), ProtocolError> {
    match data.first() {
        None => {
            return Err(ProtocolError::FrameTooShort {
                expected: header_size,
                actual: 0,
            })
        }
        Some(&actual) if actual != kind => {
            return Err(ProtocolError::TypeKindMismatch { expected: kind, actual });
        }
        Some(_) => {}
    }

    if data.len() < header_size {
        return Err(ProtocolError::FrameTooShort {
            expected: header_size,
            actual: data.len(),
        });
    }

    let (header, params) = data.split_at(header_size);
    let declared = header[header_size - 1] as usize;
    if params.len() != declared {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: params.len(),
        });
    }

    Ok((header, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_command_bytes() {
        let cmd = Command::with_format(0xfe04, "BBB", &[3u8.into(), 1u8.into(), 0u8.into()]).unwrap();
        assert_eq!(cmd.encode(), vec![0x01, 0x04, 0xfe, 0x03, 0x03, 0x01, 0x00]);
    }

    #[test]
    fn test_command_round_trip() {
        let layout = Layout::parse("HHH2s").unwrap();
        let cmd = Command::new(
            0xfd88,
            &layout,
            &[0x0000u16.into(), 0x0001u16.into(), 0xffffu16.into(), vec![0x00, 0x2a].into()],
        )
        .unwrap();

        let decoded = Command::decode(&cmd.encode()).unwrap();
        assert_eq!(decoded.opcode(), 0xfd88);
        assert_eq!(decoded.params(), cmd.params());
        assert_eq!(decoded.unpack(&layout).unwrap()[3], FieldValue::Bytes(vec![0x00, 0x2a]));
    }

    #[test]
    fn test_empty_command() {
        let cmd = Command::from_params(0x1234, Vec::<u8>::new()).unwrap();
        assert_eq!(cmd.encode(), vec![0x01, 0x34, 0x12, 0x00]);
        assert_eq!(Command::decode(&cmd.encode()).unwrap(), cmd);
    }

    #[test]
    fn test_event_encode_decode() {
        let event = Event::new(0x3e, vec![0x02, 0x01]).unwrap();
        let bytes = event.encode();
        assert_eq!(bytes, vec![0x04, 0x3e, 0x02, 0x02, 0x01]);

        let decoded = Event::decode(&bytes).unwrap();
        assert_eq!(decoded.code(), 0x3e);
        assert_eq!(decoded.sub_event(), Some(0x02));
    }

    #[test]
    fn test_kind_mismatch() {
        let cmd = Command::from_params(0xfe00, vec![1]).unwrap().encode();
        assert_eq!(
            Event::decode(&cmd).unwrap_err(),
            ProtocolError::TypeKindMismatch { expected: 0x04, actual: 0x01 }
        );

        let event = Event::new(0x05, Vec::<u8>::new()).unwrap().encode();
        assert_eq!(
            Command::decode(&event).unwrap_err(),
            ProtocolError::TypeKindMismatch { expected: 0x01, actual: 0x04 }
        );
    }

    #[test]
    fn test_decode_dispatches_on_kind() {
        let cmd = Command::from_params(0xfe04, vec![3, 1, 0]).unwrap();
        let event = Event::new(0x0e, vec![0x01]).unwrap();

        assert_eq!(decode(&cmd.encode()).unwrap(), Frame::Command(cmd.clone()));
        assert_eq!(decode(&event.encode()).unwrap(), Frame::Event(event));
        assert_eq!(decode(&[0x02, 0x00]).unwrap_err(), ProtocolError::MalformedHeader(0x02));
        assert!(matches!(decode(&[]), Err(ProtocolError::FrameTooShort { .. })));
        assert_eq!(Frame::from(cmd).kind(), FRAME_KIND_COMMAND);
    }

    #[test]
    fn test_length_checks() {
        assert!(matches!(
            Event::decode(&[0x04, 0x05]),
            Err(ProtocolError::FrameTooShort { expected: 3, actual: 2 })
        ));
        assert_eq!(
            Event::decode(&[0x04, 0x05, 0x02, 0x00]).unwrap_err(),
            ProtocolError::LengthMismatch { declared: 2, actual: 1 }
        );
        assert!(matches!(
            Command::from_params(0x0001, vec![0u8; 256]),
            Err(ProtocolError::ParamsTooLong { .. })
        ));
    }

    #[test]
    fn test_vendor_header() {
        let event = Event::new(0xff, vec![0x00, 0x06, 0x00, 0xaa]).unwrap();
        let header = event.vendor_header().unwrap();
        assert_eq!(header.opcode, 0x0600);
        assert_eq!(header.status, Some(0x00));
        assert_eq!(header.name(), Some("GAP_DeviceInitDone"));

        assert!(Event::new(0xff, vec![0x01]).unwrap().vendor_header().is_none());
        assert!(Event::new(0x0e, vec![0x00, 0x06]).unwrap().vendor_header().is_none());
    }
}
