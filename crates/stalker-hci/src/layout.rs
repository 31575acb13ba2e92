//! Parameter field layouts.
//!
//! A [`Layout`] is the ordered list of primitive fields that make up a frame's
//! parameter section. Every field is little-endian and packed with no padding,
//! so the encoded size is fully determined by the layout.
//!
//! Layouts can be written as struct-style format strings:
//!
//! ```text
//! B    u8
//! H    u16 (little-endian)
//! I/L  u32 (little-endian)
//! Ns   N-byte opaque string
//! ```
//!
//! A leading `<` is accepted and ignored, and a count before `B`, `H`, `I` or
//! `L` repeats the field (`3B` is `BBB`).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::MAX_PARAM_LEN;
use crate::error::ProtocolError;

/// A single primitive field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit little-endian integer.
    U16,
    /// Unsigned 32-bit little-endian integer.
    U32,
    /// Fixed-length opaque byte string.
    Bytes(usize),
}

impl FieldSpec {
    /// Encoded width in bytes.
    pub fn size(&self) -> usize {
        match self {
            FieldSpec::U8 => 1,
            FieldSpec::U16 => 2,
            FieldSpec::U32 => 4,
            FieldSpec::Bytes(len) => *len,
        }
    }
}

/// A value for one field of a [`Layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Opaque bytes.
    Bytes(Vec<u8>),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::U8(_) => "u8",
            FieldValue::U16(_) => "u16",
            FieldValue::U32(_) => "u32",
            FieldValue::Bytes(_) => "bytes",
        }
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::U8(v)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::U16(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::U32(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        FieldValue::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for FieldValue {
    fn from(v: [u8; N]) -> Self {
        FieldValue::Bytes(v.to_vec())
    }
}

/// Ordered field specs describing a parameter section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    fields: Vec<FieldSpec>,
}

impl Layout {
    /// Create a layout from field specs.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Layout { fields }
    }

    /// Parse a struct-style format string such as `"BB16s16sL"`.
    pub fn parse(format: &str) -> Result<Self, ProtocolError> {
        let invalid = |reason: &str| ProtocolError::InvalidFormat {
            format: format.to_string(),
            reason: reason.to_string(),
        };

        let body = format.strip_prefix('<').unwrap_or(format);
        let mut fields = Vec::new();
        let mut count: Option<usize> = None;
        let mut total: usize = 0;

        for ch in body.chars() {
            if let Some(digit) = ch.to_digit(10) {
                let next = count
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|c| c.checked_add(digit as usize))
                    .ok_or_else(|| invalid("count overflow"))?;
                count = Some(next);
                continue;
            }

            let spec = match ch {
                'B' => FieldSpec::U8,
                'H' => FieldSpec::U16,
                'I' | 'L' => FieldSpec::U32,
                's' => {
                    let len = count.take().unwrap_or(1);
                    total = grow_total(total, len)?;
                    fields.push(FieldSpec::Bytes(len));
                    continue;
                }
                c if c.is_whitespace() => {
                    if count.is_some() {
                        return Err(invalid("count not followed by a field"));
                    }
                    continue;
                }
                _ => return Err(invalid(&format!("unsupported field '{}'", ch))),
            };

            let repeat = count.take().unwrap_or(1);
            total = grow_total(total, spec.size().saturating_mul(repeat))?;
            fields.extend(std::iter::repeat(spec).take(repeat));
        }

        if count.is_some() {
            return Err(invalid("trailing count"));
        }

        Ok(Layout { fields })
    }

    /// The field specs, in order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Total encoded size of the parameter section.
    ///
    /// Saturates at `usize::MAX` for layouts built from oversized specs.
    pub fn size(&self) -> usize {
        self.fields
            .iter()
            .try_fold(0usize, |acc, spec| acc.checked_add(spec.size()))
            .unwrap_or(usize::MAX)
    }

    /// Pack values into a parameter section.
    ///
    /// Byte-string values shorter than their field are zero-padded and longer
    /// ones are truncated, so the output is always exactly [`Layout::size`]
    /// bytes.
    pub fn pack(&self, values: &[FieldValue]) -> Result<Bytes, ProtocolError> {
        if values.len() != self.fields.len() {
            return Err(ProtocolError::LayoutMismatch {
                index: values.len().min(self.fields.len()),
                reason: format!("layout has {} fields, got {} values", self.fields.len(), values.len()),
            });
        }

        let size = self.size();
        if size > MAX_PARAM_LEN {
            return Err(ProtocolError::ParamsTooLong {
                max: MAX_PARAM_LEN,
                actual: size,
            });
        }

        let mut buf = BytesMut::with_capacity(size);
        for (index, (spec, value)) in self.fields.iter().zip(values).enumerate() {
            match (spec, value) {
                (FieldSpec::U8, FieldValue::U8(v)) => buf.put_u8(*v),
                (FieldSpec::U16, FieldValue::U16(v)) => buf.put_u16_le(*v),
                (FieldSpec::U32, FieldValue::U32(v)) => buf.put_u32_le(*v),
                (FieldSpec::Bytes(len), FieldValue::Bytes(data)) => {
                    if data.len() != *len {
                        log::trace!(
                            "field {}: fitting {} bytes into {}-byte string",
                            index,
                            data.len(),
                            len
                        );
                    }
                    let take = data.len().min(*len);
                    buf.put_slice(&data[..take]);
                    buf.put_bytes(0, len - take);
                }
                (spec, value) => {
                    return Err(ProtocolError::LayoutMismatch {
                        index,
                        reason: format!("expected {:?}, got {} value", spec, value.kind()),
                    });
                }
            }
        }

        Ok(buf.freeze())
    }

    /// Unpack a parameter section into values.
    pub fn unpack(&self, params: &[u8]) -> Result<Vec<FieldValue>, ProtocolError> {
        let size = self.size();
        if params.len() != size {
            return Err(ProtocolError::LengthMismatch {
                declared: size,
                actual: params.len(),
            });
        }

        let mut buf = params;
        let values = self
            .fields
            .iter()
            .map(|spec| match spec {
                FieldSpec::U8 => FieldValue::U8(buf.get_u8()),
                FieldSpec::U16 => FieldValue::U16(buf.get_u16_le()),
                FieldSpec::U32 => FieldValue::U32(buf.get_u32_le()),
                FieldSpec::Bytes(len) => {
                    let data = buf[..*len].to_vec();
                    buf.advance(*len);
                    FieldValue::Bytes(data)
                }
            })
            .collect();

        Ok(values)
    }
}

/// Add `width` to a running parameter size, rejecting anything past the
/// one-byte length field.
fn grow_total(total: usize, width: usize) -> Result<usize, ProtocolError> {
    let grown = total.saturating_add(width);
    if grown > MAX_PARAM_LEN {
        return Err(ProtocolError::ParamsTooLong {
            max: MAX_PARAM_LEN,
            actual: grown,
        });
    }
    Ok(grown)
}

impl std::str::FromStr for Layout {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layout::parse(s)
    }
}
