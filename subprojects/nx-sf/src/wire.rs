//! Wire-record descriptors for fixed-layout command payloads.
//!
//! Every command's raw input and output payload is described by a
//! [`Record`]: a name, a total size and an ordered list of [`Field`]s with
//! explicit offsets. One shared validator checks layout correctness for all
//! records, and the same descriptor drives encoding into a request payload
//! and decoding out of a response payload, so a record's layout is written
//! down exactly once.
//!
//! ```text
//! Record "SetConfigIn" (size 0x10)
//! ┌──────────────┬──────────┬──────────────────────┐
//! │ item: u32 @0 │ pad @4   │ value: u64 @8        │
//! └──────────────┴──────────┴──────────────────────┘
//! ```

/// A named field at a fixed byte offset within a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub size: usize,
}

impl Field {
    /// A `u8` field.
    pub const fn u8(name: &'static str, offset: usize) -> Self {
        Self { name, offset, size: 1 }
    }

    /// A `u16` field.
    pub const fn u16(name: &'static str, offset: usize) -> Self {
        Self { name, offset, size: 2 }
    }

    /// A `u32` field.
    pub const fn u32(name: &'static str, offset: usize) -> Self {
        Self { name, offset, size: 4 }
    }

    /// A `u64` field.
    pub const fn u64(name: &'static str, offset: usize) -> Self {
        Self { name, offset, size: 8 }
    }

    /// An opaque byte-array field (key material, hashes, counters).
    pub const fn bytes(name: &'static str, offset: usize, size: usize) -> Self {
        Self { name, offset, size }
    }

    const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// A fixed-size payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub name: &'static str,
    pub size: usize,
    pub fields: &'static [Field],
}

/// The payload of commands that send or return no raw data.
pub const EMPTY: Record = Record::new("Empty", 0, &[]);

impl Record {
    pub const fn new(name: &'static str, size: usize, fields: &'static [Field]) -> Self {
        Self { name, size, fields }
    }

    /// Checks that the layout is well formed.
    ///
    /// Fields must be declared in increasing offset order, must not overlap,
    /// must lie inside the record, and scalar fields (1, 2, 4 or 8 bytes)
    /// must be naturally aligned. Byte-array fields must be non-empty.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut prev_end = 0usize;

        for field in self.fields {
            let err = |kind| LayoutError {
                record: self.name,
                field: field.name,
                kind,
            };

            if field.size == 0 {
                return Err(err(LayoutErrorKind::Empty));
            }
            if field.offset < prev_end {
                return Err(err(LayoutErrorKind::Overlap));
            }
            if field.end() > self.size {
                return Err(err(LayoutErrorKind::OutOfBounds));
            }
            if is_scalar(field.size) && field.offset % field.size != 0 {
                return Err(err(LayoutErrorKind::Misaligned));
            }
            prev_end = field.end();
        }

        Ok(())
    }

    /// Encodes one value per field, in declaration order, into `out`.
    ///
    /// `out` must hold at least [`Record::size`] bytes; the first `size`
    /// bytes are overwritten and any padding between fields is zeroed.
    pub fn encode(&self, out: &mut [u8], values: &[Value<'_>]) -> Result<(), EncodeError> {
        let out = out
            .get_mut(..self.size)
            .ok_or(EncodeError::BufferTooSmall {
                record: self.name,
                needed: self.size,
            })?;

        if values.len() != self.fields.len() {
            return Err(EncodeError::ValueCount {
                record: self.name,
                expected: self.fields.len(),
                got: values.len(),
            });
        }

        out.fill(0);
        for (field, value) in self.fields.iter().zip(values) {
            let dst = &mut out[field.offset..field.end()];
            match *value {
                Value::U8(v) if field.size == 1 => dst[0] = v,
                Value::U16(v) if field.size == 2 => dst.copy_from_slice(&v.to_le_bytes()),
                Value::U32(v) if field.size == 4 => dst.copy_from_slice(&v.to_le_bytes()),
                Value::U64(v) if field.size == 8 => dst.copy_from_slice(&v.to_le_bytes()),
                Value::Bytes(v) if v.len() == field.size => dst.copy_from_slice(v),
                _ => {
                    return Err(EncodeError::WidthMismatch {
                        record: self.name,
                        field: field.name,
                    });
                }
            }
        }

        Ok(())
    }

    /// Borrows a decoded view of `data`.
    pub fn decode<'a>(&self, data: &'a [u8]) -> Result<Decoded<'a>, DecodeError> {
        let data = data.get(..self.size).ok_or(DecodeError::Truncated {
            record: self.name,
            needed: self.size,
            got: data.len(),
        })?;
        Ok(Decoded {
            record: *self,
            data,
        })
    }

    fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[inline]
const fn is_scalar(size: usize) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}

/// A value to encode into a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bytes(&'a [u8]),
}

/// A record decoded from a payload, with fields looked up by name.
///
/// Lookups of unknown names or of a name with a different width return
/// `None`.
#[derive(Debug, Clone, Copy)]
pub struct Decoded<'a> {
    record: Record,
    data: &'a [u8],
}

impl<'a> Decoded<'a> {
    pub fn u8(&self, name: &str) -> Option<u8> {
        self.array::<1>(name).map(|[b]| b)
    }

    pub fn u16(&self, name: &str) -> Option<u16> {
        self.array(name).map(u16::from_le_bytes)
    }

    pub fn u32(&self, name: &str) -> Option<u32> {
        self.array(name).map(u32::from_le_bytes)
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.array(name).map(u64::from_le_bytes)
    }

    /// The raw bytes of a field.
    pub fn bytes(&self, name: &str) -> Option<&'a [u8]> {
        let field = self.record.field(name)?;
        self.data.get(field.offset..field.end())
    }

    /// A field copied out as a fixed-size array.
    pub fn array<const N: usize>(&self, name: &str) -> Option<[u8; N]> {
        self.bytes(name)?.try_into().ok()
    }
}

/// A layout defect found by [`Record::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("record {record}: field {field}: {kind}")]
pub struct LayoutError {
    pub record: &'static str,
    pub field: &'static str,
    pub kind: LayoutErrorKind,
}

/// What [`Record::validate`] found wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutErrorKind {
    #[error("zero-sized")]
    Empty,
    #[error("overlaps or precedes the previous field")]
    Overlap,
    #[error("extends past the end of the record")]
    OutOfBounds,
    #[error("not naturally aligned")]
    Misaligned,
}

/// Error returned by [`Record::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("record {record}: output buffer needs {needed} bytes")]
    BufferTooSmall { record: &'static str, needed: usize },
    #[error("record {record}: expected {expected} values, got {got}")]
    ValueCount {
        record: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("record {record}: value width does not match field {field}")]
    WidthMismatch {
        record: &'static str,
        field: &'static str,
    },
}

/// Error returned by [`Record::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("record {record}: needs {needed} bytes, got {got}")]
    Truncated {
        record: &'static str,
        needed: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SET_CONFIG: Record = Record::new(
        "SetConfigIn",
        0x10,
        &[Field::u32("item", 0), Field::u64("value", 8)],
    );

    #[test]
    fn test_validate_accepts_natural_layout() {
        assert_eq!(SET_CONFIG.validate(), Ok(()));
        assert_eq!(EMPTY.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_packed_u64() {
        const PACKED: Record = Record::new(
            "Packed",
            0xC,
            &[Field::u32("item", 0), Field::u64("value", 4)],
        );
        let err = PACKED.validate().expect_err("misaligned");
        assert_eq!(err.field, "value");
        assert_eq!(err.kind, LayoutErrorKind::Misaligned);
    }

    #[test]
    fn test_validate_rejects_overlap_and_overflow() {
        const OVERLAP: Record = Record::new(
            "Overlap",
            0x20,
            &[Field::bytes("key", 0, 0x10), Field::u32("slot", 0xC)],
        );
        assert_eq!(
            OVERLAP.validate().map_err(|e| e.kind),
            Err(LayoutErrorKind::Overlap)
        );

        const OVERFLOW: Record = Record::new("Overflow", 0x10, &[Field::bytes("key", 8, 0x10)]);
        assert_eq!(
            OVERFLOW.validate().map_err(|e| e.kind),
            Err(LayoutErrorKind::OutOfBounds)
        );
    }

    #[test]
    fn test_encode_zero_fills_padding() {
        let mut out = [0xFFu8; 0x10];
        SET_CONFIG
            .encode(&mut out, &[Value::U32(5), Value::U64(0x0102_0304_0506_0708)])
            .expect("encodes");
        assert_eq!(&out[..4], &5u32.to_le_bytes());
        assert_eq!(&out[4..8], &[0; 4]);
        assert_eq!(&out[8..], &0x0102_0304_0506_0708u64.to_le_bytes());
    }

    #[test]
    fn test_encode_rejects_width_mismatch() {
        let mut out = [0u8; 0x10];
        let err = SET_CONFIG
            .encode(&mut out, &[Value::U64(5), Value::U64(1)])
            .expect_err("u64 into u32 field");
        assert!(matches!(err, EncodeError::WidthMismatch { field: "item", .. }));
    }

    #[test]
    fn test_decode_looks_up_fields_by_name() {
        let mut data = [0u8; 0x10];
        data[..4].copy_from_slice(&9u32.to_le_bytes());
        data[8..].copy_from_slice(&77u64.to_le_bytes());

        let decoded = SET_CONFIG.decode(&data).expect("long enough");
        assert_eq!(decoded.u32("item"), Some(9));
        assert_eq!(decoded.u64("value"), Some(77));
        assert_eq!(decoded.u64("item"), None);
        assert_eq!(decoded.u32("missing"), None);

        assert!(SET_CONFIG.decode(&data[..8]).is_err());
    }
}
