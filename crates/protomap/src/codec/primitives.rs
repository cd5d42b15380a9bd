//! Wire primitives: varints, zigzag, fixed-width numbers and tags.

use bytes::Bytes;

use crate::error::DecodeError;
use crate::limits::{MAX_FIELD_NUMBER, MAX_MESSAGE_SIZE, MAX_VARINT_BYTES};

/// Wire type of an encoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    /// Length-delimited: strings, bytes, messages, packed repeated fields.
    Len = 2,
    Fixed32 = 5,
}

// =============================================================================
// DECODING
// =============================================================================

/// Reader over a shared buffer.
///
/// Length-delimited payloads are returned as slices of the same buffer, so
/// bytes fields and nested messages are decoded without copying.
#[derive(Debug, Clone)]
pub struct Reader {
    data: Bytes,
    pos: usize,
}

impl Reader {
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly `n` bytes as a zero-copy slice.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<Bytes, DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(
        &mut self,
        context: &'static str,
    ) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        if N > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    /// Reads an unsigned varint (LEB128).
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let mut result: u64 = 0;
        let mut shift = 0;

        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u64;

            if shift == 63 && value > 1 {
                return Err(DecodeError::VarintOverflow);
            }
            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(DecodeError::VarintTooLong)
    }

    /// Reads a zigzag-encoded signed varint.
    pub fn read_signed_varint(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        Ok(zigzag_decode(self.read_varint(context)?))
    }

    pub fn read_fixed32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_fixed64(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a length-prefixed payload.
    pub fn read_len_delimited(&mut self, field: &'static str) -> Result<Bytes, DecodeError> {
        let len = self.read_varint(field)?;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        if len > MAX_MESSAGE_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        self.read_bytes(len, field)
    }

    /// Reads a field tag.
    pub fn read_tag(&mut self) -> Result<(u32, WireType), DecodeError> {
        let key = self.read_varint("tag")?;
        let number = key >> 3;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(DecodeError::InvalidFieldNumber { number });
        }
        let number = number as u32;
        let wire_type = match (key & 0x07) as u8 {
            0 => WireType::Varint,
            1 => WireType::Fixed64,
            2 => WireType::Len,
            5 => WireType::Fixed32,
            wire_type @ (3 | 4) => return Err(DecodeError::UnsupportedWireType { wire_type }),
            wire_type => return Err(DecodeError::InvalidWireType { number, wire_type }),
        };
        Ok((number, wire_type))
    }

    /// Skips over one field payload of the given wire type.
    pub fn skip(&mut self, wire_type: WireType) -> Result<(), DecodeError> {
        match wire_type {
            WireType::Varint => {
                self.read_varint("skipped field")?;
            }
            WireType::Fixed64 => {
                self.read_fixed64("skipped field")?;
            }
            WireType::Len => {
                self.read_len_delimited("skipped field")?;
            }
            WireType::Fixed32 => {
                self.read_fixed32("skipped field")?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding wire data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes an unsigned varint (LEB128).
    #[inline]
    pub fn write_varint(&mut self, mut value: u64) {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes a zigzag-encoded signed varint.
    pub fn write_signed_varint(&mut self, value: i64) {
        self.write_varint(zigzag_encode(value));
    }

    pub fn write_fixed32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a length-prefixed payload.
    pub fn write_len_delimited(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_tag(&mut self, number: u32, wire_type: WireType) {
        self.write_varint((u64::from(number) << 3) | wire_type as u64);
    }
}

// =============================================================================
// ZIGZAG ENCODING
// =============================================================================

/// Maps signed integers to unsigned so small magnitudes stay short:
/// 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...
#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(writer: Writer) -> Reader {
        Reader::new(Bytes::from(writer.into_bytes()))
    }

    #[test]
    fn test_zigzag_values() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        for v in [i64::MIN, -300, 0, 300, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn test_varint_boundaries() {
        for v in [0u64, 1, 127, 128, 300, 16_384, u64::from(u32::MAX), u64::MAX] {
            let mut writer = Writer::new();
            writer.write_varint(v);
            assert_eq!(reader(writer).read_varint("test").unwrap(), v, "failed for {}", v);
        }

        let mut writer = Writer::new();
        writer.write_varint(300);
        assert_eq!(writer.as_bytes(), &[0xac, 0x02]);
    }

    #[test]
    fn test_varint_errors() {
        let mut r = Reader::new(Bytes::from_static(&[0x80; 11]));
        assert_eq!(r.read_varint("test"), Err(DecodeError::VarintTooLong));

        let mut overflow = vec![0xff; 9];
        overflow.push(0x02);
        let mut r = Reader::new(Bytes::from(overflow));
        assert_eq!(r.read_varint("test"), Err(DecodeError::VarintOverflow));

        let mut r = Reader::new(Bytes::from_static(&[0x80]));
        assert!(matches!(r.read_varint("test"), Err(DecodeError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_tags() {
        let mut writer = Writer::new();
        writer.write_tag(1, WireType::Len);
        writer.write_tag(MAX_FIELD_NUMBER, WireType::Fixed32);
        assert_eq!(writer.as_bytes()[0], 0x0a);

        let mut r = reader(writer);
        assert_eq!(r.read_tag().unwrap(), (1, WireType::Len));
        assert_eq!(r.read_tag().unwrap(), (MAX_FIELD_NUMBER, WireType::Fixed32));

        let mut r = Reader::new(Bytes::from_static(&[0x0b]));
        assert_eq!(r.read_tag(), Err(DecodeError::UnsupportedWireType { wire_type: 3 }));
        let mut r = Reader::new(Bytes::from_static(&[0x0e]));
        assert_eq!(r.read_tag(), Err(DecodeError::InvalidWireType { number: 1, wire_type: 6 }));
        let mut r = Reader::new(Bytes::from_static(&[0x02]));
        assert_eq!(r.read_tag(), Err(DecodeError::InvalidFieldNumber { number: 0 }));
    }

    #[test]
    fn test_len_delimited_is_zero_copy() {
        let mut writer = Writer::new();
        writer.write_len_delimited(b"hello");
        writer.write_fixed64(42);
        let data = Bytes::from(writer.into_bytes());

        let mut r = Reader::new(data.clone());
        let payload = r.read_len_delimited("test").unwrap();
        assert_eq!(&payload[..], b"hello");
        assert_eq!(payload.as_ptr(), data[1..].as_ptr());
        assert_eq!(r.read_fixed64("test").unwrap(), 42);
        assert!(r.is_empty());
    }

    #[test]
    fn test_skip_and_eof() {
        let mut writer = Writer::new();
        writer.write_fixed32(7);
        writer.write_varint(u64::MAX);
        writer.write_len_delimited(&[1, 2, 3]);
        let mut r = reader(writer);
        r.skip(WireType::Fixed32).unwrap();
        r.skip(WireType::Varint).unwrap();
        r.skip(WireType::Len).unwrap();
        assert!(r.is_empty());

        let mut r = Reader::new(Bytes::from_static(&[0x05, 1, 2]));
        assert!(matches!(
            r.read_len_delimited("test"),
            Err(DecodeError::UnexpectedEof { context: "test" })
        ));
    }
}
