//! Bounds-checked little-endian byte cursor.
//!
//! [`ByteReader`] walks a borrowed slice and fails with
//! [`ParError::OutOfBounds`] instead of panicking when a read would cross
//! the end of the buffer.  [`ByteWriter`] appends to an owned `Vec<u8>` and
//! cannot fail except when a length prefix would not fit in 32 bits.
//!
//! # Strings
//! The container stores strings as a `u32` byte count followed by that many
//! bytes, with no terminator.  Each byte maps to the char with the same
//! code point (ISO-8859-1), so decoding never fails and every decoded
//! string encodes back to its original bytes.  Encoding writes `?` for
//! chars above U+00FF, which only hand-built strings can contain, and
//! re-derives the length from the bytes actually written.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::ParError;

/// Upper bound on a declared string length.  Anything larger is treated as
/// garbage rather than allocated.
pub const MAX_STRING_LEN: u32 = 1_000_000;

// ── Reader ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    #[inline]
    pub fn position(&self) -> usize { self.pos }

    #[inline]
    pub fn remaining(&self) -> usize { self.data.len() - self.pos }

    /// Everything not yet consumed.  Does not advance.
    pub fn rest(&self) -> &'a [u8] { &self.data[self.pos..] }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ParError> {
        if n > self.remaining() {
            return Err(ParError::OutOfBounds {
                offset:    self.pos,
                requested: n,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ParError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, ParError> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ParError> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ParError> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ParError> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ParError> {
        Ok(LittleEndian::read_i64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ParError> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    /// Read a length-prefixed string.
    pub fn read_string(&mut self) -> Result<String, ParError> {
        let offset = self.pos;
        let length = self.read_u32()?;
        if length > MAX_STRING_LEN {
            return Err(ParError::CorruptLength { offset, length });
        }
        let raw = self.read_bytes(length as usize)?;
        Ok(raw
            .iter()
            .map(|&b| char::from(b))
            .collect())
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    #[inline]
    pub fn len(&self) -> usize { self.buf.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }

    pub fn into_inner(self) -> Vec<u8> { self.buf }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, v);
        self.write_bytes(&b);
    }

    pub fn write_i16(&mut self, v: i16) {
        let mut b = [0u8; 2];
        LittleEndian::write_i16(&mut b, v);
        self.write_bytes(&b);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, v);
        self.write_bytes(&b);
    }

    pub fn write_i32(&mut self, v: i32) {
        let mut b = [0u8; 4];
        LittleEndian::write_i32(&mut b, v);
        self.write_bytes(&b);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut b = [0u8; 8];
        LittleEndian::write_u64(&mut b, v);
        self.write_bytes(&b);
    }

    pub fn write_i64(&mut self, v: i64) {
        let mut b = [0u8; 8];
        LittleEndian::write_i64(&mut b, v);
        self.write_bytes(&b);
    }

    pub fn write_f32(&mut self, v: f32) {
        let mut b = [0u8; 4];
        LittleEndian::write_f32(&mut b, v);
        self.write_bytes(&b);
    }

    /// Write a length-prefixed string.
    pub fn write_string(&mut self, s: &str) -> Result<(), ParError> {
        let encoded: Vec<u8> = s
            .chars()
            .map(|c| u8::try_from(c).unwrap_or(b'?'))
            .collect();
        let len = u32::try_from(encoded.len())
            .map_err(|_| ParError::Overflow { what: "string", len: encoded.len() })?;
        self.write_u32(len);
        self.write_bytes(&encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_scalars() {
        let data = [
            0x01,
            0xFF,
            0x34, 0x12,
            0x78, 0x56, 0x34, 0x12,
            0x00, 0x00, 0x80, 0x3F,
            0x01, 0, 0, 0, 0, 0, 0, 0,
        ];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_i8().unwrap(), -1);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(r.read_f32().unwrap(), 1.0);
        assert_eq!(r.read_u64().unwrap(), 1);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn read_past_end_reports_offset_and_size() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        r.read_u8().unwrap();
        match r.read_u32() {
            Err(ParError::OutOfBounds { offset, requested, available }) => {
                assert_eq!(offset, 1);
                assert_eq!(requested, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected OutOfBounds, got {other:?}"),
        }
        // A failed read does not advance.
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn huge_string_length_is_corrupt() {
        let mut w = ByteWriter::new();
        w.write_u32(MAX_STRING_LEN + 1);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.read_string(),
            Err(ParError::CorruptLength { offset: 0, length }) if length == MAX_STRING_LEN + 1
        ));
    }

    #[test]
    fn high_bytes_survive_a_string_round_trip() {
        let data = [5, 0, 0, 0, b'K', 0xE4, b'f', b'e', b'r'];
        let mut r = ByteReader::new(&data);
        let name = r.read_string().unwrap();
        assert_eq!(name, "K\u{E4}fer");

        let mut w = ByteWriter::new();
        w.write_string(&name).unwrap();
        assert_eq!(w.into_inner(), data);
    }

    #[test]
    fn every_byte_value_round_trips() {
        let mut data = vec![0, 1, 0, 0];
        data.extend(0..=255u8);
        let s = ByteReader::new(&data).read_string().unwrap();
        let mut w = ByteWriter::new();
        w.write_string(&s).unwrap();
        assert_eq!(w.into_inner(), data);
    }

    #[test]
    fn string_encoding_derives_length_from_bytes() {
        let mut w = ByteWriter::new();
        w.write_string("Orc01").unwrap();
        w.write_string("é\u{2192}").unwrap();
        w.write_string("").unwrap();
        assert_eq!(
            w.into_inner(),
            [5, 0, 0, 0, b'O', b'r', b'c', b'0', b'1', 2, 0, 0, 0, 0xE9, b'?', 0, 0, 0, 0]
        );
    }

    #[test]
    fn writer_matches_reader() {
        let mut w = ByteWriter::new();
        w.write_i32(-42);
        w.write_i16(-2);
        w.write_i64(-7);
        w.write_f32(0.25);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_i32().unwrap(), -42);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_i64().unwrap(), -7);
        assert_eq!(r.read_f32().unwrap(), 0.25);
    }
}
