//! Error taxonomy for the container codec.
//!
//! Every variant is fatal for the operation that produced it: malformed
//! input is not a transient condition, so nothing here is retried.
//! Offsets are byte positions inside the *decompressed* container.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParError {
    /// A read would run past the end of the buffer.
    #[error("read past end at offset 0x{offset:X}: need {requested} bytes, {available} available")]
    OutOfBounds {
        offset:    usize,
        requested: usize,
        available: usize,
    },
    /// A length prefix is larger than any sane string in a parameter file.
    #[error("implausible string length {length} at offset 0x{offset:X}")]
    CorruptLength { offset: usize, length: u32 },
    #[error("not a PAR container (header {found:02X?}, expected \"PAR\\0\")")]
    BadMagic { found: Vec<u8> },
    /// The value width of an unknown type tag is unknown, so parsing stops here.
    #[error("unknown field type {tag} at offset 0x{offset:X}")]
    UnknownFieldType { offset: usize, tag: u8 },
    /// Array presence markers are 0 (absent) or 1 (present).
    #[error("invalid array presence marker {marker} at offset 0x{offset:X}")]
    InvalidPresence { offset: usize, marker: u64 },
    /// Encode-side: a count or length does not fit its wire width.
    #[error("{what} too large for the container format ({len})")]
    Overflow { what: &'static str, len: usize },
}
