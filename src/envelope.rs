//! Outer zlib envelope.
//!
//! Files on disk are either a bare container (starting with `PAR\0`) or
//! zlib-compressed.  The compressed form is normally two concatenated,
//! independently decodable zlib streams:
//!
//! 1. a small opaque header blob
//! 2. the container itself
//!
//! A single stream whose payload is the container is accepted as well; in
//! that case there is no header to preserve.
//!
//! Recompression is not canonical: re-wrapping produces different
//! compressed bytes than the game's tools, but the same decompressed
//! content.

use std::io::{Read, Write};

use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use thiserror::Error;

use crate::error::ParError;
use crate::record::PAR_MAGIC;

/// First byte of a zlib stream using deflate with a 32 KiB window.
pub const ZLIB_SIGNATURE: u8 = 0x78;

/// Compression level used when re-wrapping, matching the reference tooling.
pub const DEFAULT_LEVEL: u32 = 6;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Decompressed content does not start with the container magic.
    #[error("{stream} does not contain a PAR container (header {found:02X?})")]
    EnvelopeMismatch { stream: &'static str, found: Vec<u8> },
    #[error("unknown file format (header {found:02X?})")]
    BadMagic { found: Vec<u8> },
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error(transparent)]
    Container(#[from] ParError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Re-wrap options.
#[derive(Debug, Clone)]
pub struct EnvelopeOptions {
    /// zlib level, 0-9.
    pub level: u32,
}

impl Default for EnvelopeOptions {
    fn default() -> Self {
        Self { level: DEFAULT_LEVEL }
    }
}

/// Result of [`unwrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwrapped {
    pub container: Vec<u8>,
    /// Decompressed first stream, present only for dual-stream files.
    pub header:    Option<Vec<u8>>,
    pub wrapped:   bool,
}

// ── Codec ────────────────────────────────────────────────────────────────────

/// zlib stream codec.
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: Compression,
}

impl ZlibCodec {
    pub fn new(level: u32) -> Self {
        Self { level: Compression::new(level.min(9)) }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(data)
            .map_err(|e| EnvelopeError::Compression(e.to_string()))?;
        encoder.finish().map_err(|e| EnvelopeError::Compression(e.to_string()))
    }

    /// Decompress one stream from the start of `data`.
    ///
    /// Returns the payload and the number of input bytes the stream
    /// occupied; anything after that belongs to the next stream.
    pub fn decompress_stream(&self, data: &[u8]) -> Result<(Vec<u8>, usize), EnvelopeError> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| EnvelopeError::Decompression(e.to_string()))?;
        let consumed = decoder.total_in() as usize;
        Ok((out, consumed.min(data.len())))
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

// ── Unwrap / wrap ────────────────────────────────────────────────────────────

pub fn is_wrapped(raw: &[u8]) -> bool {
    raw.len() >= 4 && raw[0] == ZLIB_SIGNATURE
}

/// Strip the envelope, if any, and return the raw container bytes.
pub fn unwrap(raw: &[u8]) -> Result<Unwrapped, EnvelopeError> {
    if !is_wrapped(raw) {
        if raw.starts_with(PAR_MAGIC) {
            return Ok(Unwrapped { container: raw.to_vec(), header: None, wrapped: false });
        }
        return Err(EnvelopeError::BadMagic { found: prefix(raw) });
    }

    let codec = ZlibCodec::default();
    let (first, consumed) = codec.decompress_stream(raw)?;
    let rest = &raw[consumed..];

    if rest.is_empty() {
        if !first.starts_with(PAR_MAGIC) {
            return Err(EnvelopeError::EnvelopeMismatch { stream: "single zlib stream", found: prefix(&first) });
        }
        debug!("single-stream envelope: {} -> {} bytes", raw.len(), first.len());
        return Ok(Unwrapped { container: first, header: None, wrapped: true });
    }

    let (container, _) = codec.decompress_stream(rest)?;
    if !container.starts_with(PAR_MAGIC) {
        return Err(EnvelopeError::EnvelopeMismatch { stream: "second zlib stream", found: prefix(&container) });
    }
    debug!(
        "dual-stream envelope: {} byte header, {} -> {} byte container",
        first.len(),
        rest.len(),
        container.len()
    );
    Ok(Unwrapped { container, header: Some(first), wrapped: true })
}

/// Compress a container, prefixed by a separately compressed header stream
/// when `header` is given.
pub fn wrap(container: &[u8], header: Option<&[u8]>, opts: &EnvelopeOptions) -> Result<Vec<u8>, EnvelopeError> {
    let codec = ZlibCodec::new(opts.level);
    let mut out = match header {
        Some(h) => codec.compress(h)?,
        None    => Vec::new(),
    };
    out.extend_from_slice(&codec.compress(container)?);
    Ok(out)
}

fn prefix(data: &[u8]) -> Vec<u8> {
    data[..data.len().min(4)].to_vec()
}
