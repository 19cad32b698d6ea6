//! Stream framing for serial and TCP links.
//!
//! Stream links carry a byte stream, so every protobuf record is prefixed with
//! a four byte header:
//!
//! ```text
//! ┌──────┬──────┬────────┬────────┬───────────────────────┐
//! │ 0x94 │ 0xC3 │ len_hi │ len_lo │ payload (1..=512)     │
//! └──────┴──────┴────────┴────────┴───────────────────────┘
//! ```
//!
//! Devices interleave plain-text debug output with frames. The decoder skips
//! anything that is not a valid header and resynchronizes on the next one.

use thiserror::Error;

/// First header byte
pub const START1: u8 = 0x94;
/// Second header byte
pub const START2: u8 = 0xC3;
/// Header size in bytes
pub const HEADER_LEN: usize = 4;
/// Largest payload a frame may carry
pub const MAX_FRAME_PAYLOAD: usize = 512;

/// Framing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Payload larger than a frame can carry
    #[error("frame payload too large: {0} bytes (max {MAX_FRAME_PAYLOAD})")]
    TooLarge(usize),

    /// Zero-length payloads are not valid records
    #[error("empty frame payload")]
    Empty,
}

/// Prefix `payload` with a stream header.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    if payload.is_empty() {
        return Err(FramingError::Empty);
    }
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FramingError::TooLarge(payload.len()));
    }
    let len = payload.len() as u16;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&[START1, START2]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Incremental frame decoder.
///
/// Feed raw bytes with [`StreamFramer::push`] and drain complete payloads
/// with [`StreamFramer::next_frame`].
#[derive(Debug, Default)]
pub struct StreamFramer {
    buf: Vec<u8>,
    skipped_bytes: u64,
    invalid_headers: u64,
}

impl StreamFramer {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes read from the link.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete payload, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let start = self.buf.iter().position(|&b| b == START1);
            match start {
                None => {
                    self.skip(self.buf.len());
                    return None;
                }
                Some(0) => {}
                Some(n) => self.skip(n),
            }

            if self.buf.len() < 2 {
                return None;
            }
            if self.buf[1] != START2 {
                self.skip(1);
                continue;
            }
            if self.buf.len() < HEADER_LEN {
                return None;
            }

            let len = usize::from(u16::from_be_bytes([self.buf[2], self.buf[3]]));
            if len == 0 || len > MAX_FRAME_PAYLOAD {
                // Not a real header; rescan from the byte after START1
                self.invalid_headers += 1;
                self.skip(1);
                continue;
            }
            if self.buf.len() < HEADER_LEN + len {
                return None;
            }

            let frame = self.buf[HEADER_LEN..HEADER_LEN + len].to_vec();
            self.buf.drain(..HEADER_LEN + len);
            return Some(frame);
        }
    }

    /// Push bytes and drain every complete payload.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.push(bytes);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes discarded while searching for a header.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    /// Headers rejected for an out-of-range length.
    pub fn invalid_headers(&self) -> u64 {
        self.invalid_headers
    }

    /// Bytes buffered but not yet part of a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn skip(&mut self, n: usize) {
        self.buf.drain(..n);
        self.skipped_bytes += n as u64;
    }
}
