//! # Producer Stream Framing
//!
//! ## Purpose
//!
//! Turns the arbitrarily chunked byte stream of one producer connection into
//! complete JSON envelopes. TCP gives no message boundaries: one read may hold
//! half a frame, several frames, or a frame split mid-delimiter.
//!
//! ## Modes
//!
//! - **Delimiter** (default): frames end with a NUL byte. Closed candidates
//!   are parsed; a malformed closed candidate can never be completed and is
//!   dropped. The trailing remainder is emitted as soon as it parses as a
//!   complete object, otherwise kept for the next read.
//! - **SingleShot** (legacy): every read is assumed to be exactly one
//!   document. Frames coalesced by TCP into one read are lost, so this mode
//!   only exists for producers that cannot be changed.
//!
//! ```text
//! read #1: {"a":1}\0{"b"     -> [{"a":1}]   buffer: {"b"
//! read #2: :2}\0             -> [{"b":2}]   buffer: (empty)
//! ```

use crate::constants::{DEFAULT_MAX_FRAME_BYTES, FRAME_DELIMITER};
use crate::error::CodecError;
use crate::message::InboundMessage;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Framing policy for producer streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// NUL-terminated frames with cross-read buffering
    #[default]
    Delimiter,
    /// One document per read, no buffering
    SingleShot,
}

impl FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delimiter" | "nul" => Ok(FramingMode::Delimiter),
            "single_shot" | "single-shot" | "single" => Ok(FramingMode::SingleShot),
            other => Err(format!(
                "unknown framing mode '{}', expected 'delimiter' or 'single_shot'",
                other
            )),
        }
    }
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingMode::Delimiter => write!(f, "delimiter"),
            FramingMode::SingleShot => write!(f, "single_shot"),
        }
    }
}

/// Per-connection stream framer
///
/// Owns the connection's partial-frame buffer; drop it with the session.
#[derive(Debug)]
pub struct FrameDecoder {
    mode: FramingMode,
    buffer: BytesMut,
    max_frame_bytes: usize,
    dropped_frames: u64,
    /// Skipping the rest of an oversized frame up to its delimiter
    discarding: bool,
}

impl FrameDecoder {
    pub fn new(mode: FramingMode, max_frame_bytes: usize) -> Self {
        Self {
            mode,
            buffer: BytesMut::with_capacity(4096),
            max_frame_bytes,
            dropped_frames: 0,
            discarding: false,
        }
    }

    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Candidates discarded as malformed or oversized so far
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Feed one read's worth of bytes, returning every frame it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<InboundMessage> {
        match self.mode {
            FramingMode::Delimiter => self.feed_delimited(chunk),
            FramingMode::SingleShot => self.feed_single_shot(chunk),
        }
    }

    fn feed_delimited(&mut self, chunk: &[u8]) -> Vec<InboundMessage> {
        let chunk = match self.skip_discarded(chunk) {
            Some(rest) => rest,
            None => return Vec::new(),
        };
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        // Candidates closed by a delimiter are final either way
        while let Some(pos) = self.buffer.iter().position(|&b| b == FRAME_DELIMITER) {
            let candidate = self.buffer.split_to(pos + 1);
            let text = trim_frame(&candidate[..pos]);
            if text.is_empty() {
                continue;
            }

            match InboundMessage::parse(text) {
                Ok(message) => frames.push(message),
                Err(e) => {
                    self.dropped_frames += 1;
                    warn!("Dropping malformed frame closed by delimiter: {}", e);
                }
            }
        }

        self.take_remainder(&mut frames);
        frames
    }

    /// Drop bytes of a discarded frame, returning what follows its delimiter
    fn skip_discarded<'a>(&mut self, chunk: &'a [u8]) -> Option<&'a [u8]> {
        if !self.discarding {
            return Some(chunk);
        }
        match chunk.iter().position(|&b| b == FRAME_DELIMITER) {
            Some(pos) => {
                self.discarding = false;
                debug!("Resynchronized after discarded frame");
                Some(&chunk[pos + 1..])
            }
            None => None,
        }
    }

    /// Emit the unterminated tail if it is already a complete object
    fn take_remainder(&mut self, frames: &mut Vec<InboundMessage>) {
        let text = trim_frame(&self.buffer);
        if text.is_empty() {
            self.buffer.clear();
            return;
        }

        // An object can only be complete once it ends with a closing brace
        if text.last() == Some(&b'}') {
            match InboundMessage::parse(text) {
                Ok(message) => {
                    frames.push(message);
                    self.buffer.clear();
                    return;
                }
                Err(e) if e.is_incomplete() => {
                    debug!("Remainder of {} bytes awaits more data", self.buffer.len());
                }
                Err(e) => {
                    debug!(
                        "Remainder of {} bytes does not parse yet, holding until delimiter: {}",
                        self.buffer.len(),
                        e
                    );
                }
            }
        }

        if self.buffer.len() > self.max_frame_bytes {
            let err = CodecError::FrameTooLarge {
                size: self.buffer.len(),
                max: self.max_frame_bytes,
            };
            warn!("Discarding buffered remainder: {}", err);
            self.dropped_frames += 1;
            self.buffer.clear();
            self.discarding = true;
        }
    }

    fn feed_single_shot(&mut self, chunk: &[u8]) -> Vec<InboundMessage> {
        let text = trim_frame(chunk);
        if text.is_empty() {
            return Vec::new();
        }

        match InboundMessage::parse(text) {
            Ok(message) => vec![message],
            Err(e) => {
                self.dropped_frames += 1;
                warn!("Dropping malformed single-shot frame: {}", e);
                Vec::new()
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(FramingMode::default(), DEFAULT_MAX_FRAME_BYTES)
    }
}

/// Strip surrounding whitespace and stray delimiters
fn trim_frame(bytes: &[u8]) -> &[u8] {
    let is_padding = |b: &u8| b.is_ascii_whitespace() || *b == FRAME_DELIMITER;
    let start = bytes.iter().position(|b| !is_padding(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_padding(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}
