//! Body decoders for content-length and chunked framing.
//!
//! The session feeds received bytes in whatever pieces the transport
//! delivers them; the decoders consume what they can and report either a
//! body chunk, the end of the body, or that more bytes are needed. Chunk
//! extensions and trailer fields are read and ignored, per
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::ensure;
use crate::protocol::{BodyLength, ParseError};

/// Upper bound on a chunk-size or trailer line, extensions included.
const MAX_CHUNK_LINE_BYTES: usize = 256;

/// Progress reported by a body decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BodyEvent {
    /// One decoded piece of body data.
    Chunk(Bytes),
    /// The body is fully consumed.
    End,
}

/// Decoder for one request body, selected from the parsed head.
#[derive(Debug)]
pub(crate) enum BodyDecoder {
    None,
    Fixed { remaining: u64 },
    Chunked(ChunkedDecoder),
}

impl BodyDecoder {
    pub(crate) fn new(length: BodyLength) -> Self {
        match length {
            BodyLength::None => Self::None,
            BodyLength::Fixed(length) => Self::Fixed { remaining: length },
            BodyLength::Chunked => Self::Chunked(ChunkedDecoder::new()),
        }
    }

    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BodyEvent>, ParseError> {
        match self {
            Self::None => Ok(Some(BodyEvent::End)),

            Self::Fixed { remaining } => {
                if *remaining == 0 {
                    return Ok(Some(BodyEvent::End));
                }
                if src.is_empty() {
                    return Ok(None);
                }
                let take = (*remaining).min(src.len() as u64) as usize;
                let chunk = src.split_to(take).freeze();
                *remaining -= chunk.len() as u64;
                Ok(Some(BodyEvent::Chunk(chunk)))
            }

            Self::Chunked(decoder) => decoder.decode(src),
        }
    }
}

/// Incremental decoder for chunked transfer encoding.
///
/// Chunk format: hexadecimal size line (optionally with extensions), CRLF,
/// data, CRLF; a zero-size chunk then optional trailers terminate the body.
#[derive(Debug)]
pub(crate) struct ChunkedDecoder {
    state: ChunkedState,
    remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Reading the hexadecimal size line.
    SizeLine,
    /// Reading chunk data.
    Data,
    /// Expecting the CRLF that terminates chunk data.
    DataCrlf,
    /// Skipping trailer lines after the zero-size chunk.
    Trailer,
    /// The terminating empty line has been consumed.
    Done,
}

impl ChunkedDecoder {
    pub(crate) fn new() -> Self {
        Self { state: ChunkedState::SizeLine, remaining: 0 }
    }

    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BodyEvent>, ParseError> {
        loop {
            match self.state {
                ChunkedState::SizeLine => match find_crlf(src) {
                    Some(line_end) => {
                        let size = parse_chunk_size(&src[..line_end])?;
                        src.advance(line_end + 2);
                        self.remaining = size;
                        self.state = if size == 0 { ChunkedState::Trailer } else { ChunkedState::Data };
                    }
                    None => {
                        ensure!(src.len() <= MAX_CHUNK_LINE_BYTES, ParseError::invalid_chunk("chunk size line too long"));
                        return Ok(None);
                    }
                },

                ChunkedState::Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let take = self.remaining.min(src.len() as u64) as usize;
                    let chunk = src.split_to(take).freeze();
                    self.remaining -= chunk.len() as u64;
                    if self.remaining == 0 {
                        self.state = ChunkedState::DataCrlf;
                    }
                    trace!(len = chunk.len(), "decoded chunk data");
                    return Ok(Some(BodyEvent::Chunk(chunk)));
                }

                ChunkedState::DataCrlf => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    ensure!(&src[..2] == b"\r\n", ParseError::invalid_chunk("chunk data not terminated by CRLF"));
                    src.advance(2);
                    self.state = ChunkedState::SizeLine;
                }

                ChunkedState::Trailer => match find_crlf(src) {
                    // the empty line ends the body; trailer fields are skipped
                    Some(0) => {
                        src.advance(2);
                        self.state = ChunkedState::Done;
                    }
                    Some(line_end) => {
                        src.advance(line_end + 2);
                    }
                    None => {
                        ensure!(src.len() <= MAX_CHUNK_LINE_BYTES, ParseError::invalid_chunk("trailer line too long"));
                        return Ok(None);
                    }
                },

                ChunkedState::Done => return Ok(Some(BodyEvent::End)),
            }
        }
    }
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(2).position(|pair| pair == b"\r\n")
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    // the size ends at the first ';' (chunk extensions follow, ignored)
    let digits = line.split(|byte| *byte == b';').next().unwrap_or(line).trim_ascii();
    ensure!(!digits.is_empty(), ParseError::invalid_chunk("empty chunk size"));

    let mut size: u64 = 0;
    for byte in digits {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => return Err(ParseError::invalid_chunk("invalid chunk size digit")),
        };
        size = size
            .checked_mul(16)
            .and_then(|value| value.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_chunk("chunk size overflow"))?;
    }
    Ok(size)
}
