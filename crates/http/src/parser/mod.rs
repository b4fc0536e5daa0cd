//! Incremental HTTP request parsing.
//!
//! The session owns one [`RequestParser`] per connection and feeds it the
//! bytes the transport delivers, in arrival order and exactly once. The
//! parser consumes what it can and reports progress as milestones:
//!
//! - [`ParseEvent::Head`]: the request line and header block are complete
//! - [`ParseEvent::Body`]: one piece of body data is available
//! - [`ParseEvent::End`]: the request is fully received
//!
//! A request whose head indicates no body goes from `Head` to `End` without
//! any `Body` milestone, so the caller has a single dispatch point.
//!
//! The request grammar itself is `httparse`'s; this module wraps it with the
//! staging limits (a fixed 2KB header block, at most 32 fields; exceeding
//! either is a protocol error, never a truncation) and with body framing
//! selection per RFC 9112: chunked transfer encoding, content-length, or no
//! body, with the conflicting combination rejected.

mod body;

pub(crate) use body::{BodyDecoder, BodyEvent};

use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue, Request, Version, header};
use httparse::Status;
use tracing::trace;

use crate::ensure;
use crate::protocol::{BodyLength, ParseError, RequestHead};

/// Fixed capacity of the inbound header staging buffer.
pub const MAX_HEADER_BYTES: usize = 2 * 1024;

/// Maximum number of header fields in a request.
pub const MAX_HEADERS: usize = 32;

/// A parsing milestone reported to the session.
#[derive(Debug)]
pub enum ParseEvent {
    /// Request line and headers are complete; body framing is known.
    Head(RequestHead, BodyLength),
    /// One piece of decoded body data.
    Body(Bytes),
    /// The request, body included, is fully received.
    End,
}

/// Streaming request parser, reused across keep-alive requests.
///
/// Between requests the parser is idle; once a head is parsed it carries the
/// body decoder for the request in flight. [`reset`](RequestParser::reset)
/// drops any in-flight state.
#[derive(Debug, Default)]
pub struct RequestParser {
    body: Option<BodyDecoder>,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no partially parsed request is in flight.
    pub fn is_idle(&self) -> bool {
        self.body.is_none()
    }

    /// Drops in-flight request state, readying the parser for a fresh
    /// request line.
    pub fn reset(&mut self) {
        self.body = None;
    }

    /// Consumes as much of `src` as possible and reports the next milestone.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed bytes are
    /// removed from `src` and never re-parsed.
    pub fn parse(&mut self, src: &mut BytesMut) -> Result<Option<ParseEvent>, ParseError> {
        if let Some(decoder) = &mut self.body {
            return match decoder.decode(src)? {
                Some(BodyEvent::Chunk(chunk)) => Ok(Some(ParseEvent::Body(chunk))),
                Some(BodyEvent::End) => {
                    self.body = None;
                    Ok(Some(ParseEvent::End))
                }
                None => Ok(None),
            };
        }

        match parse_head(src)? {
            Some((head, length)) => {
                self.body = Some(BodyDecoder::new(length));
                Ok(Some(ParseEvent::Head(head, length)))
            }
            None => Ok(None),
        }
    }
}

fn parse_head(src: &mut BytesMut) -> Result<Option<(RequestHead, BodyLength)>, ParseError> {
    if src.is_empty() {
        return Ok(None);
    }

    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut header_storage);

    let status = parsed.parse(src).map_err(|e| match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADERS),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    let head_len = match status {
        Status::Complete(head_len) => head_len,
        Status::Partial => {
            // the staging buffer is hard-bounded even while incomplete
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            return Ok(None);
        }
    };
    ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));
    trace!(head_len, "parsed request head");

    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        other => return Err(ParseError::InvalidVersion(other)),
    };

    let mut builder = Request::builder()
        .method(parsed.method.ok_or(ParseError::InvalidMethod)?)
        .uri(parsed.path.ok_or(ParseError::InvalidUri)?)
        .version(version);

    let headers = builder.headers_mut().ok_or_else(|| ParseError::invalid_header("malformed request line"))?;
    headers.reserve(parsed.headers.len());
    for header in parsed.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| ParseError::invalid_header(e.to_string()))?;
        let value = HeaderValue::from_bytes(header.value).map_err(|e| ParseError::invalid_header(e.to_string()))?;
        headers.append(name, value);
    }

    let head = RequestHead::from(builder.body(()).map_err(|e| ParseError::invalid_header(e.to_string()))?);
    let length = body_length(&head)?;

    let _ = src.split_to(head_len);
    Ok(Some((head, length)))
}

/// Selects body framing from the parsed head, per RFC 9112 section 6.
fn body_length(head: &RequestHead) -> Result<BodyLength, ParseError> {
    if !head.expects_body() {
        return Ok(BodyLength::None);
    }

    let transfer_encoding = head.headers().get(header::TRANSFER_ENCODING);
    let content_length = head.headers().get(header::CONTENT_LENGTH);

    match (transfer_encoding, content_length) {
        (None, None) => Ok(BodyLength::None),

        (Some(value), None) => {
            if is_chunked(value) {
                Ok(BodyLength::Chunked)
            } else {
                Ok(BodyLength::None)
            }
        }

        (None, Some(value)) => {
            let text = value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
            let length = text
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {text} is not a non-negative integer")))?;
            // a zero-length body skips body reading entirely
            Ok(if length == 0 { BodyLength::None } else { BodyLength::Fixed(length) })
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer-encoding and content-length both present")),
    }
}

/// Chunked must be the final encoding if present (RFC 9112 section 6.1).
fn is_chunked(value: &HeaderValue) -> bool {
    value
        .as_bytes()
        .rsplit(|byte| *byte == b',')
        .next()
        .is_some_and(|token| token.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
