//! Fixed-capacity staging of the response status line and header block.

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};
use http::response::Parts;
use http::{HeaderValue, Version, header};

use crate::protocol::SendError;
use crate::utils::BytesWriter;

/// Capacity budget for the formatted status line.
pub(crate) const STATUS_LINE_CAPACITY: usize = 64;

/// Capacity budget for the formatted header block, terminating CRLF
/// included.
pub(crate) const HEADER_BLOCK_CAPACITY: usize = 2 * 1024;

/// Scratch space for assembling a wire-ready response head.
///
/// The head is always emitted as a single segment. A head that does not fit
/// the fixed budget is rejected with [`SendError::ResponseTooLarge`], never
/// truncated.
#[derive(Debug)]
pub(crate) struct HeadStaging {
    buf: BytesMut,
}

impl HeadStaging {
    pub(crate) fn new() -> Self {
        Self { buf: BytesMut::with_capacity(STATUS_LINE_CAPACITY + HEADER_BLOCK_CAPACITY) }
    }

    /// Formats `parts` into one segment: status line, headers, terminating
    /// CRLF.
    ///
    /// `content_length` is authoritative: it is computed from the body
    /// segments and overrides any Content-Length the handler set, so the
    /// framing on the wire always matches the bytes that follow.
    pub(crate) fn encode(&mut self, mut parts: Parts, content_length: u64) -> Result<Bytes, SendError> {
        self.buf.clear();
        self.buf.reserve(STATUS_LINE_CAPACITY + HEADER_BLOCK_CAPACITY);

        let version = match parts.version {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            other => return Err(SendError::UnsupportedVersion(other)),
        };
        let reason = parts.status.canonical_reason().unwrap_or("Unknown");
        write!(BytesWriter(&mut self.buf), "{} {} {}\r\n", version, parts.status.as_str(), reason)?;
        if self.buf.len() > STATUS_LINE_CAPACITY {
            return Err(SendError::response_too_large(self.buf.len(), STATUS_LINE_CAPACITY));
        }

        match parts.headers.get_mut(header::CONTENT_LENGTH) {
            Some(value) => *value = HeaderValue::from(content_length),
            None => {
                parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
            }
        }

        for (name, value) in parts.headers.iter() {
            self.buf.put_slice(name.as_ref());
            self.buf.put_slice(b": ");
            self.buf.put_slice(value.as_ref());
            self.buf.put_slice(b"\r\n");
        }
        self.buf.put_slice(b"\r\n");

        let required = self.buf.len();
        if required > STATUS_LINE_CAPACITY + HEADER_BLOCK_CAPACITY {
            return Err(SendError::response_too_large(required, STATUS_LINE_CAPACITY + HEADER_BLOCK_CAPACITY));
        }

        Ok(self.buf.split().freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    fn parts(builder: http::response::Builder) -> Parts {
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn formats_status_line_and_headers_in_order() {
        let mut staging = HeadStaging::new();
        let head = staging
            .encode(
                parts(
                    Response::builder()
                        .status(StatusCode::OK)
                        .header("x-first", "1")
                        .header("x-second", "2")
                        .header("x-third", "3"),
                ),
                5,
            )
            .unwrap();

        assert_eq!(
            &head[..],
            b"HTTP/1.1 200 OK\r\nx-first: 1\r\nx-second: 2\r\nx-third: 3\r\ncontent-length: 5\r\n\r\n" as &[u8]
        );
    }

    #[test]
    fn content_length_is_overridden_not_duplicated() {
        let mut staging = HeadStaging::new();
        let head = staging
            .encode(parts(Response::builder().status(StatusCode::OK).header(header::CONTENT_LENGTH, 999)), 2)
            .unwrap();

        let text = std::str::from_utf8(&head).unwrap();
        assert_eq!(text.matches("content-length").count(), 1);
        assert!(text.contains("content-length: 2\r\n"));
    }

    #[test]
    fn empty_body_still_yields_a_complete_head_segment() {
        let mut staging = HeadStaging::new();
        let head = staging.encode(parts(Response::builder().status(StatusCode::NO_CONTENT)), 0).unwrap();
        assert_eq!(&head[..], b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n" as &[u8]);
    }

    #[test]
    fn oversized_head_is_rejected_not_truncated() {
        let mut staging = HeadStaging::new();
        let huge = "v".repeat(HEADER_BLOCK_CAPACITY);
        let result = staging.encode(parts(Response::builder().status(StatusCode::OK).header("x-huge", huge)), 0);

        match result {
            Err(SendError::ResponseTooLarge { required, capacity }) => {
                assert!(required > capacity);
                assert_eq!(capacity, STATUS_LINE_CAPACITY + HEADER_BLOCK_CAPACITY);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn staging_is_reusable_across_responses() {
        let mut staging = HeadStaging::new();
        let first = staging.encode(parts(Response::builder().status(StatusCode::OK)), 1).unwrap();
        let second = staging.encode(parts(Response::builder().status(StatusCode::NOT_FOUND)), 0).unwrap();

        assert!(first.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(second.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn http10_responses_are_formatted_too() {
        let mut staging = HeadStaging::new();
        let head = staging
            .encode(parts(Response::builder().status(StatusCode::OK).version(Version::HTTP_10)), 0)
            .unwrap();
        assert!(head.starts_with(b"HTTP/1.0 200 OK\r\n"));
    }
}
