//! Shared protocol vocabulary for the server engine.
//!
//! This module collects the types every other layer speaks:
//!
//! - **Requests** ([`request`]): [`RequestHead`] wraps the parsed request
//!   line and header block and answers the framing questions the session
//!   asks (does a body follow, should the connection stay open), and
//!   [`PeerAddr`] carries the connection's peer address into handler-visible
//!   request extensions.
//! - **Responses** ([`response`]): [`ResponseHead`] is the header portion of
//!   a response before body attachment; [`SegmentedBody`] is the ordered
//!   list of discrete body segments a handler supplies, submitted to the
//!   transport as one scatter-gather write.
//! - **Body framing**: [`BodyLength`] describes how a message body is
//!   delimited on the wire.
//! - **Errors** ([`error`]): [`ParseError`], [`SendError`],
//!   [`TransportError`] and the umbrella [`EngineError`].

mod error;
pub use error::EngineError;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;

mod request;
pub use request::PeerAddr;
pub use request::RequestHead;

mod response;
pub use response::ResponseHead;
pub use response::SegmentedBody;

/// How a message body is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyLength {
    /// A known number of body bytes (Content-Length framing).
    Fixed(u64),
    /// Chunked transfer encoding.
    Chunked,
    /// No body at all.
    None,
}

impl BodyLength {
    /// Returns true if no body follows the header block.
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, BodyLength::None)
    }

    /// Returns true if the body uses chunked transfer encoding.
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, BodyLength::Chunked)
    }
}
