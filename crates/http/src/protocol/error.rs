use std::io;
use thiserror::Error;

/// Umbrella error for a session or server run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("protocol error: {source}")]
    Protocol {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("startup error: {source}")]
    Startup { source: io::Error },
}

/// Request-side protocol errors.
///
/// Every variant forces the owning session into teardown; none of them is
/// allowed to take the server down.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header block too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunked framing: {reason}")]
    InvalidChunk { reason: String },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(reason: S) -> Self {
        Self::InvalidChunk { reason: reason.to_string() }
    }

    /// Whether the oversized-header status (431) fits better than a plain
    /// bad request.
    pub fn is_oversized(&self) -> bool {
        matches!(self, Self::TooLargeHeader { .. } | Self::TooManyHeaders { .. })
    }
}

/// Response-side marshaling errors.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("response head requires {required} bytes but the staging capacity is {capacity}")]
    ResponseTooLarge { required: usize, capacity: usize },

    #[error("unsupported response version: {0:?}")]
    UnsupportedVersion(http::Version),

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn response_too_large(required: usize, capacity: usize) -> Self {
        Self::ResponseTooLarge { required, capacity }
    }
}

/// Failures reported by the async transport boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("address already in use")]
    AddressInUse,

    #[error("permission denied")]
    PermissionDenied,

    #[error("connection reset by peer")]
    Reset,

    #[error("transport closed")]
    Closed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl TransportError {
    /// Classifies an I/O error into the transport taxonomy.
    pub fn from_io(source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::AddrInUse => Self::AddressInUse,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => Self::Reset,
            _ => Self::Io { source },
        }
    }
}
