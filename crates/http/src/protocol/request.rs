//! Request head handling.
//!
//! [`RequestHead`] wraps a parsed `http::Request<()>` and answers the two
//! framing questions the session needs beyond plain header access: whether a
//! body may follow the header block, and whether the connection should stay
//! open after the response.

use std::net::SocketAddr;

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

/// Peer address of the connection a request arrived on.
///
/// The session inserts this into every dispatched request's extensions, so
/// handlers can read it with `request.extensions().get::<PeerAddr>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// The request line and header block of one parsed request.
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
}

impl RequestHead {
    /// Consumes the head and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, converting the head into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether a body may follow this head, based on the HTTP method.
    ///
    /// GET, HEAD, DELETE, OPTIONS and CONNECT requests carry no body here.
    pub fn expects_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the connection should be reused after this exchange.
    ///
    /// An explicit `close` token always wins, an explicit `keep-alive` token
    /// wins next; otherwise HTTP/1.1 defaults to keep-alive and HTTP/1.0 to
    /// close.
    pub fn should_keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;

        if let Some(value) = self.headers().get(header::CONNECTION) {
            if let Ok(text) = value.to_str() {
                for token in text.split(',') {
                    let token = token.trim();
                    if token.eq_ignore_ascii_case("close") {
                        close = true;
                    } else if token.eq_ignore_ascii_case("keep-alive") {
                        keep_alive = true;
                    }
                }
            }
        }

        if close {
            return false;
        }
        if keep_alive {
            return true;
        }
        self.version() != Version::HTTP_10
    }
}

impl From<Request<()>> for RequestHead {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

impl From<Parts> for RequestHead {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(version: Version, connection: Option<&str>) -> RequestHead {
        let mut builder = Request::builder().method(Method::GET).uri("/index.html").version(version);
        if let Some(value) = connection {
            builder = builder.header(header::CONNECTION, value);
        }
        RequestHead::from(builder.body(()).unwrap())
    }

    #[test]
    fn http11_defaults_to_keep_alive() {
        assert!(head(Version::HTTP_11, None).should_keep_alive());
    }

    #[test]
    fn http10_defaults_to_close() {
        assert!(!head(Version::HTTP_10, None).should_keep_alive());
    }

    #[test]
    fn explicit_tokens_override_defaults() {
        assert!(!head(Version::HTTP_11, Some("close")).should_keep_alive());
        assert!(head(Version::HTTP_10, Some("keep-alive")).should_keep_alive());
        assert!(head(Version::HTTP_10, Some("Keep-Alive")).should_keep_alive());
    }

    #[test]
    fn close_wins_over_keep_alive() {
        assert!(!head(Version::HTTP_11, Some("keep-alive, close")).should_keep_alive());
    }

    #[test]
    fn body_expectation_follows_method() {
        let get = head(Version::HTTP_11, None);
        assert!(!get.expects_body());

        let post = RequestHead::from(Request::builder().method(Method::POST).uri("/submit").body(()).unwrap());
        assert!(post.expects_body());
    }
}
