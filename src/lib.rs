//! pulse_http - Incremental, zero-copy HTTP/1.x request parser
//!
//! A sans-io request parser for high-performance servers. Bytes arrive in
//! arbitrary transport chunks; the parser emits, in strict stream order,
//! parsed request heads and body segments, borrowing everything it can from
//! the caller's buffer.
//!
//! # Features
//!
//! - **Zero-copy** - heads and body chunks reference the input buffer;
//!   nothing is copied unless a head splits across reads.
//! - **Incremental** - message framing may split at any byte boundary; a
//!   bounded fallback buffer reassembles partial heads.
//! - **Chunked transfer coding** - RFC 9112 chunk framing with extensions
//!   and trailer consumption.
//! - **Smuggling defenses** - conflicting `Transfer-Encoding` and
//!   `Content-Length` headers are rejected before the handler runs, per
//!   RFC 9112 §6.3.
//! - **Fast header access** - a bloom index short-circuits lookups of
//!   absent headers; a cached query separator splits path from query.
//! - **No I/O, no threads, no timers** - the caller owns the socket; one
//!   [`Session`] per connection.
//!
//! # Quick Start
//!
//! ```
//! use pulse_http::{Control, Handler, Request, Session, Status};
//!
//! struct Collect {
//!     urls: Vec<Vec<u8>>,
//! }
//!
//! impl Handler for Collect {
//!     type Upgrade = ();
//!
//!     fn on_request(&mut self, request: &mut Request) -> Control<()> {
//!         self.urls.push(request.url().to_vec());
//!         Control::Continue
//!     }
//!
//!     fn on_data(&mut self, _chunk: &[u8], _is_end: bool) -> Control<()> {
//!         Control::Continue
//!     }
//! }
//!
//! let mut session = Session::new();
//! let mut handler = Collect { urls: Vec::new() };
//!
//! let request = b"GET /hello?who=world HTTP/1.1\r\nHost: example\r\n\r\n";
//! let mut buf = request.to_vec();
//! buf.resize(request.len() + pulse_http::limits::MINIMUM_POST_PADDING, 0);
//!
//! let status = session.consume(&mut buf, request.len(), &mut handler).unwrap();
//! assert_eq!(status, Status::Ready);
//! assert_eq!(handler.urls, [b"/hello".to_vec()]);
//! ```
//!
//! # Buffer Contract
//!
//! Every chunk handed to [`Session::consume`] must carry at least
//! [`limits::MINIMUM_POST_PADDING`] writable bytes past its declared
//! length: the parser writes a `\r` sentinel there and lowercases header
//! names in place, so the region is consumed destructively. Slices exposed
//! through [`Request`] are valid only inside the handler call that
//! received them.
//!
//! For a complete server wired to tokio, see `demos/echo.rs`.
pub(crate) mod http {
    pub(crate) mod bloom;
    pub(crate) mod chunked;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod scan;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod session;

pub use crate::{
    errors::ErrorKind,
    http::{
        query,
        request::{Request, Version},
    },
    session::{Control, Handler, ProxyProtocol, Session, Status},
};

#[doc(hidden)]
#[cfg(test)]
pub(crate) mod tools {
    use std::str::from_utf8;

    #[inline]
    pub(crate) fn str(value: Option<&[u8]>) -> Option<&str> {
        Some(from_utf8(value?).unwrap())
    }

    #[inline]
    pub(crate) fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    #[inline]
    pub(crate) fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}
