use std::{error, fmt};

/// Terminal parse failures.
///
/// Every variant ends the connection; after receiving one the caller is
/// expected to drop the transport. Incomplete input is never an error —
/// a partial head or body simply waits for more bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A successfully tokenized head carried no `host` header.
    ///
    /// HTTP/1.1 requests always require one; HTTP/1.0 enforcement is
    /// controlled by
    /// [`SessionLimits::require_host_on_http10`](crate::limits::SessionLimits::require_host_on_http10).
    MissingHost,

    /// Both `transfer-encoding` and `content-length` were present.
    ///
    /// RFC 9112 §6.3 flags this combination as a request-smuggling vector;
    /// the message is rejected before its handler runs.
    FramingConflict,

    /// `content-length` was non-numeric or above 999,999,999.
    InvalidContentLength,

    /// Malformed chunk framing: bad size digit, missing CRLF, or a chunk
    /// size above the 30-bit cap.
    InvalidChunkedEncoding,

    /// A request head outgrew the fallback buffer.
    FallbackOverflow,

    /// The request line declared a version other than HTTP/1.0 or HTTP/1.1.
    UnsupportedVersion,
}

impl ErrorKind {
    const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingHost => "request without host header",
            ErrorKind::FramingConflict => {
                "both transfer-encoding and content-length present"
            }
            ErrorKind::InvalidContentLength => "invalid content-length value",
            ErrorKind::InvalidChunkedEncoding => "invalid chunked encoding",
            ErrorKind::FallbackOverflow => "request head exceeded fallback capacity",
            ErrorKind::UnsupportedVersion => "unsupported http version",
        }
    }
}

impl error::Error for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
