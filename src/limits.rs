//! Protocol limits and per-session configuration.
//!
//! Defaults are conservative on purpose: the fallback cap bounds the memory
//! an idle connection can pin, and combined with the header ceiling it
//! bounds the parse cost a single request can demand.

/// Maximum header-table entries per request, including the request-line
/// pseudo-header at slot 0.
pub const MAX_HEADERS: usize = 50;

/// Writable bytes the caller must provide past the end of every input
/// chunk.
///
/// The tokenizer writes a `\r` sentinel one byte past the declared length
/// so its inner scan loops need no bounds checks.
pub const MINIMUM_POST_PADDING: usize = 32;

/// Default capacity of the fallback buffer holding a partial request head.
pub const MAX_FALLBACK_SIZE: usize = 4096;

/// Largest accepted `content-length` value (nine decimal digits).
pub const MAX_CONTENT_LENGTH: u32 = 999_999_999;

/// Largest accepted chunk size; the body counter deliberately keeps the
/// 30-bit cap.
pub(crate) const MAX_CHUNK_SIZE: u32 = (1 << 30) - 1;

/// Per-session parsing configuration.
///
/// # Examples
/// ```
/// use pulse_http::{Session, limits::SessionLimits};
///
/// let session = Session::with_limits(SessionLimits {
///     require_host_on_http10: false,
///     ..SessionLimits::default()
/// });
/// ```
#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// Capacity of the fallback buffer in bytes (default: `4096`).
    ///
    /// A request head that does not fit is rejected with
    /// [`ErrorKind::FallbackOverflow`](crate::ErrorKind::FallbackOverflow).
    /// 4 KiB bounds the worst-case memory per idle connection and caps how
    /// much head buffering an attacker can force.
    pub max_fallback: usize,

    /// Demand a `host` header on HTTP/1.0 requests too (default: `true`).
    ///
    /// HTTP/1.1 requests always require `host`. RFC 9112 permits HTTP/1.0
    /// clients to omit it; the default keeps the stricter uniform rule,
    /// and this switch relaxes it for deployments that still see 1.0
    /// traffic.
    pub require_host_on_http10: bool,
}

impl Default for SessionLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_fallback: MAX_FALLBACK_SIZE,
            require_host_on_http10: true,
        }
    }
}
