//! Request view and head tokenizer.
//!
//! [`parse_head`] consumes a single request head (request-line plus header
//! fields) from a post-padded byte region into the fixed-capacity header
//! table of a [`Request`]. Slot 0 of the table holds the request line: the
//! method as the name and the full target as the value. Header names in the
//! remaining slots are lowercased in place inside the caller's buffer;
//! values and the method keep their original bytes.

use crate::{
    errors::ErrorKind,
    http::{bloom::BloomIndex, query, scan},
    limits::MAX_HEADERS,
    session::ProxyProtocol,
};
use memchr::memchr;
use std::mem;

// HEADER SLOT

/// One (name, value) entry of the header table. An empty name marks the
/// end of the list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HeaderSlot {
    pub(crate) name: &'static [u8],
    pub(crate) value: &'static [u8],
}

impl HeaderSlot {
    pub(crate) const EMPTY: HeaderSlot = HeaderSlot {
        name: b"",
        value: b"",
    };
}

// VERSION

/// HTTP protocol version declared on the request line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0 — legacy clients; `host` is optional per RFC 9112, see
    /// [`SessionLimits::require_host_on_http10`](crate::limits::SessionLimits::require_host_on_http10)
    Http10,

    /// HTTP/1.1 — persistent connections and chunked transfer coding
    Http11,
}

impl Version {
    #[inline(always)]
    pub(crate) const fn from_bytes(src: &[u8]) -> Result<Self, ErrorKind> {
        match src {
            b"HTTP/1.1" => Ok(Self::Http11),
            b"HTTP/1.0" => Ok(Self::Http10),
            _ => Err(ErrorKind::UnsupportedVersion),
        }
    }
}

// REQUEST

/// A parsed request head, borrowed from the session's input buffer.
///
/// Handed to [`Handler::on_request`](crate::Handler::on_request). Every
/// byte slice it exposes points into the buffer passed to
/// [`Session::consume`](crate::Session::consume) and is valid only for the
/// duration of that handler call; handlers that need longer-lived data must
/// copy.
#[derive(Debug)]
pub struct Request {
    pub(crate) slots: [HeaderSlot; MAX_HEADERS],
    pub(crate) version: Version,
    pub(crate) query_separator: usize,
    yielded: bool,
    bloom: BloomIndex,
    parameters: &'static [&'static [u8]],
}

impl Request {
    #[inline]
    pub(crate) fn new() -> Self {
        Request {
            slots: [HeaderSlot::EMPTY; MAX_HEADERS],
            version: Version::Http11,
            query_separator: 0,
            yielded: false,
            bloom: BloomIndex::new(),
            parameters: &[],
        }
    }

    /// Clears every field before the next head is tokenized, so nothing
    /// from the previous request can leak into this one.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.slots = [HeaderSlot::EMPTY; MAX_HEADERS];
        self.version = Version::Http11;
        self.query_separator = 0;
        self.yielded = false;
        self.bloom.reset();
        self.parameters = &[];
    }

    /// Rebuilds the bloom index from the freshly tokenized header names.
    #[inline]
    pub(crate) fn index_headers(&mut self) {
        self.bloom.reset();
        for slot in &self.slots[1..] {
            if slot.name.is_empty() {
                break;
            }
            self.bloom.add(slot.name);
        }
    }

    /// Caches the `?` offset within the target; equals the target length
    /// when no query string is present.
    #[inline]
    pub(crate) fn locate_query(&mut self) {
        let target = self.slots[0].value;
        self.query_separator = memchr(b'?', target).unwrap_or(target.len());
    }

    /// Header lookup detached from the borrow of `self`; only the session
    /// driver may rely on the extended lifetime.
    #[inline]
    pub(crate) fn lookup(&self, name: &[u8]) -> Option<&'static [u8]> {
        if name.is_empty() || !self.bloom.might_contain(name) {
            return None;
        }
        self.slots[1..]
            .iter()
            .take_while(|slot| !slot.name.is_empty())
            .find(|slot| slot.name == name)
            .map(|slot| slot.value)
    }
}

// Public API
impl Request {
    /// Request method exactly as sent (e.g. `b"GET"`).
    #[inline(always)]
    pub fn method(&self) -> &[u8] {
        self.slots[0].name
    }

    /// Copies the method lowercased into `scratch` and returns the filled
    /// prefix. Methods longer than `scratch` are truncated.
    #[inline]
    pub fn method_lowercase_into<'s>(&self, scratch: &'s mut [u8]) -> &'s [u8] {
        let len = scan::lowercase_into(self.slots[0].name, scratch);
        &scratch[..len]
    }

    /// Matches the method against `lowercase` without copying.
    ///
    /// # Examples
    /// For the request line `GET / HTTP/1.1`:
    /// - `method_is(b"get")`: `true`
    /// - `method_is(b"post")`: `false`
    #[inline(always)]
    pub fn method_is(&self, lowercase: &[u8]) -> bool {
        self.slots[0].name.eq_ignore_ascii_case(lowercase)
    }

    /// Path component of the target, up to the query separator.
    ///
    /// For target `/a?x=1` this is `/a`.
    #[inline(always)]
    pub fn url(&self) -> &[u8] {
        &self.slots[0].value[..self.query_separator]
    }

    /// Full request target including any query string.
    #[inline(always)]
    pub fn full_url(&self) -> &[u8] {
        self.slots[0].value
    }

    /// Raw query string past the `?`, still encoded; empty when absent.
    #[inline]
    pub fn query(&self) -> &[u8] {
        let target = self.slots[0].value;
        match self.query_separator < target.len() {
            true => &target[self.query_separator + 1..],
            false => b"",
        }
    }

    /// First raw value recorded for the query parameter `key`.
    #[inline]
    pub fn query_value(&self, key: &[u8]) -> Option<&[u8]> {
        query::find(self.query(), key)
    }

    /// Value of the header `name`, which must be given lowercased.
    ///
    /// The bloom index short-circuits names that were never added; hits
    /// fall back to a linear scan of the table.
    #[inline]
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.lookup(name)
    }

    /// Iterates over `(name, value)` header pairs in arrival order.
    ///
    /// Names come out lowercased; the request line is not included.
    #[inline]
    pub fn headers<'r>(&'r self) -> impl Iterator<Item = (&'r [u8], &'r [u8])> {
        self.slots[1..]
            .iter()
            .take_while(|slot| !slot.name.is_empty())
            .map(|slot| (slot.name, slot.value))
    }

    /// Parsed HTTP version of the request line.
    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// True for HTTP/1.0 requests.
    #[inline(always)]
    pub fn is_ancient(&self) -> bool {
        self.version == Version::Http10
    }

    /// Signals route fall-through to the hosting router.
    #[inline(always)]
    pub fn set_yield(&mut self, yielded: bool) {
        self.yielded = yielded;
    }

    /// Whether the current handler asked to fall through.
    #[inline(always)]
    pub const fn did_yield(&self) -> bool {
        self.yielded
    }

    /// Installs route parameters extracted by the hosting router.
    ///
    /// Like every other slice reachable through the request, they must not
    /// be assumed valid past the current handler call.
    #[inline]
    pub fn set_parameters(&mut self, parameters: &[&[u8]]) {
        // SAFETY: same contract as the header slices — cleared on reset and
        // never read after the owning handler returns.
        self.parameters =
            unsafe { mem::transmute::<&[&[u8]], &'static [&'static [u8]]>(parameters) };
    }

    /// Route parameter at `index`, if the router installed one.
    #[inline(always)]
    pub fn parameter(&self, index: usize) -> Option<&[u8]> {
        self.parameters.get(index).copied()
    }
}

#[inline(always)]
// SAFETY: the tokenizer borrows slices out of the caller's input buffer and
// parks them in the long-lived Request. They are only read inside the
// handler call issued by the `consume` invocation that parsed them;
// reset() clears them before any later input is touched.
const unsafe fn into_static(src: &[u8]) -> &'static [u8] {
    unsafe { mem::transmute(src) }
}

// TOKENIZER

/// Consumes a single request head from `buf[..len]`.
///
/// `buf[len]` must already hold the `\r` sentinel written by the session
/// fence; the scan loops rely on it instead of bounds checks. Returns the
/// byte count through the terminating blank line, `Ok(0)` when the head is
/// not yet complete (the caller buffers and retries), or an error for a
/// head that can never become valid.
pub(crate) fn parse_head(
    buf: &mut [u8],
    len: usize,
    request: &mut Request,
    proxy: Option<&mut dyn ProxyProtocol>,
) -> Result<usize, ErrorKind> {
    let mut pos = 0;

    // A configured PROXY preamble parser runs first and may consume a
    // prefix. Its success is never head success: fallback accounting only
    // balances once a complete head follows in the same region.
    if let Some(proxy) = proxy {
        let (done, offset) = proxy.parse(&buf[..len]);
        if !done {
            return Ok(0);
        }
        pos = offset.min(len);
    }

    // Request line. The method keeps its original bytes; only header names
    // are lowercased.
    let method_start = pos;
    while scan::is_field_name_byte(buf[pos]) {
        pos += 1;
    }
    if pos == method_start || buf[pos] == b'\r' || buf[pos] >= 33 {
        return Ok(0);
    }
    let method_end = pos;

    while buf[pos] < 33 && buf[pos] != b'\r' {
        pos += 1;
    }
    let target_start = pos;
    while buf[pos] != b' ' && buf[pos] != b'\r' {
        pos += 1;
    }
    if pos == target_start || buf[pos] == b'\r' {
        // missing target, or a request line without a version token; the
        // latter can never complete and resolves at the fallback cap
        return Ok(0);
    }
    let target_end = pos;

    while buf[pos] < 33 && buf[pos] != b'\r' {
        pos += 1;
    }
    let version_start = pos;
    let version_end = match scan::find_cr(&buf[pos..len]) {
        Some(offset) => pos + offset,
        None => return Ok(0),
    };
    if buf[version_end + 1] != b'\n' {
        return Ok(0);
    }
    request.version = Version::from_bytes(&buf[version_start..version_end])?;

    // SAFETY: see into_static.
    request.slots[0] = HeaderSlot {
        name: unsafe { into_static(&buf[method_start..method_end]) },
        value: unsafe { into_static(&buf[target_start..target_end]) },
    };
    pos = version_end + 2;

    // Header fields.
    let mut index = 1;
    while index < MAX_HEADERS {
        if buf[pos] == b'\r' {
            // candidate blank line ending the head; the sentinel at
            // buf[len] must not count
            return match pos != len && buf[pos + 1] == b'\n' {
                true => {
                    request.slots[index] = HeaderSlot::EMPTY;
                    Ok(pos + 2)
                }
                false => Ok(0),
            };
        }

        let name_start = pos;
        while scan::is_field_name_byte(buf[pos]) {
            buf[pos] |= 0x20;
            pos += 1;
        }
        if pos == name_start {
            return Ok(0);
        }
        if buf[pos] >= 33 && buf[pos] != b':' {
            // a byte outside the field-name set ends the line for good
            return Ok(0);
        }
        let name_end = pos;

        // skip the colon and any whitespace before the value
        while (buf[pos] == b':' || buf[pos] < 33) && buf[pos] != b'\r' {
            pos += 1;
        }
        let value_start = pos;
        let value_end = match scan::find_cr(&buf[pos..len]) {
            Some(offset) => pos + offset,
            None => return Ok(0),
        };
        if buf[value_end + 1] != b'\n' {
            return Ok(0);
        }

        // SAFETY: see into_static.
        request.slots[index] = HeaderSlot {
            name: unsafe { into_static(&buf[name_start..name_end]) },
            value: unsafe { into_static(&buf[value_start..value_end]) },
        };
        pos = value_end + 2;
        index += 1;
    }

    // header table overflow reads as "not yet a head" and resolves once the
    // fallback cap is reached
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::MINIMUM_POST_PADDING;
    use crate::tools::*;

    /// Parses `input` with padding and hands the live request to `check`
    /// while the backing buffer is still in scope.
    fn with_parsed<F>(input: &str, check: F)
    where
        F: FnOnce(&mut Request, Result<usize, ErrorKind>),
    {
        let mut buf = input.as_bytes().to_vec();
        buf.resize(input.len() + MINIMUM_POST_PADDING, 0);
        buf[input.len()] = b'\r';

        let mut request = Request::new();
        let result = parse_head(&mut buf, input.len(), &mut request, None);
        if let Ok(consumed) = result {
            if consumed > 0 {
                request.index_headers();
                request.locate_query();
            }
        }
        check(&mut request, result);
    }

    #[test]
    fn minimal_head() {
        let input = "GET /a?x=1 HTTP/1.1\r\nHost: h\r\n\r\n";
        with_parsed(input, |req, result| {
            assert_eq!(result, Ok(input.len()));
            assert_eq!(str_op(req.method()), "GET");
            assert_eq!(str_op(req.url()), "/a");
            assert_eq!(str_op(req.full_url()), "/a?x=1");
            assert_eq!(req.query_separator, 2);
            assert_eq!(str_op(req.query()), "x=1");
            assert_eq!(str(req.query_value(b"x")), Some("1"));
            assert_eq!(str(req.header(b"host")), Some("h"));
            assert_eq!(req.version(), Version::Http11);
            assert!(!req.is_ancient());
        });
    }

    #[test]
    fn method_case_preserved() {
        with_parsed("gEt / HTTP/1.1\r\n\r\n", |req, result| {
            assert!(result.is_ok_and(|consumed| consumed > 0));
            assert_eq!(str_op(req.method()), "gEt");
            assert!(req.method_is(b"get"));
            assert!(!req.method_is(b"put"));

            let mut scratch = [0; 8];
            assert_eq!(req.method_lowercase_into(&mut scratch), b"get");
            // the table still holds the original bytes
            assert_eq!(str_op(req.method()), "gEt");
        });
    }

    #[test]
    fn names_lowercased_in_place() {
        let input = "GET / HTTP/1.1\r\nHOST: Ex\r\nX-Custom-ID: AbC\r\n\r\n";
        with_parsed(input, |req, result| {
            assert_eq!(result, Ok(input.len()));

            let headers: Vec<_> = req.headers().collect();
            assert_eq!(headers.len(), 2);
            assert_eq!(str_2(headers[0]), ("host", "Ex"));
            assert_eq!(str_2(headers[1]), ("x-custom-id", "AbC"));

            // values keep their case
            assert_eq!(str(req.header(b"host")), Some("Ex"));
            assert_eq!(str(req.header(b"x-custom-id")), Some("AbC"));
            assert_eq!(req.header(b"HOST"), None);
        });
    }

    #[test]
    fn versions() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n", Ok(Version::Http11)),
            ("GET / HTTP/1.0\r\n\r\n", Ok(Version::Http10)),
            ("GET / HTTP/2.0\r\n\r\n", Err(ErrorKind::UnsupportedVersion)),
            ("GET / HTTP/0.9\r\n\r\n", Err(ErrorKind::UnsupportedVersion)),
            ("GET / http/1.1\r\n\r\n", Err(ErrorKind::UnsupportedVersion)),
        ];

        for (input, expected) in cases {
            with_parsed(input, |req, result| match expected {
                Ok(version) => {
                    assert_eq!(result, Ok(input.len()), "input {:?}", input);
                    assert_eq!(req.version(), version);
                    assert_eq!(req.is_ancient(), version == Version::Http10);
                }
                Err(kind) => assert_eq!(result, Err(kind), "input {:?}", input),
            });
        }
    }

    #[test]
    fn incomplete_heads_return_zero() {
        #[rustfmt::skip]
        let cases = [
            "",
            "G",
            "GET",
            "GET ",
            "GET /",
            "GET / HTTP/1.1",
            "GET / HTTP/1.1\r",
            "GET / HTTP/1.1\r\n",
            "GET / HTTP/1.1\r\nHost: h",
            "GET / HTTP/1.1\r\nHost: h\r\n",
            "GET / HTTP/1.1\r\nHost: h\r\n\r",
        ];

        for input in cases {
            with_parsed(input, |_, result| {
                assert_eq!(result, Ok(0), "input {:?}", input);
            });
        }
    }

    #[test]
    fn malformed_heads_return_zero() {
        #[rustfmt::skip]
        let cases = [
            " GET / HTTP/1.1\r\n\r\n",            // leading space
            "GET/ HTTP/1.1\r\n\r\n",              // no space after method
            "GET  HTTP/1.1\r\n\r\n",              // version token becomes the target
            "GET /\r\n\r\n",                      // no version token
            "\r\n\r\n",                           // no request line
            "GET / HTTP/1.1\r\nH@der: x\r\n\r\n", // bad name byte
            "GET / HTTP/1.1\r\n: x\r\n\r\n",      // empty name
        ];

        for input in cases {
            with_parsed(input, |_, result| {
                assert!(
                    matches!(result, Ok(0) | Err(ErrorKind::UnsupportedVersion)),
                    "input {:?} gave {:?}",
                    input,
                    result
                );
            });
        }
    }

    #[test]
    fn whitespace_only_value_is_empty() {
        let input = "GET / HTTP/1.1\r\nX-Empty: \r\nX-Space:    \r\n\r\n";
        with_parsed(input, |req, result| {
            assert_eq!(result, Ok(input.len()));
            assert_eq!(str(req.header(b"x-empty")), Some(""));
            assert_eq!(str(req.header(b"x-space")), Some(""));
        });
    }

    #[test]
    fn value_whitespace_trimmed_only_left() {
        let input = "GET / HTTP/1.1\r\nUser-Agent:   curl/8.0 \r\n\r\n";
        with_parsed(input, |req, result| {
            assert_eq!(result, Ok(input.len()));
            assert_eq!(str(req.header(b"user-agent")), Some("curl/8.0 "));
        });
    }

    #[test]
    fn duplicate_headers_first_wins() {
        let input = "GET / HTTP/1.1\r\nMulti: one\r\nMulti: two\r\n\r\n";
        with_parsed(input, |req, result| {
            assert_eq!(result, Ok(input.len()));
            assert_eq!(str(req.header(b"multi")), Some("one"));
            assert_eq!(req.headers().count(), 2);
        });
    }

    #[test]
    fn header_table_capacity() {
        let fits = (1..=48)
            .map(|i| format!("H{}: v\r\n", i))
            .collect::<String>();
        let head = format!("GET / HTTP/1.1\r\n{}\r\n", fits);
        with_parsed(&head, |req, result| {
            assert_eq!(result, Ok(head.len()));
            assert_eq!(req.headers().count(), 48);
            assert_eq!(str(req.header(b"h48")), Some("v"));
        });

        let overflowing = format!("GET / HTTP/1.1\r\nExtra: v\r\n{}\r\n", fits);
        with_parsed(&overflowing, |_, result| {
            assert_eq!(result, Ok(0));
        });
    }

    #[test]
    fn query_separator_absent() {
        with_parsed("GET /plain HTTP/1.1\r\n\r\n", |req, result| {
            assert!(result.is_ok_and(|consumed| consumed > 0));
            assert_eq!(req.query_separator, "/plain".len());
            assert_eq!(str_op(req.url()), "/plain");
            assert_eq!(str_op(req.query()), "");
            assert_eq!(req.query_value(b"any"), None);
        });
    }

    #[test]
    fn pipelined_heads_consume_one() {
        let first = "GET /1 HTTP/1.1\r\nHost: h\r\n\r\n";
        let input = format!("{}GET /2 HTTP/1.1\r\nHost: h\r\n\r\n", first);
        with_parsed(&input, |req, result| {
            assert_eq!(result, Ok(first.len()));
            assert_eq!(str_op(req.full_url()), "/1");
        });
    }

    #[test]
    fn yield_and_parameters() {
        with_parsed("GET / HTTP/1.1\r\n\r\n", |req, result| {
            assert!(result.is_ok_and(|consumed| consumed > 0));

            assert!(!req.did_yield());
            req.set_yield(true);
            assert!(req.did_yield());

            let id = b"42".as_slice();
            let name = b"widget".as_slice();
            req.set_parameters(&[id, name]);
            assert_eq!(str(req.parameter(0)), Some("42"));
            assert_eq!(str(req.parameter(1)), Some("widget"));
            assert_eq!(req.parameter(2), None);

            req.reset();
            assert_eq!(req.parameter(0), None);
            assert!(!req.did_yield());
        });
    }

    #[test]
    fn reset_clears_table() {
        with_parsed("GET /x HTTP/1.1\r\nHost: h\r\n\r\n", |req, result| {
            assert!(result.is_ok_and(|consumed| consumed > 0));
            assert_eq!(str(req.header(b"host")), Some("h"));

            req.reset();
            assert_eq!(req.header(b"host"), None);
            assert_eq!(req.method(), b"");
            assert_eq!(req.full_url(), b"");
            assert_eq!(req.headers().count(), 0);
        });
    }
}
