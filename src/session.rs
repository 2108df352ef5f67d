//! Session driver: feeds arbitrary transport chunks through head
//! tokenization and body streaming.
//!
//! One [`Session`] belongs to exactly one connection. The driver owns the
//! fallback buffer for heads split across reads and the body counter;
//! everything else is borrowed from the chunk handed to
//! [`Session::consume`]. For one connection the callbacks fire in strict
//! byte order of the input stream: the head callback of request N precedes
//! all of its body chunks, which precede request N+1's head.

use crate::{
    errors::ErrorKind,
    http::{
        chunked::ChunkDecoder,
        request::{Request, Version, parse_head},
        scan,
    },
    limits::{MINIMUM_POST_PADDING, SessionLimits},
};
use std::mem;

// CONTROL FLOW

/// Decision returned by handler callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control<T> {
    /// Keep parsing this connection.
    Continue,
    /// The handler switched protocols (e.g. a WebSocket upgrade); parsing
    /// stops and the payload surfaces from [`Session::consume`].
    Upgrade(T),
    /// The handler closed the connection; parsing stops.
    Close,
}

/// Connection disposition returned by [`Session::consume`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status<T> {
    /// Input exhausted; feed the next chunk when it arrives.
    Ready,
    /// A handler upgraded the connection; no further callbacks were issued
    /// for the bytes that followed.
    Upgraded(T),
    /// A handler closed the connection.
    Closed,
}

/// Application callbacks driven by the session.
pub trait Handler {
    /// Payload carried through [`Control::Upgrade`], e.g. the socket
    /// wrapper of a negotiated WebSocket.
    type Upgrade;

    /// Called once per parsed head. Slices reachable through `request` are
    /// valid only until this call returns; copy what must outlive it.
    fn on_request(&mut self, request: &mut Request) -> Control<Self::Upgrade>;

    /// Called zero or more times per request with body bytes; `is_end`
    /// marks the final chunk, which may be empty. Requests without a body
    /// get exactly one empty end-of-stream call.
    fn on_data(&mut self, chunk: &[u8], is_end: bool) -> Control<Self::Upgrade>;
}

/// PROXY-protocol preamble seam.
///
/// When configured, every not-yet-tokenized prefix is offered to this seam
/// before head tokenization. `(false, _)` buffers and retries once more
/// bytes arrive; `(true, n)` skips `n` preamble bytes. Input without a
/// preamble must report `(true, 0)`. Repeated preambles overwrite prior
/// state and are not a framing error.
pub trait ProxyProtocol: Send {
    fn parse(&mut self, data: &[u8]) -> (bool, usize);
}

// BODY FRAMING

/// Framing classification of the message body in progress.
#[derive(Debug)]
enum BodyState {
    None,
    /// Remaining fixed-length bytes; 30-bit by construction of the bounded
    /// decimal parser.
    Fixed(u32),
    Chunked(ChunkDecoder),
}

/// Progress of one body-draining pass.
enum Drained<T> {
    /// Body complete after this many bytes; head parsing may continue.
    Complete(usize),
    /// Every input byte was consumed and the body is still in progress.
    Exhausted,
    /// A handler broke out of parsing.
    Broke(Status<T>),
}

enum FallbackOutcome<T> {
    /// Still no complete head; wait for more bytes.
    Waiting,
    Broke(Status<T>),
    /// Head (and any available body) handled; this many input bytes are
    /// already accounted for.
    Resumed(usize),
}

// SESSION

/// Incremental HTTP/1.x request parser for one connection.
///
/// The parser is single-threaded and cooperative: no locking, no timers,
/// no I/O. It returns whenever input is exhausted and resumes on the next
/// [`consume`](Session::consume) call.
pub struct Session {
    request: Request,
    body: BodyState,
    fallback: Vec<u8>,
    limits: SessionLimits,
    proxy: Option<Box<dyn ProxyProtocol>>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_limits(SessionLimits::default())
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Session {
            request: Request::new(),
            body: BodyState::None,
            fallback: Vec::new(),
            limits,
            proxy: None,
        }
    }

    /// Installs a PROXY preamble parser for this connection.
    pub fn with_proxy(mut self, proxy: Box<dyn ProxyProtocol>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Returns the session to its initial state so it can serve a new
    /// connection without reallocating.
    pub fn reset(&mut self) {
        self.request.reset();
        self.body = BodyState::None;
        self.fallback.clear();
    }

    /// Feeds one transport chunk through the parser.
    ///
    /// `buf[..len]` is the chunk. The caller must leave at least
    /// [`MINIMUM_POST_PADDING`] writable bytes past it: the tokenizer
    /// writes a `\r` sentinel at `buf[len]` and lowercases header names in
    /// place, so the region is consumed destructively. On
    /// `Ok(Status::Ready)` every byte has been dispatched or stashed and
    /// the caller should read more. Errors are terminal for the
    /// connection.
    pub fn consume<H: Handler>(
        &mut self,
        buf: &mut [u8],
        len: usize,
        handler: &mut H,
    ) -> Result<Status<H::Upgrade>, ErrorKind> {
        assert!(
            buf.len() >= len + MINIMUM_POST_PADDING,
            "input must carry {MINIMUM_POST_PADDING} bytes of post-padding"
        );

        let mut cursor = 0;

        if !matches!(self.body, BodyState::None) {
            // a body is mid-stream from a previous chunk
            match self.drain_body(&buf[..len], handler)? {
                Drained::Exhausted => return Ok(Status::Ready),
                Drained::Broke(status) => return Ok(status),
                Drained::Complete(used) => cursor = used,
            }
        } else if !self.fallback.is_empty() {
            match self.drain_fallback(&buf[..len], handler)? {
                FallbackOutcome::Waiting => return Ok(Status::Ready),
                FallbackOutcome::Broke(status) => return Ok(status),
                FallbackOutcome::Resumed(used) => cursor = used,
            }
        }

        let (consumed, broke) =
            self.fence_and_consume(&mut buf[cursor..], len - cursor, false, handler)?;
        if let Some(status) = broke {
            return Ok(status);
        }
        cursor += consumed;

        let rest = len - cursor;
        if rest > 0 {
            if rest >= self.limits.max_fallback {
                return Err(ErrorKind::FallbackOverflow);
            }
            self.fallback.extend_from_slice(&buf[cursor..len]);
        }

        Ok(Status::Ready)
    }

    /// Appends input to the stashed partial head and retries tokenization
    /// in consume-minimally mode (at most one head, no greedy body drain).
    fn drain_fallback<H: Handler>(
        &mut self,
        buf: &[u8],
        handler: &mut H,
    ) -> Result<FallbackOutcome<H::Upgrade>, ErrorKind> {
        let had = self.fallback.len();
        let take = (self.limits.max_fallback - had).min(buf.len());

        // moved out so the fence can borrow the session alongside it
        let mut stash = mem::take(&mut self.fallback);
        stash.extend_from_slice(&buf[..take]);
        let stash_len = stash.len();
        stash.resize(stash_len + 1, 0); // sentinel slot

        let (consumed, broke) = self.fence_and_consume(&mut stash, stash_len, true, handler)?;
        if let Some(status) = broke {
            return Ok(FallbackOutcome::Broke(status));
        }

        if consumed == 0 {
            if stash_len >= self.limits.max_fallback {
                return Err(ErrorKind::FallbackOverflow);
            }
            stash.truncate(stash_len);
            self.fallback = stash;
            return Ok(FallbackOutcome::Waiting);
        }

        // The stash alone never held a complete head, so the head ends in
        // the appended region and the whole previous stash is consumed.
        // This keeps `consumed - had` from underflowing and dropping data.
        let mut cursor = consumed - had;
        if !matches!(self.body, BodyState::None) {
            match self.drain_body(&buf[cursor..], handler)? {
                Drained::Exhausted => return Ok(FallbackOutcome::Resumed(buf.len())),
                Drained::Broke(status) => return Ok(FallbackOutcome::Broke(status)),
                Drained::Complete(used) => cursor += used,
            }
        }
        Ok(FallbackOutcome::Resumed(cursor))
    }

    /// Tokenizes heads from `buf[..len]` and, outside consume-minimally
    /// mode, drains any body bytes already present, until input runs out, a
    /// handler breaks, or a head is incomplete. Writes the sentinel at
    /// `buf[len]`.
    fn fence_and_consume<H: Handler>(
        &mut self,
        buf: &mut [u8],
        len: usize,
        minimally: bool,
        handler: &mut H,
    ) -> Result<(usize, Option<Status<H::Upgrade>>), ErrorKind> {
        buf[len] = b'\r';
        let mut consumed_total = 0;

        while consumed_total < len {
            self.request.reset();
            let consumed = parse_head(
                &mut buf[consumed_total..],
                len - consumed_total,
                &mut self.request,
                match &mut self.proxy {
                    Some(p) => Some(&mut **p),
                    None => None,
                },
            )?;
            if consumed == 0 {
                break;
            }
            consumed_total += consumed;

            self.request.index_headers();

            // An HTTP/1.1 request must bear host; 1.0 enforcement is
            // configured. Checked before the handler ever sees the request.
            if self.request.lookup(b"host").is_none()
                && (self.request.version() == Version::Http11
                    || self.limits.require_host_on_http10)
            {
                return Err(ErrorKind::MissingHost);
            }

            // RFC 9112 §6.3: both transfer-encoding and content-length is a
            // smuggling vector, rejected outright.
            let transfer_encoding = self.request.lookup(b"transfer-encoding");
            let content_length = self.request.lookup(b"content-length");
            if transfer_encoding.is_some() && content_length.is_some() {
                return Err(ErrorKind::FramingConflict);
            }

            self.request.locate_query();

            match handler.on_request(&mut self.request) {
                Control::Continue => {}
                Control::Upgrade(payload) => {
                    return Ok((consumed_total, Some(Status::Upgraded(payload))));
                }
                Control::Close => return Ok((consumed_total, Some(Status::Closed))),
            }

            // Body classification. Any transfer-encoding value means
            // chunked: a conformant peer only sends chunked, and not
            // inspecting the value closes off a family of obfuscation
            // tricks. Content-length counts even when 0.
            if transfer_encoding.is_some() {
                self.body = BodyState::Chunked(ChunkDecoder::new());
            } else if let Some(value) = content_length {
                match scan::parse_decimal(value) {
                    Some(remaining) if remaining > 0 => {
                        self.body = BodyState::Fixed(remaining);
                    }
                    Some(_) => {}
                    None => return Err(ErrorKind::InvalidContentLength),
                }
            }

            if matches!(self.body, BodyState::None) {
                // no body: one empty end-of-stream chunk
                match handler.on_data(&[], true) {
                    Control::Continue => {}
                    Control::Upgrade(payload) => {
                        return Ok((consumed_total, Some(Status::Upgraded(payload))));
                    }
                    Control::Close => return Ok((consumed_total, Some(Status::Closed))),
                }
                if minimally {
                    break;
                }
                continue;
            }

            if minimally {
                // state is set; the outer driver dispatches the body bytes
                break;
            }

            match self.drain_body(&buf[consumed_total..len], handler)? {
                Drained::Complete(used) => consumed_total += used,
                Drained::Exhausted => return Ok((len, None)),
                Drained::Broke(status) => return Ok((consumed_total, Some(status))),
            }
        }

        Ok((consumed_total, None))
    }

    /// Streams body bytes to the data callback. Shared by the resume path,
    /// the fallback path, and the fence loop.
    fn drain_body<H: Handler>(
        &mut self,
        data: &[u8],
        handler: &mut H,
    ) -> Result<Drained<H::Upgrade>, ErrorKind> {
        match mem::replace(&mut self.body, BodyState::None) {
            BodyState::None => Ok(Drained::Complete(0)),

            BodyState::Fixed(remaining) => {
                let remaining = remaining as usize;
                let emit = remaining.min(data.len());
                let is_end = emit == remaining;
                if !is_end {
                    self.body = BodyState::Fixed((remaining - emit) as u32);
                    if emit == 0 {
                        return Ok(Drained::Exhausted);
                    }
                }
                match handler.on_data(&data[..emit], is_end) {
                    Control::Continue => Ok(match is_end {
                        true => Drained::Complete(emit),
                        false => Drained::Exhausted,
                    }),
                    Control::Upgrade(payload) => Ok(Drained::Broke(Status::Upgraded(payload))),
                    Control::Close => Ok(Drained::Broke(Status::Closed)),
                }
            }

            BodyState::Chunked(mut decoder) => {
                let mut used = 0;
                loop {
                    let (step, segment) = decoder.next_segment(&data[used..])?;
                    used += step;

                    let Some((chunk, is_end)) = segment else {
                        self.body = BodyState::Chunked(decoder);
                        return Ok(Drained::Exhausted);
                    };
                    let control = handler.on_data(chunk, is_end);
                    match control {
                        Control::Continue => {
                            if is_end {
                                return Ok(Drained::Complete(used));
                            }
                        }
                        Control::Upgrade(payload) => {
                            if !is_end {
                                self.body = BodyState::Chunked(decoder);
                            }
                            return Ok(Drained::Broke(Status::Upgraded(payload)));
                        }
                        Control::Close => {
                            if !is_end {
                                self.body = BodyState::Chunked(decoder);
                            }
                            return Ok(Drained::Broke(Status::Closed));
                        }
                    }
                }
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
