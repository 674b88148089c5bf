//! Request scheduler and event loop.
//!
//! The scheduler admits enqueued requests up to the concurrency cap,
//! advances every in-flight request through its lifecycle in state-ordered
//! batches, and surfaces progress as coalescing per-request events. One
//! `event_loop_tick` never blocks beyond the bounded readiness waits; all
//! socket I/O is non-blocking and a read or write that cannot proceed
//! simply retries on a later pass.

use std::io;
use std::net::ToSocketAddrs;
use std::os::fd::RawFd;

use bytes::Bytes;
use log::{debug, warn};
use slab::Slab;

use crate::config::Config;
use crate::conn::Connection;
use crate::decode::{encoding_tokens, Pipeline};
use crate::error::Error;
use crate::event::{EventKind, EventSet, PRIORITY};
use crate::headers;
use crate::metrics;
use crate::poll::{self, Interest};
use crate::request::{Request, RequestId, RequestState};
use crate::response::Response;
use crate::tls::{HandshakeStatus, TlsSession};
use crate::url::{Url, UrlError};

/// Read and upload granularity for socket I/O.
const IO_CHUNK: usize = 8 * 1024;

/// Single-threaded scheduler driving many HTTP exchanges cooperatively.
///
/// Requests are never dropped for the lifetime of the client, so ids stay
/// valid for redirect-chain walks and late reads of terminal state.
pub struct Client {
    config: Config,
    requests: Vec<Request>,
    connections: Slab<Connection>,
    events: Vec<EventSet>,
    // Event cursor, overwritten by each await_next_event call.
    last_event: Option<EventKind>,
    last_request: Option<RequestId>,
    last_chunk: Option<Bytes>,
}

impl Client {
    pub fn new(config: Config) -> Client {
        Client {
            config,
            requests: Vec::new(),
            connections: Slab::new(),
            events: Vec::new(),
            last_event: None,
            last_request: None,
            last_chunk: None,
        }
    }

    // ── Admission ───────────────────────────────────────────────────

    /// Append a request to the scheduler. Returns immediately; the socket
    /// is opened once a concurrency slot frees up.
    pub fn enqueue(&mut self, request: Request) -> RequestId {
        let id = RequestId(self.requests.len());
        debug!("enqueue #{}: {} {}", id.0, request.method, request.url);
        self.requests.push(request);
        self.events.push(EventSet::default());
        metrics::REQUESTS_ENQUEUED.increment();
        id
    }

    /// Append several requests in order.
    pub fn enqueue_many(&mut self, requests: impl IntoIterator<Item = Request>) -> Vec<RequestId> {
        requests.into_iter().map(|r| self.enqueue(r)).collect()
    }

    /// Read back a request between `await_next_event` calls.
    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(id.0)
    }

    /// Number of requests ever enqueued.
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    // ── Event consumption ───────────────────────────────────────────

    /// Cooperatively wait for the next pending event, ticking the loop as
    /// needed. Returns `false` only when no request has work left. With a
    /// `query`, only events of the given requests (and their redirect
    /// descendants) are considered, and consumed.
    pub fn await_next_event(&mut self, query: Option<&[RequestId]>) -> bool {
        loop {
            for id in self.query_scope(query) {
                for kind in PRIORITY {
                    if self.events[id.0].take(kind) {
                        self.last_event = Some(kind);
                        self.last_request = Some(id);
                        self.last_chunk = if kind == EventKind::BodyChunkAvailable {
                            Some(self.requests[id.0].body_pending.take_all())
                        } else {
                            None
                        };
                        return true;
                    }
                }
            }
            if !self.event_loop_tick() {
                self.last_event = None;
                self.last_request = None;
                self.last_chunk = None;
                return false;
            }
        }
    }

    /// Kind of the last event returned by [`Client::await_next_event`].
    pub fn last_event(&self) -> Option<EventKind> {
        self.last_event
    }

    /// Request the last event belongs to.
    pub fn last_request(&self) -> Option<RequestId> {
        self.last_request
    }

    /// Decoded body bytes carried by the last `BodyChunkAvailable` event.
    pub fn last_body_chunk(&self) -> Option<Bytes> {
        self.last_chunk.clone()
    }

    /// Requests the query covers, following `redirected_to` links so a
    /// scoped wait also sees events of redirect descendants.
    fn query_scope(&self, query: Option<&[RequestId]>) -> Vec<RequestId> {
        match query {
            None => (0..self.requests.len()).map(RequestId).collect(),
            Some(ids) => {
                let mut scope = Vec::new();
                for &id in ids {
                    let mut cursor = Some(id);
                    while let Some(at) = cursor {
                        if at.0 >= self.requests.len() || scope.contains(&at) {
                            break;
                        }
                        scope.push(at);
                        cursor = self.requests[at.0].redirected_to;
                    }
                }
                scope
            }
        }
    }

    // ── Event loop ──────────────────────────────────────────────────

    /// Requests allowed to make progress this pass: everything already
    /// holding a socket plus enough enqueued requests to fill the cap.
    fn active_requests(&self) -> Vec<RequestId> {
        let mut batch: Vec<RequestId> = Vec::new();
        let mut enqueued: Vec<RequestId> = Vec::new();
        for (i, request) in self.requests.iter().enumerate() {
            if request.state.is_active() {
                batch.push(RequestId(i));
            } else if request.state == RequestState::Enqueued {
                enqueued.push(RequestId(i));
            }
        }
        let budget = self.config.concurrency.saturating_sub(batch.len());
        batch.extend(enqueued.into_iter().take(budget));
        batch.sort_unstable();
        batch
    }

    /// One pass over every active request, in lifecycle order. Returns
    /// `true` while at least one request had work at the start of the
    /// pass.
    fn event_loop_tick(&mut self) -> bool {
        let batch = self.active_requests();
        if batch.is_empty() {
            return false;
        }

        for &id in &batch {
            if self.requests[id.0].state == RequestState::Enqueued {
                if let Err(err) = self.open_connection(id) {
                    self.fail(id, err);
                }
            }
        }
        for id in self.ready_set(&batch, RequestState::WillEnableCrypto, Interest::Writable) {
            if let Err(err) = self.advance_tls(id) {
                self.fail(id, err);
            }
        }
        for id in self.ready_set(&batch, RequestState::WillSendHeaders, Interest::Writable) {
            if let Err(err) = self.write_head(id) {
                self.fail(id, err);
            }
        }
        for id in self.ready_set(&batch, RequestState::WillSendBody, Interest::Writable) {
            if let Err(err) = self.pump_upload(id) {
                self.fail(id, err);
            }
        }
        for id in self.ready_set(&batch, RequestState::ReceivingHeaders, Interest::Readable) {
            if let Err(err) = self.read_head(id) {
                self.fail(id, err);
            }
        }
        for id in self.ready_set(&batch, RequestState::ReceivingBody, Interest::Readable) {
            if let Err(err) = self.read_body(id) {
                self.fail(id, err);
            }
        }
        for &id in &batch {
            if self.requests[id.0].state == RequestState::Received {
                self.finalize(id);
            }
        }
        true
    }

    /// One bounded readiness wait over the batch members in `state`.
    /// A primitive failure fails every waiting request; a timeout is a
    /// normal no-op.
    fn ready_set(
        &mut self,
        batch: &[RequestId],
        state: RequestState,
        interest: Interest,
    ) -> Vec<RequestId> {
        let mut waiting: Vec<(RequestId, RawFd)> = Vec::new();
        for &id in batch {
            let request = &self.requests[id.0];
            if request.state != state {
                continue;
            }
            if let Some(key) = request.conn {
                waiting.push((id, self.connections[key].fd()));
            }
        }
        if waiting.is_empty() {
            return Vec::new();
        }

        let fds: Vec<RawFd> = waiting.iter().map(|(_, fd)| *fd).collect();
        match poll::await_ready(&fds, interest, self.config.poll_timeout) {
            Ok(ready) => waiting
                .into_iter()
                .filter(|(_, fd)| ready.contains(fd))
                .map(|(id, _)| id)
                .collect(),
            Err(err) => {
                metrics::POLL_ERRORS.increment();
                let message = err.to_string();
                for (id, _) in waiting {
                    self.fail(id, Error::Readiness(message.clone()));
                }
                Vec::new()
            }
        }
    }

    // ── Per-state steps ─────────────────────────────────────────────

    /// Parse the URL, start the non-blocking connect, and queue the
    /// serialized head.
    fn open_connection(&mut self, id: RequestId) -> Result<(), Error> {
        let url = match Url::parse(&self.requests[id.0].url) {
            Ok(url) => url,
            Err(UrlError::UnsupportedScheme(scheme)) => return Err(Error::InvalidScheme(scheme)),
            Err(UrlError::Malformed(detail)) => return Err(Error::InvalidScheme(detail)),
        };

        let tls = if url.is_https() {
            let tls_config = self
                .config
                .tls_client
                .as_ref()
                .ok_or_else(|| Error::Tls("no TLS client configuration".to_string()))?;
            Some(TlsSession::new(tls_config, url.host())?)
        } else {
            None
        };

        let addr = (url.host(), url.port_or_default())
            .to_socket_addrs()
            .map_err(|e| Error::Connect(format!("resolve {}: {e}", url.host())))?
            .next()
            .ok_or_else(|| Error::Connect(format!("no address for {}", url.host())))?;
        let sock = poll::connect_nonblocking(addr).map_err(|e| Error::Connect(e.to_string()))?;

        let head = headers::serialize_request(&self.requests[id.0], &url, &self.config.user_agent);
        let mut conn = Connection::new(sock, tls);
        conn.queue_write(&head);
        let key = self.connections.insert(conn);

        let request = &mut self.requests[id.0];
        request.conn = Some(key);
        request.state = if url.is_https() {
            RequestState::WillEnableCrypto
        } else {
            RequestState::WillSendHeaders
        };
        request.target = Some(url);
        debug!("request #{}: connecting to {addr}", id.0);
        Ok(())
    }

    fn advance_tls(&mut self, id: RequestId) -> Result<(), Error> {
        let Some(key) = self.requests[id.0].conn else {
            return Ok(());
        };
        let status = {
            let conn = &mut self.connections[key];
            conn.check_connect().map_err(|e| Error::Connect(e.to_string()))?;
            conn.advance_handshake().map_err(|e| Error::Tls(e.to_string()))?
        };
        if status == HandshakeStatus::Complete {
            debug!("request #{}: tls handshake complete", id.0);
            self.requests[id.0].state = RequestState::WillSendHeaders;
        }
        Ok(())
    }

    fn write_head(&mut self, id: RequestId) -> Result<(), Error> {
        let Some(key) = self.requests[id.0].conn else {
            return Ok(());
        };
        {
            let conn = &mut self.connections[key];
            conn.check_connect().map_err(|e| Error::Connect(e.to_string()))?;
            match conn.write_pending() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => return Err(Error::Write(e.to_string())),
            }
        }
        let request = &mut self.requests[id.0];
        request.state = if request.has_upload_body() {
            RequestState::WillSendBody
        } else {
            RequestState::ReceivingHeaders
        };
        Ok(())
    }

    /// Stream the upload body in bounded chunks until the source reports
    /// end of stream.
    fn pump_upload(&mut self, id: RequestId) -> Result<(), Error> {
        let Some(key) = self.requests[id.0].conn else {
            return Ok(());
        };
        {
            let conn = &mut self.connections[key];
            match conn.write_pending() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => return Err(Error::Write(e.to_string())),
            }
        }
        let chunk = self.requests[id.0]
            .body
            .next_chunk(IO_CHUNK)
            .map_err(|e| Error::UploadRead(e.to_string()))?;
        match chunk {
            None => self.requests[id.0].state = RequestState::ReceivingHeaders,
            Some(chunk) => {
                let conn = &mut self.connections[key];
                conn.queue_write(&chunk);
                if let Err(e) = conn.write_pending() {
                    return Err(Error::Write(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Accumulate head bytes one at a time, so the body is never
    /// over-read, and parse once the terminator arrives.
    fn read_head(&mut self, id: RequestId) -> Result<(), Error> {
        let Some(key) = self.requests[id.0].conn else {
            return Ok(());
        };
        let head = loop {
            let conn = &mut self.connections[key];
            let mut byte = [0u8; 1];
            match conn.read(&mut byte) {
                Ok(0) => {
                    return Err(Error::Protocol(
                        "connection closed before response head".to_string(),
                    ))
                }
                Ok(_) => {
                    metrics::BYTES_RECEIVED.add(1);
                    conn.head_buf.append(&byte);
                    if conn.head_buf.ends_with(b"\r\n\r\n") {
                        break headers::parse_response_head(conn.head_buf.data())?;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Protocol(format!("read failed: {e}"))),
            }
        };
        self.begin_body(id, Response::from_head(head))
    }

    /// Route a parsed head: redirect candidates skip straight to
    /// `Received`; everything else gets a decoder pipeline and emits
    /// `GotHeaders`.
    fn begin_body(&mut self, id: RequestId, response: Response) -> Result<(), Error> {
        debug!(
            "request #{}: {} {}",
            id.0,
            response.status(),
            response.reason()
        );
        if response.is_redirect() {
            let request = &mut self.requests[id.0];
            request.response = Some(response);
            request.state = RequestState::Received;
            return Ok(());
        }

        let transfer = encoding_tokens(response.header("transfer-encoding").unwrap_or(""));
        let content = encoding_tokens(response.header("content-encoding").unwrap_or(""));
        let pipeline = Pipeline::build(&transfer, &content)?;

        let request = &mut self.requests[id.0];
        request.response = Some(response);
        request.state = RequestState::ReceivingBody;
        if let Some(key) = request.conn {
            self.connections[key].pipeline = Some(pipeline);
        }
        self.events[id.0].set(EventKind::GotHeaders);
        Ok(())
    }

    /// One bounded raw read, fed through the decoder pipeline; decoded
    /// bytes accumulate on the request until the caller consumes the
    /// coalesced `BodyChunkAvailable` event.
    fn read_body(&mut self, id: RequestId) -> Result<(), Error> {
        let Some(key) = self.requests[id.0].conn else {
            return Ok(());
        };

        let mut drained: Vec<Bytes> = Vec::new();
        let mut closed = false;
        let (pipeline_eof, transparent) = {
            let conn = &mut self.connections[key];
            // Drain the socket: a TLS session may hold more decrypted
            // bytes than one read returns, and the fd will not poll
            // readable for them again.
            loop {
                let mut raw = [0u8; IO_CHUNK];
                match conn.read(&mut raw) {
                    Ok(0) => {
                        closed = true;
                        break;
                    }
                    Ok(n) => {
                        metrics::BYTES_RECEIVED.add(n as u64);
                        if let Some(pipeline) = conn.pipeline.as_mut() {
                            pipeline.feed(&raw[..n]);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Protocol(format!("read failed: {e}"))),
                }
            }
            let Some(pipeline) = conn.pipeline.as_mut() else {
                return Ok(());
            };
            if closed {
                pipeline.close();
            }
            loop {
                let chunk = pipeline.read(IO_CHUNK)?;
                if chunk.is_empty() {
                    break;
                }
                drained.push(chunk);
            }
            (pipeline.is_eof(), pipeline.is_transparent())
        };

        let decoded: u64 = drained.iter().map(|c| c.len() as u64).sum();
        let request = &mut self.requests[id.0];
        for chunk in drained {
            request.body_pending.append(&chunk);
        }
        let mut declared_done = false;
        if let Some(response) = request.response.as_mut() {
            response.bytes_received += decoded;
            if transparent {
                if let Some(total) = response.total_bytes {
                    declared_done = response.bytes_received >= total;
                }
            }
        }
        if decoded > 0 {
            self.events[id.0].set(EventKind::BodyChunkAvailable);
        }
        if pipeline_eof || declared_done {
            self.requests[id.0].state = RequestState::Received;
        } else if closed {
            // Only a transparent pipeline may end on raw socket EOF; a
            // decoder that has not reached its own end marker means the
            // peer cut the body short.
            if !transparent {
                return Err(Error::Protocol(
                    "connection closed before end of body".to_string(),
                ));
            }
            self.requests[id.0].state = RequestState::Received;
        }
        Ok(())
    }

    // ── Completion ──────────────────────────────────────────────────

    /// Tear down the socket, then either follow a redirect or finish.
    fn finalize(&mut self, id: RequestId) {
        if let Some(key) = self.requests[id.0].conn.take() {
            self.connections.remove(key);
        }

        let location = match self.requests[id.0].response.as_ref() {
            Some(response) if response.is_redirect() => {
                response.header("location").map(str::to_string)
            }
            _ => None,
        };
        match location {
            Some(location) => match self.follow_redirect(id, &location) {
                Ok(()) => {}
                Err(err) => self.fail(id, err),
            },
            None => self.mark_finished(id, true),
        }
    }

    /// Enqueue the redirect child and finish the parent with a `Redirect`
    /// event in place of `Finished`: a request emits at most one
    /// terminal event.
    fn follow_redirect(&mut self, id: RequestId, location: &str) -> Result<(), Error> {
        if self.hop_count(id) >= self.config.max_redirects {
            return Err(Error::TooManyRedirects);
        }
        let target = self.resolve_location(id, location)?;
        debug!("request #{}: redirect to {target}", id.0);

        let version = self.requests[id.0].version;
        let mut child = Request::new(target).http_version(version);
        child.redirected_from = Some(id);
        let child_id = self.enqueue(child);

        self.requests[id.0].redirected_to = Some(child_id);
        self.events[id.0].set(EventKind::Redirect);
        metrics::REDIRECTS_FOLLOWED.increment();
        self.mark_finished(id, false);
        Ok(())
    }

    /// Absolute locations are used verbatim; anything else is joined to
    /// the current origin. The result must itself parse as a URL.
    fn resolve_location(&self, id: RequestId, location: &str) -> Result<String, Error> {
        let absolute =
            location.starts_with("http://") || location.starts_with("https://");
        let target = if absolute {
            location.to_string()
        } else {
            let origin = self.requests[id.0]
                .target
                .as_ref()
                .map(Url::origin)
                .ok_or_else(|| Error::InvalidRedirectUrl(location.to_string()))?;
            if location.starts_with('/') {
                format!("{origin}{location}")
            } else {
                format!("{origin}/{location}")
            }
        };
        match Url::parse(&target) {
            Ok(_) => Ok(target),
            Err(_) => Err(Error::InvalidRedirectUrl(target)),
        }
    }

    /// Length of the `redirected_from` chain back to the original request.
    fn hop_count(&self, id: RequestId) -> usize {
        let mut hops = 0;
        let mut cursor = self.requests[id.0].redirected_from;
        while let Some(parent) = cursor {
            hops += 1;
            cursor = self.requests[parent.0].redirected_from;
        }
        hops
    }

    fn mark_finished(&mut self, id: RequestId, emit: bool) {
        self.requests[id.0].state = RequestState::Finished;
        if emit {
            self.events[id.0].set(EventKind::Finished);
        }
        metrics::REQUESTS_FINISHED.increment();
    }

    /// Terminal error path: close the socket, record the error, emit
    /// `Failed`. Other in-flight requests are unaffected.
    fn fail(&mut self, id: RequestId, err: Error) {
        warn!("request #{} failed: {err}", id.0);
        if let Some(key) = self.requests[id.0].conn.take() {
            self.connections.remove(key);
        }
        self.requests[id.0].state = RequestState::Failed;
        self.requests[id.0].error = Some(err);
        self.events[id.0].set(EventKind::Failed);
        metrics::REQUESTS_FAILED.increment();
    }
}
