//! Request record and lifecycle state.

use crate::body::Body;
use crate::buffer::RecvBuffer;
use crate::error::Error;
use crate::response::Response;
use crate::url::Url;

/// Identifier of a request within one [`Client`](crate::Client).
///
/// Ids are assigned monotonically at enqueue time and never reused; a
/// request is never dropped for the lifetime of its scheduler, so an id
/// stays valid for event replay and redirect-chain walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) usize);

impl RequestId {
    /// Position in the scheduler's request list.
    pub fn index(self) -> usize {
        self.0
    }
}

/// HTTP version tag written on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    Http10,
    #[default]
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVersion::Http10 => "1.0",
            HttpVersion::Http11 => "1.1",
        }
    }
}

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for admission under the concurrency cap.
    Enqueued,
    /// TLS handshake in progress.
    WillEnableCrypto,
    /// Writing the serialized request head.
    WillSendHeaders,
    /// Streaming the upload body.
    WillSendBody,
    /// Accumulating response head bytes.
    ReceivingHeaders,
    /// Draining and decoding the response body.
    ReceivingBody,
    /// Response complete; redirect handling and teardown pending.
    Received,
    /// Terminal: completed normally.
    Finished,
    /// Terminal: failed, see [`Request::error`].
    Failed,
}

impl RequestState {
    /// Holding a socket: neither waiting for admission nor terminal.
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            RequestState::Enqueued | RequestState::Finished | RequestState::Failed
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Finished | RequestState::Failed)
    }
}

/// One HTTP exchange. Built by the caller, then owned and mutated
/// exclusively by the scheduler; callers read it back between
/// `await_next_event` calls.
pub struct Request {
    pub(crate) url: String,
    pub(crate) method: String,
    pub(crate) version: HttpVersion,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Body,
    pub(crate) state: RequestState,
    /// Parsed at admission; also the base for relative redirects.
    pub(crate) target: Option<Url>,
    pub(crate) redirected_from: Option<RequestId>,
    pub(crate) redirected_to: Option<RequestId>,
    pub(crate) error: Option<Error>,
    pub(crate) response: Option<Response>,
    /// Connection slot while a socket is open.
    pub(crate) conn: Option<usize>,
    /// Decoded body bytes not yet delivered through the event cursor.
    /// Lives here rather than on the connection so an undelivered chunk
    /// survives socket teardown.
    pub(crate) body_pending: RecvBuffer,
}

impl Request {
    /// Create a GET request for `url`.
    pub fn new(url: impl Into<String>) -> Request {
        Request {
            url: url.into(),
            method: "GET".to_string(),
            version: HttpVersion::default(),
            headers: Vec::new(),
            body: Body::Empty,
            state: RequestState::Enqueued,
            target: None,
            redirected_from: None,
            redirected_to: None,
            error: None,
            response: None,
            conn: None,
            body_pending: RecvBuffer::new(0),
        }
    }

    /// Alias of [`Request::new`].
    pub fn get(url: impl Into<String>) -> Request {
        Request::new(url)
    }

    /// Set the request method.
    pub fn method(mut self, method: &str) -> Request {
        self.method = method.to_string();
        self
    }

    /// Add a header. Overrides the matching default header on a
    /// case-insensitive name match; the given casing is preserved on the
    /// wire.
    pub fn header(mut self, name: &str, value: &str) -> Request {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the HTTP version tag (default 1.1).
    pub fn http_version(mut self, version: HttpVersion) -> Request {
        self.version = version;
        self
    }

    /// Attach an upload body. The caller supplies the framing headers.
    pub fn body(mut self, body: impl Into<Body>) -> Request {
        self.body = body.into();
        self
    }

    // ── Read-back accessors ─────────────────────────────────────────

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method_name(&self) -> &str {
        &self.method
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// The response, once the first head byte has been parsed.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// The failure that terminated this request, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// The request this one was redirected from.
    pub fn redirected_from(&self) -> Option<RequestId> {
        self.redirected_from
    }

    /// The follow-up request enqueued when this one redirected.
    pub fn redirected_to(&self) -> Option<RequestId> {
        self.redirected_to
    }

    pub(crate) fn caller_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn has_upload_body(&self) -> bool {
        self.body.is_present()
    }
}
