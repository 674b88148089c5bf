use thiserror::Error;

/// Errors produced while driving a request.
///
/// Every variant except [`Error::Config`] surfaces as a `Failed` event on
/// the request that hit it; nothing is retried and no error escapes
/// `await_next_event`. Other in-flight requests continue unaffected.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// URL scheme is not `http`/`https`, or the URL failed to parse.
    #[error("invalid url: {0}")]
    InvalidScheme(String),
    /// Socket creation, name resolution, or asynchronous connect failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// TLS handshake failed, or https was requested without a TLS config.
    #[error("tls error: {0}")]
    Tls(String),
    /// Header or body write to the socket failed.
    #[error("write failed: {0}")]
    Write(String),
    /// Reading the caller-supplied upload body failed.
    #[error("upload body read failed: {0}")]
    UploadRead(String),
    /// Malformed response: bad status line, chunked framing violation,
    /// inflate failure, or the peer closed mid-head.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Transfer- or Content-Encoding token outside the supported set.
    #[error("unsupported transfer encoding: {0}")]
    UnsupportedEncoding(String),
    /// Redirect chain exceeded the configured bound.
    #[error("too many redirects")]
    TooManyRedirects,
    /// Resolved Location header failed URL validation.
    #[error("invalid redirect url: {0}")]
    InvalidRedirectUrl(String),
    /// The readiness primitive itself returned an error.
    #[error("readiness wait failed: {0}")]
    Readiness(String),
    /// Configuration rejected by [`ConfigBuilder::build`](crate::ConfigBuilder::build).
    #[error("invalid configuration: {0}")]
    Config(String),
}
