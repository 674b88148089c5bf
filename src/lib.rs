//! fetchline — cooperative, event-driven HTTP/1.1 client.
//!
//! fetchline downloads many resources concurrently from a single thread of
//! execution. Non-blocking sockets are multiplexed through a bounded
//! readiness wait, each request is driven through a lifecycle state
//! machine, and chunked transfer encoding plus gzip/deflate content
//! encodings are decoded transparently as bytes arrive. Progress reaches
//! the caller as a stream of discrete events; no call blocks on the
//! network.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fetchline::{Client, Config, EventKind, Request};
//!
//! let mut client = Client::new(Config::default());
//! client.enqueue(Request::get("http://example.com/"));
//!
//! while client.await_next_event(None) {
//!     match client.last_event() {
//!         Some(EventKind::GotHeaders) => { /* status + headers are in */ }
//!         Some(EventKind::BodyChunkAvailable) => {
//!             let chunk = client.last_body_chunk().unwrap_or_default();
//!             // consume decoded body bytes as they arrive
//!             let _ = chunk;
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! # Model
//!
//! Single-threaded and cooperatively scheduled: no background threads, no
//! locks. Per request, events arrive in the order `GotHeaders?`,
//! `BodyChunkAvailable*`, then exactly one of `Redirect`, `Finished` or
//! `Failed`. Every exchange sends `Connection: close`; redirects are
//! followed up to a configured bound by enqueueing a linked child request.

// ── Internal modules ────────────────────────────────────────────────────
pub(crate) mod body;
pub(crate) mod buffer;
pub(crate) mod client;
pub(crate) mod conn;
pub(crate) mod decode;
pub(crate) mod event;
pub(crate) mod headers;
pub(crate) mod metrics;
pub(crate) mod poll;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod tls;
pub(crate) mod url;

// ── Public modules ──────────────────────────────────────────────────────
pub mod config;
pub mod error;

// ── Re-exports: Scheduler ───────────────────────────────────────────────

/// Scheduler owning every request, connection and decoder.
pub use client::Client;
/// Runtime configuration.
pub use config::Config;
/// Builder for [`Config`] with discoverable methods and `build()` validation.
pub use config::ConfigBuilder;
/// Client errors, surfaced as `Failed` events.
pub use error::Error;
/// Progress event kinds.
pub use event::EventKind;

// ── Re-exports: Request/Response model ──────────────────────────────────

/// Upload body source.
pub use body::Body;
/// HTTP version tag for the request line.
pub use request::HttpVersion;
/// One HTTP exchange.
pub use request::Request;
/// Handle to a request within one [`Client`].
pub use request::RequestId;
/// Lifecycle state of a request.
pub use request::RequestState;
/// Response side of an exchange.
pub use response::Response;

// ── Re-exports: TLS ─────────────────────────────────────────────────────

/// Client-side TLS configuration for https requests.
pub use tls::TlsClientConfig;
