//! Client runtime metrics.
//!
//! Flat counters for request lifecycle, redirects, and wire bytes,
//! exposed through the metriken global registry.

use metriken::{metric, Counter};

#[metric(
    name = "fetchline/requests/enqueued",
    description = "Total requests enqueued"
)]
pub static REQUESTS_ENQUEUED: Counter = Counter::new();

#[metric(
    name = "fetchline/requests/finished",
    description = "Requests that completed normally"
)]
pub static REQUESTS_FINISHED: Counter = Counter::new();

#[metric(
    name = "fetchline/requests/failed",
    description = "Requests that terminated with an error"
)]
pub static REQUESTS_FAILED: Counter = Counter::new();

#[metric(
    name = "fetchline/redirects/followed",
    description = "Redirect hops followed"
)]
pub static REDIRECTS_FOLLOWED: Counter = Counter::new();

#[metric(name = "fetchline/bytes/sent", description = "Total bytes written")]
pub static BYTES_SENT: Counter = Counter::new();

#[metric(name = "fetchline/bytes/received", description = "Total bytes read")]
pub static BYTES_RECEIVED: Counter = Counter::new();

#[metric(
    name = "fetchline/poll/errors",
    description = "Readiness primitive failures"
)]
pub static POLL_ERRORS: Counter = Counter::new();
