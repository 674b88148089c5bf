//! Event kinds and the per-request pending-event set.

/// Progress event delivered by [`Client::await_next_event`](crate::Client::await_next_event).
///
/// For a single request the delivered sequence is always a prefix of
/// `GotHeaders? · BodyChunkAvailable* · (Redirect | Finished | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    /// The response head was parsed. Not emitted for redirect candidates.
    GotHeaders = 0,
    /// Decoded body bytes are buffered; reading the cursor drains them.
    BodyChunkAvailable = 1,
    /// A redirect was followed; the child request is enqueued.
    Redirect = 2,
    /// The request terminated with an error.
    Failed = 3,
    /// The request completed normally and its socket is closed.
    Finished = 4,
}

/// Delivery priority when several events are pending for one request.
pub(crate) const PRIORITY: [EventKind; 5] = [
    EventKind::GotHeaders,
    EventKind::BodyChunkAvailable,
    EventKind::Redirect,
    EventKind::Failed,
    EventKind::Finished,
];

/// Pending-event bits for one request. Repeated emissions of the same kind
/// coalesce into a single pending bit.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct EventSet {
    bits: u8,
}

impl EventSet {
    fn bit(kind: EventKind) -> u8 {
        1 << kind as u8
    }

    /// Mark an event kind pending.
    pub fn set(&mut self, kind: EventKind) {
        self.bits |= Self::bit(kind);
    }

    /// Clear and report whether the kind was pending.
    pub fn take(&mut self, kind: EventKind) -> bool {
        let bit = Self::bit(kind);
        let was_set = self.bits & bit != 0;
        self.bits &= !bit;
        was_set
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_take() {
        let mut set = EventSet::default();
        assert!(set.is_empty());
        set.set(EventKind::GotHeaders);
        assert!(!set.is_empty());
        assert!(set.take(EventKind::GotHeaders));
        assert!(!set.take(EventKind::GotHeaders));
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_emissions_coalesce() {
        let mut set = EventSet::default();
        set.set(EventKind::BodyChunkAvailable);
        set.set(EventKind::BodyChunkAvailable);
        assert!(set.take(EventKind::BodyChunkAvailable));
        assert!(!set.take(EventKind::BodyChunkAvailable));
    }

    #[test]
    fn kinds_are_independent() {
        let mut set = EventSet::default();
        set.set(EventKind::Failed);
        set.set(EventKind::BodyChunkAvailable);
        assert!(!set.take(EventKind::Finished));
        assert!(set.take(EventKind::BodyChunkAvailable));
        assert!(set.take(EventKind::Failed));
    }

    #[test]
    fn priority_lists_every_kind_once() {
        for (i, kind) in PRIORITY.iter().enumerate() {
            assert_eq!(PRIORITY.iter().filter(|k| **k == *kind).count(), 1, "duplicate at {i}");
        }
    }
}
