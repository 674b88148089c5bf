//! Per-connection byte accumulator for contiguous received data.
//!
//! The header parser needs to inspect the accumulated tail; the body path
//! drains everything at once when an event is delivered.

use bytes::{Bytes, BytesMut};

pub(crate) struct RecvBuffer {
    buf: BytesMut,
}

impl RecvBuffer {
    /// Create a new buffer with the given initial capacity.
    pub fn new(capacity: usize) -> Self {
        RecvBuffer {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Append received bytes. Grows the buffer if necessary.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Get a reference to the accumulated data.
    pub fn data(&self) -> &[u8] {
        &self.buf[..]
    }

    /// Whether the accumulated data ends with `suffix`.
    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.buf.len() >= suffix.len() && &self.buf[self.buf.len() - suffix.len()..] == suffix
    }

    /// Detach the whole buffer as a frozen `Bytes` (O(1)), leaving it empty.
    pub fn take_all(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_inspect() {
        let mut buf = RecvBuffer::new(64);
        buf.append(b"hello ");
        buf.append(b"world");
        assert_eq!(buf.data(), b"hello world");
    }

    #[test]
    fn grow_on_overflow() {
        let mut buf = RecvBuffer::new(4);
        buf.append(b"abcdef"); // exceeds initial capacity
        assert_eq!(buf.data(), b"abcdef");
    }

    #[test]
    fn ends_with_suffix() {
        let mut buf = RecvBuffer::new(32);
        buf.append(b"HTTP/1.1 200 OK\r\n\r\n");
        assert!(buf.ends_with(b"\r\n\r\n"));
        assert!(!buf.ends_with(b"\r\n\r\n\r\n\r\n\r\n\r\n"));
    }

    #[test]
    fn ends_with_on_short_buffer() {
        let mut buf = RecvBuffer::new(8);
        buf.append(b"\r\n");
        assert!(!buf.ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn take_all_leaves_empty() {
        let mut buf = RecvBuffer::new(16);
        buf.append(b"data");
        let frozen = buf.take_all();
        assert_eq!(&frozen[..], b"data");
        assert!(buf.data().is_empty());
        assert!(buf.take_all().is_empty());
    }
}
