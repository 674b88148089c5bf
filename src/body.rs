//! Upload body source for requests that send data.
//!
//! The scheduler pulls the body in bounded chunks while the socket is
//! writable; a source that cannot be sized up front is supplied as a boxed
//! reader. Callers sending a body also supply the framing headers
//! (`Content-Length` or `Transfer-Encoding`); none are synthesized.

use std::fmt;
use std::io::{self, Read};

use bytes::Bytes;

/// Request body.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Body from bytes, drained as it is written.
    Bytes(Bytes),
    /// Body pulled from a readable byte source.
    Reader(Box<dyn Read>),
}

impl Body {
    /// Wrap a readable byte source.
    pub fn reader(source: impl Read + 'static) -> Body {
        Body::Reader(Box::new(source))
    }

    /// Whether this request carries an upload body at all.
    pub(crate) fn is_present(&self) -> bool {
        !matches!(self, Body::Empty)
    }

    /// Pull the next chunk of at most `max` bytes. `Ok(None)` is end of
    /// the source.
    pub(crate) fn next_chunk(&mut self, max: usize) -> io::Result<Option<Bytes>> {
        match self {
            Body::Empty => Ok(None),
            Body::Bytes(data) => {
                if data.is_empty() {
                    return Ok(None);
                }
                let n = max.min(data.len());
                Ok(Some(data.split_to(n)))
            }
            Body::Reader(source) => {
                let mut buf = vec![0u8; max];
                loop {
                    match source.read(&mut buf) {
                        Ok(0) => return Ok(None),
                        Ok(n) => {
                            buf.truncate(n);
                            return Ok(Some(Bytes::from(buf)));
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Reader(_) => f.write_str("Body::Reader"),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        if v.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(Bytes::from(v))
        }
    }
}

impl From<&[u8]> for Body {
    fn from(s: &[u8]) -> Self {
        if s.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(Bytes::copy_from_slice(s))
        }
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        if b.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(b)
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::from(s.as_bytes())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::from(s.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_collapse() {
        assert!(!Body::from("").is_present());
        assert!(!Body::from(Vec::new()).is_present());
        assert!(Body::from("x").is_present());
    }

    #[test]
    fn bytes_drain_in_bounded_chunks() {
        let mut body = Body::from("hello world");
        assert_eq!(body.next_chunk(5).unwrap().unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(
            body.next_chunk(64).unwrap().unwrap(),
            Bytes::from_static(b" world")
        );
        assert!(body.next_chunk(64).unwrap().is_none());
    }

    #[test]
    fn reader_source_drains_to_eof() {
        let mut body = Body::reader(std::io::Cursor::new(b"stream data".to_vec()));
        assert!(body.is_present());
        let mut collected = Vec::new();
        while let Some(chunk) = body.next_chunk(4).unwrap() {
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"stream data");
    }
}
