//! Streaming body decoders.
//!
//! A decoder chain sits between the raw socket bytes and the caller-visible
//! body. Every decoder keeps its own raw and decoded buffers so it can make
//! progress on whatever bytes have arrived and hand back the rest later;
//! nothing here ever blocks. `feed` pushes wire bytes to the bottom of the
//! chain, `read` pulls decoded bytes from the top; an empty read means
//! "nothing ready yet", end of stream is reported separately by `is_eof`.

pub(crate) mod chunked;
pub(crate) mod inflate;

use bytes::{Bytes, BytesMut};

use self::chunked::ChunkedDecoder;
use self::inflate::{Format, InflateDecoder};
use crate::error::Error;

pub(crate) trait Decoder {
    /// Append raw wire bytes to the bottom of the chain.
    fn feed(&mut self, input: &[u8]);

    /// Signal that the wire has no more bytes (peer closed the socket).
    fn close(&mut self);

    /// Pull up to `max` decoded bytes. An empty result is "nothing ready
    /// yet", not end of stream.
    fn read(&mut self, max: usize) -> Result<Bytes, Error>;

    /// True once the decoded stream is complete.
    fn is_eof(&self) -> bool;
}

/// Split an encoding header value into trimmed, lower-cased tokens.
pub(crate) fn encoding_tokens(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Take up to `max` bytes off the front of a decoded-output buffer.
fn take_output(out: &mut BytesMut, max: usize) -> Bytes {
    if out.is_empty() || max == 0 {
        return Bytes::new();
    }
    let n = max.min(out.len());
    out.split_to(n).freeze()
}

/// Bottom of every chain: buffers wire bytes verbatim.
pub(crate) struct Passthrough {
    out: BytesMut,
    closed: bool,
}

impl Passthrough {
    pub(crate) fn new() -> Passthrough {
        Passthrough {
            out: BytesMut::new(),
            closed: false,
        }
    }
}

impl Decoder for Passthrough {
    fn feed(&mut self, input: &[u8]) {
        self.out.extend_from_slice(input);
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn read(&mut self, max: usize) -> Result<Bytes, Error> {
        Ok(take_output(&mut self.out, max))
    }

    fn is_eof(&self) -> bool {
        self.closed && self.out.is_empty()
    }
}

/// The decoder chain for one response body.
///
/// Built from the `Transfer-Encoding` and `Content-Encoding` token lists
/// after the head parses: each supported token wraps the current head of
/// the chain, so the last-applied decoder is read first. A token that
/// already appeared in `Transfer-Encoding` is not applied a second time
/// for `Content-Encoding`.
pub(crate) struct Pipeline {
    head: Box<dyn Decoder>,
    transparent: bool,
}

impl Pipeline {
    pub fn build(transfer_encoding: &[String], content_encoding: &[String]) -> Result<Pipeline, Error> {
        let mut head: Box<dyn Decoder> = Box::new(Passthrough::new());
        let mut applied = 0usize;

        let content = content_encoding
            .iter()
            .filter(|t| !transfer_encoding.contains(*t));
        for token in transfer_encoding.iter().chain(content) {
            match token.as_str() {
                "chunked" => head = Box::new(ChunkedDecoder::new(head)),
                "gzip" => head = Box::new(InflateDecoder::new(head, Format::Gzip)),
                "deflate" => head = Box::new(InflateDecoder::new(head, Format::Deflate)),
                "identity" => continue,
                other => return Err(Error::UnsupportedEncoding(other.to_string())),
            }
            applied += 1;
        }

        Ok(Pipeline {
            head,
            transparent: applied == 0,
        })
    }

    /// Whether no decoder was applied, i.e. body bytes pass through
    /// verbatim and `Content-Length` may declare completion.
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn feed(&mut self, input: &[u8]) {
        self.head.feed(input);
    }

    pub fn close(&mut self) {
        self.head.close();
    }

    pub fn read(&mut self, max: usize) -> Result<Bytes, Error> {
        self.head.read(max)
    }

    pub fn is_eof(&self) -> bool {
        self.head.is_eof()
    }
}
