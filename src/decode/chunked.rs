//! RFC 7230 §4.1 chunked transfer decoding.
//!
//! A resumable four-phase machine. Every transition tolerates partial
//! buffers: when the bytes it needs have not arrived yet it leaves its
//! state untouched and serves whatever is already decoded.

use bytes::{Buf, Bytes, BytesMut};

use crate::decode::{take_output, Decoder};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Reading the hex size line, optionally with a `;extension`.
    ScanChunkSize,
    /// Copying chunk payload bytes.
    ScanChunkData,
    /// Consuming the CRLF that closes a chunk.
    ScanChunkTrailer,
    /// Saw the zero-size chunk; absorbing terminal phase.
    ScanFinalChunk,
}

pub(crate) struct ChunkedDecoder {
    upstream: Box<dyn Decoder>,
    raw: BytesMut,
    out: BytesMut,
    phase: Phase,
    /// Payload bytes left in the current chunk.
    remaining: usize,
}

impl ChunkedDecoder {
    pub fn new(upstream: Box<dyn Decoder>) -> ChunkedDecoder {
        ChunkedDecoder {
            upstream,
            raw: BytesMut::new(),
            out: BytesMut::new(),
            phase: Phase::ScanChunkSize,
            remaining: 0,
        }
    }

    fn pump(&mut self) -> Result<(), Error> {
        loop {
            match self.phase {
                Phase::ScanChunkSize => {
                    let digits = self
                        .raw
                        .iter()
                        .take_while(|b| b.is_ascii_hexdigit())
                        .count();
                    if digits == 0 {
                        if self.raw.is_empty() {
                            return Ok(());
                        }
                        return Err(Error::Protocol(format!(
                            "invalid chunk size byte 0x{:02x}",
                            self.raw[0]
                        )));
                    }
                    if self.raw.len() < digits + 2 {
                        return Ok(());
                    }
                    // Size line ends at the CRLF, after an optional extension.
                    let line_end = match self.raw[digits] {
                        b';' => match find_crlf(&self.raw[digits..]) {
                            Some(at) => digits + at,
                            None => return Ok(()),
                        },
                        b'\r' if self.raw[digits + 1] == b'\n' => digits,
                        _ => {
                            return Err(Error::Protocol(
                                "missing CRLF after chunk size".to_string(),
                            ))
                        }
                    };
                    let size = parse_hex(&self.raw[..digits])?;
                    self.raw.advance(line_end + 2);
                    if size == 0 {
                        self.phase = Phase::ScanFinalChunk;
                    } else {
                        self.remaining = size;
                        self.phase = Phase::ScanChunkData;
                    }
                }
                Phase::ScanChunkData => {
                    if self.raw.is_empty() {
                        return Ok(());
                    }
                    let take = self.remaining.min(self.raw.len());
                    self.out.extend_from_slice(&self.raw[..take]);
                    self.raw.advance(take);
                    self.remaining -= take;
                    if self.remaining > 0 {
                        return Ok(());
                    }
                    self.phase = Phase::ScanChunkTrailer;
                }
                Phase::ScanChunkTrailer => {
                    if self.raw.len() < 2 {
                        return Ok(());
                    }
                    if &self.raw[..2] != b"\r\n" {
                        return Err(Error::Protocol(
                            "missing CRLF after chunk data".to_string(),
                        ));
                    }
                    self.raw.advance(2);
                    self.phase = Phase::ScanChunkSize;
                }
                Phase::ScanFinalChunk => return Ok(()),
            }
        }
    }
}

impl Decoder for ChunkedDecoder {
    fn feed(&mut self, input: &[u8]) {
        self.upstream.feed(input);
    }

    fn close(&mut self) {
        self.upstream.close();
    }

    fn read(&mut self, max: usize) -> Result<Bytes, Error> {
        loop {
            let chunk = self.upstream.read(usize::MAX)?;
            if chunk.is_empty() {
                break;
            }
            self.raw.extend_from_slice(&chunk);
        }
        self.pump()?;
        Ok(take_output(&mut self.out, max))
    }

    fn is_eof(&self) -> bool {
        self.phase == Phase::ScanFinalChunk
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

fn parse_hex(digits: &[u8]) -> Result<usize, Error> {
    // Digits are a run of ASCII hex, so the utf-8 conversion cannot fail.
    let text = std::str::from_utf8(digits)
        .map_err(|_| Error::Protocol("invalid chunk size".to_string()))?;
    usize::from_str_radix(text, 16)
        .map_err(|_| Error::Protocol(format!("chunk size out of range: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> ChunkedDecoder {
        ChunkedDecoder::new(Box::new(crate::decode::Passthrough::new()))
    }

    fn drain(dec: &mut ChunkedDecoder) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let chunk = dec.read(usize::MAX).unwrap();
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[test]
    fn decodes_whole_body_at_once() {
        let mut dec = decoder();
        dec.feed(b"5\r\nHello\r\n6\r\n World\r\n0\r\n\r\n");
        assert_eq!(drain(&mut dec), b"Hello World");
        assert!(dec.is_eof());
    }

    #[test]
    fn decodes_byte_by_byte() {
        let wire = b"5\r\nHello\r\n6\r\n World\r\n0\r\n\r\n";
        let mut dec = decoder();
        let mut out = Vec::new();
        for byte in wire {
            dec.feed(&[*byte]);
            out.extend_from_slice(&dec.read(usize::MAX).unwrap());
        }
        assert_eq!(out, b"Hello World");
        assert!(dec.is_eof());
    }

    #[test]
    fn uppercase_hex_sizes() {
        let payload = vec![b'x'; 0x1A];
        let mut dec = decoder();
        dec.feed(b"1A\r\n");
        dec.feed(&payload);
        dec.feed(b"\r\n0\r\n\r\n");
        assert_eq!(drain(&mut dec), payload);
        assert!(dec.is_eof());
    }

    #[test]
    fn skips_chunk_extensions() {
        let mut dec = decoder();
        dec.feed(b"5;name=value\r\nHello\r\n0\r\n\r\n");
        assert_eq!(drain(&mut dec), b"Hello");
        assert!(dec.is_eof());
    }

    #[test]
    fn waits_for_extension_crlf() {
        let mut dec = decoder();
        dec.feed(b"5;partial-ext");
        assert!(dec.read(usize::MAX).unwrap().is_empty());
        dec.feed(b"ension\r\nHello\r\n0\r\n\r\n");
        assert_eq!(drain(&mut dec), b"Hello");
    }

    #[test]
    fn partial_size_line_waits() {
        let mut dec = decoder();
        dec.feed(b"5");
        assert!(dec.read(usize::MAX).unwrap().is_empty());
        assert!(!dec.is_eof());
        dec.feed(b"\r\nHello\r\n0\r\n\r\n");
        assert_eq!(drain(&mut dec), b"Hello");
    }

    #[test]
    fn close_mid_chunk_is_not_eof() {
        let mut dec = decoder();
        dec.feed(b"5\r\nHel");
        dec.close();
        assert_eq!(drain(&mut dec), b"Hel");
        assert!(!dec.is_eof());
    }

    #[test]
    fn final_chunk_reports_eof_immediately() {
        let mut dec = decoder();
        dec.feed(b"0\r\n");
        assert!(dec.read(usize::MAX).unwrap().is_empty());
        assert!(dec.is_eof());
    }

    #[test]
    fn rejects_missing_crlf_after_chunk_data() {
        let mut dec = decoder();
        dec.feed(b"5\r\nHelloXX");
        assert!(matches!(dec.read(usize::MAX), Err(Error::Protocol(_))));
    }

    #[test]
    fn rejects_garbage_size_line() {
        let mut dec = decoder();
        dec.feed(b"zz\r\n");
        assert!(matches!(dec.read(usize::MAX), Err(Error::Protocol(_))));
    }

    #[test]
    fn rejects_size_line_without_crlf() {
        let mut dec = decoder();
        dec.feed(b"5 \r\nHello\r\n");
        assert!(matches!(dec.read(usize::MAX), Err(Error::Protocol(_))));
    }

    #[test]
    fn read_respects_max() {
        let mut dec = decoder();
        dec.feed(b"B\r\nHello World\r\n0\r\n\r\n");
        assert_eq!(&dec.read(5).unwrap()[..], b"Hello");
        assert_eq!(&dec.read(usize::MAX).unwrap()[..], b" World");
    }
}
