//! gzip / raw-deflate decoding over flate2's streaming inflater.
//!
//! The deflate payload always goes through `flate2::Decompress` in raw
//! mode. For gzip the RFC 1952 member framing is scanned in-line by a
//! small resumable phase machine (the default flate2 backend only exposes
//! gzip framing through blocking `Read` adapters): fixed header, the
//! optional FEXTRA/FNAME/FCOMMENT/FHCRC fields, then the deflate stream,
//! then the 8-byte CRC32/ISIZE trailer.

use bytes::{Buf, Bytes, BytesMut};
use flate2::{Decompress, FlushDecompress, Status};

use crate::decode::{take_output, Decoder};
use crate::error::Error;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

const INFLATE_STEP: usize = 16 * 1024;

/// Compressed-stream framing selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// RFC 1952 member framing around a deflate stream.
    Gzip,
    /// Bare deflate stream (the HTTP `deflate` coding as sent in practice).
    Deflate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// The 10 fixed gzip header bytes.
    FixedHeader,
    /// FEXTRA length (2 bytes, little-endian).
    ExtraLen,
    /// Remaining FEXTRA payload bytes to skip.
    ExtraData(usize),
    /// NUL-terminated original file name.
    Name,
    /// NUL-terminated comment.
    Comment,
    /// 2-byte header CRC.
    HeaderCrc,
    /// The deflate stream itself.
    Payload,
    /// Remaining gzip trailer bytes (CRC32 + ISIZE) to absorb.
    Trailer(usize),
    Done,
}

pub(crate) struct InflateDecoder {
    upstream: Box<dyn Decoder>,
    raw: BytesMut,
    out: BytesMut,
    scratch: Vec<u8>,
    inflate: Decompress,
    format: Format,
    phase: Phase,
    /// Header flag byte; bits are cleared as optional fields are consumed.
    gz_flags: u8,
    closed: bool,
}

impl InflateDecoder {
    pub fn new(upstream: Box<dyn Decoder>, format: Format) -> InflateDecoder {
        InflateDecoder {
            upstream,
            raw: BytesMut::new(),
            out: BytesMut::new(),
            scratch: Vec::new(),
            inflate: Decompress::new(false),
            format,
            phase: match format {
                Format::Gzip => Phase::FixedHeader,
                Format::Deflate => Phase::Payload,
            },
            gz_flags: 0,
            closed: false,
        }
    }

    fn next_header_phase(&self) -> Phase {
        if self.gz_flags & FEXTRA != 0 {
            Phase::ExtraLen
        } else if self.gz_flags & FNAME != 0 {
            Phase::Name
        } else if self.gz_flags & FCOMMENT != 0 {
            Phase::Comment
        } else if self.gz_flags & FHCRC != 0 {
            Phase::HeaderCrc
        } else {
            Phase::Payload
        }
    }

    fn pump(&mut self) -> Result<(), Error> {
        loop {
            match self.phase {
                Phase::FixedHeader => {
                    if self.raw.len() < 10 {
                        return Ok(());
                    }
                    if self.raw[0] != 0x1f || self.raw[1] != 0x8b {
                        return Err(Error::Protocol("bad gzip magic".to_string()));
                    }
                    if self.raw[2] != 8 {
                        return Err(Error::Protocol(format!(
                            "unsupported gzip compression method {}",
                            self.raw[2]
                        )));
                    }
                    self.gz_flags = self.raw[3];
                    self.raw.advance(10);
                    self.phase = self.next_header_phase();
                }
                Phase::ExtraLen => {
                    if self.raw.len() < 2 {
                        return Ok(());
                    }
                    let len = u16::from_le_bytes([self.raw[0], self.raw[1]]) as usize;
                    self.raw.advance(2);
                    self.phase = Phase::ExtraData(len);
                }
                Phase::ExtraData(left) => {
                    let take = left.min(self.raw.len());
                    self.raw.advance(take);
                    if take < left {
                        self.phase = Phase::ExtraData(left - take);
                        return Ok(());
                    }
                    self.gz_flags &= !FEXTRA;
                    self.phase = self.next_header_phase();
                }
                Phase::Name | Phase::Comment => {
                    match self.raw.iter().position(|b| *b == 0) {
                        Some(nul) => {
                            self.raw.advance(nul + 1);
                            if self.phase == Phase::Name {
                                self.gz_flags &= !FNAME;
                            } else {
                                self.gz_flags &= !FCOMMENT;
                            }
                            self.phase = self.next_header_phase();
                        }
                        None => {
                            self.raw.clear();
                            return Ok(());
                        }
                    }
                }
                Phase::HeaderCrc => {
                    if self.raw.len() < 2 {
                        return Ok(());
                    }
                    self.raw.advance(2);
                    self.gz_flags &= !FHCRC;
                    self.phase = self.next_header_phase();
                }
                Phase::Payload => {
                    if self.raw.is_empty() {
                        return Ok(());
                    }
                    if !self.inflate_step()? {
                        return Ok(());
                    }
                }
                Phase::Trailer(left) => {
                    let take = left.min(self.raw.len());
                    self.raw.advance(take);
                    if take < left {
                        self.phase = Phase::Trailer(left - take);
                        return Ok(());
                    }
                    self.phase = Phase::Done;
                }
                Phase::Done => return Ok(()),
            }
        }
    }

    /// One inflate call. Returns whether the phase machine should keep
    /// going (stream ended or progress is still possible).
    fn inflate_step(&mut self) -> Result<bool, Error> {
        self.scratch.clear();
        self.scratch.reserve(INFLATE_STEP);
        let before = self.inflate.total_in();
        let status = self
            .inflate
            .decompress_vec(&self.raw, &mut self.scratch, FlushDecompress::None)
            .map_err(|e| Error::Protocol(format!("inflate: {e}")))?;
        let consumed = (self.inflate.total_in() - before) as usize;
        self.raw.advance(consumed);
        self.out.extend_from_slice(&self.scratch);

        match status {
            Status::StreamEnd => {
                self.phase = match self.format {
                    Format::Gzip => Phase::Trailer(8),
                    Format::Deflate => Phase::Done,
                };
                Ok(true)
            }
            Status::Ok | Status::BufError => {
                // No input consumed and nothing produced: need more bytes.
                Ok(consumed > 0 || !self.scratch.is_empty())
            }
        }
    }
}

impl Decoder for InflateDecoder {
    fn feed(&mut self, input: &[u8]) {
        self.upstream.feed(input);
    }

    fn close(&mut self) {
        self.closed = true;
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
        match self.phase {
            Phase::Done => self.out.is_empty(),
            // Lenient on truncation: the wire ended, deliver what decoded.
            _ => {
                self.closed && self.upstream.is_eof() && self.raw.is_empty() && self.out.is_empty()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use flate2::write::{DeflateEncoder, GzEncoder};
    use flate2::Compression;

    use super::*;
    use crate::decode::Passthrough;

    /// gzip-compress a payload the way a server would.
    pub(crate) fn gzip_vector(payload: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        enc.finish().unwrap()
    }

    fn deflate_vector(payload: &[u8]) -> Vec<u8> {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        enc.finish().unwrap()
    }

    fn decoder(format: Format) -> InflateDecoder {
        InflateDecoder::new(Box::new(Passthrough::new()), format)
    }

    fn drain(dec: &mut InflateDecoder) -> Vec<u8> {
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
    fn gzip_round_trip() {
        let mut dec = decoder(Format::Gzip);
        dec.feed(&gzip_vector(b"Hello World"));
        assert_eq!(drain(&mut dec), b"Hello World");
        assert!(dec.is_eof());
    }

    #[test]
    fn gzip_fed_byte_by_byte() {
        let wire = gzip_vector(b"incremental payload that spans several feeds");
        let mut dec = decoder(Format::Gzip);
        let mut out = Vec::new();
        for byte in &wire {
            dec.feed(&[*byte]);
            out.extend_from_slice(&dec.read(usize::MAX).unwrap());
        }
        assert_eq!(out, b"incremental payload that spans several feeds");
        assert!(dec.is_eof());
    }

    #[test]
    fn gzip_with_name_field() {
        // Hand-built member: FNAME flag set, file name before the stream.
        let mut wire = vec![0x1f, 0x8b, 8, FNAME, 0, 0, 0, 0, 0, 0xff];
        wire.extend_from_slice(b"file.txt\0");
        let payload = deflate_vector(b"named");
        wire.extend_from_slice(&payload);
        let mut crc = flate2::Crc::new();
        crc.update(b"named");
        wire.extend_from_slice(&crc.sum().to_le_bytes());
        wire.extend_from_slice(&(b"named".len() as u32).to_le_bytes());

        let mut dec = decoder(Format::Gzip);
        dec.feed(&wire);
        assert_eq!(drain(&mut dec), b"named");
        assert!(dec.is_eof());
    }

    #[test]
    fn gzip_rejects_bad_magic() {
        let mut dec = decoder(Format::Gzip);
        dec.feed(b"definitely not gzip");
        assert!(matches!(dec.read(usize::MAX), Err(Error::Protocol(_))));
    }

    #[test]
    fn deflate_round_trip() {
        let mut dec = decoder(Format::Deflate);
        dec.feed(&deflate_vector(b"Hello World"));
        assert_eq!(drain(&mut dec), b"Hello World");
        assert!(dec.is_eof());
    }

    #[test]
    fn large_payload_round_trip() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let wire = gzip_vector(&payload);
        let mut dec = decoder(Format::Gzip);
        for piece in wire.chunks(1024) {
            dec.feed(piece);
        }
        assert_eq!(drain(&mut dec), payload);
        assert!(dec.is_eof());
    }

    #[test]
    fn truncated_stream_eofs_leniently_on_close() {
        let wire = gzip_vector(b"cut short");
        let mut dec = decoder(Format::Gzip);
        dec.feed(&wire[..wire.len() / 2]);
        let _ = drain(&mut dec);
        assert!(!dec.is_eof());
        dec.close();
        let _ = drain(&mut dec);
        assert!(dec.is_eof());
    }
}

