//! Per-request connection state.
//!
//! One `Connection` owns the socket for one exchange, the pending write
//! buffer, the response-head accumulator, and (once the head parses) the
//! decoder pipeline. The scheduler creates it at admission and destroys it
//! when the request terminates; `Connection: close` means it is never
//! reused.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};

use bytes::{Buf, BytesMut};

use crate::buffer::RecvBuffer;
use crate::decode::Pipeline;
use crate::metrics;
use crate::tls::{HandshakeStatus, TlsSession};

const HEAD_BUFFER_CAPACITY: usize = 1024;

pub(crate) struct Connection {
    sock: TcpStream,
    tls: Option<TlsSession>,
    /// Serialized head or upload chunk waiting to be written.
    write_buf: BytesMut,
    /// Response head bytes accumulated so far.
    pub head_buf: RecvBuffer,
    /// Decoder chain, present from `ReceivingBody` on.
    pub pipeline: Option<Pipeline>,
    connect_checked: bool,
}

impl Connection {
    pub fn new(sock: TcpStream, tls: Option<TlsSession>) -> Connection {
        Connection {
            sock,
            tls,
            write_buf: BytesMut::new(),
            head_buf: RecvBuffer::new(HEAD_BUFFER_CAPACITY),
            pipeline: None,
            connect_checked: false,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }

    /// Surface a failed asynchronous connect on the first readiness pass.
    pub fn check_connect(&mut self) -> io::Result<()> {
        if self.connect_checked {
            return Ok(());
        }
        self.connect_checked = true;
        match self.sock.take_error()? {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn advance_handshake(&mut self) -> io::Result<HandshakeStatus> {
        match &mut self.tls {
            Some(tls) => tls.advance_handshake(&mut self.sock),
            None => Ok(HandshakeStatus::Complete),
        }
    }

    pub fn queue_write(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    /// Push pending bytes to the socket. Returns whether the buffer fully
    /// flushed; `WouldBlock` keeps the remainder for the next pass.
    pub fn write_pending(&mut self) -> io::Result<bool> {
        while !self.write_buf.is_empty() {
            let result = match &mut self.tls {
                Some(tls) => tls.write_plaintext(&mut self.sock, &self.write_buf),
                None => self.sock.write(&self.write_buf),
            };
            match result {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.write_buf.advance(n);
                    metrics::BYTES_SENT.add(n as u64);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Non-blocking read of decrypted bytes. `Ok(0)` is end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.tls {
            Some(tls) => tls.read_plaintext(&mut self.sock, buf),
            None => self.sock.read(buf),
        }
    }
}
