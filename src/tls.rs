//! Non-blocking TLS client sessions over rustls.
//!
//! Sockets are non-blocking from creation; rustls tolerates `WouldBlock`
//! at every handshake step, so the handshake is simply re-driven on each
//! writable pass until `is_handshaking()` clears.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::ClientConnection;

use crate::error::Error;

/// TLS client configuration for https requests. Pass a pre-built rustls
/// `ClientConfig`; the caller configures root certs, ALPN, etc.
#[derive(Clone)]
pub struct TlsClientConfig {
    pub client_config: Arc<rustls::ClientConfig>,
}

/// Outcome of one handshake-driving pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeStatus {
    InProgress,
    Complete,
}

/// Per-connection TLS state. The socket itself lives on the connection;
/// every method borrows it for the duration of the call.
pub(crate) struct TlsSession {
    tls: ClientConnection,
    sock_eof: bool,
}

impl TlsSession {
    pub fn new(config: &TlsClientConfig, host: &str) -> Result<TlsSession, Error> {
        let name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Tls(format!("invalid server name: {host}")))?;
        let tls = ClientConnection::new(config.client_config.clone(), name)
            .map_err(|e| Error::Tls(e.to_string()))?;
        Ok(TlsSession {
            tls,
            sock_eof: false,
        })
    }

    /// Drive the handshake as far as the socket allows.
    pub fn advance_handshake(&mut self, sock: &mut TcpStream) -> io::Result<HandshakeStatus> {
        self.flush_ciphertext(sock)?;
        self.pump_incoming(sock)?;
        self.flush_ciphertext(sock)?;
        if self.tls.is_handshaking() {
            if self.sock_eof {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during handshake",
                ));
            }
            Ok(HandshakeStatus::InProgress)
        } else {
            Ok(HandshakeStatus::Complete)
        }
    }

    /// Read decrypted plaintext. `Ok(0)` is end of stream; `WouldBlock`
    /// means nothing is ready yet.
    pub fn read_plaintext(&mut self, sock: &mut TcpStream, buf: &mut [u8]) -> io::Result<usize> {
        self.pump_incoming(sock)?;
        if self.tls.wants_write() {
            self.flush_ciphertext(sock)?;
        }
        match self.tls.reader().read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if self.sock_eof {
                    Ok(0)
                } else {
                    Err(e)
                }
            }
            // TCP closed without close_notify; HTTP framing bounds the body.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Write plaintext and push the resulting ciphertext to the socket.
    /// Returns the number of plaintext bytes accepted.
    pub fn write_plaintext(&mut self, sock: &mut TcpStream, buf: &[u8]) -> io::Result<usize> {
        let n = self.tls.writer().write(buf)?;
        self.flush_ciphertext(sock)?;
        Ok(n)
    }

    fn flush_ciphertext(&mut self, sock: &mut TcpStream) -> io::Result<()> {
        while self.tls.wants_write() {
            match self.tls.write_tls(sock) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Feed available ciphertext into rustls and process it.
    fn pump_incoming(&mut self, sock: &mut TcpStream) -> io::Result<()> {
        loop {
            match self.tls.read_tls(sock) {
                Ok(0) => {
                    self.sock_eof = true;
                    break;
                }
                Ok(_) => {
                    self.tls
                        .process_new_packets()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
