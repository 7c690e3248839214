//! Transport - socket ownership and the physical read primitives.
//!
//! The broker speaks CRLF-terminated ASCII lines over one TCP stream,
//! with job bodies and stat blocks sent as declared-length byte runs
//! that are themselves followed by a CRLF terminator. Everything the
//! rest of the crate reads goes through exactly two primitives:
//!
//! - [`read_line`] - accumulate bytes until CRLF, terminator stripped
//! - [`read_body`] - exactly `len` bytes, then consume the terminator
//!
//! [`Wire`] pairs the buffered read half with the write half of one
//! `TcpStream`. The next command must not be written until the prior
//! response has been fully consumed; [`crate::Connection`] enforces
//! that by holding a lock on the `Wire` for each whole exchange.

use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};

use bytes::Bytes;

use crate::error::{BeanlineError, Result};

/// Line and body terminator. Every frame on the wire ends with it.
pub(crate) const CRLF: &[u8] = b"\r\n";

/// Read one CRLF-terminated line, returning it without the terminator.
///
/// Reads a byte at a time; the protocol has no length prefix on status
/// lines. Never returns a partial line while the stream is open. If the
/// stream ends mid-line after at least one byte was consumed, returns
/// whatever accumulated (the caller's classifier then rejects it); end
/// of stream before any byte is an I/O error.
pub(crate) fn read_line<R: Read>(reader: &mut R) -> Result<String> {
    let mut line: Vec<u8> = Vec::with_capacity(32);
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                if line.is_empty() {
                    return Err(BeanlineError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed before a status line",
                    )));
                }
                break;
            }
            Ok(_) => {
                line.push(byte[0]);
                if line.ends_with(CRLF) {
                    line.truncate(line.len() - CRLF.len());
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(BeanlineError::Io(e)),
        }
    }

    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Read a declared-length body followed by its CRLF terminator.
///
/// The declared length governs, so bodies containing CRLF are returned
/// intact. The terminator is consumed and verified; anything else in
/// its place means the stream is desynchronized.
pub(crate) fn read_body<R: Read>(reader: &mut R, len: usize) -> Result<Bytes> {
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    let mut terminator = [0u8; 2];
    reader.read_exact(&mut terminator)?;
    if terminator != *CRLF {
        return Err(BeanlineError::Protocol(format!(
            "missing CRLF after {len}-byte body"
        )));
    }

    Ok(Bytes::from(body))
}

/// The two halves of one broker connection.
///
/// Owns the socket. Dropping the wire shuts the socket down, which also
/// aborts any blocking read still in flight on another thread.
#[derive(Debug)]
pub(crate) struct Wire {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Wire {
    /// Wrap a connected stream.
    pub(crate) fn new(stream: TcpStream) -> Result<Self> {
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Send one command frame: the header line, then for body-carrying
    /// commands the raw body, with exactly one CRLF appended after each.
    ///
    /// The whole frame goes out in a single write so a command is never
    /// partially visible to the broker longer than the transport needs.
    pub(crate) fn send(&mut self, header: &str, body: Option<&[u8]>) -> Result<()> {
        let body_len = body.map_or(0, |b| b.len() + CRLF.len());
        let mut frame = Vec::with_capacity(header.len() + CRLF.len() + body_len);
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(CRLF);
        if let Some(body) = body {
            frame.extend_from_slice(body);
            frame.extend_from_slice(CRLF);
        }
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read the next status line.
    pub(crate) fn read_line(&mut self) -> Result<String> {
        read_line(&mut self.reader)
    }

    /// Read a declared-length trailing block.
    pub(crate) fn read_body(&mut self, len: usize) -> Result<Bytes> {
        read_body(&mut self.reader, len)
    }
}

impl Drop for Wire {
    fn drop(&mut self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}
