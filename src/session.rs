/// Request/response session over a byte stream
///
/// Frames outbound requests and reads fixed-size record frames. A read that
/// sees no data within the timeout, or a closed stream, is quiescence rather
/// than an error: the feed has no end-of-stream marker.

use crate::protocol::{ProtocolError, Request, RECORD_SIZE};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Byte-stream collaborator
///
/// `recv` returns `Ok(0)` when the peer closed the stream and an error of kind
/// `WouldBlock` or `TimedOut` when nothing arrived within the read timeout.
/// `discard` drops whatever is already buffered without waiting and returns
/// the number of bytes dropped.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn discard(&mut self) -> io::Result<usize>;
}

/// TCP transport with a fixed receive timeout
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        Ok(TcpTransport { stream })
    }

    pub fn from_stream(stream: TcpStream, timeout: Duration) -> io::Result<Self> {
        stream.set_read_timeout(Some(timeout))?;
        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn discard(&mut self) -> io::Result<usize> {
        self.stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 256];
        let mut dropped = 0;
        let result = loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => break Ok(dropped),
                Ok(n) => dropped += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_quiescence(&e) => break Ok(dropped),
                Err(e) if e.kind() == ErrorKind::ConnectionReset => break Ok(dropped),
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }
}

/// Result of one frame read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete 17-byte frame
    Frame([u8; RECORD_SIZE]),
    /// Nothing arrived before timeout or close
    Quiescent,
    /// The stream went quiet part way through a frame; holds the bytes seen
    Truncated(usize),
}

fn is_quiescence(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

pub struct Session<T: Transport> {
    transport: T,
    requests_sent: u64,
    frames_read: u64,
    bytes_read: u64,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Session {
            transport,
            requests_sent: 0,
            frames_read: 0,
            bytes_read: 0,
        }
    }

    pub fn send(&mut self, request: Request) -> SessionResult<()> {
        debug!(?request, "sending request");
        self.transport.send(&request.encode())?;
        self.requests_sent += 1;
        Ok(())
    }

    pub fn request_stream_all(&mut self) -> SessionResult<()> {
        self.send(Request::StreamAll)
    }

    /// Ask for one record; sequences above the one-byte limit are refused
    pub fn request_resend(&mut self, sequence: u32) -> SessionResult<()> {
        let request = Request::resend(sequence)?;
        self.send(request)
    }

    /// Read exactly one response frame, accumulating partial reads
    pub fn read_frame(&mut self) -> SessionResult<FrameRead> {
        let mut frame = [0u8; RECORD_SIZE];
        let mut filled = 0;

        while filled < RECORD_SIZE {
            match self.transport.recv(&mut frame[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    self.bytes_read += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_quiescence(&e) => break,
                Err(e) if e.kind() == ErrorKind::ConnectionReset => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(match filled {
            0 => FrameRead::Quiescent,
            RECORD_SIZE => {
                self.frames_read += 1;
                FrameRead::Frame(frame)
            }
            partial => FrameRead::Truncated(partial),
        })
    }

    /// Drop bytes left over from an earlier reply so the next read starts on
    /// a frame boundary
    pub fn discard_pending(&mut self) -> SessionResult<usize> {
        let dropped = self.transport.discard()?;
        if dropped > 0 {
            debug!(dropped, "discarded stale bytes");
            self.bytes_read += dropped as u64;
        }
        Ok(dropped)
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl Session<TcpTransport> {
    /// Connect to `addr` ("host:port") with the given receive timeout
    pub fn connect(addr: &str, timeout: Duration) -> SessionResult<Self> {
        let transport = TcpTransport::connect(addr, timeout).map_err(|source| SessionError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Session::new(transport))
    }
}
