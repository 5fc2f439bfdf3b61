//! The TCP connection to an ADS device and the lock that serializes its use.
//!
//! A device accepts only one route per client IP, so all clients talking to
//! the same device share one [`SharedConnection`].  Each request/reply cycle
//! holds its [`ConnectionGuard`] from sending until the reply is read.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{error, trace};

use crate::errors::{ErrContext, TimeoutKind};
use crate::{Error, Result};

const READ_CHUNK_SIZE: usize = 4096;

/// Observes cancellation requested through the matching [`Canceller`].
#[derive(Clone, Debug)]
pub struct CancelToken(Receiver<()>);

/// Cancels all waits on the matching [`CancelToken`]s.
///
/// Dropping the canceller cancels as well.
#[derive(Debug)]
pub struct Canceller(Sender<()>);

/// Create a connected canceller and token.
pub fn cancel_pair() -> (Canceller, CancelToken) {
    let (send, recv) = bounded(0);
    (Canceller(send), CancelToken(recv))
}

impl Canceller {
    pub fn cancel(self) {}
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        CancelToken(crossbeam_channel::never())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.0.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.0
    }
}

/// A TCP connection whose received bytes are consumed one at a time with a
/// timeout.
pub struct Connection {
    socket: TcpStream,
    /// Chunks read by the reader thread
    chunks: Receiver<io::Result<Vec<u8>>>,
    /// Received but not yet consumed bytes
    pending: VecDeque<u8>,
    closed: bool,
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Shutting down makes the read() in the reader thread return.
        let _ = self.socket.shutdown(Shutdown::Both);
    }
}

impl Connection {
    /// Connect to an ADS device, usually at port [`ADS_PORT`](crate::ADS_PORT).
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()
            .ctx("converting address to SocketAddr")?
            .next()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
            .ctx("converting address to SocketAddr")?;
        let socket = TcpStream::connect_timeout(&addr, timeout).ctx("connecting TCP socket with timeout")?;
        Self::from_stream(socket)
    }

    /// Use an already connected socket.
    pub fn from_stream(socket: TcpStream) -> Result<Self> {
        // Disable Nagle to ensure small requests are sent promptly; we're
        // playing ping-pong with request reply, so no pipelining.
        socket.set_nodelay(true).ctx("setting NODELAY")?;

        let reader_socket = socket.try_clone().ctx("cloning TCP socket")?;
        let (chunk_send, chunks) = unbounded();
        std::thread::spawn(move || read_chunks(reader_socket, chunk_send));

        Ok(Connection {
            socket,
            chunks,
            pending: VecDeque::new(),
            closed: false,
        })
    }

    /// Write all bytes to the device.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.socket.write_all(bytes).ctx("sending request")
    }

    /// Read one byte, waiting at most `timeout`.  A timeout is reported as
    /// `Error::Timeout(kind)`.
    pub fn read_byte(&mut self, timeout: Duration, kind: TimeoutKind, cancel: &CancelToken) -> Result<u8> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            if self.closed {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof)).ctx("reading reply");
            }
            let msg = select! {
                recv(self.chunks) -> msg => msg,
                recv(cancel.receiver()) -> _ => return Err(Error::Cancelled("reading reply")),
                default(timeout) => return Err(Error::Timeout(kind)),
            };
            match msg {
                Ok(Ok(chunk)) => self.pending.extend(chunk),
                Ok(Err(e)) => {
                    self.closed = true;
                    return Err(Error::Io("reading reply", e));
                }
                Err(_) => self.closed = true,
            }
        }
    }

    /// Discard buffered bytes and whatever arrives until the line has been
    /// quiet for `quiet`, or `limit` bytes have been discarded.
    ///
    /// Returns the number of discarded bytes.
    pub fn drain(&mut self, quiet: Duration, limit: usize) -> usize {
        let mut count = self.pending.len();
        self.pending.clear();
        while count < limit && !self.closed {
            match self.chunks.recv_timeout(quiet) {
                Ok(Ok(chunk)) => count += chunk.len(),
                Ok(Err(_)) | Err(RecvTimeoutError::Disconnected) => self.closed = true,
                Err(RecvTimeoutError::Timeout) => break,
            }
        }
        count
    }

    /// Whether the device has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the connection.
    pub fn close(self) {}
}

// Implementation detail: reader thread that forwards received data.
fn read_chunks(mut socket: TcpStream, chunk_send: Sender<io::Result<Vec<u8>>>) {
    let mut buf = [0; READ_CHUNK_SIZE];
    loop {
        let msg = match socket.read(&mut buf) {
            Ok(0) => Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        let done = msg.is_err();
        // A failed send means the connection was dropped.
        if chunk_send.send(msg).is_err() || done {
            return;
        }
    }
}

/// A [`Connection`] that can be used by one request/reply cycle at a time.
pub struct SharedConnection {
    name: String,
    /// Holds a single token while the connection is free
    token_send: Sender<()>,
    token_recv: Receiver<()>,
    conn: Mutex<Connection>,
}

impl SharedConnection {
    /// Wrap a connection; `name` identifies it in log messages.
    pub fn new(name: impl Into<String>, conn: Connection) -> Self {
        let (token_send, token_recv) = bounded(1);
        let _ = token_send.send(());
        Self {
            name: name.into(),
            token_send,
            token_recv,
            conn: Mutex::new(conn),
        }
    }

    /// Wait at most `timeout` for exclusive access to the connection.
    ///
    /// The access is released when the returned guard is dropped.
    pub fn acquire(&self, timeout: Duration, cancel: &CancelToken) -> Result<ConnectionGuard<'_>> {
        trace!("Acquiring lock for connection to {}", self.name);
        select! {
            recv(self.token_recv) -> _ => {},
            recv(cancel.receiver()) -> _ => return Err(Error::Cancelled("acquiring connection")),
            default(timeout) => {
                error!("Timeout while waiting for acquiring connection to {}", self.name);
                return Err(Error::Timeout(TimeoutKind::Lock));
            },
        }
        trace!("Acquired lock for connection to {}", self.name);
        // The token already guarantees exclusive access; the mutex only hands
        // out the reference.
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(ConnectionGuard { shared: self, conn })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Exclusive access to a [`SharedConnection`].
pub struct ConnectionGuard<'a> {
    shared: &'a SharedConnection,
    conn: MutexGuard<'a, Connection>,
}

impl Deref for ConnectionGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for ConnectionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        // Cannot fail: the channel has room for the single token.
        let _ = self.shared.token_send.try_send(());
        trace!("Released lock for connection to {}", self.shared.name);
    }
}
