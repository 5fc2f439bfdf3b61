//! Contains the client that executes requests against one ADS device.

use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use itertools::Itertools;
use log::{debug, info, trace, warn};

use crate::codec;
use crate::config::{ClientConfig, Timeouts};
use crate::connection::{CancelToken, Connection, SharedConnection};
use crate::errors::{DecodeError, TimeoutKind};
use crate::frame::{Frame, TCP_HEADER_SIZE};
use crate::request::{Request, RequestBuilder};
use crate::response::{ReadResult, Response};
use crate::symbol::Symbol;
use crate::{AmsAddr, Error, Result};

/// Upper bound for bytes discarded after a failed exchange.
const DRAIN_LIMIT: usize = 1 << 20;
/// Upper bound for preallocating the reply buffer
const READ_BUFFER_LIMIT: usize = 1 << 16;

/// Return the invoke ID following `current`.  Wraps to 1, never yields 0.
pub fn next_invoke_id(current: u32) -> u32 {
    if current == u32::MAX { 1 } else { current + 1 }
}

/// Represents a target device reached over a (possibly shared) connection.
///
/// The Client's methods use `&self`, so it can be shared between threads;
/// each call occupies the connection for one complete request/reply cycle.
pub struct Client {
    conn: Arc<SharedConnection>,
    builder: RequestBuilder,
    timeouts: Timeouts,
    /// Last used invoke ID (identifies the request/reply pair)
    invoke_id: AtomicU32,
    /// Replies dropped as "no data" because of a negative length
    soft_failures: AtomicU64,
}

impl Client {
    /// Create a client that talks to `config.target` over `conn`.
    pub fn new(conn: Arc<SharedConnection>, config: ClientConfig) -> Self {
        Client {
            conn,
            builder: RequestBuilder::new(config.target, config.source),
            timeouts: config.timeouts,
            invoke_id: AtomicU32::new(0),
            soft_failures: AtomicU64::new(0),
        }
    }

    /// Open a new connection and create a client using it exclusively.
    ///
    /// The connect attempt is bounded by the command timeout.
    pub fn connect(addr: impl ToSocketAddrs, config: ClientConfig) -> Result<Self> {
        let conn = Connection::connect(addr, config.timeouts.command)?;
        let shared = SharedConnection::new(config.target.to_string(), conn);
        Ok(Self::new(Arc::new(shared), config))
    }

    pub fn target(&self) -> AmsAddr {
        self.builder.target()
    }

    pub fn source(&self) -> AmsAddr {
        self.builder.source()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Return the request builder for this client's addresses.
    pub fn builder(&self) -> &RequestBuilder {
        &self.builder
    }

    /// Number of replies that were treated as "no data" so far.
    pub fn soft_failures(&self) -> u64 {
        self.soft_failures.load(Ordering::Relaxed)
    }

    /// Query the size of the symbol table in bytes.
    ///
    /// Returns `None` if the reply was dropped as a soft failure.
    pub fn symbol_length(&self) -> Result<Option<u32>> {
        let request = self.builder.symbol_length_request();
        Ok(match self.execute(&request, &CancelToken::never())? {
            Some(Response::SymbolLength(resp)) => Some(resp.symbol_length),
            _ => None,
        })
    }

    /// Upload and parse the symbol table of the device.
    pub fn symbols(&self) -> Result<Option<Vec<Symbol>>> {
        trace!("Getting symbols from {}", self.target());
        let length = match self.symbol_length()? {
            Some(length) => length,
            None => return Ok(None),
        };
        trace!("Length of symbol data is {} bytes", length);

        let request = self.builder.symbol_table_request(length);
        Ok(match self.execute(&request, &CancelToken::never())? {
            Some(Response::SymbolTable(resp)) => {
                info!("Got {} symbols from {}", resp.symbols.len(), self.target());
                Some(resp.symbols)
            }
            _ => None,
        })
    }

    /// Read the current values of the given symbols with one request.
    pub fn read_values(&self, symbols: &[Symbol]) -> Result<Vec<ReadResult>> {
        self.read_values_with_cancel(symbols, &CancelToken::never())
    }

    /// Like [`read_values`](Self::read_values), but can be cancelled.
    pub fn read_values_with_cancel(&self, symbols: &[Symbol], cancel: &CancelToken) -> Result<Vec<ReadResult>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let request = self.builder.multi_read_request(symbols)?;
        self.read_request(&request, cancel)
    }

    /// Execute a prepared multi-read request.
    pub fn read_request(&self, request: &Request, cancel: &CancelToken) -> Result<Vec<ReadResult>> {
        if log::log_enabled!(log::Level::Trace) {
            if let crate::request::RequestKind::MultiRead { symbols } = &request.kind {
                trace!("Reading values for symbols {}", symbols.iter().map(|s| &s.name).format(", "));
            }
        }
        Ok(match self.execute(request, cancel)? {
            Some(Response::MultiRead(resp)) => resp.results,
            _ => Vec::new(),
        })
    }

    /// Low-level function to execute one request/reply cycle.
    ///
    /// Holds the connection for the whole cycle.  After any failure except
    /// a timeout, stale bytes are drained from the connection before it is
    /// released.  A reply with a negative length is not an error: the result
    /// is `None`.
    pub fn execute(&self, request: &Request, cancel: &CancelToken) -> Result<Option<Response>> {
        let mut conn = self.conn.acquire(self.timeouts.command, cancel)?;
        // Waiting for the lock does not count against the exchange.
        let deadline = Instant::now() + self.timeouts.command;

        let invoke_id = self.next_invoke_id();
        let result = self.exchange(&mut conn, request, invoke_id, deadline, cancel);
        match result {
            Ok(response) => Ok(Some(response)),
            Err(e) if e.is_timeout() => Err(e),
            Err(e) => {
                let drained = conn.drain(self.timeouts.read, DRAIN_LIMIT);
                debug!("Drained {} bytes from connection to {} after error: {}",
                       drained, self.conn.name(), e);
                match e {
                    Error::Decode(DecodeError::NegativeLength(len)) => {
                        self.soft_failures.fetch_add(1, Ordering::Relaxed);
                        warn!("Negative data length {} in reply from {}, returning no data",
                              len, self.target());
                        Ok(None)
                    }
                    e => Err(e),
                }
            }
        }
    }

    fn next_invoke_id(&self) -> u32 {
        let previous = self.invoke_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| Some(next_invoke_id(id)))
            .unwrap_or_else(|id| id);
        next_invoke_id(previous)
    }

    fn exchange(&self, conn: &mut Connection, request: &Request, invoke_id: u32,
                deadline: Instant, cancel: &CancelToken) -> Result<Response> {
        trace!("Sending {:?} request with invoke ID {} to {}",
               request.command(), invoke_id, self.target());
        let bytes = request.frame.encode(invoke_id)?;
        conn.write_all(&bytes)?;

        let payload = self.read_reply(conn, deadline, cancel)?;
        let frame = Frame::decode(&payload)?;
        trace!("Received {:?} reply with invoke ID {} from {}",
               frame.command, frame.invoke_id, frame.target);
        Response::decode(request, &frame, invoke_id)
    }

    /// Read one reply: the AMS/TCP header within the command deadline, then
    /// the declared number of bytes, each within the read timeout.
    fn read_reply(&self, conn: &mut Connection, deadline: Instant, cancel: &CancelToken) -> Result<Vec<u8>> {
        let mut header = [0; TCP_HEADER_SIZE];
        for byte in header.iter_mut() {
            *byte = conn.read_byte(remaining(deadline), TimeoutKind::Header, cancel)?;
        }
        let length = codec::read_length(&header, 2)?;

        let mut payload = Vec::with_capacity(length.min(READ_BUFFER_LIMIT));
        for _ in 0..length {
            let left = remaining(deadline);
            let (timeout, kind) = if left < self.timeouts.read {
                (left, TimeoutKind::Command)
            } else {
                (self.timeouts.read, TimeoutKind::Payload)
            };
            payload.push(conn.read_byte(timeout, kind, cancel)?);
        }
        Ok(payload)
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
