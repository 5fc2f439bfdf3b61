//! Decoders for the replies to the requests in [`crate::request`].

use std::mem::size_of;

use chrono::{DateTime, Utc};

use crate::codec;
use crate::decoder::{decode_symbol_value, Value};
use crate::errors::ads_error;
use crate::frame::{Command, Frame};
use crate::request::{Request, RequestKind};
use crate::symbol::{parse_symbols, Symbol};
use crate::Result;

// Offset of the symbol table length in the upload info.
const SYMBOL_LENGTH_OFFSET: usize = 12;
// Read replies start with result and returned length.
const READ_REPLY_HEADER: usize = 8;

/// Reply to the symbol table length query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolLengthResponse {
    pub symbol_length: u32,
}

impl SymbolLengthResponse {
    pub fn decode(frame: &Frame, invoke_id: u32) -> Result<Self> {
        frame.check_response("reading symbol length", Command::Read, invoke_id, READ_REPLY_HEADER)?;
        let result = codec::read_u32(&frame.data, 0)?;
        if result != 0 {
            return ads_error("reading symbol length", result);
        }
        let symbol_length = codec::read_length(&frame.data, SYMBOL_LENGTH_OFFSET)? as u32;
        Ok(Self { symbol_length })
    }
}

/// Reply to the symbol table upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolTableResponse {
    pub symbols: Vec<Symbol>,
}

impl SymbolTableResponse {
    pub fn decode(frame: &Frame, length: u32, invoke_id: u32) -> Result<Self> {
        frame.check_response("reading symbols", Command::Read, invoke_id,
                             length as usize + READ_REPLY_HEADER)?;
        let symbols = parse_symbols(&frame.data[READ_REPLY_HEADER..])?;
        Ok(Self { symbols })
    }
}

/// The outcome of reading one symbol in a multi-read.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadResult {
    /// The decoded value; absent if `result` is nonzero or decoding failed.
    pub value: Option<Value>,
    /// ADS result code for this item.
    pub result: u32,
    /// When the reply was decoded.
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
}

/// Reply to a sum-up read.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiReadResponse {
    pub results: Vec<ReadResult>,
}

impl MultiReadResponse {
    /// Decode the reply for `symbols`, which must be in request order.
    ///
    /// A nonzero overall result fails the whole read; nonzero per-item results
    /// are reported in the respective `ReadResult`.
    pub fn decode(frame: &Frame, symbols: &[Symbol], invoke_id: u32) -> Result<Self> {
        let expected = symbols.iter().map(|s| size_of::<u32>() + s.size as usize).sum();
        frame.check_response("reading symbol values", Command::ReadWrite, invoke_id, expected)?;

        let data = &frame.data;
        if data.is_empty() {
            return Ok(Self { results: Vec::new() });
        }
        let result = codec::read_u32(data, 0)?;
        if result != 0 {
            return ads_error("reading symbol values", result);
        }

        let timestamp = Utc::now();
        let mut value_pos = READ_REPLY_HEADER + size_of::<u32>() * symbols.len();
        let mut results = Vec::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            let result = codec::read_u32(data, READ_REPLY_HEADER + size_of::<u32>() * i)?;
            let size = symbol.size as usize;
            // A short reply leaves the remaining values truncated or empty.
            let start = value_pos.min(data.len());
            let end = (value_pos + size).min(data.len());
            value_pos += size;

            let value = if result == 0 {
                decode_symbol_value(symbol, &data[start..end])
            } else {
                None
            };
            results.push(ReadResult { value, result, timestamp, symbol: symbol.clone() });
        }
        Ok(Self { results })
    }
}

/// A decoded reply, matching the kind of the request that caused it.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    SymbolLength(SymbolLengthResponse),
    SymbolTable(SymbolTableResponse),
    MultiRead(MultiReadResponse),
}

impl Response {
    /// Decode `frame` as the reply to `request`, sent with `invoke_id`.
    pub fn decode(request: &Request, frame: &Frame, invoke_id: u32) -> Result<Self> {
        Ok(match &request.kind {
            RequestKind::SymbolLength =>
                Response::SymbolLength(SymbolLengthResponse::decode(frame, invoke_id)?),
            RequestKind::SymbolTable { length } =>
                Response::SymbolTable(SymbolTableResponse::decode(frame, *length, invoke_id)?),
            RequestKind::MultiRead { symbols } =>
                Response::MultiRead(MultiReadResponse::decode(frame, symbols, invoke_id)?),
        })
    }
}
