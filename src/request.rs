//! Builders for the three requests of the reader: symbol table length,
//! symbol table upload and the batched "sum-up" read.

use std::convert::TryInto;
use std::mem::size_of;

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::frame::{Command, Frame};
use crate::index;
use crate::symbol::Symbol;
use crate::{AmsAddr, Result};

// Structures used in request payloads, pub(crate) for the test suite.

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug)]
#[repr(C)]
pub(crate) struct IndexLength {
    pub index_group: U32,
    pub index_offset: U32,
    pub length: U32,
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug)]
#[repr(C)]
pub(crate) struct IndexLengthRW {
    pub index_group: U32,
    pub index_offset: U32,
    pub read_length: U32,
    pub write_length: U32,
}

/// What a request asks for; determines how its reply is decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Read the length of the symbol table.
    SymbolLength,
    /// Upload the symbol table of the given length.
    SymbolTable { length: u32 },
    /// Read the values of these symbols in one go.
    MultiRead { symbols: Vec<Symbol> },
}

/// A request frame, together with the information needed to decode its reply.
#[derive(Clone, Debug)]
pub struct Request {
    pub kind: RequestKind,
    pub frame: Frame,
}

impl Request {
    pub fn command(&self) -> Command {
        self.frame.command
    }
}

/// Creates request frames between a fixed pair of AMS addresses.
#[derive(Clone, Copy, Debug)]
pub struct RequestBuilder {
    target: AmsAddr,
    source: AmsAddr,
}

impl RequestBuilder {
    pub fn new(target: AmsAddr, source: AmsAddr) -> Self {
        Self { target, source }
    }

    pub fn target(&self) -> AmsAddr {
        self.target
    }

    pub fn source(&self) -> AmsAddr {
        self.source
    }

    fn read(&self, index_group: u32, index_offset: u32, length: u32) -> Frame {
        let header = IndexLength {
            index_group: U32::new(index_group),
            index_offset: U32::new(index_offset),
            length: U32::new(length),
        };
        Frame::request(self.target, self.source, Command::Read, header.as_bytes().to_vec())
    }

    /// Request the symbol upload info, which contains the table length.
    pub fn symbol_length_request(&self) -> Request {
        Request {
            kind: RequestKind::SymbolLength,
            frame: self.read(index::SYM_UPLOAD_INFO2, 0, index::SYM_UPLOAD_INFO2_LEN),
        }
    }

    /// Request the whole symbol table, `length` as reported by the length query.
    pub fn symbol_table_request(&self, length: u32) -> Request {
        Request {
            kind: RequestKind::SymbolTable { length },
            frame: self.read(index::SYM_UPLOAD, 0, length),
        }
    }

    /// Request the values of all given symbols with one sum-up read.
    ///
    /// Each item reserves four bytes in the reply for its own result code.
    pub fn multi_read_request(&self, symbols: &[Symbol]) -> Result<Request> {
        let read_length = symbols.iter().map(|s| size_of::<u32>() + s.size as usize).sum::<usize>();
        let write_length = size_of::<IndexLength>() * symbols.len();
        let header = IndexLengthRW {
            index_group: U32::new(index::SUMUP_READ),
            index_offset: U32::new(symbols.len().try_into()?),
            read_length: U32::new(read_length.try_into()?),
            write_length: U32::new(write_length.try_into()?),
        };

        let mut data = Vec::with_capacity(size_of::<IndexLengthRW>() + write_length);
        data.extend_from_slice(header.as_bytes());
        for symbol in symbols {
            let item = IndexLength {
                index_group: U32::new(symbol.index_group),
                index_offset: U32::new(symbol.index_offset),
                length: U32::new(symbol.size),
            };
            data.extend_from_slice(item.as_bytes());
        }

        Ok(Request {
            kind: RequestKind::MultiRead { symbols: symbols.to_vec() },
            frame: Frame::request(self.target, self.source, Command::ReadWrite, data),
        })
    }
}
