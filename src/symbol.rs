//! Symbol descriptors and parsing of the uploaded symbol table.

use std::convert::TryFrom;
use std::fmt::{self, Display};

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec;
use crate::{Error, Result};

/// PLC data types that the value decoder knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DataType {
    AppInfo,
    BigType,
    Bool,
    Byte,
    Date,
    DateAndTime,
    DInt,
    DWord,
    Int,
    LibVersion,
    LInt,
    LReal,
    LTime,
    OtcId,
    Real,
    SInt,
    String,
    TaskSystemInfo,
    Time,
    TimeOfDay,
    UDInt,
    UInt,
    ULInt,
    USInt,
    Version,
    /// Anything not listed; decoded as raw bytes.
    Void,
    Word,
    WString,
}

impl DataType {
    /// Map a PLC type name to a data type.
    ///
    /// Only the last word is considered (so `ARRAY [0..3] OF INT` is `Int`),
    /// and a length suffix like in `STRING(80)` is ignored.
    pub fn from_type_name(name: &str) -> Self {
        let base = name.rsplit(' ').next().unwrap_or("");
        let base = base.split('(').next().unwrap_or("").trim();
        match base {
            "BIGTYPE" => Self::BigType,
            "BOOL" => Self::Bool,
            "BYTE" => Self::Byte,
            "DATE" => Self::Date,
            "DATE_AND_TIME" => Self::DateAndTime,
            "DINT" => Self::DInt,
            "DWORD" => Self::DWord,
            "INT" => Self::Int,
            "LINT" => Self::LInt,
            "LREAL" => Self::LReal,
            "LTIME" => Self::LTime,
            "OTCID" => Self::OtcId,
            "PLC.PlcAppSystemInfo" => Self::AppInfo,
            "PLC.PlcTaskSystemInfo" => Self::TaskSystemInfo,
            "REAL" => Self::Real,
            "SINT" => Self::SInt,
            "STRING" => Self::String,
            "ST_LibVersion" => Self::LibVersion,
            "TASK_SYSTEM_INFO" => Self::TaskSystemInfo,
            "TIME" => Self::Time,
            "TIME_OF_DAY" => Self::TimeOfDay,
            "UDINT" => Self::UDInt,
            "UINT" => Self::UInt,
            "ULINT" => Self::ULInt,
            "USINT" => Self::USInt,
            "VERSION" => Self::Version,
            "WORD" => Self::Word,
            "WSTRING" => Self::WString,
            _ => Self::Void,
        }
    }
}

/// A PLC variable as listed in the symbol table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub index_group: u32,
    pub index_offset: u32,
    pub data_type: DataType,
    pub type_name: String,
    /// Size of the whole variable in bytes (all array elements).
    pub size: u32,
    /// Length of each array dimension, outermost first.  Never empty.
    pub array_dimensions: Option<Vec<u32>>,
}

impl Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}, {:#x}:{:#x}, {} bytes", self.name, self.type_name,
               self.index_group, self.index_offset, self.size)?;
        if let Some(dims) = &self.array_dimensions {
            write!(f, ", dimensions [{}]", dims.iter().format(","))?;
        }
        write!(f, ")")
    }
}

// Up to three `lo..hi` bounds in the brackets of an ARRAY type.
static ARRAY_BOUNDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*(?P<x1>-?\d+)\s*\.\.\s*(?P<x2>-?\d+)\s*(?:,\s*(?P<y1>-?\d+)\s*\.\.\s*(?P<y2>-?\d+)\s*)?(?:,\s*(?P<z1>-?\d+)\s*\.\.\s*(?P<z2>-?\d+)\s*)?\]")
        .expect("valid regex")
});

/// Extract the array dimension lengths from an `ARRAY [..] OF ..` type name.
///
/// Returns `None` for non-array types and for bounds that cannot be parsed.
pub fn array_dimensions(type_name: &str) -> Option<Vec<u32>> {
    if !type_name.starts_with("ARRAY") {
        return None;
    }
    let caps = ARRAY_BOUNDS.captures(type_name)?;
    let dims = ["x", "y", "z"]
        .iter()
        .filter_map(|dim| {
            let lo = caps.name(&format!("{}1", dim))?.as_str().parse::<i64>().ok()?;
            let hi = caps.name(&format!("{}2", dim))?.as_str().parse::<i64>().ok()?;
            u32::try_from((hi - lo).abs() + 1).ok()
        })
        .collect_vec();
    if dims.is_empty() { None } else { Some(dims) }
}

// Offsets within one symbol table entry.
const ENTRY_LENGTH: usize = 0;
const ENTRY_INDEX_GROUP: usize = 4;
const ENTRY_INDEX_OFFSET: usize = 8;
const ENTRY_SIZE: usize = 12;
const ENTRY_NAME_LENGTH: usize = 24;
const ENTRY_TYPE_LENGTH: usize = 26;
const ENTRY_NAME: usize = 30;

/// Parse a sequence of symbol table entries.
///
/// Each entry starts with its own total length, which is used to advance to
/// the next entry; name and type follow the fixed part, each with a NUL
/// terminator.
pub fn parse_symbols(table: &[u8]) -> Result<Vec<Symbol>> {
    let mut symbols = Vec::new();
    let mut pos = 0;
    while pos < table.len() {
        let entry_len = codec::read_u32(table, pos + ENTRY_LENGTH)? as usize;
        if entry_len == 0 {
            return Err(Error::Reply("parsing symbols", "zero-length symbol entry", pos as u32));
        }
        let entry = &table[pos..];
        let name_len = codec::read_u16(entry, ENTRY_NAME_LENGTH)? as usize;
        let type_len = codec::read_u16(entry, ENTRY_TYPE_LENGTH)? as usize;
        let name = codec::decode_string(codec::slice(entry, ENTRY_NAME, name_len)?);
        let type_name = codec::decode_string(
            codec::slice(entry, ENTRY_NAME + name_len + 1, type_len)?);

        symbols.push(Symbol {
            index_group: codec::read_u32(entry, ENTRY_INDEX_GROUP)?,
            index_offset: codec::read_u32(entry, ENTRY_INDEX_OFFSET)?,
            size: codec::read_u32(entry, ENTRY_SIZE)?,
            data_type: DataType::from_type_name(&type_name),
            array_dimensions: array_dimensions(&type_name),
            name,
            type_name,
        });
        pos += entry_len;
    }
    Ok(symbols)
}
