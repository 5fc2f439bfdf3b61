//! Conversion of raw symbol bytes into values, by PLC data type.

use chrono::{DateTime, NaiveDate, Utc};
use zerocopy::byteorder::little_endian::{I32, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::codec;
use crate::errors::DecodeError;
use crate::symbol::{DataType, Symbol};

/// A decoded PLC value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    /// `SINT`
    SInt(i8),
    /// `BYTE` and `USINT`
    Byte(u8),
    /// `INT`
    Int(i16),
    /// `WORD` and `UINT`
    UInt(u16),
    /// `DINT`
    DInt(i32),
    /// `DWORD`, `UDINT` and `OTCID`
    UDInt(u32),
    /// `LINT`
    LInt(i64),
    /// `ULINT`
    ULInt(u64),
    Real(f32),
    LReal(f64),
    String(String),
    /// `TIME` and `LTIME` as ISO-8601 duration.
    Duration(String),
    Date(NaiveDate),
    /// `DATE_AND_TIME` and `TIME_OF_DAY`
    DateTime(DateTime<Utc>),
    LibVersion(LibVersion),
    Version(Version),
    AppSystemInfo(PlcAppSystemInfo),
    TaskSystemInfo(PlcTaskSystemInfo),
    /// Types without a decoder.
    Raw(Vec<u8>),
    /// One array dimension; elements that failed to decode are `None`.
    Array(Vec<Option<Value>>),
}

/// Version information of a PLC library (`ST_LibVersion`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
    pub flags: i32,
    pub version: String,
}

/// A four-part version number (`VERSION`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub service_pack: u16,
    pub patch: u16,
}

/// Runtime information about a PLC application (`PLC.PlcAppSystemInfo`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlcAppSystemInfo {
    pub obj_id: u32,
    pub task_count: u32,
    pub online_change_count: u32,
    pub flags: u16,
    pub ads_port: u16,
    pub boot_data_loaded: bool,
    pub old_boot_data: bool,
    pub app_timestamp: DateTime<Utc>,
    pub keep_outputs_on_bp: bool,
    pub shutdown_in_progress: bool,
    pub licenses_pending: bool,
    pub bsod_occurred: bool,
    pub logged_in: bool,
    pub app_name: String,
    pub project_name: String,
}

/// Runtime information about a PLC task (`PLC.PlcTaskSystemInfo`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlcTaskSystemInfo {
    pub obj_id: u32,
    /// Cycle time in 100ns units.
    pub cycle_time: u32,
    pub priority: u16,
    pub ads_port: u16,
    pub cycle_count: u32,
    pub dc_task_time: DateTime<Utc>,
    pub last_exec_time: u32,
    pub first_cycle: bool,
    pub cycle_time_exceeded: bool,
    pub task_name: String,
}

// Raw layouts of the structured types.

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct LibVersionRaw {
    major: U16,
    minor: U16,
    build: U16,
    revision: U16,
    flags: I32,
    version: [u8; 24],
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct VersionRaw {
    major: U16,
    minor: U16,
    service_pack: U16,
    patch: U16,
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct AppSystemInfoRaw {
    obj_id: U32,
    task_count: U32,
    online_change_count: U32,
    flags: U16,
    _reserved1: [u8; 2],
    ads_port: U16,
    boot_data_loaded: u8,
    old_boot_data: u8,
    app_timestamp: U32,
    keep_outputs_on_bp: u8,
    shutdown_in_progress: u8,
    licenses_pending: u8,
    bsod_occurred: u8,
    logged_in: u8,
    _reserved2: [u8; 35],
    app_name: [u8; 64],
    project_name: [u8; 64],
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct TaskSystemInfoRaw {
    obj_id: U32,
    cycle_time: U32,
    priority: U16,
    ads_port: U16,
    cycle_count: U32,
    dc_task_time: U64,
    last_exec_time: U32,
    first_cycle: u8,
    cycle_time_exceeded: u8,
    _reserved: [u8; 34],
    task_name: [u8; 64],
}

fn read_raw<T: FromBytes>(bytes: &[u8]) -> Result<T, DecodeError> {
    T::read_from_prefix(bytes)
        .map(|(raw, _)| raw)
        .map_err(|_| DecodeError::InsufficientBytes {
            needed: std::mem::size_of::<T>(),
            available: bytes.len(),
        })
}

impl LibVersion {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: LibVersionRaw = read_raw(bytes)?;
        Ok(LibVersion {
            major: raw.major.get(),
            minor: raw.minor.get(),
            build: raw.build.get(),
            revision: raw.revision.get(),
            flags: raw.flags.get(),
            version: codec::decode_string(&raw.version),
        })
    }
}

impl Version {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: VersionRaw = read_raw(bytes)?;
        Ok(Version {
            major: raw.major.get(),
            minor: raw.minor.get(),
            service_pack: raw.service_pack.get(),
            patch: raw.patch.get(),
        })
    }
}

impl PlcAppSystemInfo {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: AppSystemInfoRaw = read_raw(bytes)?;
        Ok(PlcAppSystemInfo {
            obj_id: raw.obj_id.get(),
            task_count: raw.task_count.get(),
            online_change_count: raw.online_change_count.get(),
            flags: raw.flags.get(),
            ads_port: raw.ads_port.get(),
            boot_data_loaded: raw.boot_data_loaded == 1,
            old_boot_data: raw.old_boot_data == 1,
            app_timestamp: codec::decode_date_and_time(raw.app_timestamp.as_bytes())?,
            keep_outputs_on_bp: raw.keep_outputs_on_bp == 1,
            shutdown_in_progress: raw.shutdown_in_progress == 1,
            licenses_pending: raw.licenses_pending == 1,
            bsod_occurred: raw.bsod_occurred == 1,
            logged_in: raw.logged_in == 1,
            app_name: codec::decode_string(&raw.app_name),
            project_name: codec::decode_string(&raw.project_name),
        })
    }
}

impl PlcTaskSystemInfo {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: TaskSystemInfoRaw = read_raw(bytes)?;
        Ok(PlcTaskSystemInfo {
            obj_id: raw.obj_id.get(),
            cycle_time: raw.cycle_time.get(),
            priority: raw.priority.get(),
            ads_port: raw.ads_port.get(),
            cycle_count: raw.cycle_count.get(),
            dc_task_time: codec::decode_ldate_time(raw.dc_task_time.as_bytes())?,
            last_exec_time: raw.last_exec_time.get(),
            first_cycle: raw.first_cycle == 1,
            cycle_time_exceeded: raw.cycle_time_exceeded == 1,
            task_name: codec::decode_string(&raw.task_name),
        })
    }
}

/// Decode the bytes of a symbol according to its type and array shape.
///
/// Empty or malformed data decodes to `None`.
pub fn decode_symbol_value(symbol: &Symbol, bytes: &[u8]) -> Option<Value> {
    // Dimensions are popped from the back, so the outermost one must be last.
    let mut dims = symbol.array_dimensions.clone().unwrap_or_default();
    dims.reverse();
    decode_dimensions(symbol, bytes, &dims)
}

fn decode_dimensions(symbol: &Symbol, bytes: &[u8], dims: &[u32]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    let (&len, inner) = match dims.split_last() {
        Some(split) => split,
        None => return decode_scalar(symbol.data_type, bytes, symbol.size as usize).ok(),
    };
    let chunk = bytes.len().checked_div(len as usize).filter(|&n| n > 0)?;
    Some(Value::Array(
        bytes.chunks_exact(chunk)
             .take(len as usize)
             .map(|element| decode_dimensions(symbol, element, inner))
             .collect(),
    ))
}

/// Decode a single non-array value.
///
/// `size` is the declared byte size of the symbol, which bounds the length
/// of a `WSTRING`.
pub fn decode_scalar(data_type: DataType, bytes: &[u8], size: usize) -> Result<Value, DecodeError> {
    Ok(match data_type {
        DataType::Bool => Value::Bool(codec::decode_bool(bytes)?),
        DataType::Byte | DataType::USInt => Value::Byte(codec::slice(bytes, 0, 1)?[0]),
        DataType::SInt => Value::SInt(codec::slice(bytes, 0, 1)?[0] as i8),
        DataType::Int => Value::Int(codec::read_i16(bytes, 0)?),
        DataType::Word | DataType::UInt => Value::UInt(codec::read_u16(bytes, 0)?),
        DataType::DInt => Value::DInt(codec::read_i32(bytes, 0)?),
        DataType::DWord | DataType::UDInt | DataType::OtcId => Value::UDInt(codec::read_u32(bytes, 0)?),
        DataType::LInt => Value::LInt(codec::read_i64(bytes, 0)?),
        DataType::ULInt => Value::ULInt(codec::read_u64(bytes, 0)?),
        DataType::Real => Value::Real(codec::decode_real(bytes)?),
        DataType::LReal => Value::LReal(codec::decode_lreal(bytes)?),
        DataType::String => Value::String(codec::decode_string(bytes)),
        DataType::WString => Value::String(codec::decode_wstring(bytes, size)),
        DataType::Time => Value::Duration(codec::decode_time(bytes)?),
        DataType::LTime => Value::Duration(codec::decode_ltime(bytes)?),
        DataType::Date => Value::Date(codec::decode_date(bytes)?),
        DataType::DateAndTime => Value::DateTime(codec::decode_date_and_time(bytes)?),
        DataType::TimeOfDay => Value::DateTime(codec::decode_time_of_day(bytes)?),
        DataType::LibVersion => Value::LibVersion(LibVersion::from_bytes(bytes)?),
        DataType::Version => Value::Version(Version::from_bytes(bytes)?),
        DataType::AppInfo => Value::AppSystemInfo(PlcAppSystemInfo::from_bytes(bytes)?),
        DataType::TaskSystemInfo => Value::TaskSystemInfo(PlcTaskSystemInfo::from_bytes(bytes)?),
        DataType::BigType | DataType::Void => Value::Raw(bytes.to_vec()),
    })
}
