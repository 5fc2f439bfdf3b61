//! Read symbols from PLCs using the ADS protocol
//!
//! # Introduction
//!
//! ADS is the native protocol used by programmable logic controllers (PLCs) and
//! the TwinCAT automation system produced by [Beckhoff GmbH](https://www.beckhoff.com/).
//!
//! The [protocol documentation](https://infosys.beckhoff.de/content/1031/tc3_adscommon/html/tcadscommon_introads.htm)
//! can be found on their Information System pages.
//!
//! This crate discovers the symbol table of a PLC and reads batches of symbol
//! values with one request, decoding them according to their PLC types.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ads_reader::{Client, ClientConfig, Timeouts};
//!
//! let config = ClientConfig::parse("5.23.1.1.1.1", 851, "192.168.0.10.1.1", 58913,
//!                                  Timeouts::default()).unwrap();
//! let client = Client::connect(("192.168.0.1", ads_reader::ADS_PORT), config).unwrap();
//! let symbols = client.symbols().unwrap().unwrap_or_default();
//! for result in client.read_values(&symbols).unwrap() {
//!     println!("{} = {:?}", result.symbol.name, result.value);
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod errors;
pub mod frame;
pub mod index;
pub mod netid;
pub mod request;
pub mod response;
pub mod source;
pub mod symbol;

pub use client::Client;
pub use config::{ClientConfig, Timeouts};
pub use connection::{cancel_pair, CancelToken, Canceller, Connection, SharedConnection};
pub use decoder::Value;
pub use errors::{DecodeError, Error, Result, TimeoutKind};
pub use netid::{AmsAddr, AmsNetId, AmsPort};
pub use response::ReadResult;
pub use source::{ChannelValue, SymbolSource};
pub use symbol::{DataType, Symbol};

/// The default TCP port of the ADS router.
pub const ADS_PORT: u16 = 0xBF02;

#[cfg(test)]
mod test;
