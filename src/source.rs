//! Reading named channels, each mapped to a PLC symbol, from one device.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{error, info, trace};

use crate::connection::CancelToken;
use crate::decoder::Value;
use crate::errors::ads_error_message;
use crate::request::Request;
use crate::symbol::Symbol;
use crate::{Client, Result};

/// Channel selection that reads all channels.
pub const WILDCARD: &str = "*";

/// The value of one channel from a read.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelValue {
    pub value: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

// A prepared read and the channel each of its symbols belongs to.
struct PreparedRead {
    selection: Option<Vec<String>>,
    channels: Vec<String>,
    request: Request,
}

/// A set of channels read from one device.
pub struct SymbolSource {
    id: String,
    client: Client,
    /// Channel ID -> symbol name
    channels: BTreeMap<String, String>,
    symbols: Option<Vec<Symbol>>,
    prepared: Option<PreparedRead>,
}

impl SymbolSource {
    pub fn new(id: impl Into<String>, client: Client, channels: BTreeMap<String, String>) -> Self {
        Self {
            id: id.into(),
            client,
            channels,
            symbols: None,
            prepared: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Return the symbol table of the device, uploading it on first use.
    pub fn symbols(&mut self) -> Result<Option<&[Symbol]>> {
        if self.symbols.is_none() {
            info!("Getting symbols for ADS source \"{}\"", self.id);
            self.symbols = self.client.symbols()?;
            if let Some(symbols) = &self.symbols {
                trace!("Available symbols for ADS source \"{}\" are {}",
                       self.id, symbols.iter().map(|s| &s.name).format(", "));
            }
        }
        Ok(self.symbols.as_deref())
    }

    /// Read the selected channels; `None` or `["*"]` selects all.
    ///
    /// Channels whose symbol does not exist and items the device failed to
    /// read are logged and left out of the result.
    pub fn read(&mut self, channels: Option<&[String]>) -> Result<BTreeMap<String, ChannelValue>> {
        self.read_with_cancel(channels, &CancelToken::never())
    }

    /// Like [`read`](Self::read), but can be cancelled.
    pub fn read_with_cancel(&mut self, channels: Option<&[String]>, cancel: &CancelToken)
                            -> Result<BTreeMap<String, ChannelValue>> {
        if self.symbols()?.is_none() {
            return Ok(BTreeMap::new());
        }
        let selection = channels.map(|c| c.to_vec());
        let reuse = matches!(&self.prepared, Some(p) if p.selection == selection);
        if !reuse {
            self.prepared = self.prepare(selection)?;
        }
        let prepared = match &self.prepared {
            Some(prepared) => prepared,
            None => return Ok(BTreeMap::new()),
        };

        let results = self.client.read_request(&prepared.request, cancel)?;
        let mut values = BTreeMap::new();
        for (channel, result) in prepared.channels.iter().zip(results) {
            if result.result == 0 {
                values.insert(channel.clone(), ChannelValue {
                    value: result.value,
                    timestamp: result.timestamp,
                });
            } else {
                error!("Error reading symbol {} from source \"{}\", {} ({:#x})",
                       result.symbol.name, self.id, ads_error_message(result.result), result.result);
            }
        }
        Ok(values)
    }

    fn prepare(&self, selection: Option<Vec<String>>) -> Result<Option<PreparedRead>> {
        let all = match &selection {
            None => true,
            Some(sel) => sel.len() == 1 && sel[0] == WILDCARD,
        };
        let known = self.symbols.as_deref().unwrap_or_default();

        let mut channels = Vec::new();
        let mut symbols = Vec::new();
        for (channel, name) in &self.channels {
            if !all && !selection.iter().flatten().any(|c| c == channel) {
                continue;
            }
            match known.iter().find(|s| &s.name == name) {
                Some(symbol) => {
                    channels.push(channel.clone());
                    symbols.push(symbol.clone());
                }
                None => error!("Source \"{}\", channel \"{}\", symbol \"{}\" does not exist",
                               self.id, channel, name),
            }
        }
        if symbols.is_empty() {
            return Ok(None);
        }
        let request = self.client.builder().multi_read_request(&symbols)?;
        Ok(Some(PreparedRead { selection, channels, request }))
    }
}
