//! Addresses and timeouts used by the [`Client`](crate::Client).

use std::time::Duration;

use crate::{AmsAddr, AmsNetId, AmsPort, Error, Result};

/// Holds the different timeouts that will be used by the Client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound for a whole request/reply exchange, including the wait for
    /// access to the shared connection.
    pub command: Duration,
    /// Bound for each single byte of a reply payload.
    pub read: Duration,
}

impl Timeouts {
    pub fn new(command: Duration, read: Duration) -> Self {
        Self { command, read }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(10),
            read: Duration::from_secs(1),
        }
    }
}

/// Addressing and timeouts for one target device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub target: AmsAddr,
    pub source: AmsAddr,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    pub fn new(target: AmsAddr, source: AmsAddr, timeouts: Timeouts) -> Self {
        Self { target, source, timeouts }
    }

    /// Create a config from dotted NetID strings, validating them.
    pub fn parse(target_netid: &str, target_port: AmsPort, source_netid: &str,
                 source_port: AmsPort, timeouts: Timeouts) -> Result<Self> {
        Ok(Self {
            target: AmsAddr::new(parse_netid(target_netid)?, target_port),
            source: AmsAddr::new(parse_netid(source_netid)?, source_port),
            timeouts,
        })
    }
}

fn parse_netid(s: &str) -> Result<AmsNetId> {
    s.parse().map_err(|e| Error::InvalidNetId(s.into(), e))
}
