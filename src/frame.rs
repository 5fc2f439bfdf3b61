//! The AMS/TCP envelope: encoding requests and decoding replies.

use std::convert::{TryFrom, TryInto};

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::codec;
use crate::errors::{ads_error, DecodeError};
use crate::{AmsAddr, AmsNetId, Error, Result};

/// An ADS protocol command.  The discriminant is the command ID on the wire.
// https://infosys.beckhoff.com/content/1033/tc3_ads_intro/115847307.html?id=7738940192708835096
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Never sent
    Invalid = 0,
    /// Return device info
    DevInfo = 1,
    /// Read some data
    Read = 2,
    /// Write some data
    Write = 3,
    /// Read the ADS and device state
    ReadState = 4,
    /// Set the ADS and device state
    WriteControl = 5,
    /// Add a notification for a given index
    AddNotification = 6,
    /// Delete a notification
    DeleteNotification = 7,
    /// Change occurred in a given notification,
    /// can be sent by the PLC only
    Notification = 8,
    /// Write some data, then read back some data
    /// (used as a poor-man's function call)
    ReadWrite = 9,
}

impl Command {
    pub(crate) fn action(self) -> &'static str {
        match self {
            Command::Invalid => "invalid command",
            Command::DevInfo => "get device info",
            Command::Read => "read data",
            Command::Write => "write data",
            Command::ReadState => "read state",
            Command::WriteControl => "write control",
            Command::AddNotification => "add notification",
            Command::DeleteNotification => "delete notification",
            Command::Notification => "notification",
            Command::ReadWrite => "write and read data",
        }
    }
}

impl TryFrom<u16> for Command {
    type Error = DecodeError;

    fn try_from(value: u16) -> std::result::Result<Self, DecodeError> {
        Ok(match value {
            0 => Self::Invalid,
            1 => Self::DevInfo,
            2 => Self::Read,
            3 => Self::Write,
            4 => Self::ReadState,
            5 => Self::WriteControl,
            6 => Self::AddNotification,
            7 => Self::DeleteNotification,
            8 => Self::Notification,
            9 => Self::ReadWrite,
            _ => return Err(DecodeError::UnknownCommandId(value)),
        })
    }
}

/// Size of the AMS/TCP and AMS headers
// https://infosys.beckhoff.com/content/1033/tc3_ads_intro/115845259.html?id=6032227753916597086
pub const TCP_HEADER_SIZE: usize = 6;
pub const AMS_HEADER_SIZE: usize = 32;

/// State flags of a request: "ADS command".
pub const REQUEST_STATE_FLAGS: u16 = 0x0004;
/// State flags expected on every data reply: "ADS command | response".
pub const RESPONSE_STATE_FLAGS: u16 = 0x0005;

// Wire structures, pub(crate) for the test suite.

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug)]
#[repr(C)]
pub(crate) struct AmsTcpHeader {
    /// always 0 for ADS commands
    pub reserved: U16,
    /// length of AMS header + data
    pub length: U32,
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug)]
#[repr(C)]
pub(crate) struct AmsHeader {
    pub dest_netid: AmsNetId,
    pub dest_port: U16,
    pub src_netid: AmsNetId,
    pub src_port: U16,
    pub command: U16,
    /// 0x01 - response
    /// 0x04 - ADS command
    pub state_flags: U16,
    pub data_length: U32,
    pub error_code: U32,
    pub invoke_id: U32,
}

/// One AMS message, either a request to send or a decoded reply.
///
/// For a decoded reply, `source` is the address the reply was sent to (our
/// own, matching the request's source) and `target` the address it came
/// from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub target: AmsAddr,
    pub source: AmsAddr,
    pub command: Command,
    pub state_flags: u16,
    pub result: u32,
    pub invoke_id: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a request frame with command state flags and no result.
    pub fn request(target: AmsAddr, source: AmsAddr, command: Command, data: Vec<u8>) -> Self {
        Frame {
            target,
            source,
            command,
            state_flags: REQUEST_STATE_FLAGS,
            result: 0,
            invoke_id: 0,
            data,
        }
    }

    /// Encode the frame into AMS/TCP wire bytes with the given invoke ID.
    pub fn encode(&self, invoke_id: u32) -> Result<Vec<u8>> {
        let data_len: u32 = self.data.len().try_into()?;
        let tcp_header = AmsTcpHeader {
            reserved: U16::new(0),
            length: U32::new((AMS_HEADER_SIZE + self.data.len()).try_into()?),
        };
        let header = AmsHeader {
            dest_netid: self.target.netid(),
            dest_port: U16::new(self.target.port()),
            src_netid: self.source.netid(),
            src_port: U16::new(self.source.port()),
            command: U16::new(self.command as u16),
            state_flags: U16::new(self.state_flags),
            data_length: U32::new(data_len),
            error_code: U32::new(self.result),
            invoke_id: U32::new(invoke_id),
        };

        // Collect everything into one buffer so that it is written at once.
        let mut request = Vec::with_capacity(TCP_HEADER_SIZE + AMS_HEADER_SIZE + self.data.len());
        request.extend_from_slice(tcp_header.as_bytes());
        request.extend_from_slice(header.as_bytes());
        request.extend_from_slice(&self.data);
        Ok(request)
    }

    /// Decode an AMS header plus data (everything after the AMS/TCP header).
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        let header = match AmsHeader::read_from_prefix(bytes) {
            Ok((header, _)) => header,
            Err(_) => return Err(DecodeError::FrameTooShort(bytes.len())),
        };
        let command = Command::try_from(header.command.get())?;
        let data_len = codec::read_length(bytes, 20)?;
        let data = codec::slice(bytes, AMS_HEADER_SIZE, data_len)?.to_vec();

        Ok(Frame {
            source: AmsAddr::new(header.dest_netid, header.dest_port.get()),
            target: AmsAddr::new(header.src_netid, header.src_port.get()),
            command,
            state_flags: header.state_flags.get(),
            result: header.error_code.get(),
            invoke_id: header.invoke_id.get(),
            data,
        })
    }

    /// Validate a decoded reply against what the request expects.
    pub fn check_response(&self, action: &'static str, command: Command,
                          invoke_id: u32, min_data_len: usize) -> Result<()> {
        if self.result != 0 {
            return ads_error(action, self.result);
        }
        if self.command != command {
            return Err(Error::Reply(action, "unexpected command", self.command as u32));
        }
        if self.invoke_id != invoke_id {
            return Err(Error::Reply(action, "unexpected invoke ID", self.invoke_id));
        }
        if self.data.len() < min_data_len {
            return Err(Error::Reply(action, "got less data than expected", self.data.len() as u32));
        }
        if self.state_flags != RESPONSE_STATE_FLAGS {
            return Err(Error::Reply(action, "unexpected state flags", self.state_flags.into()));
        }
        Ok(())
    }
}
