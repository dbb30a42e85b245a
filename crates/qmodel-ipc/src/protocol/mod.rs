//! IPC protocol: message kinds, framing, codec, compression.

pub mod compress;
pub mod reader;
pub mod writer;

pub use reader::{decode_message, decode_payload};
pub use writer::Serializer;

use qmodel_core::{Error, Result};

/// Header size: 1 endian + 1 message kind + 1 compressed + 1 reserved +
/// 4 total length.
pub const HEADER_SIZE: usize = 8;

pub const LITTLE_ENDIAN: u8 = 1;
pub const BIG_ENDIAN: u8 = 0;

/// Message kind carried in header byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// Fire-and-forget; no response expected.
    Async,
    /// Request expecting exactly one response.
    Sync,
    /// Response to a sync request.
    Response,
}

impl MsgType {
    pub const fn as_byte(self) -> u8 {
        match self {
            MsgType::Async => 0,
            MsgType::Sync => 1,
            MsgType::Response => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(MsgType::Async),
            1 => Some(MsgType::Sync),
            2 => Some(MsgType::Response),
            _ => None,
        }
    }
}

/// Parsed 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub little_endian: bool,
    pub msg_type: MsgType,
    pub compressed: bool,
    /// Total message length including the header itself.
    pub length: u32,
}

/// Pack a header for an outgoing message. The client always writes
/// little-endian.
pub fn pack_header(msg_type: MsgType, total_length: u32) -> [u8; 8] {
    let len = total_length.to_le_bytes();
    [
        LITTLE_ENDIAN,
        msg_type.as_byte(),
        0,
        0,
        len[0],
        len[1],
        len[2],
        len[3],
    ]
}

/// Parse an incoming header, honoring the server's declared endianness.
pub fn unpack_header(data: &[u8]) -> Result<Header> {
    if data.len() < HEADER_SIZE {
        return Err(Error::deserialize(format!(
            "header too short: {} < {HEADER_SIZE}",
            data.len()
        )));
    }
    let little_endian = data[0] == LITTLE_ENDIAN;
    let msg_type = MsgType::from_byte(data[1])
        .ok_or_else(|| Error::deserialize(format!("unknown message kind: {}", data[1])))?;
    let compressed = data[2] == 1;
    let len = [data[4], data[5], data[6], data[7]];
    let length = if little_endian {
        u32::from_le_bytes(len)
    } else {
        u32::from_be_bytes(len)
    };
    Ok(Header {
        little_endian,
        msg_type,
        compressed,
        length,
    })
}
