//! Wire codec and transports for qmodel.
//!
//! This crate owns everything that touches bytes: the IPC frame, the
//! value serializer and deserializer, the LZ decompression path the server
//! applies to large payloads, the credential handshake, and the blocking
//! and cooperative connections (plus the subscription listener built on the
//! latter). The codec is I/O-agnostic; both transports drive the same
//! implementation.

pub mod async_connection;
pub mod config;
pub mod connection;
pub mod handshake;
pub mod protocol;
pub mod subscription;
pub mod tls;

pub use async_connection::AsyncConnection;
pub use config::{ConnectConfig, TlsOptions};
pub use connection::{call_form, SyncConnection};
pub use protocol::{
    compress::{compress, compress_message, decompress},
    decode_message, decode_payload, pack_header, unpack_header, Header, MsgType, Serializer,
    HEADER_SIZE,
};
pub use subscription::Subscriber;
