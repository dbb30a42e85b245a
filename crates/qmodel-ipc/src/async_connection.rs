//! Cooperative (async) connection.
//!
//! Same framing and codec as the blocking path; send/receive yield at I/O
//! boundaries and honor cancellation at every suspension point. One request
//! is in flight per connection at a time.

#![allow(clippy::manual_async_fn)]

use std::net::ToSocketAddrs;
use std::time::Duration;

use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::TcpStream;
use asupersync::{Cx, Outcome};

use qmodel_core::{Error, Value};

use crate::config::ConnectConfig;
use crate::connection::call_form;
use crate::handshake::{build_handshake, parse_handshake_response, CAPABILITY};
use crate::protocol::{decode_message, unpack_header, MsgType, Serializer, HEADER_SIZE};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Asynchronous connection over the asupersync runtime.
pub struct AsyncConnection {
    config: ConnectConfig,
    stream: Option<TcpStream>,
    serializer: Serializer,
    capability: u8,
    broken: bool,
}

impl std::fmt::Debug for AsyncConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncConnection")
            .field("address", &self.config.address())
            .field("open", &self.stream.is_some())
            .field("broken", &self.broken)
            .finish()
    }
}

impl AsyncConnection {
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            config,
            stream: None,
            serializer: Serializer::new(),
            capability: 0,
            broken: false,
        }
    }

    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some() && !self.broken
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn capability(&self) -> u8 {
        self.capability
    }

    /// Connect and perform the handshake. TLS is not offered on the async
    /// path; use the blocking connection for TLS-required deployments.
    pub async fn open(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.stream.is_some() {
            return Outcome::Ok(());
        }
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        if self.config.tls.is_some() {
            return Outcome::Err(Error::tls(
                "TLS is only available on the blocking connection",
            ));
        }

        let address = self.config.address();
        let addr = match (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
        {
            Some(a) => a,
            None => {
                return Outcome::Err(Error::connect(format!(
                    "cannot resolve {address}"
                )))
            }
        };

        let timeout = self.config.timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let mut stream = match TcpStream::connect_timeout(addr, timeout).await {
            Ok(s) => s,
            Err(e) => {
                return Outcome::Err(Error::connect_io(
                    format!("cannot connect to {address}"),
                    e,
                ))
            }
        };
        stream.set_nodelay(true).ok();

        let payload = build_handshake(&self.config.username, &self.config.password, CAPABILITY);
        if let Err(e) = write_all_async(&mut stream, &payload).await {
            return Outcome::Err(Error::handshake(format!("cannot send handshake: {e}")));
        }

        let mut reply = [0u8; 1];
        match read_some_async(&mut stream, &mut reply).await {
            Ok(0) => {
                return Outcome::Err(Error::authentication(
                    "connection rejected by server (empty response)",
                ))
            }
            Ok(_) => match parse_handshake_response(&reply) {
                Ok(capability) => self.capability = capability,
                Err(e) => return Outcome::Err(e),
            },
            Err(e) => {
                return Outcome::Err(Error::handshake(format!("handshake read failed: {e}")))
            }
        }

        self.stream = Some(stream);
        self.broken = false;
        tracing::debug!(address = %address, capability = self.capability, "async connection open");
        Outcome::Ok(())
    }

    pub async fn close(&mut self) -> Outcome<(), Error> {
        self.stream = None;
        self.capability = 0;
        Outcome::Ok(())
    }

    pub async fn send(
        &mut self,
        cx: &Cx,
        value: &Value,
        msg_type: MsgType,
    ) -> Outcome<(), Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let data = match self.serializer.serialize_message(value, msg_type) {
            Ok(d) => d,
            Err(e) => return Outcome::Err(e),
        };
        let Some(stream) = self.stream.as_mut() else {
            return Outcome::Err(Error::disconnected("connection is not open"));
        };
        match write_all_async(stream, &data).await {
            Ok(()) => Outcome::Ok(()),
            Err(e) => {
                self.broken = true;
                Outcome::Err(map_io("write", e))
            }
        }
    }

    pub async fn receive(&mut self, cx: &Cx) -> Outcome<(MsgType, Value), Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Outcome::Err(Error::disconnected("connection is not open"));
        };

        let mut header = [0u8; HEADER_SIZE];
        if let Err(e) = read_exact_async(stream, &mut header).await {
            self.broken = true;
            return Outcome::Err(map_io("read header", e));
        }
        let parsed = match unpack_header(&header) {
            Ok(h) => h,
            Err(e) => {
                self.broken = true;
                return Outcome::Err(e);
            }
        };
        if (parsed.length as usize) < HEADER_SIZE {
            self.broken = true;
            return Outcome::Err(Error::deserialize(format!(
                "frame declares length {}",
                parsed.length
            )));
        }

        let mut message = vec![0u8; parsed.length as usize];
        message[..HEADER_SIZE].copy_from_slice(&header);
        if let Err(e) = read_exact_async(stream, &mut message[HEADER_SIZE..]).await {
            self.broken = true;
            return Outcome::Err(map_io("read body", e));
        }

        match decode_message(&message) {
            Ok(decoded) => Outcome::Ok(decoded),
            Err(Error::Q(q)) => Outcome::Err(Error::Q(q)),
            Err(e) => {
                self.broken = true;
                Outcome::Err(e)
            }
        }
    }

    /// Send an expression (call form with args) and await the reply.
    pub async fn query(
        &mut self,
        cx: &Cx,
        expr: &str,
        args: &[Value],
    ) -> Outcome<Value, Error> {
        let request = call_form(expr, args);
        match self.send(cx, &request, MsgType::Sync).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        match self.receive(cx).await {
            Outcome::Ok((_, value)) => Outcome::Ok(value),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    pub async fn ping(&mut self, cx: &Cx) -> bool {
        if self.stream.is_none() || self.broken {
            return false;
        }
        matches!(self.query(cx, "1b", &[]).await, Outcome::Ok(Value::Bool(true)))
    }
}

// ==================== I/O helpers ====================

async fn write_all_async(stream: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    let mut written = 0;
    while written < data.len() {
        let n = std::future::poll_fn(|cx| {
            std::pin::Pin::new(&mut *stream).poll_write(cx, &data[written..])
        })
        .await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "connection closed while writing",
            ));
        }
        written += n;
    }
    std::future::poll_fn(|cx| std::pin::Pin::new(&mut *stream).poll_flush(cx)).await
}

async fn read_exact_async(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<()> {
    let mut read = 0;
    while read < buf.len() {
        let mut read_buf = ReadBuf::new(&mut buf[read..]);
        std::future::poll_fn(|cx| std::pin::Pin::new(&mut *stream).poll_read(cx, &mut read_buf))
            .await?;
        let n = read_buf.filled().len();
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }
        read += n;
    }
    Ok(())
}

/// One read; 0 means the peer closed cleanly.
async fn read_some_async(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut read_buf = ReadBuf::new(buf);
    std::future::poll_fn(|cx| std::pin::Pin::new(&mut *stream).poll_read(cx, &mut read_buf))
        .await?;
    Ok(read_buf.filled().len())
}

fn map_io(context: &str, e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            Error::timeout(format!("{context} timed out"))
        }
        _ => Error::Connection(
            qmodel_core::ConnectionError::new(
                qmodel_core::ConnectionErrorKind::Disconnected,
                format!("{context} failed: {e}"),
            )
            .with_source(e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_connection_reports_state() {
        let conn = AsyncConnection::new(ConnectConfig::new("localhost", 5000));
        assert!(!conn.is_open());
        assert!(!conn.is_broken());
        assert_eq!(conn.capability(), 0);
    }
}
