//! Blocking connection to a server process.
//!
//! Lifecycle: `Closed -> Handshaking -> Open`, with `Open -> Broken` on any
//! I/O or decode failure. A broken connection is never reused; the pool and
//! the session replace it.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use qmodel_core::{Error, Result, Value};

use crate::config::ConnectConfig;
use crate::handshake::{build_handshake, parse_handshake_response, CAPABILITY};
use crate::protocol::{decode_message, unpack_header, MsgType, Serializer, HEADER_SIZE};
use crate::tls;

enum Stream {
    Plain(TcpStream),
    Tls(Box<native_tls::TlsStream<TcpStream>>),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

/// Synchronous (blocking) connection.
pub struct SyncConnection {
    config: ConnectConfig,
    stream: Option<Stream>,
    serializer: Serializer,
    capability: u8,
    broken: bool,
}

impl std::fmt::Debug for SyncConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConnection")
            .field("address", &self.config.address())
            .field("open", &self.stream.is_some())
            .field("broken", &self.broken)
            .field("capability", &self.capability)
            .finish()
    }
}

impl SyncConnection {
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

    /// Negotiated capability byte; 0 before the handshake.
    pub fn capability(&self) -> u8 {
        self.capability
    }

    /// Connect, wrap in TLS when configured, and perform the handshake.
    pub fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let address = self.config.address();
        let tcp = self.connect_tcp(&address)?;
        tcp.set_nodelay(true).ok();
        tcp.set_read_timeout(self.config.timeout).ok();
        tcp.set_write_timeout(self.config.timeout).ok();

        let mut stream = match &self.config.tls {
            Some(options) => {
                tracing::debug!(address = %address, "wrapping connection in TLS");
                Stream::Tls(Box::new(tls::wrap_stream(options, &self.config.host, tcp)?))
            }
            None => Stream::Plain(tcp),
        };

        self.capability = Self::handshake(&mut stream, &self.config)?;
        self.stream = Some(stream);
        self.broken = false;
        tracing::debug!(
            address = %address,
            capability = self.capability,
            "connection open"
        );
        Ok(())
    }

    fn connect_tcp(&self, address: &str) -> Result<TcpStream> {
        let addrs = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| Error::connect_io(format!("cannot resolve {address}"), e))?;

        let mut last_err: Option<io::Error> = None;
        for addr in addrs {
            let attempt = match self.config.timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => Error::connect_io(format!("cannot connect to {address}"), e),
            None => Error::connect(format!("no addresses resolved for {address}")),
        })
    }

    fn handshake(stream: &mut Stream, config: &ConnectConfig) -> Result<u8> {
        let payload = build_handshake(&config.username, &config.password, CAPABILITY);
        stream
            .write_all(&payload)
            .and_then(|()| stream.flush())
            .map_err(|e| Error::handshake(format!("cannot send handshake: {e}")))?;

        let mut reply = [0u8; 1];
        match stream.read(&mut reply) {
            Ok(0) => parse_handshake_response(&[]),
            Ok(_) => parse_handshake_response(&reply),
            Err(e) if is_timeout(&e) => {
                Err(Error::handshake("timed out waiting for handshake reply"))
            }
            Err(e) => Err(Error::handshake(format!("handshake read failed: {e}"))),
        }
    }

    pub fn close(&mut self) {
        self.stream = None;
        self.capability = 0;
    }

    /// Serialize and send one value.
    pub fn send(&mut self, value: &Value, msg_type: MsgType) -> Result<()> {
        let data = self.serializer.serialize_message(value, msg_type)?;
        let stream = self.stream.as_mut().ok_or_else(not_open)?;
        stream.write_all(&data).and_then(|()| stream.flush()).map_err(|e| {
            self.broken = true;
            map_io("write", e)
        })
    }

    /// Read one framed message and decode its body.
    ///
    /// A decode failure implies the stream position is unknown; the
    /// connection is marked broken.
    pub fn receive(&mut self) -> Result<Value> {
        let stream = self.stream.as_mut().ok_or_else(not_open)?;

        let mut header = [0u8; HEADER_SIZE];
        if let Err(e) = stream.read_exact(&mut header) {
            self.broken = true;
            return Err(map_io("read header", e));
        }
        let parsed = unpack_header(&header).map_err(|e| {
            self.broken = true;
            e
        })?;
        if (parsed.length as usize) < HEADER_SIZE {
            self.broken = true;
            return Err(Error::deserialize(format!(
                "frame declares length {}",
                parsed.length
            )));
        }

        let mut message = vec![0u8; parsed.length as usize];
        message[..HEADER_SIZE].copy_from_slice(&header);
        if let Err(e) = stream.read_exact(&mut message[HEADER_SIZE..]) {
            self.broken = true;
            return Err(map_io("read body", e));
        }

        match decode_message(&message) {
            Ok((_, value)) => Ok(value),
            Err(Error::Q(q)) => Err(Error::Q(q)),
            Err(e) => {
                self.broken = true;
                Err(e)
            }
        }
    }

    /// Send an expression (with optional arguments in call form) and wait
    /// for the reply.
    pub fn query(&mut self, expr: &str, args: &[Value]) -> Result<Value> {
        let request = call_form(expr, args);
        self.send(&request, MsgType::Sync)?;
        self.receive()
    }

    /// Lightweight liveness probe.
    pub fn ping(&mut self) -> bool {
        if self.stream.is_none() || self.broken {
            return false;
        }
        matches!(self.query("1b", &[]), Ok(Value::Bool(true)))
    }
}

/// `(expr; arg1; arg2; …)` call form, or the bare expression without args.
pub fn call_form(expr: &str, args: &[Value]) -> Value {
    if args.is_empty() {
        Value::string(expr)
    } else {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(Value::string(expr));
        items.extend(args.iter().cloned());
        Value::List(items)
    }
}

fn not_open() -> Error {
    Error::disconnected("connection is not open")
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

fn map_io(context: &str, e: io::Error) -> Error {
    if is_timeout(&e) {
        Error::timeout(format!("{context} timed out"))
    } else {
        Error::Connection(
            qmodel_core::ConnectionError::new(
                qmodel_core::ConnectionErrorKind::Disconnected,
                format!("{context} failed: {e}"),
            )
            .with_source(e),
        )
    }
}
