//! Error taxonomy for the whole stack.
//!
//! One top-level [`Error`] enum with a struct per family, each carrying a
//! `kind`, a one-line message, and an optional source. The connection family
//! is the only one retried by default; a server-raised [`QError`] is never
//! retried.

use std::error::Error as StdError;
use std::fmt;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error family, used by retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Connection,
    Codec,
    Query,
    Server,
    Model,
    Pool,
    Discovery,
}

/// Top-level error for all qmodel operations.
#[derive(Debug)]
pub enum Error {
    Connection(ConnectionError),
    Codec(CodecError),
    Query(QueryError),
    /// Error raised by the server process (`-128` response).
    Q(QError),
    Model(ModelError),
    Pool(PoolError),
    Discovery(DiscoveryError),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Connection(_) => ErrorClass::Connection,
            Error::Codec(_) => ErrorClass::Codec,
            Error::Query(_) => ErrorClass::Query,
            Error::Q(_) => ErrorClass::Server,
            Error::Model(_) => ErrorClass::Model,
            Error::Pool(_) => ErrorClass::Pool,
            Error::Discovery(_) => ErrorClass::Discovery,
        }
    }

    // ---- connection family ----

    pub fn connect(message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::new(ConnectionErrorKind::Connect, message))
    }

    pub fn connect_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Connection(
            ConnectionError::new(ConnectionErrorKind::Connect, message).with_source(source),
        )
    }

    pub fn handshake(message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::new(
            ConnectionErrorKind::Handshake,
            message,
        ))
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::new(
            ConnectionErrorKind::Authentication,
            message,
        ))
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::new(ConnectionErrorKind::Tls, message))
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::new(
            ConnectionErrorKind::Disconnected,
            message,
        ))
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError::new(ConnectionErrorKind::Timeout, message))
    }

    // ---- codec family ----

    pub fn serialize(message: impl Into<String>) -> Self {
        Error::Codec(CodecError {
            kind: CodecErrorKind::Serialize,
            message: message.into(),
        })
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        Error::Codec(CodecError {
            kind: CodecErrorKind::Deserialize,
            message: message.into(),
        })
    }

    // ---- query / server ----

    pub fn query(message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            message: message.into(),
        })
    }

    pub fn q(message: impl Into<String>) -> Self {
        Error::Q(QError {
            message: message.into(),
        })
    }

    // ---- model family ----

    pub fn model(message: impl Into<String>) -> Self {
        Error::Model(ModelError {
            kind: ModelErrorKind::Definition,
            message: message.into(),
        })
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::Model(ModelError {
            kind: ModelErrorKind::Schema,
            message: message.into(),
        })
    }

    pub fn reflection(message: impl Into<String>) -> Self {
        Error::Model(ModelError {
            kind: ModelErrorKind::Reflection,
            message: message.into(),
        })
    }

    pub fn engine_not_found(message: impl Into<String>) -> Self {
        Error::Model(ModelError {
            kind: ModelErrorKind::EngineNotFound,
            message: message.into(),
        })
    }

    // ---- pool family ----

    pub fn pool_closed(message: impl Into<String>) -> Self {
        Error::Pool(PoolError {
            kind: PoolErrorKind::Closed,
            message: message.into(),
        })
    }

    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Error::Pool(PoolError {
            kind: PoolErrorKind::Exhausted,
            message: message.into(),
        })
    }

    // ---- discovery family ----

    pub fn discovery_config(message: impl Into<String>) -> Self {
        Error::Discovery(DiscoveryError {
            kind: DiscoveryErrorKind::Config,
            message: message.into(),
        })
    }

    pub fn discovery_registry(message: impl Into<String>) -> Self {
        Error::Discovery(DiscoveryError {
            kind: DiscoveryErrorKind::Registry,
            message: message.into(),
        })
    }

    pub fn service_not_found(message: impl Into<String>) -> Self {
        Error::Discovery(DiscoveryError {
            kind: DiscoveryErrorKind::ServiceNotFound,
            message: message.into(),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "{e}"),
            Error::Codec(e) => write!(f, "{e}"),
            Error::Query(e) => write!(f, "query error: {}", e.message),
            Error::Q(e) => write!(f, "{e}"),
            Error::Model(e) => write!(f, "{e}"),
            Error::Pool(e) => write!(f, "{e}"),
            Error::Discovery(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_ref()
                .map(|s| -> &(dyn StdError + 'static) { &**s }),
            _ => None,
        }
    }
}

// ==================== Connection family ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    /// TCP connect failed or address was invalid.
    Connect,
    /// Handshake response was malformed or truncated.
    Handshake,
    /// Server rejected the credentials (closed without replying).
    Authentication,
    /// TLS negotiation or configuration failed.
    Tls,
    /// Peer closed or the socket broke mid-operation.
    Disconnected,
    /// An I/O deadline expired.
    Timeout,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConnectionErrorKind::Connect => "connect",
            ConnectionErrorKind::Handshake => "handshake",
            ConnectionErrorKind::Authentication => "authentication",
            ConnectionErrorKind::Tls => "tls",
            ConnectionErrorKind::Disconnected => "disconnected",
            ConnectionErrorKind::Timeout => "timeout",
        };
        write!(f, "connection error ({kind}): {}", self.message)
    }
}

// ==================== Codec family ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecErrorKind {
    Serialize,
    Deserialize,
}

#[derive(Debug)]
pub struct CodecError {
    pub kind: CodecErrorKind,
    pub message: String,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CodecErrorKind::Serialize => write!(f, "serialization error: {}", self.message),
            CodecErrorKind::Deserialize => write!(f, "deserialization error: {}", self.message),
        }
    }
}

// ==================== Query / server ====================

#[derive(Debug)]
pub struct QueryError {
    pub message: String,
}

/// Error string raised by the server process, delivered as a `-128` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QError {
    pub message: String,
}

impl fmt::Display for QError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q error: {}", self.message)
    }
}

// ==================== Model family ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelErrorKind {
    Definition,
    Schema,
    Reflection,
    EngineNotFound,
}

#[derive(Debug)]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ModelErrorKind::Definition => "model",
            ModelErrorKind::Schema => "schema",
            ModelErrorKind::Reflection => "reflection",
            ModelErrorKind::EngineNotFound => "engine",
        };
        write!(f, "{kind} error: {}", self.message)
    }
}

// ==================== Pool family ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolErrorKind {
    Closed,
    Exhausted,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PoolErrorKind::Closed => write!(f, "pool closed: {}", self.message),
            PoolErrorKind::Exhausted => write!(f, "pool exhausted: {}", self.message),
        }
    }
}

// ==================== Discovery family ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryErrorKind {
    /// Registry CSV missing, empty, malformed, or a bad service name.
    Config,
    /// All registry nodes unreachable.
    Registry,
    /// No service matched the lookup.
    ServiceNotFound,
}

#[derive(Debug)]
pub struct DiscoveryError {
    pub kind: DiscoveryErrorKind,
    pub message: String,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DiscoveryErrorKind::Config => "config",
            DiscoveryErrorKind::Registry => "registry",
            DiscoveryErrorKind::ServiceNotFound => "service",
        };
        write!(f, "discovery error ({kind}): {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_partition_the_taxonomy() {
        assert_eq!(Error::connect("x").class(), ErrorClass::Connection);
        assert_eq!(Error::authentication("x").class(), ErrorClass::Connection);
        assert_eq!(Error::deserialize("x").class(), ErrorClass::Codec);
        assert_eq!(Error::q("type").class(), ErrorClass::Server);
        assert_eq!(Error::pool_exhausted("x").class(), ErrorClass::Pool);
        assert_eq!(Error::service_not_found("x").class(), ErrorClass::Discovery);
    }

    #[test]
    fn display_carries_context() {
        let err = Error::authentication("connection rejected (empty response)");
        let text = format!("{err}");
        assert!(text.contains("authentication"));
        assert!(text.contains("rejected"));

        let err = Error::q("'type");
        assert_eq!(format!("{err}"), "q error: 'type");
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::connect_io("cannot reach host", io);
        assert!(err.source().is_some());
    }
}
