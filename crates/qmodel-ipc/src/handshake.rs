//! IPC handshake and capability negotiation.
//!
//! After the TCP (and optional TLS) connect, the client sends
//! `"user:password"` followed by a capability byte and a NUL terminator;
//! the server answers with a single byte carrying the negotiated capability
//! level. A server that closes the socket without replying has rejected the
//! credentials.

use qmodel_core::{Error, Result};

/// Capability requesting the current framed, compression-capable protocol.
pub const CAPABILITY: u8 = 3;

/// Build the handshake payload.
pub fn build_handshake(username: &str, password: &str, capability: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(username.len() + password.len() + 3);
    if !username.is_empty() || !password.is_empty() {
        out.extend_from_slice(username.as_bytes());
        out.push(b':');
        out.extend_from_slice(password.as_bytes());
    }
    out.push(capability);
    out.push(0);
    out
}

/// Parse the server's reply. Empty means the credentials were rejected.
pub fn parse_handshake_response(data: &[u8]) -> Result<u8> {
    match data.len() {
        0 => Err(Error::authentication(
            "connection rejected by server (empty response)",
        )),
        1 => Ok(data[0]),
        n => Err(Error::handshake(format!(
            "unexpected handshake response length: {n}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_and_capability() {
        assert_eq!(build_handshake("u", "p", CAPABILITY), b"u:p\x03\x00");
        assert_eq!(
            build_handshake("trader", "s3cret", 6),
            b"trader:s3cret\x06\x00"
        );
    }

    #[test]
    fn anonymous_handshake_omits_credentials() {
        assert_eq!(build_handshake("", "", CAPABILITY), b"\x03\x00");
    }

    #[test]
    fn response_parsing() {
        assert_eq!(parse_handshake_response(&[6]).unwrap(), 6);
        assert!(matches!(
            parse_handshake_response(&[]),
            Err(Error::Connection(e))
                if e.kind == qmodel_core::ConnectionErrorKind::Authentication
        ));
        assert!(matches!(
            parse_handshake_response(&[1, 2]),
            Err(Error::Connection(e))
                if e.kind == qmodel_core::ConnectionErrorKind::Handshake
        ));
    }
}
