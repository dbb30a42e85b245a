//! TLS support for the synchronous connection path.
//!
//! The socket is wrapped after TCP connect and before the IPC handshake.
//! Verification uses the system trust roots, optionally extended with a
//! custom CA; `danger_skip_verify` disables verification for development
//! against self-signed certificates. A client identity (PKCS#8 PEM pair)
//! enables mutual TLS.

use std::net::TcpStream;

use native_tls::{Certificate, Identity, TlsConnector, TlsStream};
use qmodel_core::{Error, Result};

use crate::config::TlsOptions;

/// Validate a TLS configuration before any I/O happens.
pub fn validate_tls_options(options: &TlsOptions) -> Result<()> {
    if options.client_cert_path.is_some() && options.client_key_path.is_none() {
        return Err(Error::tls(
            "client certificate provided without client key; both are required for mutual TLS",
        ));
    }
    if options.client_key_path.is_some() && options.client_cert_path.is_none() {
        return Err(Error::tls(
            "client key provided without client certificate; both are required for mutual TLS",
        ));
    }
    Ok(())
}

/// Build a connector from the options.
pub fn build_connector(options: &TlsOptions) -> Result<TlsConnector> {
    validate_tls_options(options)?;

    let mut builder = TlsConnector::builder();

    if let Some(path) = &options.ca_cert_path {
        let pem = std::fs::read(path)
            .map_err(|e| Error::tls(format!("cannot read CA certificate {path:?}: {e}")))?;
        let cert = Certificate::from_pem(&pem)
            .map_err(|e| Error::tls(format!("invalid CA certificate {path:?}: {e}")))?;
        builder.add_root_certificate(cert);
    }

    if options.has_client_cert() {
        let cert_path = options.client_cert_path.as_ref().expect("checked above");
        let key_path = options.client_key_path.as_ref().expect("checked above");
        let cert = std::fs::read(cert_path)
            .map_err(|e| Error::tls(format!("cannot read client certificate {cert_path:?}: {e}")))?;
        let key = std::fs::read(key_path)
            .map_err(|e| Error::tls(format!("cannot read client key {key_path:?}: {e}")))?;
        let identity = Identity::from_pkcs8(&cert, &key)
            .map_err(|e| Error::tls(format!("invalid client identity: {e}")))?;
        builder.identity(identity);
    }

    if options.danger_skip_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }

    builder
        .build()
        .map_err(|e| Error::tls(format!("cannot build TLS connector: {e}")))
}

/// Wrap a connected TCP stream in TLS.
pub fn wrap_stream(
    options: &TlsOptions,
    host: &str,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let connector = build_connector(options)?;
    let server_name = options.server_name.as_deref().unwrap_or(host);
    connector
        .connect(server_name, stream)
        .map_err(|e| Error::tls(format!("TLS handshake with {host} failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_cert_without_key_is_invalid() {
        let options = TlsOptions::new().client_cert("/cert.pem");
        assert!(validate_tls_options(&options).is_err());

        let options = TlsOptions::new().client_key("/key.pem");
        assert!(validate_tls_options(&options).is_err());

        let options = TlsOptions::new()
            .client_cert("/cert.pem")
            .client_key("/key.pem");
        assert!(validate_tls_options(&options).is_ok());
    }

    #[test]
    fn missing_ca_file_surfaces_as_tls_error() {
        let options = TlsOptions::new().ca_cert("/definitely/not/here.pem");
        let err = build_connector(&options).unwrap_err();
        assert!(format!("{err}").contains("tls"));
    }

    #[test]
    fn default_connector_builds() {
        assert!(build_connector(&TlsOptions::new()).is_ok());
    }
}
