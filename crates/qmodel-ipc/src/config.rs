//! Connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// TLS configuration for the synchronous connection path.
///
/// By default the system trust roots verify the server certificate. Paths
/// are loaded at connect time.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Extra CA certificate (PEM) trusted for server verification.
    pub ca_cert_path: Option<PathBuf>,
    /// Client identity for mutual TLS: PKCS#8 certificate chain (PEM).
    pub client_cert_path: Option<PathBuf>,
    /// Client identity private key (PEM); required with `client_cert_path`.
    pub client_key_path: Option<PathBuf>,
    /// Skip server certificate verification. Only for development against
    /// self-signed certificates.
    pub danger_skip_verify: bool,
    /// Server name for SNI; defaults to the connection host.
    pub server_name: Option<String>,
}

impl TlsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn client_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_cert_path = Some(path.into());
        self
    }

    pub fn client_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_key_path = Some(path.into());
        self
    }

    pub fn skip_verify(mut self, skip: bool) -> Self {
        self.danger_skip_verify = skip;
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn has_client_cert(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }
}

/// Parameters for a single server connection.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Hostname or IP address.
    pub host: String,
    /// Port number.
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Applied to connect and to every read/write.
    pub timeout: Option<Duration>,
    /// TLS settings; `None` for a plain TCP connection.
    pub tls: Option<TlsOptions>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5000,
            username: String::new(),
            password: String::new(),
            timeout: None,
            tls: None,
        }
    }
}

impl ConnectConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tls(mut self, options: TlsOptions) -> Self {
        self.tls = Some(options);
        self
    }

    /// `host:port` for connect and log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let config = ConnectConfig::new("kdb.example.com", 5010)
            .credentials("u", "p")
            .timeout(Duration::from_secs(5))
            .tls(TlsOptions::new().skip_verify(true));
        assert_eq!(config.address(), "kdb.example.com:5010");
        assert_eq!(config.username, "u");
        assert!(config.tls.unwrap().danger_skip_verify);
    }

    #[test]
    fn client_cert_needs_both_halves() {
        let tls = TlsOptions::new().client_cert("/c.pem");
        assert!(!tls.has_client_cert());
        let tls = tls.client_key("/k.pem");
        assert!(tls.has_client_cert());
    }
}
