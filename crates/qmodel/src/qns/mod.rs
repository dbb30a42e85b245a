//! Service discovery: name-service lookup with registry-node failover.
//!
//! Registry endpoints load from a per-market/environment CSV; lookups run
//! against each node in order until one answers. Discovered services
//! resolve to engines, carrying the caller's credentials and the service's
//! TLS flag.

pub mod registry;
mod resolver;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use qmodel_core::{Error, Result};
use qmodel_ipc::TlsOptions;

use crate::engine::Engine;
use self::registry::{load_registry_nodes, RegistryNode};

/// Discovered service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub dataset: String,
    pub cluster: String,
    pub dbtype: String,
    pub node: String,
    pub host: String,
    pub port: u16,
    pub ssl: String,
    pub ip: String,
    pub env: String,
}

impl ServiceInfo {
    /// Whether the service expects TLS.
    pub fn tls(&self) -> bool {
        self.ssl.eq_ignore_ascii_case("tls")
    }

    /// Fully-qualified name: `DATASET.CLUSTER.DBTYPE.NODE`.
    pub fn fqn(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.dataset, self.cluster, self.dbtype, self.node
        )
    }
}

/// Name-service client for one market/environment.
///
/// ```ignore
/// let qns = Qns::new("fx", "prod", "./qns-data")?.credentials("user", "pass");
/// let services = qns.lookup(&["EMR", "SER", "H"])?;
/// let engine = qns.engine("EMRATESCV.SERVICE.HDB.1")?;
/// ```
#[derive(Debug, Clone)]
pub struct Qns {
    market: String,
    env: String,
    username: String,
    password: String,
    timeout: Duration,
    nodes: Vec<RegistryNode>,
}

impl Qns {
    /// Load the registry CSV for `market`/`env` from `data_dir`.
    pub fn new(market: &str, env: &str, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let nodes = load_registry_nodes(market, env, data_dir.into())?;
        Ok(Self {
            market: market.to_string(),
            env: env.to_string(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(10),
            nodes,
        })
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn registry_nodes(&self) -> &[RegistryNode] {
        &self.nodes
    }

    /// Query the registry and return matching services. Prefixes filter by
    /// dataset, cluster, then dbtype; no prefixes lists everything.
    pub fn lookup(&self, prefixes: &[&str]) -> Result<Vec<ServiceInfo>> {
        let services = resolver::resolve_services(
            &self.nodes,
            prefixes,
            &self.username,
            &self.password,
            self.timeout,
        )?;
        if services.is_empty() {
            return Err(Error::service_not_found(format!(
                "no services match prefix: {}",
                if prefixes.is_empty() {
                    "(all)".to_string()
                } else {
                    prefixes.join(".")
                }
            )));
        }
        Ok(services)
    }

    /// Resolve an exact `DATASET.CLUSTER.DBTYPE.NODE` name to an engine.
    pub fn engine(&self, service_name: &str) -> Result<Engine> {
        let parts: Vec<&str> = service_name.split('.').collect();
        if parts.len() != 4 {
            return Err(Error::discovery_config(format!(
                "service name must be DATASET.CLUSTER.DBTYPE.NODE, got {} part(s): {service_name:?}",
                parts.len()
            )));
        }
        let services = self.lookup(&parts[..3])?;
        services
            .iter()
            .find(|svc| svc.fqn() == service_name)
            .map(|svc| self.build_engine(svc))
            .ok_or_else(|| {
                Error::service_not_found(format!("service not found: {service_name:?}"))
            })
    }

    /// Resolve every matching service to an engine, e.g. for failover or
    /// round-robin pools.
    pub fn engines(&self, prefixes: &[&str]) -> Result<Vec<Engine>> {
        Ok(self
            .lookup(prefixes)?
            .iter()
            .map(|svc| self.build_engine(svc))
            .collect())
    }

    fn build_engine(&self, svc: &ServiceInfo) -> Engine {
        let mut engine = Engine::new(svc.host.clone(), svc.port)
            .credentials(self.username.clone(), self.password.clone())
            .timeout(self.timeout);
        if svc.tls() {
            engine = engine.tls(TlsOptions::new());
        }
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qns_with_nodes() -> Qns {
        Qns {
            market: "fx".into(),
            env: "prod".into(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_millis(100),
            nodes: vec![RegistryNode {
                dataset: "QNS".into(),
                cluster: "REG".into(),
                dbtype: "GW".into(),
                node: "1".into(),
                host: "127.0.0.1".into(),
                port: 1, // nothing listens here
                port_env: String::new(),
                env: "prod".into(),
            }],
        }
    }

    #[test]
    fn bad_service_name_shape_is_a_config_error() {
        let qns = qns_with_nodes();
        let err = qns.engine("ONLY.THREE.PARTS").unwrap_err();
        assert!(format!("{err}").contains("4 part(s)") || format!("{err}").contains("3 part(s)"));
    }

    #[test]
    fn unreachable_nodes_surface_as_registry_error() {
        let qns = qns_with_nodes();
        let err = qns.lookup(&["A"]).unwrap_err();
        assert!(format!("{err}").contains("unreachable"));
    }

    #[test]
    fn service_info_fqn_and_tls() {
        let svc = ServiceInfo {
            dataset: "EMR".into(),
            cluster: "SER".into(),
            dbtype: "HDB".into(),
            node: "2".into(),
            host: "h".into(),
            port: 1,
            ssl: "TLS".into(),
            ip: String::new(),
            env: "prod".into(),
        };
        assert_eq!(svc.fqn(), "EMR.SER.HDB.2");
        assert!(svc.tls());
    }
}
