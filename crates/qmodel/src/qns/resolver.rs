//! Registry query building, response parsing, and node failover.

use qmodel_core::{Error, Result, ResultSet, Value};
use qmodel_session::{QueryResult, Session};

use crate::engine::Engine;
use crate::qns::registry::RegistryNode;
use crate::qns::ServiceInfo;

/// Expression querying the name service: `.qns.svcs` with symbol prefixes,
/// or `.qns.registry` for the full listing.
pub(crate) fn build_svcs_query(prefixes: &[&str]) -> String {
    if prefixes.is_empty() {
        return ".qns.registry".to_string();
    }
    let syms: String = prefixes.iter().map(|p| format!("`{p}")).collect();
    format!(".qns.svcs{syms}")
}

/// Parse the registry reply (a table) into service rows.
pub(crate) fn parse_service_rows(result: QueryResult) -> Result<Vec<ServiceInfo>> {
    let rows: ResultSet = match result {
        QueryResult::Rows(rows) => rows,
        QueryResult::Value(other) => {
            return Err(Error::discovery_registry(format!(
                "unexpected registry response shape: {other:?}"
            )))
        }
    };

    let text = |value: Option<Value>| -> String {
        value
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let number = |value: Option<Value>| -> u16 {
        value
            .as_ref()
            .and_then(Value::as_long)
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or_default()
    };

    let mut services = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        services.push(ServiceInfo {
            dataset: text(row.get("dataset")),
            cluster: text(row.get("cluster")),
            dbtype: text(row.get("dbtype")),
            node: text(row.get("node")),
            host: text(row.get("host")),
            port: number(row.get("port")),
            ssl: text(row.get("ssl")),
            ip: text(row.get("ip")),
            env: text(row.get("env")),
        });
    }
    Ok(services)
}

/// Query the registry nodes in order, returning the first successful
/// parse. Every node failing is a registry error carrying each failure.
pub(crate) fn resolve_services(
    nodes: &[RegistryNode],
    prefixes: &[&str],
    username: &str,
    password: &str,
    timeout: std::time::Duration,
) -> Result<Vec<ServiceInfo>> {
    let query = build_svcs_query(prefixes);
    let mut failures = Vec::new();

    for node in nodes {
        let engine = Engine::new(node.host.clone(), node.port)
            .credentials(username, password)
            .timeout(timeout);
        let attempt = engine
            .session()
            .and_then(|mut session: Session| session.raw(&query, &[]))
            .and_then(parse_service_rows);
        match attempt {
            Ok(services) => return Ok(services),
            Err(e) => {
                tracing::warn!(
                    node = %format!("{}:{}", node.host, node.port),
                    error = %e,
                    "registry node failed"
                );
                failures.push(format!("{}:{}: {e}", node.host, node.port));
            }
        }
    }

    Err(Error::discovery_registry(format!(
        "all {} registry node(s) unreachable: {}",
        nodes.len(),
        failures.join("; ")
    )))
}
