//! CSV-based registry node loading.
//!
//! Registry nodes come from `{market}_{env}.csv` in the caller-supplied
//! data directory. Columns, headers required:
//! `dataset,cluster,dbtype,node,host,port,port_env,env`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use qmodel_core::{Error, Result};

pub(crate) const REQUIRED_COLUMNS: &[&str] = &[
    "dataset", "cluster", "dbtype", "node", "host", "port", "port_env", "env",
];

/// One registry node parsed from a CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryNode {
    pub dataset: String,
    pub cluster: String,
    pub dbtype: String,
    pub node: String,
    pub host: String,
    pub port: u16,
    pub port_env: String,
    pub env: String,
}

/// Load registry nodes for a market/environment pair.
pub fn load_registry_nodes(
    market: &str,
    env: &str,
    data_dir: impl AsRef<Path>,
) -> Result<Vec<RegistryNode>> {
    let filename = format!("{}_{}.csv", market.to_lowercase(), env.to_lowercase());
    let path = data_dir.as_ref().join(&filename);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| Error::discovery_config(format!("registry CSV not found: {path:?}")))?;
    parse_csv(&text, &filename)
}

pub(crate) fn parse_csv(text: &str, filename: &str) -> Result<Vec<RegistryNode>> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| Error::discovery_config(format!("registry CSV is empty: {filename}")))?;
    let columns: Vec<String> = header
        .split(',')
        .map(|c| c.trim().to_lowercase())
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !columns.iter().any(|c| c == *required))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(Error::discovery_config(format!(
            "registry CSV {filename} missing columns: {}",
            missing.join(", ")
        )));
    }

    let index = |name: &str| columns.iter().position(|c| c == name).expect("checked");
    let (dataset_i, cluster_i, dbtype_i, node_i) = (
        index("dataset"),
        index("cluster"),
        index("dbtype"),
        index("node"),
    );
    let (host_i, port_i, port_env_i, env_i) =
        (index("host"), index("port"), index("port_env"), index("env"));

    let mut nodes = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < columns.len() {
            return Err(Error::discovery_config(format!(
                "malformed row {} in {filename}: expected {} fields, got {}",
                line_no + 2,
                columns.len(),
                fields.len()
            )));
        }
        let port: u16 = fields[port_i].parse().map_err(|_| {
            Error::discovery_config(format!(
                "malformed row {} in {filename}: bad port {:?}",
                line_no + 2,
                fields[port_i]
            ))
        })?;
        nodes.push(RegistryNode {
            dataset: fields[dataset_i].to_string(),
            cluster: fields[cluster_i].to_string(),
            dbtype: fields[dbtype_i].to_string(),
            node: fields[node_i].to_string(),
            host: fields[host_i].to_string(),
            port,
            port_env: fields[port_env_i].to_string(),
            env: fields[env_i].to_string(),
        });
    }

    if nodes.is_empty() {
        return Err(Error::discovery_config(format!(
            "registry CSV has no data rows: {filename}"
        )));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
dataset,cluster,dbtype,node,host,port,port_env,env
QNS,REG,GW,1,qns-a.internal,5100,QNS_PORT,prod
QNS,REG,GW,2,qns-b.internal,5100,QNS_PORT,prod
";

    #[test]
    fn parses_well_formed_csv() {
        let nodes = parse_csv(SAMPLE, "fx_prod.csv").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].host, "qns-a.internal");
        assert_eq!(nodes[0].port, 5100);
        assert_eq!(nodes[1].node, "2");
    }

    #[test]
    fn missing_column_is_a_config_error() {
        let text = "dataset,cluster,dbtype,node,host,port\nA,B,C,1,h,1\n";
        let err = parse_csv(text, "x.csv").unwrap_err();
        assert!(format!("{err}").contains("missing columns"));
    }

    #[test]
    fn empty_and_header_only_files_are_rejected() {
        assert!(parse_csv("", "x.csv").is_err());
        assert!(parse_csv(
            "dataset,cluster,dbtype,node,host,port,port_env,env\n",
            "x.csv"
        )
        .is_err());
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let text = "dataset,cluster,dbtype,node,host,port,port_env,env\nA,B,C,1,h,nope,P,prod\n";
        let err = parse_csv(text, "x.csv").unwrap_err();
        assert!(format!("{err}").contains("bad port"));
    }

    #[test]
    fn header_case_and_spacing_are_normalized() {
        let text = "Dataset, Cluster ,DBTYPE,node,Host,PORT,port_env,Env\nA,B,C,1,h,9,P,prod\n";
        let nodes = parse_csv(text, "x.csv").unwrap();
        assert_eq!(nodes[0].port, 9);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_registry_nodes("fx", "prod", "/definitely/missing").unwrap_err();
        assert!(format!("{err}").contains("not found"));
    }
}
