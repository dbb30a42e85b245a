//! Engine catalogs: named registries and two-level groups.
//!
//! A registry holds the engines of one domain (e.g. the realtime and
//! historical processes of an equities plant); a group holds registries per
//! domain or environment. Registration order is preserved.

use std::collections::HashMap;

use qmodel_core::{Error, Result};
use qmodel_session::{AsyncSession, Session};

use crate::engine::{Engine, EngineConfig};

/// Named collection of engines with a default.
///
/// ```ignore
/// let mut equities = EngineRegistry::new();
/// equities.register("rdb", Engine::new("eq-rdb", 5010));
/// equities.register("hdb", Engine::new("eq-hdb", 5012));
/// let mut session = equities.session(None)?;      // default (rdb)
/// let mut hist = equities.session(Some("hdb"))?;  // explicit
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<(String, Engine)>,
    default: Option<String>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine; the first registration becomes the default.
    pub fn register(&mut self, name: impl Into<String>, engine: Engine) {
        let name = name.into();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        if let Some(slot) = self.engines.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = engine;
        } else {
            self.engines.push((name, engine));
        }
    }

    /// Engine by name, or the default with `None`.
    pub fn get(&self, name: Option<&str>) -> Result<&Engine> {
        let key = match name.or(self.default.as_deref()) {
            Some(key) => key,
            None => return Err(Error::engine_not_found("no engines registered")),
        };
        self.engines
            .iter()
            .find(|(n, _)| n == key)
            .map(|(_, e)| e)
            .ok_or_else(|| {
                let available = self
                    .engines
                    .iter()
                    .map(|(n, _)| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::engine_not_found(format!(
                    "engine '{key}' not found; available: {}",
                    if available.is_empty() { "(none)" } else { available.as_str() }
                ))
            })
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.engines.iter().any(|(n, _)| n == name) {
            return Err(Error::engine_not_found(format!(
                "engine '{name}' not registered"
            )));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn names(&self) -> Vec<&str> {
        self.engines.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Session for the named (or default) engine.
    pub fn session(&self, name: Option<&str>) -> Result<Session> {
        self.get(name)?.session()
    }

    /// Async session for the named (or default) engine.
    pub fn async_session(&self, name: Option<&str>) -> Result<AsyncSession> {
        Ok(self.get(name)?.async_session())
    }

    /// Build from name → engine-parameter maps.
    pub fn from_config(config: &HashMap<String, EngineConfig>) -> Self {
        let mut names: Vec<&String> = config.keys().collect();
        names.sort();
        let mut registry = Self::new();
        for name in names {
            registry.register(name.clone(), Engine::from(&config[name]));
        }
        registry
    }

    /// Build from name → DSN maps.
    pub fn from_dsn(dsns: &HashMap<String, String>) -> Result<Self> {
        let mut names: Vec<&String> = dsns.keys().collect();
        names.sort();
        let mut registry = Self::new();
        for name in names {
            registry.register(name.clone(), Engine::from_dsn(&dsns[name])?);
        }
        Ok(registry)
    }

    /// Build from environment variables: for each name, reads
    /// `{PREFIX}_{NAME}_{HOST,PORT,USER,PASS}` with localhost:5000
    /// fallbacks.
    pub fn from_env(names: &[&str], prefix: &str) -> Result<Self> {
        let mut registry = Self::new();
        for name in names {
            let upper = name.to_uppercase();
            let var = |suffix: &str| std::env::var(format!("{prefix}_{upper}_{suffix}")).ok();
            let host = var("HOST").unwrap_or_else(|| "localhost".to_string());
            let port: u16 = var("PORT")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .map_err(|_| {
                    Error::discovery_config(format!(
                        "invalid port in {prefix}_{upper}_PORT"
                    ))
                })?;
            let engine = Engine::new(host, port).credentials(
                var("USER").unwrap_or_default(),
                var("PASS").unwrap_or_default(),
            );
            registry.register(*name, engine);
        }
        Ok(registry)
    }
}

/// Named collection of registries (domains or environments).
#[derive(Debug, Clone, Default)]
pub struct EngineGroup {
    registries: Vec<(String, EngineRegistry)>,
}

impl EngineGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, registry: EngineRegistry) {
        let name = name.into();
        if let Some(slot) = self.registries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = registry;
        } else {
            self.registries.push((name, registry));
        }
    }

    pub fn get(&self, name: &str) -> Result<&EngineRegistry> {
        self.registries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
            .ok_or_else(|| {
                let available = self
                    .registries
                    .iter()
                    .map(|(n, _)| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::engine_not_found(format!(
                    "registry '{name}' not found; available: {}",
                    if available.is_empty() { "(none)" } else { available.as_str() }
                ))
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.registries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// `group.session("equities", Some("rdb"))`.
    pub fn session(&self, domain: &str, instance: Option<&str>) -> Result<Session> {
        self.get(domain)?.session(instance)
    }

    pub fn async_session(&self, domain: &str, instance: Option<&str>) -> Result<AsyncSession> {
        self.get(domain)?.async_session(instance)
    }

    /// Build from a two-level name → name → engine-parameter map.
    pub fn from_config(config: &HashMap<String, HashMap<String, EngineConfig>>) -> Self {
        let mut names: Vec<&String> = config.keys().collect();
        names.sort();
        let mut group = Self::new();
        for name in names {
            group.register(name.clone(), EngineRegistry::from_config(&config[name]));
        }
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_is_the_default() {
        let mut registry = EngineRegistry::new();
        registry.register("rdb", Engine::new("eq-rdb", 5010));
        registry.register("hdb", Engine::new("eq-hdb", 5012));
        assert_eq!(registry.default_name(), Some("rdb"));
        assert_eq!(registry.get(None).unwrap().port, 5010);
        assert_eq!(registry.get(Some("hdb")).unwrap().port, 5012);
    }

    #[test]
    fn missing_engine_lists_available() {
        let mut registry = EngineRegistry::new();
        registry.register("rdb", Engine::new("h", 1));
        let err = registry.get(Some("tp")).unwrap_err();
        assert!(format!("{err}").contains("rdb"));
    }

    #[test]
    fn empty_registry_errors() {
        let registry = EngineRegistry::new();
        assert!(registry.get(None).is_err());
    }

    #[test]
    fn set_default_validates() {
        let mut registry = EngineRegistry::new();
        registry.register("rdb", Engine::new("h", 1));
        assert!(registry.set_default("hdb").is_err());
        registry.register("hdb", Engine::new("h", 2));
        registry.set_default("hdb").unwrap();
        assert_eq!(registry.get(None).unwrap().port, 2);
    }

    #[test]
    fn from_env_reads_prefixed_variables() {
        std::env::set_var("QMTEST_EQ_RDB_HOST", "eq-rdb.internal");
        std::env::set_var("QMTEST_EQ_RDB_PORT", "5010");
        std::env::set_var("QMTEST_EQ_RDB_USER", "svc");
        std::env::set_var("QMTEST_EQ_RDB_PASS", "pw");

        let registry = EngineRegistry::from_env(&["rdb", "hdb"], "QMTEST_EQ").unwrap();
        let rdb = registry.get(Some("rdb")).unwrap();
        assert_eq!(rdb.host, "eq-rdb.internal");
        assert_eq!(rdb.port, 5010);
        assert_eq!(rdb.username, "svc");

        // Unset names fall back to localhost defaults.
        let hdb = registry.get(Some("hdb")).unwrap();
        assert_eq!(hdb.host, "localhost");
        assert_eq!(hdb.port, 5000);
    }

    #[test]
    fn group_routing() {
        let mut equities = EngineRegistry::new();
        equities.register("rdb", Engine::new("eq", 1));
        let mut fx = EngineRegistry::new();
        fx.register("rdb", Engine::new("fx", 2));

        let mut group = EngineGroup::new();
        group.register("equities", equities);
        group.register("fx", fx);

        assert_eq!(group.names(), vec!["equities", "fx"]);
        assert_eq!(group.get("fx").unwrap().get(None).unwrap().port, 2);
        assert!(group.get("rates").is_err());
    }
}
