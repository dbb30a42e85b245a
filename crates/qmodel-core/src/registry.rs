//! Process-global registry of schema descriptors, keyed by table name.
//!
//! Write-once per declaration (or reflection), read-mostly afterwards; the
//! session consults it to bind anonymous results to a known descriptor.
//! Entries are handles; descriptors never reference the registry back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::dynamic::SchemaDescriptor;

fn registry() -> &'static Mutex<HashMap<String, Arc<SchemaDescriptor>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<SchemaDescriptor>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register a descriptor under its table name, replacing any previous entry.
pub fn register(descriptor: SchemaDescriptor) -> Arc<SchemaDescriptor> {
    let handle = Arc::new(descriptor);
    let mut map = registry().lock().expect("model registry poisoned");
    map.insert(handle.name.clone(), Arc::clone(&handle));
    handle
}

/// Look up a descriptor by table name.
pub fn get(tablename: &str) -> Option<Arc<SchemaDescriptor>> {
    let map = registry().lock().expect("model registry poisoned");
    map.get(tablename).cloned()
}

/// All registered descriptors.
pub fn all() -> Vec<Arc<SchemaDescriptor>> {
    let map = registry().lock().expect("model registry poisoned");
    map.values().cloned().collect()
}

/// Remove every entry. Intended for tests.
pub fn clear() {
    let mut map = registry().lock().expect("model registry poisoned");
    map.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::FieldDef;
    use crate::field::FieldKind;
    use crate::types::QKind;

    #[test]
    fn register_and_lookup() {
        let desc = SchemaDescriptor::new(
            "registry_test_trade",
            vec![FieldDef::new("sym", FieldKind::Atom(QKind::Symbol))],
        );
        let handle = register(desc);
        let found = get("registry_test_trade").expect("registered");
        assert!(Arc::ptr_eq(&handle, &found));
        assert!(get("registry_test_missing").is_none());
    }

    #[test]
    fn reregistration_replaces() {
        register(SchemaDescriptor::new(
            "registry_test_replace",
            vec![FieldDef::new("a", FieldKind::Atom(QKind::Long))],
        ));
        register(SchemaDescriptor::new(
            "registry_test_replace",
            vec![
                FieldDef::new("a", FieldKind::Atom(QKind::Long)),
                FieldDef::new("b", FieldKind::Atom(QKind::Float)),
            ],
        ));
        let found = get("registry_test_replace").unwrap();
        assert_eq!(found.fields.len(), 2);
    }
}
