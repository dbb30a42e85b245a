//! DDL generation for q tables.
//!
//! There is a single dialect: empty-typed-column table definitions of the
//! form `` t:([] c:`s$()) ``, with primary-key columns gathered into the
//! leading key section for keyed tables.

use crate::dynamic::SchemaDescriptor;
use crate::field::FieldKind;

/// Expression that creates an empty table matching the descriptor.
///
/// Unkeyed: `` trade:([] sym:`s$(); price:`f$(); size:`j$()) ``
/// Keyed:   `` daily:([sym:`s$()] close:`f$(); volume:`j$()) ``
pub fn create_table(desc: &SchemaDescriptor) -> String {
    let mut key_parts = Vec::new();
    let mut val_parts = Vec::new();

    for field in &desc.fields {
        let attr = field.attr.ddl_prefix();
        let col = match field.kind {
            FieldKind::Atom(kind) => {
                format!("{}:{attr}`{}$()", field.name, kind.type_char())
            }
            // Nested and untyped columns start as a general empty list.
            FieldKind::ListOf(_) | FieldKind::Mixed => format!("{}:{attr}()", field.name),
        };
        if field.primary_key {
            key_parts.push(col);
        } else {
            val_parts.push(col);
        }
    }

    let key_section = if key_parts.is_empty() {
        "[]".to_string()
    } else {
        format!("[{}]", key_parts.join("; "))
    };

    let ddl = format!("{}:({} {})", desc.name, key_section, val_parts.join("; "));
    tracing::debug!(table = %desc.name, ddl = %ddl, "generated DDL");
    ddl
}

/// Expression that drops the table from the root namespace.
pub fn drop_table(desc: &SchemaDescriptor) -> String {
    format!("delete {} from `.", desc.name)
}

/// Expression testing table existence.
pub fn table_exists(desc: &SchemaDescriptor) -> String {
    format!("`{} in tables[]", desc.name)
}

/// Expression returning table metadata.
pub fn table_meta(desc: &SchemaDescriptor) -> String {
    format!("meta {}", desc.name)
}

/// Expression counting table rows.
pub fn table_count(desc: &SchemaDescriptor) -> String {
    format!("count {}", desc.name)
}
