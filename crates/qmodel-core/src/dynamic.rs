//! Runtime schema descriptors.
//!
//! A [`SchemaDescriptor`] is the runtime value both statically declared
//! models (via [`crate::model::Model::descriptor`]) and reflected tables
//! reduce to. The query builder and the result layer bind against a
//! descriptor, never a nominal type, so the compile path is identical for
//! both.

use crate::error::{Error, Result};
use crate::field::{FieldInfo, FieldKind};
use crate::types::Attr;
use crate::value::{Dict, Table, Value};

/// One column of a runtime descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub attr: Attr,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attr: Attr::None,
            nullable: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }
}

impl From<&FieldInfo> for FieldDef {
    fn from(info: &FieldInfo) -> Self {
        Self {
            name: info.name.to_string(),
            kind: info.kind,
            attr: info.attr,
            nullable: info.nullable,
            primary_key: info.primary_key,
            default: info.default.map(str::to_string),
        }
    }
}

/// A named schema: table name plus ordered field list.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Descriptor for a statically declared model.
    pub fn from_static(
        name: &str,
        fields: &[FieldInfo],
        key_fields: &[&str],
    ) -> Self {
        let fields = fields
            .iter()
            .map(|f| {
                let mut def = FieldDef::from(f);
                if key_fields.contains(&f.name) {
                    def.primary_key = true;
                }
                def
            })
            .collect();
        Self::new(name, fields)
    }

    /// Transient descriptor synthesized from a decoded table, used for
    /// anonymous results (`raw` queries with no bound model).
    pub fn transient(name: impl Into<String>, table: &Table) -> Self {
        let fields = table
            .columns
            .iter()
            .map(|(col, value)| FieldDef::new(col.clone(), infer_column_kind(value)))
            .collect();
        Self::new(name, fields)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn key_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn value_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn is_keyed(&self) -> bool {
        self.fields.iter().any(|f| f.primary_key)
    }
}

fn infer_column_kind(column: &Value) -> FieldKind {
    match column {
        Value::Vector(v) => FieldKind::Atom(v.kind()),
        Value::String(_) => FieldKind::Atom(crate::types::QKind::Char),
        _ => FieldKind::Mixed,
    }
}

// ==================== Reflection from `meta` output ====================

/// Build a descriptor from the decoded output of `meta t` plus the key
/// column list from `keys t`.
///
/// `meta` returns a keyed table: the key side holds column `c` (column
/// names), the value side holds `t` (type chars), `f` (foreign keys), and
/// `a` (attributes). Some intermediaries flatten it to a plain table with
/// all four columns; both shapes are accepted.
pub fn descriptor_from_meta(
    tablename: &str,
    meta: &Value,
    key_columns: &[String],
) -> Result<SchemaDescriptor> {
    let (names, type_chars, attrs) = parse_meta(tablename, meta)?;

    if names.is_empty() {
        return Err(Error::reflection(format!(
            "table '{tablename}' has no columns"
        )));
    }
    if names.len() != type_chars.len() {
        return Err(Error::reflection(format!(
            "meta for '{tablename}': {} columns but {} type chars",
            names.len(),
            type_chars.len()
        )));
    }

    let mut fields = Vec::with_capacity(names.len());
    for (i, (name, ch)) in names.iter().zip(type_chars.iter()).enumerate() {
        let kind = FieldKind::from_char(*ch).ok_or_else(|| {
            Error::reflection(format!(
                "unknown type char {ch:?} for column '{name}' in table '{tablename}'"
            ))
        })?;
        let attr = attrs
            .get(i)
            .map(|a| parse_attr(a))
            .unwrap_or(Attr::None);
        let def = FieldDef::new(name.clone(), kind)
            .attr(attr)
            .primary_key(key_columns.iter().any(|k| k == name))
            .nullable(true);
        fields.push(def);
    }

    Ok(SchemaDescriptor::new(tablename, fields))
}

type MetaColumns = (Vec<String>, Vec<char>, Vec<String>);

fn parse_meta(tablename: &str, meta: &Value) -> Result<MetaColumns> {
    let (key_side, value_side): (&Table, Option<&Table>) = match meta {
        Value::Dict(dict) => match (&dict.keys, &dict.values) {
            (Value::Table(k), Value::Table(v)) => (k, Some(v)),
            _ => {
                return Err(Error::reflection(format!(
                    "meta for '{tablename}' is a dict but not a keyed table"
                )))
            }
        },
        Value::Table(t) => (t, None),
        other => {
            return Err(Error::reflection(format!(
                "meta for '{tablename}': expected table, got {other:?}"
            )))
        }
    };

    let lookup = |col: &str| -> Option<&Value> {
        key_side
            .column(col)
            .or_else(|| value_side.and_then(|t| t.column(col)))
    };

    let names = lookup("c")
        .map(|v| v.symbol_list())
        .ok_or_else(|| Error::reflection(format!("meta for '{tablename}' missing column 'c'")))?;

    let type_chars: Vec<char> = match lookup("t") {
        Some(Value::String(s)) => s.chars().collect(),
        Some(Value::List(items)) => items
            .iter()
            .map(|v| match v {
                Value::Char(c) => *c as char,
                _ => ' ',
            })
            .collect(),
        _ => {
            return Err(Error::reflection(format!(
                "meta for '{tablename}' missing column 't'"
            )))
        }
    };

    let attrs = lookup("a").map(|v| v.symbol_list()).unwrap_or_default();

    Ok((names, type_chars, attrs))
}

fn parse_attr(a: &str) -> Attr {
    match a {
        "s" => Attr::Sorted,
        "u" => Attr::Unique,
        "p" => Attr::Parted,
        "g" => Attr::Grouped,
        _ => Attr::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QKind;
    use crate::value::Vector;

    fn meta_fixture() -> Value {
        // meta trade -> keyed table: ([c:`sym`price`size] t:"sfj"; f:```; a:`g``)
        let keys = Table::new(vec![(
            "c".into(),
            Value::Vector(Vector::symbols(vec![
                "sym".into(),
                "price".into(),
                "size".into(),
            ])),
        )]);
        let values = Table::new(vec![
            ("t".into(), Value::String("sfj".into())),
            (
                "f".into(),
                Value::Vector(Vector::symbols(vec!["".into(), "".into(), "".into()])),
            ),
            (
                "a".into(),
                Value::Vector(Vector::symbols(vec!["g".into(), "".into(), "".into()])),
            ),
        ]);
        Value::Dict(Box::new(Dict::new(
            Value::Table(keys),
            Value::Table(values),
        )))
    }

    #[test]
    fn reflects_keyed_meta_output() {
        let desc = descriptor_from_meta("trade", &meta_fixture(), &[]).unwrap();
        assert_eq!(desc.name, "trade");
        assert_eq!(desc.fields.len(), 3);
        assert_eq!(desc.fields[0].kind, FieldKind::Atom(QKind::Symbol));
        assert_eq!(desc.fields[0].attr, Attr::Grouped);
        assert_eq!(desc.fields[1].kind, FieldKind::Atom(QKind::Float));
        assert_eq!(desc.fields[2].kind, FieldKind::Atom(QKind::Long));
        assert!(!desc.is_keyed());
    }

    #[test]
    fn key_columns_mark_primary_keys() {
        let desc =
            descriptor_from_meta("trade", &meta_fixture(), &["sym".to_string()]).unwrap();
        assert!(desc.is_keyed());
        assert_eq!(desc.key_fields(), vec!["sym"]);
        assert_eq!(desc.value_fields(), vec!["price", "size"]);
    }

    #[test]
    fn uppercase_char_reflects_nested_column() {
        let keys = Table::new(vec![(
            "c".into(),
            Value::Vector(Vector::symbols(vec!["sym".into(), "fills".into()])),
        )]);
        let values = Table::new(vec![("t".into(), Value::String("sF".into()))]);
        let meta = Value::Dict(Box::new(Dict::new(
            Value::Table(keys),
            Value::Table(values),
        )));

        let desc = descriptor_from_meta("orders", &meta, &[]).unwrap();
        assert_eq!(desc.fields[1].kind, FieldKind::ListOf(QKind::Float));
    }

    #[test]
    fn unknown_type_char_is_a_reflection_error() {
        let table = Table::new(vec![
            (
                "c".into(),
                Value::Vector(Vector::symbols(vec!["x".into()])),
            ),
            ("t".into(), Value::String("q".into())),
        ]);
        let err = descriptor_from_meta("bad", &Value::Table(table), &[]).unwrap_err();
        assert!(format!("{err}").contains("unknown type char"));
    }

    #[test]
    fn transient_descriptor_infers_kinds() {
        let t = Table::new(vec![
            (
                "sym".into(),
                Value::Vector(Vector::symbols(vec!["AAPL".into()])),
            ),
            ("price".into(), Value::Vector(Vector::floats(vec![1.0]))),
            ("notes".into(), Value::List(vec![Value::Long(1)])),
        ]);
        let desc = SchemaDescriptor::transient("anon", &t);
        assert_eq!(desc.fields[0].kind, FieldKind::Atom(QKind::Symbol));
        assert_eq!(desc.fields[1].kind, FieldKind::Atom(QKind::Float));
        assert_eq!(desc.fields[2].kind, FieldKind::Mixed);
    }
}
