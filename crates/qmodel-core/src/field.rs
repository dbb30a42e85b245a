//! Field metadata for statically declared models.

use crate::types::{Attr, QKind};

/// Declared kind of a model column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Column of scalar elements.
    Atom(QKind),
    /// Column whose elements are themselves vectors of one kind
    /// (uppercase type char in `meta` output).
    ListOf(QKind),
    /// Untyped mixed-list column (blank type char).
    Mixed,
}

impl FieldKind {
    /// Type character as it appears in `meta` output: lowercase for atoms,
    /// uppercase for nested vectors, space for untyped mixed lists.
    pub fn type_char(self) -> char {
        match self {
            FieldKind::Atom(k) => k.type_char(),
            FieldKind::ListOf(k) => k.type_char().to_ascii_uppercase(),
            FieldKind::Mixed => ' ',
        }
    }

    /// Parse a `meta` type character.
    pub fn from_char(c: char) -> Option<Self> {
        if c == ' ' {
            return Some(FieldKind::Mixed);
        }
        if c.is_ascii_uppercase() {
            return QKind::from_char(c.to_ascii_lowercase()).map(FieldKind::ListOf);
        }
        QKind::from_char(c).map(FieldKind::Atom)
    }

    /// Scalar element kind, when there is one.
    pub fn element_kind(self) -> Option<QKind> {
        match self {
            FieldKind::Atom(k) | FieldKind::ListOf(k) => Some(k),
            FieldKind::Mixed => None,
        }
    }
}

/// Metadata about one column of a statically declared model.
///
/// Built with a const constructor plus const setters so model declarations
/// stay terse.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Column name (the q name equals the Rust field name).
    pub name: &'static str,
    /// Declared kind.
    pub kind: FieldKind,
    /// Vector attribute applied in DDL.
    pub attr: Attr,
    /// Whether the column accepts typed nulls.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
    /// Default value as a q literal, used by insert helpers.
    pub default: Option<&'static str>,
}

impl FieldInfo {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            attr: Attr::None,
            nullable: false,
            primary_key: false,
            default: None,
        }
    }

    pub const fn atom(name: &'static str, kind: QKind) -> Self {
        Self::new(name, FieldKind::Atom(kind))
    }

    pub const fn attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    pub const fn default(mut self, literal: &'static str) -> Self {
        self.default = Some(literal);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_kind_chars() {
        assert_eq!(FieldKind::Atom(QKind::Symbol).type_char(), 's');
        assert_eq!(FieldKind::ListOf(QKind::Float).type_char(), 'F');
        assert_eq!(FieldKind::Mixed.type_char(), ' ');
    }

    #[test]
    fn field_kind_char_roundtrip() {
        assert_eq!(
            FieldKind::from_char('j'),
            Some(FieldKind::Atom(QKind::Long))
        );
        assert_eq!(
            FieldKind::from_char('J'),
            Some(FieldKind::ListOf(QKind::Long))
        );
        assert_eq!(FieldKind::from_char(' '), Some(FieldKind::Mixed));
        assert_eq!(FieldKind::from_char('q'), None);
    }

    #[test]
    fn const_builder_chain() {
        const F: FieldInfo = FieldInfo::atom("sym", QKind::Symbol)
            .attr(Attr::Grouped)
            .primary_key(true)
            .nullable(true);
        assert_eq!(F.name, "sym");
        assert_eq!(F.attr, Attr::Grouped);
        assert!(F.primary_key);
        assert!(F.nullable);
        assert!(F.default.is_none());
    }
}
