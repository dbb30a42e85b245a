//! Model binding for query builders.
//!
//! A query is bound either to a statically declared model (column
//! references are checked at compile time), to a reflected descriptor
//! (permissive), or to a bare table name (permissive).

use std::sync::Arc;

use qmodel_core::{Error, Model, Result, SchemaDescriptor};

use crate::expr::Expr;

#[derive(Debug, Clone)]
pub struct ModelBinding {
    table: String,
    descriptor: Option<Arc<SchemaDescriptor>>,
    strict: bool,
}

impl ModelBinding {
    /// Bind to a statically declared model; column references are checked.
    pub fn of<M: Model>() -> Self {
        Self {
            table: M::TABLE_NAME.to_string(),
            descriptor: Some(Arc::new(M::descriptor())),
            strict: true,
        }
    }

    /// Bind to a reflected descriptor; the compiler is permissive about
    /// column references.
    pub fn from_descriptor(descriptor: Arc<SchemaDescriptor>) -> Self {
        Self {
            table: descriptor.name.clone(),
            descriptor: Some(descriptor),
            strict: false,
        }
    }

    /// Bind to a bare table name.
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            descriptor: None,
            strict: false,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn descriptor(&self) -> Option<&Arc<SchemaDescriptor>> {
        self.descriptor.as_ref()
    }

    /// Check every column reference in `exprs` against the bound model.
    /// No-op for permissive bindings.
    pub fn validate<'a>(&self, exprs: impl IntoIterator<Item = &'a Expr>) -> Result<()> {
        if !self.strict {
            return Ok(());
        }
        let Some(descriptor) = &self.descriptor else {
            return Ok(());
        };
        let mut referenced = Vec::new();
        for expr in exprs {
            expr.columns(&mut referenced);
        }
        for name in referenced {
            if descriptor.field(name).is_none() {
                return Err(Error::query(format!(
                    "column '{name}' is not declared on table '{}'",
                    self.table
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;
    use qmodel_core::dynamic::FieldDef;
    use qmodel_core::field::FieldKind;
    use qmodel_core::types::QKind;

    fn descriptor() -> Arc<SchemaDescriptor> {
        Arc::new(SchemaDescriptor::new(
            "trade",
            vec![FieldDef::new("sym", FieldKind::Atom(QKind::Symbol))],
        ))
    }

    #[test]
    fn permissive_bindings_accept_anything() {
        let binding = ModelBinding::table("trade");
        assert!(binding.validate([&col("whatever").gt(1i64)]).is_ok());

        let binding = ModelBinding::from_descriptor(descriptor());
        assert!(binding.validate([&col("whatever").gt(1i64)]).is_ok());
    }
}
