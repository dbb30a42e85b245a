//! Chainable delete builder compiling to `![t;W;0b;A]`.

use qmodel_core::Result;

use crate::binding::ModelBinding;
use crate::compiler::compile_functional_delete;
use crate::expr::Expr;

/// Delete query: removes rows matching the predicates, or drops whole
/// columns. The two forms are mutually exclusive.
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    binding: ModelBinding,
    predicates: Vec<Expr>,
    columns: Option<Vec<String>>,
}

impl DeleteQuery {
    pub fn new(binding: ModelBinding) -> Self {
        Self {
            binding,
            predicates: Vec::new(),
            columns: None,
        }
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Drop whole columns instead of rows.
    pub fn columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn compile(&self) -> Result<String> {
        self.binding.validate(self.predicates.iter())?;
        compile_functional_delete(
            self.binding.table_name(),
            &self.predicates,
            self.columns.as_deref(),
        )
    }

    pub fn explain(&self) -> Result<String> {
        Ok(format!(
            "-- delete on `{}\n{}",
            self.binding.table_name(),
            self.compile()?
        ))
    }
}
