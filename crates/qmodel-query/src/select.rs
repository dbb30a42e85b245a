//! Chainable select builder compiling to `?[t;W;B;A]`.

use qmodel_core::Result;

use crate::binding::ModelBinding;
use crate::compiler::{apply_paging, compile_functional_select};
use crate::expr::Expr;

/// Select query. Each chained call consumes and returns the builder, so a
/// query never mutates behind a shared handle.
///
/// ```ignore
/// let q = Trade::select()
///     .column(Trade::sym())
///     .column_as("avg_price", avg(Trade::price()))
///     .filter(Trade::price().gt(100i64))
///     .by(Trade::sym())
///     .limit(10);
/// ```
#[derive(Debug, Clone)]
pub struct SelectQuery {
    binding: ModelBinding,
    projections: Vec<(Option<String>, Expr)>,
    predicates: Vec<Expr>,
    by: Vec<(Option<String>, Expr)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    pub fn new(binding: ModelBinding) -> Self {
        Self {
            binding,
            projections: Vec::new(),
            predicates: Vec::new(),
            by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    /// Project a column or expression; the alias is inferred.
    pub fn column(mut self, expr: impl Into<Expr>) -> Self {
        self.projections.push((None, expr.into()));
        self
    }

    /// Project with an explicit alias.
    pub fn column_as(mut self, alias: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.projections.push((Some(alias.into()), expr.into()));
        self
    }

    /// Add a predicate; predicates are AND-joined.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Group by a column or expression.
    pub fn by(mut self, expr: impl Into<Expr>) -> Self {
        self.by.push((None, expr.into()));
        self
    }

    /// Group with an explicit alias.
    pub fn by_as(mut self, alias: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.by.push((Some(alias.into()), expr.into()));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Compile to the functional form, with paging wrappers applied.
    pub fn compile(&self) -> Result<String> {
        self.binding.validate(
            self.predicates
                .iter()
                .chain(self.by.iter().map(|(_, e)| e))
                .chain(self.projections.iter().map(|(_, e)| e)),
        )?;
        let compiled = compile_functional_select(
            self.binding.table_name(),
            &self.predicates,
            &self.by,
            &self.projections,
        )?;
        Ok(apply_paging(compiled, self.limit, self.offset))
    }

    /// Compiled text with a banner, for debugging.
    pub fn explain(&self) -> Result<String> {
        Ok(format!(
            "-- select on `{}\n{}",
            self.binding.table_name(),
            self.compile()?
        ))
    }
}
