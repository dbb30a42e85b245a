//! Chainable update builder compiling to `![t;W;B;A]`.

use qmodel_core::Result;

use crate::binding::ModelBinding;
use crate::compiler::compile_functional_update;
use crate::expr::Expr;

/// Update query: set-assignments applied to the rows matching the
/// predicates, optionally grouped.
///
/// ```ignore
/// Trade::update()
///     .set("price", Trade::price() * lit(1.1))
///     .filter(Trade::sym().eq("AAPL"));
/// ```
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    binding: ModelBinding,
    assignments: Vec<(String, Expr)>,
    predicates: Vec<Expr>,
    by: Vec<(Option<String>, Expr)>,
}

impl UpdateQuery {
    pub fn new(binding: ModelBinding) -> Self {
        Self {
            binding,
            assignments: Vec::new(),
            predicates: Vec::new(),
            by: Vec::new(),
        }
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    /// Assign a column a new value expression.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn by(mut self, expr: impl Into<Expr>) -> Self {
        self.by.push((None, expr.into()));
        self
    }

    pub fn compile(&self) -> Result<String> {
        self.binding.validate(
            self.predicates
                .iter()
                .chain(self.by.iter().map(|(_, e)| e))
                .chain(self.assignments.iter().map(|(_, e)| e)),
        )?;
        compile_functional_update(
            self.binding.table_name(),
            &self.predicates,
            &self.by,
            &self.assignments,
        )
    }

    pub fn explain(&self) -> Result<String> {
        Ok(format!(
            "-- update on `{}\n{}",
            self.binding.table_name(),
            self.compile()?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lit};

    #[test]
    fn update_with_filter() {
        let compiled = UpdateQuery::new(ModelBinding::table("trade"))
            .set("price", col("price") * lit(1.1))
            .filter(col("sym").eq("AAPL"))
            .compile()
            .unwrap();
        assert_eq!(
            compiled,
            "![trade;enlist ((sym=`AAPL));0b;(enlist `price)!enlist (price*1.1)]"
        );
    }

    #[test]
    fn update_plain_value() {
        let compiled = UpdateQuery::new(ModelBinding::table("trade"))
            .set("size", lit(0i64))
            .compile()
            .unwrap();
        assert_eq!(compiled, "![trade;();0b;(enlist `size)!enlist (0)]");
    }

    #[test]
    fn grouped_update() {
        let compiled = UpdateQuery::new(ModelBinding::table("trade"))
            .set("price", crate::expr::avg(col("price")))
            .by(col("sym"))
            .compile()
            .unwrap();
        assert_eq!(
            compiled,
            "![trade;();(enlist `sym)!enlist `sym;(enlist `price)!enlist (avg price)]"
        );
    }
}
