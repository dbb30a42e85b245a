//! Chainable exec builder: `?[t;W;B;a]` returning vectors or dicts
//! instead of tables.

use qmodel_core::Result;

use crate::binding::ModelBinding;
use crate::compiler::{apply_paging, compile_functional_exec};
use crate::expr::Expr;

/// Exec query. A single unaliased column produces a vector; several
/// columns (or any alias) produce a dict.
#[derive(Debug, Clone)]
pub struct ExecQuery {
    binding: ModelBinding,
    projections: Vec<(Option<String>, Expr)>,
    predicates: Vec<Expr>,
    by: Vec<(Option<String>, Expr)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl ExecQuery {
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

    pub fn column(mut self, expr: impl Into<Expr>) -> Self {
        self.projections.push((None, expr.into()));
        self
    }

    pub fn column_as(mut self, alias: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.projections.push((Some(alias.into()), expr.into()));
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

    pub fn compile(&self) -> Result<String> {
        self.binding.validate(
            self.predicates
                .iter()
                .chain(self.by.iter().map(|(_, e)| e))
                .chain(self.projections.iter().map(|(_, e)| e)),
        )?;
        let compiled = compile_functional_exec(
            self.binding.table_name(),
            &self.predicates,
            &self.by,
            &self.projections,
        )?;
        Ok(apply_paging(compiled, self.limit, self.offset))
    }

    pub fn explain(&self) -> Result<String> {
        Ok(format!(
            "-- exec on `{}\n{}",
            self.binding.table_name(),
            self.compile()?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{avg, col};

    fn trade() -> ExecQuery {
        ExecQuery::new(ModelBinding::table("trade"))
    }

    #[test]
    fn single_column_yields_vector_form() {
        let compiled = trade().column(col("price")).compile().unwrap();
        assert_eq!(compiled, "?[trade;();0b;`price]");
    }

    #[test]
    fn multiple_columns_yield_dict_form() {
        let compiled = trade()
            .column(col("sym"))
            .column(col("price"))
            .compile()
            .unwrap();
        assert_eq!(compiled, "?[trade;();0b;`sym`price!(`sym;`price)]");
    }

    #[test]
    fn named_aggregate_yields_dict_form() {
        let compiled = trade()
            .column_as("avg_price", avg(col("price")))
            .compile()
            .unwrap();
        assert_eq!(
            compiled,
            "?[trade;();0b;(enlist `avg_price)!enlist (avg price)]"
        );
    }

    #[test]
    fn filtered_exec_with_limit() {
        let compiled = trade()
            .column(col("price"))
            .filter(col("sym").eq("AAPL"))
            .limit(100)
            .compile()
            .unwrap();
        assert_eq!(
            compiled,
            "100#(?[trade;enlist ((sym=`AAPL));0b;`price])"
        );
    }
}
