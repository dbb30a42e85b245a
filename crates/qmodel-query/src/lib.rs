//! Query AST and compiler for qmodel.
//!
//! A typed, chainable, model-bound builder API compiling to the server's
//! functional query syntax. Builders bind against a model (checked column
//! references) or a runtime descriptor (permissive); both share one
//! compiler.

pub mod binding;
pub mod compiler;
pub mod delete;
pub mod exec;
pub mod expr;
pub mod insert;
pub mod joins;
pub mod select;
pub mod update;

pub use binding::ModelBinding;
pub use compiler::{compile_expr, render_literal};
pub use delete::DeleteQuery;
pub use exec::ExecQuery;
pub use expr::{
    avg, call, col, count, count_of, dev, fby, first, last, lit, max, med, min, sum, var, xbar,
    Adverb, Expr,
};
pub use insert::InsertQuery;
pub use joins::{aj, ij, lj, wj, AsOfJoin, InnerJoin, LeftJoin, WindowJoin};
pub use select::SelectQuery;
pub use update::UpdateQuery;

use std::sync::Arc;

use qmodel_core::{Model, Result, SchemaDescriptor};

/// Anything the session can compile and dispatch: the five query variants
/// plus the join builders.
pub trait Query {
    /// Compile to the server's functional syntax.
    fn compile(&self) -> Result<String>;

    /// Descriptor the result set should bind to, when the query is bound.
    fn descriptor(&self) -> Option<Arc<SchemaDescriptor>> {
        None
    }

    /// Primary table name, when the query targets a single table.
    fn table(&self) -> Option<&str> {
        None
    }
}

impl Query for SelectQuery {
    fn compile(&self) -> Result<String> {
        SelectQuery::compile(self)
    }

    fn descriptor(&self) -> Option<Arc<SchemaDescriptor>> {
        self.binding().descriptor().cloned()
    }

    fn table(&self) -> Option<&str> {
        Some(self.binding().table_name())
    }
}

impl Query for UpdateQuery {
    fn compile(&self) -> Result<String> {
        UpdateQuery::compile(self)
    }

    fn descriptor(&self) -> Option<Arc<SchemaDescriptor>> {
        self.binding().descriptor().cloned()
    }

    fn table(&self) -> Option<&str> {
        Some(self.binding().table_name())
    }
}

impl Query for DeleteQuery {
    fn compile(&self) -> Result<String> {
        DeleteQuery::compile(self)
    }

    fn descriptor(&self) -> Option<Arc<SchemaDescriptor>> {
        self.binding().descriptor().cloned()
    }

    fn table(&self) -> Option<&str> {
        Some(self.binding().table_name())
    }
}

impl Query for ExecQuery {
    fn compile(&self) -> Result<String> {
        ExecQuery::compile(self)
    }

    fn descriptor(&self) -> Option<Arc<SchemaDescriptor>> {
        self.binding().descriptor().cloned()
    }

    fn table(&self) -> Option<&str> {
        Some(self.binding().table_name())
    }
}

impl Query for InsertQuery {
    fn compile(&self) -> Result<String> {
        InsertQuery::compile(self)
    }

    fn descriptor(&self) -> Option<Arc<SchemaDescriptor>> {
        Some(Arc::new(self.descriptor().clone()))
    }

    fn table(&self) -> Option<&str> {
        Some(&self.descriptor().name)
    }
}

impl Query for AsOfJoin {
    fn compile(&self) -> Result<String> {
        AsOfJoin::compile(self)
    }
}

impl Query for LeftJoin {
    fn compile(&self) -> Result<String> {
        LeftJoin::compile(self)
    }
}

impl Query for InnerJoin {
    fn compile(&self) -> Result<String> {
        InnerJoin::compile(self)
    }
}

impl Query for WindowJoin {
    fn compile(&self) -> Result<String> {
        WindowJoin::compile(self)
    }
}

/// Query entry points for statically declared models, mirroring the
/// builder methods a model class would carry.
pub trait ModelQueries: Model {
    fn select() -> SelectQuery {
        SelectQuery::new(ModelBinding::of::<Self>())
    }

    fn update() -> UpdateQuery {
        UpdateQuery::new(ModelBinding::of::<Self>())
    }

    fn delete() -> DeleteQuery {
        DeleteQuery::new(ModelBinding::of::<Self>())
    }

    fn exec() -> ExecQuery {
        ExecQuery::new(ModelBinding::of::<Self>())
    }

    fn insert(rows: &[Self]) -> InsertQuery {
        InsertQuery::new(
            Self::descriptor(),
            rows.iter().map(Model::to_row).collect(),
        )
    }
}

impl<M: Model> ModelQueries for M {}
