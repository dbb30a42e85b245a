//! Core types and traits for qmodel.
//!
//! `qmodel-core` is the foundation layer for the workspace. It defines the
//! q type system, the tagged [`Value`] every wire message reduces to, the
//! error taxonomy, model metadata, runtime schema descriptors, column-
//! oriented result sets, DDL generation, and the process-global model
//! registry.
//!
//! # Who uses this crate
//!
//! - `qmodel-ipc` encodes and decodes [`Value`] over the wire.
//! - `qmodel-query` compiles expression trees against [`SchemaDescriptor`]s
//!   and renders [`Value`] literals.
//! - `qmodel-session` maps decoded tables into [`ResultSet`]s and drives
//!   reflection.
//! - `qmodel-pool` and the `qmodel` facade share the error taxonomy.
//!
//! Most applications should depend on the `qmodel` facade; reach for
//! `qmodel-core` directly when extending the stack.

// Re-export asupersync primitives for structured concurrency.
pub use asupersync::{Cx, Outcome};

pub mod dynamic;
pub mod error;
pub mod field;
pub mod model;
pub mod registry;
pub mod row;
pub mod schema;
pub mod task;
pub mod types;
pub mod value;

pub use dynamic::{descriptor_from_meta, FieldDef, SchemaDescriptor};
pub use error::{
    CodecError, CodecErrorKind, ConnectionError, ConnectionErrorKind, DiscoveryError,
    DiscoveryErrorKind, Error, ErrorClass, ModelError, ModelErrorKind, PoolError, PoolErrorKind,
    QError, QueryError, Result,
};
pub use field::{FieldInfo, FieldKind};
pub use model::Model;
pub use row::{ResultSet, RowView, Rows};
pub use types::{Attr, QKind};
pub use value::{Dict, Table, Value, Vector, VectorData};
