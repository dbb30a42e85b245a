//! qmodel: a client library and ORM for q/kdb+-style vector databases.
//!
//! Three tightly coupled cores: a binary wire codec with typed nulls and
//! the server's LZ decompression scheme; a typed, chainable query builder
//! compiling to the functional query syntax; and a session layer with
//! schema reflection, retry/backoff, sync and cooperative-async modes, and
//! pooled connections.
//!
//! ```ignore
//! use qmodel::prelude::*;
//!
//! qmodel::model! {
//!     pub struct Trade: "trade" {
//!         sym: Symbol,
//!         price: Float,
//!         size: Long,
//!     }
//! }
//!
//! let engine = Engine::new("localhost", 5000).credentials("u", "p");
//! let mut session = engine.session()?;
//! session.create_table::<Trade>()?;
//!
//! let result = session.exec(
//!     &Trade::select()
//!         .column(Trade::sym())
//!         .column_as("avg_price", avg(Trade::price()))
//!         .filter(Trade::price().gt(100i64))
//!         .by(Trade::sym()),
//! )?;
//! for row in result.rows()?.iter() {
//!     println!("{:?} {:?}", row.get("sym"), row.get("avg_price"));
//! }
//! # qmodel::core::Result::Ok(())
//! ```

pub use qmodel_core as core;
pub use qmodel_ipc as ipc;
pub use qmodel_pool as pool;
pub use qmodel_query as query;
pub use qmodel_session as session;

pub mod engine;
mod macros;
pub mod qns;
pub mod registry;
pub mod rpc;

pub use engine::{Engine, EngineConfig};
pub use qns::{Qns, ServiceInfo};
pub use registry::{EngineGroup, EngineRegistry};
pub use rpc::QFunction;

pub use qmodel_core::{
    Attr, Cx, Error, ErrorClass, FieldInfo, FieldKind, Model, Outcome, QError, QKind, Result,
    ResultSet, RowView, SchemaDescriptor, Table, Value, Vector,
};
pub use qmodel_ipc::{AsyncConnection, ConnectConfig, Subscriber, SyncConnection, TlsOptions};
pub use qmodel_pool::{AsyncPool, PoolConfig, SyncPool};
pub use qmodel_query::{ModelQueries, Query};
pub use qmodel_session::{AsyncSession, QueryResult, RetryPolicy, Session};

/// Everything a typical application needs in scope.
pub mod prelude {
    pub use crate::engine::{Engine, EngineConfig};
    pub use crate::qns::{Qns, ServiceInfo};
    pub use crate::registry::{EngineGroup, EngineRegistry};
    pub use crate::rpc::QFunction;
    pub use qmodel_core::{
        Attr, Cx, Error, Model, Outcome, QKind, Result, ResultSet, RowView, Value, Vector,
    };
    pub use qmodel_ipc::{ConnectConfig, Subscriber, TlsOptions};
    pub use qmodel_pool::{AsyncPool, PoolConfig, SyncPool};
    pub use qmodel_query::{
        avg, call, col, count, count_of, dev, fby, first, last, lit, max, med, min, sum, var,
        xbar, Expr, ModelQueries, Query,
    };
    pub use qmodel_query::{aj, ij, lj, wj};
    pub use qmodel_session::{
        pagination::Paginator, AsyncSession, QueryResult, RetryPolicy, Session,
    };
}
