//! Sessions: request/response orchestration over one connection.
//!
//! A session owns a single connection, compiles builder queries, retries
//! retryable failures per its [`RetryPolicy`] (discarding and reopening the
//! connection between attempts), and maps table replies into column-
//! oriented result sets bound to the query's descriptor, or to a
//! registered/transient descriptor for anonymous results.

pub mod pagination;
pub mod retry;

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use qmodel_core::{
    descriptor_from_meta, registry, schema, Error, Model, ResultSet, Result, SchemaDescriptor,
    Value,
};
use qmodel_ipc::{AsyncConnection, ConnectConfig, SyncConnection};
use qmodel_query::Query;

pub use retry::RetryPolicy;

/// Outcome of a session operation: rows for table-shaped replies, the raw
/// value otherwise.
#[derive(Debug, Clone)]
pub enum QueryResult {
    Rows(ResultSet),
    Value(Value),
}

impl QueryResult {
    /// The result as rows; errors for non-table replies.
    pub fn rows(self) -> Result<ResultSet> {
        match self {
            QueryResult::Rows(rows) => Ok(rows),
            QueryResult::Value(other) => Err(Error::query(format!(
                "expected a table result, got {other:?}"
            ))),
        }
    }

    /// The raw value for non-table replies.
    pub fn into_value(self) -> Option<Value> {
        match self {
            QueryResult::Rows(_) => None,
            QueryResult::Value(v) => Some(v),
        }
    }

    pub fn as_rows(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            QueryResult::Value(v) => Some(v),
            QueryResult::Rows(_) => None,
        }
    }
}

/// Bind a decoded reply to a result shape.
fn map_result(value: Value, descriptor: Option<Arc<SchemaDescriptor>>) -> Result<QueryResult> {
    match value {
        Value::Table(table) => Ok(QueryResult::Rows(ResultSet::from_table(table, descriptor)?)),
        Value::Dict(dict) if dict.is_keyed_table() => {
            Ok(QueryResult::Rows(ResultSet::from_keyed(*dict, descriptor)?))
        }
        other => Ok(QueryResult::Value(other)),
    }
}

fn outcome_from<T>(result: Result<T>) -> Outcome<T, Error> {
    match result {
        Ok(v) => Outcome::Ok(v),
        Err(e) => Outcome::Err(e),
    }
}

/// Descriptor for a query result: the query's own binding, else whatever
/// was registered under the table name.
fn result_descriptor(query: &dyn Query) -> Option<Arc<SchemaDescriptor>> {
    query
        .descriptor()
        .or_else(|| query.table().and_then(registry::get))
}

// ==================== Synchronous session ====================

/// Blocking session. Opens its connection on construction and closes on
/// drop.
pub struct Session {
    config: ConnectConfig,
    conn: SyncConnection,
    retry: Option<RetryPolicy>,
}

impl Session {
    /// Connect and hand back an open session.
    pub fn open(config: ConnectConfig) -> Result<Self> {
        Self::open_with_retry(config, None)
    }

    /// Connect with a retry policy applied to every operation.
    pub fn open_with_retry(config: ConnectConfig, retry: Option<RetryPolicy>) -> Result<Self> {
        let mut conn = SyncConnection::new(config.clone());
        conn.open()?;
        tracing::debug!(address = %config.address(), "session opened");
        Ok(Self {
            config,
            conn,
            retry,
        })
    }

    pub fn close(&mut self) {
        self.conn.close();
        tracing::debug!("session closed");
    }

    pub fn connection(&mut self) -> &mut SyncConnection {
        &mut self.conn
    }

    fn reconnect(&mut self) -> Result<()> {
        self.conn.close();
        self.conn = SyncConnection::new(self.config.clone());
        self.conn.open()?;
        tracing::debug!(address = %self.config.address(), "session reconnected");
        Ok(())
    }

    /// Run one wire query under the retry policy.
    fn query_with_retry(&mut self, expr: &str, args: &[Value]) -> Result<Value> {
        let Some(policy) = self.retry.clone() else {
            return self.conn.query(expr, args);
        };
        let mut attempt = 0u32;
        loop {
            match self.conn.query(expr, args) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < policy.max_retries && policy.is_retryable(&e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        "retryable failure; reconnecting"
                    );
                    if let Err(reconnect_err) = self.reconnect() {
                        tracing::debug!(error = %reconnect_err, "reconnect failed; retrying");
                    }
                    std::thread::sleep(policy.delay(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute a raw expression with optional call-form arguments.
    pub fn raw(&mut self, expr: &str, args: &[Value]) -> Result<QueryResult> {
        tracing::debug!(expr, "raw");
        let value = self.query_with_retry(expr, args)?;
        map_result(value, None)
    }

    /// Compile and execute a builder query.
    pub fn exec(&mut self, query: &dyn Query) -> Result<QueryResult> {
        let compiled = query.compile()?;
        tracing::debug!(query = %compiled, "exec");
        let value = self.query_with_retry(&compiled, &[])?;
        map_result(value, result_descriptor(query))
    }

    /// Call a named server function: `(name; arg1; …)`.
    pub fn call(&mut self, func: &str, args: &[Value]) -> Result<QueryResult> {
        tracing::debug!(func, argc = args.len(), "call");
        let value = self.query_with_retry(func, args)?;
        map_result(value, None)
    }

    // ---- DDL ----

    pub fn create_table<M: Model>(&mut self) -> Result<()> {
        let descriptor = M::register();
        self.create_table_from(&descriptor)
    }

    pub fn create_table_from(&mut self, descriptor: &SchemaDescriptor) -> Result<()> {
        self.raw(&schema::create_table(descriptor), &[]).map(|_| ())
    }

    pub fn drop_table<M: Model>(&mut self) -> Result<()> {
        self.raw(&schema::drop_table(&M::descriptor()), &[])
            .map(|_| ())
    }

    pub fn table_exists<M: Model>(&mut self) -> Result<bool> {
        let result = self.raw(&schema::table_exists(&M::descriptor()), &[])?;
        Ok(matches!(result.as_value(), Some(Value::Bool(true))))
    }

    // ---- Reflection ----

    /// Table names in the server process.
    pub fn tables(&mut self) -> Result<Vec<String>> {
        Ok(self.conn.query("tables[]", &[])?.symbol_list())
    }

    /// Reflect a table into a registered runtime descriptor.
    pub fn reflect(&mut self, tablename: &str) -> Result<Arc<SchemaDescriptor>> {
        let meta = self
            .conn
            .query(&format!("meta {tablename}"), &[])
            .map_err(|e| match e {
                Error::Q(q) => Error::reflection(format!(
                    "cannot read metadata for table '{tablename}': {}",
                    q.message
                )),
                other => other,
            })?;

        // Non-keyed tables answer `keys` with an empty list.
        let key_columns = match self.conn.query(&format!("keys {tablename}"), &[]) {
            Ok(value) => value.symbol_list(),
            Err(Error::Q(_)) => Vec::new(),
            Err(other) => return Err(other),
        };

        let descriptor = descriptor_from_meta(tablename, &meta, &key_columns)?;
        tracing::debug!(table = tablename, columns = descriptor.fields.len(), "reflected");
        Ok(registry::register(descriptor))
    }

    /// Reflect every table in the process.
    pub fn reflect_all(&mut self) -> Result<Vec<Arc<SchemaDescriptor>>> {
        let names = self.tables()?;
        names.iter().map(|name| self.reflect(name)).collect()
    }

    /// Root-level namespace symbols.
    pub fn namespaces(&mut self) -> Result<Vec<String>> {
        Ok(self.conn.query("key `", &[])?.symbol_list())
    }

    /// Function names, optionally within a namespace.
    pub fn functions(&mut self, namespace: Option<&str>) -> Result<Vec<String>> {
        let expr = match namespace {
            Some(ns) => {
                let ns = ns.strip_prefix('.').unwrap_or(ns);
                format!("system \"f .{ns}\"")
            }
            None => "system \"f\"".to_string(),
        };
        Ok(self.conn.query(&expr, &[])?.symbol_list())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.conn.close();
    }
}

// ==================== Asynchronous session ====================

/// Cooperative session over an [`AsyncConnection`]. Construct, then
/// `open` before use.
pub struct AsyncSession {
    config: ConnectConfig,
    conn: AsyncConnection,
    retry: Option<RetryPolicy>,
}

impl AsyncSession {
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            conn: AsyncConnection::new(config.clone()),
            config,
            retry: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub async fn open(&mut self, cx: &Cx) -> Outcome<(), Error> {
        self.conn.open(cx).await
    }

    pub async fn close(&mut self) -> Outcome<(), Error> {
        self.conn.close().await
    }

    async fn reconnect(&mut self, cx: &Cx) -> Outcome<(), Error> {
        match self.conn.close().await {
            Outcome::Ok(()) => {}
            other => return other,
        }
        self.conn = AsyncConnection::new(self.config.clone());
        self.conn.open(cx).await
    }

    async fn query_with_retry(
        &mut self,
        cx: &Cx,
        expr: &str,
        args: &[Value],
    ) -> Outcome<Value, Error> {
        let Some(policy) = self.retry.clone() else {
            return self.conn.query(cx, expr, args).await;
        };
        let mut attempt = 0u32;
        loop {
            match self.conn.query(cx, expr, args).await {
                Outcome::Ok(value) => return Outcome::Ok(value),
                Outcome::Err(e) if attempt < policy.max_retries && policy.is_retryable(&e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        "retryable failure; reconnecting"
                    );
                    match self.reconnect(cx).await {
                        Outcome::Ok(()) => {}
                        Outcome::Err(reconnect_err) => {
                            tracing::debug!(error = %reconnect_err, "reconnect failed; retrying");
                        }
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                    qmodel_core::task::sleep_for(policy.delay(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    pub async fn raw(
        &mut self,
        cx: &Cx,
        expr: &str,
        args: &[Value],
    ) -> Outcome<QueryResult, Error> {
        tracing::debug!(expr, "async raw");
        match self.query_with_retry(cx, expr, args).await {
            Outcome::Ok(value) => outcome_from(map_result(value, None)),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    pub async fn exec(&mut self, cx: &Cx, query: &dyn Query) -> Outcome<QueryResult, Error> {
        let compiled = match query.compile() {
            Ok(c) => c,
            Err(e) => return Outcome::Err(e),
        };
        tracing::debug!(query = %compiled, "async exec");
        match self.query_with_retry(cx, &compiled, &[]).await {
            Outcome::Ok(value) => outcome_from(map_result(value, result_descriptor(query))),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    pub async fn call(
        &mut self,
        cx: &Cx,
        func: &str,
        args: &[Value],
    ) -> Outcome<QueryResult, Error> {
        tracing::debug!(func, argc = args.len(), "async call");
        match self.query_with_retry(cx, func, args).await {
            Outcome::Ok(value) => outcome_from(map_result(value, None)),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    pub async fn create_table<M: Model>(&mut self, cx: &Cx) -> Outcome<(), Error> {
        let descriptor = M::register();
        let ddl = schema::create_table(&descriptor);
        self.raw(cx, &ddl, &[]).await.map(|_| ())
    }

    pub async fn drop_table<M: Model>(&mut self, cx: &Cx) -> Outcome<(), Error> {
        let ddl = schema::drop_table(&M::descriptor());
        self.raw(cx, &ddl, &[]).await.map(|_| ())
    }

    pub async fn table_exists<M: Model>(&mut self, cx: &Cx) -> Outcome<bool, Error> {
        let expr = schema::table_exists(&M::descriptor());
        match self.raw(cx, &expr, &[]).await {
            Outcome::Ok(result) => {
                Outcome::Ok(matches!(result.as_value(), Some(Value::Bool(true))))
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    pub async fn tables(&mut self, cx: &Cx) -> Outcome<Vec<String>, Error> {
        self.conn
            .query(cx, "tables[]", &[])
            .await
            .map(|v| v.symbol_list())
    }

    pub async fn reflect(
        &mut self,
        cx: &Cx,
        tablename: &str,
    ) -> Outcome<Arc<SchemaDescriptor>, Error> {
        let meta = match self.conn.query(cx, &format!("meta {tablename}"), &[]).await {
            Outcome::Ok(v) => v,
            Outcome::Err(Error::Q(q)) => {
                return Outcome::Err(Error::reflection(format!(
                    "cannot read metadata for table '{tablename}': {}",
                    q.message
                )))
            }
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let key_columns = match self.conn.query(cx, &format!("keys {tablename}"), &[]).await {
            Outcome::Ok(v) => v.symbol_list(),
            Outcome::Err(Error::Q(_)) => Vec::new(),
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match descriptor_from_meta(tablename, &meta, &key_columns) {
            Ok(descriptor) => Outcome::Ok(registry::register(descriptor)),
            Err(e) => Outcome::Err(e),
        }
    }

    pub async fn reflect_all(&mut self, cx: &Cx) -> Outcome<Vec<Arc<SchemaDescriptor>>, Error> {
        let names = match self.tables(cx).await {
            Outcome::Ok(n) => n,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let mut out = Vec::with_capacity(names.len());
        for name in &names {
            match self.reflect(cx, name).await {
                Outcome::Ok(d) => out.push(d),
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(out)
    }

    pub async fn namespaces(&mut self, cx: &Cx) -> Outcome<Vec<String>, Error> {
        self.conn
            .query(cx, "key `", &[])
            .await
            .map(|v| v.symbol_list())
    }

    pub async fn functions(
        &mut self,
        cx: &Cx,
        namespace: Option<&str>,
    ) -> Outcome<Vec<String>, Error> {
        let expr = match namespace {
            Some(ns) => {
                let ns = ns.strip_prefix('.').unwrap_or(ns);
                format!("system \"f .{ns}\"")
            }
            None => "system \"f\"".to_string(),
        };
        self.conn
            .query(cx, &expr, &[])
            .await
            .map(|v| v.symbol_list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmodel_core::{Table, Vector};

    #[test]
    fn map_result_wraps_tables() {
        let table = Value::Table(Table::new(vec![(
            "sym".into(),
            Value::Vector(Vector::symbols(vec!["AAPL".into()])),
        )]));
        match map_result(table, None).unwrap() {
            QueryResult::Rows(rows) => assert_eq!(rows.len(), 1),
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn map_result_passes_scalars_through() {
        match map_result(Value::Long(5), None).unwrap() {
            QueryResult::Value(Value::Long(5)) => {}
            other => panic!("expected long, got {other:?}"),
        }
    }

    #[test]
    fn rows_accessor_rejects_scalars() {
        let result = map_result(Value::Long(5), None).unwrap();
        assert!(result.rows().is_err());
    }
}
