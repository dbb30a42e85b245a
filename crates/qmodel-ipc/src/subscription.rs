//! Subscription listener for tick-style publishers (`.u.sub`).
//!
//! The subscriber opens a dedicated connection, registers with
//! `.u.sub[tableSymbol; symbolVectorOrEmpty]`, then listens for async
//! frames of shape `(functionSym; tableName; data)`. The leading function
//! symbol is stripped and `(tableName, data)` is handed to the callback in
//! arrival order, on the listener's scheduling context. Cancel the task to
//! stop listening.

use asupersync::{Cx, Outcome};
use qmodel_core::{Error, Value, Vector};

use crate::async_connection::AsyncConnection;
use crate::config::ConnectConfig;
use crate::protocol::MsgType;

/// Async subscriber delivering `(table, data)` updates to a callback.
pub struct Subscriber<F>
where
    F: FnMut(&str, Value),
{
    conn: AsyncConnection,
    callback: F,
}

impl<F> Subscriber<F>
where
    F: FnMut(&str, Value),
{
    pub fn new(config: ConnectConfig, callback: F) -> Self {
        Self {
            conn: AsyncConnection::new(config),
            callback,
        }
    }

    pub async fn connect(&mut self, cx: &Cx) -> Outcome<(), Error> {
        self.conn.open(cx).await
    }

    /// Register interest in a table. An empty `syms` slice subscribes to
    /// every symbol. Returns the publisher's reply (typically the schema).
    pub async fn subscribe(
        &mut self,
        cx: &Cx,
        table: &str,
        syms: &[&str],
    ) -> Outcome<Value, Error> {
        if !self.conn.is_open() {
            match self.conn.open(cx).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        let sym_arg = if syms.is_empty() {
            Value::Symbol(String::new())
        } else {
            Value::Vector(Vector::symbols(syms.iter().map(|s| s.to_string()).collect()))
        };
        let result = self
            .conn
            .query(cx, ".u.sub", &[Value::symbol(table), sym_arg])
            .await;
        if let Outcome::Ok(_) = &result {
            tracing::debug!(table, syms = syms.len(), "subscribed");
        }
        result
    }

    /// Listen for updates until cancellation or a connection failure.
    ///
    /// The callback runs inline on this task; a slow callback delays
    /// subsequent deliveries, never reorders them.
    pub async fn listen(&mut self, cx: &Cx) -> Outcome<(), Error> {
        tracing::info!("subscriber listening for updates");
        loop {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            let (msg_type, value) = match self.conn.receive(cx).await {
                Outcome::Ok(decoded) => decoded,
                Outcome::Err(e) => {
                    tracing::warn!(error = %e, "connection lost during listen");
                    return Outcome::Err(e);
                }
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            if msg_type != MsgType::Async {
                tracing::debug!(?msg_type, "ignoring non-async frame during listen");
                continue;
            }
            match split_update(value) {
                Some((table, data)) => {
                    tracing::debug!(table = %table, "update received");
                    (self.callback)(&table, data);
                }
                None => tracing::debug!("ignoring non-update frame"),
            }
        }
    }

    pub async fn close(&mut self) -> Outcome<(), Error> {
        self.conn.close().await
    }
}

/// Split an update frame into `(table, data)`.
///
/// Publishers send `(fnSym; tableName; data)`; some relays drop the leading
/// function symbol and send `(tableName; data)`.
fn split_update(value: Value) -> Option<(String, Value)> {
    let Value::List(items) = value else {
        return None;
    };
    let mut items = items.into_iter();
    match items.len() {
        3 => {
            let _fn_sym = items.next()?;
            let table = items.next()?.as_str()?.to_string();
            let data = items.next()?;
            Some((table, data))
        }
        2 => {
            let table = items.next()?.as_str()?.to_string();
            let data = items.next()?;
            Some((table, data))
        }
        _ => None,
    }
}
