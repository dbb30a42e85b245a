//! Named-function RPC helpers.

use qmodel_core::{Result, Value};
use qmodel_session::{QueryResult, Session};

/// Reusable wrapper around a named server function.
///
/// ```ignore
/// let get_trades = QFunction::new("getTradesByDate");
/// let result = get_trades.call(&mut session, &[Value::symbol("AAPL")])?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QFunction {
    name: String,
}

impl QFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke through a session: `(name; arg1; …)`.
    pub fn call(&self, session: &mut Session, args: &[Value]) -> Result<QueryResult> {
        session.call(&self.name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_a_name() {
        let f = QFunction::new("getTradesByDate");
        assert_eq!(f.name(), "getTradesByDate");
    }
}
