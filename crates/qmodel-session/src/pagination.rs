//! Page-wise iteration over large result sets.
//!
//! Drives `offset`/`limit` windows until a page comes back short or empty.

use asupersync::{Cx, Outcome};
use qmodel_core::{Error, Result, ResultSet};
use qmodel_query::SelectQuery;

use crate::{AsyncSession, QueryResult, Session};

/// Stateful pager over a select query.
pub struct Paginator {
    query: SelectQuery,
    page_size: i64,
    page: i64,
    done: bool,
}

impl Paginator {
    pub fn new(query: SelectQuery, page_size: i64) -> Self {
        Self {
            query,
            page_size,
            page: 0,
            done: false,
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    fn paged_query(&self) -> SelectQuery {
        self.query
            .clone()
            .offset(self.page * self.page_size)
            .limit(self.page_size)
    }

    fn account(&mut self, rows: ResultSet) -> Option<ResultSet> {
        if rows.is_empty() {
            self.done = true;
            return None;
        }
        if (rows.len() as i64) < self.page_size {
            self.done = true;
        }
        self.page += 1;
        Some(rows)
    }

    /// Fetch the next page; `None` once exhausted.
    pub fn next_page(&mut self, session: &mut Session) -> Result<Option<ResultSet>> {
        if self.done {
            return Ok(None);
        }
        let paged = self.paged_query();
        match session.exec(&paged)? {
            QueryResult::Rows(rows) => Ok(self.account(rows)),
            QueryResult::Value(other) => Err(Error::query(format!(
                "paginated query returned a non-table result: {other:?}"
            ))),
        }
    }

    /// Async variant of [`next_page`](Paginator::next_page).
    pub async fn next_page_async(
        &mut self,
        cx: &Cx,
        session: &mut AsyncSession,
    ) -> Outcome<Option<ResultSet>, Error> {
        if self.done {
            return Outcome::Ok(None);
        }
        let paged = self.paged_query();
        match session.exec(cx, &paged).await {
            Outcome::Ok(QueryResult::Rows(rows)) => Outcome::Ok(self.account(rows)),
            Outcome::Ok(QueryResult::Value(other)) => Outcome::Err(Error::query(format!(
                "paginated query returned a non-table result: {other:?}"
            ))),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}
