//! Column-oriented result sets with row views.
//!
//! A [`ResultSet`] keeps the decoded table in its column-oriented layout and
//! hands out lightweight [`RowView`]s that project by column name. Typed
//! nulls are reconstructed on element access.

use std::sync::Arc;

use crate::dynamic::SchemaDescriptor;
use crate::error::{Error, Result};
use crate::value::{column_get, column_len, Dict, Table, Value};

/// Column-oriented wrapper around a decoded table.
#[derive(Debug, Clone)]
pub struct ResultSet {
    descriptor: Arc<SchemaDescriptor>,
    columns: Vec<(String, Value)>,
    len: usize,
}

impl ResultSet {
    /// Wrap a decoded table, binding it to `descriptor` or synthesizing a
    /// transient descriptor from the column names.
    pub fn from_table(table: Table, descriptor: Option<Arc<SchemaDescriptor>>) -> Result<Self> {
        let len = table.len();
        for (name, column) in &table.columns {
            if column_len(column) != len {
                return Err(Error::deserialize(format!(
                    "table column '{name}' has {} elements, expected {len}",
                    column_len(column)
                )));
            }
        }
        let mut seen: Vec<&str> = Vec::with_capacity(table.columns.len());
        for (name, _) in &table.columns {
            if seen.contains(&name.as_str()) {
                return Err(Error::deserialize(format!(
                    "duplicate table column '{name}'"
                )));
            }
            seen.push(name);
        }

        let descriptor = descriptor
            .unwrap_or_else(|| Arc::new(SchemaDescriptor::transient("", &table)));
        Ok(Self {
            descriptor,
            columns: table.columns,
            len,
        })
    }

    /// Wrap a keyed table (dict of two tables), key columns first.
    pub fn from_keyed(dict: Dict, descriptor: Option<Arc<SchemaDescriptor>>) -> Result<Self> {
        let (keys, values) = match (dict.keys, dict.values) {
            (Value::Table(k), Value::Table(v)) => (k, v),
            _ => return Err(Error::deserialize("dict is not a keyed table")),
        };
        if keys.len() != values.len() {
            return Err(Error::deserialize(format!(
                "keyed table: {} key rows but {} value rows",
                keys.len(),
                values.len()
            )));
        }
        let mut columns = keys.columns;
        columns.extend(values.columns);
        Self::from_table(Table::new(columns), descriptor)
    }

    pub fn descriptor(&self) -> &Arc<SchemaDescriptor> {
        &self.descriptor
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Whole column by name, still column-oriented.
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Row view at an index.
    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        (index < self.len).then_some(RowView { set: self, index })
    }

    pub fn iter(&self) -> Rows<'_> {
        Rows {
            set: self,
            index: 0,
        }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = RowView<'a>;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over row views.
pub struct Rows<'a> {
    set: &'a ResultSet,
    index: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = RowView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.set.row(self.index)?;
        self.index += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.set.len.saturating_sub(self.index);
        (rem, Some(rem))
    }
}

/// One row of a result set, projecting column name to element.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    set: &'a ResultSet,
    index: usize,
}

impl RowView<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Element by column name; `None` when the column does not exist.
    pub fn get(&self, name: &str) -> Option<Value> {
        let column = self.set.column(name)?;
        column_get(column, self.index)
    }

    /// Element by column position.
    pub fn get_at(&self, position: usize) -> Option<Value> {
        let (_, column) = self.set.columns.get(position)?;
        column_get(column, self.index)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.set.column_names()
    }
}
