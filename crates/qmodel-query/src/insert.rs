//! Insert builder: rows transpose to per-column vector literals.
//!
//! `` `t insert (c1;c2;…) `` with one vector literal per declared field, in
//! declaration order. Columns render in their kind's vector syntax; a
//! heterogeneous or unrenderable column falls back to a mixed-list literal.

use qmodel_core::field::FieldKind;
use qmodel_core::types::QKind;
use qmodel_core::{Error, Result, SchemaDescriptor, Value};

use crate::compiler::{null_literal, render_literal};

/// Batch insert for a bound model.
#[derive(Debug, Clone)]
pub struct InsertQuery {
    descriptor: SchemaDescriptor,
    rows: Vec<Vec<Value>>,
}

impl InsertQuery {
    /// Rows are value vectors in declared field order.
    pub fn new(descriptor: SchemaDescriptor, rows: Vec<Vec<Value>>) -> Self {
        Self { descriptor, rows }
    }

    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn compile(&self) -> Result<String> {
        let table = &self.descriptor.name;
        if self.rows.is_empty() {
            return Ok(format!("`{table} insert ()"));
        }

        let width = self.descriptor.fields.len();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                return Err(Error::query(format!(
                    "insert row {i} has {} values, table '{table}' has {width} columns",
                    row.len()
                )));
            }
        }

        // Transpose: row-oriented input to column-oriented literals.
        let mut columns = Vec::with_capacity(width);
        for (index, field) in self.descriptor.fields.iter().enumerate() {
            let values: Vec<&Value> = self.rows.iter().map(|row| &row[index]).collect();
            columns.push(render_column(&values, field.kind)?);
        }

        Ok(format!("`{table} insert ({})", columns.join(";")))
    }

    pub fn explain(&self) -> Result<String> {
        Ok(format!(
            "-- insert {} row(s) into `{}\n{}",
            self.rows.len(),
            self.descriptor.name,
            self.compile()?
        ))
    }
}

fn render_column(values: &[&Value], kind: FieldKind) -> Result<String> {
    let FieldKind::Atom(kind) = kind else {
        return render_mixed(values);
    };
    match kind {
        QKind::Symbol => {
            let parts: Vec<String> = values
                .iter()
                .map(|v| match v {
                    Value::Symbol(s) => format!("`{s}"),
                    _ => "`".to_string(),
                })
                .collect();
            Ok(if parts.len() == 1 {
                parts.into_iter().next().expect("one element")
            } else {
                format!("({})", parts.join(";"))
            })
        }
        QKind::Long => Ok(join_scalars(values, kind, " ")),
        QKind::Int | QKind::Short | QKind::Real | QKind::Float => {
            Ok(join_scalars(values, kind, " "))
        }
        QKind::Boolean => {
            let bits: String = values
                .iter()
                .map(|v| match v {
                    Value::Bool(true) => '1',
                    _ => '0',
                })
                .collect();
            Ok(format!("{bits}b"))
        }
        QKind::Char => {
            let chars: String = values
                .iter()
                .map(|v| match v {
                    Value::Char(c) => *c as char,
                    _ => ' ',
                })
                .collect();
            Ok(format!("\"{chars}\""))
        }
        QKind::Timestamp
        | QKind::Month
        | QKind::Date
        | QKind::Datetime
        | QKind::Timespan
        | QKind::Minute
        | QKind::Second
        | QKind::Time
        | QKind::Guid
        | QKind::Byte => {
            let parts: Result<Vec<String>> = values
                .iter()
                .map(|v| scalar_literal(v, kind))
                .collect();
            Ok(format!("({})", parts?.join(";")))
        }
    }
}

fn join_scalars(values: &[&Value], kind: QKind, sep: &str) -> String {
    values
        .iter()
        .map(|v| scalar_literal(v, kind).unwrap_or_else(|_| null_literal(kind).to_string()))
        .collect::<Vec<_>>()
        .join(sep)
}

fn scalar_literal(value: &Value, kind: QKind) -> Result<String> {
    match value {
        Value::Null(_) => Ok(null_literal(kind).to_string()),
        other => render_literal(other),
    }
}

fn render_mixed(values: &[&Value]) -> Result<String> {
    let parts: Result<Vec<String>> = values.iter().map(|v| render_literal(v)).collect();
    Ok(format!("({})", parts?.join(";")))
}
