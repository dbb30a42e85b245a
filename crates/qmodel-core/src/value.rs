//! The tagged value universe shared by the codec, the compiler, and the
//! model layer.
//!
//! Atoms carry their native payload; temporal atoms carry the raw wire unit
//! (days, nanoseconds, …) rather than a calendar type, so encode/decode is
//! bit-exact. Typed nulls are a distinct variant, [`Value::Null`], so a long
//! null and a date null never compare equal. Typed vectors keep raw sentinel
//! payloads in place; element access reconstructs the typed null.

use crate::types::{self, Attr, QKind};

/// A single typed value as it travels over the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Typed null atom; kind is preserved.
    Null(QKind),
    Bool(bool),
    Guid([u8; 16]),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Real(f32),
    Float(f64),
    Char(u8),
    Symbol(String),
    /// Nanoseconds since 2000.01.01.
    Timestamp(i64),
    /// Months since 2000.01.
    Month(i32),
    /// Days since 2000.01.01.
    Date(i32),
    /// Fractional days since 2000.01.01.
    Datetime(f64),
    /// Nanoseconds of duration.
    Timespan(i64),
    /// Minutes since midnight.
    Minute(i32),
    /// Seconds since midnight.
    Second(i32),
    /// Milliseconds since midnight.
    Time(i32),
    /// Char vector (type 10 with a count), UTF-8.
    String(String),
    /// Uniform typed vector with an attribute tag.
    Vector(Vector),
    /// Mixed list (type 0); each element is a full value.
    List(Vec<Value>),
    /// Ordered named columns of equal length.
    Table(Table),
    /// Key/value pair; both sides tables for a keyed table.
    Dict(Box<Dict>),
    /// Lambda or operator decoded as an opaque textual stub.
    Function(String),
}

impl Value {
    /// Symbol atom from anything stringy.
    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }

    /// Char-vector value from anything stringy.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Scalar kind for atoms (including typed nulls); `None` for the rest.
    pub fn atom_kind(&self) -> Option<QKind> {
        match self {
            Value::Null(k) => Some(*k),
            Value::Bool(_) => Some(QKind::Boolean),
            Value::Guid(_) => Some(QKind::Guid),
            Value::Byte(_) => Some(QKind::Byte),
            Value::Short(_) => Some(QKind::Short),
            Value::Int(_) => Some(QKind::Int),
            Value::Long(_) => Some(QKind::Long),
            Value::Real(_) => Some(QKind::Real),
            Value::Float(_) => Some(QKind::Float),
            Value::Char(_) => Some(QKind::Char),
            Value::Symbol(_) => Some(QKind::Symbol),
            Value::Timestamp(_) => Some(QKind::Timestamp),
            Value::Month(_) => Some(QKind::Month),
            Value::Date(_) => Some(QKind::Date),
            Value::Datetime(_) => Some(QKind::Datetime),
            Value::Timespan(_) => Some(QKind::Timespan),
            Value::Minute(_) => Some(QKind::Minute),
            Value::Second(_) => Some(QKind::Second),
            Value::Time(_) => Some(QKind::Time),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            Value::Int(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Real(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) | Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Symbol names out of a symbol vector, a single symbol, or an empty
    /// list. Used for `tables[]`, `keys t`, and namespace listings.
    pub fn symbol_list(&self) -> Vec<String> {
        match self {
            Value::Symbol(s) => vec![s.clone()],
            Value::Vector(v) => match &v.data {
                VectorData::Symbol(items) => items.clone(),
                _ => Vec::new(),
            },
            Value::List(items) => items
                .iter()
                .filter_map(|v| v.as_symbol().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Symbol(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Symbol(v)
    }
}

// ==================== Typed vectors ====================

/// Uniform typed vector: element kind, attribute tag, raw wire elements.
///
/// Null elements stay as their sentinel bit patterns; [`Vector::get`]
/// reconstructs [`Value::Null`] on access.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    pub attr: Attr,
    pub data: VectorData,
}

/// Raw element storage per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    Boolean(Vec<bool>),
    Guid(Vec<[u8; 16]>),
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Real(Vec<f32>),
    Float(Vec<f64>),
    Symbol(Vec<String>),
    Timestamp(Vec<i64>),
    Month(Vec<i32>),
    Date(Vec<i32>),
    Datetime(Vec<f64>),
    Timespan(Vec<i64>),
    Minute(Vec<i32>),
    Second(Vec<i32>),
    Time(Vec<i32>),
}

impl Vector {
    pub fn new(data: VectorData) -> Self {
        Self {
            attr: Attr::None,
            data,
        }
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    pub fn longs(items: Vec<i64>) -> Self {
        Self::new(VectorData::Long(items))
    }

    pub fn ints(items: Vec<i32>) -> Self {
        Self::new(VectorData::Int(items))
    }

    pub fn floats(items: Vec<f64>) -> Self {
        Self::new(VectorData::Float(items))
    }

    pub fn symbols(items: Vec<String>) -> Self {
        Self::new(VectorData::Symbol(items))
    }

    pub fn booleans(items: Vec<bool>) -> Self {
        Self::new(VectorData::Boolean(items))
    }

    pub fn kind(&self) -> QKind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element as a value, with null sentinels mapped to `Value::Null`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.data.get(index)
    }
}

impl VectorData {
    pub fn kind(&self) -> QKind {
        match self {
            VectorData::Boolean(_) => QKind::Boolean,
            VectorData::Guid(_) => QKind::Guid,
            VectorData::Byte(_) => QKind::Byte,
            VectorData::Short(_) => QKind::Short,
            VectorData::Int(_) => QKind::Int,
            VectorData::Long(_) => QKind::Long,
            VectorData::Real(_) => QKind::Real,
            VectorData::Float(_) => QKind::Float,
            VectorData::Symbol(_) => QKind::Symbol,
            VectorData::Timestamp(_) => QKind::Timestamp,
            VectorData::Month(_) => QKind::Month,
            VectorData::Date(_) => QKind::Date,
            VectorData::Datetime(_) => QKind::Datetime,
            VectorData::Timespan(_) => QKind::Timespan,
            VectorData::Minute(_) => QKind::Minute,
            VectorData::Second(_) => QKind::Second,
            VectorData::Time(_) => QKind::Time,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VectorData::Boolean(v) => v.len(),
            VectorData::Guid(v) => v.len(),
            VectorData::Byte(v) => v.len(),
            VectorData::Short(v) => v.len(),
            VectorData::Int(v) => v.len(),
            VectorData::Long(v) => v.len(),
            VectorData::Real(v) => v.len(),
            VectorData::Float(v) => v.len(),
            VectorData::Symbol(v) => v.len(),
            VectorData::Timestamp(v) => v.len(),
            VectorData::Month(v) => v.len(),
            VectorData::Date(v) => v.len(),
            VectorData::Datetime(v) => v.len(),
            VectorData::Timespan(v) => v.len(),
            VectorData::Minute(v) => v.len(),
            VectorData::Second(v) => v.len(),
            VectorData::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, i: usize) -> Option<Value> {
        fn null_or<T: Copy>(
            v: &[T],
            i: usize,
            kind: QKind,
            is_null: impl Fn(T) -> bool,
            wrap: impl Fn(T) -> Value,
        ) -> Option<Value> {
            let raw = *v.get(i)?;
            Some(if is_null(raw) {
                Value::Null(kind)
            } else {
                wrap(raw)
            })
        }

        match self {
            VectorData::Boolean(v) => v.get(i).map(|b| Value::Bool(*b)),
            VectorData::Byte(v) => v.get(i).map(|b| Value::Byte(*b)),
            VectorData::Guid(v) => {
                let raw = *v.get(i)?;
                Some(if raw == types::NULL_GUID {
                    Value::Null(QKind::Guid)
                } else {
                    Value::Guid(raw)
                })
            }
            VectorData::Symbol(v) => {
                let raw = v.get(i)?;
                Some(if raw.is_empty() {
                    Value::Null(QKind::Symbol)
                } else {
                    Value::Symbol(raw.clone())
                })
            }
            VectorData::Short(v) => {
                null_or(v, i, QKind::Short, types::is_null_i16, Value::Short)
            }
            VectorData::Int(v) => null_or(v, i, QKind::Int, types::is_null_i32, Value::Int),
            VectorData::Long(v) => null_or(v, i, QKind::Long, types::is_null_i64, Value::Long),
            VectorData::Real(v) => null_or(v, i, QKind::Real, types::is_null_f32, Value::Real),
            VectorData::Float(v) => {
                null_or(v, i, QKind::Float, types::is_null_f64, Value::Float)
            }
            VectorData::Timestamp(v) => {
                null_or(v, i, QKind::Timestamp, types::is_null_i64, Value::Timestamp)
            }
            VectorData::Month(v) => {
                null_or(v, i, QKind::Month, types::is_null_i32, Value::Month)
            }
            VectorData::Date(v) => null_or(v, i, QKind::Date, types::is_null_i32, Value::Date),
            VectorData::Datetime(v) => {
                null_or(v, i, QKind::Datetime, types::is_null_f64, Value::Datetime)
            }
            VectorData::Timespan(v) => {
                null_or(v, i, QKind::Timespan, types::is_null_i64, Value::Timespan)
            }
            VectorData::Minute(v) => {
                null_or(v, i, QKind::Minute, types::is_null_i32, Value::Minute)
            }
            VectorData::Second(v) => {
                null_or(v, i, QKind::Second, types::is_null_i32, Value::Second)
            }
            VectorData::Time(v) => null_or(v, i, QKind::Time, types::is_null_i32, Value::Time),
        }
    }
}

// ==================== Tables and dicts ====================

/// Ordered list of named columns; every column has equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<(String, Value)>,
}

impl Table {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Row count, taken from the first column.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, v)| column_len(v))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element count of a column value (vector, mixed list, or char vector).
pub fn column_len(v: &Value) -> usize {
    match v {
        Value::Vector(vec) => vec.len(),
        Value::List(items) => items.len(),
        Value::String(s) => s.len(),
        _ => 1,
    }
}

/// Element of a column value at a row index, typed nulls reconstructed.
pub fn column_get(v: &Value, index: usize) -> Option<Value> {
    match v {
        Value::Vector(vec) => vec.get(index),
        Value::List(items) => items.get(index).cloned(),
        Value::String(s) => s.as_bytes().get(index).map(|b| Value::Char(*b)),
        _ => None,
    }
}

/// Dictionary: parallel keys and values. When both sides are tables this is
/// a keyed table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dict {
    pub keys: Value,
    pub values: Value,
}

impl Dict {
    pub fn new(keys: Value, values: Value) -> Self {
        Self { keys, values }
    }

    pub fn is_keyed_table(&self) -> bool {
        matches!(
            (&self.keys, &self.values),
            (Value::Table(_), Value::Table(_))
        )
    }

    /// Value for a symbol key, when keys are symbols.
    pub fn get(&self, key: &str) -> Option<Value> {
        let keys = self.keys.symbol_list();
        let index = keys.iter().position(|k| k == key)?;
        match &self.values {
            Value::List(items) => items.get(index).cloned(),
            Value::Vector(vec) => vec.get(index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NULL_INT, NULL_LONG};

    #[test]
    fn typed_nulls_compare_by_kind() {
        assert_eq!(Value::Null(QKind::Long), Value::Null(QKind::Long));
        assert_ne!(Value::Null(QKind::Long), Value::Null(QKind::Date));
        assert_ne!(Value::Null(QKind::Long), Value::Long(0));
    }

    #[test]
    fn vector_access_maps_sentinels_to_typed_nulls() {
        let v = Vector::longs(vec![1, NULL_LONG, 3]);
        assert_eq!(v.get(0), Some(Value::Long(1)));
        assert_eq!(v.get(1), Some(Value::Null(QKind::Long)));
        assert_eq!(v.get(2), Some(Value::Long(3)));
        assert_eq!(v.get(3), None);

        let dates = Vector::new(VectorData::Date(vec![NULL_INT]));
        assert_eq!(dates.get(0), Some(Value::Null(QKind::Date)));
    }

    #[test]
    fn empty_symbol_is_null() {
        let v = Vector::symbols(vec!["a".into(), "".into()]);
        assert_eq!(v.get(0), Some(Value::Symbol("a".into())));
        assert_eq!(v.get(1), Some(Value::Null(QKind::Symbol)));
    }

    #[test]
    fn table_len_and_lookup() {
        let t = Table::new(vec![
            (
                "sym".into(),
                Value::Vector(Vector::symbols(vec!["AAPL".into(), "GOOG".into()])),
            ),
            (
                "price".into(),
                Value::Vector(Vector::floats(vec![150.25, 2800.0])),
            ),
        ]);
        assert_eq!(t.len(), 2);
        assert!(t.column("price").is_some());
        assert!(t.column("missing").is_none());
    }

    #[test]
    fn dict_symbol_lookup() {
        let d = Dict::new(
            Value::Vector(Vector::symbols(vec!["a".into(), "b".into()])),
            Value::Vector(Vector::longs(vec![1, 2])),
        );
        assert_eq!(d.get("b"), Some(Value::Long(2)));
        assert_eq!(d.get("c"), None);
        assert!(!d.is_keyed_table());
    }

    #[test]
    fn keyed_table_detection() {
        let d = Dict::new(
            Value::Table(Table::default()),
            Value::Table(Table::default()),
        );
        assert!(d.is_keyed_table());
    }

    #[test]
    fn atom_kind_covers_nulls() {
        assert_eq!(Value::Null(QKind::Date).atom_kind(), Some(QKind::Date));
        assert_eq!(Value::Long(5).atom_kind(), Some(QKind::Long));
        assert_eq!(Value::List(vec![]).atom_kind(), None);
    }
}
