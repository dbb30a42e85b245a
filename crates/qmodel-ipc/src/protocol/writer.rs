//! Serialize values into IPC binary format.
//!
//! Output is always little-endian; the header is patched in after the body
//! is written so the buffer is built in one pass.

use qmodel_core::types::{self, QKind};
use qmodel_core::{Error, Result, Value, Vector, VectorData};

use super::{pack_header, MsgType, HEADER_SIZE};

/// Growable single-pass message serializer. Reusable across messages.
#[derive(Debug, Default)]
pub struct Serializer {
    buf: Vec<u8>,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    /// Serialize a complete message: 8-byte header plus one value body.
    pub fn serialize_message(&mut self, value: &Value, msg_type: MsgType) -> Result<Vec<u8>> {
        self.buf.clear();
        self.buf.resize(HEADER_SIZE, 0);
        self.write_value(value)?;
        let total = self.buf.len() as u32;
        self.buf[..HEADER_SIZE].copy_from_slice(&pack_header(msg_type, total));
        Ok(self.buf.clone())
    }

    fn write_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_symbol(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    fn write_count(&mut self, n: usize) -> Result<()> {
        i32::try_from(n)
            .map(|v| self.write_i32(v))
            .map_err(|_| Error::serialize(format!("collection too large: {n} elements")))
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null(kind) => self.write_null(*kind),
            Value::Bool(v) => {
                self.write_byte(QKind::Boolean.atom_byte());
                self.write_byte(u8::from(*v));
                Ok(())
            }
            Value::Guid(v) => {
                self.write_byte(QKind::Guid.atom_byte());
                self.write_bytes(v);
                Ok(())
            }
            Value::Byte(v) => {
                self.write_byte(QKind::Byte.atom_byte());
                self.write_byte(*v);
                Ok(())
            }
            Value::Short(v) => {
                self.write_byte(QKind::Short.atom_byte());
                self.write_i16(*v);
                Ok(())
            }
            Value::Int(v) => {
                self.write_byte(QKind::Int.atom_byte());
                self.write_i32(*v);
                Ok(())
            }
            Value::Long(v) => {
                self.write_byte(QKind::Long.atom_byte());
                self.write_i64(*v);
                Ok(())
            }
            Value::Real(v) => {
                self.write_byte(QKind::Real.atom_byte());
                self.write_f32(*v);
                Ok(())
            }
            Value::Float(v) => {
                self.write_byte(QKind::Float.atom_byte());
                self.write_f64(*v);
                Ok(())
            }
            Value::Char(v) => {
                self.write_byte(QKind::Char.atom_byte());
                self.write_byte(*v);
                Ok(())
            }
            Value::Symbol(v) => {
                self.write_byte(QKind::Symbol.atom_byte());
                self.write_symbol(v);
                Ok(())
            }
            Value::Timestamp(v) => {
                self.write_byte(QKind::Timestamp.atom_byte());
                self.write_i64(*v);
                Ok(())
            }
            Value::Month(v) => {
                self.write_byte(QKind::Month.atom_byte());
                self.write_i32(*v);
                Ok(())
            }
            Value::Date(v) => {
                self.write_byte(QKind::Date.atom_byte());
                self.write_i32(*v);
                Ok(())
            }
            Value::Datetime(v) => {
                self.write_byte(QKind::Datetime.atom_byte());
                self.write_f64(*v);
                Ok(())
            }
            Value::Timespan(v) => {
                self.write_byte(QKind::Timespan.atom_byte());
                self.write_i64(*v);
                Ok(())
            }
            Value::Minute(v) => {
                self.write_byte(QKind::Minute.atom_byte());
                self.write_i32(*v);
                Ok(())
            }
            Value::Second(v) => {
                self.write_byte(QKind::Second.atom_byte());
                self.write_i32(*v);
                Ok(())
            }
            Value::Time(v) => {
                self.write_byte(QKind::Time.atom_byte());
                self.write_i32(*v);
                Ok(())
            }
            Value::String(s) => {
                self.write_byte(QKind::Char.code());
                self.write_byte(0);
                self.write_count(s.len())?;
                self.write_bytes(s.as_bytes());
                Ok(())
            }
            Value::Vector(v) => self.write_vector(v),
            Value::List(items) => {
                self.write_byte(types::type_code::MIXED_LIST);
                self.write_byte(0);
                self.write_count(items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
                Ok(())
            }
            Value::Table(table) => {
                self.write_byte(types::type_code::TABLE);
                self.write_byte(0);
                self.write_byte(types::type_code::DICT);
                // Column names as a symbol vector, columns as a mixed list.
                let names: Vec<String> =
                    table.columns.iter().map(|(n, _)| n.clone()).collect();
                self.write_vector(&Vector::symbols(names))?;
                self.write_byte(types::type_code::MIXED_LIST);
                self.write_byte(0);
                self.write_count(table.columns.len())?;
                for (_, column) in &table.columns {
                    self.write_value(column)?;
                }
                Ok(())
            }
            Value::Dict(dict) => {
                self.write_byte(types::type_code::DICT);
                self.write_value(&dict.keys)?;
                self.write_value(&dict.values)
            }
            Value::Function(_) => Err(Error::serialize("cannot serialize a function value")),
        }
    }

    fn write_null(&mut self, kind: QKind) -> Result<()> {
        self.write_byte(kind.atom_byte());
        match kind {
            QKind::Boolean | QKind::Byte => self.write_byte(0),
            QKind::Guid => self.write_bytes(&types::NULL_GUID),
            QKind::Char => self.write_byte(types::NULL_CHAR),
            QKind::Symbol => self.write_byte(0),
            QKind::Short => self.write_i16(types::NULL_SHORT),
            QKind::Int | QKind::Month | QKind::Date | QKind::Minute | QKind::Second
            | QKind::Time => self.write_i32(types::NULL_INT),
            QKind::Long | QKind::Timestamp | QKind::Timespan => {
                self.write_i64(types::NULL_LONG)
            }
            QKind::Real => self.write_f32(f32::NAN),
            QKind::Float | QKind::Datetime => self.write_f64(f64::NAN),
        }
        Ok(())
    }

    fn write_vector(&mut self, vector: &Vector) -> Result<()> {
        self.write_byte(vector.kind().code());
        self.write_byte(vector.attr.as_byte());
        self.write_count(vector.len())?;
        match &vector.data {
            VectorData::Boolean(items) => {
                for b in items {
                    self.write_byte(u8::from(*b));
                }
            }
            VectorData::Guid(items) => {
                for g in items {
                    self.write_bytes(g);
                }
            }
            VectorData::Byte(items) => self.write_bytes(items),
            VectorData::Short(items) => {
                for v in items {
                    self.write_i16(*v);
                }
            }
            VectorData::Int(items)
            | VectorData::Month(items)
            | VectorData::Date(items)
            | VectorData::Minute(items)
            | VectorData::Second(items)
            | VectorData::Time(items) => {
                for v in items {
                    self.write_i32(*v);
                }
            }
            VectorData::Long(items)
            | VectorData::Timestamp(items)
            | VectorData::Timespan(items) => {
                for v in items {
                    self.write_i64(*v);
                }
            }
            VectorData::Real(items) => {
                for v in items {
                    self.write_f32(*v);
                }
            }
            VectorData::Float(items) | VectorData::Datetime(items) => {
                for v in items {
                    self.write_f64(*v);
                }
            }
            VectorData::Symbol(items) => {
                for s in items {
                    self.write_symbol(s);
                }
            }
        }
        Ok(())
    }
}
