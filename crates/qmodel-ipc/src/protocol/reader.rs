//! Deserialize IPC binary into values.
//!
//! Decoding honors the endianness declared in the frame header, reconstructs
//! typed nulls for atoms, and raises a server error (`-128` body) as
//! [`qmodel_core::QError`]. Malformed input fails with a deserialization
//! error, never a panic.

use qmodel_core::types::{self, type_code, Attr, QKind};
use qmodel_core::value::Dict;
use qmodel_core::{Error, Result, Table, Value, Vector, VectorData};

use super::compress::decompress;
use super::{unpack_header, MsgType, HEADER_SIZE};

/// Decode a complete message (header + body), decompressing when the
/// header's compression flag is set. Returns the message kind and the body.
pub fn decode_message(data: &[u8]) -> Result<(MsgType, Value)> {
    let header = unpack_header(data)?;
    if (header.length as usize) != data.len() {
        return Err(Error::deserialize(format!(
            "frame length {} does not match received {} bytes",
            header.length,
            data.len()
        )));
    }
    if header.compressed {
        let full = decompress(&data[HEADER_SIZE..], &data[..HEADER_SIZE])?;
        let value = decode_payload(&full[HEADER_SIZE..], header.little_endian)?;
        return Ok((header.msg_type, value));
    }
    let value = decode_payload(&data[HEADER_SIZE..], header.little_endian)?;
    Ok((header.msg_type, value))
}

/// Decode a bare body (no header).
pub fn decode_payload(payload: &[u8], little_endian: bool) -> Result<Value> {
    let mut cur = Cursor::new(payload, little_endian);
    let value = cur.read_value()?;
    Ok(value)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    le: bool,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], le: bool) -> Self {
        Self { buf, pos: 0, le }
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn read_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(Error::deserialize("unexpected end of buffer"));
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::deserialize("unexpected end of buffer"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_i16(&mut self) -> Result<i16> {
        let b: [u8; 2] = self.read_bytes(2)?.try_into().unwrap_or_default();
        Ok(if self.le {
            i16::from_le_bytes(b)
        } else {
            i16::from_be_bytes(b)
        })
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b: [u8; 4] = self.read_bytes(4)?.try_into().unwrap_or_default();
        Ok(if self.le {
            i32::from_le_bytes(b)
        } else {
            i32::from_be_bytes(b)
        })
    }

    fn read_i64(&mut self) -> Result<i64> {
        let b: [u8; 8] = self.read_bytes(8)?.try_into().unwrap_or_default();
        Ok(if self.le {
            i64::from_le_bytes(b)
        } else {
            i64::from_be_bytes(b)
        })
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    fn read_symbol(&mut self) -> Result<String> {
        let start = self.pos;
        while self.pos < self.buf.len() && self.buf[self.pos] != 0 {
            self.pos += 1;
        }
        if self.pos >= self.buf.len() {
            return Err(Error::deserialize("unterminated symbol"));
        }
        let bytes = &self.buf[start..self.pos];
        self.pos += 1; // consume terminator
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::deserialize(format!("invalid utf-8 in symbol: {e}")))
    }

    /// Vector element count, validated against the bytes left so a bogus
    /// count cannot trigger a huge allocation.
    fn read_count(&mut self, min_element_size: usize) -> Result<usize> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(Error::deserialize(format!("negative count: {count}")));
        }
        let count = count as usize;
        if min_element_size > 0 && count.saturating_mul(min_element_size) > self.remaining() {
            return Err(Error::deserialize(format!(
                "count {count} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        Ok(count)
    }

    fn read_value(&mut self) -> Result<Value> {
        let type_byte = self.read_u8()?;

        if type_byte == type_code::ERROR {
            let message = self.read_symbol()?;
            return Err(Error::q(message));
        }
        if type_byte > 128 {
            // Negative atom code; recover the positive kind.
            let code = 0u8.wrapping_sub(type_byte);
            let kind = QKind::from_code(code).ok_or_else(|| {
                Error::deserialize(format!("unknown atom type code: -{code}"))
            })?;
            return self.read_atom(kind);
        }
        match type_byte {
            type_code::MIXED_LIST => self.read_mixed_list(),
            1..=19 => {
                let kind = QKind::from_code(type_byte)
                    .ok_or_else(|| Error::deserialize(format!("bad vector code {type_byte}")))?;
                self.read_vector(kind)
            }
            // Enumerated vectors are int32 indexes into a symbol domain.
            20..=76 => {
                let _attr = self.read_u8()?;
                let count = self.read_count(4)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_i32()?);
                }
                Ok(Value::Vector(Vector::ints(items)))
            }
            type_code::TABLE => self.read_table(),
            type_code::DICT | type_code::SORTED_DICT => self.read_dict(),
            type_code::LAMBDA => {
                let _namespace = self.read_symbol()?;
                let body = self.read_value()?;
                let text = match body {
                    Value::String(s) => s,
                    other => format!("{other:?}"),
                };
                Ok(Value::Function(text))
            }
            type_code::UNARY_PRIM..=type_code::FUNC_LAST => {
                // Operator/projection atoms carry a single code byte.
                let code = self.read_u8()?;
                Ok(Value::Function(format!(
                    "<function type {type_byte} code {code}>"
                )))
            }
            other => Err(Error::deserialize(format!("unknown type byte: {other}"))),
        }
    }

    fn read_atom(&mut self, kind: QKind) -> Result<Value> {
        Ok(match kind {
            QKind::Boolean => Value::Bool(self.read_u8()? != 0),
            QKind::Byte => Value::Byte(self.read_u8()?),
            QKind::Guid => {
                let raw: [u8; 16] = self.read_bytes(16)?.try_into().unwrap_or_default();
                if raw == types::NULL_GUID {
                    Value::Null(QKind::Guid)
                } else {
                    Value::Guid(raw)
                }
            }
            QKind::Char => {
                let b = self.read_u8()?;
                if b == types::NULL_CHAR {
                    Value::Null(QKind::Char)
                } else {
                    Value::Char(b)
                }
            }
            QKind::Symbol => {
                let s = self.read_symbol()?;
                if s.is_empty() {
                    Value::Null(QKind::Symbol)
                } else {
                    Value::Symbol(s)
                }
            }
            QKind::Short => null_or(self.read_i16()?, types::is_null_i16, kind, Value::Short),
            QKind::Int => null_or(self.read_i32()?, types::is_null_i32, kind, Value::Int),
            QKind::Long => null_or(self.read_i64()?, types::is_null_i64, kind, Value::Long),
            QKind::Real => null_or(self.read_f32()?, types::is_null_f32, kind, Value::Real),
            QKind::Float => null_or(self.read_f64()?, types::is_null_f64, kind, Value::Float),
            QKind::Timestamp => {
                null_or(self.read_i64()?, types::is_null_i64, kind, Value::Timestamp)
            }
            QKind::Month => null_or(self.read_i32()?, types::is_null_i32, kind, Value::Month),
            QKind::Date => null_or(self.read_i32()?, types::is_null_i32, kind, Value::Date),
            QKind::Datetime => {
                null_or(self.read_f64()?, types::is_null_f64, kind, Value::Datetime)
            }
            QKind::Timespan => {
                null_or(self.read_i64()?, types::is_null_i64, kind, Value::Timespan)
            }
            QKind::Minute => null_or(self.read_i32()?, types::is_null_i32, kind, Value::Minute),
            QKind::Second => null_or(self.read_i32()?, types::is_null_i32, kind, Value::Second),
            QKind::Time => null_or(self.read_i32()?, types::is_null_i32, kind, Value::Time),
        })
    }

    fn read_mixed_list(&mut self) -> Result<Value> {
        let _attr = self.read_u8()?;
        let count = self.read_count(1)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_value()?);
        }
        Ok(Value::List(items))
    }

    fn read_vector(&mut self, kind: QKind) -> Result<Value> {
        let attr = Attr::from_byte(self.read_u8()?).unwrap_or(Attr::None);

        if kind == QKind::Char {
            let count = self.read_count(1)?;
            let bytes = self.read_bytes(count)?;
            let text = String::from_utf8_lossy(bytes).into_owned();
            return Ok(Value::String(text));
        }

        let min = kind.width().unwrap_or(1);
        let count = self.read_count(min)?;

        let data = match kind {
            QKind::Boolean => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_u8()? != 0);
                }
                VectorData::Boolean(items)
            }
            QKind::Guid => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_bytes(16)?.try_into().unwrap_or_default());
                }
                VectorData::Guid(items)
            }
            QKind::Byte => VectorData::Byte(self.read_bytes(count)?.to_vec()),
            QKind::Symbol => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_symbol()?);
                }
                VectorData::Symbol(items)
            }
            QKind::Short => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_i16()?);
                }
                VectorData::Short(items)
            }
            QKind::Int => VectorData::Int(self.read_i32s(count)?),
            QKind::Month => VectorData::Month(self.read_i32s(count)?),
            QKind::Date => VectorData::Date(self.read_i32s(count)?),
            QKind::Minute => VectorData::Minute(self.read_i32s(count)?),
            QKind::Second => VectorData::Second(self.read_i32s(count)?),
            QKind::Time => VectorData::Time(self.read_i32s(count)?),
            QKind::Long => VectorData::Long(self.read_i64s(count)?),
            QKind::Timestamp => VectorData::Timestamp(self.read_i64s(count)?),
            QKind::Timespan => VectorData::Timespan(self.read_i64s(count)?),
            QKind::Real => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_f32()?);
                }
                VectorData::Real(items)
            }
            QKind::Float => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_f64()?);
                }
                VectorData::Float(items)
            }
            QKind::Datetime => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_f64()?);
                }
                VectorData::Datetime(items)
            }
            QKind::Char => unreachable!("char vectors handled above"),
        };
        Ok(Value::Vector(Vector { attr, data }))
    }

    fn read_i32s(&mut self, count: usize) -> Result<Vec<i32>> {
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_i32()?);
        }
        Ok(items)
    }

    fn read_i64s(&mut self, count: usize) -> Result<Vec<i64>> {
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_i64()?);
        }
        Ok(items)
    }

    fn read_table(&mut self) -> Result<Value> {
        let _attr = self.read_u8()?;
        let inner = self.read_value()?;
        let dict = match inner {
            Value::Dict(d) => *d,
            other => {
                return Err(Error::deserialize(format!(
                    "table body is not a dict: {other:?}"
                )))
            }
        };
        let names = dict.keys.symbol_list();
        let columns = match dict.values {
            Value::List(items) => items,
            other => {
                return Err(Error::deserialize(format!(
                    "table columns are not a list: {other:?}"
                )))
            }
        };
        if names.len() != columns.len() {
            return Err(Error::deserialize(format!(
                "table has {} names but {} columns",
                names.len(),
                columns.len()
            )));
        }
        Ok(Value::Table(Table::new(
            names.into_iter().zip(columns).collect(),
        )))
    }

    fn read_dict(&mut self) -> Result<Value> {
        let keys = self.read_value()?;
        let values = self.read_value()?;
        Ok(Value::Dict(Box::new(Dict::new(keys, values))))
    }
}

fn null_or<T>(
    raw: T,
    is_null: impl Fn(T) -> bool,
    kind: QKind,
    wrap: impl Fn(T) -> Value,
) -> Value
where
    T: Copy,
{
    if is_null(raw) {
        Value::Null(kind)
    } else {
        wrap(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::super::Serializer;
    use super::*;
    use qmodel_core::types::{NULL_INT, NULL_LONG};

    fn roundtrip(value: &Value) -> Value {
        let mut ser = Serializer::new();
        let msg = ser.serialize_message(value, MsgType::Sync).unwrap();
        let (msg_type, decoded) = decode_message(&msg).unwrap();
        assert_eq!(msg_type, MsgType::Sync);
        decoded
    }

    #[test]
    fn atoms_roundtrip() {
        let atoms = vec![
            Value::Bool(true),
            Value::Guid([7; 16]),
            Value::Byte(0xfe),
            Value::Short(-2),
            Value::Int(1_000_000),
            Value::Long(5),
            Value::Real(1.5),
            Value::Float(150.25),
            Value::Char(b'q'),
            Value::Symbol("AAPL".into()),
            Value::Timestamp(1_234_567_890),
            Value::Month(313),
            Value::Date(9_552),
            Value::Datetime(9_552.5),
            Value::Timespan(-7),
            Value::Minute(631),
            Value::Second(37_805),
            Value::Time(37_805_123),
        ];
        for atom in atoms {
            assert_eq!(roundtrip(&atom), atom, "atom {atom:?}");
        }
    }

    #[test]
    fn typed_nulls_roundtrip_with_kind() {
        for kind in QKind::ALL {
            if matches!(kind, QKind::Boolean | QKind::Byte) {
                continue; // no null sentinel for these kinds
            }
            let decoded = roundtrip(&Value::Null(*kind));
            assert_eq!(decoded, Value::Null(*kind), "null {kind:?}");
        }
    }

    #[test]
    fn nulls_are_distinct_across_kinds() {
        assert_ne!(
            roundtrip(&Value::Null(QKind::Long)),
            roundtrip(&Value::Null(QKind::Date))
        );
    }

    #[test]
    fn vectors_roundtrip_with_attributes() {
        let vectors = vec![
            Value::Vector(Vector::longs(vec![1, NULL_LONG, 3]).with_attr(Attr::Sorted)),
            Value::Vector(Vector::floats(vec![150.25, 2800.0])),
            Value::Vector(
                Vector::symbols(vec!["AAPL".into(), "GOOG".into()]).with_attr(Attr::Unique),
            ),
            Value::Vector(Vector::booleans(vec![true, false, true])),
            Value::Vector(Vector::new(VectorData::Date(vec![9_552, NULL_INT]))),
            Value::Vector(Vector::new(VectorData::Guid(vec![[1; 16], [0; 16]]))),
            Value::Vector(Vector::new(VectorData::Byte(vec![1, 2, 3]))),
        ];
        for v in vectors {
            assert_eq!(roundtrip(&v), v, "vector {v:?}");
        }
    }

    #[test]
    fn mixed_list_roundtrip() {
        let list = Value::List(vec![
            Value::string("2+3"),
            Value::Symbol("trade".into()),
            Value::Long(42),
        ]);
        assert_eq!(roundtrip(&list), list);
    }

    #[test]
    fn table_roundtrip() {
        let table = Value::Table(Table::new(vec![
            (
                "sym".into(),
                Value::Vector(Vector::symbols(vec!["AAPL".into(), "GOOG".into()])),
            ),
            (
                "price".into(),
                Value::Vector(Vector::floats(vec![150.25, 2800.0])),
            ),
        ]));
        assert_eq!(roundtrip(&table), table);
    }

    #[test]
    fn keyed_table_roundtrip() {
        let keys = Table::new(vec![(
            "sym".into(),
            Value::Vector(Vector::symbols(vec!["AAPL".into()])),
        )]);
        let values = Table::new(vec![(
            "close".into(),
            Value::Vector(Vector::floats(vec![150.0])),
        )]);
        let dict = Value::Dict(Box::new(Dict::new(
            Value::Table(keys),
            Value::Table(values),
        )));
        assert_eq!(roundtrip(&dict), dict);
    }

    #[test]
    fn error_body_raises_qerror() {
        // -128 body: "type" error.
        let mut msg = vec![0u8; 8];
        msg.push(type_code::ERROR);
        msg.extend_from_slice(b"type\0");
        let total = msg.len() as u32;
        msg[..8].copy_from_slice(&super::super::pack_header(MsgType::Response, total));

        let err = decode_message(&msg).unwrap_err();
        match err {
            Error::Q(q) => assert_eq!(q.message, "type"),
            other => panic!("expected q error, got {other:?}"),
        }
    }

    #[test]
    fn truncated_vector_is_an_error() {
        let mut ser = Serializer::new();
        let msg = ser
            .serialize_message(&Value::Vector(Vector::longs(vec![1, 2, 3])), MsgType::Sync)
            .unwrap();
        // Chop the last element but keep the header length consistent.
        let cut = &msg[8..msg.len() - 4];
        assert!(decode_payload(cut, true).is_err());
    }

    #[test]
    fn oversized_count_is_rejected() {
        let mut body = vec![7u8, 0]; // long vector, no attr
        body.extend_from_slice(&i32::MAX.to_le_bytes());
        assert!(decode_payload(&body, true).is_err());
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        assert!(decode_payload(&[97], true).is_err());
    }

    #[test]
    fn big_endian_frames_decode() {
        // Long atom 5 in a big-endian frame.
        let mut msg = vec![super::super::BIG_ENDIAN, 2, 0, 0, 0, 0, 0, 17];
        msg.push(QKind::Long.atom_byte());
        msg.extend_from_slice(&5i64.to_be_bytes());
        let (_, value) = decode_message(&msg).unwrap();
        assert_eq!(value, Value::Long(5));
    }
}
