//! Base-record row codec.
//!
//! A row is a varint column count followed by one tagged entry per schema
//! column in schema order. Rows written under an older, shorter schema
//! decode with the missing trailing columns as NULL.

use crate::codec::geo::GeoPoint;
use crate::error::{LookupError, Result};
use crate::meta::{ColumnType, Schema};
use crate::primitives::bytes::buf::Cursor;
use crate::primitives::bytes::{ord, var};
use crate::value::{Date, DateTime, Time, Value};

const TYPE_NULL: u8 = 0;
const TYPE_BOOL: u8 = 1;
const TYPE_INT: u8 = 2;
const TYPE_FLOAT: u8 = 3;
const TYPE_STR: u8 = 4;
const TYPE_BYTES: u8 = 5;
const TYPE_DATE: u8 = 6;
const TYPE_TIME: u8 = 7;
const TYPE_DATETIME: u8 = 8;
const TYPE_GEO: u8 = 9;

/// Encodes `values` against `schema`, checking arity, nullability and types.
pub fn encode_row(schema: &Schema, values: &[Value]) -> Result<Vec<u8>> {
    if values.len() != schema.columns.len() {
        return Err(LookupError::invalid(format!(
            "row has {} values for {} columns",
            values.len(),
            schema.columns.len()
        )));
    }
    let mut bytes = Vec::with_capacity(values.len() * 8);
    var::encode_u64(values.len() as u64, &mut bytes);
    for (col, value) in schema.columns.iter().zip(values) {
        match (col.ty, value) {
            (_, Value::Null) if col.nullable => bytes.push(TYPE_NULL),
            (_, Value::Null) => {
                return Err(LookupError::InvalidFieldValue(format!(
                    "column '{}' is not nullable",
                    col.name
                )))
            }
            (ColumnType::Bool, Value::Bool(v)) => {
                bytes.push(TYPE_BOOL);
                bytes.push(u8::from(*v));
            }
            (ColumnType::Int, Value::Int(v)) => {
                bytes.push(TYPE_INT);
                var::encode_i64(*v, &mut bytes);
            }
            (ColumnType::Float, Value::Float(v)) => put_float(&mut bytes, *v),
            (ColumnType::Float, Value::Int(v)) => put_float(&mut bytes, *v as f64),
            (ColumnType::String, Value::String(s)) => put_bytes(&mut bytes, TYPE_STR, s.as_bytes()),
            (ColumnType::FixedString(n), Value::String(s)) => {
                let mut end = s.len().min(n as usize);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                put_bytes(&mut bytes, TYPE_STR, &s.as_bytes()[..end]);
            }
            (ColumnType::Date, Value::Date(d)) => {
                bytes.push(TYPE_DATE);
                bytes.extend_from_slice(&d.year.to_le_bytes());
                bytes.extend_from_slice(&[d.month, d.day]);
            }
            (ColumnType::Time, Value::Time(t)) => {
                bytes.push(TYPE_TIME);
                put_time(&mut bytes, t.hour, t.minute, t.sec, t.microsec);
            }
            (ColumnType::DateTime, Value::DateTime(dt)) => {
                bytes.push(TYPE_DATETIME);
                bytes.extend_from_slice(&dt.year.to_le_bytes());
                bytes.extend_from_slice(&[dt.month, dt.day]);
                put_time(&mut bytes, dt.hour, dt.minute, dt.sec, dt.microsec);
            }
            (ColumnType::Geography, Value::Geography(p)) => {
                bytes.push(TYPE_GEO);
                bytes.extend_from_slice(&p.lng.to_le_bytes());
                bytes.extend_from_slice(&p.lat.to_le_bytes());
            }
            (ty, v) => {
                return Err(LookupError::InvalidFieldValue(format!(
                    "column '{}' of type {:?} cannot hold {}",
                    col.name,
                    ty,
                    v.type_name()
                )))
            }
        }
    }
    Ok(bytes)
}

/// Decodes a row written by [`encode_row`] into one value per schema column.
pub fn decode_row(schema: &Schema, buf: &[u8]) -> Result<Vec<Value>> {
    let mut cur = Cursor::new(buf);
    let count = cur.var_u64()? as usize;
    if count > schema.columns.len() {
        return Err(LookupError::Corruption("row has more columns than schema"));
    }
    let mut values = Vec::with_capacity(schema.columns.len());
    for _ in 0..count {
        values.push(decode_entry(&mut cur)?);
    }
    values.resize(schema.columns.len(), Value::Null);
    Ok(values)
}

fn decode_entry(cur: &mut Cursor<'_>) -> Result<Value> {
    let value = match cur.byte()? {
        TYPE_NULL => Value::Null,
        TYPE_BOOL => match cur.byte()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(LookupError::Corruption("bool payload invalid")),
        },
        TYPE_INT => Value::Int(cur.var_i64()?),
        TYPE_FLOAT => Value::Float(read_f64(cur)?),
        TYPE_STR => {
            let len = cur.var_u64()? as usize;
            let raw = cur.take(len)?;
            let s = std::str::from_utf8(raw)
                .map_err(|_| LookupError::Corruption("string payload not valid UTF-8"))?;
            Value::String(s.to_owned())
        }
        TYPE_BYTES => {
            let len = cur.var_u64()? as usize;
            Value::Bytes(cur.take(len)?.to_vec())
        }
        TYPE_DATE => {
            let raw = cur.take(4)?;
            Value::Date(Date {
                year: i16::from_le_bytes([raw[0], raw[1]]),
                month: raw[2],
                day: raw[3],
            })
        }
        TYPE_TIME => {
            let raw = cur.take(7)?;
            Value::Time(Time {
                hour: raw[0],
                minute: raw[1],
                sec: raw[2],
                microsec: ord::get_u32_be(&raw[3..]),
            })
        }
        TYPE_DATETIME => {
            let raw = cur.take(11)?;
            Value::DateTime(DateTime {
                year: i16::from_le_bytes([raw[0], raw[1]]),
                month: raw[2],
                day: raw[3],
                hour: raw[4],
                minute: raw[5],
                sec: raw[6],
                microsec: ord::get_u32_be(&raw[7..]),
            })
        }
        TYPE_GEO => {
            let lng = read_f64(cur)?;
            let lat = read_f64(cur)?;
            Value::Geography(GeoPoint { lng, lat })
        }
        _ => return Err(LookupError::Corruption("unknown row value tag")),
    };
    Ok(value)
}

fn put_float(bytes: &mut Vec<u8>, v: f64) {
    bytes.push(TYPE_FLOAT);
    bytes.extend_from_slice(&v.to_le_bytes());
}

fn put_bytes(bytes: &mut Vec<u8>, tag: u8, payload: &[u8]) {
    bytes.push(tag);
    var::encode_u64(payload.len() as u64, bytes);
    bytes.extend_from_slice(payload);
}

fn put_time(bytes: &mut Vec<u8>, hour: u8, minute: u8, sec: u8, microsec: u32) {
    bytes.extend_from_slice(&[hour, minute, sec]);
    bytes.extend_from_slice(&microsec.to_be_bytes());
}

fn read_f64(cur: &mut Cursor<'_>) -> Result<f64> {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(cur.take(8)?);
    Ok(f64::from_le_bytes(arr))
}
