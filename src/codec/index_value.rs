//! Order-preserving encoding of single column values inside index keys.
//!
//! Every type has a fixed encoded width so that index keys have a fixed
//! length per index. Strings are NUL-padded or truncated to the declared
//! width; a string whose last encoded byte is not NUL may have been
//! truncated and cannot be compared for equality from its bytes alone.
//! NULL encodes as a run of `0xFF` of the field width, and NaN floats
//! encode as eight `0xFF` bytes, so both collide with the largest encodable
//! value of their type.

use crate::error::{LookupError, Result};
use crate::meta::ColumnType;
use crate::primitives::bytes::ord;
use crate::value::{Date, DateTime, Time, Value};

use super::geo::CELL_ID_LEN;

const BOOL_LEN: usize = 1;
const NUM_LEN: usize = 8;
const DATE_LEN: usize = 4;
const TIME_LEN: usize = 7;
const DATETIME_LEN: usize = 11;

/// Width of a field of type `ty` inside an index key.
///
/// String widths come from `len`; a `FixedString(n)` without an explicit
/// index width uses `n`.
pub fn encoded_len(ty: ColumnType, len: Option<u16>) -> usize {
    match ty {
        ColumnType::Bool => BOOL_LEN,
        ColumnType::Int | ColumnType::Float => NUM_LEN,
        ColumnType::String => len.unwrap_or(0) as usize,
        ColumnType::FixedString(n) => len.unwrap_or(n) as usize,
        ColumnType::Date => DATE_LEN,
        ColumnType::Time => TIME_LEN,
        ColumnType::DateTime => DATETIME_LEN,
        ColumnType::Geography => CELL_ID_LEN,
    }
}

/// NULL sentinel for a field.
pub fn encode_null(ty: ColumnType, len: Option<u16>) -> Vec<u8> {
    vec![0xFF; encoded_len(ty, len)]
}

/// Encodes a non-null value for a field of type `ty`.
///
/// Ints are accepted for float fields. Geography fields take the raw cell id
/// bytes carried by [`Value::Bytes`]; points must go through the covering in
/// [`super::geo`] instead.
pub fn encode_value(value: &Value, ty: ColumnType, len: Option<u16>) -> Result<Vec<u8>> {
    let mut out = vec![0u8; encoded_len(ty, len)];
    match (ty, value) {
        (ColumnType::Bool, Value::Bool(b)) => out[0] = u8::from(*b),
        (ColumnType::Int, Value::Int(v)) => ord::put_i64_be(&mut out, *v),
        (ColumnType::Float, Value::Float(v)) => ord::put_f64_be(&mut out, *v),
        (ColumnType::Float, Value::Int(v)) => ord::put_f64_be(&mut out, *v as f64),
        (ColumnType::String | ColumnType::FixedString(_), Value::String(s)) => {
            let bytes = s.as_bytes();
            let n = bytes.len().min(out.len());
            out[..n].copy_from_slice(&bytes[..n]);
        }
        (ColumnType::Date, Value::Date(d)) => put_date(&mut out, d),
        (ColumnType::Time, Value::Time(t)) => put_time(&mut out, t),
        (ColumnType::DateTime, Value::DateTime(dt)) => {
            put_date(
                &mut out,
                &Date {
                    year: dt.year,
                    month: dt.month,
                    day: dt.day,
                },
            );
            put_time(
                &mut out[DATE_LEN..],
                &Time {
                    hour: dt.hour,
                    minute: dt.minute,
                    sec: dt.sec,
                    microsec: dt.microsec,
                },
            );
        }
        (ColumnType::Geography, Value::Bytes(cell)) if cell.len() == CELL_ID_LEN => {
            out.copy_from_slice(cell);
        }
        _ => {
            return Err(LookupError::InvalidFieldValue(format!(
                "cannot encode {} value as {:?}",
                value.type_name(),
                ty
            )))
        }
    }
    Ok(out)
}

/// Decodes one field. Strings stop at the first NUL; geography yields the cell id bytes.
pub fn decode_value(raw: &[u8], ty: ColumnType, len: Option<u16>) -> Result<Value> {
    if raw.len() != encoded_len(ty, len) {
        return Err(LookupError::Corruption("index field width mismatch"));
    }
    let value = match ty {
        ColumnType::Bool => Value::Bool(raw[0] != 0),
        ColumnType::Int => Value::Int(ord::get_i64_be(raw)),
        ColumnType::Float => Value::Float(ord::get_f64_be(raw)),
        ColumnType::String | ColumnType::FixedString(_) => {
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            let s = std::str::from_utf8(&raw[..end])
                .map_err(|_| LookupError::Corruption("index string not valid UTF-8"))?;
            Value::String(s.to_owned())
        }
        ColumnType::Date => Value::Date(get_date(raw)),
        ColumnType::Time => Value::Time(get_time(raw)),
        ColumnType::DateTime => {
            let d = get_date(raw);
            let t = get_time(&raw[DATE_LEN..]);
            Value::DateTime(DateTime {
                year: d.year,
                month: d.month,
                day: d.day,
                hour: t.hour,
                minute: t.minute,
                sec: t.sec,
                microsec: t.microsec,
            })
        }
        ColumnType::Geography => Value::Bytes(raw.to_vec()),
    };
    Ok(value)
}

/// True when an encoded string fills its full width, meaning the source
/// value may have been longer than the field.
pub fn is_full_string(encoded: &[u8]) -> bool {
    encoded.last().is_some_and(|b| *b != 0)
}

/// True when every byte is `0xFF`, the NULL and NaN sentinel pattern.
pub fn is_all_ones(encoded: &[u8]) -> bool {
    encoded.iter().all(|b| *b == 0xFF)
}

fn put_date(dst: &mut [u8], d: &Date) {
    ord::put_i16_be(dst, d.year);
    dst[2] = d.month;
    dst[3] = d.day;
}

fn get_date(src: &[u8]) -> Date {
    Date {
        year: ord::get_i16_be(src),
        month: src[2],
        day: src[3],
    }
}

fn put_time(dst: &mut [u8], t: &Time) {
    dst[0] = t.hour;
    dst[1] = t.minute;
    dst[2] = t.sec;
    ord::put_u32_be(&mut dst[3..], t.microsec);
}

fn get_time(src: &[u8]) -> Time {
    Time {
        hour: src[0],
        minute: src[1],
        sec: src[2],
        microsec: ord::get_u32_be(&src[3..]),
    }
}
