// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! BIPF (binary in-place format) codec.
//!
//! Every value is `varint(length << 3 | type)` followed by `length` bytes:
//!
//! | type | meaning  | body                                   |
//! |------|----------|----------------------------------------|
//! | 0    | string   | UTF-8 bytes                            |
//! | 1    | buffer   | raw bytes                              |
//! | 2    | int      | i32, little endian                     |
//! | 3    | double   | f64, little endian                     |
//! | 4    | array    | concatenated values                    |
//! | 5    | object   | concatenated key, value pairs          |
//! | 6    | boolnull | empty = null, one byte = bool          |
//!
//! The varint is unsigned LEB128. Because lengths are explicit, a single
//! field can be located with [`seek_key`] without decoding its siblings.

const STRING: u8 = 0;
const BUFFER: u8 = 1;
const INT: u8 = 2;
const DOUBLE: u8 = 3;
const ARRAY: u8 = 4;
const OBJECT: u8 = 5;
const BOOLNULL: u8 = 6;

const TYPE_BITS: u32 = 3;
const TYPE_MASK: u64 = 0b111;

/// Deepest array/object nesting [`decode`] accepts.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BipfError {
    #[error("value at byte {0} runs past the end of the buffer")]
    Truncated(usize),

    #[error("varint at byte {0} is too long")]
    VarintOverflow(usize),

    #[error("unknown type tag {tag} at byte {pos}")]
    UnknownType { tag: u8, pos: usize },

    #[error("string at byte {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("bad length {len} for fixed-size type at byte {pos}")]
    BadLength { len: usize, pos: usize },

    #[error("object key at byte {0} is not a string")]
    NonStringKey(usize),

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("value at byte {0} is nested deeper than {MAX_DEPTH} levels")]
    TooDeep(usize),
}

pub type BipfResult<T> = Result<T, BipfError>;

/// A decoded BIPF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    Buffer(Vec<u8>),
    Array(Vec<Value>),
    /// Fields in encoded order.
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Look up a field of an object value.
    #[cfg(test)]
    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Convert from JSON. Integers that fit in an i32 become [`Value::Int`].
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. Buffers become arrays of byte values.
    #[cfg(test)]
    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Buffer(bytes) => serde_json::Value::from(bytes.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value into a fresh buffer.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => write_tag(out, 0, BOOLNULL),
        Value::Bool(b) => {
            write_tag(out, 1, BOOLNULL);
            out.push(u8::from(*b));
        }
        Value::Int(i) => {
            write_tag(out, 4, INT);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Double(d) => {
            write_tag(out, 8, DOUBLE);
            out.extend_from_slice(&d.to_le_bytes());
        }
        Value::String(s) => {
            write_tag(out, s.len(), STRING);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Buffer(bytes) => {
            write_tag(out, bytes.len(), BUFFER);
            out.extend_from_slice(bytes);
        }
        Value::Array(items) => {
            let mut body = Vec::new();
            for item in items {
                encode_into(item, &mut body);
            }
            write_tag(out, body.len(), ARRAY);
            out.extend_from_slice(&body);
        }
        Value::Object(fields) => {
            let mut body = Vec::new();
            for (key, item) in fields {
                write_tag(&mut body, key.len(), STRING);
                body.extend_from_slice(key.as_bytes());
                encode_into(item, &mut body);
            }
            write_tag(out, body.len(), OBJECT);
            out.extend_from_slice(&body);
        }
    }
}

fn write_tag(out: &mut Vec<u8>, len: usize, ty: u8) {
    let mut tag = ((len as u64) << TYPE_BITS) | u64::from(ty);
    loop {
        let byte = (tag & 0x7f) as u8;
        tag >>= 7;
        if tag == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Header of an encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    ty: u8,
    len: usize,
    /// Position of the first body byte.
    body: usize,
}

impl Header {
    fn end(&self) -> usize {
        self.body + self.len
    }
}

fn read_header(buf: &[u8], pos: usize) -> BipfResult<Header> {
    let mut tag: u64 = 0;
    let mut shift = 0u32;
    let mut cursor = pos;
    loop {
        let byte = *buf.get(cursor).ok_or(BipfError::Truncated(pos))?;
        cursor += 1;
        if shift >= 63 {
            return Err(BipfError::VarintOverflow(pos));
        }
        tag |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let header = Header {
        ty: (tag & TYPE_MASK) as u8,
        len: usize::try_from(tag >> TYPE_BITS).map_err(|_| BipfError::VarintOverflow(pos))?,
        body: cursor,
    };
    match header.body.checked_add(header.len) {
        Some(end) if end <= buf.len() => Ok(header),
        _ => Err(BipfError::Truncated(pos)),
    }
}

/// Decode a buffer that holds exactly one value.
pub fn decode(buf: &[u8]) -> BipfResult<Value> {
    let (value, end) = decode_at(buf, 0)?;
    if end != buf.len() {
        return Err(BipfError::TrailingBytes(buf.len() - end));
    }
    Ok(value)
}

/// Decode the value starting at `pos`; returns it with the position after it.
pub fn decode_at(buf: &[u8], pos: usize) -> BipfResult<(Value, usize)> {
    decode_nested(buf, pos, 0)
}

fn decode_nested(buf: &[u8], pos: usize, depth: usize) -> BipfResult<(Value, usize)> {
    let header = read_header(buf, pos)?;
    let body = &buf[header.body..header.end()];

    let value = match header.ty {
        STRING => Value::String(
            std::str::from_utf8(body)
                .map_err(|_| BipfError::InvalidUtf8(pos))?
                .to_string(),
        ),
        BUFFER => Value::Buffer(body.to_vec()),
        INT => {
            let bytes: [u8; 4] = body
                .try_into()
                .map_err(|_| BipfError::BadLength { len: header.len, pos })?;
            Value::Int(i32::from_le_bytes(bytes))
        }
        DOUBLE => {
            let bytes: [u8; 8] = body
                .try_into()
                .map_err(|_| BipfError::BadLength { len: header.len, pos })?;
            Value::Double(f64::from_le_bytes(bytes))
        }
        BOOLNULL => match body {
            [] => Value::Null,
            [b] => Value::Bool(*b != 0),
            _ => return Err(BipfError::BadLength { len: header.len, pos }),
        },
        ARRAY | OBJECT if depth >= MAX_DEPTH => return Err(BipfError::TooDeep(pos)),
        ARRAY => {
            let mut items = Vec::new();
            let mut cursor = header.body;
            while cursor < header.end() {
                let (item, next) = decode_nested(&buf[..header.end()], cursor, depth + 1)?;
                items.push(item);
                cursor = next;
            }
            Value::Array(items)
        }
        OBJECT => {
            let mut fields = Vec::new();
            let mut cursor = header.body;
            while cursor < header.end() {
                let scope = &buf[..header.end()];
                let (key, next) = decode_nested(scope, cursor, depth + 1)?;
                let Value::String(key) = key else {
                    return Err(BipfError::NonStringKey(cursor));
                };
                let (item, next) = decode_nested(scope, next, depth + 1)?;
                fields.push((key, item));
                cursor = next;
            }
            Value::Object(fields)
        }
        tag => return Err(BipfError::UnknownType { tag, pos }),
    };
    Ok((value, header.end()))
}

/// Find the value stored under `key` in the object at `start`.
///
/// Returns the position of the value's header, or `None` if the object
/// has no such field or the value at `start` is not an object. Sibling
/// values are skipped by length, never decoded.
pub fn seek_key(buf: &[u8], start: usize, key: &[u8]) -> BipfResult<Option<usize>> {
    let object = read_header(buf, start)?;
    if object.ty != OBJECT {
        return Ok(None);
    }

    let mut cursor = object.body;
    while cursor < object.end() {
        let key_header = read_header(buf, cursor)?;
        let value_pos = key_header.end();
        let value_header = read_header(buf, value_pos)?;
        if value_header.end() > object.end() {
            return Err(BipfError::Truncated(value_pos));
        }
        if key_header.ty == STRING && &buf[key_header.body..key_header.end()] == key {
            return Ok(Some(value_pos));
        }
        cursor = value_header.end();
    }
    Ok(None)
}

/// Raw body bytes of a string or buffer value at `pos`.
pub fn bytes_at(buf: &[u8], pos: usize) -> BipfResult<Option<&[u8]>> {
    let header = read_header(buf, pos)?;
    match header.ty {
        STRING | BUFFER => Ok(Some(&buf[header.body..header.end()])),
        _ => Ok(None),
    }
}

/// Builders for hand-made encodings.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// `depth + 1` nested empty arrays, built without recursion.
    pub(crate) fn nested_arrays(depth: usize) -> Vec<u8> {
        // Built back to front so each level only adds its header.
        let mut reversed = Vec::new();
        for _ in 0..=depth {
            let mut tag = Vec::new();
            write_tag(&mut tag, reversed.len(), ARRAY);
            reversed.extend(tag.iter().rev());
        }
        reversed.reverse();
        reversed
    }

    /// Object whose field values are already encoded.
    pub(crate) fn raw_object(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (key, value) in fields {
            encode_into(&Value::String(key.to_string()), &mut body);
            body.extend_from_slice(value);
        }
        let mut out = Vec::new();
        write_tag(&mut out, body.len(), OBJECT);
        out.extend_from_slice(&body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::testing::nested_arrays;
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        Value::from_json(&json!({
            "key": "%abc.sha256",
            "value": {
                "author": "@xyz.ed25519",
                "sequence": 12,
                "content": {"type": "post", "text": "hello", "mentions": [1, 2.5, null, true]}
            },
            "timestamp": 1_600_000_000_123_i64
        }))
    }

    #[test]
    fn small_values_have_known_encodings() {
        assert_eq!(encode(&Value::Null), vec![0x06]);
        assert_eq!(encode(&Value::Bool(true)), vec![0x0e, 0x01]);
        assert_eq!(encode(&Value::String("hi".into())), vec![0x10, b'h', b'i']);
        assert_eq!(encode(&Value::Int(1)), vec![0x22, 1, 0, 0, 0]);
    }

    #[test]
    fn long_lengths_use_multi_byte_varints() {
        let long = "x".repeat(300);
        let encoded = encode(&Value::String(long.clone()));
        // 300 << 3 = 2400 needs two varint bytes.
        assert_eq!(encoded.len(), 302);
        assert_eq!(decode(&encoded).unwrap(), Value::String(long));
    }

    #[test]
    fn nested_structures_decode_back() {
        let value = sample();
        assert_eq!(decode(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn large_integers_become_doubles() {
        let value = sample();
        assert!(matches!(value.get("timestamp"), Some(Value::Double(_))));
        assert_eq!(
            value.get("value").and_then(|v| v.get("sequence")),
            Some(&Value::Int(12))
        );
    }

    #[test]
    fn seek_key_finds_top_level_field() {
        let buf = encode(&sample());
        let pos = seek_key(&buf, 0, b"timestamp").unwrap().unwrap();
        let (value, _) = decode_at(&buf, pos).unwrap();
        assert_eq!(value, Value::Double(1_600_000_000_123.0));

        let key_pos = seek_key(&buf, 0, b"key").unwrap().unwrap();
        assert_eq!(bytes_at(&buf, key_pos).unwrap(), Some(&b"%abc.sha256"[..]));
    }

    #[test]
    fn seek_key_ignores_nested_fields() {
        let buf = encode(&sample());
        assert_eq!(seek_key(&buf, 0, b"author").unwrap(), None);
        assert_eq!(seek_key(&encode(&Value::Int(3)), 0, b"key").unwrap(), None);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let buf = encode(&sample());
        let cut = &buf[..buf.len() - 3];
        assert!(matches!(decode(cut), Err(BipfError::Truncated(_))));
    }

    #[test]
    fn trailing_bytes_are_an_error() {
        let mut buf = encode(&Value::Null);
        buf.push(0);
        assert_eq!(decode(&buf), Err(BipfError::TrailingBytes(1)));
    }

    #[test]
    fn reserved_type_is_rejected() {
        assert!(matches!(
            decode(&[0x07]),
            Err(BipfError::UnknownType { tag: 7, pos: 0 })
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        assert!(decode(&nested_arrays(MAX_DEPTH - 1)).is_ok());
        assert!(matches!(
            decode(&nested_arrays(MAX_DEPTH)),
            Err(BipfError::TooDeep(_))
        ));
        assert!(matches!(
            decode(&nested_arrays(20_000)),
            Err(BipfError::TooDeep(_))
        ));
    }

    #[test]
    fn json_conversion_preserves_shape() {
        let json = json!({"a": [1, "two", false], "b": {"c": null}});
        assert_eq!(Value::from_json(&json).to_json(), json);
    }
}
