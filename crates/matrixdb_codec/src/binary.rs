//! Compact tagged binary payload encoding.
//!
//! Each value is a one-byte type tag followed by little-endian fields.
//! The format is self-delimiting, so nested values need no framing
//! beyond their own tags. Decoding is strict: trailing bytes after the
//! root value are an error, since payload reads are sized exactly.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use bytes::{Buf, BufMut};

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_BYTES: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_ARRAY: u8 = 0x05;
const TAG_MAP: u8 = 0x06;

/// Encodes a value into the tagged binary format.
#[must_use]
pub fn to_binary(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf);
    buf
}

/// Decodes a value from the tagged binary format.
///
/// # Errors
///
/// Returns an error on an unknown tag, truncated input, invalid UTF-8,
/// or bytes remaining after the root value.
pub fn from_binary(bytes: &[u8]) -> CodecResult<Value> {
    let mut cursor = bytes;
    let value = decode_one(&mut cursor)?;
    if cursor.has_remaining() {
        return Err(CodecError::TrailingBytes(cursor.remaining()));
    }
    Ok(value)
}

fn encode_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.put_u8(TAG_NULL),
        Value::Bool(b) => {
            buf.put_u8(TAG_BOOL);
            buf.put_u8(u8::from(*b));
        }
        Value::Integer(n) => {
            buf.put_u8(TAG_INTEGER);
            buf.put_i64_le(*n);
        }
        Value::Bytes(b) => {
            buf.put_u8(TAG_BYTES);
            buf.put_u32_le(b.len() as u32);
            buf.put_slice(b);
        }
        Value::Text(s) => {
            buf.put_u8(TAG_TEXT);
            buf.put_u32_le(s.len() as u32);
            buf.put_slice(s.as_bytes());
        }
        Value::Array(items) => {
            buf.put_u8(TAG_ARRAY);
            buf.put_u32_le(items.len() as u32);
            for item in items {
                encode_into(item, buf);
            }
        }
        Value::Map(pairs) => {
            buf.put_u8(TAG_MAP);
            buf.put_u32_le(pairs.len() as u32);
            for (key, val) in pairs {
                buf.put_u32_le(key.len() as u32);
                buf.put_slice(key.as_bytes());
                encode_into(val, buf);
            }
        }
    }
}

fn need(cursor: &&[u8], needed: usize) -> CodecResult<()> {
    if cursor.remaining() < needed {
        return Err(CodecError::Truncated {
            needed: needed - cursor.remaining(),
            remaining: cursor.remaining(),
        });
    }
    Ok(())
}

fn take_bytes(cursor: &mut &[u8], len: usize) -> CodecResult<Vec<u8>> {
    need(cursor, len)?;
    let out = cursor[..len].to_vec();
    cursor.advance(len);
    Ok(out)
}

fn take_text(cursor: &mut &[u8], len: usize) -> CodecResult<String> {
    let bytes = take_bytes(cursor, len)?;
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}

fn decode_one(cursor: &mut &[u8]) -> CodecResult<Value> {
    need(cursor, 1)?;
    let tag = cursor.get_u8();
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_BOOL => {
            need(cursor, 1)?;
            Ok(Value::Bool(cursor.get_u8() != 0))
        }
        TAG_INTEGER => {
            need(cursor, 8)?;
            Ok(Value::Integer(cursor.get_i64_le()))
        }
        TAG_BYTES => {
            need(cursor, 4)?;
            let len = cursor.get_u32_le() as usize;
            Ok(Value::Bytes(take_bytes(cursor, len)?))
        }
        TAG_TEXT => {
            need(cursor, 4)?;
            let len = cursor.get_u32_le() as usize;
            Ok(Value::Text(take_text(cursor, len)?))
        }
        TAG_ARRAY => {
            need(cursor, 4)?;
            let count = cursor.get_u32_le() as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(decode_one(cursor)?);
            }
            Ok(Value::Array(items))
        }
        TAG_MAP => {
            need(cursor, 4)?;
            let count = cursor.get_u32_le() as usize;
            let mut pairs = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                need(cursor, 4)?;
                let key_len = cursor.get_u32_le() as usize;
                let key = take_text(cursor, key_len)?;
                let val = decode_one(cursor)?;
                pairs.push((key, val));
            }
            Ok(Value::Map(pairs))
        }
        other => Err(CodecError::InvalidTag(other)),
    }
}
