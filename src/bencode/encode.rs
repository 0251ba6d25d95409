use bytes::Bytes;

use super::error::EncodeError;
use super::value::Value;

/// Encodes a bencode value to a byte vector.
///
/// The output is canonical:
/// - Integers: `i<number>e`, no leading zeros, never `-0`
/// - Byte strings: `<length>:<data>`, length in bytes
/// - Lists: `l<items>e`, in order
/// - Dictionaries: `d<key><value>...e`, keys ascending by unsigned byte value
///
/// # Errors
///
/// Returns [`EncodeError::DuplicateKeyAfterSort`] if a dictionary yields keys
/// that are not strictly ascending.
///
/// # Examples
///
/// ```
/// use metaforge::bencode::{encode, Value};
/// use std::collections::BTreeMap;
/// use bytes::Bytes;
///
/// let mut dict = BTreeMap::new();
/// let numbers = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
/// dict.insert(Bytes::from_static(b"b"), Value::List(numbers));
/// dict.insert(Bytes::from_static(b"a"), Value::Integer(1));
/// dict.insert(Bytes::from_static(b"c"), Value::string("foo"));
///
/// let encoded = encode(&Value::Dict(dict)).unwrap();
/// assert_eq!(encoded, b"d1:ai1e1:bli1ei2ei3ee1:c3:fooe");
/// ```
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf)?;
    Ok(buf)
}

/// Encodes a bencode value, appending to `buf`.
///
/// On error `buf` may hold a partial encoding.
pub fn encode_into(value: &Value, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    match value {
        Value::Integer(i) => {
            buf.push(b'i');
            buf.extend_from_slice(i.to_string().as_bytes());
            buf.push(b'e');
        }
        Value::Bytes(b) => encode_bytes(b, buf),
        Value::List(l) => {
            buf.push(b'l');
            for item in l {
                encode_into(item, buf)?;
            }
            buf.push(b'e');
        }
        Value::Dict(d) => {
            buf.push(b'd');
            let mut previous: Option<&Bytes> = None;
            for (key, val) in d {
                if previous.is_some_and(|prev| prev >= key) {
                    return Err(EncodeError::DuplicateKeyAfterSort(key.clone()));
                }
                previous = Some(key);
                encode_bytes(key, buf);
                encode_into(val, buf)?;
            }
            buf.push(b'e');
        }
    }
    Ok(())
}

fn encode_bytes(b: &[u8], buf: &mut Vec<u8>) {
    buf.extend_from_slice(b.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(b);
}
