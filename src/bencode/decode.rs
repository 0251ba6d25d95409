use super::error::DecodeError;
use super::value::Value;
use crate::constants::DEFAULT_DEPTH_LIMIT;
use bytes::Bytes;
use std::collections::BTreeMap;

/// How strictly a [`Decoder`] treats irregular input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Every irregularity is an error.
    #[default]
    Strict,
    /// Compatibility mode for historical `.torrent` files.
    ///
    /// Trailing bytes after the top-level value are ignored and duplicate
    /// dictionary keys keep the last occurrence. Both are logged. All other
    /// errors remain fatal.
    Lenient,
}

/// Configurable bencode decoder.
///
/// [`decode`] covers the common case; use a `Decoder` to change the depth
/// limit, to accept legacy input, or to decode a value that is followed by
/// other data.
///
/// # Examples
///
/// ```
/// use metaforge::bencode::{Decoder, Value};
///
/// let (value, used) = Decoder::new(b"i7eraw payload").decode_prefix().unwrap();
/// assert_eq!(value, Value::Integer(7));
/// assert_eq!(used, 3);
/// ```
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    depth_limit: usize,
    mode: DecodeMode,
}

impl<'a> Decoder<'a> {
    /// Creates a strict decoder over `data` with the default depth limit.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            depth_limit: DEFAULT_DEPTH_LIMIT,
            mode: DecodeMode::Strict,
        }
    }

    /// Sets the maximum number of nested lists and dictionaries.
    pub fn depth_limit(mut self, limit: usize) -> Self {
        self.depth_limit = limit;
        self
    }

    /// Selects strict or lenient handling of trailing data and duplicate keys.
    pub fn mode(mut self, mode: DecodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Decodes the whole input as a single value.
    pub fn decode(self) -> Result<Value, DecodeError> {
        let mode = self.mode;
        let len = self.data.len();
        let (value, used) = self.decode_prefix()?;

        if used != len {
            match mode {
                DecodeMode::Strict => return Err(DecodeError::TrailingData { offset: used }),
                DecodeMode::Lenient => {
                    tracing::warn!(
                        offset = used,
                        trailing = len - used,
                        "ignoring trailing data after bencode value"
                    );
                }
            }
        }

        Ok(value)
    }

    /// Decodes one value from the start of the input.
    ///
    /// Returns the value and the number of bytes it occupied. Bytes after
    /// the value are not inspected.
    pub fn decode_prefix(self) -> Result<(Value, usize), DecodeError> {
        let mut parser = Parser {
            data: self.data,
            pos: 0,
            depth_limit: self.depth_limit,
            mode: self.mode,
        };
        let value = parser.value(0)?;
        Ok((value, parser.pos))
    }
}

/// Decodes a complete bencode value, strictly.
///
/// # Errors
///
/// Fails on malformed tokens, truncated input, duplicate dictionary keys,
/// nesting deeper than [`DEFAULT_DEPTH_LIMIT`], and trailing bytes.
///
/// # Examples
///
/// ```
/// use metaforge::bencode::{decode, Value};
/// use bytes::Bytes;
///
/// assert_eq!(decode(b"i123e").unwrap(), Value::Integer(123));
/// assert_eq!(decode(b"3:abc").unwrap(), Value::Bytes(Bytes::from_static(b"abc")));
/// assert!(decode(b"i-0e").is_err());
/// ```
pub fn decode(data: &[u8]) -> Result<Value, DecodeError> {
    Decoder::new(data).decode()
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    depth_limit: usize,
    mode: DecodeMode,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn eof(&self) -> DecodeError {
        DecodeError::UnexpectedEof {
            offset: self.data.len(),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let c = self.peek().ok_or_else(|| self.eof())?;

        match c {
            b'i' => self.integer(),
            b'0'..=b'9' => self.byte_string().map(Value::Bytes),
            b'l' | b'd' if depth >= self.depth_limit => Err(DecodeError::DepthLimitExceeded {
                offset: self.pos,
                limit: self.depth_limit,
            }),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            byte => Err(DecodeError::UnexpectedByte {
                offset: self.pos,
                byte,
            }),
        }
    }

    fn integer(&mut self) -> Result<Value, DecodeError> {
        let start = self.pos;
        self.pos += 1;

        let digits_start = self.pos;
        let end = self.data[digits_start..]
            .iter()
            .position(|&b| b == b'e')
            .map(|i| digits_start + i)
            .ok_or_else(|| self.eof())?;

        let token = &self.data[digits_start..end];
        let invalid = |reason| DecodeError::InvalidInteger {
            offset: start,
            reason,
        };

        let (negative, digits) = match token.split_first() {
            Some((b'-', rest)) => (true, rest),
            _ => (false, token),
        };

        if digits.is_empty() {
            return Err(invalid("no digits"));
        }
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid("non-digit character"));
        }
        if digits[0] == b'0' && digits.len() > 1 {
            return Err(invalid("leading zero"));
        }
        if negative && digits == b"0" {
            return Err(invalid("negative zero"));
        }

        // Accumulate towards the sign so that i64::MIN is representable.
        let mut value: i64 = 0;
        for &d in digits {
            let d = i64::from(d - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| if negative { v.checked_sub(d) } else { v.checked_add(d) })
                .ok_or_else(|| invalid("out of 64-bit range"))?;
        }

        self.pos = end + 1;
        Ok(Value::Integer(value))
    }

    fn byte_string(&mut self) -> Result<Bytes, DecodeError> {
        let start = self.pos;
        let colon = self.data[start..]
            .iter()
            .position(|&b| !b.is_ascii_digit())
            .map(|i| start + i)
            .ok_or_else(|| self.eof())?;

        if self.data[colon] != b':' {
            return Err(DecodeError::InvalidLengthPrefix { offset: start });
        }

        let prefix = &self.data[start..colon];
        if prefix.len() > 1 && prefix[0] == b'0' {
            return Err(DecodeError::InvalidLengthPrefix { offset: start });
        }

        let mut len: usize = 0;
        for &d in prefix {
            len = len
                .checked_mul(10)
                .and_then(|v| v.checked_add(usize::from(d - b'0')))
                .ok_or(DecodeError::InvalidLengthPrefix { offset: start })?;
        }

        let body = colon + 1;
        if self.data.len() - body < len {
            return Err(self.eof());
        }

        self.pos = body + len;
        Ok(Bytes::copy_from_slice(&self.data[body..self.pos]))
    }

    fn list(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let start = self.pos;
        self.pos += 1;
        let mut list = Vec::new();

        loop {
            match self.peek() {
                None => return Err(DecodeError::UnterminatedContainer { offset: start }),
                Some(b'e') => break,
                Some(_) => list.push(self.value(depth + 1)?),
            }
        }

        self.pos += 1;
        Ok(Value::List(list))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let start = self.pos;
        self.pos += 1;
        let mut dict = BTreeMap::new();

        loop {
            let key_offset = self.pos;
            let key = match self.peek() {
                None => return Err(DecodeError::UnterminatedContainer { offset: start }),
                Some(b'e') => break,
                Some(b'0'..=b'9') => self.byte_string()?,
                Some(_) => return Err(DecodeError::NonByteStringKey { offset: key_offset }),
            };

            if self.peek().is_none() {
                return Err(DecodeError::UnterminatedContainer { offset: start });
            }
            let value = self.value(depth + 1)?;

            if let Some(previous) = dict.insert(key.clone(), value) {
                match self.mode {
                    DecodeMode::Strict => {
                        return Err(DecodeError::DuplicateKey {
                            offset: key_offset,
                            key,
                        })
                    }
                    DecodeMode::Lenient => {
                        tracing::warn!(
                            offset = key_offset,
                            key = ?key,
                            replaced = previous.kind(),
                            "duplicate dictionary key, keeping the last value"
                        );
                    }
                }
            }
        }

        self.pos += 1;
        Ok(Value::Dict(dict))
    }
}
