//! Key/value dictionaries exchanged with the companion app
//!
//! A dictionary is a tuple count followed by that many tuples, all little
//! endian:
//!
//! ```text
//! count: u8
//! key: u32 | type: u8 | length: u16 | value: [u8; length]   (x count)
//! ```
//!
//! Types are 0 (byte array), 1 (NUL terminated string), 2 (unsigned int)
//! and 3 (signed int). Integers take 1, 2 or 4 bytes.

use heapless::Vec;

/// Most tuples a single message may carry
pub const MAX_TUPLES: usize = 8;

const HEADER_LEN: usize = 7;

const TYPE_BYTES: u8 = 0;
const TYPE_CSTRING: u8 = 1;
const TYPE_UINT: u8 = 2;
const TYPE_INT: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No tuple count
    Empty,
    /// A tuple runs past the end of the buffer
    Truncated,
    UnknownType(u8),
    /// Integer of unsupported width, or string without terminator
    BadLength,
    TooManyTuples,
    /// Bytes left over after the last tuple
    TrailingBytes,
    /// Output buffer too small
    BufferFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Bytes(&'a [u8]),
    /// String bytes, terminator included
    CString(&'a [u8]),
    Uint(u32),
    Int(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuple<'a> {
    pub key: u32,
    pub value: Value<'a>,
}

impl<'a> Tuple<'a> {
    /// Integer value of the tuple, if it holds one that fits an `i32`
    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            Value::Int(value) => Some(value),
            Value::Uint(value) => i32::try_from(value).ok(),
            _ => None,
        }
    }

    /// Text value of the tuple, if it holds valid UTF-8
    pub fn as_str(&self) -> Option<&'a str> {
        let bytes = match self.value {
            Value::CString(bytes) => bytes.strip_suffix(&[0]).unwrap_or(bytes),
            Value::Bytes(bytes) => bytes,
            _ => return None,
        };
        core::str::from_utf8(bytes).ok()
    }
}

/// A parsed, validated dictionary borrowing from the receive buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary<'a> {
    tuples: Vec<Tuple<'a>, MAX_TUPLES>,
}

impl<'a> Dictionary<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, Error> {
        let (&count, mut rest) = buf.split_first().ok_or(Error::Empty)?;
        let mut tuples = Vec::new();

        for _ in 0..count {
            if rest.len() < HEADER_LEN {
                return Err(Error::Truncated);
            }
            let key = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
            let kind = rest[4];
            let len = u16::from_le_bytes([rest[5], rest[6]]) as usize;
            rest = &rest[HEADER_LEN..];

            if rest.len() < len {
                return Err(Error::Truncated);
            }
            let (raw, tail) = rest.split_at(len);
            rest = tail;

            let value = decode_value(kind, raw)?;
            tuples
                .push(Tuple { key, value })
                .map_err(|_| Error::TooManyTuples)?;
        }
        if !rest.is_empty() {
            return Err(Error::TrailingBytes);
        }

        Ok(Self { tuples })
    }

    /// First tuple with the given key
    pub fn find(&self, key: u32) -> Option<&Tuple<'a>> {
        self.tuples.iter().find(|tuple| tuple.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tuple<'a>> {
        self.tuples.iter()
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

fn decode_value(kind: u8, raw: &[u8]) -> Result<Value<'_>, Error> {
    match kind {
        TYPE_BYTES => Ok(Value::Bytes(raw)),
        TYPE_CSTRING => match raw.last() {
            Some(0) => Ok(Value::CString(raw)),
            _ => Err(Error::BadLength),
        },
        TYPE_UINT => match *raw {
            [b] => Ok(Value::Uint(b as u32)),
            [b0, b1] => Ok(Value::Uint(u16::from_le_bytes([b0, b1]) as u32)),
            [b0, b1, b2, b3] => Ok(Value::Uint(u32::from_le_bytes([b0, b1, b2, b3]))),
            _ => Err(Error::BadLength),
        },
        TYPE_INT => match *raw {
            [b] => Ok(Value::Int(b as i8 as i32)),
            [b0, b1] => Ok(Value::Int(i16::from_le_bytes([b0, b1]) as i32)),
            [b0, b1, b2, b3] => Ok(Value::Int(i32::from_le_bytes([b0, b1, b2, b3]))),
            _ => Err(Error::BadLength),
        },
        other => Err(Error::UnknownType(other)),
    }
}

/// Builds a dictionary into a caller provided buffer
pub struct DictionaryWriter<'b> {
    buf: &'b mut [u8],
    pos: usize,
    count: u8,
}

impl<'b> DictionaryWriter<'b> {
    pub fn new(buf: &'b mut [u8]) -> Result<Self, Error> {
        if buf.is_empty() {
            return Err(Error::BufferFull);
        }
        Ok(Self {
            buf,
            pos: 1,
            count: 0,
        })
    }

    pub fn write_int(&mut self, key: u32, value: i32) -> Result<(), Error> {
        self.write(key, TYPE_INT, &value.to_le_bytes())
    }

    pub fn write_uint(&mut self, key: u32, value: u32) -> Result<(), Error> {
        self.write(key, TYPE_UINT, &value.to_le_bytes())
    }

    pub fn write_cstr(&mut self, key: u32, value: &str) -> Result<(), Error> {
        let len = value.len() + 1;
        self.header(key, TYPE_CSTRING, len)?;
        self.buf[self.pos..self.pos + value.len()].copy_from_slice(value.as_bytes());
        self.buf[self.pos + value.len()] = 0;
        self.pos += len;
        self.count += 1;
        Ok(())
    }

    /// Write the tuple count and return the encoded length
    pub fn finish(self) -> usize {
        self.buf[0] = self.count;
        self.pos
    }

    fn write(&mut self, key: u32, kind: u8, value: &[u8]) -> Result<(), Error> {
        self.header(key, kind, value.len())?;
        self.buf[self.pos..self.pos + value.len()].copy_from_slice(value);
        self.pos += value.len();
        self.count += 1;
        Ok(())
    }

    /// Reserve room for a tuple and write its header
    fn header(&mut self, key: u32, kind: u8, len: usize) -> Result<(), Error> {
        if self.count as usize >= MAX_TUPLES {
            return Err(Error::TooManyTuples);
        }
        let len16 = u16::try_from(len).map_err(|_| Error::BufferFull)?;
        if self.buf.len() - self.pos < HEADER_LEN + len {
            return Err(Error::BufferFull);
        }

        let header = &mut self.buf[self.pos..self.pos + HEADER_LEN];
        header[..4].copy_from_slice(&key.to_le_bytes());
        header[4] = kind;
        header[5..].copy_from_slice(&len16.to_le_bytes());
        self.pos += HEADER_LEN;
        Ok(())
    }
}
