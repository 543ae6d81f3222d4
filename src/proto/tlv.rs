// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Tag-length-value payload fields.
//!
//! Every payload is a flat run of TLV triples with a single-byte tag and a
//! single-byte length:
//!
//! ```text
//! +-----+-----+----------------+
//! | tag | len | value (len bytes) |
//! +-----+-----+----------------+
//! ```
//!
//! Grammar rules enforced here:
//! * INT values are 1 or 2 bytes, big-endian; any other width is invalid.
//! * Length 0 is illegal for INT / STR / TIME fields.
//! * NULL must carry length 0, ENUM exactly 1.
//! * UTC_TIME / TIME are exactly 15 ASCII bytes (`YYYYMMDDHHMMSSZ`).
//! * SEQ_OF nests: its value is a concatenation of TLVs.
//!
//! The reader walks a borrowed, immutable slice and never looks past the
//! declared payload; the writer appends to an owned buffer and converts
//! lengths exactly once, when the field is emitted.

use bytes::{BufMut, Bytes, BytesMut};

use crate::proto::error::ProtoError;

/// Wire length of a UTC_TIME / TIME value.
pub const TIME_STR_LEN: usize = 15;

/// Recognized field tags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Bool = 0x01,
    Int = 0x02,
    Null = 0x05,
    Enum = 0x0A,
    Str = 0x0C,
    PrintStr = 0x13,
    UtcTime = 0x17,
    Time = 0x18,
    SeqOf = 0x30,
}

impl Tag {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x01 => Self::Bool,
            0x02 => Self::Int,
            0x05 => Self::Null,
            0x0A => Self::Enum,
            0x0C => Self::Str,
            0x13 => Self::PrintStr,
            0x17 => Self::UtcTime,
            0x18 => Self::Time,
            0x30 => Self::SeqOf,
            _ => return None,
        })
    }
}

/// A decoded payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    /// 1- or 2-byte wire integer, widened. Re-encoding picks the minimal
    /// width that holds the value.
    Int(i32),
    Null,
    Enum(u8),
    Str(Vec<u8>),
    PrintStr(Vec<u8>),
    UtcTime(String),
    Time(String),
    Seq(Vec<Value>),
}

/// Positional reader over one frame payload.
#[derive(Debug)]
pub struct TlvReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtoError> {
        if self.remaining() < n {
            return Err(ProtoError::TruncatedField {
                need: n,
                left: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_byte(&mut self) -> Result<u8, ProtoError> {
        Ok(self.take(1)?[0])
    }

    fn read_tag(&mut self) -> Result<Tag, ProtoError> {
        let raw = self.take_byte()?;
        Tag::from_u8(raw).ok_or(ProtoError::UnknownTag(raw))
    }

    /// Decode the next field, whatever its tag.
    pub fn read_value(&mut self) -> Result<Value, ProtoError> {
        let tag = self.read_tag()?;
        let len = self.take_byte()?;
        self.read_body(tag, len)
    }

    fn read_body(&mut self, tag: Tag, len: u8) -> Result<Value, ProtoError> {
        match tag {
            Tag::Bool => {
                if len != 1 {
                    return Err(ProtoError::InvalidFieldLength(len));
                }
                Ok(Value::Bool(self.take_byte()? != 0))
            },
            Tag::Int => {
                let v = self.decode_int(len)?;
                Ok(Value::Int(v))
            },
            Tag::Null => {
                if len != 0 {
                    return Err(ProtoError::InvalidFieldLength(len));
                }
                Ok(Value::Null)
            },
            Tag::Enum => {
                if len != 1 {
                    return Err(ProtoError::InvalidFieldLength(len));
                }
                Ok(Value::Enum(self.take_byte()?))
            },
            Tag::Str | Tag::PrintStr => {
                if len == 0 {
                    return Err(ProtoError::ZeroFieldLength);
                }
                let body = self.take(len.into())?.to_vec();
                Ok(match tag {
                    Tag::Str => Value::Str(body),
                    _ => Value::PrintStr(body),
                })
            },
            Tag::UtcTime | Tag::Time => {
                let s = self.decode_time(len)?.to_string();
                Ok(match tag {
                    Tag::UtcTime => Value::UtcTime(s),
                    _ => Value::Time(s),
                })
            },
            Tag::SeqOf => {
                let body = self.take(len.into())?;
                let mut inner = TlvReader::new(body);
                let mut items = Vec::new();
                while !inner.is_empty() {
                    items.push(inner.read_value()?);
                }
                Ok(Value::Seq(items))
            },
        }
    }

    fn decode_int(&mut self, len: u8) -> Result<i32, ProtoError> {
        match len {
            0 => Err(ProtoError::ZeroFieldLength),
            1 => Ok(self.take_byte()?.into()),
            2 => {
                let b = self.take(2)?;
                Ok(u16::from_be_bytes([b[0], b[1]]).into())
            },
            other => Err(ProtoError::InvalidIntLength(other)),
        }
    }

    fn decode_time(&mut self, len: u8) -> Result<&'a str, ProtoError> {
        if len == 0 {
            return Err(ProtoError::ZeroFieldLength);
        }
        if usize::from(len) != TIME_STR_LEN {
            return Err(ProtoError::InvalidFieldLength(len));
        }
        let body = self.take(TIME_STR_LEN)?;
        std::str::from_utf8(body).map_err(|_| {
            ProtoError::InvalidTimestamp(String::from_utf8_lossy(body).into_owned())
        })
    }

    /// Expect a STR (or PRINTSTR) field and borrow its bytes.
    pub fn read_str(&mut self) -> Result<&'a [u8], ProtoError> {
        let tag = self.read_tag()?;
        if !matches!(tag, Tag::Str | Tag::PrintStr) {
            return Err(ProtoError::UnexpectedTag {
                expected: "string field",
                got: tag as u8,
            });
        }
        let len = self.take_byte()?;
        if len == 0 {
            return Err(ProtoError::ZeroFieldLength);
        }
        self.take(len.into())
    }

    /// Expect a UTC_TIME (or TIME) field.
    pub fn read_time(&mut self) -> Result<&'a str, ProtoError> {
        let tag = self.read_tag()?;
        if !matches!(tag, Tag::UtcTime | Tag::Time) {
            return Err(ProtoError::UnexpectedTag {
                expected: "time field",
                got: tag as u8,
            });
        }
        let len = self.take_byte()?;
        self.decode_time(len)
    }

    /// Expect an INT field (1 or 2 bytes).
    pub fn read_int(&mut self) -> Result<i32, ProtoError> {
        let tag = self.read_tag()?;
        if tag != Tag::Int {
            return Err(ProtoError::UnexpectedTag {
                expected: "integer field",
                got: tag as u8,
            });
        }
        let len = self.take_byte()?;
        self.decode_int(len)
    }

    /// Expect an ENUM field.
    pub fn read_enum(&mut self) -> Result<u8, ProtoError> {
        let tag = self.read_tag()?;
        if tag != Tag::Enum {
            return Err(ProtoError::UnexpectedTag {
                expected: "enum field",
                got: tag as u8,
            });
        }
        let len = self.take_byte()?;
        if len != 1 {
            return Err(ProtoError::InvalidFieldLength(len));
        }
        self.take_byte()
    }
}

/// Appending writer for one frame payload.
///
/// Field helpers take explicit widths because the protocol fixes them per
/// message (a login-success uid is always 2 bytes, even below 256).
#[derive(Debug, Default)]
pub struct TlvWriter {
    buf: BytesMut,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn put_enum(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(Tag::Enum as u8);
        self.buf.put_u8(1);
        self.buf.put_u8(v);
        self
    }

    pub fn put_int_u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(Tag::Int as u8);
        self.buf.put_u8(1);
        self.buf.put_u8(v);
        self
    }

    pub fn put_int_u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u8(Tag::Int as u8);
        self.buf.put_u8(2);
        self.buf.put_u16(v);
        self
    }

    /// 4-byte counter field used only by the outbound diagnostic report;
    /// the inbound decoder does not accept this width.
    pub fn put_int_u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u8(Tag::Int as u8);
        self.buf.put_u8(4);
        self.buf.put_u32(v);
        self
    }

    pub fn put_str(&mut self, s: &[u8]) -> Result<&mut Self, ProtoError> {
        self.put_sized(Tag::Str, s)
    }

    pub fn put_time(&mut self, s: &str) -> Result<&mut Self, ProtoError> {
        if s.len() != TIME_STR_LEN {
            return Err(ProtoError::InvalidTimestamp(s.to_string()));
        }
        self.buf.put_u8(Tag::UtcTime as u8);
        self.buf.put_u8(TIME_STR_LEN as u8);
        self.buf.put_slice(s.as_bytes());
        Ok(self)
    }

    fn put_sized(&mut self, tag: Tag, body: &[u8]) -> Result<&mut Self, ProtoError> {
        if body.is_empty() {
            return Err(ProtoError::ZeroFieldLength);
        }
        if body.len() > u8::MAX.into() {
            return Err(ProtoError::FieldTooLong(body.len()));
        }
        self.buf.put_u8(tag as u8);
        self.buf.put_u8(body.len() as u8);
        self.buf.put_slice(body);
        Ok(self)
    }

    /// Generic encoder, mostly exercised by round-trip tests and SEQ_OF.
    pub fn put_value(&mut self, v: &Value) -> Result<&mut Self, ProtoError> {
        match v {
            Value::Bool(b) => {
                self.buf.put_u8(Tag::Bool as u8);
                self.buf.put_u8(1);
                self.buf.put_u8(u8::from(*b));
            },
            Value::Int(i) => match u16::try_from(*i) {
                Ok(wide) if wide > 0xFF => {
                    self.put_int_u16(wide);
                },
                Ok(narrow) => {
                    self.put_int_u8(narrow as u8);
                },
                Err(_) => return Err(ProtoError::InvalidIntLength(4)),
            },
            Value::Null => {
                self.buf.put_u8(Tag::Null as u8);
                self.buf.put_u8(0);
            },
            Value::Enum(e) => {
                self.put_enum(*e);
            },
            Value::Str(s) => {
                self.put_sized(Tag::Str, s)?;
            },
            Value::PrintStr(s) => {
                self.put_sized(Tag::PrintStr, s)?;
            },
            Value::UtcTime(t) | Value::Time(t) => {
                if t.len() != TIME_STR_LEN {
                    return Err(ProtoError::InvalidTimestamp(t.clone()));
                }
                let tag = match v {
                    Value::UtcTime(_) => Tag::UtcTime,
                    _ => Tag::Time,
                };
                self.buf.put_u8(tag as u8);
                self.buf.put_u8(TIME_STR_LEN as u8);
                self.buf.put_slice(t.as_bytes());
            },
            Value::Seq(items) => {
                // A sequence may legitimately be empty, so bypass put_sized.
                let mut inner = TlvWriter::new();
                for item in items {
                    inner.put_value(item)?;
                }
                if inner.buf.len() > u8::MAX.into() {
                    return Err(ProtoError::FieldTooLong(inner.buf.len()));
                }
                self.buf.put_u8(Tag::SeqOf as u8);
                self.buf.put_u8(inner.buf.len() as u8);
                self.buf.put_slice(&inner.buf);
            },
        }
        Ok(self)
    }
}
