// Copyright 2024 The Blink Codec Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Value holds different kind of field data

use std::fmt;

use bytes_ext::Bytes;

/// Instant in the unit and epoch declared by the owning time field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn new(ticks: i64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(ticks: i64) -> Self {
        Self(ticks)
    }
}

/// Fixed decimal: 64-bit mantissa scaled by a signed 8-bit power of ten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub mantissa: i64,
    pub exponent: i8,
}

impl Decimal {
    pub const fn new(mantissa: i64, exponent: i8) -> Self {
        Self { mantissa, exponent }
    }
}

/// Decimal with a wide exponent range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BigDecimal {
    pub mantissa: i64,
    pub exponent: i32,
}

impl BigDecimal {
    pub const fn new(mantissa: i64, exponent: i32) -> Self {
        Self { mantissa, exponent }
    }
}

/// A single field value of a [Message].
///
/// The variant set mirrors the wire type shapes; a field slot holds `Null`
/// when the optional field is absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    /// Signed value whose wire image may be wider than canonical.
    BigInt(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    BigDecimal(BigDecimal),
    Boolean(bool),
    String(String),
    Binary(Bytes),
    Timestamp(Timestamp),
    /// Enum symbol by its declared ordinal.
    Enum(i32),
    Group(Message),
    Sequence(Vec<Value>),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::UInt8(_) => "u8",
            Value::UInt16(_) => "u16",
            Value::UInt32(_) => "u32",
            Value::UInt64(_) => "u64",
            Value::Int8(_) => "i8",
            Value::Int16(_) => "i16",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "f32",
            Value::Double(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::BigDecimal(_) => "bigdecimal",
            Value::Boolean(_) => "bool",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Timestamp(_) => "timestamp",
            Value::Enum(_) => "enum",
            Value::Group(_) => "group",
            Value::Sequence(_) => "sequence",
        }
    }
}

macro_rules! impl_value_from {
    ($($variant:ident => $source:ty),+) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v)
                }
            }
        )+
    };
}

impl_value_from!(
    UInt8 => u8,
    UInt16 => u16,
    UInt32 => u32,
    UInt64 => u64,
    Int8 => i8,
    Int16 => i16,
    Int32 => i32,
    Int64 => i64,
    Float => f32,
    Double => f64,
    Decimal => Decimal,
    BigDecimal => BigDecimal,
    Boolean => bool,
    String => String,
    Binary => Bytes,
    Timestamp => Timestamp,
    Group => Message,
    Sequence => Vec<Value>
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A group instance: the unit of encoding and decoding.
///
/// Fields live in positional slots whose order is the flattened inheritance
/// chain of the group (ancestors first, declaration order within each
/// level). Group identity is the group name.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    group: String,
    fields: Vec<Value>,
}

impl Message {
    pub fn new(group: impl Into<String>, fields: Vec<Value>) -> Self {
        Self {
            group: group.into(),
            fields,
        }
    }

    /// Instance with every slot null, the decoder's factory form.
    pub fn empty(group: impl Into<String>, field_count: usize) -> Self {
        Self {
            group: group.into(),
            fields: vec![Value::Null; field_count],
        }
    }

    #[inline]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[inline]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn field(&self, slot: usize) -> Option<&Value> {
        self.fields.get(slot)
    }

    /// Store `value` into `slot`, padding intermediate slots with null.
    pub fn set_field(&mut self, slot: usize, value: Value) {
        if slot >= self.fields.len() {
            self.fields.resize(slot + 1, Value::Null);
        }
        self.fields[slot] = value;
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{:?}", self.group, self.fields)
    }
}
