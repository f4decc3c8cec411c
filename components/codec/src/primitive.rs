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

//! Primitive field codec of the Blink wire format
//!
//! Integers ride on the VLC layer. Floats are size-prefixed IEEE-754
//! big-endian images. Strings and binaries are size-prefixed byte runs.
//! A nullable value of any shape is the single null byte when absent,
//! which is why `Option<T>` codecs exist once, generically.

use std::mem;

use bytes_ext::{Buf, BufMut, Bytes, SafeBuf, SafeBufMut};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

use crate::{
    consts,
    value::{BigDecimal, Decimal, Timestamp},
    vlc, Decoder, Encoder,
};

/// Default cap on decoded string/binary sizes, 10 MiB.
pub const DEFAULT_MAX_DATA_SIZE: usize = 10 << 20;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to encode value, err:{}", source))]
    EncodeValue { source: bytes_ext::Error },

    #[snafu(display("Failed to encode vlc value, err:{}", source))]
    EncodeVlc { source: vlc::Error },

    #[snafu(display("Failed to decode vlc value, err:{}", source))]
    DecodeVlc { source: vlc::Error },

    #[snafu(display("Insufficient bytes to decode value, err:{}", source))]
    DecodeValue { source: bytes_ext::Error },

    #[snafu(display(
        "Declared width exceeds destination type (overflow).\nBacktrace:\n{}",
        backtrace
    ))]
    Overflow { backtrace: Backtrace },

    #[snafu(display(
        "Invalid float size, expect:{}, actual:{}.\nBacktrace:\n{}",
        expect,
        actual,
        backtrace
    ))]
    InvalidFloatSize {
        expect: usize,
        actual: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Bytes are not valid utf8, err:{}", source))]
    InvalidUtf8 {
        source: std::string::FromUtf8Error,
    },

    #[snafu(display(
        "Declared size exceeds the configured cap, size:{}, max:{}.\nBacktrace:\n{}",
        size,
        max,
        backtrace
    ))]
    DataTooLarge {
        size: u64,
        max: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error was caused by an exhausted input buffer.
    pub fn is_truncation(&self) -> bool {
        match self {
            Error::DecodeValue { .. } => true,
            Error::DecodeVlc { source, .. } => source.is_truncation(),
            _ => false,
        }
    }

    /// Whether this error was caused by a null where a value is required.
    pub fn is_null_value(&self) -> bool {
        match self {
            Error::DecodeVlc { source, .. } => source.is_null(),
            _ => false,
        }
    }
}

/// Blink primitive encoder
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimitiveEncoder;

/// Blink primitive decoder
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveDecoder {
    /// Upper bound accepted for decoded string/binary sizes.
    pub max_data_size: usize,
}

impl Default for PrimitiveDecoder {
    fn default() -> Self {
        Self {
            max_data_size: DEFAULT_MAX_DATA_SIZE,
        }
    }
}

impl PrimitiveDecoder {
    pub fn new(max_data_size: usize) -> Self {
        Self { max_data_size }
    }

    fn checked_size<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        let size = vlc::decode_u64(buf).context(DecodeVlc)?;
        ensure!(
            size <= self.max_data_size as u64,
            DataTooLarge {
                size,
                max: self.max_data_size,
            }
        );
        Ok(size as usize)
    }
}

macro_rules! impl_unsigned_codec {
    ($($ty:ty),+) => {$(
        impl Encoder<$ty> for PrimitiveEncoder {
            type Error = Error;

            fn encode<B: BufMut>(&self, buf: &mut B, value: &$ty) -> Result<()> {
                vlc::encode_u64(buf, u64::from(*value)).context(EncodeVlc)
            }

            fn estimate_encoded_size(&self, value: &$ty) -> usize {
                vlc::encoded_len_u64(u64::from(*value))
            }
        }

        impl Decoder<$ty> for PrimitiveDecoder {
            type Error = Error;

            fn decode<B: Buf>(&self, buf: &mut B) -> Result<$ty> {
                let v = vlc::decode_u64(buf).context(DecodeVlc)?;
                <$ty>::try_from(v).ok().context(Overflow)
            }
        }
    )+};
}

macro_rules! impl_signed_codec {
    ($($ty:ty),+) => {$(
        impl Encoder<$ty> for PrimitiveEncoder {
            type Error = Error;

            fn encode<B: BufMut>(&self, buf: &mut B, value: &$ty) -> Result<()> {
                vlc::encode_i64(buf, i64::from(*value)).context(EncodeVlc)
            }

            fn estimate_encoded_size(&self, value: &$ty) -> usize {
                vlc::encoded_len_i64(i64::from(*value))
            }
        }

        impl Decoder<$ty> for PrimitiveDecoder {
            type Error = Error;

            fn decode<B: Buf>(&self, buf: &mut B) -> Result<$ty> {
                let v = vlc::decode_i64(buf).context(DecodeVlc)?;
                <$ty>::try_from(v).ok().context(Overflow)
            }
        }
    )+};
}

impl_unsigned_codec!(u8, u16, u32, u64);
impl_signed_codec!(i8, i16, i32, i64);

impl Encoder<bool> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &bool) -> Result<()> {
        vlc::encode_u64(buf, u64::from(*value)).context(EncodeVlc)
    }

    fn estimate_encoded_size(&self, _value: &bool) -> usize {
        1
    }
}

impl Decoder<bool> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<bool> {
        let v = vlc::decode_u64(buf).context(DecodeVlc)?;
        Ok(v != 0)
    }
}

impl Encoder<f64> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &f64) -> Result<()> {
        vlc::encode_u64(buf, mem::size_of::<f64>() as u64).context(EncodeVlc)?;
        buf.try_put_f64(*value).context(EncodeValue)
    }

    fn estimate_encoded_size(&self, _value: &f64) -> usize {
        1 + mem::size_of::<f64>()
    }
}

impl Decoder<f64> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<f64> {
        let actual = vlc::decode_u64(buf).context(DecodeVlc)?;
        ensure!(
            actual == mem::size_of::<f64>() as u64,
            InvalidFloatSize {
                expect: mem::size_of::<f64>(),
                actual,
            }
        );
        buf.try_get_f64().context(DecodeValue)
    }
}

impl Encoder<f32> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &f32) -> Result<()> {
        vlc::encode_u64(buf, mem::size_of::<f32>() as u64).context(EncodeVlc)?;
        buf.try_put_f32(*value).context(EncodeValue)
    }

    fn estimate_encoded_size(&self, _value: &f32) -> usize {
        1 + mem::size_of::<f32>()
    }
}

impl Decoder<f32> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<f32> {
        let actual = vlc::decode_u64(buf).context(DecodeVlc)?;
        ensure!(
            actual == mem::size_of::<f32>() as u64,
            InvalidFloatSize {
                expect: mem::size_of::<f32>(),
                actual,
            }
        );
        buf.try_get_f32().context(DecodeValue)
    }
}

impl Encoder<Decimal> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &Decimal) -> Result<()> {
        vlc::encode_i64(buf, i64::from(value.exponent)).context(EncodeVlc)?;
        vlc::encode_i64(buf, value.mantissa).context(EncodeVlc)
    }

    fn estimate_encoded_size(&self, value: &Decimal) -> usize {
        vlc::encoded_len_i64(i64::from(value.exponent)) + vlc::encoded_len_i64(value.mantissa)
    }
}

impl Decoder<Decimal> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<Decimal> {
        let exponent = vlc::decode_i64(buf).context(DecodeVlc)?;
        let exponent = i8::try_from(exponent).ok().context(Overflow)?;
        let mantissa = vlc::decode_i64(buf).context(DecodeVlc)?;
        Ok(Decimal::new(mantissa, exponent))
    }
}

impl Encoder<BigDecimal> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &BigDecimal) -> Result<()> {
        vlc::encode_i64(buf, i64::from(value.exponent)).context(EncodeVlc)?;
        vlc::encode_i64(buf, value.mantissa).context(EncodeVlc)
    }

    fn estimate_encoded_size(&self, value: &BigDecimal) -> usize {
        vlc::encoded_len_i64(i64::from(value.exponent)) + vlc::encoded_len_i64(value.mantissa)
    }
}

impl Decoder<BigDecimal> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<BigDecimal> {
        let exponent = vlc::decode_i64(buf).context(DecodeVlc)?;
        let exponent = i32::try_from(exponent).ok().context(Overflow)?;
        let mantissa = vlc::decode_i64(buf).context(DecodeVlc)?;
        Ok(BigDecimal::new(mantissa, exponent))
    }
}

impl Encoder<Timestamp> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &Timestamp) -> Result<()> {
        vlc::encode_u64(buf, value.as_i64() as u64).context(EncodeVlc)
    }

    fn estimate_encoded_size(&self, value: &Timestamp) -> usize {
        vlc::encoded_len_u64(value.as_i64() as u64)
    }
}

impl Decoder<Timestamp> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<Timestamp> {
        let ticks = vlc::decode_u64(buf).context(DecodeVlc)?;
        Ok(Timestamp::new(ticks as i64))
    }
}

impl Encoder<[u8]> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &[u8]) -> Result<()> {
        vlc::encode_u64(buf, value.len() as u64).context(EncodeVlc)?;
        buf.try_put(value).context(EncodeValue)
    }

    fn estimate_encoded_size(&self, value: &[u8]) -> usize {
        consts::MAX_VLC_BYTES + value.len()
    }
}

impl Encoder<str> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &str) -> Result<()> {
        self.encode(buf, value.as_bytes())
    }

    fn estimate_encoded_size(&self, value: &str) -> usize {
        self.estimate_encoded_size(value.as_bytes())
    }
}

impl Encoder<String> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &String) -> Result<()> {
        self.encode(buf, value.as_str())
    }

    fn estimate_encoded_size(&self, value: &String) -> usize {
        self.estimate_encoded_size(value.as_str())
    }
}

impl Encoder<Bytes> for PrimitiveEncoder {
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &Bytes) -> Result<()> {
        self.encode(buf, &value[..])
    }

    fn estimate_encoded_size(&self, value: &Bytes) -> usize {
        self.estimate_encoded_size(&value[..])
    }
}

impl Decoder<String> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<String> {
        let size = self.checked_size(buf)?;
        let mut dst = vec![0u8; size];
        buf.try_copy_to_slice(&mut dst).context(DecodeValue)?;
        String::from_utf8(dst).context(InvalidUtf8)
    }
}

impl Decoder<Bytes> for PrimitiveDecoder {
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<Bytes> {
        let size = self.checked_size(buf)?;
        let mut dst = vec![0u8; size];
        buf.try_copy_to_slice(&mut dst).context(DecodeValue)?;
        Ok(Bytes::from(dst))
    }
}

impl<T> Encoder<Option<T>> for PrimitiveEncoder
where
    PrimitiveEncoder: Encoder<T, Error = Error>,
{
    type Error = Error;

    fn encode<B: BufMut>(&self, buf: &mut B, value: &Option<T>) -> Result<()> {
        match value {
            Some(v) => self.encode(buf, v),
            None => vlc::encode_null(buf).context(EncodeVlc),
        }
    }

    fn estimate_encoded_size(&self, value: &Option<T>) -> usize {
        match value {
            Some(v) => self.estimate_encoded_size(v),
            None => 1,
        }
    }
}

impl<T> Decoder<Option<T>> for PrimitiveDecoder
where
    PrimitiveDecoder: Decoder<T, Error = Error>,
{
    type Error = Error;

    fn decode<B: Buf>(&self, buf: &mut B) -> Result<Option<T>> {
        match buf.chunk().first() {
            Some(&consts::NULL_BYTE) => {
                buf.try_advance(1).context(DecodeValue)?;
                Ok(None)
            }
            _ => Ok(Some(self.decode(buf)?)),
        }
    }
}
