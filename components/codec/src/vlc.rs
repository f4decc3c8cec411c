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

//! Variable-length coding of the Blink wire format.
//!
//! A VLC integer is self-delimiting: the high bits of the first byte select
//! one of three frames.
//!
//! ```text
//! 0xxxxxxx                  single byte, 7 data bits
//! 10xxxxxx yyyyyyyy         two bytes, 6 + 8 data bits (byte 0 holds the low bits)
//! 11nnnnnn <n data bytes>   size-prefixed, value in little-endian order
//! ```
//!
//! `11` with a zero byte count (`0xC0`) encodes null. Encoders always pick
//! the narrowest frame; decoders accept non-canonical wider frames as long
//! as the value fits 64 bits.

use bytes_ext::{SafeBuf, SafeBufMut};
use snafu::{ensure, Backtrace, ResultExt, Snafu};

use crate::consts;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to encode vlc value, err:{}", source))]
    EncodeValue { source: bytes_ext::Error },

    #[snafu(display("Insufficient bytes to decode vlc value, err:{}", source))]
    DecodeValue { source: bytes_ext::Error },

    #[snafu(display("Value larger than 64 bits (overflow).\nBacktrace:\n{}", backtrace))]
    Overflow { backtrace: Backtrace },

    #[snafu(display("Null vlc value where a value is required.\nBacktrace:\n{}", backtrace))]
    NullValue { backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error was caused by an exhausted input buffer.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Error::DecodeValue { .. })
    }

    /// Whether this error was caused by a null where a value is required.
    pub fn is_null(&self) -> bool {
        matches!(self, Error::NullValue { .. })
    }
}

/// Data bytes of the size-prefixed frame for an unsigned value.
fn data_bytes_u64(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    // v > 0 here since small values use the short frames.
    (bits + 7) / 8
}

/// Data bytes of the size-prefixed frame for a signed value, including the
/// sign bit.
fn data_bytes_i64(v: i64) -> usize {
    let redundant = if v < 0 {
        v.leading_ones() as usize
    } else {
        v.leading_zeros() as usize
    };
    let bits = 64 - redundant + 1;
    (bits + 7) / 8
}

/// Encoded width in bytes of an unsigned VLC value.
pub fn encoded_len_u64(v: u64) -> usize {
    if v <= consts::ONE_BYTE_MAX {
        1
    } else if v <= consts::TWO_BYTE_MAX {
        2
    } else {
        1 + data_bytes_u64(v)
    }
}

/// Encoded width in bytes of a signed VLC value.
pub fn encoded_len_i64(v: i64) -> usize {
    if (consts::ONE_BYTE_MIN_SIGNED..=consts::ONE_BYTE_MAX_SIGNED).contains(&v) {
        1
    } else if (consts::TWO_BYTE_MIN_SIGNED..=consts::TWO_BYTE_MAX_SIGNED).contains(&v) {
        2
    } else {
        1 + data_bytes_i64(v)
    }
}

pub fn encode_u64<B: SafeBufMut>(buf: &mut B, v: u64) -> Result<()> {
    if v <= consts::ONE_BYTE_MAX {
        buf.try_put_u8(v as u8).context(EncodeValue)?;
    } else if v <= consts::TWO_BYTE_MAX {
        buf.try_put_u8(consts::TWO_BYTE_FLAG | (v as u8 & consts::FIRST_BYTE_DATA_MASK))
            .context(EncodeValue)?;
        buf.try_put_u8((v >> 6) as u8).context(EncodeValue)?;
    } else {
        let n = data_bytes_u64(v);
        buf.try_put_u8(consts::SIZE_PREFIX_FLAG | n as u8)
            .context(EncodeValue)?;
        buf.try_put(&v.to_le_bytes()[..n]).context(EncodeValue)?;
    }
    Ok(())
}

pub fn encode_i64<B: SafeBufMut>(buf: &mut B, v: i64) -> Result<()> {
    if (consts::ONE_BYTE_MIN_SIGNED..=consts::ONE_BYTE_MAX_SIGNED).contains(&v) {
        buf.try_put_u8(v as u8 & 0x7F).context(EncodeValue)?;
    } else if (consts::TWO_BYTE_MIN_SIGNED..=consts::TWO_BYTE_MAX_SIGNED).contains(&v) {
        buf.try_put_u8(consts::TWO_BYTE_FLAG | (v as u8 & consts::FIRST_BYTE_DATA_MASK))
            .context(EncodeValue)?;
        buf.try_put_u8((v >> 6) as u8).context(EncodeValue)?;
    } else {
        let n = data_bytes_i64(v);
        buf.try_put_u8(consts::SIZE_PREFIX_FLAG | n as u8)
            .context(EncodeValue)?;
        buf.try_put(&v.to_le_bytes()[..n]).context(EncodeValue)?;
    }
    Ok(())
}

/// Encode the null byte into `buf`.
pub fn encode_null<B: SafeBufMut>(buf: &mut B) -> Result<()> {
    buf.try_put_u8(consts::NULL_BYTE).context(EncodeValue)
}

/// Decode an unsigned VLC value, where `0xC0` decodes to `None`.
pub fn decode_u64_nullable<B: SafeBuf>(buf: &mut B) -> Result<Option<u64>> {
    let b0 = buf.try_get_u8().context(DecodeValue)?;
    if b0 & 0x80 == 0 {
        return Ok(Some(u64::from(b0)));
    }
    if b0 & 0x40 == 0 {
        let b1 = buf.try_get_u8().context(DecodeValue)?;
        let v = u64::from(b0 & consts::FIRST_BYTE_DATA_MASK) | u64::from(b1) << 6;
        return Ok(Some(v));
    }

    let n = (b0 & consts::FIRST_BYTE_DATA_MASK) as usize;
    if n == 0 {
        return Ok(None);
    }
    let mut v = 0u64;
    for i in 0..n {
        let b = buf.try_get_u8().context(DecodeValue)?;
        if i < consts::MAX_VLC_DATA_BYTES {
            v |= u64::from(b) << (8 * i);
        } else {
            // Wider than canonical frames are tolerated while the padding
            // stays zero.
            ensure!(b == 0, Overflow);
        }
    }
    Ok(Some(v))
}

/// Decode a signed VLC value, where `0xC0` decodes to `None`.
pub fn decode_i64_nullable<B: SafeBuf>(buf: &mut B) -> Result<Option<i64>> {
    let b0 = buf.try_get_u8().context(DecodeValue)?;
    if b0 & 0x80 == 0 {
        // Sign extend from bit 6.
        return Ok(Some((i64::from(b0) << 57) >> 57));
    }
    if b0 & 0x40 == 0 {
        let b1 = buf.try_get_u8().context(DecodeValue)?;
        let raw = i64::from(b0 & consts::FIRST_BYTE_DATA_MASK) | i64::from(b1) << 6;
        // Sign extend from bit 13.
        return Ok(Some((raw << 50) >> 50));
    }

    let n = (b0 & consts::FIRST_BYTE_DATA_MASK) as usize;
    if n == 0 {
        return Ok(None);
    }
    let mut lo = [0u8; 8];
    let mut ext = 0u8;
    for i in 0..n {
        let b = buf.try_get_u8().context(DecodeValue)?;
        if i < consts::MAX_VLC_DATA_BYTES {
            lo[i] = b;
        } else if i == consts::MAX_VLC_DATA_BYTES {
            ensure!(b == 0x00 || b == 0xFF, Overflow);
            ext = b;
        } else {
            ensure!(b == ext, Overflow);
        }
    }
    let mut v = i64::from_le_bytes(lo);
    if n < consts::MAX_VLC_DATA_BYTES {
        let shift = (8 * (consts::MAX_VLC_DATA_BYTES - n)) as u32;
        v = (v << shift) >> shift;
    } else if n > consts::MAX_VLC_DATA_BYTES {
        // The padding carries the sign, so it must agree with bit 63.
        ensure!((ext == 0xFF) == (v < 0), Overflow);
    }
    Ok(Some(v))
}

/// Decode an unsigned VLC value; null is an error.
pub fn decode_u64<B: SafeBuf>(buf: &mut B) -> Result<u64> {
    match decode_u64_nullable(buf)? {
        Some(v) => Ok(v),
        None => NullValue.fail(),
    }
}

/// Decode a signed VLC value; null is an error.
pub fn decode_i64<B: SafeBuf>(buf: &mut B) -> Result<i64> {
    match decode_i64_nullable(buf)? {
        Some(v) => Ok(v),
        None => NullValue.fail(),
    }
}
