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

//! Common constants of the Blink wire format

/// Null value for any nullable field: the size-prefixed VLC form declaring
/// zero data bytes.
pub const NULL_BYTE: u8 = 0xC0;

/// Largest value of the single-byte unsigned VLC form.
pub const ONE_BYTE_MAX: u64 = 0x7F;
/// Largest value of the two-byte unsigned VLC form (6 + 8 data bits).
pub const TWO_BYTE_MAX: u64 = 0x3FFF;

/// Single-byte signed range (7 bits).
pub const ONE_BYTE_MIN_SIGNED: i64 = -64;
pub const ONE_BYTE_MAX_SIGNED: i64 = 63;
/// Two-byte signed range (14 bits).
pub const TWO_BYTE_MIN_SIGNED: i64 = -8192;
pub const TWO_BYTE_MAX_SIGNED: i64 = 8191;

/// High bit pattern `10xxxxxx` marking the two-byte form.
pub const TWO_BYTE_FLAG: u8 = 0x80;
/// High bit pattern `11nnnnnn` marking the size-prefixed form.
pub const SIZE_PREFIX_FLAG: u8 = 0xC0;
/// Data bits carried by the first byte of the two-byte form, and the byte
/// count bits of the size-prefixed form.
pub const FIRST_BYTE_DATA_MASK: u8 = 0x3F;

/// Max data bytes a canonical 64-bit VLC declares.
pub const MAX_VLC_DATA_BYTES: usize = 8;
/// Worst-case encoded width of a 64-bit VLC (header byte plus data bytes).
pub const MAX_VLC_BYTES: usize = 9;

/// Width of the reserved message size slot: `0xC3` header plus three
/// little-endian size bytes.
pub const FRAME_SIZE_RESERVED: usize = 4;
/// Data bytes in the reserved size slot.
pub const FRAME_SIZE_DATA_BYTES: usize = 3;
/// Largest frame size the reserved slot can be patched with.
pub const MAX_FRAME_SIZE: u64 = (1 << 24) - 1;
