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

//! Schema-driven codec for the Blink compact binary format.
//!
//! A [schema::Schema] describes groups, fields and types; compiling it
//! yields an immutable instruction set that a [codec::BlinkCodec] runs to
//! turn [value::Message] instances into framed byte streams and back.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod consts;
mod instruction;
pub mod io;
pub mod primitive;
pub mod schema;
pub mod value;
pub mod vlc;

use bytes_ext::{Buf, BufMut};

// encoder/decoder
/// Data encode abstraction
pub trait Encoder<T: ?Sized> {
    type Error;

    /// Encode value into buf
    fn encode<B: BufMut>(&self, buf: &mut B, value: &T) -> Result<(), Self::Error>;

    /// Estimate the value size after encoded
    fn estimate_encoded_size(&self, value: &T) -> usize;
}

/// Data decode abstraction
pub trait Decoder<T> {
    type Error;

    /// Decode `value` from `buf`
    fn decode<B: Buf>(&self, buf: &mut B) -> Result<T, Self::Error>;
}
