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

//! Codec configuration

use crate::{consts, primitive};

/// Runtime limits and knobs of one codec instance.
///
/// The decode caps bound what a hostile or corrupt stream can make the
/// decoder allocate; they are checked before any allocation happens.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Largest frame size accepted on decode.
    pub max_frame_size: usize,
    /// Largest string/binary size accepted on decode.
    pub max_binary_size: usize,
    /// Largest sequence length accepted on decode.
    pub max_sequence_length: usize,
    /// Surface unknown enum ordinals instead of failing decode.
    pub lenient_enums: bool,
    /// Capacity of each pooled frame buffer segment.
    pub buffer_segment_size: usize,
    /// Segments retained by a codec-owned buffer pool.
    pub pooled_segments: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_size: consts::MAX_FRAME_SIZE as usize,
            max_binary_size: primitive::DEFAULT_MAX_DATA_SIZE,
            max_sequence_length: 1_000_000,
            lenient_enums: false,
            buffer_segment_size: 4096,
            pooled_segments: 8,
        }
    }
}
