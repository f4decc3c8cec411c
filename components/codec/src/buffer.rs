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

//! Growable frame buffer over pooled segments.
//!
//! Encoding writes a whole frame here before anything reaches the sink, so
//! the reserved size slot can be patched once the payload length is known.
//! Segments are leased from a [SegmentPool] and handed back on [reset] and
//! on drop.

use std::sync::Arc;

use bytes_ext::{BufMut, ByteVec, SegmentPool, UninitSlice};
use snafu::{ensure, Backtrace, ResultExt, Snafu};

use crate::io::ByteSink;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "Range out of bounds, start:{}, end:{}, len:{}.\nBacktrace:\n{}",
        start,
        end,
        len,
        backtrace
    ))]
    OutOfBounds {
        start: usize,
        end: usize,
        len: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to write to sink, err:{}", source))]
    Sink { source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Byte buffer with a write cursor, random-access overwrite of already
/// written bytes, and sub-range copy-out.
///
/// All segments are filled to exactly the pool's segment size before a new
/// one is leased, which keeps position arithmetic trivial.
pub struct FrameBuffer {
    pool: Arc<dyn SegmentPool>,
    segment_size: usize,
    segments: Vec<ByteVec>,
    len: usize,
}

impl FrameBuffer {
    pub fn new(pool: Arc<dyn SegmentPool>) -> Self {
        let segment_size = pool.segment_size();
        Self {
            pool,
            segment_size,
            segments: Vec::new(),
            len: 0,
        }
    }

    /// Bytes written so far, which is also the write cursor position.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn grow(&mut self) {
        let segment = self.pool.acquire();
        debug_assert!(segment.capacity() >= self.segment_size);
        self.segments.push(segment);
    }

    /// Overwrite already written bytes starting at `pos`.
    pub fn patch(&mut self, pos: usize, bytes: &[u8]) -> Result<()> {
        let end = pos + bytes.len();
        ensure!(
            end <= self.len,
            OutOfBounds {
                start: pos,
                end,
                len: self.len,
            }
        );

        let mut seg_idx = pos / self.segment_size;
        let mut off = pos % self.segment_size;
        let mut src = bytes;
        while !src.is_empty() {
            let seg = &mut self.segments[seg_idx];
            let n = src.len().min(seg.len() - off);
            seg[off..off + n].copy_from_slice(&src[..n]);
            src = &src[n..];
            seg_idx += 1;
            off = 0;
        }
        Ok(())
    }

    /// Stream the half-open range `[start, end)` to `sink`.
    pub fn copy_to<S: ByteSink + ?Sized>(
        &self,
        sink: &mut S,
        start: usize,
        end: usize,
    ) -> Result<()> {
        ensure!(
            start <= end && end <= self.len,
            OutOfBounds {
                start,
                end,
                len: self.len,
            }
        );

        let mut pos = start;
        while pos < end {
            let seg_idx = pos / self.segment_size;
            let off = pos % self.segment_size;
            let n = (end - pos).min(self.segment_size - off);
            sink.write_slice(&self.segments[seg_idx][off..off + n])
                .context(Sink)?;
            pos += n;
        }
        Ok(())
    }

    /// Return every leased segment to the pool and rewind the cursor.
    pub fn reset(&mut self) {
        for segment in self.segments.drain(..) {
            self.pool.release(segment);
        }
        self.len = 0;
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.reset();
    }
}

// The buffer grows on demand, so the only real bound is the address space.
unsafe impl BufMut for FrameBuffer {
    fn remaining_mut(&self) -> usize {
        usize::MAX - self.len
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self
            .segments
            .last()
            .map_or(true, |seg| seg.len() == self.segment_size)
        {
            self.grow();
        }
        let segment_size = self.segment_size;
        let seg = self
            .segments
            .last_mut()
            .expect("segment present after grow");
        let len = seg.len();
        unsafe { UninitSlice::from_raw_parts_mut(seg.as_mut_ptr().add(len), segment_size - len) }
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        let segment_size = self.segment_size;
        let seg = self
            .segments
            .last_mut()
            .expect("advance_mut called before chunk_mut");
        let new_len = seg.len() + cnt;
        assert!(
            new_len <= segment_size,
            "cannot advance past the current segment"
        );
        seg.set_len(new_len);
        self.len += cnt;
    }
}
