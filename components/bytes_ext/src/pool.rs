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

//! Pool of fixed-capacity byte segments.

use std::sync::Mutex;

use crate::ByteVec;

/// Hands out empty byte segments of a fixed capacity and takes them back for
/// reuse.
///
/// Segments are plain `Vec<u8>` leased as opaque scratch space. Callers may
/// drop a segment instead of releasing it; the pool then simply allocates a
/// fresh one on a later acquire.
pub trait SegmentPool: Send + Sync {
    /// Capacity of every segment handed out by this pool.
    fn segment_size(&self) -> usize;

    /// Take a segment out of the pool.
    ///
    /// The returned segment is empty with at least [segment_size] capacity.
    fn acquire(&self) -> ByteVec;

    /// Return a segment previously handed out by [acquire].
    fn release(&self, segment: ByteVec);
}

/// A [SegmentPool] backed by a mutex guarded free list.
///
/// Retains at most `max_pooled` segments; surplus releases are dropped.
/// Segments whose capacity no longer matches `segment_size` (for example
/// after a caller resized one) are discarded as well.
#[derive(Debug)]
pub struct FixedSegmentPool {
    segment_size: usize,
    max_pooled: usize,
    free: Mutex<Vec<ByteVec>>,
}

impl FixedSegmentPool {
    pub fn new(segment_size: usize, max_pooled: usize) -> Self {
        assert!(segment_size > 0, "segment size must be positive");

        Self {
            segment_size,
            max_pooled,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Number of segments currently held by the free list.
    pub fn pooled(&self) -> usize {
        match self.free.lock() {
            Ok(free) => free.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl SegmentPool for FixedSegmentPool {
    fn segment_size(&self) -> usize {
        self.segment_size
    }

    fn acquire(&self) -> ByteVec {
        let reused = match self.free.lock() {
            Ok(mut free) => free.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };

        match reused {
            Some(segment) => segment,
            None => Vec::with_capacity(self.segment_size),
        }
    }

    fn release(&self, mut segment: ByteVec) {
        if segment.capacity() < self.segment_size {
            return;
        }
        segment.clear();

        let mut free = match self.free.lock() {
            Ok(free) => free,
            Err(poisoned) => poisoned.into_inner(),
        };
        if free.len() < self.max_pooled {
            free.push(segment);
        }
    }
}
