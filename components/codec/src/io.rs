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

//! Byte source and sink contracts of the codec frontend.
//!
//! Both traits require only the single-byte primitive; bulk operations
//! derive from it. Implementations over buffered streams should override
//! the bulk forms.

use std::io::{self, Read, Write};

/// Sink of encoded bytes.
pub trait ByteSink {
    fn write_u8(&mut self, b: u8) -> io::Result<()>;

    fn write_slice(&mut self, src: &[u8]) -> io::Result<()> {
        for &b in src {
            self.write_u8(b)?;
        }
        Ok(())
    }

    fn write_u32_le(&mut self, v: u32) -> io::Result<()> {
        self.write_slice(&v.to_le_bytes())
    }

    fn write_u64_le(&mut self, v: u64) -> io::Result<()> {
        self.write_slice(&v.to_le_bytes())
    }
}

impl ByteSink for Vec<u8> {
    fn write_u8(&mut self, b: u8) -> io::Result<()> {
        self.push(b);
        Ok(())
    }

    fn write_slice(&mut self, src: &[u8]) -> io::Result<()> {
        self.extend_from_slice(src);
        Ok(())
    }
}

/// Source of encoded bytes. `None` marks the end of the stream.
pub trait ByteSource {
    fn read_u8(&mut self) -> io::Result<Option<u8>>;

    /// Read up to `dst.len()` bytes, returning the count; zero means end of
    /// stream (for a non-empty `dst`).
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < dst.len() {
            match self.read_u8()? {
                Some(b) => {
                    dst[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    /// Fill `dst` completely unless the stream ends first; returns the bytes
    /// read.
    fn read_fully(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            let n = self.read(&mut dst[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl ByteSource for &[u8] {
    fn read_u8(&mut self) -> io::Result<Option<u8>> {
        match self.split_first() {
            Some((&b, rest)) => {
                *self = rest;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let n = dst.len().min(self.len());
        dst[..n].copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(n)
    }
}

/// [ByteSource] over any [std::io::Read].
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_u8(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(dst) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// [ByteSink] over any [std::io::Write].
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for WriterSink<W> {
    fn write_u8(&mut self, b: u8) -> io::Result<()> {
        self.inner.write_all(&[b])
    }

    fn write_slice(&mut self, src: &[u8]) -> io::Result<()> {
        self.inner.write_all(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink() {
        let mut sink = Vec::new();
        sink.write_u8(0xAB).unwrap();
        sink.write_slice(&[1, 2, 3]).unwrap();
        sink.write_u32_le(0x0403_0201).unwrap();
        assert_eq!(vec![0xAB, 1, 2, 3, 1, 2, 3, 4], sink);
    }

    #[test]
    fn test_slice_source() {
        let data = [1u8, 2, 3, 4, 5];
        let mut source = &data[..];

        assert_eq!(Some(1), source.read_u8().unwrap());

        let mut dst = [0u8; 3];
        assert_eq!(3, ByteSource::read(&mut source, &mut dst).unwrap());
        assert_eq!([2, 3, 4], dst);

        let mut dst = [0u8; 3];
        assert_eq!(1, source.read_fully(&mut dst).unwrap());
        assert_eq!(None, source.read_u8().unwrap());
    }

    #[test]
    fn test_reader_source_roundtrip() {
        let data = vec![9u8; 300];
        let mut source = ReaderSource::new(&data[..]);

        let mut dst = vec![0u8; 300];
        assert_eq!(300, source.read_fully(&mut dst).unwrap());
        assert_eq!(data, dst);
        assert_eq!(None, source.read_u8().unwrap());
    }

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_slice(b"blink").unwrap();
        sink.write_u64_le(1).unwrap();
        let out = sink.into_inner();
        assert_eq!(b"blink".len() + 8, out.len());
    }
}
