// SPDX-License-Identifier: Apache-2.0

//! Byte-level input and output boundaries.
//!
//! The streaming reader pulls bytes through [`ByteSource`]; the writer drains
//! its buffer through [`ByteSink`]. Both are blocking, single-operation
//! abstractions: no background threads, no timeouts. A caller that wants to
//! cancel a streaming parse simply stops feeding bytes.

use crate::error::Result;

/// Input source for the streaming reader.
///
/// # Contract
/// - A return value of 0 **MUST** indicate true end of stream
/// - Implementations **MUST NOT** return 0 unless no more data will ever be
///   available; returning 0 followed by non-zero reads violates this contract
pub trait ByteSource {
    /// Read data into the provided buffer, returning the number of bytes read.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Output target for the writer's `flush`.
pub trait ByteSink {
    /// Write the whole fragment or fail; partial writes are not surfaced.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<R: std::io::Read> ByteSource for std::io::BufReader<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(std::io::Read::read(self, buf)?)
    }
}

impl ByteSink for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<W: std::io::Write> ByteSink for std::io::BufWriter<W> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(std::io::Write::write_all(self, bytes)?)
    }
}

/// A [`ByteSource`] that reads from a byte slice, optionally in fixed-size
/// chunks.
///
/// Two primary uses:
///
/// 1. **Full slice reading**: [`ChunkSource::full_slice`] hands the parser as
///    much as its buffer allows. Ideal when the document is already in memory
///    but the streaming code path is wanted.
/// 2. **Chunked reading**: [`ChunkSource::new`] limits each `read_into` call
///    to a maximum chunk size, simulating network packets or file reads and
///    stress-testing refill handling across token boundaries.
#[derive(Debug)]
pub struct ChunkSource<'a> {
    data: &'a [u8],
    pos: usize,
    chunk: usize,
}

impl<'a> ChunkSource<'a> {
    /// Read `data` at most `chunk` bytes per call. A chunk size of zero is
    /// clamped to one so the source always makes progress.
    pub fn new(data: &'a [u8], chunk: usize) -> Self {
        ChunkSource {
            data,
            pos: 0,
            chunk: chunk.max(1),
        }
    }

    /// Read the entire remaining slice on every call.
    pub fn full_slice(data: &'a [u8]) -> Self {
        ChunkSource {
            data,
            pos: 0,
            chunk: usize::MAX,
        }
    }
}

impl ByteSource for ChunkSource<'_> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.data.len() - self.pos;
        let n = remaining.min(self.chunk).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_source_respects_chunk_size() {
        let mut source = ChunkSource::new(b"abcdefgh", 3);
        let mut buf = [0u8; 16];
        assert_eq!(source.read_into(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(source.read_into(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"def");
        assert_eq!(source.read_into(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"gh");
        assert_eq!(source.read_into(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_full_slice_bounded_by_target() {
        let mut source = ChunkSource::full_slice(b"abcdefgh");
        let mut buf = [0u8; 5];
        assert_eq!(source.read_into(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"abcde");
        assert_eq!(source.read_into(&mut buf).unwrap(), 3);
        assert_eq!(source.read_into(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_zero_chunk_clamped() {
        let mut source = ChunkSource::new(b"xy", 0);
        let mut buf = [0u8; 4];
        assert_eq!(source.read_into(&mut buf).unwrap(), 1);
    }

    #[test]
    fn test_vec_sink_appends() {
        let mut sink: Vec<u8> = Vec::new();
        sink.write_all(b"abc").unwrap();
        sink.write_all(b"def").unwrap();
        assert_eq!(sink, b"abcdef");
    }
}
