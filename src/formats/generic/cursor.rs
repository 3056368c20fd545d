//! Forward-only positioned readers for the generic container walker.
//!
//! The walker only ever skips ahead (to a sibling data group or past a
//! data set's rows), so one trait covers both a seekable plain file and
//! a gzip stream that can only discard bytes.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{CelError, Result};

/// A byte stream that knows its absolute position and can skip forward
/// to one.
pub(crate) trait SkipRead: Read {
    fn position(&self) -> u64;

    /// Reposition to `offset`, which must not be behind the current
    /// position.
    fn skip_to(&mut self, offset: u64) -> io::Result<()>;
}

/// Plain-file cursor; skipping is a relative seek.
pub(crate) struct FileCursor {
    inner: BufReader<File>,
    pos: u64,
}

impl FileCursor {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| CelError::open(path, e))?;
        Ok(FileCursor {
            inner: BufReader::new(file),
            pos: 0,
        })
    }
}

impl Read for FileCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl SkipRead for FileCursor {
    fn position(&self) -> u64 {
        self.pos
    }

    fn skip_to(&mut self, offset: u64) -> io::Result<()> {
        if offset < self.pos {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("offset {offset} is behind position {}", self.pos),
            ));
        }
        self.inner.seek_relative((offset - self.pos) as i64)?;
        self.pos = offset;
        Ok(())
    }
}

/// Gzip-stream cursor; positions are in the decompressed byte stream
/// and skipping decompresses and discards.
pub(crate) struct GzCursor {
    inner: BufReader<GzDecoder<File>>,
    pos: u64,
}

impl GzCursor {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| CelError::open(path, e))?;
        Ok(GzCursor {
            inner: BufReader::new(GzDecoder::new(file)),
            pos: 0,
        })
    }
}

impl Read for GzCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl SkipRead for GzCursor {
    fn position(&self) -> u64 {
        self.pos
    }

    fn skip_to(&mut self, offset: u64) -> io::Result<()> {
        if offset < self.pos {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("offset {offset} is behind position {}", self.pos),
            ));
        }
        let wanted = offset - self.pos;
        let skipped = io::copy(&mut (&mut self.inner).take(wanted), &mut io::sink())?;
        self.pos += skipped;
        if skipped < wanted {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }
}

/// In-memory cursor, used by tests.
#[cfg(test)]
pub(crate) struct SliceCursor {
    data: Vec<u8>,
    pos: u64,
}

#[cfg(test)]
impl SliceCursor {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        SliceCursor { data, pos: 0 }
    }
}

#[cfg(test)]
impl Read for SliceCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos.min(self.data.len() as u64) as usize..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
impl SkipRead for SliceCursor {
    fn position(&self) -> u64 {
        self.pos
    }

    fn skip_to(&mut self, offset: u64) -> io::Result<()> {
        if offset < self.pos {
            return Err(io::ErrorKind::InvalidInput.into());
        }
        if offset > self.data.len() as u64 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.pos = offset;
        Ok(())
    }
}
