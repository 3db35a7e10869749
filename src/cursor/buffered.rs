use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::Cursor;
use crate::common::io::{open_noatime, read_full};
use crate::error::CsvError;

/// Default buffer capacity, and so the default upper bound on one pending row.
pub const DEFAULT_CAPACITY: usize = 128 * 1024;

/// Sequential cursor over any reader, backed by a fixed-capacity buffer.
///
/// Each [`more`](Cursor::more) copies the retained tail to the front of the
/// buffer and then fills the free space completely (or up to EOF), so a
/// window that did not grow after a refill means EOF or a full buffer.
pub struct BufferedCursor<R> {
    reader: R,
    buf: Box<[u8]>,
    len: usize,
    offset: u64,
    eof: bool,
}

impl BufferedCursor<File> {
    /// Open `path` for sequential reading with the default capacity.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CsvError> {
        let path = path.as_ref();
        let file = open_noatime(path).map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> BufferedCursor<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_CAPACITY)
    }

    /// A capacity of 0 is raised to 1.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            len: 0,
            offset: 0,
            eof: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Cursor for BufferedCursor<R> {
    #[inline]
    fn buf(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn more(&mut self, shift: usize) -> Result<bool, CsvError> {
        let shift = shift.min(self.len);
        let dropped = self.len - shift;
        self.buf.copy_within(dropped..self.len, 0);
        self.offset += dropped as u64;
        self.len = shift;

        if !self.eof {
            let free = self.buf.len() - shift;
            let n = read_full(&mut self.reader, &mut self.buf[shift..]).map_err(|source| {
                CsvError::Read {
                    offset: self.offset,
                    source,
                }
            })?;
            if n < free {
                self.eof = true;
            }
            self.len += n;
        }

        Ok(self.len > 0)
    }

    #[inline]
    fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    fn is_eof(&self) -> bool {
        self.eof
    }
}
