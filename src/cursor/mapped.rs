use std::path::Path;

use super::Cursor;
use crate::common::io::{FileData, map_file};
use crate::error::CsvError;

/// Whole-input cursor: every byte is resident, so sliding never copies.
pub struct MappedCursor {
    data: FileData,
    start: usize,
}

impl MappedCursor {
    /// Map `path` read-only in full.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CsvError> {
        let path = path.as_ref();
        let data = map_file(path).map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_data(data))
    }

    /// Serve an in-memory buffer with the same semantics as a mapped file.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::from_data(FileData::Owned(bytes))
    }

    fn from_data(data: FileData) -> Self {
        Self { data, start: 0 }
    }

    /// Total length of the underlying input.
    pub fn input_len(&self) -> usize {
        self.data.len()
    }
}

impl Cursor for MappedCursor {
    #[inline]
    fn buf(&self) -> &[u8] {
        &self.data[self.start..]
    }

    fn more(&mut self, shift: usize) -> Result<bool, CsvError> {
        let remain = self.data.len() - self.start;
        let shift = shift.min(remain);
        self.start += remain - shift;
        Ok(self.start < self.data.len())
    }

    #[inline]
    fn offset(&self) -> u64 {
        self.start as u64
    }

    #[inline]
    fn is_eof(&self) -> bool {
        true
    }
}
