//! Byte windows over an input source.
//!
//! A [`Cursor`] exposes the currently readable span of the input and knows
//! how to slide it forward. [`MappedCursor`] keeps the whole file resident and
//! slides by moving an offset; [`BufferedCursor`] owns a fixed-capacity buffer
//! and slides by copying the unconsumed tail to the front, then reading more.

mod buffered;
mod mapped;


pub use self::buffered::{BufferedCursor, DEFAULT_CAPACITY};
pub use self::mapped::MappedCursor;

use crate::error::CsvError;

/// A contiguous window over an input source that can be slid and refilled.
pub trait Cursor {
    /// The current readable window.
    fn buf(&self) -> &[u8];

    /// Length of the current window.
    #[inline]
    fn size(&self) -> usize {
        self.buf().len()
    }

    /// Advance the window, keeping the last `shift` bytes of the current
    /// window as the prefix of the new one and appending any newly available
    /// bytes after them. `shift` larger than [`size`](Cursor::size) is clamped.
    ///
    /// Returns `Ok(false)` once the resulting window is empty (end of stream).
    /// Read failures are returned as [`CsvError::Read`].
    fn more(&mut self, shift: usize) -> Result<bool, CsvError>;

    /// Absolute stream offset of the first byte of the current window.
    fn offset(&self) -> u64;

    /// True when no bytes exist beyond the current window.
    fn is_eof(&self) -> bool;
}
