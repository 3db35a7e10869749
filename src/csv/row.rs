use std::fmt;

use super::cell::Cell;

/// Byte range of one field inside the cursor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

/// The cells of the most recently read row.
///
/// A `Row` borrows the reader, so it (and every [`Cell`] taken from it) must
/// be dropped before the next [`read_row`](super::CsvReader::read_row) call.
/// Copy out anything that has to outlive that point.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    window: &'a [u8],
    spans: &'a [Span],
    offset: u64,
}

impl<'a> Row<'a> {
    pub(crate) fn new(window: &'a [u8], spans: &'a [Span], offset: u64) -> Self {
        Self {
            window,
            spans,
            offset,
        }
    }

    /// Number of cells in the row.
    #[inline]
    pub fn count(&self) -> usize {
        self.spans.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Absolute byte offset of the row's first byte in the input.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Cell<'a>> {
        self.spans
            .get(index)
            .map(|s| Cell::new(&self.window[s.start..s.end]))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Cell<'a>> + 'a {
        let window = self.window;
        self.spans
            .iter()
            .map(move |s| Cell::new(&window[s.start..s.end]))
    }

    /// First cell whose bytes equal `value` exactly.
    pub fn find_by_text(&self, value: &str) -> Option<Cell<'a>> {
        self.iter().find(|c| c.equals(value))
    }

    /// Index of the first cell whose bytes equal `value` exactly.
    pub fn position_by_text(&self, value: &str) -> Option<usize> {
        self.iter().position(|c| c.equals(value))
    }

    /// Copy every cell out as text.
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|c| c.as_text()).collect()
    }
}

impl fmt::Debug for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
