use tracing::Span as TraceSpan;

use super::row::{Row, Span};
use crate::cursor::Cursor;
use crate::error::{CsvError, MalformedReason};
use crate::scan::ByteClassScanner;

/// Default cap on the number of fields in one row.
pub const DEFAULT_MAX_FIELDS: usize = 256;

const QUOTE: u8 = b'"';
const COMMA: u8 = b',';
const CR: u8 = b'\r';
const LF: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CellStart,
    InQuotedCell,
    InUnquotedCell,
    AfterQuoteEndOrEscape,
}

/// Outcome of a complete parse attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parsed {
    /// A row ended; `next` is the window position just past it. `fields`
    /// counts every field seen, including any beyond the stored limit.
    Row { next: usize, fields: usize },
    /// At true end of input with nothing but stray CR bytes left.
    Drained,
}

/// The row state machine, kept apart from the cursor so the reader can
/// borrow the window and the span list at the same time.
struct Tokenizer {
    unquoted: ByteClassScanner,
    quoted: ByteClassScanner,
    max_fields: usize,
}

impl Tokenizer {
    fn new(max_fields: usize) -> Self {
        Self {
            unquoted: ByteClassScanner::new(&[COMMA, CR, LF]),
            quoted: ByteClassScanner::new(&[QUOTE]),
            max_fields,
        }
    }

    /// Same state machine on the portable table scanners.
    #[cfg(test)]
    fn table(max_fields: usize) -> Self {
        Self {
            unquoted: ByteClassScanner::table(&[COMMA, CR, LF]),
            quoted: ByteClassScanner::table(&[QUOTE]),
            max_fields,
        }
    }

    #[inline(always)]
    fn close(&self, spans: &mut Vec<Span>, fields: &mut usize, start: usize, end: usize) {
        if *fields < self.max_fields {
            spans.push(Span { start, end });
        }
        *fields += 1;
    }

    /// Parse one row of `buf` starting at `pos`.
    ///
    /// Returns `None` when a byte beyond the window is needed. With `at_eof`
    /// the window end is the end of input, so an unterminated final row is
    /// closed there instead (an open quoted field still returns `None`).
    fn parse(&self, buf: &[u8], pos: usize, at_eof: bool, spans: &mut Vec<Span>) -> Option<Parsed> {
        let end = buf.len();
        let mut p = pos;
        let mut start = pos;
        let mut fields = 0;
        let mut state = State::CellStart;
        spans.clear();

        loop {
            if p >= end {
                if !at_eof {
                    return None;
                }
                match state {
                    State::CellStart if fields == 0 => return Some(Parsed::Drained),
                    State::CellStart => self.close(spans, &mut fields, end, end),
                    State::InUnquotedCell => self.close(spans, &mut fields, start, end),
                    State::AfterQuoteEndOrEscape => self.close(spans, &mut fields, start, end - 1),
                    State::InQuotedCell => return None,
                }
                return Some(Parsed::Row { next: end, fields });
            }

            match state {
                State::CellStart => match buf[p] {
                    CR => p += 1,
                    QUOTE => {
                        p += 1;
                        start = p;
                        state = State::InQuotedCell;
                    }
                    _ => {
                        start = p;
                        state = State::InUnquotedCell;
                    }
                },

                State::InQuotedCell => {
                    p += self.quoted.scan(&buf[p..end]);
                    if p < end && buf[p] == QUOTE {
                        p += 1;
                        state = State::AfterQuoteEndOrEscape;
                    }
                }

                State::InUnquotedCell => {
                    let n = self.unquoted.scan(&buf[p..end]);
                    if n > 0 {
                        p += n;
                        continue;
                    }
                    self.close(spans, &mut fields, start, p);
                    match buf[p] {
                        LF => return Some(Parsed::Row { next: p + 1, fields }),
                        CR => {
                            let q = skip_cr(buf, p);
                            if q == end {
                                if !at_eof {
                                    return None;
                                }
                                return Some(Parsed::Row { next: end, fields });
                            }
                            if buf[q] == LF {
                                return Some(Parsed::Row { next: q + 1, fields });
                            }
                            // bare CR separates fields
                            p = q;
                            state = State::CellStart;
                        }
                        _ => {
                            p += 1;
                            state = State::CellStart;
                        }
                    }
                }

                State::AfterQuoteEndOrEscape => match buf[p] {
                    COMMA => {
                        self.close(spans, &mut fields, start, p - 1);
                        p += 1;
                        state = State::CellStart;
                    }
                    LF => {
                        self.close(spans, &mut fields, start, p - 1);
                        return Some(Parsed::Row { next: p + 1, fields });
                    }
                    CR => {
                        let q = skip_cr(buf, p);
                        if q == end && !at_eof {
                            return None;
                        }
                        if q == end || buf[q] == LF {
                            self.close(spans, &mut fields, start, p - 1);
                            return Some(Parsed::Row { next: (q + 1).min(end), fields });
                        }
                        p += 1;
                        state = State::InQuotedCell;
                    }
                    // a doubled quote (or stray byte) stays in the field verbatim
                    _ => {
                        p += 1;
                        state = State::InQuotedCell;
                    }
                },
            }
        }
    }
}

/// Position of the first non-CR byte after the CR at `p` (may equal `buf.len()`).
#[inline]
fn skip_cr(buf: &[u8], p: usize) -> usize {
    let mut q = p + 1;
    while q < buf.len() && buf[q] == CR {
        q += 1;
    }
    q
}

/// Zero-copy CSV row reader over a [`Cursor`].
///
/// Each [`read_row`](CsvReader::read_row) parses the next row from the
/// cursor's window. A row that runs past the window is retried once after
/// sliding the window so that the row starts at its front; bytes before the
/// committed position are released at that point.
///
/// ```
/// use csvscan_rs::csv::CsvReader;
/// use csvscan_rs::cursor::MappedCursor;
///
/// let cursor = MappedCursor::from_vec(b"name,qty\nbolt,12\n".to_vec());
/// let mut reader = CsvReader::new(cursor);
/// let header = reader.read_row().unwrap().unwrap();
/// assert_eq!(header.position_by_text("qty"), Some(1));
/// let row = reader.read_row().unwrap().unwrap();
/// assert_eq!(row.get(1).unwrap().as_number(), 12.0);
/// assert!(reader.read_row().unwrap().is_none());
/// ```
pub struct CsvReader<C> {
    cursor: C,
    tokenizer: Tokenizer,
    spans: Vec<Span>,
    /// Committed position: start of the next unparsed row in the window.
    pos: usize,
    rows: u64,
    trace: TraceSpan,
}

impl<C: Cursor> CsvReader<C> {
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            tokenizer: Tokenizer::new(DEFAULT_MAX_FIELDS),
            spans: Vec::with_capacity(DEFAULT_MAX_FIELDS),
            pos: 0,
            rows: 0,
            trace: TraceSpan::none(),
        }
    }

    /// Reject rows with more than `limit` fields (at least 1).
    pub fn with_max_fields(mut self, limit: usize) -> Self {
        self.tokenizer.max_fields = limit.max(1);
        self
    }

    /// Emit refill and error events under `span`. Disabled spans emit nothing.
    pub fn with_span(mut self, span: TraceSpan) -> Self {
        self.trace = span;
        self
    }

    /// Force the table scanner backend regardless of CPU support.
    #[cfg(test)]
    pub(crate) fn with_table_scanners(mut self) -> Self {
        self.tokenizer = Tokenizer::table(self.tokenizer.max_fields);
        self
    }

    #[inline]
    pub fn max_fields(&self) -> usize {
        self.tokenizer.max_fields
    }

    /// Rows returned so far.
    #[inline]
    pub fn rows_read(&self) -> u64 {
        self.rows
    }

    /// Absolute offset of the next unparsed byte.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.cursor.offset() + self.pos as u64
    }

    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    pub fn into_cursor(self) -> C {
        self.cursor
    }

    /// Read the next row.
    ///
    /// Returns `Ok(None)` at end of stream. [`CsvError::RowTooWide`] and
    /// [`CsvError::Malformed`] concern only the current row; open and read
    /// errors end the stream.
    pub fn read_row(&mut self) -> Result<Option<Row<'_>>, CsvError> {
        let parsed = match self.attempt() {
            Some(parsed) => parsed,
            None => {
                if !self.refill()? {
                    return Ok(None);
                }
                match self.attempt() {
                    Some(parsed) => parsed,
                    None => return Err(self.malformed()),
                }
            }
        };

        let (next, fields) = match parsed {
            Parsed::Row { next, fields } => (next, fields),
            Parsed::Drained => {
                self.pos = self.cursor.size();
                return Ok(None);
            }
        };

        let offset = self.offset();
        self.pos = next;
        let limit = self.tokenizer.max_fields;
        if fields > limit {
            if !self.trace.is_disabled() {
                tracing::debug!(parent: &self.trace, offset, fields, limit, "row too wide");
            }
            return Err(CsvError::RowTooWide {
                offset,
                fields,
                limit,
            });
        }
        self.rows += 1;
        Ok(Some(Row::new(self.cursor.buf(), &self.spans, offset)))
    }

    #[inline]
    fn attempt(&mut self) -> Option<Parsed> {
        let at_eof = self.cursor.is_eof();
        self.tokenizer
            .parse(self.cursor.buf(), self.pos, at_eof, &mut self.spans)
    }

    /// Slide the window so the pending row starts at its front.
    fn refill(&mut self) -> Result<bool, CsvError> {
        let shift = self.cursor.size() - self.pos;
        let result = self.cursor.more(shift);
        self.pos = 0;
        if !self.trace.is_disabled() {
            tracing::trace!(
                parent: &self.trace,
                shift,
                window = self.cursor.size(),
                offset = self.cursor.offset(),
                eof = self.cursor.is_eof(),
                "refill"
            );
        }
        result
    }

    fn malformed(&mut self) -> CsvError {
        let offset = self.offset();
        let reason = if self.cursor.is_eof() {
            // nothing after the open quote can ever close it
            self.pos = self.cursor.size();
            MalformedReason::UnterminatedQuote
        } else {
            MalformedReason::RowExceedsBuffer {
                capacity: self.cursor.size(),
            }
        };
        if !self.trace.is_disabled() {
            tracing::debug!(parent: &self.trace, offset, %reason, "malformed row");
        }
        CsvError::Malformed { offset, reason }
    }
}
