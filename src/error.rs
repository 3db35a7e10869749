use std::fmt;
use std::io;
use std::path::PathBuf;

/// Why a row could not be completed even after a refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// A quoted field was still open at the true end of input.
    UnterminatedQuote,
    /// The pending row does not fit in the buffered cursor.
    RowExceedsBuffer { capacity: usize },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::UnterminatedQuote => write!(f, "unterminated quoted field"),
            MalformedReason::RowExceedsBuffer { capacity } => {
                write!(f, "row does not fit in {} byte buffer", capacity)
            }
        }
    }
}

/// Errors raised while opening, reading or tokenizing CSV input.
///
/// End of stream is not an error: [`CsvReader::read_row`](crate::csv::CsvReader::read_row)
/// returns `Ok(None)` for it.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("cannot open '{}': {}", .path.display(), crate::common::io_error_msg(.source))]
    Open { path: PathBuf, source: io::Error },

    #[error("read error at byte {offset}: {}", crate::common::io_error_msg(.source))]
    Read { offset: u64, source: io::Error },

    #[error("malformed input at byte {offset}: {reason}")]
    Malformed { offset: u64, reason: MalformedReason },

    #[error("row at byte {offset} has {fields} fields, limit is {limit}")]
    RowTooWide {
        offset: u64,
        fields: usize,
        limit: usize,
    },
}

impl CsvError {
    /// Open and read failures end the whole parse; the others only
    /// concern the row being read.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CsvError::Open { .. } | CsvError::Read { .. })
    }

    /// Absolute byte offset the error refers to, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            CsvError::Open { .. } => None,
            CsvError::Read { offset, .. }
            | CsvError::Malformed { offset, .. }
            | CsvError::RowTooWide { offset, .. } => Some(*offset),
        }
    }
}
