//! Zero-copy CSV tokenizing over memory-mapped files and sequential streams.
//!
//! A [`cursor::Cursor`] supplies a window of bytes, [`scan::ByteClassScanner`]
//! finds delimiters in it, and [`csv::CsvReader`] turns the window into rows
//! of [`csv::Cell`] views that borrow the window directly.

/// mimalloc as the global allocator; span vectors and owned cells are small
/// and short-lived.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod common;
pub mod csv;
pub mod cursor;
pub mod error;
pub mod scan;

pub use crate::csv::{Cell, CsvReader, Row};
pub use crate::cursor::{BufferedCursor, Cursor, MappedCursor};
pub use crate::error::{CsvError, MalformedReason};
