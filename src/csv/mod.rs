//! Row tokenizing for the fixed CSV dialect: `,` separates fields, `"`
//! quotes them (a doubled `""` inside quotes is kept verbatim), and rows end
//! at `\n` with an optional preceding `\r`.

mod cell;
mod reader;
mod row;

#[cfg(test)]
mod tests;

pub use self::cell::{Cell, parse_number};
pub use self::reader::{CsvReader, DEFAULT_MAX_FIELDS};
pub use self::row::Row;
