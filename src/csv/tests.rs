use super::*;
use crate::cursor::{BufferedCursor, Cursor, MappedCursor};
use crate::error::{CsvError, MalformedReason};
use proptest::prelude::*;
use std::io::{self, Read};

type Rows = Vec<Vec<Vec<u8>>>;

fn collect<C: Cursor>(reader: &mut CsvReader<C>) -> Result<Rows, CsvError> {
    let mut rows = Vec::new();
    while let Some(row) = reader.read_row()? {
        rows.push(row.iter().map(|c| c.as_bytes().to_vec()).collect());
    }
    Ok(rows)
}

fn mapped_rows(input: &[u8]) -> Rows {
    collect(&mut CsvReader::new(MappedCursor::from_vec(input.to_vec()))).unwrap()
}

fn buffered_rows(input: &[u8], capacity: usize) -> Rows {
    collect(&mut CsvReader::new(BufferedCursor::with_capacity(input, capacity))).unwrap()
}

fn mapped_table_rows(input: &[u8]) -> Rows {
    let cursor = MappedCursor::from_vec(input.to_vec());
    collect(&mut CsvReader::new(cursor).with_table_scanners()).unwrap()
}

fn buffered_table_rows(input: &[u8], capacity: usize) -> Rows {
    let cursor = BufferedCursor::with_capacity(input, capacity);
    collect(&mut CsvReader::new(cursor).with_table_scanners()).unwrap()
}

/// Parse through both cursors and both scanner backends and require
/// identical results.
fn parse(input: &[u8]) -> Rows {
    let mapped = mapped_rows(input);
    assert_eq!(buffered_rows(input, 1024), mapped, "buffered cursor disagrees");
    assert_eq!(mapped_table_rows(input), mapped, "table scanner disagrees");
    assert_eq!(
        buffered_table_rows(input, 1024),
        mapped,
        "buffered table scanner disagrees"
    );
    mapped
}

fn strs(rows: &[&[&str]]) -> Rows {
    rows.iter()
        .map(|r| r.iter().map(|c| c.as_bytes().to_vec()).collect())
        .collect()
}

struct FailAfter<'a> {
    data: &'a [u8],
}

impl Read for FailAfter<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() {
            return Err(io::Error::other("device gone"));
        }
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

// --- Basic tokenizing ---

#[test]
fn test_simple_rows() {
    assert_eq!(
        parse(b"a,b,c\n1,2,3\n"),
        strs(&[&["a", "b", "c"], &["1", "2", "3"]])
    );
}

#[test]
fn test_quoted_field_with_comma() {
    assert_eq!(parse(b"a,\"b,c\",d\n"), strs(&[&["a", "b,c", "d"]]));
}

#[test]
fn test_doubled_quotes_kept_raw() {
    assert_eq!(
        parse(b"\"he said \"\"hi\"\"\"\n"),
        strs(&[&["he said \"\"hi\"\""]])
    );
}

#[test]
fn test_quoted_field_with_newline() {
    assert_eq!(parse(b"\"a\nb\",c\n"), strs(&[&["a\nb", "c"]]));
}

#[test]
fn test_empty_quoted_field() {
    assert_eq!(parse(b"\"\",x\n"), strs(&[&["", "x"]]));
}

#[test]
fn test_crlf_stripped() {
    assert_eq!(parse(b"a,b\r\n"), strs(&[&["a", "b"]]));
    assert_eq!(parse(b"a,b\r\nc,d\r\n"), strs(&[&["a", "b"], &["c", "d"]]));
}

#[test]
fn test_crlf_after_quote() {
    assert_eq!(parse(b"a,\"b\"\r\nc\r\n"), strs(&[&["a", "b"], &["c"]]));
}

#[test]
fn test_bare_cr_separates_fields() {
    assert_eq!(parse(b"a\rb\n"), strs(&[&["a", "b"]]));
}

#[test]
fn test_leading_cr_skipped() {
    assert_eq!(parse(b"a\n\rb\n"), strs(&[&["a"], &["b"]]));
}

#[test]
fn test_quote_inside_unquoted_is_literal() {
    assert_eq!(parse(b"a\"b,c\n"), strs(&[&["a\"b", "c"]]));
}

#[test]
fn test_empty_fields() {
    assert_eq!(parse(b",,\n"), strs(&[&["", "", ""]]));
    assert_eq!(parse(b"a,\n"), strs(&[&["a", ""]]));
}

#[test]
fn test_empty_line_is_single_empty_cell() {
    assert_eq!(parse(b"a\n\nb\n"), strs(&[&["a"], &[""], &["b"]]));
}

#[test]
fn test_empty_input() {
    assert!(parse(b"").is_empty());
}

#[test]
fn test_long_fields_cross_vector_chunks() {
    let long = "x".repeat(100);
    let input = format!("{long},\"{long},{long}\"\n");
    let expected = format!("{long},{long}");
    assert_eq!(
        parse(input.as_bytes()),
        strs(&[&[long.as_str(), expected.as_str()]])
    );
}

// --- End of input policy ---

#[test]
fn test_final_row_without_newline() {
    assert_eq!(parse(b"a,b\nc,d"), strs(&[&["a", "b"], &["c", "d"]]));
}

#[test]
fn test_final_row_ends_with_quote() {
    assert_eq!(parse(b"a,\"b\""), strs(&[&["a", "b"]]));
}

#[test]
fn test_final_row_trailing_comma() {
    assert_eq!(parse(b"a,"), strs(&[&["a", ""]]));
}

#[test]
fn test_final_cr_without_lf() {
    assert_eq!(parse(b"a,b\r"), strs(&[&["a", "b"]]));
}

#[test]
fn test_trailing_cr_after_last_row_ignored() {
    assert_eq!(parse(b"a\n\r\r"), strs(&[&["a"]]));
}

#[test]
fn test_unterminated_quote_is_malformed_mapped() {
    let mut reader = CsvReader::new(MappedCursor::from_vec(b"a\n\"open,field\n".to_vec()));
    assert_eq!(reader.read_row().unwrap().unwrap().to_strings(), ["a"]);
    let err = reader.read_row().unwrap_err();
    match err {
        CsvError::Malformed { offset, reason } => {
            assert_eq!(offset, 2);
            assert_eq!(reason, MalformedReason::UnterminatedQuote);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(reader.read_row().unwrap().is_none());
}

#[test]
fn test_unterminated_quote_is_malformed_buffered() {
    let mut reader = CsvReader::new(BufferedCursor::with_capacity(&b"a\n\"open"[..], 64));
    assert!(reader.read_row().unwrap().is_some());
    let err = reader.read_row().unwrap_err();
    assert!(matches!(
        err,
        CsvError::Malformed {
            offset: 2,
            reason: MalformedReason::UnterminatedQuote
        }
    ));
    assert!(!err.is_fatal());
    assert!(reader.read_row().unwrap().is_none());
}

#[test]
fn test_row_exceeding_buffer_is_malformed() {
    let input = b"ok\nthis row is far too long for the buffer\nok\n";
    let mut reader = CsvReader::new(BufferedCursor::with_capacity(&input[..], 16));
    assert_eq!(reader.read_row().unwrap().unwrap().to_strings(), ["ok"]);
    let err = reader.read_row().unwrap_err();
    match err {
        CsvError::Malformed { offset, reason } => {
            assert_eq!(offset, 3);
            assert_eq!(reason, MalformedReason::RowExceedsBuffer { capacity: 16 });
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // no progress is possible, so the error repeats
    assert!(matches!(
        reader.read_row(),
        Err(CsvError::Malformed { .. })
    ));
}

#[test]
fn test_row_exactly_filling_buffer() {
    let input = b"abcdefg\nhij\n";
    assert_eq!(buffered_rows(input, 8), strs(&[&["abcdefg"], &["hij"]]));
}

// --- Field limit ---

#[test]
fn test_row_too_wide() {
    let mut reader =
        CsvReader::new(MappedCursor::from_vec(b"a,b\n1,2,3,4\nx,y\n".to_vec())).with_max_fields(3);
    assert_eq!(reader.max_fields(), 3);
    assert_eq!(reader.read_row().unwrap().unwrap().count(), 2);
    let err = reader.read_row().unwrap_err();
    assert!(!err.is_fatal());
    match err {
        CsvError::RowTooWide {
            offset,
            fields,
            limit,
        } => {
            assert_eq!(offset, 4);
            assert_eq!(fields, 4);
            assert_eq!(limit, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // the wide row was consumed; reading continues after it
    assert_eq!(reader.read_row().unwrap().unwrap().to_strings(), ["x", "y"]);
    assert_eq!(reader.rows_read(), 2);
}

#[test]
fn test_default_field_limit() {
    let at_limit = vec!["v"; DEFAULT_MAX_FIELDS].join(",") + "\n";
    let over = vec!["v"; DEFAULT_MAX_FIELDS + 1].join(",") + "\n";

    let mut reader = CsvReader::new(MappedCursor::from_vec(at_limit.into_bytes()));
    assert_eq!(reader.read_row().unwrap().unwrap().count(), DEFAULT_MAX_FIELDS);

    let mut reader = CsvReader::new(MappedCursor::from_vec(over.into_bytes()));
    assert!(matches!(
        reader.read_row(),
        Err(CsvError::RowTooWide { fields, limit, .. })
            if fields == DEFAULT_MAX_FIELDS + 1 && limit == DEFAULT_MAX_FIELDS
    ));
}

#[test]
fn test_zero_field_limit_raised() {
    let reader = CsvReader::new(MappedCursor::from_vec(Vec::new())).with_max_fields(0);
    assert_eq!(reader.max_fields(), 1);
}

// --- Read errors ---

#[test]
fn test_read_error_propagates() {
    let cursor = BufferedCursor::with_capacity(FailAfter { data: b"a,b\nc," }, 6);
    let mut reader = CsvReader::new(cursor);
    assert_eq!(reader.read_row().unwrap().unwrap().to_strings(), ["a", "b"]);
    let err = reader.read_row().unwrap_err();
    assert!(matches!(err, CsvError::Read { offset: 4, .. }));
    assert!(err.is_fatal());
}

// --- Refill behaviour ---

#[test]
fn test_quoted_field_spans_refill() {
    let input = b"id,\"quoted, with comma\"\nnext,row\n";
    assert_eq!(
        buffered_rows(input, 30),
        strs(&[&["id", "quoted, with comma"], &["next", "row"]])
    );
}

#[test]
fn test_crlf_split_across_refill() {
    let input = b"abc\r\ndef\r\n";
    assert_eq!(buffered_rows(input, 5), strs(&[&["abc"], &["def"]]));
    // first window ends right after the second CR
    assert_eq!(buffered_rows(input, 9), strs(&[&["abc"], &["def"]]));
}

#[test]
fn test_every_capacity_matches_mapped() {
    let input: &[u8] =
        b"name,note,qty\r\nbolt,\"m6, zinc\",12\nnut,\"say \"\"hi\"\"\",7\n\"multi\nline\",x,\n,,\n";
    let expected = mapped_rows(input);
    for cap in 20..=input.len() + 1 {
        assert_eq!(buffered_rows(input, cap), expected, "capacity {cap}");
        assert_eq!(buffered_table_rows(input, cap), expected, "table, capacity {cap}");
    }
}

#[test]
fn test_row_offsets() {
    let input = b"a,b\nccc\r\n\"d\"\n";
    let mut reader = CsvReader::new(BufferedCursor::with_capacity(&input[..], 6));
    let mut offsets = Vec::new();
    while let Some(row) = reader.read_row().unwrap() {
        offsets.push(row.offset());
    }
    assert_eq!(offsets, [0, 4, 9]);
    assert_eq!(reader.offset(), input.len() as u64);
}

#[test]
fn test_with_span_is_transparent() {
    let span = tracing::info_span!("csv_test");
    let mut reader =
        CsvReader::new(BufferedCursor::with_capacity(&b"a,b\nc,d\n"[..], 5)).with_span(span);
    assert_eq!(
        collect(&mut reader).unwrap(),
        strs(&[&["a", "b"], &["c", "d"]])
    );
}

#[test]
fn test_into_cursor() {
    let mut reader = CsvReader::new(MappedCursor::from_vec(b"a\n".to_vec()));
    reader.read_row().unwrap();
    let cursor = reader.into_cursor();
    assert_eq!(cursor.input_len(), 2);
}

// --- Row and Cell utilities ---

#[test]
fn test_find_by_text() {
    let mut reader = CsvReader::new(MappedCursor::from_vec(b"id,name,name,qty\n".to_vec()));
    let row = reader.read_row().unwrap().unwrap();
    assert_eq!(row.count(), 4);
    assert_eq!(row.position_by_text("name"), Some(1));
    assert_eq!(row.find_by_text("qty").unwrap().as_text(), "qty");
    assert!(row.find_by_text("nam").is_none());
    assert!(row.find_by_text("missing").is_none());
    assert!(row.get(4).is_none());
}

#[test]
fn test_cell_text_and_equals() {
    let mut reader = CsvReader::new(MappedCursor::from_vec(b"caf\xc3\xa9,\xff\n".to_vec()));
    let row = reader.read_row().unwrap().unwrap();
    let first = row.get(0).unwrap();
    assert!(first.equals("café"));
    assert_eq!(first.len(), 5);
    assert_eq!(row.get(1).unwrap().as_text(), "\u{fffd}");
    assert_eq!(format!("{row:?}"), "[\"café\", \"\u{fffd}\"]");
}

#[test]
fn test_as_number() {
    let cases: &[(&str, f64)] = &[
        ("3.5", 3.5),
        ("-2e3", -2000.0),
        ("  42", 42.0),
        ("+7", 7.0),
        (".5", 0.5),
        ("5.", 5.0),
        ("1E-2", 0.01),
        ("12abc", 12.0),
        ("1e", 1.0),
        ("1e+", 1.0),
        ("3.25.1", 3.25),
        ("-inf", f64::NEG_INFINITY),
        ("Infinity", f64::INFINITY),
    ];
    for &(text, expected) in cases {
        assert_eq!(parse_number(text.as_bytes()), expected, "{text}");
    }
    assert!(parse_number(b"NaN").is_nan());
}

#[test]
fn test_as_number_malformed_is_zero() {
    for text in ["", "abc", "-", ".", "e5", "+-1", "  "] {
        assert_eq!(parse_number(text.as_bytes()), 0.0, "{text:?}");
    }
    assert_eq!(parse_number(b"\xff1"), 0.0);
}

#[test]
fn test_as_number_bounded_to_cell() {
    let mut reader = CsvReader::new(MappedCursor::from_vec(b"12,34\n".to_vec()));
    let row = reader.read_row().unwrap().unwrap();
    assert_eq!(row.get(0).unwrap().as_number(), 12.0);
    assert_eq!(row.get(1).unwrap().as_number(), 34.0);
}

#[test]
fn test_unescape() {
    let mut reader =
        CsvReader::new(MappedCursor::from_vec(b"\"a \"\"b\"\" c\",plain,\"\"\"\"\"\"\n".to_vec()));
    let row = reader.read_row().unwrap().unwrap();
    let first = row.get(0).unwrap();
    assert_eq!(first.as_bytes(), b"a \"\"b\"\" c");
    assert_eq!(&*first.unescape(), b"a \"b\" c");
    assert!(matches!(
        row.get(1).unwrap().unescape(),
        std::borrow::Cow::Borrowed(b"plain")
    ));
    assert_eq!(&*row.get(2).unwrap().unescape(), b"\"\"");
}

// --- Properties ---

fn unquoted_field() -> impl Strategy<Value = String> {
    "[a-z0-9 .;-]{0,12}"
}

/// A field as written in the input, with the raw cell bytes it must produce.
fn any_field() -> impl Strategy<Value = (String, String)> {
    prop_oneof![
        unquoted_field().prop_map(|f| (f.clone(), f)),
        "[a-z ,\n\"]{0,12}".prop_map(|content| {
            let raw = content.replace('"', "\"\"");
            (format!("\"{raw}\""), raw)
        }),
    ]
}

proptest! {
    #[test]
    fn prop_unquoted_row_rejoins(fields in proptest::collection::vec(unquoted_field(), 1..20)) {
        let line = fields.join(",");
        let input = format!("{line}\n");
        let rows = mapped_rows(input.as_bytes());
        prop_assert_eq!(rows.len(), 1);
        prop_assert_eq!(rows[0].len(), fields.len());
        prop_assert_eq!(rows[0].join(&b","[..]), line.into_bytes());
    }

    #[test]
    fn prop_chunking_is_idempotent(
        rows in proptest::collection::vec(
            (proptest::collection::vec(any_field(), 1..6), any::<bool>()),
            1..8,
        ),
        extra in 1usize..64,
    ) {
        let mut input = Vec::new();
        let mut expected: Rows = Vec::new();
        let mut longest = 0;
        for (fields, crlf) in &rows {
            let written: Vec<&str> = fields.iter().map(|(w, _)| w.as_str()).collect();
            let line = written.join(",") + if *crlf { "\r\n" } else { "\n" };
            longest = longest.max(line.len());
            input.extend_from_slice(line.as_bytes());
            expected.push(fields.iter().map(|(_, raw)| raw.clone().into_bytes()).collect());
        }

        let mapped = mapped_rows(&input);
        prop_assert_eq!(&mapped, &expected);
        let buffered = buffered_rows(&input, longest + extra);
        prop_assert_eq!(&buffered, &expected);
        let table = buffered_table_rows(&input, longest + extra);
        prop_assert_eq!(&table, &expected);
    }
}
