use std::borrow::Cow;
use std::fmt;

/// A borrowed view of one field's raw bytes.
///
/// Quoted fields are returned without their surrounding quotes, but doubled
/// quotes inside them are left as they appear in the input; call
/// [`unescape`](Cell::unescape) when the collapsed form is needed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell<'a> {
    bytes: &'a [u8],
}

impl<'a> Cell<'a> {
    #[inline]
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the bytes out as text. Invalid UTF-8 is replaced with U+FFFD.
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(self.bytes).into_owned()
    }

    /// Exact byte equality with `text`.
    #[inline]
    pub fn equals(&self, text: &str) -> bool {
        self.bytes == text.as_bytes()
    }

    /// Parse the longest numeric prefix of the field; see [`parse_number`].
    #[inline]
    pub fn as_number(&self) -> f64 {
        parse_number(self.bytes)
    }

    /// Collapse doubled quotes (`""` -> `"`). Borrows when there is nothing to collapse.
    pub fn unescape(&self) -> Cow<'a, [u8]> {
        let bytes = self.bytes;
        let mut out: Option<Vec<u8>> = None;
        let mut last = 0;
        let mut quotes = memchr::memchr_iter(b'"', bytes);
        while let Some(i) = quotes.next() {
            if bytes.get(i + 1) == Some(&b'"') {
                let buf = out.get_or_insert_with(|| Vec::with_capacity(bytes.len()));
                buf.extend_from_slice(&bytes[last..=i]);
                last = i + 2;
                // second quote of the pair
                quotes.next();
            }
        }
        match out {
            Some(mut buf) => {
                buf.extend_from_slice(&bytes[last..]);
                Cow::Owned(buf)
            }
            None => Cow::Borrowed(bytes),
        }
    }
}

impl fmt::Debug for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.bytes))
    }
}

/// Locale-independent numeric prefix parse, bounded to `bytes`.
///
/// Accepts optional leading ASCII whitespace, a sign, then either
/// `inf`/`infinity`/`nan` (any case) or digits with an optional fraction and
/// exponent. Parsing stops at the first byte that cannot extend the number.
/// Input with no numeric prefix yields `0.0`.
pub fn parse_number(bytes: &[u8]) -> f64 {
    let len = bytes.len();
    let mut i = 0;
    while i < len && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let start = i;
    if i < len && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let rest = &bytes[i..];
    if starts_with_ignore_case(rest, b"infinity") {
        i += 8;
    } else if starts_with_ignore_case(rest, b"inf") || starts_with_ignore_case(rest, b"nan") {
        i += 3;
    } else {
        let int_start = i;
        while i < len && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let mut digits = i - int_start;
        if i < len && bytes[i] == b'.' {
            let mut j = i + 1;
            while j < len && bytes[j].is_ascii_digit() {
                j += 1;
            }
            let frac = j - (i + 1);
            if digits + frac > 0 {
                digits += frac;
                i = j;
            }
        }
        if digits == 0 {
            return 0.0;
        }
        if i < len && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            let exp_start = j;
            while j < len && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > exp_start {
                i = j;
            }
        }
    }

    std::str::from_utf8(&bytes[start..i])
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[inline]
fn starts_with_ignore_case(hay: &[u8], word: &[u8]) -> bool {
    hay.len() >= word.len() && hay[..word.len()].eq_ignore_ascii_case(word)
}
