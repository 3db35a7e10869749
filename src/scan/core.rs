/// Bytes examined per call by the SSE4.2 backend.
pub const VECTOR_WIDTH: usize = 16;

/// Bytes examined per call by the portable table backend.
pub const TABLE_WIDTH: usize = 4;

/// Largest stop set a scanner accepts (one SSE register of needle bytes).
pub const MAX_STOPS: usize = 16;

/// Which implementation a scanner dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `pcmpestri` over 16-byte chunks (x86_64 with SSE4.2, detected at runtime).
    Sse42,
    /// 256-entry membership table, 4 bytes per call.
    Table,
}

/// Finds the next occurrence of any byte from a small stop set.
///
/// [`scan`](ByteClassScanner::scan) looks at one fixed-width chunk at the
/// start of the haystack and returns how many leading bytes are not stops.
/// A return of 0 means the haystack starts on a stop byte; otherwise the
/// caller advances by the returned count and scans again. Chunks shorter
/// than the backend width (the window tail) are handled without reading
/// past the end of the slice.
#[derive(Clone)]
pub struct ByteClassScanner {
    backend: Backend,
    stops: [u8; MAX_STOPS],
    n_stops: usize,
    /// 1 for bytes that are *not* stops.
    pass: [u8; 256],
}

impl ByteClassScanner {
    /// Build a scanner for `stops`, picking the fastest backend the CPU supports.
    ///
    /// Duplicate bytes are ignored. Panics if more than [`MAX_STOPS`] distinct
    /// bytes are given.
    #[allow(unused_mut)]
    pub fn new(stops: &[u8]) -> Self {
        let mut scanner = Self::table(stops);
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("sse4.2") {
                scanner.backend = Backend::Sse42;
            }
        }
        scanner
    }

    /// Build a scanner that always uses the portable table backend.
    pub fn table(stops: &[u8]) -> Self {
        let mut set = [0u8; MAX_STOPS];
        let mut n = 0;
        let mut pass = [1u8; 256];
        for &b in stops {
            if pass[b as usize] == 0 {
                continue;
            }
            assert!(
                n < MAX_STOPS,
                "stop set holds at most {} distinct bytes",
                MAX_STOPS
            );
            pass[b as usize] = 0;
            set[n] = b;
            n += 1;
        }
        Self {
            backend: Backend::Table,
            stops: set,
            n_stops: n,
            pass,
        }
    }

    #[inline]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Chunk width of the selected backend.
    #[inline]
    pub fn width(&self) -> usize {
        match self.backend {
            Backend::Sse42 => VECTOR_WIDTH,
            Backend::Table => TABLE_WIDTH,
        }
    }

    /// The distinct stop bytes, in first-seen order.
    #[inline]
    pub fn stops(&self) -> &[u8] {
        &self.stops[..self.n_stops]
    }

    #[inline(always)]
    pub fn contains(&self, byte: u8) -> bool {
        self.pass[byte as usize] == 0
    }

    /// Number of leading non-stop bytes within the first chunk of `hay`.
    ///
    /// The result is at most `min(self.width(), hay.len())`.
    #[inline]
    pub fn scan(&self, hay: &[u8]) -> usize {
        match self.backend {
            #[cfg(target_arch = "x86_64")]
            Backend::Sse42 => {
                // SAFETY: Sse42 is only selected after runtime detection.
                unsafe { scan_sse42(&self.stops, self.n_stops, hay) }
            }
            _ => self.scan_table(hay),
        }
    }

    /// Offset of the first stop byte in `hay`, scanning chunk by chunk.
    pub fn find(&self, hay: &[u8]) -> Option<usize> {
        let mut pos = 0;
        while pos < hay.len() {
            let n = self.scan(&hay[pos..]);
            if n == 0 {
                return Some(pos);
            }
            pos += n;
        }
        None
    }

    #[inline(always)]
    fn scan_table(&self, hay: &[u8]) -> usize {
        if hay.len() < TABLE_WIDTH {
            return hay
                .iter()
                .position(|&b| self.pass[b as usize] == 0)
                .unwrap_or(hay.len());
        }
        let t0 = self.pass[hay[0] as usize];
        let t1 = self.pass[hay[1] as usize];
        let t2 = self.pass[hay[2] as usize];
        let t3 = self.pass[hay[3] as usize];
        if t0 + t1 + t2 + t3 == 4 {
            return TABLE_WIDTH;
        }
        if t0 == 0 {
            0
        } else if t1 == 0 {
            1
        } else if t2 == 0 {
            2
        } else {
            3
        }
    }
}

impl std::fmt::Debug for ByteClassScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteClassScanner")
            .field("backend", &self.backend)
            .field("stops", &self.stops())
            .finish()
    }
}

/// Explicit-length compare so NUL bytes in the input are ordinary data and
/// the tail can be padded without the padding ever matching.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.2")]
unsafe fn scan_sse42(stops: &[u8; MAX_STOPS], n_stops: usize, hay: &[u8]) -> usize {
    use std::arch::x86_64::{
        __m128i, _SIDD_CMP_EQUAL_ANY, _SIDD_LEAST_SIGNIFICANT, _SIDD_UBYTE_OPS, _mm_cmpestri,
        _mm_loadu_si128,
    };
    const MODE: i32 = _SIDD_UBYTE_OPS | _SIDD_CMP_EQUAL_ANY | _SIDD_LEAST_SIGNIFICANT;

    let len = hay.len().min(VECTOR_WIDTH);
    let mut padded = [0u8; VECTOR_WIDTH];
    let src = if len == VECTOR_WIDTH {
        hay.as_ptr()
    } else {
        padded[..len].copy_from_slice(&hay[..len]);
        padded.as_ptr()
    };

    // SAFETY: both loads read exactly 16 bytes from 16-byte arrays or from a
    // slice verified to hold at least 16 bytes.
    let idx = unsafe {
        let set = _mm_loadu_si128(stops.as_ptr() as *const __m128i);
        let chunk = _mm_loadu_si128(src as *const __m128i);
        _mm_cmpestri::<MODE>(set, n_stops as i32, chunk, len as i32)
    };
    (idx as usize).min(len)
}
