use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::ops::Deref;
use std::path::Path;

#[cfg(target_os = "linux")]
use std::sync::atomic::{AtomicBool, Ordering};

use memmap2::{Mmap, MmapOptions};

/// The full contents of one input, as `MappedCursor` serves them.
///
/// Regular files are mapped; empty and special files, and in-memory inputs,
/// are held in a `Vec`.
pub enum FileData {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Deref for FileData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileData::Mmap(m) => m,
            FileData::Owned(v) => v,
        }
    }
}

impl fmt::Debug for FileData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            FileData::Mmap(_) => "Mmap",
            FileData::Owned(_) => "Owned",
        };
        f.debug_struct("FileData")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

/// Cleared after the first EPERM; rayon workers opening inputs in parallel
/// then go straight to a plain open.
#[cfg(target_os = "linux")]
static NOATIME_SUPPORTED: AtomicBool = AtomicBool::new(true);

/// Open an input read-only without updating its access time.
///
/// `O_NOATIME` is only permitted for the file owner, so inputs owned by
/// someone else fall back to a plain open.
#[cfg(target_os = "linux")]
pub fn open_noatime(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    if NOATIME_SUPPORTED.load(Ordering::Relaxed) {
        match fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOATIME)
            .open(path)
        {
            Ok(f) => return Ok(f),
            Err(ref e) if e.raw_os_error() == Some(libc::EPERM) => {
                // not our file and no CAP_FOWNER
                NOATIME_SUPPORTED.store(false, Ordering::Relaxed);
            }
            Err(e) => return Err(e),
        }
    }
    File::open(path)
}

#[cfg(not(target_os = "linux"))]
pub fn open_noatime(path: &Path) -> io::Result<File> {
    File::open(path)
}

/// Map a whole file read-only for sequential scanning.
///
/// Regular non-empty files are mapped (mmap cannot map zero bytes, so empty
/// files become an empty owned buffer). Special files (FIFOs, character
/// devices) cannot be mapped and are read to the end instead.
pub fn map_file(path: &Path) -> io::Result<FileData> {
    let file = open_noatime(path)?;
    let metadata = file.metadata()?;
    let len = metadata.len();

    if !metadata.file_type().is_file() {
        let mut buf = Vec::new();
        let mut reader = file;
        reader.read_to_end(&mut buf)?;
        return Ok(FileData::Owned(buf));
    }
    if len == 0 {
        return Ok(FileData::Owned(Vec::new()));
    }

    // SAFETY: Read-only mapping. The file may be truncated by another process
    // while mapped; that is the usual mmap caveat and is accepted here.
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    #[cfg(unix)]
    {
        // HUGEPAGE first: must be set before any page faults occur.
        #[cfg(target_os = "linux")]
        if len >= 2 * 1024 * 1024 {
            let _ = mmap.advise(memmap2::Advice::HugePage);
        }
        let _ = mmap.advise(memmap2::Advice::Sequential);
        let _ = mmap.advise(memmap2::Advice::WillNeed);
    }
    Ok(FileData::Mmap(mmap))
}

/// Read as many bytes as possible into buf, retrying on partial reads.
/// Returns fewer than `buf.len()` bytes only at EOF.
/// Fast path: regular file reads usually return the full buffer on the first call.
#[inline]
pub fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
