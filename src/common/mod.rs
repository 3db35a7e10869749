pub mod io;


/// Restore the default SIGPIPE disposition.
///
/// Without it, `fcsvscan big.csv | head -1` sees EPIPE on stdout instead of
/// being terminated quietly. Call first thing in `main`.
#[inline]
pub fn reset_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// Message text of an I/O error as the C library prints it.
///
/// `io::Error`'s `Display` appends ` (os error N)` to OS errors; cursor open
/// and read failures are reported without it.
pub fn io_error_msg(e: &std::io::Error) -> String {
    let mut text = e.to_string();
    if let Some(code) = e.raw_os_error() {
        let suffix = format!(" (os error {code})");
        if text.ends_with(&suffix) {
            text.truncate(text.len() - suffix.len());
        }
    }
    text
}
