//! Small helpers shared across the crate: tagged diagnostic output
//! and scratch file naming.

use std::path::{Path, PathBuf};

/// `report!(verbose, tag, fmt, args...)`
///
/// Writes a `[tag] message` line to stderr, but only when
/// `verbose` is true. The library never prints otherwise.
///
/// ## Example
///
/// ```rust, ignore
/// report!(self.verbose, "coil images", "slice {}", n);
/// ```
macro_rules! report {
    ($verbose : expr, $tag : literal, $($arg : tt)*) => {
        if $verbose {
            eprintln!("[{}] {}", $tag, format!($($arg)*));
        }
    };
}

pub (crate) use report;

/// Returns a fresh path for a temporary acquisition file inside
/// `dir` (or the OS temp dir). The name carries the process id and
/// a random suffix so concurrent containers never collide.
pub fn scratch_file_name(dir : Option<&Path>) -> PathBuf {
    let dir = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    dir.join(format!(
        "mrcoils_tmp_{}_{:016x}.mrd",
        std::process::id(),
        rand::random::<u64>()
    ))
}
