//! Kernel hints around archive I/O
//!
//! The physical archive is read front to back, extracted files are written
//! once and never read back, and a rewritten archive must be on disk before it
//! is renamed over the original. Hints are best-effort and compile to no-ops
//! off Linux; only [`sync_before_rename`] reports failure.

use std::fs::File;

use memmap2::Mmap;

/// Deflate cannot expand data by more than this factor, so a header claiming
/// a larger uncompressed size is not worth reserving disk space for.
const MAX_DEFLATE_RATIO: u64 = 1032;

/// Announce a sequential scan of the archive file.
#[cfg(target_os = "linux")]
pub(crate) fn advise_archive_read(file: &File, len: u64) {
    use rustix::fs::{Advice, fadvise};

    let _ = fadvise(file, 0, std::num::NonZeroU64::new(len), Advice::Sequential);
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn advise_archive_read(_file: &File, _len: u64) {}

/// Announce a sequential scan of a mapped archive and start read-ahead.
#[cfg(target_os = "linux")]
pub(crate) fn advise_archive_mapping(mmap: &Mmap) {
    use rustix::mm::{Advice, madvise};

    let ptr = mmap.as_ptr() as *mut std::ffi::c_void;
    // SAFETY: the range is exactly the live mapping borrowed from `mmap`
    unsafe {
        let _ = madvise(ptr, mmap.len(), Advice::Sequential);
        let _ = madvise(ptr, mmap.len(), Advice::WillNeed);
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn advise_archive_mapping(_mmap: &Mmap) {}

/// Reserve disk blocks for an extracted entry without changing its length.
///
/// Header sizes come from the archive; implausible ones are ignored.
pub(crate) fn reserve_for_entry(file: &File, size: u64, compressed_size: u64) {
    let plausible = size <= compressed_size.saturating_mul(MAX_DEFLATE_RATIO);
    if size > 0 && plausible {
        fallocate_keep_size(file, size);
    }
}

#[cfg(target_os = "linux")]
fn fallocate_keep_size(file: &File, size: u64) {
    use rustix::fs::{FallocateFlags, fallocate};

    let _ = fallocate(file, FallocateFlags::KEEP_SIZE, 0, size);
}

#[cfg(not(target_os = "linux"))]
fn fallocate_keep_size(_file: &File, _size: u64) {}

/// Evict the pages of a file that was just written and will not be read.
#[cfg(target_os = "linux")]
pub(crate) fn drop_written_pages(file: &File, len: u64) {
    use rustix::fs::{Advice, fadvise};

    let _ = fadvise(file, 0, std::num::NonZeroU64::new(len), Advice::DontNeed);
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn drop_written_pages(_file: &File, _len: u64) {}

/// Flush a finished temp archive so the rename never exposes missing data.
#[cfg(target_os = "linux")]
pub(crate) fn sync_before_rename(file: &File) -> std::io::Result<()> {
    rustix::fs::fdatasync(file).map_err(std::io::Error::from)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn sync_before_rename(file: &File) -> std::io::Result<()> {
    file.sync_data()
}
