//! Recursive archive listing

use std::io::Read;

use crate::error::Result;
use crate::output::{Entry, OutputProcessor};
use crate::utils::{format_datetime, format_size};

/// One leaf entry found by [`Archive::list`](crate::Archive::list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub path: String,
    pub size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub modified: Option<zip::DateTime>,
}

impl EntryInfo {
    /// Nesting depth: 0 for top-level entries.
    pub fn depth(&self) -> usize {
        self.path.matches(crate::path::NESTING_SEPARATOR).count()
    }
}

/// Records entry metadata without reading content.
#[derive(Debug, Default)]
pub(crate) struct Listing {
    entries: Vec<EntryInfo>,
}

impl Listing {
    pub(crate) fn into_entries(self) -> Vec<EntryInfo> {
        self.entries
    }
}

impl OutputProcessor for Listing {
    fn process(&mut self, _reader: &mut dyn Read, entry: &Entry<'_>) -> Result<()> {
        self.entries.push(EntryInfo {
            path: entry.path.to_string(),
            size: entry.size,
            compressed_size: entry.compressed_size,
            crc32: entry.crc32,
            modified: entry.modified,
        });
        Ok(())
    }
}

/// Print a listing table to stdout.
pub fn display_listing(entries: &[EntryInfo], verbose: bool) {
    if verbose {
        println!(
            "{:>8}  {:>8}  {:>5}  {:>19}  {:>8}  {}",
            "Length", "Size", "Ratio", "Date & Time", "CRC-32", "Name"
        );
        println!("{}", "-".repeat(80));
    } else {
        println!("{:>10}  {:>19}  {}", "Size", "Modified", "Name");
        println!("{:->10}  {:->19}  {:->40}", "", "", "");
    }

    let mut total_size: u64 = 0;
    let mut total_compressed: u64 = 0;

    for entry in entries {
        total_size += entry.size;
        total_compressed += entry.compressed_size;
        let datetime_str = format_datetime(entry.modified);

        if verbose {
            println!(
                "{:>8}  {:>8}  {:>4}%  {}  {:08x}  {}",
                entry.size,
                entry.compressed_size,
                ratio(entry.size, entry.compressed_size),
                datetime_str,
                entry.crc32,
                entry.path
            );
        } else {
            println!("{:>10}  {}  {}", format_size(entry.size), datetime_str, entry.path);
        }
    }

    if verbose {
        println!("{}", "-".repeat(80));
        println!(
            "{:>8}  {:>8}  {:>4}%  {:>19}  {:>8}  {} files",
            total_size,
            total_compressed,
            ratio(total_size, total_compressed),
            "",
            "",
            entries.len()
        );
    } else {
        println!("{:->10}  {:->19}  {:->40}", "", "", "");
        println!(
            "{:>10}  {:>19}  {} files",
            format_size(total_size),
            "",
            entries.len()
        );
    }
}

/// Space saved in percent; stored or expanded entries report 0.
fn ratio(size: u64, compressed: u64) -> u64 {
    if size > 0 && compressed <= size {
        100 - (compressed * 100 / size)
    } else {
        0
    }
}
