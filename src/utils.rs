//! Formatting and conversion helpers
//!
//! - Human-readable size formatting for listings and reports
//! - Timestamp conversion between ZIP and filesystem formats
//! - Construction of ZIP write options from a compression level
//!
//! # Examples
//!
//! ```
//! use earpatch::format_size;
//!
//! assert_eq!(format_size(1024), "1.0K");
//! assert_eq!(format_size(1536 * 1024), "1.5M");
//! ```

use filetime::FileTime;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Format a byte size as a human-readable string with appropriate units.
///
/// ```
/// use earpatch::format_size;
///
/// assert_eq!(format_size(512), "512B");
/// assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.0G");
/// ```
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.1}G", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.1}M", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1}K", size as f64 / KB as f64)
    } else {
        format!("{}B", size)
    }
}

/// Convert a ZIP timestamp to a `FileTime` for `filetime::set_file_mtime`.
///
/// ZIP timestamps carry no zone; they are interpreted as UTC.
pub fn datetime_to_filetime(dt: zip::DateTime) -> FileTime {
    let days_since_epoch = days_from_date(dt.year() as i32, dt.month() as i32, dt.day() as i32);
    let secs = days_since_epoch * 86400
        + (dt.hour() as i64) * 3600
        + (dt.minute() as i64) * 60
        + (dt.second() as i64);

    FileTime::from_unix_time(secs, 0)
}

/// Days since 1970-01-01 (Howard Hinnant's algorithm)
fn days_from_date(year: i32, month: i32, day: i32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy =
        (153 * (if month > 2 { month - 3 } else { month + 9 }) as u32 + 2) / 5 + day as u32 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    (era as i64) * 146097 + (doe as i64) - 719468
}

/// Format a ZIP timestamp for listings; `None` yields fixed-width padding.
///
/// ```
/// use zip::DateTime;
/// use earpatch::utils::format_datetime;
///
/// let dt = DateTime::from_date_and_time(2024, 1, 15, 10, 30, 0).unwrap();
/// assert_eq!(format_datetime(Some(dt)), "2024-01-15 10:30:00");
/// assert_eq!(format_datetime(None), "                   ");
/// ```
pub fn format_datetime(datetime: Option<zip::DateTime>) -> String {
    match datetime {
        Some(dt) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second()
        ),
        None => "                   ".to_string(),
    }
}

/// Write options for a compression level: 0 stores, 1..=9 deflates.
pub fn compression_options(level: u32) -> SimpleFileOptions {
    let options = SimpleFileOptions::default();
    if level == 0 {
        options.compression_method(CompressionMethod::Stored)
    } else {
        options
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level.min(9) as i64))
    }
}

/// Options for a rewritten entry, carrying over its timestamp and mode.
pub fn entry_options(
    level: u32,
    modified: Option<zip::DateTime>,
    unix_mode: Option<u32>,
    size: u64,
) -> SimpleFileOptions {
    let mut options = compression_options(level).large_file(size >= u32::MAX as u64);
    if let Some(dt) = modified {
        options = options.last_modified_time(dt);
    }
    if let Some(mode) = unix_mode {
        options = options.unix_permissions(mode);
    }
    options
}
