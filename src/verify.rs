//! Archive integrity checking
//!
//! Every selected leaf entry, at every nesting level, is decompressed and its
//! CRC-32 compared with the value stored in the central directory of its
//! immediate container. Failures are collected rather than aborting the walk,
//! so one report lists every damaged entry.

use std::io::Read;

use crate::error::Result;
use crate::output::{Entry, OutputProcessor};

/// Outcome of [`Archive::verify`](crate::Archive::verify).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub tested: usize,
    /// `(virtual path, reason)` for each damaged entry.
    pub failures: Vec<(String, String)>,
}

impl VerifyReport {
    /// No entry failed its CRC check.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct CrcVerifier {
    report: VerifyReport,
    buffer: Vec<u8>,
}

impl Default for CrcVerifier {
    fn default() -> Self {
        Self {
            report: VerifyReport::default(),
            buffer: vec![0u8; 256 * 1024],
        }
    }
}

impl CrcVerifier {
    pub(crate) fn into_report(self) -> VerifyReport {
        self.report
    }
}

impl OutputProcessor for CrcVerifier {
    fn process(&mut self, reader: &mut dyn Read, entry: &Entry<'_>) -> Result<()> {
        let mut hasher = crc32fast::Hasher::new();
        let mut read_error = None;
        loop {
            match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => hasher.update(&self.buffer[..n]),
                Err(e) => {
                    read_error = Some(e.to_string());
                    break;
                },
            }
        }

        self.report.tested += 1;
        let failure = match read_error {
            Some(e) => Some(e),
            None => {
                let computed = hasher.finalize();
                (computed != entry.crc32).then(|| {
                    format!(
                        "CRC mismatch (stored: {:08x}, computed: {:08x})",
                        entry.crc32, computed
                    )
                })
            },
        };

        if let Some(reason) = failure {
            tracing::warn!(path = entry.path, %reason, "integrity check failed");
            self.report.failures.push((entry.path.to_string(), reason));
        }
        Ok(())
    }
}
