//! Limits on what an opened package may decompress to.
//!
//! Books arrive from the network, so every entry is screened before its bytes
//! are kept: traversal-shaped names are dropped, oversized or over-compressed
//! entries abort the load.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::error::SecurityError;

const MB: u64 = 1024 * 1024;

/// Entries at or below this declared size skip the ratio check; the size caps
/// already bound them.
pub const RATIO_CHECK_FLOOR_BYTES: u64 = MB;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityLimits {
    /// Uncompressed/compressed ratio above which an entry counts as a ZIP bomb.
    pub max_compression_ratio: u64,
    pub max_file_count: u64,
    /// Per-entry cap on decompressed bytes.
    pub max_resource_size_bytes: u64,
    /// Cap on decompressed bytes across the whole package.
    pub max_total_size_bytes: u64,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_compression_ratio: 100,
            max_file_count: 10_000,
            max_resource_size_bytes: 64 * MB,
            max_total_size_bytes: 512 * MB,
        }
    }
}

/// Entry names that would escape the package root when joined onto a directory.
pub fn is_unsafe_entry_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if matches!(bytes.first(), Some(b'/' | b'\\')) {
        return true;
    }
    if bytes.len() >= 2 && bytes[1] == b':' {
        return true;
    }
    name.split(['/', '\\']).any(|seg| seg == "..")
        || Path::new(name)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
}

/// Running budget for one archive being decompressed.
#[derive(Debug)]
pub struct ExtractionBudget<'a> {
    limits: &'a SecurityLimits,
    consumed: u64,
}

impl<'a> ExtractionBudget<'a> {
    /// Start a budget for a container that declares `entry_count` entries.
    pub fn new(entry_count: usize, limits: &'a SecurityLimits) -> Result<Self, SecurityError> {
        let count = entry_count as u64;
        if count > limits.max_file_count {
            return Err(SecurityError::TooManyFiles {
                count,
                limit: limits.max_file_count,
            });
        }
        Ok(Self { limits, consumed: 0 })
    }

    /// Screen an entry from its header sizes before reading it.
    pub fn admit(&self, name: &str, compressed: u64, declared: u64) -> Result<(), SecurityError> {
        if is_unsafe_entry_name(name) {
            return Err(SecurityError::PathTraversal {
                path: name.to_string(),
            });
        }
        if declared > self.limits.max_resource_size_bytes {
            return Err(oversized(name, declared, self.limits.max_resource_size_bytes));
        }
        if declared <= RATIO_CHECK_FLOOR_BYTES {
            return Ok(());
        }
        let ratio = match compressed {
            0 => u64::MAX,
            c => declared / c,
        };
        if ratio > self.limits.max_compression_ratio {
            return Err(SecurityError::ZipBomb {
                ratio,
                limit: self.limits.max_compression_ratio,
            });
        }
        Ok(())
    }

    /// Charge bytes actually read. Header sizes can lie, so this is checked too.
    pub fn consume(&mut self, name: &str, actual: u64) -> Result<(), SecurityError> {
        if actual > self.limits.max_resource_size_bytes {
            return Err(oversized(name, actual, self.limits.max_resource_size_bytes));
        }
        self.consumed = self.consumed.saturating_add(actual);
        if self.consumed > self.limits.max_total_size_bytes {
            return Err(oversized("<total>", self.consumed, self.limits.max_total_size_bytes));
        }
        Ok(())
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

fn oversized(name: &str, size: u64, limit: u64) -> SecurityError {
    SecurityError::OversizedResource {
        name: name.to_string(),
        size_mb: size / MB,
        limit_mb: limit / MB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_package_names_are_safe() {
        for name in [
            "mimetype",
            "META-INF/container.xml",
            "OEBPS/content.opf",
            "OEBPS/images/cover.jpg",
            "OEBPS/text/ch..1.xhtml",
        ] {
            assert!(!is_unsafe_entry_name(name), "{name}");
        }
    }

    #[test]
    fn escaping_names_are_unsafe() {
        for name in [
            "../../../etc/passwd",
            "text/../../etc/shadow",
            "/etc/passwd",
            "\\Windows\\System32\\config",
            "C:\\Windows\\System32",
            "OEBPS\\..\\..\\boot.ini",
        ] {
            assert!(is_unsafe_entry_name(name), "{name}");
        }
    }

    #[test]
    fn entry_count_is_capped() {
        let limits = SecurityLimits::default();
        assert!(ExtractionBudget::new(10_000, &limits).is_ok());
        assert!(matches!(
            ExtractionBudget::new(10_001, &limits),
            Err(SecurityError::TooManyFiles { count: 10_001, .. })
        ));
    }

    #[test]
    fn compression_ratio() {
        let limits = SecurityLimits::default();
        let budget = ExtractionBudget::new(1, &limits).unwrap();
        assert!(budget.admit("a.xhtml", MB, 50 * MB).is_ok());
        assert!(budget.admit("a.xhtml", 0, 0).is_ok());
        assert!(matches!(
            budget.admit("a.xhtml", 2 * 1024, 30 * MB),
            Err(SecurityError::ZipBomb { ratio: 15360, limit: 100 })
        ));
        assert!(budget.admit("a.xhtml", 0, 2 * MB).is_err());
    }

    #[test]
    fn small_entries_skip_ratio_check() {
        let limits = SecurityLimits::default();
        let budget = ExtractionBudget::new(1, &limits).unwrap();
        assert!(budget.admit("blank.xhtml", 350, 120_000).is_ok());
        assert!(budget.admit("blank.xhtml", 0, 100).is_ok());
        assert!(budget.admit("blank.xhtml", 10, RATIO_CHECK_FLOOR_BYTES).is_ok());
    }

    #[test]
    fn single_entry_and_total_caps() {
        let limits = SecurityLimits::default();
        let mut budget = ExtractionBudget::new(20, &limits).unwrap();
        match budget.admit("huge.png", 65 * MB, 65 * MB) {
            Err(SecurityError::OversizedResource { size_mb, limit_mb, .. }) => {
                assert_eq!(size_mb, 65);
                assert_eq!(limit_mb, 64);
            }
            other => panic!("expected OversizedResource, got {other:?}"),
        }

        for _ in 0..8 {
            budget.consume("part.bin", 64 * MB).unwrap();
        }
        assert_eq!(budget.consumed(), 512 * MB);
        assert!(matches!(
            budget.consume("last.bin", 1),
            Err(SecurityError::OversizedResource { ref name, .. }) if name == "<total>"
        ));
    }
}
