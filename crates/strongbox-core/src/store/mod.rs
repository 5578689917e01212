//! Store engine: per-mount leaf stores and the mount-resolving root store

pub mod leaf;
pub mod root;

pub use leaf::Leaf;
pub use root::RootStore;

use crate::error::{EntryFailure, StoreError, StoreResult};

/// Outcome of an integrity check
///
/// Problems are collected, never repaired, and never abort the check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsckReport {
    /// Number of entries decrypted successfully
    pub checked: usize,
    /// Entries that failed to decrypt or parse
    pub failures: Vec<EntryFailure>,
    /// Problems reported by the storage backend
    pub storage: Vec<String>,
}

impl FsckReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty() && self.storage.is_empty()
    }

    /// Fold another report in, prefixing its entry names
    pub(crate) fn merge(&mut self, prefix: &str, other: FsckReport) {
        self.checked += other.checked;
        self.failures.extend(other.failures.into_iter().map(|mut f| {
            f.name = join(prefix, &f.name);
            f
        }));
        self.storage.extend(other.storage.into_iter().map(|p| {
            if prefix.is_empty() {
                p
            } else {
                format!("{}: {}", prefix, p)
            }
        }));
    }
}

/// Canonical form of a secret name
///
/// Leading, trailing and repeated separators as well as `.` segments are
/// dropped; `..` is rejected. The result may be empty (the store root).
pub fn normalize(name: &str) -> StoreResult<String> {
    let mut segments = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StoreError::InvalidName(name.to_string())),
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Join two name fragments with a single separator
pub(crate) fn join(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}/{}", prefix, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/foo//bar/").unwrap(), "foo/bar");
        assert_eq!(normalize("./foo/./bar").unwrap(), "foo/bar");
        assert_eq!(normalize("").unwrap(), "");
        assert!(matches!(normalize("foo/../bar"), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn test_merge_prefixes_names() {
        let mut report = FsckReport::default();
        report.merge(
            "work",
            FsckReport {
                checked: 2,
                failures: vec![EntryFailure::new("db", "boom")],
                storage: vec!["uncommitted changes".to_string()],
            },
        );
        report.merge("", FsckReport { checked: 1, ..Default::default() });
        assert_eq!(report.checked, 3);
        assert_eq!(report.failures[0].name, "work/db");
        assert_eq!(report.storage[0], "work: uncommitted changes");
        assert!(!report.is_ok());
    }
}
