//! Integrity check across every mount

use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{normalize, FsckReport};
use crate::types::OpContext;

use super::RootStore;

impl RootStore {
    /// Check every entry below `prefix` across all mounts
    ///
    /// A mount lying entirely below `prefix` is checked as a whole. A mount
    /// that cannot be opened is reported, not fatal.
    pub async fn fsck(&self, ctx: &OpContext, prefix: &str) -> StoreResult<FsckReport> {
        let prefix = normalize(prefix)?;
        let (target, relative) = self.resolve_mount(&prefix)?;
        let mut report = FsckReport::default();

        for alias in self.aliases() {
            let leaf_prefix = if prefix.is_empty() {
                String::new()
            } else if alias == target {
                relative.clone()
            } else if alias.starts_with(&format!("{}/", prefix)) {
                String::new()
            } else {
                continue;
            };

            let leaf = match self.leaf(ctx, &alias).await {
                Ok(leaf) => leaf,
                Err(StoreError::Cancelled) => return Err(StoreError::Cancelled),
                Err(e) => {
                    warn!(alias = %alias, error = %e, "fsck: cannot open store");
                    report.storage.push(if alias.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", alias, e)
                    });
                    continue;
                }
            };
            report.merge(&alias, leaf.fsck(ctx, &leaf_prefix).await?);
        }

        info!(
            checked = report.checked,
            failed = report.failures.len(),
            storage_problems = report.storage.len(),
            "fsck finished"
        );
        Ok(report)
    }
}
