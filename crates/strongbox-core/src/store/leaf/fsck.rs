//! Integrity check of one store

use tracing::{debug, warn};

use crate::error::{EntryFailure, StoreError, StoreResult};
use crate::secrets;
use crate::types::OpContext;

use super::super::{normalize, FsckReport};
use super::Leaf;

impl Leaf {
    /// Verify every entry below `prefix` can be decrypted
    ///
    /// With `fsck_parse` set in the context, entries are also parsed
    /// strictly and malformed legacy content is reported.
    pub async fn fsck(&self, ctx: &OpContext, prefix: &str) -> StoreResult<FsckReport> {
        let prefix = normalize(prefix)?;
        let mut report = FsckReport {
            storage: self.storage.fsck(ctx).await?,
            ..FsckReport::default()
        };

        for name in self.list(ctx, &prefix).await? {
            ctx.cancellation().check()?;
            let content = match self.decrypt_entry(ctx, &name).await {
                Ok(content) => content,
                Err(StoreError::Cancelled) => return Err(StoreError::Cancelled),
                Err(e) => {
                    warn!(alias = %self.alias, entry = %name, error = %e, "fsck: entry failed");
                    report.failures.push(EntryFailure::new(name, e));
                    continue;
                }
            };
            if ctx.fsck_parse() {
                if let Err(e) = secrets::parse_strict(&content) {
                    warn!(alias = %self.alias, entry = %name, error = %e, "fsck: entry failed to parse");
                    report.failures.push(EntryFailure::new(name, e));
                    continue;
                }
            }
            report.checked += 1;
        }

        debug!(alias = %self.alias, checked = report.checked, failed = report.failures.len(), "fsck done");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{mock_leaf, plain_leaf};
    use super::*;
    use crate::backend::crypto::MockCrypto;
    use crate::secrets::parse;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fsck_collects_failures() {
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let leaf = mock_leaf(dir.path(), MockCrypto::new().fail_decrypt_on("corrupt"));
        leaf.storage().set(&ctx, ".mock-ids", b"me\n").await.unwrap();
        for (name, body) in [("a", "fine"), ("b", "corrupt"), ("c", "fine too"), ("d", "corrupt")] {
            leaf.set(&ctx, name, &parse(body.as_bytes())).await.unwrap();
        }

        let report = leaf.fsck(&ctx, "").await.unwrap();
        assert_eq!(report.checked, 2);
        let failed: Vec<_> = report.failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(failed, vec!["b", "d"]);
        assert!(!report.is_ok());
    }

    #[tokio::test]
    async fn test_fsck_parse() {
        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();
        let broken = crate::secrets::Plain::new("STRONGBOX-SECRET-1.0\nno header\n\n");
        leaf.set(&ctx, "legacy", &broken.into()).await.unwrap();
        leaf.set(&ctx, "ok", &parse(b"user: bob")).await.unwrap();

        assert!(leaf.fsck(&ctx, "").await.unwrap().is_ok());

        let report = leaf.fsck(&ctx.clone().with_fsck_parse(true), "").await.unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "legacy");
    }

    #[tokio::test]
    async fn test_fsck_prefix() {
        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();
        for name in ["web/a", "web/b", "website", "mail/c"] {
            leaf.set(&ctx, name, &parse(b"x")).await.unwrap();
        }
        assert_eq!(leaf.fsck(&ctx, "web").await.unwrap().checked, 2);
    }
}
