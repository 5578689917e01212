//! Encrypting writes, removals and the commit step that follows them

use futures::FutureExt;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::secrets::Secret;
use crate::types::OpContext;

use super::{crypto_error, Leaf};

/// Remote and branch pushed to after a committed write
const SYNC_REMOTE: &str = "origin";
const SYNC_BRANCH: &str = "HEAD";

impl Leaf {
    /// Encrypt and store a secret for the current recipients
    pub async fn set(&self, ctx: &OpContext, name: &str, secret: &Secret) -> StoreResult<()> {
        let name = Self::entry_name(name)?;
        if !self.is_initialized() {
            return Err(StoreError::NotInitialized(self.path.clone()));
        }
        let plaintext = secret.bytes()?;
        let file = self.encrypt_entry(ctx, &name, &plaintext).await?;
        self.commit(ctx, vec![file], &format!("Save secret to {}", name)).await
    }

    /// Encrypt plaintext for the current recipients and write it; returns
    /// the storage file written
    pub(crate) async fn encrypt_entry(&self, ctx: &OpContext, name: &str, plaintext: &[u8]) -> StoreResult<String> {
        ctx.cancellation().check()?;
        let recipients = self.recipients(ctx).await?;
        let ciphertext = self
            .crypto
            .encrypt(ctx, plaintext, &recipients)
            .await
            .map_err(|e| crypto_error(e, name, true))?;
        let file = self.passfile(name);
        self.storage.set(ctx, &file, &ciphertext).await?;
        Ok(file)
    }

    /// Remove a single secret
    pub async fn delete(&self, ctx: &OpContext, name: &str) -> StoreResult<()> {
        let name = Self::entry_name(name)?;
        let file = self.passfile(&name);
        self.storage.delete(ctx, &file).await.map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(name.clone()),
            e => e,
        })?;
        self.commit(ctx, vec![file], &format!("Remove {} from store", name)).await
    }

    /// Remove a secret or a whole folder
    pub async fn prune(&self, ctx: &OpContext, prefix: &str) -> StoreResult<()> {
        let prefix = Self::entry_name(prefix)?;
        if !self.storage.is_dir(&prefix) {
            return self.delete(ctx, &prefix).await;
        }
        self.storage.prune(ctx, &prefix).await?;
        self.commit(ctx, vec![prefix.clone()], &format!("Remove {} from store", prefix)).await
    }

    /// Record changed files in a versioned storage
    ///
    /// No-op for unversioned storage. Unless the context says otherwise a
    /// commit is made, and a push is queued when the context carries a
    /// sync queue.
    pub(crate) async fn commit(&self, ctx: &OpContext, files: Vec<String>, message: &str) -> StoreResult<()> {
        if !self.storage.is_versioned() {
            return Ok(());
        }
        self.storage.add(ctx, &files).await?;
        if ctx.no_commit() {
            debug!(alias = %self.alias, "skipping commit");
            return Ok(());
        }
        self.storage.commit(ctx, &ctx.commit_message_or(message)).await?;

        if let Some(queue) = ctx.queue() {
            let storage = self.storage.clone();
            let task = async move {
                storage
                    .push(&OpContext::new(), SYNC_REMOTE, SYNC_BRANCH)
                    .await
            };
            queue.add(format!("push {}", self.path.display()), task.boxed());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{mock_leaf, plain_leaf};
    use super::*;
    use crate::backend::crypto::MockCrypto;
    use crate::backend::{CryptoBackend, Registry, StorageBackend};
    use crate::queue::Queue;
    use crate::secrets::parse;
    use std::time::Duration;
    use tempfile::tempdir;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_set_delete() {
        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();

        leaf.set(&ctx, "web/site", &parse(b"hunter2")).await.unwrap();
        assert!(leaf.path().join("web/site.txt").exists());

        leaf.delete(&ctx, "web/site").await.unwrap();
        assert!(!leaf.exists("web/site"));
        assert!(leaf.delete(&ctx, "web/site").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_prune() {
        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();
        for name in ["a/b", "a/c/d", "e"] {
            leaf.set(&ctx, name, &parse(b"x")).await.unwrap();
        }
        leaf.prune(&ctx, "a").await.unwrap();
        leaf.prune(&ctx, "e").await.unwrap();
        assert!(leaf.list(&ctx, "").await.unwrap().is_empty());
        assert!(leaf.prune(&ctx, "").await.is_err());
    }

    #[tokio::test]
    async fn test_set_requires_init() {
        let dir = tempdir().unwrap();
        let leaf = mock_leaf(dir.path(), MockCrypto::new());
        let ctx = OpContext::new();
        assert!(matches!(
            leaf.set(&ctx, "a", &parse(b"x")).await,
            Err(StoreError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypt_failure() {
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let leaf = mock_leaf(dir.path(), MockCrypto::new().fail_encrypt_on("bad"));
        leaf.storage().set(&ctx, ".mock-ids", b"me\n").await.unwrap();

        let err = leaf.set(&ctx, "a", &parse(b"bad value")).await.unwrap_err();
        assert!(matches!(err, StoreError::Encrypt { name, .. } if name == "a"));
        assert!(!leaf.exists("a"));
    }

    #[tokio::test]
    async fn test_unserializable_secret_is_not_stored() {
        use crate::secrets::Yaml;
        use serde_yaml::value::{Tag, TaggedValue};
        use serde_yaml::Value;

        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();
        let mut yaml = Yaml::new("pw");
        yaml.insert(
            "broken",
            Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new("outer"),
                value: Value::Tagged(Box::new(TaggedValue {
                    tag: Tag::new("inner"),
                    value: Value::Null,
                })),
            })),
        );

        let err = leaf.set(&ctx, "db", &yaml.into()).await.unwrap_err();
        assert!(matches!(err, StoreError::Secret(_)));
        assert!(!leaf.exists("db"));
    }

    #[tokio::test]
    async fn test_git_commit_and_queued_push() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let ctx = OpContext::new()
            .with_crypto_backend(CryptoBackend::Plain)
            .with_storage_backend(StorageBackend::GitFs);
        let leaf = Leaf::init(&ctx, &Registry::with_builtins(), "", dir.path(), &["me".to_string()])
            .await
            .unwrap();

        let queue = Queue::new();
        let ctx = OpContext::new().with_queue(queue.clone()).with_commit_message("custom message");
        leaf.set(&ctx, "db", &parse(b"v1")).await.unwrap();
        assert!(queue.close(Duration::from_secs(10)).await);

        let revs = leaf.list_revisions(&ctx, "db").await.unwrap();
        assert_eq!(revs.len(), 1);
        assert_eq!(revs[0].subject, "custom message");

        // staged but not committed
        let ctx = OpContext::new().with_no_commit(true);
        leaf.set(&ctx, "db", &parse(b"v2")).await.unwrap();
        assert_eq!(leaf.list_revisions(&ctx, "db").await.unwrap().len(), 1);
    }
}
