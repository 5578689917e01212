//! Copy and move of entries and folders, across mounts if needed
//!
//! Entries are decrypted from the source mount and re-encrypted for the
//! recipients of the target mount.

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{join, normalize};
use crate::types::OpContext;

use super::RootStore;

impl RootStore {
    /// Copy a secret or a folder, re-encrypting for the target mount
    pub async fn copy(&self, ctx: &OpContext, from: &str, to: &str) -> StoreResult<()> {
        self.transfer(ctx, from, to, false).await
    }

    /// Move a secret or a folder, possibly across mounts
    pub async fn move_entry(&self, ctx: &OpContext, from: &str, to: &str) -> StoreResult<()> {
        self.transfer(ctx, from, to, true).await
    }

    async fn transfer(&self, ctx: &OpContext, from: &str, to: &str, remove_source: bool) -> StoreResult<()> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        if from.is_empty() {
            return Err(StoreError::InvalidName(from));
        }
        if to.is_empty() {
            return Err(StoreError::InvalidName(to));
        }
        if from == to {
            return Ok(());
        }

        if self.exists(ctx, &from).await? {
            // an entry copied onto a folder lands inside it
            let target = if self.is_dir(ctx, &to).await? && !self.exists(ctx, &to).await? {
                let base = from.rsplit('/').next().unwrap_or(&from);
                join(&to, base)
            } else {
                to
            };
            self.copy_entry(ctx, &from, &target).await?;
            if remove_source {
                self.delete(ctx, &from).await?;
            }
            return Ok(());
        }

        if !self.is_dir(ctx, &from).await? {
            return Err(StoreError::NotFound(from));
        }
        if to.starts_with(&format!("{}/", from)) {
            return Err(StoreError::InvalidName(to));
        }

        let entries = self.entries_below(ctx, &from).await?;
        for entry in &entries {
            let suffix = entry
                .strip_prefix(&from)
                .map(|s| s.trim_start_matches('/'))
                .unwrap_or(entry);
            self.copy_entry(ctx, entry, &join(&to, suffix)).await?;
        }
        if remove_source {
            for entry in &entries {
                self.delete(ctx, entry).await?;
            }
        }
        debug!(from = %from, to = %to, entries = entries.len(), "transferred folder");
        Ok(())
    }

    /// Full names of all secrets inside the folder `folder`, across mounts
    async fn entries_below(&self, ctx: &OpContext, folder: &str) -> StoreResult<Vec<String>> {
        let prefix = format!("{}/", folder);
        let names = self
            .tree(ctx)
            .await?
            .list(crate::tree::INF)
            .into_iter()
            .filter(|n| n.starts_with(&prefix))
            .collect();
        Ok(names)
    }

    async fn copy_entry(&self, ctx: &OpContext, from: &str, to: &str) -> StoreResult<()> {
        if !ctx.force() && self.exists(ctx, to).await? {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        // raw read so the target gets exactly the source bytes
        let raw = ctx.clone().with_show_parsing(false);
        let secret = self.get(&raw, from).await?;
        let message = format!("Copy {} to {}", from, to);
        let write = ctx.clone().with_commit_message(ctx.commit_message_or(&message));
        self.set(&write, to, &secret).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::root_with_work;
    use super::*;
    use crate::secrets::parse;

    #[tokio::test]
    async fn test_copy_entry_across_mounts() {
        let (_dir, root) = root_with_work().await;
        let ctx = OpContext::new();
        let content = b"hunter2\n---\nuser: bob\n";
        root.set(&ctx, "personal/db", &parse(content)).await.unwrap();

        root.copy(&ctx, "personal/db", "work/db").await.unwrap();
        assert_eq!(root.get(&ctx, "work/db").await.unwrap().bytes().unwrap(), content.to_vec());
        assert!(root.exists(&ctx, "personal/db").await.unwrap());

        // refuses to overwrite without force
        assert!(matches!(
            root.copy(&ctx, "personal/db", "work/db").await,
            Err(StoreError::AlreadyExists(name)) if name == "work/db"
        ));
        root.copy(&ctx.clone().with_force(true), "personal/db", "work/db").await.unwrap();
    }

    #[tokio::test]
    async fn test_move_entry_into_folder() {
        let (_dir, root) = root_with_work().await;
        let ctx = OpContext::new();
        root.set(&ctx, "db", &parse(b"x")).await.unwrap();
        root.set(&ctx, "archive/old", &parse(b"y")).await.unwrap();

        root.move_entry(&ctx, "db", "archive").await.unwrap();
        assert!(!root.exists(&ctx, "db").await.unwrap());
        assert!(root.exists(&ctx, "archive/db").await.unwrap());

        // onto a mount point
        root.move_entry(&ctx, "archive/db", "work").await.unwrap();
        assert!(root.exists(&ctx, "work/db").await.unwrap());
    }

    #[tokio::test]
    async fn test_move_folder_across_mounts() {
        let (_dir, root) = root_with_work().await;
        let ctx = OpContext::new();
        for name in ["team/a", "team/sub/b", "teams/c"] {
            root.set(&ctx, name, &parse(name.as_bytes())).await.unwrap();
        }

        root.move_entry(&ctx, "team", "work/team").await.unwrap();
        assert_eq!(
            root.list(&ctx, crate::tree::INF).await.unwrap(),
            vec!["teams/c", "work/team/a", "work/team/sub/b"]
        );
        assert_eq!(root.get(&ctx, "work/team/sub/b").await.unwrap().password(), "team/sub/b");
    }

    #[tokio::test]
    async fn test_transfer_errors() {
        let (_dir, root) = root_with_work().await;
        let ctx = OpContext::new();
        root.set(&ctx, "a/b", &parse(b"x")).await.unwrap();

        assert!(root.move_entry(&ctx, "missing", "x").await.unwrap_err().is_not_found());
        assert!(matches!(root.move_entry(&ctx, "a", "a/inner").await, Err(StoreError::InvalidName(_))));
        assert!(matches!(root.copy(&ctx, "", "x").await, Err(StoreError::InvalidName(_))));
        root.move_entry(&ctx, "a/b", "a/b").await.unwrap();
        assert!(root.exists(&ctx, "a/b").await.unwrap());
    }
}
