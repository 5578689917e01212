//! Single-entry operations resolved onto the owning mount
//!
//! Missing entries are reported under their full name, not the name
//! relative to the mount.

use crate::backend::Revision;
use crate::error::{StoreError, StoreResult};
use crate::secrets::Secret;
use crate::store::normalize;
use crate::types::OpContext;

use super::RootStore;

/// Report a missing entry under its full name
fn absolute(err: StoreError, name: &str) -> StoreError {
    match err {
        StoreError::NotFound(_) => StoreError::NotFound(name.to_string()),
        e => e,
    }
}

impl RootStore {
    pub async fn get(&self, ctx: &OpContext, name: &str) -> StoreResult<Secret> {
        let (leaf, relative) = self.resolve(ctx, name).await?;
        leaf.get(ctx, &relative).await.map_err(|e| absolute(e, name))
    }

    pub async fn set(&self, ctx: &OpContext, name: &str, secret: &Secret) -> StoreResult<()> {
        let (leaf, relative) = self.resolve(ctx, name).await?;
        leaf.set(&self.write_ctx(ctx), &relative, secret).await
    }

    pub async fn delete(&self, ctx: &OpContext, name: &str) -> StoreResult<()> {
        let (leaf, relative) = self.resolve(ctx, name).await?;
        leaf.delete(&self.write_ctx(ctx), &relative)
            .await
            .map_err(|e| absolute(e, name))
    }

    /// Remove a secret or a folder; mount points themselves cannot be pruned
    pub async fn prune(&self, ctx: &OpContext, name: &str) -> StoreResult<()> {
        let (leaf, relative) = self.resolve(ctx, name).await?;
        if relative.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        leaf.prune(&self.write_ctx(ctx), &relative)
            .await
            .map_err(|e| absolute(e, name))
    }

    pub async fn exists(&self, ctx: &OpContext, name: &str) -> StoreResult<bool> {
        let (leaf, relative) = self.resolve(ctx, name).await?;
        Ok(!relative.is_empty() && leaf.exists(&relative))
    }

    /// Whether `name` is a folder, a mount point, or a parent of one
    pub async fn is_dir(&self, ctx: &OpContext, name: &str) -> StoreResult<bool> {
        let normalized = normalize(name)?;
        if normalized.is_empty() {
            return Ok(true);
        }
        let folder = format!("{}/", normalized);
        if self
            .config
            .mounts
            .keys()
            .any(|alias| *alias == normalized || alias.starts_with(&folder))
        {
            return Ok(true);
        }
        let (leaf, relative) = self.resolve(ctx, &normalized).await?;
        Ok(leaf.is_dir(&relative))
    }

    pub async fn list_revisions(&self, ctx: &OpContext, name: &str) -> StoreResult<Vec<Revision>> {
        let (leaf, relative) = self.resolve(ctx, name).await?;
        leaf.list_revisions(ctx, &relative)
            .await
            .map_err(|e| absolute(e, name))
    }

    pub async fn get_revision(&self, ctx: &OpContext, name: &str, revision: &str) -> StoreResult<Secret> {
        let (leaf, relative) = self.resolve(ctx, name).await?;
        leaf.get_revision(ctx, &relative, revision).await
    }
}
