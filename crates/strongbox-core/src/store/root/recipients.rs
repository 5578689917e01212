//! Per-mount recipient management

use std::sync::Arc;

use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::store::leaf::Leaf;
use crate::store::normalize;
use crate::types::OpContext;

use super::RootStore;

impl RootStore {
    async fn mounted_leaf(&self, ctx: &OpContext, alias: &str) -> StoreResult<Arc<Leaf>> {
        let alias = normalize(alias)?;
        if !alias.is_empty() && !self.config.mounts.contains_key(&alias) {
            return Err(StoreError::MountNotFound(alias));
        }
        self.leaf(ctx, &alias).await
    }

    /// Recipients of the store mounted at `alias`
    pub async fn recipients(&self, ctx: &OpContext, alias: &str) -> StoreResult<Vec<String>> {
        self.mounted_leaf(ctx, alias).await?.recipients(ctx).await
    }

    /// Add a recipient and re-encrypt the store mounted at `alias`
    pub async fn add_recipient(&self, ctx: &OpContext, alias: &str, id: &str) -> StoreResult<()> {
        let leaf = self.mounted_leaf(ctx, alias).await?;
        leaf.add_recipient(&self.write_ctx(ctx), id).await
    }

    /// Remove a recipient and re-encrypt the store mounted at `alias`
    pub async fn remove_recipient(&self, ctx: &OpContext, alias: &str, id: &str) -> StoreResult<()> {
        let leaf = self.mounted_leaf(ctx, alias).await?;
        leaf.remove_recipient(&self.write_ctx(ctx), id).await
    }

    /// Import exported public keys of every mount into the crypto backends
    ///
    /// Failing mounts are skipped with a warning.
    pub async fn import_missing_public_keys(&self, ctx: &OpContext) -> StoreResult<()> {
        for alias in self.aliases() {
            let result = match self.leaf(ctx, &alias).await {
                Ok(leaf) => leaf.import_missing_public_keys(ctx).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {}
                Err(StoreError::Cancelled) => return Err(StoreError::Cancelled),
                Err(e) => warn!(alias = %alias, error = %e, "failed to import public keys"),
            }
        }
        Ok(())
    }
}
