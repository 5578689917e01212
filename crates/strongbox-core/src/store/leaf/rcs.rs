//! Version history of entries in versioned storage

use crate::backend::Revision;
use crate::error::{StoreError, StoreResult};
use crate::secrets::Secret;
use crate::types::OpContext;

use super::read::decode;
use super::Leaf;

impl Leaf {
    /// History of an entry, newest first
    pub async fn list_revisions(&self, ctx: &OpContext, name: &str) -> StoreResult<Vec<Revision>> {
        let name = Self::entry_name(name)?;
        self.storage.revisions(ctx, &self.passfile(&name)).await
    }

    /// An entry as it was at `revision`
    pub async fn get_revision(&self, ctx: &OpContext, name: &str, revision: &str) -> StoreResult<Secret> {
        let name = Self::entry_name(name)?;
        let ciphertext = self
            .storage
            .get_revision(ctx, &self.passfile(&name), revision)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => StoreError::NotFound(format!("{}@{}", name, revision)),
                e => e,
            })?;
        let content = self.decrypt(ctx, &name, &ciphertext).await?;
        Ok(decode(ctx, &content))
    }

    /// Working tree status of a versioned storage
    pub async fn status(&self, ctx: &OpContext) -> StoreResult<String> {
        self.storage.status(ctx).await
    }
}
