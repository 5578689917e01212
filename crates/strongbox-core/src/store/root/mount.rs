//! Mount table maintenance: adding, removing and listing mounts

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::MountConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::leaf::Leaf;
use crate::store::normalize;
use crate::types::OpContext;

use super::RootStore;

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

impl RootStore {
    /// Mount the store at `path` under `alias`
    ///
    /// An uninitialized location is initialized for `recipients`; without
    /// recipients it is rejected. Aliases must be unique and mount
    /// locations must not overlap the root or any other mount.
    pub async fn add_mount(
        &mut self,
        ctx: &OpContext,
        alias: &str,
        path: impl AsRef<Path>,
        recipients: &[String],
    ) -> StoreResult<()> {
        let path = path.as_ref();
        let alias = normalize(alias)?;
        if alias.is_empty() {
            return Err(StoreError::InvalidName(alias));
        }
        if self.config.mounts.contains_key(&alias) {
            return Err(StoreError::MountConflict(format!("{} is already mounted", alias)));
        }
        if overlaps(path, &self.config.path) {
            return Err(StoreError::MountConflict(format!(
                "{} overlaps the root store at {}",
                path.display(),
                self.config.path.display()
            )));
        }
        if let Some((other, _)) = self.config.mounts.iter().find(|(_, m)| overlaps(path, &m.path)) {
            return Err(StoreError::MountConflict(format!(
                "{} overlaps mount {}",
                path.display(),
                other
            )));
        }

        let leaf = self.open_or_init(ctx, &alias, path, recipients).await?;
        let mount = MountConfig {
            path: path.to_path_buf(),
            crypto: self.registry.crypto_backend_from_name(leaf.crypto().name()).ok(),
            storage: self.registry.storage_backend_from_name(leaf.storage().name()).ok(),
        };
        self.config
            .add_mount(&alias, mount)
            .map_err(|e| StoreError::MountConflict(e.to_string()))?;
        self.leaves.lock().insert(alias.clone(), Arc::new(leaf));

        info!(alias = %alias, path = %path.display(), "mounted store");
        Ok(())
    }

    async fn open_or_init(&self, ctx: &OpContext, alias: &str, path: &Path, recipients: &[String]) -> StoreResult<Leaf> {
        if path.is_dir() {
            match Leaf::open(ctx, &self.registry, alias, path).await {
                Ok(leaf) if leaf.is_initialized() => return Ok(leaf),
                Ok(_) | Err(StoreError::BackendNotDetected(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if recipients.is_empty() {
            return Err(StoreError::NotInitialized(path.to_path_buf()));
        }
        Leaf::init(ctx, &self.registry, alias, path, recipients).await
    }

    /// Unmount `alias`; the store itself is left on disk
    pub fn remove_mount(&mut self, alias: &str) -> StoreResult<()> {
        let alias = normalize(alias)?;
        self.config
            .remove_mount(&alias)
            .map_err(|_| StoreError::MountNotFound(alias.clone()))?;
        self.leaves.lock().remove(&alias);
        info!(alias = %alias, "unmounted store");
        Ok(())
    }

    /// Mount aliases and their locations
    pub fn mounts(&self) -> BTreeMap<String, PathBuf> {
        self.config
            .mounts
            .iter()
            .map(|(alias, m)| (alias.clone(), m.path.clone()))
            .collect()
    }
}
