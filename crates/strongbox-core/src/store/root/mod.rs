//! Root store: resolves secret names onto mounted leaf stores
//!
//! The root mount (`""`) always exists. Every other mount owns a name
//! prefix; a secret belongs to the mount with the longest prefix matching
//! at a segment boundary. Leaf stores are opened on first use and cached
//! for the lifetime of the root store.

mod convert;
mod copy;
mod fsck;
mod list;
mod mount;
mod ops;
mod recipients;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{Crypto, Registry, Storage};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::leaf::Leaf;
use super::normalize;

/// Top-level store owning the mount table and the opened leaf stores
///
/// Callers must serialize concurrent use of one instance.
pub struct RootStore {
    config: Config,
    registry: Arc<Registry>,
    leaves: Mutex<HashMap<String, Arc<Leaf>>>,
}

impl RootStore {
    /// Root store using the process-wide backend registry
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Registry::global())
    }

    pub fn with_registry(config: Config, registry: Arc<Registry>) -> Self {
        Self {
            config,
            registry,
            leaves: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Location of the root mount
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Create the store for `alias` (`""` for the root mount)
    pub async fn init(&mut self, ctx: &OpContext, alias: &str, path: &Path, recipients: &[String]) -> StoreResult<()> {
        let alias = normalize(alias)?;
        if !alias.is_empty() {
            return self.add_mount(ctx, &alias, path, recipients).await;
        }

        let leaf = Leaf::init(ctx, &self.registry, "", path, recipients).await?;
        self.config.path = path.to_path_buf();
        self.config.crypto = self.registry.crypto_backend_from_name(leaf.crypto().name()).ok();
        self.config.storage = self.registry.storage_backend_from_name(leaf.storage().name()).ok();
        self.leaves.lock().insert(String::new(), Arc::new(leaf));
        Ok(())
    }

    /// Whether the root mount holds an initialized store
    pub async fn is_initialized(&self, ctx: &OpContext) -> StoreResult<bool> {
        if !self.config.path.is_dir() {
            return Ok(false);
        }
        match self.leaf(ctx, "").await {
            Ok(leaf) => Ok(leaf.is_initialized()),
            Err(StoreError::BackendNotDetected(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Open (or fetch the cached) leaf store of a mount
    pub async fn leaf(&self, ctx: &OpContext, alias: &str) -> StoreResult<Arc<Leaf>> {
        if let Some(leaf) = self.leaves.lock().get(alias) {
            return Ok(leaf.clone());
        }

        let (path, crypto, storage) = if alias.is_empty() {
            (self.config.path.clone(), self.config.crypto, self.config.storage)
        } else {
            let mount = self
                .config
                .mounts
                .get(alias)
                .ok_or_else(|| StoreError::MountNotFound(alias.to_string()))?;
            (mount.path.clone(), mount.crypto, mount.storage)
        };
        let mut open_ctx = ctx.clone();
        if let (None, Some(id)) = (ctx.crypto_backend(), crypto) {
            open_ctx = open_ctx.with_crypto_backend(id);
        }
        if let (None, Some(id)) = (ctx.storage_backend(), storage) {
            open_ctx = open_ctx.with_storage_backend(id);
        }

        let leaf = Arc::new(Leaf::open(&open_ctx, &self.registry, alias, &path).await?);
        debug!(alias = %alias, path = %path.display(), "cached leaf store");
        Ok(self.leaves.lock().entry(alias.to_string()).or_insert(leaf).clone())
    }

    /// Mount aliases, longest first
    pub fn mount_points(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.config.mounts.keys().cloned().collect();
        aliases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        aliases
    }

    /// Split a secret name into mount alias and name relative to it
    pub fn resolve_mount(&self, name: &str) -> StoreResult<(String, String)> {
        let name = normalize(name)?;
        for alias in self.mount_points() {
            if name == alias {
                return Ok((alias, String::new()));
            }
            if let Some(rest) = name.strip_prefix(&alias).and_then(|r| r.strip_prefix('/')) {
                return Ok((alias.clone(), rest.to_string()));
            }
        }
        Ok((String::new(), name))
    }

    /// Leaf store and relative name for a secret name
    pub async fn resolve(&self, ctx: &OpContext, name: &str) -> StoreResult<(Arc<Leaf>, String)> {
        let (alias, relative) = self.resolve_mount(name)?;
        let leaf = self.leaf(ctx, &alias).await?;
        Ok((leaf, relative))
    }

    /// Crypto backend of the mount holding `name`
    pub async fn crypto(&self, ctx: &OpContext, name: &str) -> StoreResult<Arc<dyn Crypto>> {
        Ok(self.resolve(ctx, name).await?.0.crypto())
    }

    /// Storage backend of the mount holding `name`
    pub async fn storage(&self, ctx: &OpContext, name: &str) -> StoreResult<Arc<dyn Storage>> {
        Ok(self.resolve(ctx, name).await?.0.storage())
    }

    /// Context for writes: queued sync only if enabled in the config
    fn write_ctx(&self, ctx: &OpContext) -> OpContext {
        if self.config.auto_sync {
            ctx.clone()
        } else {
            ctx.clone().without_queue()
        }
    }

    /// Root first, then mounts in alias order
    fn aliases(&self) -> Vec<String> {
        std::iter::once(String::new())
            .chain(self.config.mounts.keys().cloned())
            .collect()
    }
}

impl fmt::Debug for RootStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootStore")
            .field("path", &self.config.path)
            .field("mounts", &self.mount_points())
            .finish()
    }
}
