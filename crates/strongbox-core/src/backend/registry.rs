//! Backend registry for constructing and detecting backends by id

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::crypto::{AgeLoader, GpgLoader, PlainLoader};
use super::storage::{FsLoader, GitLoader};
use super::traits::{Crypto, CryptoLoader, Storage, StorageLoader};
use super::{CryptoBackend, StorageBackend};

/// Description of a registered backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor<Id> {
    pub id: Id,
    pub name: String,
    pub priority: i32,
}

/// One table of loaders keyed by backend id
struct Table<Id, L: ?Sized> {
    loaders: HashMap<Id, Arc<L>>,
    names: HashMap<String, Id>,
}

impl<Id: Copy + Eq + Hash + Ord, L: ?Sized> Table<Id, L> {
    fn new() -> Self {
        Self {
            loaders: HashMap::new(),
            names: HashMap::new(),
        }
    }

    fn insert(&mut self, id: Id, name: &str, loader: Arc<L>) {
        self.loaders.insert(id, loader);
        self.names.insert(name.to_lowercase(), id);
    }

    fn remove(&mut self, id: Id) -> bool {
        self.names.retain(|_, v| *v != id);
        self.loaders.remove(&id).is_some()
    }

    fn get(&self, id: Id) -> Option<Arc<L>> {
        self.loaders.get(&id).cloned()
    }

    /// Loaders sorted ascending by priority, ties broken by id
    fn by_priority(&self, priority: impl Fn(&L) -> i32) -> Vec<(Id, Arc<L>)> {
        let mut loaders: Vec<_> = self
            .loaders
            .iter()
            .map(|(id, loader)| (*id, loader.clone()))
            .collect();
        loaders.sort_by(|a, b| {
            priority(a.1.as_ref())
                .cmp(&priority(b.1.as_ref()))
                .then_with(|| a.0.cmp(&b.0))
        });
        loaders
    }
}

/// Tables mapping backend ids to loaders
///
/// The process-wide instance ([`Registry::global`]) is populated with the
/// built-in backends on first use and is read-only afterwards unless a
/// caller explicitly registers more. Stores can be built on a private
/// registry instead, which is how tests inject fake backends.
pub struct Registry {
    crypto: RwLock<Table<CryptoBackend, dyn CryptoLoader>>,
    storage: RwLock<Table<StorageBackend, dyn StorageLoader>>,
}

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::with_builtins()));

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            crypto: RwLock::new(Table::new()),
            storage: RwLock::new(Table::new()),
        }
    }

    /// Create a registry holding every built-in backend
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_crypto(CryptoBackend::GpgCli, "gpgcli", GpgLoader);
        registry.register_crypto(CryptoBackend::Age, "age", AgeLoader);
        registry.register_crypto(CryptoBackend::Plain, "plain", PlainLoader);
        registry.register_storage(StorageBackend::Fs, "fs", FsLoader);
        registry.register_storage(StorageBackend::GitFs, "gitfs", GitLoader);
        registry
    }

    /// The process-wide registry
    pub fn global() -> Arc<Registry> {
        GLOBAL.clone()
    }

    /// Register a crypto backend. The last registration for an id wins.
    pub fn register_crypto(&self, id: CryptoBackend, name: &str, loader: impl CryptoLoader + 'static) {
        self.crypto.write().insert(id, name, Arc::new(loader));
    }

    /// Register a storage backend. The last registration for an id wins.
    pub fn register_storage(&self, id: StorageBackend, name: &str, loader: impl StorageLoader + 'static) {
        self.storage.write().insert(id, name, Arc::new(loader));
    }

    /// Remove a crypto backend (mainly for testing)
    pub fn unregister_crypto(&self, id: CryptoBackend) -> bool {
        self.crypto.write().remove(id)
    }

    /// Remove a storage backend (mainly for testing)
    pub fn unregister_storage(&self, id: StorageBackend) -> bool {
        self.storage.write().remove(id)
    }

    /// Resolve a registered crypto backend name
    pub fn crypto_backend_from_name(&self, name: &str) -> StoreResult<CryptoBackend> {
        self.crypto
            .read()
            .names
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| StoreError::UnknownBackend(name.to_string()))
    }

    /// Resolve a registered storage backend name
    pub fn storage_backend_from_name(&self, name: &str) -> StoreResult<StorageBackend> {
        self.storage
            .read()
            .names
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| StoreError::UnknownBackend(name.to_string()))
    }

    /// Registered crypto backends in detection order
    pub fn crypto_backends(&self) -> Vec<BackendDescriptor<CryptoBackend>> {
        self.crypto
            .read()
            .by_priority(|l| l.priority())
            .into_iter()
            .map(|(id, l)| BackendDescriptor {
                id,
                name: l.name().to_string(),
                priority: l.priority(),
            })
            .collect()
    }

    /// Registered storage backends in detection order
    pub fn storage_backends(&self) -> Vec<BackendDescriptor<StorageBackend>> {
        self.storage
            .read()
            .by_priority(|l| l.priority())
            .into_iter()
            .map(|(id, l)| BackendDescriptor {
                id,
                name: l.name().to_string(),
                priority: l.priority(),
            })
            .collect()
    }

    fn crypto_loader(&self, id: CryptoBackend) -> StoreResult<Arc<dyn CryptoLoader>> {
        self.crypto
            .read()
            .get(id)
            .ok_or_else(|| StoreError::UnknownBackend(id.to_string()))
    }

    fn storage_loader(&self, id: StorageBackend) -> StoreResult<Arc<dyn StorageLoader>> {
        self.storage
            .read()
            .get(id)
            .ok_or_else(|| StoreError::UnknownBackend(id.to_string()))
    }

    /// Construct a crypto backend by id
    pub async fn new_crypto(&self, ctx: &OpContext, id: CryptoBackend) -> StoreResult<Arc<dyn Crypto>> {
        let loader = self.crypto_loader(id)?;
        loader.new(ctx).await
    }

    /// Open an existing storage location with a specific backend
    pub async fn new_storage(
        &self,
        ctx: &OpContext,
        id: StorageBackend,
        path: &Path,
    ) -> StoreResult<Arc<dyn Storage>> {
        let loader = self.storage_loader(id)?;
        loader.new(ctx, path).await
    }

    /// Create a new storage location with a specific backend
    pub async fn init_storage(
        &self,
        ctx: &OpContext,
        id: StorageBackend,
        path: &Path,
    ) -> StoreResult<Arc<dyn Storage>> {
        let loader = self.storage_loader(id)?;
        loader.init(ctx, path).await
    }

    /// Detect the storage backend used at `path`
    ///
    /// An explicit override in the context is tried first; if it cannot be
    /// constructed, plain filesystem storage is initialized instead.
    /// Otherwise loaders are tried in priority order and the first one that
    /// recognizes the path wins. With no match, filesystem storage is
    /// initialized at `path`.
    pub async fn detect_storage(&self, ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>> {
        if let Some(id) = ctx.storage_backend() {
            let loader = self.storage.read().get(id);
            if let Some(loader) = loader {
                match loader.new(ctx, path).await {
                    Ok(storage) => return Ok(storage),
                    Err(e) => {
                        debug!(backend = %id, path = %path.display(), error = %e, "explicit storage backend failed, falling back to fs");
                        return self.init_fallback_storage(ctx, path).await;
                    }
                }
            }
            debug!(backend = %id, "explicit storage backend not registered, detecting");
        }

        let candidates = self.storage.read().by_priority(|l| l.priority());
        for (id, loader) in candidates {
            debug!(backend = %id, path = %path.display(), "trying storage backend");
            if let Err(e) = loader.handles(path) {
                debug!(backend = %id, error = %e, "storage backend does not handle path");
                continue;
            }
            match loader.new(ctx, path).await {
                Ok(storage) => {
                    debug!(backend = %id, path = %path.display(), "using storage backend");
                    return Ok(storage);
                }
                Err(e) => {
                    debug!(backend = %id, error = %e, "storage backend failed to open path");
                }
            }
        }

        self.init_fallback_storage(ctx, path).await
    }

    async fn init_fallback_storage(&self, ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>> {
        let loader = self
            .storage
            .read()
            .get(StorageBackend::Fs)
            .ok_or_else(|| StoreError::BackendNotDetected(path.to_path_buf()))?;
        loader.init(ctx, path).await
    }

    /// Detect the crypto backend of an opened storage
    ///
    /// An explicit override in the context is constructed directly.
    /// Otherwise the first loader (by priority) whose marker file exists in
    /// the storage wins.
    pub async fn detect_crypto(&self, ctx: &OpContext, storage: &dyn Storage) -> StoreResult<Arc<dyn Crypto>> {
        if let Some(id) = ctx.crypto_backend() {
            return self.new_crypto(ctx, id).await;
        }

        let candidates = self.crypto.read().by_priority(|l| l.priority());
        for (id, loader) in candidates {
            if let Err(e) = loader.handles(storage) {
                debug!(backend = %id, error = %e, "crypto backend does not handle store");
                continue;
            }
            match loader.new(ctx).await {
                Ok(crypto) => {
                    debug!(backend = %id, path = %storage.path().display(), "using crypto backend");
                    return Ok(crypto);
                }
                Err(e) => {
                    debug!(backend = %id, error = %e, "crypto backend failed to load");
                }
            }
        }

        Err(StoreError::BackendNotDetected(storage.path().to_path_buf()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("crypto", &self.crypto_backends())
            .field("storage", &self.storage_backends())
            .finish()
    }
}

/// Register a crypto backend with the process-wide registry
pub fn register_crypto(id: CryptoBackend, name: &str, loader: impl CryptoLoader + 'static) {
    GLOBAL.register_crypto(id, name, loader);
}

/// Register a storage backend with the process-wide registry
pub fn register_storage(id: StorageBackend, name: &str, loader: impl StorageLoader + 'static) {
    GLOBAL.register_storage(id, name, loader);
}

/// Construct a crypto backend from the process-wide registry
pub async fn new_crypto(ctx: &OpContext, id: CryptoBackend) -> StoreResult<Arc<dyn Crypto>> {
    GLOBAL.new_crypto(ctx, id).await
}

/// Open a storage location with a backend from the process-wide registry
pub async fn new_storage(ctx: &OpContext, id: StorageBackend, path: &Path) -> StoreResult<Arc<dyn Storage>> {
    GLOBAL.new_storage(ctx, id, path).await
}

/// Create a storage location with a backend from the process-wide registry
pub async fn init_storage(ctx: &OpContext, id: StorageBackend, path: &Path) -> StoreResult<Arc<dyn Storage>> {
    GLOBAL.init_storage(ctx, id, path).await
}

/// Detect the storage backend at `path` using the process-wide registry
pub async fn detect_storage(ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>> {
    GLOBAL.detect_storage(ctx, path).await
}

/// Detect the crypto backend of `storage` using the process-wide registry
pub async fn detect_crypto(ctx: &OpContext, storage: &dyn Storage) -> StoreResult<Arc<dyn Crypto>> {
    GLOBAL.detect_crypto(ctx, storage).await
}
