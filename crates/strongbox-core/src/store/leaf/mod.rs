//! Leaf store: one mount's crypto and storage backends
//!
//! A leaf holds no state besides its backend handles. Every operation maps
//! a secret name to `<name>.<ext>` in storage, where the extension comes
//! from the crypto backend.

mod convert;
mod fsck;
mod rcs;
mod read;
mod recipients;
mod write;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{Crypto, CryptoBackend, Registry, Storage, StorageBackend};
use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::normalize;

/// Store of a single mount, pairing one crypto and one storage backend
pub struct Leaf {
    alias: String,
    path: PathBuf,
    crypto: Arc<dyn Crypto>,
    storage: Arc<dyn Storage>,
}

impl Leaf {
    /// Assemble a leaf from already constructed backends
    pub fn from_parts(alias: impl Into<String>, crypto: Arc<dyn Crypto>, storage: Arc<dyn Storage>) -> Self {
        Self {
            alias: alias.into(),
            path: storage.path().to_path_buf(),
            crypto,
            storage,
        }
    }

    /// Open the store at `path`, detecting both backends
    pub async fn open(ctx: &OpContext, registry: &Registry, alias: &str, path: &Path) -> StoreResult<Self> {
        let storage = registry.detect_storage(ctx, path).await?;
        let crypto = registry.detect_crypto(ctx, storage.as_ref()).await?;
        debug!(
            alias = %alias,
            path = %path.display(),
            crypto = crypto.name(),
            storage = storage.name(),
            "opened store"
        );
        Ok(Self::from_parts(alias, crypto, storage))
    }

    /// Create a new store at `path` readable by `recipients`
    ///
    /// Backends come from the context overrides, defaulting to `gpgcli` on
    /// `fs`.
    pub async fn init(
        ctx: &OpContext,
        registry: &Registry,
        alias: &str,
        path: &Path,
        recipients: &[String],
    ) -> StoreResult<Self> {
        let storage_id = ctx.storage_backend().unwrap_or(StorageBackend::Fs);
        let crypto_id = ctx.crypto_backend().unwrap_or(CryptoBackend::GpgCli);

        let storage = registry.init_storage(ctx, storage_id, path).await?;
        let crypto = registry.new_crypto(ctx, crypto_id).await?;
        let leaf = Self::from_parts(alias, crypto, storage);
        leaf.write_recipients(ctx, recipients).await?;
        leaf.commit(
            ctx,
            vec![leaf.crypto.id_file().to_string()],
            &format!("Initialized store for {}", recipients.join(", ")),
        )
        .await?;

        info!(alias = %alias, path = %path.display(), crypto = %crypto_id, storage = %storage_id, "initialized store");
        Ok(leaf)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn crypto(&self) -> Arc<dyn Crypto> {
        self.crypto.clone()
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    /// Whether the crypto marker file exists
    pub fn is_initialized(&self) -> bool {
        self.storage.exists(self.crypto.id_file())
    }

    /// Storage file of a normalized secret name
    fn passfile(&self, name: &str) -> String {
        format!("{}.{}", name, self.crypto.ext())
    }

    /// Normalize a name that must address an entry
    fn entry_name(name: &str) -> StoreResult<String> {
        let normalized = normalize(name)?;
        if normalized.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(normalized)
    }

    pub fn exists(&self, name: &str) -> bool {
        match Self::entry_name(name) {
            Ok(name) => self.storage.exists(&self.passfile(&name)),
            Err(_) => false,
        }
    }

    pub fn is_dir(&self, name: &str) -> bool {
        match normalize(name) {
            Ok(name) if !name.is_empty() => self.storage.is_dir(&name),
            _ => false,
        }
    }

    /// Secret names below `prefix`, without the crypto extension
    ///
    /// `prefix` matches whole segments: `web` selects `web` and `web/...`
    /// but not `website`.
    pub async fn list(&self, ctx: &OpContext, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = normalize(prefix)?;
        let folder = format!("{}/", prefix);
        let suffix = format!(".{}", self.crypto.ext());
        let names = self
            .storage
            .list(ctx, &prefix)
            .await?
            .into_iter()
            .filter_map(|n| n.strip_suffix(&suffix).map(str::to_string))
            .filter(|n| prefix.is_empty() || *n == prefix || n.starts_with(&folder))
            .collect();
        Ok(names)
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("alias", &self.alias)
            .field("path", &self.path)
            .field("crypto", &self.crypto.name())
            .field("storage", &self.storage.name())
            .finish()
    }
}

/// Map a crypto failure onto the entry, keeping cancellation intact
fn crypto_error(err: StoreError, name: &str, encrypt: bool) -> StoreError {
    match err {
        StoreError::Cancelled => StoreError::Cancelled,
        e if encrypt => StoreError::encrypt(name, e),
        e => StoreError::decrypt(name, e),
    }
}
