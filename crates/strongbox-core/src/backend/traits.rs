//! Core traits for crypto and storage backends

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::Revision;

/// Encryption backend
///
/// Implementations orchestrate an external crypto tool; the engine never
/// implements primitives itself.
#[async_trait]
pub trait Crypto: Send + Sync {
    /// Name of this backend, e.g. `gpgcli`
    fn name(&self) -> &str;

    /// File extension (without the dot) of encrypted entries
    fn ext(&self) -> &str;

    /// Marker file at the store root listing the recipients
    ///
    /// Its presence is how detection recognizes the backend.
    fn id_file(&self) -> &str;

    /// Encrypt `plaintext` for every recipient
    async fn encrypt(
        &self,
        ctx: &OpContext,
        plaintext: &[u8],
        recipients: &[String],
    ) -> StoreResult<Vec<u8>>;

    /// Decrypt `ciphertext` with a locally available identity
    async fn decrypt(&self, ctx: &OpContext, ciphertext: &[u8]) -> StoreResult<Vec<u8>>;

    /// Identities with a usable private key on this machine
    async fn list_identities(&self, _ctx: &OpContext) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Whether the public key of `recipient` is available locally
    async fn has_public_key(&self, _ctx: &OpContext, _recipient: &str) -> bool {
        true
    }

    /// Import an exported public key
    async fn import_public_key(&self, _ctx: &OpContext, _key: &[u8]) -> StoreResult<()> {
        Err(StoreError::not_supported(self.name(), "import public key"))
    }

    /// Export the public key of `recipient`
    async fn export_public_key(&self, _ctx: &OpContext, _recipient: &str) -> StoreResult<Vec<u8>> {
        Err(StoreError::not_supported(self.name(), "export public key"))
    }
}

/// Byte blob persistence with optional version history
///
/// Names are slash-separated and relative to the storage root.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Name of this backend, e.g. `fs`
    fn name(&self) -> &str;

    /// Root location of this storage
    fn path(&self) -> &Path;

    fn exists(&self, name: &str) -> bool;

    fn is_dir(&self, name: &str) -> bool;

    async fn get(&self, ctx: &OpContext, name: &str) -> StoreResult<Vec<u8>>;

    async fn set(&self, ctx: &OpContext, name: &str, value: &[u8]) -> StoreResult<()>;

    async fn delete(&self, ctx: &OpContext, name: &str) -> StoreResult<()>;

    /// All non-hidden entries whose name starts with `prefix`, sorted
    async fn list(&self, ctx: &OpContext, prefix: &str) -> StoreResult<Vec<String>>;

    /// Remove an entry or a whole folder
    async fn prune(&self, ctx: &OpContext, prefix: &str) -> StoreResult<()>;

    /// Check the storage itself; returns the problems found
    async fn fsck(&self, ctx: &OpContext) -> StoreResult<Vec<String>>;

    /// Whether this backend keeps a version history
    fn is_versioned(&self) -> bool {
        false
    }

    /// Stage changed files for the next commit
    async fn add(&self, _ctx: &OpContext, _files: &[String]) -> StoreResult<()> {
        Ok(())
    }

    /// Record staged changes
    async fn commit(&self, _ctx: &OpContext, _message: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn revisions(&self, _ctx: &OpContext, _name: &str) -> StoreResult<Vec<Revision>> {
        Err(StoreError::not_supported(self.name(), "revisions"))
    }

    async fn get_revision(
        &self,
        _ctx: &OpContext,
        _name: &str,
        _revision: &str,
    ) -> StoreResult<Vec<u8>> {
        Err(StoreError::not_supported(self.name(), "get revision"))
    }

    async fn status(&self, _ctx: &OpContext) -> StoreResult<String> {
        Err(StoreError::not_supported(self.name(), "status"))
    }

    async fn push(&self, _ctx: &OpContext, _remote: &str, _branch: &str) -> StoreResult<()> {
        Err(StoreError::not_supported(self.name(), "push"))
    }

    async fn pull(&self, _ctx: &OpContext, _remote: &str, _branch: &str) -> StoreResult<()> {
        Err(StoreError::not_supported(self.name(), "pull"))
    }
}

/// Constructs and detects a crypto backend
#[async_trait]
pub trait CryptoLoader: Send + Sync {
    fn name(&self) -> &str;

    /// Lower numbers are tried first during detection
    fn priority(&self) -> i32;

    /// Ok iff the storage carries this backend's marker file
    ///
    /// Must not perform anything beyond existence checks.
    fn handles(&self, storage: &dyn Storage) -> StoreResult<()>;

    async fn new(&self, ctx: &OpContext) -> StoreResult<Arc<dyn Crypto>>;
}

/// Constructs, initializes and detects a storage backend
#[async_trait]
pub trait StorageLoader: Send + Sync {
    fn name(&self) -> &str;

    /// Lower numbers are tried first during detection
    fn priority(&self) -> i32;

    /// Ok iff an on-disk marker for this backend exists at `path`
    fn handles(&self, path: &Path) -> StoreResult<()>;

    /// Open an existing storage location
    async fn new(&self, ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>>;

    /// Create a new storage location
    async fn init(&self, ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>>;
}
