//! Re-encrypting a store into one using other backends

use std::path::PathBuf;

use tracing::{info, warn};

use crate::backend::{CryptoBackend, Registry, StorageBackend};
use crate::error::{EntryFailure, StoreError, StoreResult};
use crate::types::OpContext;

use super::Leaf;

impl Leaf {
    /// Sibling directory a conversion writes into
    fn convert_target(&self, crypto: CryptoBackend, storage: StorageBackend) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        self.path.with_file_name(format!("{}-{}-{}", name, crypto, storage))
    }

    /// Re-encrypt every entry into a new store using other backends
    ///
    /// The new store is written next to this one. If any entry fails, the
    /// error lists every failure and both stores are left as they are.
    /// Otherwise, with `replace` set, the new store takes this store's
    /// place on disk; the returned leaf points at the final location.
    pub async fn convert(
        &self,
        ctx: &OpContext,
        registry: &Registry,
        crypto: CryptoBackend,
        storage: StorageBackend,
        replace: bool,
    ) -> StoreResult<Leaf> {
        let target = self.convert_target(crypto, storage);
        if target.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("conversion target {} exists", target.display()),
            )));
        }

        let recipients = self.recipients(ctx).await?;
        let init_ctx = ctx
            .clone()
            .with_crypto_backend(crypto)
            .with_storage_backend(storage)
            .with_no_commit(false)
            .without_queue();
        let converted = Leaf::init(&init_ctx, registry, &self.alias, &target, &recipients).await?;

        let mut files = Vec::new();
        let mut failures = Vec::new();
        for name in self.list(ctx, "").await? {
            let result = match self.decrypt_entry(ctx, &name).await {
                Ok(plaintext) => converted.encrypt_entry(ctx, &name, &plaintext).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(file) => files.push(file),
                Err(StoreError::Cancelled) => return Err(StoreError::Cancelled),
                Err(e) => {
                    warn!(alias = %self.alias, entry = %name, error = %e, "failed to convert entry");
                    failures.push(EntryFailure::new(name, e));
                }
            }
        }
        if !failures.is_empty() {
            return Err(StoreError::Convert { failures });
        }

        let message = format!(
            "Converted from {}/{}",
            self.crypto.name(),
            self.storage.name()
        );
        converted.commit(&init_ctx, files, &message).await?;
        info!(alias = %self.alias, from = %self.path.display(), to = %target.display(), "converted store");

        if !replace {
            return Ok(converted);
        }

        tokio::fs::remove_dir_all(&self.path).await?;
        tokio::fs::rename(&target, &self.path).await?;
        let storage = registry.new_storage(ctx, storage, &self.path).await?;
        info!(alias = %self.alias, path = %self.path.display(), "replaced store with converted copy");
        Ok(Leaf::from_parts(self.alias.clone(), converted.crypto(), storage))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{mock_leaf, plain_leaf};
    use super::*;
    use crate::backend::crypto::{MockCrypto, MockLoader};
    use crate::secrets::parse;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_convert_copy() {
        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();
        leaf.set(&ctx, "db", &parse(b"user: bob")).await.unwrap();

        let registry = Registry::with_builtins();
        let converted = leaf
            .convert(&ctx, &registry, CryptoBackend::Plain, StorageBackend::Fs, false)
            .await
            .unwrap();
        assert_ne!(converted.path(), leaf.path());
        assert!(converted.path().to_string_lossy().ends_with("-plain-fs"));
        assert_eq!(converted.get(&ctx, "db").await.unwrap().get("user").as_deref(), Some("bob"));
        assert!(leaf.exists("db"));

        // a second conversion would overwrite the first one
        assert!(leaf
            .convert(&ctx, &registry, CryptoBackend::Plain, StorageBackend::Fs, false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_convert_replace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let registry = Registry::with_builtins();
        registry.register_crypto(CryptoBackend::Age, "mock", MockLoader::new(MockCrypto::new(), 5));

        let ctx = OpContext::new().with_crypto_backend(CryptoBackend::Plain);
        let leaf = Leaf::init(&ctx, &registry, "", &path, &["me".to_string()]).await.unwrap();
        let ctx = OpContext::new();
        leaf.set(&ctx, "a/b", &parse(b"secret")).await.unwrap();

        let converted = leaf
            .convert(&ctx, &registry, CryptoBackend::Age, StorageBackend::Fs, true)
            .await
            .unwrap();
        assert_eq!(converted.path(), path.as_path());
        assert_eq!(converted.crypto().name(), "mock");
        assert!(path.join("a/b.mock").exists());
        assert!(!path.join("a/b.txt").exists());
        assert!(!dir.path().join("store-age-fs").exists());

        let reopened = Leaf::open(&ctx, &registry, "", &path).await.unwrap();
        assert_eq!(reopened.get(&ctx, "a/b").await.unwrap().password(), "secret");
    }

    #[tokio::test]
    async fn test_convert_failure_keeps_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let ctx = OpContext::new();
        let source = mock_leaf(&path, MockCrypto::new());
        source.storage().set(&ctx, ".mock-ids", b"me\n").await.unwrap();
        for (name, body) in [("a", "ok"), ("b", "poison"), ("c", "ok")] {
            source.set(&ctx, name, &parse(body.as_bytes())).await.unwrap();
        }

        let registry = Registry::with_builtins();
        registry.register_crypto(
            CryptoBackend::Age,
            "mock",
            MockLoader::new(MockCrypto::new().fail_encrypt_on("poison"), 5),
        );
        let err = source
            .convert(&ctx, &registry, CryptoBackend::Age, StorageBackend::Fs, true)
            .await
            .unwrap_err();
        match err {
            StoreError::Convert { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].name, "b");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // source untouched, partial target left for inspection
        assert_eq!(source.list(&ctx, "").await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(source.get(&ctx, "b").await.unwrap().password(), "poison");
        assert!(dir.path().join("store-age-fs").exists());
    }
}
