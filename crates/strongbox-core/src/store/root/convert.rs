//! Backend conversion of a whole mount

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::backend::{CryptoBackend, StorageBackend};
use crate::error::{StoreError, StoreResult};
use crate::store::normalize;
use crate::types::OpContext;

use super::RootStore;

impl RootStore {
    /// Convert the store mounted at `alias` to other backends
    ///
    /// Returns the location of the converted store. With `replace` set the
    /// converted store takes over the mount and its backends are recorded
    /// in the configuration.
    pub async fn convert(
        &mut self,
        ctx: &OpContext,
        alias: &str,
        crypto: CryptoBackend,
        storage: StorageBackend,
        replace: bool,
    ) -> StoreResult<PathBuf> {
        let alias = normalize(alias)?;
        if !alias.is_empty() && !self.config.mounts.contains_key(&alias) {
            return Err(StoreError::MountNotFound(alias));
        }

        let leaf = self.leaf(ctx, &alias).await?;
        let converted = leaf.convert(ctx, &self.registry, crypto, storage, replace).await?;
        let path = converted.path().to_path_buf();
        if !replace {
            return Ok(path);
        }

        if alias.is_empty() {
            self.config.crypto = Some(crypto);
            self.config.storage = Some(storage);
        } else if let Some(mount) = self.config.mounts.get_mut(&alias) {
            mount.crypto = Some(crypto);
            mount.storage = Some(storage);
        }
        self.leaves.lock().insert(alias.clone(), Arc::new(converted));
        info!(alias = %alias, crypto = %crypto, storage = %storage, "mount now uses converted store");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::root_with_work;
    use super::*;
    use crate::backend::crypto::{MockCrypto, MockLoader};
    use crate::secrets::parse;

    #[tokio::test]
    async fn test_convert_mount_replace() {
        let (dir, mut root) = root_with_work().await;
        let ctx = OpContext::new();
        root.set(&ctx, "work/db", &parse(b"user: bob")).await.unwrap();
        root.registry()
            .register_crypto(CryptoBackend::Age, "mock", MockLoader::new(MockCrypto::new(), 5));

        let path = root
            .convert(&ctx, "work", CryptoBackend::Age, StorageBackend::Fs, true)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("work"));
        assert_eq!(root.config().mounts["work"].crypto, Some(CryptoBackend::Age));
        assert_eq!(root.crypto(&ctx, "work/db").await.unwrap().name(), "mock");
        assert_eq!(root.get(&ctx, "work/db").await.unwrap().get("user").as_deref(), Some("bob"));
        assert!(dir.path().join("work/db.mock").exists());
    }

    #[tokio::test]
    async fn test_convert_without_replace_keeps_mount() {
        let (dir, mut root) = root_with_work().await;
        let ctx = OpContext::new();
        root.set(&ctx, "db", &parse(b"x")).await.unwrap();

        let path = root
            .convert(&ctx, "", CryptoBackend::Plain, StorageBackend::Fs, false)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("root-plain-fs"));
        assert!(path.join("db.txt").exists());
        assert_eq!(root.path(), dir.path().join("root"));
    }

    #[tokio::test]
    async fn test_convert_failure_keeps_source() {
        let (dir, mut root) = root_with_work().await;
        let ctx = OpContext::new();
        root.set(&ctx, "work/a", &parse(b"fine")).await.unwrap();
        root.set(&ctx, "work/b", &parse(b"poison")).await.unwrap();
        root.registry().register_crypto(
            CryptoBackend::Age,
            "mock",
            MockLoader::new(MockCrypto::new().fail_encrypt_on("poison"), 5),
        );

        let err = root
            .convert(&ctx, "work", CryptoBackend::Age, StorageBackend::Fs, true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Convert { ref failures } if failures.len() == 1));
        assert_eq!(root.config().mounts["work"].crypto, Some(CryptoBackend::Plain));
        assert_eq!(root.get(&ctx, "work/b").await.unwrap().password(), "poison");
        assert!(dir.path().join("work/b.txt").exists());
    }

    #[tokio::test]
    async fn test_convert_unknown_mount() {
        let (_dir, mut root) = root_with_work().await;
        assert!(matches!(
            root.convert(&OpContext::new(), "nope", CryptoBackend::Plain, StorageBackend::Fs, false)
                .await,
            Err(StoreError::MountNotFound(_))
        ));
    }
}
