//! No-op crypto backend

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreResult;
use crate::types::OpContext;

use crate::backend::{Crypto, CryptoLoader, Storage};
use super::marker_present;

pub const NAME: &str = "plain";
/// Marker file of plain stores
pub const ID_FILE: &str = ".plain-ids";

/// Crypto backend that stores plaintext
///
/// Only meant for tests and throwaway stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl Plain {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Crypto for Plain {
    fn name(&self) -> &str {
        NAME
    }

    fn ext(&self) -> &str {
        "txt"
    }

    fn id_file(&self) -> &str {
        ID_FILE
    }

    async fn encrypt(&self, ctx: &OpContext, plaintext: &[u8], _recipients: &[String]) -> StoreResult<Vec<u8>> {
        ctx.cancellation().check()?;
        Ok(plaintext.to_vec())
    }

    async fn decrypt(&self, ctx: &OpContext, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        ctx.cancellation().check()?;
        Ok(ciphertext.to_vec())
    }
}

/// Loader for [`Plain`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLoader;

#[async_trait]
impl CryptoLoader for PlainLoader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        1000
    }

    fn handles(&self, storage: &dyn Storage) -> StoreResult<()> {
        marker_present(storage, ID_FILE)
    }

    async fn new(&self, _ctx: &OpContext) -> StoreResult<Arc<dyn Crypto>> {
        debug!("using crypto backend {}", NAME);
        Ok(Arc::new(Plain::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_is_identity() {
        let ctx = OpContext::new();
        let crypto = Plain::new();
        let ciphertext = crypto.encrypt(&ctx, b"secret", &[]).await.unwrap();
        assert_eq!(ciphertext, b"secret");
        assert_eq!(crypto.decrypt(&ctx, &ciphertext).await.unwrap(), b"secret");
        assert_eq!(crypto.ext(), "txt");
    }

    #[tokio::test]
    async fn test_plain_respects_cancellation() {
        let ctx = OpContext::new();
        ctx.cancellation().cancel();
        assert!(Plain::new().decrypt(&ctx, b"x").await.is_err());
    }
}
