//! In-process crypto backend for tests
//!
//! "Encryption" prefixes the plaintext with a fixed tag. Failures can be
//! injected for payloads containing a given needle, which is how batch
//! operations (fsck, convert) are exercised without a real crypto tool.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{Crypto, CryptoLoader, Storage};
use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::marker_present;

pub const NAME: &str = "mock";
pub const ID_FILE: &str = ".mock-ids";

const TAG: &[u8] = b"mock:";

#[derive(Debug, Clone, Default)]
pub struct MockCrypto {
    fail_encrypt: Option<Vec<u8>>,
    fail_decrypt: Option<Vec<u8>>,
}

impl MockCrypto {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail encryption of any plaintext containing `needle`
    pub fn fail_encrypt_on(mut self, needle: impl AsRef<[u8]>) -> Self {
        self.fail_encrypt = Some(needle.as_ref().to_vec());
        self
    }

    /// Fail decryption of any ciphertext containing `needle`
    pub fn fail_decrypt_on(mut self, needle: impl AsRef<[u8]>) -> Self {
        self.fail_decrypt = Some(needle.as_ref().to_vec());
        self
    }
}

fn contains(haystack: &[u8], needle: &Option<Vec<u8>>) -> bool {
    match needle {
        Some(n) if !n.is_empty() => haystack.windows(n.len()).any(|w| w == n.as_slice()),
        _ => false,
    }
}

#[async_trait]
impl Crypto for MockCrypto {
    fn name(&self) -> &str {
        NAME
    }

    fn ext(&self) -> &str {
        "mock"
    }

    fn id_file(&self) -> &str {
        ID_FILE
    }

    async fn encrypt(&self, ctx: &OpContext, plaintext: &[u8], _recipients: &[String]) -> StoreResult<Vec<u8>> {
        ctx.cancellation().check()?;
        if contains(plaintext, &self.fail_encrypt) {
            return Err(StoreError::encrypt("", "injected failure"));
        }
        let mut out = TAG.to_vec();
        out.extend_from_slice(plaintext);
        Ok(out)
    }

    async fn decrypt(&self, ctx: &OpContext, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        ctx.cancellation().check()?;
        if contains(ciphertext, &self.fail_decrypt) {
            return Err(StoreError::decrypt("", "injected failure"));
        }
        ciphertext
            .strip_prefix(TAG)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| StoreError::decrypt("", "not a mock ciphertext"))
    }
}

/// Loader for [`MockCrypto`] with a configurable detection priority
#[derive(Debug, Clone)]
pub struct MockLoader {
    crypto: MockCrypto,
    priority: i32,
}

impl MockLoader {
    pub fn new(crypto: MockCrypto, priority: i32) -> Self {
        Self { crypto, priority }
    }
}

#[async_trait]
impl CryptoLoader for MockLoader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn handles(&self, storage: &dyn Storage) -> StoreResult<()> {
        marker_present(storage, ID_FILE)
    }

    async fn new(&self, _ctx: &OpContext) -> StoreResult<Arc<dyn Crypto>> {
        Ok(Arc::new(self.crypto.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_roundtrip() {
        let ctx = OpContext::new();
        let crypto = MockCrypto::new();
        let ct = crypto.encrypt(&ctx, b"hello", &[]).await.unwrap();
        assert_eq!(ct, b"mock:hello");
        assert_eq!(crypto.decrypt(&ctx, &ct).await.unwrap(), b"hello");
        assert!(crypto.decrypt(&ctx, b"hello").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let ctx = OpContext::new();
        let crypto = MockCrypto::new().fail_encrypt_on("bad").fail_decrypt_on("worse");
        assert!(crypto.encrypt(&ctx, b"a bad value", &[]).await.is_err());
        assert!(crypto.decrypt(&ctx, b"mock:worse").await.is_err());
        assert!(crypto.encrypt(&ctx, b"fine", &[]).await.is_ok());
    }
}
