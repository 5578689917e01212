//! Decrypting and decoding entries

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::secrets::{self, Plain, Secret};
use crate::types::OpContext;

use super::{crypto_error, Leaf};

impl Leaf {
    /// Read and decode a secret
    ///
    /// Fails only if the entry is missing or cannot be decrypted; content
    /// that matches no format comes back as [`Secret::Plain`].
    pub async fn get(&self, ctx: &OpContext, name: &str) -> StoreResult<Secret> {
        let name = Self::entry_name(name)?;
        let content = self.decrypt_entry(ctx, &name).await?;
        Ok(decode(ctx, &content))
    }

    /// Plaintext bytes of an entry
    pub(crate) async fn decrypt_entry(&self, ctx: &OpContext, name: &str) -> StoreResult<Vec<u8>> {
        ctx.cancellation().check()?;
        let file = self.passfile(name);
        let ciphertext = self.storage.get(ctx, &file).await.map_err(|e| match e {
            StoreError::NotFound(_) => {
                debug!(file = %file, "entry not found");
                StoreError::NotFound(name.to_string())
            }
            e => e,
        })?;
        self.decrypt(ctx, name, &ciphertext).await
    }

    pub(crate) async fn decrypt(&self, ctx: &OpContext, name: &str, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        self.crypto
            .decrypt(ctx, ciphertext)
            .await
            .map_err(|e| crypto_error(e, name, false))
    }
}

/// Structured parse or verbatim Plain, depending on the context
pub(super) fn decode(ctx: &OpContext, content: &[u8]) -> Secret {
    if ctx.show_parsing() {
        secrets::parse(content)
    } else {
        Secret::Plain(Plain::new(content))
    }
}
