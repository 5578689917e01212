//! GnuPG crypto backend driving the `gpg` binary

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::backend::command;
use crate::backend::{Crypto, CryptoLoader, Storage};
use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::marker_present;

pub const NAME: &str = "gpgcli";
/// Marker file of gpg stores
pub const ID_FILE: &str = ".gpg-id";
/// Environment variable overriding the gpg binary
pub const BINARY_ENV: &str = "STRONGBOX_GPG_BINARY";

/// Crypto backend shelling out to `gpg`
#[derive(Debug, Clone)]
pub struct Gpg {
    binary: String,
    args: Vec<String>,
}

impl Gpg {
    /// Use the given gpg binary
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            args: vec![
                "--quiet".to_string(),
                "--yes".to_string(),
                "--compress-algo=none".to_string(),
                "--no-encrypt-to".to_string(),
                "--no-auto-check-trustdb".to_string(),
            ],
        }
    }

    /// Binary from `STRONGBOX_GPG_BINARY`, falling back to `gpg`
    pub fn from_env() -> Self {
        let binary = std::env::var(BINARY_ENV)
            .ok()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "gpg".to_string());
        Self::new(binary)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--batch").arg("--no-tty").args(&self.args);
        cmd
    }
}

/// Extract fingerprints from `--with-colons` output
fn parse_fingerprints(listing: &str) -> Vec<String> {
    let mut fingerprints = Vec::new();
    let mut want_fpr = false;
    for line in listing.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        match fields.first() {
            Some(&"sec") | Some(&"pub") => want_fpr = true,
            Some(&"fpr") if want_fpr => {
                if let Some(fpr) = fields.get(9).filter(|f| !f.is_empty()) {
                    fingerprints.push(format!("0x{}", fpr));
                }
                // only the primary key's fingerprint, not the subkeys'
                want_fpr = false;
            }
            _ => {}
        }
    }
    fingerprints
}

#[async_trait]
impl Crypto for Gpg {
    fn name(&self) -> &str {
        NAME
    }

    fn ext(&self) -> &str {
        "gpg"
    }

    fn id_file(&self) -> &str {
        ID_FILE
    }

    async fn encrypt(&self, ctx: &OpContext, plaintext: &[u8], recipients: &[String]) -> StoreResult<Vec<u8>> {
        if recipients.is_empty() {
            return Err(StoreError::encrypt("", "no usable recipients"));
        }
        let mut cmd = self.command();
        cmd.arg("--trust-model=always").arg("--encrypt");
        for recipient in recipients {
            cmd.arg("--recipient").arg(recipient);
        }
        cmd.arg("--output").arg("-");
        command::run(ctx, cmd, Some(plaintext)).await
    }

    async fn decrypt(&self, ctx: &OpContext, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        let mut cmd = self.command();
        cmd.arg("--decrypt").arg("--output").arg("-");
        command::run(ctx, cmd, Some(ciphertext)).await
    }

    async fn list_identities(&self, ctx: &OpContext) -> StoreResult<Vec<String>> {
        let mut cmd = self.command();
        cmd.arg("--with-colons").arg("--list-secret-keys");
        let out = command::run(ctx, cmd, None).await?;
        Ok(parse_fingerprints(&String::from_utf8_lossy(&out)))
    }

    async fn has_public_key(&self, ctx: &OpContext, recipient: &str) -> bool {
        let mut cmd = self.command();
        cmd.arg("--with-colons").arg("--list-keys").arg(recipient);
        command::run(ctx, cmd, None).await.is_ok()
    }

    async fn import_public_key(&self, ctx: &OpContext, key: &[u8]) -> StoreResult<()> {
        let mut cmd = self.command();
        cmd.arg("--import");
        command::run(ctx, cmd, Some(key)).await.map(|_| ())
    }

    async fn export_public_key(&self, ctx: &OpContext, recipient: &str) -> StoreResult<Vec<u8>> {
        let mut cmd = self.command();
        cmd.arg("--armor").arg("--export").arg(recipient);
        let out = command::run(ctx, cmd, None).await?;
        if out.is_empty() {
            return Err(StoreError::NotFound(format!("public key {}", recipient)));
        }
        Ok(out)
    }
}

/// Loader for [`Gpg`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GpgLoader;

#[async_trait]
impl CryptoLoader for GpgLoader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        1
    }

    fn handles(&self, storage: &dyn Storage) -> StoreResult<()> {
        marker_present(storage, ID_FILE)
    }

    async fn new(&self, _ctx: &OpContext) -> StoreResult<Arc<dyn Crypto>> {
        let gpg = Gpg::from_env();
        debug!(binary = %gpg.binary(), "using crypto backend {}", NAME);
        Ok(Arc::new(gpg))
    }
}
