//! age crypto backend driving the `age` binary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::backend::command;
use crate::backend::{Crypto, CryptoLoader, Storage};
use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::marker_present;

pub const NAME: &str = "age";
/// Marker file of age stores
pub const ID_FILE: &str = ".age-recipients";
/// Environment variable overriding the identities file
pub const IDENTITIES_ENV: &str = "STRONGBOX_AGE_IDENTITIES";

/// Crypto backend shelling out to `age` / `age-keygen`
#[derive(Debug, Clone)]
pub struct Age {
    binary: String,
    keygen: String,
    identities: PathBuf,
}

impl Age {
    pub fn new(identities: impl Into<PathBuf>) -> Self {
        Self {
            binary: "age".to_string(),
            keygen: "age-keygen".to_string(),
            identities: identities.into(),
        }
    }

    /// Identities from `STRONGBOX_AGE_IDENTITIES`, or the default location
    /// `<config_dir>/strongbox/age/identities`
    pub fn from_env() -> Self {
        let identities = std::env::var_os(IDENTITIES_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_identities);
        Self::new(identities)
    }

    pub fn identities(&self) -> &Path {
        &self.identities
    }
}

fn default_identities() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"))
        .join("strongbox")
        .join("age")
        .join("identities")
}

#[async_trait]
impl Crypto for Age {
    fn name(&self) -> &str {
        NAME
    }

    fn ext(&self) -> &str {
        "age"
    }

    fn id_file(&self) -> &str {
        ID_FILE
    }

    async fn encrypt(&self, ctx: &OpContext, plaintext: &[u8], recipients: &[String]) -> StoreResult<Vec<u8>> {
        if recipients.is_empty() {
            return Err(StoreError::encrypt("", "no usable recipients"));
        }
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--encrypt");
        for recipient in recipients {
            cmd.arg("--recipient").arg(recipient);
        }
        command::run(ctx, cmd, Some(plaintext)).await
    }

    async fn decrypt(&self, ctx: &OpContext, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        if !self.identities.exists() {
            return Err(StoreError::NotFound(format!(
                "age identities at {}",
                self.identities.display()
            )));
        }
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--decrypt").arg("--identity").arg(&self.identities);
        command::run(ctx, cmd, Some(ciphertext)).await
    }

    async fn list_identities(&self, ctx: &OpContext) -> StoreResult<Vec<String>> {
        if !self.identities.exists() {
            return Ok(Vec::new());
        }
        let mut cmd = Command::new(&self.keygen);
        cmd.arg("-y").arg(&self.identities);
        let out = command::run(ctx, cmd, None).await?;
        Ok(String::from_utf8_lossy(&out)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Loader for [`Age`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AgeLoader;

#[async_trait]
impl CryptoLoader for AgeLoader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        10
    }

    fn handles(&self, storage: &dyn Storage) -> StoreResult<()> {
        marker_present(storage, ID_FILE)
    }

    async fn new(&self, _ctx: &OpContext) -> StoreResult<Arc<dyn Crypto>> {
        let age = Age::from_env();
        debug!(identities = %age.identities().display(), "using crypto backend {}", NAME);
        Ok(Arc::new(age))
    }
}
