//! Recipient list kept in the crypto marker file
//!
//! Changing the list re-encrypts every entry. Exported public keys live
//! under `.public-keys/` so other machines can import them.

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::Leaf;

/// Folder holding exported public keys of all recipients
const PUBLIC_KEYS: &str = ".public-keys";

fn parse_recipients(raw: &[u8]) -> Vec<String> {
    let mut recipients: Vec<String> = String::from_utf8_lossy(raw)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    recipients.sort();
    recipients.dedup();
    recipients
}

impl Leaf {
    /// Recipients listed in the crypto marker file
    pub async fn recipients(&self, ctx: &OpContext) -> StoreResult<Vec<String>> {
        match self.storage.get(ctx, self.crypto.id_file()).await {
            Ok(raw) => Ok(parse_recipients(&raw)),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Write the marker file; returns its storage name
    pub(crate) async fn write_recipients(&self, ctx: &OpContext, recipients: &[String]) -> StoreResult<String> {
        let mut content = recipients.join("\n");
        content.push('\n');
        let file = self.crypto.id_file().to_string();
        self.storage.set(ctx, &file, content.as_bytes()).await?;
        Ok(file)
    }

    pub async fn add_recipient(&self, ctx: &OpContext, id: &str) -> StoreResult<()> {
        let mut recipients = self.recipients(ctx).await?;
        if recipients.iter().any(|r| r == id) {
            debug!(alias = %self.alias, recipient = %id, "recipient already present");
            return Ok(());
        }
        recipients.push(id.to_string());
        self.save_recipients(ctx, &recipients, &format!("Added recipient {}", id)).await
    }

    pub async fn remove_recipient(&self, ctx: &OpContext, id: &str) -> StoreResult<()> {
        let mut recipients = self.recipients(ctx).await?;
        let before = recipients.len();
        recipients.retain(|r| r != id);
        if recipients.len() == before {
            return Err(StoreError::NotFound(format!("recipient {}", id)));
        }
        self.save_recipients(ctx, &recipients, &format!("Removed recipient {}", id)).await
    }

    /// Replace the recipient set and re-encrypt every entry for it
    pub async fn save_recipients(&self, ctx: &OpContext, recipients: &[String], message: &str) -> StoreResult<()> {
        let mut files = vec![self.write_recipients(ctx, recipients).await?];

        for id in recipients {
            match self.crypto.export_public_key(ctx, id).await {
                Ok(key) => {
                    let file = format!("{}/{}", PUBLIC_KEYS, id);
                    self.storage.set(ctx, &file, &key).await?;
                    files.push(file);
                }
                Err(e) if e.is_not_supported() => break,
                Err(StoreError::Cancelled) => return Err(StoreError::Cancelled),
                Err(e) => warn!(recipient = %id, error = %e, "failed to export public key"),
            }
        }

        for name in self.list(ctx, "").await? {
            let plaintext = self.decrypt_entry(ctx, &name).await?;
            files.push(self.encrypt_entry(ctx, &name, &plaintext).await?);
        }

        info!(alias = %self.alias, recipients = recipients.len(), "re-encrypted store");
        self.commit(ctx, files, message).await
    }

    /// Import keys from `.public-keys/` for recipients unknown to the
    /// crypto backend
    pub async fn import_missing_public_keys(&self, ctx: &OpContext) -> StoreResult<()> {
        for id in self.recipients(ctx).await? {
            if self.crypto.has_public_key(ctx, &id).await {
                continue;
            }
            let file = format!("{}/{}", PUBLIC_KEYS, id);
            let key = match self.storage.get(ctx, &file).await {
                Ok(key) => key,
                Err(StoreError::NotFound(_)) => {
                    warn!(recipient = %id, "public key missing and not exported to the store");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.crypto.import_public_key(ctx, &key).await?;
            info!(recipient = %id, "imported public key");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::plain_leaf;
    use super::*;
    use crate::secrets::parse;

    #[test]
    fn test_parse_recipients() {
        let raw = b"0xBEEF\n# comment\n\n  0xABCD  \n0xBEEF\n";
        assert_eq!(parse_recipients(raw), vec!["0xABCD", "0xBEEF"]);
    }

    #[tokio::test]
    async fn test_add_remove_recipient() {
        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();
        leaf.set(&ctx, "db", &parse(b"user: bob")).await.unwrap();
        assert_eq!(leaf.recipients(&ctx).await.unwrap(), vec!["me@example.com"]);

        leaf.add_recipient(&ctx, "you@example.com").await.unwrap();
        leaf.add_recipient(&ctx, "you@example.com").await.unwrap();
        assert_eq!(
            leaf.recipients(&ctx).await.unwrap(),
            vec!["me@example.com", "you@example.com"]
        );
        // entries survive re-encryption
        assert_eq!(leaf.get(&ctx, "db").await.unwrap().get("user").as_deref(), Some("bob"));

        leaf.remove_recipient(&ctx, "me@example.com").await.unwrap();
        assert_eq!(leaf.recipients(&ctx).await.unwrap(), vec!["you@example.com"]);
        assert!(leaf.remove_recipient(&ctx, "me@example.com").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_import_missing_public_keys_noop_for_plain() {
        let (_dir, leaf) = plain_leaf().await;
        let ctx = OpContext::new();
        leaf.import_missing_public_keys(&ctx).await.unwrap();
    }
}
