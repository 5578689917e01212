//! Per-call operation context

use crate::backend::{CryptoBackend, StorageBackend};
use crate::queue::Queue;

use super::cancellation::CancellationToken;

/// Immutable configuration value passed to every store operation
///
/// Carries the cross-cutting flags of a single invocation. Builder methods
/// return a modified copy; the original is never mutated.
///
/// # Example
///
/// ```
/// use strongbox_core::OpContext;
///
/// let ctx = OpContext::new()
///     .with_commit_message("rotate credentials")
///     .with_force(true);
/// assert!(ctx.force());
/// ```
#[derive(Debug, Clone)]
pub struct OpContext {
    cancel: CancellationToken,
    crypto_backend: Option<CryptoBackend>,
    storage_backend: Option<StorageBackend>,
    show_parsing: bool,
    commit_message: Option<String>,
    no_commit: bool,
    force: bool,
    fsck_parse: bool,
    queue: Option<Queue>,
}

impl Default for OpContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OpContext {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            crypto_backend: None,
            storage_backend: None,
            show_parsing: true,
            commit_message: None,
            no_commit: false,
            force: false,
            fsck_parse: false,
            queue: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Force a specific crypto backend instead of detecting one
    pub fn with_crypto_backend(mut self, backend: CryptoBackend) -> Self {
        self.crypto_backend = Some(backend);
        self
    }

    /// Force a specific storage backend instead of detecting one
    pub fn with_storage_backend(mut self, backend: StorageBackend) -> Self {
        self.storage_backend = Some(backend);
        self
    }

    /// Structured parsing (true) or raw Plain reads (false)
    pub fn with_show_parsing(mut self, show_parsing: bool) -> Self {
        self.show_parsing = show_parsing;
        self
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }

    /// Skip the storage-level commit after writes
    pub fn with_no_commit(mut self, no_commit: bool) -> Self {
        self.no_commit = no_commit;
        self
    }

    /// Allow copy/move to overwrite existing entries
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Re-parse entries during fsck, reporting malformed legacy content
    pub fn with_fsck_parse(mut self, fsck_parse: bool) -> Self {
        self.fsck_parse = fsck_parse;
        self
    }

    /// Queue used for fire-and-forget remote sync after writes
    pub fn with_queue(mut self, queue: Queue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn without_queue(mut self) -> Self {
        self.queue = None;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn crypto_backend(&self) -> Option<CryptoBackend> {
        self.crypto_backend
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.storage_backend
    }

    pub fn show_parsing(&self) -> bool {
        self.show_parsing
    }

    /// Commit message for the next write, with a fallback
    pub fn commit_message_or(&self, fallback: &str) -> String {
        self.commit_message
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn no_commit(&self) -> bool {
        self.no_commit
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn fsck_parse(&self) -> bool {
        self.fsck_parse
    }

    pub fn queue(&self) -> Option<&Queue> {
        self.queue.as_ref()
    }
}
