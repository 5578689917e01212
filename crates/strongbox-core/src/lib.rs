//! Strongbox Core
//!
//! Storage engine of a hierarchical, multi-backend encrypted secret store.
//! Command-line front ends, prompts and clipboard handling live elsewhere
//! and only call into the operations exposed here.
//!
//! ## Layout
//!
//! - `backend`: crypto (`gpgcli`, `age`, `plain`) and storage (`fs`,
//!   `gitfs`) backends behind a priority-ordered detection registry
//! - `secrets`: the Plain / KV / YAML / MIME secret formats and the
//!   parsing cascade that picks one
//! - `store`: leaf stores (one per mount) and the root store that resolves
//!   names across mounts
//! - `tree`: namespace tree used for listings
//!
//! ```rust,ignore
//! use strongbox_core::{config::ConfigFile, secrets, OpContext, RootStore};
//!
//! let config = ConfigFile::user().load()?;
//! let store = RootStore::new(config);
//! let ctx = OpContext::new();
//!
//! store.set(&ctx, "work/db", &secrets::parse(b"hunter2\nuser: bob")).await?;
//! let secret = store.get(&ctx, "work/db").await?;
//! assert_eq!(secret.get("user").as_deref(), Some("bob"));
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod queue;
pub mod secrets;
pub mod store;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use types::{CancellationToken, OpContext};

pub use backend::{
    Crypto, CryptoBackend, CryptoLoader, Registry, Revision, Storage, StorageBackend,
    StorageLoader,
};

pub use error::{EntryFailure, ParseError, SecretError, StoreError, StoreResult};

pub use config::{Config, ConfigError, ConfigFile, ConfigResult, MountConfig};

pub use secrets::Secret;

pub use store::{FsckReport, Leaf, RootStore};

pub use queue::Queue;
