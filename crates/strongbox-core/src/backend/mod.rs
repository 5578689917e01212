//! Pluggable crypto and storage backends
//!
//! This module provides:
//! - `Crypto` and `Storage` traits implemented by every backend
//! - Loader traits used by the registry to construct or detect a backend
//! - A process-wide `Registry` populated with the built-in backends
//! - Built-ins: `gpgcli`, `age`, `plain` crypto; `fs`, `gitfs` storage

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

mod command;
mod traits;
mod registry;
pub mod crypto;
pub mod storage;

pub use traits::{Crypto, CryptoLoader, Storage, StorageLoader};
pub use registry::{
    detect_crypto, detect_storage, init_storage, new_crypto, new_storage, register_crypto,
    register_storage, BackendDescriptor, Registry,
};

/// Identifier of a crypto backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoBackend {
    /// GnuPG via the `gpg` binary
    GpgCli,
    /// age via the `age` binary
    Age,
    /// No encryption at all
    Plain,
}

impl CryptoBackend {
    pub fn name(&self) -> &'static str {
        match self {
            CryptoBackend::GpgCli => "gpgcli",
            CryptoBackend::Age => "age",
            CryptoBackend::Plain => "plain",
        }
    }
}

impl fmt::Display for CryptoBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CryptoBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gpgcli" | "gpg" => Ok(CryptoBackend::GpgCli),
            "age" => Ok(CryptoBackend::Age),
            "plain" => Ok(CryptoBackend::Plain),
            _ => Err(StoreError::UnknownBackend(s.to_string())),
        }
    }
}

/// Identifier of a storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Plain directory tree
    Fs,
    /// Directory tree under git version control
    GitFs,
}

impl StorageBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Fs => "fs",
            StorageBackend::GitFs => "gitfs",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StorageBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fs" => Ok(StorageBackend::Fs),
            "gitfs" | "git" => Ok(StorageBackend::GitFs),
            _ => Err(StoreError::UnknownBackend(s.to_string())),
        }
    }
}

/// A historical version of a stored entry
///
/// The hash is opaque: it is minted and interpreted only by the storage
/// backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    pub subject: String,
    pub body: String,
}
