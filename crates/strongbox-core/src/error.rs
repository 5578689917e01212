//! Error types shared by the storage engine

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A single entry that failed during a batch operation (fsck, convert)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    /// Secret name, relative to the store that reported it
    pub name: String,
    /// Human-readable reason
    pub reason: String,
}

impl EntryFailure {
    pub fn new(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// No ciphertext at the resolved path
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Crypto backend rejected or failed on the ciphertext
    #[error("Failed to decrypt {name}: {reason}")]
    Decrypt { name: String, reason: String },

    /// Crypto backend failed to produce ciphertext
    #[error("Failed to encrypt {name}: {reason}")]
    Encrypt { name: String, reason: String },

    /// Operation not implemented by the active backend
    #[error("Operation not supported by {backend}: {operation}")]
    NotSupported {
        backend: String,
        operation: &'static str,
    },

    /// No registered backend claims the path
    #[error("No backend detected for {0}")]
    BackendNotDetected(PathBuf),

    /// Request references an unregistered backend id
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Duplicate mount name or overlapping mount path
    #[error("Mount conflict: {0}")]
    MountConflict(String),

    #[error("Mount not found: {0}")]
    MountNotFound(String),

    #[error("Store not initialized at {0}")]
    NotInitialized(PathBuf),

    /// Copy or move target exists and `force` is not set
    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid secret name: {0}")]
    InvalidName(String),

    #[error("Operation cancelled")]
    Cancelled,

    /// External process (gpg, age, git) failed
    #[error("{program} failed ({status}): {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    /// Some entries could not be converted; the source store was left intact
    #[error("Conversion failed for {} entries", failures.len())]
    Convert { failures: Vec<EntryFailure> },

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StoreError {
    pub fn not_supported(backend: impl Into<String>, operation: &'static str) -> Self {
        Self::NotSupported {
            backend: backend.into(),
            operation,
        }
    }

    pub fn decrypt(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Decrypt {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn encrypt(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Encrypt {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the entry simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, StoreError::NotSupported { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by the secret parsing cascade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input is not in this format; the next parser should be tried
    #[error("not a {format} secret: {reason}")]
    Transient {
        format: &'static str,
        reason: String,
    },

    /// The input claims to be in this format but is broken; stop parsing
    #[error("malformed {format} secret: {reason}")]
    Permanent {
        format: &'static str,
        reason: String,
    },
}

impl ParseError {
    pub fn transient(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Transient {
            format,
            reason: reason.into(),
        }
    }

    pub fn permanent(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Permanent {
            format,
            reason: reason.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, ParseError::Permanent { .. })
    }
}

/// Errors raised when mutating a secret
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("cannot set key {0}: the entry contains multiple values for it")]
    MultipleValues(String),

    #[error("key {0} is not supported by this secret type")]
    UnsupportedKey(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_kind() {
        assert!(ParseError::permanent("MIME", "bad header").is_permanent());
        assert!(!ParseError::transient("YAML", "no marker").is_permanent());
    }

    #[test]
    fn test_convert_error_message() {
        let err = StoreError::Convert {
            failures: vec![
                EntryFailure::new("a", "boom"),
                EntryFailure::new("b", "boom"),
            ],
        };
        assert_eq!(err.to_string(), "Conversion failed for 2 entries");
    }

    #[test]
    fn test_not_supported() {
        let err = StoreError::not_supported("fs", "revisions");
        assert!(err.is_not_supported());
        assert_eq!(err.to_string(), "Operation not supported by fs: revisions");
    }
}
