//! Secret types and the parsing cascade
//!
//! Decrypted bytes carry no type tag. [`parse`] tries the known formats
//! from strictest to most lenient and always produces a [`Secret`].
//! Serialization goes through the concrete variant, so writing never
//! needs to re-detect the format.

mod kv;
mod mime;
mod parse;
mod plain;
mod yaml;

pub use kv::Kv;
pub use mime::{Mime, IDENT as MIME_IDENT};
pub use parse::{parse, parse_strict};
pub use plain::Plain;
pub use yaml::Yaml;

use crate::error::SecretError;

/// A decoded secret
#[derive(Debug, Clone, PartialEq)]
pub enum Secret {
    /// No structure
    Plain(Plain),
    /// `key: value` lines plus a body
    Kv(Kv),
    /// Password line plus a YAML document
    Yaml(Yaml),
    /// Legacy header-block format
    Mime(Mime),
}

impl Secret {
    /// Wire form, as written to storage before encryption
    ///
    /// Only a YAML document that cannot be serialized fails.
    pub fn bytes(&self) -> Result<Vec<u8>, SecretError> {
        match self {
            Secret::Plain(s) => Ok(s.bytes()),
            Secret::Kv(s) => Ok(s.bytes()),
            Secret::Yaml(s) => s.bytes(),
            Secret::Mime(s) => Ok(s.bytes()),
        }
    }

    /// First value of `key` (case-insensitive)
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Secret::Plain(s) => s.get(key),
            Secret::Kv(s) => s.get(key),
            Secret::Yaml(s) => s.get(key),
            Secret::Mime(s) => s.get(key),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        match self {
            Secret::Plain(s) => s.set(key, value),
            Secret::Kv(s) => s.set(key, value),
            Secret::Yaml(s) => s.set(key, value),
            Secret::Mime(s) => s.set(key, value),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Secret::Plain(_) => Vec::new(),
            Secret::Kv(s) => s.keys(),
            Secret::Yaml(s) => s.keys(),
            Secret::Mime(s) => s.keys(),
        }
    }

    pub fn password(&self) -> String {
        match self {
            Secret::Plain(s) => s.password(),
            Secret::Kv(s) => s.password(),
            Secret::Yaml(s) => s.password().to_string(),
            Secret::Mime(s) => s.password(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Secret::Plain(s) => s.body(),
            Secret::Kv(s) => s.body().to_string(),
            Secret::Yaml(s) => s.body().to_string(),
            Secret::Mime(s) => s.body().to_string(),
        }
    }

    /// Placeholder safe to print where the secret itself must not appear
    pub fn safe_str(&self) -> &'static str {
        "(elided)"
    }

    /// Short name of the variant
    pub fn format(&self) -> &'static str {
        match self {
            Secret::Plain(_) => "plain",
            Secret::Kv(_) => "kv",
            Secret::Yaml(_) => "yaml",
            Secret::Mime(_) => "mime",
        }
    }

    /// Convert a legacy MIME secret into KV; other variants are unchanged
    pub fn into_kv(self) -> Secret {
        match self {
            Secret::Mime(m) => Secret::Kv(m.into_kv()),
            other => other,
        }
    }
}

impl From<Plain> for Secret {
    fn from(s: Plain) -> Self {
        Secret::Plain(s)
    }
}

impl From<Kv> for Secret {
    fn from(s: Kv) -> Self {
        Secret::Kv(s)
    }
}

impl From<Yaml> for Secret {
    fn from(s: Yaml) -> Self {
        Secret::Yaml(s)
    }
}

impl From<Mime> for Secret {
    fn from(s: Mime) -> Self {
        Secret::Mime(s)
    }
}
