//! Line-oriented key/value secret, the default format
//!
//! Any line containing a `:` is a `key: value` pair; every other line is
//! appended verbatim to the free-text body. Keys are lower-cased and may
//! repeat.
//!
//! ```text
//! hello: world
//! user: bob
//! Yo
//! Hi
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::SecretError;

/// `key: value` lines followed by a free-text body
///
/// Keys are lower-cased and may repeat; values keep their order per key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Kv {
    data: BTreeMap<String, Vec<String>>,
    body: String,
    from_mime: bool,
}

impl Kv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a secret from existing pairs; keys are lower-cased
    pub fn with_data(data: impl IntoIterator<Item = (String, Vec<String>)>, body: impl Into<String>, from_mime: bool) -> Self {
        let mut kv = Self {
            data: BTreeMap::new(),
            body: body.into(),
            from_mime,
        };
        for (key, values) in data {
            kv.data.entry(key.to_lowercase()).or_default().extend(values);
        }
        kv
    }

    /// Parse; never fails but may find zero pairs
    pub fn parse(input: &[u8]) -> Self {
        let text = String::from_utf8_lossy(input);
        let mut kv = Self::new();
        for line in text.split_inclusive('\n') {
            if !line.contains(':') {
                kv.body.push_str(line);
                continue;
            }
            let line = line.trim_end_matches('\n');
            let (key, value) = line.split_once(':').unwrap_or((line, ""));
            kv.data
                .entry(key.trim().to_lowercase())
                .or_default()
                .push(value.trim().to_string());
        }
        if kv.data.is_empty() {
            debug!("no key/value pairs found");
        }
        kv
    }

    /// Serialize: sorted `key: value` lines, then the body
    pub fn bytes(&self) -> Vec<u8> {
        let lines: Vec<String> = self
            .data
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| format!("{}: {}", key, v)))
            .collect();
        let mut out = lines.join("\n");
        if !self.body.is_empty() && !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.body);
        out.into_bytes()
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// First value of `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.data
            .get(&key.to_lowercase())
            .and_then(|v| v.first())
            .cloned()
    }

    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.data.get(&key.to_lowercase()).map(Vec::as_slice)
    }

    /// Replace the value of `key`; refused if it currently holds several
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        let key = key.to_lowercase();
        if self.data.get(&key).map_or(false, |v| v.len() > 1) {
            return Err(SecretError::MultipleValues(key));
        }
        self.data.insert(key, vec![value.to_string()]);
        Ok(())
    }

    /// Append another value to `key`
    pub fn add(&mut self, key: &str, value: &str) {
        self.data
            .entry(key.to_lowercase())
            .or_default()
            .push(value.to_string());
    }

    /// Remove `key` and all of its values
    pub fn del(&mut self, key: &str) -> bool {
        self.data.remove(&key.to_lowercase()).is_some()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Append to the body
    pub fn write(&mut self, text: &str) {
        self.body.push_str(text);
    }

    pub fn password(&self) -> String {
        self.get("password").unwrap_or_default()
    }

    /// Whether this secret was converted from the legacy MIME format
    pub fn from_mime(&self) -> bool {
        self.from_mime
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let kv = Kv::parse(b"hello: world\nGoSecret: secret\nYo\nHi");
        assert_eq!(kv.keys(), vec!["gosecret", "hello"]);
        assert_eq!(kv.get("hello").as_deref(), Some("world"));
        assert_eq!(kv.get("GOSECRET").as_deref(), Some("secret"));
        assert_eq!(kv.body(), "Yo\nHi");
    }

    #[test]
    fn test_value_keeps_colons() {
        let kv = Kv::parse(b"url: https://example.com:8443/x\n");
        assert_eq!(kv.get("url").as_deref(), Some("https://example.com:8443/x"));
    }

    #[test]
    fn test_roundtrip() {
        for input in [
            "password: hunter2\nuser: bob",
            "a: 1\nb: 2\nsome body\nmore body\n",
            "key: \nother: x",
        ] {
            let kv = Kv::parse(input.as_bytes());
            assert_eq!(String::from_utf8(kv.bytes()).unwrap(), input);
            assert_eq!(Kv::parse(&kv.bytes()), kv);
        }
    }

    #[test]
    fn test_bytes_sorts_keys() {
        let kv = Kv::parse(b"zeta: 1\nalpha: 2\nbody\n");
        assert_eq!(kv.bytes(), b"alpha: 2\nzeta: 1\nbody\n");
    }

    #[test]
    fn test_multiple_values() {
        let mut kv = Kv::parse(b"url: a\nurl: b\n");
        assert_eq!(kv.values("url").unwrap(), ["a", "b"]);
        assert_eq!(kv.get("url").as_deref(), Some("a"));
        assert_eq!(kv.set("url", "c"), Err(SecretError::MultipleValues("url".into())));
        assert_eq!(kv.bytes(), b"url: a\nurl: b");

        assert!(kv.del("URL"));
        kv.set("url", "c").unwrap();
        kv.add("url", "d");
        assert_eq!(kv.values("url").unwrap(), ["c", "d"]);
    }

    #[test]
    fn test_write_appends_body() {
        let mut kv = Kv::new();
        kv.set("user", "bob").unwrap();
        kv.write("notes\n");
        assert_eq!(kv.bytes(), b"user: bob\nnotes\n");
        assert!(!kv.from_mime());
    }
}
