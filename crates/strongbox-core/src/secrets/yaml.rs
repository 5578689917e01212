//! Password line plus a YAML document
//!
//! ```text
//! hunter2
//! optional free text
//! ---
//! user: bob
//! urls:
//!   - https://example.com
//! ```

use serde_yaml::{Mapping, Value};

use crate::error::{ParseError, SecretError};

const FORMAT: &str = "YAML";
const MARKER: &str = "---";

/// Password line, optional free text and a YAML mapping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Yaml {
    password: String,
    body: String,
    data: Mapping,
}

impl Yaml {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            ..Self::default()
        }
    }

    /// Parse a secret carrying a `---` document marker line
    pub fn parse(input: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(input)
            .map_err(|e| ParseError::transient(FORMAT, e.to_string()))?;

        let mut offset = 0;
        let mut marker = None;
        for line in text.split_inclusive('\n') {
            if line.trim_end() == MARKER {
                marker = Some((offset, offset + line.len()));
                break;
            }
            offset += line.len();
        }
        let (start, end) = marker.ok_or_else(|| ParseError::transient(FORMAT, "no document marker"))?;

        let head = &text[..start];
        let (password, body) = match head.split_once('\n') {
            Some((password, body)) => (password, body),
            None => (head, ""),
        };

        let document = &text[end..];
        let data = if document.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(document) {
                Ok(Value::Mapping(data)) => data,
                Ok(Value::Null) => Mapping::new(),
                Ok(_) => return Err(ParseError::transient(FORMAT, "document is not a mapping")),
                Err(e) => return Err(ParseError::transient(FORMAT, e.to_string())),
            }
        };

        Ok(Self {
            password: password.to_string(),
            body: body.to_string(),
            data,
        })
    }

    pub fn bytes(&self) -> Result<Vec<u8>, SecretError> {
        let mut out = String::new();
        out.push_str(&self.password);
        out.push('\n');
        out.push_str(&self.body);
        if !self.body.is_empty() && !self.body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(MARKER);
        out.push('\n');
        if !self.data.is_empty() {
            let document = serde_yaml::to_string(&self.data).map_err(|e| SecretError::InvalidValue {
                key: "(document)".to_string(),
                reason: e.to_string(),
            })?;
            out.push_str(&document);
        }
        Ok(out.into_bytes())
    }

    /// Top-level document keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if key.eq_ignore_ascii_case("password") {
            return Some(self.password.clone());
        }
        let value = self.data.get(key)?;
        Some(match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        })
    }

    /// Raw document value
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Store a structured document value under `key`
    pub fn insert(&mut self, key: &str, value: Value) {
        self.data.insert(Value::String(key.to_string()), value);
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        if key.eq_ignore_ascii_case("password") {
            self.password = value.to_string();
            return Ok(());
        }
        self.data
            .insert(Value::String(key.to_string()), Value::String(value.to_string()));
        Ok(())
    }

    pub fn del(&mut self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let y = Yaml::parse(b"hunter2\nnotes here\n---\nuser: bob\nport: 22\nurls:\n  - a\n").unwrap();
        assert_eq!(y.password(), "hunter2");
        assert_eq!(y.body(), "notes here\n");
        assert_eq!(y.keys(), vec!["port", "urls", "user"]);
        assert_eq!(y.get("user").as_deref(), Some("bob"));
        assert_eq!(y.get("port").as_deref(), Some("22"));
        assert_eq!(y.get("urls").as_deref(), Some("- a"));
        assert_eq!(y.get("PASSWORD").as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_requires_marker() {
        let err = Yaml::parse(b"user: bob\n").unwrap_err();
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_invalid_document_is_transient() {
        let err = Yaml::parse(b"pw\n---\nfoo: [unclosed\n").unwrap_err();
        assert!(!err.is_permanent());
        let err = Yaml::parse(b"pw\n---\n- a\n- b\n").unwrap_err();
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_roundtrip() {
        let input = "hunter2\n---\nuser: bob\n";
        let y = Yaml::parse(input.as_bytes()).unwrap();
        assert_eq!(String::from_utf8(y.bytes().unwrap()).unwrap(), input);

        let mut y = Yaml::new("pw");
        y.set("user", "alice").unwrap();
        y.set("password", "pw2").unwrap();
        let parsed = Yaml::parse(&y.bytes().unwrap()).unwrap();
        assert_eq!(parsed, y);
        assert!(parsed.clone().del("user"));
    }

    /// `!outer !inner x`, which the YAML emitter refuses
    fn nested_tag() -> Value {
        use serde_yaml::value::{Tag, TaggedValue};
        let inner = Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new("inner"),
            value: Value::String("x".to_string()),
        }));
        Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new("outer"),
            value: inner,
        }))
    }

    #[test]
    fn test_unserializable_document() {
        let mut y = Yaml::new("pw");
        y.insert("broken", nested_tag());
        assert!(matches!(y.bytes(), Err(SecretError::InvalidValue { .. })));
    }
}
