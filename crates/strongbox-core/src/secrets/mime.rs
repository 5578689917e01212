//! Legacy header-block secret format
//!
//! An identification line, `Key: Value` headers terminated by an empty
//! line, then the body. Only parsed for backwards compatibility; new
//! secrets are written as [`Kv`].

use crate::error::{ParseError, SecretError};

use super::Kv;

/// Identification line of the legacy format
pub const IDENT: &str = "STRONGBOX-SECRET-1.0";

const FORMAT: &str = "MIME";

/// Legacy secret: ident line, header block, blank line, body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mime {
    headers: Vec<(String, String)>,
    body: String,
}

impl Mime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the legacy format
    ///
    /// Input without the identification line is a transient miss. Input that
    /// carries it but has a broken header block is a permanent error.
    pub fn parse(input: &[u8]) -> Result<Self, ParseError> {
        let text = String::from_utf8_lossy(input);
        let mut lines = text.split_inclusive('\n');

        let ident = lines.next().unwrap_or_default();
        if ident.trim_end_matches(['\r', '\n']) != IDENT {
            return Err(ParseError::transient(FORMAT, "missing identification line"));
        }

        let mut mime = Self::new();
        let mut terminated = false;
        for line in lines.by_ref() {
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                terminated = true;
                break;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::permanent(FORMAT, format!("malformed header line {:?}", line)))?;
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(ParseError::permanent(FORMAT, format!("invalid header name {:?}", key)));
            }
            mime.headers.push((key.to_string(), value.trim().to_string()));
        }
        if !terminated {
            return Err(ParseError::permanent(FORMAT, "header block is not terminated"));
        }
        mime.body = lines.collect();
        Ok(mime)
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut out = String::from(IDENT);
        out.push('\n');
        for (key, value) in &self.headers {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.into_bytes()
    }

    /// Header names, lower-cased, sorted and de-duplicated
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.headers.iter().map(|(k, _)| k.to_lowercase()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        if key.is_empty() || key.contains(|c: char| c.is_whitespace() || c == ':') {
            return Err(SecretError::InvalidValue {
                key: key.to_string(),
                reason: "not a valid header name".to_string(),
            });
        }
        if value.contains('\n') {
            return Err(SecretError::InvalidValue {
                key: key.to_string(),
                reason: "header values must be a single line".to_string(),
            });
        }
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some((_, v)) => *v = value.to_string(),
            None => self.headers.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn password(&self) -> String {
        self.get("password").unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Convert into the current default format
    pub fn into_kv(self) -> Kv {
        let pairs = self.headers.into_iter().map(|(k, v)| (k, vec![v]));
        Kv::with_data(pairs, self.body, true)
    }
}
