//! Unstructured secret

use crate::error::SecretError;

/// Opaque bytes; the first line is treated as the password
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plain {
    buf: Vec<u8>,
}

impl Plain {
    pub fn new(buf: impl Into<Vec<u8>>) -> Self {
        Self { buf: buf.into() }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    fn split(&self) -> (&[u8], Option<&[u8]>) {
        match self.buf.iter().position(|b| *b == b'\n') {
            Some(pos) => (&self.buf[..pos], Some(&self.buf[pos + 1..])),
            None => (&self.buf, None),
        }
    }

    pub fn password(&self) -> String {
        String::from_utf8_lossy(self.split().0).into_owned()
    }

    /// Everything after the first line
    pub fn body(&self) -> String {
        self.split()
            .1
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        key.eq_ignore_ascii_case("password").then(|| self.password())
    }

    /// Only the password (first line) can be replaced
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        if !key.eq_ignore_ascii_case("password") {
            return Err(SecretError::UnsupportedKey(key.to_string()));
        }
        let rest = self.split().1.map(<[u8]>::to_vec);
        let mut buf = value.as_bytes().to_vec();
        if let Some(rest) = rest {
            buf.push(b'\n');
            buf.extend_from_slice(&rest);
        }
        self.buf = buf;
        Ok(())
    }
}
