//! Format detection cascade: MIME, YAML, KV, then Plain

use tracing::debug;

use crate::error::ParseError;

use super::{Kv, Mime, Plain, Secret, Yaml};

/// Decode `input` into the most specific secret type
///
/// Never fails: a permanent MIME error or content without any structure
/// yields [`Secret::Plain`] wrapping the input verbatim.
pub fn parse(input: &[u8]) -> Secret {
    match parse_strict(input) {
        Ok(secret) => secret,
        Err(e) => {
            debug!(error = %e, "falling back to plain secret");
            Secret::Plain(Plain::new(input))
        }
    }
}

/// Like [`parse`], but surfaces a permanent parse error instead of
/// falling back
pub fn parse_strict(input: &[u8]) -> Result<Secret, ParseError> {
    match Mime::parse(input) {
        Ok(mime) => {
            debug!("parsed as MIME");
            return Ok(Secret::Mime(mime));
        }
        Err(e) if e.is_permanent() => return Err(e),
        Err(e) => debug!(error = %e, "not MIME"),
    }

    match Yaml::parse(input) {
        Ok(yaml) => {
            debug!("parsed as YAML");
            return Ok(Secret::Yaml(yaml));
        }
        Err(e) => debug!(error = %e, "not YAML"),
    }

    let kv = Kv::parse(input);
    if !kv.is_empty() {
        debug!(keys = kv.keys().len(), "parsed as KV");
        return Ok(Secret::Kv(kv));
    }

    debug!("parsed as plain");
    Ok(Secret::Plain(Plain::new(input)))
}
