use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Domain tag mixed into every blob hash, so a blob hash never equals a
/// plain BLAKE3 digest of the same bytes.
const BLOB_DOMAIN: &[u8] = b"revstore-blob-v1:";

/// Content hash of a [`Blob`](crate::Blob).
///
/// Written as 64 lowercase hex digits; that is also the form
/// [`StorageId::parse`](crate::StorageId::parse) accepts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash blob bytes.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(BLOB_DOMAIN);
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// First 8 hex digits, for log lines and op listings.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentHash")
            .field(&format_args!("{}", self.short_hex()))
            .finish()
    }
}

impl FromStr for ContentHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digest = [0u8; 32];
        hex::decode_to_slice(s, &mut digest).map_err(|e| match e {
            hex::FromHexError::InvalidStringLength | hex::FromHexError::OddLength => {
                TypeError::InvalidHex(format!("expected 64 hex digits, got {}", s.len()))
            }
            other => TypeError::InvalidHex(other.to_string()),
        })?;
        Ok(Self(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_domain_separated() {
        assert_eq!(ContentHash::of(b"data"), ContentHash::of(b"data"));
        assert_ne!(ContentHash::of(b"data"), ContentHash::of(b"datb"));
        let plain = blake3::hash(b"data").to_hex().to_string();
        assert_ne!(ContentHash::of(b"data").to_string(), plain);
    }

    #[test]
    fn text_form_parses_back() {
        let hash = ContentHash::of(b"test");
        let text = hash.to_string();
        assert_eq!(text.len(), 64);
        assert!(text.starts_with(&hash.short_hex()));
        assert_eq!(text.parse::<ContentHash>().unwrap(), hash);
    }

    #[test]
    fn rejects_bad_text() {
        assert!(matches!("zz".parse::<ContentHash>(), Err(TypeError::InvalidHex(_))));
        let short = "abcd".parse::<ContentHash>().unwrap_err();
        assert_eq!(
            short,
            TypeError::InvalidHex("expected 64 hex digits, got 4".into())
        );
    }
}
