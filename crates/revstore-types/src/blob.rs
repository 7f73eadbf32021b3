use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Immutable, content-addressed byte buffer.
///
/// The hash is computed once at construction. Cloning is cheap (the bytes
/// are reference counted), and equality is decided by hash alone.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct Blob {
    data: Bytes,
    hash: ContentHash,
}

impl Blob {
    /// Create a blob from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let hash = ContentHash::of(&data);
        Self { data, hash }
    }

    /// The content hash of this blob.
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// The raw bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Content as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Size of the content in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Blob {}

impl std::hash::Hash for Blob {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&str> for Blob {
    fn from(s: &str) -> Self {
        Self::new(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Blob> for Vec<u8> {
    fn from(blob: Blob) -> Self {
        blob.data.to_vec()
    }
}

impl From<&Blob> for ContentHash {
    fn from(blob: &Blob) -> Self {
        blob.hash
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("hash", &self.hash)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_content() {
        let a = Blob::from("muffin");
        let b = Blob::new(b"muffin".to_vec());
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a, Blob::from("scone"));
    }

    #[test]
    fn as_str_for_text_content() {
        assert_eq!(Blob::from("x").as_str(), Some("x"));
        assert_eq!(Blob::new(vec![0xff, 0xfe]).as_str(), None);
    }

    #[test]
    fn hash_matches_hasher() {
        let blob = Blob::from("hello");
        assert_eq!(ContentHash::of(b"hello"), blob.hash());
        assert_eq!(ContentHash::from(&blob), blob.hash());
    }

    #[test]
    fn bincode_recomputes_hash() {
        let blob = Blob::from("payload");
        let bytes = bincode::serialize(&blob).unwrap();
        let decoded: Blob = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, blob);
        assert_eq!(decoded.len(), 7);
    }

    #[test]
    fn empty_blob() {
        let blob = Blob::new(Vec::new());
        assert!(blob.is_empty());
        assert_eq!(blob.as_str(), Some(""));
    }
}
