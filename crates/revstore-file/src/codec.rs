//! On-disk encoding of revision files.
//!
//! One file per revision, named by the zero-padded lowercase hex of its
//! revision number:
//!
//! ```text
//! <storage_root>/<file_id>/0000002a.blob
//! ```
//!
//! File content:
//!
//! ```text
//! [4 bytes: magic "RVS1"]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized FileChange)]
//! ```

use revstore_delta::FileChange;

use crate::error::{FileError, Result};

/// Extension of committed revision files.
pub const REVISION_EXTENSION: &str = "blob";

/// Suffix for revision files that are still being written.
pub const TEMP_SUFFIX: &str = ".tmp";

const MAGIC: &[u8; 4] = b"RVS1";

/// Header size: 4 bytes magic + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// File name for revision `rev_num`.
pub fn revision_file_name(rev_num: u64) -> String {
    format!("{rev_num:08x}.{REVISION_EXTENSION}")
}

/// Parse a revision number back out of a file name.
///
/// Only lowercase hex stems with the revision extension are accepted; any
/// other name (including in-flight `.tmp` files) yields `None`.
pub fn parse_revision_file_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(REVISION_EXTENSION)?.strip_suffix('.')?;
    if stem.is_empty()
        || stem.len() > 16
        || !stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return None;
    }
    u64::from_str_radix(stem, 16).ok()
}

/// Encode a change as revision file content.
pub fn encode_change(change: &FileChange) -> Result<Vec<u8>> {
    let payload =
        bincode::serialize(change).map_err(|e| FileError::Serialization(e.to_string()))?;
    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode revision file content.
///
/// `origin` names the file in error messages. Any framing, checksum, or
/// payload problem is [`FileError::BadData`].
pub fn decode_change(bytes: &[u8], origin: &str) -> Result<FileChange> {
    if bytes.len() < HEADER_SIZE {
        return Err(FileError::BadData(format!(
            "{origin}: truncated header ({} bytes)",
            bytes.len()
        )));
    }
    let (header, payload) = bytes.split_at(HEADER_SIZE);
    if &header[..4] != MAGIC {
        return Err(FileError::BadData(format!("{origin}: unrecognized format")));
    }
    let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(FileError::BadData(format!(
            "{origin}: CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
        )));
    }
    bincode::deserialize(payload).map_err(|e| FileError::BadData(format!("{origin}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use revstore_delta::{FileDelta, FileOp};
    use revstore_types::{Blob, StoragePath};

    fn change(rev_num: u64) -> FileChange {
        FileChange::new(
            rev_num,
            FileDelta::new(vec![FileOp::write_path(
                StoragePath::parse("/a").unwrap(),
                Blob::from("payload"),
            )]),
        )
    }

    #[test]
    fn file_names() {
        assert_eq!(revision_file_name(0), "00000000.blob");
        assert_eq!(revision_file_name(42), "0000002a.blob");
        assert_eq!(parse_revision_file_name("0000002a.blob"), Some(42));
        assert_eq!(parse_revision_file_name("2a.blob"), Some(42));
        assert_eq!(parse_revision_file_name("0000002A.blob"), None);
        assert_eq!(parse_revision_file_name("0000002a.blob.tmp"), None);
        assert_eq!(parse_revision_file_name("0000002a.json"), None);
        assert_eq!(parse_revision_file_name(".blob"), None);
        assert_eq!(parse_revision_file_name("notes.txt"), None);
    }

    #[test]
    fn encode_decode() {
        let original = change(3);
        let bytes = encode_change(&original).unwrap();
        assert_eq!(decode_change(&bytes, "test").unwrap(), original);
    }

    #[test]
    fn crc_detects_corruption() {
        let mut bytes = encode_change(&change(1)).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            decode_change(&bytes, "test"),
            Err(FileError::BadData(msg)) if msg.contains("CRC")
        ));
    }

    #[test]
    fn rejects_foreign_and_truncated_content() {
        assert!(matches!(
            decode_change(b"{\"json\": true}", "test"),
            Err(FileError::BadData(_))
        ));
        assert!(matches!(decode_change(b"RV", "test"), Err(FileError::BadData(_))));
    }
}
