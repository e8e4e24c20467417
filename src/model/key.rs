//! Private key metadata.

use crate::model::FileFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata for a private key owned by one entity.
///
/// The store never holds key bytes. `path` points at the artifact the
/// signing backend wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    /// Unique identifier.
    pub id: String,

    /// Location of the key file, if it was written to disk.
    pub path: Option<PathBuf>,

    /// Encoding of the key file.
    pub format: FileFormat,

    /// Bit strength of the key.
    pub length: u32,
}

impl Key {
    /// Create key metadata.
    pub fn new(id: String, path: Option<PathBuf>, format: FileFormat, length: u32) -> Self {
        Self {
            id,
            path,
            format,
            length,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_by_id() {
        let a = Key::new("k1".to_string(), None, FileFormat::Pem, 256);
        let b = Key::new(
            "k1".to_string(),
            Some(PathBuf::from("/tmp/other.der")),
            FileFormat::Der,
            384,
        );
        let c = Key::new("k2".to_string(), None, FileFormat::Pem, 256);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_serialization() {
        let key = Key::new(
            "abc".to_string(),
            Some(PathBuf::from("keys/abc.pem")),
            FileFormat::Pem,
            256,
        );

        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["path"], "keys/abc.pem");
        assert_eq!(json["format"], "PEM");
        assert_eq!(json["length"], 256);
    }
}
