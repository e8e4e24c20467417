//! Domain types for the PKI metadata store.
//!
//! These are plain data records. Keys, certificates, requests and
//! revocations are appended to an [`Entity`] and never mutated in place.
//! The store is the only place that decides when they are created.

pub mod cert;
pub mod entity;
pub mod key;
pub mod revocation;

pub use cert::{purposes, Cert, CertPurpose, CertRequest, PurposeSet};
pub use entity::{Entity, EntityKind};
pub use key::Key;
pub use revocation::{Revocation, RevocationReason};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes in a generated identifier.
const ID_BYTES: usize = 16;

/// Encoding of a key, certificate or request file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    Pem,
    Der,
}

impl FileFormat {
    /// File extension used for artifacts written in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Pem => "pem",
            FileFormat::Der => "der",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Pem => write!(f, "PEM"),
            FileFormat::Der => write!(f, "DER"),
        }
    }
}

/// Generate a fresh random identifier (32 hex characters).
///
/// # Example
///
/// ```
/// use cactl::model::generate_id;
///
/// let id = generate_id();
/// assert_eq!(id.len(), 32);
/// assert_ne!(id, generate_id());
/// ```
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
