//! Signing backend.
//!
//! The store never produces key or certificate bytes itself. It asks a
//! [`SigningBackend`] to generate keys and to sign requests, and records the
//! metadata the backend returns. Backends write their artifacts under the
//! store directory and report paths relative to it.

pub mod builder;
pub mod x509;

pub use x509::RcgenBackend;

use crate::error::{PkiError, Result};
use crate::model::{Cert, CertRequest, Key};
use std::fmt;

/// Key algorithm and strength requested from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    EcdsaP256,
    EcdsaP384,
}

impl Cipher {
    /// The weakest cipher that still meets `bits`.
    ///
    /// # Example
    ///
    /// ```
    /// use cactl::backend::Cipher;
    ///
    /// assert_eq!(Cipher::for_strength(128).unwrap(), Cipher::EcdsaP256);
    /// assert_eq!(Cipher::for_strength(300).unwrap(), Cipher::EcdsaP384);
    /// assert!(Cipher::for_strength(4096).is_err());
    /// ```
    pub fn for_strength(bits: u32) -> Result<Self> {
        match bits {
            0..=256 => Ok(Cipher::EcdsaP256),
            257..=384 => Ok(Cipher::EcdsaP384),
            _ => Err(PkiError::BackendError(format!(
                "No supported cipher provides {} bits of strength",
                bits
            ))),
        }
    }

    /// The cipher that produced a key of `length` bits.
    pub fn from_key_length(length: u32) -> Result<Self> {
        match length {
            256 => Ok(Cipher::EcdsaP256),
            384 => Ok(Cipher::EcdsaP384),
            _ => Err(PkiError::BackendError(format!(
                "Unsupported key length: {}",
                length
            ))),
        }
    }

    /// Key length in bits.
    pub fn bits(&self) -> u32 {
        match self {
            Cipher::EcdsaP256 => 256,
            Cipher::EcdsaP384 => 384,
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cipher::EcdsaP256 => write!(f, "ECDSA P-256"),
            Cipher::EcdsaP384 => write!(f, "ECDSA P-384"),
        }
    }
}

/// The identity signing a request: the signer's key plus its subject name.
///
/// A request is self-signed when `key` is also the subject key.
#[derive(Debug, Clone, Copy)]
pub struct Issuer<'a> {
    pub name: &'a str,
    pub key: &'a Key,
}

/// Capability the store needs from a cryptographic toolkit.
pub trait SigningBackend {
    /// Generate a fresh key and write it to disk.
    fn generate_key(&self, cipher: Cipher) -> Result<Key>;

    /// Sign `request` for `subject_key` with the issuer's key.
    ///
    /// The returned certificate carries the request's purposes and validity
    /// window unchanged, and its `key_id` is the subject key's id.
    fn sign_request(&self, request: &CertRequest, subject_key: &Key, issuer: &Issuer<'_>)
        -> Result<Cert>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_strength_boundaries() {
        assert_eq!(Cipher::for_strength(0).unwrap(), Cipher::EcdsaP256);
        assert_eq!(Cipher::for_strength(256).unwrap(), Cipher::EcdsaP256);
        assert_eq!(Cipher::for_strength(257).unwrap(), Cipher::EcdsaP384);
        assert_eq!(Cipher::for_strength(384).unwrap(), Cipher::EcdsaP384);

        match Cipher::for_strength(385) {
            Err(PkiError::BackendError(_)) => {}
            _ => panic!("Expected BackendError"),
        }
    }

    #[test]
    fn test_from_key_length() {
        assert_eq!(Cipher::from_key_length(256).unwrap(), Cipher::EcdsaP256);
        assert_eq!(Cipher::from_key_length(384).unwrap(), Cipher::EcdsaP384);
        assert!(Cipher::from_key_length(2048).is_err());
    }

    #[test]
    fn test_bits_roundtrip() {
        for cipher in [Cipher::EcdsaP256, Cipher::EcdsaP384] {
            assert_eq!(Cipher::from_key_length(cipher.bits()).unwrap(), cipher);
        }
    }
}
