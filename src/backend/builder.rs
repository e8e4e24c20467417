//! Certificate builder utilities.
//!
//! Functional helpers that turn store metadata into rcgen parameters.

use crate::backend::Cipher;
use crate::error::{PkiError, Result};
use crate::model::{CertPurpose, FileFormat, PurposeSet};
use chrono::{DateTime, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType, SignatureAlgorithm,
};
use time::OffsetDateTime;

/// PEM tag for PKCS#8 private keys.
pub const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

/// PEM tag for X.509 certificates.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Build a distinguished name holding only the entity name as CN.
pub fn subject_name(name: &str) -> Result<DistinguishedName> {
    if name.trim().is_empty() {
        return Err(PkiError::BackendError(
            "Subject cannot be empty".to_string(),
        ));
    }

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name.trim());
    Ok(dn)
}

/// The rcgen signature algorithm for a cipher.
pub fn signature_algorithm(cipher: Cipher) -> &'static SignatureAlgorithm {
    match cipher {
        Cipher::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
        Cipher::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
    }
}

/// Convert a chrono timestamp to the type rcgen expects.
pub fn to_offset_date_time(at: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| PkiError::BackendError(format!("Invalid certificate date {}: {}", at, e)))
}

/// Set the validity period for a certificate.
pub fn set_validity(
    params: &mut CertificateParams,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    if end <= start {
        return Err(PkiError::BackendError(format!(
            "Certificate validity ends ({}) before it starts ({})",
            end, start
        )));
    }

    params.not_before = to_offset_date_time(start)?;
    params.not_after = to_offset_date_time(end)?;
    Ok(())
}

/// Translate purposes into basic constraints, key usages, EKUs and SANs.
///
/// Both CA kinds carry no path length. Intermediates may be nested at any
/// time after their parent was issued.
pub fn apply_purposes(params: &mut CertificateParams, purposes: &PurposeSet, subject: &str) {
    params.is_ca = if purposes.iter().any(CertPurpose::is_ca) {
        IsCa::Ca(BasicConstraints::Unconstrained)
    } else {
        IsCa::NoCa
    };

    let mut key_usages = vec![KeyUsagePurpose::DigitalSignature];
    if purposes.iter().any(CertPurpose::is_ca) {
        key_usages.push(KeyUsagePurpose::KeyCertSign);
        key_usages.push(KeyUsagePurpose::CrlSign);
    }
    params.key_usages = key_usages;

    params.extended_key_usages = purposes
        .iter()
        .filter_map(|purpose| match purpose {
            CertPurpose::WebServer => Some(ExtendedKeyUsagePurpose::ServerAuth),
            CertPurpose::WebClient => Some(ExtendedKeyUsagePurpose::ClientAuth),
            CertPurpose::EmailIdentity => Some(ExtendedKeyUsagePurpose::EmailProtection),
            CertPurpose::ObjectSigning => Some(ExtendedKeyUsagePurpose::CodeSigning),
            CertPurpose::Timestamping => Some(ExtendedKeyUsagePurpose::TimeStamping),
            CertPurpose::RootCa | CertPurpose::IntermediateCa => None,
        })
        .collect();

    let mut sans = Vec::new();
    if purposes.contains(&CertPurpose::WebServer) && !subject.contains(char::is_whitespace) {
        sans.push(SanType::DnsName(subject.to_string()));
    }
    if purposes.contains(&CertPurpose::EmailIdentity) && subject.contains('@') {
        sans.push(SanType::Rfc822Name(subject.to_string()));
    }
    params.subject_alt_names = sans;
}

/// PEM text with `\n` line endings.
fn pem_text(block: &pem::Pem) -> String {
    pem::encode(block).replace("\r\n", "\n")
}

/// Encode DER bytes in the requested file format.
pub fn encode(der: Vec<u8>, tag: &str, format: FileFormat) -> Vec<u8> {
    match format {
        FileFormat::Der => der,
        FileFormat::Pem => pem_text(&pem::Pem::new(tag, der)).into_bytes(),
    }
}

/// Normalize file contents of either format to a PEM string.
///
/// # Example
///
/// ```
/// use cactl::backend::builder::{encode, to_pem, CERTIFICATE_TAG};
/// use cactl::model::FileFormat;
///
/// let der = vec![0x30, 0x03, 0x02, 0x01, 0x01];
/// let from_der = to_pem(&der, CERTIFICATE_TAG, FileFormat::Der).unwrap();
/// let from_pem = to_pem(
///     &encode(der, CERTIFICATE_TAG, FileFormat::Pem),
///     CERTIFICATE_TAG,
///     FileFormat::Pem,
/// )
/// .unwrap();
/// assert_eq!(from_der, from_pem);
/// ```
pub fn to_pem(bytes: &[u8], tag: &str, format: FileFormat) -> Result<String> {
    match format {
        FileFormat::Der => Ok(pem_text(&pem::Pem::new(tag, bytes.to_vec()))),
        FileFormat::Pem => {
            let parsed = pem::parse(bytes)
                .map_err(|e| PkiError::BackendError(format!("Failed to parse PEM: {}", e)))?;

            if parsed.tag() != tag {
                return Err(PkiError::BackendError(format!(
                    "Expected {}, got {}",
                    tag,
                    parsed.tag()
                )));
            }

            Ok(pem_text(&parsed))
        }
    }
}

/// Load an rcgen KeyPair from key file contents.
pub fn keypair_from_bytes(bytes: &[u8], format: FileFormat) -> Result<KeyPair> {
    let key_pem = to_pem(bytes, PRIVATE_KEY_TAG, format)?;

    KeyPair::from_pem(&key_pem)
        .map_err(|e| PkiError::BackendError(format!("Failed to load keypair: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::purposes;
    use chrono::Duration;

    #[test]
    fn test_subject_name() {
        let dn = subject_name("svc.example.com").unwrap();
        assert_eq!(dn.iter().count(), 1);
    }

    #[test]
    fn test_subject_name_empty() {
        assert!(subject_name("   ").is_err());
    }

    #[test]
    fn test_set_validity() {
        let mut params = CertificateParams::default();
        let start = Utc::now();
        set_validity(&mut params, start, start + Duration::days(365)).unwrap();

        let duration = params.not_after - params.not_before;
        assert_eq!(duration.whole_seconds(), 365 * 24 * 60 * 60);
    }

    #[test]
    fn test_set_validity_rejects_inverted_window() {
        let mut params = CertificateParams::default();
        let start = Utc::now();
        assert!(set_validity(&mut params, start, start - Duration::days(1)).is_err());
    }

    #[test]
    fn test_apply_purposes_root() {
        let mut params = CertificateParams::default();
        apply_purposes(&mut params, &purposes(&[CertPurpose::RootCa]), "root");

        assert!(matches!(
            params.is_ca,
            IsCa::Ca(BasicConstraints::Unconstrained)
        ));
        assert!(params.key_usages.contains(&KeyUsagePurpose::KeyCertSign));
        assert!(params.extended_key_usages.is_empty());
        assert!(params.subject_alt_names.is_empty());
    }

    #[test]
    fn test_apply_purposes_intermediate() {
        let mut params = CertificateParams::default();
        apply_purposes(&mut params, &purposes(&[CertPurpose::IntermediateCa]), "int");

        assert!(matches!(
            params.is_ca,
            IsCa::Ca(BasicConstraints::Unconstrained)
        ));
        assert!(params.key_usages.contains(&KeyUsagePurpose::CrlSign));
    }

    #[test]
    fn test_apply_purposes_server() {
        let mut params = CertificateParams::default();
        apply_purposes(
            &mut params,
            &purposes(&[CertPurpose::WebServer, CertPurpose::WebClient]),
            "svc.example.com",
        );

        assert!(matches!(params.is_ca, IsCa::NoCa));
        assert!(!params.key_usages.contains(&KeyUsagePurpose::KeyCertSign));
        assert_eq!(
            params.extended_key_usages,
            vec![
                ExtendedKeyUsagePurpose::ServerAuth,
                ExtendedKeyUsagePurpose::ClientAuth
            ]
        );
        assert_eq!(
            params.subject_alt_names,
            vec![SanType::DnsName("svc.example.com".to_string())]
        );
    }

    #[test]
    fn test_apply_purposes_email() {
        let mut params = CertificateParams::default();
        apply_purposes(
            &mut params,
            &purposes(&[CertPurpose::EmailIdentity]),
            "alice@example.com",
        );

        assert_eq!(
            params.subject_alt_names,
            vec![SanType::Rfc822Name("alice@example.com".to_string())]
        );
    }

    #[test]
    fn test_to_pem_uses_unix_line_endings() {
        let text = to_pem(&[1, 2, 3], CERTIFICATE_TAG, FileFormat::Der).unwrap();
        assert!(text.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(text.ends_with("-----END CERTIFICATE-----\n"));
        assert!(!text.contains('\r'));
    }

    #[test]
    fn test_to_pem_tag_mismatch() {
        let pem_bytes = encode(vec![1, 2, 3], CERTIFICATE_TAG, FileFormat::Pem);
        let result = to_pem(&pem_bytes, PRIVATE_KEY_TAG, FileFormat::Pem);
        assert!(result.is_err());
    }

    #[test]
    fn test_keypair_from_bytes_both_formats() {
        let key_pair = KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let der = key_pair.serialize_der();

        let from_der = keypair_from_bytes(&der, FileFormat::Der).unwrap();
        let pem_bytes = encode(der.clone(), PRIVATE_KEY_TAG, FileFormat::Pem);
        let from_pem = keypair_from_bytes(&pem_bytes, FileFormat::Pem).unwrap();

        assert_eq!(from_der.public_key_raw(), key_pair.public_key_raw());
        assert_eq!(from_pem.public_key_raw(), key_pair.public_key_raw());
    }
}
