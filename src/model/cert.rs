//! Certificates, certificate requests, and their purposes.

use crate::model::{generate_id, FileFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// What a certificate may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertPurpose {
    RootCa,
    IntermediateCa,
    WebServer,
    WebClient,
    EmailIdentity,
    ObjectSigning,
    Timestamping,
}

impl CertPurpose {
    /// Whether this purpose makes the certificate a CA certificate.
    pub fn is_ca(&self) -> bool {
        matches!(self, CertPurpose::RootCa | CertPurpose::IntermediateCa)
    }
}

impl fmt::Display for CertPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CertPurpose::RootCa => "ROOT_CA",
            CertPurpose::IntermediateCa => "INTERMEDIATE_CA",
            CertPurpose::WebServer => "WEB_SERVER",
            CertPurpose::WebClient => "WEB_CLIENT",
            CertPurpose::EmailIdentity => "EMAIL_IDENTITY",
            CertPurpose::ObjectSigning => "OBJECT_SIGNING",
            CertPurpose::Timestamping => "TIMESTAMPING",
        };
        write!(f, "{}", name)
    }
}

/// A set of purposes. Ordered so it serializes deterministically.
pub type PurposeSet = BTreeSet<CertPurpose>;

/// Build a [`PurposeSet`] from a slice.
pub fn purposes(items: &[CertPurpose]) -> PurposeSet {
    items.iter().copied().collect()
}

/// An unsigned request for a certificate.
///
/// Consumed once by the signing backend to produce a [`Cert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertRequest {
    pub id: String,

    /// Name of the entity the certificate is issued to.
    pub subject: String,

    /// The subject key the certificate will bind.
    pub key_id: String,

    pub purposes: PurposeSet,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub format: FileFormat,

    /// Location of a CSR file, when one was written.
    pub path: Option<PathBuf>,
}

impl CertRequest {
    /// Create a request with a fresh id and no CSR file.
    pub fn new(
        subject: String,
        key_id: String,
        purposes: PurposeSet,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        format: FileFormat,
    ) -> Self {
        Self {
            id: generate_id(),
            subject,
            key_id,
            purposes,
            start_date,
            end_date,
            format,
            path: None,
        }
    }
}

impl PartialEq for CertRequest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CertRequest {}

/// A signed certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cert {
    pub id: String,
    pub format: FileFormat,
    pub path: PathBuf,

    /// The key this certificate binds. Always owned by the same entity.
    pub key_id: String,

    pub purposes: PurposeSet,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Cert {
    /// Whether this certificate covers every requested purpose.
    ///
    /// # Example
    ///
    /// ```
    /// use cactl::model::cert::{purposes, Cert, CertPurpose};
    /// use cactl::model::FileFormat;
    /// use chrono::{Duration, Utc};
    ///
    /// let now = Utc::now();
    /// let cert = Cert {
    ///     id: "c1".to_string(),
    ///     format: FileFormat::Pem,
    ///     path: "c1.pem".into(),
    ///     key_id: "k1".to_string(),
    ///     purposes: purposes(&[CertPurpose::WebServer, CertPurpose::WebClient]),
    ///     start_date: now,
    ///     end_date: now + Duration::days(1),
    /// };
    /// assert!(cert.satisfies(&purposes(&[CertPurpose::WebServer])));
    /// assert!(!cert.satisfies(&purposes(&[CertPurpose::RootCa])));
    /// ```
    pub fn satisfies(&self, requested: &PurposeSet) -> bool {
        requested.is_subset(&self.purposes)
    }

    /// Whether `at` falls inside the validity window.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at <= self.end_date
    }

    /// Whether this certificate carries a CA purpose.
    pub fn is_ca(&self) -> bool {
        self.purposes.iter().any(CertPurpose::is_ca)
    }
}

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Cert {}
