//! X.509 signing backend built on rcgen.
//!
//! Keys are ECDSA (P-256 or P-384). Every artifact is written under the store
//! directory, in `keys/` and `certs/`, and reported by a path relative to it.

use crate::backend::builder::{
    apply_purposes, encode, keypair_from_bytes, set_validity, signature_algorithm, subject_name,
    CERTIFICATE_TAG, PRIVATE_KEY_TAG,
};
use crate::backend::{Cipher, Issuer, SigningBackend};
use crate::config::CactlConfig;
use crate::error::{PkiError, Result};
use crate::model::{generate_id, Cert, CertRequest, FileFormat, Key};
use rand::RngCore;
use rcgen::{BasicConstraints, Certificate, CertificateParams, IsCa, KeyPair, SerialNumber};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory for private keys, relative to the store.
pub const KEYS_DIR: &str = "keys";

/// Directory for certificates, relative to the store.
pub const CERTS_DIR: &str = "certs";

/// Signs certificates with rcgen and writes them next to the store database.
#[derive(Debug, Clone)]
pub struct RcgenBackend {
    directory: PathBuf,
    key_format: FileFormat,
    cert_format: FileFormat,
}

impl RcgenBackend {
    /// Create a backend writing into `directory`.
    pub fn new(directory: &Path, key_format: FileFormat, cert_format: FileFormat) -> Self {
        Self {
            directory: directory.to_path_buf(),
            key_format,
            cert_format,
        }
    }

    /// Create a backend using the formats from a store configuration.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use cactl::backend::{Cipher, RcgenBackend, SigningBackend};
    /// use cactl::config::CactlConfig;
    /// use std::path::Path;
    ///
    /// # fn example() -> cactl::error::Result<()> {
    /// let backend = RcgenBackend::from_config(Path::new("./CA"), &CactlConfig::default());
    /// let key = backend.generate_key(Cipher::EcdsaP256)?;
    /// assert_eq!(key.length, 256);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(directory: &Path, config: &CactlConfig) -> Self {
        Self::new(directory, config.key_format, config.cert_format)
    }

    fn read_keypair(&self, key: &Key) -> Result<KeyPair> {
        let path = key.path.as_ref().ok_or_else(|| {
            PkiError::BackendError(format!("Key '{}' has no file on disk", key.id))
        })?;

        let bytes = fs::read(self.directory.join(path)).map_err(|e| {
            PkiError::BackendError(format!("Failed to read key '{}': {}", key.id, e))
        })?;

        keypair_from_bytes(&bytes, key.format)
    }

    fn write_artifact(&self, relative: &Path, contents: &[u8], private: bool) -> Result<()> {
        let full = self.directory.join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&full, contents).map_err(|e| {
            PkiError::BackendError(format!("Failed to write {}: {}", full.display(), e))
        })?;

        if private {
            restrict_permissions(&full)?;
        }

        Ok(())
    }

    /// An rcgen certificate standing in for the issuer, used only to sign.
    fn issuer_certificate(&self, issuer: &Issuer<'_>) -> Result<Certificate> {
        let cipher = Cipher::from_key_length(issuer.key.length)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = subject_name(issuer.name)?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.alg = signature_algorithm(cipher);
        params.key_pair = Some(self.read_keypair(issuer.key)?);

        Certificate::from_params(params).map_err(|e| {
            PkiError::BackendError(format!("Failed to load issuer '{}': {}", issuer.name, e))
        })
    }
}

/// A random positive 128-bit serial number.
fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[0] &= 0x7f;
    SerialNumber::from_slice(&bytes)
}

#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

impl SigningBackend for RcgenBackend {
    fn generate_key(&self, cipher: Cipher) -> Result<Key> {
        let key_pair = KeyPair::generate(signature_algorithm(cipher))
            .map_err(|e| PkiError::BackendError(format!("Key generation failed: {}", e)))?;

        let id = generate_id();
        let relative = Path::new(KEYS_DIR).join(format!("{}.{}", id, self.key_format.extension()));
        let contents = encode(key_pair.serialize_der(), PRIVATE_KEY_TAG, self.key_format);
        self.write_artifact(&relative, &contents, true)?;

        info!(key_id = %id, cipher = %cipher, "Generated key");

        Ok(Key::new(id, Some(relative), self.key_format, cipher.bits()))
    }

    fn sign_request(
        &self,
        request: &CertRequest,
        subject_key: &Key,
        issuer: &Issuer<'_>,
    ) -> Result<Cert> {
        if request.key_id != subject_key.id {
            return Err(PkiError::BackendError(format!(
                "Request '{}' is for key '{}', not '{}'",
                request.id, request.key_id, subject_key.id
            )));
        }

        let cipher = Cipher::from_key_length(subject_key.length)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = subject_name(&request.subject)?;
        params.alg = signature_algorithm(cipher);
        params.serial_number = Some(random_serial());
        set_validity(&mut params, request.start_date, request.end_date)?;
        apply_purposes(&mut params, &request.purposes, &request.subject);
        params.key_pair = Some(self.read_keypair(subject_key)?);

        let cert = Certificate::from_params(params).map_err(|e| {
            PkiError::BackendError(format!(
                "Failed to build certificate for '{}': {}",
                request.subject, e
            ))
        })?;

        let self_signed = issuer.key.id == subject_key.id;
        let der = if self_signed {
            cert.serialize_der()
        } else {
            let issuer_cert = self.issuer_certificate(issuer)?;
            cert.serialize_der_with_signer(&issuer_cert)
        }
        .map_err(|e| {
            PkiError::BackendError(format!("Signing '{}' failed: {}", request.subject, e))
        })?;

        let id = generate_id();
        let relative =
            Path::new(CERTS_DIR).join(format!("{}.{}", id, self.cert_format.extension()));
        self.write_artifact(&relative, &encode(der, CERTIFICATE_TAG, self.cert_format), false)?;

        debug!(
            cert_id = %id,
            subject = %request.subject,
            issuer = %issuer.name,
            self_signed,
            "Signed certificate"
        );

        Ok(Cert {
            id,
            format: self.cert_format,
            path: relative,
            key_id: subject_key.id.clone(),
            purposes: request.purposes.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
        })
    }
}
