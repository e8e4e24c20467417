//! Exporters render an entity's certificate chain and key into files a
//! specific consumer (a web server, a browser, a VPN) can use directly.

pub mod browser;
pub mod nginx;
pub mod openvpn;

pub use browser::BrowserExporter;
pub use nginx::NginxExporter;
pub use openvpn::{OpenVpnClientExporter, OpenVpnServerExporter};

use crate::backend::builder::{to_pem, CERTIFICATE_TAG, PRIVATE_KEY_TAG};
use crate::backend::x509::restrict_permissions;
use crate::backend::SigningBackend;
use crate::error::{PkiError, Result};
use crate::model::{Cert, PurposeSet};
use crate::storage::PkiStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes ready-to-use configuration for one entity.
pub trait Exporter {
    /// Name used to select the exporter on the command line.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Export `entity` into the `target` directory.
    ///
    /// Certificates missing from the chain are issued first. Returns the
    /// files written.
    fn export(
        &self,
        store: &mut PkiStore,
        backend: &dyn SigningBackend,
        entity: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>>;
}

/// Every exporter this build knows.
pub fn build_exporters() -> Vec<Box<dyn Exporter>> {
    vec![
        Box::new(NginxExporter),
        Box::new(BrowserExporter),
        Box::new(OpenVpnServerExporter),
        Box::new(OpenVpnClientExporter),
    ]
}

/// Select an exporter by name.
///
/// # Example
///
/// ```
/// use cactl::export::find_exporter;
///
/// assert_eq!(find_exporter("nginx").unwrap().name(), "nginx");
/// assert!(find_exporter("apache").is_err());
/// ```
pub fn find_exporter(name: &str) -> Result<Box<dyn Exporter>> {
    build_exporters()
        .into_iter()
        .find(|exporter| exporter.name() == name)
        .ok_or_else(|| PkiError::NotFoundError(format!("Unknown exporter '{}'", name)))
}

/// PEM material of one entity, resolved through the store.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// CA certificates, root first. Empty for a root CA.
    pub trust: Vec<String>,
    pub leaf: String,
    pub key: String,
}

impl Bundle {
    /// Resolve the chain for `entity` and read every certificate and the
    /// leaf's private key as PEM.
    pub fn resolve(
        store: &mut PkiStore,
        backend: &dyn SigningBackend,
        entity: &str,
        purposes: Option<&PurposeSet>,
    ) -> Result<Self> {
        let chain = store.entity_certificate_chain(backend, entity, purposes)?;
        let (leaf_cert, trust_certs) = chain.split_last().ok_or_else(|| {
            PkiError::ChainResolutionError(format!("Empty chain for '{}'", entity))
        })?;

        let store = &*store;
        let trust = trust_certs
            .iter()
            .map(|cert| cert_pem(store, cert))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trust,
            leaf: cert_pem(store, leaf_cert)?,
            key: key_pem(store, entity, leaf_cert)?,
        })
    }

    /// Leaf first, then intermediates, root last.
    pub fn full_chain(&self) -> String {
        let mut pem = self.leaf.clone();
        for ca in self.trust.iter().rev() {
            pem.push_str(ca);
        }
        pem
    }

    /// CA certificates concatenated root first.
    pub fn trust_chain(&self) -> String {
        self.trust.concat()
    }
}

fn cert_pem(store: &PkiStore, cert: &Cert) -> Result<String> {
    let path = store.resolve(&cert.path);
    let bytes = fs::read(&path).map_err(|e| {
        PkiError::NotFoundError(format!(
            "Certificate file {} is unreadable: {}",
            path.display(),
            e
        ))
    })?;
    to_pem(&bytes, CERTIFICATE_TAG, cert.format)
}

fn key_pem(store: &PkiStore, entity: &str, cert: &Cert) -> Result<String> {
    let key = store.entity(entity)?.key(&cert.key_id).ok_or_else(|| {
        PkiError::NotFoundError(format!(
            "Key {} of certificate {} is not owned by '{}'",
            cert.key_id, cert.id, entity
        ))
    })?;
    let relative = key.path.as_ref().ok_or_else(|| {
        PkiError::NotFoundError(format!("Key {} has no file on disk", key.id))
    })?;

    let path = store.resolve(relative);
    let bytes = fs::read(&path).map_err(|e| {
        PkiError::NotFoundError(format!("Key file {} is unreadable: {}", path.display(), e))
    })?;
    to_pem(&bytes, PRIVATE_KEY_TAG, key.format)
}

/// Write one output file, creating `target` if needed.
///
/// Private material is readable by the owner only.
pub fn write_output(target: &Path, filename: &str, contents: &str, private: bool) -> Result<PathBuf> {
    fs::create_dir_all(target)?;

    let path = target.join(filename);
    fs::write(&path, contents)?;
    if private {
        restrict_permissions(&path)?;
    }

    debug!("Wrote {}", path.display());
    Ok(path)
}
