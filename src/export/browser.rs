//! Certificate, key and CA chain as separate files, for importing into a
//! browser or an operating system trust store.

use crate::backend::SigningBackend;
use crate::error::Result;
use crate::export::{write_output, Bundle, Exporter};
use crate::storage::PkiStore;
use std::path::{Path, PathBuf};
use tracing::info;

/// Filename of the exported CA chain.
pub const CA_CHAIN_FILENAME: &str = "ca-chain.crt";

pub struct BrowserExporter;

impl Exporter for BrowserExporter {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn description(&self) -> &'static str {
        "Certificate, private key and CA chain as separate PEM files"
    }

    fn export(
        &self,
        store: &mut PkiStore,
        backend: &dyn SigningBackend,
        entity: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>> {
        let bundle = Bundle::resolve(store, backend, entity, None)?;

        let mut files = vec![
            write_output(target, &format!("{}.crt", entity), &bundle.leaf, false)?,
            write_output(target, &format!("{}.key", entity), &bundle.key, true)?,
        ];
        if !bundle.trust.is_empty() {
            files.push(write_output(
                target,
                CA_CHAIN_FILENAME,
                &bundle.trust_chain(),
                false,
            )?);
        }

        info!("Exported '{}' for browsers to {}", entity, target.display());
        Ok(files)
    }
}
