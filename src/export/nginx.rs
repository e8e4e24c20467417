//! nginx `ssl_certificate` / `ssl_certificate_key` pair.

use crate::backend::SigningBackend;
use crate::error::Result;
use crate::export::{write_output, Bundle, Exporter};
use crate::storage::PkiStore;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct NginxExporter;

impl Exporter for NginxExporter {
    fn name(&self) -> &'static str {
        "nginx"
    }

    fn description(&self) -> &'static str {
        "Full chain and private key for ssl_certificate / ssl_certificate_key"
    }

    fn export(
        &self,
        store: &mut PkiStore,
        backend: &dyn SigningBackend,
        entity: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>> {
        let bundle = Bundle::resolve(store, backend, entity, None)?;

        let files = vec![
            write_output(
                target,
                &format!("{}.fullchain.pem", entity),
                &bundle.full_chain(),
                false,
            )?,
            write_output(target, &format!("{}.key", entity), &bundle.key, true)?,
        ];

        info!("Exported '{}' for nginx to {}", entity, target.display());
        Ok(files)
    }
}
