//! OpenVPN server material and inline client profiles.

use crate::backend::SigningBackend;
use crate::error::Result;
use crate::export::{write_output, Bundle, Exporter};
use crate::model::{purposes, CertPurpose};
use crate::storage::PkiStore;
use std::path::{Path, PathBuf};
use tracing::info;

/// `ca`, `cert` and `key` files for an OpenVPN server.
pub struct OpenVpnServerExporter;

impl Exporter for OpenVpnServerExporter {
    fn name(&self) -> &'static str {
        "openvpn-server"
    }

    fn description(&self) -> &'static str {
        "CA chain, server certificate and key for an OpenVPN server"
    }

    fn export(
        &self,
        store: &mut PkiStore,
        backend: &dyn SigningBackend,
        entity: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>> {
        let wanted = purposes(&[CertPurpose::WebServer]);
        let bundle = Bundle::resolve(store, backend, entity, Some(&wanted))?;

        let files = vec![
            write_output(target, "ca.crt", &bundle.trust_chain(), false)?,
            write_output(target, &format!("{}.crt", entity), &bundle.leaf, false)?,
            write_output(target, &format!("{}.key", entity), &bundle.key, true)?,
        ];

        info!(
            "Exported OpenVPN server '{}' to {}",
            entity,
            target.display()
        );
        Ok(files)
    }
}

/// A single `.ovpn` client profile with the CA chain, certificate and key
/// inlined.
pub struct OpenVpnClientExporter;

impl OpenVpnClientExporter {
    fn profile(entity: &str, bundle: &Bundle) -> String {
        format!(
            "# OpenVPN client profile for {entity}\n\
             client\n\
             dev tun\n\
             proto udp\n\
             # Replace with the address of your VPN server\n\
             remote vpn.example.com 1194\n\
             resolv-retry infinite\n\
             nobind\n\
             persist-key\n\
             persist-tun\n\
             remote-cert-tls server\n\
             verb 3\n\
             \n\
             <ca>\n{ca}</ca>\n\
             <cert>\n{cert}</cert>\n\
             <key>\n{key}</key>\n",
            entity = entity,
            ca = bundle.trust_chain(),
            cert = bundle.leaf,
            key = bundle.key,
        )
    }
}

impl Exporter for OpenVpnClientExporter {
    fn name(&self) -> &'static str {
        "openvpn-client"
    }

    fn description(&self) -> &'static str {
        "Inline .ovpn client profile"
    }

    fn export(
        &self,
        store: &mut PkiStore,
        backend: &dyn SigningBackend,
        entity: &str,
        target: &Path,
    ) -> Result<Vec<PathBuf>> {
        let wanted = purposes(&[CertPurpose::WebClient]);
        let bundle = Bundle::resolve(store, backend, entity, Some(&wanted))?;

        let path = write_output(
            target,
            &format!("{}.ovpn", entity),
            &Self::profile(entity, &bundle),
            true,
        )?;

        info!(
            "Exported OpenVPN client profile for '{}' to {}",
            entity,
            path.display()
        );
        Ok(vec![path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_profile_blocks() {
        let bundle = Bundle {
            trust: vec!["ROOT\n".to_string(), "INT\n".to_string()],
            leaf: "LEAF\n".to_string(),
            key: "KEY\n".to_string(),
        };

        let profile = OpenVpnClientExporter::profile("laptop", &bundle);
        assert!(profile.starts_with("# OpenVPN client profile for laptop\nclient\n"));
        assert!(profile.contains("\n<ca>\nROOT\nINT\n</ca>\n"));
        assert!(profile.contains("\n<cert>\nLEAF\n</cert>\n"));
        assert!(profile.ends_with("<key>\nKEY\n</key>\n"));
    }
}
