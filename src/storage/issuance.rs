//! Lazy certificate issuance and chain resolution.
//!
//! Certificates are created on first use. Asking for an entity's
//! certificate reuses a valid, unrevoked one when it covers the requested
//! purposes, and otherwise generates whatever is missing: a key, the
//! signer's own certificate, a request, and finally the signed certificate.

use crate::backend::{Cipher, Issuer, SigningBackend};
use crate::error::{PkiError, Result};
use crate::model::{Cert, CertRequest, PurposeSet};
use crate::storage::state::MAX_CHAIN_DEPTH;
use crate::storage::store::PkiStore;
use chrono::{Duration, Utc};
use tracing::{debug, info};

impl PkiStore {
    /// A certificate for `name` covering `requested` purposes.
    ///
    /// Without explicit purposes the entity's role decides: root CA,
    /// intermediate CA, or the default of its registry. Anything created
    /// along the way is persisted before this returns.
    pub fn get_or_create_cert(
        &mut self,
        backend: &dyn SigningBackend,
        name: &str,
        requested: Option<&PurposeSet>,
    ) -> Result<Cert> {
        self.resolve_cert(backend, name, requested, 0)
    }

    fn resolve_cert(
        &mut self,
        backend: &dyn SigningBackend,
        name: &str,
        requested: Option<&PurposeSet>,
        depth: usize,
    ) -> Result<Cert> {
        if depth >= MAX_CHAIN_DEPTH {
            return Err(PkiError::ChainResolutionError(format!(
                "Issuer chain of '{}' exceeds {} levels",
                name, MAX_CHAIN_DEPTH
            )));
        }

        let entity = self.entity(name)?;
        let wanted = match requested {
            Some(purposes) => purposes.clone(),
            None => self.state.default_purposes(entity),
        };
        let signer = self.state.issuer_of(entity)?;

        if let Some(cert) = self.reusable_cert(name, &signer, &wanted)? {
            debug!("Reusing certificate {} for '{}'", cert.id, name);
            return Ok(cert);
        }

        let min_strength = entity.min_strength;
        let subject_key = match entity.first_key().cloned() {
            Some(key) => key,
            None => {
                let key = backend.generate_key(Cipher::for_strength(min_strength)?)?;
                self.add_key(key.clone(), name)?;
                key
            }
        };

        let issuer_key = if signer == name {
            subject_key.clone()
        } else {
            let signer_cert = self.resolve_cert(backend, &signer, None, depth + 1)?;
            self.entity(&signer)?
                .key(&signer_cert.key_id)
                .cloned()
                .ok_or_else(|| {
                    PkiError::ChainResolutionError(format!(
                        "Key {} of signer '{}' is missing",
                        signer_cert.key_id, signer
                    ))
                })?
        };

        let now = Utc::now();
        let validity_days = self.config().validity_days;
        let end = Duration::try_days(i64::from(validity_days))
            .and_then(|validity| now.checked_add_signed(validity))
            .ok_or_else(|| {
                PkiError::ConfigError(format!(
                    "Validity of {} days is out of range",
                    validity_days
                ))
            })?;
        let request = CertRequest::new(
            name.to_string(),
            subject_key.id.clone(),
            wanted,
            now,
            end,
            self.config().cert_format,
        );
        self.add_cert_request(request.clone(), name)?;

        let issuer = Issuer {
            name: &signer,
            key: &issuer_key,
        };
        let cert = backend.sign_request(&request, &subject_key, &issuer)?;
        self.add_cert(cert.clone(), name)?;

        info!(
            "Issued certificate {} for '{}' signed by '{}'",
            cert.id, name, signer
        );
        Ok(cert)
    }

    /// First certificate of `name` that covers `wanted`, is valid now and
    /// has not been revoked by `signer`.
    fn reusable_cert(&self, name: &str, signer: &str, wanted: &PurposeSet) -> Result<Option<Cert>> {
        let entity = self.entity(name)?;
        let revoked = self.entity(signer)?.revoked_cert_ids();
        let now = Utc::now();

        Ok(entity
            .certs_for_purposes(wanted)
            .find(|c| c.is_valid_at(now) && !revoked.contains(c.id.as_str()))
            .cloned())
    }

    /// The certificate chain for `name`, root first, leaf last.
    ///
    /// The leaf is resolved for `purposes`; every ancestor up to the root
    /// gets its role's CA certificate. Missing pieces are issued on the way.
    pub fn entity_certificate_chain(
        &mut self,
        backend: &dyn SigningBackend,
        name: &str,
        purposes: Option<&PurposeSet>,
    ) -> Result<Vec<Cert>> {
        if self.get_entity(name).is_none() {
            return Err(PkiError::ChainResolutionError(format!(
                "Entity '{}' not found",
                name
            )));
        }

        let leaf = self
            .get_or_create_cert(backend, name, purposes)
            .map_err(|e| unresolved(name, e))?;
        let mut chain = vec![leaf];

        let mut current = name.to_string();
        loop {
            let entity = self.entity(&current)?;
            let Some(parent_name) = entity.parent_id.clone() else {
                break;
            };

            if chain.len() >= MAX_CHAIN_DEPTH {
                return Err(PkiError::ChainResolutionError(format!(
                    "Chain of '{}' exceeds {} certificates",
                    name, MAX_CHAIN_DEPTH
                )));
            }

            let parent = self.get_entity(&parent_name).ok_or_else(|| {
                PkiError::ChainResolutionError(format!(
                    "'{}' references missing parent '{}'",
                    current, parent_name
                ))
            })?;
            if !parent.can_sign {
                return Err(PkiError::ChainResolutionError(format!(
                    "Parent '{}' of '{}' cannot sign",
                    parent_name, current
                )));
            }

            let cert = self
                .get_or_create_cert(backend, &parent_name, None)
                .map_err(|e| unresolved(&parent_name, e))?;
            chain.push(cert);
            current = parent_name;
        }

        chain.reverse();
        debug!("Resolved chain of {} certificate(s) for '{}'", chain.len(), name);
        Ok(chain)
    }

    /// The chain for `name` without its own certificate.
    pub fn trust_chain(
        &mut self,
        backend: &dyn SigningBackend,
        name: &str,
        purposes: Option<&PurposeSet>,
    ) -> Result<Vec<Cert>> {
        let mut chain = self.entity_certificate_chain(backend, name, purposes)?;
        chain.pop();
        Ok(chain)
    }
}

fn unresolved(name: &str, error: PkiError) -> PkiError {
    match error {
        PkiError::ChainResolutionError(_) | PkiError::StorageError(_) | PkiError::JsonError(_) => {
            error
        }
        other => PkiError::ChainResolutionError(format!(
            "No certificate for '{}': {}",
            name, other
        )),
    }
}
