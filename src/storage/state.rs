//! In-memory store state and the invariants every mutation must keep.
//!
//! The entity map is the source of truth. Registries are ordered indices
//! by category and may only name entities present in the map.

use crate::error::{PkiError, Result};
use crate::model::{Cert, CertRequest, Entity, EntityKind, Key, PurposeSet, Revocation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Longest parent chain the store accepts, root included.
pub const MAX_CHAIN_DEPTH: usize = 16;

/// Ordered entity names, one list per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registries {
    pub root_cas: Vec<String>,
    pub intermediate_cas: Vec<String>,
    pub servers: Vec<String>,
    pub clients: Vec<String>,
    pub emails: Vec<String>,
}

impl Registries {
    /// Names registered under `kind`, in creation order.
    pub fn list(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::RootCa => &self.root_cas,
            EntityKind::IntermediateCa => &self.intermediate_cas,
            EntityKind::Server => &self.servers,
            EntityKind::Client => &self.clients,
            EntityKind::Email => &self.emails,
        }
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut Vec<String> {
        match kind {
            EntityKind::RootCa => &mut self.root_cas,
            EntityKind::IntermediateCa => &mut self.intermediate_cas,
            EntityKind::Server => &mut self.servers,
            EntityKind::Client => &mut self.clients,
            EntityKind::Email => &mut self.emails,
        }
    }

    /// The registry holding `name`.
    pub fn kind_of(&self, name: &str) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| self.list(*kind).iter().any(|n| n == name))
    }

    /// Every registered name, registries in order.
    pub fn all(&self) -> impl Iterator<Item = &String> + '_ {
        EntityKind::ALL
            .into_iter()
            .flat_map(move |kind| self.list(kind).iter())
    }
}

/// Registries plus the entity map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub registries: Registries,
    pub entities: BTreeMap<String, Entity>,
}

impl StoreState {
    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| PkiError::NotFoundError(format!("Entity '{}' not found", name)))
    }

    fn entity_mut(&mut self, name: &str) -> Result<&mut Entity> {
        self.entities
            .get_mut(name)
            .ok_or_else(|| PkiError::NotFoundError(format!("Entity '{}' not found", name)))
    }

    /// First registered root CA.
    pub fn default_signing_ca(&self) -> Result<&Entity> {
        let name = self
            .registries
            .root_cas
            .first()
            .ok_or(PkiError::NoDefaultCaError)?;
        self.entity(name)
    }

    /// Name of the entity that signs `entity`'s certificates.
    ///
    /// A root signs itself. Everything else is signed by its parent, or by
    /// the default signing CA when it has none.
    pub fn issuer_of(&self, entity: &Entity) -> Result<String> {
        if entity.is_root() {
            return Ok(entity.name.clone());
        }

        match &entity.parent_id {
            Some(parent_name) => {
                let parent = self.entities.get(parent_name).ok_or_else(|| {
                    PkiError::ChainResolutionError(format!(
                        "'{}' references missing parent '{}'",
                        entity.name, parent_name
                    ))
                })?;
                if !parent.can_sign {
                    return Err(PkiError::ChainResolutionError(format!(
                        "Parent '{}' of '{}' cannot sign",
                        parent_name, entity.name
                    )));
                }
                Ok(parent.name.clone())
            }
            None => Ok(self.default_signing_ca()?.name.clone()),
        }
    }

    /// Purposes issued to `entity` when none are requested.
    pub fn default_purposes(&self, entity: &Entity) -> PurposeSet {
        if entity.can_sign {
            return if entity.parent_id.is_none() {
                EntityKind::RootCa.default_purposes()
            } else {
                EntityKind::IntermediateCa.default_purposes()
            };
        }

        self.registries
            .kind_of(&entity.name)
            .unwrap_or(EntityKind::Server)
            .default_purposes()
    }

    /// Insert a new entity, then append it to the `kind` registry.
    pub fn register(&mut self, kind: EntityKind, entity: Entity) -> Result<()> {
        self.check_registration(kind, &entity)?;

        let name = entity.name.clone();
        self.entities.insert(name.clone(), entity);
        self.registries.list_mut(kind).push(name);
        Ok(())
    }

    fn check_registration(&self, kind: EntityKind, entity: &Entity) -> Result<()> {
        if let Some(problem) = name_violation(&entity.name) {
            return Err(PkiError::InvalidEntityError(problem));
        }

        if self.entities.contains_key(&entity.name) || self.registries.kind_of(&entity.name).is_some()
        {
            return Err(PkiError::DuplicateEntityError(entity.name.clone()));
        }

        if let Some(problem) = kind_violation(kind, entity) {
            return Err(PkiError::InvalidEntityError(problem));
        }

        if let Some(parent_name) = &entity.parent_id {
            let parent = self.entity(parent_name)?;
            if !parent.can_sign {
                return Err(PkiError::InvalidEntityError(format!(
                    "Parent '{}' of '{}' cannot sign",
                    parent_name, entity.name
                )));
            }
        }

        if let Some(cert) = entity
            .certs
            .iter()
            .find(|c| entity.key(&c.key_id).is_none())
        {
            return Err(PkiError::InvalidEntityError(format!(
                "Certificate '{}' references key '{}' not owned by '{}'",
                cert.id, cert.key_id, entity.name
            )));
        }

        Ok(())
    }

    pub fn add_key(&mut self, key: Key, owner: &str) -> Result<()> {
        let entity = self.entity_mut(owner)?;
        if entity.key(&key.id).is_some() {
            return Err(PkiError::InvalidEntityError(format!(
                "Key '{}' already belongs to '{}'",
                key.id, owner
            )));
        }

        entity.keys.push(key);
        Ok(())
    }

    pub fn add_cert(&mut self, cert: Cert, owner: &str) -> Result<()> {
        let entity = self.entity_mut(owner)?;
        if entity.key(&cert.key_id).is_none() {
            return Err(PkiError::NotFoundError(format!(
                "Key '{}' for certificate '{}' is not owned by '{}'",
                cert.key_id, cert.id, owner
            )));
        }
        if entity.cert(&cert.id).is_some() {
            return Err(PkiError::InvalidEntityError(format!(
                "Certificate '{}' already belongs to '{}'",
                cert.id, owner
            )));
        }

        entity.certs.push(cert);
        Ok(())
    }

    pub fn add_cert_request(&mut self, request: CertRequest, owner: &str) -> Result<()> {
        let entity = self.entity_mut(owner)?;
        if entity.key(&request.key_id).is_none() {
            return Err(PkiError::NotFoundError(format!(
                "Key '{}' for request '{}' is not owned by '{}'",
                request.key_id, request.id, owner
            )));
        }

        entity.cert_requests.push(request);
        Ok(())
    }

    /// Record a revocation on the issuing CA.
    ///
    /// The certificate must belong to an entity `issuer` signs for. Only a
    /// root signs, and so revokes, its own certificates.
    pub fn add_revocation(&mut self, revocation: Revocation, issuer: &str) -> Result<()> {
        let ca = self.entity(issuer)?;
        if !ca.can_sign {
            return Err(PkiError::InvalidEntityError(format!(
                "'{}' is not a CA and cannot revoke certificates",
                issuer
            )));
        }
        if ca.revoked_cert_ids().contains(revocation.cert_id.as_str()) {
            return Err(PkiError::InvalidEntityError(format!(
                "Certificate '{}' is already revoked by '{}'",
                revocation.cert_id, issuer
            )));
        }

        let issued_here = self.entities.values().any(|e| {
            e.cert(&revocation.cert_id).is_some()
                && matches!(self.issuer_of(e), Ok(signer) if signer == issuer)
        });
        if !issued_here {
            return Err(PkiError::NotFoundError(format!(
                "Certificate '{}' was not issued by '{}'",
                revocation.cert_id, issuer
            )));
        }

        self.entity_mut(issuer)?.revocations.push(revocation);
        Ok(())
    }

    /// Check registry and hierarchy consistency of a loaded state.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in self.registries.all() {
            if !seen.insert(name.as_str()) {
                return Err(PkiError::InvalidStoreError(format!(
                    "'{}' is listed in more than one registry slot",
                    name
                )));
            }
            if !self.entities.contains_key(name) {
                return Err(PkiError::InvalidStoreError(format!(
                    "Registry entry '{}' has no entity",
                    name
                )));
            }
        }

        for kind in EntityKind::ALL {
            for name in self.registries.list(kind) {
                let entity = self.entity(name)?;
                if let Some(problem) =
                    name_violation(name).or_else(|| kind_violation(kind, entity))
                {
                    return Err(PkiError::InvalidStoreError(problem));
                }
            }
        }

        for (key, entity) in &self.entities {
            if key != &entity.name {
                return Err(PkiError::InvalidStoreError(format!(
                    "Entity '{}' is stored under '{}'",
                    entity.name, key
                )));
            }
            self.check_ancestry(entity)?;
        }

        Ok(())
    }

    fn check_ancestry(&self, entity: &Entity) -> Result<()> {
        let mut current = entity;
        for _ in 0..MAX_CHAIN_DEPTH {
            let Some(parent_name) = &current.parent_id else {
                return Ok(());
            };
            let parent = self.entities.get(parent_name).ok_or_else(|| {
                PkiError::InvalidStoreError(format!(
                    "'{}' references missing parent '{}'",
                    current.name, parent_name
                ))
            })?;
            if !parent.can_sign {
                return Err(PkiError::InvalidStoreError(format!(
                    "Parent '{}' of '{}' cannot sign",
                    parent_name, current.name
                )));
            }
            current = parent;
        }

        Err(PkiError::InvalidStoreError(format!(
            "Parent chain of '{}' does not reach a root within {} hops",
            entity.name, MAX_CHAIN_DEPTH
        )))
    }
}

/// Why `name` cannot name an entity, if it cannot.
///
/// Names end up in exported filenames, so they must stay a single path
/// component.
fn name_violation(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return Some("Entity name cannot be empty".to_string());
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Some(format!(
            "Entity name '{}' must be a single path component",
            name.escape_debug()
        ));
    }
    None
}

/// Why `entity` does not fit the `kind` registry, if it does not.
fn kind_violation(kind: EntityKind, entity: &Entity) -> Option<String> {
    if entity.can_sign != kind.can_sign() {
        return Some(format!(
            "A {} must have can_sign = {} ('{}')",
            kind,
            kind.can_sign(),
            entity.name
        ));
    }

    match (kind, &entity.parent_id) {
        (EntityKind::RootCa, Some(parent)) => Some(format!(
            "Root CA '{}' cannot have a parent ('{}')",
            entity.name, parent
        )),
        (EntityKind::RootCa, None) | (_, Some(_)) => None,
        (_, None) => Some(format!("{} '{}' needs a signing parent", kind, entity.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{generate_id, purposes, CertPurpose, FileFormat, RevocationReason};
    use chrono::{Duration, Utc};
    use std::path::PathBuf;

    fn hierarchy() -> StoreState {
        let mut state = StoreState::default();
        state
            .register(EntityKind::RootCa, Entity::root_ca("root", 384))
            .unwrap();
        state
            .register(
                EntityKind::IntermediateCa,
                Entity::intermediate_ca("int", "root", 384),
            )
            .unwrap();
        state
            .register(EntityKind::Server, Entity::leaf("svc", "int", 256))
            .unwrap();
        state
    }

    fn key() -> Key {
        Key::new(generate_id(), None, FileFormat::Pem, 256)
    }

    fn cert_for(key: &Key) -> Cert {
        let now = Utc::now();
        Cert {
            id: generate_id(),
            format: FileFormat::Pem,
            path: PathBuf::from("c.pem"),
            key_id: key.id.clone(),
            purposes: purposes(&[CertPurpose::WebServer]),
            start_date: now,
            end_date: now + Duration::days(1),
        }
    }

    #[test]
    fn test_register_appends_in_order() {
        let mut state = hierarchy();
        state
            .register(EntityKind::Server, Entity::leaf("svc2", "root", 256))
            .unwrap();

        assert_eq!(state.registries.servers, vec!["svc", "svc2"]);
        assert_eq!(state.registries.kind_of("int"), Some(EntityKind::IntermediateCa));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_register_duplicate_across_registries() {
        let mut state = hierarchy();
        let result = state.register(EntityKind::Server, Entity::leaf("int", "root", 256));

        match result {
            Err(PkiError::DuplicateEntityError(name)) => assert_eq!(name, "int"),
            _ => panic!("Expected DuplicateEntityError"),
        }
        assert_eq!(state.registries.servers, vec!["svc"]);
    }

    #[test]
    fn test_register_root_with_parent() {
        let mut state = hierarchy();
        let mut bogus = Entity::root_ca("root2", 384);
        bogus.parent_id = Some("root".to_string());

        assert!(matches!(
            state.register(EntityKind::RootCa, bogus),
            Err(PkiError::InvalidEntityError(_))
        ));
    }

    #[test]
    fn test_register_leaf_that_signs() {
        let mut state = hierarchy();
        let bogus = Entity::new("svc2", true, 256, Some("root"));

        assert!(matches!(
            state.register(EntityKind::Server, bogus),
            Err(PkiError::InvalidEntityError(_))
        ));
    }

    #[test]
    fn test_register_missing_parent() {
        let mut state = hierarchy();
        let result = state.register(EntityKind::Client, Entity::leaf("c", "nope", 256));
        assert!(matches!(result, Err(PkiError::NotFoundError(_))));
        assert!(state.entities.get("c").is_none());
    }

    #[test]
    fn test_register_under_leaf_parent() {
        let mut state = hierarchy();
        let result = state.register(EntityKind::Client, Entity::leaf("c", "svc", 256));
        assert!(matches!(result, Err(PkiError::InvalidEntityError(_))));
    }

    #[test]
    fn test_register_leaf_without_parent() {
        let mut state = hierarchy();
        let result = state.register(EntityKind::Email, Entity::new("a@b", false, 256, None));
        assert!(matches!(result, Err(PkiError::InvalidEntityError(_))));
    }

    #[test]
    fn test_default_signing_ca() {
        assert!(matches!(
            StoreState::default().default_signing_ca(),
            Err(PkiError::NoDefaultCaError)
        ));
        assert_eq!(hierarchy().default_signing_ca().unwrap().name, "root");
    }

    #[test]
    fn test_issuer_of() {
        let state = hierarchy();
        assert_eq!(state.issuer_of(state.entity("root").unwrap()).unwrap(), "root");
        assert_eq!(state.issuer_of(state.entity("int").unwrap()).unwrap(), "root");
        assert_eq!(state.issuer_of(state.entity("svc").unwrap()).unwrap(), "int");

        let orphan = Entity::new("orphan", false, 256, None);
        assert_eq!(state.issuer_of(&orphan).unwrap(), "root");
    }

    #[test]
    fn test_default_purposes() {
        let mut state = hierarchy();
        state
            .register(EntityKind::Email, Entity::leaf("a@example.com", "int", 256))
            .unwrap();

        let of = |name: &str| state.default_purposes(state.entity(name).unwrap());
        assert_eq!(of("root"), purposes(&[CertPurpose::RootCa]));
        assert_eq!(of("int"), purposes(&[CertPurpose::IntermediateCa]));
        assert_eq!(of("svc"), purposes(&[CertPurpose::WebServer]));
        assert_eq!(of("a@example.com"), purposes(&[CertPurpose::EmailIdentity]));
    }

    #[test]
    fn test_add_cert_requires_owned_key() {
        let mut state = hierarchy();
        let owned = key();
        let foreign = key();
        state.add_key(owned.clone(), "svc").unwrap();
        state.add_key(foreign.clone(), "int").unwrap();

        assert!(state.add_cert(cert_for(&owned), "svc").is_ok());
        assert!(matches!(
            state.add_cert(cert_for(&foreign), "svc"),
            Err(PkiError::NotFoundError(_))
        ));
    }

    #[test]
    fn test_add_key_unknown_owner() {
        let mut state = hierarchy();
        assert!(matches!(
            state.add_key(key(), "ghost"),
            Err(PkiError::NotFoundError(_))
        ));
    }

    #[test]
    fn test_add_revocation_rules() {
        let mut state = hierarchy();
        let k = key();
        let cert = cert_for(&k);
        state.add_key(k, "svc").unwrap();
        state.add_cert(cert.clone(), "svc").unwrap();

        // Leaves cannot revoke
        let result = state.add_revocation(
            Revocation::new(cert.id.clone(), RevocationReason::Superseded),
            "svc",
        );
        assert!(matches!(result, Err(PkiError::InvalidEntityError(_))));

        // Root did not issue svc's certificate
        let result = state.add_revocation(
            Revocation::new(cert.id.clone(), RevocationReason::Superseded),
            "root",
        );
        assert!(matches!(result, Err(PkiError::NotFoundError(_))));

        state
            .add_revocation(
                Revocation::new(cert.id.clone(), RevocationReason::KeyCompromise),
                "int",
            )
            .unwrap();
        assert_eq!(state.entity("int").unwrap().revocations.len(), 1);
        assert!(state.entity("svc").unwrap().revocations.is_empty());

        // No double revocation
        let result = state.add_revocation(
            Revocation::new(cert.id, RevocationReason::Superseded),
            "int",
        );
        assert!(matches!(result, Err(PkiError::InvalidEntityError(_))));
    }

    #[test]
    fn test_register_rejects_path_like_names() {
        let mut state = hierarchy();
        for name in ["../escaped", "a/b", "a\\b", "..", ".", "nul\0byte"] {
            match state.register(EntityKind::Client, Entity::leaf(name, "int", 256)) {
                Err(PkiError::InvalidEntityError(_)) => {}
                _ => panic!("Expected InvalidEntityError for {:?}", name),
            }
        }
        assert!(state.registries.clients.is_empty());

        // Dots inside a single component are fine
        state
            .register(EntityKind::Server, Entity::leaf("..svc..example", "int", 256))
            .unwrap();
    }

    #[test]
    fn test_intermediate_cannot_revoke_own_cert() {
        let mut state = hierarchy();
        let k = key();
        let cert = cert_for(&k);
        state.add_key(k, "int").unwrap();
        state.add_cert(cert.clone(), "int").unwrap();

        let result = state.add_revocation(
            Revocation::new(cert.id.clone(), RevocationReason::CaCompromise),
            "int",
        );
        assert!(matches!(result, Err(PkiError::NotFoundError(_))));
        assert!(state.entity("int").unwrap().revocations.is_empty());

        state
            .add_revocation(
                Revocation::new(cert.id, RevocationReason::CaCompromise),
                "root",
            )
            .unwrap();
        assert_eq!(state.entity("root").unwrap().revocations.len(), 1);
    }

    #[test]
    fn test_root_revokes_own_cert() {
        let mut state = hierarchy();
        let k = key();
        let cert = cert_for(&k);
        state.add_key(k, "root").unwrap();
        state.add_cert(cert.clone(), "root").unwrap();

        state
            .add_revocation(
                Revocation::new(cert.id, RevocationReason::KeyCompromise),
                "root",
            )
            .unwrap();
        assert_eq!(state.entity("root").unwrap().revocations.len(), 1);
    }

    #[test]
    fn test_validate_registry_kind_mismatch() {
        let mut state = hierarchy();
        state.entities.get_mut("svc").unwrap().can_sign = true;
        assert!(matches!(
            state.validate(),
            Err(PkiError::InvalidStoreError(_))
        ));

        let mut state = hierarchy();
        state.entities.get_mut("int").unwrap().can_sign = false;
        assert!(matches!(
            state.validate(),
            Err(PkiError::InvalidStoreError(_))
        ));

        let mut state = hierarchy();
        state.entities.insert("root2".to_string(), Entity::leaf("root2", "root", 256));
        state.entities.get_mut("root2").unwrap().can_sign = true;
        state.registries.root_cas.push("root2".to_string());
        assert!(matches!(
            state.validate(),
            Err(PkiError::InvalidStoreError(_))
        ));
    }

    #[test]
    fn test_validate_path_like_name() {
        let mut state = hierarchy();
        state
            .entities
            .insert("../svc2".to_string(), Entity::leaf("../svc2", "int", 256));
        state.registries.servers.push("../svc2".to_string());

        assert!(matches!(
            state.validate(),
            Err(PkiError::InvalidStoreError(_))
        ));
    }

    #[test]
    fn test_validate_orphaned_registry_entry() {
        let mut state = hierarchy();
        state.registries.clients.push("ghost".to_string());

        assert!(matches!(
            state.validate(),
            Err(PkiError::InvalidStoreError(_))
        ));
    }

    #[test]
    fn test_validate_cycle() {
        let mut state = hierarchy();
        state.entities.get_mut("root").unwrap().parent_id = Some("int".to_string());

        assert!(matches!(
            state.validate(),
            Err(PkiError::InvalidStoreError(_))
        ));
    }

    #[test]
    fn test_unregistered_entity_is_tolerated() {
        let mut state = hierarchy();
        state
            .entities
            .insert("loose".to_string(), Entity::leaf("loose", "root", 256));

        assert!(state.validate().is_ok());
    }
}
