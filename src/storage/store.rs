//! The persistent PKI store.

use crate::config::CactlConfig;
use crate::error::{PkiError, Result};
use crate::model::{Cert, CertRequest, Entity, EntityKind, Key, Revocation, RevocationReason};
use crate::storage::schema;
use crate::storage::state::StoreState;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Store filename inside the store directory.
pub const DB_FILENAME: &str = "cactl.json";

/// A store directory: the JSON metadata file, its configuration, and the
/// key and certificate files referenced from it.
///
/// Every mutation is written to disk before it becomes visible in memory.
/// A failed write leaves both the file and the loaded state unchanged.
#[derive(Debug)]
pub struct PkiStore {
    directory: PathBuf,
    path: PathBuf,
    config: CactlConfig,
    pub(super) state: StoreState,
}

impl PkiStore {
    /// Open the store in `directory`, creating it if needed.
    ///
    /// Settings come from the directory's `cactl.toml` when present.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use cactl::storage::PkiStore;
    ///
    /// let store = PkiStore::open("./CA").unwrap();
    /// for name in store.root_cas() {
    ///     println!("{}", name);
    /// }
    /// ```
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        let config = CactlConfig::load(directory)?;
        Self::open_with_config(directory, config)
    }

    /// Open the store in `directory` with explicit settings.
    pub fn open_with_config(directory: impl AsRef<Path>, config: CactlConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let path = directory.join(DB_FILENAME);

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let state = schema::decode(&contents)?;
            debug!(
                "Loaded {} entities from {}",
                state.entities.len(),
                path.display()
            );

            Ok(Self {
                directory,
                path,
                config,
                state,
            })
        } else {
            fs::create_dir_all(&directory)?;
            let store = Self {
                directory,
                path,
                config,
                state: StoreState::default(),
            };
            store.write(&store.state)?;
            info!("Created new store at {}", store.path.display());
            Ok(store)
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the JSON store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &CactlConfig {
        &self.config
    }

    /// Absolute location of an artifact path recorded in the store.
    pub fn resolve(&self, artifact: &Path) -> PathBuf {
        self.directory.join(artifact)
    }

    fn write(&self, state: &StoreState) -> Result<()> {
        let json = schema::encode(state)?;

        let mut file = NamedTempFile::new_in(&self.directory)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }

    /// Apply `mutate` to a copy of the state, persist it, then adopt it.
    fn commit<T>(
        &mut self,
        mutate: impl FnOnce(&mut StoreState) -> Result<T>,
    ) -> Result<T> {
        let mut next = self.state.clone();
        let output = mutate(&mut next)?;
        self.write(&next)?;
        self.state = next;
        Ok(output)
    }

    pub fn get_entity(&self, name: &str) -> Option<&Entity> {
        self.state.entities.get(name)
    }

    /// Like [`get_entity`](Self::get_entity), but a missing entity is an error.
    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.state.entity(name)
    }

    /// The registry `name` is listed in.
    pub fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        self.state.registries.kind_of(name)
    }

    /// Registered names of one kind, in creation order.
    pub fn names(&self, kind: EntityKind) -> &[String] {
        self.state.registries.list(kind)
    }

    pub fn root_cas(&self) -> &[String] {
        self.names(EntityKind::RootCa)
    }

    pub fn intermediate_cas(&self) -> &[String] {
        self.names(EntityKind::IntermediateCa)
    }

    pub fn servers(&self) -> &[String] {
        self.names(EntityKind::Server)
    }

    pub fn clients(&self) -> &[String] {
        self.names(EntityKind::Client)
    }

    pub fn emails(&self) -> &[String] {
        self.names(EntityKind::Email)
    }

    /// Every registered name, root CAs first and emails last.
    pub fn entity_names(&self) -> Vec<&str> {
        self.state.registries.all().map(String::as_str).collect()
    }

    /// The first registered root CA.
    pub fn default_signing_ca(&self) -> Result<&Entity> {
        self.state.default_signing_ca()
    }

    /// Name of the entity that signs `name`'s certificates.
    pub fn issuer_of(&self, name: &str) -> Result<String> {
        self.state.issuer_of(self.entity(name)?)
    }

    fn register(&mut self, kind: EntityKind, entity: Entity) -> Result<()> {
        let name = entity.name.clone();
        self.commit(|state| state.register(kind, entity))?;
        info!("Registered {} '{}'", kind, name);
        Ok(())
    }

    pub fn add_root_ca(&mut self, entity: Entity) -> Result<()> {
        self.register(EntityKind::RootCa, entity)
    }

    pub fn add_intermediate_ca(&mut self, entity: Entity) -> Result<()> {
        self.register(EntityKind::IntermediateCa, entity)
    }

    pub fn add_server(&mut self, entity: Entity) -> Result<()> {
        self.register(EntityKind::Server, entity)
    }

    pub fn add_client(&mut self, entity: Entity) -> Result<()> {
        self.register(EntityKind::Client, entity)
    }

    pub fn add_email(&mut self, entity: Entity) -> Result<()> {
        self.register(EntityKind::Email, entity)
    }

    /// Attach a key to its owning entity.
    pub fn add_key(&mut self, key: Key, owner: &str) -> Result<()> {
        let key_id = key.id.clone();
        self.commit(|state| state.add_key(key, owner))?;
        debug!("Added key {} to '{}'", key_id, owner);
        Ok(())
    }

    /// Attach a certificate. Its key must already belong to `owner`.
    pub fn add_cert(&mut self, cert: Cert, owner: &str) -> Result<()> {
        let cert_id = cert.id.clone();
        self.commit(|state| state.add_cert(cert, owner))?;
        debug!("Added certificate {} to '{}'", cert_id, owner);
        Ok(())
    }

    pub fn add_cert_request(&mut self, request: CertRequest, owner: &str) -> Result<()> {
        let request_id = request.id.clone();
        self.commit(|state| state.add_cert_request(request, owner))?;
        debug!("Added certificate request {} to '{}'", request_id, owner);
        Ok(())
    }

    /// Record that `issuer` revoked one of the certificates it signed.
    pub fn add_revocation(&mut self, revocation: Revocation, issuer: &str) -> Result<()> {
        let cert_id = revocation.cert_id.clone();
        self.commit(|state| state.add_revocation(revocation, issuer))?;
        info!("'{}' revoked certificate {}", issuer, cert_id);
        Ok(())
    }

    /// Revoke every currently valid certificate of `name` on its issuer.
    ///
    /// Returns the new revocations; certificates that are already revoked
    /// or expired are skipped.
    pub fn revoke_entity(
        &mut self,
        name: &str,
        reason: RevocationReason,
    ) -> Result<Vec<Revocation>> {
        let entity = self.entity(name)?;
        let issuer = self.state.issuer_of(entity)?;
        let already_revoked = self.state.entity(&issuer)?.revoked_cert_ids();
        let now = Utc::now();

        let revocations: Vec<Revocation> = entity
            .certs
            .iter()
            .filter(|c| c.is_valid_at(now) && !already_revoked.contains(c.id.as_str()))
            .map(|c| Revocation::new(c.id.clone(), reason))
            .collect();

        if revocations.is_empty() {
            return Err(PkiError::NotFoundError(format!(
                "'{}' has no valid certificate to revoke",
                name
            )));
        }

        let pending = revocations.clone();
        self.commit(|state| {
            for revocation in pending {
                state.add_revocation(revocation, &issuer)?;
            }
            Ok(())
        })?;

        info!(
            "'{}' revoked {} certificate(s) of '{}' ({})",
            issuer,
            revocations.len(),
            name,
            reason
        );
        Ok(revocations)
    }
}
