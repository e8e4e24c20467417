//! Entities: CAs and the leaves they certify.

use crate::model::cert::{purposes, CertPurpose, PurposeSet};
use crate::model::{Cert, CertRequest, Key, Revocation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The registry an entity is listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    RootCa,
    IntermediateCa,
    Server,
    Client,
    Email,
}

impl EntityKind {
    /// All kinds, in registry order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::RootCa,
        EntityKind::IntermediateCa,
        EntityKind::Server,
        EntityKind::Client,
        EntityKind::Email,
    ];

    /// Whether entities of this kind sign other certificates.
    pub fn can_sign(&self) -> bool {
        matches!(self, EntityKind::RootCa | EntityKind::IntermediateCa)
    }

    /// Purposes issued when nothing more specific is requested.
    pub fn default_purposes(&self) -> PurposeSet {
        match self {
            EntityKind::RootCa => purposes(&[CertPurpose::RootCa]),
            EntityKind::IntermediateCa => purposes(&[CertPurpose::IntermediateCa]),
            EntityKind::Server => purposes(&[CertPurpose::WebServer]),
            EntityKind::Client => purposes(&[CertPurpose::WebClient]),
            EntityKind::Email => purposes(&[CertPurpose::EmailIdentity]),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::RootCa => "root CA",
            EntityKind::IntermediateCa => "intermediate CA",
            EntityKind::Server => "server",
            EntityKind::Client => "client",
            EntityKind::Email => "email",
        };
        write!(f, "{}", name)
    }
}

/// A named participant in the PKI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub can_sign: bool,

    /// Minimum key strength in bits for keys generated for this entity.
    pub min_strength: u32,

    #[serde(default)]
    pub keys: Vec<Key>,

    #[serde(default)]
    pub certs: Vec<Cert>,

    #[serde(default)]
    pub cert_requests: Vec<CertRequest>,

    /// Revocations this entity issued. Only populated on CAs.
    #[serde(default)]
    pub revocations: Vec<Revocation>,

    pub parent_id: Option<String>,
}

impl Entity {
    /// Create an entity with empty sub-collections.
    pub fn new(name: &str, can_sign: bool, min_strength: u32, parent_id: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            can_sign,
            min_strength,
            keys: Vec::new(),
            certs: Vec::new(),
            cert_requests: Vec::new(),
            revocations: Vec::new(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    /// A self-signing root CA.
    pub fn root_ca(name: &str, min_strength: u32) -> Self {
        Self::new(name, true, min_strength, None)
    }

    /// An intermediate CA under `parent`.
    pub fn intermediate_ca(name: &str, parent: &str, min_strength: u32) -> Self {
        Self::new(name, true, min_strength, Some(parent))
    }

    /// A leaf (server, client, or email identity) under `parent`.
    pub fn leaf(name: &str, parent: &str, min_strength: u32) -> Self {
        Self::new(name, false, min_strength, Some(parent))
    }

    /// A signing entity without a parent.
    pub fn is_root(&self) -> bool {
        self.can_sign && self.parent_id.is_none()
    }

    /// Look up an owned key by id.
    pub fn key(&self, id: &str) -> Option<&Key> {
        self.keys.iter().find(|k| k.id == id)
    }

    /// The key used for new certificates.
    pub fn first_key(&self) -> Option<&Key> {
        self.keys.first()
    }

    /// Look up an owned certificate by id.
    pub fn cert(&self, id: &str) -> Option<&Cert> {
        self.certs.iter().find(|c| c.id == id)
    }

    /// Ids of certificates this entity has revoked.
    pub fn revoked_cert_ids(&self) -> HashSet<&str> {
        self.revocations.iter().map(|r| r.cert_id.as_str()).collect()
    }

    /// Certificates covering `requested`, in issuance order.
    pub fn certs_for_purposes<'a>(
        &'a self,
        requested: &'a PurposeSet,
    ) -> impl Iterator<Item = &'a Cert> + 'a {
        self.certs.iter().filter(move |c| c.satisfies(requested))
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Entity {}
