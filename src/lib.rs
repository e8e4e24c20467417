//! cactl: certificate authority management for a small private PKI
//!
//! This library keeps track of root and intermediate CAs and the servers,
//! clients and email identities they certify. It enables users to:
//!
//! - Register entities in a versioned JSON store with atomic writes
//! - Issue keys and certificates lazily, signing up the CA hierarchy
//! - Resolve certificate chains from any entity to its root
//! - Revoke certificates on their issuing CA
//! - Export chains and keys for nginx, browsers and OpenVPN
//!
//! # Architecture
//!
//! The store (`storage`) owns all metadata and never touches key material.
//! Keys and certificates are produced by a [`backend::SigningBackend`], and
//! exporters (`export`) read them back as PEM. Every operation returns a
//! `Result` with a [`PkiError`] describing what went wrong.
//!
//! # Example
//!
//! ```rust,no_run
//! use cactl::backend::RcgenBackend;
//! use cactl::error::Result;
//! use cactl::model::Entity;
//! use cactl::storage::PkiStore;
//!
//! fn example() -> Result<()> {
//!     let mut store = PkiStore::open("./CA")?;
//!     let backend = RcgenBackend::from_config(store.directory(), store.config());
//!
//!     store.add_root_ca(Entity::root_ca("Example Root CA", 384))?;
//!     store.add_server(Entity::leaf("www.example.com", "Example Root CA", 256))?;
//!
//!     let chain = store.entity_certificate_chain(&backend, "www.example.com", None)?;
//!     println!("Chain has {} certificates", chain.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod storage;

// Re-export commonly used types
pub use error::{PkiError, Result};
