//! Error types for the cactl library.
//!
//! Every store, backend, and exporter operation returns [`Result`]. Store
//! mutations fail fast: when an error is returned, neither the on-disk
//! database nor the in-memory state has changed.

use thiserror::Error;

/// The main error type for cactl operations.
#[derive(Error, Debug)]
pub enum PkiError {
    /// An entity with this name is already registered in some registry.
    #[error("Entity already exists: {0}")]
    DuplicateEntityError(String),

    /// Entity, key, cert, request or exporter lookup failed
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// The database was written by a different schema version.
    #[error("Unsupported store version '{found}' (this build supports '{supported}')")]
    UnsupportedVersionError { found: String, supported: String },

    /// A parent link is broken or a certificate could not be resolved mid-chain.
    #[error("Chain resolution failed: {0}")]
    ChainResolutionError(String),

    /// No root CA is registered.
    #[error("No default signing CA: register a root CA first")]
    NoDefaultCaError,

    /// The signing backend failed to generate a key or sign a request.
    #[error("Signing backend error: {0}")]
    BackendError(String),

    /// The entity or item violates a store invariant.
    #[error("Invalid entity: {0}")]
    InvalidEntityError(String),

    /// The database file is readable but inconsistent.
    #[error("Invalid store: {0}")]
    InvalidStoreError(String),

    /// The configuration file could not be parsed.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for cactl operations.
pub type Result<T> = std::result::Result<T, PkiError>;
