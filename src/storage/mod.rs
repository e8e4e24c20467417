//! Persistent metadata store.
//!
//! All entities, keys, certificates, requests and revocations of a PKI
//! live in one versioned JSON file inside the store directory. The key and
//! certificate files themselves are written by a signing backend next to it.

mod issuance;
pub mod schema;
pub mod state;
pub mod store;

pub use schema::CURRENT_VERSION;
pub use state::{Registries, StoreState, MAX_CHAIN_DEPTH};
pub use store::{PkiStore, DB_FILENAME};
