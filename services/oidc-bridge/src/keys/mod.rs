//! Signing key pair lifecycle: model, persisted record, and load-or-generate.

pub mod manager;
pub mod model;
pub mod store;

pub use manager::KeyManager;
pub use model::{KeyAlgorithm, KeyPair, KeyPairRecord};
pub use store::{KeyStore, StoredRecord};
