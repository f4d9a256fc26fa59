//! msgsafe-store: secret storage and the persisted backup configuration.
//!
//! Secret material (master key, server credentials) lives in the platform
//! secret store behind the [`SecretStore`] trait; everything else is a JSON
//! snapshot on disk managed by [`SafeConfigManager`].

pub mod manager;
pub mod secret_store;

pub use manager::SafeConfigManager;
pub use secret_store::{ItemKind, KeyringSecretStore, MemorySecretStore, SecretEntry, SecretStore};
