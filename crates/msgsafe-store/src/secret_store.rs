//! Secret store abstraction.
//!
//! Two items exist per identity: the raw 64-byte master key
//! (`backup-key`) and the server credential triple (`backup-server`,
//! carrying server URL, user and password). The platform backend maps
//! both onto the OS keychain via the `keyring` crate; tests use the
//! in-memory backend.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use msgsafe_core::{SafeError, SafeResult};

/// The two secret items kept per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Raw master key bytes.
    BackupKey,
    /// Server credential triple.
    BackupServer,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::BackupKey => "backup-key",
            ItemKind::BackupServer => "backup-server",
        }
    }
}

/// One stored secret with its lookup attributes.
///
/// For `BackupKey`, `secret` holds the raw key and the attributes are
/// unused. For `BackupServer`, `service` is the server URL, `generic` the
/// user name and `secret` the password bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEntry {
    #[serde(with = "serde_bytes_b64")]
    pub secret: Vec<u8>,
    pub generic: Option<String>,
    pub service: Option<String>,
}

impl SecretEntry {
    pub fn from_secret(secret: Vec<u8>) -> Self {
        SecretEntry {
            secret,
            generic: None,
            service: None,
        }
    }

    pub fn secret_utf8(&self) -> SafeResult<String> {
        String::from_utf8(self.secret.clone())
            .map_err(|_| SafeError::SecretStore("stored secret is not valid UTF-8".into()))
    }
}

pub trait SecretStore: Send + Sync {
    fn get(&self, account: &str, item: ItemKind) -> SafeResult<Option<SecretEntry>>;
    fn set(&self, account: &str, item: ItemKind, entry: &SecretEntry) -> SafeResult<()>;
    /// Deleting an absent item is not an error.
    fn delete(&self, account: &str, item: ItemKind) -> SafeResult<()>;
}

/// Platform keychain backend.
///
/// Entries are stored under one keyring service with the account/item pair
/// as user name; the full [`SecretEntry`] is serialized as JSON so the
/// credential triple survives backends that only hold an opaque secret.
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub const DEFAULT_SERVICE: &'static str = "msgsafe";

    pub fn new() -> Self {
        Self::with_service(Self::DEFAULT_SERVICE)
    }

    pub fn with_service(service: &str) -> Self {
        KeyringSecretStore {
            service: service.to_string(),
        }
    }

    fn entry(&self, account: &str, item: ItemKind) -> SafeResult<keyring::Entry> {
        let user = format!("{account}/{}", item.as_str());
        keyring::Entry::new(&self.service, &user)
            .map_err(|e| SafeError::SecretStore(e.to_string()))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, account: &str, item: ItemKind) -> SafeResult<Option<SecretEntry>> {
        match self.entry(account, item)?.get_secret() {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| SafeError::SecretStore(format!("corrupt keychain entry: {e}"))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SafeError::SecretStore(e.to_string())),
        }
    }

    fn set(&self, account: &str, item: ItemKind, entry: &SecretEntry) -> SafeResult<()> {
        let bytes =
            serde_json::to_vec(entry).map_err(|e| SafeError::SecretStore(e.to_string()))?;
        self.entry(account, item)?
            .set_secret(&bytes)
            .map_err(|e| SafeError::SecretStore(e.to_string()))
    }

    fn delete(&self, account: &str, item: ItemKind) -> SafeResult<()> {
        match self.entry(account, item)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SafeError::SecretStore(e.to_string())),
        }
    }
}

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemorySecretStore {
    items: Mutex<HashMap<(String, ItemKind), SecretEntry>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, account: &str, item: ItemKind) -> SafeResult<Option<SecretEntry>> {
        let items = self
            .items
            .lock()
            .map_err(|_| SafeError::SecretStore("poisoned".into()))?;
        Ok(items.get(&(account.to_string(), item)).cloned())
    }

    fn set(&self, account: &str, item: ItemKind, entry: &SecretEntry) -> SafeResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| SafeError::SecretStore("poisoned".into()))?;
        items.insert((account.to_string(), item), entry.clone());
        Ok(())
    }

    fn delete(&self, account: &str, item: ItemKind) -> SafeResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| SafeError::SecretStore("poisoned".into()))?;
        items.remove(&(account.to_string(), item));
        Ok(())
    }
}

// Keychain blobs must stay printable; base64 the raw secret bytes.
mod serde_bytes_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
