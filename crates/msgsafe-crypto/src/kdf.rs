//! Master key derivation.
//!
//! scrypt with N = 65536, r = 8, p = 1 and the identity string as salt,
//! producing 64 bytes. The parameters are part of the wire format: changing
//! them would derive a different BackupID and orphan existing backups.

use scrypt::Params;
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop};

use msgsafe_core::{SafeError, SafeResult, BACKUP_ID_LEN, MASTER_KEY_LEN};

/// log2(N) for N = 65536.
const SCRYPT_LOG_N: u8 = 16;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// The 64-byte master key: BackupID ‖ encryption key.
///
/// Zeroized on drop and redacted in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    /// Accepts exactly [`MASTER_KEY_LEN`] bytes (e.g. from the secret
    /// store); anything else is `InvalidMasterKey`.
    pub fn from_slice(bytes: &[u8]) -> SafeResult<Self> {
        let arr: [u8; MASTER_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| SafeError::InvalidMasterKey(bytes.len()))?;
        Ok(MasterKey(arr))
    }

    /// First half: addresses the backup on the server.
    pub fn backup_id(&self) -> &[u8] {
        &self.0[..BACKUP_ID_LEN]
    }

    /// Second half: encrypts the backup blob.
    pub fn encryption_key(&self) -> &[u8] {
        &self.0[BACKUP_ID_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey(<redacted>)")
    }
}

/// Derive the master key for an identity/password pair.
///
/// Deterministic: the same inputs always yield the same key, which is what
/// lets a fresh install find and decrypt an existing backup.
pub fn derive_master_key(identity: &str, password: &SecretString) -> SafeResult<MasterKey> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(SafeError::KeyDerivationFailed);
    }

    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, MASTER_KEY_LEN)
        .map_err(|_| SafeError::KeyDerivationFailed)?;
    let mut out = [0u8; MASTER_KEY_LEN];
    scrypt::scrypt(password.as_bytes(), identity.as_bytes(), &params, &mut out)
        .map_err(|_| SafeError::KeyDerivationFailed)?;
    Ok(MasterKey(out))
}
