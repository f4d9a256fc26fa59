//! msgsafe-crypto: master key derivation and the backup blob cipher.
//!
//! The master key is derived deterministically from the user's identity and
//! password, then split in half: the first 32 bytes address the backup on
//! the server (BackupID), the last 32 encrypt it. The server never sees
//! anything it could reverse into the password.

pub mod blob;
pub mod kdf;

pub use blob::{checksum, decrypt, encrypt, NONCE_SIZE, TAG_SIZE};
pub use kdf::{derive_master_key, MasterKey};
