//! msgsafe-core: shared types for the encrypted cloud backup subsystem
//!
//! Contains the versioned backup document schema and its codec, the
//! persisted config snapshot with its credential-separation migration,
//! server URL handling, and the error taxonomy shared by all crates.

pub mod config;
pub mod document;
pub mod error;
pub mod server;

pub use config::SafeData;
pub use document::{BackupDocument, ServerPolicy, SCHEMA_VERSION};
pub use error::{SafeError, SafeResult};

/// Length of a master key in bytes: BackupID (32) followed by the
/// encryption key (32).
pub const MASTER_KEY_LEN: usize = 64;

/// Length of the BackupID half of the master key.
pub const BACKUP_ID_LEN: usize = 32;

/// Length of the encryption-key half of the master key.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Fallback for the server-advertised maximum backup size (bytes) when the
/// policy probe has not run yet.
pub const DEFAULT_MAX_BACKUP_BYTES: u64 = 524_288;

/// Fallback retention window (days) when the server has not advertised one.
pub const DEFAULT_RETENTION_DAYS: u32 = 180;
