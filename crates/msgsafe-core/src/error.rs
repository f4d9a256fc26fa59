use thiserror::Error;

pub type SafeResult<T> = Result<T, SafeError>;

#[derive(Debug, Error)]
pub enum SafeError {
    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("invalid master key: expected 64 bytes, got {0}")]
    InvalidMasterKey(usize),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("backup size {size} exceeds server limit of {max} bytes")]
    SizeLimitExceeded { size: u64, max: u64 },

    #[error("decode error at {path}: {detail}")]
    Decode { path: String, detail: String },

    #[error("unsupported backup version {0}")]
    VersionMismatch(u64),

    /// Fatal, user-facing restore failure (bad backup, bad credentials).
    #[error("restore failed: {0}")]
    RestoreFailed(String),

    /// Fatal restore error in a post-download step (e.g. identity
    /// propagation), distinct from `RestoreFailed` for messaging.
    #[error("restore error: {0}")]
    RestoreError(String),

    /// Non-fatal conflict: a forced backup was requested while one runs.
    #[error("backup is already running")]
    AlreadyRunning,

    #[error("config error: {0}")]
    Config(String),

    #[error("secret store error: {0}")]
    SecretStore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SafeError {
    /// True for transport-level failures where the server reported the
    /// payload as too large (recognized specially by the scheduler).
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, SafeError::Server { status: 413, .. })
    }
}
