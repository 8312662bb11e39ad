use thiserror::Error;

/// Unified error type for the entire finance-tracker-core library.
/// Every fallible public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Ledger / Mutation ───────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Local ledger file ───────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: wrong password or corrupted file")]
    Decryption,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Machine-distinguishable failure category, for callers that branch on
/// the kind of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StoreUnavailable,
    Config,
    Storage,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            CoreError::Config(_) => ErrorKind::Config,
            CoreError::InvalidFileFormat(_)
            | CoreError::UnsupportedVersion(_)
            | CoreError::Encryption(_)
            | CoreError::Decryption
            | CoreError::Serialization(_)
            | CoreError::Deserialization(_) => ErrorKind::Storage,
        }
    }

    /// `true` for failures the caller can fix by changing its input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation)
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::StoreUnavailable(format!("File I/O error: {e}"))
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; the filter query string holds
        // owner ids and must not end up in user-facing messages.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::StoreUnavailable(sanitized)
    }
}

impl From<aes_gcm::Error> for CoreError {
    fn from(_: aes_gcm::Error) -> Self {
        CoreError::Decryption
    }
}
