use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::models::transaction::{OwnerId, Transaction};

use super::encryption::{self, KdfParams};
use super::format::LedgerFile;

/// Plaintext contents of a ledger file: every owner's transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerArchive {
    pub ledgers: BTreeMap<OwnerId, Vec<Transaction>>,
}

impl LedgerArchive {
    pub fn transaction_count(&self) -> usize {
        self.ledgers.values().map(Vec::len).sum()
    }
}

/// Save/load a `LedgerArchive` as encrypted bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// LedgerArchive → bincode → AES-256-GCM(Argon2id(password)) → FTLG bytes
    pub fn save_to_bytes(
        archive: &LedgerArchive,
        password: &str,
        params: &KdfParams,
    ) -> Result<Vec<u8>, CoreError> {
        let plaintext = bincode::serialize(archive)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize ledger: {e}")))?;
        let sealed = encryption::seal(&plaintext, password, params)?;
        Ok(LedgerFile::new(*params, sealed).encode())
    }

    pub fn load_from_bytes(data: &[u8], password: &str) -> Result<LedgerArchive, CoreError> {
        let file = LedgerFile::decode(data)?;
        let plaintext = encryption::open(&file.sealed, password, &file.kdf_params)?;
        bincode::deserialize(&plaintext)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize ledger: {e}")))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(
        archive: &LedgerArchive,
        path: &Path,
        password: &str,
        params: &KdfParams,
    ) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(archive, password, params)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &Path, password: &str) -> Result<LedgerArchive, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes, password)
    }
}
