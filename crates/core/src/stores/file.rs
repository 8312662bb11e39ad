use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::traits::LedgerStore;
use crate::errors::CoreError;
use crate::models::transaction::{NewTransaction, OwnerId, Transaction, TransactionPatch};
use crate::storage::encryption::KdfParams;
use crate::storage::manager::{LedgerArchive, StorageManager};

/// Ledger store persisted to a single encrypted file on disk.
///
/// The archive is loaded once on open and rewritten after every successful
/// mutation. If the write fails the in-memory change is rolled back, so the
/// store never reports a mutation the file does not contain. Key derivation
/// and the file write run on tokio's blocking pool; mutations are serialized
/// by the async archive lock.
pub struct EncryptedFileLedger {
    path: Arc<PathBuf>,
    password: Arc<str>,
    kdf_params: KdfParams,
    archive: Mutex<LedgerArchive>,
}

impl EncryptedFileLedger {
    /// Open an existing ledger file, or start an empty one if `path` does not exist.
    ///
    /// Reading an existing file derives the key synchronously; call this
    /// from `spawn_blocking` when opening inside a latency-sensitive task.
    pub fn open(path: impl AsRef<Path>, password: impl Into<String>) -> Result<Self, CoreError> {
        Self::open_with_params(path, password, KdfParams::default())
    }

    /// Like `open`, with explicit Argon2 costs for files written by this store.
    pub fn open_with_params(
        path: impl AsRef<Path>,
        password: impl Into<String>,
        kdf_params: KdfParams,
    ) -> Result<Self, CoreError> {
        kdf_params.check_bounds()?;
        let path = path.as_ref().to_path_buf();
        let password: String = password.into();
        let archive = if path.exists() {
            StorageManager::load_from_file(&path, &password)?
        } else {
            LedgerArchive::default()
        };
        tracing::debug!(path = %path.display(), transactions = archive.transaction_count(), "opened ledger file");
        Ok(Self {
            path: Arc::new(path),
            password: password.into(),
            kdf_params,
            archive: Mutex::new(archive),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the archive, persist it off the async
    /// scheduler, then commit. The archive lock is held throughout so
    /// concurrent mutations cannot interleave their writes.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut LedgerArchive) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut archive = self.archive.lock().await;
        let mut next = archive.clone();
        let out = change(&mut next)?;

        let path = Arc::clone(&self.path);
        let password = Arc::clone(&self.password);
        let kdf_params = self.kdf_params;
        let next = tokio::task::spawn_blocking(move || {
            StorageManager::save_to_file(&next, &path, &password, &kdf_params).map(|()| next)
        })
        .await
        .map_err(|e| CoreError::StoreUnavailable(format!("ledger write task failed: {e}")))??;

        *archive = next;
        Ok(out)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl LedgerStore for EncryptedFileLedger {
    fn name(&self) -> &str {
        "EncryptedFile"
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Transaction>, CoreError> {
        Ok(self
            .archive
            .lock()
            .await
            .ledgers
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        owner: &OwnerId,
        input: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        let record = Transaction::from_new(Uuid::new_v4(), owner.clone(), input, Utc::now());
        self.mutate(|archive| {
            archive
                .ledgers
                .entry(owner.clone())
                .or_default()
                .push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError> {
        self.mutate(|archive| {
            let record = archive
                .ledgers
                .get_mut(owner)
                .and_then(|ledger| ledger.iter_mut().find(|t| t.id == id))
                .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
            record.apply_patch(&patch, Utc::now());
            Ok(record.clone())
        })
        .await
    }

    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<(), CoreError> {
        self.mutate(|archive| {
            let ledger = archive
                .ledgers
                .get_mut(owner)
                .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
            let before = ledger.len();
            ledger.retain(|t| t.id != id);
            if ledger.len() == before {
                return Err(CoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
        .await
    }
}
