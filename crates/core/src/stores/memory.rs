use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::traits::LedgerStore;
use crate::errors::CoreError;
use crate::models::transaction::{NewTransaction, OwnerId, Transaction, TransactionPatch};

/// In-process ledger store.
///
/// Keeps every owner's transactions in a map. Useful offline and as the
/// backing store in tests; `set_available(false)` makes every call fail
/// with `StoreUnavailable` to simulate a backend outage.
pub struct MemoryLedgerStore {
    ledgers: Mutex<HashMap<OwnerId, Vec<Transaction>>>,
    available: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            ledgers: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Seed the store with existing records (ids and stamps kept as-is).
    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let store = Self::new();
        {
            let mut ledgers = store.lock();
            for t in transactions {
                ledgers.entry(t.owner.clone()).or_default().push(t);
            }
        }
        store
    }

    /// Toggle simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of transactions stored for `owner`.
    pub fn len_for(&self, owner: &OwnerId) -> usize {
        self.lock().get(owner).map_or(0, Vec::len)
    }

    fn check_available(&self) -> Result<(), CoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::StoreUnavailable("memory store is offline".into()))
        }
    }

    // A poisoned lock only means another caller panicked mid-operation;
    // the map itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<OwnerId, Vec<Transaction>>> {
        self.ledgers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &str {
        "Memory"
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Transaction>, CoreError> {
        self.check_available()?;
        Ok(self.lock().get(owner).cloned().unwrap_or_default())
    }

    async fn insert(
        &self,
        owner: &OwnerId,
        input: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        self.check_available()?;
        let record = Transaction::from_new(Uuid::new_v4(), owner.clone(), input, Utc::now());
        self.lock()
            .entry(owner.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError> {
        self.check_available()?;
        let mut ledgers = self.lock();
        let record = ledgers
            .get_mut(owner)
            .and_then(|ledger| ledger.iter_mut().find(|t| t.id == id))
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        record.apply_patch(&patch, Utc::now());
        Ok(record.clone())
    }

    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<(), CoreError> {
        self.check_available()?;
        let mut ledgers = self.lock();
        let ledger = ledgers
            .get_mut(owner)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let idx = ledger
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        ledger.remove(idx);
        Ok(())
    }
}
