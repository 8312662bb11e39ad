use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::transaction::{NewTransaction, OwnerId, Transaction, TransactionPatch};

/// Contract for every ledger backend (in-memory, REST, encrypted file).
///
/// Every operation is scoped to one owner. Implementations must report
/// transport failures as `CoreError::StoreUnavailable` and missing or
/// foreign ids as `CoreError::NotFound`; the rest of the crate relies on
/// those two kinds to decide what is fatal.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait LedgerStore: Send + Sync {
    /// Human-readable name of this store (for logs/errors).
    fn name(&self) -> &str;

    /// All transactions owned by `owner`, in no particular order.
    async fn list(&self, owner: &OwnerId) -> Result<Vec<Transaction>, CoreError>;

    /// Persist a new transaction. The store assigns `id` and audit stamps.
    async fn insert(
        &self,
        owner: &OwnerId,
        input: NewTransaction,
    ) -> Result<Transaction, CoreError>;

    /// Merge `patch` into the owner's transaction `id`.
    async fn update(
        &self,
        owner: &OwnerId,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError>;

    /// Delete the owner's transaction `id`.
    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<(), CoreError>;
}
