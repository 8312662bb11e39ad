use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::transaction::{
    NewTransaction, OwnerId, Transaction, TransactionPatch, MAX_AMOUNT,
};
use crate::stores::traits::LedgerStore;

/// Result of a delete. Both variants mean the transaction is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The store deleted the record
    Removed,
    /// The store had no such record (already deleted, or never existed)
    AlreadyAbsent,
}

/// Validates and applies ledger mutations against a store.
///
/// Validation happens before any store call, so a rejected input never
/// reaches the backend. Ownership of existing ids is left to the store.
/// Cache invalidation is the caller's job once the returned future has
/// resolved successfully.
pub struct MutationService;

impl MutationService {
    pub fn new() -> Self {
        Self
    }

    /// Validate `input` and persist it for `owner`.
    pub async fn create(
        &self,
        store: &dyn LedgerStore,
        owner: &OwnerId,
        input: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        let input = self.validate_new(input)?;
        let record = store.insert(owner, input).await?;
        tracing::info!(
            store = store.name(),
            %owner,
            id = %record.id,
            kind = %record.transaction_type,
            "transaction created"
        );
        Ok(record)
    }

    /// Validate the fields present in `patch` and merge them into `id`.
    pub async fn update(
        &self,
        store: &dyn LedgerStore,
        owner: &OwnerId,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError> {
        let patch = self.validate_patch(patch)?;
        let record = store.update(owner, id, patch).await?;
        tracing::info!(store = store.name(), %owner, %id, "transaction updated");
        Ok(record)
    }

    /// Delete `id`. A store `NotFound` already leaves the ledger in the
    /// requested state, so it is reported as `AlreadyAbsent`, not an error.
    pub async fn remove(
        &self,
        store: &dyn LedgerStore,
        owner: &OwnerId,
        id: Uuid,
    ) -> Result<RemoveOutcome, CoreError> {
        match store.delete(owner, id).await {
            Ok(()) => {
                tracing::info!(store = store.name(), %owner, %id, "transaction deleted");
                Ok(RemoveOutcome::Removed)
            }
            Err(CoreError::NotFound(_)) => {
                tracing::debug!(store = store.name(), %owner, %id, "delete of absent transaction");
                Ok(RemoveOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e),
        }
    }

    /// Reject invalid create input; trims description and category.
    pub fn validate_new(&self, mut input: NewTransaction) -> Result<NewTransaction, CoreError> {
        validate_amount(input.amount)?;
        input.description = required_text("description", &input.description)?;
        input.category = required_text("category", &input.category)?;
        Ok(input)
    }

    /// Reject an empty patch or any invalid field it carries.
    pub fn validate_patch(&self, mut patch: TransactionPatch) -> Result<TransactionPatch, CoreError> {
        if patch.is_empty() {
            return Err(CoreError::Validation("update contains no fields".into()));
        }
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }
        if let Some(description) = &patch.description {
            patch.description = Some(required_text("description", description)?);
        }
        if let Some(category) = &patch.category {
            patch.category = Some(required_text("category", category)?);
        }
        Ok(patch)
    }
}

impl Default for MutationService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_amount(amount: f64) -> Result<(), CoreError> {
    if !amount.is_finite() {
        return Err(CoreError::Validation(format!(
            "amount must be a finite number, got {amount}"
        )));
    }
    if amount <= 0.0 {
        return Err(CoreError::Validation(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(CoreError::Validation(format!(
            "amount must not exceed {MAX_AMOUNT}, got {amount}"
        )));
    }
    Ok(())
}

fn required_text(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
