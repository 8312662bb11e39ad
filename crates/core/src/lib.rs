pub mod cache;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod storage;
pub mod stores;

use std::sync::{Arc, RwLock};

use cache::{AggregationMemo, LedgerSnapshot, TransactionCache};
use chrono::NaiveDate;
use models::{
    analytics::{Aggregation, Metrics},
    category::{apply_palette, sort_categories},
    settings::{Settings, MAX_WINDOW_LENGTH},
    transaction::{
        LedgerTotals, NewTransaction, OwnerId, Transaction, TransactionPatch,
        TransactionSortOrder,
    },
    window::{Granularity, WindowSpec},
};
use services::{
    aggregation_service::AggregationService,
    metrics_service::MetricsService,
    mutation_service::{MutationService, RemoveOutcome},
};
use stores::{memory::MemoryLedgerStore, rest::RestLedgerStore, traits::LedgerStore};
use uuid::Uuid;

use errors::CoreError;

/// How many times a read retries when the ledger is invalidated while its
/// fetch is in flight.
const MAX_FETCH_ATTEMPTS: usize = 3;

/// Main entry point: one owner's session over a ledger store.
///
/// Reads go through an explicit cache (`TransactionCache`) that is
/// invalidated after every successful mutation and refetched before the
/// next aggregation. Mutations hold the shared side of `mutation_gate`
/// and snapshot reads the exclusive side, so a read waits for every
/// in-flight mutation to resolve before deciding whether to refetch.
#[must_use]
pub struct FinanceTracker {
    store: Arc<dyn LedgerStore>,
    owner: RwLock<OwnerId>,
    settings: Settings,
    cache: TransactionCache,
    memo: AggregationMemo,
    mutation_gate: tokio::sync::RwLock<()>,
    aggregation_service: AggregationService,
    metrics_service: MetricsService,
    mutation_service: MutationService,
}

impl std::fmt::Debug for FinanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owner = self.owner();
        f.debug_struct("FinanceTracker")
            .field("store", &self.store.name())
            .field("owner", &owner)
            .field("stale", &self.cache.is_stale(&owner))
            .field("memoized", &self.memo.len())
            .finish()
    }
}

impl FinanceTracker {
    /// Start a session for `owner` over `store` with default settings.
    pub fn new(store: Arc<dyn LedgerStore>, owner: OwnerId) -> Self {
        Self::build(store, owner, Settings::default())
    }

    /// Start a session with explicit settings. Settings are validated.
    pub fn with_settings(
        store: Arc<dyn LedgerStore>,
        owner: OwnerId,
        settings: Settings,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self::build(store, owner, settings))
    }

    /// Session over a fresh in-process store.
    pub fn in_memory(owner: OwnerId) -> Self {
        Self::new(Arc::new(MemoryLedgerStore::new()), owner)
    }

    /// Session over the REST backend described in `settings.rest`.
    pub fn from_settings(owner: OwnerId, settings: Settings) -> Result<Self, CoreError> {
        let rest = settings
            .rest
            .as_ref()
            .ok_or_else(|| CoreError::Config("no rest store configured".into()))?;
        let store = RestLedgerStore::new(rest)?;
        Self::with_settings(Arc::new(store), owner, settings)
    }

    /// Session over an encrypted ledger file (created on first write).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn open_file(
        path: impl AsRef<std::path::Path>,
        password: &str,
        owner: OwnerId,
    ) -> Result<Self, CoreError> {
        let store = stores::file::EncryptedFileLedger::open(path, password)?;
        Ok(Self::new(Arc::new(store), owner))
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Owner all reads and writes are currently scoped to.
    pub fn owner(&self) -> OwnerId {
        self.owner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rescope the session to another owner.
    ///
    /// The previous owner's entry is invalidated, so switching back always
    /// refetches; a fetch still in flight for the old owner can only land
    /// in the old owner's entry.
    pub fn switch_owner(&self, owner: OwnerId) {
        let previous = {
            let mut current = self.owner.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, owner)
        };
        self.cache.invalidate(&previous);
        self.memo.clear();
        tracing::info!(%previous, owner = %self.owner(), "switched ledger owner");
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    // ── Cache ───────────────────────────────────────────────────────

    /// Mark the current owner's snapshot stale; the next read refetches.
    pub fn invalidate(&self) {
        self.cache.invalidate(&self.owner());
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.cache.is_stale(&self.owner())
    }

    /// Most recent snapshot even if stale, e.g. to keep showing data while
    /// the store is unavailable.
    #[must_use]
    pub fn last_known_good(&self) -> Option<LedgerSnapshot> {
        self.cache.last_known_good(&self.owner())
    }

    /// Refetch the ledger regardless of cache state.
    pub async fn refresh(&self) -> Result<LedgerSnapshot, CoreError> {
        let _gate = self.mutation_gate.write().await;
        let owner = self.owner();
        self.cache.invalidate(&owner);
        self.fetch_fresh(&owner).await
    }

    /// Current fresh snapshot, fetching only if the cache is stale.
    pub async fn snapshot(&self) -> Result<LedgerSnapshot, CoreError> {
        let _gate = self.mutation_gate.write().await;
        let owner = self.owner();
        if let Some(snapshot) = self.cache.fresh(&owner) {
            tracing::debug!(%owner, version = snapshot.version, "ledger cache hit");
            return Ok(snapshot);
        }
        self.fetch_fresh(&owner).await
    }

    // ── Aggregation & Metrics ───────────────────────────────────────

    /// Time series and category totals for `window`, ending today (UTC).
    pub async fn get_aggregated_series(&self, window: WindowSpec) -> Result<Aggregation, CoreError> {
        self.get_aggregated_series_as_of(window, today()).await
    }

    /// Time series and category totals for `window`, ending at `today`.
    ///
    /// Category summaries come back in the configured order with palette
    /// colors assigned.
    pub async fn get_aggregated_series_as_of(
        &self,
        window: WindowSpec,
        today: NaiveDate,
    ) -> Result<Aggregation, CoreError> {
        check_window(&window)?;
        let snapshot = self.snapshot().await?;
        Ok(self.aggregate_snapshot(&snapshot, window, today))
    }

    /// Series for the configured default window of `granularity`.
    pub async fn get_default_series(&self, granularity: Granularity) -> Result<Aggregation, CoreError> {
        let window = self.settings.default_windows.for_granularity(granularity);
        self.get_aggregated_series(window).await
    }

    /// Headline totals over the whole ledger plus trend figures for `window`.
    pub async fn get_metrics(&self, window: WindowSpec) -> Result<Metrics, CoreError> {
        self.get_metrics_as_of(window, today()).await
    }

    pub async fn get_metrics_as_of(
        &self,
        window: WindowSpec,
        today: NaiveDate,
    ) -> Result<Metrics, CoreError> {
        check_window(&window)?;
        let snapshot = self.snapshot().await?;
        let aggregation = self.aggregate_snapshot(&snapshot, window, today);
        Ok(self
            .metrics_service
            .derive_metrics(snapshot.transactions(), &aggregation.time_series))
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Validate and persist a new transaction, then invalidate the cache.
    pub async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, CoreError> {
        let _gate = self.mutation_gate.read().await;
        let owner = self.owner();
        let record = self
            .mutation_service
            .create(self.store.as_ref(), &owner, input)
            .await
            .inspect_err(|e| log_mutation_failure("create", &owner, e))?;
        self.cache.invalidate(&owner);
        Ok(record)
    }

    /// Apply a partial update, then invalidate the cache.
    pub async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError> {
        let _gate = self.mutation_gate.read().await;
        let owner = self.owner();
        let record = self
            .mutation_service
            .update(self.store.as_ref(), &owner, id, patch)
            .await
            .inspect_err(|e| log_mutation_failure("update", &owner, e))?;
        self.cache.invalidate(&owner);
        Ok(record)
    }

    /// Delete a transaction, then invalidate the cache. Deleting an id
    /// that is already gone succeeds with `RemoveOutcome::AlreadyAbsent`.
    pub async fn delete_transaction(&self, id: Uuid) -> Result<RemoveOutcome, CoreError> {
        let _gate = self.mutation_gate.read().await;
        let owner = self.owner();
        let outcome = self
            .mutation_service
            .remove(self.store.as_ref(), &owner, id)
            .await
            .inspect_err(|e| log_mutation_failure("delete", &owner, e))?;
        self.cache.invalidate(&owner);
        Ok(outcome)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// All transactions, newest transaction date first.
    pub async fn transactions(&self) -> Result<Vec<Transaction>, CoreError> {
        self.transactions_sorted(&TransactionSortOrder::DateDesc).await
    }

    pub async fn transactions_sorted(
        &self,
        order: &TransactionSortOrder,
    ) -> Result<Vec<Transaction>, CoreError> {
        let snapshot = self.snapshot().await?;
        let mut transactions = snapshot.transactions().to_vec();
        match order {
            TransactionSortOrder::DateDesc => {
                transactions.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date))
            }
            TransactionSortOrder::DateAsc => {
                transactions.sort_by(|a, b| a.transaction_date.cmp(&b.transaction_date))
            }
            TransactionSortOrder::AmountDesc => transactions.sort_by(|a, b| b.amount.total_cmp(&a.amount)),
            TransactionSortOrder::AmountAsc => transactions.sort_by(|a, b| a.amount.total_cmp(&b.amount)),
            TransactionSortOrder::CategoryAsc => transactions.sort_by(|a, b| a.category.cmp(&b.category)),
        }
        Ok(transactions)
    }

    /// The `limit` most recent transactions.
    pub async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, CoreError> {
        let mut transactions = self.transactions().await?;
        transactions.truncate(limit);
        Ok(transactions)
    }

    /// Case-insensitive match on description and category, newest first.
    pub async fn search_transactions(&self, query: &str) -> Result<Vec<Transaction>, CoreError> {
        let q = query.to_lowercase();
        let transactions = self.transactions().await?;
        Ok(transactions
            .into_iter()
            .filter(|t| {
                t.description.to_lowercase().contains(&q) || t.category.to_lowercase().contains(&q)
            })
            .collect())
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, CoreError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.transactions().iter().find(|t| t.id == id).cloned())
    }

    /// Income, expenses and profit over the whole ledger.
    pub async fn totals(&self) -> Result<LedgerTotals, CoreError> {
        let snapshot = self.snapshot().await?;
        Ok(LedgerTotals::from_transactions(snapshot.transactions()))
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(store: Arc<dyn LedgerStore>, owner: OwnerId, settings: Settings) -> Self {
        Self {
            store,
            owner: RwLock::new(owner),
            settings,
            cache: TransactionCache::new(),
            memo: AggregationMemo::new(),
            mutation_gate: tokio::sync::RwLock::new(()),
            aggregation_service: AggregationService::new(),
            metrics_service: MetricsService::new(),
            mutation_service: MutationService::new(),
        }
    }

    /// Fetch until a snapshot is installed fresh. Caller holds the
    /// exclusive side of `mutation_gate`.
    async fn fetch_fresh(&self, owner: &OwnerId) -> Result<LedgerSnapshot, CoreError> {
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            let ticket = self.cache.begin_fetch(owner);
            let transactions = self.store.list(owner).await.inspect_err(|e| {
                tracing::warn!(
                    store = self.store.name(),
                    %owner,
                    error = %e,
                    "ledger fetch failed; keeping last-known-good snapshot"
                );
            })?;

            let malformed = transactions
                .iter()
                .filter(|t| !t.is_well_formed())
                .count();
            if malformed > 0 {
                tracing::warn!(%owner, malformed, "ledger contains records with invalid amounts; they are left out of series and totals");
            }

            let snapshot = self.cache.complete_fetch(ticket, transactions).into_snapshot();
            if !self.cache.is_stale(owner) {
                return Ok(snapshot);
            }
            tracing::debug!(%owner, attempt, "ledger invalidated during fetch; retrying");
        }
        Err(CoreError::StoreUnavailable(format!(
            "ledger for {owner} kept changing during {MAX_FETCH_ATTEMPTS} fetch attempts"
        )))
    }

    fn aggregate_snapshot(
        &self,
        snapshot: &LedgerSnapshot,
        window: WindowSpec,
        today: NaiveDate,
    ) -> Aggregation {
        let key = (snapshot.version, window, today);
        let mut aggregation = match self.memo.get(&key) {
            Some(hit) => hit,
            None => {
                let fresh = self
                    .aggregation_service
                    .aggregate(snapshot.transactions(), &window, today);
                self.memo.insert(key, fresh.clone());
                fresh
            }
        };
        sort_categories(&mut aggregation.category_summaries, self.settings.category_order);
        apply_palette(&mut aggregation.category_summaries, &self.settings.palette);
        aggregation
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn check_window(window: &WindowSpec) -> Result<(), CoreError> {
    if window.length > MAX_WINDOW_LENGTH {
        return Err(CoreError::Validation(format!(
            "window of {} buckets exceeds maximum of {MAX_WINDOW_LENGTH}",
            window.length
        )));
    }
    Ok(())
}

fn log_mutation_failure(operation: &str, owner: &OwnerId, error: &CoreError) {
    tracing::warn!(operation, %owner, kind = ?error.kind(), error = %error, "ledger mutation failed");
}
