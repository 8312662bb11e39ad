use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::analytics::Aggregation;
use crate::models::transaction::{OwnerId, Transaction};
use crate::models::window::WindowSpec;

/// A fully fetched copy of one owner's ledger.
///
/// `version` is unique per installed snapshot within a cache, so it can key
/// derived results.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub owner: OwnerId,
    pub version: u64,
    pub transactions: Arc<Vec<Transaction>>,
    pub fetched_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Handed out when a fetch is issued; presented again when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    owner: OwnerId,
    issue: u64,
}

impl FetchTicket {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn issue(&self) -> u64 {
        self.issue
    }
}

/// What happened to the result of a completed fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The result is now the owner's snapshot.
    Installed(LedgerSnapshot),
    /// A fetch issued later already installed its result; this one was
    /// dropped. Carries the snapshot that stays in place.
    Superseded(LedgerSnapshot),
}

impl FetchOutcome {
    pub fn snapshot(&self) -> &LedgerSnapshot {
        match self {
            FetchOutcome::Installed(s) | FetchOutcome::Superseded(s) => s,
        }
    }

    pub fn into_snapshot(self) -> LedgerSnapshot {
        match self {
            FetchOutcome::Installed(s) | FetchOutcome::Superseded(s) => s,
        }
    }

    pub fn was_installed(&self) -> bool {
        matches!(self, FetchOutcome::Installed(_))
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    snapshot: Option<LedgerSnapshot>,
    /// Issue number of the fetch that produced `snapshot`.
    installed_issue: Option<u64>,
    /// Fetches issued before this number started before the last
    /// invalidation and cannot make the entry fresh again.
    fresh_from_issue: u64,
    stale: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<OwnerId, CacheEntry>,
    next_issue: u64,
    next_version: u64,
}

/// In-memory reflection of each owner's ledger.
///
/// Discipline is invalidate-then-refetch: entries are never patched in
/// place. Invalidation keeps the last snapshot around as last-known-good
/// but marks it stale so no aggregation runs against it. Completed fetches
/// are installed last-writer-wins by issue order, not completion order.
#[derive(Debug, Default)]
pub struct TransactionCache {
    state: Mutex<CacheState>,
}

impl TransactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The owner's snapshot if one is installed and not stale.
    pub fn fresh(&self, owner: &OwnerId) -> Option<LedgerSnapshot> {
        let state = self.lock();
        state
            .entries
            .get(owner)
            .filter(|e| !e.stale)
            .and_then(|e| e.snapshot.clone())
    }

    /// The owner's most recent snapshot, stale or not.
    pub fn last_known_good(&self, owner: &OwnerId) -> Option<LedgerSnapshot> {
        self.lock()
            .entries
            .get(owner)
            .and_then(|e| e.snapshot.clone())
    }

    pub fn is_stale(&self, owner: &OwnerId) -> bool {
        self.lock()
            .entries
            .get(owner)
            .map_or(true, |e| e.stale || e.snapshot.is_none())
    }

    /// Register a fetch about to be sent to the store.
    pub fn begin_fetch(&self, owner: &OwnerId) -> FetchTicket {
        let mut state = self.lock();
        state.next_issue += 1;
        let issue = state.next_issue;
        state.entries.entry(owner.clone()).or_insert_with(|| CacheEntry {
            stale: true,
            ..CacheEntry::default()
        });
        FetchTicket {
            owner: owner.clone(),
            issue,
        }
    }

    /// Offer a completed fetch's result.
    ///
    /// Installed unless a fetch issued after `ticket` has already been
    /// installed. An installed result only clears the stale flag if its
    /// fetch was issued after the latest invalidation.
    pub fn complete_fetch(&self, ticket: FetchTicket, transactions: Vec<Transaction>) -> FetchOutcome {
        let mut state = self.lock();
        state.next_version += 1;
        let version = state.next_version;
        let entry = state.entries.entry(ticket.owner.clone()).or_default();

        if let (Some(installed), Some(current)) = (entry.installed_issue, &entry.snapshot) {
            if installed > ticket.issue {
                tracing::warn!(
                    owner = %ticket.owner,
                    issue = ticket.issue,
                    installed,
                    "discarding superseded ledger fetch"
                );
                return FetchOutcome::Superseded(current.clone());
            }
        }

        let snapshot = LedgerSnapshot {
            owner: ticket.owner.clone(),
            version,
            transactions: Arc::new(transactions),
            fetched_at: Utc::now(),
        };
        entry.snapshot = Some(snapshot.clone());
        entry.installed_issue = Some(ticket.issue);
        entry.stale = ticket.issue < entry.fresh_from_issue;
        tracing::debug!(
            owner = %ticket.owner,
            issue = ticket.issue,
            version,
            transactions = snapshot.len(),
            stale = entry.stale,
            "installed ledger snapshot"
        );
        FetchOutcome::Installed(snapshot)
    }

    /// Mark the owner's entry stale; the snapshot stays as last-known-good.
    pub fn invalidate(&self, owner: &OwnerId) {
        let mut state = self.lock();
        let fresh_from = state.next_issue + 1;
        if let Some(entry) = state.entries.get_mut(owner) {
            entry.stale = true;
            entry.fresh_from_issue = fresh_from;
            tracing::debug!(%owner, "invalidated ledger cache");
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Key for a memoized aggregation.
pub type MemoKey = (u64, WindowSpec, NaiveDate);

/// Aggregations computed from one snapshot version.
///
/// Entries for any other version are dropped on insert, so the memo never
/// serves results derived from a replaced snapshot.
#[derive(Debug, Default)]
pub struct AggregationMemo {
    entries: Mutex<HashMap<MemoKey, Aggregation>>,
}

impl AggregationMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MemoKey) -> Option<Aggregation> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: MemoKey, aggregation: Aggregation) {
        let mut entries = self.lock();
        entries.retain(|(version, _, _), _| *version == key.0);
        entries.insert(key, aggregation);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MemoKey, Aggregation>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
