// ═══════════════════════════════════════════════════════════════════
// Integration Tests: FinanceTracker end to end over real stores
// ═══════════════════════════════════════════════════════════════════

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use finance_tracker_core::errors::CoreError;
use finance_tracker_core::models::category::CategorySortOrder;
use finance_tracker_core::models::settings::{RestStoreConfig, Settings};
use finance_tracker_core::models::transaction::{
    NewTransaction, OwnerId, Transaction, TransactionPatch, TransactionSortOrder, MAX_AMOUNT,
};
use finance_tracker_core::models::window::{Granularity, WindowSpec};
use finance_tracker_core::services::mutation_service::RemoveOutcome;
use finance_tracker_core::stores::memory::MemoryLedgerStore;
use finance_tracker_core::stores::traits::LedgerStore;
use finance_tracker_core::FinanceTracker;

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn jan_31() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
}

fn owner() -> OwnerId {
    OwnerId::new("owner-1")
}

/// Tracker plus a handle on its store for simulating outages.
fn tracker() -> (FinanceTracker, Arc<MemoryLedgerStore>) {
    let store = Arc::new(MemoryLedgerStore::new());
    (FinanceTracker::new(store.clone(), owner()), store)
}

async fn seed_january(tracker: &FinanceTracker) -> (Transaction, Transaction) {
    let income = tracker
        .create_transaction(NewTransaction::income("Consulting fee", 100.0, "Services", ts(2024, 1, 5)))
        .await
        .unwrap();
    let expense = tracker
        .create_transaction(NewTransaction::expense("Office supplies", 40.0, "Supplies", ts(2024, 1, 10)))
        .await
        .unwrap();
    (income, expense)
}

/// Memory store that counts `list` calls and can delay writes.
struct InstrumentedStore {
    inner: MemoryLedgerStore,
    lists: AtomicUsize,
    write_delay: Duration,
}

impl InstrumentedStore {
    fn new(write_delay: Duration) -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            lists: AtomicUsize::new(0),
            write_delay,
        }
    }

    fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for InstrumentedStore {
    fn name(&self) -> &str {
        "Instrumented"
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Transaction>, CoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(owner).await
    }

    async fn insert(&self, owner: &OwnerId, input: NewTransaction) -> Result<Transaction, CoreError> {
        tokio::time::sleep(self.write_delay).await;
        self.inner.insert(owner, input).await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError> {
        tokio::time::sleep(self.write_delay).await;
        self.inner.update(owner, id, patch).await
    }

    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<(), CoreError> {
        tokio::time::sleep(self.write_delay).await;
        self.inner.delete(owner, id).await
    }
}

// ═══════════════════════════════════════════════════════════════════
// Aggregation through the facade
// ═══════════════════════════════════════════════════════════════════

mod aggregation {
    use super::*;

    #[tokio::test]
    async fn january_example() {
        let (tracker, _) = tracker();
        seed_january(&tracker).await;

        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        assert_eq!(agg.time_series.len(), 1);
        let jan = &agg.time_series[0];
        assert_eq!((jan.income, jan.expenses, jan.profit), (100.0, 40.0, 60.0));

        assert_eq!(agg.category_summaries.len(), 1);
        assert_eq!(agg.category_summaries[0].category, "Supplies");
        assert_eq!(agg.category_summaries[0].total, 40.0);
        assert_eq!(agg.category_summaries[0].color.as_deref(), Some("#10B981"));

        let metrics = tracker.get_metrics_as_of(WindowSpec::months(1), jan_31()).await.unwrap();
        assert_eq!(metrics.total_income, 100.0);
        assert_eq!(metrics.total_expenses, 40.0);
        assert_eq!(metrics.profit, 60.0);
    }

    #[tokio::test]
    async fn delete_is_reflected_in_next_aggregation() {
        let (tracker, _) = tracker();
        let (_, expense) = seed_january(&tracker).await;
        tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();

        let outcome = tracker.delete_transaction(expense.id).await.unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);

        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        let jan = &agg.time_series[0];
        assert_eq!((jan.income, jan.expenses, jan.profit), (100.0, 0.0, 100.0));
        assert!(agg.category_summaries.is_empty());
    }

    #[tokio::test]
    async fn update_is_reflected_in_next_aggregation() {
        let (tracker, _) = tracker();
        let (_, expense) = seed_january(&tracker).await;
        tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();

        tracker
            .update_transaction(expense.id, TransactionPatch::default().amount(70.0).category("Rent"))
            .await
            .unwrap();

        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        assert_eq!(agg.time_series[0].expenses, 70.0);
        assert_eq!(agg.category_summaries[0].category, "Rent");
    }

    #[tokio::test]
    async fn empty_ledger_gives_zero_filled_series() {
        let (tracker, _) = tracker();
        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::weeks(4), jan_31())
            .await
            .unwrap();
        assert_eq!(agg.time_series.len(), 4);
        assert!(agg.time_series.iter().all(|b| b.profit == 0.0));

        let metrics = tracker.get_metrics_as_of(WindowSpec::weeks(4), jan_31()).await.unwrap();
        assert_eq!(metrics.growth_rate, 0.0);
        assert_eq!(metrics.average_profit, 0.0);
    }

    #[tokio::test]
    async fn default_series_uses_configured_lengths() {
        let (tracker, _) = tracker();
        assert_eq!(tracker.get_default_series(Granularity::Daily).await.unwrap().time_series.len(), 7);
        assert_eq!(tracker.get_default_series(Granularity::Weekly).await.unwrap().time_series.len(), 4);
        assert_eq!(tracker.get_default_series(Granularity::Monthly).await.unwrap().time_series.len(), 6);
    }

    #[tokio::test]
    async fn oversized_window_is_rejected_before_fetch() {
        let store = Arc::new(InstrumentedStore::new(Duration::ZERO));
        let tracker = FinanceTracker::new(store.clone(), owner());
        let err = tracker
            .get_aggregated_series(WindowSpec::days(10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn settings_drive_category_order_and_palette() {
        let settings = Settings {
            palette: vec!["#111111".into(), "#222222".into()],
            category_order: CategorySortOrder::TotalDesc,
            ..Settings::default()
        };
        let tracker =
            FinanceTracker::with_settings(Arc::new(MemoryLedgerStore::new()), owner(), settings).unwrap();
        for (amount, category) in [(5.0, "Rent"), (50.0, "Marketing"), (20.0, "Supplies")] {
            tracker
                .create_transaction(NewTransaction::expense("x", amount, category, ts(2024, 1, 3)))
                .await
                .unwrap();
        }

        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        let got: Vec<(&str, Option<&str>)> = agg
            .category_summaries
            .iter()
            .map(|s| (s.category.as_str(), s.color.as_deref()))
            .collect();
        assert_eq!(
            got,
            [
                ("Marketing", Some("#111111")),
                ("Supplies", Some("#222222")),
                ("Rent", Some("#111111")),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let settings = Settings {
            palette: Vec::new(),
            ..Settings::default()
        };
        let result = FinanceTracker::with_settings(Arc::new(MemoryLedgerStore::new()), owner(), settings);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn huge_amounts_keep_series_and_totals_finite() {
        let (tracker, _) = tracker();
        let err = tracker
            .create_transaction(NewTransaction::income("Windfall", 1e308, "Sales", ts(2024, 1, 5)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        for _ in 0..2 {
            tracker
                .create_transaction(NewTransaction::income("Windfall", MAX_AMOUNT, "Sales", ts(2024, 1, 5)))
                .await
                .unwrap();
        }
        tracker
            .create_transaction(NewTransaction::expense("Office supplies", 40.0, "Supplies", ts(2024, 1, 10)))
            .await
            .unwrap();

        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        let jan = &agg.time_series[0];
        assert!(jan.income.is_finite() && jan.profit.is_finite());
        assert_eq!(jan.income, 2.0 * MAX_AMOUNT);

        let metrics = tracker.get_metrics_as_of(WindowSpec::months(1), jan_31()).await.unwrap();
        assert_eq!(metrics.total_income, 2.0 * MAX_AMOUNT);
        assert_eq!(metrics.total_expenses, 40.0);
        assert_eq!(metrics.profit, metrics.total_income - metrics.total_expenses);
    }

    #[tokio::test]
    async fn malformed_backend_rows_are_left_out_of_series_and_totals() {
        let mut negative = Transaction::from_new(
            Uuid::new_v4(),
            owner(),
            NewTransaction::income("Refund glitch", 1.0, "Sales", ts(2024, 1, 6)),
            ts(2024, 1, 6),
        );
        negative.amount = -50.0;
        let mut oversized = negative.clone();
        oversized.id = Uuid::new_v4();
        oversized.amount = 1e308;
        let good = Transaction::from_new(
            Uuid::new_v4(),
            owner(),
            NewTransaction::income("Consulting fee", 100.0, "Services", ts(2024, 1, 5)),
            ts(2024, 1, 5),
        );
        let store = Arc::new(MemoryLedgerStore::with_transactions(vec![good, negative, oversized]));
        let tracker = FinanceTracker::new(store, owner());

        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        let metrics = tracker.get_metrics_as_of(WindowSpec::months(1), jan_31()).await.unwrap();
        let totals = tracker.totals().await.unwrap();

        assert_eq!(agg.time_series[0].income, 100.0);
        assert!(agg.time_series[0].income <= metrics.total_income);
        assert_eq!(metrics.total_income, 100.0);
        assert_eq!(metrics.profit, 100.0);
        assert_eq!(totals.total_income, 100.0);
        // The rows are still listed; only the sums skip them.
        assert_eq!(tracker.transactions().await.unwrap().len(), 3);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Cache behaviour
// ═══════════════════════════════════════════════════════════════════

mod cache {
    use super::*;

    #[tokio::test]
    async fn repeated_reads_hit_cache() {
        let store = Arc::new(InstrumentedStore::new(Duration::ZERO));
        let tracker = FinanceTracker::new(store.clone(), owner());

        tracker.get_aggregated_series_as_of(WindowSpec::months(6), jan_31()).await.unwrap();
        tracker.get_metrics_as_of(WindowSpec::months(6), jan_31()).await.unwrap();
        tracker.transactions().await.unwrap();
        assert_eq!(store.list_calls(), 1);
        assert!(!tracker.is_stale());
    }

    #[tokio::test]
    async fn mutation_invalidates_and_next_read_refetches() {
        let store = Arc::new(InstrumentedStore::new(Duration::ZERO));
        let tracker = FinanceTracker::new(store.clone(), owner());
        tracker.snapshot().await.unwrap();

        tracker
            .create_transaction(NewTransaction::income("Sale", 10.0, "Sales", ts(2024, 1, 2)))
            .await
            .unwrap();
        assert!(tracker.is_stale());

        let snapshot = tracker.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn failed_mutation_does_not_invalidate() {
        let (tracker, _) = tracker();
        tracker.snapshot().await.unwrap();

        let err = tracker
            .create_transaction(NewTransaction::income("Sale", 0.0, "Sales", ts(2024, 1, 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(!tracker.is_stale());
    }

    #[tokio::test]
    async fn snapshot_versions_increase() {
        let (tracker, _) = tracker();
        let first = tracker.snapshot().await.unwrap();
        let second = tracker.refresh().await.unwrap();
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn store_outage_keeps_last_known_good() {
        let (tracker, store) = tracker();
        seed_january(&tracker).await;
        let good = tracker.snapshot().await.unwrap();

        store.set_available(false);
        tracker.invalidate();
        let err = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));

        let kept = tracker.last_known_good().unwrap();
        assert_eq!(kept.version, good.version);
        assert_eq!(kept.len(), 2);
        assert!(tracker.is_stale());

        store.set_available(true);
        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        assert_eq!(agg.time_series[0].profit, 60.0);
    }

    #[tokio::test]
    async fn mutation_during_outage_fails_without_side_effects() {
        let (tracker, store) = tracker();
        store.set_available(false);
        let err = tracker
            .create_transaction(NewTransaction::income("Sale", 10.0, "Sales", ts(2024, 1, 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        store.set_available(true);
        assert!(tracker.transactions().await.unwrap().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Mutations
// ═══════════════════════════════════════════════════════════════════

mod mutations {
    use super::*;

    #[tokio::test]
    async fn invalid_input_never_reaches_store() {
        let (tracker, store) = tracker();
        for input in [
            NewTransaction::expense("x", -1.0, "Rent", ts(2024, 1, 1)),
            NewTransaction::expense("x", f64::NAN, "Rent", ts(2024, 1, 1)),
            NewTransaction::expense("", 1.0, "Rent", ts(2024, 1, 1)),
            NewTransaction::expense("x", 1.0, "  ", ts(2024, 1, 1)),
        ] {
            let err = tracker.create_transaction(input).await.unwrap_err();
            assert!(err.is_user_correctable());
        }
        assert_eq!(store.len_for(&owner()), 0);
    }

    #[tokio::test]
    async fn delete_twice_is_idempotent() {
        let (tracker, _) = tracker();
        let (income, _) = seed_january(&tracker).await;
        assert_eq!(tracker.delete_transaction(income.id).await.unwrap(), RemoveOutcome::Removed);
        assert_eq!(
            tracker.delete_transaction(income.id).await.unwrap(),
            RemoveOutcome::AlreadyAbsent
        );
        assert_eq!(tracker.transactions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let (tracker, _) = tracker();
        let err = tracker
            .update_transaction(Uuid::new_v4(), TransactionPatch::default().amount(5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_keeps_identity_and_bumps_updated_at() {
        let (tracker, _) = tracker();
        let (income, _) = seed_january(&tracker).await;
        let updated = tracker
            .update_transaction(income.id, TransactionPatch::default().description("Retainer"))
            .await
            .unwrap();
        assert_eq!(updated.id, income.id);
        assert_eq!(updated.created_at, income.created_at);
        assert!(updated.updated_at >= income.updated_at);
        assert_eq!(updated.description, "Retainer");
        assert_eq!(updated.amount, 100.0);
    }

    #[tokio::test]
    async fn read_waits_for_in_flight_mutation() {
        let store = Arc::new(InstrumentedStore::new(Duration::from_millis(50)));
        let tracker = FinanceTracker::new(store.clone(), owner());
        tracker.snapshot().await.unwrap();

        // The create is polled first and holds the mutation gate while the
        // store write sleeps; the read must observe its result.
        let (created, agg) = tokio::join!(
            tracker.create_transaction(NewTransaction::income("Sale", 25.0, "Sales", ts(2024, 1, 20))),
            tracker.get_aggregated_series_as_of(WindowSpec::months(1), jan_31()),
        );
        created.unwrap();
        assert_eq!(agg.unwrap().time_series[0].income, 25.0);
    }

    #[tokio::test]
    async fn concurrent_mutations_all_land() {
        let store = Arc::new(InstrumentedStore::new(Duration::from_millis(5)));
        let tracker = Arc::new(FinanceTracker::new(store.clone(), owner()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                tracker
                    .create_transaction(NewTransaction::income("Sale", (i + 1) as f64, "Sales", ts(2024, 1, 15)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let totals = tracker.totals().await.unwrap();
        assert_eq!(totals.total_income, 36.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Queries & session
// ═══════════════════════════════════════════════════════════════════

mod queries {
    use super::*;

    #[tokio::test]
    async fn transactions_newest_first_and_sorted_variants() {
        let (tracker, _) = tracker();
        seed_january(&tracker).await;
        tracker
            .create_transaction(NewTransaction::expense("Ads", 15.0, "Marketing", ts(2024, 1, 7)))
            .await
            .unwrap();

        let newest: Vec<f64> = tracker.transactions().await.unwrap().iter().map(|t| t.amount).collect();
        assert_eq!(newest, [40.0, 15.0, 100.0]);

        let by_amount: Vec<f64> = tracker
            .transactions_sorted(&TransactionSortOrder::AmountAsc)
            .await
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .collect();
        assert_eq!(by_amount, [15.0, 40.0, 100.0]);

        let by_category: Vec<String> = tracker
            .transactions_sorted(&TransactionSortOrder::CategoryAsc)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.category)
            .collect();
        assert_eq!(by_category, ["Marketing", "Services", "Supplies"]);

        assert_eq!(tracker.recent_transactions(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_matches_description_and_category() {
        let (tracker, _) = tracker();
        seed_january(&tracker).await;
        assert_eq!(tracker.search_transactions("OFFICE").await.unwrap().len(), 1);
        assert_eq!(tracker.search_transactions("services").await.unwrap().len(), 1);
        assert!(tracker.search_transactions("payroll").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_transaction_and_totals() {
        let (tracker, _) = tracker();
        let (income, _) = seed_january(&tracker).await;
        assert_eq!(tracker.get_transaction(income.id).await.unwrap().unwrap().amount, 100.0);
        assert!(tracker.get_transaction(Uuid::new_v4()).await.unwrap().is_none());

        let totals = tracker.totals().await.unwrap();
        assert_eq!(totals.profit, 60.0);
    }

    #[tokio::test]
    async fn switch_owner_isolates_ledgers() {
        let (tracker, _) = tracker();
        seed_january(&tracker).await;
        assert_eq!(tracker.transactions().await.unwrap().len(), 2);

        tracker.switch_owner(OwnerId::new("owner-2"));
        assert_eq!(tracker.owner(), OwnerId::new("owner-2"));
        assert!(tracker.transactions().await.unwrap().is_empty());
        let agg = tracker
            .get_aggregated_series_as_of(WindowSpec::months(1), jan_31())
            .await
            .unwrap();
        assert_eq!(agg.time_series[0].income, 0.0);

        tracker.switch_owner(owner());
        assert_eq!(tracker.transactions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn from_settings_requires_rest_config() {
        let err = FinanceTracker::from_settings(owner(), Settings::default()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));

        let settings = Settings {
            rest: Some(RestStoreConfig {
                base_url: "https://example.supabase.co".into(),
                api_key: "anon".into(),
                table: "transactions".into(),
                timeout_secs: 5,
            }),
            ..Settings::default()
        };
        let tracker = FinanceTracker::from_settings(owner(), settings).unwrap();
        assert_eq!(tracker.store_name(), "PostgREST");
    }

    #[tokio::test]
    async fn encrypted_file_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.ftlg");
        {
            let tracker = FinanceTracker::open_file(&path, "pw", owner()).unwrap();
            seed_january(&tracker).await;
        }
        let tracker = FinanceTracker::open_file(&path, "pw", owner()).unwrap();
        let metrics = tracker.get_metrics_as_of(WindowSpec::months(1), jan_31()).await.unwrap();
        assert_eq!(metrics.profit, 60.0);
        assert!(format!("{tracker:?}").contains("EncryptedFile"));
    }

    #[test]
    fn tracker_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FinanceTracker>();
    }
}
