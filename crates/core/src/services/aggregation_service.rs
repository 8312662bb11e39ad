use std::collections::HashMap;

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::models::analytics::Aggregation;
use crate::models::category::CategorySummary;
use crate::models::transaction::{Transaction, TransactionType};
use crate::models::window::{Granularity, TimeBucket, WindowSpec};

/// Turns a ledger snapshot into time-bucketed series and category totals.
///
/// Pure: no I/O, no clock. The reference date ("today") is always passed
/// in, so the same snapshot, window and date give bit-identical output.
/// Records that are not `Transaction::is_well_formed` never pass mutation
/// validation; if a backend returns one anyway it is skipped here so the
/// output stays finite.
pub struct AggregationService;

impl AggregationService {
    pub fn new() -> Self {
        Self
    }

    /// Bucket `transactions` into `window` ending at `today`, and total
    /// expenses per category.
    ///
    /// Transactions outside the window are left out of the series but
    /// still count toward the category totals.
    pub fn aggregate(
        &self,
        transactions: &[Transaction],
        window: &WindowSpec,
        today: NaiveDate,
    ) -> Aggregation {
        let mut time_series = self.build_buckets(window, today);

        for t in transactions.iter().filter(|t| t.is_well_formed()) {
            if let Some(bucket) = find_bucket(&mut time_series, t.date()) {
                match t.transaction_type {
                    TransactionType::Income => bucket.add_income(t.amount),
                    TransactionType::Expense => bucket.add_expense(t.amount),
                }
            }
        }

        Aggregation {
            window: *window,
            time_series,
            category_summaries: self.category_summaries(transactions),
        }
    }

    /// Zero-valued buckets for `window`, oldest first, the newest one
    /// containing `today`.
    pub fn build_buckets(&self, window: &WindowSpec, today: NaiveDate) -> Vec<TimeBucket> {
        match window.granularity {
            Granularity::Daily => daily_buckets(window.length, today),
            Granularity::Weekly => weekly_buckets(window.length, today),
            Granularity::Monthly => monthly_buckets(window.length, today),
        }
    }

    /// Expense totals per category, in order of first appearance.
    /// Income never produces an entry.
    pub fn category_summaries(&self, transactions: &[Transaction]) -> Vec<CategorySummary> {
        let mut summaries: Vec<CategorySummary> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for t in transactions
            .iter()
            .filter(|t| t.is_expense() && t.is_well_formed())
        {
            match index.get(t.category.as_str()) {
                Some(&i) => summaries[i].total += t.amount,
                None => {
                    index.insert(t.category.as_str(), summaries.len());
                    summaries.push(CategorySummary::new(t.category.clone(), t.amount));
                }
            }
        }

        summaries
    }
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Buckets are contiguous and sorted, so the candidate is the last one
/// starting on or before `date`.
fn find_bucket(buckets: &mut [TimeBucket], date: NaiveDate) -> Option<&mut TimeBucket> {
    let idx = buckets.partition_point(|b| b.period_start <= date);
    if idx == 0 {
        return None;
    }
    let bucket = &mut buckets[idx - 1];
    if bucket.contains(date) {
        Some(bucket)
    } else {
        None
    }
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

fn daily_buckets(length: usize, today: NaiveDate) -> Vec<TimeBucket> {
    (0..length as u64)
        .rev()
        .map(|back| {
            let day = days_before(today, back);
            TimeBucket::empty(day.format("%a").to_string(), day, day)
        })
        .collect()
}

/// Week `i` (counting back from the newest) spans
/// `[today - 7i - 6, today - 7i]`.
fn weekly_buckets(length: usize, today: NaiveDate) -> Vec<TimeBucket> {
    (0..length)
        .map(|position| {
            let back = (length - 1 - position) as u64;
            let end = days_before(today, 7 * back);
            let start = days_before(end, 6);
            TimeBucket::empty(format!("Week {}", position + 1), start, end)
        })
        .collect()
}

fn monthly_buckets(length: usize, today: NaiveDate) -> Vec<TimeBucket> {
    let current = first_of_month(today);
    (0..length)
        .rev()
        .map(|back| {
            let start = u32::try_from(back)
                .ok()
                .and_then(|back| current.checked_sub_months(Months::new(back)))
                .unwrap_or(NaiveDate::MIN);
            let end = last_of_month(start);
            TimeBucket::empty(start.format("%b").to_string(), start, end)
        })
        .collect()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn last_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
