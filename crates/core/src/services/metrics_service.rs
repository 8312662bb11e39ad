use crate::models::analytics::Metrics;
use crate::models::transaction::{LedgerTotals, Transaction};
use crate::models::window::TimeBucket;

/// Derives the scalar statistics shown on the dashboard and analytics views.
///
/// Headline totals always cover the whole ledger; the series only feeds the
/// trend figures. No field is ever NaN or infinite.
pub struct MetricsService;

impl MetricsService {
    pub fn new() -> Self {
        Self
    }

    pub fn derive_metrics(&self, transactions: &[Transaction], series: &[TimeBucket]) -> Metrics {
        let totals = LedgerTotals::from_transactions(transactions);
        Metrics {
            total_income: finite_or_zero(totals.total_income),
            total_expenses: finite_or_zero(totals.total_expenses),
            profit: finite_or_zero(totals.profit),
            average_profit: self.average_profit(series),
            growth_rate: self.growth_rate(series),
        }
    }

    /// Mean profit per bucket; 0 for an empty series.
    pub fn average_profit(&self, series: &[TimeBucket]) -> f64 {
        if series.is_empty() {
            return 0.0;
        }
        let total: f64 = series.iter().map(|b| b.profit).sum();
        finite_or_zero(total / series.len() as f64)
    }

    /// Percent change in profit from the second-newest to the newest bucket.
    ///
    /// A previous profit of exactly 0 yields 0 rather than an infinite rate,
    /// as does a series with fewer than two buckets.
    pub fn growth_rate(&self, series: &[TimeBucket]) -> f64 {
        let [.., previous, latest] = series else {
            return 0.0;
        };
        if previous.profit == 0.0 {
            return 0.0;
        }
        finite_or_zero((latest.profit - previous.profit) / previous.profit.abs() * 100.0)
    }
}

impl Default for MetricsService {
    fn default() -> Self {
        Self::new()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
