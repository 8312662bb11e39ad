use serde::{Deserialize, Serialize};

use super::category::CategorySummary;
use super::window::{TimeBucket, WindowSpec};

/// Output of one aggregation pass over a ledger snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// The window the series was generated for
    pub window: WindowSpec,

    /// Exactly `window.length` buckets, oldest first
    pub time_series: Vec<TimeBucket>,

    /// Expense totals per category
    pub category_summaries: Vec<CategorySummary>,
}

/// Scalar statistics for the dashboard headline and analytics cards.
///
/// Every field is finite. Totals cover the whole ledger; `average_profit`
/// and `growth_rate` come from the bucketed series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_income: f64,

    pub total_expenses: f64,

    /// `total_income - total_expenses`
    pub profit: f64,

    /// Mean bucket profit; 0 for an empty series
    pub average_profit: f64,

    /// Percent change in profit between the two newest buckets.
    /// 0 when the previous bucket's profit is 0.
    pub growth_rate: f64,
}
