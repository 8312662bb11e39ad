use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Size of a single bucket in a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Daily => write!(f, "daily"),
            Granularity::Weekly => write!(f, "weekly"),
            Granularity::Monthly => write!(f, "monthly"),
        }
    }
}

/// A contiguous, fixed-length window of buckets ending at the reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSpec {
    pub granularity: Granularity,
    /// Number of buckets; the series always has exactly this many entries.
    pub length: usize,
}

impl WindowSpec {
    pub fn new(granularity: Granularity, length: usize) -> Self {
        Self { granularity, length }
    }

    pub fn days(length: usize) -> Self {
        Self::new(Granularity::Daily, length)
    }

    pub fn weeks(length: usize) -> Self {
        Self::new(Granularity::Weekly, length)
    }

    pub fn months(length: usize) -> Self {
        Self::new(Granularity::Monthly, length)
    }

    /// Number of buckets in the window.
    pub fn bucket_count(&self) -> usize {
        self.length
    }
}

impl std::fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} x{}", self.granularity, self.length)
    }
}

/// One bucket of a time series. Empty buckets are zero-valued, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Display label: "Jan", "Week 1", "Mon"
    pub label: String,

    /// First day covered (inclusive)
    pub period_start: NaiveDate,

    /// Last day covered (inclusive)
    pub period_end: NaiveDate,

    pub income: f64,

    pub expenses: f64,

    /// Always `income - expenses`
    pub profit: f64,
}

impl TimeBucket {
    pub fn empty(label: impl Into<String>, period_start: NaiveDate, period_end: NaiveDate) -> Self {
        Self {
            label: label.into(),
            period_start,
            period_end,
            income: 0.0,
            expenses: 0.0,
            profit: 0.0,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.period_start && date <= self.period_end
    }

    pub(crate) fn add_income(&mut self, amount: f64) {
        self.income += amount;
        self.profit = self.income - self.expenses;
    }

    pub(crate) fn add_expense(&mut self, amount: f64) {
        self.expenses += amount;
        self.profit = self.income - self.expenses;
    }
}
