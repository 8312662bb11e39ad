use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest accepted amount. Keeps every sum the engine produces finite.
pub const MAX_AMOUNT: f64 = 1e12;

/// Identity that owns a ledger. Every read and write is scoped to one owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Direction of a transaction. The stored amount is always a magnitude;
/// the sign comes from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Income => write!(f, "income"),
            TransactionType::Expense => write!(f, "expense"),
        }
    }
}

/// Sort order for transaction listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSortOrder {
    /// Newest transaction date first (default for display)
    DateDesc,
    /// Oldest transaction date first
    DateAsc,
    /// Largest amount first
    AmountDesc,
    /// Smallest amount first
    AmountAsc,
    /// Alphabetical by category
    CategoryAsc,
}

/// A single persisted income/expense record.
///
/// `transaction_date` drives bucketing. `created_at` and `updated_at` are
/// audit stamps set by the store and never affect aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,

    #[serde(rename = "user_id")]
    pub owner: OwnerId,

    pub description: String,

    /// Non-negative magnitude
    pub amount: f64,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    pub category: String,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub transaction_date: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// UTC calendar date of `transaction_date`, the key for daily buckets.
    pub fn date(&self) -> NaiveDate {
        self.transaction_date.date_naive()
    }

    /// Finite, non-negative and within `MAX_AMOUNT`. Rows failing this are
    /// left out of series, category totals and headline totals alike.
    pub fn is_well_formed(&self) -> bool {
        self.amount.is_finite() && (0.0..=MAX_AMOUNT).contains(&self.amount)
    }

    pub fn is_income(&self) -> bool {
        self.transaction_type == TransactionType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }

    /// Amount with the sign implied by the type (expenses negative).
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    /// Build the record a store persists for `input`, stamping audit times.
    pub fn from_new(id: Uuid, owner: OwnerId, input: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            description: input.description,
            amount: input.amount,
            transaction_type: input.transaction_type,
            category: input.category,
            transaction_date: input.transaction_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch into this record. `id`, `owner` and `created_at` are kept.
    pub fn apply_patch(&mut self, patch: &TransactionPatch, now: DateTime<Utc>) {
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(transaction_type) = patch.transaction_type {
            self.transaction_type = transaction_type;
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(date) = patch.transaction_date {
            self.transaction_date = date;
        }
        self.updated_at = now;
    }
}

/// Accept either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date
/// (midnight UTC); ledger backends differ in how they store the column.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date into UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid transaction date '{raw}'"))
}

/// Input for creating a transaction. The store assigns id and audit stamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub description: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    pub transaction_date: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(
        transaction_type: TransactionType,
        description: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            description: description.into(),
            amount,
            transaction_type,
            category: category.into(),
            transaction_date,
        }
    }

    pub fn income(
        description: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self::new(TransactionType::Income, description, amount, category, transaction_date)
    }

    pub fn expense(
        description: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self::new(TransactionType::Expense, description, amount, category, transaction_date)
    }
}

/// Partial update. `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.amount.is_none()
            && self.transaction_type.is_none()
            && self.category.is_none()
            && self.transaction_date.is_none()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn transaction_date(mut self, date: DateTime<Utc>) -> Self {
        self.transaction_date = Some(date);
        self
    }
}

/// Headline totals over a whole ledger. Malformed rows are skipped, as
/// they are by aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total_income: f64,
    pub total_expenses: f64,
    pub profit: f64,
}

impl LedgerTotals {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let (total_income, total_expenses) =
            transactions
                .iter()
                .filter(|t| t.is_well_formed())
                .fold((0.0, 0.0), |(income, expenses), t| match t.transaction_type {
                    TransactionType::Income => (income + t.amount, expenses),
                    TransactionType::Expense => (income, expenses + t.amount),
                });
        Self {
            total_income,
            total_expenses,
            profit: total_income - total_expenses,
        }
    }
}
