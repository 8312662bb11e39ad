use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

use super::category::{CategorySortOrder, DEFAULT_PALETTE};
use super::window::{Granularity, WindowSpec};

/// Longest window accepted for any granularity.
pub const MAX_WINDOW_LENGTH: usize = 366;

/// Default bucket counts for each granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultWindows {
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,
}

impl Default for DefaultWindows {
    fn default() -> Self {
        Self {
            daily: 7,
            weekly: 4,
            monthly: 6,
        }
    }
}

impl DefaultWindows {
    pub fn for_granularity(&self, granularity: Granularity) -> WindowSpec {
        let length = match granularity {
            Granularity::Daily => self.daily,
            Granularity::Weekly => self.weekly,
            Granularity::Monthly => self.monthly,
        };
        WindowSpec::new(granularity, length)
    }
}

/// Connection details for a PostgREST-style ledger backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,

    /// Sent as both `apikey` and bearer token
    pub api_key: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_table() -> String {
    "transactions".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// User-configurable settings for a tracker session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_windows: DefaultWindows,

    /// Colors assigned to category summaries by index.
    pub palette: Vec<String>,

    /// Ordering applied to category summaries returned by the tracker.
    pub category_order: CategorySortOrder,

    /// Suggested labels offered when entering income.
    pub income_categories: Vec<String>,

    /// Suggested labels offered when entering expenses.
    pub expense_categories: Vec<String>,

    /// Remote ledger backend, if any.
    pub rest: Option<RestStoreConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_windows: DefaultWindows::default(),
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            category_order: CategorySortOrder::FirstSeen,
            income_categories: ["Sales", "Services", "Consulting", "Other Income"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            expense_categories: [
                "Supplies",
                "Transportation",
                "Marketing",
                "Rent",
                "Utilities",
                "Other Expense",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            rest: None,
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("Failed to parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize settings: {e}")))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let windows = self.default_windows;
        for (name, length) in [
            ("daily", windows.daily),
            ("weekly", windows.weekly),
            ("monthly", windows.monthly),
        ] {
            if length > MAX_WINDOW_LENGTH {
                return Err(CoreError::Config(format!(
                    "{name} window of {length} buckets exceeds maximum of {MAX_WINDOW_LENGTH}"
                )));
            }
        }
        if self.palette.is_empty() {
            return Err(CoreError::Config("palette must contain at least one color".into()));
        }
        if let Some(rest) = &self.rest {
            if rest.base_url.trim().is_empty() {
                return Err(CoreError::Config("rest.base_url must not be empty".into()));
            }
            if rest.table.trim().is_empty() {
                return Err(CoreError::Config("rest.table must not be empty".into()));
            }
        }
        Ok(())
    }
}
