use serde::{Deserialize, Serialize};

/// Default category palette, assigned by index.
pub const DEFAULT_PALETTE: [&str; 5] = ["#10B981", "#EF4444", "#F59E0B", "#8B5CF6", "#06B6D4"];

/// Total expense amount for one category label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,

    /// Sum of non-negative expense amounts, so never negative
    pub total: f64,

    /// Filled by palette assignment; the engine leaves it empty.
    #[serde(default)]
    pub color: Option<String>,
}

impl CategorySummary {
    pub fn new(category: impl Into<String>, total: f64) -> Self {
        Self {
            category: category.into(),
            total,
            color: None,
        }
    }
}

/// Ordering for category summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySortOrder {
    /// Order in which each category first appears in the ledger
    #[default]
    FirstSeen,
    /// Largest total first
    TotalDesc,
    /// Smallest total first
    TotalAsc,
    /// Alphabetical by category label
    NameAsc,
}

/// Re-order summaries in place. Sorting is stable, so ties keep
/// first-seen order.
pub fn sort_categories(summaries: &mut [CategorySummary], order: CategorySortOrder) {
    match order {
        CategorySortOrder::FirstSeen => {}
        CategorySortOrder::TotalDesc => summaries.sort_by(|a, b| b.total.total_cmp(&a.total)),
        CategorySortOrder::TotalAsc => summaries.sort_by(|a, b| a.total.total_cmp(&b.total)),
        CategorySortOrder::NameAsc => summaries.sort_by(|a, b| a.category.cmp(&b.category)),
    }
}

/// Assign `palette[i % palette.len()]` to each summary by position.
/// An empty palette leaves colors untouched.
pub fn apply_palette<S: AsRef<str>>(summaries: &mut [CategorySummary], palette: &[S]) {
    if palette.is_empty() {
        return;
    }
    for (i, summary) in summaries.iter_mut().enumerate() {
        summary.color = Some(palette[i % palette.len()].as_ref().to_string());
    }
}
