use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use target::{TargetKey, TargetType};

mod target;

/// Ranked candidate ids per target, as produced by a generation engine.
pub type Recommendations = BTreeMap<TargetKey, Vec<i64>>;

/// Default number of items returned per model when the client omits `limit`.
pub const DEFAULT_LIMIT: usize = 10;
/// Upper bound accepted for `limit`.
pub const MAX_LIMIT: usize = 100;

/// An item together with the text its embedding is computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemText {
    pub id: i64,
    pub text: String,
}

impl ItemText {
    /// Builds the embedding text from a title and description.
    ///
    /// Falls back to the title alone, then to `Item <id>` when both are blank.
    pub fn from_parts(id: i64, title: Option<&str>, description: Option<&str>) -> Self {
        let title = title.map(str::trim).unwrap_or_default();
        let description = description.map(str::trim).unwrap_or_default();

        let mut text = format!("{} {}", title, description).trim().to_string();
        if text.is_empty() {
            text = if title.is_empty() {
                format!("Item {}", id)
            } else {
                title.to_string()
            };
        }

        Self { id, text }
    }
}

/// A row handed to the store for insert-or-replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationRow {
    pub target_key: String,
    pub model: String,
    pub items: Vec<i64>,
}

impl RecommendationRow {
    /// Flattens one engine output into store rows for `model`.
    pub fn from_recommendations(model: &str, recommendations: &Recommendations) -> Vec<Self> {
        recommendations
            .iter()
            .map(|(target_key, items)| Self {
                target_key: target_key.to_string(),
                model: model.to_string(),
                items: items.clone(),
            })
            .collect()
    }
}

/// A persisted recommendation list for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub model: String,
    pub items: Vec<i64>,
    pub generated_at: DateTime<Utc>,
}

/// Query parameters for `GET /api/recommendations`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationQuery {
    pub user_id: Option<i64>,
    pub item_id: Option<i64>,
    pub model: Option<String>,
    pub limit: Option<i64>,
}

/// Response structure for recommendation lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub target_type: TargetType,
    pub target_id: i64,
    pub target_key: String,
    /// Echo of the model filter, `null` when every model was requested
    pub model: Option<String>,
    pub limit: usize,
    pub recommendations: Vec<StoredRecommendation>,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
}
