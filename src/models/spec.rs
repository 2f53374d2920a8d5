use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Aggregation, BucketSize, ChartType, FilterLogic, FilterOp};

/// A declarative analytic query over the `events` dataset. Immutable once
/// constructed by the caller; the engine owns everything derived from it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub id: String,
    pub dataset: String,
    pub chart_type: ChartType,
    pub measures: Vec<Measure>,
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub splits: Option<Vec<Dimension>>,
    pub time_window: TimeWindow,
    #[serde(default)]
    pub filters: Option<Vec<FilterGroup>>,
    /// `true` skips the cache lookup/store for this call. Excluded from
    /// the canonical form hashed for the cache key.
    #[serde(default, skip_serializing)]
    pub bypass_cache: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub id: String,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub event_types: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub id: String,
    pub column: String,
    #[serde(default)]
    pub bucket: Option<BucketSize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub bucket: BucketSize,
    pub timezone: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterGroup {
    pub logic: FilterLogic,
    pub conditions: Vec<FilterCondition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FilterCondition {
    Group(FilterGroup),
    Leaf(FilterLeaf),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterLeaf {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}
