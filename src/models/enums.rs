use serde::{Deserialize, Serialize};

/// Closed set of chart shapes the compiler/normaliser understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    ComposedTime,
    Categorical,
    Heatmap,
    Retention,
    SingleValue,
}

impl ChartType {
    pub fn is_matrix_shaped(self) -> bool {
        matches!(self, ChartType::Heatmap | ChartType::Retention)
    }
}

/// Closed set of measure aggregations. Dispatch to a `MeasureCompiler`
/// happens through this enum, never through a raw string lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    OccupancyRecursion,
    Count,
    ActivityRate,
    DwellMean,
    DwellP90,
    Sessions,
    RetentionRate,
    DemographicCount,
}

impl Aggregation {
    /// Measures that require a non-RAW bucket to be meaningful.
    pub fn requires_bucket(self) -> bool {
        !matches!(self, Aggregation::DemographicCount)
    }

    pub fn requires_weekly_or_monthly_bucket(self) -> bool {
        matches!(self, Aggregation::RetentionRate)
    }
}

/// Closed set of bucket widths. `Raw` means "no calendar, no bucketing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum BucketSize {
    #[serde(rename = "RAW")]
    Raw,
    #[serde(rename = "5_MIN")]
    FiveMin,
    #[serde(rename = "15_MIN")]
    FifteenMin,
    #[serde(rename = "30_MIN")]
    ThirtyMin,
    #[serde(rename = "HOUR")]
    Hour,
    #[serde(rename = "DAY")]
    Day,
    #[serde(rename = "WEEK")]
    Week,
    #[serde(rename = "MONTH")]
    Month,
}

impl BucketSize {
    /// Bucket width in seconds. `Week`/`Month` are calendar units handled
    /// specially by the calendar CTE rather than a fixed-width interval,
    /// but a nominal width is still useful for coverage math.
    pub fn nominal_seconds(self) -> i64 {
        match self {
            BucketSize::Raw => 0,
            BucketSize::FiveMin => 300,
            BucketSize::FifteenMin => 900,
            BucketSize::ThirtyMin => 1800,
            BucketSize::Hour => 3600,
            BucketSize::Day => 86_400,
            BucketSize::Week => 604_800,
            BucketSize::Month => 2_592_000,
        }
    }

    /// The warehouse `TIMESTAMP_TRUNC` unit keyword for this bucket.
    pub fn trunc_unit(self) -> &'static str {
        match self {
            BucketSize::Raw => "SECOND",
            BucketSize::FiveMin | BucketSize::FifteenMin | BucketSize::ThirtyMin => "MINUTE",
            BucketSize::Hour => "HOUR",
            BucketSize::Day => "DAY",
            BucketSize::Week => "WEEK(MONDAY)",
            BucketSize::Month => "MONTH",
        }
    }

    /// The multiple-of-N argument `TIMESTAMP_TRUNC(ts, MINUTE, n)` needs to
    /// align on an N-minute boundary rather than the bare minute. `None`
    /// for buckets that truncate on their unit's own natural boundary.
    pub fn trunc_multiple(self) -> Option<i64> {
        match self {
            BucketSize::FiveMin => Some(5),
            BucketSize::FifteenMin => Some(15),
            BucketSize::ThirtyMin => Some(30),
            _ => None,
        }
    }

    /// Full `TIMESTAMP_TRUNC` call aligning `ts_expr` to this bucket's
    /// boundary, using the 3-argument multiple-of-N form for the 5/15/30
    /// minute buckets so a window starting mid-interval (e.g. `09:02:30`)
    /// still truncates down to `09:00`/`09:05`, not `09:02`.
    pub fn trunc_expr(self, ts_expr: &str) -> String {
        let unit = self.trunc_unit();
        match self.trunc_multiple() {
            Some(n) => format!("TIMESTAMP_TRUNC({ts_expr}, {unit}, {n})"),
            None => format!("TIMESTAMP_TRUNC({ts_expr}, {unit})"),
        }
    }

    pub fn is_raw(self) -> bool {
        matches!(self, BucketSize::Raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterLogic {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    In,
    NotIn,
    Between,
    Gte,
    Lte,
    Gt,
    Lt,
    Contains,
    StartsWith,
    EndsWith,
}

impl FilterOp {
    pub fn is_text_op(self) -> bool {
        matches!(self, FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith)
    }
}

/// `xDimension.type` in a `ChartResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XDimensionType {
    Time,
    Category,
    Matrix,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    Line,
    Area,
    Column,
    Bar,
    Heatmap,
    Scatter,
    Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Y1,
    Y2,
    Y3,
}
