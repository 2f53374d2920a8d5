use chrono::{DateTime, Utc};

/// A single row of the tabular result the warehouse capability returns.
/// Narrow on purpose: the normaliser only ever sees this shape, never the
/// warehouse driver's native row type (see `src/executor.rs`).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub measure_id: String,
    pub bucket_start: DateTime<Utc>,
    pub value: Option<f64>,
    pub coverage: f64,
    pub raw_count: u64,
    /// Present for heatmap/retention rows (cohort lag in buckets).
    pub lag: Option<i64>,
    /// Present for heatmap/demographic rows (the point's `group` label).
    pub group_label: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub rows: Vec<FrameRow>,
}

impl Frame {
    pub fn new(rows: Vec<FrameRow>) -> Self {
        Self { rows }
    }

    pub fn rows_for_measure<'a>(&'a self, measure_id: &'a str) -> impl Iterator<Item = &'a FrameRow> {
        self.rows.iter().filter(move |r| r.measure_id == measure_id)
    }
}
