use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::enums::{Aggregation, BucketSize};

/// A bound scalar value, ready to pass to the warehouse driver.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ScalarValue {
    Timestamp(DateTime<Utc>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// A bound parameter, scalar or list (for `IN UNNEST(@param)`).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
}

/// The output of the Compiler: a single SQL statement plus its bound
/// parameters, ready for the Executor.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: HashMap<String, ParamValue>,
    /// Measure id → aggregation, in declaration order.
    pub measures: Vec<(String, Aggregation)>,
    pub bucket: BucketSize,
}
