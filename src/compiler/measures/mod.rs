pub mod activity_rate;
pub mod count;
pub mod demographic;
pub mod dwell;
pub mod occupancy;
pub mod retention;

use std::collections::HashMap;

use crate::error::EngineError;
use crate::models::{Aggregation, BucketSize, Measure, TimeWindow};

use super::params::ParamBuilder;

/// Shared compile-time context passed to every `MeasureCompiler`. The
/// `scoped` CTE (tenant + window + filters, demographics coalesced to
/// "Unknown") and `calendar` CTE (see `calendar.rs`) are built once by
/// the `Compiler` and referenced by name here.
pub struct CompileCtx<'a> {
    pub bucket: BucketSize,
    pub window: &'a TimeWindow,
    pub scoped_cte: &'a str,
    pub calendar_cte: Option<&'a str>,
    pub params: &'a mut ParamBuilder,
}

/// A measure's compiled SQL: zero or more named CTEs it needs (besides
/// `scoped`/`calendar`, which are assumed already present) plus the
/// `SELECT` that projects into the shared `final` row shape
/// `(measure_id, bucket_start, value, coverage, raw_count, lag, group_label)`.
pub struct MeasureSql {
    pub ctes: Vec<(String, String)>,
    pub select_sql: String,
}

/// One implementation per closed `Aggregation` variant, registered in
/// `build_registry()` at `Compiler::new()` time — a closed enumeration
/// dispatched through a trait object map rather than string lookup.
pub trait MeasureCompiler: Send + Sync {
    fn aggregation(&self) -> Aggregation;
    fn compile(&self, measure: &Measure, ctx: &mut CompileCtx) -> Result<MeasureSql, EngineError>;
}

pub fn build_registry() -> HashMap<Aggregation, Box<dyn MeasureCompiler>> {
    let mut registry: HashMap<Aggregation, Box<dyn MeasureCompiler>> = HashMap::new();
    registry.insert(Aggregation::OccupancyRecursion, Box::new(occupancy::OccupancyCompiler));
    registry.insert(Aggregation::Count, Box::new(count::CountCompiler));
    registry.insert(Aggregation::ActivityRate, Box::new(activity_rate::ActivityRateCompiler));
    registry.insert(Aggregation::DwellMean, Box::new(dwell::DwellCompiler::mean()));
    registry.insert(Aggregation::DwellP90, Box::new(dwell::DwellCompiler::p90()));
    registry.insert(Aggregation::Sessions, Box::new(dwell::DwellCompiler::sessions()));
    registry.insert(Aggregation::RetentionRate, Box::new(retention::RetentionCompiler));
    registry.insert(Aggregation::DemographicCount, Box::new(demographic::DemographicCompiler));
    registry
}

/// Sanitise a measure id into a SQL identifier fragment safe to splice
/// into a CTE name (`measure_id` is caller-controlled, not a trusted
/// warehouse identifier).
pub fn cte_ident(measure_id: &str) -> String {
    measure_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Build the `WHERE event_type IN (...)` fragment for a measure's
/// optional `eventTypes` filter, or `"TRUE"` when unset.
pub fn event_types_predicate(measure: &Measure, params: &mut ParamBuilder) -> String {
    match &measure.event_types {
        Some(types) if !types.is_empty() => {
            let values = types
                .iter()
                .map(|t| crate::models::ScalarValue::Int(*t as i64))
                .collect();
            let name = params.bind_list(&format!("{}_event_types", measure.id), values);
            format!("event_type IN UNNEST(@{name})")
        }
        _ => "TRUE".to_string(),
    }
}
