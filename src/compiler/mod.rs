pub mod assembler;
pub mod calendar;
pub mod filters;
pub mod measures;
pub mod params;

use std::collections::HashMap;

use crate::error::EngineError;
use crate::models::{Aggregation, ChartSpec, CompiledQuery, ScalarValue};

use measures::{build_registry, CompileCtx, MeasureCompiler};
use params::ParamBuilder;

const SCOPED_CTE: &str = "scoped";

/// Translates a validated ChartSpec into a single multi-CTE SQL statement
/// plus a bound parameter map. Immutable after construction (its measure
/// registry is built once) and safe to share across concurrent calls.
pub struct Compiler {
    registry: HashMap<Aggregation, Box<dyn MeasureCompiler>>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            registry: build_registry(),
        }
    }

    pub fn compile(&self, spec: &ChartSpec, table: &str) -> Result<CompiledQuery, EngineError> {
        let mut params = ParamBuilder::new();

        let filter_predicate = spec
            .filters
            .as_deref()
            .and_then(|groups| filters::compile_filter_groups(groups, &mut params))
            .unwrap_or_else(|| "TRUE".to_string());

        let window_from = params.bind("window_from", ScalarValue::Timestamp(spec.time_window.from));
        let window_to = params.bind("window_to", ScalarValue::Timestamp(spec.time_window.to));

        let scoped_sql = format!(
            "{SCOPED_CTE} AS (
  SELECT
    site_id, cam_id, index, track_no, event_type, timestamp,
    COALESCE(sex, 'Unknown') AS sex,
    COALESCE(age_bucket, 'Unknown') AS age_bucket
  FROM `{table}`
  WHERE timestamp >= @{window_from} AND timestamp <= @{window_to}
    AND ({filter_predicate})
)"
        );

        let calendar_sql = calendar::build_calendar_cte(&spec.time_window);
        let calendar_name = calendar_sql.as_ref().map(|_| calendar::CALENDAR_CTE);

        let mut ctes = vec![(SCOPED_CTE.to_string(), scoped_sql)];
        if let Some(sql) = &calendar_sql {
            ctes.push((calendar::CALENDAR_CTE.to_string(), sql.clone()));
        }

        let mut selects = Vec::with_capacity(spec.measures.len());
        for measure in &spec.measures {
            let compiler = self
                .registry
                .get(&measure.aggregation)
                .ok_or(EngineError::UnsupportedMeasure(measure.aggregation))?;

            let mut ctx = CompileCtx {
                bucket: spec.time_window.bucket,
                window: &spec.time_window,
                scoped_cte: SCOPED_CTE,
                calendar_cte: calendar_name,
                params: &mut params,
            };

            let measure_sql = compiler.compile(measure, &mut ctx)?;
            ctes.extend(measure_sql.ctes);
            selects.push(measure_sql.select_sql);
        }

        let order_by_lag = spec
            .measures
            .iter()
            .any(|m| m.aggregation == Aggregation::RetentionRate);

        let sql = assembler::assemble(ctes, selects, order_by_lag);

        Ok(CompiledQuery {
            sql,
            params: params.into_bound(),
            measures: spec
                .measures
                .iter()
                .map(|m| (m.id.clone(), m.aggregation))
                .collect(),
            bucket: spec.time_window.bucket,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BucketSize, ChartType, Dimension, Measure, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn spec() -> ChartSpec {
        ChartSpec {
            id: "c1".to_string(),
            dataset: "events".to_string(),
            chart_type: ChartType::ComposedTime,
            measures: vec![
                Measure {
                    id: "occ".to_string(),
                    aggregation: Aggregation::OccupancyRecursion,
                    event_types: None,
                },
                Measure {
                    id: "entrances".to_string(),
                    aggregation: Aggregation::Count,
                    event_types: Some(vec![1]),
                },
            ],
            dimensions: vec![Dimension {
                id: "time".to_string(),
                column: "timestamp".to_string(),
                bucket: Some(BucketSize::FiveMin),
            }],
            splits: None,
            time_window: TimeWindow {
                from: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                to: Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap(),
                bucket: BucketSize::FiveMin,
                timezone: "UTC".to_string(),
            },
            filters: None,
            bypass_cache: false,
        }
    }

    #[test]
    fn compiles_a_two_measure_spec() {
        let compiler = Compiler::new();
        let compiled = compiler.compile(&spec(), "proj.dataset.events").unwrap();
        assert_eq!(compiled.measures.len(), 2);
        assert!(compiled.sql.contains("UNION ALL"));
        assert!(compiled.sql.contains("ORDER BY bucket_start, measure_id"));
        assert!(compiled.params.contains_key("window_from_0"));
    }

    #[test]
    fn retention_orders_by_lag() {
        let mut s = spec();
        s.measures = vec![Measure {
            id: "retention".to_string(),
            aggregation: Aggregation::RetentionRate,
            event_types: None,
        }];
        s.time_window.bucket = BucketSize::Week;
        let compiler = Compiler::new();
        let compiled = compiler.compile(&s, "proj.dataset.events").unwrap();
        assert!(compiled.sql.ends_with("ORDER BY bucket_start, lag, measure_id"));
    }
}
