use crate::error::EngineError;
use crate::models::{Aggregation, Measure};

use super::{cte_ident, event_types_predicate, CompileCtx, MeasureCompiler, MeasureSql};

/// `count` (+ optional `eventTypes` filter): number of events per bucket.
/// Coverage is `window_seconds / bucket_seconds` for non-empty buckets,
/// `0` otherwise.
pub struct CountCompiler;

impl MeasureCompiler for CountCompiler {
    fn aggregation(&self) -> Aggregation {
        Aggregation::Count
    }

    fn compile(&self, measure: &Measure, ctx: &mut CompileCtx) -> Result<MeasureSql, EngineError> {
        let calendar = ctx
            .calendar_cte
            .ok_or(EngineError::UnsupportedMeasure(Aggregation::Count))?;
        let ident = cte_ident(&measure.id);
        let scoped = ctx.scoped_cte;
        let event_pred = event_types_predicate(measure, ctx.params);

        let events_cte = format!(
            "{ident}_events AS (
  SELECT * FROM {scoped} WHERE {event_pred}
)"
        );
        let counts_cte = format!(
            "{ident}_counts AS (
  SELECT cal.bucket_start, COUNT(ev.timestamp) AS raw_count
  FROM {calendar} cal
  LEFT JOIN {ident}_events ev
    ON ev.timestamp >= cal.bucket_start AND ev.timestamp < cal.bucket_end
  GROUP BY cal.bucket_start
)"
        );

        let select_sql = format!(
            "SELECT
  '{id}' AS measure_id,
  cal.bucket_start,
  CAST(c.raw_count AS FLOAT64) AS value,
  CASE WHEN c.raw_count > 0 THEN SAFE_DIVIDE(cal.window_seconds, cal.bucket_seconds) ELSE 0 END AS coverage,
  c.raw_count AS raw_count,
  CAST(NULL AS INT64) AS lag,
  CAST(NULL AS STRING) AS group_label
FROM {calendar} cal
LEFT JOIN {ident}_counts c ON c.bucket_start = cal.bucket_start",
            id = measure.id
        );

        Ok(MeasureSql {
            ctes: vec![
                (format!("{ident}_events"), events_cte),
                (format!("{ident}_counts"), counts_cte),
            ],
            select_sql,
        })
    }
}
