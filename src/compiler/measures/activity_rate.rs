use crate::error::EngineError;
use crate::models::{Aggregation, Measure};

use super::{cte_ident, event_types_predicate, CompileCtx, MeasureCompiler, MeasureSql};

/// `activity_rate`: `event_count * 60 / window_seconds` (events per
/// minute); `NULL` when `window_seconds = 0`. Coverage is computed the
/// same way as `count`.
pub struct ActivityRateCompiler;

impl MeasureCompiler for ActivityRateCompiler {
    fn aggregation(&self) -> Aggregation {
        Aggregation::ActivityRate
    }

    fn compile(&self, measure: &Measure, ctx: &mut CompileCtx) -> Result<MeasureSql, EngineError> {
        let calendar = ctx
            .calendar_cte
            .ok_or(EngineError::UnsupportedMeasure(Aggregation::ActivityRate))?;
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
  SELECT cal.bucket_start, cal.window_seconds, cal.bucket_seconds, COUNT(ev.timestamp) AS raw_count
  FROM {calendar} cal
  LEFT JOIN {ident}_events ev
    ON ev.timestamp >= cal.bucket_start AND ev.timestamp < cal.bucket_end
  GROUP BY cal.bucket_start, cal.window_seconds, cal.bucket_seconds
)"
        );

        let select_sql = format!(
            "SELECT
  '{id}' AS measure_id,
  c.bucket_start,
  SAFE_DIVIDE(CAST(c.raw_count AS FLOAT64) * 60, c.window_seconds) AS value,
  CASE WHEN c.raw_count > 0 THEN SAFE_DIVIDE(c.window_seconds, c.bucket_seconds) ELSE 0 END AS coverage,
  c.raw_count AS raw_count,
  CAST(NULL AS INT64) AS lag,
  CAST(NULL AS STRING) AS group_label
FROM {ident}_counts c",
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
