use crate::error::EngineError;
use crate::models::{Aggregation, Measure};

use super::{cte_ident, event_types_predicate, CompileCtx, MeasureCompiler, MeasureSql};

/// `demographic_count` (see DESIGN.md) — a `count` sibling grouped by the
/// coalesced `sex`/`age_bucket` columns, one point per
/// `(bucket, sex, age_bucket)` combination carrying a
/// `"{sex}/{age_bucket}"` group label.
pub struct DemographicCompiler;

impl MeasureCompiler for DemographicCompiler {
    fn aggregation(&self) -> Aggregation {
        Aggregation::DemographicCount
    }

    fn compile(&self, measure: &Measure, ctx: &mut CompileCtx) -> Result<MeasureSql, EngineError> {
        let calendar = ctx
            .calendar_cte
            .ok_or(EngineError::UnsupportedMeasure(Aggregation::DemographicCount))?;
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
  SELECT
    cal.bucket_start,
    cal.window_seconds,
    cal.bucket_seconds,
    ev.sex,
    ev.age_bucket,
    COUNT(ev.timestamp) AS raw_count
  FROM {calendar} cal
  LEFT JOIN {ident}_events ev
    ON ev.timestamp >= cal.bucket_start AND ev.timestamp < cal.bucket_end
  GROUP BY cal.bucket_start, cal.window_seconds, cal.bucket_seconds, ev.sex, ev.age_bucket
)"
        );

        let select_sql = format!(
            "SELECT
  '{id}' AS measure_id,
  c.bucket_start,
  CAST(c.raw_count AS FLOAT64) AS value,
  CASE WHEN c.raw_count > 0 THEN SAFE_DIVIDE(c.window_seconds, c.bucket_seconds) ELSE 0 END AS coverage,
  c.raw_count AS raw_count,
  CAST(NULL AS INT64) AS lag,
  CONCAT(COALESCE(c.sex, 'Unknown'), '/', COALESCE(c.age_bucket, 'Unknown')) AS group_label
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
