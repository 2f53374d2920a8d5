use crate::error::EngineError;
use crate::models::{Aggregation, Measure};

use super::{cte_ident, CompileCtx, MeasureCompiler, MeasureSql};

/// `occupancy_recursion`. Requires bucket != RAW. Runs a clamped running
/// sum of entrance/exit deltas per `(site_id, cam_id)`, attributes the
/// occupancy of the last event in each bucket, carries it forward across
/// empty buckets, and flags buckets whose running sum went negative at
/// any point (`seeded_by_exit`) — the window started mid-occupancy.
pub struct OccupancyCompiler;

impl MeasureCompiler for OccupancyCompiler {
    fn aggregation(&self) -> Aggregation {
        Aggregation::OccupancyRecursion
    }

    fn compile(&self, measure: &Measure, ctx: &mut CompileCtx) -> Result<MeasureSql, EngineError> {
        let calendar = ctx
            .calendar_cte
            .ok_or(EngineError::UnsupportedMeasure(Aggregation::OccupancyRecursion))?;
        let ident = cte_ident(&measure.id);
        let scoped = ctx.scoped_cte;

        let running_cte = format!(
            "{ident}_running AS (
  SELECT
    *,
    SUM(CASE event_type WHEN 1 THEN 1 WHEN 0 THEN -1 ELSE 0 END) OVER (
      PARTITION BY site_id, cam_id
      ORDER BY timestamp, index
      ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
    ) AS running_sum
  FROM {scoped}
)"
        );

        let clamped_cte = format!(
            "{ident}_clamped AS (
  SELECT
    *,
    GREATEST(running_sum, 0) AS occupancy,
    running_sum < 0 AS seeded_row
  FROM {ident}_running
)"
        );

        let bucketed_cte = format!(
            "{ident}_bucketed AS (
  SELECT
    cal.bucket_start,
    COUNT(ev.timestamp) AS raw_count,
    LOGICAL_OR(COALESCE(ev.seeded_row, FALSE)) AS seeded_by_exit,
    ARRAY_AGG(
      ev.occupancy ORDER BY ev.timestamp DESC, ev.index DESC LIMIT 1
    )[SAFE_OFFSET(0)] AS last_occupancy
  FROM {calendar} cal
  LEFT JOIN {ident}_clamped ev
    ON ev.timestamp >= cal.bucket_start AND ev.timestamp < cal.bucket_end
  GROUP BY cal.bucket_start
)"
        );

        let carried_cte = format!(
            "{ident}_carried AS (
  SELECT
    bucket_start,
    raw_count,
    seeded_by_exit,
    LAST_VALUE(last_occupancy IGNORE NULLS) OVER (
      ORDER BY bucket_start ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
    ) AS carried_occupancy
  FROM {ident}_bucketed
)"
        );

        let select_sql = format!(
            "SELECT
  '{id}' AS measure_id,
  cal.bucket_start,
  COALESCE(oc.carried_occupancy, 0) AS value,
  CASE
    WHEN oc.raw_count = 0 THEN 0
    WHEN oc.seeded_by_exit THEN LEAST(SAFE_DIVIDE(cal.window_seconds, cal.bucket_seconds), 0.5)
    ELSE SAFE_DIVIDE(cal.window_seconds, cal.bucket_seconds)
  END AS coverage,
  oc.raw_count AS raw_count,
  CAST(NULL AS INT64) AS lag,
  CAST(NULL AS STRING) AS group_label
FROM {calendar} cal
JOIN {ident}_carried oc ON oc.bucket_start = cal.bucket_start",
            id = measure.id
        );

        Ok(MeasureSql {
            ctes: vec![
                (format!("{ident}_running"), running_cte),
                (format!("{ident}_clamped"), clamped_cte),
                (format!("{ident}_bucketed"), bucketed_cte),
                (format!("{ident}_carried"), carried_cte),
            ],
            select_sql,
        })
    }
}
