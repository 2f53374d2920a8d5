use crate::error::EngineError;
use crate::models::{Aggregation, BucketSize, Measure};

use super::{cte_ident, CompileCtx, MeasureCompiler, MeasureSql};

/// `retention_rate`. Requires bucket WEEK or MONTH. From entrances only,
/// a visit is "new" when the gap from the prior visit by the same
/// `(site_id, track_no)` is >= 30 minutes (or there is no prior visit).
/// A new visit's cohort is the bucket containing the visitor's *first*
/// new visit; for every cohort × lag, retention = returners / cohort
/// size. Coverage scales linearly with cohort size up to a floor of 100.
pub struct RetentionCompiler;

impl MeasureCompiler for RetentionCompiler {
    fn aggregation(&self) -> Aggregation {
        Aggregation::RetentionRate
    }

    fn compile(&self, measure: &Measure, ctx: &mut CompileCtx) -> Result<MeasureSql, EngineError> {
        if !matches!(ctx.bucket, BucketSize::Week | BucketSize::Month) {
            return Err(EngineError::UnsupportedMeasure(Aggregation::RetentionRate));
        }
        let ident = cte_ident(&measure.id);
        let scoped = ctx.scoped_cte;
        let unit = ctx.bucket.trunc_unit();
        let (lag_unit, max_lag, group_label) = match ctx.bucket {
            BucketSize::Week => ("WEEK", 52, "Week"),
            BucketSize::Month => ("MONTH", 12, "Month"),
            _ => unreachable!("checked above"),
        };

        let entrances_cte = format!(
            "{ident}_entrances AS (
  SELECT *, LAG(timestamp) OVER (
    PARTITION BY site_id, track_no ORDER BY timestamp, index
  ) AS prev_ts
  FROM {scoped}
  WHERE event_type = 1
)"
        );
        let new_visits_cte = format!(
            "{ident}_new AS (
  SELECT
    site_id, track_no,
    TIMESTAMP_TRUNC(timestamp, {unit}) AS visit_bucket
  FROM {ident}_entrances
  WHERE prev_ts IS NULL OR TIMESTAMP_DIFF(timestamp, prev_ts, MINUTE) >= 30
)"
        );
        let cohorts_cte = format!(
            "{ident}_cohorts AS (
  SELECT site_id, track_no, MIN(visit_bucket) AS cohort_bucket
  FROM {ident}_new
  GROUP BY site_id, track_no
)"
        );
        let cohort_sizes_cte = format!(
            "{ident}_cohort_sizes AS (
  SELECT cohort_bucket, COUNT(DISTINCT track_no) AS cohort_size
  FROM {ident}_cohorts
  GROUP BY cohort_bucket
)"
        );
        let lagged_cte = format!(
            "{ident}_lagged AS (
  SELECT
    c.cohort_bucket,
    DATE_DIFF(DATE(n.visit_bucket), DATE(c.cohort_bucket), {lag_unit}) AS lag,
    n.track_no
  FROM {ident}_new n
  JOIN {ident}_cohorts c ON n.site_id = c.site_id AND n.track_no = c.track_no
)"
        );
        let returners_cte = format!(
            "{ident}_returners AS (
  SELECT cohort_bucket, lag, COUNT(DISTINCT track_no) AS returners
  FROM {ident}_lagged
  WHERE lag BETWEEN 0 AND {max_lag}
  GROUP BY cohort_bucket, lag
)"
        );
        // Full cohort x lag grid: a cohort with no returners at a given lag
        // still needs a zero-valued row, not a dropped one.
        let matrix_cte = format!(
            "{ident}_matrix AS (
  SELECT
    cs.cohort_bucket,
    lag_axis AS lag,
    COALESCE(r.returners, 0) AS returners
  FROM {ident}_cohort_sizes cs
  CROSS JOIN UNNEST(GENERATE_ARRAY(0, GREATEST({max_lag}, 0))) AS lag_axis
  LEFT JOIN {ident}_returners r
    ON r.cohort_bucket = cs.cohort_bucket AND r.lag = lag_axis
)"
        );

        let select_sql = format!(
            "SELECT
  '{id}' AS measure_id,
  m.cohort_bucket AS bucket_start,
  SAFE_DIVIDE(m.returners, cs.cohort_size) AS value,
  LEAST(SAFE_DIVIDE(cs.cohort_size, 100), 1.0) AS coverage,
  m.returners AS raw_count,
  m.lag AS lag,
  CONCAT('{group_label} ', CAST(m.lag AS STRING)) AS group_label
FROM {ident}_matrix m
JOIN {ident}_cohort_sizes cs ON cs.cohort_bucket = m.cohort_bucket",
            id = measure.id
        );

        Ok(MeasureSql {
            ctes: vec![
                (format!("{ident}_entrances"), entrances_cte),
                (format!("{ident}_new"), new_visits_cte),
                (format!("{ident}_cohorts"), cohorts_cte),
                (format!("{ident}_cohort_sizes"), cohort_sizes_cte),
                (format!("{ident}_lagged"), lagged_cte),
                (format!("{ident}_returners"), returners_cte),
                (format!("{ident}_matrix"), matrix_cte),
            ],
            select_sql,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::params::ParamBuilder;

    #[test]
    fn matrix_cross_joins_the_full_lag_axis() {
        let mut params = ParamBuilder::new();
        let window = crate::models::TimeWindow {
            from: chrono::Utc::now(),
            to: chrono::Utc::now(),
            bucket: BucketSize::Week,
            timezone: "UTC".to_string(),
        };
        let mut ctx = CompileCtx {
            bucket: BucketSize::Week,
            window: &window,
            scoped_cte: "scoped",
            calendar_cte: None,
            params: &mut params,
        };
        let measure = Measure {
            id: "ret".to_string(),
            aggregation: Aggregation::RetentionRate,
            event_types: None,
        };
        let sql = RetentionCompiler.compile(&measure, &mut ctx).unwrap();
        let matrix = sql
            .ctes
            .iter()
            .find(|(name, _)| name == "ret_matrix")
            .unwrap();
        assert!(matrix.1.contains("CROSS JOIN UNNEST(GENERATE_ARRAY(0, GREATEST(52, 0)))"));
        assert!(matrix.1.contains("LEFT JOIN ret_returners"));
        assert!(matrix.1.contains("COALESCE(r.returners, 0)"));
    }
}
