use crate::error::EngineError;
use crate::models::{Aggregation, Measure};

use super::{cte_ident, CompileCtx, MeasureCompiler, MeasureSql};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Mean,
    P90,
    Sessions,
}

/// Pairs entrances to exits within the same `(site_id, cam_id, track_no)`
/// by matched row-number, discards pairs whose duration falls outside
/// `[0, 360]` minutes, and attributes each surviving session to the
/// bucket containing its *entrance*. `dwell_mean`/`dwell_p90`/`sessions`
/// all share this pairing pipeline; `sessions` emits a count instead of
/// a duration (see DESIGN.md).
pub struct DwellCompiler {
    kind: Kind,
}

impl DwellCompiler {
    pub fn mean() -> Self {
        Self { kind: Kind::Mean }
    }
    pub fn p90() -> Self {
        Self { kind: Kind::P90 }
    }
    pub fn sessions() -> Self {
        Self { kind: Kind::Sessions }
    }
}

impl MeasureCompiler for DwellCompiler {
    fn aggregation(&self) -> Aggregation {
        match self.kind {
            Kind::Mean => Aggregation::DwellMean,
            Kind::P90 => Aggregation::DwellP90,
            Kind::Sessions => Aggregation::Sessions,
        }
    }

    fn compile(&self, measure: &Measure, ctx: &mut CompileCtx) -> Result<MeasureSql, EngineError> {
        let calendar = ctx
            .calendar_cte
            .ok_or(EngineError::UnsupportedMeasure(self.aggregation()))?;
        let ident = cte_ident(&measure.id);
        let scoped = ctx.scoped_cte;

        let entrances_cte = format!(
            "{ident}_entrances AS (
  SELECT *, ROW_NUMBER() OVER (
    PARTITION BY site_id, cam_id, track_no ORDER BY timestamp, index
  ) AS rn
  FROM {scoped}
  WHERE event_type = 1
)"
        );
        let exits_cte = format!(
            "{ident}_exits AS (
  SELECT *, ROW_NUMBER() OVER (
    PARTITION BY site_id, cam_id, track_no ORDER BY timestamp, index
  ) AS rn
  FROM {scoped}
  WHERE event_type = 0
)"
        );
        let sessions_cte = format!(
            "{ident}_sessions AS (
  SELECT
    en.timestamp AS entrance_ts,
    TIMESTAMP_DIFF(ex.timestamp, en.timestamp, SECOND) / 60.0 AS duration_minutes
  FROM {ident}_entrances en
  JOIN {ident}_exits ex
    ON en.site_id = ex.site_id AND en.cam_id = ex.cam_id AND en.track_no = ex.track_no
   AND en.rn = ex.rn
  WHERE TIMESTAMP_DIFF(ex.timestamp, en.timestamp, SECOND) BETWEEN 0 AND 21600
)"
        );
        let bucketed_cte = format!(
            "{ident}_bucketed AS (
  SELECT
    cal.bucket_start,
    cal.window_seconds,
    cal.bucket_seconds,
    COUNT(s.entrance_ts) AS session_count,
    AVG(s.duration_minutes) AS mean_minutes,
    APPROX_QUANTILES(s.duration_minutes, 101)[OFFSET(90)] AS p90_minutes
  FROM {calendar} cal
  LEFT JOIN {ident}_sessions s
    ON s.entrance_ts >= cal.bucket_start AND s.entrance_ts < cal.bucket_end
  GROUP BY cal.bucket_start, cal.window_seconds, cal.bucket_seconds
)"
        );

        let value_expr = match self.kind {
            Kind::Mean => "b.mean_minutes",
            Kind::P90 => "b.p90_minutes",
            Kind::Sessions => "CAST(b.session_count AS FLOAT64)",
        };

        let select_sql = format!(
            "SELECT
  '{id}' AS measure_id,
  b.bucket_start,
  {value_expr} AS value,
  CASE WHEN b.session_count > 0 THEN SAFE_DIVIDE(b.window_seconds, b.bucket_seconds) ELSE 0 END AS coverage,
  b.session_count AS raw_count,
  CAST(NULL AS INT64) AS lag,
  CAST(NULL AS STRING) AS group_label
FROM {ident}_bucketed b",
            id = measure.id
        );

        Ok(MeasureSql {
            ctes: vec![
                (format!("{ident}_entrances"), entrances_cte),
                (format!("{ident}_exits"), exits_cte),
                (format!("{ident}_sessions"), sessions_cte),
                (format!("{ident}_bucketed"), bucketed_cte),
            ],
            select_sql,
        })
    }
}
