use crate::models::{BucketSize, TimeWindow};

/// The CTE name every measure compiler joins against.
pub const CALENDAR_CTE: &str = "calendar";

/// Emits the aligned bucket-axis CTE:
/// `(bucket_start, bucket_end, bucket_seconds, window_seconds)` rows
/// covering `window.from..window.to`. Returns `None` for `RAW` — no
/// calendar is built and bucketed measures must have already been
/// rejected by the validator.
///
/// `bucket_end` is clipped at the window end; `window_seconds` is the
/// intersection of the (aligned) bucket with the original, un-aligned
/// window, which is how the normaliser later assigns fractional coverage
/// to the first and last buckets.
pub fn build_calendar_cte(window: &TimeWindow) -> Option<String> {
    if window.bucket.is_raw() {
        return None;
    }

    let seconds = window.bucket.nominal_seconds();
    let from = window.from.to_rfc3339();
    let to = window.to.to_rfc3339();
    let trunc_from = window.bucket.trunc_expr(&format!("TIMESTAMP('{from}')"));

    let sql = format!(
        "{CALENDAR_CTE} AS (
  SELECT
    bucket_start,
    LEAST(TIMESTAMP_ADD(bucket_start, INTERVAL {seconds} SECOND), TIMESTAMP('{to}')) AS bucket_end,
    {seconds} AS bucket_seconds,
    TIMESTAMP_DIFF(
      LEAST(TIMESTAMP_ADD(bucket_start, INTERVAL {seconds} SECOND), TIMESTAMP('{to}')),
      GREATEST(bucket_start, TIMESTAMP('{from}')),
      SECOND
    ) AS window_seconds
  FROM UNNEST(
    GENERATE_TIMESTAMP_ARRAY(
      {trunc_from},
      TIMESTAMP('{to}'),
      INTERVAL {seconds} SECOND
    )
  ) AS bucket_start
  WHERE bucket_start < TIMESTAMP('{to}')
)"
    );

    Some(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window(bucket: BucketSize) -> TimeWindow {
        TimeWindow {
            from: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap(),
            bucket,
            timezone: "UTC".to_string(),
        }
    }

    #[test]
    fn raw_bucket_has_no_calendar() {
        assert!(build_calendar_cte(&window(BucketSize::Raw)).is_none());
    }

    #[test]
    fn five_min_bucket_emits_a_cte() {
        let sql = build_calendar_cte(&window(BucketSize::FiveMin)).unwrap();
        assert!(sql.contains("GENERATE_TIMESTAMP_ARRAY"));
        assert!(sql.contains("300 AS bucket_seconds"));
    }

    #[test]
    fn minute_buckets_truncate_on_a_multiple_of_n() {
        let sql = build_calendar_cte(&window(BucketSize::FiveMin)).unwrap();
        assert!(sql.contains("TIMESTAMP_TRUNC(TIMESTAMP('2024-01-01T09:00:00+00:00'), MINUTE, 5)"));

        let mut w = window(BucketSize::FifteenMin);
        w.from = Utc.with_ymd_and_hms(2024, 1, 1, 9, 2, 30).unwrap();
        let sql = build_calendar_cte(&w).unwrap();
        assert!(sql.contains("MINUTE, 15"));
    }

    #[test]
    fn hour_bucket_has_no_multiple_argument() {
        let sql = build_calendar_cte(&window(BucketSize::Hour)).unwrap();
        assert!(sql.contains("TIMESTAMP_TRUNC(TIMESTAMP('2024-01-01T09:00:00+00:00'), HOUR)"));
        assert!(!sql.contains("HOUR,"));
    }
}
