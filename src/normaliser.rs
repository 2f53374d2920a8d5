use std::collections::BTreeMap;

use chrono::SecondsFormat;

use crate::error::EngineError;
use crate::models::{
    Aggregation, Axis, ChartResult, ChartSpec, ChartType, CompiledQuery, CoveragePoint, Frame,
    Geometry, Point, ResultMeta, Series, Surge, XDimension, XDimensionType,
};

/// Fixed geometry/axis/unit mapping per aggregation.
fn presentation(aggregation: Aggregation) -> (Geometry, Option<Axis>, Option<&'static str>) {
    match aggregation {
        Aggregation::OccupancyRecursion => (Geometry::Area, Some(Axis::Y1), Some("people")),
        Aggregation::Count => (Geometry::Column, Some(Axis::Y2), Some("events")),
        Aggregation::ActivityRate => (Geometry::Line, Some(Axis::Y2), Some("events/min")),
        Aggregation::DwellMean => (Geometry::Line, Some(Axis::Y1), Some("minutes")),
        Aggregation::DwellP90 => (Geometry::Line, Some(Axis::Y1), Some("minutes")),
        Aggregation::Sessions => (Geometry::Column, Some(Axis::Y2), Some("sessions")),
        Aggregation::RetentionRate => (Geometry::Heatmap, None, Some("rate")),
        Aggregation::DemographicCount => (Geometry::Column, Some(Axis::Y2), Some("events")),
    }
}

fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reshapes the executed Frame into a canonical ChartResult: typed
/// series, coverage metadata, and surge annotations.
pub fn normalise(
    spec: &ChartSpec,
    compiled: &CompiledQuery,
    frame: &Frame,
) -> Result<ChartResult, EngineError> {
    if spec.chart_type.is_matrix_shaped() {
        normalise_matrix(spec, compiled, frame)
    } else {
        normalise_timeseries(spec, compiled, frame)
    }
}

fn normalise_timeseries(
    spec: &ChartSpec,
    compiled: &CompiledQuery,
    frame: &Frame,
) -> Result<ChartResult, EngineError> {
    let mut series = Vec::with_capacity(compiled.measures.len());
    // bucket_start (iso) -> coverages observed across all measures, so
    // meta.coverage can average per-bucket regardless of measure count.
    let mut coverage_by_bucket: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut surges = Vec::new();

    for (measure_id, aggregation) in &compiled.measures {
        let mut rows: Vec<_> = frame.rows_for_measure(measure_id).collect();
        rows.sort_by_key(|r| r.bucket_start);

        if rows.is_empty() && !compiled.bucket.is_raw() {
            return Err(EngineError::Normalisation(format!(
                "measure {measure_id:?} has no bucketed rows in the executed frame"
            )));
        }

        let (geometry, axis, unit) = presentation(*aggregation);

        let mut points = Vec::with_capacity(rows.len());
        for row in &rows {
            let x = format_timestamp(row.bucket_start);
            coverage_by_bucket.entry(x.clone()).or_default().push(row.coverage);
            points.push(Point {
                x,
                y: row.value,
                value: None,
                coverage: row.coverage,
                raw_count: row.raw_count,
                group: row.group_label.clone(),
            });
        }

        // Grouped rows (e.g. demographic_count's sex/age_bucket split)
        // share a bucket_start across groups; surge detection only makes
        // sense over a single series, so skip it when points carry a group.
        if points.iter().all(|p| p.group.is_none()) {
            surges.extend(detect_surges(measure_id, &points));
        }

        series.push(Series {
            id: measure_id.clone(),
            label: measure_id.clone(),
            geometry,
            axis,
            unit: unit.map(str::to_string),
            points,
        });
    }

    let coverage = coverage_by_bucket
        .into_iter()
        .map(|(bucket_start, values)| CoveragePoint {
            bucket_start,
            coverage: mean(&values),
        })
        .collect();

    Ok(ChartResult {
        chart_type: spec.chart_type,
        x_dimension: XDimension {
            kind: XDimensionType::Time,
            bucket: Some(spec.time_window.bucket),
            timezone: Some(spec.time_window.timezone.clone()),
        },
        series,
        meta: ResultMeta {
            timezone: spec.time_window.timezone.clone(),
            coverage,
            surges,
            summary: format!(
                "{} series over {} buckets",
                compiled.measures.len(),
                compiled.bucket.nominal_seconds()
            ),
        },
    })
}

fn normalise_matrix(
    spec: &ChartSpec,
    compiled: &CompiledQuery,
    frame: &Frame,
) -> Result<ChartResult, EngineError> {
    let mut series = Vec::with_capacity(compiled.measures.len());
    let mut coverage_by_bucket: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for (measure_id, aggregation) in &compiled.measures {
        let mut rows: Vec<_> = frame.rows_for_measure(measure_id).collect();
        rows.sort_by_key(|r| (r.bucket_start, r.lag.unwrap_or(0)));

        let (geometry, axis, unit) = presentation(*aggregation);

        let mut points = Vec::with_capacity(rows.len());
        for row in &rows {
            let x = format_timestamp(row.bucket_start);
            coverage_by_bucket.entry(x.clone()).or_default().push(row.coverage);
            points.push(Point {
                x,
                y: None,
                value: row.value,
                coverage: row.coverage,
                raw_count: row.raw_count,
                group: row.group_label.clone(),
            });
        }

        series.push(Series {
            id: measure_id.clone(),
            label: measure_id.clone(),
            geometry,
            axis,
            unit: unit.map(str::to_string),
            points,
        });
    }

    let coverage = coverage_by_bucket
        .into_iter()
        .map(|(bucket_start, values)| CoveragePoint {
            bucket_start,
            coverage: mean(&values),
        })
        .collect();

    Ok(ChartResult {
        chart_type: spec.chart_type,
        x_dimension: XDimension {
            kind: XDimensionType::Matrix,
            bucket: Some(spec.time_window.bucket),
            timezone: Some(spec.time_window.timezone.clone()),
        },
        series,
        meta: ResultMeta {
            timezone: spec.time_window.timezone.clone(),
            coverage,
            surges: Vec::new(),
            summary: format!("{} cohort/lag matrices", compiled.measures.len()),
        },
    })
}

/// Mean + stddev threshold surge detector, kept behind a plain function
/// boundary so callers only ever see its output shape, never its
/// internals.
fn detect_surges(measure_id: &str, points: &[Point]) -> Vec<Surge> {
    let values: Vec<f64> = points.iter().filter_map(|p| p.y).collect();
    if values.is_empty() {
        return Vec::new();
    }
    let mean = mean(&values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let stddev = variance.sqrt();
    let threshold = if stddev == 0.0 { mean * 1.1 } else { mean + stddev };

    points
        .iter()
        .filter_map(|p| {
            let y = p.y?;
            if y >= threshold {
                Some(Surge {
                    measure: measure_id.to_string(),
                    x: p.x.clone(),
                    value: y,
                })
            } else {
                None
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrameRow;
    use chrono::{TimeZone, Utc};

    #[test]
    fn surge_uses_1point1x_mean_when_stddev_is_zero() {
        let points = vec![
            Point { x: "a".into(), y: Some(10.0), value: None, coverage: 1.0, raw_count: 1, group: None },
            Point { x: "b".into(), y: Some(10.0), value: None, coverage: 1.0, raw_count: 1, group: None },
            Point { x: "c".into(), y: Some(12.0), value: None, coverage: 1.0, raw_count: 1, group: None },
        ];
        let surges = detect_surges("m", &points);
        assert_eq!(surges.len(), 1);
        assert_eq!(surges[0].x, "c");
    }

    #[test]
    fn empty_window_has_no_surges() {
        assert!(detect_surges("m", &[]).is_empty());
    }

    #[test]
    fn timeseries_points_carry_the_row_group_label() {
        let spec = ChartSpec {
            id: "c1".to_string(),
            dataset: "events".to_string(),
            chart_type: ChartType::ComposedTime,
            measures: vec![],
            dimensions: vec![],
            splits: None,
            time_window: crate::models::TimeWindow {
                from: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                to: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                bucket: crate::models::BucketSize::Hour,
                timezone: "UTC".to_string(),
            },
            filters: None,
            bypass_cache: false,
        };
        let compiled = CompiledQuery {
            sql: String::new(),
            params: Default::default(),
            measures: vec![("demo".to_string(), Aggregation::DemographicCount)],
            bucket: crate::models::BucketSize::Hour,
        };
        let bucket_start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let frame = Frame::new(vec![
            FrameRow {
                measure_id: "demo".to_string(),
                bucket_start,
                value: Some(3.0),
                coverage: 1.0,
                raw_count: 3,
                lag: None,
                group_label: Some("F/20-29".to_string()),
            },
            FrameRow {
                measure_id: "demo".to_string(),
                bucket_start,
                value: Some(5.0),
                coverage: 1.0,
                raw_count: 5,
                lag: None,
                group_label: Some("M/30-39".to_string()),
            },
        ]);

        let result = normalise_timeseries(&spec, &compiled, &frame).unwrap();
        let groups: Vec<_> = result.series[0]
            .points
            .iter()
            .map(|p| p.group.clone())
            .collect();
        assert_eq!(
            groups,
            vec![Some("F/20-29".to_string()), Some("M/30-39".to_string())]
        );
        assert!(result.meta.surges.is_empty());
    }

    #[test]
    fn timestamps_always_end_with_z() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 9, 5, 0).unwrap();
        assert!(format_timestamp(ts).ends_with('Z'));
        let _ = FrameRow {
            measure_id: "m".into(),
            bucket_start: ts,
            value: Some(1.0),
            coverage: 1.0,
            raw_count: 1,
            lag: None,
            group_label: None,
        };
    }
}
