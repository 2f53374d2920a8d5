use crate::error::ValidationError;
use crate::models::{
    Aggregation, BucketSize, ChartResult, ChartSpec, FilterCondition, FilterGroup, FilterLeaf,
    FilterOp,
};

/// Enforces the ChartSpec schema and closed enumerations before any
/// compilation is attempted. Unknown JSON fields never reach this point —
/// they were already dropped by serde during deserialisation, so they
/// cannot influence the cache key either.
pub fn validate_spec(spec: &ChartSpec) -> Result<(), ValidationError> {
    if spec.dataset != "events" {
        return Err(ValidationError::WrongDataset(spec.dataset.clone()));
    }

    if spec.measures.is_empty() {
        return Err(ValidationError::EmptyMeasures);
    }
    for (idx, measure) in spec.measures.iter().enumerate() {
        if measure.id.trim().is_empty() {
            return Err(ValidationError::MeasureMissingId(idx));
        }
        if let Some(event_types) = &measure.event_types {
            for &value in event_types {
                if value > 1 {
                    return Err(ValidationError::InvalidEventType {
                        id: measure.id.clone(),
                        value,
                    });
                }
            }
        }
    }

    if spec.dimensions.is_empty() {
        return Err(ValidationError::EmptyDimensions);
    }
    for (idx, dim) in spec.dimensions.iter().enumerate() {
        if dim.id.trim().is_empty() || dim.column.trim().is_empty() {
            return Err(ValidationError::MalformedDimension(idx));
        }
    }

    if spec.time_window.from > spec.time_window.to {
        return Err(ValidationError::WindowFromAfterTo);
    }

    let any_bucketed_measure = spec
        .measures
        .iter()
        .any(|m| m.aggregation.requires_bucket());
    if any_bucketed_measure && spec.time_window.bucket.is_raw() {
        return Err(ValidationError::RawBucketWithBucketedMeasure);
    }

    let any_retention = spec
        .measures
        .iter()
        .any(|m| m.aggregation == Aggregation::RetentionRate);
    if any_retention
        && !matches!(spec.time_window.bucket, BucketSize::Week | BucketSize::Month)
    {
        return Err(ValidationError::RetentionRequiresWeekOrMonth);
    }

    if let Some(groups) = &spec.filters {
        for group in groups {
            validate_filter_group(group)?;
        }
    }

    Ok(())
}

fn validate_filter_group(group: &FilterGroup) -> Result<(), ValidationError> {
    if group.conditions.is_empty() {
        return Err(ValidationError::EmptyFilterGroup);
    }
    for condition in &group.conditions {
        match condition {
            FilterCondition::Group(nested) => validate_filter_group(nested)?,
            FilterCondition::Leaf(leaf) => validate_filter_leaf(leaf)?,
        }
    }
    Ok(())
}

fn validate_filter_leaf(leaf: &FilterLeaf) -> Result<(), ValidationError> {
    if leaf.op == FilterOp::Between {
        match &leaf.value {
            serde_json::Value::Array(items) if items.len() == 2 => {}
            other => {
                return Err(ValidationError::BadBetweenValue(other.to_string()));
            }
        }
    }
    Ok(())
}

/// Re-validates the produced `ChartResult`: every point's coverage must be
/// in [0,1] and every series must carry its geometry/axis/unit.
pub fn validate_result(result: &ChartResult) -> Result<(), ValidationError> {
    for series in &result.series {
        if series.id.trim().is_empty() {
            return Err(ValidationError::InvalidResultSeries(series.id.clone()));
        }
        for point in &series.points {
            if !(0.0..=1.0).contains(&point.coverage) {
                return Err(ValidationError::CoverageOutOfRange(point.coverage));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BucketSize, ChartType, Dimension, Measure, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn valid_spec() -> ChartSpec {
        ChartSpec {
            id: "c1".to_string(),
            dataset: "events".to_string(),
            chart_type: ChartType::ComposedTime,
            measures: vec![Measure {
                id: "cnt".to_string(),
                aggregation: Aggregation::Count,
                event_types: None,
            }],
            dimensions: vec![Dimension {
                id: "time".to_string(),
                column: "timestamp".to_string(),
                bucket: Some(BucketSize::Hour),
            }],
            splits: None,
            time_window: TimeWindow {
                from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                to: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                bucket: BucketSize::Hour,
                timezone: "UTC".to_string(),
            },
            filters: None,
            bypass_cache: false,
        }
    }

    #[test]
    fn accepts_valid_spec() {
        assert!(validate_spec(&valid_spec()).is_ok());
    }

    #[test]
    fn rejects_wrong_dataset() {
        let mut spec = valid_spec();
        spec.dataset = "logs".to_string();
        assert_eq!(
            validate_spec(&spec),
            Err(ValidationError::WrongDataset("logs".to_string()))
        );
    }

    #[test]
    fn rejects_raw_bucket_for_bucketed_measure() {
        let mut spec = valid_spec();
        spec.time_window.bucket = BucketSize::Raw;
        assert_eq!(
            validate_spec(&spec),
            Err(ValidationError::RawBucketWithBucketedMeasure)
        );
    }

    #[test]
    fn rejects_retention_without_week_or_month() {
        let mut spec = valid_spec();
        spec.measures[0].aggregation = Aggregation::RetentionRate;
        assert_eq!(
            validate_spec(&spec),
            Err(ValidationError::RetentionRequiresWeekOrMonth)
        );
    }
}
