use sha2::{Digest, Sha256};

use crate::models::ChartSpec;

/// Canonicalise a ChartSpec to a minimal JSON string with lexicographically
/// sorted object keys. `serde_json::Map` is BTreeMap-backed by default (we
/// do not enable the `preserve_order` feature anywhere in this crate), so
/// every nested object serialises with sorted keys for free; array order
/// (measures, filter conditions) is preserved because it is semantic.
pub fn canonicalize(spec: &ChartSpec) -> String {
    let value = serde_json::to_value(spec).expect("ChartSpec always serialises");
    serde_json::to_string(&value).expect("serde_json::Value always serialises")
}

/// SHA-256 of the canonical form, hex-encoded.
pub fn content_hash(spec: &ChartSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(spec).as_bytes());
    hex_encode(&hasher.finalize())
}

/// `CacheKey(spec, table) = table + ":" + hex(hash(canonical(spec)))`.
pub fn cache_key(spec: &ChartSpec, table: &str) -> String {
    format!("{table}:{}", content_hash(spec))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregation, BucketSize, ChartType, Measure, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn base_spec() -> ChartSpec {
        ChartSpec {
            id: "chart-1".to_string(),
            dataset: "events".to_string(),
            chart_type: ChartType::ComposedTime,
            measures: vec![
                Measure {
                    id: "occ".to_string(),
                    aggregation: Aggregation::OccupancyRecursion,
                    event_types: None,
                },
                Measure {
                    id: "cnt".to_string(),
                    aggregation: Aggregation::Count,
                    event_types: Some(vec![1]),
                },
            ],
            dimensions: vec![crate::models::Dimension {
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
    fn measure_order_changes_the_key() {
        let mut reordered = base_spec();
        reordered.measures.reverse();
        assert_ne!(content_hash(&base_spec()), content_hash(&reordered));
    }

    #[test]
    fn bypass_cache_does_not_change_the_key() {
        let mut flagged = base_spec();
        flagged.bypass_cache = true;
        assert_eq!(content_hash(&base_spec()), content_hash(&flagged));
    }

    #[test]
    fn same_spec_is_deterministic() {
        assert_eq!(content_hash(&base_spec()), content_hash(&base_spec()));
    }
}
