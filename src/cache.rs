use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::ChartResult;

/// TTL store in front of the executed ChartResult. Reads are effectively
/// lock-free (a short mutex hold); writes atomically replace an entry.
/// Expiry is evaluated at read time against a monotonic clock, never wall
/// clock, so the cache is immune to NTP jumps.
///
/// Two concurrent misses on the same key may each compute and each write;
/// the last write wins. No thundering-herd protection (single-flight
/// coalescing) is implemented at this layer.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<ChartResult>;
    fn set(&self, key: &str, value: ChartResult, ttl_seconds: Option<u64>);
    fn clear(&self);
}

struct Entry {
    value: ChartResult,
    expires_at: Option<Instant>,
}

/// Default in-process implementation: a mutex-guarded map.
pub struct InProcessCache {
    entries: Mutex<HashMap<String, Entry>>,
    default_ttl_seconds: u64,
}

impl InProcessCache {
    pub fn new(default_ttl_seconds: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl_seconds,
        }
    }
}

impl Cache for InProcessCache {
    fn get(&self, key: &str) -> Option<ChartResult> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) => {
                if let Some(expires_at) = entry.expires_at {
                    if Instant::now() >= expires_at {
                        entries.remove(key);
                        return None;
                    }
                }
                Some(entries.get(key).unwrap().value.clone())
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: ChartResult, ttl_seconds: Option<u64>) {
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_seconds);
        if ttl == 0 {
            // ttl=0 means "do not cache"
            return;
        }
        let expires_at = Some(Instant::now() + Duration::from_secs(ttl));
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
            },
        );
    }

    fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartType, ResultMeta, XDimension, XDimensionType};

    fn dummy_result() -> ChartResult {
        ChartResult {
            chart_type: ChartType::ComposedTime,
            x_dimension: XDimension {
                kind: XDimensionType::Time,
                bucket: None,
                timezone: None,
            },
            series: vec![],
            meta: ResultMeta {
                timezone: "UTC".to_string(),
                coverage: vec![],
                surges: vec![],
                summary: "ok".to_string(),
            },
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = InProcessCache::new(60);
        assert!(cache.get("k").is_none());
        cache.set("k", dummy_result(), None);
        assert!(cache.get("k").is_some());
    }

    #[test]
    fn zero_ttl_does_not_cache() {
        let cache = InProcessCache::new(60);
        cache.set("k", dummy_result(), Some(0));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = InProcessCache::new(60);
        cache.set("k", dummy_result(), None);
        cache.clear();
        assert!(cache.get("k").is_none());
    }
}
