use std::sync::Arc;

use crate::cache::Cache;
use crate::compiler::Compiler;
use crate::error::EngineError;
use crate::executor::Warehouse;
use crate::hasher;
use crate::models::{ChartResult, ChartSpec};
use crate::router::TableRouter;
use crate::validator;

/// Orchestrates a single `Execute(spec, org)` call: route → cache lookup
/// → validate → compile → execute → normalise → validate(result) →
/// cache store. The router and compiler are immutable and shared across
/// calls; the warehouse and cache are injected capabilities.
pub struct Engine {
    router: TableRouter,
    compiler: Compiler,
    warehouse: Arc<dyn Warehouse>,
    cache: Arc<dyn Cache>,
}

impl Engine {
    pub fn new(router: TableRouter, warehouse: Arc<dyn Warehouse>, cache: Arc<dyn Cache>) -> Self {
        Self {
            router,
            compiler: Compiler::new(),
            warehouse,
            cache,
        }
    }

    /// `ttl_seconds`: `None` uses the cache's default, `Some(0)` disables
    /// caching for this call's write (a miss is still looked up normally).
    pub async fn execute(
        &self,
        spec: &ChartSpec,
        org: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<ChartResult, EngineError> {
        let table = self.router.resolve(org)?;

        let key = hasher::cache_key(spec, table);
        if !spec.bypass_cache {
            if let Some(cached) = self.cache.get(&key) {
                return Ok(cached);
            }
        }

        validator::validate_spec(spec)?;

        let compiled = self.compiler.compile(spec, table)?;

        let frame = self
            .warehouse
            .execute(&compiled.sql, &compiled.params)
            .await
            .map_err(|e| EngineError::Executor {
                job_id: e.job_id,
                message: e.message,
            })?;

        let result = crate::normaliser::normalise(spec, &compiled, &frame)?;
        validator::validate_result(&result)?;

        self.cache.set(&key, result.clone(), ttl_seconds);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InProcessCache;
    use crate::executor::WarehouseError;
    use crate::models::{
        Aggregation, BucketSize, ChartType, Dimension, Frame, FrameRow, Measure, ParamValue,
        TimeWindow,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubWarehouse {
        calls: AtomicUsize,
    }

    impl StubWarehouse {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Warehouse for StubWarehouse {
        async fn execute(
            &self,
            _sql: &str,
            _params: &HashMap<String, ParamValue>,
        ) -> Result<Frame, WarehouseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let bucket_start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
            Ok(Frame::new(vec![FrameRow {
                measure_id: "cnt".to_string(),
                bucket_start,
                value: Some(3.0),
                coverage: 1.0,
                raw_count: 3,
                lag: None,
                group_label: None,
            }]))
        }
    }

    fn router() -> TableRouter {
        let mut tables = HashMap::new();
        tables.insert("acme".to_string(), "proj.dataset.events".to_string());
        TableRouter::new(tables)
    }

    fn spec() -> ChartSpec {
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
                from: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                to: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                bucket: BucketSize::Hour,
                timezone: "UTC".to_string(),
            },
            filters: None,
            bypass_cache: false,
        }
    }

    #[tokio::test]
    async fn second_call_is_a_cache_hit_and_skips_the_warehouse() {
        let warehouse = Arc::new(StubWarehouse::new());
        let cache = Arc::new(InProcessCache::new(60));
        let engine = Engine::new(router(), warehouse.clone(), cache);

        let first = engine.execute(&spec(), "acme", None).await.unwrap();
        let second = engine.execute(&spec(), "acme", None).await.unwrap();

        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.series.len(), second.series.len());
    }

    #[tokio::test]
    async fn unknown_org_never_reaches_the_warehouse() {
        let warehouse = Arc::new(StubWarehouse::new());
        let cache = Arc::new(InProcessCache::new(60));
        let engine = Engine::new(router(), warehouse.clone(), cache);

        let err = engine.execute(&spec(), "nope", None).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownOrganisation(_)));
        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_spec_is_never_cached() {
        let warehouse = Arc::new(StubWarehouse::new());
        let cache = Arc::new(InProcessCache::new(60));
        let engine = Engine::new(router(), warehouse.clone(), cache.clone());

        let mut bad = spec();
        bad.dataset = "logs".to_string();

        assert!(engine.execute(&bad, "acme", None).await.is_err());
        let key = hasher::cache_key(&bad, "proj.dataset.events");
        assert!(cache.get(&key).is_none());
    }
}
