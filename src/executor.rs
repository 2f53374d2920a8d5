use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::{Frame, ParamValue, ScalarValue};

/// The narrow capability the core consumes. Never leaks the warehouse
/// driver's native row type into the normaliser — callers only ever see
/// a `Frame`.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn execute(
        &self,
        sql: &str,
        params: &HashMap<String, ParamValue>,
    ) -> Result<Frame, WarehouseError>;
}

#[derive(Debug, thiserror::Error)]
#[error("warehouse execution failed (job_id={job_id:?}): {message}")]
pub struct WarehouseError {
    pub job_id: Option<String>,
    pub message: String,
}

/// ClickHouse-backed adapter. The compiler emits a BigQuery-flavoured SQL
/// dialect (`@name` parameters, `UNNEST`, `TIMESTAMP_*` functions), while
/// this crate's only real warehouse driver is `clickhouse`; the
/// assumption here is that the warehouse behind this adapter accepts
/// that dialect directly (a managed ClickHouse variant or a proxy layer),
/// so the adapter stays a thin pass-through rather than a dialect
/// translator. Recorded as a deliberate substitution in DESIGN.md.
pub struct ClickHouseWarehouse {
    client: clickhouse::Client,
}

impl ClickHouseWarehouse {
    pub fn new(client: clickhouse::Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, serde::Deserialize, clickhouse::Row)]
struct ChartRow {
    measure_id: String,
    bucket_start: i64,
    value: Option<f64>,
    coverage: f64,
    raw_count: u64,
    lag: Option<i64>,
    group_label: Option<String>,
}

#[async_trait]
impl Warehouse for ClickHouseWarehouse {
    async fn execute(
        &self,
        sql: &str,
        params: &HashMap<String, ParamValue>,
    ) -> Result<Frame, WarehouseError> {
        // Scalar params rewrite to a positional `?` and bind for real;
        // list params have no uniform type to bind generically, so they
        // splice in as an escaped array literal instead (still inside the
        // `UNNEST(...)` the compiler wrapped them in).
        let (bound_sql, scalars) = rewrite_named_params(sql, params);

        let mut query = self.client.query(&bound_sql);
        for value in scalars {
            query = match value {
                ScalarValue::Timestamp(ts) => query.bind(ts.to_rfc3339()),
                ScalarValue::Int(n) => query.bind(n),
                ScalarValue::Float(f) => query.bind(f),
                ScalarValue::Bool(b) => query.bind(b),
                ScalarValue::Str(s) => query.bind(s),
            };
        }

        let rows: Vec<ChartRow> = query.fetch_all().await.map_err(|e| WarehouseError {
            job_id: None,
            message: e.to_string(),
        })?;

        let frame_rows = rows
            .into_iter()
            .map(|r| crate::models::FrameRow {
                measure_id: r.measure_id,
                bucket_start: chrono::DateTime::from_timestamp(r.bucket_start, 0)
                    .unwrap_or_default(),
                value: r.value,
                coverage: r.coverage,
                raw_count: r.raw_count,
                lag: r.lag,
                group_label: r.group_label,
            })
            .collect();

        Ok(Frame::new(frame_rows))
    }
}

/// Replaces every `@name` token in `sql` with a driver-native form: a
/// scalar param becomes a positional `?` (the returned `Vec` lists the
/// bound values in the same left-to-right order the `?`s appear in the
/// text, ready for sequential `.bind()` calls); a list param is spliced
/// in place as an array literal. An `@name` with no entry in `params` is
/// left untouched.
fn rewrite_named_params<'a>(
    sql: &str,
    params: &'a HashMap<String, ParamValue>,
) -> (String, Vec<&'a ScalarValue>) {
    let mut out = String::with_capacity(sql.len());
    let mut scalars = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '@' {
            out.push(c);
            continue;
        }

        let name_start = i + c.len_utf8();
        let mut name_end = name_start;
        while let Some(&(j, nc)) = chars.peek() {
            if nc.is_ascii_alphanumeric() || nc == '_' {
                name_end = j + nc.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        if name_end == name_start {
            out.push('@');
            continue;
        }

        let name = &sql[name_start..name_end];
        match params.get(name) {
            Some(ParamValue::Scalar(value)) => {
                out.push('?');
                scalars.push(value);
            }
            Some(ParamValue::List(values)) => out.push_str(&render_list_literal(values)),
            None => {
                out.push('@');
                out.push_str(name);
            }
        }
    }

    (out, scalars)
}

fn render_list_literal(values: &[ScalarValue]) -> String {
    let rendered: Vec<String> = values.iter().map(render_scalar_literal).collect();
    format!("[{}]", rendered.join(", "))
}

fn render_scalar_literal(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Timestamp(ts) => format!("TIMESTAMP('{}')", ts.to_rfc3339()),
        ScalarValue::Int(n) => n.to_string(),
        ScalarValue::Float(f) => f.to_string(),
        ScalarValue::Bool(b) => b.to_string(),
        ScalarValue::Str(s) => format!("'{}'", s.replace('\'', "''")),
    }
}
