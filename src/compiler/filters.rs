use crate::models::{FilterCondition, FilterGroup, FilterLeaf, FilterLogic, FilterOp, ScalarValue};

use super::params::ParamBuilder;

/// Demographic columns are nullable in the physical schema; the scoped
/// view projects nulls to the literal "Unknown" so grouping is total.
/// Filters on these fields must match under the same
/// `COALESCE(..., 'Unknown')` wrapper or a predicate like
/// `sex = 'Unknown'` would never match a NULL row.
const NULLABLE_DEMOGRAPHIC_FIELDS: &[&str] = &["sex", "age_bucket"];

/// Recursively compile a sequence of top-level FilterGroups (ChartSpec's
/// `filters` field is itself a sequence) into a single SQL predicate,
/// ANDed together, plus the named parameters they bind.
pub fn compile_filter_groups(groups: &[FilterGroup], params: &mut ParamBuilder) -> Option<String> {
    if groups.is_empty() {
        return None;
    }
    let parts: Vec<String> = groups.iter().map(|g| compile_group(g, params)).collect();
    Some(parts.join(" AND "))
}

fn compile_group(group: &FilterGroup, params: &mut ParamBuilder) -> String {
    let joiner = match group.logic {
        FilterLogic::And => " AND ",
        FilterLogic::Or => " OR ",
    };
    let parts: Vec<String> = group
        .conditions
        .iter()
        .map(|c| compile_condition(c, params))
        .collect();
    format!("({})", parts.join(joiner))
}

fn compile_condition(condition: &FilterCondition, params: &mut ParamBuilder) -> String {
    match condition {
        FilterCondition::Group(nested) => compile_group(nested, params),
        FilterCondition::Leaf(leaf) => compile_leaf(leaf, params),
    }
}

fn field_expr(field: &str) -> String {
    if NULLABLE_DEMOGRAPHIC_FIELDS.contains(&field) {
        format!("COALESCE({field}, 'Unknown')")
    } else {
        field.to_string()
    }
}

fn compile_leaf(leaf: &FilterLeaf, params: &mut ParamBuilder) -> String {
    let mut field = field_expr(&leaf.field);
    if leaf.op.is_text_op() {
        field = format!("CAST({field} AS STRING)");
    }

    match leaf.op {
        FilterOp::Equals => format!("{field} = @{}", bind_scalar(params, &leaf.field, &leaf.value)),
        FilterOp::NotEquals => {
            format!("{field} != @{}", bind_scalar(params, &leaf.field, &leaf.value))
        }
        FilterOp::Gt => format!("{field} > @{}", bind_scalar(params, &leaf.field, &leaf.value)),
        FilterOp::Gte => format!("{field} >= @{}", bind_scalar(params, &leaf.field, &leaf.value)),
        FilterOp::Lt => format!("{field} < @{}", bind_scalar(params, &leaf.field, &leaf.value)),
        FilterOp::Lte => format!("{field} <= @{}", bind_scalar(params, &leaf.field, &leaf.value)),
        FilterOp::In => {
            let name = bind_list(params, &leaf.field, &leaf.value);
            format!("{field} IN UNNEST(@{name})")
        }
        FilterOp::NotIn => {
            let name = bind_list(params, &leaf.field, &leaf.value);
            format!("{field} NOT IN UNNEST(@{name})")
        }
        FilterOp::Between => {
            let (lower, upper) = bind_between(params, &leaf.field, &leaf.value);
            format!("{field} BETWEEN @{lower} AND @{upper}")
        }
        FilterOp::Contains => {
            format!(
                "{field} LIKE CONCAT('%', @{}, '%')",
                bind_scalar(params, &leaf.field, &leaf.value)
            )
        }
        FilterOp::StartsWith => {
            format!(
                "{field} LIKE CONCAT(@{}, '%')",
                bind_scalar(params, &leaf.field, &leaf.value)
            )
        }
        FilterOp::EndsWith => {
            format!(
                "{field} LIKE CONCAT('%', @{})",
                bind_scalar(params, &leaf.field, &leaf.value)
            )
        }
    }
}

fn json_to_scalar(value: &serde_json::Value) -> ScalarValue {
    match value {
        serde_json::Value::String(s) => ScalarValue::Str(s.clone()),
        serde_json::Value::Bool(b) => ScalarValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int(i)
            } else {
                ScalarValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        other => ScalarValue::Str(other.to_string()),
    }
}

fn bind_scalar(params: &mut ParamBuilder, field: &str, value: &serde_json::Value) -> String {
    params.bind(field, json_to_scalar(value))
}

fn bind_list(params: &mut ParamBuilder, field: &str, value: &serde_json::Value) -> String {
    let items = match value {
        serde_json::Value::Array(arr) => arr.iter().map(json_to_scalar).collect(),
        other => vec![json_to_scalar(other)],
    };
    params.bind_list(field, items)
}

fn bind_between(params: &mut ParamBuilder, field: &str, value: &serde_json::Value) -> (String, String) {
    let (lo, hi) = match value {
        serde_json::Value::Array(arr) if arr.len() == 2 => {
            (json_to_scalar(&arr[0]), json_to_scalar(&arr[1]))
        }
        other => {
            let scalar = json_to_scalar(other);
            (scalar.clone(), scalar)
        }
    };
    let lower = params.bind(&format!("{field}_lower"), lo);
    let upper = params.bind(&format!("{field}_upper"), hi);
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterLeaf;

    fn leaf(field: &str, op: FilterOp, value: serde_json::Value) -> FilterCondition {
        FilterCondition::Leaf(FilterLeaf {
            field: field.to_string(),
            op,
            value,
        })
    }

    #[test]
    fn wraps_demographic_fields_in_coalesce() {
        let mut params = ParamBuilder::new();
        let group = FilterGroup {
            logic: FilterLogic::And,
            conditions: vec![leaf("sex", FilterOp::Equals, serde_json::json!("Unknown"))],
        };
        let sql = compile_filter_groups(std::slice::from_ref(&group), &mut params).unwrap();
        assert!(sql.contains("COALESCE(sex, 'Unknown')"));
    }

    #[test]
    fn in_op_binds_a_list_param() {
        let mut params = ParamBuilder::new();
        let group = FilterGroup {
            logic: FilterLogic::Or,
            conditions: vec![leaf("cam_id", FilterOp::In, serde_json::json!([1, 2, 3]))],
        };
        let sql = compile_filter_groups(std::slice::from_ref(&group), &mut params).unwrap();
        assert!(sql.contains("IN UNNEST(@cam_id_0)"));
    }

    #[test]
    fn between_binds_two_params() {
        let mut params = ParamBuilder::new();
        let group = FilterGroup {
            logic: FilterLogic::And,
            conditions: vec![leaf(
                "age_bucket",
                FilterOp::Between,
                serde_json::json!(["18-24", "25-34"]),
            )],
        };
        let sql = compile_filter_groups(std::slice::from_ref(&group), &mut params).unwrap();
        assert!(sql.contains("BETWEEN @age_bucket_lower_0 AND @age_bucket_upper_1"));
    }
}
