/// Deduplicates and orders CTEs, unions per-measure selects into a
/// terminal `final` CTE, then emits the top-level `SELECT * FROM final
/// ORDER BY ...`. Trailing whitespace per line is trimmed; indentation is
/// not contractual.
pub fn assemble(
    ctes: Vec<(String, String)>,
    selects: Vec<String>,
    order_by_lag: bool,
) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::new();
    for (name, sql) in ctes {
        if seen.insert(name) {
            deduped.push(sql);
        }
    }

    let union = selects.join("\nUNION ALL\n");
    deduped.push(format!("final AS (\n{union}\n)"));

    let order_by = if order_by_lag {
        "bucket_start, lag, measure_id"
    } else {
        "bucket_start, measure_id"
    };

    let sql = format!(
        "WITH\n{}\nSELECT * FROM final ORDER BY {order_by}",
        deduped.join(",\n")
    );

    trim_trailing_whitespace(&sql)
}

fn trim_trailing_whitespace(sql: &str) -> String {
    sql.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_by_cte_name_preserving_first_insertion() {
        let ctes = vec![
            ("scoped".to_string(), "scoped AS (SELECT 1)".to_string()),
            ("scoped".to_string(), "scoped AS (SELECT 2)".to_string()),
        ];
        let sql = assemble(ctes, vec!["SELECT 1".to_string()], false);
        assert_eq!(sql.matches("scoped AS").count(), 1);
        assert!(sql.contains("SELECT 1)"));
    }

    #[test]
    fn orders_by_lag_when_requested() {
        let sql = assemble(vec![], vec!["SELECT 1".to_string()], true);
        assert!(sql.ends_with("ORDER BY bucket_start, lag, measure_id"));
    }
}
