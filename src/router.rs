use std::collections::HashMap;

use crate::error::RouterError;

/// Resolves a tenant (organisation) id to a fully-qualified warehouse
/// table. Immutable after construction, safe to share across concurrent
/// `Execute` calls.
#[derive(Debug, Clone)]
pub struct TableRouter {
    tables: HashMap<String, String>,
}

impl TableRouter {
    pub fn new(tables: HashMap<String, String>) -> Self {
        Self { tables }
    }

    /// Resolve `org` to a fully-qualified `project.dataset.table` name.
    /// Fails with `UnknownOrganisation` if absent, or a malformed-name
    /// error unless the stored value contains exactly two dots.
    pub fn resolve(&self, org: &str) -> Result<&str, RouterError> {
        let table = self
            .tables
            .get(org)
            .ok_or_else(|| RouterError::UnknownOrganisation(org.to_string()))?;

        if table.matches('.').count() != 2 {
            return Err(RouterError::MalformedTableName {
                org: org.to_string(),
                table: table.clone(),
            });
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> TableRouter {
        let mut tables = HashMap::new();
        tables.insert("acme".to_string(), "proj.dataset.events".to_string());
        tables.insert("bad".to_string(), "proj.events".to_string());
        TableRouter::new(tables)
    }

    #[test]
    fn resolves_known_org() {
        assert_eq!(router().resolve("acme").unwrap(), "proj.dataset.events");
    }

    #[test]
    fn rejects_unknown_org() {
        assert!(matches!(
            router().resolve("nope"),
            Err(RouterError::UnknownOrganisation(_))
        ));
    }

    #[test]
    fn rejects_malformed_table_name() {
        assert!(matches!(
            router().resolve("bad"),
            Err(RouterError::MalformedTableName { .. })
        ));
    }
}
