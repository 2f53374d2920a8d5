use std::collections::HashMap;

use crate::models::{ParamValue, ScalarValue};

/// Allocates `@{sanitisedField}_{index}` parameter names, with `index`
/// monotonically increasing across every parameter emitted for a single
/// compile pass — this is what avoids collisions when the same field
/// appears in multiple filter conditions.
#[derive(Default)]
pub struct ParamBuilder {
    next_index: u32,
    bound: HashMap<String, ParamValue>,
}

impl ParamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new `@name` for `field` bound to `value`; returns the
    /// bare name (without the `@` sigil, callers splice that in).
    pub fn bind(&mut self, field: &str, value: ScalarValue) -> String {
        let name = self.alloc_name(field);
        self.bound.insert(name.clone(), ParamValue::Scalar(value));
        name
    }

    pub fn bind_list(&mut self, field: &str, values: Vec<ScalarValue>) -> String {
        let name = self.alloc_name(field);
        self.bound.insert(name.clone(), ParamValue::List(values));
        name
    }

    fn alloc_name(&mut self, field: &str) -> String {
        let sanitised = sanitise_field(field);
        let idx = self.next_index;
        self.next_index += 1;
        format!("{sanitised}_{idx}")
    }

    pub fn into_bound(self) -> HashMap<String, ParamValue> {
        self.bound
    }
}

fn sanitise_field(field: &str) -> String {
    field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_field_twice_gets_distinct_names() {
        let mut params = ParamBuilder::new();
        let a = params.bind("sex", ScalarValue::Str("F".to_string()));
        let b = params.bind("sex", ScalarValue::Str("M".to_string()));
        assert_ne!(a, b);
        assert_eq!(params.into_bound().len(), 2);
    }

    #[test]
    fn sanitises_dotted_fields() {
        let mut params = ParamBuilder::new();
        let name = params.bind("attributes.route", ScalarValue::Str("x".to_string()));
        assert_eq!(name, "attributes_route_0");
    }
}
