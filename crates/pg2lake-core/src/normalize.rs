//! Flattening of list-valued columns into delimited text.
//!
//! The separator is not escaped inside element values; callers choosing a
//! separator that can appear in the data will not be able to split the
//! result back unambiguously.

use crate::record::{Record, Value};

/// Replace a list-valued column with its elements joined by `separator`.
///
/// Element order is preserved and null elements are skipped. Nested lists
/// are flattened in order. Scalar, null or absent columns pass through
/// unchanged.
pub fn normalize_list_field(record: Record, field: &str, separator: &str) -> Record {
    let joined = match record.get(field) {
        Some(Value::List(items)) => join_list(items, separator),
        _ => return record,
    };
    record.with_value(field, Value::Text(joined))
}

pub fn join_list(items: &[Value], separator: &str) -> String {
    let mut parts = Vec::with_capacity(items.len());
    flatten_into(items, &mut parts);
    parts.join(separator)
}

fn flatten_into(items: &[Value], out: &mut Vec<String>) {
    for item in items {
        match item {
            Value::Null => {}
            Value::List(inner) => flatten_into(inner, out),
            scalar => out.push(scalar.to_string()),
        }
    }
}

/// Split text produced by [`join_list`] back into its elements.
///
/// Elements that themselves contain `separator` do not survive the round trip.
pub fn split_joined(text: &str, separator: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if separator.is_empty() {
        return vec![text.to_string()];
    }
    text.split(separator).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_in_order_and_splits_back() {
        let record = Record::new().with("questions_list", vec!["a", "b", "c"]);
        let record = normalize_list_field(record, "questions_list", ",");

        assert_eq!(
            record.get("questions_list"),
            Some(&Value::Text("a,b,c".to_string()))
        );
        assert_eq!(split_joined("a,b,c", ","), vec!["a", "b", "c"]);
    }

    #[test]
    fn scalar_and_absent_fields_pass_through() {
        let record = Record::new().with("tags", "already,flat").with("id", 7);
        let same = normalize_list_field(record.clone(), "tags", ",");
        assert_eq!(same, record);

        let same = normalize_list_field(record.clone(), "missing", ",");
        assert_eq!(same, record);

        let nulls = Record::new().with("tags", Value::Null);
        assert_eq!(normalize_list_field(nulls.clone(), "tags", ","), nulls);
    }

    #[test]
    fn null_elements_skipped_and_nested_lists_flattened() {
        let items = vec![
            Value::from("x"),
            Value::Null,
            Value::List(vec![Value::from(1), Value::from(2)]),
        ];
        assert_eq!(join_list(&items, "|"), "x|1|2");
    }

    #[test]
    fn separator_inside_elements_is_not_escaped() {
        let joined = join_list(&[Value::from("a,b"), Value::from("c")], ",");
        assert_eq!(joined, "a,b,c");
        assert_eq!(split_joined(&joined, ",").len(), 3);
    }

    #[test]
    fn empty_list_becomes_empty_text() {
        let record = Record::new().with("tags", Value::List(vec![]));
        let record = normalize_list_field(record, "tags", ",");
        assert_eq!(record.get("tags"), Some(&Value::Text(String::new())));
        assert!(split_joined("", ",").is_empty());
    }
}
