//! Tabular verification: decides whether the rows an agent produced match the
//! expected rows.
//!
//! Comparison runs in two phases. An exact structural check comes first; when
//! it fails, numeric columns are compared within a tolerance and every other
//! column must still match exactly. Column order never matters and row
//! identity is positional.

pub mod compare;
pub mod diff;
pub mod frame;

use crate::model::Row;
use frame::Frame;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,
    /// Only set on "values differ". Informational, never affects `passed`.
    pub diff: Option<String>,
}

impl Verdict {
    fn pass(message: &str) -> Self {
        Self {
            passed: true,
            message: message.to_string(),
            diff: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            diff: None,
        }
    }
}

pub fn verify(actual: &[Row], expected: &[Row], expected_columns: &[String]) -> Verdict {
    verify_with(actual, expected, expected_columns, Tolerance::default())
}

pub fn verify_with(
    actual: &[Row],
    expected: &[Row],
    expected_columns: &[String],
    tol: Tolerance,
) -> Verdict {
    let actual = Frame::from_rows(actual);
    let expected = Frame::from_rows(expected);

    match (actual.is_empty(), expected.is_empty()) {
        (true, true) => return Verdict::pass("both empty"),
        (true, false) => return Verdict::fail("actual is empty"),
        (false, true) => return Verdict::fail("expected is empty"),
        (false, false) => {}
    }

    // Only `actual` is checked for presence; a column missing from `expected`
    // projects to nulls and fails in the value comparison instead.
    let columns: BTreeSet<&str> = if expected_columns.is_empty() {
        actual
            .column_names()
            .into_iter()
            .chain(expected.column_names())
            .collect()
    } else {
        let missing: BTreeSet<&str> = expected_columns
            .iter()
            .map(String::as_str)
            .filter(|c| !actual.has_column(c))
            .collect();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.into_iter().collect();
            return Verdict::fail(format!("missing columns: {}", names.join(", ")));
        }
        expected_columns.iter().map(String::as_str).collect()
    };

    // BTreeSet iteration gives the alphabetical column order on both sides.
    let columns: Vec<&str> = columns.into_iter().collect();
    let actual = actual.project(&columns);
    let expected = expected.project(&columns);

    if actual.row_count() != expected.row_count() {
        return Verdict::fail(format!(
            "row count: {} vs {}",
            actual.row_count(),
            expected.row_count()
        ));
    }

    if compare::frames_equal(&actual, &expected) {
        return Verdict::pass("match");
    }

    if compare::frames_close(&actual, &expected, tol) {
        return Verdict::pass("match (approximate)");
    }

    Verdict {
        passed: false,
        message: "values differ".to_string(),
        diff: Some(diff::describe_mismatch(&actual, &expected, tol)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(v: serde_json::Value) -> Vec<Row> {
        serde_json::from_value(v).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn both_empty_passes() {
        let v = verify(&[], &[], &[]);
        assert!(v.passed);
        assert_eq!(v.message, "both empty");
        assert_eq!(v.diff, None);
    }

    #[test]
    fn one_empty_side_fails() {
        let some = rows(json!([{"a": 1}]));
        let v = verify(&[], &some, &[]);
        assert!(!v.passed);
        assert_eq!(v.message, "actual is empty");

        let v = verify(&some, &[], &[]);
        assert!(!v.passed);
        assert_eq!(v.message, "expected is empty");
    }

    #[test]
    fn column_order_does_not_matter() {
        let a = rows(json!([{"b": "x", "a": 1}, {"b": "y", "a": 2}]));
        let e = rows(json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]));
        let v = verify(&a, &e, &[]);
        assert!(v.passed);
        assert_eq!(v.message, "match");
    }

    #[test]
    fn tolerance_gives_approximate_match() {
        let a = rows(json!([{"revenue": 1234.5600001, "region": "EU"}]));
        let e = rows(json!([{"revenue": 1234.56, "region": "EU"}]));
        let v = verify(&a, &e, &[]);
        assert!(v.passed);
        assert_eq!(v.message, "match (approximate)");
    }

    #[test]
    fn int_vs_float_is_approximate_not_exact() {
        let a = rows(json!([{"n": 3}]));
        let e = rows(json!([{"n": 3.0}]));
        let v = verify(&a, &e, &[]);
        assert!(v.passed);
        assert_eq!(v.message, "match (approximate)");
    }

    #[test]
    fn bool_vs_int_flags_match_approximately() {
        let a = rows(json!([{"active": true}, {"active": false}]));
        let e = rows(json!([{"active": 1}, {"active": 0}]));
        let v = verify(&a, &e, &[]);
        assert!(v.passed);
        assert_eq!(v.message, "match (approximate)");

        let e = rows(json!([{"active": 1}, {"active": 1}]));
        let v = verify(&a, &e, &[]);
        assert!(!v.passed);
        assert_eq!(v.message, "values differ");
    }

    #[test]
    fn missing_expected_column_fails_without_comparing() {
        let a = rows(json!([{"a": 1}]));
        let e = rows(json!([{"a": 999, "b": 2, "c": 3}]));
        let v = verify(&a, &e, &cols(&["c", "a", "b"]));
        assert!(!v.passed);
        assert_eq!(v.message, "missing columns: b, c");
        assert_eq!(v.diff, None);
    }

    #[test]
    fn expected_columns_restrict_comparison() {
        let a = rows(json!([{"a": 1, "debug": "trace-1"}]));
        let e = rows(json!([{"a": 1, "debug": "other"}]));
        let v = verify(&a, &e, &cols(&["a"]));
        assert!(v.passed);
        assert_eq!(v.message, "match");
    }

    #[test]
    fn row_count_mismatch_names_both_counts() {
        let a = rows(json!([{"a": 1}, {"a": 2}, {"a": 3}]));
        let e = rows(json!([{"a": 1}, {"a": 2}]));
        let v = verify(&a, &e, &[]);
        assert!(!v.passed);
        assert_eq!(v.message, "row count: 3 vs 2");
        assert_eq!(v.diff, None);
    }

    #[test]
    fn differing_values_produce_a_diff() {
        let a = rows(json!([{"city": "Paris", "n": 10}, {"city": "Lyon", "n": 21}]));
        let e = rows(json!([{"city": "Paris", "n": 10}, {"city": "Lyon", "n": 20}]));
        let v = verify(&a, &e, &[]);
        assert!(!v.passed);
        assert_eq!(v.message, "values differ");
        let diff = v.diff.unwrap();
        assert!(diff.contains("n (actual)"));
        assert!(diff.contains("21"));
    }

    #[test]
    fn string_columns_need_exact_equality() {
        let a = rows(json!([{"s": "abc "}]));
        let e = rows(json!([{"s": "abc"}]));
        let v = verify(&a, &e, &[]);
        assert!(!v.passed);
        assert_eq!(v.message, "values differ");
    }

    #[test]
    fn inconsistent_keys_read_as_nan_and_match() {
        let a = rows(json!([{"a": 1.5, "b": 1}, {"b": 2}]));
        let e = rows(json!([{"b": 1, "a": 1.5}, {"b": 2, "a": null}]));
        let v = verify(&a, &e, &[]);
        assert!(v.passed, "{:?}", v);
        assert_eq!(v.message, "match");
    }

    #[test]
    fn column_absent_from_expected_fails_on_values() {
        let a = rows(json!([{"a": 1, "b": 2}]));
        let e = rows(json!([{"a": 1}]));
        let v = verify(&a, &e, &cols(&["a", "b"]));
        assert!(!v.passed);
        assert_eq!(v.message, "values differ");
    }

    #[test]
    fn custom_tolerance_is_honored() {
        let a = rows(json!([{"x": 10.0}]));
        let e = rows(json!([{"x": 10.5}]));
        assert!(!verify(&a, &e, &[]).passed);
        let loose = Tolerance {
            rtol: 0.1,
            atol: 0.0,
        };
        assert!(verify_with(&a, &e, &[], loose).passed);
    }
}
