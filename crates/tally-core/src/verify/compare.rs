use super::frame::{Column, Frame};
use super::Tolerance;
use serde_json::Value;

/// Phase one: identical column names and order, identical inferred types and
/// identical values. Null equals null and NaN equals NaN at the same position.
pub fn frames_equal(actual: &Frame, expected: &Frame) -> bool {
    same_shape(actual, expected)
        && actual
            .columns()
            .iter()
            .zip(expected.columns())
            .all(|(a, e)| columns_equal(a, e))
}

/// Phase two: numeric column pairs are compared within tolerance, every other
/// pair must be exactly equal including its inferred type.
pub fn frames_close(actual: &Frame, expected: &Frame, tol: Tolerance) -> bool {
    same_shape(actual, expected)
        && actual
            .columns()
            .iter()
            .zip(expected.columns())
            .all(|(a, e)| column_matches(a, e, tol))
}

pub fn same_shape(actual: &Frame, expected: &Frame) -> bool {
    actual.row_count() == expected.row_count() && actual.column_names() == expected.column_names()
}

pub fn columns_equal(a: &Column, b: &Column) -> bool {
    a.kind == b.kind
        && a.cells.len() == b.cells.len()
        && a.cells.iter().zip(&b.cells).all(|(x, y)| cells_equal(x, y))
}

pub fn column_matches(a: &Column, b: &Column, tol: Tolerance) -> bool {
    if a.cells.len() != b.cells.len() {
        return false;
    }
    if a.kind.is_numeric() && b.kind.is_numeric() {
        return (0..a.cells.len()).all(|i| is_close(a.f64_at(i), b.f64_at(i), tol));
    }
    columns_equal(a, b)
}

/// Whether a single cell pair would be flagged by the column rule that
/// applies to it.
pub fn cell_matches(a: &Column, b: &Column, idx: usize, tol: Tolerance) -> bool {
    if a.kind.is_numeric() && b.kind.is_numeric() {
        return is_close(a.f64_at(idx), b.f64_at(idx), tol);
    }
    match (a.cells.get(idx), b.cells.get(idx)) {
        (Some(x), Some(y)) => a.kind == b.kind && cells_equal(x, y),
        _ => false,
    }
}

/// `|a - b| <= atol + rtol * |b|`, with NaN equal to NaN and infinities equal
/// only to themselves.
pub fn is_close(a: f64, b: f64, tol: Tolerance) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= tol.atol + tol.rtol * b.abs()
}

fn cells_equal(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
                _ => false,
            },
        },
        _ => x == y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn col(v: Value) -> Column {
        let cells: Vec<Value> = serde_json::from_value(v).unwrap();
        Column::new("c", cells)
    }

    #[test]
    fn close_uses_relative_and_absolute_tolerance() {
        let tol = Tolerance::default();
        assert!(is_close(100.0, 100.0009, tol));
        assert!(!is_close(100.0, 100.01, tol));
        assert!(is_close(0.0, 1e-9, tol));
        assert!(!is_close(0.0, 1e-7, tol));
    }

    #[test]
    fn nan_and_infinity_rules() {
        let tol = Tolerance::default();
        assert!(is_close(f64::NAN, f64::NAN, tol));
        assert!(!is_close(f64::NAN, 1.0, tol));
        assert!(is_close(f64::INFINITY, f64::INFINITY, tol));
        assert!(!is_close(f64::INFINITY, f64::NEG_INFINITY, tol));
        assert!(!is_close(f64::INFINITY, 1e308, tol));
    }

    #[test]
    fn exact_equality_requires_same_kind() {
        assert!(columns_equal(&col(json!([1, 2])), &col(json!([1, 2]))));
        assert!(!columns_equal(&col(json!([1, 2])), &col(json!([1.0, 2.0]))));
        assert!(!columns_equal(&col(json!(["1"])), &col(json!([1]))));
    }

    #[test]
    fn float_column_nulls_match_each_other() {
        let a = col(json!([1.5, null]));
        let b = col(json!([1.5, null]));
        assert!(columns_equal(&a, &b));
        assert!(column_matches(&a, &b, Tolerance::default()));
    }

    #[test]
    fn int_and_float_columns_match_approximately() {
        let a = col(json!([1, 2]));
        let b = col(json!([1.0000001, 2.0]));
        assert!(!columns_equal(&a, &b));
        assert!(column_matches(&a, &b, Tolerance::default()));
    }

    #[test]
    fn object_columns_compare_numbers_by_value() {
        let a = col(json!(["x", 1]));
        let b = col(json!(["x", 1.0]));
        assert!(columns_equal(&a, &b));
    }

    #[test]
    fn bool_columns_compare_as_ones_and_zeros() {
        let flags = col(json!([true, false]));
        let ints = col(json!([1, 0]));
        assert!(!columns_equal(&flags, &ints));
        assert!(column_matches(&flags, &ints, Tolerance::default()));
        assert!(cell_matches(&flags, &ints, 1, Tolerance::default()));

        let other = col(json!([true, true]));
        assert!(!column_matches(&flags, &other, Tolerance::default()));
        assert!(!cell_matches(&flags, &other, 1, Tolerance::default()));
    }
}
