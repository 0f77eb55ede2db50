use super::compare::{cell_matches, same_shape};
use super::frame::{display_cell, Frame};
use super::Tolerance;
use comfy_table::{presets, Table};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DiffError {
    #[error("frames are not identically labeled: {actual} vs {expected}")]
    Shape { actual: String, expected: String },
    #[error("no divergent cells to show")]
    NothingToShow,
}

/// Divergent cells only: one `(actual)`/`(expected)` column pair per column
/// that differs, one line per row that differs, matching cells left blank.
pub fn diff_table(actual: &Frame, expected: &Frame, tol: Tolerance) -> Result<String, DiffError> {
    if !same_shape(actual, expected) {
        return Err(DiffError::Shape {
            actual: shape_label(actual),
            expected: shape_label(expected),
        });
    }

    let rows = actual.row_count();
    let pairs: Vec<_> = actual.columns().iter().zip(expected.columns()).collect();

    let mut diverging_cols = Vec::new();
    let mut diverging_rows = Vec::new();
    for (ci, (a, e)) in pairs.iter().enumerate() {
        for r in 0..rows {
            if !cell_matches(a, e, r, tol) {
                if !diverging_cols.contains(&ci) {
                    diverging_cols.push(ci);
                }
                if !diverging_rows.contains(&r) {
                    diverging_rows.push(r);
                }
            }
        }
    }
    if diverging_cols.is_empty() {
        return Err(DiffError::NothingToShow);
    }
    diverging_rows.sort_unstable();

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);

    let mut header = vec![String::new()];
    for &ci in &diverging_cols {
        let name = &pairs[ci].0.name;
        header.push(format!("{} (actual)", name));
        header.push(format!("{} (expected)", name));
    }
    table.set_header(header);

    for &r in &diverging_rows {
        let mut line = vec![r.to_string()];
        for &ci in &diverging_cols {
            let (a, e) = pairs[ci];
            if cell_matches(a, e, r, tol) {
                line.push(String::new());
                line.push(String::new());
            } else {
                line.push(display_cell(&a.cells[r]));
                line.push(display_cell(&e.cells[r]));
            }
        }
        table.add_row(line);
    }

    Ok(table.to_string())
}

/// Best-effort rendering: the structured diff when it can be built, both full
/// tables otherwise.
pub fn describe_mismatch(actual: &Frame, expected: &Frame, tol: Tolerance) -> String {
    match diff_table(actual, expected, tol) {
        Ok(diff) => diff,
        Err(e) => {
            tracing::debug!(event = "diff_fallback", reason = %e);
            side_by_side(actual, expected)
        }
    }
}

pub fn side_by_side(actual: &Frame, expected: &Frame) -> String {
    format!(
        "Actual:\n{}\n\nExpected:\n{}",
        actual.render(),
        expected.render()
    )
}

fn shape_label(f: &Frame) -> String {
    format!("{} rows [{}]", f.row_count(), f.column_names().join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Row;
    use serde_json::json;

    fn frame(v: serde_json::Value) -> Frame {
        let rows: Vec<Row> = serde_json::from_value(v).unwrap();
        Frame::from_rows(&rows)
    }

    #[test]
    fn only_divergent_cells_are_listed() {
        let a = frame(json!([
            {"city": "Paris", "n": 10},
            {"city": "Lyon", "n": 20},
            {"city": "Nice", "n": 30}
        ]));
        let e = frame(json!([
            {"city": "Paris", "n": 10},
            {"city": "Lyon", "n": 25},
            {"city": "Nice", "n": 30}
        ]));

        let diff = diff_table(&a, &e, Tolerance::default()).unwrap();
        assert!(diff.contains("n (actual)"));
        assert!(diff.contains("n (expected)"));
        assert!(!diff.contains("city"));
        assert!(diff.contains("20"));
        assert!(diff.contains("25"));
        assert!(!diff.contains("Paris"));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let a = frame(json!([{"a": 1}]));
        let e = frame(json!([{"b": 1}]));
        assert!(matches!(
            diff_table(&a, &e, Tolerance::default()),
            Err(DiffError::Shape { .. })
        ));
    }

    #[test]
    fn fallback_prints_both_tables() {
        let a = frame(json!([{"a": 1}]));
        let e = frame(json!([{"b": 2}, {"b": 3}]));
        let out = describe_mismatch(&a, &e, Tolerance::default());
        assert!(out.starts_with("Actual:\n"));
        assert!(out.contains("\n\nExpected:\n"));
        assert!(out.contains('3'));
    }

    #[test]
    fn identical_frames_have_nothing_to_show() {
        let a = frame(json!([{"flag": true}, {"flag": false}]));
        let e = frame(json!([{"flag": true}, {"flag": false}]));
        assert_eq!(
            diff_table(&a, &e, Tolerance::default()),
            Err(DiffError::NothingToShow)
        );
    }
}
