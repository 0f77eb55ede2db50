use crate::model::Row;
use comfy_table::{presets, Table};
use serde_json::Value;

/// Type inferred for a column from the values it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every cell an integer, no nulls.
    Int,
    /// Numbers with at least one float or null. Nulls read as NaN.
    Float,
    /// Every cell a boolean, no nulls. Counts as numeric, reading as 1 and 0.
    Bool,
    /// Anything else: strings, mixed types, nested values, nullable booleans.
    Object,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Int | ColumnKind::Float | ColumnKind::Bool)
    }

    fn infer(cells: &[Value]) -> Self {
        let has_null = cells.iter().any(Value::is_null);
        if !has_null && !cells.is_empty() && cells.iter().all(Value::is_boolean) {
            return ColumnKind::Bool;
        }
        if cells.iter().all(|v| v.is_number() || v.is_null()) {
            let all_int = cells.iter().all(|v| v.is_i64());
            if all_int && !has_null && !cells.is_empty() {
                return ColumnKind::Int;
            }
            return ColumnKind::Float;
        }
        ColumnKind::Object
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Value>) -> Self {
        let kind = ColumnKind::infer(&cells);
        Self {
            name: name.into(),
            kind,
            cells,
        }
    }

    fn nulls(name: &str, len: usize) -> Self {
        Self::new(name, vec![Value::Null; len])
    }

    /// Numeric view of a cell; booleans read as 1 and 0, nulls and other
    /// non-numbers as NaN.
    pub fn f64_at(&self, idx: usize) -> f64 {
        match self.cells.get(idx) {
            Some(Value::Bool(b)) => f64::from(u8::from(*b)),
            Some(v) => v.as_f64().unwrap_or(f64::NAN),
            None => f64::NAN,
        }
    }
}

/// A column-oriented table built from JSON records. Row identity is purely
/// positional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<Column>,
    rows: usize,
}

impl Frame {
    /// Columns are the union of record keys in first-appearance order. A record
    /// missing a key contributes a null to that column.
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut names: Vec<&str> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !names.contains(&key.as_str()) {
                    names.push(key);
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let cells = rows
                    .iter()
                    .map(|r| r.get(name).cloned().unwrap_or(Value::Null))
                    .collect();
                Column::new(name, cells)
            })
            .collect();

        Self {
            columns,
            rows: rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Keeps only `names`, in the given order. A name this frame lacks becomes
    /// an all-null column.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Frame {
        let columns = names
            .iter()
            .map(|n| {
                let n = n.as_ref();
                self.column(n)
                    .cloned()
                    .unwrap_or_else(|| Column::nulls(n, self.rows))
            })
            .collect();
        Frame {
            columns,
            rows: self.rows,
        }
    }

    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(presets::NOTHING);

        let mut header = vec![String::new()];
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        table.set_header(header);

        for i in 0..self.rows {
            let mut line = vec![i.to_string()];
            line.extend(self.columns.iter().map(|c| display_cell(&c.cells[i])));
            table.add_row(line);
        }
        table.to_string()
    }
}

pub fn display_cell(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
