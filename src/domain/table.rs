use crate::utils::coerce::{format_number, parse_datetime_safe, parse_f64_safe};
use chrono::NaiveDateTime;
use std::fmt;

/// A single cell. Columns are loosely typed; conversions happen at use time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v).filter(|v| v.is_finite()),
            Value::Text(s) => parse_f64_safe(s),
            Value::Missing | Value::Date(_) => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(dt) => Some(*dt),
            Value::Text(s) => parse_datetime_safe(s),
            Value::Missing | Value::Number(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(v) => f.write_str(&format_number(*v)),
            Value::Date(dt) => write!(f, "{}", dt),
        }
    }
}

/// Rows of values under a fixed, ordered set of named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding with `Missing` or truncating so every row has
    /// one value per column.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Missing);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Column<'_>> {
        self.column_index(name).map(|index| Column { table: self, index })
    }

    /// Rewrite every value of a column in place. Returns `false` when the
    /// column does not exist.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(Value) -> Value,
    {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            let value = std::mem::replace(&mut row[index], Value::Missing);
            row[index] = f(value);
        }
        true
    }
}

/// Borrowed view of one column.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Column<'a> {
    pub fn name(&self) -> &'a str {
        &self.table.columns[self.index]
    }

    pub fn values(&self) -> impl Iterator<Item = &'a Value> + 'a {
        let (table, index) = (self.table, self.index);
        table.rows.iter().map(move |row| &row[index])
    }

    /// Numeric working copy, one entry per row.
    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.values().map(Value::as_number).collect()
    }

    /// Timestamp working copy, one entry per row.
    pub fn datetimes(&self) -> Vec<Option<NaiveDateTime>> {
        self.values().map(Value::as_datetime).collect()
    }
}
