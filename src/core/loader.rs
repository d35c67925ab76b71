use crate::domain::table::{Table, Value};
use crate::utils::coerce::{is_na, parse_datetime_safe, parse_f64_safe};
use crate::utils::error::LoadError;
use csv::ReaderBuilder;
use std::path::Path;

/// Read a CSV file from disk. See [`parse_table`].
pub fn read_table<P: AsRef<Path>>(path: P, date_column: Option<&str>) -> Result<Table, LoadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    parse_table(&bytes, date_column, &path.display().to_string())
}

/// Parse CSV text with a header row into a [`Table`].
///
/// A column whose non-missing cells all parse as numbers is stored as
/// `Number`; anything else stays `Text`. If `date_column` names a column, its
/// cells are coerced to timestamps and unparseable ones become `Missing`.
pub fn parse_table(bytes: &[u8], date_column: Option<&str>, source: &str) -> Result<Table, LoadError> {
    let malformed = |e: csv::Error| LoadError::Malformed {
        path: source.to_string(),
        source: e,
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = rdr.headers().map_err(malformed)?.clone();
    if headers.is_empty() {
        return Err(LoadError::Empty {
            path: source.to_string(),
        });
    }
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    let width = columns.len();

    let mut raw: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(malformed)?;
        if record.len() > width {
            return Err(LoadError::Malformed {
                path: source.to_string(),
                source: csv::Error::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "line {}: expected {} fields, found {}",
                        record.position().map(|p| p.line()).unwrap_or(0),
                        width,
                        record.len()
                    ),
                )),
            });
        }
        raw.push(record.iter().map(str::to_string).collect());
    }

    let numeric: Vec<bool> = (0..width)
        .map(|col| {
            raw.iter()
                .filter_map(|row| row.get(col))
                .filter(|cell| !is_na(cell))
                .all(|cell| parse_f64_safe(cell).is_some())
        })
        .collect();

    let mut table = Table::new(columns);
    for row in raw {
        let values = row
            .into_iter()
            .enumerate()
            .map(|(col, cell)| {
                if is_na(&cell) {
                    Value::Missing
                } else if numeric[col] {
                    parse_f64_safe(&cell).map(Value::Number).unwrap_or(Value::Missing)
                } else {
                    Value::Text(cell)
                }
            })
            .collect();
        table.push_row(values);
    }

    if let Some(date_col) = date_column {
        let converted = table.map_column(date_col, |value| match value {
            Value::Text(s) => parse_datetime_safe(&s).map(Value::Date).unwrap_or(Value::Missing),
            Value::Date(dt) => Value::Date(dt),
            Value::Number(_) | Value::Missing => Value::Missing,
        });
        if converted {
            tracing::debug!("Coerced column '{}' to timestamps", date_col);
        } else {
            tracing::debug!("Date column '{}' not present, skipping coercion", date_col);
        }
    }

    tracing::debug!(
        "Parsed {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        source
    );
    Ok(table)
}
