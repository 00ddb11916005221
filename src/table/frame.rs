// src/table/frame.rs
use std::collections::HashMap;
use std::fmt;
use prettytable::{format, Cell as PrettyCell, Row, Table as PrettyTable};
use serde::{Serialize, Deserialize};

use crate::error::{UtilResult, UtilError};

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// Interpret a raw field: numbers become `Number`, blanks become `Empty`.
    ///
    /// `NaN` and infinities stay `Text`, so numeric sums remain finite and
    /// tables survive a JSON round trip unchanged.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `{}` on f64 prints the shortest representation that round-trips
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
            Cell::Empty => Ok(()),
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// Row-major table with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from rows, checking every row against the column count
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Cell>>,
    ) -> UtilResult<Self> {
        let mut table = Self::new(columns);
        table.rows.reserve(rows.len());
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> UtilResult<()> {
        if row.len() != self.columns.len() {
            return Err(UtilError::InvalidInput(format!(
                "Row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Sum of every numeric cell in the table
    pub fn numeric_sum(&self) -> f64 {
        self.rows
            .iter()
            .flat_map(|row| row.iter().filter_map(Cell::as_f64))
            .sum()
    }

    /// Sum of the numeric cells of one column
    pub fn column_sum(&self, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row[idx].as_f64()).sum())
    }

    /// Concatenate tables row-wise.
    ///
    /// The output columns are the union of the input columns in first-seen
    /// order; cells a table does not have are filled with [`Cell::Empty`].
    /// Repeated names are matched by occurrence: the k-th `x` of a table lands
    /// in the k-th `x` of the output.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        let tables: Vec<Table> = tables.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        let mappings: Vec<Vec<usize>> = tables
            .iter()
            .map(|table| {
                let mut seen: HashMap<&str, usize> = HashMap::new();
                table.columns
                    .iter()
                    .map(|column| {
                        let occurrence = seen.entry(column.as_str()).or_insert(0);
                        let slots = positions.entry(column.clone()).or_default();
                        if *occurrence == slots.len() {
                            slots.push(columns.len());
                            columns.push(column.clone());
                        }
                        let idx = slots[*occurrence];
                        *occurrence += 1;
                        idx
                    })
                    .collect()
            })
            .collect();

        let total_rows = tables.iter().map(Table::n_rows).sum();
        let mut rows = Vec::with_capacity(total_rows);

        for (table, mapping) in tables.into_iter().zip(mappings) {
            if mapping.iter().copied().eq(0..columns.len()) {
                rows.extend(table.rows);
                continue;
            }
            for row in table.rows {
                let mut out = vec![Cell::Empty; columns.len()];
                for (cell, &idx) in row.into_iter().zip(&mapping) {
                    out[idx] = cell;
                }
                rows.push(out);
            }
        }

        Table { columns, rows }
    }

    /// First `n` rows as a new table
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Stable FNV-1a hash over column names and cell contents
    pub fn checksum(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0100_0000_01b3;

        fn feed(hash: &mut u64, bytes: &[u8]) {
            for b in bytes {
                *hash ^= u64::from(*b);
                *hash = hash.wrapping_mul(PRIME);
            }
        }

        let mut hash = OFFSET;
        for column in &self.columns {
            feed(&mut hash, column.as_bytes());
            feed(&mut hash, &[0x1f]);
        }
        for row in &self.rows {
            for cell in row {
                match cell {
                    Cell::Number(n) => {
                        feed(&mut hash, &[1]);
                        feed(&mut hash, &n.to_bits().to_le_bytes());
                    }
                    Cell::Text(s) => {
                        feed(&mut hash, &[2]);
                        feed(&mut hash, s.as_bytes());
                    }
                    Cell::Empty => feed(&mut hash, &[3]),
                }
            }
            feed(&mut hash, &[0x1e]);
        }
        hash
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW_ROWS: usize = 10;

        let mut preview = PrettyTable::new();
        preview.set_format(*format::consts::FORMAT_CLEAN);
        preview.set_titles(Row::new(self.columns.iter().map(|c| PrettyCell::new(c)).collect()));
        for row in self.rows.iter().take(PREVIEW_ROWS) {
            preview.add_row(Row::new(
                row.iter().map(|cell| PrettyCell::new(&cell.to_string()).style_spec("r")).collect(),
            ));
        }
        write!(f, "{}", preview)?;

        if self.rows.len() > PREVIEW_ROWS {
            writeln!(f, "...")?;
        }
        write!(f, "[{} rows x {} columns]", self.n_rows(), self.n_cols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(columns: &[&str], rows: &[&[f64]]) -> Table {
        Table::from_rows(
            columns.iter().copied(),
            rows.iter().map(|r| r.iter().map(|&n| Cell::Number(n)).collect()).collect(),
        ).unwrap()
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse("1.5"), Cell::Number(1.5));
        assert_eq!(Cell::parse(" 3 "), Cell::Number(3.0));
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("abc"), Cell::Text("abc".to_string()));
    }

    #[test]
    fn test_cell_parse_keeps_non_finite_as_text() {
        assert_eq!(Cell::parse("NaN"), Cell::Text("NaN".to_string()));
        assert_eq!(Cell::parse("inf"), Cell::Text("inf".to_string()));
        assert_eq!(Cell::parse("-Infinity"), Cell::Text("-Infinity".to_string()));
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut table = Table::new(["a", "b"]);
        assert!(table.push_row(vec![Cell::Number(1.0)]).is_err());
        assert!(table.push_row(vec![Cell::Number(1.0), Cell::Empty]).is_ok());
        assert_eq!(table.n_rows(), 1);
    }

    #[test]
    fn test_concat_same_columns() {
        let a = numbers(&["x", "y"], &[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = numbers(&["x", "y"], &[&[5.0, 6.0]]);
        let combined = Table::concat(vec![a, b]);

        assert_eq!(combined.n_rows(), 3);
        assert_eq!(combined.n_cols(), 2);
        assert_eq!(combined.numeric_sum(), 21.0);
        assert_eq!(combined.column_sum("x"), Some(9.0));
    }

    #[test]
    fn test_concat_unions_columns() {
        let a = numbers(&["x", "y"], &[&[1.0, 2.0]]);
        let b = numbers(&["y", "z"], &[&[3.0, 4.0]]);
        let combined = Table::concat(vec![a, b]);

        assert_eq!(combined.columns(), &["x", "y", "z"]);
        assert_eq!(combined.rows()[0], vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Empty]);
        assert_eq!(combined.rows()[1], vec![Cell::Empty, Cell::Number(3.0), Cell::Number(4.0)]);
    }

    #[test]
    fn test_concat_keeps_repeated_column_names() {
        let a = numbers(&["x", "x"], &[&[1.0, 2.0]]);
        let b = numbers(&["x"], &[&[4.0]]);
        let combined = Table::concat(vec![a.clone(), b]);

        assert_eq!(combined.columns(), &["x", "x"]);
        assert_eq!(combined.numeric_sum(), 7.0);
        assert_eq!(combined.rows()[0], vec![Cell::Number(1.0), Cell::Number(2.0)]);
        assert_eq!(combined.rows()[1], vec![Cell::Number(4.0), Cell::Empty]);

        let alone = Table::concat(vec![a]);
        assert_eq!(alone.n_cols(), 2);
        assert_eq!(alone.numeric_sum(), 3.0);
    }

    #[test]
    fn test_checksum_tracks_content() {
        let a = numbers(&["x"], &[&[1.0]]);
        let b = numbers(&["x"], &[&[2.0]]);
        assert_eq!(a.checksum(), a.clone().checksum());
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_display_shows_shape() {
        let table = numbers(&["x", "y"], &[&[1.0, 2.5]]);
        let rendered = table.to_string();
        assert!(rendered.contains("2.5"));
        assert!(rendered.contains('x'));
        assert!(rendered.ends_with("[1 rows x 2 columns]"));
    }
}
