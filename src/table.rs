//! # Table Module
//!
//! The tabular interface the resolver consumes, plus an in-memory column store
//! with CSV import/export.

use crate::error::ResolveError;
use crate::model::Column;
use hashbrown::HashMap;
use std::io::{Read, Write};
use std::path::Path;

/// Named columns, stable row order, per-cell missingness.
pub trait Table {
    /// Number of rows. Row `i` has row-order index `i`.
    fn row_count(&self) -> usize;

    fn has_column(&self, name: &str) -> bool;

    /// Column names in table order.
    fn column_names(&self) -> Vec<String>;

    /// Read a full column by name.
    fn read_column(&self, name: &str) -> Option<Column>;

    /// Overwrite a column by name, appending it when absent.
    fn write_column(&mut self, name: &str, values: Column) -> Result<(), ResolveError>;
}

/// Column-oriented in-memory table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    headers: Vec<String>,
    positions: HashMap<String, usize>,
    columns: Vec<Column>,
    rows: usize,
}

impl Frame {
    /// Create an empty frame with no rows and no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from string rows; empty cells become missing.
    pub fn from_records(headers: &[&str], rows: &[Vec<&str>]) -> Result<Self, ResolveError> {
        let mut frame = Self::with_headers(headers.iter().map(|h| h.to_string()).collect())?;
        for row in rows {
            frame.push_row(row.iter().map(|cell| cell.to_string()).collect())?;
        }
        Ok(frame)
    }

    fn with_headers(headers: Vec<String>) -> Result<Self, ResolveError> {
        let mut positions = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            if positions.insert(header.clone(), idx).is_some() {
                return Err(ResolveError::Table(format!("duplicate column '{header}'")));
            }
        }
        Ok(Self {
            columns: vec![Vec::new(); headers.len()],
            headers,
            positions,
            rows: 0,
        })
    }

    fn push_row(&mut self, cells: Vec<String>) -> Result<(), ResolveError> {
        if cells.len() != self.headers.len() {
            return Err(ResolveError::Table(format!(
                "row {} has {} cells, expected {}",
                self.rows,
                cells.len(),
                self.headers.len()
            )));
        }
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.push(if cell.is_empty() { None } else { Some(cell) });
        }
        self.rows += 1;
        Ok(())
    }

    /// Borrow a single cell.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = *self.positions.get(column)?;
        self.columns[idx].get(row)?.as_deref()
    }

    /// Borrow a column without cloning.
    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        let idx = *self.positions.get(name)?;
        Some(&self.columns[idx])
    }

    /// Parse CSV with a header row.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, ResolveError> {
        let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut frame = Self::with_headers(headers)?;
        for record in reader.records() {
            let record = record?;
            frame.push_row(record.iter().map(str::to_string).collect())?;
        }
        Ok(frame)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read_csv(file)
    }

    /// Write CSV with a header row; missing cells are written empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ResolveError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in 0..self.rows {
            writer.write_record(
                self.columns
                    .iter()
                    .map(|column| column[row].as_deref().unwrap_or("")),
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_path(&self, path: impl AsRef<Path>) -> Result<(), ResolveError> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv(file)
    }
}

impl Table for Frame {
    fn row_count(&self) -> usize {
        self.rows
    }

    fn has_column(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    fn column_names(&self) -> Vec<String> {
        self.headers.clone()
    }

    fn read_column(&self, name: &str) -> Option<Column> {
        self.column(name).map(<[Option<String>]>::to_vec)
    }

    fn write_column(&mut self, name: &str, values: Column) -> Result<(), ResolveError> {
        // A frame without columns takes its row count from the first write.
        if self.headers.is_empty() {
            self.rows = values.len();
        }
        if values.len() != self.rows {
            return Err(ResolveError::Table(format!(
                "column '{name}' has {} values, table has {} rows",
                values.len(),
                self.rows
            )));
        }
        match self.positions.get(name) {
            Some(&idx) => self.columns[idx] = values,
            None => {
                self.positions.insert(name.to_string(), self.headers.len());
                self.headers.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }
}
