//! Per-tick row buffering and CSV export.
//!
//! Rates emitted during a tick land in the pending row; `commit_row` closes
//! the tick and appends one cell to every column. Columns are ordered by
//! first appearance. A topic missing from a tick, or first seen after tick
//! one, gets empty cells so every column has one cell per committed tick.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::topic::MetricTopic;

/// Columnar buffer of derived rates, one column per topic.
#[derive(Debug, Default)]
pub struct TableBuffer {
    header: Vec<MetricTopic>,
    index: HashMap<MetricTopic, usize>,
    columns: Vec<Vec<Option<f64>>>,
    pending: Vec<Option<f64>>,
    rows: usize,
}

impl TableBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `rate` for `topic` in the current row. A second value for the
    /// same topic within one tick replaces the first.
    pub fn record(&mut self, topic: &MetricTopic, rate: f64) {
        let idx = match self.index.get(topic) {
            Some(&idx) => idx,
            None => {
                let idx = self.header.len();
                self.header.push(topic.clone());
                self.index.insert(topic.clone(), idx);
                self.columns.push(vec![None; self.rows]);
                self.pending.push(None);
                idx
            }
        };
        self.pending[idx] = Some(rate);
    }

    /// Closes the current row.
    pub fn commit_row(&mut self) {
        for (column, cell) in self.columns.iter_mut().zip(self.pending.iter_mut()) {
            column.push(cell.take());
        }
        self.rows += 1;
    }

    /// Topic names in column order.
    pub fn header(&self) -> &[MetricTopic] {
        &self.header
    }

    /// Number of committed rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Cells of committed row `row`, in column order.
    pub fn row(&self, row: usize) -> Option<Vec<Option<f64>>> {
        (row < self.rows).then(|| self.columns.iter().map(|column| column[row]).collect())
    }

    /// Writes the header and every committed row as CSV.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        let header: Vec<String> = self
            .header
            .iter()
            .map(|topic| escape_csv_field(topic.as_str()))
            .collect();
        writeln!(out, "{}", header.join(","))?;

        for row in 0..self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|column| column[row].map(|v| v.to_string()).unwrap_or_default())
                .collect();
            writeln!(out, "{}", cells.join(","))?;
        }

        out.flush()
    }

    /// Creates (or truncates) `path` and writes the table to it.
    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))
    }
}

/// Quote a CSV field if it contains a delimiter, quote or line break.
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
