//! Table of simulation results, one row per tick, with CSV export and terminal display.

use crate::error::SimulationError;

use prettytable::{Cell, Row, Table};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Values recorded at one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordRow {
    pub time: f64,
    /// Full state vector, in the order of [`SimulationRecord::species`].
    pub state: Vec<f64>,
    /// Disturbed and manipulated variables in effect over the interval ending at `time`.
    pub disturbed: f64,
    pub manipulated: f64,
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

/// Append-only sequence of [`RecordRow`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationRecord {
    species: Vec<String>,
    controlled: bool,
    rows: Vec<RecordRow>,
}

impl SimulationRecord {
    pub fn new(species: Vec<String>, controlled: bool) -> Self {
        Self::with_capacity(species, controlled, 0)
    }

    pub fn with_capacity(species: Vec<String>, controlled: bool, capacity: usize) -> Self {
        SimulationRecord {
            species,
            controlled,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, row: RecordRow) {
        self.rows.push(row);
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// True if the run had an active controller.
    pub fn is_controlled(&self) -> bool {
        self.controlled
    }

    pub fn rows(&self) -> &[RecordRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&RecordRow> {
        self.rows.last()
    }

    /// Column names: time, one per species, the disturbed variable, then for
    /// controlled runs the manipulated variable and the P, I and D terms.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::with_capacity(self.species.len() + 6);
        headers.push("time".to_string());
        headers.extend(self.species.iter().cloned());
        headers.push("disturbance".to_string());
        if self.controlled {
            headers.extend(["manipulated", "P", "I", "D"].iter().map(|s| s.to_string()));
        }
        headers
    }

    /// Values of a row in the order of [`headers`](Self::headers).
    pub fn values(&self, row: &RecordRow) -> Vec<f64> {
        let mut values = Vec::with_capacity(row.state.len() + 6);
        values.push(row.time);
        values.extend(row.state.iter().copied());
        values.push(row.disturbed);
        if self.controlled {
            values.extend([row.manipulated, row.p, row.i, row.d]);
        }
        values
    }

    /// Column `name` over all rows.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.headers().iter().position(|h| h == name)?;
        Some(self.rows.iter().map(|r| self.values(r)[index]).collect())
    }

    /// Writes the table as comma separated values.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), SimulationError> {
        let mut buf = BufWriter::new(writer);
        writeln!(buf, "{}", self.headers().join(","))?;
        for row in &self.rows {
            let line = self
                .values(row)
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",");
            writeln!(buf, "{}", line)?;
        }
        buf.flush()?;
        Ok(())
    }

    /// Saves the table to `path`, appending a `.csv` extension when missing. Returns the written path.
    pub fn save_csv<Q: AsRef<Path>>(&self, path: Q) -> Result<PathBuf, SimulationError> {
        let mut path = path.as_ref().to_path_buf();
        let has_csv_ext = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if !has_csv_ext {
            let mut name = path.as_os_str().to_owned();
            name.push(".csv");
            path = PathBuf::from(name);
        }
        let file = File::create(&path)?;
        self.write_csv(file)?;
        Ok(path)
    }

    /// Renders the table with `prettytable`.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(Row::new(
            self.headers().iter().map(|h| Cell::new(h)).collect(),
        ));
        for row in &self.rows {
            table.add_row(Row::new(
                self.values(row)
                    .iter()
                    .map(|v| Cell::new(&format!("{:.6}", v)))
                    .collect(),
            ));
        }
        table
    }
}

impl fmt::Display for SimulationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(controlled: bool) -> SimulationRecord {
        let mut record = SimulationRecord::new(vec!["A".to_string(), "B".to_string()], controlled);
        record.push(RecordRow {
            time: 0.0,
            state: vec![1.0, 0.0],
            disturbed: 1.0,
            manipulated: 0.5,
            p: 0.1,
            i: 0.2,
            d: 0.3,
        });
        record
    }

    #[test]
    fn columns_depend_on_control() {
        assert_eq!(
            record(true).headers(),
            vec!["time", "A", "B", "disturbance", "manipulated", "P", "I", "D"]
        );
        assert_eq!(record(false).headers(), vec!["time", "A", "B", "disturbance"]);
        assert_eq!(record(true).column("I").unwrap(), vec![0.2]);
        assert!(record(false).column("I").is_none());
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut out = Vec::new();
        record(true).write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,A,B,disturbance,manipulated,P,I,D");
        assert_eq!(lines[1], "0,1,0,1,0.5,0.1,0.2,0.3");
    }

    #[test]
    fn save_appends_extension() {
        let dir = tempfile::tempdir().unwrap();
        let written = record(false).save_csv(dir.path().join("run")).unwrap();
        assert_eq!(written.extension().unwrap(), "csv");
        let text = std::fs::read_to_string(written).unwrap();
        assert!(text.starts_with("time,A,B,disturbance\n"));
    }

    #[test]
    fn table_has_one_line_per_row() {
        let table = record(true).to_table();
        assert_eq!(table.len(), 1);
        assert!(record(true).to_string().contains("manipulated"));
    }
}
