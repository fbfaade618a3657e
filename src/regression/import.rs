use std::fs;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use super::DataPoint;

/// A CSV line that could not be read as a data point
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct RowParseError {
    /// 1-indexed line number in the source
    pub line: usize,
    pub reason: String,
}

/// Outcome of a CSV import: every row that parsed, and the rows that did not
///
/// Bad rows never discard good ones; the caller decides whether a partial import is acceptable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CsvImport {
    pub points: Vec<DataPoint>,
    pub errors: Vec<RowParseError>,
}

impl CsvImport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// All points, or the first bad row
    ///
    /// # Errors
    /// Returns the first [`RowParseError`] when any row failed.
    pub fn into_complete(self) -> Result<Vec<DataPoint>, RowParseError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.points),
        }
    }
}

/// Read `x, y[, ux, uy]` rows
///
/// Surrounding whitespace is ignored, blank lines are skipped and empty `ux` / `uy` cells
/// leave the uncertainty unspecified.
///
/// # Errors
/// Only a failure of the underlying reader aborts the import; malformed rows are collected in
/// [`CsvImport::errors`].
pub fn read_csv<R: Read>(mut reader: R) -> Result<CsvImport, csv::Error> {
    let mut text = Vec::new();
    reader.read_to_end(&mut text)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(&text[..]);

    let mut import = CsvImport::default();
    for result in rdr.records() {
        let row = match result {
            Ok(record) => {
                let line = record.position().map_or(0, |p| physical_line(&text, p));
                parse_row(&record).map_err(|reason| (line, reason))
            }
            Err(error) if error.is_io_error() => return Err(error),
            Err(error) => {
                let line = error.position().map_or(0, |p| physical_line(&text, p));
                Err((line, error.to_string()))
            }
        };

        match row {
            Ok(point) => import.points.push(point),
            Err((line, reason)) => {
                log::warn!("skipping CSV line {line}: {reason}");
                import.errors.push(RowParseError { line, reason });
            }
        }
    }

    Ok(import)
}

/// 1-indexed line a record actually starts on
///
/// The reader positions a record where it started reading, before any blank lines it skipped.
fn physical_line(text: &[u8], position: &csv::Position) -> usize {
    let start = usize::try_from(position.byte()).map_or(text.len(), |s| s.min(text.len()));
    let (before, after) = text.split_at(start);
    let blank = after
        .iter()
        .take_while(|b| matches!(**b, b'\n' | b'\r'))
        .filter(|b| **b == b'\n')
        .count();
    let earlier = before.iter().filter(|b| **b == b'\n').count();
    earlier + blank + 1
}

/// Read a CSV file of data points, see [`read_csv`]
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_csv_file(path: &Path) -> crate::Result<CsvImport> {
    log::info!("reading {path:?}");
    let file = fs::read(path)?;
    Ok(read_csv(&file[..])?)
}

fn parse_row(record: &StringRecord) -> Result<DataPoint, String> {
    if record.iter().all(str::is_empty) {
        return Err("the row is empty".to_owned());
    }
    match record.len() {
        2 => Ok(DataPoint::new(
            required(record, 0, "x")?,
            required(record, 1, "y")?,
        )),
        4 => Ok(DataPoint::new(required(record, 0, "x")?, required(record, 1, "y")?)
            .with_uncertainties(uncertainty(record, 2, "ux")?, uncertainty(record, 3, "uy")?)),
        found => Err(format!("expected 2 or 4 fields, found {found}")),
    }
}

fn number(field: &str, name: &str) -> Result<f64, String> {
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("{name} value '{field}' is not a finite number")),
    }
}

fn required(record: &StringRecord, index: usize, name: &str) -> Result<f64, String> {
    match record.get(index) {
        Some(field) if !field.is_empty() => number(field, name),
        _ => Err(format!("{name} is missing")),
    }
}

fn uncertainty(record: &StringRecord, index: usize, name: &str) -> Result<Option<f64>, String> {
    match record.get(index) {
        Some(field) if !field.is_empty() => {
            let value = number(field, name)?;
            if value < 0.0 {
                return Err(format!("{name} must not be negative"));
            }
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}
