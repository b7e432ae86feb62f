//! CSV file used as a spreadsheet sink.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tally_core::{Cell, SheetSink};

/// Appends rows to a CSV file, creating it on first write.
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SheetSink for CsvSheet {
    type Error = csv::Error;

    fn has_header(&mut self) -> Result<bool, csv::Error> {
        if !self.path.exists() {
            return Ok(false);
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let mut first = csv::StringRecord::new();
        Ok(reader.read_record(&mut first)? && first.iter().any(|field| !field.is_empty()))
    }

    fn append_rows(&mut self, rows: &[Vec<Cell>]) -> Result<(), csv::Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for row in rows {
            writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}
