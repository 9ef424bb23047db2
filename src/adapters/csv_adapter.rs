//! CSV minute-bar file adapter.
//!
//! Expected columns: `timestamp, open, high, low, close`. Extra trailing
//! columns (volume, trade count) are ignored.

use crate::domain::error::TraderError;
use crate::domain::price::BarRecord;
use crate::ports::data_port::HistoryPort;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    path: PathBuf,
    has_headers: bool,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            has_headers: false,
        }
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }
}

impl HistoryPort for CsvAdapter {
    fn fetch_records(&self) -> Result<Vec<BarRecord>, TraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| TraderError::DataSource {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut records = Vec::new();

        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 1;
            let record = result.map_err(|e| TraderError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let column = |i: usize, name: &str| {
                record.get(i).ok_or_else(|| TraderError::DataFormat {
                    line,
                    reason: format!("missing {} column", name),
                })
            };

            records.push(BarRecord::new(
                column(0, "timestamp")?,
                column(1, "open")?,
                column(2, "high")?,
                column(3, "low")?,
                column(4, "close")?,
            ));
        }

        Ok(records)
    }
}
