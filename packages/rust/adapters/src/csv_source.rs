//! CSV data source.

use std::path::Path;

use tracing::{debug, instrument};

use documint_core::DataSource;
use documint_shared::{Dataset, DocumintError, Result, Row};

/// Reads a CSV file whose first record names the columns.
///
/// Every data row must have as many fields as the header.
pub struct CsvDataSource;

impl DataSource for CsvDataSource {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn read(&self, path: &Path) -> Result<Dataset> {
        let read_error = |e: csv::Error| DocumintError::DataRead(format!("{}: {e}", path.display()));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(path)
            .map_err(read_error)?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(read_error)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(read_error)?;
            rows.push(Row::new(
                index,
                columns.iter().cloned().zip(record.iter().map(str::to_string)),
            ));
        }

        debug!(columns = columns.len(), rows = rows.len(), "csv parsed");
        Ok(Dataset { columns, rows })
    }
}
