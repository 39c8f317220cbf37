//! CSV source extracts read as header-keyed records.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("opening extract {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reading extract {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("extract {path} has no `{column}` column")]
    MissingKeyColumn { path: PathBuf, column: String },
}

/// One extract row. Values are looked up by header name; a missing column
/// and an empty cell both read as `None`.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    columns: Arc<HashMap<String, usize>>,
    values: csv::StringRecord,
}

impl SourceRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = *self.columns.get(column)?;
        self.values
            .get(idx)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn get_owned(&self, column: &str) -> Option<String> {
        self.get(column).map(str::to_string)
    }
}

/// Parsed extract: the rows in file order plus the header index they share.
#[derive(Debug, Clone)]
pub struct SourceExtract {
    pub path: PathBuf,
    pub records: Vec<SourceRecord>,
}

impl SourceExtract {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read a whole extract, requiring `key_column` in the header row.
pub fn read_extract(path: &Path, key_column: &str) -> Result<SourceExtract, ExtractError> {
    let file = File::open(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_extract(file, path, key_column)
}

pub fn parse_extract<R: Read>(
    input: R,
    path: &Path,
    key_column: &str,
) -> Result<SourceExtract, ExtractError> {
    let csv_err = |source| ExtractError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(input);

    let headers = reader.headers().map_err(csv_err)?.clone();
    let columns = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), idx))
        .collect::<HashMap<_, _>>();
    if !columns.contains_key(key_column) {
        return Err(ExtractError::MissingKeyColumn {
            path: path.to_path_buf(),
            column: key_column.to_string(),
        });
    }
    let columns = Arc::new(columns);

    let mut records = Vec::new();
    for row in reader.records() {
        records.push(SourceRecord {
            columns: Arc::clone(&columns),
            values: row.map_err(csv_err)?,
        });
    }
    Ok(SourceExtract {
        path: path.to_path_buf(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_empty_columns_read_as_none() {
        let csv = "\u{feff}EPIN,Agency,Program\n85826Y1251, ,Parks\n";
        let extract = parse_extract(csv.as_bytes(), Path::new("mem.csv"), "EPIN").expect("parse");
        let row = &extract.records[0];
        assert_eq!(row.get("EPIN"), Some("85826Y1251"));
        assert_eq!(row.get("Agency"), None);
        assert_eq!(row.get("Program"), Some("Parks"));
        assert_eq!(row.get("Industry"), None);
    }

    #[test]
    fn short_rows_are_tolerated() {
        let csv = "EPIN,Agency,Program\nA1,DSNY\n";
        let extract = parse_extract(csv.as_bytes(), Path::new("mem.csv"), "EPIN").expect("parse");
        assert_eq!(extract.len(), 1);
        assert_eq!(extract.records[0].get("Program"), None);
    }

    #[test]
    fn natural_key_column_is_required() {
        let csv = "Agency,Program\nDSNY,Parks\n";
        let err = parse_extract(csv.as_bytes(), Path::new("mem.csv"), "EPIN").expect_err("missing key");
        assert!(matches!(err, ExtractError::MissingKeyColumn { column, .. } if column == "EPIN"));
    }

    #[test]
    fn quoted_cells_keep_commas() {
        let csv = "Vendor Name,PASSPort Supplier-ID\n\"Acme Widgets, Inc.\",S1\n";
        let extract = parse_extract(csv.as_bytes(), Path::new("mem.csv"), "PASSPort Supplier-ID")
            .expect("parse");
        assert_eq!(extract.records[0].get("Vendor Name"), Some("Acme Widgets, Inc."));
    }
}
