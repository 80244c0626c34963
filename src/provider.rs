//! Dataset providers
//!
//! The exporter asks a [`DatasetProvider`] for each identifier in turn.
//! [`ExportError::DatasetUnavailable`] from `fetch` skips that dataset;
//! any other error aborts the run.

use crate::csv::CsvParser;
use crate::error::{ExportError, Result};
use crate::types::{CellValue, Dataset};
use indexmap::IndexMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Source of datasets by identifier
pub trait DatasetProvider: Sync {
    fn fetch(&self, id: &str) -> Result<Dataset>;
}

/// Datasets held in memory, in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    datasets: IndexMap<String, Vec<Vec<CellValue>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a dataset; first row is the header
    pub fn insert<R, V>(&mut self, id: impl Into<String>, rows: impl IntoIterator<Item = R>)
    where
        R: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let dataset = Dataset::new(id, rows);
        self.datasets.insert(dataset.id, dataset.rows);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with<R, V>(mut self, id: impl Into<String>, rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.insert(id, rows);
        self
    }

    /// Identifiers in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl DatasetProvider for MemoryProvider {
    fn fetch(&self, id: &str) -> Result<Dataset> {
        self.datasets
            .get(id)
            .map(|rows| Dataset {
                id: id.to_string(),
                rows: rows.clone(),
            })
            .ok_or_else(|| ExportError::DatasetUnavailable {
                dataset: id.to_string(),
                reason: "no such dataset".to_string(),
            })
    }
}

/// Loads `<dir>/<id>.csv`, inferring cell types from unquoted fields
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    dir: PathBuf,
    delimiter: u8,
}

impl CsvDirectoryProvider {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        CsvDirectoryProvider {
            dir: dir.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", id))
    }

    /// `<id>` of every `.csv` file in the directory, sorted
    pub fn ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl DatasetProvider for CsvDirectoryProvider {
    fn fetch(&self, id: &str) -> Result<Dataset> {
        let unavailable = |reason: String| ExportError::DatasetUnavailable {
            dataset: id.to_string(),
            reason,
        };

        // Identifiers never address files outside the directory
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(unavailable("not a valid file name".to_string()));
        }

        let path = self.path_for(id);
        let file = File::open(&path)
            .map_err(|e| unavailable(format!("cannot open {}: {}", path.display(), e)))?;

        let parser = CsvParser::new(self.delimiter, b'"');
        let records = parser
            .read_records(BufReader::new(file))
            .map_err(|e| unavailable(format!("cannot read {}: {}", path.display(), e)))?;

        let rows: Vec<Vec<CellValue>> = records
            .iter()
            .filter(|record| !record.is_empty())
            .enumerate()
            .map(|(i, record)| {
                if i == 0 {
                    // Header cells are names, never inferred
                    parser
                        .parse_line(record)
                        .into_iter()
                        .map(CellValue::String)
                        .collect()
                } else {
                    parser.parse_values(record)
                }
            })
            .collect();

        log::debug!("loaded {} records from {}", rows.len(), path.display());
        Ok(Dataset {
            id: id.to_string(),
            rows,
        })
    }
}
