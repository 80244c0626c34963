//! Export pipeline: datasets in, one package out
//!
//! ```no_run
//! use sheetpack::{ExportOptions, Exporter, MemoryProvider};
//!
//! let provider = MemoryProvider::new()
//!     .with("orders", vec![vec!["id", "total"], vec!["1", "9.5"]])
//!     .with("customers", vec![vec!["id", "name"], vec!["1", "Ann"]]);
//!
//! let report = Exporter::new(ExportOptions::new().compression_level(6))
//!     .export(&provider, &["orders", "customers"], "report.xlsx")?;
//! for warning in &report.warnings {
//!     eprintln!("{}", warning);
//! }
//! # Ok::<(), sheetpack::ExportError>(())
//! ```

use crate::archive::{ArchivedSheet, SheetArchiver};
use crate::assemble::PackageAssembler;
use crate::error::{ExportError, Result};
use crate::naming::{resolve_sheet_names, SheetNameMap};
use crate::provider::DatasetProvider;
use crate::scratch::ScratchSpace;
use crate::sheet::{Sheet, SheetBuilder};
use crate::style::{StyleCatalog, StyleDescriptor, StyleRecorder};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Settings for one export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    compression_level: u32,
    temp_dir: Option<PathBuf>,
    styled: bool,
    header_style: Option<StyleDescriptor>,
    column_formats: IndexMap<String, String>,
    threads: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOptions {
    /// Styled output, deflate level 6, system temp dir, sequential
    pub fn new() -> Self {
        ExportOptions {
            compression_level: 6,
            temp_dir: None,
            styled: true,
            header_style: None,
            column_formats: IndexMap::new(),
            threads: 1,
        }
    }

    /// Deflate level 0-9; larger values are clamped to 9
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Directory for intermediate containers
    pub fn temp_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Header styling and column sizing on or off
    pub fn styled(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    pub fn header_style(mut self, style: StyleDescriptor) -> Self {
        self.header_style = Some(style);
        self
    }

    /// Number format for data cells under every header named `column`
    pub fn column_format(mut self, column: impl Into<String>, code: impl Into<String>) -> Self {
        self.column_formats.insert(column.into(), code.into());
        self
    }

    /// Worker threads for dataset conversion; needs the `parallel` feature
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn get_compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn get_threads(&self) -> usize {
        self.threads
    }

    fn sheet_builder(&self) -> SheetBuilder {
        if !self.styled {
            return SheetBuilder::plain();
        }
        let builder = SheetBuilder::new().column_formats(self.column_formats.clone());
        match &self.header_style {
            Some(style) => builder.header_style(style.clone()),
            None => builder,
        }
    }
}

/// Per-dataset condition that was skipped or repaired instead of failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportWarning {
    DatasetUnavailable { dataset: String, reason: String },
    EmptySheet { dataset: String },
    RowsTruncated { dataset: String, rows: usize },
}

impl ExportWarning {
    pub fn dataset(&self) -> &str {
        match self {
            ExportWarning::DatasetUnavailable { dataset, .. }
            | ExportWarning::EmptySheet { dataset }
            | ExportWarning::RowsTruncated { dataset, .. } => dataset,
        }
    }

    fn from_error(err: ExportError) -> std::result::Result<Self, ExportError> {
        match err {
            ExportError::DatasetUnavailable { dataset, reason } => {
                Ok(ExportWarning::DatasetUnavailable { dataset, reason })
            }
            ExportError::EmptySheet { dataset } => Ok(ExportWarning::EmptySheet { dataset }),
            other => Err(other),
        }
    }
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportWarning::DatasetUnavailable { dataset, reason } => {
                write!(f, "dataset '{}' skipped: {}", dataset, reason)
            }
            ExportWarning::EmptySheet { dataset } => {
                write!(f, "dataset '{}' skipped: no columns", dataset)
            }
            ExportWarning::RowsTruncated { dataset, rows } => write!(
                f,
                "dataset '{}': {} rows were longer than the header and were truncated",
                dataset, rows
            ),
        }
    }
}

/// One sheet of the finished package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSheet {
    pub dataset: String,
    pub sheet_name: String,
    pub data_rows: usize,
    pub columns: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub output: PathBuf,
    /// Sheets in package order
    pub sheets: Vec<ExportedSheet>,
    pub warnings: Vec<ExportWarning>,
}

impl ExportReport {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.sheet_name.as_str()).collect()
    }
}

/// What became of one requested dataset
enum Converted {
    Archived(ArchivedSheet),
    Skipped(ExportWarning),
}

/// Runs exports with fixed options
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Exporter { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export `ids` from `provider` into a package at `output`
    ///
    /// Sheets follow the order of `ids`. Unavailable and column-less
    /// datasets are skipped and reported as warnings; any other failure
    /// aborts the run, leaves `output` untouched and removes all
    /// intermediate files.
    pub fn export<P, S, O>(&self, provider: &P, ids: &[S], output: O) -> Result<ExportReport>
    where
        P: DatasetProvider + ?Sized,
        S: AsRef<str>,
        O: AsRef<Path>,
    {
        let output = output.as_ref();
        let names = resolve_sheet_names(ids)?;
        let scratch = ScratchSpace::new(self.options.temp_dir.as_deref())?;
        let builder = self.options.sheet_builder();
        let archiver = SheetArchiver::new(&scratch, self.options.compression_level);

        log::info!(
            "exporting {} datasets to {}",
            names.len(),
            output.display()
        );

        let (converted, catalog) = if self.options.threads > 1 {
            self.convert_parallel(provider, &names, &builder, &archiver)?
        } else {
            self.convert_sequential(provider, &names, &builder, &archiver)?
        };

        let mut handles = Vec::new();
        let mut warnings = Vec::new();
        for outcome in converted {
            match outcome {
                Converted::Archived(handle) => {
                    if handle.truncated_rows > 0 {
                        warnings.push(ExportWarning::RowsTruncated {
                            dataset: handle.dataset.clone(),
                            rows: handle.truncated_rows,
                        });
                    }
                    handles.push(handle);
                }
                Converted::Skipped(warning) => warnings.push(warning),
            }
        }

        if handles.is_empty() {
            return Err(ExportError::NothingToExport);
        }

        let sheets: Vec<ExportedSheet> = handles
            .iter()
            .map(|h| ExportedSheet {
                dataset: h.dataset.clone(),
                sheet_name: h.sheet_name.clone(),
                data_rows: h.data_rows,
                columns: h.columns,
            })
            .collect();

        let output = PackageAssembler::new(&scratch, self.options.compression_level)
            .assemble(handles, &catalog, &names, output)?;

        Ok(ExportReport {
            output,
            sheets,
            warnings,
        })
    }

    fn convert_sequential<P: DatasetProvider + ?Sized>(
        &self,
        provider: &P,
        names: &SheetNameMap,
        builder: &SheetBuilder,
        archiver: &SheetArchiver<'_>,
    ) -> Result<(Vec<Converted>, StyleCatalog)> {
        let mut catalog = StyleCatalog::new();
        let mut converted = Vec::with_capacity(names.len());
        for (id, name) in names {
            let outcome = match build_sheet(provider, id, name, builder, &mut catalog)? {
                Ok(sheet) => Converted::Archived(archiver.archive(sheet, &catalog.snapshot())?),
                Err(warning) => Converted::Skipped(warning),
            };
            converted.push(outcome);
        }
        Ok((converted, catalog))
    }

    #[cfg(feature = "parallel")]
    fn convert_parallel<P: DatasetProvider + ?Sized>(
        &self,
        provider: &P,
        names: &SheetNameMap,
        builder: &SheetBuilder,
        archiver: &SheetArchiver<'_>,
    ) -> Result<(Vec<Converted>, StyleCatalog)> {
        use crate::style::SharedCatalog;
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| ExportError::WriteError(format!("thread pool error: {}", e)))?;

        let shared = SharedCatalog::default();
        let jobs: Vec<(&String, &String)> = names.iter().collect();
        let converted = pool.install(|| {
            jobs.par_iter()
                .map(|(id, name)| {
                    let mut recorder = &shared;
                    match build_sheet(provider, id, name, builder, &mut recorder)? {
                        // Snapshot after this dataset's styles are recorded
                        Ok(sheet) => Ok(Converted::Archived(
                            archiver.archive(sheet, &shared.snapshot())?,
                        )),
                        Err(warning) => Ok(Converted::Skipped(warning)),
                    }
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok((converted, shared.to_catalog()))
    }

    #[cfg(not(feature = "parallel"))]
    fn convert_parallel<P: DatasetProvider + ?Sized>(
        &self,
        provider: &P,
        names: &SheetNameMap,
        builder: &SheetBuilder,
        archiver: &SheetArchiver<'_>,
    ) -> Result<(Vec<Converted>, StyleCatalog)> {
        log::warn!(
            "{} threads requested but the `parallel` feature is off; converting sequentially",
            self.options.threads
        );
        self.convert_sequential(provider, names, builder, archiver)
    }
}

/// Fetch and build one dataset
///
/// The outer error aborts the run; the inner one is a skip.
fn build_sheet<P, R>(
    provider: &P,
    id: &str,
    name: &str,
    builder: &SheetBuilder,
    recorder: &mut R,
) -> Result<std::result::Result<Sheet, ExportWarning>>
where
    P: DatasetProvider + ?Sized,
    R: StyleRecorder,
{
    let built = provider
        .fetch(id)
        .and_then(|dataset| builder.build(name, dataset, recorder));
    match built {
        Ok(sheet) => {
            log::info!(
                "writing dataset '{}' into sheet '{}' ({} rows)",
                id,
                name,
                sheet.data_row_count()
            );
            Ok(Ok(sheet))
        }
        Err(err) if err.is_recoverable() => {
            log::warn!("{}; skipping", err);
            Ok(Err(ExportWarning::from_error(err)?))
        }
        Err(err) => Err(err),
    }
}

/// Styled export with default options
pub fn export_workbook<P, S, O>(provider: &P, ids: &[S], output: O) -> Result<ExportReport>
where
    P: DatasetProvider + ?Sized,
    S: AsRef<str>,
    O: AsRef<Path>,
{
    Exporter::new(ExportOptions::new()).export(provider, ids, output)
}

/// Export without header styling or column sizing
pub fn export_workbook_plain<P, S, O>(provider: &P, ids: &[S], output: O) -> Result<ExportReport>
where
    P: DatasetProvider + ?Sized,
    S: AsRef<str>,
    O: AsRef<Path>,
{
    Exporter::new(ExportOptions::new().styled(false)).export(provider, ids, output)
}
