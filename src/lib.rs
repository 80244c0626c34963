//! # sheetpack
//!
//! Bounded-memory export of many tabular datasets into one multi-sheet
//! xlsx package.
//!
//! ## Features
//!
//! - **One dataset per sheet**: sheets follow the caller's order, long
//!   identifiers are shortened to unique 31-character sheet names
//! - **Shared style catalog**: identical styles are stored once and every
//!   sheet's `s` references resolve against the same `styles.xml`
//! - **Bounded memory**: each sheet is archived to a temporary container
//!   as soon as it is built; the final package is merged part by part
//! - **Atomic output**: the package appears at its path only when complete,
//!   and temporary files are removed on every exit path
//! - **Parallel conversion**: with the `parallel` feature, datasets are
//!   converted on a rayon pool behind a locked catalog
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheetpack::{export_workbook, MemoryProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = MemoryProvider::new()
//!     .with("a", vec![vec!["id"], vec!["1"], vec!["2"]])
//!     .with("b", vec![vec!["id"], vec!["9"]]);
//!
//! let report = export_workbook(&provider, &["a", "b"], "datasets.xlsx")?;
//! assert_eq!(report.sheet_names(), vec!["a", "b"]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a package back
//!
//! ```rust,no_run
//! use sheetpack::PackageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = PackageReader::open("datasets.xlsx")?;
//! for name in reader.sheet_names().to_vec() {
//!     println!("{}: {} rows", name, reader.rows(&name)?.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod assemble;
pub mod csv;
pub mod error;
pub mod export;
pub mod naming;
pub mod ooxml;
pub mod provider;
pub mod reader;
pub mod scratch;
pub mod sheet;
pub mod style;
pub mod types;

pub use archive::{ArchivedSheet, SheetArchiver};
pub use assemble::PackageAssembler;
pub use error::{ExportError, Phase, Result};
pub use export::{
    export_workbook, export_workbook_plain, ExportOptions, ExportReport, ExportWarning,
    ExportedSheet, Exporter,
};
pub use naming::{resolve_sheet_names, sheet_name_len, SheetNameMap, MAX_SHEET_NAME_LEN};
pub use ooxml::PartLocator;
pub use provider::{CsvDirectoryProvider, DatasetProvider, MemoryProvider};
pub use reader::PackageReader;
pub use scratch::ScratchSpace;
pub use sheet::{Sheet, SheetBuilder, SheetCell};
pub use style::{CatalogSnapshot, SharedCatalog, StyleCatalog, StyleDescriptor, StyleRecorder};
pub use types::{CellValue, Dataset};

