//! Per-sheet archiving
//!
//! Each sheet is written to its own small, valid workbook in scratch
//! storage as soon as it is built, then dropped from memory. The copy of
//! the catalog inside that workbook is the snapshot taken after the sheet's
//! styles were recorded, so its indices line up with the shared catalog.

use crate::error::{ExportError, Phase, Result};
use crate::ooxml::package::write_manifest;
use crate::ooxml::worksheet::write_worksheet;
use crate::ooxml::{ContainerWriter, PartLocator};
use crate::scratch::ScratchSpace;
use crate::sheet::Sheet;
use crate::style::CatalogSnapshot;
use std::path::Path;
use tempfile::TempPath;

/// Handle to one archived sheet; the container is deleted when this drops
#[derive(Debug)]
pub struct ArchivedSheet {
    pub dataset: String,
    pub sheet_name: String,
    pub data_rows: usize,
    pub columns: usize,
    pub truncated_rows: usize,
    /// Highest style index the sheet part references
    pub max_style_index: u32,
    container: TempPath,
}

impl ArchivedSheet {
    pub fn path(&self) -> &Path {
        &self.container
    }

    /// Part inside the container that holds the sheet content
    pub fn sheet_part(&self) -> String {
        PartLocator::worksheet(1)
    }
}

/// Writes sheets into standalone containers under a scratch space
pub struct SheetArchiver<'a> {
    scratch: &'a ScratchSpace,
    compression_level: u32,
}

impl<'a> SheetArchiver<'a> {
    pub fn new(scratch: &'a ScratchSpace, compression_level: u32) -> Self {
        SheetArchiver {
            scratch,
            compression_level: compression_level.min(9),
        }
    }

    /// Archive `sheet` against the catalog as it stood once its styles were recorded
    ///
    /// A sheet referencing an index past the snapshot means styles were
    /// recorded after the snapshot was taken; that is a sequencing bug and
    /// fails with [`ExportError::StyleIndexMismatch`].
    pub fn archive(&self, sheet: Sheet, snapshot: &CatalogSnapshot) -> Result<ArchivedSheet> {
        let max_style_index = sheet.max_style_index();
        if !snapshot.contains_index(max_style_index) {
            return Err(ExportError::StyleIndexMismatch {
                dataset: sheet.dataset,
                index: max_style_index,
                catalog_len: snapshot.len(),
            });
        }

        let dataset = sheet.dataset.as_str();
        let container = self
            .scratch
            .container("sheet")
            .map_err(|e| e.in_phase(Phase::Archive, Some(dataset)))?;
        let mut zip = ContainerWriter::create(
            &container,
            self.compression_level,
            Phase::Archive,
            Some(dataset),
        )?;
        write_manifest(&mut zip, &[sheet.name.as_str()], snapshot.entries())?;
        zip.write_part(&PartLocator::worksheet(1), |xml| write_worksheet(xml, &sheet))?;
        zip.finish()?;

        log::debug!(
            "archived dataset '{}' ({} rows) to {}",
            sheet.dataset,
            sheet.data_row_count(),
            container.display()
        );

        Ok(ArchivedSheet {
            data_rows: sheet.data_row_count(),
            columns: sheet.column_count(),
            truncated_rows: sheet.truncated_rows,
            max_style_index,
            dataset: sheet.dataset,
            sheet_name: sheet.name,
            container,
        })
    }
}
