//! Package assembly
//!
//! The final package is produced in four steps:
//!
//! 1. write a skeleton holding the shared catalog, the sheet table and an
//!    empty placeholder part per sheet
//! 2. unpack the skeleton into a scratch directory
//! 3. copy each archived sheet's worksheet part over its placeholder
//! 4. re-pack the directory, in skeleton part order, next to the output
//!    and move it into place
//!
//! Nothing is visible at the output path until step 4 succeeds, and every
//! intermediate file lives in scratch storage that is removed on drop.

use crate::archive::ArchivedSheet;
use crate::error::{ExportError, Phase, Result};
use crate::naming::SheetNameMap;
use crate::ooxml::package::write_manifest;
use crate::ooxml::worksheet::write_placeholder;
use crate::ooxml::{ContainerReader, ContainerWriter, PartLocator};
use crate::scratch::ScratchSpace;
use crate::style::StyleCatalog;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};

/// Merges archived sheets and the shared catalog into one package
pub struct PackageAssembler<'a> {
    scratch: &'a ScratchSpace,
    compression_level: u32,
}

impl<'a> PackageAssembler<'a> {
    pub fn new(scratch: &'a ScratchSpace, compression_level: u32) -> Self {
        PackageAssembler {
            scratch,
            compression_level: compression_level.min(9),
        }
    }

    /// Build the package at `output` from `sheets`, in the given order
    ///
    /// Sheet names come from `names`. Each archived container is consumed
    /// and deleted whether or not assembly succeeds.
    pub fn assemble(
        &self,
        sheets: Vec<ArchivedSheet>,
        catalog: &StyleCatalog,
        names: &SheetNameMap,
        output: &Path,
    ) -> Result<PathBuf> {
        let mut declared = Vec::with_capacity(sheets.len());
        for sheet in &sheets {
            if !catalog.contains_index(sheet.max_style_index) {
                return Err(ExportError::StyleIndexMismatch {
                    dataset: sheet.dataset.clone(),
                    index: sheet.max_style_index,
                    catalog_len: catalog.len(),
                });
            }
            let name = names.get(&sheet.dataset).ok_or_else(|| {
                ExportError::WriteError(format!("no sheet name for dataset '{}'", sheet.dataset))
            })?;
            declared.push(name.as_str());
        }

        let skeleton = self.write_skeleton(&declared, catalog)?;
        let work = self.extract(&skeleton)?;
        drop(skeleton);

        for (index, sheet) in sheets.into_iter().enumerate() {
            self.install(work.path(), index + 1, &sheet)?;
        }

        self.seal(work.path(), declared.len(), output)?;
        log::info!(
            "wrote {} sheets to {}",
            declared.len(),
            output.display()
        );
        Ok(output.to_path_buf())
    }

    /// Step 1: skeleton with the full catalog and placeholder sheets
    pub fn write_skeleton(&self, sheet_names: &[&str], catalog: &StyleCatalog) -> Result<TempPath> {
        let path = self
            .scratch
            .container("skeleton")
            .map_err(|e| e.in_phase(Phase::Skeleton, None))?;
        let styles: Vec<_> = catalog.iter().cloned().collect();
        let mut zip =
            ContainerWriter::create(&path, self.compression_level, Phase::Skeleton, None)?;
        write_manifest(&mut zip, sheet_names, &styles)?;
        for ordinal in 1..=sheet_names.len() {
            zip.write_part(&PartLocator::worksheet(ordinal), |xml| write_placeholder(xml))?;
        }
        zip.finish()?;
        log::debug!("skeleton with {} placeholders written", sheet_names.len());
        Ok(path)
    }

    /// Step 2: unpack a container into a fresh scratch directory
    pub fn extract(&self, container: &Path) -> Result<TempDir> {
        let work = self
            .scratch
            .work_dir("package")
            .map_err(|e| e.in_phase(Phase::Extract, None))?;
        let mut zip = ContainerReader::open(container, Phase::Extract, None)?;
        for part in zip.entry_names() {
            let dest = PartLocator::fs_path(work.path(), &part, Phase::Extract, None)?;
            zip.extract_to(&part, &dest)?;
        }
        Ok(work)
    }

    /// Step 3: overwrite placeholder `ordinal` with the archived sheet's part
    pub fn install(&self, root: &Path, ordinal: usize, sheet: &ArchivedSheet) -> Result<()> {
        let target = PartLocator::worksheet(ordinal);
        let dest = PartLocator::fs_path(root, &target, Phase::Install, Some(&sheet.dataset))?;
        if !dest.is_file() {
            return Err(ExportError::container(
                Phase::Install,
                Some(&sheet.dataset),
                format!("skeleton has no placeholder {}", target),
            ));
        }

        let mut zip = ContainerReader::open(sheet.path(), Phase::Install, Some(&sheet.dataset))?;
        let bytes = zip.extract_to(&sheet.sheet_part(), &dest)?;
        log::debug!(
            "installed dataset '{}' as {} ({} bytes)",
            sheet.dataset,
            target,
            bytes
        );
        Ok(())
    }

    /// Step 4: re-pack `root` and atomically move the result to `output`
    pub fn seal(&self, root: &Path, sheet_count: usize, output: &Path) -> Result<()> {
        let fail = |e: &dyn std::fmt::Display| ExportError::container(Phase::Seal, None, e);
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| fail(&e))?;

        let staging = tempfile::Builder::new()
            .prefix(".sheetpack-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| fail(&e))?
            .into_temp_path();

        let mut zip = ContainerWriter::create(&staging, self.compression_level, Phase::Seal, None)?;
        for part in PartLocator::new(sheet_count).parts() {
            let source = PartLocator::fs_path(root, &part, Phase::Seal, None)?;
            zip.copy_file_entry(&part, &source)?;
        }
        zip.finish()?;

        staging.persist(output).map_err(|e| fail(&e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::SheetArchiver;
    use crate::naming::resolve_sheet_names;
    use crate::reader::PackageReader;
    use crate::sheet::SheetBuilder;
    use crate::types::Dataset;

    fn archive_all(
        scratch: &ScratchSpace,
        catalog: &mut StyleCatalog,
        datasets: Vec<Dataset>,
    ) -> Vec<ArchivedSheet> {
        let archiver = SheetArchiver::new(scratch, 6);
        datasets
            .into_iter()
            .map(|ds| {
                let id = ds.id.clone();
                let sheet = SheetBuilder::new().build(&id, ds, catalog).unwrap();
                archiver.archive(sheet, &catalog.snapshot()).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_skeleton_has_placeholders() {
        let scratch = ScratchSpace::new(None).unwrap();
        let assembler = PackageAssembler::new(&scratch, 6);
        let skeleton = assembler
            .write_skeleton(&["one", "two"], &StyleCatalog::new())
            .unwrap();

        let mut reader = PackageReader::open(&skeleton).unwrap();
        assert_eq!(reader.sheet_names(), &["one".to_string(), "two".to_string()]);
        assert!(reader.rows("two").unwrap().is_empty());
        assert_eq!(reader.part_names(), PartLocator::new(2).parts());
    }

    #[test]
    fn test_assemble_in_declared_order() {
        let scratch = ScratchSpace::new(None).unwrap();
        let mut catalog = StyleCatalog::new();
        let handles = archive_all(
            &scratch,
            &mut catalog,
            vec![
                Dataset::new("b", vec![vec!["id"], vec!["9"]]),
                Dataset::new("a", vec![vec!["id"], vec!["1"], vec!["2"]]),
            ],
        );
        let names = resolve_sheet_names(&["b", "a"]).unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("book.xlsx");

        PackageAssembler::new(&scratch, 6)
            .assemble(handles, &catalog, &names, &output)
            .unwrap();

        let mut reader = PackageReader::open(&output).unwrap();
        assert_eq!(reader.sheet_names(), &["b".to_string(), "a".to_string()]);
        assert_eq!(reader.rows("a").unwrap().len(), 3);
        assert_eq!(reader.rows("b").unwrap()[1], vec!["9"]);
        // only the output is left beside it
        assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 1);
        // archived containers are gone
        let leftovers: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_catalog_mismatch_aborts_before_output() {
        let scratch = ScratchSpace::new(None).unwrap();
        let mut catalog = StyleCatalog::new();
        let handles = archive_all(
            &scratch,
            &mut catalog,
            vec![Dataset::new("a", vec![vec!["id"]])],
        );
        let names = resolve_sheet_names(&["a"]).unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("book.xlsx");

        let err = PackageAssembler::new(&scratch, 6)
            .assemble(handles, &StyleCatalog::new(), &names, &output)
            .unwrap_err();
        assert!(matches!(err, ExportError::StyleIndexMismatch { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_corrupt_sheet_container_names_dataset() {
        let scratch = ScratchSpace::new(None).unwrap();
        let mut catalog = StyleCatalog::new();
        let handles = archive_all(
            &scratch,
            &mut catalog,
            vec![Dataset::new("broken", vec![vec!["id"]])],
        );
        std::fs::write(handles[0].path(), b"garbage").unwrap();
        let names = resolve_sheet_names(&["broken"]).unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("book.xlsx");

        let err = PackageAssembler::new(&scratch, 6)
            .assemble(handles, &catalog, &names, &output)
            .unwrap_err();
        assert_eq!(err.dataset(), Some("broken"));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unwritable_placeholder_names_install_and_dataset() {
        let scratch = ScratchSpace::new(None).unwrap();
        let mut catalog = StyleCatalog::new();
        let handles = archive_all(
            &scratch,
            &mut catalog,
            vec![Dataset::new("orders", vec![vec!["id"], vec!["1"]])],
        );
        let assembler = PackageAssembler::new(&scratch, 6);
        let skeleton = assembler.write_skeleton(&["orders"], &catalog).unwrap();
        let work = assembler.extract(&skeleton).unwrap();

        let placeholder = work.path().join("xl/worksheets/sheet1.xml");
        std::fs::remove_file(&placeholder).unwrap();
        std::os::unix::fs::symlink("/proc/version", &placeholder).unwrap();

        let err = assembler.install(work.path(), 1, &handles[0]).unwrap_err();
        assert!(matches!(
            err,
            ExportError::ContainerCorrupt {
                phase: Phase::Install,
                ..
            }
        ));
        assert_eq!(err.dataset(), Some("orders"));
    }

    #[test]
    fn test_seal_failure_is_tagged() {
        let scratch = ScratchSpace::new(None).unwrap();
        let assembler = PackageAssembler::new(&scratch, 6);
        let skeleton = assembler
            .write_skeleton(&["a"], &StyleCatalog::new())
            .unwrap();
        let work = assembler.extract(&skeleton).unwrap();

        let out_dir = TempDir::new().unwrap();
        let blocker = out_dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();
        let output = blocker.join("book.xlsx");

        let err = assembler.seal(work.path(), 1, &output).unwrap_err();
        assert!(matches!(
            err,
            ExportError::ContainerCorrupt {
                phase: Phase::Seal,
                ..
            }
        ));
        assert!(err.to_string().contains("seal"));
    }
}
