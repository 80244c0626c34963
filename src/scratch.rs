//! Run-scoped temporary storage
//!
//! Everything handed out here is deleted when its owner is dropped, on
//! success, on error and while unwinding.

use crate::error::Result;
use std::path::Path;
use tempfile::{Builder, TempDir, TempPath};

/// Temporary directory owning every intermediate file of one run
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create the run directory under `parent`, or the system temp dir
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let mut builder = Builder::new();
        builder.prefix("sheetpack-");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        log::debug!("scratch space at {}", dir.path().display());
        Ok(ScratchSpace { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve an empty container file; removed when the `TempPath` drops
    pub fn container(&self, label: &str) -> Result<TempPath> {
        let file = Builder::new()
            .prefix(&format!("{}-", label))
            .suffix(".xlsx")
            .tempfile_in(self.dir.path())?;
        Ok(file.into_temp_path())
    }

    /// Fresh directory for unpacking a container
    pub fn work_dir(&self, label: &str) -> Result<TempDir> {
        Ok(Builder::new()
            .prefix(&format!("{}-", label))
            .tempdir_in(self.dir.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containers_removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let scratch = ScratchSpace::new(Some(parent.path())).unwrap();
        let container = scratch.container("sheet").unwrap();
        let path = container.to_path_buf();

        assert!(path.exists());
        assert!(path.starts_with(scratch.path()));
        drop(container);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let scratch = ScratchSpace::new(Some(parent.path())).unwrap();
        let work = scratch.work_dir("merge").unwrap();
        std::fs::write(work.path().join("x.xml"), "<x/>").unwrap();
        let root = scratch.path().to_path_buf();

        drop(work);
        drop(scratch);
        assert!(!root.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
